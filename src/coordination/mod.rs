//! Squad coordination - tactics, volleys, suppression and flocking

pub mod execution;
pub mod flocking;
pub mod tactics;

pub use execution::{coordinate_squad, CoordinationContext, CoordinationOutcome, Volley};
pub use flocking::{flocking_force, Boid};
pub use tactics::{select_tactic, SquadTactic};
