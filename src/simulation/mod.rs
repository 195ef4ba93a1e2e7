//! Simulation driver - owns the registries and runs the tick pipeline

pub mod context;
pub mod report;
pub mod tick;

pub use context::{AgentUpdate, SimulationContext, SpawnRequest};
pub use report::{SimulationStats, SquadReport, TickReport};
pub use tick::TickInput;
