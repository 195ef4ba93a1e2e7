//! Skirmish AI - decision core for real-time combat agents
//!
//! Perception, per-agent state machines, squads with formations and
//! tactics, and a difficulty controller that tunes the whole thing to the
//! player. The host owns positions and physics; the core turns world state
//! into intents once per tick.

pub mod agent;
pub mod behavior;
pub mod coordination;
pub mod core;
pub mod difficulty;
pub mod fsm;
pub mod perception;
pub mod simulation;
pub mod spatial;
pub mod squad;

pub use crate::core::config::AiConfig;
pub use crate::core::error::{AiError, Result};
pub use crate::simulation::{SimulationContext, TickInput, TickReport};
