pub mod config;
pub mod error;
pub mod types;

pub use config::{load_config, AiConfig};
pub use error::{AiError, Result};
pub use types::{AgentId, Aabb, SquadId, Tick, Vec2};
