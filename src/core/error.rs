use thiserror::Error;

use crate::core::types::{AgentId, SquadId};
use crate::fsm::AgentState;

#[derive(Error, Debug)]
pub enum AiError {
    #[error("Invalid transition for {agent}: {from:?} -> {to:?}")]
    InvalidTransition {
        agent: AgentId,
        from: AgentState,
        to: AgentState,
    },

    #[error("Agent not found: {0}")]
    AgentNotFound(AgentId),

    #[error("Squad not found: {0}")]
    SquadNotFound(SquadId),

    #[error("Missing reference: {0}")]
    MissingReference(String),

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(&'static str),

    #[error("Setting {name} value {value} outside [{min}, {max}]")]
    ConfigurationOutOfRange {
        name: String,
        value: f32,
        min: f32,
        max: f32,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AiError>;
