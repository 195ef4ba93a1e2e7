//! Per-tick output and running counters

use serde::{Deserialize, Serialize};

use crate::behavior::AgentIntent;
use crate::coordination::{SquadTactic, Volley};
use crate::core::types::{AgentId, SquadId, Tick};
use crate::difficulty::RetuneReport;
use crate::fsm::Transition;
use crate::squad::{Formation, SquadState};

/// One squad's status at the end of a tick
#[derive(Debug, Clone, Serialize)]
pub struct SquadReport {
    pub squad: SquadId,
    pub leader: AgentId,
    pub size: usize,
    pub formation: Formation,
    pub state: SquadState,
    pub tactic: Option<SquadTactic>,
    pub volley: Option<Volley>,
}

/// Everything a tick produced, for the host and for observers
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    pub tick: Tick,
    pub time: f32,
    /// One per live agent, ascending id
    pub intents: Vec<AgentIntent>,
    pub transitions: Vec<Transition>,
    pub squads_formed: Vec<SquadId>,
    pub squads_dissolved: Vec<SquadId>,
    pub squads: Vec<SquadReport>,
    /// Agents killed since the previous tick
    pub casualties: Vec<AgentId>,
    pub retune: Option<RetuneReport>,
    pub difficulty: f32,
}

impl TickReport {
    pub fn attacks(&self) -> usize {
        self.intents.iter().filter(|i| i.attack.is_some()).count()
    }

    pub fn intent(&self, agent: AgentId) -> Option<&AgentIntent> {
        self.intents
            .binary_search_by_key(&agent, |i| i.agent)
            .ok()
            .map(|index| &self.intents[index])
    }
}

/// Recovered runtime faults and lifecycle counts since creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationStats {
    pub ticks: u64,
    pub invalid_transitions: u64,
    pub missing_references: u64,
    pub degenerate_geometry: u64,
    pub behavior_fallbacks: u64,
    pub squads_formed: u64,
    pub squads_dissolved: u64,
    pub casualties: u64,
    pub retunes: u64,
}
