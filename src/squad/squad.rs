//! Squad data and per-tick metrics

use serde::{Deserialize, Serialize};

use crate::agent::AgentRegistry;
use crate::coordination::SquadTactic;
use crate::core::types::{AgentId, SquadId, Vec2};
use crate::fsm::AgentState;
use crate::squad::formation::Formation;

/// Coarse lifecycle of a squad, derived from its members each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SquadState {
    Forming,
    Patrol,
    Approach,
    Combat,
    Retreat,
}

/// A bounded group of agents sharing a formation and a tactic
///
/// The squad owns its member list only; agents live in the agent registry
/// and point back here by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Squad {
    pub id: SquadId,
    /// Leader first, then ascending id; index is the formation slot
    members: Vec<AgentId>,
    leader: AgentId,
    pub formation: Formation,
    /// Set by `override_formation`; composition changes keep it
    pub formation_locked: bool,
    pub tactic: Option<SquadTactic>,
    /// When the current tactic was chosen
    pub tactic_since: f32,
    pub state: SquadState,
    pub centroid: Vec2,
    /// Mean member health ratio
    pub health: f32,
    pub cohesion: f32,
    pub effectiveness: f32,
    pub created_at: f32,
}

impl Squad {
    /// `members` must contain `leader`
    pub fn new(id: SquadId, leader: AgentId, members: &[AgentId], formation: Formation, now: f32) -> Self {
        let mut squad = Self {
            id,
            members: Vec::with_capacity(members.len()),
            leader,
            formation,
            formation_locked: false,
            tactic: None,
            tactic_since: now,
            state: SquadState::Forming,
            centroid: Vec2::ZERO,
            health: 1.0,
            cohesion: 1.0,
            effectiveness: 0.0,
            created_at: now,
        };
        squad.set_members(members);
        squad
    }

    fn set_members(&mut self, members: &[AgentId]) {
        let mut followers: Vec<AgentId> = members.iter().copied().filter(|&m| m != self.leader).collect();
        followers.sort();
        followers.dedup();
        self.members.clear();
        self.members.push(self.leader);
        self.members.extend(followers);
    }

    pub fn members(&self) -> &[AgentId] {
        &self.members
    }

    pub fn leader(&self) -> AgentId {
        self.leader
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, agent: AgentId) -> bool {
        self.members.contains(&agent)
    }

    /// Formation slot index of a member
    pub fn slot_index(&self, agent: AgentId) -> Option<usize> {
        self.members.iter().position(|&m| m == agent)
    }

    /// Drop a member; returns whether it was present
    ///
    /// Removing the leader leaves the squad leaderless until the next
    /// dissolution pass breaks it up.
    pub fn remove_member(&mut self, agent: AgentId) -> bool {
        let before = self.members.len();
        self.members.retain(|&m| m != agent);
        before != self.members.len()
    }

    pub fn has_leader(&self) -> bool {
        self.members.first() == Some(&self.leader)
    }

    /// Force a formation (e.g. Circle when surrounded); sticks until cleared
    pub fn override_formation(&mut self, formation: Formation) {
        self.formation = formation;
        self.formation_locked = true;
    }

    pub fn clear_formation_override(&mut self) {
        self.formation_locked = false;
    }

    /// Switch tactic, remembering when it started
    pub fn set_tactic(&mut self, tactic: SquadTactic, now: f32) {
        if self.tactic != Some(tactic) {
            self.tactic = Some(tactic);
            self.tactic_since = now;
        }
    }

    /// Recompute centroid, health, cohesion, effectiveness and lifecycle
    pub fn refresh_metrics(&mut self, agents: &AgentRegistry, formation_distance: f32) {
        let live: Vec<_> = self
            .members
            .iter()
            .filter_map(|&id| agents.get(id))
            .filter(|a| a.is_alive())
            .collect();
        if live.is_empty() {
            self.health = 0.0;
            self.cohesion = 0.0;
            self.effectiveness = 0.0;
            return;
        }

        let n = live.len() as f32;
        self.centroid = live.iter().map(|a| a.position).sum::<Vec2>() / n;
        self.health = live.iter().map(|a| a.health_ratio()).sum::<f32>() / n;

        let spread = live.iter().map(|a| a.position.distance(self.centroid)).sum::<f32>() / n;
        self.cohesion = if formation_distance > 0.0 {
            (1.0 - spread / formation_distance).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let engaged = live.iter().filter(|a| a.state().is_engaged()).count() as f32 / n;
        self.effectiveness = self.health * self.cohesion * engaged;

        let retreating = live
            .iter()
            .filter(|a| matches!(a.state(), AgentState::Retreat | AgentState::Regroup))
            .count() as f32
            / n;
        let approaching = live.iter().any(|a| {
            matches!(a.state(), AgentState::Alert | AgentState::Investigate | AgentState::Chase | AgentState::Search)
        });
        let fighting = live
            .iter()
            .any(|a| matches!(a.state(), AgentState::Combat | AgentState::Flank | AgentState::Cover));

        self.state = if self.tactic == Some(SquadTactic::TacticalRetreat) || retreating > 0.5 {
            SquadState::Retreat
        } else if fighting {
            SquadState::Combat
        } else if approaching {
            SquadState::Approach
        } else if self.cohesion < 0.5 {
            SquadState::Forming
        } else {
            SquadState::Patrol
        };
    }

    /// Freshest last-known target position among live members, ignoring
    /// anything older than `max_age` seconds
    pub fn shared_target(&self, agents: &AgentRegistry, now: f32, max_age: f32) -> Option<Vec2> {
        self.members
            .iter()
            .filter_map(|&id| agents.get(id))
            .filter(|a| a.is_alive())
            .filter(|a| a.memory.age(now).is_some_and(|age| age <= max_age))
            .filter_map(|a| a.memory.last_known.map(|p| (p, a.memory.updated_at)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(p, _)| p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, Archetype};

    fn registry_with(positions: &[(u32, Vec2)]) -> AgentRegistry {
        let mut agents = AgentRegistry::new();
        for &(id, pos) in positions {
            agents.insert(Agent::new(AgentId(id), Archetype::Grunt, Archetype::Grunt.stats(), pos, 0.0, 0.0));
        }
        agents
    }

    #[test]
    fn test_leader_is_first_member() {
        let squad = Squad::new(SquadId(1), AgentId(5), &[AgentId(3), AgentId(5), AgentId(1)], Formation::Line, 0.0);
        assert_eq!(squad.members(), &[AgentId(5), AgentId(1), AgentId(3)]);
        assert_eq!(squad.slot_index(AgentId(3)), Some(2));
        assert!(squad.has_leader());
    }

    #[test]
    fn test_removing_leader_leaves_squad_leaderless() {
        let mut squad = Squad::new(SquadId(1), AgentId(1), &[AgentId(1), AgentId(2), AgentId(3)], Formation::Line, 0.0);
        assert!(squad.remove_member(AgentId(1)));
        assert!(!squad.has_leader());
        assert!(!squad.remove_member(AgentId(9)));
    }

    #[test]
    fn test_metrics_from_members() {
        let agents = registry_with(&[(1, Vec2::new(-10.0, 0.0)), (2, Vec2::new(10.0, 0.0))]);
        let mut squad = Squad::new(SquadId(1), AgentId(1), &[AgentId(1), AgentId(2)], Formation::Line, 0.0);
        squad.refresh_metrics(&agents, 100.0);

        assert_eq!(squad.centroid, Vec2::ZERO);
        assert_eq!(squad.health, 1.0);
        assert!((squad.cohesion - 0.9).abs() < 1e-5);
        // Nobody engaged
        assert_eq!(squad.effectiveness, 0.0);
        assert_eq!(squad.state, SquadState::Patrol);
    }

    #[test]
    fn test_shared_target_prefers_freshest() {
        let mut agents = registry_with(&[(1, Vec2::ZERO), (2, Vec2::ONE)]);
        agents.get_mut(AgentId(1)).unwrap().memory.record_report(Vec2::new(100.0, 0.0), 1.0);
        agents.get_mut(AgentId(2)).unwrap().memory.record_sighting(Vec2::new(120.0, 0.0), 2.0);
        let squad = Squad::new(SquadId(1), AgentId(1), &[AgentId(1), AgentId(2)], Formation::Line, 0.0);

        assert_eq!(squad.shared_target(&agents, 3.0, 10.0), Some(Vec2::new(120.0, 0.0)));
        assert_eq!(squad.shared_target(&agents, 30.0, 10.0), None);
    }

    #[test]
    fn test_override_formation_locks() {
        let mut squad = Squad::new(SquadId(1), AgentId(1), &[AgentId(1), AgentId(2)], Formation::Line, 0.0);
        squad.override_formation(Formation::Circle);
        assert_eq!(squad.formation, Formation::Circle);
        assert!(squad.formation_locked);
        squad.clear_formation_override();
        assert!(!squad.formation_locked);
    }

    #[test]
    fn test_tactic_since_only_moves_on_change() {
        let mut squad = Squad::new(SquadId(1), AgentId(1), &[AgentId(1), AgentId(2)], Formation::Line, 0.0);
        squad.set_tactic(SquadTactic::CoverAndAdvance, 1.0);
        squad.set_tactic(SquadTactic::CoverAndAdvance, 4.0);
        assert_eq!(squad.tactic_since, 1.0);
        squad.set_tactic(SquadTactic::TacticalRetreat, 5.0);
        assert_eq!(squad.tactic_since, 5.0);
    }
}
