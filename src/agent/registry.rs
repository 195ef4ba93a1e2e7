//! Arena of live agents keyed by stable id

use ahash::AHashMap;

use crate::agent::runtime::Agent;
use crate::core::types::AgentId;

#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: AHashMap<AgentId, Agent>,
    next_id: u32,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next id
    pub fn allocate_id(&mut self) -> AgentId {
        self.next_id += 1;
        AgentId(self.next_id)
    }

    pub fn insert(&mut self, agent: Agent) {
        self.next_id = self.next_id.max(agent.id.0);
        self.agents.insert(agent.id, agent);
    }

    pub fn remove(&mut self, id: AgentId) -> Option<Agent> {
        self.agents.remove(&id)
    }

    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Ids in ascending order, so every pass visits agents deterministically
    pub fn sorted_ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.agents.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Agent> {
        self.agents.values_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::archetype::Archetype;
    use crate::core::types::Vec2;

    #[test]
    fn test_ids_are_unique_and_sorted() {
        let mut registry = AgentRegistry::new();
        for _ in 0..5 {
            let id = registry.allocate_id();
            registry.insert(Agent::new(
                id,
                Archetype::Grunt,
                Archetype::Grunt.stats(),
                Vec2::ZERO,
                0.0,
                0.0,
            ));
        }
        let ids = registry.sorted_ids();
        assert_eq!(ids.len(), 5);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));

        registry.remove(ids[2]);
        assert!(!registry.contains(ids[2]));
        // Removed ids are never reused
        assert!(registry.allocate_id() > ids[4]);
    }
}
