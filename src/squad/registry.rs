//! Arena of live squads keyed by stable id

use ahash::AHashMap;

use crate::core::types::SquadId;
use crate::squad::squad::Squad;

#[derive(Debug, Default)]
pub struct SquadRegistry {
    squads: AHashMap<SquadId, Squad>,
    next_id: u32,
}

impl SquadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_id(&mut self) -> SquadId {
        self.next_id += 1;
        SquadId(self.next_id)
    }

    pub fn insert(&mut self, squad: Squad) {
        self.next_id = self.next_id.max(squad.id.0);
        self.squads.insert(squad.id, squad);
    }

    pub fn remove(&mut self, id: SquadId) -> Option<Squad> {
        self.squads.remove(&id)
    }

    pub fn get(&self, id: SquadId) -> Option<&Squad> {
        self.squads.get(&id)
    }

    pub fn get_mut(&mut self, id: SquadId) -> Option<&mut Squad> {
        self.squads.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.squads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.squads.is_empty()
    }

    pub fn sorted_ids(&self) -> Vec<SquadId> {
        let mut ids: Vec<SquadId> = self.squads.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &Squad> {
        self.squads.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::AgentId;
    use crate::squad::formation::Formation;

    #[test]
    fn test_ids_never_reused() {
        let mut squads = SquadRegistry::new();
        let a = squads.allocate_id();
        squads.insert(Squad::new(a, AgentId(1), &[AgentId(1), AgentId(2)], Formation::Line, 0.0));
        squads.remove(a);
        let b = squads.allocate_id();
        assert_ne!(a, b);
        assert!(squads.is_empty());
    }
}
