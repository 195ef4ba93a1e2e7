//! Agents - the non-player combatants under AI control

pub mod archetype;
pub mod registry;
pub mod runtime;

pub use archetype::{Archetype, ArchetypeStats};
pub use registry::AgentRegistry;
pub use runtime::{
    Agent, BehaviorScratch, HitRecord, SquadDirective, SquadLink, SquadRole, TargetMemory,
};
