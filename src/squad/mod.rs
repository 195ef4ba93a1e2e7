//! Squads - dynamic groups sharing a formation
//!
//! Clustering seeds squads out of nearby ungrouped agents, the leader is
//! elected once at formation time, and a squad that loses its leader or
//! drops below minimum size is dissolved in the same pass. Members can
//! re-form right away.

pub mod formation;
pub mod grouping;
pub mod registry;
pub mod squad;

pub use formation::{select_formation, Formation, FormationSlot, SlotRole};
pub use grouping::{
    assign_slots, compute_slot_targets, detach_member, dissolve_invalid, dissolve_squad, elect_leader,
    form_squads, slot_steering, DissolveOutcome,
};
pub use registry::SquadRegistry;
pub use squad::{Squad, SquadState};
