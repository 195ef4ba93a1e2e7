//! Per-state behaviors
//!
//! The executor dispatches on the agent's state and produces an intent:
//! a velocity, a facing and optionally an attack. Movement integration is
//! left to the host.

pub mod combat;
pub mod executor;
pub mod pathing;
pub mod steering;

pub use combat::{find_cover_point, select_combat_tactic, standoff_distance, CombatTactic};
pub use executor::{
    attack_intent, execute, make_attack, AgentIntent, AttackIntent, Behavior, CombatModifiers, ExecutionContext,
    NeighborInfo,
};
pub use pathing::{next_waypoint, DirectPathfinder, Pathfinder};
