//! Agent runtime data

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::agent::archetype::{Archetype, ArchetypeStats};
use crate::core::types::{AgentId, SquadId, Vec2};
use crate::fsm::{AgentState, StateMachine};

/// Memory cell for where the target was last known to be
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetMemory {
    pub last_known: Option<Vec2>,
    /// When `last_known` was last written
    pub updated_at: f32,
    /// When the target was last seen with our own eyes
    pub last_seen_at: Option<f32>,
}

impl TargetMemory {
    /// Visual confirmation
    pub fn record_sighting(&mut self, position: Vec2, now: f32) {
        self.last_known = Some(position);
        self.updated_at = now;
        self.last_seen_at = Some(now);
    }

    /// Position learned without seeing it (sound, pain, ally callout)
    pub fn record_report(&mut self, position: Vec2, now: f32) {
        self.last_known = Some(position);
        self.updated_at = now;
    }

    pub fn seen_within(&self, now: f32, window: f32) -> bool {
        self.last_seen_at.is_some_and(|t| now - t <= window)
    }

    /// Age of the last-known position in seconds
    pub fn age(&self, now: f32) -> Option<f32> {
        self.last_known.map(|_| (now - self.updated_at).max(0.0))
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Most recent damage taken
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HitRecord {
    pub at: f32,
    pub damage: f32,
    pub source: Vec2,
}

/// Role inside a squad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SquadRole {
    Leader,
    Follower,
}

/// Weak back-reference from an agent to its squad
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SquadLink {
    pub squad: SquadId,
    pub role: SquadRole,
    /// Squad-local offset of the assigned formation slot
    pub slot_offset: Vec2,
}

/// Order from the squad's tactic, read by the next decision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SquadDirective {
    pub state: AgentState,
    pub target: Option<Vec2>,
}

/// Behavior-specific working data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BehaviorScratch {
    pub patrol_route: Vec<Vec2>,
    pub patrol_index: usize,
    pub search_route: Vec<Vec2>,
    pub search_index: usize,
    pub retreat_target: Option<Vec2>,
    /// +1 or -1, flips when a strafe run ends
    pub strafe_sign: f32,
    pub strafe_timer: f32,
}

impl BehaviorScratch {
    pub fn search_exhausted(&self) -> bool {
        !self.search_route.is_empty() && self.search_index >= self.search_route.len()
    }
}

/// One non-player combatant
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: AgentId,
    pub archetype: Archetype,
    /// Stats after spawn-time difficulty scaling
    pub stats: ArchetypeStats,
    pub position: Vec2,
    /// Radians, counter-clockwise from +x
    pub facing: f32,
    pub velocity: Vec2,
    pub health: f32,
    pub spawn_point: Vec2,
    /// Whether the agent walks a patrol loop when calm
    pub patrols: bool,
    pub machine: StateMachine,
    /// 0..1 awareness of the player
    pub alert_level: f32,
    pub memory: TargetMemory,
    /// Seconds until the next attack is allowed
    pub attack_cooldown: f32,
    pub last_hit: Option<HitRecord>,
    pub scratch: BehaviorScratch,
    pub squad: Option<SquadLink>,
    pub directive: Option<SquadDirective>,
    /// Laying suppressive fire this tick
    pub suppressing: bool,
    /// When each state was last left
    pub exit_times: AHashMap<AgentState, f32>,
}

impl Agent {
    pub fn new(
        id: AgentId,
        archetype: Archetype,
        stats: ArchetypeStats,
        position: Vec2,
        facing: f32,
        now: f32,
    ) -> Self {
        let initial = if archetype.is_support_role() {
            AgentState::Support
        } else {
            AgentState::Idle
        };

        Self {
            id,
            archetype,
            stats,
            position,
            facing,
            velocity: Vec2::ZERO,
            health: stats.max_health,
            spawn_point: position,
            patrols: archetype != Archetype::Sniper,
            machine: StateMachine::new(initial, now),
            alert_level: 0.0,
            memory: TargetMemory::default(),
            attack_cooldown: 0.0,
            last_hit: None,
            scratch: BehaviorScratch {
                strafe_sign: 1.0,
                ..Default::default()
            },
            squad: None,
            directive: None,
            suppressing: false,
            exit_times: AHashMap::new(),
        }
    }

    pub fn state(&self) -> AgentState {
        self.machine.state()
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    /// Current health over max health, clamped to [0, 1]
    pub fn health_ratio(&self) -> f32 {
        if self.stats.max_health <= 0.0 {
            return 0.0;
        }
        (self.health / self.stats.max_health).clamp(0.0, 1.0)
    }

    pub fn squad_id(&self) -> Option<SquadId> {
        self.squad.map(|link| link.squad)
    }

    pub fn is_leader(&self) -> bool {
        matches!(self.squad, Some(SquadLink { role: SquadRole::Leader, .. }))
    }

    /// Drop squad linkage and any standing squad orders
    pub fn leave_squad(&mut self) {
        self.squad = None;
        self.directive = None;
        self.suppressing = false;
    }
}
