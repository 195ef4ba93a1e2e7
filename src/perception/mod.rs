//! Perception system - what an agent senses of the player each tick
//!
//! Three channels feed the alert level and the last-known-position memory:
//! - vision: range scaled by alert, a cone around facing, unobstructed line
//! - hearing: player movement and weapon fire nearby
//! - pain: a recent hit forces full alert and reveals the attacker
//!
//! Allies with a fresh sighting also call it out to agents nearby.

use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::core::config::PerceptionConfig;
use crate::core::types::{angle_diff, heading, line_of_sight, Aabb, AgentId, Vec2};

/// Player state as reported by the host each tick
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PlayerState {
    pub position: Vec2,
    pub velocity: Vec2,
    pub health_ratio: f32,
    pub is_moving: bool,
    pub is_firing: bool,
}

/// What an ally can share with its neighbours
#[derive(Debug, Clone, Copy)]
pub struct AllyReport {
    pub id: AgentId,
    pub position: Vec2,
    pub last_known: Option<Vec2>,
    pub last_seen_at: Option<f32>,
}

impl AllyReport {
    pub fn from_agent(agent: &Agent) -> Self {
        Self {
            id: agent.id,
            position: agent.position,
            last_known: agent.memory.last_known,
            last_seen_at: agent.memory.last_seen_at,
        }
    }
}

/// Which channels fired this tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stimuli {
    pub heard_movement: bool,
    pub heard_fire: bool,
    pub in_pain: bool,
    pub ally_callout: bool,
}

impl Stimuli {
    pub fn any(&self) -> bool {
        self.heard_movement || self.heard_fire || self.in_pain || self.ally_callout
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PerceptionResult {
    pub can_see_player: bool,
    /// Change to apply to the alert level (already keeps it inside [0, 1])
    pub alert_level_delta: f32,
    /// New last-known position, if any channel revealed one
    pub last_known_position: Option<Vec2>,
    pub stimuli: Stimuli,
}

/// Vision range scaled by current alert
pub fn vision_range(agent: &Agent, config: &PerceptionConfig) -> f32 {
    let alert = agent.alert_level.clamp(0.0, 1.0);
    agent.stats.vision_range * (config.vision_base_factor + config.vision_alert_factor * alert)
}

/// Range, cone and line-of-sight check
pub fn can_see(agent: &Agent, target: Vec2, obstacles: &[Aabb], config: &PerceptionConfig) -> bool {
    let offset = target - agent.position;
    if offset.length() > vision_range(agent, config) {
        return false;
    }

    // Standing on the target: no bearing, but nothing to block either
    let Some(bearing) = heading(offset) else {
        return true;
    };

    if angle_diff(agent.facing, bearing) > config.vision_half_angle_deg.to_radians() {
        return false;
    }

    line_of_sight(agent.position, target, obstacles)
}

/// Sense the player for one tick
pub fn sense(
    agent: &Agent,
    player: &PlayerState,
    allies: &[AllyReport],
    obstacles: &[Aabb],
    now: f32,
    dt: f32,
    config: &PerceptionConfig,
) -> PerceptionResult {
    let dt = dt.max(0.0);
    let alert = agent.alert_level.clamp(0.0, 1.0);
    let distance = agent.position.distance(player.position);

    let mut result = PerceptionResult::default();
    let mut raw_delta = 0.0;

    if can_see(agent, player.position, obstacles, config) {
        result.can_see_player = true;
        result.last_known_position = Some(player.position);
        raw_delta += dt / config.alert_rise_time;
    } else {
        if player.is_moving && distance <= config.movement_hearing_range {
            result.stimuli.heard_movement = true;
            raw_delta += config.movement_hearing_rate * dt;
        }
        if player.is_firing && distance <= config.fire_hearing_range {
            result.stimuli.heard_fire = true;
            result.last_known_position = Some(player.position);
            raw_delta += config.fire_hearing_rate * dt;
        }
        if let Some(callout) = freshest_callout(agent, allies, now, config) {
            result.stimuli.ally_callout = true;
            result.last_known_position.get_or_insert(callout);
            raw_delta += config.callout_rate * dt;
        }
        if !result.stimuli.any() {
            raw_delta -= dt / config.alert_decay_time;
        }
    }

    if let Some(hit) = agent.last_hit {
        if now - hit.at <= config.pain_window {
            result.stimuli.in_pain = true;
            // The attacker is the player; reveal where they are now
            result.last_known_position = Some(player.position);
            raw_delta = 1.0 - alert;
        }
    }

    result.alert_level_delta = (alert + raw_delta).clamp(0.0, 1.0) - alert;
    result
}

/// Write a perception result into the agent's alert level and memory
pub fn apply_perception(agent: &mut Agent, result: &PerceptionResult, now: f32) {
    agent.alert_level = (agent.alert_level + result.alert_level_delta).clamp(0.0, 1.0);

    match (result.can_see_player, result.last_known_position) {
        (true, Some(position)) => agent.memory.record_sighting(position, now),
        (false, Some(position)) => agent.memory.record_report(position, now),
        _ => {}
    }
}

fn freshest_callout(
    agent: &Agent,
    allies: &[AllyReport],
    now: f32,
    config: &PerceptionConfig,
) -> Option<Vec2> {
    allies
        .iter()
        .filter(|ally| ally.id != agent.id)
        .filter(|ally| ally.position.distance(agent.position) <= config.callout_radius)
        .filter_map(|ally| {
            let seen_at = ally.last_seen_at?;
            let position = ally.last_known?;
            (now - seen_at <= config.callout_freshness).then_some((seen_at, position))
        })
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, position)| position)
}
