//! Tactical sub-selection inside the Combat state

use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::core::config::BehaviorConfig;
use crate::core::types::{direction_to, Aabb, Vec2};

/// How an agent fights while in Combat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatTactic {
    DirectAttack,
    StrafingAttack,
    CoverSeekingAttack,
    FightingRetreat,
}

impl CombatTactic {
    pub fn label(self) -> &'static str {
        match self {
            CombatTactic::DirectAttack => "direct_attack",
            CombatTactic::StrafingAttack => "strafing_attack",
            CombatTactic::CoverSeekingAttack => "cover_seeking_attack",
            CombatTactic::FightingRetreat => "fighting_retreat",
        }
    }
}

/// Pick the combat sub-behavior (first match wins)
pub fn select_combat_tactic(
    health_ratio: f32,
    nearby_allies: usize,
    distance: f32,
    config: &BehaviorConfig,
) -> CombatTactic {
    if health_ratio < config.fighting_retreat_health {
        CombatTactic::FightingRetreat
    } else if nearby_allies >= config.cover_ally_count {
        CombatTactic::CoverSeekingAttack
    } else if distance > config.direct_attack_distance {
        CombatTactic::DirectAttack
    } else {
        CombatTactic::StrafingAttack
    }
}

/// Preferred distance to the target; melee agents close to contact
pub fn standoff_distance(agent: &Agent, config: &BehaviorConfig) -> f32 {
    if agent.archetype.is_melee() {
        0.0
    } else {
        agent.stats.attack_range * config.standoff_factor
    }
}

/// Spot behind the nearest obstacle, on the side away from the threat
pub fn find_cover_point(position: Vec2, threat: Vec2, obstacles: &[Aabb], config: &BehaviorConfig) -> Option<Vec2> {
    obstacles
        .iter()
        .filter(|o| o.closest_point(position).distance(position) <= config.cover_search_radius)
        .min_by(|a, b| {
            let da = a.closest_point(position).distance_squared(position);
            let db = b.closest_point(position).distance_squared(position);
            da.total_cmp(&db)
        })
        .and_then(|obstacle| {
            let center = obstacle.center();
            let away = direction_to(threat, center)?;
            let half = (obstacle.max - obstacle.min) * 0.5;
            Some(center + away * (half.length() + config.avoidance_margin))
        })
}
