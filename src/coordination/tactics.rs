//! Squad tactic selection and tactic geometry

use serde::{Deserialize, Serialize};

use crate::core::config::CoordinationConfig;
use crate::core::types::{direction, direction_to, rotate, Vec2};
use crate::squad::Squad;

/// Squad-level coordinated action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SquadTactic {
    SynchronizedAttack,
    FlankingManeuver,
    CoverAndAdvance,
    TacticalRetreat,
}

impl SquadTactic {
    pub fn label(self) -> &'static str {
        match self {
            SquadTactic::SynchronizedAttack => "synchronized_attack",
            SquadTactic::FlankingManeuver => "flanking_maneuver",
            SquadTactic::CoverAndAdvance => "cover_and_advance",
            SquadTactic::TacticalRetreat => "tactical_retreat",
        }
    }
}

/// First applicable tactic, or `None` when the squad is too small for any
pub fn select_tactic(squad: &Squad, target: Vec2, config: &CoordinationConfig) -> Option<SquadTactic> {
    let size = squad.size();
    let distance = squad.centroid.distance(target);

    if squad.health < config.retreat_health {
        Some(SquadTactic::TacticalRetreat)
    } else if distance < config.sync_attack_distance && size >= config.sync_attack_min_size {
        Some(SquadTactic::SynchronizedAttack)
    } else if distance < config.flank_distance && size >= config.flank_min_size {
        Some(SquadTactic::FlankingManeuver)
    } else if size >= config.cover_advance_min_size {
        Some(SquadTactic::CoverAndAdvance)
    } else {
        None
    }
}

/// Bearing from the target toward the squad, falling back to `fallback_facing`
pub fn away_bearing(centroid: Vec2, target: Vec2, fallback_facing: f32) -> Vec2 {
    direction_to(target, centroid).unwrap_or_else(|| -direction(fallback_facing))
}

/// The two flank points, left then right, at `flank_angle` either side of
/// the target-to-squad bearing
pub fn flank_points(centroid: Vec2, target: Vec2, fallback_facing: f32, config: &CoordinationConfig) -> [Vec2; 2] {
    let bearing = away_bearing(centroid, target, fallback_facing);
    let angle = config.flank_angle_deg.to_radians();
    [
        target + rotate(bearing, angle) * config.flank_radius,
        target + rotate(bearing, -angle) * config.flank_radius,
    ]
}

/// Which flank a member goes to: first half left, second half right
pub fn flank_side(index: usize, size: usize) -> usize {
    if index < size.div_ceil(2) {
        0
    } else {
        1
    }
}

/// Is the member at `index` covering (vs advancing) right now?
///
/// Roles alternate by index and swap every `cover_swap_interval` seconds.
pub fn is_covering(index: usize, elapsed: f32, config: &CoordinationConfig) -> bool {
    let phase = if config.cover_swap_interval > 0.0 {
        (elapsed.max(0.0) / config.cover_swap_interval).floor() as usize
    } else {
        0
    };
    (index + phase) % 2 == 0
}

/// Per-member retreat destination along the away bearing with angular spread
pub fn retreat_point(
    position: Vec2,
    bearing: Vec2,
    index: usize,
    size: usize,
    config: &CoordinationConfig,
) -> Vec2 {
    let centered = index as f32 - (size.saturating_sub(1)) as f32 / 2.0;
    let spread = (centered * config.retreat_spread_deg).to_radians();
    position + rotate(bearing, spread) * config.retreat_distance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AgentId, SquadId};
    use crate::squad::Formation;

    fn squad(size: u32, health: f32) -> Squad {
        let members: Vec<AgentId> = (1..=size).map(AgentId).collect();
        let mut squad = Squad::new(SquadId(1), AgentId(1), &members, Formation::Line, 0.0);
        squad.health = health;
        squad
    }

    #[test]
    fn test_tactic_priority() {
        let config = CoordinationConfig::default();
        let target = Vec2::new(80.0, 0.0);
        assert_eq!(select_tactic(&squad(4, 1.0), target, &config), Some(SquadTactic::SynchronizedAttack));
        assert_eq!(
            select_tactic(&squad(4, 1.0), Vec2::new(150.0, 0.0), &config),
            Some(SquadTactic::FlankingManeuver)
        );
        assert_eq!(
            select_tactic(&squad(3, 1.0), Vec2::new(150.0, 0.0), &config),
            Some(SquadTactic::CoverAndAdvance)
        );
        // Too small to sync: falls through to cover-and-advance
        assert_eq!(select_tactic(&squad(2, 1.0), target, &config), Some(SquadTactic::CoverAndAdvance));
    }

    #[test]
    fn test_low_health_overrides_sync_distance() {
        let config = CoordinationConfig::default();
        assert_eq!(
            select_tactic(&squad(4, 0.35), Vec2::new(50.0, 0.0), &config),
            Some(SquadTactic::TacticalRetreat)
        );
    }

    #[test]
    fn test_flank_points_symmetric() {
        let config = CoordinationConfig::default();
        let target = Vec2::ZERO;
        let [left, right] = flank_points(Vec2::new(-200.0, 0.0), target, 0.0, &config);
        assert!((left.length() - 120.0).abs() < 1e-3);
        assert!((right.length() - 120.0).abs() < 1e-3);
        assert!((left.y + right.y).abs() < 1e-3);
        assert!((left.x - right.x).abs() < 1e-3);
        // 60 degrees off the bearing toward the squad (-x)
        assert!((left.x + 60.0).abs() < 1e-2);
    }

    #[test]
    fn test_flank_sides_split_in_half() {
        let sides: Vec<usize> = (0..5).map(|i| flank_side(i, 5)).collect();
        assert_eq!(sides, vec![0, 0, 0, 1, 1]);
    }

    #[test]
    fn test_cover_roles_swap() {
        let config = CoordinationConfig::default();
        assert!(is_covering(0, 0.0, &config));
        assert!(!is_covering(1, 0.0, &config));
        assert!(!is_covering(0, 3.5, &config));
        assert!(is_covering(1, 3.5, &config));
    }

    #[test]
    fn test_retreat_points_fan_out() {
        let config = CoordinationConfig::default();
        let a = retreat_point(Vec2::ZERO, Vec2::X, 0, 3, &config);
        let b = retreat_point(Vec2::ZERO, Vec2::X, 1, 3, &config);
        let c = retreat_point(Vec2::ZERO, Vec2::X, 2, 3, &config);
        assert!((b - Vec2::new(250.0, 0.0)).length() < 1e-3);
        assert!(a.y < 0.0 && c.y > 0.0);
        assert!((a.y + c.y).abs() < 1e-3);
    }

    #[test]
    fn test_away_bearing_degenerate_uses_facing() {
        let bearing = away_bearing(Vec2::ONE, Vec2::ONE, 0.0);
        assert!((bearing - Vec2::new(-1.0, 0.0)).length() < 1e-5);
    }
}
