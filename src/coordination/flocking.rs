//! Flocking overlay: cohesion, separation and alignment between squad mates

use crate::core::config::CoordinationConfig;
use crate::core::types::{direction_to, AgentId, Vec2};

/// Squad mate as seen by the flocking pass
#[derive(Debug, Clone, Copy)]
pub struct Boid {
    pub id: AgentId,
    pub position: Vec2,
    pub velocity: Vec2,
}

/// Combined flocking force on `me` plus the number of coincident pairs skipped
pub fn flocking_force(me: &Boid, flock: &[Boid], max_speed: f32, config: &CoordinationConfig) -> (Vec2, u32) {
    let mut degenerate = 0;
    let neighbors: Vec<&Boid> = flock
        .iter()
        .filter(|b| b.id != me.id && b.position.distance(me.position) <= config.cohesion_radius)
        .collect();
    if neighbors.is_empty() || max_speed <= 0.0 {
        return (Vec2::ZERO, 0);
    }

    let n = neighbors.len() as f32;
    let center = neighbors.iter().map(|b| b.position).sum::<Vec2>() / n;
    let cohesion = direction_to(me.position, center).map_or(Vec2::ZERO, |d| d * max_speed);

    let mut push = Vec2::ZERO;
    for other in &neighbors {
        let distance = me.position.distance(other.position);
        if distance >= config.separation_radius {
            continue;
        }
        match direction_to(other.position, me.position) {
            Some(away) => push += away * (1.0 - distance / config.separation_radius),
            None => degenerate += 1,
        }
    }
    let separation = push.normalize_or_zero() * max_speed;

    let mean_velocity = neighbors.iter().map(|b| b.velocity).sum::<Vec2>() / n;
    let alignment = (mean_velocity - me.velocity).clamp_length_max(max_speed);

    let force = cohesion * config.cohesion_weight + separation * config.separation_weight + alignment * config.alignment_weight;
    (force, degenerate)
}
