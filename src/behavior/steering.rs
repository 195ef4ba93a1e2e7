//! Steering helpers
//!
//! All helpers return velocities, never positions, so the host's movement
//! integration stays authoritative. Zero-length directions contribute
//! nothing instead of producing NaN.

use crate::core::types::{Aabb, Vec2};

/// Move toward a target at the given speed
pub fn seek(current: Vec2, target: Vec2, speed: f32) -> Vec2 {
    if speed <= 0.0 {
        return Vec2::ZERO;
    }
    (target - current).normalize_or_zero() * speed
}

/// Move away from a point at the given speed
pub fn flee(current: Vec2, threat: Vec2, speed: f32) -> Vec2 {
    -seek(current, threat, speed)
}

/// Seek that slows inside `slowing_distance` and stops within `tolerance`
pub fn arrive(current: Vec2, target: Vec2, max_speed: f32, slowing_distance: f32, tolerance: f32) -> Vec2 {
    let to_target = target - current;
    let distance = to_target.length();
    if max_speed <= 0.0 || distance <= tolerance {
        return Vec2::ZERO;
    }

    let speed = if slowing_distance > 0.0 {
        max_speed * (distance / slowing_distance).clamp(0.0, 1.0)
    } else {
        max_speed
    };
    to_target / distance * speed
}

/// Chase a moving target by leading it
pub fn pursuit(current: Vec2, target: Vec2, target_velocity: Vec2, speed: f32, max_lookahead: f32) -> Vec2 {
    if speed <= 0.0 {
        return Vec2::ZERO;
    }
    let distance = current.distance(target);
    let lookahead = (distance / speed).min(max_lookahead.max(0.0));
    seek(current, target + target_velocity * lookahead, speed)
}

/// Hold a ring of radius `standoff` around `target`
///
/// Positive output closes distance, negative opens it; inside `tolerance`
/// of the ring the radial speed is zero.
pub fn hold_range(current: Vec2, target: Vec2, standoff: f32, speed: f32, tolerance: f32) -> Vec2 {
    let distance = current.distance(target);
    let error = distance - standoff;
    if error.abs() <= tolerance {
        return Vec2::ZERO;
    }
    let toward = seek(current, target, speed);
    if error > 0.0 {
        toward
    } else {
        -toward
    }
}

/// Push out of obstacles the agent is about to walk into
pub fn avoid_obstacles(position: Vec2, velocity: Vec2, obstacles: &[Aabb], margin: f32, lookahead: f32) -> Vec2 {
    let ahead = position + velocity * lookahead;
    let mut force = Vec2::ZERO;

    for obstacle in obstacles {
        let padded = obstacle.expanded(margin);
        if !padded.contains(ahead) && !padded.contains(position) {
            continue;
        }
        let closest = obstacle.closest_point(position);
        let away = (position - closest)
            .try_normalize()
            .or_else(|| (position - obstacle.center()).try_normalize());
        if let Some(away) = away {
            force += away * velocity.length().max(1.0);
        }
    }

    force
}
