//! One-shot setup on state entry and bookkeeping on state exit

use std::f32::consts::{PI, TAU};

use rand::Rng;

use crate::agent::Agent;
use crate::core::config::StateMachineConfig;
use crate::core::types::{direction, direction_to, rotate, Aabb, Vec2};
use crate::fsm::state::AgentState;

/// Candidate flee bearings tried in order, relative to straight away
const RETREAT_FAN_DEG: [f32; 7] = [0.0, 45.0, -45.0, 90.0, -90.0, 135.0, -135.0];

/// Record the exit and drop state-owned timers
pub fn on_exit(agent: &mut Agent, state: AgentState, now: f32) {
    agent.exit_times.insert(state, now);

    match state {
        AgentState::Combat => {
            // Leaving combat abandons the attack cycle
            agent.attack_cooldown = 0.0;
            agent.suppressing = false;
            agent.scratch.strafe_timer = 0.0;
        }
        AgentState::Search => {
            agent.scratch.search_route.clear();
            agent.scratch.search_index = 0;
        }
        AgentState::Retreat => agent.scratch.retreat_target = None,
        _ => {}
    }
}

/// Prepare state-specific scratch data
pub fn on_enter<R: Rng>(
    agent: &mut Agent,
    state: AgentState,
    threat: Option<Vec2>,
    obstacles: &[Aabb],
    config: &StateMachineConfig,
    rng: &mut R,
) {
    match state {
        AgentState::Patrol => {
            if agent.patrols {
                agent.scratch.patrol_route =
                    generate_patrol_route(agent.spawn_point, obstacles, config, rng);
                agent.scratch.patrol_index = 0;
            }
        }
        AgentState::Retreat => {
            agent.scratch.retreat_target = compute_retreat_target(
                agent.position,
                threat,
                agent.facing,
                config.retreat_distance,
                obstacles,
            );
        }
        AgentState::Search => {
            let center = agent.memory.last_known.unwrap_or(agent.position);
            agent.scratch.search_route =
                generate_search_route(center, config.search_radius, config.search_points);
            agent.scratch.search_index = 0;
        }
        AgentState::Combat => {
            agent.scratch.strafe_timer = 0.0;
        }
        _ => {}
    }
}

/// Closed loop of 3-5 waypoints around `center`
pub fn generate_patrol_route<R: Rng>(
    center: Vec2,
    obstacles: &[Aabb],
    config: &StateMachineConfig,
    rng: &mut R,
) -> Vec<Vec2> {
    // Bounds are validated with the config, but the config is host-mutable
    let waypoints_max = config.patrol_waypoints_max.max(config.patrol_waypoints_min);
    let count = rng.gen_range(config.patrol_waypoints_min..=waypoints_max);
    let radius_min = config.patrol_radius_min.max(0.0);
    let radius_max = config.patrol_radius_max.max(radius_min);
    let start = rng.gen_range(0.0..TAU);
    let step = TAU / count as f32;

    (0..count)
        .map(|i| {
            let angle = start + step * i as f32 + rng.gen_range(-0.2..0.2) * step;
            let mut radius = rng.gen_range(radius_min..=radius_max);
            let mut point = center + direction(angle) * radius;
            // Pull the waypoint inward until it leaves any obstacle
            while radius > 0.0 && obstacles.iter().any(|o| o.contains(point)) {
                radius -= 10.0;
                point = center + direction(angle) * radius.max(0.0);
            }
            point
        })
        .collect()
}

/// Last-known position first, then a ring around it
pub fn generate_search_route(center: Vec2, radius: f32, points: usize) -> Vec<Vec2> {
    let mut route = Vec::with_capacity(points + 1);
    route.push(center);
    for i in 0..points {
        let angle = TAU * i as f32 / points.max(1) as f32;
        route.push(center + direction(angle) * radius);
    }
    route
}

/// Point `distance` away from the threat, fanning out if straight away is blocked
///
/// Without a usable threat bearing the agent flees opposite its facing.
/// Returns `None` if every candidate lands inside an obstacle.
pub fn compute_retreat_target(
    position: Vec2,
    threat: Option<Vec2>,
    facing: f32,
    distance: f32,
    obstacles: &[Aabb],
) -> Option<Vec2> {
    let away = threat
        .and_then(|t| direction_to(t, position))
        .unwrap_or_else(|| direction(facing + PI));

    RETREAT_FAN_DEG
        .iter()
        .map(|deg| position + rotate(away, deg.to_radians()) * distance)
        .find(|candidate| !obstacles.iter().any(|o| o.contains(*candidate)))
}
