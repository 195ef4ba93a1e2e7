//! Path-finding contract
//!
//! The decision core only needs "give me waypoints from A to B". Hosts with
//! a navmesh or flow field plug in their own implementation.

use crate::core::types::{Aabb, Vec2};

pub trait Pathfinder {
    /// Waypoints from `from` to `to`, inclusive of both ends
    fn find_path(&self, from: Vec2, to: Vec2, obstacles: &[Aabb]) -> Vec<Vec2>;
}

/// Straight line; obstacle avoidance steering handles the rest
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectPathfinder;

impl Pathfinder for DirectPathfinder {
    fn find_path(&self, from: Vec2, to: Vec2, _obstacles: &[Aabb]) -> Vec<Vec2> {
        vec![from, to]
    }
}

/// Next point to steer at along a path, or `to` if the path is degenerate
pub fn next_waypoint(pathfinder: &dyn Pathfinder, from: Vec2, to: Vec2, obstacles: &[Aabb]) -> Vec2 {
    pathfinder
        .find_path(from, to, obstacles)
        .into_iter()
        .nth(1)
        .unwrap_or(to)
}
