//! Sparse hash grid for neighbor queries

use ahash::AHashMap;

use crate::core::types::{AgentId, Vec2};

/// Uniform grid keyed by cell coordinate; only occupied cells are stored
pub struct SparseHashGrid {
    cell_size: f32,
    cells: AHashMap<(i32, i32), Vec<(AgentId, Vec2)>>,
}

impl SparseHashGrid {
    /// `cell_size` should be at least the largest query radius
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(1.0),
            cells: AHashMap::new(),
        }
    }

    #[inline]
    fn cell_coord(&self, pos: Vec2) -> (i32, i32) {
        (
            (pos.x / self.cell_size).floor() as i32,
            (pos.y / self.cell_size).floor() as i32,
        )
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn insert(&mut self, agent: AgentId, pos: Vec2) {
        let coord = self.cell_coord(pos);
        self.cells.entry(coord).or_default().push((agent, pos));
    }

    pub fn remove(&mut self, agent: AgentId, pos: Vec2) {
        let coord = self.cell_coord(pos);
        if let Some(cell) = self.cells.get_mut(&coord) {
            cell.retain(|&(a, _)| a != agent);
        }
    }

    /// Everything in the 3x3 block of cells around `pos`
    pub fn query_neighbors(&self, pos: Vec2) -> impl Iterator<Item = (AgentId, Vec2)> + '_ {
        let (cx, cy) = self.cell_coord(pos);

        (-1..=1).flat_map(move |dx| {
            (-1..=1).flat_map(move |dy| self.cells.get(&(cx + dx, cy + dy)).into_iter().flatten().copied())
        })
    }

    /// Agents within `radius` of `center`, nearest first (ties by id)
    pub fn query_radius(&self, center: Vec2, radius: f32) -> Vec<(AgentId, f32)> {
        let mut found: Vec<(AgentId, f32)> = if radius <= self.cell_size {
            self.query_neighbors(center)
                .map(|(agent, pos)| (agent, center.distance(pos)))
                .filter(|&(_, d)| d <= radius)
                .collect()
        } else {
            self.cells
                .values()
                .flatten()
                .map(|&(agent, pos)| (agent, center.distance(pos)))
                .filter(|&(_, d)| d <= radius)
                .collect()
        };
        found.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        found
    }

    /// Rebuild grid from positions
    pub fn rebuild(&mut self, agents: impl Iterator<Item = (AgentId, Vec2)>) {
        self.clear();
        for (agent, pos) in agents {
            self.insert(agent, pos);
        }
    }
}
