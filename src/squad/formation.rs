//! Formation layout computation
//!
//! Each formation maps a member count to slot offsets in squad-local space:
//! +x points at the target, +y to the squad's left. Offsets are centered on
//! their mean so the squad centroid sits in the middle of the shape. Slot 0
//! belongs to the leader.

use serde::{Deserialize, Serialize};

use crate::agent::Archetype;
use crate::core::types::{rotate, Vec2};

/// Named geometric layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Formation {
    Line,
    Wedge,
    Circle,
    Diamond,
    Phalanx,
}

/// What a slot is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotRole {
    Front,
    Flank,
    Center,
    Rear,
}

/// A slot in squad-local space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FormationSlot {
    pub offset: Vec2,
    pub role: SlotRole,
}

impl Formation {
    pub fn label(self) -> &'static str {
        match self {
            Formation::Line => "line",
            Formation::Wedge => "wedge",
            Formation::Circle => "circle",
            Formation::Diamond => "diamond",
            Formation::Phalanx => "phalanx",
        }
    }

    /// Slot layout for `count` members with `spacing` between neighbors
    pub fn positions(self, count: usize, spacing: f32) -> Vec<FormationSlot> {
        if count == 0 {
            return Vec::new();
        }

        let mut slots: Vec<FormationSlot> = (0..count)
            .map(|i| match self {
                Formation::Line => line_slot(i, spacing),
                Formation::Wedge => wedge_slot(i, spacing),
                Formation::Circle => circle_slot(i, count, spacing),
                Formation::Diamond => diamond_slot(i, spacing),
                Formation::Phalanx => phalanx_slot(i, count, spacing),
            })
            .collect();

        let mean = slots.iter().map(|s| s.offset).sum::<Vec2>() / count as f32;
        for slot in &mut slots {
            slot.offset -= mean;
        }
        slots
    }
}

fn line_slot(i: usize, spacing: f32) -> FormationSlot {
    // 0, +1, -1, +2, -2, ... spreading out from the leader
    let rank = ((i + 1) / 2) as f32;
    let side = if i % 2 == 1 { 1.0 } else { -1.0 };
    FormationSlot {
        offset: Vec2::new(0.0, side * rank * spacing),
        role: if i == 0 { SlotRole::Front } else { SlotRole::Flank },
    }
}

fn wedge_slot(i: usize, spacing: f32) -> FormationSlot {
    if i == 0 {
        return FormationSlot {
            offset: Vec2::ZERO,
            role: SlotRole::Front,
        };
    }
    let rank = ((i + 1) / 2) as f32;
    let side = if i % 2 == 1 { 1.0 } else { -1.0 };
    FormationSlot {
        offset: Vec2::new(-rank * spacing, side * rank * spacing),
        role: SlotRole::Flank,
    }
}

fn circle_slot(i: usize, count: usize, spacing: f32) -> FormationSlot {
    if count == 1 {
        return FormationSlot {
            offset: Vec2::ZERO,
            role: SlotRole::Center,
        };
    }
    // Radius keeps the arc between neighbors at least `spacing`
    let radius = spacing.max(spacing * count as f32 / std::f32::consts::TAU);
    let angle = std::f32::consts::TAU * i as f32 / count as f32;
    FormationSlot {
        offset: rotate(Vec2::X, angle) * radius,
        role: if i == 0 { SlotRole::Front } else { SlotRole::Flank },
    }
}

fn diamond_slot(i: usize, spacing: f32) -> FormationSlot {
    // Point, left, right, tail; larger squads repeat on wider rings
    let ring = (i / 4 + 1) as f32 * spacing;
    let (offset, role) = match i % 4 {
        0 => (Vec2::new(ring, 0.0), SlotRole::Front),
        1 => (Vec2::new(0.0, ring), SlotRole::Flank),
        2 => (Vec2::new(0.0, -ring), SlotRole::Flank),
        _ => (Vec2::new(-ring, 0.0), SlotRole::Rear),
    };
    FormationSlot { offset, role }
}

fn phalanx_slot(i: usize, count: usize, spacing: f32) -> FormationSlot {
    let cols = (count as f32).sqrt().ceil().max(1.0) as usize;
    let rows = count.div_ceil(cols);
    let row = i / cols;
    let col = i % cols;
    let role = if row == 0 {
        SlotRole::Front
    } else if row + 1 == rows {
        SlotRole::Rear
    } else {
        SlotRole::Center
    };
    FormationSlot {
        offset: Vec2::new(
            -(row as f32) * spacing,
            (col as f32 - (cols as f32 - 1.0) / 2.0) * spacing,
        ),
        role,
    }
}

/// Deterministic choice from squad composition
pub fn select_formation(members: &[Archetype]) -> Formation {
    let size = members.len();
    let has = |a: Archetype| members.contains(&a);

    if has(Archetype::Sniper) && size >= 4 {
        Formation::Diamond
    } else if has(Archetype::Heavy) && size >= 5 {
        Formation::Phalanx
    } else if size >= 6 {
        Formation::Wedge
    } else if size >= 4 {
        Formation::Diamond
    } else {
        Formation::Line
    }
}
