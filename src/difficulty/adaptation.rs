//! Optional learning layer on top of the controller
//!
//! An adaptation layer watches tick reports and proposes small setting
//! nudges. The controller applies them under the same rate limit and
//! clamping as its own retunes, so a layer can never destabilize it.

use serde::{Deserialize, Serialize};

use crate::difficulty::settings::SettingKind;
use crate::simulation::TickReport;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SettingNudge {
    pub setting: SettingKind,
    /// Raw adjustment before rate scaling
    pub delta: f32,
}

pub trait AdaptationLayer {
    fn observe(&mut self, report: &TickReport);
    /// Drain pending proposals
    fn propose(&mut self) -> Vec<SettingNudge>;
}

/// Tunes enemy accuracy from how many agents are lost per attack made
#[derive(Debug, Clone)]
pub struct EngagementObserver {
    attacks: u32,
    losses: u32,
    /// Attacks needed before proposing anything
    pub min_attacks: u32,
    /// Losses per attack above which enemies are struggling
    pub struggling_ratio: f32,
    /// Losses per attack below which enemies are dominating
    pub dominating_ratio: f32,
    pub step: f32,
}

impl Default for EngagementObserver {
    fn default() -> Self {
        Self {
            attacks: 0,
            losses: 0,
            min_attacks: 20,
            struggling_ratio: 0.25,
            dominating_ratio: 0.02,
            step: 0.2,
        }
    }
}

impl EngagementObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AdaptationLayer for EngagementObserver {
    fn observe(&mut self, report: &TickReport) {
        self.attacks += report.intents.iter().filter(|i| i.attack.is_some()).count() as u32;
        self.losses += report.casualties.len() as u32;
    }

    fn propose(&mut self) -> Vec<SettingNudge> {
        if self.attacks < self.min_attacks {
            return Vec::new();
        }
        let ratio = self.losses as f32 / self.attacks as f32;
        self.attacks = 0;
        self.losses = 0;

        let delta = if ratio > self.struggling_ratio {
            self.step
        } else if ratio < self.dominating_ratio {
            -self.step
        } else {
            return Vec::new();
        };
        tracing::debug!(ratio, delta, "engagement observer nudging enemy accuracy");
        vec![SettingNudge {
            setting: SettingKind::EnemyAccuracy,
            delta,
        }]
    }
}
