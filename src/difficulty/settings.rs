//! Bounded tunables the controller adjusts

use serde::{Deserialize, Serialize};

use crate::core::error::{AiError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SettingKind {
    EnemySpawnRate,
    EnemyHealth,
    EnemyDamage,
    EnemySpeed,
    EnemyAccuracy,
    PlayerDamage,
    PlayerSpeed,
    PowerupSpawnRate,
    WaveInterval,
}

impl SettingKind {
    pub const ALL: [SettingKind; 9] = [
        SettingKind::EnemySpawnRate,
        SettingKind::EnemyHealth,
        SettingKind::EnemyDamage,
        SettingKind::EnemySpeed,
        SettingKind::EnemyAccuracy,
        SettingKind::PlayerDamage,
        SettingKind::PlayerSpeed,
        SettingKind::PowerupSpawnRate,
        SettingKind::WaveInterval,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SettingKind::EnemySpawnRate => "enemy_spawn_rate",
            SettingKind::EnemyHealth => "enemy_health",
            SettingKind::EnemyDamage => "enemy_damage",
            SettingKind::EnemySpeed => "enemy_speed",
            SettingKind::EnemyAccuracy => "enemy_accuracy",
            SettingKind::PlayerDamage => "player_damage",
            SettingKind::PlayerSpeed => "player_speed",
            SettingKind::PowerupSpawnRate => "powerup_spawn_rate",
            SettingKind::WaveInterval => "wave_interval",
        }
    }

    /// Signed contribution to the aggregate difficulty
    pub fn impact(self) -> f32 {
        match self {
            SettingKind::EnemySpawnRate => 1.0,
            SettingKind::EnemyHealth => 0.8,
            SettingKind::EnemyDamage => 0.9,
            SettingKind::EnemySpeed => 0.5,
            SettingKind::EnemyAccuracy => 0.7,
            SettingKind::PlayerDamage => -0.8,
            SettingKind::PlayerSpeed => -0.4,
            SettingKind::PowerupSpawnRate => -0.6,
            SettingKind::WaveInterval => -0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub kind: SettingKind,
    current: f32,
    pub base: f32,
    pub min: f32,
    pub max: f32,
}

impl Setting {
    pub fn new(kind: SettingKind) -> Self {
        Self {
            kind,
            current: 1.0,
            base: 1.0,
            min: 0.5,
            max: 2.0,
        }
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            self.current
        } else {
            value.clamp(self.min, self.max)
        }
    }

    /// Write a value, clamping into range; returns whether it had to clamp
    pub fn set_clamped(&mut self, value: f32) -> bool {
        let clamped = self.clamp(value);
        let out_of_range = clamped != value;
        if out_of_range {
            tracing::debug!(setting = self.kind.label(), value, clamped, "setting clamped into range");
        }
        self.current = clamped;
        out_of_range
    }

    /// Write a value, rejecting anything outside the range
    pub fn set_strict(&mut self, value: f32) -> Result<()> {
        if value.is_nan() || value < self.min || value > self.max {
            return Err(AiError::ConfigurationOutOfRange {
                name: self.kind.label().to_string(),
                value,
                min: self.min,
                max: self.max,
            });
        }
        self.current = value;
        Ok(())
    }

    /// Position relative to base, -1 at min and +1 at max
    pub fn normalized_deviation(&self) -> f32 {
        let offset = self.current - self.base;
        if offset >= 0.0 {
            let span = self.max - self.base;
            if span > 0.0 {
                offset / span
            } else {
                0.0
            }
        } else {
            let span = self.base - self.min;
            if span > 0.0 {
                offset / span
            } else {
                0.0
            }
        }
    }

    /// Value at a normalized deviation in [-1, 1]
    pub fn value_at(&self, normalized: f32) -> f32 {
        let n = normalized.clamp(-1.0, 1.0);
        if n >= 0.0 {
            self.base + n * (self.max - self.base)
        } else {
            self.base + n * (self.base - self.min)
        }
    }
}

/// Aggregate difficulty implied by a set of settings (1.0 at base)
pub fn aggregate_difficulty(settings: &[Setting]) -> f32 {
    let total_impact: f32 = settings.iter().map(|s| s.kind.impact().abs()).sum();
    if total_impact <= 0.0 {
        return 1.0;
    }
    let weighted: f32 = settings.iter().map(|s| s.normalized_deviation() * s.kind.impact()).sum();
    1.0 + weighted / total_impact
}
