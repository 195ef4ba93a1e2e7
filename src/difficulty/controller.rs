//! Closed-loop difficulty controller
//!
//! Metrics are sampled every frame; evaluation and retuning run on a fixed
//! cadence inside `update`. The aggregate difficulty scalar is smoothed
//! toward the value implied by the settings so it never jumps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::behavior::CombatModifiers;
use crate::core::config::DifficultyConfig;
use crate::core::error::Result;
use crate::difficulty::adaptation::SettingNudge;
use crate::difficulty::metrics::{MetricKind, PlayerMetric};
use crate::difficulty::rules::{default_rules, AdjustmentRule};
use crate::difficulty::settings::{aggregate_difficulty, Setting, SettingKind};

/// Weighted evaluation of the player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceScore {
    /// Weighted mean over sampled metrics; `None` before any sample
    pub overall: Option<f32>,
    pub per_metric: Vec<(MetricKind, f32)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SettingDelta {
    pub setting: SettingKind,
    pub before: f32,
    pub after: f32,
}

/// What a cadence tick did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetuneReport {
    pub performance: PerformanceScore,
    pub deltas: Vec<SettingDelta>,
    pub rules_fired: Vec<&'static str>,
}

/// Multipliers published to spawners and the agent catalog
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyMultipliers {
    pub spawn_rate: f32,
    pub health: f32,
    pub damage: f32,
    pub speed: f32,
    pub accuracy: f32,
    pub player_damage: f32,
    pub player_speed: f32,
    pub powerup_spawn_rate: f32,
    pub wave_interval: f32,
}

impl DifficultyMultipliers {
    pub fn as_map(&self) -> BTreeMap<&'static str, f32> {
        BTreeMap::from([
            ("spawn_rate", self.spawn_rate),
            ("health", self.health),
            ("damage", self.damage),
            ("speed", self.speed),
            ("accuracy", self.accuracy),
            ("player_damage", self.player_damage),
            ("player_speed", self.player_speed),
            ("powerup_spawn_rate", self.powerup_spawn_rate),
            ("wave_interval", self.wave_interval),
        ])
    }

    pub fn combat_modifiers(&self) -> CombatModifiers {
        CombatModifiers {
            speed: self.speed,
            damage: self.damage,
            accuracy: self.accuracy,
        }
    }
}

/// Opaque persisted form of the controller's session state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultySnapshot {
    pub settings: Vec<(SettingKind, f32)>,
    pub histories: Vec<(MetricKind, Vec<f32>)>,
    pub difficulty: f32,
    pub manual_override: Option<f32>,
    pub since_evaluation: f32,
}

pub struct DifficultyController {
    config: DifficultyConfig,
    metrics: Vec<PlayerMetric>,
    settings: Vec<Setting>,
    rules: Vec<AdjustmentRule>,
    /// Smoothed aggregate difficulty
    difficulty: f32,
    manual_override: Option<f32>,
    since_evaluation: f32,
    evaluations: u64,
}

impl DifficultyController {
    pub fn new(config: DifficultyConfig) -> Self {
        Self::with_rules(config, default_rules())
    }

    pub fn with_rules(config: DifficultyConfig, rules: Vec<AdjustmentRule>) -> Self {
        let history = config.history_len.max(1);
        Self {
            metrics: MetricKind::ALL.iter().map(|&k| PlayerMetric::new(k, history)).collect(),
            settings: SettingKind::ALL.iter().map(|&k| Setting::new(k)).collect(),
            rules,
            difficulty: 1.0_f32.max(config.min_difficulty).min(config.max_difficulty),
            manual_override: None,
            since_evaluation: 0.0,
            evaluations: 0,
            config,
        }
    }

    pub fn difficulty(&self) -> f32 {
        self.difficulty
    }

    /// Difficulty the smoothing is heading for
    pub fn target_difficulty(&self) -> f32 {
        self.bound(self.manual_override.unwrap_or_else(|| aggregate_difficulty(&self.settings)))
    }

    /// Clamp into [min_difficulty, max_difficulty]; NaN reads as 1.0
    fn bound(&self, value: f32) -> f32 {
        let value = if value.is_nan() { 1.0 } else { value };
        value.max(self.config.min_difficulty).min(self.config.max_difficulty)
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    pub fn setting(&self, kind: SettingKind) -> f32 {
        self.settings
            .iter()
            .find(|s| s.kind == kind)
            .map_or(1.0, |s| s.current())
    }

    pub fn settings(&self) -> &[Setting] {
        &self.settings
    }

    pub fn metric(&self, kind: MetricKind) -> Option<&PlayerMetric> {
        self.metrics.iter().find(|m| m.kind == kind)
    }

    pub fn metric_mut(&mut self, kind: MetricKind) -> Option<&mut PlayerMetric> {
        self.metrics.iter_mut().find(|m| m.kind == kind)
    }

    /// Feed a batch of metric readings
    pub fn sample(&mut self, readings: &[(MetricKind, f32)]) {
        for &(kind, value) in readings {
            if let Some(metric) = self.metric_mut(kind) {
                metric.record(value);
            }
        }
    }

    pub fn evaluate(&self) -> PerformanceScore {
        let per_metric: Vec<(MetricKind, f32)> = self
            .metrics
            .iter()
            .filter_map(|m| m.score().map(|s| (m.kind, s)))
            .collect();

        let (weighted, total_weight) = per_metric.iter().fold((0.0, 0.0), |(sum, total), &(kind, score)| {
            let weight = self.metric(kind).map_or(0.0, |m| m.weight.max(0.0));
            (sum + score * weight, total + weight)
        });

        PerformanceScore {
            overall: (total_weight > 0.0).then(|| weighted / total_weight),
            per_metric,
        }
    }

    /// Apply the rule table once; a no-op under manual override
    pub fn retune(&mut self) -> RetuneReport {
        let performance = self.evaluate();
        if self.manual_override.is_some() {
            return RetuneReport {
                performance,
                deltas: Vec::new(),
                rules_fired: Vec::new(),
            };
        }

        let mut totals: BTreeMap<SettingKind, f32> = BTreeMap::new();
        let mut rules_fired = Vec::new();
        for rule in &self.rules {
            if !rule.condition.matches(&self.metrics, performance.overall) {
                continue;
            }
            rules_fired.push(rule.name);
            for &(kind, adjustment) in &rule.adjustments {
                *totals.entry(kind).or_default() += adjustment * rule.priority;
            }
        }

        let deltas = totals
            .into_iter()
            .filter_map(|(kind, total)| self.step_setting(kind, total))
            .collect();

        RetuneReport {
            performance,
            deltas,
            rules_fired,
        }
    }

    /// Scale by the adjustment rate, cap at the per-cycle step, clamp
    fn step_setting(&mut self, kind: SettingKind, raw: f32) -> Option<SettingDelta> {
        let cap = self.config.max_step.abs();
        let step = (raw * self.config.adjustment_rate).clamp(-cap, cap);
        let setting = self.settings.iter_mut().find(|s| s.kind == kind)?;
        let before = setting.current();
        setting.set_clamped(before + step);
        let after = setting.current();
        (after != before).then_some(SettingDelta {
            setting: kind,
            before,
            after,
        })
    }

    /// Advance the cadence timer and the smoothing; runs a retune when due
    pub fn update(&mut self, dt: f32) -> Option<RetuneReport> {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.since_evaluation += dt;

        let report = if self.since_evaluation >= self.config.evaluation_interval {
            self.since_evaluation = 0.0;
            self.evaluations += 1;
            let report = self.retune();
            tracing::info!(
                performance = ?report.performance.overall,
                rules = report.rules_fired.len(),
                changed = report.deltas.len(),
                difficulty = self.difficulty,
                "difficulty retuned"
            );
            Some(report)
        } else {
            None
        };

        let target = self.target_difficulty();
        let max_change = self.config.smoothing_rate.abs() * dt;
        let change = (target - self.difficulty).clamp(-max_change, max_change);
        self.difficulty = self.bound(self.difficulty + change);

        report
    }

    /// Operator sets the aggregate directly; automatic retuning stops
    ///
    /// The offset from 1.0 is spread over every setting's range in the
    /// direction of its impact, so the settings imply the requested level.
    pub fn set_manual_difficulty(&mut self, level: f32) {
        let level = self.bound(level);
        let normalized = (level - 1.0).clamp(-1.0, 1.0);
        for setting in &mut self.settings {
            let value = setting.value_at(normalized * setting.kind.impact().signum());
            setting.set_clamped(value);
        }
        self.manual_override = Some(level);
        tracing::info!(level, "manual difficulty override");
    }

    pub fn clear_manual_override(&mut self) {
        self.manual_override = None;
    }

    pub fn is_manual(&self) -> bool {
        self.manual_override.is_some()
    }

    /// Bounded nudges from an adaptation layer; same rate limit as retunes
    pub fn apply_nudges(&mut self, nudges: &[SettingNudge]) -> Vec<SettingDelta> {
        if self.manual_override.is_some() {
            return Vec::new();
        }
        nudges
            .iter()
            .filter(|n| n.delta.is_finite())
            .filter_map(|n| self.step_setting(n.setting, n.delta))
            .collect()
    }

    pub fn multipliers(&self) -> DifficultyMultipliers {
        DifficultyMultipliers {
            spawn_rate: self.setting(SettingKind::EnemySpawnRate),
            health: self.setting(SettingKind::EnemyHealth),
            damage: self.setting(SettingKind::EnemyDamage),
            speed: self.setting(SettingKind::EnemySpeed),
            accuracy: self.setting(SettingKind::EnemyAccuracy),
            player_damage: self.setting(SettingKind::PlayerDamage),
            player_speed: self.setting(SettingKind::PlayerSpeed),
            powerup_spawn_rate: self.setting(SettingKind::PowerupSpawnRate),
            wave_interval: self.setting(SettingKind::WaveInterval),
        }
    }

    pub fn snapshot(&self) -> DifficultySnapshot {
        DifficultySnapshot {
            settings: self.settings.iter().map(|s| (s.kind, s.current())).collect(),
            histories: self.metrics.iter().map(|m| (m.kind, m.history().collect())).collect(),
            difficulty: self.difficulty,
            manual_override: self.manual_override,
            since_evaluation: self.since_evaluation,
        }
    }

    /// Restore session state; every value is clamped back into range
    pub fn restore(&mut self, snapshot: &DifficultySnapshot) {
        for &(kind, value) in &snapshot.settings {
            if let Some(setting) = self.settings.iter_mut().find(|s| s.kind == kind) {
                setting.set_clamped(value);
            }
        }
        for (kind, history) in &snapshot.histories {
            if let Some(metric) = self.metric_mut(*kind) {
                metric.restore_history(history.iter().copied());
            }
        }
        self.difficulty = self.bound(snapshot.difficulty);
        self.manual_override = snapshot.manual_override.map(|v| self.bound(v));
        self.since_evaluation = snapshot.since_evaluation.max(0.0).min(self.config.evaluation_interval);
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    pub fn restore_json(&mut self, json: &str) -> Result<()> {
        let snapshot: DifficultySnapshot = serde_json::from_str(json)?;
        self.restore(&snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> DifficultyController {
        DifficultyController::new(DifficultyConfig::default())
    }

    #[test]
    fn test_starts_at_base() {
        let c = controller();
        assert_eq!(c.difficulty(), 1.0);
        assert_eq!(c.target_difficulty(), 1.0);
        assert!(c.evaluate().overall.is_none());
        assert!(c.multipliers().as_map().values().all(|&v| v == 1.0));
    }

    #[test]
    fn test_performance_is_weighted_mean_of_sampled() {
        let mut c = controller();
        c.sample(&[(MetricKind::Accuracy, 0.5), (MetricKind::KillRate, 2.0)]);
        let score = c.evaluate();
        assert_eq!(score.per_metric.len(), 2);
        assert!((score.overall.unwrap() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_retune_only_on_cadence() {
        let mut c = controller();
        c.sample(&[(MetricKind::Accuracy, 0.95)]);
        assert!(c.update(1.0).is_none());
        assert!(c.update(3.9).is_none());
        let report = c.update(0.2).expect("cadence elapsed");
        assert!(report.rules_fired.contains(&"high_accuracy"));
        assert_eq!(c.evaluations(), 1);
    }

    #[test]
    fn test_step_capped_per_cycle() {
        let mut c = controller();
        c.sample(&[(MetricKind::Accuracy, 1.0), (MetricKind::KillRate, 10.0)]);
        let report = c.retune();
        for delta in &report.deltas {
            assert!((delta.after - delta.before).abs() <= DifficultyConfig::default().max_step + 1e-6);
        }
    }

    #[test]
    fn test_smoothing_limits_rate() {
        let mut c = controller();
        c.set_manual_difficulty(2.0);
        c.update(1.0);
        assert!((c.difficulty() - 1.1).abs() < 1e-5);
        for _ in 0..100 {
            c.update(1.0);
        }
        assert!((c.difficulty() - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_manual_override_distributes_and_freezes() {
        let mut c = controller();
        c.set_manual_difficulty(1.5);
        assert!((c.target_difficulty() - 1.5).abs() < 1e-5);
        assert!((aggregate_difficulty(c.settings()) - 1.5).abs() < 1e-4);
        assert!(c.setting(SettingKind::EnemyHealth) > 1.0);
        assert!(c.setting(SettingKind::PowerupSpawnRate) < 1.0);

        c.sample(&[(MetricKind::Accuracy, 0.0)]);
        assert!(c.retune().deltas.is_empty());
        c.clear_manual_override();
        assert!(!c.retune().deltas.is_empty());
    }

    #[test]
    fn test_snapshot_round_trip_clamps() {
        let mut c = controller();
        c.sample(&[(MetricKind::KillRate, 3.0)]);
        let mut snapshot = c.snapshot();
        snapshot.settings[0].1 = 40.0;
        snapshot.difficulty = -3.0;

        let mut restored = controller();
        restored.restore_json(&serde_json::to_string(&snapshot).unwrap()).unwrap();
        assert_eq!(restored.setting(snapshot.settings[0].0), 2.0);
        assert_eq!(restored.difficulty(), DifficultyConfig::default().min_difficulty);
        assert_eq!(restored.metric(MetricKind::KillRate).unwrap().current(), Some(3.0));
    }

    #[test]
    fn test_bad_json_is_an_error() {
        assert!(controller().restore_json("{not json").is_err());
    }

    #[test]
    fn test_nudges_rate_limited() {
        let mut c = controller();
        let deltas = c.apply_nudges(&[SettingNudge {
            setting: SettingKind::EnemyAccuracy,
            delta: 10.0,
        }]);
        assert_eq!(deltas.len(), 1);
        assert!((deltas[0].after - 1.0 - DifficultyConfig::default().max_step).abs() < 1e-6);
    }
}
