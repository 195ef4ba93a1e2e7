//! Player performance metrics

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Tracked aspect of player performance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricKind {
    /// Hits over shots, 0..1
    Accuracy,
    /// Seconds survived per life
    SurvivalTime,
    /// Kills per minute
    KillRate,
    /// Damage received per second
    DamageTakenRate,
    /// Share of healing picked up when actually hurt, 0..1
    HealthManagement,
    /// Useful ability activations over activations, 0..1
    AbilityEfficiency,
}

impl MetricKind {
    pub const ALL: [MetricKind; 6] = [
        MetricKind::Accuracy,
        MetricKind::SurvivalTime,
        MetricKind::KillRate,
        MetricKind::DamageTakenRate,
        MetricKind::HealthManagement,
        MetricKind::AbilityEfficiency,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MetricKind::Accuracy => "accuracy",
            MetricKind::SurvivalTime => "survival_time",
            MetricKind::KillRate => "kill_rate",
            MetricKind::DamageTakenRate => "damage_taken_rate",
            MetricKind::HealthManagement => "health_management",
            MetricKind::AbilityEfficiency => "ability_efficiency",
        }
    }

    /// Higher readings mean the player is doing worse
    pub fn lower_is_better(self) -> bool {
        matches!(self, MetricKind::DamageTakenRate)
    }

    fn is_ratio(self) -> bool {
        matches!(
            self,
            MetricKind::Accuracy | MetricKind::HealthManagement | MetricKind::AbilityEfficiency
        )
    }

    /// (target, tolerance, weight)
    fn defaults(self) -> (f32, f32, f32) {
        match self {
            MetricKind::Accuracy => (0.5, 0.15, 1.0),
            MetricKind::SurvivalTime => (120.0, 60.0, 0.8),
            MetricKind::KillRate => (2.0, 0.75, 1.0),
            MetricKind::DamageTakenRate => (8.0, 4.0, 0.8),
            MetricKind::HealthManagement => (0.6, 0.2, 0.5),
            MetricKind::AbilityEfficiency => (0.5, 0.2, 0.5),
        }
    }
}

/// Score of a reading against its target
///
/// 0.5 at target, linear to 0.25/0.75 at the tolerance edges, then
/// exponentially toward 0/1. Lower-is-better metrics are mirrored so a
/// high score always means the player is doing well.
pub fn metric_score(current: f32, target: f32, tolerance: f32, lower_is_better: bool) -> f32 {
    let mut d = (current - target) / tolerance.max(f32::EPSILON);
    if lower_is_better {
        d = -d;
    }
    if !d.is_finite() {
        return if d > 0.0 { 1.0 } else { 0.0 };
    }

    if d.abs() <= 1.0 {
        0.5 + 0.25 * d
    } else if d > 0.0 {
        1.0 - 0.25 * (-(d - 1.0)).exp()
    } else {
        0.25 * (d + 1.0).exp()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerMetric {
    pub kind: MetricKind,
    pub target: f32,
    pub tolerance: f32,
    pub weight: f32,
    history: VecDeque<f32>,
    capacity: usize,
}

impl PlayerMetric {
    pub fn new(kind: MetricKind, capacity: usize) -> Self {
        let (target, tolerance, weight) = kind.defaults();
        Self {
            kind,
            target,
            tolerance,
            weight,
            history: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Add a reading; NaN is dropped, negatives and over-one ratios clamped
    pub fn record(&mut self, value: f32) {
        if value.is_nan() {
            return;
        }
        let value = if self.kind.is_ratio() {
            value.clamp(0.0, 1.0)
        } else {
            value.max(0.0)
        };
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(value);
    }

    pub fn is_sampled(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn history(&self) -> impl Iterator<Item = f32> + '_ {
        self.history.iter().copied()
    }

    /// Rolling mean of the history
    pub fn current(&self) -> Option<f32> {
        if self.history.is_empty() {
            None
        } else {
            Some(self.history.iter().sum::<f32>() / self.history.len() as f32)
        }
    }

    /// Signed distance from target in tolerances (not mirrored)
    pub fn deviation(&self) -> Option<f32> {
        self.current().map(|c| (c - self.target) / self.tolerance.max(f32::EPSILON))
    }

    pub fn score(&self) -> Option<f32> {
        self.current()
            .map(|c| metric_score(c, self.target, self.tolerance, self.kind.lower_is_better()))
    }

    /// Replace the history, e.g. from a snapshot
    pub fn restore_history(&mut self, values: impl IntoIterator<Item = f32>) {
        self.history.clear();
        for value in values {
            self.record(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_at_target_is_half() {
        assert_eq!(metric_score(0.5, 0.5, 0.15, false), 0.5);
    }

    #[test]
    fn test_score_monotonic_and_bounded() {
        let mut last = -1.0;
        for i in 0..200 {
            let value = i as f32 * 0.01;
            let score = metric_score(value, 0.5, 0.15, false);
            assert!((0.0..=1.0).contains(&score));
            assert!(score >= last);
            last = score;
        }
    }

    #[test]
    fn test_score_continuous_at_tolerance_edge() {
        let inside = metric_score(0.65, 0.5, 0.15, false);
        let outside = metric_score(0.6501, 0.5, 0.15, false);
        assert!((inside - 0.75).abs() < 1e-4);
        assert!((outside - inside).abs() < 1e-3);
    }

    #[test]
    fn test_lower_is_better_mirrors() {
        let bad = metric_score(16.0, 8.0, 4.0, true);
        let good = metric_score(0.0, 8.0, 4.0, true);
        assert!(bad < 0.25);
        assert!(good > 0.75);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut metric = PlayerMetric::new(MetricKind::KillRate, 3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            metric.record(v);
        }
        assert_eq!(metric.history().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
        assert_eq!(metric.current(), Some(3.0));
    }

    #[test]
    fn test_inputs_clamped_at_boundary() {
        let mut metric = PlayerMetric::new(MetricKind::Accuracy, 5);
        metric.record(-0.5);
        metric.record(f32::NAN);
        metric.record(3.0);
        assert_eq!(metric.history().collect::<Vec<_>>(), vec![0.0, 1.0]);
        assert!(PlayerMetric::new(MetricKind::Accuracy, 5).score().is_none());
    }
}
