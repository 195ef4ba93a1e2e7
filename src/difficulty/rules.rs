//! Difficulty adjustment rules: condition -> signed setting adjustments

use crate::difficulty::metrics::{MetricKind, PlayerMetric};
use crate::difficulty::settings::SettingKind;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleCondition {
    /// Metric reading more than one tolerance above target
    MetricAbove(MetricKind),
    /// Metric reading more than one tolerance below target
    MetricBelow(MetricKind),
    PerformanceAbove(f32),
    PerformanceBelow(f32),
}

impl RuleCondition {
    /// Unsampled metrics never match
    pub fn matches(&self, metrics: &[PlayerMetric], performance: Option<f32>) -> bool {
        let deviation = |kind: MetricKind| metrics.iter().find(|m| m.kind == kind).and_then(|m| m.deviation());
        match *self {
            RuleCondition::MetricAbove(kind) => deviation(kind).is_some_and(|d| d > 1.0),
            RuleCondition::MetricBelow(kind) => deviation(kind).is_some_and(|d| d < -1.0),
            RuleCondition::PerformanceAbove(threshold) => performance.is_some_and(|p| p > threshold),
            RuleCondition::PerformanceBelow(threshold) => performance.is_some_and(|p| p < threshold),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdjustmentRule {
    pub name: &'static str,
    pub condition: RuleCondition,
    pub adjustments: Vec<(SettingKind, f32)>,
    pub priority: f32,
}

impl AdjustmentRule {
    fn new(name: &'static str, condition: RuleCondition, priority: f32, adjustments: &[(SettingKind, f32)]) -> Self {
        Self {
            name,
            condition,
            adjustments: adjustments.to_vec(),
            priority,
        }
    }
}

pub fn default_rules() -> Vec<AdjustmentRule> {
    use MetricKind::*;
    use RuleCondition::*;
    use SettingKind::*;

    vec![
        AdjustmentRule::new(
            "high_accuracy",
            MetricAbove(Accuracy),
            0.8,
            &[(EnemyHealth, 0.1), (EnemyDamage, 0.05), (EnemySpeed, 0.05)],
        ),
        AdjustmentRule::new(
            "low_accuracy",
            MetricBelow(Accuracy),
            0.8,
            &[(EnemyHealth, -0.1), (EnemySpeed, -0.05), (EnemyAccuracy, -0.05)],
        ),
        AdjustmentRule::new(
            "high_kill_rate",
            MetricAbove(KillRate),
            0.8,
            &[
                (EnemySpawnRate, 0.15),
                (EnemyDamage, 0.05),
                (PowerupSpawnRate, -0.1),
                (WaveInterval, -0.1),
            ],
        ),
        AdjustmentRule::new(
            "low_kill_rate",
            MetricBelow(KillRate),
            0.6,
            &[(EnemySpawnRate, -0.1), (WaveInterval, 0.1)],
        ),
        AdjustmentRule::new(
            "taking_heavy_damage",
            MetricAbove(DamageTakenRate),
            0.9,
            &[(EnemyDamage, -0.1), (EnemyAccuracy, -0.1), (PowerupSpawnRate, 0.1)],
        ),
        AdjustmentRule::new(
            "untouched",
            MetricBelow(DamageTakenRate),
            0.6,
            &[(EnemyDamage, 0.05), (EnemyAccuracy, 0.05)],
        ),
        AdjustmentRule::new(
            "poor_health_management",
            MetricBelow(HealthManagement),
            0.5,
            &[(PowerupSpawnRate, 0.1)],
        ),
        AdjustmentRule::new(
            "short_survival",
            MetricBelow(SurvivalTime),
            0.7,
            &[(EnemySpawnRate, -0.1), (PlayerDamage, 0.05)],
        ),
        AdjustmentRule::new(
            "player_dominating",
            PerformanceAbove(0.7),
            1.0,
            &[
                (EnemySpawnRate, 0.2),
                (EnemyHealth, 0.15),
                (EnemyDamage, 0.1),
                (PowerupSpawnRate, -0.15),
            ],
        ),
        AdjustmentRule::new(
            "player_struggling",
            PerformanceBelow(0.3),
            1.0,
            &[
                (EnemySpawnRate, -0.2),
                (EnemyHealth, -0.15),
                (EnemyDamage, -0.1),
                (PowerupSpawnRate, 0.15),
                (PlayerDamage, 0.1),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsampled_metric_never_matches() {
        let metrics = vec![PlayerMetric::new(MetricKind::Accuracy, 5)];
        assert!(!RuleCondition::MetricAbove(MetricKind::Accuracy).matches(&metrics, None));
        assert!(!RuleCondition::MetricBelow(MetricKind::Accuracy).matches(&metrics, None));
    }

    #[test]
    fn test_metric_conditions() {
        let mut metric = PlayerMetric::new(MetricKind::Accuracy, 5);
        metric.record(0.9);
        let metrics = vec![metric];
        assert!(RuleCondition::MetricAbove(MetricKind::Accuracy).matches(&metrics, None));
        assert!(!RuleCondition::MetricBelow(MetricKind::Accuracy).matches(&metrics, None));
    }

    #[test]
    fn test_dominating_and_struggling_are_mirrors() {
        let rules = default_rules();
        let up = rules.iter().find(|r| r.name == "player_dominating").unwrap();
        let down = rules.iter().find(|r| r.name == "player_struggling").unwrap();
        for (kind, delta) in &up.adjustments {
            let opposite = down.adjustments.iter().find(|(k, _)| k == kind).unwrap().1;
            assert_eq!(*delta, -opposite);
        }
    }
}
