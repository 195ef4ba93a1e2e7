//! Adaptive difficulty
//!
//! - `metrics`: rolling player metrics and their scores
//! - `settings`: bounded tunables and the aggregate difficulty formula
//! - `rules`: the condition -> adjustment table
//! - `controller`: cadence, retuning, smoothing, override, persistence
//! - `adaptation`: optional observer layers proposing bounded nudges

pub mod adaptation;
pub mod controller;
pub mod metrics;
pub mod rules;
pub mod settings;

pub use adaptation::{AdaptationLayer, EngagementObserver, SettingNudge};
pub use controller::{
    DifficultyController, DifficultyMultipliers, DifficultySnapshot, PerformanceScore, RetuneReport, SettingDelta,
};
pub use metrics::{metric_score, MetricKind, PlayerMetric};
pub use rules::{default_rules, AdjustmentRule, RuleCondition};
pub use settings::{aggregate_difficulty, Setting, SettingKind};
