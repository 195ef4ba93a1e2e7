//! AI configuration with documented constants
//!
//! Every tuning constant of the decision core lives here. Presets are loaded
//! from `data/ai_config/{name}.toml`; any section or field left out of the
//! file falls back to the default below.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::{AiError, Result};

/// Sensing constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    /// Half of the vision cone, in degrees
    pub vision_half_angle_deg: f32,
    /// Share of the archetype vision range available at zero alert
    pub vision_base_factor: f32,
    /// Extra share of vision range gained at full alert
    pub vision_alert_factor: f32,
    /// Distance within which player movement is heard
    pub movement_hearing_range: f32,
    /// Distance within which player weapon fire is heard
    pub fire_hearing_range: f32,
    /// Alert gained per second while hearing movement
    pub movement_hearing_rate: f32,
    /// Alert gained per second while hearing fire
    pub fire_hearing_rate: f32,
    /// A hit younger than this (seconds) forces full alert
    pub pain_window: f32,
    /// Seconds for alert to decay from 1 to 0 without stimulus
    pub alert_decay_time: f32,
    /// Seconds for alert to rise from 0 to 1 under visual contact
    pub alert_rise_time: f32,
    /// Allies within this distance share sightings
    pub callout_radius: f32,
    /// Alert gained per second from an ally callout
    pub callout_rate: f32,
    /// Only sightings younger than this (seconds) are called out
    pub callout_freshness: f32,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            vision_half_angle_deg: 60.0,
            vision_base_factor: 0.7,
            vision_alert_factor: 0.3,
            movement_hearing_range: 100.0,
            fire_hearing_range: 200.0,
            movement_hearing_rate: 0.25,
            fire_hearing_rate: 0.5,
            pain_window: 2.0,
            alert_decay_time: 3.0,
            alert_rise_time: 1.0,
            callout_radius: 150.0,
            callout_rate: 0.3,
            callout_freshness: 2.0,
        }
    }
}

/// Decision-function thresholds and state setup constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateMachineConfig {
    /// Below this health ratio the agent retreats
    pub retreat_health: f32,
    /// A sighting counts as "visible" for this many seconds
    pub memory_window: f32,
    /// Visible target closer than this -> Combat
    pub combat_distance: f32,
    /// Visible target closer than this -> Chase
    pub chase_distance: f32,
    /// Alert above this -> Investigate
    pub investigate_alert: f32,
    /// Alert above this -> Alert
    pub alert_threshold: f32,
    /// Last-known positions younger than this are worth searching
    pub search_memory: f32,
    /// Radius of the search pattern around the last-known position
    pub search_radius: f32,
    /// Number of points in the search pattern (excluding the center)
    pub search_points: usize,
    pub patrol_radius_min: f32,
    pub patrol_radius_max: f32,
    pub patrol_waypoints_min: usize,
    pub patrol_waypoints_max: usize,
    /// How far a retreating agent flees from the threat
    pub retreat_distance: f32,
}

impl Default for StateMachineConfig {
    fn default() -> Self {
        Self {
            retreat_health: 0.2,
            memory_window: 5.0,
            combat_distance: 150.0,
            chase_distance: 300.0,
            investigate_alert: 0.7,
            alert_threshold: 0.3,
            search_memory: 10.0,
            search_radius: 60.0,
            search_points: 4,
            patrol_radius_min: 80.0,
            patrol_radius_max: 150.0,
            patrol_waypoints_min: 3,
            patrol_waypoints_max: 5,
            retreat_distance: 250.0,
        }
    }
}

/// Behavior executor constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Desired stand-off as a share of attack range
    pub standoff_factor: f32,
    /// Below this health ratio combat becomes a fighting retreat
    pub fighting_retreat_health: f32,
    /// Allies needed nearby before seeking cover while fighting
    pub cover_ally_count: usize,
    /// Radius for counting nearby allies
    pub ally_radius: f32,
    /// Beyond this distance combat is a direct attack
    pub direct_attack_distance: f32,
    pub patrol_speed_factor: f32,
    pub investigate_speed_factor: f32,
    /// Distance at which a waypoint counts as reached
    pub waypoint_tolerance: f32,
    /// Obstacles further than this are not considered for cover
    pub cover_search_radius: f32,
    /// Clearance kept from obstacles
    pub avoidance_margin: f32,
    /// Seconds of look-ahead for obstacle avoidance
    pub avoidance_lookahead: f32,
    pub support_follow_distance: f32,
    pub support_search_radius: f32,
    /// Lateral speed share while strafing
    pub strafe_factor: f32,
    /// Hit chance before difficulty scaling
    pub base_accuracy: f32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            standoff_factor: 0.8,
            fighting_retreat_health: 0.3,
            cover_ally_count: 2,
            ally_radius: 150.0,
            direct_attack_distance: 100.0,
            patrol_speed_factor: 0.5,
            investigate_speed_factor: 0.7,
            waypoint_tolerance: 10.0,
            cover_search_radius: 200.0,
            avoidance_margin: 12.0,
            avoidance_lookahead: 0.5,
            support_follow_distance: 40.0,
            support_search_radius: 250.0,
            strafe_factor: 0.6,
            base_accuracy: 0.7,
        }
    }
}

/// Squad clustering and formation constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormationConfig {
    /// Ungrouped agents closer than this may form a squad
    pub formation_distance: f32,
    pub min_group_size: usize,
    pub max_group_size: usize,
    /// Distance between neighbouring formation slots
    pub slot_spacing: f32,
    /// Weight of the steering force toward a member's slot
    pub slot_weight: f32,
    /// Members further than this from their slot close the gap first
    pub slot_catchup_distance: f32,
    /// Slot weight used while closing the gap
    pub catchup_weight: f32,
}

impl Default for FormationConfig {
    fn default() -> Self {
        Self {
            formation_distance: 150.0,
            min_group_size: 2,
            max_group_size: 8,
            slot_spacing: 40.0,
            slot_weight: 0.3,
            slot_catchup_distance: 20.0,
            catchup_weight: 1.0,
        }
    }
}

/// Squad tactic and flocking constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinationConfig {
    /// Average squad health below this -> tactical retreat
    pub retreat_health: f32,
    pub sync_attack_distance: f32,
    pub sync_attack_min_size: usize,
    pub flank_distance: f32,
    pub flank_min_size: usize,
    pub cover_advance_min_size: usize,
    /// Members whose cooldown is within this window count as ready (seconds)
    pub sync_grace: f32,
    pub flank_angle_deg: f32,
    pub flank_radius: f32,
    /// Angular spread between neighbouring retreat lanes, in degrees
    pub retreat_spread_deg: f32,
    pub retreat_distance: f32,
    /// A retreating squad this far from the target regroups
    pub regroup_distance: f32,
    /// Seconds between cover/advance role swaps
    pub cover_swap_interval: f32,
    pub cohesion_radius: f32,
    pub separation_radius: f32,
    pub cohesion_weight: f32,
    pub separation_weight: f32,
    pub alignment_weight: f32,
    /// Attack interval multiplier while laying suppressive fire
    pub suppress_interval_factor: f32,
    /// Accuracy multiplier while laying suppressive fire
    pub suppress_accuracy_factor: f32,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            retreat_health: 0.4,
            sync_attack_distance: 100.0,
            sync_attack_min_size: 3,
            flank_distance: 200.0,
            flank_min_size: 4,
            cover_advance_min_size: 2,
            sync_grace: 0.1,
            flank_angle_deg: 60.0,
            flank_radius: 120.0,
            retreat_spread_deg: 15.0,
            retreat_distance: 250.0,
            regroup_distance: 350.0,
            cover_swap_interval: 3.0,
            cohesion_radius: 100.0,
            separation_radius: 50.0,
            cohesion_weight: 0.3,
            separation_weight: 0.5,
            alignment_weight: 0.2,
            suppress_interval_factor: 0.5,
            suppress_accuracy_factor: 0.6,
        }
    }
}

/// Difficulty controller constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyConfig {
    /// Seconds between evaluate/retune passes
    pub evaluation_interval: f32,
    /// Global scale applied to summed rule adjustments
    pub adjustment_rate: f32,
    /// Largest change any setting may take in one pass
    pub max_step: f32,
    pub min_difficulty: f32,
    pub max_difficulty: f32,
    /// Largest change of the aggregate difficulty per second
    pub smoothing_rate: f32,
    /// Samples kept per metric
    pub history_len: usize,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            evaluation_interval: 5.0,
            adjustment_rate: 0.25,
            max_step: 0.15,
            min_difficulty: 0.5,
            max_difficulty: 2.0,
            smoothing_rate: 0.1,
            history_len: 20,
        }
    }
}

/// Simulation housekeeping constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Agents further than this from the player are despawned by cleanup
    pub despawn_distance: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            despawn_distance: 1500.0,
        }
    }
}

/// Complete configuration for the decision core
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiConfig {
    /// Name of this preset (set from filename)
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub perception: PerceptionConfig,
    #[serde(default)]
    pub state_machine: StateMachineConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
    #[serde(default)]
    pub formation: FormationConfig,
    #[serde(default)]
    pub coordination: CoordinationConfig,
    #[serde(default)]
    pub difficulty: DifficultyConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl AiConfig {
    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AiConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        let sm = &self.state_machine;
        if sm.alert_threshold >= sm.investigate_alert {
            return Err(AiError::InvalidConfig(format!(
                "alert_threshold ({}) should be < investigate_alert ({})",
                sm.alert_threshold, sm.investigate_alert
            )));
        }
        if sm.combat_distance >= sm.chase_distance {
            return Err(AiError::InvalidConfig(format!(
                "combat_distance ({}) should be < chase_distance ({})",
                sm.combat_distance, sm.chase_distance
            )));
        }
        unit_interval("state_machine.retreat_health", sm.retreat_health)?;
        if !(sm.patrol_radius_min >= 0.0
            && sm.patrol_radius_min <= sm.patrol_radius_max
            && sm.patrol_radius_max.is_finite())
        {
            return Err(AiError::InvalidConfig(format!(
                "patrol radius bounds must satisfy 0 <= min ({}) <= max ({})",
                sm.patrol_radius_min, sm.patrol_radius_max
            )));
        }
        if sm.patrol_waypoints_min == 0 || sm.patrol_waypoints_min > sm.patrol_waypoints_max {
            return Err(AiError::InvalidConfig(
                "patrol waypoint bounds must satisfy 0 < min <= max".into(),
            ));
        }

        let p = &self.perception;
        if p.alert_decay_time <= 0.0 || p.alert_rise_time <= 0.0 {
            return Err(AiError::InvalidConfig("alert rise/decay times must be positive".into()));
        }
        if !(0.0..=180.0).contains(&p.vision_half_angle_deg) {
            return Err(AiError::ConfigurationOutOfRange {
                name: "perception.vision_half_angle_deg".into(),
                value: p.vision_half_angle_deg,
                min: 0.0,
                max: 180.0,
            });
        }

        let f = &self.formation;
        if f.min_group_size < 2 || f.max_group_size < f.min_group_size {
            return Err(AiError::InvalidConfig(format!(
                "group size bounds invalid: min {} max {}",
                f.min_group_size, f.max_group_size
            )));
        }

        let c = &self.coordination;
        if c.separation_radius > c.cohesion_radius {
            return Err(AiError::InvalidConfig(format!(
                "separation_radius ({}) should be <= cohesion_radius ({})",
                c.separation_radius, c.cohesion_radius
            )));
        }
        unit_interval("coordination.retreat_health", c.retreat_health)?;

        let d = &self.difficulty;
        if d.min_difficulty > 1.0 || d.max_difficulty < 1.0 {
            return Err(AiError::InvalidConfig(format!(
                "difficulty bounds [{}, {}] must contain 1.0",
                d.min_difficulty, d.max_difficulty
            )));
        }
        if d.evaluation_interval <= 0.0 || d.history_len == 0 {
            return Err(AiError::InvalidConfig(
                "evaluation_interval and history_len must be positive".into(),
            ));
        }

        Ok(())
    }
}

fn unit_interval(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(AiError::ConfigurationOutOfRange {
            name: name.to_string(),
            value,
            min: 0.0,
            max: 1.0,
        })
    }
}

/// Load a named preset from `data/ai_config/{name}.toml`
pub fn load_config(name: &str) -> Result<AiConfig> {
    let mut config = AiConfig::load(config_path(name))?;
    config.name = name.to_string();
    Ok(config)
}

fn config_path(name: &str) -> PathBuf {
    PathBuf::from("data/ai_config").join(format!("{}.toml", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AiConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AiConfig::from_toml_str(
            r#"
            [formation]
            max_group_size = 6

            [coordination]
            sync_grace = 0.2
            "#,
        )
        .expect("partial config should parse");

        assert_eq!(config.formation.max_group_size, 6);
        assert_eq!(config.formation.min_group_size, 2);
        assert_eq!(config.coordination.sync_grace, 0.2);
        assert_eq!(config.perception.vision_half_angle_deg, 60.0);
    }

    #[test]
    fn test_inverted_alert_thresholds_rejected() {
        let mut config = AiConfig::default();
        config.state_machine.alert_threshold = 0.9;
        assert!(matches!(config.validate(), Err(AiError::InvalidConfig(_))));
    }

    #[test]
    fn test_inverted_patrol_radius_rejected() {
        let result = AiConfig::from_toml_str(
            r#"
            [state_machine]
            patrol_radius_min = 200.0
            patrol_radius_max = 100.0
            "#,
        );
        assert!(matches!(result, Err(AiError::InvalidConfig(_))));

        let mut config = AiConfig::default();
        config.state_machine.patrol_radius_min = -5.0;
        assert!(matches!(config.validate(), Err(AiError::InvalidConfig(_))));
    }

    #[test]
    fn test_out_of_range_retreat_health_rejected() {
        let mut config = AiConfig::default();
        config.coordination.retreat_health = 1.5;
        assert!(matches!(
            config.validate(),
            Err(AiError::ConfigurationOutOfRange { .. })
        ));
    }

    #[test]
    fn test_load_default_preset() {
        let config = load_config("default").expect("Should load default preset");
        assert_eq!(config.name, "default");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_veteran_preset() {
        let config = load_config("veteran").expect("Should load veteran preset");
        assert!(config.coordination.sync_grace >= AiConfig::default().coordination.sync_grace);
        assert!(config.perception.alert_rise_time < 1.0);
    }
}
