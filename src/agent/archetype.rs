//! Agent archetypes and their base stats

use serde::{Deserialize, Serialize};

/// Combat role of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Archetype {
    Grunt,
    Scout,
    Heavy,
    Sniper,
    Support,
    Medic,
    Elite,
    /// Melee bruiser; closes to contact instead of holding stand-off
    Brute,
}

/// Base stats before difficulty scaling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeStats {
    pub max_health: f32,
    /// Top speed in units per second
    pub speed: f32,
    pub damage: f32,
    pub attack_range: f32,
    /// Seconds between attacks
    pub attack_interval: f32,
    pub vision_range: f32,
}

impl Archetype {
    pub const ALL: [Archetype; 8] = [
        Archetype::Grunt,
        Archetype::Scout,
        Archetype::Heavy,
        Archetype::Sniper,
        Archetype::Support,
        Archetype::Medic,
        Archetype::Elite,
        Archetype::Brute,
    ];

    pub fn stats(self) -> ArchetypeStats {
        match self {
            Archetype::Grunt => ArchetypeStats {
                max_health: 100.0,
                speed: 90.0,
                damage: 10.0,
                attack_range: 150.0,
                attack_interval: 1.0,
                vision_range: 300.0,
            },
            Archetype::Scout => ArchetypeStats {
                max_health: 70.0,
                speed: 130.0,
                damage: 6.0,
                attack_range: 120.0,
                attack_interval: 0.6,
                vision_range: 380.0,
            },
            Archetype::Heavy => ArchetypeStats {
                max_health: 220.0,
                speed: 60.0,
                damage: 20.0,
                attack_range: 180.0,
                attack_interval: 1.5,
                vision_range: 260.0,
            },
            Archetype::Sniper => ArchetypeStats {
                max_health: 80.0,
                speed: 75.0,
                damage: 35.0,
                attack_range: 400.0,
                attack_interval: 2.5,
                vision_range: 450.0,
            },
            Archetype::Support => ArchetypeStats {
                max_health: 90.0,
                speed: 85.0,
                damage: 6.0,
                attack_range: 140.0,
                attack_interval: 1.0,
                vision_range: 300.0,
            },
            Archetype::Medic => ArchetypeStats {
                max_health: 80.0,
                speed: 95.0,
                damage: 4.0,
                attack_range: 100.0,
                attack_interval: 1.2,
                vision_range: 280.0,
            },
            Archetype::Elite => ArchetypeStats {
                max_health: 180.0,
                speed: 100.0,
                damage: 18.0,
                attack_range: 180.0,
                attack_interval: 0.9,
                vision_range: 350.0,
            },
            Archetype::Brute => ArchetypeStats {
                max_health: 160.0,
                speed: 110.0,
                damage: 25.0,
                attack_range: 30.0,
                attack_interval: 1.2,
                vision_range: 250.0,
            },
        }
    }

    /// Rank used for leader election (higher leads)
    pub fn leadership_priority(self) -> u8 {
        match self {
            Archetype::Elite => 6,
            Archetype::Heavy => 5,
            Archetype::Sniper => 4,
            Archetype::Grunt | Archetype::Brute => 3,
            Archetype::Support => 2,
            Archetype::Scout | Archetype::Medic => 1,
        }
    }

    pub fn is_melee(self) -> bool {
        matches!(self, Archetype::Brute)
    }

    /// Distance band in which this archetype lays suppressive fire
    pub fn suppression_band(self) -> Option<(f32, f32)> {
        match self {
            Archetype::Sniper => Some((200.0, 420.0)),
            Archetype::Heavy => Some((80.0, 220.0)),
            _ => None,
        }
    }

    /// Support roles spawn in the Support state
    pub fn is_support_role(self) -> bool {
        matches!(self, Archetype::Support | Archetype::Medic)
    }

    pub fn label(self) -> &'static str {
        match self {
            Archetype::Grunt => "grunt",
            Archetype::Scout => "scout",
            Archetype::Heavy => "heavy",
            Archetype::Sniper => "sniper",
            Archetype::Support => "support",
            Archetype::Medic => "medic",
            Archetype::Elite => "elite",
            Archetype::Brute => "brute",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaders_outrank_followers() {
        assert!(Archetype::Elite.leadership_priority() > Archetype::Heavy.leadership_priority());
        assert!(Archetype::Heavy.leadership_priority() > Archetype::Sniper.leadership_priority());
        assert!(Archetype::Sniper.leadership_priority() > Archetype::Scout.leadership_priority());
        assert!(Archetype::Sniper.leadership_priority() > Archetype::Medic.leadership_priority());
    }

    #[test]
    fn test_only_brute_is_melee() {
        let melee: Vec<_> = Archetype::ALL.iter().filter(|a| a.is_melee()).collect();
        assert_eq!(melee, vec![&Archetype::Brute]);
    }

    #[test]
    fn test_stats_positive() {
        for archetype in Archetype::ALL {
            let s = archetype.stats();
            assert!(s.max_health > 0.0 && s.speed > 0.0 && s.attack_interval > 0.0);
            assert!(s.vision_range >= s.attack_range);
        }
    }
}
