//! Hazard and encounter generation.
//!
//! Decides how dangerous a freshly generated mine is and which encounter
//! types it contains. Tile placement belongs to map generation.
//!
//! ## Algorithm
//!
//! 1. `hazard = clamp(base_power + variance, 1, 7)`, variance drawn from the
//!    configured discrete distribution.
//! 2. `rolls = hazard / 2 + 1`, plus one bonus roll with chance
//!    `hazard * bonus_roll_per_level`.
//! 3. Each roll is a weighted pick among types not yet chosen; a type whose
//!    minimum power exceeds the hazard level competes at half weight.
//! 4. Each chosen type gets an intensity and an instance count in
//!    `[1, hazard + 1]`.

use serde::{Deserialize, Serialize};

use crate::config::HazardConfig;
use crate::core::RollSource;
use crate::mine::encounter::EncounterKind;
use crate::mine::instance::MAX_LEVEL;

/// One selected encounter type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EncounterSpec {
    /// Type.
    pub kind: EncounterKind,
    /// Strength.
    pub intensity: f64,
    /// How many tiles should carry it.
    pub count: u32,
}

/// Output of [`HazardGenerator::generate`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HazardRoll {
    /// Difficulty, 1..=7.
    pub hazard_level: u8,
    /// Distinct encounter types.
    pub encounters: Vec<EncounterSpec>,
}

/// Rolls hazard levels and encounter sets from a [`HazardConfig`].
pub struct HazardGenerator<'a> {
    config: &'a HazardConfig,
}

impl<'a> HazardGenerator<'a> {
    /// Generator over a configuration.
    pub fn new(config: &'a HazardConfig) -> Self {
        Self { config }
    }

    /// Roll a hazard level and encounter set for a mine of `base_power`.
    pub fn generate(&self, base_power: u8, rng: &mut dyn RollSource) -> HazardRoll {
        let hazard_level = self.roll_hazard_level(base_power, rng);
        let rolls = self.roll_count(hazard_level, rng);

        let mut encounters: Vec<EncounterSpec> = Vec::with_capacity(rolls as usize);
        for _ in 0..rolls {
            let chosen: Vec<EncounterKind> = encounters.iter().map(|e| e.kind).collect();
            let Some(kind) = self.pick_kind(hazard_level, &chosen, rng) else {
                break;
            };
            let count = rng.range_inclusive(1, hazard_level as i32 + 1) as u32;
            encounters.push(EncounterSpec {
                kind,
                intensity: self.intensity(kind, hazard_level),
                count,
            });
        }

        HazardRoll {
            hazard_level,
            encounters,
        }
    }

    /// `clamp(base + variance, 1, 7)`.
    pub fn roll_hazard_level(&self, base_power: u8, rng: &mut dyn RollSource) -> u8 {
        let draw = rng.unit();
        let mut cumulative = 0.0;
        let mut offset = self.config.variance.last().map(|(o, _)| *o).unwrap_or(0);
        for (o, p) in &self.config.variance {
            cumulative += p;
            if draw < cumulative {
                offset = *o;
                break;
            }
        }
        (base_power as i32 + offset).clamp(1, MAX_LEVEL as i32) as u8
    }

    /// Base rolls plus an optional bonus roll.
    pub fn roll_count(&self, hazard_level: u8, rng: &mut dyn RollSource) -> u32 {
        let base = hazard_level as u32 / 2 + 1;
        let bonus = rng.chance(hazard_level as f64 * self.config.bonus_roll_per_level);
        base + bonus as u32
    }

    /// Selection weight of a kind at a hazard level.
    pub fn weight(&self, kind: EncounterKind, hazard_level: u8) -> f64 {
        match self.config.encounters.get(&kind) {
            Some(t) if t.min_power > hazard_level => t.weight / 2.0,
            Some(t) => t.weight,
            None => 0.0,
        }
    }

    fn pick_kind(
        &self,
        hazard_level: u8,
        exclude: &[EncounterKind],
        rng: &mut dyn RollSource,
    ) -> Option<EncounterKind> {
        let candidates: Vec<(EncounterKind, f64)> = EncounterKind::ALL
            .into_iter()
            .filter(|k| !exclude.contains(k))
            .map(|k| (k, self.weight(k, hazard_level)))
            .filter(|(_, w)| *w > 0.0)
            .collect();

        let total: f64 = candidates.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return None;
        }

        let mut target = rng.unit() * total;
        for (kind, w) in &candidates {
            if target < *w {
                return Some(*kind);
            }
            target -= w;
        }
        candidates.last().map(|(k, _)| *k)
    }

    /// Roughly 20% per level, adjusted for bomb and fog.
    pub fn intensity(&self, kind: EncounterKind, hazard_level: u8) -> f64 {
        let base = hazard_level as f64 * self.config.intensity_per_level;
        let modifier = match kind {
            EncounterKind::BombTrap => self.config.bomb_intensity_modifier,
            EncounterKind::GreenFog => self.config.fog_intensity_modifier,
            _ => 1.0,
        };
        base * modifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::ScriptedRolls;
    use crate::core::DeterministicRng;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_variance_distribution_edges() {
        let config = HazardConfig::default();
        let generator = HazardGenerator::new(&config);

        // Cumulative: 0.15 | 0.70 | 0.95 | 1.0
        let cases = [(0.0, 3), (0.14, 3), (0.16, 4), (0.69, 4), (0.71, 5), (0.94, 5), (0.96, 6)];
        for (draw, expected) in cases {
            let mut rolls = ScriptedRolls::constant(draw);
            assert_eq!(generator.roll_hazard_level(4, &mut rolls), expected, "draw {draw}");
        }
    }

    #[test]
    fn test_hazard_level_clamped() {
        let config = HazardConfig::default();
        let generator = HazardGenerator::new(&config);
        assert_eq!(generator.roll_hazard_level(1, &mut ScriptedRolls::constant(0.0)), 1);
        assert_eq!(generator.roll_hazard_level(7, &mut ScriptedRolls::constant(0.99)), 7);
    }

    #[test]
    fn test_roll_count() {
        let config = HazardConfig::default();
        let generator = HazardGenerator::new(&config);
        // Level 5: 3 base rolls, bonus chance 0.5.
        assert_eq!(generator.roll_count(5, &mut ScriptedRolls::constant(0.4)), 4);
        assert_eq!(generator.roll_count(5, &mut ScriptedRolls::constant(0.6)), 3);
        assert_eq!(generator.roll_count(1, &mut ScriptedRolls::constant(0.99)), 1);
    }

    #[test]
    fn test_weight_halved_below_min_power() {
        let config = HazardConfig::default();
        let generator = HazardGenerator::new(&config);
        assert_eq!(generator.weight(EncounterKind::LightningStrike, 2), 5.0);
        assert_eq!(generator.weight(EncounterKind::LightningStrike, 5), 10.0);
        assert_eq!(generator.weight(EncounterKind::BombTrap, 1), 20.0);
    }

    #[test]
    fn test_intensity_modifiers() {
        let config = HazardConfig::default();
        let generator = HazardGenerator::new(&config);
        assert!((generator.intensity(EncounterKind::Treasure, 3) - 0.6).abs() < 1e-9);
        assert!((generator.intensity(EncounterKind::BombTrap, 4) - 1.0).abs() < 1e-9);
        assert!(generator.intensity(EncounterKind::GreenFog, 4) < 0.8);
    }

    #[test]
    fn test_generate_counts_in_range() {
        let config = HazardConfig::default();
        let generator = HazardGenerator::new(&config);
        let mut rng = DeterministicRng::new(77);
        for _ in 0..200 {
            let roll = generator.generate(6, &mut rng);
            assert!(!roll.encounters.is_empty());
            for entry in &roll.encounters {
                assert!(entry.count >= 1 && entry.count <= roll.hazard_level as u32 + 1);
            }
        }
    }

    proptest! {
        #[test]
        fn prop_hazard_level_in_bounds(base in 1u8..=7, seed in any::<u64>()) {
            let config = HazardConfig::default();
            let generator = HazardGenerator::new(&config);
            let mut rng = DeterministicRng::new(seed);
            let roll = generator.generate(base, &mut rng);
            prop_assert!((1..=7).contains(&roll.hazard_level));
        }

        #[test]
        fn prop_no_duplicate_kinds(base in 1u8..=7, seed in any::<u64>()) {
            let config = HazardConfig::default();
            let generator = HazardGenerator::new(&config);
            let mut rng = DeterministicRng::new(seed);
            let roll = generator.generate(base, &mut rng);
            let kinds: BTreeSet<_> = roll.encounters.iter().map(|e| e.kind).collect();
            prop_assert_eq!(kinds.len(), roll.encounters.len());
        }
    }
}
