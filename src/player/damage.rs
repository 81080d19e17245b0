//! Damage computation.
//!
//! Pure arithmetic; persistence happens in [`crate::player::status`].
//!
//! ```text
//! scaled    = ceil(base * (1 + (power - 1) * 0.25))
//! pre_armor = round(scaled * (1 ± variance))
//! actual    = max(1, round(pre_armor * (1 - armor_reduction)))
//! ```

use serde::{Deserialize, Serialize};

use crate::config::HazardConfig;
use crate::core::RollSource;
use crate::mine::encounter::EncounterKind;
use crate::player::armor::{armor_reduction, armor_wear, mitigate};

/// Kind of harm, for health-store bookkeeping and armor wear.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageSource {
    /// Rock closing in (portal into rock, wall trap).
    Crush,
    /// Bomb blast.
    Explosion,
    /// Green fog.
    Poison,
    /// Fire blast.
    Fire,
    /// Lightning strike.
    Lightning,
}

impl DamageSource {
    /// Source used by a hazard kind; treasure deals no damage.
    pub fn for_encounter(kind: EncounterKind) -> Option<Self> {
        match kind {
            EncounterKind::PortalTrap | EncounterKind::WallTrap => Some(DamageSource::Crush),
            EncounterKind::BombTrap => Some(DamageSource::Explosion),
            EncounterKind::GreenFog => Some(DamageSource::Poison),
            EncounterKind::FireBlast => Some(DamageSource::Fire),
            EncounterKind::LightningStrike => Some(DamageSource::Lightning),
            EncounterKind::Treasure | EncounterKind::RareTreasure => None,
        }
    }
}

/// Everything decided about one hit before it is applied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DamageRoll {
    /// After power scaling.
    pub scaled: u32,
    /// After variance.
    pub pre_armor: u32,
    /// Fraction removed by armor.
    pub reduction: f64,
    /// Health actually lost.
    pub actual: u32,
    /// Durability the armor loses.
    pub armor_wear: u32,
}

/// `ceil(base * power_scale)`.
pub fn scaled_damage(base: u32, power_level: u8, config: &HazardConfig) -> u32 {
    (base as f64 * config.power_scale(power_level)).ceil() as u32
}

/// Scaled damage with ± variance applied.
pub fn roll_pre_armor(base: u32, power_level: u8, config: &HazardConfig, rng: &mut dyn RollSource) -> u32 {
    let scaled = scaled_damage(base, power_level, config);
    if scaled == 0 {
        return 0;
    }
    let v = config.damage_variance;
    let factor = 1.0 + rng.range_f64(-v, v);
    ((scaled as f64 * factor).round() as u32).max(1)
}

/// Roll a full hit against `armor_points` of protection.
pub fn roll_damage(
    base: u32,
    base_wear: u32,
    power_level: u8,
    armor_points: u32,
    config: &HazardConfig,
    rng: &mut dyn RollSource,
) -> DamageRoll {
    let scaled = scaled_damage(base, power_level, config);
    let pre_armor = roll_pre_armor(base, power_level, config, rng);
    let reduction = armor_reduction(armor_points, config);
    DamageRoll {
        scaled,
        pre_armor,
        reduction,
        actual: mitigate(pre_armor, reduction),
        armor_wear: if armor_points > 0 {
            armor_wear(base_wear, power_level, config)
        } else {
            0
        },
    }
}
