//! Armor mitigation.
//!
//! Armor points convert to a fractional reduction with diminishing
//! returns: `points / (points + half_point)`, capped at the configured
//! maximum. At least one point of damage always gets through.

use crate::config::HazardConfig;
use crate::player::bonus::{EquippedItem, ItemSlot};

/// Highest-rated intact armor piece.
pub fn best_armor(items: &[EquippedItem]) -> Option<&EquippedItem> {
    items
        .iter()
        .filter(|i| i.slot == ItemSlot::Armor && i.armor_points > 0 && (i.durability > 0 || i.unique))
        .max_by_key(|i| i.armor_points)
}

/// Fractional reduction for a point total.
pub fn armor_reduction(points: u32, config: &HazardConfig) -> f64 {
    if points == 0 {
        return 0.0;
    }
    let p = points as f64;
    (p / (p + config.armor_half_point)).min(config.armor_max_reduction)
}

/// Damage after reduction; never below 1 when `pre_armor > 0`.
pub fn mitigate(pre_armor: u32, reduction: f64) -> u32 {
    if pre_armor == 0 {
        return 0;
    }
    let after = (pre_armor as f64 * (1.0 - reduction.clamp(0.0, 1.0))).round() as u32;
    after.max(1)
}

/// Durability the armor loses for one hit: base wear scaled by power.
pub fn armor_wear(base_wear: u32, power_level: u8, config: &HazardConfig) -> u32 {
    (base_wear as f64 * config.power_scale(power_level)).ceil() as u32
}
