//! Treasure rolls.
//!
//! A find is one to three draws from the treasure table. Luck raises the
//! weight of valuable entries; the rare variant pushes further toward the
//! top of the table. Each draw is split between the finder and the shared
//! pool according to the entry's destination.

use std::collections::BTreeMap;

use crate::config::{HazardConfig, LootDestination, LootEntry};
use crate::core::RollSource;
use crate::error::{EngineError, Result};
use crate::resolve::effect::LootShare;

/// Extra weight multiplier given to the most valuable entry on a rare find.
pub const RARE_VALUE_BIAS: f64 = 4.0;

/// Draws per find.
pub const MIN_DRAWS: i32 = 1;
/// Draws per find.
pub const MAX_DRAWS: i32 = 3;

/// Weight of one entry for a given luck and rarity.
pub fn entry_weight(entry: &LootEntry, max_value: u64, luck: u32, rare: bool, config: &HazardConfig) -> f64 {
    if entry.weight <= 0.0 {
        return 0.0;
    }
    let bias = if max_value == 0 {
        0.0
    } else {
        entry.value as f64 / max_value as f64
    };
    let mut weight = entry.weight * (1.0 + luck as f64 * config.luck_weight_per_point * bias);
    if rare {
        weight *= 1.0 + RARE_VALUE_BIAS * bias;
    }
    weight
}

/// Split a quantity by destination: `(personal, shared)`.
pub fn split(quantity: u32, destination: LootDestination) -> (u32, u32) {
    match destination {
        LootDestination::Personal => (quantity, 0),
        LootDestination::Shared => (0, quantity),
        LootDestination::Split => {
            let personal = quantity.div_ceil(2);
            (personal, quantity - personal)
        }
    }
}

/// Roll a find. Repeated draws of one item are merged.
pub fn roll_treasure(config: &HazardConfig, luck: u32, rare: bool, rng: &mut dyn RollSource) -> Result<Vec<LootShare>> {
    let table = &config.treasure;
    let max_value = table.iter().map(|e| e.value).max().unwrap_or(0);
    let weights: Vec<f64> = table
        .iter()
        .map(|e| entry_weight(e, max_value, luck, rare, config))
        .collect();
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(EngineError::InvalidConfig("treasure table has no weight".into()));
    }

    let draws = rng.range_inclusive(MIN_DRAWS, MAX_DRAWS);
    let mut found: BTreeMap<String, (u64, u32, LootDestination)> = BTreeMap::new();
    for _ in 0..draws {
        let entry = &table[pick(&weights, total, rng)];
        let quantity = rng.range_inclusive(1, entry.max_quantity.max(1) as i32) as u32;
        found
            .entry(entry.item.clone())
            .or_insert((entry.value, 0, entry.destination))
            .1 += quantity;
    }

    Ok(found
        .into_iter()
        .map(|(item, (unit_value, quantity, destination))| {
            let (personal, shared) = split(quantity, destination);
            LootShare {
                item,
                unit_value,
                personal,
                shared,
            }
        })
        .collect())
}

fn pick(weights: &[f64], total: f64, rng: &mut dyn RollSource) -> usize {
    let mut roll = rng.unit() * total;
    for (i, w) in weights.iter().enumerate() {
        if roll < *w {
            return i;
        }
        roll -= w;
    }
    // Float slack lands on the last weighted entry.
    weights.iter().rposition(|w| *w > 0.0).unwrap_or(0)
}
