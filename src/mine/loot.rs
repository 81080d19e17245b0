//! Shared loot pool.
//!
//! Items mined or found for the group accumulate here until the instance is
//! torn down. Each contributor is credited with the value they added; when
//! the pool loses value (fire), every credit shrinks by the same ratio.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::PlayerId;

/// A stacked item in the pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolItem {
    /// Item key.
    pub item: String,
    /// Units held.
    pub quantity: u32,
    /// Value per unit.
    pub unit_value: u64,
}

/// Quantities removed by one burn.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BurnReport {
    /// `(item, units burned)` for every item that lost units.
    pub burned: Vec<(String, u32)>,
    /// Pool value before minus after.
    pub value_lost: u64,
}

impl BurnReport {
    /// Total units burned.
    pub fn units(&self) -> u32 {
        self.burned.iter().map(|(_, q)| *q).sum()
    }
}

/// Group loot pool with per-player credit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootPool {
    items: BTreeMap<String, PoolItem>,
    credits: BTreeMap<PlayerId, u64>,
}

impl LootPool {
    /// Empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add units and credit the contributor with their value.
    pub fn deposit(&mut self, player: PlayerId, item: &str, quantity: u32, unit_value: u64) {
        if quantity == 0 {
            return;
        }
        let entry = self.items.entry(item.to_string()).or_insert_with(|| PoolItem {
            item: item.to_string(),
            quantity: 0,
            unit_value,
        });
        entry.quantity = entry.quantity.saturating_add(quantity);
        *self.credits.entry(player).or_insert(0) += unit_value * quantity as u64;
    }

    /// Burn `ceil(quantity * fraction)` units of every item (never more than
    /// held) and shrink all credits proportionally to the value lost.
    pub fn burn(&mut self, fraction: f64) -> BurnReport {
        let mut report = BurnReport::default();
        if fraction <= 0.0 || self.items.is_empty() {
            return report;
        }
        let fraction = fraction.min(1.0);
        let before = self.total_value();

        for entry in self.items.values_mut() {
            let burned = ((entry.quantity as f64 * fraction).ceil() as u32).min(entry.quantity);
            if burned > 0 {
                entry.quantity -= burned;
                report.burned.push((entry.item.clone(), burned));
            }
        }
        self.items.retain(|_, e| e.quantity > 0);

        let after = self.total_value();
        report.value_lost = before.saturating_sub(after);

        if before > 0 {
            for credit in self.credits.values_mut() {
                *credit = ((*credit as u128 * after as u128) / before as u128) as u64;
            }
        }
        report
    }

    /// Units of an item.
    pub fn quantity(&self, item: &str) -> u32 {
        self.items.get(item).map(|e| e.quantity).unwrap_or(0)
    }

    /// Sum of quantity × unit value.
    pub fn total_value(&self) -> u64 {
        self.items
            .values()
            .map(|e| e.unit_value * e.quantity as u64)
            .sum()
    }

    /// Value credited to a player.
    pub fn credited_value(&self, player: PlayerId) -> u64 {
        self.credits.get(&player).copied().unwrap_or(0)
    }

    /// Items in key order.
    pub fn items(&self) -> impl Iterator<Item = &PoolItem> {
        self.items.values()
    }

    /// Empty the pool, returning items and credits for distribution.
    pub fn drain(&mut self) -> (Vec<PoolItem>, BTreeMap<PlayerId, u64>) {
        let items = std::mem::take(&mut self.items).into_values().collect();
        let credits = std::mem::take(&mut self.credits);
        (items, credits)
    }

    /// Nothing in the pool.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
