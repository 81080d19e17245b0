//! Player Module
//!
//! Health, armor and gear for players inside a mine.
//!
//! - `bonus`: equipped items and the bonus registry
//! - `armor`: armor selection and mitigation curve
//! - `damage`: damage scaling and variance
//! - `status`: damage application, death and revival

pub mod armor;
pub mod bonus;
pub mod damage;
pub mod status;

pub use armor::{armor_reduction, best_armor, mitigate};
pub use bonus::{AutoRevive, BonusRegistry, EquippedItem, GearBonuses, ItemSlot};
pub use damage::{roll_damage, DamageRoll, DamageSource};
pub use status::{DamageOutcome, PlayerStatusTracker};
