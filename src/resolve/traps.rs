//! Per-encounter effect computation.
//!
//! Each handler is a pure function of an [`EffectContext`] and the tick's
//! roll source. Damage variance is rolled later, when the hit is applied.

use crate::core::{Position, RollSource};
use crate::error::{EngineError, Result};
use crate::mine::encounter::EncounterKind;
use crate::mine::tile::{Tile, TileKind};
use crate::player::damage::DamageSource;
use crate::resolve::effect::{DamageSpec, Effect, EffectContext};
use crate::resolve::treasure::roll_treasure;

/// Compute the effect of `kind` firing at `ctx.position`.
pub fn compute(kind: EncounterKind, ctx: &EffectContext<'_>, rng: &mut dyn RollSource) -> Result<Effect> {
    match kind {
        EncounterKind::PortalTrap => portal_trap(ctx, rng),
        EncounterKind::BombTrap => bomb_trap(ctx),
        EncounterKind::GreenFog => green_fog(ctx),
        EncounterKind::WallTrap => wall_trap(ctx),
        EncounterKind::FireBlast => fire_blast(ctx),
        EncounterKind::LightningStrike => lightning_strike(ctx, rng),
        EncounterKind::Treasure => treasure(ctx, false, rng),
        EncounterKind::RareTreasure => treasure(ctx, true, rng),
    }
}

fn hit(ctx: &EffectContext<'_>, kind: EncounterKind) -> Result<DamageSpec> {
    let source = DamageSource::for_encounter(kind)
        .ok_or_else(|| EngineError::InvalidConfig(format!("{kind} deals no damage")))?;
    let tuning = ctx.config.tuning(kind)?;
    Ok(DamageSpec {
        base: tuning.base_damage,
        armor_wear: tuning.armor_wear,
        source,
    })
}

/// Teleport to a random non-entrance tile; landing in rock crushes.
pub fn portal_trap(ctx: &EffectContext<'_>, rng: &mut dyn RollSource) -> Result<Effect> {
    let kind = EncounterKind::PortalTrap;
    let Some(dest) = ctx.grid.random_non_entrance(rng) else {
        return Ok(Effect::nothing(kind, format!("A portal flickered under {} and died out", ctx.player)));
    };

    let in_rock = ctx.grid.kind_at(dest).is_some_and(TileKind::is_wall_type);
    let mut effect = Effect::nothing(
        kind,
        if in_rock {
            format!("{} was pulled through a portal and wedged into solid rock at {}", ctx.player, dest)
        } else {
            format!("{} was pulled through a portal to {}", ctx.player, dest)
        },
    );
    effect.relocate = Some(dest);
    if in_rock {
        effect.damage = Some(hit(ctx, kind)?);
    }
    Ok(effect)
}

/// Clear rock within the blast radius and hurt the player.
pub fn bomb_trap(ctx: &EffectContext<'_>) -> Result<Effect> {
    let kind = EncounterKind::BombTrap;
    let damage = hit(ctx, kind)?;
    let radius = ctx.config.bomb_radius_at(ctx.power_level);
    let entrance = ctx.grid.entrance();

    let tile_changes: Vec<(Position, Tile)> = ctx
        .grid
        .positions_within(ctx.position, radius)
        .into_iter()
        .filter(|p| *p != entrance)
        .filter(|p| ctx.grid.kind_at(*p).is_some_and(TileKind::is_wall_type))
        .map(|p| (p, Tile::new(TileKind::Floor)))
        .collect();

    let mut effect = Effect::nothing(
        kind,
        format!(
            "A bomb went off under {}, blasting open {} tile(s)",
            ctx.player,
            tile_changes.len()
        ),
    )
    .with_damage(damage);
    effect.tile_changes = tile_changes;
    Ok(effect)
}

/// Poison plus durability loss on every non-unique equipped item.
pub fn green_fog(ctx: &EffectContext<'_>) -> Result<Effect> {
    let kind = EncounterKind::GreenFog;
    let damage = hit(ctx, kind)?;

    let raw = ctx.config.fog_durability_damage as f64 * ctx.config.power_scale(ctx.power_level);
    let kept = 1.0 - ctx.loadout.bonuses.durability_reduction;
    let wear = (raw * kept).ceil() as u32;

    let mut effect = Effect::nothing(kind, format!("{} choked on a cloud of green fog", ctx.player)).with_damage(damage);
    if wear > 0 {
        effect.item_wear = ctx
            .loadout
            .items
            .iter()
            .filter(|i| !i.unique)
            .map(|i| (i.key.clone(), wear))
            .collect();
    }
    Ok(effect)
}

/// Raise reinforced walls on every neighbouring floor tile.
pub fn wall_trap(ctx: &EffectContext<'_>) -> Result<Effect> {
    let kind = EncounterKind::WallTrap;
    let damage = hit(ctx, kind)?;
    let hardness = ctx.config.wall_trap_hardness_at(ctx.power_level);

    let tile_changes: Vec<(Position, Tile)> = ctx
        .grid
        .neighbors8(ctx.position)
        .filter(|p| ctx.grid.kind_at(*p) == Some(TileKind::Floor))
        .map(|p| {
            (
                p,
                Tile {
                    hardness,
                    ..Tile::new(TileKind::ReinforcedWall)
                },
            )
        })
        .collect();

    // Only the entrance can stay open once every floor neighbour is sealed.
    let trapped = !ctx
        .grid
        .neighbors8(ctx.position)
        .any(|p| ctx.grid.kind_at(p) == Some(TileKind::Entrance));

    let message = if trapped {
        format!("Walls slammed shut around {}; they are trapped", ctx.player)
    } else {
        format!("Walls slammed shut around {}", ctx.player)
    };
    let mut effect = Effect::nothing(kind, message).with_damage(damage);
    effect.tile_changes = tile_changes;
    Ok(effect)
}

/// Scorch the player and burn part of the shared pool.
pub fn fire_blast(ctx: &EffectContext<'_>) -> Result<Effect> {
    let kind = EncounterKind::FireBlast;
    let damage = hit(ctx, kind)?;
    let mut effect = Effect::nothing(kind, format!("A fire blast engulfed {}", ctx.player)).with_damage(damage);
    effect.burn_fraction = Some(ctx.config.burn_fraction_at(ctx.power_level));
    Ok(effect)
}

/// Stun and damage on a hit, nothing on a miss.
pub fn lightning_strike(ctx: &EffectContext<'_>, rng: &mut dyn RollSource) -> Result<Effect> {
    let kind = EncounterKind::LightningStrike;
    if !rng.chance(ctx.config.lightning_stun_chance) {
        return Ok(Effect::nothing(kind, format!("Lightning cracked next to {} and missed", ctx.player)));
    }
    let damage = hit(ctx, kind)?;
    let actions = ctx.config.lightning_stun_actions;
    let mut effect = Effect::nothing(
        kind,
        format!("Lightning struck {}, stunning them for {} action(s)", ctx.player, actions),
    )
    .with_damage(damage);
    effect.stun = Some(actions);
    Ok(effect)
}

/// Roll items, split between finder and pool.
pub fn treasure(ctx: &EffectContext<'_>, rare: bool, rng: &mut dyn RollSource) -> Result<Effect> {
    let kind = if rare {
        EncounterKind::RareTreasure
    } else {
        EncounterKind::Treasure
    };
    let loot = roll_treasure(ctx.config, ctx.loadout.bonuses.luck, rare, rng)?;
    let value: u64 = loot.iter().map(|s| s.value()).sum();
    let listing = loot
        .iter()
        .map(|s| format!("{}x {}", s.quantity(), s.item))
        .collect::<Vec<_>>()
        .join(", ");
    let mut effect = Effect::nothing(
        kind,
        format!("{} found {} worth {}", ctx.player, listing, value),
    );
    effect.loot = loot;
    Ok(effect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HazardConfig;
    use crate::core::rng::ScriptedRolls;
    use crate::core::{DeterministicRng, PlayerId};
    use crate::mine::tile::TileGrid;
    use crate::player::bonus::{EquippedItem, GearBonuses, ItemSlot};
    use crate::store::Loadout;

    fn ctx<'a>(config: &'a HazardConfig, grid: &'a TileGrid, loadout: &'a Loadout, pos: Position) -> EffectContext<'a> {
        EffectContext {
            config,
            grid,
            player: PlayerId(1),
            position: pos,
            power_level: 3,
            loadout,
        }
    }

    #[test]
    fn test_bomb_clears_rock_but_not_entrance() {
        let config = HazardConfig::default();
        let grid = TileGrid::filled(9, 9, TileKind::Wall, Position::new(4, 3)).unwrap();
        let loadout = Loadout::default();
        let center = Position::new(4, 4);
        let effect = bomb_trap(&ctx(&config, &grid, &loadout, center)).unwrap();

        let radius = config.bomb_radius_at(3);
        let expected = grid
            .positions_within(center, radius)
            .into_iter()
            .filter(|p| *p != grid.entrance())
            .count();
        assert_eq!(effect.tile_changes.len(), expected);
        assert!(effect.tile_changes.iter().all(|(p, t)| *p != grid.entrance() && t.kind == TileKind::Floor));
        assert_eq!(effect.damage.unwrap().source, DamageSource::Explosion);
    }

    #[test]
    fn test_wall_trap_seals_floor_neighbours() {
        let config = HazardConfig::default();
        let grid = TileGrid::filled(5, 5, TileKind::Floor, Position::new(0, 0)).unwrap();
        let loadout = Loadout::default();
        let effect = wall_trap(&ctx(&config, &grid, &loadout, Position::new(2, 2))).unwrap();

        assert_eq!(effect.tile_changes.len(), 8);
        assert!(effect
            .tile_changes
            .iter()
            .all(|(_, t)| t.kind == TileKind::ReinforcedWall && t.hardness == config.wall_trap_hardness_at(3)));
        assert!(effect.message.contains("trapped"));
    }

    #[test]
    fn test_wall_trap_next_to_entrance_leaves_exit() {
        let config = HazardConfig::default();
        let grid = TileGrid::filled(5, 5, TileKind::Floor, Position::new(1, 1)).unwrap();
        let loadout = Loadout::default();
        let effect = wall_trap(&ctx(&config, &grid, &loadout, Position::new(2, 2))).unwrap();
        assert_eq!(effect.tile_changes.len(), 7);
        assert!(!effect.message.contains("trapped"));
    }

    #[test]
    fn test_damage_sources_follow_encounter_kind() {
        let config = HazardConfig::default();
        let grid = TileGrid::filled(5, 5, TileKind::Floor, Position::new(0, 0)).unwrap();
        let loadout = Loadout::default();
        let c = ctx(&config, &grid, &loadout, Position::new(2, 2));
        assert_eq!(fire_blast(&c).unwrap().damage.unwrap().source, DamageSource::Fire);
        assert_eq!(green_fog(&c).unwrap().damage.unwrap().source, DamageSource::Poison);
        assert_eq!(wall_trap(&c).unwrap().damage.unwrap().source, DamageSource::Crush);
        assert!(hit(&c, EncounterKind::Treasure).is_err());
    }

    #[test]
    fn test_portal_into_rock_crushes() {
        let config = HazardConfig::default();
        let grid = TileGrid::filled(4, 4, TileKind::Wall, Position::new(0, 0)).unwrap();
        let loadout = Loadout::default();
        let effect = portal_trap(&ctx(&config, &grid, &loadout, Position::new(1, 1)), &mut ScriptedRolls::constant(0.5)).unwrap();
        let dest = effect.relocate.unwrap();
        assert_ne!(dest, grid.entrance());
        assert_eq!(effect.damage.unwrap().source, DamageSource::Crush);
    }

    #[test]
    fn test_portal_onto_floor_is_harmless() {
        let config = HazardConfig::default();
        let grid = TileGrid::filled(4, 4, TileKind::Floor, Position::new(0, 0)).unwrap();
        let loadout = Loadout::default();
        let mut rng = DeterministicRng::new(3);
        for _ in 0..50 {
            let effect = portal_trap(&ctx(&config, &grid, &loadout, Position::new(1, 1)), &mut rng).unwrap();
            assert!(effect.damage.is_none());
            assert_ne!(effect.relocate.unwrap(), grid.entrance());
        }
    }

    #[test]
    fn test_fog_wear_skips_unique_and_applies_reduction() {
        let config = HazardConfig::default();
        let grid = TileGrid::filled(3, 3, TileKind::Floor, Position::new(0, 0)).unwrap();
        let loadout = Loadout {
            items: vec![
                EquippedItem::new("chainmail", ItemSlot::Armor, 40).with_armor(20),
                EquippedItem::new("earthshaker", ItemSlot::Tool, 10).unique(),
            ],
            bonuses: GearBonuses {
                durability_reduction: 0.5,
                ..Default::default()
            },
        };
        let effect = green_fog(&ctx(&config, &grid, &loadout, Position::new(1, 1))).unwrap();
        // ceil(10 * 1.5 * 0.5)
        assert_eq!(effect.item_wear, vec![("chainmail".to_string(), 8)]);
    }

    #[test]
    fn test_lightning_hit_and_miss() {
        let config = HazardConfig {
            lightning_stun_chance: 0.8,
            ..HazardConfig::default()
        };
        let grid = TileGrid::filled(3, 3, TileKind::Floor, Position::new(0, 0)).unwrap();
        let loadout = Loadout::default();
        let c = ctx(&config, &grid, &loadout, Position::new(1, 1));

        let struck = lightning_strike(&c, &mut ScriptedRolls::constant(0.5)).unwrap();
        assert_eq!(struck.stun, Some(config.lightning_stun_actions));
        assert!(struck.damage.is_some());

        let missed = lightning_strike(&c, &mut ScriptedRolls::constant(0.9)).unwrap();
        assert!(missed.stun.is_none() && missed.damage.is_none());
    }

    #[test]
    fn test_fire_burn_fraction_follows_power() {
        let config = HazardConfig::default();
        let grid = TileGrid::filled(3, 3, TileKind::Floor, Position::new(0, 0)).unwrap();
        let loadout = Loadout::default();
        let effect = fire_blast(&ctx(&config, &grid, &loadout, Position::new(1, 1))).unwrap();
        assert_eq!(effect.burn_fraction, Some(config.burn_fraction_at(3)));
    }

    #[test]
    fn test_missing_tuning_is_config_error() {
        let mut config = HazardConfig::default();
        config.encounters.remove(&EncounterKind::FireBlast);
        let grid = TileGrid::filled(3, 3, TileKind::Floor, Position::new(0, 0)).unwrap();
        let loadout = Loadout::default();
        let err = fire_blast(&ctx(&config, &grid, &loadout, Position::new(1, 1))).unwrap_err();
        assert!(err.is_config());
    }
}
