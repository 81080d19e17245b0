//! Deepmine demo driver
//!
//! Builds a few in-memory mine instances and runs the tick scheduler over
//! them for a handful of cycles.

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use deepmine::{
    core::{ChannelId, DeterministicRng, PlayerId, Position, RollSource},
    mine::{Encounter, HazardGenerator, MineInstance, Tile, TileGrid, TileKind},
    player::{EquippedItem, ItemSlot},
    session::{ChannelOutcome, ScriptRegistry, TickScheduler},
    store::memory::in_memory,
    EngineConfig, VERSION,
};

const DEMO_CYCLES: usize = 6;
const GRID_SIZE: i32 = 24;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("installing tracing subscriber")?;

    info!("Deepmine Engine v{}", VERSION);

    let config = EngineConfig::from_env().context("engine configuration")?;
    info!(
        "Tick interval: {:?}, max parallel: {}",
        config.scheduler.tick_interval(),
        config.scheduler.max_parallel
    );

    let (collaborators, mem) = in_memory();

    let mut surface = build_instance(&config, ChannelId(100), 2, 0x5eed_0001)?;
    let mut deeper_rng = DeterministicRng::new(0x5eed_0002);
    let deeper_grid = build_grid(&mut deeper_rng)?;
    let mut deeper = surface.child(ChannelId(101), deeper_grid, 3, 0x5eed_0002);
    scatter_encounters(&config, &mut deeper, &mut deeper_rng)?;

    let players = [PlayerId(1), PlayerId(2), PlayerId(3)];
    for player in players {
        surface.add_player(player);
        mem.health.set(player, surface.channel, 100, 100);
    }
    deeper.add_player(PlayerId(4));
    mem.health.set(PlayerId(4), deeper.channel, 100, 100);

    mem.equipment.equip(PlayerId(1), EquippedItem::new("iron_bracers", ItemSlot::Armor, 50).with_armor(10));
    mem.equipment.equip(PlayerId(1), EquippedItem::new("steel_pickaxe", ItemSlot::Tool, 80));
    mem.equipment.equip(PlayerId(2), EquippedItem::new("gas_mask", ItemSlot::Accessory, 30));
    mem.equipment.equip(PlayerId(2), EquippedItem::new("lucky_charm", ItemSlot::Accessory, 1).with_quantity(2));
    mem.equipment.equip(PlayerId(4), EquippedItem::new("phoenix_feather", ItemSlot::Accessory, 1));
    mem.equipment.equip(PlayerId(4), EquippedItem::new("earthshaker", ItemSlot::Tool, 1).unique());

    mem.instances.insert(&surface)?;
    mem.instances.insert(&deeper)?;

    let scheduler = TickScheduler::new(&config, collaborators, ScriptRegistry::with_standard(&config.scheduler));
    info!("Scheduler {} ready", scheduler.owner());

    for _ in 0..DEMO_CYCLES {
        let report = scheduler.run_cycle().await;
        info!(
            "cycle {}: {} completed, {} skipped, {} lock(s) swept",
            report.cycle,
            report.completed(),
            report.skipped(),
            report.swept
        );
        for (channel, outcome) in &report.outcomes {
            match outcome {
                ChannelOutcome::Completed(summary) => info!(
                    "  {}: {} action(s), {} move(s), {} encounter(s), {} death(s)",
                    channel, summary.actions, summary.moves, summary.encounters, summary.deaths
                ),
                other => warn!("  {}: {:?}", channel, other),
            }
        }
    }

    for channel in [ChannelId(100), ChannelId(101)] {
        let Some(instance) = mem.instances.get(channel) else {
            continue;
        };
        info!(
            "=== {} (depth {}, power {}, hazard {}) at tick {} ===",
            channel, instance.depth, instance.power_level, instance.hazard_level, instance.tick
        );
        info!(
            "Encounters left: {}, loot pool value: {}",
            instance.encounters.len(),
            instance.loot.total_value()
        );
        for event in instance.history.iter() {
            info!("  [{}] {}", event.tick, event.message);
        }
    }

    for player in [PlayerId(1), PlayerId(2), PlayerId(3), PlayerId(4)] {
        let granted = mem.equipment.granted(player);
        if !granted.is_empty() {
            info!("{} found {:?}", player, granted);
        }
    }

    info!("=== Demo Complete ===");
    Ok(())
}

/// A top-level instance with a generated grid and encounter scatter.
fn build_instance(config: &EngineConfig, channel: ChannelId, power: u8, seed: u64) -> anyhow::Result<MineInstance> {
    let mut rng = DeterministicRng::new(seed);
    let grid = build_grid(&mut rng)?;
    let mut instance = MineInstance::new(channel, "standard", power, 1, grid, seed);
    scatter_encounters(config, &mut instance, &mut rng)?;
    Ok(instance)
}

/// Rock with an open entrance corridor, ore veins and a few chests.
fn build_grid(rng: &mut DeterministicRng) -> anyhow::Result<TileGrid> {
    let entrance = Position::new(GRID_SIZE / 2, 0);
    let mut grid = TileGrid::filled(GRID_SIZE, GRID_SIZE, TileKind::Floor, entrance)?;

    for y in 1..GRID_SIZE {
        for x in 0..GRID_SIZE {
            let pos = Position::new(x, y);
            if (x - entrance.x).abs() <= 1 && y < 4 {
                continue;
            }
            let kind = match rng.below(100) {
                0..=44 => TileKind::Wall,
                45..=54 => TileKind::WallWithOre,
                55..=57 => TileKind::RareOre,
                58 => TileKind::TreasureChest,
                _ => TileKind::Floor,
            };
            grid.set(pos, Tile::new(kind))?;
        }
    }
    Ok(grid)
}

/// Roll the instance's hazard and place each encounter on random floor.
fn scatter_encounters(
    config: &EngineConfig,
    instance: &mut MineInstance,
    rng: &mut DeterministicRng,
) -> anyhow::Result<()> {
    let roll = HazardGenerator::new(&config.hazard).generate(instance.power_level, rng);
    instance.hazard_level = roll.hazard_level;

    let entrance = instance.entrance();
    let mut floor: Vec<Position> = (0..GRID_SIZE)
        .flat_map(|y| (0..GRID_SIZE).map(move |x| Position::new(x, y)))
        .filter(|pos| *pos != entrance && instance.grid.kind_at(*pos) == Some(TileKind::Floor))
        .collect();
    rng.shuffle(&mut floor);

    let mut slots = floor.into_iter();
    for entry in &roll.encounters {
        for _ in 0..entry.count {
            let Some(pos) = slots.next() else {
                warn!("{}: no free floor left for {:?}", instance.channel, entry.kind);
                return Ok(());
            };
            instance.encounters.insert(pos, Encounter::new(entry.kind, entry.intensity))?;
        }
    }
    info!(
        "{}: hazard {} with {} encounter(s)",
        instance.channel,
        roll.hazard_level,
        instance.encounters.len()
    );
    Ok(())
}
