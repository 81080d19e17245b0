//! Tile grid.
//!
//! Row-major storage of tiles plus the entrance coordinate. The grid is
//! passive: only the resolution engine and mining actions change tile kinds.

use serde::{Deserialize, Serialize};

use crate::core::{Position, RollSource};
use crate::error::{EngineError, Result};

/// Kind of a single tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    /// Plain rock.
    Wall,
    /// Open ground.
    Floor,
    /// Mine entrance; never converted.
    Entrance,
    /// Rock carrying ore.
    WallWithOre,
    /// Rock carrying rare ore.
    RareOre,
    /// Rock raised by a wall trap.
    ReinforcedWall,
    /// Sealed chest; opens like a treasure encounter when broken.
    TreasureChest,
}

impl TileKind {
    /// Players can stand on it without mining.
    pub const fn is_walkable(self) -> bool {
        matches!(self, TileKind::Floor | TileKind::Entrance)
    }

    /// Rock of any kind. Chests are not rock.
    pub const fn is_wall_type(self) -> bool {
        matches!(
            self,
            TileKind::Wall | TileKind::WallWithOre | TileKind::RareOre | TileKind::ReinforcedWall
        )
    }

    /// Hits needed to break a freshly generated tile of this kind.
    pub const fn base_hardness(self) -> u32 {
        match self {
            TileKind::Floor | TileKind::Entrance => 0,
            TileKind::Wall | TileKind::TreasureChest => 1,
            TileKind::WallWithOre => 2,
            TileKind::RareOre => 3,
            TileKind::ReinforcedWall => 4,
        }
    }
}

/// One grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    /// Current kind.
    pub kind: TileKind,
    /// Seen by any player.
    pub discovered: bool,
    /// Remaining mining hits.
    pub hardness: u32,
}

impl Tile {
    /// Fresh, undiscovered tile with its base hardness.
    pub const fn new(kind: TileKind) -> Self {
        Self {
            kind,
            discovered: false,
            hardness: kind.base_hardness(),
        }
    }

    /// Turn into open floor.
    pub fn clear(&mut self) {
        self.kind = TileKind::Floor;
        self.hardness = 0;
    }
}

/// Rectangular tile grid with a single entrance.
///
/// Decoding checks the same shape rules as [`TileGrid::filled`], so a
/// stored grid always has exactly `width * height` tiles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGrid")]
pub struct TileGrid {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
    entrance: Position,
}

#[derive(Deserialize)]
struct RawGrid {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
    entrance: Position,
}

impl TryFrom<RawGrid> for TileGrid {
    type Error = EngineError;

    fn try_from(raw: RawGrid) -> Result<Self> {
        let RawGrid { width, height, tiles, entrance } = raw;
        let expected = tile_count(width, height)?;
        if tiles.len() != expected {
            return Err(EngineError::InvalidConfig(format!(
                "{width}x{height} grid needs {expected} tiles, found {}",
                tiles.len()
            )));
        }
        let grid = Self { width, height, tiles, entrance };
        if !grid.in_bounds(entrance) {
            return Err(EngineError::OutOfBounds(entrance));
        }
        Ok(grid)
    }
}

fn tile_count(width: i32, height: i32) -> Result<usize> {
    let invalid = || EngineError::InvalidConfig(format!("grid dimensions must be positive, got {width}x{height}"));
    if width <= 0 || height <= 0 {
        return Err(invalid());
    }
    (width as usize).checked_mul(height as usize).ok_or_else(invalid)
}

impl TileGrid {
    /// Grid filled with one kind; the entrance tile is set to `Entrance`.
    pub fn filled(width: i32, height: i32, kind: TileKind, entrance: Position) -> Result<Self> {
        let count = tile_count(width, height)?;
        let mut grid = Self {
            width,
            height,
            tiles: vec![Tile::new(kind); count],
            entrance,
        };
        if !grid.in_bounds(entrance) {
            return Err(EngineError::OutOfBounds(entrance));
        }
        grid.set(entrance, Tile::new(TileKind::Entrance))?;
        Ok(grid)
    }

    /// Width in tiles.
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Height in tiles.
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Entrance coordinate.
    pub fn entrance(&self) -> Position {
        self.entrance
    }

    /// Whether the position lies inside the grid.
    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    fn index(&self, pos: Position) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| (pos.y * self.width + pos.x) as usize)
    }

    /// Tile at a position.
    pub fn get(&self, pos: Position) -> Option<&Tile> {
        self.index(pos).and_then(|i| self.tiles.get(i))
    }

    /// Mutable tile at a position.
    pub fn get_mut(&mut self, pos: Position) -> Option<&mut Tile> {
        self.index(pos).and_then(move |i| self.tiles.get_mut(i))
    }

    /// Kind at a position, `None` when out of bounds.
    pub fn kind_at(&self, pos: Position) -> Option<TileKind> {
        self.get(pos).map(|t| t.kind)
    }

    /// Replace a tile, keeping its discovered flag.
    pub fn set(&mut self, pos: Position, tile: Tile) -> Result<()> {
        let slot = self.get_mut(pos).ok_or(EngineError::OutOfBounds(pos))?;
        let discovered = slot.discovered;
        *slot = Tile { discovered: discovered || tile.discovered, ..tile };
        Ok(())
    }

    /// In-bounds eight-neighbourhood.
    pub fn neighbors8(&self, pos: Position) -> impl Iterator<Item = Position> + '_ {
        pos.neighbors8().filter(move |p| self.in_bounds(*p))
    }

    /// Whether any in-bounds neighbour can be stood on.
    pub fn has_walkable_neighbor(&self, pos: Position) -> bool {
        self.neighbors8(pos)
            .any(|p| self.kind_at(p).is_some_and(TileKind::is_walkable))
    }

    /// All in-bounds positions within `radius` (Euclidean) of `center`.
    pub fn positions_within(&self, center: Position, radius: i32) -> Vec<Position> {
        let r2 = (radius as i64) * (radius as i64);
        let mut out = Vec::new();
        for y in (center.y - radius)..=(center.y + radius) {
            for x in (center.x - radius)..=(center.x + radius) {
                let p = Position::new(x, y);
                if self.in_bounds(p) && p.distance_squared(center) <= r2 {
                    out.push(p);
                }
            }
        }
        out
    }

    /// Mark every tile within `radius` as discovered. Returns how many were new.
    pub fn reveal_around(&mut self, center: Position, radius: i32) -> usize {
        let mut newly = 0;
        for p in self.positions_within(center, radius) {
            if let Some(tile) = self.get_mut(p) {
                if !tile.discovered {
                    tile.discovered = true;
                    newly += 1;
                }
            }
        }
        newly
    }

    /// Uniformly random position that is not the entrance.
    pub fn random_non_entrance(&self, rng: &mut dyn RollSource) -> Option<Position> {
        let total = (self.width * self.height) as u32;
        if total <= 1 {
            return None;
        }
        // Sample over every index except the entrance's.
        let entrance_idx = (self.entrance.y * self.width + self.entrance.x) as u32;
        let mut idx = rng.below(total - 1);
        if idx >= entrance_idx {
            idx += 1;
        }
        Some(Position::new((idx as i32) % self.width, (idx as i32) / self.width))
    }

    /// Count tiles of a kind.
    pub fn count(&self, kind: TileKind) -> usize {
        self.tiles.iter().filter(|t| t.kind == kind).count()
    }
}
