// Board occupancy: which tiles hold a machine and which are claimed by a mover.

use super::hex::{HexCoord, HexFacing};
use serde::Serialize;

pub type MachineId = u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tile {
    Empty,
    Reserved(MachineId),
    Occupied(MachineId),
}

/// The slice of the board a mover is allowed to see and change.
pub trait MovementGrid {
    fn is_on_board(&self, xy: HexCoord) -> bool;

    /// Neighbour of `xy` by facing, if it lies on the board.
    fn neighbour_tile(&self, xy: HexCoord, facing: HexFacing) -> Option<HexCoord>;

    fn is_tile_empty_and_unreserved(&self, xy: HexCoord) -> bool;

    /// Claims an empty tile for the machine currently standing on `from`.
    fn reserve_empty_tile(&mut self, from: HexCoord, xy: HexCoord);

    /// Commits a move: `to` must be reserved by the occupant of `from`.
    fn move_bot_from_tile_to_tile(&mut self, from: HexCoord, to: HexCoord);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexGrid {
    width: i8,
    height: i8,
    tiles: Vec<Tile>,
}

impl HexGrid {
    pub fn new(width: i8, height: i8) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            tiles: vec![Tile::Empty; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> i8 {
        self.width
    }

    pub fn height(&self) -> i8 {
        self.height
    }

    fn index(&self, xy: HexCoord) -> Option<usize> {
        if !xy.is_valid() || xy.x < 0 || xy.y < 0 || xy.x >= self.width || xy.y >= self.height {
            return None;
        }
        Some(xy.y as usize * self.width as usize + xy.x as usize)
    }

    pub fn tile(&self, xy: HexCoord) -> Option<Tile> {
        self.index(xy).map(|i| self.tiles[i])
    }

    /// Machine standing on `xy`, ignoring reservations.
    pub fn occupant(&self, xy: HexCoord) -> Option<MachineId> {
        match self.tile(xy)? {
            Tile::Occupied(id) => Some(id),
            _ => None,
        }
    }

    /// Places a machine on an empty tile. Returns false if the tile is off
    /// board or already taken.
    pub fn place(&mut self, xy: HexCoord, id: MachineId) -> bool {
        match self.index(xy) {
            Some(i) if self.tiles[i] == Tile::Empty => {
                self.tiles[i] = Tile::Occupied(id);
                true
            }
            _ => false,
        }
    }

    /// Empties `xy` and drops any reservation held by `id`.
    pub fn remove(&mut self, xy: HexCoord, id: MachineId) {
        for tile in &mut self.tiles {
            if *tile == Tile::Reserved(id) {
                *tile = Tile::Empty;
            }
        }
        if let Some(i) = self.index(xy) {
            if self.tiles[i] == Tile::Occupied(id) {
                self.tiles[i] = Tile::Empty;
            }
        }
    }

    pub fn reservations(&self) -> impl Iterator<Item = (HexCoord, MachineId)> + '_ {
        let width = self.width.max(1) as usize;
        self.tiles.iter().enumerate().filter_map(move |(i, tile)| match tile {
            Tile::Reserved(id) => Some((HexCoord::new((i % width) as i8, (i / width) as i8), *id)),
            _ => None,
        })
    }
}

impl MovementGrid for HexGrid {
    fn is_on_board(&self, xy: HexCoord) -> bool {
        self.index(xy).is_some()
    }

    fn neighbour_tile(&self, xy: HexCoord, facing: HexFacing) -> Option<HexCoord> {
        if !self.is_on_board(xy) {
            return None;
        }
        let n = xy.neighbour(facing);
        self.is_on_board(n).then_some(n)
    }

    fn is_tile_empty_and_unreserved(&self, xy: HexCoord) -> bool {
        self.tile(xy) == Some(Tile::Empty)
    }

    fn reserve_empty_tile(&mut self, from: HexCoord, xy: HexCoord) {
        let Some(owner) = self.occupant(from) else {
            tracing::warn!(?from, ?xy, "reservation requested from an empty tile");
            return;
        };
        if let Some(i) = self.index(xy) {
            if self.tiles[i] == Tile::Empty {
                self.tiles[i] = Tile::Reserved(owner);
            }
        }
    }

    fn move_bot_from_tile_to_tile(&mut self, from: HexCoord, to: HexCoord) {
        let (Some(src), Some(dst)) = (self.index(from), self.index(to)) else {
            tracing::warn!(?from, ?to, "move off board ignored");
            return;
        };
        let Tile::Occupied(id) = self.tiles[src] else {
            tracing::warn!(?from, ?to, "move from a tile without a machine ignored");
            return;
        };
        if self.tiles[dst] != Tile::Reserved(id) {
            tracing::warn!(?from, ?to, machine = id, "move into an unreserved tile");
        }
        self.tiles[src] = Tile::Empty;
        self.tiles[dst] = Tile::Occupied(id);
    }
}
