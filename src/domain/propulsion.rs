// Per-unit tile movement. A mover always holds a reservation on the tile it is
// heading into; failing to get one makes it brake and stop at the current centre.

use super::angle::FixedAngle;
use super::grid::MovementGrid;
use super::hex::{HexCoord, HexFacing};
use super::position::{PositionInfo, TurningFlag};
use super::tuning::{MAX_MOVE_SPEED, MIN_MOVE_SPEED, TILE_WIDTH};
use super::turning::{TurnDirection, TurningSystem};
use serde::{Deserialize, Serialize};

/// Engine figures a machine is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSpec {
    pub thrust: i32,
    pub max_speed: i32,
    pub turn_power: FixedAngle,
    pub max_turn_speed: FixedAngle,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Advancing {
    tiles_wanted: u16,
    tiles_advanced: u16,
    acceleration: i32,
    next_tile: Option<HexCoord>,
    stop_at_centre: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Propulsion {
    turning: TurningSystem,
    grid_xy: HexCoord,
    distance: i32,
    velocity: i32,
    thrust: i32,
    max_speed: i32,
    is_advancing: bool,
    advancing: Advancing,
}

impl Propulsion {
    pub fn new(engine: EngineSpec, xy: HexCoord, facing: HexFacing) -> Self {
        let max_speed = engine.max_speed.clamp(MIN_MOVE_SPEED, MAX_MOVE_SPEED);
        let thrust = engine.thrust.clamp(MIN_MOVE_SPEED, max_speed);
        Self {
            turning: TurningSystem::new(engine.turn_power, engine.max_turn_speed, facing),
            grid_xy: xy,
            distance: 0,
            velocity: 0,
            thrust,
            max_speed,
            is_advancing: false,
            advancing: Advancing::default(),
        }
    }

    pub fn grid_xy(&self) -> HexCoord {
        self.grid_xy
    }

    pub fn facing(&self) -> HexFacing {
        self.turning.facing()
    }

    pub fn angle(&self) -> FixedAngle {
        self.turning.angle()
    }

    pub fn is_turning(&self) -> bool {
        self.turning.is_turning()
    }

    pub fn is_advancing(&self) -> bool {
        self.is_advancing
    }

    pub fn is_moving(&self) -> bool {
        self.is_turning() || self.is_advancing
    }

    /// Tile currently claimed ahead of the mover, if any.
    pub fn reserved_tile(&self) -> Option<HexCoord> {
        if self.is_advancing && !self.advancing.stop_at_centre {
            self.advancing.next_tile
        } else {
            None
        }
    }

    pub fn start_n_face_turns(&mut self, direction: TurnDirection, n: u16) -> bool {
        if self.is_advancing || self.distance != 0 {
            return false;
        }
        self.turning.start_n_face_turns(direction, n)
    }

    /// Starts moving `n` tiles along the current facing. Does nothing when the
    /// first tile cannot be reserved.
    pub fn start_n_tile_move(&mut self, grid: &mut dyn MovementGrid, n: u16) -> bool {
        if self.is_moving() || self.distance != 0 {
            return false;
        }

        self.advancing.tiles_wanted = n;
        self.advancing.tiles_advanced = 0;
        self.advancing.next_tile = None;

        if n == 0 {
            return false;
        }

        let Some(next) = grid.neighbour_tile(self.grid_xy, self.facing()) else {
            return false;
        };
        if !grid.is_tile_empty_and_unreserved(next) {
            return false;
        }

        grid.reserve_empty_tile(self.grid_xy, next);
        self.advancing.next_tile = Some(next);
        self.advancing.acceleration = self.thrust;
        self.advancing.stop_at_centre = false;
        self.is_advancing = true;
        self.velocity = self.thrust;
        true
    }

    pub fn tick(&mut self, grid: &mut dyn MovementGrid) {
        if self.turning.is_turning() {
            self.turning.advance_one_frame();
        } else if self.is_advancing {
            self.tick_advancing(grid);
        }
    }

    fn tick_advancing(&mut self, grid: &mut dyn MovementGrid) {
        let old_distance = self.distance;
        self.distance += self.velocity;
        self.velocity = (self.velocity + self.advancing.acceleration).clamp(MIN_MOVE_SPEED, self.max_speed);

        // Landing exactly on the centre counts as reaching it.
        if old_distance < 0 && self.distance >= 0 {
            if self.advancing.stop_at_centre {
                self.halt_at_centre();
            }
        } else if self.distance > TILE_WIDTH {
            let Some(next) = self.advancing.next_tile else {
                tracing::error!(xy = ?self.grid_xy, "crossed a tile edge without a reservation");
                self.halt_at_centre();
                return;
            };

            let old_xy = self.grid_xy;
            self.grid_xy = next;
            grid.move_bot_from_tile_to_tile(old_xy, next);
            self.distance -= 2 * TILE_WIDTH;

            self.advancing.tiles_advanced += 1;
            if self.advancing.tiles_advanced == self.advancing.tiles_wanted {
                self.decelerate_to_centre();
                return;
            }

            match grid.neighbour_tile(self.grid_xy, self.facing()) {
                Some(ahead) if grid.is_tile_empty_and_unreserved(ahead) => {
                    grid.reserve_empty_tile(self.grid_xy, ahead);
                    self.advancing.next_tile = Some(ahead);
                }
                _ => self.decelerate_to_centre(),
            }
        }
    }

    fn halt_at_centre(&mut self) {
        self.distance = 0;
        self.velocity = 0;
        self.is_advancing = false;
        self.advancing.stop_at_centre = false;
        self.advancing.next_tile = None;
        self.advancing.acceleration = 0;
    }

    fn decelerate_to_centre(&mut self) {
        self.advancing.stop_at_centre = true;
        self.advancing.next_tile = None;
        if self.distance >= 0 {
            self.halt_at_centre();
            return;
        }
        let v = self.velocity as i64;
        // Distance is negative here, so this is a braking acceleration.
        self.advancing.acceleration = (v * v / (2 * self.distance as i64)) as i32;
    }

    pub fn position_info(&self) -> PositionInfo {
        let turning = if self.turning.is_turning_cw() {
            TurningFlag::Clockwise
        } else if self.turning.is_turning_ccw() {
            TurningFlag::CounterClockwise
        } else {
            TurningFlag::NotTurning
        };
        PositionInfo {
            distance: self.distance,
            speed: self.velocity,
            angle: self.turning.angle(),
            turning,
            grid_xy: self.grid_xy,
        }
    }
}
