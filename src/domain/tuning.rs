// Gameplay tuning shared by every participant. Changing any value here changes
// simulation output, so all peers must run the same build.

use super::angle::{FixedAngle, SIXTH_PI};

/// Sub-tile distance units from one tile centre to the next.
pub const TILE_WIDTH: i32 = 1_000_000;

pub const MAX_MOVE_SPEED: i32 = TILE_WIDTH / 10;
pub const MIN_MOVE_SPEED: i32 = 1;

pub const MAX_TURN_SPEED: FixedAngle = SIXTH_PI / 10;
pub const MIN_TURN_SPEED: FixedAngle = 1;

pub const DEFAULT_MAX_CAPACITOR: u16 = 1000;
pub const DEFAULT_CAPACITOR_RECHARGE: u16 = 5;
pub const DEFAULT_HULL: u16 = 1000;

/// Highest legal hardpoint slot index on a machine.
pub const MAX_HARDPOINT_INDEX: u8 = 87;

/// Orders a single machine may have queued at once.
pub const MAX_QUEUED_ORDERS: usize = 1000;

// Engine defaults for spawned machines.
pub const DEFAULT_THRUST: i32 = 5_000;
pub const DEFAULT_MAX_SPEED: i32 = 50_000;
pub const DEFAULT_TURN_POWER: FixedAngle = 1_000;
pub const DEFAULT_MAX_TURN_SPEED: FixedAngle = 20_000;
