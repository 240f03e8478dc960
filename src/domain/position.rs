use super::angle::FixedAngle;
use super::hex::HexCoord;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TurningFlag {
    NotTurning,
    Clockwise,
    CounterClockwise,
}

/// Read-only view of where a unit is, used by renderers to extrapolate
/// between ticks without touching simulation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PositionInfo {
    /// Signed distance from the centre of `grid_xy` along the facing.
    pub distance: i32,
    pub speed: i32,
    pub angle: FixedAngle,
    pub turning: TurningFlag,
    pub grid_xy: HexCoord,
}
