// Hex coordinates on an odd-q offset board, with axial conversion for
// distances and neighbour lookup.

use super::angle::{FACING_0, FACING_1, FACING_2, FACING_3, FACING_4, FACING_5, FixedAngle};
use serde::{Deserialize, Serialize};

// Pixel spacing between tile centres, in the same units as TILE_WIDTH.
const COLUMN_SPACING: i64 = 1_500_000;
const HALF_ROW_SPACING: i64 = 866_025;

/// A board cell. `(-1, -1)`, the `0xFFFF` bit pattern, marks "off board".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HexCoord {
    pub x: i8,
    pub y: i8,
}

impl HexCoord {
    pub const INVALID: HexCoord = HexCoord { x: -1, y: -1 };

    pub const fn new(x: i8, y: i8) -> Self {
        Self { x, y }
    }

    pub fn from_u16(bits: u16) -> Self {
        let [x, y] = bits.to_be_bytes();
        Self {
            x: x as i8,
            y: y as i8,
        }
    }

    pub fn to_u16(self) -> u16 {
        u16::from_be_bytes([self.x as u8, self.y as u8])
    }

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    fn to_axial(self) -> (i32, i32) {
        let col = self.x as i32;
        let row = self.y as i32;
        (col, row - (col - (col & 1)) / 2)
    }

    fn from_axial(q: i32, r: i32) -> Option<Self> {
        let row = r + (q - (q & 1)) / 2;
        let x = i8::try_from(q).ok()?;
        let y = i8::try_from(row).ok()?;
        Some(Self { x, y })
    }

    /// Neighbouring cell in the direction of `facing`. Returns `INVALID` when
    /// the result does not fit the coordinate range.
    pub fn neighbour(self, facing: HexFacing) -> Self {
        let (q, r) = self.to_axial();
        let (dq, dr) = facing.axial_step();
        Self::from_axial(q + dq, r + dr).unwrap_or(Self::INVALID)
    }

    /// Number of single-tile steps between two cells.
    pub fn step_distance(self, other: HexCoord) -> u16 {
        let (q0, r0) = self.to_axial();
        let (q1, r1) = other.to_axial();
        let dq = q1 - q0;
        let dr = r1 - r0;
        ((dq.abs() + dr.abs() + (dq + dr).abs()) / 2) as u16
    }

    /// Tile centre in board space. `y` grows downwards.
    pub fn pixel_centre(self) -> (i64, i64) {
        let col = self.x as i64;
        let row = self.y as i64;
        (
            col * COLUMN_SPACING,
            (2 * row + (col & 1)) * HALF_ROW_SPACING,
        )
    }
}

/// One of the six directions aligned to hex neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HexFacing {
    Facing0,
    Facing1,
    Facing2,
    Facing3,
    Facing4,
    Facing5,
}

impl HexFacing {
    pub const ALL: [HexFacing; 6] = [
        HexFacing::Facing0,
        HexFacing::Facing1,
        HexFacing::Facing2,
        HexFacing::Facing3,
        HexFacing::Facing4,
        HexFacing::Facing5,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % 6]
    }

    /// Facing reached after `steps` clockwise sixth-turns (negative is counter-clockwise).
    pub fn rotated(self, steps: i32) -> Self {
        Self::from_index((self.index() as i32 + steps).rem_euclid(6) as usize)
    }

    pub fn angle(self) -> FixedAngle {
        match self {
            HexFacing::Facing0 => FACING_0,
            HexFacing::Facing1 => FACING_1,
            HexFacing::Facing2 => FACING_2,
            HexFacing::Facing3 => FACING_3,
            HexFacing::Facing4 => FACING_4,
            HexFacing::Facing5 => FACING_5,
        }
    }

    /// Exact facing for a canonical angle, `None` for mid-turn angles.
    pub fn from_angle(angle: FixedAngle) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.angle() == angle)
    }

    fn axial_step(self) -> (i32, i32) {
        match self {
            HexFacing::Facing0 => (0, -1),
            HexFacing::Facing1 => (1, -1),
            HexFacing::Facing2 => (1, 0),
            HexFacing::Facing3 => (0, 1),
            HexFacing::Facing4 => (-1, 1),
            HexFacing::Facing5 => (-1, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_coord_is_packed_then_invalid_is_all_ones() {
        assert_eq!(HexCoord::INVALID.to_u16(), 0xFFFF);
        assert_eq!(HexCoord::from_u16(0xFFFF), HexCoord::INVALID);
        assert!(!HexCoord::from_u16(0xFFFF).is_valid());
        assert_eq!(HexCoord::from_u16(0x0305), HexCoord::new(3, 5));
    }

    #[test]
    fn when_walking_all_facings_then_each_neighbour_is_one_step_away() {
        for origin in [HexCoord::new(4, 4), HexCoord::new(5, 4)] {
            for facing in HexFacing::ALL {
                let n = origin.neighbour(facing);
                assert_eq!(origin.step_distance(n), 1, "{origin:?} {facing:?}");
                assert_eq!(n.neighbour(facing.rotated(3)), origin);
            }
        }
    }

    #[test]
    fn when_odd_column_moves_up_right_then_row_is_kept() {
        assert_eq!(HexCoord::new(1, 3).neighbour(HexFacing::Facing1), HexCoord::new(2, 3));
        assert_eq!(HexCoord::new(2, 3).neighbour(HexFacing::Facing1), HexCoord::new(3, 2));
    }

    #[test]
    fn when_measuring_distant_cells_then_step_distance_uses_axial_metric() {
        let a = HexCoord::new(0, 0);
        assert_eq!(a.step_distance(a), 0);
        assert_eq!(a.step_distance(HexCoord::new(3, 0)), 3);
        assert_eq!(a.step_distance(HexCoord::new(0, 4)), 4);
        assert_eq!(a.step_distance(HexCoord::new(2, 3)), 4);
    }

    #[test]
    fn when_rotating_facings_then_indices_wrap() {
        assert_eq!(HexFacing::Facing5.rotated(1), HexFacing::Facing0);
        assert_eq!(HexFacing::Facing0.rotated(-1), HexFacing::Facing5);
        assert_eq!(HexFacing::Facing2.rotated(6 * 83), HexFacing::Facing2);
        assert_eq!(HexFacing::from_angle(FACING_3), Some(HexFacing::Facing3));
        assert_eq!(HexFacing::from_angle(FACING_3 + 1), None);
    }
}
