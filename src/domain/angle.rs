// Fixed-point angles. A full turn is 3_600_000 units so that one degree is
// 10_000 units and every hex facing lands on an exact value.

use super::hex::{HexCoord, HexFacing};

pub type FixedAngle = i32;

pub const TWO_PI: FixedAngle = 3_600_000;
pub const PI: FixedAngle = TWO_PI / 2;
pub const HALF_PI: FixedAngle = TWO_PI / 4;
pub const THIRD_PI: FixedAngle = TWO_PI / 6;
pub const SIXTH_PI: FixedAngle = TWO_PI / 12;

pub const FACING_0: FixedAngle = 9 * SIXTH_PI;
pub const FACING_1: FixedAngle = 11 * SIXTH_PI;
pub const FACING_2: FixedAngle = SIXTH_PI;
pub const FACING_3: FixedAngle = 3 * SIXTH_PI;
pub const FACING_4: FixedAngle = 5 * SIXTH_PI;
pub const FACING_5: FixedAngle = 7 * SIXTH_PI;

/// Upper bound on a single turn command: 83 full revolutions in facing steps.
pub const MAX_FACE_TURNS: u16 = 83 * 6;

const UNITS_PER_DEGREE: i32 = 10_000;

// atan(2^-i) in fixed units.
const CORDIC_ATAN: [i64; 20] = [
    450_000, 265_651, 140_362, 71_250, 35_763, 17_899, 8_952, 4_476, 2_238, 1_119, 560, 280, 140,
    70, 35, 17, 9, 4, 2, 1,
];

// Inputs are shifted up before rotating so the last iterations still move the vector.
const CORDIC_PRESCALE: u32 = 16;

pub fn degrees_to_fixed(degrees: i32) -> FixedAngle {
    degrees * UNITS_PER_DEGREE
}

/// Wraps any angle into `[0, TWO_PI)`.
pub fn normalise(angle: FixedAngle) -> FixedAngle {
    angle.rem_euclid(TWO_PI)
}

pub fn is_facing_angle(angle: FixedAngle) -> bool {
    HexFacing::ALL.iter().any(|f| f.angle() == angle)
}

/// True when `angle` lies on the arc swept clockwise from `min` to `max`.
pub fn in_angle_range(angle: FixedAngle, min: FixedAngle, max: FixedAngle) -> bool {
    // Rotate everything so that min sits at zero.
    let r = TWO_PI - normalise(min);
    let angle = (normalise(angle) + r) % TWO_PI;
    let max = (normalise(max) + r) % TWO_PI;
    angle <= max
}

/// Integer atan2 of a board-space vector (y pointing down), in `[0, TWO_PI)`.
pub fn bearing(dx: i64, dy: i64) -> FixedAngle {
    match (dx.signum(), dy.signum()) {
        (0, 0) | (1, 0) => return 0,
        (-1, 0) => return PI,
        (0, 1) => return HALF_PI,
        (0, -1) => return 3 * HALF_PI,
        _ => {}
    }

    let (mut x, mut y, mut z) = if dx < 0 {
        (-dx << CORDIC_PRESCALE, -dy << CORDIC_PRESCALE, PI as i64)
    } else {
        (dx << CORDIC_PRESCALE, dy << CORDIC_PRESCALE, 0)
    };

    for (i, step) in CORDIC_ATAN.iter().enumerate() {
        let (xs, ys) = (x >> i, y >> i);
        if y > 0 {
            x += ys;
            y -= xs;
            z += step;
        } else {
            x -= ys;
            y += xs;
            z -= step;
        }
    }

    normalise(z as FixedAngle)
}

/// Angle to `target` measured from the unit's facing, in `[0, TWO_PI)`.
/// A target on the unit's own tile is at angle zero.
pub fn relative_angle_to_target(
    facing_angle: FixedAngle,
    location: HexCoord,
    target: HexCoord,
) -> FixedAngle {
    if location == target {
        return 0;
    }

    let (x0, y0) = location.pixel_centre();
    let (x1, y1) = target.pixel_centre();
    normalise(bearing(x1 - x0, y1 - y0) - facing_angle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: FixedAngle, expected: FixedAngle) {
        let diff = normalise(actual - expected).min(normalise(expected - actual));
        assert!(diff <= 5, "expected {expected}, got {actual}");
    }

    #[test]
    fn when_facings_are_built_then_they_are_sixty_degrees_apart() {
        let angles = [FACING_0, FACING_1, FACING_2, FACING_3, FACING_4, FACING_5];
        for pair in angles.windows(2) {
            assert_eq!(normalise(pair[1] - pair[0]), THIRD_PI);
        }
        assert_eq!(degrees_to_fixed(270), FACING_0);
        assert!(is_facing_angle(FACING_4));
        assert!(!is_facing_angle(FACING_4 + 1));
    }

    #[test]
    fn when_vector_lies_on_an_axis_then_bearing_is_exact() {
        assert_eq!(bearing(10, 0), 0);
        assert_eq!(bearing(0, 10), HALF_PI);
        assert_eq!(bearing(-10, 0), PI);
        assert_eq!(bearing(0, -10), 3 * HALF_PI);
    }

    #[test]
    fn when_vector_is_diagonal_then_bearing_is_within_a_few_units() {
        assert_close(bearing(1_000, 1_000), degrees_to_fixed(45));
        assert_close(bearing(-1_000, 1_000), degrees_to_fixed(135));
        assert_close(bearing(-1_000, -1_000), degrees_to_fixed(225));
        assert_close(bearing(1_000, -1_000), degrees_to_fixed(315));
    }

    #[test]
    fn when_target_is_a_neighbour_then_relative_angle_matches_the_facing() {
        let origin = HexCoord::new(4, 4);
        for facing in HexFacing::ALL {
            let neighbour = origin.neighbour(facing);
            assert_close(relative_angle_to_target(0, origin, neighbour), facing.angle());
            assert_close(relative_angle_to_target(facing.angle(), origin, neighbour), 0);
        }
    }

    #[test]
    fn when_target_is_own_tile_then_relative_angle_is_zero() {
        let here = HexCoord::new(2, 3);
        assert_eq!(relative_angle_to_target(FACING_3, here, here), 0);
    }

    #[test]
    fn when_arc_wraps_through_zero_then_in_angle_range_follows_it() {
        let min = degrees_to_fixed(300);
        let max = degrees_to_fixed(60);
        assert!(in_angle_range(0, min, max));
        assert!(in_angle_range(degrees_to_fixed(330), min, max));
        assert!(in_angle_range(max, min, max));
        assert!(!in_angle_range(degrees_to_fixed(90), min, max));
    }
}
