// Shots and their effects. All scaling is integer arithmetic in units of
// 1/100_000 so that every peer computes identical magnitudes.

use super::randoms::Randoms;
use serde::{Deserialize, Serialize};

/// Fixed-point scale for effectiveness and falloff factors (1.0 == 100_000).
pub const FACTOR_ONE: i64 = 100_000;

/// Pseudo-normal curve (mean 0.5, sigma 1/6) sampled at 128 points, in 1/100_000.
/// Reproduced bit-for-bit; do not regenerate.
pub const NORMAL_DISTRIBUTION: [i64; 128] = [
    5_145, 9_663, 11_174, 12_142, 13_605, 17_105, 17_258, 21_530, 23_635, 23_639, 23_904, 24_757,
    24_980, 24_990, 25_790, 26_612, 26_901, 27_228, 27_448, 27_559, 28_557, 30_922, 30_927, 31_713,
    32_236, 33_123, 34_497, 34_826, 35_015, 35_721, 36_043, 36_845, 37_570, 37_651, 37_730, 38_103,
    38_347, 38_358, 38_484, 38_530, 38_532, 38_780, 39_186, 39_258, 40_487, 40_520, 40_527, 40_847,
    40_848, 41_209, 42_415, 42_703, 42_871, 43_386, 43_608, 44_135, 45_615, 45_931, 46_713, 46_910,
    47_121, 47_193, 47_625, 47_652, 48_158, 48_515, 48_932, 49_506, 49_913, 50_990, 51_050, 51_157,
    51_221, 51_680, 51_992, 52_243, 53_382, 53_642, 54_355, 55_121, 55_626, 56_045, 56_506, 56_605,
    56_606, 57_277, 57_465, 57_908, 58_343, 58_985, 59_067, 61_786, 61_924, 62_512, 62_933, 63_372,
    65_184, 65_558, 65_710, 65_928, 66_245, 66_927, 67_744, 68_314, 68_956, 69_014, 69_789, 71_099,
    71_988, 73_045, 74_423, 74_634, 76_216, 76_461, 77_973, 78_143, 78_193, 78_853, 82_277, 82_796,
    84_038, 84_198, 84_552, 84_775, 85_794, 88_356, 89_753, 100_000,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Damages {
    pub kinetic: u16,
    pub thermal: u16,
    pub em: u16,
    pub radiation: u16,
}

impl Damages {
    pub fn total(&self) -> u32 {
        self.kinetic as u32 + self.thermal as u32 + self.em as u32 + self.radiation as u32
    }

    fn scaled(self, factor: i64) -> Self {
        Self {
            kinetic: scale(self.kinetic, factor),
            thermal: scale(self.thermal, factor),
            em: scale(self.em, factor),
            radiation: scale(self.radiation, factor),
        }
    }
}

/// What a shot does when it lands. Exactly one kind per shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShotEffect {
    Weapon(Damages),
    CapDrain { cap_drained: u16 },
    CapXfer { cap_transferred: u16 },
    Repair { armour_repaired: u16 },
    Mining { volume_mined: u16 },
}

impl ShotEffect {
    /// Same effect with every magnitude multiplied by `factor / FACTOR_ONE`.
    pub fn scaled(self, factor: i64) -> Self {
        match self {
            ShotEffect::Weapon(d) => ShotEffect::Weapon(d.scaled(factor)),
            ShotEffect::CapDrain { cap_drained } => ShotEffect::CapDrain {
                cap_drained: scale(cap_drained, factor),
            },
            ShotEffect::CapXfer { cap_transferred } => ShotEffect::CapXfer {
                cap_transferred: scale(cap_transferred, factor),
            },
            ShotEffect::Repair { armour_repaired } => ShotEffect::Repair {
                armour_repaired: scale(armour_repaired, factor),
            },
            ShotEffect::Mining { volume_mined } => ShotEffect::Mining {
                volume_mined: scale(volume_mined, factor),
            },
        }
    }

    /// Headline magnitude, summed over damage types for weapons.
    pub fn magnitude(&self) -> u32 {
        match self {
            ShotEffect::Weapon(d) => d.total(),
            ShotEffect::CapDrain { cap_drained } => *cap_drained as u32,
            ShotEffect::CapXfer { cap_transferred } => *cap_transferred as u32,
            ShotEffect::Repair { armour_repaired } => *armour_repaired as u32,
            ShotEffect::Mining { volume_mined } => *volume_mined as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardpointShot {
    pub hardpoint_index: u8,
    pub max_range: u16,
    pub effect: ShotEffect,
}

fn scale(value: u16, factor: i64) -> u16 {
    (value as i64 * factor / FACTOR_ONE).clamp(0, u16::MAX as i64) as u16
}

/// Effectiveness in 1/100_000: `reliability` percent is guaranteed, the rest
/// is drawn from the normal table.
pub fn effectiveness_factor(randoms: &mut Randoms, reliability: u8) -> i64 {
    let reliability = reliability.min(100) as i64;
    let index = randoms.below(NORMAL_DISTRIBUTION.len() as u32) as usize;
    (reliability * FACTOR_ONE + (100 - reliability) * NORMAL_DISTRIBUTION[index]) / 100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_table_is_checked_then_it_is_sorted_and_ends_at_one() {
        assert!(NORMAL_DISTRIBUTION.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(NORMAL_DISTRIBUTION[0], 5_145);
        assert_eq!(NORMAL_DISTRIBUTION[127], FACTOR_ONE);
    }

    #[test]
    fn when_fully_reliable_then_effectiveness_is_exactly_one() {
        let mut r = Randoms::new(7);
        for _ in 0..50 {
            assert_eq!(effectiveness_factor(&mut r, 100), FACTOR_ONE);
        }
    }

    #[test]
    fn when_unreliable_then_effectiveness_stays_within_table_bounds() {
        let mut r = Randoms::new(7);
        for _ in 0..500 {
            let e = effectiveness_factor(&mut r, 0);
            assert!((5_145..=FACTOR_ONE).contains(&e));
        }
        let mut r = Randoms::new(7);
        for _ in 0..500 {
            assert!(effectiveness_factor(&mut r, 50) >= FACTOR_ONE / 2);
        }
    }

    #[test]
    fn when_effect_is_scaled_then_only_its_own_payload_changes() {
        let weapon = ShotEffect::Weapon(Damages {
            kinetic: 100,
            thermal: 50,
            em: 0,
            radiation: 10,
        });
        assert_eq!(
            weapon.scaled(FACTOR_ONE / 2),
            ShotEffect::Weapon(Damages {
                kinetic: 50,
                thermal: 25,
                em: 0,
                radiation: 5
            })
        );
        let repair = ShotEffect::Repair { armour_repaired: 30 };
        assert_eq!(repair.scaled(FACTOR_ONE * 2).magnitude(), 60);
    }
}
