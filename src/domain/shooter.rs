// The firing half of a hardpoint: validated characteristics plus shot
// generation and range falloff.

use super::angle::{FixedAngle, TWO_PI, degrees_to_fixed, normalise};
use super::randoms::Randoms;
use super::shot::{FACTOR_ONE, HardpointShot, effectiveness_factor};
use super::tuning::MAX_HARDPOINT_INDEX;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ShooterError {
    #[error("min angle {0} is outside 0..=360 degrees")]
    MinAngleOutOfBounds(i16),
    #[error("max angle {0} is outside -360..=360 degrees")]
    MaxAngleOutOfBounds(i16),
    #[error("max range {max} is below min range {min}")]
    BadRange { min: u16, max: u16 },
    #[error("rotation speed must be above zero")]
    IllegalRotationSpeed,
    #[error("reliability {0} is above 100%")]
    ReliabilityAbove100(u8),
    #[error("hardpoint index {0} is out of range")]
    BadHardpointIndex(u8),
}

/// Raw characteristics, as authored in a blueprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShooterSpec {
    pub shot: HardpointShot,
    /// Per tick.
    pub rotation_speed: FixedAngle,
    pub firing_cap_cost: u16,
    /// In ticks.
    pub firing_cooldown: u16,
    pub min_angle_degrees: i16,
    pub max_angle_degrees: i16,
    pub min_range: u16,
    /// Percentage of the min-range effect delivered at max range.
    pub max_range_percent_effect: u16,
    pub reliability: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardpointShooter {
    spec: ShooterSpec,
}

impl HardpointShooter {
    pub fn new(spec: ShooterSpec) -> Result<Self, ShooterError> {
        if !(0..=360).contains(&spec.min_angle_degrees) {
            return Err(ShooterError::MinAngleOutOfBounds(spec.min_angle_degrees));
        }
        if !(-360..=360).contains(&spec.max_angle_degrees) {
            return Err(ShooterError::MaxAngleOutOfBounds(spec.max_angle_degrees));
        }
        if spec.shot.max_range < spec.min_range {
            return Err(ShooterError::BadRange {
                min: spec.min_range,
                max: spec.shot.max_range,
            });
        }
        if spec.rotation_speed <= 0 {
            return Err(ShooterError::IllegalRotationSpeed);
        }
        if spec.reliability > 100 {
            return Err(ShooterError::ReliabilityAbove100(spec.reliability));
        }
        if spec.shot.hardpoint_index > MAX_HARDPOINT_INDEX {
            return Err(ShooterError::BadHardpointIndex(spec.shot.hardpoint_index));
        }
        Ok(Self { spec })
    }

    pub fn firing_cap_cost(&self) -> u16 {
        self.spec.firing_cap_cost
    }

    pub fn firing_cooldown(&self) -> u16 {
        self.spec.firing_cooldown
    }

    pub fn min_range(&self) -> u16 {
        self.spec.min_range
    }

    pub fn max_range(&self) -> u16 {
        self.spec.shot.max_range
    }

    pub fn rotation_speed(&self) -> FixedAngle {
        self.spec.rotation_speed
    }

    pub fn min_angle(&self) -> FixedAngle {
        normalise(degrees_to_fixed(self.spec.min_angle_degrees as i32))
    }

    pub fn max_angle(&self) -> FixedAngle {
        normalise(degrees_to_fixed(self.spec.max_angle_degrees as i32))
    }

    /// True when the arc covers every direction.
    pub fn is_omnidirectional(&self) -> bool {
        (self.spec.max_angle_degrees as i32 - self.spec.min_angle_degrees as i32).abs() >= 360
    }

    /// Midpoint of the arc, the rest angle for a freshly mounted hardpoint.
    pub fn mid_angle(&self) -> FixedAngle {
        let range = (self.max_angle() + TWO_PI - self.min_angle()) % TWO_PI;
        (self.min_angle() + range / 2) % TWO_PI
    }

    /// Shot at full potential, scaled only by reliability. Range falloff is
    /// applied when the shot lands.
    pub fn make_a_shot(&self, randoms: &mut Randoms) -> HardpointShot {
        let e = effectiveness_factor(randoms, self.spec.reliability);
        HardpointShot {
            effect: self.spec.shot.effect.scaled(e),
            ..self.spec.shot
        }
    }

    pub fn falloff_at_range(&self, range: u16) -> i64 {
        calculate_falloff(
            range,
            self.spec.min_range,
            self.spec.shot.max_range,
            self.spec.max_range_percent_effect,
        )
    }
}

/// Factor (1/100_000) applied to a shot landing at `target_range`: full effect
/// at or inside min range, nothing beyond max range, linear in between.
pub fn calculate_falloff(target_range: u16, min_range: u16, max_range: u16, max_range_effect: u16) -> i64 {
    if target_range <= min_range {
        return FACTOR_ONE;
    }
    if target_range > max_range {
        return 0;
    }
    let span = (max_range - min_range) as i64;
    let along = (target_range - min_range) as i64;
    let delta = max_range_effect as i64 * (FACTOR_ONE / 100) - FACTOR_ONE;
    FACTOR_ONE + along * delta / span
}
