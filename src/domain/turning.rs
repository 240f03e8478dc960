// Per-unit rotation. A turn ramps angular speed up, cruises, ramps down and
// finally snaps onto the exact facing angle so peers never drift apart.

use super::angle::{FixedAngle, MAX_FACE_TURNS, THIRD_PI, TWO_PI};
use super::hex::HexFacing;
use super::tuning::{MAX_TURN_SPEED, MIN_TURN_SPEED};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnDirection {
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TurnPhase {
    Idle,
    Accelerating,
    Cruising,
    Decelerating,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurningSystem {
    facing_wanted: HexFacing,
    angle: FixedAngle,
    velocity: FixedAngle,
    acceleration: FixedAngle,
    max_turn_speed: FixedAngle,
    degrees_wanted: i32,
    degrees_turned: i32,
    deceleration_marker: i32,
    phase: TurnPhase,
}

impl TurningSystem {
    /// Builds a turning system, clamping the engine figures into legal bounds.
    pub fn new(turn_power: FixedAngle, max_turn_speed: FixedAngle, facing: HexFacing) -> Self {
        let max_turn_speed = max_turn_speed.clamp(MIN_TURN_SPEED, MAX_TURN_SPEED);
        let acceleration = turn_power.clamp(MIN_TURN_SPEED, max_turn_speed);
        Self {
            facing_wanted: facing,
            angle: facing.angle(),
            velocity: 0,
            acceleration,
            max_turn_speed,
            degrees_wanted: 0,
            degrees_turned: 0,
            deceleration_marker: 0,
            phase: TurnPhase::Idle,
        }
    }

    pub fn reset(&mut self, facing: HexFacing) {
        self.facing_wanted = facing;
        self.angle = facing.angle();
        self.velocity = 0;
        self.degrees_wanted = 0;
        self.degrees_turned = 0;
        self.deceleration_marker = 0;
        self.phase = TurnPhase::Idle;
    }

    pub fn angle(&self) -> FixedAngle {
        self.angle
    }

    /// Facing the unit points at, or is turning towards.
    pub fn facing(&self) -> HexFacing {
        self.facing_wanted
    }

    pub fn velocity(&self) -> FixedAngle {
        self.velocity
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn is_turning(&self) -> bool {
        self.velocity != 0
    }

    pub fn is_turning_cw(&self) -> bool {
        self.velocity > 0
    }

    pub fn is_turning_ccw(&self) -> bool {
        self.velocity < 0
    }

    pub fn facing_after_n_turns(&self, direction: TurnDirection, n: u16) -> HexFacing {
        let steps = (n % 6) as i32;
        match direction {
            TurnDirection::Clockwise => self.facing_wanted.rotated(steps),
            TurnDirection::CounterClockwise => self.facing_wanted.rotated(6 - steps),
        }
    }

    /// Starts turning `n` facing steps. Ignored while a turn is in progress.
    /// `n` above 498 is clamped.
    pub fn start_n_face_turns(&mut self, direction: TurnDirection, n: u16) -> bool {
        if self.is_turning() {
            return false;
        }
        let n = n.min(MAX_FACE_TURNS);
        if n == 0 {
            return true;
        }

        self.degrees_wanted = n as i32 * THIRD_PI;
        self.degrees_turned = 0;
        self.deceleration_marker = self.degrees_wanted;
        self.facing_wanted = self.facing_after_n_turns(direction, n);
        self.velocity = match direction {
            TurnDirection::Clockwise => self.acceleration,
            TurnDirection::CounterClockwise => -self.acceleration,
        };
        self.phase = TurnPhase::Accelerating;
        true
    }

    pub fn advance_one_frame(&mut self) {
        if !self.is_turning() {
            return;
        }

        self.degrees_turned += self.velocity.abs();
        self.angle = (self.angle + self.velocity + TWO_PI) % TWO_PI;

        if self.degrees_turned >= self.degrees_wanted {
            self.angle = self.facing_wanted.angle();
            self.velocity = 0;
            self.phase = TurnPhase::Idle;
        } else if self.degrees_turned >= self.deceleration_marker
            || (self.deceleration_marker == self.degrees_wanted
                && self.degrees_turned >= self.degrees_wanted / 2)
        {
            if self.deceleration_marker == self.degrees_wanted {
                // Never reached full speed: start slowing at the half-way point.
                self.deceleration_marker = self.degrees_wanted / 2;
            } else {
                self.decelerate();
            }
        } else {
            self.accelerate();
        }
    }

    fn decelerate(&mut self) {
        self.phase = TurnPhase::Decelerating;
        // Speed never drops below one step of turning power.
        if self.velocity > 0 {
            self.velocity -= self.acceleration;
            if self.velocity <= 0 {
                self.velocity = self.acceleration;
            }
        } else {
            self.velocity += self.acceleration;
            if self.velocity >= 0 {
                self.velocity = -self.acceleration;
            }
        }
    }

    fn accelerate(&mut self) {
        let previous = self.velocity;
        self.velocity = if previous > 0 {
            (previous + self.acceleration).min(self.max_turn_speed)
        } else {
            (previous - self.acceleration).max(-self.max_turn_speed)
        };

        if self.velocity.abs() == self.max_turn_speed {
            if previous.abs() < self.max_turn_speed {
                // Mirror the ramp-up distance at the end of the turn.
                self.deceleration_marker = self.degrees_wanted - self.degrees_turned;
            }
            self.phase = TurnPhase::Cruising;
        } else {
            self.phase = TurnPhase::Accelerating;
        }
    }
}
