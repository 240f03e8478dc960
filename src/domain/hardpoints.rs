// All hardpoints on one machine, aimed and fired as a block.

use super::angle::{
    FixedAngle, PI, TWO_PI, degrees_to_fixed, in_angle_range, normalise, relative_angle_to_target,
};
use super::hex::HexCoord;
use super::randoms::Randoms;
use super::shooter::{HardpointShooter, ShooterError, ShooterSpec};
use super::shot::HardpointShot;
use serde::{Deserialize, Serialize};

/// A shooter plus where on the hull it is mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardpointMount {
    pub mount_angle_degrees: i16,
    pub shooter: ShooterSpec,
}

/// A shot as it leaves its hardpoint, with that hardpoint's falloff for the
/// range it was fired at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleasedShot {
    pub shot: HardpointShot,
    pub falloff: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurningHardpoint {
    shooter: HardpointShooter,
    min_angle: FixedAngle,
    max_angle: FixedAngle,
    omnidirectional: bool,
    current_angle: FixedAngle,
    cooldown: u16,
}

impl TurningHardpoint {
    pub fn new(mount_angle: FixedAngle, shooter: HardpointShooter) -> Self {
        Self {
            min_angle: normalise(mount_angle + shooter.min_angle()),
            max_angle: normalise(mount_angle + shooter.max_angle()),
            omnidirectional: shooter.is_omnidirectional(),
            current_angle: normalise(mount_angle + shooter.mid_angle()),
            cooldown: 0,
            shooter,
        }
    }

    pub fn shooter(&self) -> &HardpointShooter {
        &self.shooter
    }

    pub fn current_angle(&self) -> FixedAngle {
        self.current_angle
    }

    pub fn cooldown(&self) -> u16 {
        self.cooldown
    }

    /// Whether the hardpoint can swing round to face `angle` (machine-relative).
    pub fn covers(&self, angle: FixedAngle) -> bool {
        self.omnidirectional || in_angle_range(angle, self.min_angle, self.max_angle)
    }

    fn in_range(&self, distance: u16) -> bool {
        self.shooter.min_range() <= distance && distance <= self.shooter.max_range()
    }

    fn ready_to_fire(&self, angle: FixedAngle, cap: u16, distance: u16) -> bool {
        self.cooldown == 0
            && self.current_angle == angle
            && self.shooter.firing_cap_cost() <= cap
            && self.in_range(distance)
    }

    /// Rotates one tick towards `target`. Returns true while still off target.
    fn step_towards(&mut self, target: FixedAngle) -> bool {
        let speed = self.shooter.rotation_speed();
        let diff = (target - self.current_angle).abs();
        if diff <= speed {
            self.current_angle = target;
            return false;
        }

        let mut delta = if target > self.current_angle { speed } else { -speed };
        // Go the other way round when that is shorter.
        if diff > PI {
            delta = -delta;
        }
        self.current_angle = (self.current_angle + TWO_PI + delta) % TWO_PI;
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardpointCollective {
    hardpoints: Vec<TurningHardpoint>,
    // Indices into `hardpoints`, cheapest cap cost first.
    firing_order: Vec<usize>,
    target_angle: FixedAngle,
    machine_facing_angle: FixedAngle,
    machine_location: HexCoord,
    target_location: HexCoord,
    min_range: u16,
    max_range: u16,
    aiming: bool,
    cooling: bool,
}

impl Default for HardpointCollective {
    fn default() -> Self {
        Self {
            hardpoints: Vec::new(),
            firing_order: Vec::new(),
            target_angle: 0,
            machine_facing_angle: 0,
            machine_location: HexCoord::INVALID,
            target_location: HexCoord::INVALID,
            min_range: u16::MAX,
            max_range: 0,
            aiming: false,
            cooling: false,
        }
    }
}

impl HardpointCollective {
    pub fn new(mounts: &[HardpointMount]) -> Result<Self, ShooterError> {
        let mut collective = Self::default();
        for mount in mounts {
            let shooter = HardpointShooter::new(mount.shooter)?;
            collective.min_range = collective.min_range.min(shooter.min_range());
            collective.max_range = collective.max_range.max(shooter.max_range());
            collective.hardpoints.push(TurningHardpoint::new(
                degrees_to_fixed(mount.mount_angle_degrees as i32),
                shooter,
            ));
        }

        let mut order: Vec<usize> = (0..collective.hardpoints.len()).collect();
        // Stable: equal costs keep mount order.
        order.sort_by_key(|&i| collective.hardpoints[i].shooter.firing_cap_cost());
        collective.firing_order = order;
        Ok(collective)
    }

    pub fn hardpoints(&self) -> &[TurningHardpoint] {
        &self.hardpoints
    }

    pub fn min_range(&self) -> u16 {
        self.min_range
    }

    pub fn max_range(&self) -> u16 {
        self.max_range
    }

    pub fn is_aiming(&self) -> bool {
        self.aiming
    }

    pub fn is_cooling(&self) -> bool {
        self.cooling
    }

    pub fn target_angle(&self) -> FixedAngle {
        self.target_angle
    }

    pub fn target_location(&self) -> HexCoord {
        self.target_location
    }

    pub fn tick(&mut self) {
        if self.cooling {
            self.tick_cooldown();
        }
        if self.aiming {
            self.tick_aim();
        }
    }

    fn tick_cooldown(&mut self) {
        let mut still_cooling = false;
        for hp in &mut self.hardpoints {
            if hp.cooldown > 0 {
                hp.cooldown -= 1;
                still_cooling |= hp.cooldown > 0;
            }
        }
        self.cooling = still_cooling;
    }

    fn tick_aim(&mut self) {
        let target = self.target_angle;
        let mut off_target = 0;
        for hp in &mut self.hardpoints {
            if hp.current_angle != target && hp.covers(target) && hp.step_towards(target) {
                off_target += 1;
            }
        }
        self.aiming = off_target > 0;
    }

    // Distance to `xy` if it is a legal target for the collective as a whole.
    // The machine's own tile never is.
    fn target_distance(&self, xy: HexCoord) -> Option<u16> {
        if !self.machine_location.is_valid() || !xy.is_valid() {
            return None;
        }
        let d = self.machine_location.step_distance(xy);
        (d > 0 && d >= self.min_range && d <= self.max_range).then_some(d)
    }

    fn angle_to(&self, xy: HexCoord) -> FixedAngle {
        relative_angle_to_target(self.machine_facing_angle, self.machine_location, xy)
    }

    pub fn can_aim_at(&self, xy: HexCoord) -> bool {
        let Some(d) = self.target_distance(xy) else {
            return false;
        };
        let a = self.angle_to(xy);
        self.hardpoints.iter().any(|hp| hp.covers(a) && hp.in_range(d))
    }

    pub fn aim_at(&mut self, xy: HexCoord) {
        match self.target_distance(xy) {
            Some(_) => {
                self.target_angle = self.angle_to(xy);
                self.target_location = xy;
                self.aiming = true;
            }
            None => self.aiming = false,
        }
    }

    /// Number of hardpoints that would fire at `xy` right now.
    pub fn can_fire_at(&self, cap: u16, xy: HexCoord) -> usize {
        let Some(d) = self.target_distance(xy) else {
            return 0;
        };
        let a = self.angle_to(xy);
        self.hardpoints
            .iter()
            .filter(|hp| hp.ready_to_fire(a, cap, d))
            .count()
    }

    /// Fires every ready hardpoint, cheapest first, spending `cap`.
    pub fn fire_at(&mut self, randoms: &mut Randoms, cap: &mut u16, xy: HexCoord) -> Vec<ReleasedShot> {
        let Some(d) = self.target_distance(xy) else {
            return Vec::new();
        };
        let a = self.angle_to(xy);

        let mut shots = Vec::new();
        for &i in &self.firing_order {
            let hp = &mut self.hardpoints[i];
            if hp.ready_to_fire(a, *cap, d) {
                hp.cooldown = hp.shooter.firing_cooldown();
                *cap -= hp.shooter.firing_cap_cost();
                shots.push(ReleasedShot {
                    shot: hp.shooter.make_a_shot(randoms),
                    falloff: hp.shooter.falloff_at_range(d),
                });
            }
        }
        self.cooling = !shots.is_empty();
        shots
    }

    pub fn change_location(&mut self, xy: HexCoord) {
        if self.machine_location != xy {
            self.machine_location = xy;
            self.retarget();
        }
    }

    pub fn change_orientation(&mut self, facing_angle: FixedAngle) {
        if self.machine_facing_angle != facing_angle {
            self.machine_facing_angle = facing_angle;
            self.retarget();
        }
    }

    // Keeps the relative target angle valid as the machine moves underneath it.
    fn retarget(&mut self) {
        if self.target_location.is_valid() {
            let target = self.target_location;
            self.aim_at(target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::hex::HexFacing;
    use crate::domain::shot::{Damages, FACTOR_ONE, ShotEffect};

    fn mount(index: u8, cost: u16, min_deg: i16, max_deg: i16) -> HardpointMount {
        HardpointMount {
            mount_angle_degrees: 0,
            shooter: ShooterSpec {
                shot: HardpointShot {
                    hardpoint_index: index,
                    max_range: 6,
                    effect: ShotEffect::Weapon(Damages {
                        kinetic: 100,
                        ..Damages::default()
                    }),
                },
                rotation_speed: 50_000,
                firing_cap_cost: cost,
                firing_cooldown: 2,
                min_angle_degrees: min_deg,
                max_angle_degrees: max_deg,
                min_range: 1,
                max_range_percent_effect: 100,
                reliability: 100,
            },
        }
    }

    fn placed(mounts: &[HardpointMount]) -> HardpointCollective {
        let mut c = HardpointCollective::new(mounts).expect("valid mounts");
        c.change_location(HexCoord::new(4, 4));
        c.change_orientation(HexFacing::Facing0.angle());
        c
    }

    fn aim_fully(c: &mut HardpointCollective, xy: HexCoord) {
        c.aim_at(xy);
        let mut ticks = 0;
        while c.is_aiming() {
            c.tick();
            ticks += 1;
            assert!(ticks < 1_000);
        }
    }

    #[test]
    fn when_target_is_own_tile_then_nothing_can_aim_or_fire() {
        let mut c = placed(&[mount(0, 10, 0, 360)]);
        let me = HexCoord::new(4, 4);
        assert!(!c.can_aim_at(me));
        c.aim_at(me);
        assert!(!c.is_aiming());
        assert_eq!(c.can_fire_at(u16::MAX, me), 0);
        let mut r = Randoms::new(3);
        let mut cap = 100;
        assert!(c.fire_at(&mut r, &mut cap, me).is_empty());
        assert_eq!(cap, 100);
    }

    #[test]
    fn when_aimed_and_charged_then_hardpoint_fires_and_cools_down() {
        let mut c = placed(&[mount(0, 10, 0, 360)]);
        // Directly astern; the gun rests pointing forward.
        let target = HexCoord::new(4, 6);
        assert!(c.can_aim_at(target));
        assert_eq!(c.can_fire_at(100, target), 0, "not yet facing target");

        aim_fully(&mut c, target);
        assert_eq!(c.can_fire_at(100, target), 1);
        assert_eq!(c.can_fire_at(9, target), 0, "not enough cap");

        let mut r = Randoms::new(3);
        let mut cap = 100;
        let shots = c.fire_at(&mut r, &mut cap, target);
        assert_eq!(shots.len(), 1);
        assert_eq!(cap, 90);
        assert_eq!(c.hardpoints()[0].cooldown(), 2);
        assert_eq!(c.can_fire_at(cap, target), 0, "cooling down");

        c.tick();
        c.tick();
        assert!(!c.is_cooling());
        assert_eq!(c.can_fire_at(cap, target), 1);
    }

    #[test]
    fn when_cap_is_short_then_cheapest_hardpoints_fire_first() {
        let mut c = placed(&[mount(0, 40, 0, 360), mount(1, 10, 0, 360), mount(2, 25, 0, 360)]);
        let target = HexCoord::new(4, 2);
        aim_fully(&mut c, target);

        let mut r = Randoms::new(11);
        let mut cap = 40;
        let shots = c.fire_at(&mut r, &mut cap, target);
        let fired: Vec<u8> = shots.iter().map(|s| s.shot.hardpoint_index).collect();
        assert_eq!(fired, vec![1, 2]);
        assert_eq!(cap, 5);
    }

    #[test]
    fn when_two_mounts_share_a_slot_index_then_each_shot_keeps_its_own_falloff() {
        let mut long = mount(0, 20, 0, 360);
        long.shooter.shot.max_range = 10;
        long.shooter.max_range_percent_effect = 50;
        let mut short = mount(0, 10, 0, 360);
        short.shooter.shot.max_range = 3;

        let mut c = placed(&[long, short]);
        let target = HexCoord::new(4, 1);
        aim_fully(&mut c, target);

        let mut r = Randoms::new(5);
        let mut cap = 100;
        let shots = c.fire_at(&mut r, &mut cap, target);
        assert_eq!(shots.len(), 2);
        // Cheapest first: the short gun fires at its full max range.
        assert_eq!(shots[0].shot.max_range, 3);
        assert_eq!(shots[0].falloff, FACTOR_ONE);
        assert_eq!(shots[1].shot.max_range, 10);
        assert_eq!(shots[1].falloff, c.hardpoints()[0].shooter().falloff_at_range(3));
        assert!(shots[1].falloff < FACTOR_ONE);
    }

    #[test]
    fn when_target_is_outside_the_arc_then_hardpoint_does_not_turn() {
        // Forward-only arc; target directly behind.
        let mut c = placed(&[mount(0, 10, 315, 45)]);
        let behind = HexCoord::new(4, 6);
        assert!(!c.can_aim_at(behind));
        let before = c.hardpoints()[0].current_angle();
        c.aim_at(behind);
        c.tick();
        assert_eq!(c.hardpoints()[0].current_angle(), before);
        assert!(!c.is_aiming());
    }

    #[test]
    fn when_target_is_beyond_max_range_then_it_is_rejected() {
        let c = placed(&[mount(0, 10, 0, 360)]);
        assert!(!c.can_aim_at(HexCoord::new(4, 12)));
    }
}
