// A single machine on the board: movement, weapons, capacitor and the order
// queue the player's instructions feed.

use super::grid::{MachineId, MovementGrid};
use super::hardpoints::{HardpointCollective, HardpointMount};
use super::hex::{HexCoord, HexFacing};
use super::instruction::MachineOrder;
use super::position::PositionInfo;
use super::propulsion::{EngineSpec, Propulsion};
use super::randoms::Randoms;
use super::shooter::{ShooterError, ShooterSpec};
use super::shot::{Damages, HardpointShot, ShotEffect};
use super::tuning::{
    DEFAULT_CAPACITOR_RECHARGE, DEFAULT_HULL, DEFAULT_MAX_CAPACITOR, DEFAULT_MAX_SPEED,
    DEFAULT_MAX_TURN_SPEED, DEFAULT_THRUST, DEFAULT_TURN_POWER, MAX_QUEUED_ORDERS,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capacitor {
    charge: u16,
    max: u16,
    recharge: u16,
}

impl Capacitor {
    /// Starts fully charged.
    pub fn new(max: u16, recharge: u16) -> Self {
        Self {
            charge: max,
            max,
            recharge,
        }
    }

    pub fn charge(&self) -> u16 {
        self.charge
    }

    pub fn max(&self) -> u16 {
        self.max
    }

    pub fn is_full(&self) -> bool {
        self.charge >= self.max
    }

    pub fn tick(&mut self) {
        self.charge = self.charge.saturating_add(self.recharge).min(self.max);
    }

    /// Removes up to `amount`, returning what was actually taken.
    pub fn drain(&mut self, amount: u16) -> u16 {
        let taken = amount.min(self.charge);
        self.charge -= taken;
        taken
    }

    pub fn add(&mut self, amount: u16) {
        self.charge = self.charge.saturating_add(amount).min(self.max);
    }
}

/// Everything needed to build a machine, shipped inside the starting conditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineBlueprint {
    pub engine: EngineSpec,
    pub hardpoints: Vec<HardpointMount>,
    pub hull: u16,
    pub max_capacitor: u16,
    pub capacitor_recharge: u16,
}

impl Default for MachineBlueprint {
    fn default() -> Self {
        Self {
            engine: EngineSpec {
                thrust: DEFAULT_THRUST,
                max_speed: DEFAULT_MAX_SPEED,
                turn_power: DEFAULT_TURN_POWER,
                max_turn_speed: DEFAULT_MAX_TURN_SPEED,
            },
            hardpoints: vec![HardpointMount {
                mount_angle_degrees: 0,
                shooter: ShooterSpec {
                    shot: HardpointShot {
                        hardpoint_index: 0,
                        max_range: 5,
                        effect: ShotEffect::Weapon(Damages {
                            kinetic: 60,
                            thermal: 40,
                            em: 0,
                            radiation: 0,
                        }),
                    },
                    rotation_speed: 30_000,
                    firing_cap_cost: 50,
                    firing_cooldown: 10,
                    min_angle_degrees: 300,
                    max_angle_degrees: 60,
                    min_range: 1,
                    max_range_percent_effect: 50,
                    reliability: 80,
                },
            }],
            hull: DEFAULT_HULL,
            max_capacitor: DEFAULT_MAX_CAPACITOR,
            capacitor_recharge: DEFAULT_CAPACITOR_RECHARGE,
        }
    }
}

/// A shot that left a hardpoint this tick, waiting to be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredShot {
    pub shooter: MachineId,
    pub target: HexCoord,
    pub shot: HardpointShot,
    /// Range falloff factor for the actual distance, in 1/100_000.
    pub falloff: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    id: MachineId,
    owner: String,
    propulsion: Propulsion,
    hardpoints: HardpointCollective,
    capacitor: Capacitor,
    hull: u16,
    max_hull: u16,
    ore_mined: u32,
    destroyed: bool,
    orders: VecDeque<MachineOrder>,
}

impl Machine {
    pub fn new(
        id: MachineId,
        owner: impl Into<String>,
        blueprint: &MachineBlueprint,
        xy: HexCoord,
        facing: HexFacing,
    ) -> Result<Self, ShooterError> {
        let propulsion = Propulsion::new(blueprint.engine, xy, facing);
        let mut hardpoints = HardpointCollective::new(&blueprint.hardpoints)?;
        hardpoints.change_location(xy);
        hardpoints.change_orientation(propulsion.angle());
        Ok(Self {
            id,
            owner: owner.into(),
            propulsion,
            hardpoints,
            capacitor: Capacitor::new(blueprint.max_capacitor, blueprint.capacitor_recharge),
            hull: blueprint.hull,
            max_hull: blueprint.hull,
            ore_mined: 0,
            destroyed: false,
            orders: VecDeque::new(),
        })
    }

    pub fn id(&self) -> MachineId {
        self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn grid_xy(&self) -> HexCoord {
        self.propulsion.grid_xy()
    }

    pub fn position_info(&self) -> PositionInfo {
        self.propulsion.position_info()
    }

    pub fn hardpoints(&self) -> &HardpointCollective {
        &self.hardpoints
    }

    pub fn capacitor(&self) -> &Capacitor {
        &self.capacitor
    }

    pub fn capacitor_mut(&mut self) -> &mut Capacitor {
        &mut self.capacitor
    }

    pub fn hull(&self) -> u16 {
        self.hull
    }

    pub fn ore_mined(&self) -> u32 {
        self.ore_mined
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn pending_orders(&self) -> usize {
        self.orders.len()
    }

    /// Appends orders, dropping any beyond the queue limit.
    pub fn queue_orders(&mut self, orders: impl IntoIterator<Item = MachineOrder>) {
        let mut dropped = 0usize;
        for order in orders {
            if self.orders.len() < MAX_QUEUED_ORDERS {
                self.orders.push_back(order);
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            tracing::warn!(machine = self.id, dropped, "order queue full");
        }
    }

    pub fn take_damage(&mut self, damages: Damages) -> bool {
        let total = damages.total().min(u16::MAX as u32) as u16;
        self.hull = self.hull.saturating_sub(total);
        if self.hull == 0 {
            self.destroyed = true;
            self.orders.clear();
        }
        self.destroyed
    }

    pub fn repair(&mut self, amount: u16) {
        self.hull = self.hull.saturating_add(amount).min(self.max_hull);
    }

    pub fn add_ore(&mut self, volume: u16) {
        self.ore_mined += volume as u32;
    }

    /// Runs one simulation tick and returns the shots fired during it.
    pub fn tick(&mut self, grid: &mut dyn MovementGrid, randoms: &mut Randoms) -> Vec<FiredShot> {
        if self.destroyed {
            return Vec::new();
        }

        let fired = self.step_orders(grid, randoms);

        self.propulsion.tick(grid);
        self.hardpoints.change_location(self.propulsion.grid_xy());
        self.hardpoints.change_orientation(self.propulsion.angle());
        self.hardpoints.tick();
        self.capacitor.tick();

        fired
    }

    // At most one order makes progress per tick.
    fn step_orders(&mut self, grid: &mut dyn MovementGrid, randoms: &mut Randoms) -> Vec<FiredShot> {
        let Some(&order) = self.orders.front() else {
            return Vec::new();
        };

        match order {
            MachineOrder::Turn { direction, n } => {
                if !self.propulsion.is_moving() {
                    self.orders.pop_front();
                    self.propulsion.start_n_face_turns(direction, n);
                }
            }
            MachineOrder::Advance { tiles } => {
                if !self.propulsion.is_moving() {
                    self.orders.pop_front();
                    self.propulsion.start_n_tile_move(grid, tiles);
                }
            }
            MachineOrder::AimAt(xy) => {
                self.orders.pop_front();
                self.hardpoints.aim_at(xy);
            }
            MachineOrder::FireAt(xy) => return self.step_fire_at(xy, randoms),
        }
        Vec::new()
    }

    fn step_fire_at(&mut self, xy: HexCoord, randoms: &mut Randoms) -> Vec<FiredShot> {
        if !self.hardpoints.can_aim_at(xy) {
            self.orders.pop_front();
            return Vec::new();
        }

        if self.hardpoints.can_fire_at(self.capacitor.charge(), xy) > 0 {
            self.orders.pop_front();
            let mut charge = self.capacitor.charge();
            let shots = self.hardpoints.fire_at(randoms, &mut charge, xy);
            let spent = self.capacitor.charge() - charge;
            self.capacitor.drain(spent);
            return shots
                .into_iter()
                .map(|released| FiredShot {
                    shooter: self.id,
                    target: xy,
                    shot: released.shot,
                    falloff: released.falloff,
                })
                .collect();
        }

        if self.hardpoints.target_location() != xy {
            self.hardpoints.aim_at(xy);
        } else if !self.hardpoints.is_aiming()
            && !self.hardpoints.is_cooling()
            && self.capacitor.is_full()
        {
            // Settled, cool and full, yet nothing can fire: it never will.
            tracing::debug!(machine = self.id, target = ?xy, "fire order abandoned");
            self.orders.pop_front();
        }
        Vec::new()
    }
}
