// The whole simulated match: grid, machines and the shared random source.
// Everything here must advance identically on every participant.

use super::grid::{HexGrid, MachineId, MovementGrid};
use super::hex::{HexCoord, HexFacing};
use super::instruction::Instruction;
use super::machine::{FiredShot, Machine, MachineBlueprint};
use super::position::PositionInfo;
use super::randoms::Randoms;
use super::shooter::ShooterError;
use super::shot::ShotEffect;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SPAWNS_PER_ROW: usize = 7;
const BOARD_WIDTH: i8 = 16;
const MAX_BOARD_HEIGHT: i8 = 120;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("invalid hardpoint on {owner}'s machine: {source}")]
    Shooter {
        owner: String,
        #[source]
        source: ShooterError,
    },
    #[error("spawn for {owner} at {xy:?} is off the board or taken")]
    BadSpawn { owner: String, xy: HexCoord },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSpawn {
    pub owner: String,
    pub xy: HexCoord,
    pub facing: HexFacing,
    pub blueprint: MachineBlueprint,
}

/// What the host hands every participant before play: enough to build an
/// identical board everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartingConditions {
    pub seed: u32,
    pub width: i8,
    pub height: i8,
    pub spawns: Vec<MachineSpawn>,
}

impl StartingConditions {
    /// Standard layout: players in name order, `per_player` default machines
    /// each, alternately facing down and up the board.
    pub fn standard(seed: u32, participants: &[String], per_player: usize) -> Self {
        let mut names = participants.to_vec();
        names.sort();

        let total = names.len() * per_player;
        let rows = total.div_ceil(SPAWNS_PER_ROW).max(1);
        let height = (rows * 3 + 2).min(MAX_BOARD_HEIGHT as usize) as i8;

        let mut spawns = Vec::with_capacity(total);
        for (p, owner) in names.iter().enumerate() {
            let facing = if p % 2 == 0 {
                HexFacing::Facing3
            } else {
                HexFacing::Facing0
            };
            for m in 0..per_player {
                let i = p * per_player + m;
                let xy = HexCoord::new(
                    (1 + 2 * (i % SPAWNS_PER_ROW)) as i8,
                    (1 + 3 * (i / SPAWNS_PER_ROW)).min(i8::MAX as usize) as i8,
                );
                spawns.push(MachineSpawn {
                    owner: owner.clone(),
                    xy,
                    facing,
                    blueprint: MachineBlueprint::default(),
                });
            }
        }

        Self {
            seed,
            width: BOARD_WIDTH,
            height,
            spawns,
        }
    }
}

/// The handful of values the host picks for a match. Every participant expands
/// them into the same `StartingConditions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSettings {
    pub seed: u32,
    pub machines_per_player: u8,
}

impl MatchSettings {
    pub fn conditions(&self, participants: &[String]) -> StartingConditions {
        StartingConditions::standard(self.seed, participants, self.machines_per_player as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineSnapshot {
    pub id: MachineId,
    pub owner: String,
    pub position: PositionInfo,
    pub hull: u16,
    pub capacitor: u16,
    pub ore_mined: u32,
    pub destroyed: bool,
    pub hardpoint_angles: Vec<i32>,
}

/// Read-only copy of the board for renderers and cross-peer comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardSnapshot {
    pub frame: u64,
    pub machines: Vec<MachineSnapshot>,
}

impl BoardSnapshot {
    /// FNV-1a over the JSON form; equal digests mean equal boards.
    pub fn digest(&self) -> u64 {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        bytes.iter().fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
            (h ^ *b as u64).wrapping_mul(0x0000_0100_0000_01b3)
        })
    }
}

#[derive(Debug, Clone)]
pub struct Board {
    grid: HexGrid,
    // Ordered by id; ids are never reused.
    machines: Vec<Machine>,
    randoms: Randoms,
    frame: u64,
}

impl Board {
    pub fn from_conditions(conditions: &StartingConditions) -> Result<Self, BoardError> {
        let mut grid = HexGrid::new(conditions.width, conditions.height);
        let mut machines = Vec::with_capacity(conditions.spawns.len());

        for (i, spawn) in conditions.spawns.iter().enumerate() {
            let id = (i + 1) as MachineId;
            if !grid.place(spawn.xy, id) {
                return Err(BoardError::BadSpawn {
                    owner: spawn.owner.clone(),
                    xy: spawn.xy,
                });
            }
            let machine = Machine::new(id, spawn.owner.clone(), &spawn.blueprint, spawn.xy, spawn.facing)
                .map_err(|source| BoardError::Shooter {
                    owner: spawn.owner.clone(),
                    source,
                })?;
            machines.push(machine);
        }

        Ok(Self {
            grid,
            machines,
            randoms: Randoms::new(conditions.seed),
            frame: 0,
        })
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn grid(&self) -> &HexGrid {
        &self.grid
    }

    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    pub fn machine_at(&self, xy: HexCoord) -> Option<&Machine> {
        let id = self.grid.occupant(xy)?;
        self.machines.iter().find(|m| m.id() == id)
    }

    /// Queues the orders in `instructions` on `owner`'s machine at `xy`.
    /// Returns false, leaving the board untouched, when there is no such machine.
    pub fn send_instructions(&mut self, owner: &str, xy: HexCoord, instructions: &[Instruction]) -> bool {
        let Some(id) = self.grid.occupant(xy) else {
            tracing::debug!(owner, ?xy, "instructions for an empty tile");
            return false;
        };
        let Some(machine) = self.machine_mut(id) else {
            return false;
        };
        if machine.owner() != owner || machine.is_destroyed() {
            tracing::warn!(owner, ?xy, machine = id, "instructions for a machine the sender does not own");
            return false;
        }
        machine.queue_orders(instructions.iter().filter_map(|i| i.to_order()));
        true
    }

    pub fn advance_one_frame(&mut self) {
        let mut fired: Vec<FiredShot> = Vec::new();
        for machine in &mut self.machines {
            fired.extend(machine.tick(&mut self.grid, &mut self.randoms));
        }
        for shot in fired {
            self.resolve(shot);
        }
        self.frame += 1;
    }

    fn machine_mut(&mut self, id: MachineId) -> Option<&mut Machine> {
        self.machines.iter_mut().find(|m| m.id() == id)
    }

    fn resolve(&mut self, fired: FiredShot) {
        let effect = fired.shot.effect.scaled(fired.falloff);

        if let ShotEffect::Mining { volume_mined } = effect {
            if let Some(shooter) = self.machine_mut(fired.shooter) {
                shooter.add_ore(volume_mined);
            }
            return;
        }

        let Some(target_id) = self.grid.occupant(fired.target) else {
            tracing::trace!(shooter = fired.shooter, target = ?fired.target, "shot missed");
            return;
        };

        match effect {
            ShotEffect::Weapon(damages) => {
                let Some(target) = self.machine_mut(target_id) else {
                    return;
                };
                if target.take_damage(damages) {
                    let xy = target.grid_xy();
                    tracing::info!(machine = target_id, shooter = fired.shooter, "machine destroyed");
                    self.grid.remove(xy, target_id);
                }
            }
            ShotEffect::CapDrain { cap_drained } => {
                if let Some(target) = self.machine_mut(target_id) {
                    target.capacitor_mut().drain(cap_drained);
                }
            }
            ShotEffect::CapXfer { cap_transferred } => {
                let given = match self.machine_mut(fired.shooter) {
                    Some(shooter) => shooter.capacitor_mut().drain(cap_transferred),
                    None => 0,
                };
                if let Some(target) = self.machine_mut(target_id) {
                    target.capacitor_mut().add(given);
                }
            }
            ShotEffect::Repair { armour_repaired } => {
                if let Some(target) = self.machine_mut(target_id) {
                    target.repair(armour_repaired);
                }
            }
            ShotEffect::Mining { .. } => {}
        }
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            frame: self.frame,
            machines: self
                .machines
                .iter()
                .map(|m| MachineSnapshot {
                    id: m.id(),
                    owner: m.owner().to_string(),
                    position: m.position_info(),
                    hull: m.hull(),
                    capacitor: m.capacitor().charge(),
                    ore_mined: m.ore_mined(),
                    destroyed: m.is_destroyed(),
                    hardpoint_angles: m
                        .hardpoints()
                        .hardpoints()
                        .iter()
                        .map(|hp| hp.current_angle())
                        .collect(),
                })
                .collect(),
        }
    }

    /// True when every live machine stands on a tile the grid says it holds.
    pub fn is_consistent(&self) -> bool {
        self.machines
            .iter()
            .filter(|m| !m.is_destroyed())
            .all(|m| self.grid.occupant(m.grid_xy()) == Some(m.id()) && self.grid.is_on_board(m.grid_xy()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instruction::{OP_ADVANCE, OP_FIRE_AT, OP_TURN};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn when_participants_arrive_in_any_order_then_layout_is_identical() {
        let settings = MatchSettings {
            seed: 9,
            machines_per_player: 2,
        };
        let a = settings.conditions(&names(&["2", "0", "1"]));
        let b = settings.conditions(&names(&["0", "1", "2"]));
        assert_eq!(a, b);
        assert_eq!(a.spawns.len(), 6);
        assert_eq!(a.spawns[0].owner, "0");
        assert!(Board::from_conditions(&a).is_ok());
    }

    #[test]
    fn when_two_spawns_share_a_tile_then_board_is_rejected() {
        let mut c = StartingConditions::standard(1, &names(&["0", "1"]), 1);
        c.spawns[1].xy = c.spawns[0].xy;
        assert!(matches!(Board::from_conditions(&c), Err(BoardError::BadSpawn { .. })));
    }

    #[test]
    fn when_instructions_target_another_players_machine_then_they_are_refused() {
        let c = StartingConditions::standard(1, &names(&["0", "1"]), 1);
        let mut board = Board::from_conditions(&c).expect("board");
        let theirs = c.spawns[1].xy;
        let advance = [Instruction::new(OP_ADVANCE, 1, 0, 0)];
        assert!(!board.send_instructions("0", theirs, &advance));
        assert!(board.send_instructions("1", theirs, &advance));
        assert!(!board.send_instructions("1", HexCoord::new(15, 15), &advance));
    }

    #[test]
    fn when_same_instructions_run_on_two_boards_then_snapshots_match_every_frame() {
        let c = StartingConditions::standard(1234, &names(&["0", "1", "2"]), 2);
        let mut a = Board::from_conditions(&c).expect("board");
        let mut b = Board::from_conditions(&c).expect("board");

        let orders = [
            Instruction::new(OP_TURN, 0, 1, 0),
            Instruction::new(OP_ADVANCE, 2, 0, 0),
            Instruction::new(OP_TURN, 1, 2, 0),
            Instruction::new(OP_ADVANCE, 1, 0, 0),
        ];
        for spawn in &c.spawns {
            assert!(a.send_instructions(&spawn.owner, spawn.xy, &orders));
            assert!(b.send_instructions(&spawn.owner, spawn.xy, &orders));
        }

        for _ in 0..400 {
            a.advance_one_frame();
            b.advance_one_frame();
            assert_eq!(a.snapshot(), b.snapshot());
            assert!(a.is_consistent());
            assert_eq!(a.grid().reservations().count(), b.grid().reservations().count());
        }
        assert_eq!(a.snapshot().digest(), b.snapshot().digest());
        assert_ne!(a.snapshot().machines[0].position.grid_xy, c.spawns[0].xy);
    }

    #[test]
    fn when_weapon_fire_lands_then_target_loses_hull_scaled_by_range() {
        // Shooter at (3,5) facing up, target two tiles ahead.
        let c = StartingConditions {
            seed: 1,
            width: 8,
            height: 8,
            spawns: vec![
                MachineSpawn {
                    owner: "0".into(),
                    xy: HexCoord::new(3, 5),
                    facing: HexFacing::Facing0,
                    blueprint: MachineBlueprint::default(),
                },
                MachineSpawn {
                    owner: "1".into(),
                    xy: HexCoord::new(3, 3),
                    facing: HexFacing::Facing3,
                    blueprint: MachineBlueprint::default(),
                },
            ],
        };
        let mut board = Board::from_conditions(&c).expect("board");
        let fire = [Instruction::new(OP_FIRE_AT, 3, 3, 0)];
        assert!(board.send_instructions("0", HexCoord::new(3, 5), &fire));

        board.advance_one_frame();

        let target = board.machine_at(HexCoord::new(3, 3)).expect("target");
        assert!(target.hull() < crate::domain::tuning::DEFAULT_HULL);
        // 100 damage at most, 75% falloff at range 2 of 1..=5.
        assert!(crate::domain::tuning::DEFAULT_HULL - target.hull() <= 87);
    }
}
