// Domain layer: fixed-point simulation types and rules. Nothing in here touches
// the clock, the network or floating point.

pub mod angle;
pub mod board;
pub mod grid;
pub mod hardpoints;
pub mod hex;
pub mod instruction;
pub mod machine;
pub mod position;
pub mod propulsion;
pub mod randoms;
pub mod shooter;
pub mod shot;
pub mod tuning;
pub mod turning;

pub use board::{
    Board, BoardError, BoardSnapshot, MachineSnapshot, MachineSpawn, MatchSettings,
    StartingConditions,
};
pub use hex::{HexCoord, HexFacing};
pub use instruction::{Instruction, MachineOrder};
