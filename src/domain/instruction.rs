// Bot instructions as they travel inside game actions, and the machine orders
// they decode to.

use super::hex::HexCoord;
use super::turning::TurnDirection;

pub const OP_NOP: u16 = 0x0000;
pub const OP_TURN: u16 = 0x0011;
pub const OP_ADVANCE: u16 = 0x0012;
pub const OP_AIM_AT: u16 = 0x0046;
pub const OP_FIRE_AT: u16 = 0x0048;

// The top nibble of the opcode word carries addressing flags the VM uses.
const OPCODE_MASK: u16 = 0x0FFF;

/// One VM word group: `[opcode, a0, a1, a2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Instruction(pub [u16; 4]);

impl Instruction {
    pub const WIRE_SIZE: usize = 8;

    pub fn new(opcode: u16, a0: u16, a1: u16, a2: u16) -> Self {
        Self([opcode, a0, a1, a2])
    }

    pub fn opcode(&self) -> u16 {
        self.0[0] & OPCODE_MASK
    }

    pub fn to_le_bytes(self) -> [u8; Self::WIRE_SIZE] {
        let mut out = [0u8; Self::WIRE_SIZE];
        for (chunk, word) in out.chunks_exact_mut(2).zip(self.0) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    pub fn from_le_bytes(bytes: [u8; Self::WIRE_SIZE]) -> Self {
        let mut words = [0u16; 4];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(2)) {
            *word = u16::from_le_bytes([chunk[0], chunk[1]]);
        }
        Self(words)
    }

    /// The order this instruction asks of a machine, if any.
    pub fn to_order(self) -> Option<MachineOrder> {
        let [_, a0, a1, _] = self.0;
        match self.opcode() {
            OP_TURN => {
                let direction = if a0 == 0 {
                    TurnDirection::Clockwise
                } else {
                    TurnDirection::CounterClockwise
                };
                Some(MachineOrder::Turn { direction, n: a1 })
            }
            OP_ADVANCE => Some(MachineOrder::Advance { tiles: a0 }),
            OP_AIM_AT => Some(MachineOrder::AimAt(coord(a0, a1))),
            OP_FIRE_AT => Some(MachineOrder::FireAt(coord(a0, a1))),
            _ => None,
        }
    }
}

fn coord(x: u16, y: u16) -> HexCoord {
    match (i8::try_from(x), i8::try_from(y)) {
        (Ok(x), Ok(y)) => HexCoord::new(x, y),
        _ => HexCoord::INVALID,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineOrder {
    Turn { direction: TurnDirection, n: u16 },
    Advance { tiles: u16 },
    AimAt(HexCoord),
    FireAt(HexCoord),
}
