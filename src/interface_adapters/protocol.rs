// Wire formats carried inside frames: the setup handshake commands, the
// per-tick match messages and the game actions they wrap.

use crate::domain::{HexCoord, Instruction, MatchSettings};
use crate::use_cases::LockstepError;
use std::fmt;
use thiserror::Error;

pub const TOKEN_LEN: usize = 8;

const INIT: &[u8; TOKEN_LEN] = b"INIT    ";
const OPENPORT: &[u8; TOKEN_LEN] = b"OPENPORT";
const CONNECT: &[u8; TOKEN_LEN] = b"CONNECT ";
const BEGIN: &[u8; TOKEN_LEN] = b"BEGIN   ";
const INNITED: &[u8; TOKEN_LEN] = b"INNITED ";
const PORTOPEN: &[u8; TOKEN_LEN] = b"PORTOPEN";
const CONNCTED: &[u8; TOKEN_LEN] = b"CONNCTED";

/// Handshake commands. The first four flow host to client, the rest reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupCommand {
    Init { count: usize, name: String },
    OpenPort { name: String },
    Connect { name: String, host: String, port: u16 },
    Begin,
    Inited,
    PortOpen { port: u16 },
    Connected { address: String },
}

impl SetupCommand {
    pub fn token(&self) -> &'static str {
        match self {
            SetupCommand::Init { .. } => "INIT",
            SetupCommand::OpenPort { .. } => "OPENPORT",
            SetupCommand::Connect { .. } => "CONNECT",
            SetupCommand::Begin => "BEGIN",
            SetupCommand::Inited => "INNITED",
            SetupCommand::PortOpen { .. } => "PORTOPEN",
            SetupCommand::Connected { .. } => "CONNCTED",
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let (token, body) = match self {
            SetupCommand::Init { count, name } => (INIT, format!("{count};{name};")),
            SetupCommand::OpenPort { name } => (OPENPORT, name.clone()),
            SetupCommand::Connect { name, host, port } => (CONNECT, format!("{name}+{host}:{port}")),
            SetupCommand::Begin => (BEGIN, String::new()),
            SetupCommand::Inited => (INNITED, String::new()),
            SetupCommand::PortOpen { port } => (PORTOPEN, port.to_string()),
            SetupCommand::Connected { address } => (CONNCTED, address.clone()),
        };
        let mut out = Vec::with_capacity(TOKEN_LEN + body.len());
        out.extend_from_slice(token);
        out.extend_from_slice(body.as_bytes());
        out
    }

    pub fn parse(frame: &[u8]) -> Result<Self, LockstepError> {
        if frame.len() < TOKEN_LEN {
            return Err(LockstepError::UnexpectedMessageLength);
        }
        let (token, body) = frame.split_at(TOKEN_LEN);
        let body = std::str::from_utf8(body).map_err(|_| LockstepError::InvalidCommandPacket)?;

        match token {
            t if t == INIT => parse_init(body),
            t if t == OPENPORT => {
                if body.is_empty() {
                    return Err(LockstepError::InvalidCommandPacket);
                }
                Ok(SetupCommand::OpenPort {
                    name: body.to_string(),
                })
            }
            t if t == CONNECT => parse_connect(body),
            t if t == BEGIN => Ok(SetupCommand::Begin),
            t if t == INNITED => Ok(SetupCommand::Inited),
            t if t == PORTOPEN => body
                .parse()
                .map(|port| SetupCommand::PortOpen { port })
                .map_err(|_| LockstepError::InvalidCommandPacket),
            t if t == CONNCTED => Ok(SetupCommand::Connected {
                address: body.to_string(),
            }),
            _ => Err(LockstepError::UnknownMessage),
        }
    }
}

impl fmt::Display for SetupCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

fn parse_init(body: &str) -> Result<SetupCommand, LockstepError> {
    let mut parts = body.split(';');
    let count: usize = parts
        .next()
        .and_then(|c| c.parse().ok())
        .ok_or(LockstepError::InvalidCommandPacket)?;
    let name = parts.next().unwrap_or_default();
    if count < 2 || name.is_empty() {
        return Err(LockstepError::InvalidCommandPacket);
    }
    Ok(SetupCommand::Init {
        count,
        name: name.to_string(),
    })
}

fn parse_connect(body: &str) -> Result<SetupCommand, LockstepError> {
    let (name, endpoint) = body
        .split_once('+')
        .ok_or(LockstepError::InvalidCommandPacket)?;
    if name.is_empty() {
        return Err(LockstepError::InvalidCommandPacket);
    }
    // rsplit so that bare IPv6 hosts keep their colons.
    let (host, port) = endpoint
        .rsplit_once(':')
        .ok_or(LockstepError::MissingEndpoint)?;
    if host.is_empty() || port.is_empty() {
        return Err(LockstepError::MissingEndpoint);
    }
    let port = port.parse().map_err(|_| LockstepError::InvalidCommandPacket)?;
    Ok(SetupCommand::Connect {
        name: name.to_string(),
        host: host.to_string(),
        port,
    })
}

pub const ACTION_TYPE_INSTRUCTIONS: u8 = 1;
pub const ACTION_HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ActionDecodeError {
    #[error("unknown game action type {0}")]
    UnknownActionType(u8),
    #[error("game action truncated: needed {needed} bytes, {available} left")]
    Truncated { needed: usize, available: usize },
    #[error("game action carries no instructions")]
    EmptyInstructionList,
}

/// Instructions for the machine standing on `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameAction {
    pub target: HexCoord,
    pub instructions: Vec<Instruction>,
}

impl GameAction {
    pub fn encoded_len(&self) -> usize {
        ACTION_HEADER_LEN + self.instructions.len() * Instruction::WIRE_SIZE
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(ACTION_TYPE_INSTRUCTIONS);
        out.push(self.target.x as u8);
        out.push(self.target.y as u8);
        out.push(0);
        out.extend_from_slice(&(self.instructions.len() as u32).to_le_bytes());
        for instruction in &self.instructions {
            out.extend_from_slice(&instruction.to_le_bytes());
        }
    }
}

/// Decodes back-to-back actions until `bytes` is used up.
pub fn decode_actions(mut bytes: &[u8]) -> Result<Vec<GameAction>, ActionDecodeError> {
    let mut actions = Vec::new();
    while !bytes.is_empty() {
        if bytes[0] != ACTION_TYPE_INSTRUCTIONS {
            return Err(ActionDecodeError::UnknownActionType(bytes[0]));
        }
        let header = take(&mut bytes, ACTION_HEADER_LEN)?;
        let target = HexCoord::new(header[1] as i8, header[2] as i8);
        let count = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        if count == 0 {
            return Err(ActionDecodeError::EmptyInstructionList);
        }

        let needed = count
            .checked_mul(Instruction::WIRE_SIZE)
            .ok_or(ActionDecodeError::Truncated {
                needed: usize::MAX,
                available: bytes.len(),
            })?;
        let body = take(&mut bytes, needed)?;
        let instructions = body
            .chunks_exact(Instruction::WIRE_SIZE)
            .map(|chunk| {
                let mut word = [0u8; Instruction::WIRE_SIZE];
                word.copy_from_slice(chunk);
                Instruction::from_le_bytes(word)
            })
            .collect();
        actions.push(GameAction {
            target,
            instructions,
        });
    }
    Ok(actions)
}

fn take<'a>(bytes: &mut &'a [u8], n: usize) -> Result<&'a [u8], ActionDecodeError> {
    if bytes.len() < n {
        return Err(ActionDecodeError::Truncated {
            needed: n,
            available: bytes.len(),
        });
    }
    let (head, rest) = bytes.split_at(n);
    *bytes = rest;
    Ok(head)
}

pub const KIND_STARTING_CONDITION: u8 = 1;
pub const KIND_LOADED: u8 = 2;
pub const KIND_GAME_ACTIONS: u8 = 3;
pub const KIND_LOADING_ERROR: u8 = 4;
pub const KIND_PLAYING_ERROR: u8 = 5;

#[derive(Debug, Error)]
pub enum MatchDecodeError {
    #[error("unknown match message kind {0}")]
    UnknownKind(u8),
    #[error("bad match settings: {0}")]
    Settings(#[from] serde_json::Error),
    #[error(transparent)]
    Actions(#[from] ActionDecodeError),
}

/// One participant's contribution to a tick, after the empty case is removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchMessage {
    StartingCondition(MatchSettings),
    Loaded,
    GameActions(Vec<GameAction>),
    LoadingError,
    PlayingError,
}

impl MatchMessage {
    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), serde_json::Error> {
        match self {
            MatchMessage::StartingCondition(settings) => {
                out.push(KIND_STARTING_CONDITION);
                serde_json::to_writer(&mut *out, settings)?;
            }
            MatchMessage::Loaded => out.push(KIND_LOADED),
            MatchMessage::GameActions(actions) => {
                out.push(KIND_GAME_ACTIONS);
                for action in actions {
                    action.encode_into(out);
                }
            }
            MatchMessage::LoadingError => out.push(KIND_LOADING_ERROR),
            MatchMessage::PlayingError => out.push(KIND_PLAYING_ERROR),
        }
        Ok(())
    }

    /// Decodes a non-empty message.
    pub fn decode(bytes: &[u8]) -> Result<Self, MatchDecodeError> {
        let Some((&kind, rest)) = bytes.split_first() else {
            return Err(MatchDecodeError::UnknownKind(0));
        };
        match kind {
            KIND_STARTING_CONDITION => Ok(MatchMessage::StartingCondition(serde_json::from_slice(rest)?)),
            KIND_LOADED => Ok(MatchMessage::Loaded),
            KIND_GAME_ACTIONS => Ok(MatchMessage::GameActions(decode_actions(rest)?)),
            KIND_LOADING_ERROR => Ok(MatchMessage::LoadingError),
            KIND_PLAYING_ERROR => Ok(MatchMessage::PlayingError),
            other => Err(MatchDecodeError::UnknownKind(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instruction::{OP_ADVANCE, OP_TURN};

    #[test]
    fn when_init_is_written_then_token_is_space_padded() {
        let init = SetupCommand::Init {
            count: 3,
            name: "0".into(),
        };
        assert_eq!(init.encode(), b"INIT    3;0;".to_vec());
        assert_eq!(SetupCommand::parse(&init.encode()).expect("parse"), init);
        assert_eq!(SetupCommand::Begin.encode(), b"BEGIN   ".to_vec());
    }

    #[test]
    fn when_init_is_malformed_then_it_is_an_invalid_packet() {
        for body in [&b"INIT    1;0;"[..], b"INIT    3;;", b"INIT    x;0;", b"INIT    "] {
            assert!(matches!(
                SetupCommand::parse(body),
                Err(LockstepError::InvalidCommandPacket)
            ));
        }
    }

    #[test]
    fn when_frame_is_shorter_than_a_token_then_length_is_rejected() {
        assert!(matches!(
            SetupCommand::parse(b"INIT"),
            Err(LockstepError::UnexpectedMessageLength)
        ));
        assert!(matches!(
            SetupCommand::parse(b"HELLO   "),
            Err(LockstepError::UnknownMessage)
        ));
    }

    #[test]
    fn when_connect_is_parsed_then_missing_parts_are_reported() {
        assert_eq!(
            SetupCommand::parse(b"CONNECT 2+10.0.0.7:4100").expect("parse"),
            SetupCommand::Connect {
                name: "2".into(),
                host: "10.0.0.7".into(),
                port: 4100
            }
        );
        assert_eq!(
            SetupCommand::parse(b"CONNECT 1+::1:80").expect("parse"),
            SetupCommand::Connect {
                name: "1".into(),
                host: "::1".into(),
                port: 80
            }
        );
        assert!(matches!(
            SetupCommand::parse(b"CONNECT 2+10.0.0.7"),
            Err(LockstepError::MissingEndpoint)
        ));
        assert!(matches!(
            SetupCommand::parse(b"CONNECT 2+:4100"),
            Err(LockstepError::MissingEndpoint)
        ));
        assert!(matches!(
            SetupCommand::parse(b"CONNECT 2+10.0.0.7:port"),
            Err(LockstepError::InvalidCommandPacket)
        ));
        assert!(matches!(
            SetupCommand::parse(b"CONNECT 10.0.0.7:4100"),
            Err(LockstepError::InvalidCommandPacket)
        ));
    }

    #[test]
    fn when_actions_are_concatenated_then_all_are_decoded() {
        let a = GameAction {
            target: HexCoord::new(3, 4),
            instructions: vec![Instruction::new(OP_TURN, 0, 2, 0)],
        };
        let b = GameAction {
            target: HexCoord::new(1, 0),
            instructions: vec![
                Instruction::new(OP_ADVANCE, 1, 0, 0),
                Instruction::new(OP_TURN, 1, 1, 0),
            ],
        };
        let mut bytes = Vec::new();
        a.encode_into(&mut bytes);
        b.encode_into(&mut bytes);
        assert_eq!(bytes.len(), a.encoded_len() + b.encoded_len());
        assert_eq!(&bytes[..8], &[1, 3, 4, 0, 1, 0, 0, 0]);

        assert_eq!(decode_actions(&bytes).expect("decode"), vec![a, b]);
    }

    #[test]
    fn when_action_is_damaged_then_decoding_says_why() {
        assert_eq!(
            decode_actions(&[2, 0, 0, 0, 1, 0, 0, 0]),
            Err(ActionDecodeError::UnknownActionType(2))
        );
        assert_eq!(
            decode_actions(&[1, 0, 0, 0, 0, 0, 0, 0]),
            Err(ActionDecodeError::EmptyInstructionList)
        );
        assert_eq!(
            decode_actions(&[1, 0, 0, 0, 2, 0, 0, 0, 0x11, 0, 0, 0, 1, 0, 0, 0]),
            Err(ActionDecodeError::Truncated {
                needed: 16,
                available: 8
            })
        );
        assert!(matches!(
            decode_actions(&[1, 0, 0]),
            Err(ActionDecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn when_match_messages_are_decoded_then_kind_byte_selects_the_variant() {
        let settings = MatchSettings {
            seed: 77,
            machines_per_player: 2,
        };
        let mut bytes = Vec::new();
        MatchMessage::StartingCondition(settings)
            .encode_into(&mut bytes)
            .expect("encode");
        assert_eq!(bytes[0], KIND_STARTING_CONDITION);
        assert_eq!(
            MatchMessage::decode(&bytes).expect("decode"),
            MatchMessage::StartingCondition(settings)
        );
        assert_eq!(MatchMessage::decode(&[KIND_LOADED]).expect("loaded"), MatchMessage::Loaded);
        assert_eq!(
            MatchMessage::decode(&[KIND_GAME_ACTIONS]).expect("no actions"),
            MatchMessage::GameActions(Vec::new())
        );
        assert!(matches!(MatchMessage::decode(&[9]), Err(MatchDecodeError::UnknownKind(9))));
    }
}
