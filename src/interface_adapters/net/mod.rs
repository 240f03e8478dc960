// Network adapter modules: framing on the wire and per-peer socket handling.

pub mod connection;
pub mod framer;

pub use connection::PeerConnection;
pub use framer::{FrameError, FrameReader, MAX_BODY};
