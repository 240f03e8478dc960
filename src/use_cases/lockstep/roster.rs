use crate::interface_adapters::net::PeerConnection;
use crate::use_cases::LockstepError;
use crate::use_cases::lockstep::{Fault, TickMessages};

use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::warn;

/// The local name plus one connection per peer. Peers keep their slot for the
/// whole session; nothing else owns a connection.
pub struct Roster {
    me: String,
    peers: Vec<PeerConnection>,
}

impl Roster {
    pub fn new(me: impl Into<String>, peers: Vec<PeerConnection>) -> Result<Self, LockstepError> {
        let me = me.into();
        let mut seen = BTreeSet::new();
        seen.insert(me.clone());
        for peer in &peers {
            if !seen.insert(peer.name().to_string()) {
                return Err(LockstepError::LogicError(format!(
                    "participant name {} is used twice",
                    peer.name()
                )));
            }
        }
        Ok(Self { me, peers })
    }

    pub fn me(&self) -> &str {
        &self.me
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Peer names in sorted order.
    pub fn other_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.peers.iter().map(|p| p.name().to_string()).collect();
        names.sort();
        names
    }

    pub fn start_tick_reads(
        &mut self,
        handle: &Handle,
        messages: &Arc<TickMessages>,
        fault: &Arc<Fault>,
    ) -> Result<(), LockstepError> {
        for peer in &mut self.peers {
            peer.start_tick_reads(handle, messages.clone(), fault.clone())?;
        }
        Ok(())
    }

    pub fn request_frames(&self) {
        for peer in &self.peers {
            if !peer.request_frame() {
                warn!(peer = %peer.name(), "reader is gone; frame not requested");
            }
        }
    }

    pub fn broadcast(&self, body: &[u8]) -> Result<(), LockstepError> {
        for peer in &self.peers {
            peer.post(body)?;
        }
        Ok(())
    }

    pub fn close_all(&mut self) {
        for peer in &mut self.peers {
            peer.close();
        }
    }

    pub fn all_flushed(&self) -> bool {
        self.peers.iter().all(PeerConnection::is_flushed)
    }
}
