// Shared helpers for running whole lockstep sessions over loopback sockets.
#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

use lockstep_server::use_cases::{
    LockstepCoordinator, LockstepError, LockstepSettings, LoopResult, NetworkGameLoop, Role,
};
use tokio::runtime::Handle;

// Short ticks keep the suite fast; the timeout only guards against hangs.
pub fn fast_settings() -> LockstepSettings {
    LockstepSettings {
        tick_length: Duration::from_millis(10),
        connection_timeout: Some(Duration::from_secs(10)),
        poll_interval: Duration::from_millis(1),
    }
}

// Bind a host role on an ephemeral loopback port and return the address clients dial.
pub fn host_role(participants: usize) -> (Role, String) {
    let role = Role::host_on(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)), participants)
        .expect("bind ephemeral host port");
    let address = match &role {
        Role::Host { listener, .. } => listener.local_addr().expect("host local addr").to_string(),
        Role::Client { .. } => unreachable!("host_on always builds a host role"),
    };
    (role, address)
}

// Run one participant to completion on a blocking thread and hand the game loop back.
pub async fn play<G>(role: Role, settings: LockstepSettings, mut game: G) -> (G, Result<(), LockstepError>)
where
    G: NetworkGameLoop + 'static,
{
    let coordinator = LockstepCoordinator::new(role, settings, Handle::current());
    tokio::task::spawn_blocking(move || {
        let result = coordinator.run(&mut game);
        (game, result)
    })
    .await
    .expect("coordinator thread panicked")
}

/// Sends `"<name>:<tick>"` every tick and records everything it sees.
#[derive(Debug, Default)]
pub struct RecordingLoop {
    pub me: String,
    pub others: Vec<String>,
    pub ticks: Vec<BTreeMap<String, Vec<u8>>>,
    pub tick_ms: Vec<u64>,
    pub setup_polls: usize,
    pub finished: bool,
    stop_after: usize,
    abandon_setup: bool,
}

impl RecordingLoop {
    pub fn stopping_after(ticks: usize) -> Self {
        Self {
            stop_after: ticks,
            ..Self::default()
        }
    }

    // Asks the coordinator to give up while setup is still waiting for peers.
    pub fn abandoning_setup() -> Self {
        Self {
            abandon_setup: true,
            ..Self::default()
        }
    }

    pub fn expected_message(name: &str, tick: usize) -> Vec<u8> {
        format!("{name}:{tick}").into_bytes()
    }
}

impl NetworkGameLoop for RecordingLoop {
    fn preframe_update(&mut self, _elapsed_ms: u64) -> LoopResult {
        self.setup_polls += 1;
        if self.abandon_setup && self.setup_polls > 5 {
            LoopResult::StopLooping
        } else {
            LoopResult::LoopAgain
        }
    }

    fn setup_participants(&mut self, me: &str, others: &[String]) {
        self.me = me.to_string();
        self.others = others.to_vec();
    }

    fn get_frame_message(&mut self, message: &mut Vec<u8>) {
        message.extend(Self::expected_message(&self.me, self.ticks.len()));
    }

    fn end_frame(&mut self, messages: &BTreeMap<String, Vec<u8>>, tick_ms: u64) {
        self.ticks.push(messages.clone());
        self.tick_ms.push(tick_ms);
    }

    fn frame_update(&mut self, _elapsed_ms: u64) -> LoopResult {
        if self.ticks.len() >= self.stop_after {
            LoopResult::StopLooping
        } else {
            LoopResult::LoopAgain
        }
    }

    fn final_frame_update(&mut self, _elapsed_ms: u64) {
        self.finished = true;
    }
}
