// Use cases layer: a match played over the lockstep coordinator. The host
// picks the settings, everyone builds the same board, waits until all are
// loaded and then feeds every tick's actions into the simulation.

use crate::domain::{Board, BoardSnapshot, MatchSettings};
use crate::interface_adapters::net::MAX_BODY;
use crate::interface_adapters::protocol::{GameAction, MatchMessage};
use crate::interface_adapters::utils::rng::new_match_seed;
use crate::use_cases::game_loop::{LoopResult, NetworkGameLoop};

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchStage {
    StartingUp,
    HostSendingArgs,
    ClientWaitingForArgs,
    LoadingLocally,
    Loaded,
    ListeningForAllLoaded,
    Playing,
    LoadingFailed,
    PlayingFailed,
}

impl MatchStage {
    pub fn is_failed(self) -> bool {
        matches!(self, MatchStage::LoadingFailed | MatchStage::PlayingFailed)
    }
}

/// Local actions waiting to go out. Cloned handles share one queue, so the
/// application can push from any thread while the session drains it.
#[derive(Debug, Clone, Default)]
pub struct ActionQueue {
    inner: Arc<Mutex<Vec<GameAction>>>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, action: GameAction) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(action);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes actions from the front while their encoding fits in `budget`
    /// bytes. The rest wait for a later tick.
    pub fn drain_fitting(&self, budget: usize) -> Vec<GameAction> {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut used = 0;
        let mut take = 0;
        for action in queue.iter() {
            let len = action.encoded_len();
            if used + len > budget {
                break;
            }
            used += len;
            take += 1;
        }
        if take == 0 && queue.first().is_some_and(|a| a.encoded_len() > budget) {
            let dropped = queue.remove(0);
            warn!(
                target_xy = ?dropped.target,
                instructions = dropped.instructions.len(),
                "action can never fit in a tick message; dropped"
            );
        }
        queue.drain(..take).collect()
    }
}

pub struct MatchSession {
    is_host: bool,
    stage: MatchStage,
    me: String,
    participants: Vec<String>,
    machines_per_player: u8,
    seed: Option<u32>,
    settings: Option<MatchSettings>,
    board: Option<Board>,
    loaded: BTreeSet<String>,
    actions: ActionQueue,
    match_ticks: u64,
    ticks_played: u64,
    digest_every: u64,
    error_seen: bool,
}

impl MatchSession {
    /// Session for the participant that picks the match settings.
    pub fn host(machines_per_player: u8, match_ticks: u64) -> Self {
        Self::new(true, machines_per_player, match_ticks)
    }

    pub fn client(match_ticks: u64) -> Self {
        Self::new(false, 0, match_ticks)
    }

    fn new(is_host: bool, machines_per_player: u8, match_ticks: u64) -> Self {
        Self {
            is_host,
            stage: MatchStage::StartingUp,
            me: String::new(),
            participants: Vec::new(),
            machines_per_player,
            seed: None,
            settings: None,
            board: None,
            loaded: BTreeSet::new(),
            actions: ActionQueue::new(),
            match_ticks,
            ticks_played: 0,
            digest_every: 0,
            error_seen: false,
        }
    }

    /// Fixes the seed instead of drawing a fresh one. Host only.
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Logs a board digest every `ticks` played ticks (0 disables).
    pub fn with_digest_every(mut self, ticks: u64) -> Self {
        self.digest_every = ticks;
        self
    }

    pub fn actions(&self) -> ActionQueue {
        self.actions.clone()
    }

    pub fn stage(&self) -> MatchStage {
        self.stage
    }

    pub fn me(&self) -> &str {
        &self.me
    }

    pub fn settings(&self) -> Option<MatchSettings> {
        self.settings
    }

    pub fn ticks_played(&self) -> u64 {
        self.ticks_played
    }

    pub fn snapshot(&self) -> Option<BoardSnapshot> {
        self.board.as_ref().map(Board::snapshot)
    }

    fn fail(&mut self) {
        self.stage = if self.stage == MatchStage::Playing || self.stage == MatchStage::PlayingFailed {
            MatchStage::PlayingFailed
        } else {
            MatchStage::LoadingFailed
        };
    }

    fn load(&mut self) {
        let Some(settings) = self.settings else {
            error!("loading without match settings");
            self.stage = MatchStage::LoadingFailed;
            return;
        };
        match Board::from_conditions(&settings.conditions(&self.participants)) {
            Ok(board) => {
                info!(
                    machines = board.machines().len(),
                    seed = settings.seed,
                    "board loaded"
                );
                self.board = Some(board);
                self.stage = MatchStage::Loaded;
            }
            Err(e) => {
                error!(error = %e, "board failed to load");
                self.stage = MatchStage::LoadingFailed;
            }
        }
    }

    fn outgoing(&mut self) -> Option<MatchMessage> {
        match self.stage {
            MatchStage::HostSendingArgs => {
                self.stage = MatchStage::LoadingLocally;
                self.settings.map(MatchMessage::StartingCondition)
            }
            MatchStage::Loaded => {
                self.stage = MatchStage::ListeningForAllLoaded;
                Some(MatchMessage::Loaded)
            }
            MatchStage::Playing => {
                // One byte goes to the kind marker.
                let actions = self.actions.drain_fitting(MAX_BODY - 1);
                (!actions.is_empty()).then_some(MatchMessage::GameActions(actions))
            }
            MatchStage::LoadingFailed if !self.error_seen => Some(MatchMessage::LoadingError),
            MatchStage::PlayingFailed if !self.error_seen => Some(MatchMessage::PlayingError),
            _ => None,
        }
    }

    fn receive(&mut self, sender: &str, message: MatchMessage) {
        match message {
            MatchMessage::StartingCondition(settings) => {
                if sender != self.me && self.stage == MatchStage::ClientWaitingForArgs {
                    debug!(from = %sender, seed = settings.seed, "match settings received");
                    self.settings = Some(settings);
                    self.stage = MatchStage::LoadingLocally;
                }
            }
            MatchMessage::Loaded => {
                self.loaded.insert(sender.to_string());
            }
            MatchMessage::GameActions(actions) => {
                if self.stage != MatchStage::Playing {
                    debug!(from = %sender, "actions before play ignored");
                    return;
                }
                let Some(board) = self.board.as_mut() else {
                    return;
                };
                for action in actions {
                    board.send_instructions(sender, action.target, &action.instructions);
                }
            }
            MatchMessage::LoadingError | MatchMessage::PlayingError => {
                warn!(from = %sender, kind = ?message, "participant reported an error");
                self.error_seen = true;
                if !self.stage.is_failed() {
                    self.fail();
                }
            }
        }
    }
}

impl NetworkGameLoop for MatchSession {
    fn setup_participants(&mut self, me: &str, others: &[String]) {
        self.me = me.to_string();
        let mut all = others.to_vec();
        all.push(me.to_string());
        all.sort();
        self.participants = all;

        if self.is_host {
            self.settings = Some(MatchSettings {
                seed: self.seed.unwrap_or_else(new_match_seed),
                machines_per_player: self.machines_per_player,
            });
        }
        info!(me, participants = self.participants.len(), host = self.is_host, "match roster set");
    }

    fn get_frame_message(&mut self, message: &mut Vec<u8>) {
        if self.stage == MatchStage::StartingUp {
            self.stage = if self.is_host {
                MatchStage::HostSendingArgs
            } else {
                MatchStage::ClientWaitingForArgs
            };
        }
        if self.stage == MatchStage::LoadingLocally {
            self.load();
        }

        let Some(outgoing) = self.outgoing() else {
            return;
        };
        if let Err(e) = outgoing.encode_into(message) {
            error!(error = %e, "could not encode tick message");
            message.clear();
            self.fail();
        }
    }

    fn end_frame(&mut self, messages: &BTreeMap<String, Vec<u8>>, _tick_ms: u64) {
        for (sender, bytes) in messages {
            if bytes.is_empty() {
                continue;
            }
            match MatchMessage::decode(bytes) {
                Ok(message) => self.receive(sender, message),
                Err(e) => {
                    warn!(from = %sender, error = %e, "undecodable tick message");
                    self.fail();
                }
            }
        }

        if self.stage == MatchStage::ListeningForAllLoaded
            && self.participants.iter().all(|p| self.loaded.contains(p))
        {
            info!("all participants loaded; play starts");
            self.stage = MatchStage::Playing;
        }

        if self.stage == MatchStage::Playing {
            if let Some(board) = self.board.as_mut() {
                board.advance_one_frame();
                self.ticks_played += 1;
                if self.digest_every > 0 && self.ticks_played % self.digest_every == 0 {
                    info!(
                        tick = self.ticks_played,
                        digest = format_args!("{:016x}", board.snapshot().digest()),
                        "board digest"
                    );
                }
            }
        }
    }

    fn frame_update(&mut self, _elapsed_ms: u64) -> LoopResult {
        if self.error_seen {
            return LoopResult::StopLooping;
        }
        if self.match_ticks > 0 && self.ticks_played >= self.match_ticks {
            return LoopResult::StopLooping;
        }
        LoopResult::LoopAgain
    }

    fn final_frame_update(&mut self, _elapsed_ms: u64) {
        match self.snapshot() {
            Some(snapshot) => info!(
                stage = ?self.stage,
                ticks = self.ticks_played,
                digest = format_args!("{:016x}", snapshot.digest()),
                "match over"
            ),
            None => info!(stage = ?self.stage, "match over before the board loaded"),
        }
    }
}
