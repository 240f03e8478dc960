// Use cases layer: the lockstep coordinator. Setup runs as an async task on
// the I/O runtime; ticks run on the calling (blocking) thread, which only
// waits on the network through a short polling loop.

mod fault;
mod roster;
mod setup;

pub use fault::{Fault, TickMessages};
pub use roster::Roster;

use crate::use_cases::LockstepError;
use crate::use_cases::game_loop::NetworkGameLoop;

use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{error, info, info_span};

// How long teardown waits for queued frames to reach the wire.
const FLUSH_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorPhase {
    AwaitingPeers,
    NamingPeers,
    BuildingMesh,
    Ready,
    Running,
    Finished,
    Failed,
}

pub(crate) type PhaseSender = Arc<watch::Sender<CoordinatorPhase>>;

#[derive(Debug)]
pub enum Role {
    /// Accepts `participants - 1` peers on `listener`.
    Host {
        listener: TcpListener,
        participants: usize,
    },
    /// Dials the host at `address` (`host:port`).
    Client { address: String },
}

impl Role {
    /// Binds a host listener ready to hand to the coordinator.
    pub fn host_on(addr: SocketAddr, participants: usize) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Role::Host {
            listener,
            participants,
        })
    }

    pub fn client_of(address: impl Into<String>) -> Self {
        Role::Client {
            address: address.into(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Role::Host { .. } => "host",
            Role::Client { .. } => "client",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockstepSettings {
    /// Minimum wall time per tick.
    pub tick_length: Duration,
    /// Bound on the whole of setup. `None` waits forever.
    pub connection_timeout: Option<Duration>,
    pub poll_interval: Duration,
}

impl Default for LockstepSettings {
    fn default() -> Self {
        Self {
            tick_length: Duration::from_millis(100),
            connection_timeout: Some(Duration::from_secs(30)),
            poll_interval: Duration::from_millis(1),
        }
    }
}

pub struct LockstepCoordinator {
    role: Option<Role>,
    settings: LockstepSettings,
    handle: Handle,
    fault: Arc<Fault>,
    messages: Arc<TickMessages>,
    phase: PhaseSender,
}

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

// Milliseconds since `last`, moving `last` forward.
fn lap(last: &mut Instant) -> u64 {
    let now = Instant::now();
    let delta = now.duration_since(*last);
    *last = now;
    millis(delta)
}

impl LockstepCoordinator {
    /// `handle` is the runtime that owns all socket tasks.
    pub fn new(role: Role, settings: LockstepSettings, handle: Handle) -> Self {
        let (phase, _) = watch::channel(CoordinatorPhase::AwaitingPeers);
        Self {
            role: Some(role),
            settings,
            handle,
            fault: Arc::new(Fault::new()),
            messages: Arc::new(TickMessages::new()),
            phase: Arc::new(phase),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<CoordinatorPhase> {
        self.phase.subscribe()
    }

    /// Runs setup and then ticks until the game loop asks to stop or a fault
    /// is raised. Blocks the calling thread, which must not be a runtime worker.
    pub fn run(mut self, game: &mut dyn NetworkGameLoop) -> Result<(), LockstepError> {
        let role = self
            .role
            .take()
            .ok_or_else(|| LockstepError::LogicError("coordinator already ran".into()))?;
        let span = info_span!("lockstep", role = role.label(), name = tracing::field::Empty);
        let _enter = span.enter();

        game.initial_preframe_update();
        let mut roster = match self.setup(role, game) {
            Ok(Some(roster)) => roster,
            Ok(None) => {
                info!("setup abandoned by game loop");
                self.phase.send_replace(CoordinatorPhase::Finished);
                return Ok(());
            }
            Err(e) => {
                error!(error = %e, "lockstep setup failed");
                self.phase.send_replace(CoordinatorPhase::Failed);
                return Err(e);
            }
        };

        span.record("name", roster.me());
        self.phase.send_replace(CoordinatorPhase::Ready);
        info!(peers = roster.peer_count(), "mesh ready");
        game.setup_participants(roster.me(), &roster.other_names());

        let mut last = Instant::now();
        let result = self.run_ticks(&mut roster, game, &mut last);
        self.teardown(&mut roster, game, result, &mut last)
    }

    fn setup(&self, role: Role, game: &mut dyn NetworkGameLoop) -> Result<Option<Roster>, LockstepError> {
        let task = match role {
            Role::Host {
                listener,
                participants,
            } => self.handle.spawn(setup::host_setup(
                listener,
                participants,
                self.fault.clone(),
                self.phase.clone(),
            )),
            Role::Client { address } => self.handle.spawn(setup::client_setup(
                address,
                self.fault.clone(),
                self.phase.clone(),
            )),
        };

        let started = Instant::now();
        let mut last = started;
        while !task.is_finished() {
            if self.fault.is_raised() {
                task.abort();
                return Err(self
                    .fault
                    .take()
                    .unwrap_or_else(|| LockstepError::LogicError("fault raised without an error".into())));
            }
            if let Some(limit) = self.settings.connection_timeout {
                if started.elapsed() >= limit {
                    task.abort();
                    return Err(LockstepError::ConnectionTimeout);
                }
            }
            if game.preframe_update(lap(&mut last)).should_stop() {
                task.abort();
                return Ok(None);
            }
            std::thread::sleep(self.settings.poll_interval);
        }

        let outcome = futures::executor::block_on(task)
            .map_err(|e| LockstepError::LogicError(format!("setup task failed: {e}")))??;
        Roster::new(outcome.me, outcome.peers).map(Some)
    }

    fn run_ticks(
        &self,
        roster: &mut Roster,
        game: &mut dyn NetworkGameLoop,
        last: &mut Instant,
    ) -> Result<(), LockstepError> {
        roster.start_tick_reads(&self.handle, &self.messages, &self.fault)?;
        self.phase.send_replace(CoordinatorPhase::Running);

        if game.initial_frame_update().should_stop() {
            return Ok(());
        }

        let peers = roster.peer_count();
        let mut tick: u64 = 0;
        let mut outbound = Vec::new();
        'ticks: loop {
            if self.fault.is_raised() {
                break;
            }
            // Every participant checks at the same point in the tick, so a
            // deterministic stop ends everyone on the same tick.
            if game.frame_update(lap(last)).should_stop() {
                break;
            }

            let tick_start = Instant::now();
            self.messages.clear();
            roster.request_frames();

            outbound.clear();
            game.get_frame_message(&mut outbound);
            roster.broadcast(&outbound)?;

            let mut stop_after_tick = false;
            loop {
                if self.fault.is_raised() {
                    break 'ticks;
                }
                if self.messages.len() >= peers && tick_start.elapsed() >= self.settings.tick_length {
                    break;
                }
                std::thread::sleep(self.settings.poll_interval);
                stop_after_tick |= game.frame_update(lap(last)).should_stop();
            }

            let mut merged = self.messages.take();
            merged.insert(roster.me().to_string(), std::mem::take(&mut outbound));
            game.end_frame(&merged, millis(tick_start.elapsed()));
            tick += 1;
            tracing::trace!(tick, "tick complete");

            if stop_after_tick {
                break;
            }
        }
        info!(ticks = tick, "tick loop ended");
        Ok(())
    }

    fn teardown(
        &self,
        roster: &mut Roster,
        game: &mut dyn NetworkGameLoop,
        result: Result<(), LockstepError>,
        last: &mut Instant,
    ) -> Result<(), LockstepError> {
        game.final_frame_update(lap(last));

        self.fault.begin_teardown();
        roster.close_all();
        let deadline = Instant::now() + FLUSH_GRACE;
        while !roster.all_flushed() && Instant::now() < deadline {
            std::thread::sleep(self.settings.poll_interval);
        }

        match result.err().or_else(|| self.fault.take()) {
            Some(e) => {
                error!(error = %e, "lockstep session failed");
                self.phase.send_replace(CoordinatorPhase::Failed);
                Err(e)
            }
            None => {
                info!("lockstep session finished");
                self.phase.send_replace(CoordinatorPhase::Finished);
                Ok(())
            }
        }
    }
}
