// Framework bootstrap for a lockstep participant.

use crate::frameworks::config;
use crate::use_cases::{
    LockstepCoordinator, LockstepError, LockstepSettings, MatchSession, Role,
};

use std::net::SocketAddr;
use tokio::runtime::Handle;
use tracing::{info, warn};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

fn log_layer<S>(json: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    let layer = tracing_subscriber::fmt::layer().with_target(false);
    if json {
        layer.json().with_current_span(true).boxed()
    } else {
        layer.compact().boxed()
    }
}

/// Loads `.env`, installs the subscriber and routes panics through tracing.
pub fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    tracing_subscriber::registry()
        .with(log_layer(json))
        .with(filter)
        .init();

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// What the command line asked this process to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Host {
        participants: Option<usize>,
        port: Option<u16>,
    },
    Join {
        host: Option<String>,
    },
}

pub fn settings_from_config() -> LockstepSettings {
    LockstepSettings {
        tick_length: config::tick_length(),
        connection_timeout: config::connection_timeout(),
        poll_interval: config::poll_interval(),
    }
}

/// Plays one session to completion. The coordinator gets a blocking thread of
/// its own; socket tasks stay on the current runtime.
pub async fn run(
    role: Role,
    settings: LockstepSettings,
    mut session: MatchSession,
) -> Result<MatchSession, LockstepError> {
    let coordinator = LockstepCoordinator::new(role, settings, Handle::current());

    let mut phases = coordinator.subscribe();
    tokio::spawn(async move {
        while phases.changed().await.is_ok() {
            let phase = *phases.borrow_and_update();
            info!(?phase, "lockstep phase");
        }
    });

    let (session, result) = tokio::task::spawn_blocking(move || {
        let result = coordinator.run(&mut session);
        (session, result)
    })
    .await
    .map_err(|e| LockstepError::LogicError(format!("coordinator thread failed: {e}")))?;

    result?;
    if session.stage().is_failed() {
        warn!(stage = ?session.stage(), "match ended in failure");
    }
    Ok(session)
}

pub async fn run_with_config(invocation: Invocation) -> Result<MatchSession, LockstepError> {
    init_runtime();

    let match_ticks = config::match_ticks();
    let (role, session) = match invocation {
        Invocation::Host { participants, port } => {
            let participants = participants.unwrap_or_else(config::participants);
            let address = SocketAddr::from(([0, 0, 0, 0], port.unwrap_or_else(config::host_port)));
            let role = Role::host_on(address, participants).inspect_err(|e| {
                tracing::error!(%address, error = %e, "failed to bind");
            })?;
            info!(%address, participants, "hosting");
            (role, MatchSession::host(config::MACHINES_PER_PLAYER, match_ticks))
        }
        Invocation::Join { host } => {
            let host = host.unwrap_or_else(config::host_address);
            info!(%host, "joining");
            (Role::client_of(host), MatchSession::client(match_ticks))
        }
    };

    run(
        role,
        settings_from_config(),
        session.with_digest_every(config::DIGEST_EVERY_TICKS),
    )
    .await
}
