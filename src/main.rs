use clap::{Parser, Subcommand};
use lockstep_server::Invocation;

#[derive(Parser)]
#[command(name = "lockstep_server", about = "Lockstep match participant")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Host a match and wait for the other participants
    Host {
        /// Total participants, this host included
        #[arg(long)]
        participants: Option<usize>,

        /// Port to accept participants on
        #[arg(long)]
        port: Option<u16>,
    },

    /// Join a hosted match
    Join {
        /// Host address as ip:port
        #[arg(long)]
        host: Option<String>,
    },
}

// One worker is enough: the simulation runs on its own blocking thread.
#[tokio::main(flavor = "multi_thread", worker_threads = 1)]
async fn main() -> std::process::ExitCode {
    let invocation = match Cli::parse().command {
        Commands::Host { participants, port } => Invocation::Host { participants, port },
        Commands::Join { host } => Invocation::Join { host },
    };

    match lockstep_server::run_with_config(invocation).await {
        Ok(session) if !session.stage().is_failed() => std::process::ExitCode::SUCCESS,
        Ok(_) => std::process::ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "lockstep session failed");
            std::process::ExitCode::FAILURE
        }
    }
}
