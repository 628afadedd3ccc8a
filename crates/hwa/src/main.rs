//! HWA client CLI.
//!
//! One-shot tool: connect, send one request, print the reply, exit.
//!
//! # Usage
//!
//! ```bash
//! # Switch a relay on
//! hwa -r valve1 -a on
//!
//! # Read one status
//! hwa -r moist1 -a status
//!
//! # Everything off, everything's status
//! hwa -r all -a off
//! hwa -r all -a status
//!
//! # Talk to a specific daemon instance
//! hwa --socket /tmp/hwad-adc.sock -r moist1 -a status
//! ```
//!
//! # Exit codes
//!
//! - 0: request succeeded
//! - 1: daemon returned an error
//! - 2: daemon is busy (another client holds the lock)
//! - 3: could not connect to the daemon

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use hwa_core::config::{DEFAULT_SOCKET_PATH, ENV_SOCKET};
use hwa::{Client, ClientError};
use hwa_protocol::{Action, Reply, Target};

/// HWA client - talk to the hwad arbiter daemon
#[derive(Parser, Debug)]
#[command(name = "hwa", version, about)]
struct Args {
    /// Resource name, or 'all'
    #[arg(short, long)]
    resource: String,

    /// Action to perform
    #[arg(short, long, value_enum)]
    action: CliAction,

    /// Socket path (overrides HWA_SOCKET and the default)
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Log level for stderr diagnostics (overrides RUST_LOG)
    #[arg(short = 'l', long = "log-level")]
    log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliAction {
    On,
    Off,
    Status,
}

impl From<CliAction> for Action {
    fn from(action: CliAction) -> Self {
        match action {
            CliAction::On => Action::On,
            CliAction::Off => Action::Off,
            CliAction::Status => Action::Status,
        }
    }
}

/// Resolves the socket path: flag, then environment, then default.
fn socket_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| env::var(ENV_SOCKET).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = match &args.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let socket = socket_path(args.socket);

    let target = if args.resource == "all" {
        Target::All
    } else {
        Target::named(args.resource.as_str())
    };

    let mut client = match Client::connect(&socket).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("hwa: {e}");
            return ExitCode::from(3);
        }
    };

    let reply = match client.request(target, args.action.into()).await {
        Ok(reply) => reply,
        Err(e) => {
            eprintln!("hwa: {e}");
            return ExitCode::from(exit_code_for(&e));
        }
    };

    match reply {
        Reply::Status { entries } => {
            for entry in entries {
                println!("{}: {}", entry.resource, entry.value);
            }
            ExitCode::SUCCESS
        }
        Reply::Busy { detail } => {
            eprintln!("hwa: daemon busy: {detail}");
            ExitCode::from(2)
        }
        Reply::Error { message, .. } => {
            eprintln!("hwa: {message}");
            ExitCode::from(1)
        }
    }
}

fn exit_code_for(e: &ClientError) -> u8 {
    match e {
        ClientError::Connect { .. } => 3,
        _ => 1,
    }
}
