//! blackscreen-pty-host - runs one program inside a pseudoterminal
//!
//! Spawned by a Black Screen process session, never by users directly.
//! stdin carries control frames from the parent, stdout carries output and
//! exit frames back. Logs go to stderr.

use std::env;
use std::process;

use tracing::{debug, error};

use blackscreen::pty::{run_host, HostArgs};
use blackscreen::Error;

/// Exit status when the program could not be started
const EXIT_SPAWN_FAILED: i32 = 127;
/// Exit status after a protocol violation on stdin
const EXIT_PROTOCOL_ERROR: i32 = 2;
/// Exit status for bad host arguments
const EXIT_USAGE: i32 = 64;

fn print_usage() {
    eprintln!("USAGE:");
    eprintln!("    blackscreen-pty-host <program> <columns> <rows> [args...]");
}

/// Default log filter when `RUST_LOG` is unset.
///
/// stderr is shared with the user's terminal, so only problems show by default.
fn log_level(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "warn"
    }
}

#[tokio::main]
async fn main() {
    let debug = env::var("BLACKSCREEN_DEBUG").map_or(false, |v| v == "1" || v.eq_ignore_ascii_case("true"));
    let env_filter = env::var("RUST_LOG").unwrap_or_else(|_| log_level(debug).to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from(env_filter))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .compact()
        .init();

    let args = match HostArgs::parse(env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            error!("{}", e);
            print_usage();
            process::exit(EXIT_USAGE);
        }
    };
    debug!("Host starting: {:?}", args);

    let code = match run_host(args, tokio::io::stdin(), tokio::io::stdout()).await {
        Ok(code) => {
            debug!("Child finished with code {}", code);
            0
        }
        Err(e @ (Error::CommandSpawnFailed { .. } | Error::PtyCreationFailed { .. })) => {
            error!("{}", e);
            EXIT_SPAWN_FAILED
        }
        Err(e @ Error::MalformedParentMessage { .. }) => {
            error!("{}", e);
            EXIT_PROTOCOL_ERROR
        }
        Err(e) => {
            error!("{}", e);
            1
        }
    };

    process::exit(code);
}
