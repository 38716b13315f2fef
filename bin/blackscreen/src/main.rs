//! blackscreen - run one command through the Black Screen dispatcher
//!
//! Resolves the command the way the interactive terminal would (builtin,
//! Windows shell, executable on PATH, or "not found"), streams its output
//! to stdout and forwards stdin to the running process.

use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tracing::{debug, error, info, warn};

use blackscreen::{
    handle_startup_error, CommandExecutor, CommandLine, Config, Error, ExecutionContext,
    OutputSink, Result, SessionSlot,
};

/// Command line of the CLI
#[derive(Debug, Default)]
struct AppArgs {
    /// Configuration file path
    config_path: Option<PathBuf>,
    /// Enable debug logging
    debug: bool,
    /// Working directory for the command
    cwd: Option<PathBuf>,
    /// Command name followed by its arguments
    command: Vec<String>,
}

impl AppArgs {
    /// Parse options up to the first positional argument; the rest is the command
    fn parse<I>(args: I) -> std::result::Result<Self, String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut app_args = AppArgs::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    let path = args.next().ok_or("Missing config file path")?;
                    app_args.config_path = Some(PathBuf::from(path));
                }
                "--cwd" | "-C" => {
                    let dir = args.next().ok_or("Missing working directory")?;
                    app_args.cwd = Some(PathBuf::from(dir));
                }
                "--debug" | "-d" => {
                    app_args.debug = true;
                }
                "--help" | "-h" => {
                    print_help();
                    process::exit(0);
                }
                "--version" | "-V" => {
                    println!("blackscreen v{}", blackscreen::VERSION);
                    process::exit(0);
                }
                "--" => {
                    app_args.command.extend(args.by_ref());
                }
                opt if opt.starts_with('-') && app_args.command.is_empty() => {
                    return Err(format!("Unknown option: {}", opt));
                }
                _ => {
                    app_args.command.push(arg);
                    app_args.command.extend(args.by_ref());
                }
            }
        }

        if app_args.command.is_empty() {
            return Err("Missing command".to_string());
        }
        Ok(app_args)
    }
}

/// Print help information
fn print_help() {
    println!("blackscreen - run a command in a pseudoterminal session");
    println!();
    println!("USAGE:");
    println!("    blackscreen [OPTIONS] <COMMAND> [ARGS...]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <PATH>    Path to configuration file");
    println!("    -C, --cwd <DIR>        Working directory for the command");
    println!("    -d, --debug            Enable debug logging");
    println!("    -h, --help             Print this help message");
    println!("    -V, --version          Print version information");
    println!();
    println!("CONFIGURATION:");
    println!("    Configuration is read from the first of:");
    println!("    1. Path specified with --config");
    println!("    2. $BLACKSCREEN_CONFIG");
    println!("    3. <config dir>/blackscreen/config.toml (or .json)");
    println!("    4. ~/.blackscreen/config.toml (or .json)");
    println!("    5. Built-in defaults");
    println!();
    println!("ENVIRONMENT:");
    println!("    BLACKSCREEN_PTY_HOST   Path to the blackscreen-pty-host executable");
    println!("    BLACKSCREEN_DEBUG      Enable debug mode (1 or true)");
    println!("    RUST_LOG               Set logging level (error, warn, info, debug, trace)");
}

/// Writes session output straight to our stdout
struct StdoutSink;

impl OutputSink for StdoutSink {
    fn accept(&self, data: &[u8]) {
        let mut stdout = std::io::stdout().lock();
        if stdout.write_all(data).and_then(|_| stdout.flush()).is_err() {
            debug!("stdout closed, dropping {} bytes", data.len());
        }
    }
}

/// Forward our stdin to whichever session is attached
async fn forward_stdin(slot: SessionSlot) {
    let Some(session) = slot.wait_attached().await else {
        return;
    };

    let mut stdin = tokio::io::stdin();
    let mut buf = [0u8; 4096];
    loop {
        match stdin.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => session.write(&buf[..n]),
            Err(e) => {
                warn!("Failed to read stdin: {}", e);
                break;
            }
        }
        if !session.is_running() {
            break;
        }
    }
    debug!("stdin forwarding finished");
}

fn load_configuration(args: &AppArgs) -> Result<Config> {
    match &args.config_path {
        Some(path) => blackscreen::init_with_config(path),
        None => blackscreen::init(),
    }
}

/// Process exit status for the command's outcome
fn exit_status(result: &Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => e.exit_code().unwrap_or(1),
    }
}

async fn run(args: AppArgs) -> Result<()> {
    let config = load_configuration(&args)?;
    let executor = CommandExecutor::from_config(&config);

    let cwd = match &args.cwd {
        Some(dir) => dir.clone(),
        None => env::current_dir()?,
    };

    let mut context = ExecutionContext::new(CommandLine::new(args.command), cwd, Arc::new(StdoutSink))
        .with_dimensions(config.session.dimensions())
        .with_environment(config.session.build_environment());

    tokio::spawn(forward_stdin(context.session_slot()));

    info!("Running '{}'", context.expanded_tokens().join(" "));
    match config.execution.default_timeout() {
        Some(limit) => executor.execute_with_timeout(&mut context, limit).await,
        None => executor.execute(&mut context).await,
    }
}

/// Default log filter when `RUST_LOG` is unset
fn log_level(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}

#[tokio::main]
async fn main() {
    let args = match AppArgs::parse(env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_help();
            process::exit(2);
        }
    };

    // Initialize logging based on debug flag
    let debug = args.debug
        || env::var("BLACKSCREEN_DEBUG").map_or(false, |v| v == "1" || v.eq_ignore_ascii_case("true"));
    let env_filter = env::var("RUST_LOG").unwrap_or_else(|_| log_level(debug).to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from(env_filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    let result = run(args).await;
    if let Err(e) = &result {
        match e {
            // The process already told the user what went wrong
            Error::NonZeroExit { command, code } => {
                debug!("'{}' exited with code {}", command, code)
            }
            other => {
                error!("{}", other);
                eprintln!("{}", handle_startup_error(other));
            }
        }
    }

    // Exit directly: the stdin forwarder may still be parked in a blocking read
    process::exit(exit_status(&result));
}
