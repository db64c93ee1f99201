//! Cipherlink CLI - console for the RSA demo board
//!
//! Connects to the board over a serial port, sends encrypt/decrypt requests
//! and prints the keys and completed exchanges it reports.

use anyhow::Context;
use cipherlink_core::cli::output::{self, OutputFormat};
use cipherlink_core::cli::{exit_code_description, CliResult, ExitCodes};
use cipherlink_core::config::{self, AppConfig, ConfigError, LoggingConfig};
use cipherlink_core::core::command::Request;
use cipherlink_core::core::logger::{generate_log_filename, TranscriptLogger};
use cipherlink_core::core::replay::replay_file;
use cipherlink_core::core::runtime::SessionHandle;
use cipherlink_core::core::session::Session;
use cipherlink_core::core::transport::{list_ports, SerialTransport};
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, Notify};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Cipherlink CLI
#[derive(Parser, Debug)]
#[command(
    name = "cipherlink",
    version,
    about = "Console for a microcontroller RSA demo over a serial link",
    long_about = None
)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// Verbose output (debug logs, raw device lines)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "CIPHERLINK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available serial ports
    ListPorts,

    /// Connect to the board and run an interactive console
    Connect {
        /// Serial port name (e.g., COM3, /dev/ttyACM0)
        #[arg(short, long)]
        port: Option<String>,

        /// Baud rate
        #[arg(short, long)]
        baud: Option<u32>,

        /// Encrypt this text after connecting (repeatable)
        #[arg(short, long)]
        encrypt: Vec<String>,

        /// Decrypt this ciphertext after connecting (repeatable)
        #[arg(short, long)]
        decrypt: Vec<String>,

        /// Exit after this many seconds
        #[arg(long)]
        duration: Option<u64>,

        /// Write a transcript of the session to this file
        #[arg(short, long)]
        transcript: Option<PathBuf>,
    },

    /// Feed a captured device transcript through the session pipeline offline
    Replay {
        /// Capture file with raw device output
        file: PathBuf,

        /// Bytes delivered per simulated read
        #[arg(long, default_value = "64")]
        chunk_size: NonZeroUsize,
    },

    /// Show the effective configuration
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let (config, config_warning) = match load_config(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            let result = CliResult::from(anyhow::Error::new(e));
            report(&cli, &result);
            return result.to_exit_code();
        }
    };

    let _log_guard = init_logging(&cli, &config.logging);
    if let Some(warning) = config_warning {
        tracing::warn!("{warning}");
    }
    tracing::debug!("Starting {} v{}", cipherlink_core::NAME, cipherlink_core::VERSION);

    let result = match run(&cli, &config).await {
        Ok(result) => result,
        Err(e) => CliResult::from(e),
    };
    report(&cli, &result);
    result.to_exit_code()
}

fn report(cli: &Cli, result: &CliResult) {
    if result.is_success() {
        if let (Some(msg), false) = (result.message(), cli.quiet) {
            eprintln!("{msg}");
        }
        return;
    }

    let msg = result.message().unwrap_or_default();
    if cli.verbose {
        eprintln!("error ({}): {msg}", exit_code_description(result.code()));
    } else {
        eprintln!("error: {msg}");
    }
}

fn load_config(cli: &Cli) -> Result<(AppConfig, Option<String>), ConfigError> {
    match &cli.config {
        Some(path) => Ok((AppConfig::load_from(path)?, None)),
        None => match AppConfig::load() {
            Err(ConfigError::NoConfigDir) => Ok((
                AppConfig::default(),
                Some("No config directory on this platform, using defaults".to_string()),
            )),
            other => other.map(|config| (config, None)),
        },
    }
}

fn init_logging(cli: &Cli, logging: &LoggingConfig) -> Option<WorkerGuard> {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let mut guard = None;
    let file_layer = match (&logging.directory, logging.file_logging) {
        (Some(dir), true) => match std::fs::create_dir_all(dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(dir, "cipherlink.log");
                let (writer, worker) = tracing_appender::non_blocking(appender);
                guard = Some(worker);
                Some(fmt::layer().json().with_writer(writer))
            }
            Err(e) => {
                eprintln!("Cannot create log directory {}: {e}", dir.display());
                None
            }
        },
        _ => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

async fn run(cli: &Cli, config: &AppConfig) -> anyhow::Result<CliResult> {
    match &cli.command {
        Commands::ListPorts => show_ports(cli),
        Commands::Connect {
            port,
            baud,
            encrypt,
            decrypt,
            duration,
            transcript,
        } => {
            let Some(serial) = config.serial_config(port.as_deref(), *baud) else {
                return Ok(CliResult::error(
                    ExitCodes::INVALID_ARGS,
                    "No serial port given; use --port or set serial.port in the config",
                ));
            };

            let mut session = Session::new(
                Box::new(SerialTransport::new(serial.clone())),
                config.session_config(&serial.port),
            );
            if let Some(path) = transcript_path(config, transcript.as_ref()) {
                let logger = TranscriptLogger::open(&path, config.logging.transcript_format)?;
                tracing::info!("Writing transcript to {}", path.display());
                session.set_transcript(logger);
            }

            let handle = SessionHandle::spawn(session, config.poll_interval());
            let requests = encrypt
                .iter()
                .map(|t| Request::Encrypt(t.clone()))
                .chain(decrypt.iter().map(|t| Request::Decrypt(t.clone())));
            let result = console(cli, &handle, requests.collect(), *duration).await;

            let history = handle.history().len();
            drop(handle.shutdown().await);
            result?;

            if !cli.quiet && cli.format == OutputFormat::Text {
                eprintln!("Session closed, {history} exchange(s) recorded");
            }
            Ok(CliResult::success())
        }
        Commands::Replay { file, chunk_size } => {
            let outcome = replay_file(file, chunk_size.get()).await?;
            println!("{}", output::render_replay(&outcome, cli.format));
            Ok(CliResult::success())
        }
        Commands::Config { init } => show_config(cli, config, *init),
    }
}

fn show_ports(cli: &Cli) -> anyhow::Result<CliResult> {
    let ports = list_ports()?;

    if ports.is_empty() && cli.format == OutputFormat::Text {
        if !cli.quiet {
            eprintln!("No serial ports found.");
        }
        return Ok(CliResult::success());
    }

    println!("{}", output::render_ports(&ports, cli.format));
    Ok(CliResult::success())
}

fn transcript_path(config: &AppConfig, explicit: Option<&PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.clone());
    }
    if !config.logging.transcript {
        return None;
    }
    let dir = config.logging.directory.as_ref()?;
    Some(dir.join(generate_log_filename(
        "session",
        config.logging.transcript_format,
    )))
}

enum ConsoleAction {
    Continue,
    Quit,
}

async fn console(
    cli: &Cli,
    handle: &SessionHandle,
    requests: Vec<Request>,
    duration: Option<u64>,
) -> anyhow::Result<()> {
    let mut events = handle.subscribe();

    handle.connect().await.context("Cannot open the serial port")?;
    if !cli.quiet && cli.format == OutputFormat::Text {
        eprintln!("Connected. Type `e <text>` or `d <text>`, `:help` for more, Ctrl+C to exit.");
    }

    for request in requests {
        handle.send(request).await?;
    }

    let interrupted = Arc::new(Notify::new());
    let notify = interrupted.clone();
    ctrlc::set_handler(move || notify.notify_one()).context("Cannot install Ctrl+C handler")?;

    let deadline = async {
        match duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut stdin = spawn_stdin_reader();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            () = interrupted.notified() => break,
            () = &mut deadline => break,
            line = stdin.recv(), if stdin_open => match line {
                Some(line) => {
                    if let ConsoleAction::Quit = console_line(cli, handle, &line).await {
                        break;
                    }
                }
                None => stdin_open = false,
            },
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(text) = output::render_event(&event, cli.format, cli.verbose) {
                        println!("{text}");
                    }
                }
                Err(RecvError::Lagged(n)) => tracing::warn!("Console lagged, {n} event(s) skipped"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    Ok(())
}

/// Read stdin on a plain thread so a pending read never holds up exit
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("stdin closed: {e}");
                    break;
                }
            }
        }
    });
    rx
}

async fn console_line(cli: &Cli, handle: &SessionHandle, line: &str) -> ConsoleAction {
    let line = line.trim();
    match line {
        "" => {}
        ":quit" | ":q" => return ConsoleAction::Quit,
        ":help" => eprintln!(
            "e <text>     encrypt text\n\
             d <text>     decrypt ciphertext\n\
             :keys        show current keys\n\
             :history     show completed exchanges\n\
             :stats       show link statistics\n\
             :reconnect   close and reopen the port\n\
             :quit        exit"
        ),
        ":keys" => println!("{}", output::render_keys(&handle.keys(), cli.format)),
        ":history" => println!(
            "{}",
            output::render_history(&handle.history().snapshot(), cli.format)
        ),
        ":stats" => match handle.stats().await {
            Ok(stats) => eprintln!(
                "tx {} bytes / rx {} bytes, {} error(s), up {}s",
                stats.bytes_sent, stats.bytes_received, stats.errors, stats.uptime_secs
            ),
            Err(e) => eprintln!("error: {e}"),
        },
        ":reconnect" => {
            let reconnected = match handle.disconnect().await {
                Ok(()) => handle.connect().await,
                Err(e) => Err(e),
            };
            if let Err(e) = reconnected {
                eprintln!("error: {e}");
            }
        }
        _ => match Request::parse(line) {
            Some(request) => {
                if let Err(e) = handle.send(request).await {
                    eprintln!("error: {e}");
                }
            }
            None => eprintln!("Unknown input {line:?}; use `e <text>`, `d <text>` or `:help`"),
        },
    }
    ConsoleAction::Continue
}

fn show_config(cli: &Cli, config: &AppConfig, init: bool) -> anyhow::Result<CliResult> {
    let path = cli
        .config
        .clone()
        .or_else(config::config_path)
        .ok_or(ConfigError::NoConfigDir)?;

    if init {
        if path.exists() {
            eprintln!("{} already exists, leaving it untouched", path.display());
        } else {
            AppConfig::default().save_to(&path)?;
            eprintln!("Wrote default config to {}", path.display());
        }
    }

    match cli.format {
        OutputFormat::Text => {
            println!("# {}", path.display());
            print!("{}", toml::to_string_pretty(config)?);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "path": path, "config": config }));
        }
    }
    Ok(CliResult::success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_connect_args() {
        let cli = Cli::parse_from([
            "cipherlink", "connect", "-p", "COM3", "-e", "hi", "-e", "yo", "-d", "104 105",
        ]);
        match cli.command {
            Commands::Connect {
                port,
                encrypt,
                decrypt,
                ..
            } => {
                assert_eq!(port.as_deref(), Some("COM3"));
                assert_eq!(encrypt, ["hi", "yo"]);
                assert_eq!(decrypt, ["104 105"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["cipherlink", "replay", "capture.txt", "--format", "json"]);
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(Cli::try_parse_from(["cipherlink", "replay", "x", "--chunk-size", "0"]).is_err());
    }

    #[test]
    fn test_transcript_path() {
        let mut config = AppConfig::default();
        config.logging.directory = Some(PathBuf::from("/tmp/logs"));
        assert!(transcript_path(&config, None).is_none());

        config.logging.transcript = true;
        let path = transcript_path(&config, None).unwrap();
        assert!(path.starts_with("/tmp/logs"));

        let explicit = PathBuf::from("out.log");
        assert_eq!(transcript_path(&config, Some(&explicit)), Some(explicit));
    }
}
