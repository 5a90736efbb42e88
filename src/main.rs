//! vpnctl - command-line control for the VPN daemon.
//!
//! Each invocation runs one command: it connects to the daemon over its local
//! socket, waits for the daemon's state, applies or prints a setting, and
//! exits with a code describing what happened.

mod client;
mod commands;
mod config;
mod error;
mod protocol;
#[cfg(test)]
mod testing;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use clap::error::ErrorKind as ClapErrorKind;
use clap::Parser;
use tokio::task::LocalSet;
use tracing_subscriber::EnvFilter;

use client::SocketTransport;
use commands::{Dispatcher, Invocation, RunSettings, PROGRAM};
use config::Config;
use error::{CliError, ErrorKind};

#[derive(Parser)]
#[command(name = "vpnctl")]
#[command(author, version, about = "Control the VPN daemon from the command line")]
#[command(after_help = "Run `vpnctl help` for the list of commands.")]
struct Cli {
    /// Seconds to wait for the daemon before giving up
    #[arg(short = 't', long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Path to the daemon's control socket
    #[arg(long, value_name = "PATH")]
    socket: Option<PathBuf>,

    /// Log connection progress to stderr
    #[arg(short = 'd', long)]
    debug: bool,

    /// Command to run (get, set, applysettings, help)
    #[arg(value_name = "COMMAND")]
    command: Option<String>,

    /// Arguments for the command
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => return report_clap_error(e),
    };

    let outcome = match Config::load() {
        Ok(config) => {
            init_logging(cli.debug, &config.logging.filter);
            run(cli, &config)
        }
        Err(e) => {
            init_logging(cli.debug, &config::LoggingConfig::default().filter);
            Err(CliError::Config(e))
        }
    };

    report(&outcome, &mut io::stderr().lock());
    error::exit_code(&outcome)
}

/// Write the one diagnostic line for a failed command.
fn report(outcome: &Result<(), CliError>, stderr: &mut dyn Write) {
    let Err(e) = outcome else {
        return;
    };
    if e.kind() == ErrorKind::Internal {
        tracing::debug!(error = ?e, "internal failure");
    }
    // Nothing useful to do if stderr is gone.
    let _ = writeln!(stderr, "{e}");
}

/// `--help` and `--version` succeed; anything else clap rejects is a usage error.
fn report_clap_error(e: clap::Error) -> ExitCode {
    match e.kind() {
        ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
            // Nothing useful to do if stdout is gone.
            let _ = e.print();
            ExitCode::from(error::EXIT_SUCCESS)
        }
        _ => {
            let rendered = e.render().to_string();
            eprintln!("{}", rendered.lines().next().unwrap_or("invalid arguments"));
            ErrorKind::InvalidArgs.into()
        }
    }
}

/// Initialize logging. `RUST_LOG` wins over `--debug`, which wins over the config file.
fn init_logging(debug: bool, configured: &str) {
    let fallback = if debug { "vpnctl=debug" } else { configured };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("vpnctl=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .with_target(false)
        .init();
}

fn run(cli: Cli, config: &Config) -> Result<(), CliError> {
    let dispatcher = Dispatcher::new();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let Some(command) = cli.command else {
        dispatcher.print_usage(&mut out)?;
        out.flush()?;
        return Err(CliError::MissingCommand);
    };

    if command == "help" {
        return match cli.args.as_slice() {
            [] => dispatcher.help(None, &mut out),
            [topic] => dispatcher.help(Some(topic.as_str()), &mut out),
            _ => Err(CliError::Usage(format!("usage: {PROGRAM} help [command]"))),
        };
    }

    let socket_path = config
        .socket_path(cli.socket.as_deref())
        .map_err(CliError::Config)?;
    let settings = RunSettings {
        timeout: config.timeout(cli.timeout),
        retry_interval: config.retry_interval(),
    };
    let invocation = Invocation::new(command, cli.args);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let transport = Rc::new(SocketTransport::new(socket_path));
    let local = LocalSet::new();
    runtime.block_on(local.run_until(dispatcher.run(&invocation, transport, settings, &mut out)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_command_and_args() {
        let cli = Cli::try_parse_from(["vpnctl", "-t", "3", "set", "region", "US East"]).unwrap();
        assert_eq!(cli.timeout, Some(3));
        assert_eq!(cli.command.as_deref(), Some("set"));
        assert_eq!(cli.args, vec!["region", "US East"]);
    }

    #[test]
    fn test_args_may_start_with_hyphen() {
        let cli = Cli::try_parse_from(["vpnctl", "set", "region", "-x"]).unwrap();
        assert_eq!(cli.args, vec!["region", "-x"]);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let error = Cli::try_parse_from(["vpnctl", "--timeout", "0", "get", "region"])
            .err()
            .unwrap();
        assert_eq!(error.kind(), ClapErrorKind::ValueValidation);
    }

    #[test]
    fn test_help_and_version_are_success() {
        for flag in ["--help", "--version"] {
            let error = Cli::try_parse_from(["vpnctl", flag]).err().unwrap();
            assert!(matches!(
                error.kind(),
                ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion
            ));
        }
    }

    #[test]
    fn test_report_writes_one_line() {
        let failures = [
            CliError::Output(io::Error::other("no space left on device")),
            CliError::Internal("arity was not checked"),
            CliError::UnknownRegion("Atlantis".into()),
        ];
        for failure in failures {
            let mut stderr = Vec::new();
            report(&Err(failure), &mut stderr);
            let text = String::from_utf8(stderr).unwrap();
            assert_eq!(text.lines().count(), 1, "{text:?}");
            assert!(text.ends_with('\n'));
            assert!(!text.contains('\u{1b}'), "{text:?}");
        }
    }

    #[test]
    fn test_report_is_silent_on_success() {
        let mut stderr = Vec::new();
        report(&Ok(()), &mut stderr);
        assert!(stderr.is_empty());
    }

    #[test]
    fn test_unknown_flag_is_invalid_args() {
        let error = Cli::try_parse_from(["vpnctl", "--frobnicate"]).err().unwrap();
        assert!(!matches!(
            error.kind(),
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion
        ));
    }
}
