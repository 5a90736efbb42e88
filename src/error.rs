//! Failure taxonomy and the process exit codes it maps to.

use std::io;
use std::process::ExitCode;

use thiserror::Error;

use crate::client::pending::CallError;
use crate::client::session::SessionClosed;
use crate::client::timeout::Elapsed;

/// Exit code for a command that completed.
pub const EXIT_SUCCESS: u8 = 0;

/// Coarse classification of every way a command can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input, detected locally.
    InvalidArgs,
    /// The daemon could not be reached in time.
    Unreachable,
    /// The daemon answered the request with an error.
    RpcFailure,
    /// A broken invariant inside the client.
    Internal,
}

impl ErrorKind {
    /// Process exit code. These values are part of the CLI contract.
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::InvalidArgs => 1,
            Self::Unreachable => 2,
            Self::RpcFailure => 3,
            Self::Internal => 127,
        }
    }
}

impl From<ErrorKind> for ExitCode {
    fn from(kind: ErrorKind) -> Self {
        ExitCode::from(kind.exit_code())
    }
}

/// Errors surfaced to the user.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("no command given, run `vpnctl help` for a list of commands")]
    MissingCommand,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("unknown type: {0}")]
    UnknownType(String),
    #[error("invalid boolean value: {0} (expected true or false)")]
    InvalidBoolean(String),
    #[error("unknown region: {0}")]
    UnknownRegion(String),
    #[error("settings must be a JSON object: {0}")]
    InvalidSettings(String),
    #[error("invalid configuration: {0:#}")]
    Config(anyhow::Error),
    #[error(transparent)]
    TimedOut(#[from] Elapsed),
    #[error(transparent)]
    Closed(#[from] SessionClosed),
    #[error(transparent)]
    Call(#[from] CallError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
    #[error("failed to start the async runtime: {0}")]
    Runtime(io::Error),
    #[error("internal error: {0}")]
    Internal(&'static str),
}

impl CliError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Usage(_)
            | Self::MissingCommand
            | Self::UnknownCommand(_)
            | Self::UnknownType(_)
            | Self::InvalidBoolean(_)
            | Self::UnknownRegion(_)
            | Self::InvalidSettings(_)
            | Self::Config(_) => ErrorKind::InvalidArgs,
            Self::TimedOut(_) | Self::Closed(_) => ErrorKind::Unreachable,
            Self::Call(CallError::Rejected(_)) => ErrorKind::RpcFailure,
            Self::Call(CallError::NotConnected | CallError::ConnectionLost) => {
                ErrorKind::Unreachable
            }
            Self::Output(_) | Self::Runtime(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Map a command's outcome to the process exit code.
pub fn exit_code(outcome: &Result<(), CliError>) -> ExitCode {
    match outcome {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(error) => error.kind().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    #[test]
    fn test_exit_codes_are_distinct() {
        let codes: HashSet<u8> = [
            EXIT_SUCCESS,
            ErrorKind::InvalidArgs.exit_code(),
            ErrorKind::Unreachable.exit_code(),
            ErrorKind::RpcFailure.exit_code(),
            ErrorKind::Internal.exit_code(),
        ]
        .into_iter()
        .collect();
        assert_eq!(codes.len(), 5);
    }

    #[test]
    fn test_exit_codes_are_stable() {
        assert_eq!(ErrorKind::InvalidArgs.exit_code(), 1);
        assert_eq!(ErrorKind::Unreachable.exit_code(), 2);
        assert_eq!(ErrorKind::RpcFailure.exit_code(), 3);
        assert_eq!(ErrorKind::Internal.exit_code(), 127);
    }

    #[test]
    fn test_call_errors_map_by_cause() {
        assert_eq!(
            CliError::from(CallError::Rejected("no".into())).kind(),
            ErrorKind::RpcFailure
        );
        assert_eq!(
            CliError::from(CallError::ConnectionLost).kind(),
            ErrorKind::Unreachable
        );
        assert_eq!(
            CliError::from(CallError::NotConnected).kind(),
            ErrorKind::Unreachable
        );
    }

    #[test]
    fn test_timeout_is_unreachable() {
        let error = CliError::from(Elapsed {
            bound: Duration::from_secs(5),
        });
        assert_eq!(error.kind(), ErrorKind::Unreachable);
    }

    #[test]
    fn test_local_validation_is_invalid_args() {
        for error in [
            CliError::UnknownType("colour".into()),
            CliError::InvalidBoolean("maybe".into()),
            CliError::UnknownRegion("Atlantis".into()),
            CliError::Usage("usage: vpnctl set <type> <value>".into()),
        ] {
            assert_eq!(error.kind(), ErrorKind::InvalidArgs);
        }
    }

    #[test]
    fn test_diagnostics_are_single_line() {
        let errors = [
            CliError::UnknownRegion("Atlantis".into()),
            CliError::Call(CallError::Rejected("settings locked".into())),
            CliError::Internal("arity was not checked"),
        ];
        for error in errors {
            assert!(!error.to_string().contains('\n'), "{error}");
        }
    }
}
