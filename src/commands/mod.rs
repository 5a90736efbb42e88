//! Command variants and the dispatcher that runs them.
//!
//! Every command goes through the same steps: find the variant by name, check
//! the argument count, let the variant validate what it can offline, and only
//! then connect. The variant's `execute` runs after the daemon's first
//! activation, inside a single timeout budget.

pub mod apply;
pub mod get;
pub mod set;
pub mod values;

use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::client::{Session, TimeoutGuard, Transport};
use crate::error::CliError;

pub use apply::ApplySettingsCommand;
pub use get::GetCommand;
pub use set::SetCommand;

/// Program name used in usage text.
pub const PROGRAM: &str = "vpnctl";

/// One CLI operation.
#[async_trait(?Send)]
pub trait CommandVariant {
    /// Name typed on the command line.
    fn name(&self) -> &'static str;

    /// Exact number of arguments after the command name.
    fn arity(&self) -> usize;

    /// One-line usage, e.g. `set <type> <value>`.
    fn usage(&self) -> &'static str;

    /// One-line summary for the command list.
    fn summary(&self) -> &'static str;

    /// Full help text.
    fn print_help(&self, out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(out, "usage: {PROGRAM} {}", self.usage())?;
        writeln!(out, "{}", self.summary())
    }

    /// Checks that need no daemon state. Runs before any connection attempt.
    fn validate(&self, params: &[String]) -> Result<(), CliError>;

    /// Do the work. Called once the session is active.
    async fn execute(
        &self,
        params: &[String],
        session: &Session,
        out: &mut dyn Write,
    ) -> Result<(), CliError>;
}

/// A command name and its arguments, as typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub params: Vec<String>,
}

impl Invocation {
    pub fn new(command: impl Into<String>, params: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            command: command.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }
}

/// Timing knobs for a run.
#[derive(Debug, Clone, Copy)]
pub struct RunSettings {
    /// Total time to wait for the daemon.
    pub timeout: Duration,
    /// Delay between connection attempts.
    pub retry_interval: Duration,
}

/// Looks up commands by name and runs them.
pub struct Dispatcher {
    variants: Vec<Box<dyn CommandVariant>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            variants: vec![
                Box::new(GetCommand::new()),
                Box::new(SetCommand::new()),
                Box::new(ApplySettingsCommand),
            ],
        }
    }

    pub fn find(&self, name: &str) -> Option<&dyn CommandVariant> {
        self.variants
            .iter()
            .find(|variant| variant.name() == name)
            .map(|variant| variant.as_ref())
    }

    /// Print the command list.
    pub fn print_usage(&self, out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(out, "usage: {PROGRAM} [OPTIONS] <COMMAND> [ARGS]...")?;
        writeln!(out, "Commands:")?;
        for variant in &self.variants {
            writeln!(out, "  {:<28} {}", variant.usage(), variant.summary())?;
        }
        writeln!(out, "  {:<28} {}", "help [command]", "Show help for a command.")
    }

    /// `help [command]`.
    pub fn help(&self, topic: Option<&str>, out: &mut dyn Write) -> Result<(), CliError> {
        match topic {
            None => self.print_usage(out)?,
            Some(name) => self
                .find(name)
                .ok_or_else(|| CliError::UnknownCommand(name.to_string()))?
                .print_help(out)?,
        }
        Ok(())
    }

    /// Run one command against the daemon behind `transport`.
    ///
    /// Nothing touches `transport` until the invocation has passed every
    /// local check.
    pub async fn run(
        &self,
        invocation: &Invocation,
        transport: Rc<dyn Transport>,
        settings: RunSettings,
        out: &mut dyn Write,
    ) -> Result<(), CliError> {
        let variant = self
            .find(&invocation.command)
            .ok_or_else(|| CliError::UnknownCommand(invocation.command.clone()))?;
        if invocation.params.len() != variant.arity() {
            return Err(CliError::Usage(format!(
                "usage: {PROGRAM} {}",
                variant.usage()
            )));
        }
        variant.validate(&invocation.params)?;

        let session = Session::start(transport, settings.retry_interval);
        let guard = TimeoutGuard::start(settings.timeout);
        let outcome = guard
            .race(async {
                session.first_active().await?;
                variant.execute(&invocation.params, &session, out).await
            })
            .await;
        debug!(
            command = variant.name(),
            attempts = session.connect_attempts(),
            bound = ?guard.bound(),
            "command finished"
        );
        session.close();
        outcome?
    }
}
