//! `get <type>`: print a value from the daemon's current state.

use std::io::Write;

use async_trait::async_trait;

use super::values::{self, keys, types, LOCATION_AUTO};
use super::{CommandVariant, PROGRAM};
use crate::client::Session;
use crate::error::CliError;
use crate::protocol::Snapshot;

pub struct GetCommand {
    supported: Vec<(&'static str, &'static str)>,
}

impl Default for GetCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl GetCommand {
    pub fn new() -> Self {
        Self {
            supported: vec![
                (types::DEBUG_LOGGING, "Whether debug logging is enabled."),
                (types::REGION, "The selected region (or \"auto\")."),
                (types::REGIONS, "Every region name \"set region\" accepts."),
            ],
        }
    }

    /// Render the requested value, one item per line.
    pub fn render(&self, ty: &str, snapshot: &Snapshot, out: &mut dyn Write) -> Result<(), CliError> {
        match ty {
            types::DEBUG_LOGGING => {
                let enabled = values::debug_logging_enabled(snapshot.setting(keys::DEBUG_LOGGING));
                writeln!(out, "{enabled}")?;
            }
            types::REGION => {
                let id = snapshot
                    .setting(keys::LOCATION)
                    .and_then(|value| value.as_str())
                    .unwrap_or(LOCATION_AUTO);
                let name = snapshot
                    .locations
                    .iter()
                    .find(|location| location.id == id)
                    .map_or(id, |location| location.display_name.as_str());
                writeln!(out, "{name}")?;
            }
            types::REGIONS => {
                writeln!(out, "{LOCATION_AUTO}")?;
                for location in &snapshot.locations {
                    writeln!(out, "{}", location.display_name)?;
                }
            }
            other => return Err(CliError::UnknownType(other.to_string())),
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl CommandVariant for GetCommand {
    fn name(&self) -> &'static str {
        "get"
    }

    fn arity(&self) -> usize {
        1
    }

    fn usage(&self) -> &'static str {
        "get <type>"
    }

    fn summary(&self) -> &'static str {
        "Print information from the daemon."
    }

    fn print_help(&self, out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(out, "usage: {PROGRAM} {}", self.usage())?;
        writeln!(out, "{}", self.summary())?;
        writeln!(out, "Available types:")?;
        for (name, description) in &self.supported {
            writeln!(out, "  - {name} - {description}")?;
        }
        Ok(())
    }

    fn validate(&self, params: &[String]) -> Result<(), CliError> {
        let [ty] = params else {
            return Err(CliError::Internal("get invoked without an arity check"));
        };
        if self.supported.iter().any(|(name, _)| name == ty) {
            Ok(())
        } else {
            Err(CliError::UnknownType(ty.clone()))
        }
    }

    async fn execute(
        &self,
        params: &[String],
        session: &Session,
        out: &mut dyn Write,
    ) -> Result<(), CliError> {
        let [ty] = params else {
            return Err(CliError::Internal("get invoked without an arity check"));
        };
        self.render(ty, &session.snapshot(), out)?;
        out.flush()?;
        Ok(())
    }
}
