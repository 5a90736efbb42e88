//! `set <type> <value>`: change a daemon setting.
//!
//! Some values can only be checked against live daemon state (a region name
//! has to be resolved to a location id), so the request is built after the
//! session is active rather than up front.

use std::io::Write;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::values::{self, keys, types};
use super::{CommandVariant, PROGRAM};
use crate::client::Session;
use crate::error::CliError;
use crate::protocol::{Request, Snapshot};

/// A setting `set` knows how to change.
#[derive(Debug, Clone, Copy)]
pub struct SettingType {
    pub name: &'static str,
    /// Shown in help only.
    pub description: &'static str,
}

/// A parsed but not yet resolved change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetChange {
    DebugLogging(bool),
    Region(String),
}

pub struct SetCommand {
    supported: Vec<SettingType>,
}

impl Default for SetCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl SetCommand {
    pub fn new() -> Self {
        Self {
            supported: vec![
                SettingType {
                    name: types::DEBUG_LOGGING,
                    description: "Enable or disable debug logging.",
                },
                SettingType {
                    name: types::REGION,
                    description: "Select a region (or \"auto\")",
                },
            ],
        }
    }

    /// Parse the arguments without looking at daemon state.
    pub fn parse(&self, params: &[String]) -> Result<SetChange, CliError> {
        let [setting, value] = params else {
            return Err(CliError::Internal("set invoked without an arity check"));
        };
        if !self.supported.iter().any(|ty| ty.name == setting.as_str()) {
            return Err(CliError::UnknownType(setting.clone()));
        }
        match setting.as_str() {
            types::DEBUG_LOGGING => Ok(SetChange::DebugLogging(values::parse_boolean(value)?)),
            types::REGION => Ok(SetChange::Region(value.clone())),
            _ => Err(CliError::Internal("set type registered without a parser")),
        }
    }

    /// Turn a parsed change into the daemon request.
    pub fn build_request(&self, change: &SetChange, snapshot: &Snapshot) -> Result<Request, CliError> {
        let mut patch = Map::new();
        match change {
            SetChange::Region(name) => {
                let Some(id) = values::match_location(snapshot, name) else {
                    debug!(region = %name, "no match found for specified location");
                    return Err(CliError::UnknownRegion(name.clone()));
                };
                info!("Setting location to {id} ({name})");
                patch.insert(keys::LOCATION.to_string(), Value::String(id));
                // Changing region reconnects if currently connected.
                Ok(Request::apply_settings(patch, true))
            }
            SetChange::DebugLogging(enabled) => {
                let value = if *enabled {
                    values::default_debug_logging()
                } else {
                    Value::Null
                };
                patch.insert(keys::DEBUG_LOGGING.to_string(), value);
                Ok(Request::apply_settings(patch, false))
            }
        }
    }
}

#[async_trait(?Send)]
impl CommandVariant for SetCommand {
    fn name(&self) -> &'static str {
        "set"
    }

    fn arity(&self) -> usize {
        2
    }

    fn usage(&self) -> &'static str {
        "set <type> <value>"
    }

    fn summary(&self) -> &'static str {
        "Change settings in the daemon."
    }

    fn print_help(&self, out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(out, "usage: {PROGRAM} {}", self.usage())?;
        writeln!(out, "{}", self.summary())?;
        writeln!(out, "Available types:")?;
        for ty in &self.supported {
            writeln!(out, "  - {} - {}", ty.name, ty.description)?;
        }
        Ok(())
    }

    fn validate(&self, params: &[String]) -> Result<(), CliError> {
        self.parse(params).map(drop)
    }

    async fn execute(
        &self,
        params: &[String],
        session: &Session,
        _out: &mut dyn Write,
    ) -> Result<(), CliError> {
        let change = self.parse(params)?;
        let Request { method, args } = self.build_request(&change, &session.snapshot())?;
        session
            .call(&method, args)
            .next(|outcome| match outcome {
                Ok(_) => {
                    info!("Setting change succeeded");
                    Ok(())
                }
                Err(error) => Err(CliError::from(error)),
            })
            .await
    }
}
