//! Setting names and value grammar shared by `get` and `set`.

use serde_json::Value;

use crate::error::CliError;
use crate::protocol::Snapshot;

/// Setting type names as typed on the command line.
pub mod types {
    pub const DEBUG_LOGGING: &str = "debugLogging";
    pub const REGION: &str = "region";
    pub const REGIONS: &str = "regions";
}

/// Daemon setting keys.
pub mod keys {
    pub const DEBUG_LOGGING: &str = "debugLogging";
    pub const LOCATION: &str = "location";
}

/// Region sentinel meaning "let the daemon pick".
pub const LOCATION_AUTO: &str = "auto";

/// The daemon's default debug logging filters, applied by `set debugLogging true`.
pub const DEFAULT_DEBUG_LOGGING: &[&str] = &["*.debug=true", "qt*.debug=false", "latency.*=false"];

/// The value written to enable debug logging.
pub fn default_debug_logging() -> Value {
    Value::from(DEFAULT_DEBUG_LOGGING.to_vec())
}

/// Parse a boolean command-line value.
pub fn parse_boolean(value: &str) -> Result<bool, CliError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        _ => Err(CliError::InvalidBoolean(value.to_string())),
    }
}

/// Resolve a region typed by the user to a location id.
///
/// `auto` always resolves. Otherwise the first location whose display name
/// matches exactly wins.
pub fn match_location(snapshot: &Snapshot, name: &str) -> Option<String> {
    if name == LOCATION_AUTO {
        return Some(LOCATION_AUTO.to_string());
    }
    snapshot
        .locations
        .iter()
        .find(|location| location.display_name == name)
        .map(|location| location.id.clone())
}

/// Whether a `debugLogging` setting value means logging is on.
pub fn debug_logging_enabled(value: Option<&Value>) -> bool {
    !matches!(value, None | Some(Value::Null) | Some(Value::Bool(false)))
}
