//! `applysettings <json>`: send a raw settings patch to the daemon.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::io::Write;
use tracing::info;

use super::CommandVariant;
use crate::client::Session;
use crate::error::CliError;
use crate::protocol::Request;

/// Passes a JSON object straight through as an `applySettings` patch.
/// The daemon does the validation; nothing here knows the setting names.
pub struct ApplySettingsCommand;

impl ApplySettingsCommand {
    fn parse(params: &[String]) -> Result<Map<String, Value>, CliError> {
        let [json] = params else {
            return Err(CliError::Internal("applysettings invoked without an arity check"));
        };
        match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(patch)) => Ok(patch),
            Ok(other) => Err(CliError::InvalidSettings(format!(
                "expected an object, got {}",
                kind_of(&other)
            ))),
            Err(e) => Err(CliError::InvalidSettings(e.to_string())),
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait(?Send)]
impl CommandVariant for ApplySettingsCommand {
    fn name(&self) -> &'static str {
        "applysettings"
    }

    fn arity(&self) -> usize {
        1
    }

    fn usage(&self) -> &'static str {
        "applysettings <json>"
    }

    fn summary(&self) -> &'static str {
        "Apply a JSON object of settings to the daemon."
    }

    fn validate(&self, params: &[String]) -> Result<(), CliError> {
        Self::parse(params).map(drop)
    }

    async fn execute(
        &self,
        params: &[String],
        session: &Session,
        _out: &mut dyn Write,
    ) -> Result<(), CliError> {
        let patch = Self::parse(params)?;
        let keys = patch.keys().cloned().collect::<Vec<_>>().join(",");
        let Request { method, args } = Request::apply_settings(patch, false);
        session
            .call(&method, args)
            .next(|outcome| match outcome {
                Ok(_) => {
                    info!(settings = %keys, "Settings applied");
                    Ok(())
                }
                Err(error) => Err(CliError::from(error)),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::protocol::{Location, Snapshot};
    use crate::testing::FakeTransport;
    use serde_json::json;
    use std::time::Duration;
    use tokio::task::LocalSet;

    #[test]
    fn test_accepts_object() {
        let patch = ApplySettingsCommand::parse(&[r#"{"location":"us_east","x":1}"#.to_string()])
            .unwrap();
        assert_eq!(patch.get("location"), Some(&json!("us_east")));
        assert_eq!(patch.len(), 2);
    }

    #[test]
    fn test_rejects_non_objects() {
        for input in ["[1,2]", "\"auto\"", "42", "null", "{not json", ""] {
            let error = ApplySettingsCommand.validate(&[input.to_string()]).unwrap_err();
            assert!(matches!(error, CliError::InvalidSettings(_)), "{input}");
            assert_eq!(error.kind(), ErrorKind::InvalidArgs);
        }
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_sends_patch_without_reconnect() {
        let snapshot = Snapshot {
            settings: Default::default(),
            locations: vec![Location::new("us_east", "US East")],
        };
        let transport = FakeTransport::new(snapshot);
        LocalSet::new()
            .run_until(async {
                let session = Session::start(transport.clone(), Duration::from_millis(100));
                session.first_active().await.unwrap();
                let mut out = Vec::new();
                ApplySettingsCommand
                    .execute(&[r#"{"debugLogging":null}"#.to_string()], &session, &mut out)
                    .await
                    .unwrap();
                assert!(out.is_empty());
            })
            .await;

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args, vec![json!({"debugLogging": null}), json!(false)]);
    }
}
