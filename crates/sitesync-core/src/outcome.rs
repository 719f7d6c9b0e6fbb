use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::context::CommandInfo;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub status: CommandStatus,
    pub message: String,
    #[serde(default)]
    pub details: Value,
}

impl ExecutionOutcome {
    pub fn success(message: impl Into<String>, details: Value) -> Self {
        Self {
            status: CommandStatus::Ok,
            message: message.into(),
            details,
        }
    }

    pub fn failure(message: impl Into<String>, details: Value) -> Self {
        Self {
            status: CommandStatus::Failure,
            message: message.into(),
            details,
        }
    }

    pub fn user_error(message: impl Into<String>, details: Value) -> Self {
        Self {
            status: CommandStatus::UserError,
            message: message.into(),
            details,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum CommandStatus {
    Ok,
    UserError,
    Failure,
}

/// A user-facing error raised deep inside an operation. The dispatch layer
/// downcasts it into a `UserError` outcome instead of an internal failure.
#[derive(thiserror::Error, Debug)]
#[error("{message}")]
pub struct SyncUserError {
    pub(crate) message: String,
    pub(crate) details: Value,
}

impl SyncUserError {
    pub fn new(message: impl Into<String>, details: Value) -> Self {
        Self {
            message: message.into(),
            details,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn details(&self) -> &Value {
        &self.details
    }
}

#[must_use]
pub fn to_json_response(info: CommandInfo, outcome: &ExecutionOutcome, _code: i32) -> Value {
    let status = match outcome.status {
        CommandStatus::Ok => "ok",
        CommandStatus::UserError => "user-error",
        CommandStatus::Failure => "error",
    };
    let details = match &outcome.details {
        Value::Object(_) => outcome.details.clone(),
        Value::Null => json!({}),
        other => json!({ "value": other }),
    };
    json!({
        "status": status,
        "message": format_status_message(info, &outcome.message),
        "details": details,
    })
}

#[must_use]
pub fn format_status_message(info: CommandInfo, message: &str) -> String {
    let group_name = info.group.to_string();
    let prefix = if group_name == info.name {
        format!("sitesync {}", info.name)
    } else {
        format!("sitesync {} {}", group_name, info.name)
    };
    if message.is_empty() {
        prefix
    } else if message.starts_with(&prefix) {
        message.to_string()
    } else {
        format!("{prefix}: {message}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CommandGroup;

    #[test]
    fn json_response_normalizes_details() {
        let info = CommandInfo::new(CommandGroup::Sync, "sync");
        let outcome = ExecutionOutcome::failure("boom", Value::Null);
        let payload = to_json_response(info, &outcome, 2);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["message"], "sitesync sync: boom");
        assert!(payload["details"].is_object());
    }

    #[test]
    fn status_prefix_is_not_repeated() {
        let info = CommandInfo::new(CommandGroup::Dump, "dump");
        assert_eq!(
            format_status_message(info, "sitesync dump: done"),
            "sitesync dump: done"
        );
        assert_eq!(format_status_message(info, ""), "sitesync dump");
    }
}
