//! Wire types for the two protocols the engine speaks.
//!
//! - [`BridgeMessage`]: window messages exchanged with the bridge running in
//!   the page's main world.
//! - [`Command`] / [`CommandReply`]: the outer-process command envelope.

use inspectmaker_config::{ScriptDefinition, ScriptId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A window message understood by the bridge, tagged by `action`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BridgeMessage {
    /// Isolated world -> main world: evaluate `code`.
    Execute {
        script_id: ScriptId,
        call_id: String,
        code: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<Value>,
    },
    /// Main world -> isolated world: outcome of one `Execute`.
    Result {
        script_id: ScriptId,
        call_id: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// The bridge script finished installing itself.
    Injected,
}

/// One request to run code in the main world.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRequest {
    pub script_id: ScriptId,
    pub code: String,
    /// Extra data exposed to the code as `context`.
    pub context: Option<Value>,
}

impl ExecutionRequest {
    pub fn new(script_id: ScriptId, code: impl Into<String>) -> Self {
        Self {
            script_id,
            code: code.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: Option<Value>) -> Self {
        self.context = context;
        self
    }
}

/// Structured outcome of one execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn ok(output: Option<String>) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }
}

/// Outer-process command, tagged by `action`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    /// Run a script once, outside any trigger.
    ExecuteScript { script: ScriptDefinition },
    /// Arm every enabled script whose patterns match the page.
    InitializeScripts,
    /// Arm one script.
    InjectScript { script: ScriptDefinition },
    /// Disarm one script.
    RemoveInjection { script_id: ScriptId },
}

impl Command {
    /// Every `action` value [`Command`] accepts.
    pub const ACTIONS: [&'static str; 4] = [
        "executeScript",
        "initializeScripts",
        "injectScript",
        "removeInjection",
    ];

    pub fn action(&self) -> &'static str {
        match self {
            Self::ExecuteScript { .. } => "executeScript",
            Self::InitializeScripts => "initializeScripts",
            Self::InjectScript { .. } => "injectScript",
            Self::RemoveInjection { .. } => "removeInjection",
        }
    }
}

/// Reply to exactly one [`Command`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CommandReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandReply {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

impl From<ExecutionResult> for CommandReply {
    fn from(result: ExecutionResult) -> Self {
        Self {
            success: result.success,
            output: result.output,
            message: None,
            error: result.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_execute_message_wire_shape() {
        let message = BridgeMessage::Execute {
            script_id: 7,
            call_id: "abc".to_string(),
            code: "1+1".to_string(),
            context: None,
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({ "action": "execute", "scriptId": 7, "callId": "abc", "code": "1+1" })
        );
    }

    #[test]
    fn test_result_message_parses_without_optional_fields() {
        let message: BridgeMessage = serde_json::from_value(json!({
            "action": "result", "scriptId": 7, "callId": "abc", "success": true
        }))
        .unwrap();
        assert_eq!(
            message,
            BridgeMessage::Result {
                script_id: 7,
                call_id: "abc".to_string(),
                success: true,
                result: None,
                error: None,
            }
        );
    }

    #[test]
    fn test_command_envelope() {
        let command: Command =
            serde_json::from_value(json!({ "action": "removeInjection", "scriptId": 3 })).unwrap();
        assert!(matches!(command, Command::RemoveInjection { script_id: 3 }));

        let command: Command =
            serde_json::from_value(json!({ "action": "initializeScripts", "requestId": 1 }))
                .unwrap();
        assert_eq!(command.action(), "initializeScripts");
    }

    #[test]
    fn test_reply_omits_empty_fields() {
        assert_eq!(
            serde_json::to_value(CommandReply::with_message("done")).unwrap(),
            json!({ "success": true, "message": "done" })
        );
        assert_eq!(
            serde_json::to_value(CommandReply::from(ExecutionResult::failure("x"))).unwrap(),
            json!({ "success": false, "error": "x" })
        );
    }
}
