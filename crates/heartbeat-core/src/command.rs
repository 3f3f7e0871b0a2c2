use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Message returned when a connection sends INIT a second time.
pub const ALREADY_INITIALIZED: &str = "Initialization has already been called before";

/// Control command type. Only `INIT` drives the registration state machine;
/// every other type is acknowledged and echoed back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ControlCmdType {
    Init,
    Other(String),
}

impl From<String> for ControlCmdType {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("init") {
            Self::Init
        } else {
            Self::Other(value)
        }
    }
}

impl From<ControlCmdType> for String {
    fn from(value: ControlCmdType) -> Self {
        match value {
            ControlCmdType::Init => "INIT".to_string(),
            ControlCmdType::Other(s) => s,
        }
    }
}

impl ControlCmdType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Init => "INIT",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for ControlCmdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A control command sent by a client on its control channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlCommand {
    pub cmd_type: ControlCmdType,
    /// Remaining command fields, carried through untouched.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl ControlCommand {
    pub fn new(cmd_type: ControlCmdType) -> Self {
        Self {
            cmd_type,
            params: Map::new(),
        }
    }

    pub fn init() -> Self {
        Self::new(ControlCmdType::Init)
    }

    pub fn is_init(&self) -> bool {
        self.cmd_type == ControlCmdType::Init
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            write!(f, "{}", self.cmd_type)
        } else {
            write!(f, "{} {}", self.cmd_type, Value::Object(self.params.clone()))
        }
    }
}

/// Outcome of processing a control command: `(accepted, message)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub accepted: bool,
    pub message: String,
}

impl CommandResponse {
    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            accepted: true,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: message.into(),
        }
    }
}
