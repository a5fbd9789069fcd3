//! Client actions and the replies sent back for them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::state::VolumeState;

/// Inbound message from a client: `{"action": "setVolume", "value": 60}`.
///
/// The action name is kept as a raw string so that unknown names can be
/// told apart from malformed messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Requested action name
    pub action: String,
    /// Optional numeric argument
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl ActionRequest {
    /// Parse a request from a JSON text frame.
    ///
    /// # Errors
    /// Returns an error if the text is not a JSON object with an `action` string.
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// The known action this request names, if any.
    #[must_use]
    pub fn known_action(&self) -> Option<Action> {
        Action::from_name(&self.action)
    }

    /// The value as an integer.
    ///
    /// Floats with no fractional part count as integers; anything else
    /// (missing, strings, `60.5`) yields `None`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn integer_value(&self) -> Option<i64> {
        let Some(Value::Number(number)) = self.value.as_ref() else {
            return None;
        };
        number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        })
    }
}

/// Actions understood by the control server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    SetVolume,
    GetState,
    IncreaseVolume,
    DecreaseVolume,
    Mute,
    Unmute,
    ToggleMute,
}

impl Action {
    /// Every action, in protocol table order.
    pub const ALL: [Self; 7] = [
        Self::SetVolume,
        Self::IncreaseVolume,
        Self::DecreaseVolume,
        Self::Mute,
        Self::Unmute,
        Self::ToggleMute,
        Self::GetState,
    ];

    /// Look up an action by its wire name.
    ///
    /// `getVolume` and `isMuted` are older names for `getState`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "setVolume" => Some(Self::SetVolume),
            "getState" | "getVolume" | "isMuted" => Some(Self::GetState),
            "increaseVolume" => Some(Self::IncreaseVolume),
            "decreaseVolume" => Some(Self::DecreaseVolume),
            "mute" => Some(Self::Mute),
            "unmute" => Some(Self::Unmute),
            "toggleMute" => Some(Self::ToggleMute),
            _ => None,
        }
    }

    /// Wire name of this action.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::SetVolume => "setVolume",
            Self::GetState => "getState",
            Self::IncreaseVolume => "increaseVolume",
            Self::DecreaseVolume => "decreaseVolume",
            Self::Mute => "mute",
            Self::Unmute => "unmute",
            Self::ToggleMute => "toggleMute",
        }
    }

    /// Whether the action changes device state.
    #[must_use]
    pub fn is_mutating(self) -> bool {
        !matches!(self, Self::GetState)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Reply sent to the requesting client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionResponse {
    /// Full state snapshot
    State(VolumeState),
    /// Failure, optionally with a machine-readable code
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl ActionResponse {
    pub const INVALID_ACTION: &'static str = "Invalid action";
    pub const PROCESSING_FAILED: &'static str = "Failed to process message";
    pub const BACKEND_ERROR_CODE: &'static str = "backend_error";

    /// Plain error reply without a code.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { error: message.into(), code: None }
    }

    #[must_use]
    pub fn invalid_action() -> Self {
        Self::error(Self::INVALID_ACTION)
    }

    #[must_use]
    pub fn processing_failed() -> Self {
        Self::error(Self::PROCESSING_FAILED)
    }

    /// Map a controller error to its reply.
    ///
    /// Validation errors carry their own message; backend detail is not
    /// exposed, only a stable code.
    #[must_use]
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::Validation { .. } => Self::error(error.to_string()),
            Error::Backend(_) => Self::Error {
                error: Self::PROCESSING_FAILED.to_string(),
                code: Some(Self::BACKEND_ERROR_CODE.to_string()),
            },
        }
    }

    /// Serialize to a JSON text frame.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<VolumeState> for ActionResponse {
    fn from(state: VolumeState) -> Self {
        Self::State(state)
    }
}
