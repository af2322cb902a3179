//! Server replies to a create-user call and how they are classified.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

/// Server error code for "User ... already exists".
pub const USER_ALREADY_EXISTS_CODE: i64 = 51003;

const USER_ALREADY_EXISTS: &str = "UserAlreadyExists";

/// Raw reply object returned by the datastore for a create-user call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Acknowledgement(Map<String, Value>);

impl Acknowledgement {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Wrap any JSON value. Non-object replies are kept under `reply` so the
    /// raw content still reaches the log.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self(fields),
            other => {
                let mut fields = Map::new();
                fields.insert("reply".to_string(), other);
                Self(fields)
            }
        }
    }

    /// Reply synthesised for a failure that produced no server document.
    pub fn failure(message: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("ok".to_string(), Value::from(0));
        fields.insert("errmsg".to_string(), Value::from(message.into()));
        Self(fields)
    }

    pub fn ok(&self) -> Option<f64> {
        self.0.get("ok").and_then(Value::as_f64)
    }

    pub fn code(&self) -> Option<f64> {
        self.0.get("code").and_then(Value::as_f64)
    }

    pub fn errmsg(&self) -> Option<&str> {
        self.0.get("errmsg").and_then(Value::as_str)
    }

    pub fn code_name(&self) -> Option<&str> {
        self.0.get("codeName").and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Acknowledgement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.0) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}

/// What a create-user reply means for the provisioning run.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The user was created, or the server reports it in the desired state.
    Created,
    /// The user already existed; creation was skipped.
    AlreadyExists,
    /// Anything else. Carries the raw reply for the operator.
    Anomaly(Acknowledgement),
}

impl Outcome {
    /// True for every outcome that leaves the user in place.
    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::Anomaly(_))
    }
}

/// Map a reply onto an [`Outcome`]. Rules are checked in order; the first
/// match wins.
pub fn classify(ack: &Acknowledgement) -> Outcome {
    if ack.ok() == Some(1.0) || ack.code() == Some(0.0) || ack.is_empty() {
        return Outcome::Created;
    }

    let message_says_exists = ack
        .errmsg()
        .is_some_and(|msg| msg.contains(USER_ALREADY_EXISTS));
    let code_says_exists = ack.code() == Some(USER_ALREADY_EXISTS_CODE as f64)
        || ack.code_name() == Some(USER_ALREADY_EXISTS);

    if message_says_exists || code_says_exists {
        return Outcome::AlreadyExists;
    }

    Outcome::Anomaly(ack.clone())
}
