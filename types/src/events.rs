use serde::{Deserialize, Serialize};

/// A single key/value attribute attached to an application event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttribute {
    pub key: String,
    pub value: String,
}

/// A structured event emitted by the application during block execution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: String,
    pub attributes: Vec<EventAttribute>,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into(), attributes: Vec::new() }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(EventAttribute { key: key.into(), value: value.into() });
        self
    }
}

/// Outcome of delivering a single transaction to the application
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    /// Zero denotes success; any other value is an application-defined failure code.
    /// A failed transaction is still part of the block and does not abort injection.
    pub code: u32,
    pub log: String,
    pub events: Vec<Event>,
}

impl TxResult {
    pub fn ok(events: Vec<Event>) -> Self {
        Self { code: 0, log: String::new(), events }
    }

    pub fn error(code: u32, log: impl Into<String>) -> Self {
        Self { code, log: log.into(), events: Vec::new() }
    }

    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}
