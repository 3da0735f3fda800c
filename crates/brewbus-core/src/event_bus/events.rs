//! Event definitions for the bus.
//!
//! An [`Event`] pairs an [`EventType`] with an ordered argument list. The bus
//! never inspects the arguments; only the handler and observers registered
//! for the type interpret them.

use crate::error::BusError;
use crate::types::EventArgs;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a kind of event, e.g. `brew_coffee`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventType(String);

impl EventType {
    /// Create an event type, rejecting empty or blank names
    pub fn new(name: impl Into<String>) -> Result<Self, BusError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(BusError::validation("event type", "must not be empty"));
        }
        Ok(Self(name))
    }

    /// The event type name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EventType {
    type Error = BusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for EventType {
    type Error = BusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        value.0
    }
}

/// Identifier of an observer, unique within one event type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObserverId(String);

impl ObserverId {
    /// Create an observer id, rejecting empty or blank names
    pub fn new(id: impl Into<String>) -> Result<Self, BusError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(BusError::validation("observer id", "must not be empty"));
        }
        Ok(Self(id))
    }

    /// The observer id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObserverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ObserverId {
    type Error = BusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ObserverId {
    type Error = BusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ObserverId> for String {
    fn from(value: ObserverId) -> Self {
        value.0
    }
}

/// Conversion into a validated [`EventType`]
pub trait IntoEventType {
    /// Validate and convert
    fn into_event_type(self) -> Result<EventType, BusError>;
}

impl IntoEventType for EventType {
    fn into_event_type(self) -> Result<EventType, BusError> {
        Ok(self)
    }
}

impl IntoEventType for &EventType {
    fn into_event_type(self) -> Result<EventType, BusError> {
        Ok(self.clone())
    }
}

impl IntoEventType for &str {
    fn into_event_type(self) -> Result<EventType, BusError> {
        EventType::new(self)
    }
}

impl IntoEventType for String {
    fn into_event_type(self) -> Result<EventType, BusError> {
        EventType::new(self)
    }
}

/// Conversion into a validated [`ObserverId`]
pub trait IntoObserverId {
    /// Validate and convert
    fn into_observer_id(self) -> Result<ObserverId, BusError>;
}

impl IntoObserverId for ObserverId {
    fn into_observer_id(self) -> Result<ObserverId, BusError> {
        Ok(self)
    }
}

impl IntoObserverId for &ObserverId {
    fn into_observer_id(self) -> Result<ObserverId, BusError> {
        Ok(self.clone())
    }
}

impl IntoObserverId for &str {
    fn into_observer_id(self) -> Result<ObserverId, BusError> {
        ObserverId::new(self)
    }
}

impl IntoObserverId for String {
    fn into_observer_id(self) -> Result<ObserverId, BusError> {
        ObserverId::new(self)
    }
}

/// Correlation id assigned to every dispatch, used in log messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchId(Uuid);

impl DispatchId {
    /// Create a new unique dispatch ID
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for DispatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Dispatch({})", &self.0.to_string()[..8])
    }
}

/// An event submitted for dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// The kind of event
    pub event_type: EventType,
    /// Ordered arguments, opaque to the bus
    pub args: EventArgs,
}

impl Event {
    /// Create an event with no arguments
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            args: Vec::new(),
        }
    }

    /// Create an event from a type name and arguments
    pub fn with_args(event_type: impl IntoEventType, args: EventArgs) -> Result<Self, BusError> {
        Ok(Self {
            event_type: event_type.into_event_type()?,
            args,
        })
    }

    /// Append an argument
    pub fn arg(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.args.push(value.into());
        self
    }
}

/// Options controlling a single dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOptions {
    /// Reject with `NoHandler` when no handler is registered for the event type.
    /// When false, a missing handler resolves the dispatch with `null`.
    pub enforce_handler: bool,
}

impl DispatchOptions {
    /// Options requiring a registered handler
    pub fn enforced() -> Self {
        Self {
            enforce_handler: true,
        }
    }
}
