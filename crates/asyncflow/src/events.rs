//! State-change event types published to Service and AsyncOperation listeners.
//!
//! Equality is structural over `(target, to_state[, from_state])`.
//! `EventFields` gives uniform name-based accessors for the event-bus
//! listener shape without needing reflection.

use std::sync::Arc;

use crate::operation::OperationPublicState;
use crate::service::ServiceState;

/// Uniform property-bag accessors, the non-reflective analogue of an
/// event-bus listener that looks events up by property name.
pub trait EventFields {
    fn target_name(&self) -> &str;
    fn to_state_name(&self) -> &'static str;
    fn from_state_name(&self) -> Option<&'static str> {
        None
    }
    fn tag(&self) -> Option<&str> {
        None
    }
}

/// Emitted whenever a [`crate::service::Service`] transitions its public state.
#[derive(Debug, Clone)]
pub struct ServiceStateChangeEvent {
    pub service_name: Arc<str>,
    pub from: ServiceState,
    pub to: ServiceState,
    pub tag: Option<Arc<str>>,
}

impl PartialEq for ServiceStateChangeEvent {
    fn eq(&self, other: &Self) -> bool {
        self.service_name == other.service_name && self.from == other.from && self.to == other.to
    }
}
impl Eq for ServiceStateChangeEvent {}

impl EventFields for ServiceStateChangeEvent {
    fn target_name(&self) -> &str {
        &self.service_name
    }
    fn to_state_name(&self) -> &'static str {
        self.to.as_str()
    }
    fn from_state_name(&self) -> Option<&'static str> {
        Some(self.from.as_str())
    }
    fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }
}

/// Emitted whenever an [`crate::operation::AsyncOperation`] reaches RUNNING or a
/// terminal public state.
#[derive(Debug, Clone)]
pub struct AsyncOperationStateChangeEvent {
    pub operation_name: Arc<str>,
    pub to_state: OperationPublicState,
    pub tag: Option<Arc<str>>,
}

impl PartialEq for AsyncOperationStateChangeEvent {
    fn eq(&self, other: &Self) -> bool {
        self.operation_name == other.operation_name && self.to_state == other.to_state
    }
}
impl Eq for AsyncOperationStateChangeEvent {}

impl EventFields for AsyncOperationStateChangeEvent {
    fn target_name(&self) -> &str {
        &self.operation_name
    }
    fn to_state_name(&self) -> &'static str {
        self.to_state.as_str()
    }
    fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }
}

/// Two listener shapes: a direct callback, or a single event-sink method
/// receiving the event object — the tagged-variant replacement for listener
/// sets typed by unrelated interfaces.
pub enum ServiceListener {
    Callback(Box<dyn Fn(ServiceState, ServiceState) + Send + Sync>),
    EventSink(Box<dyn Fn(ServiceStateChangeEvent) + Send + Sync>),
}

pub enum OperationListener {
    /// `onAsyncOperationStarted` / `onAsyncOperationFinished`.
    Callback {
        on_started: Option<Box<dyn Fn() + Send + Sync>>,
        on_finished: Option<Box<dyn Fn(OperationPublicState) + Send + Sync>>,
    },
    EventSink(Box<dyn Fn(AsyncOperationStateChangeEvent) + Send + Sync>),
}
