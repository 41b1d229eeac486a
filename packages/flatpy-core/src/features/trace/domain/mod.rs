//! Trace Domain - runtime event kinds and frames

use crate::features::sandbox::domain::Value;
use serde::{Deserialize, Serialize};

/// Recognized interpreter-level events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraceEvent {
    Call,
    Line,
    Return,
    Exception,
}

pub const TRACE_EVENTS: [TraceEvent; 4] = [
    TraceEvent::Call,
    TraceEvent::Line,
    TraceEvent::Return,
    TraceEvent::Exception,
];

impl TraceEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceEvent::Call => "call",
            TraceEvent::Line => "line",
            TraceEvent::Return => "return",
            TraceEvent::Exception => "exception",
        }
    }
}

/// Snapshot handed to hooks when an event fires
#[derive(Debug, Clone)]
pub struct TraceFrame {
    /// Function the event occurred in (`<module>` at module scope)
    pub function: String,
    /// Statement index within the executing block
    pub statement: usize,
    /// Event payload: the return value for `Return`, the error text for
    /// `Exception`, otherwise absent
    pub arg: Option<Value>,
}

impl TraceFrame {
    pub fn new(function: impl Into<String>, statement: usize) -> Self {
        Self {
            function: function.into(),
            statement,
            arg: None,
        }
    }

    pub fn with_arg(mut self, arg: Value) -> Self {
        self.arg = Some(arg);
        self
    }
}

/// Identifier returned by hook registration, used for removal
pub type HookId = u64;

/// Registered callback type
pub type HookFn = Box<dyn FnMut(&TraceFrame)>;
