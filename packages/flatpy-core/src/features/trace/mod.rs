//! Trace Hook - interpreter event multiplexing
//!
//! Registers callbacks per recognized runtime event kind (call, line,
//! return, exception) and fires them in insertion order as the sandbox
//! interpreter executes generated programs.

pub mod domain;
pub mod infrastructure;

pub use domain::{HookFn, HookId, TraceEvent, TraceFrame, TRACE_EVENTS};
pub use infrastructure::hook::EventHook;
