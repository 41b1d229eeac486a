//! Execution Sandbox - run rewritten programs in isolation
//!
//! Generated code executes against a fresh global namespace seeded with
//! native builtins plus caller-injected values. The resulting namespace
//! is handed back so callers can pull out the rewritten callable.

pub mod domain;
pub mod infrastructure;

pub use domain::{builtins, BuiltinFn, CodeRunner, Namespace, RunnableCode, Value};
pub use infrastructure::interpreter::Interpreter;
pub use infrastructure::temp_code::TempCodeManager;
