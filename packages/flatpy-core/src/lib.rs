/*
 * Flatpy Core - Expression Flattening Engine
 *
 * Feature-First Hexagonal Architecture:
 * - shared/      : Common models (Program, Stmt, Expr) and utilities
 * - features/    : Vertical slices (bridge → flatten → sandbox → trace)
 * - config/      : Runtime configuration
 *
 * Pipeline:
 *   source text → bridge (parse) → flatten (rewrite) → bridge (unparse)
 *               → sandbox (execute) → namespace with the rewritten callable
 */

#![allow(clippy::new_without_default)] // Default impl not always wanted
#![allow(clippy::module_inception)] // Module naming intentional
#![allow(clippy::match_like_matches_macro)] // Match for readability
#![allow(clippy::collapsible_else_if)] // else if clarity

pub mod config;
pub mod errors;
pub mod features;
pub mod shared;

pub use config::FlatpyConfig;
pub use errors::{FlatpyError, Result};
pub use features::bridge::{PythonSourceBridge, SourceBridge};
pub use features::flatten::{FlattenUseCase, FlattenedCallable, Flattener};
pub use features::sandbox::{Interpreter, Namespace, TempCodeManager, Value};
pub use features::trace::{EventHook, TraceEvent, TraceFrame};
pub use shared::models::{Expr, Program, Stmt};
