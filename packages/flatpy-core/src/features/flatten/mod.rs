//! Flattening - rewrite nested expressions into three-address form
//!
//! Every composite sub-expression is hoisted into a freshly named
//! temporary so each resulting statement performs at most one operation.
//! Evaluation order and observable behavior are preserved exactly.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{fetch_func_name, FlattenUseCase, FlattenedCallable};
pub use domain::FlattenPass;
pub use infrastructure::Flattener;
