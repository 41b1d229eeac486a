//! Source↔Tree Bridge - source text ↔ AST model
//!
//! ```text
//! source text
//!       ↓ tree-sitter CST
//! PythonParser (visitor)
//!       ↓
//! Program (AST model)
//!       ↓
//! PythonUnparser
//!       ↓
//! executable source text
//! ```

pub mod domain;
pub mod infrastructure;

pub use domain::SourceBridge;
pub use infrastructure::python_parser::PythonParser;
pub use infrastructure::python_unparser::PythonUnparser;
pub use infrastructure::PythonSourceBridge;
