//! Shared utilities

pub mod indent;

pub use indent::{add_indent, code_to_lines, lines_to_code, reindent, remove_indent};
