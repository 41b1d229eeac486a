//! Source↔Tree Bridge Domain - Port/Adapter Interface

use crate::errors::Result;
use crate::shared::models::Program;

/// Source bridge trait (port): text → tree and tree → text
pub trait SourceBridge {
    /// Parse source text into a program tree; a parse failure is fatal
    fn parse(&mut self, source: &str) -> Result<Program>;

    /// Render a program tree back to executable source text
    fn unparse(&self, program: &Program) -> Result<String>;

    /// Language name (e.g., "python")
    fn language(&self) -> &str;
}
