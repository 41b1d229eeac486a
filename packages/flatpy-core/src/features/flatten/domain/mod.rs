//! Flattening Domain - the rewrite pass port

use crate::errors::Result;
use crate::shared::models::Program;

/// A program-to-program rewrite that removes expression nesting while
/// preserving evaluation order and observable behavior.
pub trait FlattenPass {
    fn run(&mut self, program: &Program) -> Result<Program>;
}
