pub mod python_parser;
pub mod python_unparser;

use crate::errors::Result;
use crate::shared::models::Program;

use super::domain::SourceBridge;
use python_parser::PythonParser;
use python_unparser::PythonUnparser;

/// Python implementation of the bridge port: tree-sitter in, plain text out.
pub struct PythonSourceBridge {
    parser: PythonParser,
    unparser: PythonUnparser,
}

impl PythonSourceBridge {
    pub fn new() -> Result<Self> {
        Ok(Self {
            parser: PythonParser::new()?,
            unparser: PythonUnparser::new(),
        })
    }
}

impl SourceBridge for PythonSourceBridge {
    fn parse(&mut self, source: &str) -> Result<Program> {
        self.parser.parse(source)
    }

    fn unparse(&self, program: &Program) -> Result<String> {
        self.unparser.unparse(program)
    }

    fn language(&self) -> &str {
        "python"
    }
}
