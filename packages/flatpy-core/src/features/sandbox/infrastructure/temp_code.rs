//! Temp code manager
//!
//! Materializes generated source into a file before executing it, so the
//! rewritten program always exists on disk for inspection. Files land in
//! the configured root directory, or in the system temp directory when no
//! root is set.

use crate::errors::Result;
use crate::features::bridge::{PythonSourceBridge, SourceBridge};
use crate::features::sandbox::domain::{CodeRunner, Namespace, RunnableCode};
use crate::features::sandbox::infrastructure::interpreter::Interpreter;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

pub struct TempCodeManager {
    root: Option<PathBuf>,
    keep_generated: bool,
    bridge: PythonSourceBridge,
}

impl TempCodeManager {
    pub fn new(root: Option<PathBuf>, keep_generated: bool) -> Result<Self> {
        Ok(Self {
            root,
            keep_generated,
            bridge: PythonSourceBridge::new()?,
        })
    }

    fn write_source(&self, name: &str, source: &str) -> Result<Option<PathBuf>> {
        if let Some(root) = &self.root {
            fs::create_dir_all(root)?;
            let path = root.join(format!("{name}.py"));
            fs::write(&path, source)?;
            debug!(path = %path.display(), "wrote generated code");
            return Ok(Some(path));
        }
        let file = tempfile::Builder::new()
            .prefix(name)
            .suffix(".py")
            .tempfile()?;
        fs::write(file.path(), source)?;
        debug!(path = %file.path().display(), "wrote generated code");
        if self.keep_generated {
            let (_, path) = file.keep().map_err(|e| e.error)?;
            return Ok(Some(path));
        }
        Ok(None)
    }
}

impl CodeRunner for TempCodeManager {
    fn run_code(
        &mut self,
        code: RunnableCode<'_>,
        name: &str,
        init_globals: Namespace,
    ) -> Result<Namespace> {
        let source = match code {
            RunnableCode::Source(source) => source.to_string(),
            RunnableCode::Program(program) => self.bridge.unparse(program)?,
        };
        self.write_source(name, &source)?;
        let program = self.bridge.parse(&source)?;
        let mut interpreter = Interpreter::new(init_globals);
        interpreter.run_program(&program)?;
        Ok(interpreter.into_globals())
    }
}
