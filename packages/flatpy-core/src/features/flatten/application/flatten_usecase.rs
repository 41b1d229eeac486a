//! Flatten use case
//!
//! End-to-end orchestration: source text in, rewritten tree and a runnable
//! callable out. Parsing, the rewrite pass, code generation, and sandbox
//! execution each stay behind their own boundary.

use crate::config::{FlatpyConfig, FLATTENED_SUFFIX};
use crate::errors::{FlatpyError, Result};
use crate::features::bridge::{PythonSourceBridge, SourceBridge};
use crate::features::flatten::infrastructure::Flattener;
use crate::features::sandbox::{
    CodeRunner, Interpreter, Namespace, RunnableCode, TempCodeManager, Value,
};
use crate::shared::models::{Program, Stmt};
use crate::shared::utils::remove_indent;
use tracing::debug;

pub struct FlattenUseCase {
    config: FlatpyConfig,
    bridge: PythonSourceBridge,
}

impl FlattenUseCase {
    pub fn new(config: FlatpyConfig) -> Result<Self> {
        Ok(Self {
            config,
            bridge: PythonSourceBridge::new()?,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(FlatpyConfig::default())
    }

    /// Flatten source text and return both the rewritten tree and its
    /// regenerated source. Leading indentation common to the whole input
    /// is stripped first, so indented snippets are accepted.
    pub fn flatten_source(&mut self, source: &str) -> Result<(Program, String)> {
        let source = remove_indent(source);
        let program = self.bridge.parse(&source)?;
        let flat = Flattener::new(self.config.temp_prefix.as_str()).flatten_program(&program)?;
        let text = self.bridge.unparse(&flat)?;
        Ok((flat, text))
    }

    /// Flatten a snippet containing a function definition, execute the
    /// rewritten module in the sandbox with `init_globals` injected, and
    /// hand back the resulting callable.
    pub fn flatten_callable(
        &mut self,
        source: &str,
        init_globals: Namespace,
    ) -> Result<FlattenedCallable> {
        let (flat, _) = self.flatten_source(source)?;
        let name = fetch_func_name(&flat.body).ok_or_else(|| {
            FlatpyError::invariant("input contains no function definition to flatten")
        })?;
        let code_name = format!("{name}{FLATTENED_SUFFIX}");
        debug!(function = %name, module = %code_name, "building flattened callable");
        let mut runner = TempCodeManager::new(
            self.config.temp_code_root.clone(),
            self.config.keep_generated,
        )?;
        let namespace = runner.run_code(RunnableCode::Program(&flat), &code_name, init_globals)?;
        let function = namespace
            .get(&name)
            .cloned()
            .ok_or_else(|| FlatpyError::exec(format!("function `{name}` vanished during execution")))?;
        Ok(FlattenedCallable {
            name,
            function,
            namespace,
        })
    }
}

/// Name of the first function definition in a statement list, searching
/// nested bodies depth-first.
pub fn fetch_func_name(body: &[Stmt]) -> Option<String> {
    for stmt in body {
        if let Stmt::FunctionDef(def) = stmt {
            return Some(def.name.clone());
        }
    }
    for stmt in body {
        if let Stmt::FunctionDef(def) = stmt {
            if let Some(name) = fetch_func_name(&def.body) {
                return Some(name);
            }
        }
    }
    None
}

/// A rewritten function, ready to invoke. Holds the namespace the
/// generated module produced, so calls see the same globals the module
/// was executed with.
#[derive(Debug)]
pub struct FlattenedCallable {
    pub name: String,
    function: Value,
    namespace: Namespace,
}

impl FlattenedCallable {
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        let mut interpreter = Interpreter::new(self.namespace.clone());
        interpreter.call_function(&self.function, args)
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::bridge::PythonParser;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_flatten_source_produces_three_address_text() {
        let mut usecase = FlattenUseCase::with_defaults().unwrap();
        let (_, text) = usecase.flatten_source("r = f(g(x))\n").unwrap();
        assert_eq!(text, "__flat_1 = g(x)\nr = f(__flat_1)\n");
    }

    #[test]
    fn test_indented_snippet_is_accepted() {
        let mut usecase = FlattenUseCase::with_defaults().unwrap();
        let (_, text) = usecase
            .flatten_source("    x = 1\n    y = x + 2\n")
            .unwrap();
        assert_eq!(text, "x = 1\ny = x + 2\n");
    }

    #[test]
    fn test_fetch_func_name_finds_nested_definitions() {
        let program = PythonParser::new()
            .unwrap()
            .parse("x = 1\ndef outer():\n    def inner():\n        pass\n    return inner\n")
            .unwrap();
        assert_eq!(fetch_func_name(&program.body), Some("outer".to_string()));
        let Stmt::FunctionDef(outer) = &program.body[1] else {
            panic!("expected function definition");
        };
        assert_eq!(fetch_func_name(&outer.body), Some("inner".to_string()));
    }

    #[test]
    fn test_flatten_callable_requires_a_function() {
        let mut usecase = FlattenUseCase::with_defaults().unwrap();
        let err = usecase
            .flatten_callable("x = 1\n", Namespace::default())
            .unwrap_err();
        assert!(matches!(err, FlatpyError::Invariant(_)));
    }

    #[test]
    fn test_flattened_callable_runs() {
        let mut usecase = FlattenUseCase::with_defaults().unwrap();
        let callable = usecase
            .flatten_callable(
                "def diff(a, b):\n    return abs(a - b)\n",
                Namespace::default(),
            )
            .unwrap();
        assert_eq!(callable.name, "diff");
        let result = callable
            .call(&[Value::Int(391), Value::Int(1096)])
            .unwrap();
        assert_eq!(result, Value::Int(705));
    }
}
