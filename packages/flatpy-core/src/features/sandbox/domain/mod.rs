//! Execution Sandbox Domain - runtime values and the runner port

use crate::errors::{FlatpyError, Result};
use crate::shared::models::{FunctionDef, Program};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// Signature of a native builtin
pub type BuiltinFn = fn(&[Value]) -> Result<Value>;

/// Runtime values produced by the sandbox interpreter
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Function(Rc<FunctionDef>),
    Builtin { name: &'static str, f: BuiltinFn },
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::None, Value::None) => true,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin { name: a, .. }, Value::Builtin { name: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bool(_) => "bool",
            Value::None => "NoneType",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Function(_) => "function",
            Value::Builtin { .. } => "builtin_function",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) | Value::Tuple(items) => !items.is_empty(),
            Value::Function(_) | Value::Builtin { .. } => true,
        }
    }
}

/// A name→value mapping: the executed module's resulting namespace
pub type Namespace = FxHashMap<String, Value>;

/// Code accepted by the runner: raw text or an already-built tree
pub enum RunnableCode<'a> {
    Source(&'a str),
    Program(&'a Program),
}

/// Execution runner trait (port): run rewritten code under an initial
/// global namespace and return the resulting namespace.
pub trait CodeRunner {
    fn run_code(
        &mut self,
        code: RunnableCode<'_>,
        name: &str,
        init_globals: Namespace,
    ) -> Result<Namespace>;
}

fn builtin_abs(args: &[Value]) -> Result<Value> {
    match args {
        [Value::Int(i)] => Ok(Value::Int(i.abs())),
        [Value::Float(f)] => Ok(Value::Float(f.abs())),
        [other] => Err(FlatpyError::exec(format!(
            "bad operand type for abs(): {}",
            other.type_name()
        ))),
        _ => Err(FlatpyError::exec(format!(
            "abs() takes exactly one argument ({} given)",
            args.len()
        ))),
    }
}

fn builtin_len(args: &[Value]) -> Result<Value> {
    match args {
        [Value::Str(s)] => Ok(Value::Int(s.chars().count() as i64)),
        [Value::List(items)] | [Value::Tuple(items)] => Ok(Value::Int(items.len() as i64)),
        [other] => Err(FlatpyError::exec(format!(
            "object of type {} has no len()",
            other.type_name()
        ))),
        _ => Err(FlatpyError::exec(format!(
            "len() takes exactly one argument ({} given)",
            args.len()
        ))),
    }
}

fn extremum(args: &[Value], want_max: bool, name: &str) -> Result<Value> {
    let items: Vec<Value> = match args {
        [] => return Err(FlatpyError::exec(format!("{name}() expected at least 1 argument"))),
        [Value::List(items)] | [Value::Tuple(items)] => items.clone(),
        _ => args.to_vec(),
    };
    let mut iter = items.into_iter();
    let mut best = iter
        .next()
        .ok_or_else(|| FlatpyError::exec(format!("{name}() arg is an empty sequence")))?;
    for candidate in iter {
        let replace = match (&candidate, &best) {
            (Value::Int(a), Value::Int(b)) => (a > b) == want_max,
            (Value::Float(a), Value::Float(b)) => (a > b) == want_max,
            (Value::Int(a), Value::Float(b)) => ((*a as f64) > *b) == want_max,
            (Value::Float(a), Value::Int(b)) => (*a > (*b as f64)) == want_max,
            (Value::Str(a), Value::Str(b)) => (a > b) == want_max,
            (a, b) => {
                return Err(FlatpyError::exec(format!(
                    "'{}' not supported between instances of {} and {}",
                    if want_max { ">" } else { "<" },
                    a.type_name(),
                    b.type_name()
                )))
            }
        };
        if replace {
            best = candidate;
        }
    }
    Ok(best)
}

fn builtin_min(args: &[Value]) -> Result<Value> {
    extremum(args, false, "min")
}

fn builtin_max(args: &[Value]) -> Result<Value> {
    extremum(args, true, "max")
}

static BUILTINS: Lazy<Vec<(&'static str, BuiltinFn)>> = Lazy::new(|| {
    vec![
        ("abs", builtin_abs as BuiltinFn),
        ("len", builtin_len as BuiltinFn),
        ("min", builtin_min as BuiltinFn),
        ("max", builtin_max as BuiltinFn),
    ]
});

/// Default global namespace: the native builtins every sandboxed program
/// can rely on. Injected globals overlay these.
pub fn builtins() -> Namespace {
    BUILTINS
        .iter()
        .map(|(name, f)| (name.to_string(), Value::Builtin { name, f: *f }))
        .collect()
}
