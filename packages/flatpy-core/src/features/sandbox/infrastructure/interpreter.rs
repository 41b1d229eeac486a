//! In-process evaluator for generated programs
//!
//! Executes a parsed `Program` against an injected global namespace and
//! exposes the resulting namespace so callers can retrieve the rewritten
//! callable by name. Runtime failures surface as execution errors, never
//! as flattening errors. Interpreter-level events (call, line, return,
//! exception) are multiplexed to an attached `EventHook`.

use crate::errors::{FlatpyError, Result};
use crate::features::sandbox::domain::{builtins, Namespace, Value};
use crate::features::trace::{EventHook, TraceEvent, TraceFrame};
use crate::shared::models::{BinOp, BoolOp, CmpOp, Expr, Program, Stmt, UnaryOp};
use std::rc::Rc;
use tracing::debug;

enum Flow {
    Normal,
    Return(Value),
}

enum Scope {
    Module,
    Local { function: String, vars: Namespace },
}

impl Scope {
    fn name(&self) -> &str {
        match self {
            Scope::Module => "<module>",
            Scope::Local { function, .. } => function,
        }
    }
}

pub struct Interpreter {
    globals: Namespace,
    hooks: EventHook,
}

impl Interpreter {
    /// Start from the native builtins, overlaid with the injected globals.
    pub fn new(init_globals: Namespace) -> Self {
        let mut globals = builtins();
        globals.extend(init_globals);
        Self {
            globals,
            hooks: EventHook::new(),
        }
    }

    pub fn hooks_mut(&mut self) -> &mut EventHook {
        &mut self.hooks
    }

    pub fn globals(&self) -> &Namespace {
        &self.globals
    }

    pub fn into_globals(self) -> Namespace {
        self.globals
    }

    /// Execute a module body into the global namespace.
    pub fn run_program(&mut self, program: &Program) -> Result<()> {
        debug!(statements = program.body.len(), "executing program");
        match self.exec_block(&program.body, &mut Scope::Module)? {
            Flow::Normal => Ok(()),
            Flow::Return(_) => Err(FlatpyError::exec("'return' outside function")),
        }
    }

    /// Invoke a function or builtin value with positional arguments.
    pub fn call_function(&mut self, func: &Value, args: &[Value]) -> Result<Value> {
        self.call_value(func, args.to_vec(), Vec::new())
    }

    fn exec_block(&mut self, body: &[Stmt], scope: &mut Scope) -> Result<Flow> {
        for (index, stmt) in body.iter().enumerate() {
            self.hooks
                .fire(TraceEvent::Line, &TraceFrame::new(scope.name(), index));
            match self.exec_stmt(stmt, scope)? {
                Flow::Normal => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &mut Scope) -> Result<Flow> {
        match stmt {
            Stmt::FunctionDef(def) => {
                let mut value = Value::Function(Rc::new(def.clone()));
                // Decorators apply innermost-first
                for decorator in def.decorators.iter().rev() {
                    let decorator = self.eval_expr(decorator, scope)?;
                    value = self.call_value(&decorator, vec![value], Vec::new())?;
                }
                self.store(def.name.clone(), value, scope);
                Ok(Flow::Normal)
            }
            Stmt::Assign { targets, value } => {
                let value = self.eval_expr(value, scope)?;
                for target in targets {
                    self.assign_target(target, value.clone(), scope)?;
                }
                Ok(Flow::Normal)
            }
            Stmt::AnnAssign { target, value, .. } => {
                if let Some(value) = value {
                    let value = self.eval_expr(value, scope)?;
                    self.assign_target(target, value, scope)?;
                }
                Ok(Flow::Normal)
            }
            Stmt::AugAssign { target, op, value } => {
                let left = self.eval_expr(target, scope)?;
                let right = self.eval_expr(value, scope)?;
                let result = apply_binop(*op, left, right)?;
                self.assign_target(target, result, scope)?;
                Ok(Flow::Normal)
            }
            Stmt::Return { value } => {
                let value = match value {
                    Some(value) => self.eval_expr(value, scope)?,
                    None => Value::None,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Expr { value } => {
                self.eval_expr(value, scope)?;
                Ok(Flow::Normal)
            }
            Stmt::Pass => Ok(Flow::Normal),
            Stmt::Unsupported { kind } => Err(FlatpyError::exec(format!(
                "cannot execute unsupported construct `{kind}`"
            ))),
        }
    }

    fn assign_target(&mut self, target: &Expr, value: Value, scope: &mut Scope) -> Result<()> {
        match target {
            Expr::Name(name) => {
                self.store(name.clone(), value, scope);
                Ok(())
            }
            Expr::Tuple(items) | Expr::List(items) => {
                let values = match value {
                    Value::List(values) | Value::Tuple(values) => values,
                    other => {
                        return Err(FlatpyError::exec(format!(
                            "cannot unpack non-sequence {}",
                            other.type_name()
                        )))
                    }
                };
                if values.len() != items.len() {
                    return Err(FlatpyError::exec(format!(
                        "expected {} values to unpack, got {}",
                        items.len(),
                        values.len()
                    )));
                }
                for (item, value) in items.iter().zip(values) {
                    self.assign_target(item, value, scope)?;
                }
                Ok(())
            }
            other => Err(FlatpyError::exec(format!(
                "cannot assign to {} target",
                other.kind_name()
            ))),
        }
    }

    fn store(&mut self, name: String, value: Value, scope: &mut Scope) {
        match scope {
            Scope::Module => {
                self.globals.insert(name, value);
            }
            Scope::Local { vars, .. } => {
                vars.insert(name, value);
            }
        }
    }

    fn load(&self, name: &str, scope: &Scope) -> Result<Value> {
        let found = match scope {
            Scope::Module => self.globals.get(name),
            Scope::Local { vars, .. } => vars.get(name).or_else(|| self.globals.get(name)),
        };
        found
            .cloned()
            .ok_or_else(|| FlatpyError::exec(format!("name `{name}` is not defined")))
    }

    fn eval_expr(&mut self, expr: &Expr, scope: &mut Scope) -> Result<Value> {
        match expr {
            Expr::Name(name) => self.load(name, scope),
            Expr::Constant(literal) => Ok(literal_value(literal)),
            Expr::FString(_) => Err(FlatpyError::exec(
                "f-strings are not supported in the sandbox",
            )),
            Expr::Call {
                func,
                args,
                keywords,
            } => {
                let callee = self.eval_expr(func, scope)?;
                let mut positional = Vec::with_capacity(args.len());
                for arg in args {
                    match arg {
                        Expr::Starred(inner) => match self.eval_expr(inner, scope)? {
                            Value::List(values) | Value::Tuple(values) => {
                                positional.extend(values)
                            }
                            other => {
                                return Err(FlatpyError::exec(format!(
                                    "argument after * must be a sequence, not {}",
                                    other.type_name()
                                )))
                            }
                        },
                        other => positional.push(self.eval_expr(other, scope)?),
                    }
                }
                let mut kwargs = Vec::with_capacity(keywords.len());
                for keyword in keywords {
                    kwargs.push((keyword.arg.clone(), self.eval_expr(&keyword.value, scope)?));
                }
                self.call_value(&callee, positional, kwargs)
            }
            Expr::BinOp { op, left, right } => {
                let left = self.eval_expr(left, scope)?;
                let right = self.eval_expr(right, scope)?;
                apply_binop(*op, left, right)
            }
            Expr::UnaryOp { op, operand } => {
                let operand = self.eval_expr(operand, scope)?;
                apply_unary(*op, operand)
            }
            Expr::BoolOp { op, left, right } => {
                let left = self.eval_expr(left, scope)?;
                match (op, left.is_truthy()) {
                    (BoolOp::And, false) | (BoolOp::Or, true) => Ok(left),
                    _ => self.eval_expr(right, scope),
                }
            }
            Expr::Compare { op, left, right } => {
                let left = self.eval_expr(left, scope)?;
                let right = self.eval_expr(right, scope)?;
                apply_compare(*op, left, right)
            }
            Expr::Attribute { attr, .. } => Err(FlatpyError::exec(format!(
                "attribute access `.{attr}` is not supported in the sandbox"
            ))),
            Expr::Subscript { value, index } => {
                let value = self.eval_expr(value, scope)?;
                let index = self.eval_expr(index, scope)?;
                apply_subscript(value, index)
            }
            Expr::Starred(_) => Err(FlatpyError::exec("cannot use starred expression here")),
            Expr::Tuple(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item, scope)?);
                }
                Ok(Value::Tuple(values))
            }
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item, scope)?);
                }
                Ok(Value::List(values))
            }
        }
    }

    fn call_value(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value> {
        match callee {
            Value::Builtin { name, f } => {
                if !kwargs.is_empty() {
                    return Err(FlatpyError::exec(format!(
                        "{name}() takes no keyword arguments"
                    )));
                }
                self.hooks
                    .fire(TraceEvent::Call, &TraceFrame::new(*name, 0));
                let result = f(&args);
                match &result {
                    Ok(value) => self.hooks.fire(
                        TraceEvent::Return,
                        &TraceFrame::new(*name, 0).with_arg(value.clone()),
                    ),
                    Err(error) => self.hooks.fire(
                        TraceEvent::Exception,
                        &TraceFrame::new(*name, 0).with_arg(Value::Str(error.to_string())),
                    ),
                }
                result
            }
            Value::Function(def) => {
                let def = Rc::clone(def);
                let locals = self.bind_parameters(&def, args, kwargs)?;
                let mut scope = Scope::Local {
                    function: def.name.clone(),
                    vars: locals,
                };
                self.hooks
                    .fire(TraceEvent::Call, &TraceFrame::new(def.name.clone(), 0));
                match self.exec_block(&def.body, &mut scope) {
                    Err(error) => {
                        self.hooks.fire(
                            TraceEvent::Exception,
                            &TraceFrame::new(def.name.clone(), 0)
                                .with_arg(Value::Str(error.to_string())),
                        );
                        Err(error)
                    }
                    Ok(flow) => {
                        let value = match flow {
                            Flow::Return(value) => value,
                            Flow::Normal => Value::None,
                        };
                        self.hooks.fire(
                            TraceEvent::Return,
                            &TraceFrame::new(def.name.clone(), 0).with_arg(value.clone()),
                        );
                        Ok(value)
                    }
                }
            }
            other => Err(FlatpyError::exec(format!(
                "{} object is not callable",
                other.type_name()
            ))),
        }
    }

    fn bind_parameters(
        &mut self,
        def: &crate::shared::models::FunctionDef,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Namespace> {
        let params = &def.params;
        if args.len() > params.len() {
            return Err(FlatpyError::exec(format!(
                "{}() takes {} positional arguments but {} were given",
                def.name,
                params.len(),
                args.len()
            )));
        }
        let mut locals = Namespace::default();
        for (index, value) in args.into_iter().enumerate() {
            locals.insert(params[index].name.clone(), value);
        }
        for (name, value) in kwargs {
            if !params.iter().any(|p| p.name == name) {
                return Err(FlatpyError::exec(format!(
                    "{}() got an unexpected keyword argument `{name}`",
                    def.name
                )));
            }
            if locals.contains_key(&name) {
                return Err(FlatpyError::exec(format!(
                    "{}() got multiple values for argument `{name}`",
                    def.name
                )));
            }
            locals.insert(name, value);
        }
        for param in params {
            if locals.contains_key(&param.name) {
                continue;
            }
            match &param.default {
                Some(default) => {
                    let value = self.eval_expr(default, &mut Scope::Module)?;
                    locals.insert(param.name.clone(), value);
                }
                None => {
                    return Err(FlatpyError::exec(format!(
                        "{}() missing required argument `{}`",
                        def.name, param.name
                    )))
                }
            }
        }
        Ok(locals)
    }
}

fn literal_value(literal: &crate::shared::models::Literal) -> Value {
    use crate::shared::models::Literal;
    match literal {
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::Str(s) => Value::Str(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::None => Value::None,
    }
}

/// Python floor division: rounds toward negative infinity. `None` on
/// overflow (i64::MIN // -1).
fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    let r = a.checked_rem(b)?;
    if r != 0 && (a < 0) != (b < 0) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

/// Python modulo: result takes the sign of the divisor. The one
/// overflowing case (i64::MIN % -1) is 0.
fn py_mod(a: i64, b: i64) -> i64 {
    let r = a.checked_rem(b).unwrap_or(0);
    if r != 0 && (r < 0) != (b < 0) {
        r + b
    } else {
        r
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn apply_binop(op: BinOp, left: Value, right: Value) -> Result<Value> {
    match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            // Machine integers, not bignums: overflow is an error, never a panic
            let overflow = || FlatpyError::exec(format!("integer overflow in `{}`", op.symbol()));
            let result = match op {
                BinOp::Add => Value::Int(a.checked_add(b).ok_or_else(overflow)?),
                BinOp::Sub => Value::Int(a.checked_sub(b).ok_or_else(overflow)?),
                BinOp::Mul => Value::Int(a.checked_mul(b).ok_or_else(overflow)?),
                BinOp::Div => {
                    if b == 0 {
                        return Err(FlatpyError::exec("division by zero"));
                    }
                    Value::Float(a as f64 / b as f64)
                }
                BinOp::FloorDiv => {
                    if b == 0 {
                        return Err(FlatpyError::exec("integer division by zero"));
                    }
                    Value::Int(floor_div(a, b).ok_or_else(overflow)?)
                }
                BinOp::Mod => {
                    if b == 0 {
                        return Err(FlatpyError::exec("integer modulo by zero"));
                    }
                    Value::Int(py_mod(a, b))
                }
                BinOp::Pow => {
                    if b >= 0 {
                        let exponent = u32::try_from(b).map_err(|_| overflow())?;
                        Value::Int(a.checked_pow(exponent).ok_or_else(overflow)?)
                    } else {
                        Value::Float((a as f64).powf(b as f64))
                    }
                }
                BinOp::BitAnd => Value::Int(a & b),
                BinOp::BitOr => Value::Int(a | b),
                BinOp::BitXor => Value::Int(a ^ b),
                BinOp::LShift => {
                    let amount = u32::try_from(b)
                        .map_err(|_| FlatpyError::exec("negative shift count"))?;
                    Value::Int(a.checked_shl(amount).ok_or_else(overflow)?)
                }
                BinOp::RShift => {
                    let amount = u32::try_from(b)
                        .map_err(|_| FlatpyError::exec("negative shift count"))?;
                    Value::Int(a.checked_shr(amount).ok_or_else(overflow)?)
                }
            };
            Ok(result)
        }
        (Value::Str(a), Value::Str(b)) if op == BinOp::Add => Ok(Value::Str(format!("{a}{b}"))),
        (Value::Str(a), Value::Int(n)) if op == BinOp::Mul => {
            Ok(Value::Str(a.repeat((*n).max(0) as usize)))
        }
        (Value::List(a), Value::List(b)) if op == BinOp::Add => {
            let mut out = a.clone();
            out.extend(b.clone());
            Ok(Value::List(out))
        }
        _ => match (as_float(&left), as_float(&right)) {
            (Some(a), Some(b)) => {
                let result = match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => {
                        if b == 0.0 {
                            return Err(FlatpyError::exec("float division by zero"));
                        }
                        a / b
                    }
                    BinOp::FloorDiv => (a / b).floor(),
                    BinOp::Mod => {
                        let r = a % b;
                        if r != 0.0 && (r < 0.0) != (b < 0.0) {
                            r + b
                        } else {
                            r
                        }
                    }
                    BinOp::Pow => a.powf(b),
                    _ => {
                        return Err(FlatpyError::exec(format!(
                            "unsupported operand type(s) for {}: {} and {}",
                            op.symbol(),
                            left.type_name(),
                            right.type_name()
                        )))
                    }
                };
                Ok(Value::Float(result))
            }
            _ => Err(FlatpyError::exec(format!(
                "unsupported operand type(s) for {}: {} and {}",
                op.symbol(),
                left.type_name(),
                right.type_name()
            ))),
        },
    }
}

fn apply_unary(op: UnaryOp, operand: Value) -> Result<Value> {
    match (op, &operand) {
        (UnaryOp::Neg, Value::Int(i)) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| FlatpyError::exec("integer overflow in unary `-`")),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Pos, Value::Int(_) | Value::Float(_)) => Ok(operand),
        (UnaryOp::Invert, Value::Int(i)) => Ok(Value::Int(!i)),
        (UnaryOp::Not, _) => Ok(Value::Bool(!operand.is_truthy())),
        (op, other) => Err(FlatpyError::exec(format!(
            "bad operand type for unary {}: {}",
            op.symbol().trim(),
            other.type_name()
        ))),
    }
}

fn apply_compare(op: CmpOp, left: Value, right: Value) -> Result<Value> {
    let result = match op {
        CmpOp::Eq | CmpOp::Is => left == right,
        CmpOp::NotEq | CmpOp::IsNot => left != right,
        CmpOp::In | CmpOp::NotIn => {
            let contains = match (&left, &right) {
                (needle, Value::List(items)) | (needle, Value::Tuple(items)) => {
                    items.iter().any(|i| i == needle)
                }
                (Value::Str(needle), Value::Str(haystack)) => haystack.contains(needle),
                (_, other) => {
                    return Err(FlatpyError::exec(format!(
                        "argument of type {} is not iterable",
                        other.type_name()
                    )))
                }
            };
            if op == CmpOp::In {
                contains
            } else {
                !contains
            }
        }
        CmpOp::Lt | CmpOp::LtE | CmpOp::Gt | CmpOp::GtE => {
            let ordering = match (&left, &right) {
                (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
                _ => match (as_float(&left), as_float(&right)) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => None,
                },
            };
            let ordering = ordering.ok_or_else(|| {
                FlatpyError::exec(format!(
                    "'{}' not supported between instances of {} and {}",
                    op.symbol(),
                    left.type_name(),
                    right.type_name()
                ))
            })?;
            match op {
                CmpOp::Lt => ordering.is_lt(),
                CmpOp::LtE => ordering.is_le(),
                CmpOp::Gt => ordering.is_gt(),
                CmpOp::GtE => ordering.is_ge(),
                _ => unreachable!(),
            }
        }
    };
    Ok(Value::Bool(result))
}

fn apply_subscript(value: Value, index: Value) -> Result<Value> {
    let i = match index {
        Value::Int(i) => i,
        other => {
            return Err(FlatpyError::exec(format!(
                "indices must be integers, not {}",
                other.type_name()
            )))
        }
    };
    let pick = |len: usize| -> Result<usize> {
        let adjusted = if i < 0 { i + len as i64 } else { i };
        if adjusted < 0 || adjusted as usize >= len {
            return Err(FlatpyError::exec("index out of range"));
        }
        Ok(adjusted as usize)
    };
    match value {
        Value::List(items) | Value::Tuple(items) => {
            let index = pick(items.len())?;
            Ok(items[index].clone())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let index = pick(chars.len())?;
            Ok(Value::Str(chars[index].to_string()))
        }
        other => Err(FlatpyError::exec(format!(
            "{} object is not subscriptable",
            other.type_name()
        ))),
    }
}
