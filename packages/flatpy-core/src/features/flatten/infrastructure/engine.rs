//! Flattening Engine - nested expressions → three-address form
//!
//! Recursive per-kind rewrite that hoists every composite sub-expression
//! into a freshly named temporary, preserving left-to-right evaluation
//! order. New assignments are appended to the statement list of the
//! enclosing block, immediately before the statement they were derived
//! from. The temporary counter is engine-instance state and never resets
//! mid-pass.

use crate::config::DEFAULT_TEMP_PREFIX;
use crate::errors::{FlatpyError, Result};
use crate::features::flatten::domain::FlattenPass;
use crate::shared::models::{Expr, FunctionDef, Keyword, Program, Stmt};
use tracing::{debug, trace};

pub struct Flattener {
    temp_prefix: String,
    temp_counter: usize,
}

impl Default for Flattener {
    fn default() -> Self {
        Self::new(DEFAULT_TEMP_PREFIX)
    }
}

impl Flattener {
    pub fn new(temp_prefix: impl Into<String>) -> Self {
        Self {
            temp_prefix: temp_prefix.into(),
            temp_counter: 0,
        }
    }

    /// Number of temporaries generated so far by this engine instance.
    pub fn temp_count(&self) -> usize {
        self.temp_counter
    }

    /// Flatten a whole module. The input is cloned first: the caller's
    /// tree is never observed as mutated.
    pub fn flatten_program(&mut self, program: &Program) -> Result<Program> {
        let copy = program.clone();
        let body = self.flatten_block(copy.body)?;
        debug!(temporaries = self.temp_counter, "flattened program");
        Ok(Program { body })
    }

    /// Flatten one statement list, splicing generated assignments
    /// immediately before the statement they were hoisted out of.
    fn flatten_block(&mut self, body: Vec<Stmt>) -> Result<Vec<Stmt>> {
        let mut out = Vec::with_capacity(body.len());
        for stmt in body {
            self.flatten_stmt(stmt, &mut out)?;
        }
        Ok(out)
    }

    fn flatten_stmt(&mut self, stmt: Stmt, out: &mut Vec<Stmt>) -> Result<()> {
        match stmt {
            Stmt::Assign { targets, value } => self.flatten_assign(targets, value, out),
            Stmt::AnnAssign {
                target,
                annotation,
                value,
            } => match value {
                // Bare annotation, nothing to hoist
                None => {
                    out.push(Stmt::AnnAssign {
                        target,
                        annotation,
                        value: None,
                    });
                    Ok(())
                }
                Some(value) => {
                    let value = self.flatten_expr(value, out, true)?;
                    self.push_assign_with_detour(target, value, out);
                    Ok(())
                }
            },
            Stmt::AugAssign { target, op, value } => {
                // `target op= value` becomes `target = target op value`,
                // evaluating the target before the value
                let desugared = Expr::BinOp {
                    op,
                    left: Box::new(target.clone()),
                    right: Box::new(value),
                };
                let value = self.flatten_expr(desugared, out, true)?;
                self.push_assign_with_detour(target, value, out);
                Ok(())
            }
            Stmt::Return { value } => {
                let value = match value {
                    Some(value) => Some(self.flatten_expr(value, out, false)?),
                    None => None,
                };
                out.push(Stmt::Return { value });
                Ok(())
            }
            Stmt::Expr { value } => {
                // The top node of an expression statement needs no temporary
                let value = self.flatten_expr(value, out, true)?;
                out.push(Stmt::Expr { value });
                Ok(())
            }
            Stmt::FunctionDef(def) => {
                let FunctionDef {
                    name,
                    params,
                    body,
                    decorators,
                    returns,
                } = def;
                let mut flat_decorators = Vec::with_capacity(decorators.len());
                for decorator in decorators {
                    flat_decorators.push(self.flatten_expr(decorator, out, true)?);
                }
                // Nested block: fresh insertion target
                let body = self.flatten_block(body)?;
                out.push(Stmt::FunctionDef(FunctionDef {
                    name,
                    params,
                    body,
                    decorators: flat_decorators,
                    returns,
                }));
                Ok(())
            }
            Stmt::Pass => {
                out.push(Stmt::Pass);
                Ok(())
            }
            Stmt::Unsupported { kind } => Err(FlatpyError::unsupported(kind)),
        }
    }

    fn flatten_assign(&mut self, targets: Vec<Expr>, value: Expr, out: &mut Vec<Stmt>) -> Result<()> {
        if targets.is_empty() {
            return Err(FlatpyError::invariant("assignment statement without targets"));
        }
        let value = self.flatten_expr(value, out, true)?;

        if targets.len() == 1 && matches!(targets[0], Expr::Name(_)) {
            // The statement itself is the assignment; no extra hoist
            out.push(Stmt::Assign { targets, value });
            return Ok(());
        }

        // Multi-target or non-name targets: bind the value once to a
        // canonical holder, then fan the holder out to every target.
        let canonical = self.new_temp();
        let holder = canonical
            .as_name()
            .map(str::to_string)
            .ok_or_else(|| FlatpyError::invariant("canonical assignment holder is not a name"))?;
        out.push(Stmt::Assign {
            targets: vec![canonical],
            value,
        });
        for target in targets {
            out.push(Stmt::Assign {
                targets: vec![target],
                value: Expr::Name(holder.clone()),
            });
        }
        Ok(())
    }

    /// `target = value`, detouring through a temporary when the target is
    /// not a simple name.
    fn push_assign_with_detour(&mut self, target: Expr, value: Expr, out: &mut Vec<Stmt>) {
        if matches!(target, Expr::Name(_)) {
            out.push(Stmt::Assign {
                targets: vec![target],
                value,
            });
        } else {
            let temp = self.new_temp();
            out.push(Stmt::Assign {
                targets: vec![temp.clone()],
                value,
            });
            out.push(Stmt::Assign {
                targets: vec![target],
                value: temp,
            });
        }
    }

    /// Rewrite one expression. In direct mode the node itself is already
    /// the right-hand side of an assignment and is returned un-hoisted;
    /// otherwise any non-singleton result is bound to a fresh temporary.
    fn flatten_expr(&mut self, expr: Expr, stmts: &mut Vec<Stmt>, direct: bool) -> Result<Expr> {
        let rebuilt = match expr {
            // Singletons are identity: no statement emitted
            singleton @ (Expr::Name(_) | Expr::Constant(_) | Expr::FString(_)) => {
                return Ok(singleton)
            }
            Expr::Call {
                func,
                args,
                keywords,
            } => {
                let func = self.hoist(*func, stmts)?;
                let mut flat_args = Vec::with_capacity(args.len());
                for arg in args {
                    match arg {
                        // Keep the spread wrapper, hoist the inner value
                        Expr::Starred(inner) => {
                            flat_args.push(Expr::Starred(Box::new(self.hoist(*inner, stmts)?)));
                        }
                        other => flat_args.push(self.hoist(other, stmts)?),
                    }
                }
                let mut flat_keywords = Vec::with_capacity(keywords.len());
                for keyword in keywords {
                    flat_keywords.push(Keyword {
                        arg: keyword.arg,
                        value: self.hoist(keyword.value, stmts)?,
                    });
                }
                Expr::Call {
                    func: Box::new(func),
                    args: flat_args,
                    keywords: flat_keywords,
                }
            }
            Expr::BinOp { op, left, right } => Expr::BinOp {
                op,
                left: Box::new(self.hoist(*left, stmts)?),
                right: Box::new(self.hoist(*right, stmts)?),
            },
            Expr::UnaryOp { op, operand } => Expr::UnaryOp {
                op,
                operand: Box::new(self.hoist(*operand, stmts)?),
            },
            Expr::BoolOp { op, left, right } => Expr::BoolOp {
                op,
                left: Box::new(self.hoist(*left, stmts)?),
                right: Box::new(self.hoist(*right, stmts)?),
            },
            Expr::Compare { op, left, right } => Expr::Compare {
                op,
                left: Box::new(self.hoist(*left, stmts)?),
                right: Box::new(self.hoist(*right, stmts)?),
            },
            Expr::Attribute { value, attr } => Expr::Attribute {
                value: Box::new(self.hoist(*value, stmts)?),
                attr,
            },
            Expr::Subscript { value, index } => {
                let value = self.hoist(*value, stmts)?;
                // The index is flattened in place, not hoisted as a whole
                let index = self.flatten_expr(*index, stmts, true)?;
                Expr::Subscript {
                    value: Box::new(value),
                    index: Box::new(index),
                }
            }
            Expr::Starred(inner) => Expr::Starred(Box::new(self.hoist(*inner, stmts)?)),
            Expr::Tuple(items) => Expr::Tuple(self.hoist_items(items, stmts)?),
            Expr::List(items) => Expr::List(self.hoist_items(items, stmts)?),
        };
        if direct {
            Ok(rebuilt)
        } else {
            Ok(self.assign_temp(rebuilt, stmts))
        }
    }

    /// Hoist collection elements left to right, keeping spread wrappers
    /// in place and hoisting their inner values, as in call arguments.
    fn hoist_items(&mut self, items: Vec<Expr>, stmts: &mut Vec<Stmt>) -> Result<Vec<Expr>> {
        let mut flat = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Expr::Starred(inner) => {
                    flat.push(Expr::Starred(Box::new(self.hoist(*inner, stmts)?)));
                }
                other => flat.push(self.hoist(other, stmts)?),
            }
        }
        Ok(flat)
    }

    /// Normalize one operand: flatten it, then bind non-singleton results
    /// to a fresh temporary. This is the single primitive every composite
    /// handler uses.
    fn hoist(&mut self, expr: Expr, stmts: &mut Vec<Stmt>) -> Result<Expr> {
        let flat = self.flatten_expr(expr, stmts, true)?;
        if flat.is_singleton() {
            Ok(flat)
        } else {
            Ok(self.assign_temp(flat, stmts))
        }
    }

    fn assign_temp(&mut self, expr: Expr, stmts: &mut Vec<Stmt>) -> Expr {
        let temp = self.new_temp();
        trace!(kind = expr.kind_name(), temp = ?temp.as_name(), "hoisted into temporary");
        stmts.push(Stmt::Assign {
            targets: vec![temp.clone()],
            value: expr,
        });
        temp
    }

    /// Fresh, guaranteed-unique identifier node; pure counter increment.
    pub fn new_temp(&mut self) -> Expr {
        self.temp_counter += 1;
        Expr::Name(format!("{}{}", self.temp_prefix, self.temp_counter))
    }
}

impl FlattenPass for Flattener {
    fn run(&mut self, program: &Program) -> Result<Program> {
        self.flatten_program(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::bridge::infrastructure::python_parser::PythonParser;
    use crate::shared::models::Literal;
    use pretty_assertions::assert_eq;

    fn flatten_source(source: &str) -> Program {
        let mut parser = PythonParser::new().unwrap();
        let program = parser.parse(source).unwrap();
        Flattener::default().flatten_program(&program).unwrap()
    }

    fn is_atomic_operands(expr: &Expr) -> bool {
        let children: Vec<&Expr> = match expr {
            Expr::Call {
                func,
                args,
                keywords,
            } => {
                let mut v = vec![func.as_ref()];
                for a in args {
                    match a {
                        Expr::Starred(inner) => v.push(inner.as_ref()),
                        other => v.push(other),
                    }
                }
                v.extend(keywords.iter().map(|k| &k.value));
                v
            }
            Expr::BinOp { left, right, .. }
            | Expr::BoolOp { left, right, .. }
            | Expr::Compare { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expr::UnaryOp { operand, .. } => vec![operand.as_ref()],
            Expr::Attribute { value, .. } => vec![value.as_ref()],
            // The index is flattened in direct mode, so its top node may
            // itself stay composite; recurse instead
            Expr::Subscript { value, index } => {
                return value.is_singleton() && is_atomic_operands(index);
            }
            Expr::Starred(inner) => vec![inner.as_ref()],
            Expr::Tuple(items) | Expr::List(items) => items
                .iter()
                .map(|item| match item {
                    Expr::Starred(inner) => inner.as_ref(),
                    other => other,
                })
                .collect(),
            Expr::Name(_) | Expr::Constant(_) | Expr::FString(_) => return true,
        };
        children.iter().all(|c| c.is_singleton())
    }

    fn assert_block_atomic(body: &[Stmt]) {
        for stmt in body {
            match stmt {
                Stmt::Assign { value, .. } | Stmt::Expr { value } => {
                    assert!(
                        is_atomic_operands(value),
                        "non-atomic operands in {value:?}"
                    );
                }
                Stmt::Return { value: Some(value) } => {
                    assert!(value.is_singleton(), "return value not atomic: {value:?}");
                }
                Stmt::FunctionDef(def) => assert_block_atomic(&def.body),
                _ => {}
            }
        }
    }

    #[test]
    fn test_singleton_idempotence() {
        for source in ["x", "42", "\"s\""] {
            let flat = flatten_source(source);
            assert_eq!(flat.body.len(), 1, "no statements may be emitted for {source}");
            assert!(matches!(&flat.body[0], Stmt::Expr { value } if value.is_singleton()));
        }
    }

    #[test]
    fn test_order_preservation_for_nested_calls() {
        let flat = flatten_source("r = f(g(), h())");
        // g() result first, then h(), then the call bound to r
        assert_eq!(flat.body.len(), 3);
        match &flat.body[0] {
            Stmt::Assign { targets, value } => {
                assert_eq!(targets[0], Expr::Name("__flat_1".to_string()));
                assert!(matches!(value, Expr::Call { func, .. } if func.as_name() == Some("g")));
            }
            other => panic!("expected assign, got {other:?}"),
        }
        match &flat.body[1] {
            Stmt::Assign { targets, value } => {
                assert_eq!(targets[0], Expr::Name("__flat_2".to_string()));
                assert!(matches!(value, Expr::Call { func, .. } if func.as_name() == Some("h")));
            }
            other => panic!("expected assign, got {other:?}"),
        }
        match &flat.body[2] {
            Stmt::Assign { targets, value } => {
                assert_eq!(targets[0], Expr::Name("r".to_string()));
                match value {
                    Expr::Call { func, args, .. } => {
                        assert_eq!(func.as_name(), Some("f"));
                        assert_eq!(
                            args,
                            &vec![
                                Expr::Name("__flat_1".to_string()),
                                Expr::Name("__flat_2".to_string())
                            ]
                        );
                    }
                    other => panic!("expected call, got {other:?}"),
                }
            }
            other => panic!("expected assign, got {other:?}"),
        }
    }

    #[test]
    fn test_atomicity_of_deeply_nested_expression() {
        let flat = flatten_source("r = f(a + g(b * c), h(d)[e].attr)");
        assert_block_atomic(&flat.body);
    }

    #[test]
    fn test_temporary_uniqueness() {
        let mut parser = PythonParser::new().unwrap();
        let program = parser.parse("r = f(g(a + b), h(c * d), k())").unwrap();
        let mut flattener = Flattener::default();
        let flat = flattener.flatten_program(&program).unwrap();

        let mut seen = std::collections::HashSet::new();
        for stmt in &flat.body {
            if let Stmt::Assign { targets, .. } = stmt {
                if let Some(name) = targets[0].as_name() {
                    if name.starts_with("__flat_") {
                        assert!(seen.insert(name.to_string()), "temporary {name} reused");
                    }
                }
            }
        }
        assert_eq!(seen.len(), flattener.temp_count());
    }

    #[test]
    fn test_assignment_normalization_fan_out() {
        let flat = flatten_source("a = b = f(x)");
        // <t2> = f(x); a = <t2>; b = <t2> -- f evaluated exactly once
        assert_eq!(flat.body.len(), 3);
        let holder = match &flat.body[0] {
            Stmt::Assign { targets, value } => {
                assert!(matches!(value, Expr::Call { .. }));
                targets[0].as_name().unwrap().to_string()
            }
            other => panic!("expected assign, got {other:?}"),
        };
        assert!(holder.starts_with("__flat_"));
        assert_eq!(
            flat.body[1],
            Stmt::Assign {
                targets: vec![Expr::Name("a".to_string())],
                value: Expr::Name(holder.clone()),
            }
        );
        assert_eq!(
            flat.body[2],
            Stmt::Assign {
                targets: vec![Expr::Name("b".to_string())],
                value: Expr::Name(holder),
            }
        );
        // only one call survives
        let calls = flat
            .body
            .iter()
            .filter(|s| matches!(s, Stmt::Assign { value: Expr::Call { .. }, .. }))
            .count();
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_augmented_assign_desugaring() {
        let flat = flatten_source("x += y");
        assert_eq!(
            flat.body,
            vec![Stmt::Assign {
                targets: vec![Expr::Name("x".to_string())],
                value: Expr::BinOp {
                    op: crate::shared::models::BinOp::Add,
                    left: Box::new(Expr::Name("x".to_string())),
                    right: Box::new(Expr::Name("y".to_string())),
                },
            }]
        );
    }

    #[test]
    fn test_augmented_assign_hoists_composite_value() {
        let flat = flatten_source("x -= f(y)");
        assert_eq!(flat.body.len(), 2);
        assert!(
            matches!(&flat.body[0], Stmt::Assign { targets, value: Expr::Call { .. } }
                if targets[0].as_name() == Some("__flat_1"))
        );
        assert!(matches!(&flat.body[1], Stmt::Assign { targets, value: Expr::BinOp { .. } }
            if targets[0].as_name() == Some("x")));
    }

    #[test]
    fn test_ann_assign_becomes_plain_assign() {
        let flat = flatten_source("x: int = f(y)");
        assert_eq!(flat.body.len(), 1);
        assert!(matches!(&flat.body[0], Stmt::Assign { targets, value: Expr::Call { .. } }
            if targets[0].as_name() == Some("x")));
    }

    #[test]
    fn test_return_value_is_hoisted() {
        let flat = flatten_source("def diff(a, b):\n    return abs(a - b)\n");
        let def = match &flat.body[0] {
            Stmt::FunctionDef(def) => def,
            other => panic!("expected function, got {other:?}"),
        };
        // t1 = a - b; t2 = abs(t1); return t2
        assert_eq!(def.body.len(), 3);
        assert!(matches!(&def.body[0], Stmt::Assign { value: Expr::BinOp { .. }, .. }));
        assert!(matches!(&def.body[1], Stmt::Assign { value: Expr::Call { .. }, .. }));
        assert!(matches!(&def.body[2], Stmt::Return { value: Some(v) } if v.is_singleton()));
    }

    #[test]
    fn test_nested_block_gets_its_own_insertion_target() {
        let flat = flatten_source("def f(a):\n    return g(h(a))\nr = k(m())\n");
        // module-level hoists stay at module level, function hoists inside
        let def = match &flat.body[0] {
            Stmt::FunctionDef(def) => def,
            other => panic!("expected function, got {other:?}"),
        };
        assert!(def.body.len() >= 2);
        assert!(flat.body.len() >= 2);
        assert_block_atomic(&flat.body);
    }

    #[test]
    fn test_subscript_base_hoisted_index_flattened() {
        let flat = flatten_source("r = f(a)[g(i) + 1]");
        assert_block_atomic(&flat.body);
        // final statement keeps the subscript inline on the RHS
        assert!(matches!(
            flat.body.last().unwrap(),
            Stmt::Assign { value: Expr::Subscript { .. }, .. }
        ));
    }

    #[test]
    fn test_starred_argument_wrapper_is_kept() {
        let flat = flatten_source("r = f(*g(xs))");
        let last = flat.body.last().unwrap();
        match last {
            Stmt::Assign { value: Expr::Call { args, .. }, .. } => match &args[0] {
                Expr::Starred(inner) => assert!(inner.is_singleton()),
                other => panic!("expected starred arg, got {other:?}"),
            },
            other => panic!("expected call assign, got {other:?}"),
        }
    }

    #[test]
    fn test_starred_list_element_wrapper_is_kept() {
        // `*rest` must survive as a spread element, never be bound whole
        let flat = flatten_source("xs = [1, *rest]");
        assert_eq!(flat.body.len(), 1);
        match &flat.body[0] {
            Stmt::Assign { value: Expr::List(items), .. } => {
                assert_eq!(
                    items[1],
                    Expr::Starred(Box::new(Expr::Name("rest".to_string())))
                );
            }
            other => panic!("expected list assign, got {other:?}"),
        }
    }

    #[test]
    fn test_starred_collection_element_hoists_inner_value() {
        let flat = flatten_source("xs = (1, *g(ys))");
        assert_eq!(flat.body.len(), 2);
        assert!(matches!(
            &flat.body[0],
            Stmt::Assign { targets, value: Expr::Call { .. } }
                if targets[0] == Expr::Name("__flat_1".to_string())
        ));
        match &flat.body[1] {
            Stmt::Assign { value: Expr::Tuple(items), .. } => {
                assert_eq!(
                    items[1],
                    Expr::Starred(Box::new(Expr::Name("__flat_1".to_string())))
                );
            }
            other => panic!("expected tuple assign, got {other:?}"),
        }
        assert_block_atomic(&flat.body);
    }

    #[test]
    fn test_keyword_argument_values_hoisted() {
        let flat = flatten_source("r = f(k=g(x))");
        match flat.body.last().unwrap() {
            Stmt::Assign { value: Expr::Call { keywords, .. }, .. } => {
                assert_eq!(keywords[0].arg, "k");
                assert!(keywords[0].value.is_singleton());
            }
            other => panic!("expected call assign, got {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_control_flow_fails_fast() {
        let mut parser = PythonParser::new().unwrap();
        let program = parser.parse("if x:\n    y = 1\n").unwrap();
        let err = Flattener::default().flatten_program(&program).unwrap_err();
        match err {
            FlatpyError::Unsupported(kind) => assert!(kind.contains("if_statement")),
            other => panic!("expected unsupported construct, got {other:?}"),
        }
    }

    #[test]
    fn test_original_program_not_mutated() {
        let mut parser = PythonParser::new().unwrap();
        let program = parser.parse("r = f(g())").unwrap();
        let before = program.clone();
        let _ = Flattener::default().flatten_program(&program).unwrap();
        assert_eq!(program, before);
    }

    #[test]
    fn test_counter_is_monotonic_across_calls() {
        let mut flattener = Flattener::default();
        let first = flattener.new_temp();
        let second = flattener.new_temp();
        assert_eq!(first.as_name(), Some("__flat_1"));
        assert_eq!(second.as_name(), Some("__flat_2"));
    }

    #[test]
    fn test_constant_operands_stay_inline() {
        let flat = flatten_source("r = 1 + 2");
        assert_eq!(
            flat.body,
            vec![Stmt::Assign {
                targets: vec![Expr::Name("r".to_string())],
                value: Expr::BinOp {
                    op: crate::shared::models::BinOp::Add,
                    left: Box::new(Expr::Constant(Literal::Int(1))),
                    right: Box::new(Expr::Constant(Literal::Int(2))),
                },
            }]
        );
    }
}
