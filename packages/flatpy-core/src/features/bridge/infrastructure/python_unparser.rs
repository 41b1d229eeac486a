//! Python unparser - AST model → source text
//!
//! Emits four-space indented Python. Composite operands of operator
//! nodes are parenthesized conservatively; after flattening almost all
//! operands are atomic and the output stays flat.

use crate::errors::{FlatpyError, Result};
use crate::shared::models::{Expr, FunctionDef, Literal, Param, Program, Stmt};

pub struct PythonUnparser;

impl Default for PythonUnparser {
    fn default() -> Self {
        Self
    }
}

impl PythonUnparser {
    pub fn new() -> Self {
        Self
    }

    pub fn unparse(&self, program: &Program) -> Result<String> {
        let mut out = String::new();
        for stmt in &program.body {
            self.emit_stmt(stmt, 0, &mut out)?;
        }
        Ok(out)
    }

    fn emit_stmt(&self, stmt: &Stmt, level: usize, out: &mut String) -> Result<()> {
        let pad = "    ".repeat(level);
        match stmt {
            Stmt::FunctionDef(def) => self.emit_function(def, level, out)?,
            Stmt::Assign { targets, value } => {
                out.push_str(&pad);
                for target in targets {
                    out.push_str(&self.emit_expr(target));
                    out.push_str(" = ");
                }
                out.push_str(&self.emit_expr(value));
                out.push('\n');
            }
            Stmt::AnnAssign {
                target,
                annotation,
                value,
            } => {
                out.push_str(&pad);
                out.push_str(&self.emit_expr(target));
                out.push_str(": ");
                out.push_str(&self.emit_expr(annotation));
                if let Some(value) = value {
                    out.push_str(" = ");
                    out.push_str(&self.emit_expr(value));
                }
                out.push('\n');
            }
            Stmt::AugAssign { target, op, value } => {
                out.push_str(&pad);
                out.push_str(&self.emit_expr(target));
                out.push(' ');
                out.push_str(op.symbol());
                out.push_str("= ");
                out.push_str(&self.emit_expr(value));
                out.push('\n');
            }
            Stmt::Return { value } => {
                out.push_str(&pad);
                out.push_str("return");
                if let Some(value) = value {
                    out.push(' ');
                    out.push_str(&self.emit_expr(value));
                }
                out.push('\n');
            }
            Stmt::Expr { value } => {
                out.push_str(&pad);
                out.push_str(&self.emit_expr(value));
                out.push('\n');
            }
            Stmt::Pass => {
                out.push_str(&pad);
                out.push_str("pass\n");
            }
            Stmt::Unsupported { kind } => {
                return Err(FlatpyError::unsupported(kind.clone()));
            }
        }
        Ok(())
    }

    fn emit_function(&self, def: &FunctionDef, level: usize, out: &mut String) -> Result<()> {
        let pad = "    ".repeat(level);
        for decorator in &def.decorators {
            out.push_str(&pad);
            out.push('@');
            out.push_str(&self.emit_expr(decorator));
            out.push('\n');
        }
        out.push_str(&pad);
        out.push_str("def ");
        out.push_str(&def.name);
        out.push('(');
        let params: Vec<String> = def.params.iter().map(|p| self.emit_param(p)).collect();
        out.push_str(&params.join(", "));
        out.push(')');
        if let Some(returns) = &def.returns {
            out.push_str(" -> ");
            out.push_str(&self.emit_expr(returns));
        }
        out.push_str(":\n");
        if def.body.is_empty() {
            out.push_str(&"    ".repeat(level + 1));
            out.push_str("pass\n");
        } else {
            for stmt in &def.body {
                self.emit_stmt(stmt, level + 1, out)?;
            }
        }
        Ok(())
    }

    fn emit_param(&self, param: &Param) -> String {
        let mut s = param.name.clone();
        if let Some(annotation) = &param.annotation {
            s.push_str(": ");
            s.push_str(&self.emit_expr(annotation));
        }
        if let Some(default) = &param.default {
            s.push_str(if param.annotation.is_some() { " = " } else { "=" });
            s.push_str(&self.emit_expr(default));
        }
        s
    }

    /// Wrap operator operands that would otherwise change precedence.
    fn emit_operand(&self, expr: &Expr) -> String {
        match expr {
            Expr::BinOp { .. }
            | Expr::BoolOp { .. }
            | Expr::Compare { .. }
            | Expr::UnaryOp { .. } => format!("({})", self.emit_expr(expr)),
            _ => self.emit_expr(expr),
        }
    }

    fn emit_expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::Name(name) => name.clone(),
            Expr::Constant(literal) => emit_literal(literal),
            Expr::FString(raw) => raw.clone(),
            Expr::Call {
                func,
                args,
                keywords,
            } => {
                let mut parts: Vec<String> = args.iter().map(|a| self.emit_expr(a)).collect();
                parts.extend(
                    keywords
                        .iter()
                        .map(|k| format!("{}={}", k.arg, self.emit_expr(&k.value))),
                );
                format!("{}({})", self.emit_operand(func), parts.join(", "))
            }
            Expr::BinOp { op, left, right } => format!(
                "{} {} {}",
                self.emit_operand(left),
                op.symbol(),
                self.emit_operand(right)
            ),
            Expr::UnaryOp { op, operand } => {
                format!("{}{}", op.symbol(), self.emit_operand(operand))
            }
            Expr::BoolOp { op, left, right } => format!(
                "{} {} {}",
                self.emit_operand(left),
                op.symbol(),
                self.emit_operand(right)
            ),
            Expr::Compare { op, left, right } => format!(
                "{} {} {}",
                self.emit_operand(left),
                op.symbol(),
                self.emit_operand(right)
            ),
            Expr::Attribute { value, attr } => {
                format!("{}.{}", self.emit_operand(value), attr)
            }
            Expr::Subscript { value, index } => {
                format!("{}[{}]", self.emit_operand(value), self.emit_expr(index))
            }
            Expr::Starred(inner) => format!("*{}", self.emit_operand(inner)),
            Expr::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(|i| self.emit_expr(i)).collect();
                if parts.len() == 1 {
                    format!("({},)", parts[0])
                } else {
                    format!("({})", parts.join(", "))
                }
            }
            Expr::List(items) => {
                let parts: Vec<String> = items.iter().map(|i| self.emit_expr(i)).collect();
                format!("[{}]", parts.join(", "))
            }
        }
    }
}

fn emit_literal(literal: &Literal) -> String {
    match literal {
        Literal::Int(value) => value.to_string(),
        Literal::Float(value) => {
            if value.fract() == 0.0 && value.is_finite() {
                format!("{value:.1}")
            } else {
                value.to_string()
            }
        }
        Literal::Str(value) => {
            let mut s = String::with_capacity(value.len() + 2);
            s.push('"');
            for c in value.chars() {
                match c {
                    '\\' => s.push_str("\\\\"),
                    '"' => s.push_str("\\\""),
                    '\n' => s.push_str("\\n"),
                    '\t' => s.push_str("\\t"),
                    '\r' => s.push_str("\\r"),
                    other => s.push(other),
                }
            }
            s.push('"');
            s
        }
        Literal::Bool(true) => "True".to_string(),
        Literal::Bool(false) => "False".to_string(),
        Literal::None => "None".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::bridge::infrastructure::python_parser::PythonParser;
    use pretty_assertions::assert_eq;

    fn round_trip(source: &str) -> String {
        let program = PythonParser::new().unwrap().parse(source).unwrap();
        PythonUnparser::new().unparse(&program).unwrap()
    }

    #[test]
    fn test_function_with_return() {
        assert_eq!(
            round_trip("def diff(a, b):\n    return abs(a - b)\n"),
            "def diff(a, b):\n    return abs(a - b)\n"
        );
    }

    #[test]
    fn test_chained_assignment() {
        assert_eq!(round_trip("a = b = f(x)\n"), "a = b = f(x)\n");
    }

    #[test]
    fn test_augmented_assignment() {
        assert_eq!(round_trip("x += y\n"), "x += y\n");
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(round_trip("s = \"a\\nb\"\n"), "s = \"a\\nb\"\n");
    }

    #[test]
    fn test_nested_operators_are_parenthesized() {
        let program = PythonParser::new().unwrap().parse("r = a * (b + c)").unwrap();
        let text = PythonUnparser::new().unparse(&program).unwrap();
        assert_eq!(text, "r = a * (b + c)\n");
    }

    #[test]
    fn test_call_with_keywords_and_splat() {
        assert_eq!(round_trip("f(x, *rest, k=1)\n"), "f(x, *rest, k=1)\n");
    }

    #[test]
    fn test_float_keeps_decimal_point() {
        assert_eq!(round_trip("x = 7.0\n"), "x = 7.0\n");
    }

    #[test]
    fn test_unsupported_statement_is_an_error() {
        let program = PythonParser::new().unwrap().parse("import os\n").unwrap();
        let err = PythonUnparser::new().unparse(&program).unwrap_err();
        assert!(matches!(err, FlatpyError::Unsupported(_)));
    }
}
