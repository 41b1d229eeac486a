//! Python parser - tree-sitter CST → AST model
//!
//! Recursive descent over the tree-sitter grammar, dispatching on node
//! kind strings and extracting children by field name. Statement kinds
//! outside the modeled subset become `Stmt::Unsupported` so the engine
//! can fail with the offending kind; expression kinds outside the subset
//! are rejected here.

use crate::errors::{FlatpyError, Result};
use crate::shared::models::{
    BinOp, BoolOp, CmpOp, Expr, FunctionDef, Keyword, Literal, Param, Program, Stmt, UnaryOp,
};
use tracing::debug;
use tree_sitter::{Node, Parser, Tree};

pub struct PythonParser {
    parser: Parser,
}

fn node_text<'s>(node: Node, source: &'s str) -> &'s str {
    &source[node.byte_range()]
}

fn field<'t>(node: Node<'t>, name: &str) -> Result<Node<'t>> {
    node.child_by_field_name(name).ok_or_else(|| {
        FlatpyError::parse(format!("`{}` node is missing its `{name}` field", node.kind()))
    })
}

impl PythonParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_python::language();
        parser
            .set_language(&language.into())
            .map_err(|e| FlatpyError::parse(format!("failed to set Python language: {e}")))?;
        Ok(Self { parser })
    }

    fn parse_tree(&mut self, source: &str) -> Result<Tree> {
        self.parser
            .parse(source, None)
            .ok_or_else(|| FlatpyError::parse("failed to parse Python code"))
    }

    /// Parse source text into a `Program`. Syntax errors are fatal; no
    /// partial tree is produced.
    pub fn parse(&mut self, source: &str) -> Result<Program> {
        let tree = self.parse_tree(source)?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(FlatpyError::parse("source text contains syntax errors"));
        }

        let mut body = Vec::new();
        for child in root.children(&mut root.walk()) {
            if !child.is_named() || child.kind() == "comment" {
                continue;
            }
            body.push(self.parse_stmt(child, source)?);
        }
        debug!(statements = body.len(), "parsed module");
        Ok(Program { body })
    }

    fn parse_block(&mut self, node: Node, source: &str) -> Result<Vec<Stmt>> {
        let mut body = Vec::new();
        for child in node.children(&mut node.walk()) {
            if !child.is_named() || child.kind() == "comment" {
                continue;
            }
            body.push(self.parse_stmt(child, source)?);
        }
        Ok(body)
    }

    fn parse_stmt(&mut self, node: Node, source: &str) -> Result<Stmt> {
        match node.kind() {
            "expression_statement" => {
                let inner = node
                    .named_children(&mut node.walk())
                    .find(|c| c.kind() != "comment")
                    .ok_or_else(|| FlatpyError::parse("empty expression statement"))?;
                match inner.kind() {
                    "assignment" => self.parse_assignment(inner, source),
                    "augmented_assignment" => self.parse_augmented_assignment(inner, source),
                    _ => Ok(Stmt::Expr {
                        value: self.parse_expr(inner, source)?,
                    }),
                }
            }
            "function_definition" => {
                Ok(Stmt::FunctionDef(self.parse_function(node, source, Vec::new())?))
            }
            "decorated_definition" => self.parse_decorated(node, source),
            "return_statement" => {
                let value = node
                    .named_children(&mut node.walk())
                    .find(|c| c.kind() != "comment")
                    .map(|c| self.parse_expr(c, source))
                    .transpose()?;
                Ok(Stmt::Return { value })
            }
            "pass_statement" => Ok(Stmt::Pass),
            // Control flow, imports, classes: carried through for the
            // engine to reject with the offending kind
            kind => Ok(Stmt::Unsupported {
                kind: kind.to_string(),
            }),
        }
    }

    fn parse_decorated(&mut self, node: Node, source: &str) -> Result<Stmt> {
        let mut decorators = Vec::new();
        for child in node.named_children(&mut node.walk()) {
            if child.kind() == "decorator" {
                let inner = child
                    .named_children(&mut child.walk())
                    .next()
                    .ok_or_else(|| FlatpyError::parse("empty decorator"))?;
                decorators.push(self.parse_expr(inner, source)?);
            }
        }
        let definition = field(node, "definition")?;
        match definition.kind() {
            "function_definition" => {
                Ok(Stmt::FunctionDef(self.parse_function(definition, source, decorators)?))
            }
            kind => Ok(Stmt::Unsupported {
                kind: kind.to_string(),
            }),
        }
    }

    fn parse_function(
        &mut self,
        node: Node,
        source: &str,
        decorators: Vec<Expr>,
    ) -> Result<FunctionDef> {
        let name = node_text(field(node, "name")?, source).to_string();
        let params = self.parse_parameters(field(node, "parameters")?, source)?;
        let returns = node
            .child_by_field_name("return_type")
            .map(|n| self.parse_type(n, source))
            .transpose()?;
        let body = self.parse_block(field(node, "body")?, source)?;
        Ok(FunctionDef {
            name,
            params,
            body,
            decorators,
            returns,
        })
    }

    /// Annotation positions carry a `type` wrapper node around the actual
    /// expression; unwrap it before descending.
    fn parse_type(&mut self, node: Node, source: &str) -> Result<Expr> {
        let inner = node
            .named_children(&mut node.walk())
            .find(|c| c.kind() != "comment")
            .ok_or_else(|| FlatpyError::parse("empty type annotation"))?;
        self.parse_expr(inner, source)
    }

    fn parse_parameters(&mut self, node: Node, source: &str) -> Result<Vec<Param>> {
        let mut params = Vec::new();
        for child in node.named_children(&mut node.walk()) {
            match child.kind() {
                "comment" => {}
                "identifier" => params.push(Param::new(node_text(child, source))),
                "typed_parameter" => {
                    let name = child
                        .named_children(&mut child.walk())
                        .find(|c| c.kind() == "identifier")
                        .ok_or_else(|| FlatpyError::parse("typed parameter without a name"))?;
                    let annotation = self.parse_type(field(child, "type")?, source)?;
                    params.push(Param {
                        name: node_text(name, source).to_string(),
                        annotation: Some(annotation),
                        default: None,
                    });
                }
                "default_parameter" => {
                    let name = node_text(field(child, "name")?, source).to_string();
                    let default = self.parse_expr(field(child, "value")?, source)?;
                    params.push(Param {
                        name,
                        annotation: None,
                        default: Some(default),
                    });
                }
                "typed_default_parameter" => {
                    let name = node_text(field(child, "name")?, source).to_string();
                    let annotation = self.parse_type(field(child, "type")?, source)?;
                    let default = self.parse_expr(field(child, "value")?, source)?;
                    params.push(Param {
                        name,
                        annotation: Some(annotation),
                        default: Some(default),
                    });
                }
                kind => return Err(FlatpyError::unsupported(format!("parameter kind `{kind}`"))),
            }
        }
        Ok(params)
    }

    /// Assignments arrive right-nested for chains (`a = b = v`); collect
    /// every left-hand side into one multi-target statement. A `type`
    /// field marks the annotated form.
    fn parse_assignment(&mut self, node: Node, source: &str) -> Result<Stmt> {
        let mut targets = Vec::new();
        let mut current = node;
        loop {
            let left = field(current, "left")?;
            let target = self.parse_target(left, source)?;

            if let Some(annotation) = current.child_by_field_name("type") {
                if !targets.is_empty() {
                    return Err(FlatpyError::parse("annotation inside a chained assignment"));
                }
                let annotation = self.parse_type(annotation, source)?;
                let value = current
                    .child_by_field_name("right")
                    .map(|n| self.parse_expr(n, source))
                    .transpose()?;
                return Ok(Stmt::AnnAssign {
                    target,
                    annotation,
                    value,
                });
            }

            targets.push(target);
            let right = field(current, "right")?;
            if right.kind() == "assignment" {
                current = right;
                continue;
            }
            let value = self.parse_expr(right, source)?;
            return Ok(Stmt::Assign { targets, value });
        }
    }

    fn parse_augmented_assignment(&mut self, node: Node, source: &str) -> Result<Stmt> {
        let target = self.parse_target(field(node, "left")?, source)?;
        let op_text = node_text(field(node, "operator")?, source);
        let op = op_text
            .strip_suffix('=')
            .and_then(BinOp::from_symbol)
            .ok_or_else(|| {
                FlatpyError::parse(format!("unknown augmented assignment operator `{op_text}`"))
            })?;
        let value = self.parse_expr(field(node, "right")?, source)?;
        Ok(Stmt::AugAssign { target, op, value })
    }

    fn parse_target(&mut self, node: Node, source: &str) -> Result<Expr> {
        match node.kind() {
            "pattern_list" | "tuple_pattern" => {
                let mut items = Vec::new();
                for child in node.named_children(&mut node.walk()) {
                    if child.kind() == "comment" {
                        continue;
                    }
                    items.push(self.parse_target(child, source)?);
                }
                Ok(Expr::Tuple(items))
            }
            _ => self.parse_expr(node, source),
        }
    }

    fn parse_expr(&mut self, node: Node, source: &str) -> Result<Expr> {
        match node.kind() {
            "identifier" => Ok(Expr::Name(node_text(node, source).to_string())),
            "integer" => Ok(Expr::Constant(Literal::Int(parse_int(node_text(node, source))?))),
            "float" => {
                let text = node_text(node, source).replace('_', "");
                let value = text.parse::<f64>().map_err(|e| {
                    FlatpyError::parse(format!("invalid float literal `{text}`: {e}"))
                })?;
                Ok(Expr::Constant(Literal::Float(value)))
            }
            "true" => Ok(Expr::Constant(Literal::Bool(true))),
            "false" => Ok(Expr::Constant(Literal::Bool(false))),
            "none" => Ok(Expr::Constant(Literal::None)),
            "string" => parse_string(node_text(node, source)),
            "binary_operator" => {
                let op_text = node_text(field(node, "operator")?, source);
                let op = BinOp::from_symbol(op_text).ok_or_else(|| {
                    FlatpyError::parse(format!("unknown binary operator `{op_text}`"))
                })?;
                Ok(Expr::BinOp {
                    op,
                    left: Box::new(self.parse_expr(field(node, "left")?, source)?),
                    right: Box::new(self.parse_expr(field(node, "right")?, source)?),
                })
            }
            "boolean_operator" => {
                let op = match node_text(field(node, "operator")?, source) {
                    "and" => BoolOp::And,
                    "or" => BoolOp::Or,
                    other => {
                        return Err(FlatpyError::parse(format!("unknown boolean operator `{other}`")))
                    }
                };
                Ok(Expr::BoolOp {
                    op,
                    left: Box::new(self.parse_expr(field(node, "left")?, source)?),
                    right: Box::new(self.parse_expr(field(node, "right")?, source)?),
                })
            }
            "not_operator" => Ok(Expr::UnaryOp {
                op: UnaryOp::Not,
                operand: Box::new(self.parse_expr(field(node, "argument")?, source)?),
            }),
            "unary_operator" => {
                let op = match node_text(field(node, "operator")?, source) {
                    "-" => UnaryOp::Neg,
                    "+" => UnaryOp::Pos,
                    "~" => UnaryOp::Invert,
                    other => {
                        return Err(FlatpyError::parse(format!("unknown unary operator `{other}`")))
                    }
                };
                Ok(Expr::UnaryOp {
                    op,
                    operand: Box::new(self.parse_expr(field(node, "argument")?, source)?),
                })
            }
            "comparison_operator" => self.parse_comparison(node, source),
            "call" => self.parse_call(node, source),
            "attribute" => Ok(Expr::Attribute {
                value: Box::new(self.parse_expr(field(node, "object")?, source)?),
                attr: node_text(field(node, "attribute")?, source).to_string(),
            }),
            "subscript" => {
                let value = self.parse_expr(field(node, "value")?, source)?;
                let index_node = field(node, "subscript")?;
                if index_node.kind() == "slice" {
                    return Err(FlatpyError::unsupported("slice"));
                }
                Ok(Expr::Subscript {
                    value: Box::new(value),
                    index: Box::new(self.parse_expr(index_node, source)?),
                })
            }
            "parenthesized_expression" => {
                let inner = node
                    .named_children(&mut node.walk())
                    .find(|c| c.kind() != "comment")
                    .ok_or_else(|| FlatpyError::parse("empty parenthesized expression"))?;
                self.parse_expr(inner, source)
            }
            "tuple" | "expression_list" => {
                Ok(Expr::Tuple(self.parse_elements(node, source)?))
            }
            "list" => Ok(Expr::List(self.parse_elements(node, source)?)),
            "list_splat" | "list_splat_pattern" => {
                let inner = node
                    .named_children(&mut node.walk())
                    .next()
                    .ok_or_else(|| FlatpyError::parse("empty splat"))?;
                Ok(Expr::Starred(Box::new(self.parse_expr(inner, source)?)))
            }
            kind => Err(FlatpyError::unsupported(kind)),
        }
    }

    fn parse_elements(&mut self, node: Node, source: &str) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        for child in node.named_children(&mut node.walk()) {
            if child.kind() == "comment" {
                continue;
            }
            items.push(self.parse_expr(child, source)?);
        }
        Ok(items)
    }

    fn parse_comparison(&mut self, node: Node, source: &str) -> Result<Expr> {
        let operators: Vec<Node> = node
            .children_by_field_name("operators", &mut node.walk())
            .collect();
        if operators.len() != 1 {
            return Err(FlatpyError::unsupported("chained comparison"));
        }
        let op_text = node_text(operators[0], source);
        let op = CmpOp::from_symbol(op_text)
            .ok_or_else(|| FlatpyError::parse(format!("unknown comparison operator `{op_text}`")))?;

        // Operands are the named children that are not the operator tokens
        let operator_ranges: Vec<_> = operators.iter().map(|n| n.byte_range()).collect();
        let operands: Vec<Node> = node
            .named_children(&mut node.walk())
            .filter(|c| c.kind() != "comment" && !operator_ranges.contains(&c.byte_range()))
            .collect();
        if operands.len() != 2 {
            return Err(FlatpyError::unsupported("chained comparison"));
        }
        Ok(Expr::Compare {
            op,
            left: Box::new(self.parse_expr(operands[0], source)?),
            right: Box::new(self.parse_expr(operands[1], source)?),
        })
    }

    fn parse_call(&mut self, node: Node, source: &str) -> Result<Expr> {
        let func = self.parse_expr(field(node, "function")?, source)?;
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        let arguments = field(node, "arguments")?;
        for child in arguments.named_children(&mut arguments.walk()) {
            match child.kind() {
                "comment" => {}
                "keyword_argument" => {
                    let arg = node_text(field(child, "name")?, source).to_string();
                    let value = self.parse_expr(field(child, "value")?, source)?;
                    keywords.push(Keyword { arg, value });
                }
                "list_splat" => {
                    let inner = child
                        .named_children(&mut child.walk())
                        .next()
                        .ok_or_else(|| FlatpyError::parse("empty splat argument"))?;
                    args.push(Expr::Starred(Box::new(self.parse_expr(inner, source)?)));
                }
                "dictionary_splat" => return Err(FlatpyError::unsupported("dictionary_splat")),
                _ => args.push(self.parse_expr(child, source)?),
            }
        }
        Ok(Expr::Call {
            func: Box::new(func),
            args,
            keywords,
        })
    }
}

fn parse_int(text: &str) -> Result<i64> {
    let cleaned = text.replace('_', "");
    let lower = cleaned.to_ascii_lowercase();
    let parsed = if let Some(hex) = lower.strip_prefix("0x") {
        i64::from_str_radix(hex, 16)
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i64::from_str_radix(oct, 8)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i64::from_str_radix(bin, 2)
    } else {
        cleaned.parse()
    };
    parsed.map_err(|e| FlatpyError::parse(format!("invalid integer literal `{text}`: {e}")))
}

/// Split a string literal lexeme into prefix, quote and body, then decode.
/// Interpolated strings are kept whole as `FString` singletons.
fn parse_string(lexeme: &str) -> Result<Expr> {
    let quote_pos = lexeme
        .find(['\'', '"'])
        .ok_or_else(|| FlatpyError::parse(format!("malformed string literal `{lexeme}`")))?;
    let prefix = lexeme[..quote_pos].to_ascii_lowercase();
    if prefix.contains('f') {
        return Ok(Expr::FString(lexeme.to_string()));
    }
    if prefix.contains('b') {
        return Err(FlatpyError::unsupported("bytes literal"));
    }

    let rest = &lexeme[quote_pos..];
    let quote_char = rest.chars().next().unwrap();
    let quote_len = if rest.len() >= 6 && rest.starts_with(&quote_char.to_string().repeat(3)) {
        3
    } else {
        1
    };
    if rest.len() < 2 * quote_len {
        return Err(FlatpyError::parse(format!("malformed string literal `{lexeme}`")));
    }
    let body = &rest[quote_len..rest.len() - quote_len];

    if prefix.contains('r') {
        return Ok(Expr::Constant(Literal::Str(body.to_string())));
    }
    Ok(Expr::Constant(Literal::Str(unescape(body))))
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
