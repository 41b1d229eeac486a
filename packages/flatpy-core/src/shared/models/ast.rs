//! AST model for the flattening pipeline
//!
//! A closed tagged-variant representation of the Python subset the engine
//! rewrites. Kinds the engine has no rewrite rule for are carried as
//! `Stmt::Unsupported` so the pass can fail fast with the offending kind
//! instead of silently miscompiling.

use serde::{Deserialize, Serialize};

/// A parsed module: the top-level statement list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub body: Vec<Stmt>,
}

/// Binary operators, including the bitwise and shift families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    LShift,
    RShift,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::LShift => "<<",
            BinOp::RShift => ">>",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "//" => BinOp::FloorDiv,
            "%" => BinOp::Mod,
            "**" => BinOp::Pow,
            "&" => BinOp::BitAnd,
            "|" => BinOp::BitOr,
            "^" => BinOp::BitXor,
            "<<" => BinOp::LShift,
            ">>" => BinOp::RShift,
            _ => return None,
        };
        Some(op)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Pos,
    Invert,
    Not,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::Invert => "~",
            UnaryOp::Not => "not ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOp {
    And,
    Or,
}

impl BoolOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BoolOp::And => "and",
            BoolOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CmpOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "==" => CmpOp::Eq,
            "!=" | "<>" => CmpOp::NotEq,
            "<" => CmpOp::Lt,
            "<=" => CmpOp::LtE,
            ">" => CmpOp::Gt,
            ">=" => CmpOp::GtE,
            "is" => CmpOp::Is,
            "is not" => CmpOp::IsNot,
            "in" => CmpOp::In,
            "not in" => CmpOp::NotIn,
            _ => return None,
        };
        Some(op)
    }
}

/// Literal constants (42, 1.5, "s", True, None)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
}

/// A keyword argument at a call site (`f(key=value)`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub arg: String,
    pub value: Expr,
}

/// Expression nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Name reference (singleton)
    Name(String),
    /// Literal constant (singleton)
    Constant(Literal),
    /// String-interpolation literal, kept as its raw lexeme (singleton)
    FString(String),
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    BinOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    BoolOp {
        op: BoolOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Compare {
        op: CmpOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    /// Spread argument wrapper (`*seq`); the inner value is what gets hoisted
    Starred(Box<Expr>),
    Tuple(Vec<Expr>),
    List(Vec<Expr>),
}

impl Expr {
    /// A singleton is already atomic and never needs extraction.
    pub fn is_singleton(&self) -> bool {
        matches!(self, Expr::Name(_) | Expr::Constant(_) | Expr::FString(_))
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Expr::Name(name) => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Name(_) => "Name",
            Expr::Constant(_) => "Constant",
            Expr::FString(_) => "FString",
            Expr::Call { .. } => "Call",
            Expr::BinOp { .. } => "BinOp",
            Expr::UnaryOp { .. } => "UnaryOp",
            Expr::BoolOp { .. } => "BoolOp",
            Expr::Compare { .. } => "Compare",
            Expr::Attribute { .. } => "Attribute",
            Expr::Subscript { .. } => "Subscript",
            Expr::Starred(_) => "Starred",
            Expr::Tuple(_) => "Tuple",
            Expr::List(_) => "List",
        }
    }
}

/// A function parameter with optional annotation and default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub annotation: Option<Expr>,
    pub default: Option<Expr>,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotation: None,
            default: None,
        }
    }
}

/// A function definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub decorators: Vec<Expr>,
    pub returns: Option<Expr>,
}

/// Statement nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    FunctionDef(FunctionDef),
    Assign {
        targets: Vec<Expr>,
        value: Expr,
    },
    AnnAssign {
        target: Expr,
        annotation: Expr,
        value: Option<Expr>,
    },
    AugAssign {
        target: Expr,
        op: BinOp,
        value: Expr,
    },
    Return {
        value: Option<Expr>,
    },
    Expr {
        value: Expr,
    },
    Pass,
    /// A statement kind with no rewrite rule (control flow, class bodies,
    /// imports). Reaching the engine with one of these is a fatal
    /// unsupported-construct error carrying the source kind.
    Unsupported {
        kind: String,
    },
}

impl Stmt {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Stmt::FunctionDef(_) => "FunctionDef",
            Stmt::Assign { .. } => "Assign",
            Stmt::AnnAssign { .. } => "AnnAssign",
            Stmt::AugAssign { .. } => "AugAssign",
            Stmt::Return { .. } => "Return",
            Stmt::Expr { .. } => "Expr",
            Stmt::Pass => "Pass",
            Stmt::Unsupported { .. } => "Unsupported",
        }
    }
}
