//! Shared models (single source of truth for the AST)

pub mod ast;

pub use ast::{
    BinOp, BoolOp, CmpOp, Expr, FunctionDef, Keyword, Literal, Param, Program, Stmt, UnaryOp,
};
