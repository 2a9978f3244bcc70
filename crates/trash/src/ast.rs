//! Abstract syntax tree produced by the parser.
//!
//! Operator nodes keep their operator token so runtime diagnostics can point
//! at the offending source position. Function literals are reference-counted:
//! a closure created at runtime shares the definition with the tree it was
//! parsed from, so the tree can be dropped while closures live on.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::token::Token;

/// A complete program: the top-level statement sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

/// A brace-delimited statement sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

/// A function literal: ordered parameter identifiers and a body block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub params: Vec<Token>,
    pub body: Block,
}

/// The key half of an object literal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectKey {
    /// A bare identifier, used verbatim as a string key.
    Ident(Token),
    /// A bracketed expression, evaluated at construction time.
    Computed(Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// A number, string, `true`, `false` or `nil` token.
    Literal(Token),
    Identifier(Token),
    /// An object literal: ordered key/value pairs.
    Object(Vec<(ObjectKey, Expr)>),
    Function(Rc<FunctionDef>),
    Unary {
        op: Token,
        rhs: Box<Expr>,
    },
    Binary {
        op: Token,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `lhs[index]`
    Index {
        lhs: Box<Expr>,
        index: Box<Expr>,
    },
    /// `lhs.field`
    Field {
        lhs: Box<Expr>,
        field: Token,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// A bare `;`.
    Empty,
    /// An expression evaluated for its side effects.
    Expr(Expr),
    /// `target op value` where `op` is `=` or a compound assignment operator.
    Assign {
        op: Token,
        target: Expr,
        value: Expr,
    },
    VarDecl {
        name: Token,
        init: Expr,
    },
    Return(Expr),
    Break,
    Continue,
    Block(Block),
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Box<Stmt>>,
        body: Box<Stmt>,
    },
}
