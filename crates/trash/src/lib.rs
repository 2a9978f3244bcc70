#![doc = include_str!("../../../README.md")]
#![expect(clippy::float_cmp, reason = "IEEE equality is the language semantics")]

pub mod combinator;

mod ast;
mod env;
mod error;
mod eval;
mod fmt;
mod heap;
mod io;
mod lex;
mod parse;
mod resource;
mod token;
mod tracer;
mod value;

pub use crate::{
    ast::{Block, Expr, FunctionDef, ObjectKey, Program, Stmt},
    error::{Error, EvalResult, ParseError, RuntimeError, RuntimeErrorKind},
    eval::Evaluator,
    fmt::to_source,
    heap::HeapId,
    io::{CollectStringPrint, NativeFunction, NoPrint, PrintFunction, PrintWriter, StdPrint},
    parse::parse,
    resource::{DEFAULT_MAX_CALL_DEPTH, ResourceLimits},
    token::{Position, Token, TokenKind, TokenValue},
    tracer::{CountingTracer, EvalTracer, NoopTracer, TraceCounts},
    value::{Callable, Indexable, Object, Value},
};

/// Parses and executes `source` in one step.
pub fn run(source: &str, evaluator: &mut Evaluator) -> Result<(), Error> {
    let program = parse(source)?;
    evaluator.execute(&program)?;
    Ok(())
}
