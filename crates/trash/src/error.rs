use std::{borrow::Cow, collections::BTreeSet, fmt};

use serde::Serialize;
use strum::{Display, IntoStaticStr};

use crate::token::Position;

/// Result type alias for operations that can raise a runtime error.
pub type EvalResult<T> = Result<T, RuntimeError>;

/// A syntax error produced by the lexer or parser.
///
/// `expected` aggregates every construct that would have been accepted at the
/// failure position, merged across all grammar alternatives that reached it.
#[derive(Debug, Clone, Serialize)]
pub struct ParseError {
    pub position: Position,
    pub message: String,
    pub expected: BTreeSet<Cow<'static, str>>,
    /// The grammar production being parsed when the failure occurred.
    pub context: Option<&'static str>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error on line {}: {}", self.position, self.message)?;
        if !self.expected.is_empty() {
            write!(f, ", expected ")?;
            for (i, expectation) in self.expected.iter().enumerate() {
                if i > 0 {
                    write!(f, " or ")?;
                }
                write!(f, "{expectation}")?;
            }
        }
        if let Some(context) = self.context {
            write!(f, " while parsing {context}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Classification of evaluator failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize)]
pub enum RuntimeErrorKind {
    /// Operand of the wrong kind for an operator or operation.
    TypeMismatch,
    /// Read or assignment of an identifier that is not bound in any
    /// enclosing frame.
    UndeclaredAccess,
    /// `var` on a name already bound in the current frame.
    DoubleDeclaration,
    /// Function called with the wrong number of arguments.
    Arity,
    /// Assignment target is neither a variable nor an indexed access.
    NotAssignable,
    /// `break` or `continue` escaped to a function or program boundary
    /// without an enclosing loop.
    StrayBreakContinue,
    /// Call depth exceeded the configured resource limit.
    StackOverflow,
    /// Evaluator invariant violation; always a bug.
    Internal,
}

/// A fatal evaluator failure.
///
/// Evaluation is not restartable after one of these surfaces, though global
/// bindings committed before the failure remain visible.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
    /// Position of the offending operator token, where one exists.
    pub position: Option<Position>,
}

impl RuntimeError {
    pub(crate) fn new(kind: RuntimeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            position: None,
        }
    }

    pub(crate) fn with_position(kind: RuntimeErrorKind, message: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            message: message.into(),
            position: Some(position),
        }
    }

    /// Attaches a position to an error built without one.
    #[must_use]
    pub(crate) fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub(crate) fn undeclared(name: &str) -> Self {
        Self::new(RuntimeErrorKind::UndeclaredAccess, format!("'{name}' is not declared"))
    }

    pub(crate) fn double_declaration(name: &str) -> Self {
        Self::new(
            RuntimeErrorKind::DoubleDeclaration,
            format!("'{name}' is already declared in this scope"),
        )
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::Internal, message)
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(position) => write!(f, "error on line {position}: {}", self.message),
            None => write!(f, "error: {}", self.message),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Either kind of failure a host can see when running source end to end.
#[derive(Debug, Clone)]
pub enum Error {
    Parse(ParseError),
    Runtime(RuntimeError),
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}

impl From<RuntimeError> for Error {
    fn from(err: RuntimeError) -> Self {
        Self::Runtime(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => err.fmt(f),
            Self::Runtime(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_formatting() {
        let err = ParseError {
            position: Position::new(0, 8),
            message: "unexpected ';'".to_owned(),
            expected: BTreeSet::from([Cow::Borrowed("expression")]),
            context: Some("variable declaration"),
        };
        assert_eq!(
            err.to_string(),
            "error on line 0:8: unexpected ';', expected expression while parsing variable declaration"
        );
    }

    #[test]
    fn expectations_are_joined_with_or() {
        let err = ParseError {
            position: Position::new(2, 0),
            message: "unexpected ')'".to_owned(),
            expected: BTreeSet::from([Cow::Borrowed("statement"), Cow::Borrowed("end of input")]),
            context: None,
        };
        assert_eq!(
            err.to_string(),
            "error on line 2:0: unexpected ')', expected end of input or statement"
        );
    }

    #[test]
    fn runtime_error_formatting() {
        let err = RuntimeError::with_position(
            RuntimeErrorKind::TypeMismatch,
            "operator '-' expects numbers".to_owned(),
            Position::new(3, 4),
        );
        assert_eq!(err.to_string(), "error on line 3:4: operator '-' expects numbers");
        assert_eq!(RuntimeError::undeclared("x").to_string(), "error: 'x' is not declared");
    }
}
