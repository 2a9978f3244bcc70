//! Parser: turns the token sequence into an abstract syntax tree.
//!
//! The grammar is layered combinator stacks over a token cursor; operator
//! precedence is encoded by the nesting of the binary levels, and the
//! mutually recursive non-terminals (`expression`, `statement`, `block`) are
//! late-bound slots filled after construction. High-level productions are
//! labelled with grammar terms so diagnostics talk about "expression" and
//! "statement" rather than token kinds.

use std::rc::Rc;

use crate::{
    ast::{Block, Expr, FunctionDef, ObjectKey, Program, Stmt},
    combinator::{BoxedParser, Failure, Input, PResult, Parser, Recursive, Success},
    error::ParseError,
    lex::lex,
    token::{Position, Token, TokenKind},
};

/// Immutable cursor over the lexed token sequence. Positions are token
/// indices; they are mapped back to source line/column when reporting.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TokenStream<'t> {
    tokens: &'t [Token],
    index: usize,
}

impl<'t> TokenStream<'t> {
    pub(crate) fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, index: 0 }
    }
}

impl<'t> Input for TokenStream<'t> {
    type Item = &'t Token;
    type Pos = usize;

    fn is_empty(&self) -> bool {
        self.index >= self.tokens.len()
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.index)
    }

    fn advance(&self, n: usize) -> Self {
        Self {
            tokens: self.tokens,
            index: (self.index + n).min(self.tokens.len()),
        }
    }

    fn pos(&self) -> usize {
        self.index
    }
}

/// The only primitive over tokens: accepts a single token of the given kind.
#[derive(Debug, Clone)]
struct Tok(TokenKind);

impl<'t> Parser<TokenStream<'t>> for Tok {
    type Output = Token;

    fn run(&self, input: TokenStream<'t>) -> PResult<TokenStream<'t>, Token> {
        match input.peek() {
            Some(token) if token.kind == self.0 => Ok(Success {
                output: token.clone(),
                rest: input.advance(1),
                consumed: true,
                best_alt: None,
            }),
            _ => Err(Failure::expecting(input.pos(), <&'static str>::from(self.0))),
        }
    }
}

fn tok(kind: TokenKind) -> Tok {
    Tok(kind)
}

type TokenParser<'t, O> = BoxedParser<'t, TokenStream<'t>, O>;

/// One left-associative binary precedence level: `operand (op operand)*`,
/// folded into left-leaning `Binary` nodes.
fn binary_level<'t>(operand: TokenParser<'t, Expr>, ops: &[TokenKind]) -> TokenParser<'t, Expr> {
    let mut op = tok(ops[0]).boxed();
    for &kind in &ops[1..] {
        op = op.or(tok(kind)).boxed();
    }
    operand
        .clone()
        .then(op.then(operand).repeated())
        .foldl(|lhs, (op, rhs)| Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
        .boxed()
}

/// A single postfix continuation parsed after a primary expression.
enum PostfixOp {
    Index(Expr),
    Field(Token),
    Call(Vec<Expr>),
}

fn program_parser<'t>() -> TokenParser<'t, Program> {
    use TokenKind as K;

    let expr: Recursive<'t, TokenStream<'t>, Expr> = Recursive::declare();
    let statement: Recursive<'t, TokenStream<'t>, Stmt> = Recursive::declare();
    let block: Recursive<'t, TokenStream<'t>, Block> = Recursive::declare();

    // --- expressions, highest precedence first ---

    let literal = tok(K::Str)
        .or(tok(K::Number))
        .or(tok(K::True))
        .or(tok(K::False))
        .or(tok(K::Nil))
        .map(Expr::Literal)
        .labelled("literal")
        .boxed();

    let object = tok(K::Identifier)
        .map(ObjectKey::Ident)
        .or(expr
            .clone()
            .delimited_by(tok(K::LeftBracket), tok(K::RightBracket))
            .map(ObjectKey::Computed))
        .then_ignore(tok(K::Colon))
        .then(expr.clone())
        .separated_by(tok(K::Comma))
        .delimited_by(tok(K::LeftBrace), tok(K::RightBrace))
        .map(Expr::Object)
        .labelled("object literal")
        .boxed();

    let function = tok(K::Function)
        .ignore_then(
            tok(K::Identifier)
                .separated_by(tok(K::Comma))
                .delimited_by(tok(K::LeftParen), tok(K::RightParen)),
        )
        .then(block.clone())
        .map(|(params, body)| Expr::Function(Rc::new(FunctionDef { params, body })))
        .labelled("function literal")
        .boxed();

    let parenthesized = expr
        .clone()
        .delimited_by(tok(K::LeftParen), tok(K::RightParen))
        .boxed();

    let primary = literal
        .or(object)
        .or(function)
        .or(tok(K::Identifier).map(Expr::Identifier))
        .or(parenthesized)
        .boxed();

    let postfix_op = expr
        .clone()
        .delimited_by(tok(K::LeftBracket), tok(K::RightBracket))
        .map(PostfixOp::Index)
        .or(tok(K::Dot).ignore_then(tok(K::Identifier)).map(PostfixOp::Field))
        .or(expr
            .clone()
            .separated_by(tok(K::Comma))
            .delimited_by(tok(K::LeftParen), tok(K::RightParen))
            .map(PostfixOp::Call))
        .boxed();
    let postfix = primary
        .then(postfix_op.repeated())
        .foldl(|lhs, op| match op {
            PostfixOp::Index(index) => Expr::Index {
                lhs: Box::new(lhs),
                index: Box::new(index),
            },
            PostfixOp::Field(field) => Expr::Field {
                lhs: Box::new(lhs),
                field,
            },
            PostfixOp::Call(args) => Expr::Call {
                callee: Box::new(lhs),
                args,
            },
        })
        .boxed();

    let unary = tok(K::Plus)
        .or(tok(K::Minus))
        .or(tok(K::Bang))
        .repeated()
        .then(postfix.clone())
        .foldr(|op, rhs| Expr::Unary {
            op,
            rhs: Box::new(rhs),
        })
        .boxed();

    let multiplication = binary_level(unary, &[K::Star, K::Slash, K::Percent]);
    let addition = binary_level(multiplication, &[K::Plus, K::Minus]);
    let relation = binary_level(addition, &[K::Less, K::LessEqual, K::Greater, K::GreaterEqual]);
    let equality = binary_level(relation, &[K::EqualEqual, K::BangEqual]);
    let xor = binary_level(equality, &[K::Caret]);
    let and = binary_level(xor, &[K::AmpAmp]);
    let or = binary_level(and, &[K::PipePipe]);

    expr.define(or.labelled("expression"));

    // --- statements ---

    let var_decl_body = tok(K::Var)
        .ignore_then(tok(K::Identifier))
        .then_ignore(tok(K::Equal))
        .then(expr.clone())
        .map(|(name, init)| Stmt::VarDecl { name, init })
        .boxed();
    let var_decl = var_decl_body
        .clone()
        .then_ignore(tok(K::Semicolon))
        .labelled("variable declaration")
        .boxed();

    let assign_op = tok(K::Equal)
        .or(tok(K::PlusEqual))
        .or(tok(K::MinusEqual))
        .or(tok(K::StarEqual))
        .or(tok(K::SlashEqual))
        .or(tok(K::PercentEqual))
        .labelled("assignment operator")
        .boxed();
    let assignment_body = postfix
        .then(assign_op)
        .then(expr.clone())
        .map(|((target, op), value)| Stmt::Assign { op, target, value })
        .boxed();
    let assignment = assignment_body
        .clone()
        .attempt()
        .then_ignore(tok(K::Semicolon))
        .boxed();

    let expr_stmt = expr.clone().then_ignore(tok(K::Semicolon)).map(Stmt::Expr).boxed();

    let break_stmt = tok(K::Break).then_ignore(tok(K::Semicolon)).to(Stmt::Break).boxed();
    let continue_stmt = tok(K::Continue)
        .then_ignore(tok(K::Semicolon))
        .to(Stmt::Continue)
        .boxed();
    let return_stmt = tok(K::Return)
        .ignore_then(expr.clone())
        .then_ignore(tok(K::Semicolon))
        .map(Stmt::Return)
        .boxed();

    let if_stmt = tok(K::If)
        .ignore_then(expr.clone().delimited_by(tok(K::LeftParen), tok(K::RightParen)))
        .then(statement.clone())
        .then(tok(K::Else).ignore_then(statement.clone()).or_not())
        .map(|((cond, then), otherwise)| Stmt::If {
            cond,
            then: Box::new(then),
            otherwise: otherwise.map(Box::new),
        })
        .labelled("if statement")
        .boxed();

    let while_stmt = tok(K::While)
        .ignore_then(expr.clone().delimited_by(tok(K::LeftParen), tok(K::RightParen)))
        .then(statement.clone())
        .map(|(cond, body)| Stmt::While {
            cond,
            body: Box::new(body),
        })
        .labelled("while statement")
        .boxed();

    let for_init = assignment_body
        .clone()
        .attempt()
        .or(var_decl_body)
        .map(Box::new)
        .or_not()
        .boxed();
    let for_step = assignment_body.attempt().map(Box::new).or_not().boxed();
    let for_stmt = tok(K::For)
        .ignore_then(tok(K::LeftParen))
        .ignore_then(for_init)
        .then_ignore(tok(K::Semicolon))
        .then(expr.clone().or_not())
        .then_ignore(tok(K::Semicolon))
        .then(for_step)
        .then_ignore(tok(K::RightParen))
        .then(statement.clone())
        .map(|(((init, cond), step), body)| Stmt::For {
            init,
            cond,
            step,
            body: Box::new(body),
        })
        .labelled("for statement")
        .boxed();

    statement.define(
        tok(K::Semicolon)
            .to(Stmt::Empty)
            .or(var_decl)
            .or(break_stmt)
            .or(continue_stmt)
            .or(return_stmt)
            .or(if_stmt)
            .or(while_stmt)
            .or(for_stmt)
            .or(block.clone().map(Stmt::Block))
            .or(assignment)
            .or(expr_stmt)
            .labelled("statement"),
    );

    block.define(
        statement
            .clone()
            .repeated()
            .delimited_by(tok(K::LeftBrace), tok(K::RightBrace))
            .map(|statements| Block { statements })
            .labelled("block"),
    );

    statement
        .repeated()
        .then_ignore(tok(K::Eof))
        .map(|statements| Program { statements })
        .boxed()
}

/// Parses source text into a program, running the lexer first.
///
/// No partial tree is produced on failure; the error carries the offending
/// position, the merged expectation set and the production being parsed.
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let tokens = lex(source)?;
    match program_parser().run(TokenStream::new(&tokens)) {
        Ok(success) => Ok(success.output),
        Err(failure) => Err(token_failure_to_error(failure, &tokens)),
    }
}

/// Maps a token-index failure back to a source position, naming the
/// offending token in the message.
fn token_failure_to_error(failure: Failure<usize>, tokens: &[Token]) -> ParseError {
    let token = tokens.get(failure.pos).or_else(|| tokens.last());
    let (position, message) = match token {
        Some(t) if t.kind == TokenKind::Eof => (t.position, String::from("unexpected end of input")),
        Some(t) => (t.position, format!("unexpected {}", t.kind)),
        None => (Position::default(), String::from("unexpected end of input")),
    };
    ParseError {
        position,
        message,
        expected: failure.expected,
        context: failure.context,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::token::TokenValue;

    fn parse_statement(source: &str) -> Stmt {
        let mut program = parse(source).unwrap();
        assert_eq!(program.statements.len(), 1, "expected a single statement");
        program.statements.remove(0)
    }

    fn parse_expr(source: &str) -> Expr {
        match parse_statement(source) {
            Stmt::Expr(expr) => expr,
            other => panic!("expected an expression statement, got {other:?}"),
        }
    }

    fn number(expr: &Expr) -> f64 {
        match expr {
            Expr::Literal(token) => match token.value {
                Some(TokenValue::Number(n)) => n,
                _ => panic!("not a number literal: {token:?}"),
            },
            _ => panic!("not a literal: {expr:?}"),
        }
    }

    #[test]
    fn binary_operators_fold_left() {
        let Expr::Binary { op, lhs, rhs } = parse_expr("1 - 2 - 3;") else {
            panic!("expected a binary expression")
        };
        assert_eq!(op.kind, TokenKind::Minus);
        assert_eq!(number(&rhs), 3.0);
        let Expr::Binary { lhs, rhs, .. } = *lhs else {
            panic!("expected a nested binary expression")
        };
        assert_eq!(number(&lhs), 1.0);
        assert_eq!(number(&rhs), 2.0);
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let Expr::Binary { op, lhs, rhs } = parse_expr("1 + 2 * 3;") else {
            panic!("expected a binary expression")
        };
        assert_eq!(op.kind, TokenKind::Plus);
        assert_eq!(number(&lhs), 1.0);
        assert!(matches!(
            *rhs,
            Expr::Binary { ref op, .. } if op.kind == TokenKind::Star
        ));
    }

    #[test]
    fn comparison_binds_tighter_than_logic() {
        let Expr::Binary { op, .. } = parse_expr("1 < 2 && 3 < 4;") else {
            panic!("expected a binary expression")
        };
        assert_eq!(op.kind, TokenKind::AmpAmp);
    }

    #[test]
    fn unary_operators_nest_right() {
        let Expr::Unary { op, rhs } = parse_expr("! ! x;") else {
            panic!("expected a unary expression")
        };
        assert_eq!(op.kind, TokenKind::Bang);
        assert!(matches!(*rhs, Expr::Unary { .. }));
    }

    #[test]
    fn postfix_chain_folds_left() {
        let Expr::Call { callee, args } = parse_expr("o.a[0](1, 2);") else {
            panic!("expected a call expression")
        };
        assert_eq!(args.len(), 2);
        let Expr::Index { lhs, .. } = *callee else {
            panic!("expected a bracket access")
        };
        assert!(matches!(*lhs, Expr::Field { .. }));
    }

    #[test]
    fn call_with_no_arguments() {
        let Expr::Call { args, .. } = parse_expr("f();") else {
            panic!("expected a call expression")
        };
        assert!(args.is_empty());
    }

    #[test]
    fn empty_object_literal() {
        let Expr::Object(pairs) = parse_expr("({});") else {
            panic!("expected an object literal")
        };
        assert!(pairs.is_empty());
    }

    #[test]
    fn object_literal_keys() {
        let Expr::Object(pairs) = parse_expr("({ x: 1, [\"y\"]: 2 });") else {
            panic!("expected an object literal")
        };
        assert_eq!(pairs.len(), 2);
        assert!(matches!(pairs[0].0, ObjectKey::Ident(_)));
        assert!(matches!(pairs[1].0, ObjectKey::Computed(_)));
    }

    #[test]
    fn function_literal_shape() {
        let Expr::Function(def) = parse_expr("function (a, b) { return a; };") else {
            panic!("expected a function literal")
        };
        assert_eq!(def.params.len(), 2);
        assert_eq!(def.body.statements.len(), 1);
    }

    #[test]
    fn else_binds_to_nearest_if() {
        let Stmt::If { otherwise, then, .. } = parse_statement("if (a) if (b) c(); else d();") else {
            panic!("expected an if statement")
        };
        assert!(otherwise.is_none());
        assert!(matches!(*then, Stmt::If { ref otherwise, .. } if otherwise.is_some()));
    }

    #[test]
    fn for_clauses_are_optional() {
        let Stmt::For { init, cond, step, .. } = parse_statement("for (;;) {}") else {
            panic!("expected a for statement")
        };
        assert!(init.is_none());
        assert!(cond.is_none());
        assert!(step.is_none());
    }

    #[test]
    fn for_with_all_clauses() {
        let Stmt::For { init, cond, step, .. } = parse_statement("for (var i = 0; i < 4; i += 1) ;") else {
            panic!("expected a for statement")
        };
        assert!(matches!(init.as_deref(), Some(Stmt::VarDecl { .. })));
        assert!(cond.is_some());
        assert!(matches!(step.as_deref(), Some(Stmt::Assign { .. })));
    }

    #[test]
    fn assignment_targets_parse_as_postfix() {
        assert!(matches!(
            parse_statement("o.x += 1;"),
            Stmt::Assign { ref target, .. } if matches!(target, Expr::Field { .. })
        ));
        assert!(matches!(
            parse_statement("o[\"k\"] = 1;"),
            Stmt::Assign { ref target, .. } if matches!(target, Expr::Index { .. })
        ));
    }

    #[test]
    fn empty_statement_parses() {
        assert_eq!(parse_statement(";"), Stmt::Empty);
    }

    #[test]
    fn missing_expression_reports_the_semicolon() {
        let err = parse("var x = ;").unwrap_err();
        assert_eq!(err.position, Position::new(0, 8));
        assert_eq!(err.message, "unexpected ';'");
        assert!(err.expected.contains("expression"));
    }

    #[test]
    fn return_requires_an_expression() {
        let err = parse("var f = function () { return; };").unwrap_err();
        assert!(err.expected.contains("expression"));
    }

    #[test]
    fn trailing_garbage_reports_statement_or_eof() {
        let err = parse("a; )").unwrap_err();
        assert_eq!(err.message, "unexpected ')'");
        assert!(err.expected.contains("statement"));
        assert!(err.expected.contains("end of input"));
    }

    #[test]
    fn digit_leading_identifier_is_rejected() {
        assert!(parse("var x = 3abc;").is_err());
    }

    #[test]
    fn missing_closing_brace_is_reported() {
        let err = parse("var f = function () { return 1;").unwrap_err();
        assert_eq!(err.message, "unexpected end of input");
    }

    #[test]
    fn deterministic_output() {
        let a = parse("var a = 1; a += 2; print(a);").unwrap();
        let b = parse("var a = 1; a += 2; print(a);").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn programs_serialize_for_host_tooling() {
        let program = parse("var a = 1;").unwrap();
        let json = serde_json::to_string(&program).unwrap();
        assert!(json.contains("VarDecl"));
        let back: Program = serde_json::from_str(&json).unwrap();
        assert_eq!(program, back);
    }
}
