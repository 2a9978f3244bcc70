//! Lexer: turns source text into a token sequence.
//!
//! Built on the combinator runtime over a character cursor. Whitespace, line
//! comments and block comments are consumed between lexemes; every token is
//! tagged with the position of its first character and a trailing `Eof` token
//! is appended past the last character.

use crate::{
    combinator::{BoxedParser, Failure, Input, Parser, end, just, literal, neg_literal, none_of, one_of},
    error::ParseError,
    token::{Position, Token, TokenKind, TokenValue},
};

/// Immutable cursor over source characters, tracking line and column.
#[derive(Debug, Clone)]
pub(crate) struct CharInput<'s> {
    rest: &'s str,
    position: Position,
}

impl<'s> CharInput<'s> {
    pub(crate) fn new(source: &'s str) -> Self {
        Self {
            rest: source,
            position: Position::default(),
        }
    }
}

impl Input for CharInput<'_> {
    type Item = char;
    type Pos = Position;

    fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn advance(&self, n: usize) -> Self {
        let mut rest = self.rest;
        let mut position = self.position;
        for _ in 0..n {
            let Some(c) = rest.chars().next() else { break };
            rest = &rest[c.len_utf8()..];
            position = if c == '\n' {
                position.next_line()
            } else {
                position.next_column()
            };
        }
        Self { rest, position }
    }

    fn pos(&self) -> Position {
        self.position
    }
}

const DIGITS: &str = "0123456789";
const NONZERO_DIGITS: &str = "123456789";
const IDENT_START: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";
const IDENT_CONT: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz0123456789";

/// Fixed lexemes, multi-character operators strictly before their prefixes.
const OPERATORS: &[(&str, TokenKind)] = &[
    ("==", TokenKind::EqualEqual),
    ("!=", TokenKind::BangEqual),
    ("<=", TokenKind::LessEqual),
    (">=", TokenKind::GreaterEqual),
    ("+=", TokenKind::PlusEqual),
    ("-=", TokenKind::MinusEqual),
    ("*=", TokenKind::StarEqual),
    ("/=", TokenKind::SlashEqual),
    ("%=", TokenKind::PercentEqual),
    ("&&", TokenKind::AmpAmp),
    ("||", TokenKind::PipePipe),
    ("=", TokenKind::Equal),
    ("<", TokenKind::Less),
    (">", TokenKind::Greater),
    ("+", TokenKind::Plus),
    ("-", TokenKind::Minus),
    ("*", TokenKind::Star),
    ("/", TokenKind::Slash),
    ("%", TokenKind::Percent),
    ("!", TokenKind::Bang),
    ("^", TokenKind::Caret),
    ("(", TokenKind::LeftParen),
    (")", TokenKind::RightParen),
    ("{", TokenKind::LeftBrace),
    ("}", TokenKind::RightBrace),
    ("[", TokenKind::LeftBracket),
    ("]", TokenKind::RightBracket),
    (",", TokenKind::Comma),
    (";", TokenKind::Semicolon),
    (":", TokenKind::Colon),
    (".", TokenKind::Dot),
];

const KEYWORDS: &[(&str, TokenKind)] = &[
    ("if", TokenKind::If),
    ("else", TokenKind::Else),
    ("for", TokenKind::For),
    ("while", TokenKind::While),
    ("return", TokenKind::Return),
    ("break", TokenKind::Break),
    ("continue", TokenKind::Continue),
    ("var", TokenKind::Var),
    ("function", TokenKind::Function),
    ("nil", TokenKind::Nil),
    ("false", TokenKind::False),
    ("true", TokenKind::True),
];

type CharParser<'s, O> = BoxedParser<'s, CharInput<'s>, O>;

// Local wrappers that pin the primitives' `Input` type to `CharInput<'s>`.
// The raw free functions are usable against any `Input<Item = char>`, which
// leaves the compiler unable to infer which one applies at each call site in
// a long combinator chain; erasing that extra generality here (the lexer
// only ever runs over `CharInput`) gives it a single answer.
fn one_of_c<'s>(set: &'static str) -> impl Parser<CharInput<'s>, Output = char> + Clone {
    one_of(set)
}

fn none_of_c<'s>(set: &'static str) -> impl Parser<CharInput<'s>, Output = char> + Clone {
    none_of(set)
}

fn literal_c<'s>(text: &'static str) -> impl Parser<CharInput<'s>, Output = &'static str> + Clone {
    literal(text)
}

fn neg_literal_c<'s>(text: &'static str) -> impl Parser<CharInput<'s>, Output = char> + Clone {
    neg_literal(text)
}

fn just_c<'s>(c: char) -> impl Parser<CharInput<'s>, Output = char> + Clone {
    just(c)
}

fn end_c<'s>() -> impl Parser<CharInput<'s>, Output = ()> + Clone {
    end()
}

/// Zero or more whitespace characters and comments.
fn skip<'s>() -> CharParser<'s, ()> {
    let whitespace = one_of_c(" \t\r\n").ignored();
    let line_comment = literal_c("//").ignore_then(none_of_c("\n\r").repeated()).ignored();
    let block_comment = literal_c("/*")
        .ignore_then(neg_literal_c("*/").repeated())
        .then_ignore(literal_c("*/"))
        .ignored();
    whitespace.or(line_comment).or(block_comment).repeated().ignored().boxed()
}

/// Decimal number lexeme: optional leading `-`, then `0` or a
/// leading-nonzero digit run, an optional fraction and an optional exponent.
fn number<'s>() -> CharParser<'s, f64> {
    let digits1 = one_of_c(DIGITS)
        .repeated()
        .at_least(1)
        .map(|digits| digits.into_iter().collect::<String>());
    let int_part = just_c('0').map(|_| String::from("0")).or(one_of_c(NONZERO_DIGITS)
        .then(one_of_c(DIGITS).repeated())
        .map(|(first, rest)| {
            let mut text = String::from(first);
            text.extend(rest);
            text
        }));
    let fraction = just_c('.').ignore_then(digits1.clone()).map(|digits| format!(".{digits}"));
    let exponent = one_of_c("eE")
        .ignore_then(one_of_c("+-").or_not())
        .then(digits1)
        .map(|(sign, digits)| match sign {
            Some(sign) => format!("e{sign}{digits}"),
            None => format!("e{digits}"),
        });
    just_c('-')
        .or_not()
        .then(int_part)
        .then(fraction.or_not())
        .then(exponent.or_not())
        .map(|(((sign, int_part), fraction), exponent)| {
            let mut text = String::new();
            if sign.is_some() {
                text.push('-');
            }
            text.push_str(&int_part);
            if let Some(fraction) = fraction {
                text.push_str(&fraction);
            }
            if let Some(exponent) = exponent {
                text.push_str(&exponent);
            }
            text.parse::<f64>().expect("numeric lexeme is a valid float")
        })
        .boxed()
}

/// String lexeme: `"…"` with `\\` and `\"` as the only escapes.
fn string<'s>() -> CharParser<'s, String> {
    let escape = literal_c("\\\\").to('\\').or(literal_c("\\\"").to('"'));
    escape
        .or(none_of_c("\""))
        .repeated()
        .map(|chars| chars.into_iter().collect::<String>())
        .delimited_by(just_c('"'), just_c('"'))
        .boxed()
}

/// Identifier or keyword lexeme.
fn word<'s>() -> CharParser<'s, (TokenKind, Option<TokenValue>)> {
    one_of_c(IDENT_START)
        .then(one_of_c(IDENT_CONT).repeated())
        .map(|(first, rest)| {
            let mut name = String::from(first);
            name.extend(rest);
            match KEYWORDS.iter().find(|(text, _)| *text == name) {
                Some(&(_, kind)) => {
                    let value = match kind {
                        TokenKind::Nil => Some(TokenValue::Nil),
                        TokenKind::True => Some(TokenValue::Bool(true)),
                        TokenKind::False => Some(TokenValue::Bool(false)),
                        _ => None,
                    };
                    (kind, value)
                }
                None => (TokenKind::Identifier, Some(TokenValue::Str(name))),
            }
        })
        .boxed()
}

/// Any fixed operator or punctuation lexeme.
fn operator<'s>() -> CharParser<'s, TokenKind> {
    let (text, kind) = OPERATORS[0];
    let mut parser = literal_c(text).to(kind).boxed();
    for &(text, kind) in &OPERATORS[1..] {
        parser = parser.or(literal_c(text).to(kind)).boxed();
    }
    parser
}

/// A single positioned token. The numeric lexeme is tried first so that a
/// `-` directly followed by digits lexes as a negative number literal; the
/// backtracking wrapper lets a bare `-` fall through to the operator table.
fn token<'s>() -> CharParser<'s, Token> {
    number()
        .map(|n| (TokenKind::Number, Some(TokenValue::Number(n))))
        .attempt()
        .or(string().map(|s| (TokenKind::Str, Some(TokenValue::Str(s)))))
        .or(word())
        .or(operator().map(|kind| (kind, None)))
        .labelled("token")
        .positioned()
        .map(|(position, (kind, value))| Token {
            kind,
            position,
            value,
        })
        .boxed()
}

fn lexer<'s>() -> CharParser<'s, Vec<Token>> {
    skip()
        .ignore_then(token().then_ignore(skip()).repeated())
        .then(end_c().positioned())
        .map(|(mut tokens, (eof_position, ()))| {
            tokens.push(Token::new(TokenKind::Eof, eof_position));
            tokens
        })
        .boxed()
}

/// Runs the lexer, reporting failure as a parse error at the offending
/// position.
pub(crate) fn lex(source: &str) -> Result<Vec<Token>, ParseError> {
    match lexer().run(CharInput::new(source)) {
        Ok(success) => Ok(success.output),
        Err(failure) => Err(char_failure_to_error(source, failure)),
    }
}

/// Converts a character-level failure into a public parse error, naming the
/// offending character in the message.
fn char_failure_to_error(source: &str, failure: Failure<Position>) -> ParseError {
    let message = match char_at(source, failure.pos) {
        Some(c) => format!("unexpected character '{c}'"),
        None => String::from("unexpected end of input"),
    };
    ParseError {
        position: failure.pos,
        message,
        expected: failure.expected,
        context: failure.context,
    }
}

fn char_at(source: &str, position: Position) -> Option<char> {
    let mut cursor = Position::default();
    for c in source.chars() {
        if cursor == position {
            return Some(c);
        }
        cursor = if c == '\n' { cursor.next_line() } else { cursor.next_column() };
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn number_value(source: &str) -> f64 {
        let tokens = lex(source).unwrap();
        match &tokens[0].value {
            Some(TokenValue::Number(n)) => *n,
            other => panic!("expected a number token, got {other:?}"),
        }
    }

    #[test]
    fn lexes_punctuation_and_operators() {
        assert_eq!(
            kinds("( ) { } [ ] , ; : ."),
            vec![
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::LeftBracket,
                TokenKind::RightBracket,
                TokenKind::Comma,
                TokenKind::Semicolon,
                TokenKind::Colon,
                TokenKind::Dot,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn multi_character_operators_win_over_prefixes() {
        assert_eq!(
            kinds("== != <= >= += -= *= /= %= && ||"),
            vec![
                TokenKind::EqualEqual,
                TokenKind::BangEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::PlusEqual,
                TokenKind::MinusEqual,
                TokenKind::StarEqual,
                TokenKind::SlashEqual,
                TokenKind::PercentEqual,
                TokenKind::AmpAmp,
                TokenKind::PipePipe,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_and_identifiers() {
        let tokens = lex("var iffy if").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Var);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].identifier_name(), "iffy");
        assert_eq!(tokens[2].kind, TokenKind::If);
    }

    #[test]
    fn literal_keywords_carry_values() {
        let tokens = lex("nil true false").unwrap();
        assert_eq!(tokens[0].value, Some(TokenValue::Nil));
        assert_eq!(tokens[1].value, Some(TokenValue::Bool(true)));
        assert_eq!(tokens[2].value, Some(TokenValue::Bool(false)));
    }

    #[test]
    fn number_forms() {
        assert_eq!(number_value("0"), 0.0);
        assert_eq!(number_value("42"), 42.0);
        assert_eq!(number_value("1.5"), 1.5);
        assert_eq!(number_value("0.25"), 0.25);
        assert_eq!(number_value("2e3"), 2000.0);
        assert_eq!(number_value("2.5e-2"), 0.025);
        assert_eq!(number_value("1E+2"), 100.0);
    }

    #[test]
    fn negative_zero_literal_keeps_its_sign() {
        let value = number_value("-0.0");
        assert_eq!(value, 0.0);
        assert!(value.is_sign_negative());
    }

    #[test]
    fn minus_before_digits_is_a_literal_otherwise_an_operator() {
        let tokens = lex("-5 - x").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].value, Some(TokenValue::Number(-5.0)));
        assert_eq!(tokens[1].kind, TokenKind::Minus);
        assert_eq!(tokens[2].kind, TokenKind::Identifier);
    }

    #[test]
    fn compound_minus_assignment_is_not_a_number() {
        assert_eq!(
            kinds("x -= 1;"),
            vec![
                TokenKind::Identifier,
                TokenKind::MinusEqual,
                TokenKind::Number,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        let tokens = lex(r#""a\"b\\c""#).unwrap();
        assert_eq!(tokens[0].value, Some(TokenValue::Str(String::from("a\"b\\c"))));
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("a // rest of line\nb /* inline */ c"),
            vec![
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn block_comment_is_not_nested() {
        // the first "*/" closes the comment, so "/*" inside the body does
        // not open a nested one
        assert_eq!(kinds("/*/**/"), vec![TokenKind::Eof]);
        assert_eq!(kinds("/*/**/x"), vec![TokenKind::Identifier, TokenKind::Eof]);
        // the leftover tail of a would-be nested comment is ordinary tokens
        assert_eq!(
            kinds("/* a /* b */ c"),
            vec![TokenKind::Identifier, TokenKind::Eof]
        );
    }

    #[test]
    fn positions_track_lines_and_columns() {
        let tokens = lex("a\n  b").unwrap();
        assert_eq!(tokens[0].position, Position::new(0, 0));
        assert_eq!(tokens[1].position, Position::new(1, 2));
        assert_eq!(tokens[2].position, Position::new(1, 3));
        assert_eq!(tokens[2].kind, TokenKind::Eof);
    }

    #[test]
    fn eof_token_sits_past_the_last_character() {
        let tokens = lex("ab").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Eof);
        assert_eq!(tokens[1].position, Position::new(0, 2));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = lex("\"abc").unwrap_err();
        assert_eq!(err.message, "unexpected end of input");
        assert!(err.expected.contains("'\"'"));
    }

    #[test]
    fn unterminated_block_comment_is_an_error() {
        assert!(lex("/* no end").is_err());
    }

    #[test]
    fn stray_character_is_an_error() {
        let err = lex("a @ b").unwrap_err();
        assert_eq!(err.position, Position::new(0, 2));
        assert_eq!(err.message, "unexpected character '@'");
    }
}
