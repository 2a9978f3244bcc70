//! Backtracking parser combinators over an abstract input.
//!
//! A parser is a pure function from an input to either a [`Success`] carrying
//! an output, the remaining input and a consumed-input flag, or a [`Failure`]
//! carrying a position, an expectation set, a message and an optional context.
//!
//! The `consumed` flag is what makes alternatives *committed*: an
//! [`Parser::or`] branch is only tried against later branches when the earlier
//! branch failed WITHOUT consuming input. Wrapping a branch in
//! [`Parser::attempt`] converts a committed failure back into an uncommitted
//! one, restoring backtracking at that point.
//!
//! Failures are merged so that the error reaching farthest into the input
//! wins, and failures at the same position pool their expectation sets. This
//! is what turns a pile of dead alternatives into a single
//! "expected X or Y" diagnostic.

use std::{borrow::Cow, cell::RefCell, collections::BTreeSet, fmt, rc::Rc};

/// Message used by primitives when input does not match; the lexer and parser
/// entry points rewrite it with the offending character or token.
pub(crate) const UNEXPECTED: &str = "unexpected input";

/// An abstract parser input: an immutable cursor over a sequence of items.
///
/// Advancing produces a new cursor, so backtracking is just reusing an older
/// one. Positions are ordered; "farther" positions compare greater.
pub trait Input: Clone {
    /// The item yielded by the cursor (a character or a token).
    type Item: Clone;
    /// The position type used for error ordering and reporting.
    type Pos: Copy + PartialOrd + fmt::Debug;

    /// True when no items remain.
    fn is_empty(&self) -> bool;
    /// The next item, if any, without advancing.
    fn peek(&self) -> Option<Self::Item>;
    /// A cursor advanced past the next `n` items.
    #[must_use]
    fn advance(&self, n: usize) -> Self;
    /// The position of the next item (or one past the end).
    fn pos(&self) -> Self::Pos;
}

/// A parse failure.
#[derive(Debug, Clone)]
pub struct Failure<P> {
    /// Where the failure occurred.
    pub pos: P,
    /// Whether input was consumed before failing. Consumed failures are
    /// *committed*: alternation does not backtrack past them.
    pub consumed: bool,
    /// The constructs that would have been accepted at `pos`.
    pub expected: BTreeSet<Cow<'static, str>>,
    /// Human-readable description of what went wrong.
    pub message: Cow<'static, str>,
    /// The grammar production being parsed when the failure occurred.
    pub context: Option<&'static str>,
}

impl<P> Failure<P> {
    /// A fresh uncommitted failure expecting a single construct.
    pub fn expecting(pos: P, expected: impl Into<Cow<'static, str>>) -> Self {
        Self {
            pos,
            consumed: false,
            expected: BTreeSet::from([expected.into()]),
            message: Cow::Borrowed(UNEXPECTED),
            context: None,
        }
    }

    /// A fresh uncommitted failure with a message and no expectations.
    pub fn message(pos: P, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            pos,
            consumed: false,
            expected: BTreeSet::new(),
            message: message.into(),
            context: None,
        }
    }
}

impl<P: PartialOrd> Failure<P> {
    /// Merges two failures, keeping the one that reached farther into the
    /// input. At equal positions the expectation sets are unioned. The result
    /// is committed if either side was.
    pub(crate) fn merge(self, other: Self) -> Self {
        let consumed = self.consumed || other.consumed;
        let mut winner = if other.pos > self.pos {
            other
        } else {
            let mut this = self;
            if !(this.pos > other.pos) {
                let mut other = other;
                this.expected.append(&mut other.expected);
            }
            this
        };
        winner.consumed = consumed;
        winner
    }
}

/// Merges two optional failures with [`Failure::merge`].
fn merge_alts<P: PartialOrd>(a: Option<Failure<P>>, b: Option<Failure<P>>) -> Option<Failure<P>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.merge(b)),
        (a, b) => a.or(b),
    }
}

/// A successful parse.
#[derive(Debug, Clone)]
pub struct Success<I: Input, O> {
    /// The parsed output.
    pub output: O,
    /// The remaining input.
    pub rest: I,
    /// Whether input was consumed.
    pub consumed: bool,
    /// The best failure from an alternative branch that reached at least as
    /// far as `rest`. Later sequencing steps merge this into their own
    /// failures so the deepest diagnosis survives a successful detour.
    pub best_alt: Option<Failure<I::Pos>>,
}

impl<I: Input, O> Success<I, O> {
    fn map<U>(self, f: impl FnOnce(O) -> U) -> Success<I, U> {
        Success {
            output: f(self.output),
            rest: self.rest,
            consumed: self.consumed,
            best_alt: self.best_alt,
        }
    }
}

/// The result of running a parser.
pub type PResult<I, O> = Result<Success<I, O>, Failure<<I as Input>::Pos>>;

/// Sequencing step: given the success of the first parser and the raw result
/// of the second, produce the combined result.
///
/// On failure of the second parser, the failure is merged with the first
/// success's `best_alt` (farthest wins, ties union) and committed if the first
/// parser consumed input. On success, the pair is returned with the
/// consumed-input flag set only when both halves consumed.
fn seq_step<I: Input, A, B>(first: Success<I, A>, second: PResult<I, B>) -> PResult<I, (A, B)> {
    match second {
        Ok(s2) => Ok(Success {
            output: (first.output, s2.output),
            rest: s2.rest,
            consumed: first.consumed && s2.consumed,
            best_alt: merge_alts(first.best_alt, s2.best_alt),
        }),
        Err(e2) => {
            let mut err = match first.best_alt {
                Some(alt) => e2.merge(alt),
                None => e2,
            };
            err.consumed = err.consumed || first.consumed;
            Err(err)
        }
    }
}

/// Alternation bookkeeping: folds a new branch failure into the best-so-far.
///
/// The new failure replaces the best when it consumed input and sits strictly
/// farther; at equal positions the expectation sets are unioned; otherwise it
/// is discarded. Either way, consumption by any branch commits the result.
fn alt_step<P: Copy + PartialOrd>(best: Failure<P>, new: Failure<P>) -> Failure<P> {
    let consumed = best.consumed || new.consumed;
    let mut winner = if new.consumed && new.pos > best.pos {
        new
    } else if !(new.pos > best.pos) && !(best.pos > new.pos) {
        let mut best = best;
        let mut new = new;
        best.expected.append(&mut new.expected);
        best
    } else {
        best
    };
    winner.consumed = consumed;
    winner
}

/// Attaches a pending branch failure to a success when it reaches at least as
/// far as the success's remainder, so later sequencing can surface it.
fn attach_alt<I: Input, O>(mut success: Success<I, O>, pending: Failure<I::Pos>) -> Success<I, O> {
    if !(success.rest.pos() > pending.pos) {
        success.best_alt = merge_alts(success.best_alt, Some(pending));
    }
    success
}

/// A trait implemented by parsers.
///
/// Combinator methods build larger parsers out of smaller ones; the
/// free functions at the bottom of this module provide the primitives.
pub trait Parser<I: Input> {
    /// The output produced on success.
    type Output;

    /// Runs the parser against an input cursor.
    fn run(&self, input: I) -> PResult<I, Self::Output>;

    /// Maps the output with `f`.
    fn map<U, F: Fn(Self::Output) -> U>(self, f: F) -> Map<Self, F>
    where
        Self: Sized,
    {
        Map(self, f)
    }

    /// Replaces the output with a fixed value.
    fn to<U: Clone>(self, value: U) -> To<Self, U>
    where
        Self: Sized,
    {
        To(self, value)
    }

    /// Discards the output.
    fn ignored(self) -> To<Self, ()>
    where
        Self: Sized,
    {
        To(self, ())
    }

    /// Feeds the output into `f` to choose the parser for the rest of the
    /// input.
    fn bind<P2: Parser<I>, F: Fn(Self::Output) -> P2>(self, f: F) -> Bind<Self, F>
    where
        Self: Sized,
    {
        Bind(self, f)
    }

    /// Runs `self` then `other`, yielding both outputs as a pair.
    fn then<P2: Parser<I>>(self, other: P2) -> Then<Self, P2>
    where
        Self: Sized,
    {
        Then(self, other)
    }

    /// Runs `self` then `other`, keeping only `other`'s output.
    fn ignore_then<P2: Parser<I>>(self, other: P2) -> IgnoreThen<Self, P2>
    where
        Self: Sized,
    {
        IgnoreThen(self, other)
    }

    /// Runs `self` then `other`, keeping only `self`'s output.
    fn then_ignore<P2: Parser<I>>(self, other: P2) -> ThenIgnore<Self, P2>
    where
        Self: Sized,
    {
        ThenIgnore(self, other)
    }

    /// Tries `self`; if it fails without consuming input, tries `other`.
    fn or<P2: Parser<I, Output = Self::Output>>(self, other: P2) -> Or<Self, P2>
    where
        Self: Sized,
    {
        Or(self, other)
    }

    /// Makes the pattern optional: an uncommitted failure yields `None`
    /// without consuming input, a committed failure still propagates.
    fn or_not(self) -> OrNot<Self>
    where
        Self: Sized,
    {
        OrNot(self)
    }

    /// Parses zero or more repetitions, stopping at the first uncommitted
    /// failure or at the end of input. A committed failure mid-stream
    /// propagates.
    fn repeated(self) -> Repeated<Self>
    where
        Self: Sized,
    {
        Repeated(self, 0)
    }

    /// Parses items separated by `sep`, allowing zero items.
    fn separated_by<P2: Parser<I>>(self, sep: P2) -> SeparatedBy<Self, P2>
    where
        Self: Sized,
    {
        SeparatedBy(self, sep)
    }

    /// Parses the pattern between `open` and `close`, discarding both
    /// delimiters.
    fn delimited_by<L: Parser<I>, R: Parser<I>>(self, open: L, close: R) -> DelimitedBy<L, Self, R>
    where
        Self: Sized,
    {
        DelimitedBy(open, self, close)
    }

    /// Names the construct for diagnostics. An uncommitted failure has its
    /// expectation set replaced by the label; a committed failure gains the
    /// label as parsing context if it has none yet.
    fn labelled(self, label: &'static str) -> Labelled<Self>
    where
        Self: Sized,
    {
        Labelled(self, label)
    }

    /// Reports success as not-consumed and forces failures to be uncommitted,
    /// restoring backtracking around a multi-item pattern.
    fn attempt(self) -> Attempt<Self>
    where
        Self: Sized,
    {
        Attempt(self)
    }

    /// Pairs the output with the position where the pattern started.
    fn positioned(self) -> Positioned<Self>
    where
        Self: Sized,
    {
        Positioned(self)
    }

    /// Left-folds an output of shape `(first, rest)` into a single value.
    fn foldl<A, B, F: Fn(A, B) -> A>(self, f: F) -> Foldl<Self, F>
    where
        Self: Parser<I, Output = (A, Vec<B>)> + Sized,
    {
        Foldl(self, f)
    }

    /// Right-folds an output of shape `(prefixes, last)` into a single value.
    fn foldr<A, B, F: Fn(A, B) -> B>(self, f: F) -> Foldr<Self, F>
    where
        Self: Parser<I, Output = (Vec<A>, B)> + Sized,
    {
        Foldr(self, f)
    }

    /// Boxes the parser behind a shared pointer so it can be named, cloned
    /// and stored in recursive grammar slots.
    fn boxed<'p>(self) -> BoxedParser<'p, I, Self::Output>
    where
        Self: Sized + 'p,
    {
        BoxedParser(Rc::new(self))
    }
}

impl<I: Input, T: Parser<I> + ?Sized> Parser<I> for &T {
    type Output = T::Output;

    fn run(&self, input: I) -> PResult<I, Self::Output> {
        T::run(*self, input)
    }
}

/// See [`Parser::map`].
#[derive(Debug, Clone)]
pub struct Map<P, F>(P, F);

impl<I: Input, U, P: Parser<I>, F: Fn(P::Output) -> U> Parser<I> for Map<P, F> {
    type Output = U;

    fn run(&self, input: I) -> PResult<I, U> {
        self.0.run(input).map(|s| s.map(&self.1))
    }
}

/// See [`Parser::to`].
#[derive(Debug, Clone)]
pub struct To<P, U>(P, U);

impl<I: Input, U: Clone, P: Parser<I>> Parser<I> for To<P, U> {
    type Output = U;

    fn run(&self, input: I) -> PResult<I, U> {
        self.0.run(input).map(|s| s.map(|_| self.1.clone()))
    }
}

/// See [`Parser::bind`].
#[derive(Debug, Clone)]
pub struct Bind<P, F>(P, F);

impl<I: Input, P: Parser<I>, P2: Parser<I>, F: Fn(P::Output) -> P2> Parser<I> for Bind<P, F> {
    type Output = P2::Output;

    fn run(&self, input: I) -> PResult<I, P2::Output> {
        let Success {
            output,
            rest,
            consumed,
            best_alt,
        } = self.0.run(input)?;
        let next = (self.1)(output);
        let second = next.run(rest.clone());
        let first = Success {
            output: (),
            rest,
            consumed,
            best_alt,
        };
        seq_step(first, second).map(|s| s.map(|((), out)| out))
    }
}

/// See [`Parser::then`].
#[derive(Debug, Clone)]
pub struct Then<P1, P2>(P1, P2);

impl<I: Input, P1: Parser<I>, P2: Parser<I>> Parser<I> for Then<P1, P2> {
    type Output = (P1::Output, P2::Output);

    fn run(&self, input: I) -> PResult<I, Self::Output> {
        let first = self.0.run(input)?;
        let rest = first.rest.clone();
        seq_step(first, self.1.run(rest))
    }
}

/// See [`Parser::ignore_then`].
#[derive(Debug, Clone)]
pub struct IgnoreThen<P1, P2>(P1, P2);

impl<I: Input, P1: Parser<I>, P2: Parser<I>> Parser<I> for IgnoreThen<P1, P2> {
    type Output = P2::Output;

    fn run(&self, input: I) -> PResult<I, Self::Output> {
        let first = self.0.run(input)?;
        let rest = first.rest.clone();
        seq_step(first, self.1.run(rest)).map(|s| s.map(|(_, out)| out))
    }
}

/// See [`Parser::then_ignore`].
#[derive(Debug, Clone)]
pub struct ThenIgnore<P1, P2>(P1, P2);

impl<I: Input, P1: Parser<I>, P2: Parser<I>> Parser<I> for ThenIgnore<P1, P2> {
    type Output = P1::Output;

    fn run(&self, input: I) -> PResult<I, Self::Output> {
        let first = self.0.run(input)?;
        let rest = first.rest.clone();
        seq_step(first, self.1.run(rest)).map(|s| s.map(|(out, _)| out))
    }
}

/// See [`Parser::or`].
#[derive(Debug, Clone)]
pub struct Or<P1, P2>(P1, P2);

impl<I: Input, O, P1: Parser<I, Output = O>, P2: Parser<I, Output = O>> Parser<I> for Or<P1, P2> {
    type Output = O;

    fn run(&self, input: I) -> PResult<I, O> {
        match self.0.run(input.clone()) {
            Ok(s) => Ok(s),
            Err(e1) if e1.consumed => Err(e1),
            Err(e1) => match self.1.run(input) {
                Ok(s) => Ok(attach_alt(s, e1)),
                Err(e2) => Err(alt_step(e1, e2)),
            },
        }
    }
}

/// See [`Parser::or_not`].
#[derive(Debug, Clone)]
pub struct OrNot<P>(P);

impl<I: Input, P: Parser<I>> Parser<I> for OrNot<P> {
    type Output = Option<P::Output>;

    fn run(&self, input: I) -> PResult<I, Self::Output> {
        match self.0.run(input.clone()) {
            Ok(s) => Ok(s.map(Some)),
            Err(e) if e.consumed => Err(e),
            Err(e) => Ok(attach_alt(
                Success {
                    output: None,
                    rest: input,
                    consumed: false,
                    best_alt: None,
                },
                e,
            )),
        }
    }
}

/// See [`Parser::repeated`].
#[derive(Debug, Clone)]
pub struct Repeated<P>(P, usize);

impl<P> Repeated<P> {
    /// Requires at least `min` repetitions.
    #[must_use]
    pub fn at_least(self, min: usize) -> Self {
        Self(self.0, min)
    }
}

impl<I: Input, P: Parser<I>> Parser<I> for Repeated<P>
where
    I::Pos: PartialOrd,
{
    type Output = Vec<P::Output>;

    fn run(&self, input: I) -> PResult<I, Self::Output> {
        let mut outputs = Vec::new();
        let mut cursor = input;
        let mut consumed = false;
        let mut best: Option<Failure<I::Pos>> = None;
        loop {
            if cursor.is_empty() {
                break;
            }
            match self.0.run(cursor.clone()) {
                Ok(s) => {
                    let progressed = s.rest.pos() > cursor.pos();
                    best = merge_alts(best, s.best_alt);
                    outputs.push(s.output);
                    consumed |= s.consumed;
                    cursor = s.rest;
                    if !progressed {
                        break;
                    }
                }
                Err(e) if e.consumed => {
                    let mut err = match best {
                        Some(alt) => e.merge(alt),
                        None => e,
                    };
                    err.consumed = true;
                    return Err(err);
                }
                Err(e) => {
                    best = merge_alts(best, Some(e));
                    break;
                }
            }
        }
        if outputs.len() < self.1 {
            return Err(match best {
                Some(err) => err,
                None => Failure::message(cursor.pos(), UNEXPECTED),
            });
        }
        Ok(Success {
            output: outputs,
            rest: cursor,
            consumed,
            best_alt: best,
        })
    }
}

/// See [`Parser::separated_by`].
#[derive(Debug, Clone)]
pub struct SeparatedBy<P, S>(P, S);

impl<I: Input, P: Parser<I>, S: Parser<I>> Parser<I> for SeparatedBy<P, S> {
    type Output = Vec<P::Output>;

    fn run(&self, input: I) -> PResult<I, Self::Output> {
        let first = match self.0.run(input.clone()) {
            Ok(s) => s,
            Err(e) if e.consumed => return Err(e),
            Err(e) => {
                return Ok(attach_alt(
                    Success {
                        output: Vec::new(),
                        rest: input,
                        consumed: false,
                        best_alt: None,
                    },
                    e,
                ));
            }
        };
        let mut outputs = vec![first.output];
        let mut cursor = first.rest;
        let mut consumed = first.consumed;
        let mut best = first.best_alt;
        loop {
            let sep = match self.1.run(cursor.clone()) {
                Ok(s) => s,
                Err(e) if e.consumed => {
                    return Err(match best {
                        Some(alt) => e.merge(alt),
                        None => e,
                    });
                }
                Err(e) => {
                    best = merge_alts(best, Some(e));
                    break;
                }
            };
            // an item must follow a separator
            let rest = sep.rest.clone();
            let item = seq_step(sep.map(|_| ()), self.0.run(rest))?;
            outputs.push(item.output.1);
            consumed |= item.consumed;
            best = merge_alts(best, item.best_alt);
            cursor = item.rest;
        }
        Ok(Success {
            output: outputs,
            rest: cursor,
            consumed,
            best_alt: best,
        })
    }
}

/// See [`Parser::delimited_by`].
#[derive(Debug, Clone)]
pub struct DelimitedBy<L, P, R>(L, P, R);

impl<I: Input, L: Parser<I>, P: Parser<I>, R: Parser<I>> Parser<I> for DelimitedBy<L, P, R> {
    type Output = P::Output;

    fn run(&self, input: I) -> PResult<I, Self::Output> {
        let open = self.0.run(input)?;
        let rest = open.rest.clone();
        let inner = seq_step(open, self.1.run(rest))?;
        let rest = inner.rest.clone();
        seq_step(inner, self.2.run(rest)).map(|s| s.map(|((_, out), _)| out))
    }
}

/// See [`Parser::labelled`].
#[derive(Debug, Clone)]
pub struct Labelled<P>(P, &'static str);

impl<I: Input, P: Parser<I>> Parser<I> for Labelled<P> {
    type Output = P::Output;

    fn run(&self, input: I) -> PResult<I, Self::Output> {
        match self.0.run(input) {
            Ok(s) => Ok(s),
            Err(mut e) => {
                if e.consumed {
                    if e.context.is_none() {
                        e.context = Some(self.1);
                    }
                } else {
                    e.expected = BTreeSet::from([Cow::Borrowed(self.1)]);
                }
                Err(e)
            }
        }
    }
}

/// See [`Parser::attempt`].
#[derive(Debug, Clone)]
pub struct Attempt<P>(P);

impl<I: Input, P: Parser<I>> Parser<I> for Attempt<P> {
    type Output = P::Output;

    fn run(&self, input: I) -> PResult<I, Self::Output> {
        match self.0.run(input) {
            Ok(mut s) => {
                s.consumed = false;
                Ok(s)
            }
            Err(mut e) => {
                e.consumed = false;
                Err(e)
            }
        }
    }
}

/// See [`Parser::positioned`].
#[derive(Debug, Clone)]
pub struct Positioned<P>(P);

impl<I: Input, P: Parser<I>> Parser<I> for Positioned<P> {
    type Output = (I::Pos, P::Output);

    fn run(&self, input: I) -> PResult<I, Self::Output> {
        let pos = input.pos();
        self.0.run(input).map(|s| s.map(|out| (pos, out)))
    }
}

/// See [`Parser::foldl`].
#[derive(Debug, Clone)]
pub struct Foldl<P, F>(P, F);

impl<I: Input, A, B, P, F> Parser<I> for Foldl<P, F>
where
    P: Parser<I, Output = (A, Vec<B>)>,
    F: Fn(A, B) -> A,
{
    type Output = A;

    fn run(&self, input: I) -> PResult<I, A> {
        self.0
            .run(input)
            .map(|s| s.map(|(first, rest)| rest.into_iter().fold(first, &self.1)))
    }
}

/// See [`Parser::foldr`].
#[derive(Debug, Clone)]
pub struct Foldr<P, F>(P, F);

impl<I: Input, A, B, P, F> Parser<I> for Foldr<P, F>
where
    P: Parser<I, Output = (Vec<A>, B)>,
    F: Fn(A, B) -> B,
{
    type Output = B;

    fn run(&self, input: I) -> PResult<I, B> {
        self.0
            .run(input)
            .map(|s| s.map(|(prefixes, last)| prefixes.into_iter().rev().fold(last, |acc, a| (self.1)(a, acc))))
    }
}

/// See [`Parser::boxed`].
pub struct BoxedParser<'p, I: Input, O>(Rc<dyn Parser<I, Output = O> + 'p>);

impl<I: Input, O> Clone for BoxedParser<'_, I, O> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<I: Input, O> Parser<I> for BoxedParser<'_, I, O> {
    type Output = O;

    fn run(&self, input: I) -> PResult<I, O> {
        self.0.run(input)
    }
}

/// A late-bound parser slot for mutually recursive grammar non-terminals.
///
/// Declare the slot first, wire it into the productions that reference it,
/// then fill it with [`Recursive::define`] once the full pattern exists.
pub struct Recursive<'p, I: Input, O> {
    slot: Rc<RefCell<Option<BoxedParser<'p, I, O>>>>,
}

impl<I: Input, O> Clone for Recursive<'_, I, O> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<'p, I: Input, O> Recursive<'p, I, O> {
    /// Creates an empty slot.
    #[must_use]
    pub fn declare() -> Self {
        Self {
            slot: Rc::new(RefCell::new(None)),
        }
    }

    /// Fills the slot.
    ///
    /// # Panics
    /// Panics if the slot was already defined.
    pub fn define(&self, parser: impl Parser<I, Output = O> + 'p) {
        let previous = self.slot.borrow_mut().replace(parser.boxed());
        assert!(previous.is_none(), "recursive parser defined twice");
    }
}

impl<I: Input, O> Parser<I> for Recursive<'_, I, O> {
    type Output = O;

    fn run(&self, input: I) -> PResult<I, O> {
        let parser = self
            .slot
            .borrow()
            .clone()
            .expect("recursive parser used before definition");
        parser.run(input)
    }
}

/// See [`pure`].
#[derive(Debug, Clone)]
pub struct Pure<O>(O);

impl<I: Input, O: Clone> Parser<I> for Pure<O> {
    type Output = O;

    fn run(&self, input: I) -> PResult<I, O> {
        Ok(Success {
            output: self.0.clone(),
            rest: input,
            consumed: false,
            best_alt: None,
        })
    }
}

/// A parser that consumes nothing and emits `value`.
pub fn pure<O: Clone>(value: O) -> Pure<O> {
    Pure(value)
}

/// See [`fail`].
#[derive(Debug, Clone)]
pub struct Fail(Cow<'static, str>);

impl<I: Input> Parser<I> for Fail {
    type Output = ();

    fn run(&self, input: I) -> PResult<I, ()> {
        Err(Failure::message(input.pos(), self.0.clone()))
    }
}

/// A parser that always fails at the current position with `message`.
pub fn fail(message: impl Into<Cow<'static, str>>) -> Fail {
    Fail(message.into())
}

/// See [`end`].
#[derive(Debug, Clone)]
pub struct End;

impl<I: Input> Parser<I> for End {
    type Output = ();

    fn run(&self, input: I) -> PResult<I, ()> {
        if input.is_empty() {
            Ok(Success {
                output: (),
                rest: input,
                consumed: true,
                best_alt: None,
            })
        } else {
            Err(Failure::expecting(input.pos(), "end of input"))
        }
    }
}

/// A parser that succeeds only at the end of input.
#[must_use]
pub fn end() -> End {
    End
}

/// See [`just`].
#[derive(Debug, Clone)]
pub struct Just(char);

impl<I: Input<Item = char>> Parser<I> for Just {
    type Output = char;

    fn run(&self, input: I) -> PResult<I, char> {
        match input.peek() {
            Some(c) if c == self.0 => Ok(Success {
                output: c,
                rest: input.advance(1),
                consumed: true,
                best_alt: None,
            }),
            _ => Err(Failure::expecting(input.pos(), format!("'{}'", self.0))),
        }
    }
}

/// A parser that accepts exactly the character `c`.
#[must_use]
pub fn just(c: char) -> Just {
    Just(c)
}

/// See [`one_of`].
#[derive(Debug, Clone)]
pub struct OneOf(&'static str);

impl<I: Input<Item = char>> Parser<I> for OneOf {
    type Output = char;

    fn run(&self, input: I) -> PResult<I, char> {
        match input.peek() {
            Some(c) if self.0.contains(c) => Ok(Success {
                output: c,
                rest: input.advance(1),
                consumed: true,
                best_alt: None,
            }),
            _ => Err(Failure::expecting(input.pos(), format!("one of '{}'", self.0))),
        }
    }
}

/// A parser that accepts any character in `set`.
#[must_use]
pub fn one_of(set: &'static str) -> OneOf {
    OneOf(set)
}

/// See [`none_of`].
#[derive(Debug, Clone)]
pub struct NoneOf(&'static str);

impl<I: Input<Item = char>> Parser<I> for NoneOf {
    type Output = char;

    fn run(&self, input: I) -> PResult<I, char> {
        match input.peek() {
            Some(c) if !self.0.contains(c) => Ok(Success {
                output: c,
                rest: input.advance(1),
                consumed: true,
                best_alt: None,
            }),
            _ => Err(Failure::expecting(
                input.pos(),
                format!("any character except '{}'", self.0),
            )),
        }
    }
}

/// A parser that accepts any character not in `set`.
#[must_use]
pub fn none_of(set: &'static str) -> NoneOf {
    NoneOf(set)
}

/// See [`literal`].
#[derive(Debug, Clone)]
pub struct Literal(&'static str);

impl<I: Input<Item = char>> Parser<I> for Literal {
    type Output = &'static str;

    fn run(&self, input: I) -> PResult<I, &'static str> {
        let mut cursor = input.clone();
        for expected in self.0.chars() {
            match cursor.peek() {
                Some(c) if c == expected => cursor = cursor.advance(1),
                _ => return Err(Failure::expecting(input.pos(), format!("'{}'", self.0))),
            }
        }
        Ok(Success {
            output: self.0,
            rest: cursor,
            consumed: true,
            best_alt: None,
        })
    }
}

/// A parser that accepts exactly the character sequence `text`.
#[must_use]
pub fn literal(text: &'static str) -> Literal {
    Literal(text)
}

/// See [`neg_literal`].
#[derive(Debug, Clone)]
pub struct NegLiteral(&'static str);

impl<I: Input<Item = char>> Parser<I> for NegLiteral {
    type Output = char;

    fn run(&self, input: I) -> PResult<I, char> {
        let mut cursor = input.clone();
        let mut matches = true;
        for expected in self.0.chars() {
            match cursor.peek() {
                Some(c) if c == expected => cursor = cursor.advance(1),
                _ => {
                    matches = false;
                    break;
                }
            }
        }
        if matches {
            return Err(Failure::message(input.pos(), UNEXPECTED));
        }
        match input.peek() {
            Some(c) => Ok(Success {
                output: c,
                rest: input.advance(1),
                consumed: true,
                best_alt: None,
            }),
            None => Err(Failure::message(input.pos(), UNEXPECTED)),
        }
    }
}

/// A parser that advances one character as long as the input does not start
/// with `text`.
#[must_use]
pub fn neg_literal(text: &'static str) -> NegLiteral {
    NegLiteral(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::CharInput;

    fn input(src: &str) -> CharInput<'_> {
        CharInput::new(src)
    }

    // Pins the primitives' `Input` type to `CharInput`, mirroring the
    // wrappers in `lex.rs`: the raw free functions are generic over any
    // `Input<Item = char>`, which leaves the compiler unable to infer which
    // one applies in a chain built purely from standalone test values.
    fn just_c<'s>(c: char) -> impl Parser<CharInput<'s>, Output = char> + Clone {
        just(c)
    }

    fn literal_c<'s>(text: &'static str) -> impl Parser<CharInput<'s>, Output = &'static str> + Clone {
        literal(text)
    }

    fn neg_literal_c<'s>(text: &'static str) -> impl Parser<CharInput<'s>, Output = char> + Clone {
        neg_literal(text)
    }

    fn end_c<'s>() -> impl Parser<CharInput<'s>, Output = ()> + Clone {
        end()
    }

    #[test]
    fn just_matches_and_advances() {
        let s = just_c('a').run(input("ab")).unwrap();
        assert_eq!(s.output, 'a');
        assert!(s.consumed);
        assert_eq!(s.rest.peek(), Some('b'));
    }

    #[test]
    fn just_fails_uncommitted() {
        let e = just_c('a').run(input("xy")).unwrap_err();
        assert!(!e.consumed);
        assert!(e.expected.contains("'a'"));
    }

    #[test]
    fn or_backtracks_on_uncommitted_failure() {
        let p = just_c('a').or(just_c('b'));
        assert_eq!(p.run(input("b")).unwrap().output, 'b');
    }

    #[test]
    fn or_unions_expectations_at_equal_positions() {
        let p = just_c('a').or(just_c('b'));
        let e = p.run(input("z")).unwrap_err();
        assert!(e.expected.contains("'a'"));
        assert!(e.expected.contains("'b'"));
    }

    #[test]
    fn committed_failure_stops_alternation() {
        // the first branch consumes 'a' before dying at 'x', so the second
        // branch is never tried even though it would match.
        let p = just_c('a').then(just_c('b')).to("ab").or(literal_c("ax"));
        let e = p.run(input("ax")).unwrap_err();
        assert!(e.consumed);
        assert!(e.expected.contains("'b'"));
    }

    #[test]
    fn attempt_restores_backtracking() {
        let p = just_c('a').then(just_c('b')).to("ab").attempt().or(literal_c("ax"));
        assert_eq!(p.run(input("ax")).unwrap().output, "ax");
    }

    #[test]
    fn sequencing_commits_after_first_consumes() {
        let p = just_c('a').then(just_c('b'));
        let e = p.run(input("ac")).unwrap_err();
        assert!(e.consumed);
        assert!(e.expected.contains("'b'"));
    }

    #[test]
    fn farther_failure_wins_merge() {
        // first branch dies at column 1 (uncommitted via attempt), second at
        // column 0; the deeper failure is reported.
        let p = just_c('a').then(just_c('b')).to('b').attempt().or(just_c('z'));
        let e = p.run(input("ac")).unwrap_err();
        assert_eq!(e.pos.column, 1);
        assert!(e.expected.contains("'b'"));
    }

    #[test]
    fn repeated_collects_until_uncommitted_failure() {
        let p = just_c('a').repeated();
        let s = p.run(input("aaab")).unwrap();
        assert_eq!(s.output.len(), 3);
        assert_eq!(s.rest.peek(), Some('b'));
    }

    #[test]
    fn repeated_propagates_committed_failure() {
        let p = just_c('a').then(just_c('b')).repeated();
        let e = p.run(input("abac")).unwrap_err();
        assert!(e.consumed);
        assert_eq!(e.pos.column, 3);
    }

    #[test]
    fn repeated_at_least_requires_one() {
        let p = just_c('a').repeated().at_least(1);
        assert!(p.run(input("b")).is_err());
        assert!(p.run(input("a")).is_ok());
    }

    #[test]
    fn or_not_defaults_without_consuming() {
        let p = just_c('a').or_not();
        let s = p.run(input("b")).unwrap();
        assert_eq!(s.output, None);
        assert!(!s.consumed);
        assert_eq!(s.rest.peek(), Some('b'));
    }

    #[test]
    fn or_not_propagates_committed_failure() {
        let p = just_c('a').then(just_c('b')).or_not();
        assert!(p.run(input("ac")).is_err());
    }

    #[test]
    fn separated_by_accepts_zero_and_rejects_trailing() {
        let p = just_c('a').separated_by(just_c(','));
        assert_eq!(p.run(input("")).unwrap().output.len(), 0);
        assert_eq!(p.run(input("a,a,a")).unwrap().output.len(), 3);
        assert!(p.run(input("a,")).is_err());
    }

    #[test]
    fn labelled_replaces_expectations_when_uncommitted() {
        let p = just_c('a').or(just_c('b')).labelled("letter");
        let e = p.run(input("z")).unwrap_err();
        assert_eq!(e.expected.len(), 1);
        assert!(e.expected.contains("letter"));
    }

    #[test]
    fn labelled_sets_context_when_committed() {
        let p = just_c('a').then(just_c('b')).labelled("pair");
        let e = p.run(input("ac")).unwrap_err();
        assert!(e.consumed);
        assert_eq!(e.context, Some("pair"));
        assert!(e.expected.contains("'b'"));
    }

    #[test]
    fn end_succeeds_only_at_end() {
        assert!(end_c().run(input("")).is_ok());
        let e = end_c().run(input("x")).unwrap_err();
        assert!(e.expected.contains("end of input"));
    }

    #[test]
    fn neg_literal_stops_at_terminator() {
        let p = neg_literal_c("*/").repeated();
        let s = p.run(input("ab*/")).unwrap();
        assert_eq!(s.output.len(), 2);
        assert_eq!(s.rest.peek(), Some('*'));
    }

    #[test]
    fn deep_failure_survives_successful_alternative() {
        // the first branch reaches offset 2 before dying; the second branch
        // succeeds consuming a single 'a'. A later sequencing failure at
        // offset 1 must surface the deeper diagnosis.
        let deep = literal_c("ab").then(just_c('c')).attempt().map(|_| 'a');
        let p = deep.or(just_c('a')).then(just_c('z'));
        let e = p.run(input("abq")).unwrap_err();
        assert_eq!(e.pos.column, 2);
        assert!(e.expected.contains("'c'"));
    }
}
