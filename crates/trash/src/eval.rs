//! Tree-walking evaluator.
//!
//! Two dispatchers: expression evaluation yields a [`Place`] (a value, or an
//! assignable location when the expression is an identifier or a dot/bracket
//! access), statement execution yields a [`Flow`] signal that bubbles
//! `break`/`continue`/`return` to the nearest loop or call boundary without
//! touching the host's unwinding machinery. The current-environment register
//! is restored on every exit path, including errors.

use std::rc::Rc;

use crate::{
    ast::{Block, Expr, FunctionDef, ObjectKey, Program, Stmt},
    env::{EnvId, Environments},
    error::{EvalResult, RuntimeError, RuntimeErrorKind},
    heap::{Heap, HeapId},
    resource::ResourceLimits,
    token::{Position, Token, TokenKind, TokenValue},
    tracer::{EvalTracer, NoopTracer},
    value::{Callable, Indexable, Object, Value},
};

/// Control-flow signal bubbled through statement execution.
#[derive(Debug)]
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Result of evaluating an expression: a plain value, or a storage location
/// when the expression appeared syntactically assignable. Everywhere except
/// an assignment left-hand side the place is immediately dereferenced.
#[derive(Debug)]
enum Place {
    Value(Value),
    Variable { env: EnvId, name: String },
    Accessor { target: HeapId, key: Value },
}

/// Executes programs against an environment tree it owns.
///
/// The evaluator is stateful: globals declared by one [`execute`] call (and
/// closures capturing them) remain visible to the next. It must not be
/// shared between concurrent calls; the current-environment register is a
/// single mutable slot.
///
/// [`execute`]: Evaluator::execute
#[derive(Debug)]
pub struct Evaluator {
    heap: Heap,
    envs: Environments,
    /// Current-environment register.
    env: EnvId,
    global: EnvId,
    depth: usize,
    limits: ResourceLimits,
    tracer: Box<dyn EvalTracer>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    /// Creates an evaluator with an empty global frame.
    #[must_use]
    pub fn new() -> Self {
        let (envs, global) = Environments::new();
        Self {
            heap: Heap::new(),
            envs,
            env: global,
            global,
            depth: 0,
            limits: ResourceLimits::default(),
            tracer: Box::new(NoopTracer),
        }
    }

    /// Replaces the resource limits.
    #[must_use]
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Replaces the tracer.
    #[must_use]
    pub fn with_tracer(mut self, tracer: impl EvalTracer + 'static) -> Self {
        self.tracer = Box::new(tracer);
        self
    }

    /// Declares a host value in the global frame.
    pub fn declare_global(&mut self, name: &str, value: Value) -> EvalResult<()> {
        if self.envs.declare(self.global, name, value) {
            Ok(())
        } else {
            Err(RuntimeError::double_declaration(name))
        }
    }

    /// Wraps a native callable into a function value and declares it in the
    /// global frame.
    pub fn register_native(&mut self, name: &str, callable: impl Callable + 'static) -> EvalResult<()> {
        let value = self.alloc_function(callable);
        self.declare_global(name, value)
    }

    /// Reads a global binding, if present.
    #[must_use]
    pub fn global(&self, name: &str) -> Option<Value> {
        self.envs.get(self.global, name).cloned()
    }

    /// Allocates a host callable on the heap, yielding a function value.
    pub fn alloc_function(&mut self, callable: impl Callable + 'static) -> Value {
        Value::Function(self.heap.alloc_function(Rc::new(callable)))
    }

    /// Allocates a host indexable on the heap, yielding an object value.
    pub fn alloc_object(&mut self, object: impl Indexable + 'static) -> Value {
        Value::Object(self.heap.alloc_object(Box::new(object)))
    }

    /// Allocates a fresh empty built-in object.
    pub fn new_object(&mut self) -> Value {
        self.alloc_object(Object::new())
    }

    /// Reads `target[key]`; the target must be an object value.
    pub fn index_get(&self, target: &Value, key: &Value) -> EvalResult<Value> {
        match target {
            Value::Object(id) => Ok(self.heap.object(*id).get(key)),
            other => Err(RuntimeError::new(
                RuntimeErrorKind::TypeMismatch,
                format!("{} cannot be indexed", other.type_name()),
            )),
        }
    }

    /// Writes `target[key] = value`; the target must be an object value.
    pub fn index_set(&mut self, target: &Value, key: Value, value: Value) -> EvalResult<()> {
        match target {
            Value::Object(id) => {
                self.heap.object_mut(*id).set(key, value);
                Ok(())
            }
            other => Err(RuntimeError::new(
                RuntimeErrorKind::TypeMismatch,
                format!("{} cannot be indexed", other.type_name()),
            )),
        }
    }

    /// Invokes a callable value with already-evaluated arguments. Also the
    /// host's way of calling script closures it received.
    pub fn call(&mut self, callee: &Value, args: Vec<Value>) -> EvalResult<Value> {
        let Value::Function(id) = callee else {
            return Err(RuntimeError::new(
                RuntimeErrorKind::TypeMismatch,
                format!("{} is not callable", callee.type_name()),
            ));
        };
        if !self.limits.allows_depth(self.depth) {
            return Err(RuntimeError::new(
                RuntimeErrorKind::StackOverflow,
                "maximum call depth exceeded",
            ));
        }
        let callable = self.heap.function(*id);
        self.depth += 1;
        self.tracer.on_call(self.depth);
        let result = callable.call(self, args);
        self.depth -= 1;
        self.tracer.on_return(self.depth);
        result
    }

    /// Runs a program's top-level statements in the global frame.
    ///
    /// A top-level `return` ends the run; a stray `break`/`continue` is an
    /// error. Any failure is fatal to this call, but globals committed
    /// before it remain visible to later calls.
    pub fn execute(&mut self, program: &Program) -> EvalResult<()> {
        for statement in &program.statements {
            match self.exec_stmt(statement)? {
                Flow::Normal => {}
                Flow::Return(_) => break,
                Flow::Break | Flow::Continue => return Err(stray_break_continue()),
            }
        }
        Ok(())
    }

    fn exec_stmt(&mut self, statement: &Stmt) -> EvalResult<Flow> {
        self.tracer.on_statement(statement);
        match statement {
            Stmt::Empty => Ok(Flow::Normal),
            Stmt::Expr(expr) => {
                self.eval_value(expr)?;
                Ok(Flow::Normal)
            }
            Stmt::VarDecl { name, init } => {
                let value = self.eval_value(init)?;
                let name_str = name.identifier_name();
                if self.envs.declare(self.env, name_str, value) {
                    Ok(Flow::Normal)
                } else {
                    Err(RuntimeError::double_declaration(name_str).at(name.position))
                }
            }
            Stmt::Assign { op, target, value } => {
                let place = self.eval_expr(target)?;
                if matches!(place, Place::Value(_)) {
                    return Err(RuntimeError::with_position(
                        RuntimeErrorKind::NotAssignable,
                        "left side of assignment is not a variable or an indexed access",
                        op.position,
                    ));
                }
                let rhs = self.eval_value(value)?;
                let result = if op.kind == TokenKind::Equal {
                    rhs
                } else {
                    let current = self.read_place(&place)?;
                    self.binary_op(compound_base(op.kind)?, op.position, current, rhs)?
                };
                self.write_place(place, result)?;
                Ok(Flow::Normal)
            }
            Stmt::Return(expr) => Ok(Flow::Return(self.eval_value(expr)?)),
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Block(block) => self.exec_block(block),
            Stmt::If { cond, then, otherwise } => {
                if self.eval_value(cond)?.truthy() {
                    self.exec_stmt(then)
                } else if let Some(otherwise) = otherwise {
                    self.exec_stmt(otherwise)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { cond, body } => {
                while self.eval_value(cond)?.truthy() {
                    match self.exec_stmt(body)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For { init, cond, step, body } => {
                let frame = self.envs.extend(self.env);
                let saved = self.env;
                self.env = frame;
                let result = self.exec_for(init.as_deref(), cond.as_ref(), step.as_deref(), body);
                self.env = saved;
                self.envs.release(frame);
                result
            }
        }
    }

    fn exec_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        step: Option<&Stmt>,
        body: &Stmt,
    ) -> EvalResult<Flow> {
        if let Some(init) = init {
            self.exec_stmt(init)?;
        }
        loop {
            let looping = match cond {
                Some(cond) => self.eval_value(cond)?.truthy(),
                None => true,
            };
            if !looping {
                break;
            }
            match self.exec_stmt(body)? {
                Flow::Normal | Flow::Continue => {}
                Flow::Break => break,
                flow @ Flow::Return(_) => return Ok(flow),
            }
            if let Some(step) = step {
                self.exec_stmt(step)?;
            }
        }
        Ok(Flow::Normal)
    }

    /// Runs a block in a fresh child frame, propagating the first non-normal
    /// signal. The frame is released (or kept, if a closure captured it) and
    /// the environment register restored on every exit path.
    fn exec_block(&mut self, block: &Block) -> EvalResult<Flow> {
        let frame = self.envs.extend(self.env);
        let saved = self.env;
        self.env = frame;
        let result = self.exec_statements(&block.statements);
        self.env = saved;
        self.envs.release(frame);
        result
    }

    fn exec_statements(&mut self, statements: &[Stmt]) -> EvalResult<Flow> {
        for statement in statements {
            let flow = self.exec_stmt(statement)?;
            if !matches!(flow, Flow::Normal) {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn eval_value(&mut self, expr: &Expr) -> EvalResult<Value> {
        let place = self.eval_expr(expr)?;
        self.read_place(&place)
    }

    fn eval_expr(&mut self, expr: &Expr) -> EvalResult<Place> {
        match expr {
            Expr::Literal(token) => literal_value(token).map(Place::Value),
            Expr::Identifier(token) => Ok(Place::Variable {
                env: self.env,
                name: token.identifier_name().to_owned(),
            }),
            Expr::Object(pairs) => self.eval_object(pairs).map(Place::Value),
            Expr::Function(def) => {
                // capture by reference: the frame chain must outlive this scope
                self.envs.retain(self.env);
                let closure = ScriptFunction {
                    def: Rc::clone(def),
                    env: self.env,
                };
                Ok(Place::Value(self.alloc_function(closure)))
            }
            Expr::Unary { op, rhs } => {
                let value = self.eval_value(rhs)?;
                unary_op(op, value).map(Place::Value)
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval_value(lhs)?;
                let rhs = self.eval_value(rhs)?;
                self.binary_op(op.kind, op.position, lhs, rhs).map(Place::Value)
            }
            Expr::Call { callee, args } => {
                let callee = self.eval_value(callee)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_value(arg)?);
                }
                self.call(&callee, values).map(Place::Value)
            }
            Expr::Index { lhs, index } => {
                let target = self.eval_value(lhs)?;
                let key = self.eval_value(index)?;
                let target = expect_object(&target, None)?;
                Ok(Place::Accessor { target, key })
            }
            Expr::Field { lhs, field } => {
                let target = self.eval_value(lhs)?;
                let target = expect_object(&target, Some(field.position))?;
                Ok(Place::Accessor {
                    target,
                    key: Value::string(field.identifier_name()),
                })
            }
        }
    }

    fn eval_object(&mut self, pairs: &[(ObjectKey, Expr)]) -> EvalResult<Value> {
        let mut object = Object::new();
        for (key, value_expr) in pairs {
            let key = match key {
                ObjectKey::Ident(token) => Value::string(token.identifier_name()),
                ObjectKey::Computed(expr) => self.eval_value(expr)?,
            };
            let value = self.eval_value(value_expr)?;
            object.set(key, value);
        }
        Ok(self.alloc_object(object))
    }

    fn read_place(&self, place: &Place) -> EvalResult<Value> {
        match place {
            Place::Value(value) => Ok(value.clone()),
            Place::Variable { env, name } => self
                .envs
                .get(*env, name)
                .cloned()
                .ok_or_else(|| RuntimeError::undeclared(name)),
            Place::Accessor { target, key } => Ok(self.heap.object(*target).get(key)),
        }
    }

    fn write_place(&mut self, place: Place, value: Value) -> EvalResult<()> {
        match place {
            Place::Value(_) => Err(RuntimeError::new(
                RuntimeErrorKind::NotAssignable,
                "left side of assignment is not a variable or an indexed access",
            )),
            Place::Variable { env, name } => {
                if self.envs.set(env, &name, value) {
                    Ok(())
                } else {
                    Err(RuntimeError::undeclared(&name))
                }
            }
            Place::Accessor { target, key } => {
                self.heap.object_mut(target).set(key, value);
                Ok(())
            }
        }
    }

    fn binary_op(&self, kind: TokenKind, position: Position, lhs: Value, rhs: Value) -> EvalResult<Value> {
        use TokenKind as K;
        match kind {
            K::Plus => match (lhs, rhs) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(Rc::from(format!("{a}{b}")))),
                (lhs, rhs) => Err(RuntimeError::with_position(
                    RuntimeErrorKind::TypeMismatch,
                    format!(
                        "operator '+' expects two numbers or two strings, got {} and {}",
                        lhs.type_name(),
                        rhs.type_name()
                    ),
                    position,
                )),
            },
            K::Minus | K::Star | K::Slash | K::Percent => {
                let (a, b) = numeric_operands(kind, position, lhs, rhs)?;
                // division and remainder follow IEEE-754; dividing by zero
                // yields an infinity or NaN rather than an error
                Ok(Value::Number(match kind {
                    K::Minus => a - b,
                    K::Star => a * b,
                    K::Slash => a / b,
                    _ => a % b,
                }))
            }
            K::Less | K::LessEqual | K::Greater | K::GreaterEqual => {
                let (a, b) = numeric_operands(kind, position, lhs, rhs)?;
                Ok(Value::Bool(match kind {
                    K::Less => a < b,
                    K::LessEqual => a <= b,
                    K::Greater => a > b,
                    _ => a >= b,
                }))
            }
            K::EqualEqual => Ok(Value::Bool(lhs == rhs)),
            K::BangEqual => Ok(Value::Bool(lhs != rhs)),
            K::Caret => Ok(Value::Bool(lhs.truthy() ^ rhs.truthy())),
            // both operands were evaluated before we got here; the logical
            // operators deliberately do not short-circuit
            K::AmpAmp => Ok(Value::Bool(lhs.truthy() && rhs.truthy())),
            K::PipePipe => Ok(Value::Bool(lhs.truthy() || rhs.truthy())),
            other => Err(RuntimeError::internal(format!("unexpected binary operator {other}"))),
        }
    }
}

/// A script closure: the function definition plus the frame it captured.
#[derive(Debug)]
struct ScriptFunction {
    def: Rc<FunctionDef>,
    env: EnvId,
}

impl Callable for ScriptFunction {
    fn call(&self, evaluator: &mut Evaluator, args: Vec<Value>) -> EvalResult<Value> {
        let params = &self.def.params;
        if args.len() != params.len() {
            return Err(RuntimeError::new(
                RuntimeErrorKind::Arity,
                format!("function expects {} argument(s), got {}", params.len(), args.len()),
            ));
        }
        let frame = evaluator.envs.extend(self.env);
        for (param, value) in params.iter().zip(args) {
            let name = param.identifier_name();
            if !evaluator.envs.declare(frame, name, value) {
                evaluator.envs.release(frame);
                return Err(RuntimeError::double_declaration(name).at(param.position));
            }
        }
        let saved = evaluator.env;
        evaluator.env = frame;
        let result = evaluator.exec_block(&self.def.body);
        evaluator.env = saved;
        evaluator.envs.release(frame);
        match result? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
            Flow::Break | Flow::Continue => Err(stray_break_continue()),
        }
    }
}

fn stray_break_continue() -> RuntimeError {
    RuntimeError::new(
        RuntimeErrorKind::StrayBreakContinue,
        "break or continue outside of a loop",
    )
}

fn expect_object(value: &Value, position: Option<Position>) -> EvalResult<HeapId> {
    match value {
        Value::Object(id) => Ok(*id),
        other => {
            let message = format!("{} cannot be indexed", other.type_name());
            Err(match position {
                Some(position) => RuntimeError::with_position(RuntimeErrorKind::TypeMismatch, message, position),
                None => RuntimeError::new(RuntimeErrorKind::TypeMismatch, message),
            })
        }
    }
}

fn unary_op(op: &Token, value: Value) -> EvalResult<Value> {
    match op.kind {
        TokenKind::Bang => Ok(Value::Bool(!value.truthy())),
        TokenKind::Minus => match value {
            Value::Number(n) => Ok(Value::Number(-n)),
            other => Err(RuntimeError::with_position(
                RuntimeErrorKind::TypeMismatch,
                format!("operator '-' expects a number, got {}", other.type_name()),
                op.position,
            )),
        },
        // unary '+' is the identity on any value; only '-' checks its operand
        TokenKind::Plus => Ok(value),
        other => Err(RuntimeError::internal(format!("unexpected unary operator {other}"))),
    }
}

fn numeric_operands(kind: TokenKind, position: Position, lhs: Value, rhs: Value) -> EvalResult<(f64, f64)> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok((a, b)),
        (lhs, rhs) => Err(RuntimeError::with_position(
            RuntimeErrorKind::TypeMismatch,
            format!(
                "operator {} expects numbers, got {} and {}",
                kind,
                lhs.type_name(),
                rhs.type_name()
            ),
            position,
        )),
    }
}

/// Maps a compound assignment operator to the binary operator it applies.
fn compound_base(kind: TokenKind) -> EvalResult<TokenKind> {
    match kind {
        TokenKind::PlusEqual => Ok(TokenKind::Plus),
        TokenKind::MinusEqual => Ok(TokenKind::Minus),
        TokenKind::StarEqual => Ok(TokenKind::Star),
        TokenKind::SlashEqual => Ok(TokenKind::Slash),
        TokenKind::PercentEqual => Ok(TokenKind::Percent),
        other => Err(RuntimeError::internal(format!("unexpected assignment operator {other}"))),
    }
}

/// Decodes a literal token's payload into a runtime value.
fn literal_value(token: &Token) -> EvalResult<Value> {
    match &token.value {
        Some(TokenValue::Nil) => Ok(Value::Nil),
        Some(TokenValue::Bool(b)) => Ok(Value::Bool(*b)),
        Some(TokenValue::Number(n)) => Ok(Value::Number(*n)),
        Some(TokenValue::Str(s)) => Ok(Value::string(s)),
        None => Err(RuntimeError::internal(format!(
            "literal token {} carries no value",
            token.kind
        ))),
    }
}
