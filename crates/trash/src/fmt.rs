//! Canonical source rendering of the AST.
//!
//! Re-parsing the rendered text yields a structurally equal tree for any
//! tree the parser itself produced. Operands are parenthesized wherever the
//! grammar would otherwise regroup them, so the renderer never has to reason
//! about precedence; parentheses are not recorded in the tree and therefore
//! cost nothing structurally.

use crate::{
    ast::{Block, Expr, ObjectKey, Program, Stmt},
    token::{Token, TokenKind, TokenValue},
    value::number_to_string,
};

/// Renders a program as canonical source.
#[must_use]
pub fn to_source(program: &Program) -> String {
    let mut writer = SourceWriter::default();
    for statement in &program.statements {
        writer.stmt(statement);
    }
    writer.out
}

#[derive(Default)]
struct SourceWriter {
    out: String,
    indent: usize,
}

impl SourceWriter {
    fn push(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn line_start(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
    }

    fn operator(&mut self, kind: TokenKind) {
        self.push(kind.lexeme().expect("operator token has a fixed spelling"));
    }

    /// Writes one statement as complete lines, trailing newline included.
    fn stmt(&mut self, statement: &Stmt) {
        match statement {
            Stmt::Empty => {
                self.line_start();
                self.push(";\n");
            }
            Stmt::Expr(expr) => {
                self.line_start();
                self.stmt_expr(expr);
                self.push(";\n");
            }
            Stmt::Assign { op, target, value } => {
                self.line_start();
                self.assign_inline(op.kind, target, value);
                self.push(";\n");
            }
            Stmt::VarDecl { name, init } => {
                self.line_start();
                self.push("var ");
                self.push(name.identifier_name());
                self.push(" = ");
                self.expr(init);
                self.push(";\n");
            }
            Stmt::Return(expr) => {
                self.line_start();
                self.push("return ");
                self.expr(expr);
                self.push(";\n");
            }
            Stmt::Break => {
                self.line_start();
                self.push("break;\n");
            }
            Stmt::Continue => {
                self.line_start();
                self.push("continue;\n");
            }
            Stmt::Block(block) => {
                self.line_start();
                self.block(block);
                self.push("\n");
            }
            Stmt::If { cond, then, otherwise } => {
                self.line_start();
                self.push("if (");
                self.expr(cond);
                self.push(")\n");
                self.child_stmt(then);
                if let Some(otherwise) = otherwise {
                    self.line_start();
                    self.push("else\n");
                    self.child_stmt(otherwise);
                }
            }
            Stmt::While { cond, body } => {
                self.line_start();
                self.push("while (");
                self.expr(cond);
                self.push(")\n");
                self.child_stmt(body);
            }
            Stmt::For { init, cond, step, body } => {
                self.line_start();
                self.push("for (");
                if let Some(init) = init {
                    self.for_clause(init);
                }
                self.push("; ");
                if let Some(cond) = cond {
                    self.expr(cond);
                }
                self.push("; ");
                if let Some(step) = step {
                    self.for_clause(step);
                }
                self.push(")\n");
                self.child_stmt(body);
            }
        }
    }

    /// Writes a loop or branch body; blocks keep the current indent, single
    /// statements are indented one level.
    fn child_stmt(&mut self, statement: &Stmt) {
        if matches!(statement, Stmt::Block(_)) {
            self.stmt(statement);
        } else {
            self.indent += 1;
            self.stmt(statement);
            self.indent -= 1;
        }
    }

    fn block(&mut self, block: &Block) {
        if block.statements.is_empty() {
            self.push("{}");
            return;
        }
        self.push("{\n");
        self.indent += 1;
        for statement in &block.statements {
            self.stmt(statement);
        }
        self.indent -= 1;
        self.line_start();
        self.push("}");
    }

    /// A `for` header clause: an assignment or declaration with no
    /// terminating semicolon.
    fn for_clause(&mut self, statement: &Stmt) {
        match statement {
            Stmt::VarDecl { name, init } => {
                self.push("var ");
                self.push(name.identifier_name());
                self.push(" = ");
                self.expr(init);
            }
            Stmt::Assign { op, target, value } => {
                self.assign_inline(op.kind, target, value);
            }
            other => {
                // only reachable with a hand-built tree
                self.stmt(other);
            }
        }
    }

    fn assign_inline(&mut self, op: TokenKind, target: &Expr, value: &Expr) {
        self.stmt_expr(target);
        self.push(" ");
        self.operator(op);
        self.push(" ");
        self.expr(value);
    }

    /// An expression in statement position; parenthesized when its leftmost
    /// leaf would otherwise be read as a block or consume the `function`
    /// keyword as a statement.
    fn stmt_expr(&mut self, expr: &Expr) {
        if starts_with_brace_or_function(expr) {
            self.push("(");
            self.expr(expr);
            self.push(")");
        } else {
            self.expr(expr);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(token) => self.literal(token),
            Expr::Identifier(token) => self.push(token.identifier_name()),
            Expr::Object(pairs) => {
                if pairs.is_empty() {
                    self.push("{}");
                    return;
                }
                self.push("{ ");
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    match key {
                        ObjectKey::Ident(token) => self.push(token.identifier_name()),
                        ObjectKey::Computed(expr) => {
                            self.push("[");
                            self.expr(expr);
                            self.push("]");
                        }
                    }
                    self.push(": ");
                    self.expr(value);
                }
                self.push(" }");
            }
            Expr::Function(def) => {
                self.push("function (");
                for (i, param) in def.params.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.push(param.identifier_name());
                }
                self.push(") ");
                self.block(&def.body);
            }
            Expr::Unary { op, rhs } => {
                self.operator(op.kind);
                self.push("(");
                self.expr(rhs);
                self.push(")");
            }
            Expr::Binary { op, lhs, rhs } => {
                self.binary_operand(lhs);
                self.push(" ");
                self.operator(op.kind);
                self.push(" ");
                self.binary_operand(rhs);
            }
            Expr::Call { callee, args } => {
                self.postfix_operand(callee);
                self.push("(");
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(arg);
                }
                self.push(")");
            }
            Expr::Index { lhs, index } => {
                self.postfix_operand(lhs);
                self.push("[");
                self.expr(index);
                self.push("]");
            }
            Expr::Field { lhs, field } => {
                self.postfix_operand(lhs);
                self.push(".");
                self.push(field.identifier_name());
            }
        }
    }

    /// Binary operands are parenthesized when they are themselves operator
    /// applications, freezing the original association.
    fn binary_operand(&mut self, expr: &Expr) {
        if matches!(expr, Expr::Binary { .. } | Expr::Unary { .. }) {
            self.push("(");
            self.expr(expr);
            self.push(")");
        } else {
            self.expr(expr);
        }
    }

    /// The base of a call, dot or bracket access; anything that is not
    /// itself a postfix chain is parenthesized. This also keeps a number
    /// base from fusing with the dot of a field access.
    fn postfix_operand(&mut self, expr: &Expr) {
        if matches!(
            expr,
            Expr::Identifier(_) | Expr::Call { .. } | Expr::Index { .. } | Expr::Field { .. }
        ) {
            self.expr(expr);
        } else {
            self.push("(");
            self.expr(expr);
            self.push(")");
        }
    }

    fn literal(&mut self, token: &Token) {
        match &token.value {
            Some(TokenValue::Nil) => self.push("nil"),
            Some(TokenValue::Bool(true)) => self.push("true"),
            Some(TokenValue::Bool(false)) => self.push("false"),
            Some(TokenValue::Number(n)) => {
                let text = number_to_string(*n);
                self.push(&text);
            }
            Some(TokenValue::Str(s)) => {
                self.push("\"");
                for c in s.chars() {
                    match c {
                        '\\' => self.push("\\\\"),
                        '"' => self.push("\\\""),
                        _ => self.out.push(c),
                    }
                }
                self.push("\"");
            }
            None => self.push(token.kind.lexeme().unwrap_or("nil")),
        }
    }
}

/// True when the leftmost leaf of the expression is an object or function
/// literal. Postfix bases are parenthesized separately, so only binary
/// chains can leak a brace to the front.
fn starts_with_brace_or_function(expr: &Expr) -> bool {
    match expr {
        Expr::Object(_) | Expr::Function(_) => true,
        Expr::Binary { lhs, .. } => starts_with_brace_or_function(lhs),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parse::parse;

    fn roundtrip(source: &str) {
        let first = parse(source).unwrap();
        let rendered = to_source(&first);
        let second = parse(&rendered).unwrap_or_else(|err| panic!("rendered source failed to parse: {err}\n{rendered}"));
        assert_eq!(first, second, "round-trip changed the tree for:\n{rendered}");
    }

    #[test]
    fn roundtrip_expressions() {
        roundtrip("1 - 2 - 3;");
        roundtrip("1 + 2 * 3;");
        roundtrip("-(5) + 4;");
        roundtrip("! (a && b) ^ c;");
        roundtrip("print(\"a\\\"b\\\\c\");");
        roundtrip("f()(1)(2, 3);");
        roundtrip("o.a[0].b(nil, true, false);");
        roundtrip("x = 1.5e300;");
        roundtrip("x = 0.025;");
    }

    #[test]
    fn roundtrip_unary_minus_stays_unary() {
        let source = "var x = - 5;";
        let first = parse(source).unwrap();
        let rendered = to_source(&first);
        assert_eq!(first, parse(&rendered).unwrap());
    }

    #[test]
    fn roundtrip_statements() {
        roundtrip("var a = 1; a += 2; print(a);");
        roundtrip("if (a) print(1); else { print(2); }");
        roundtrip("while (i < 10) { i += 1; continue; }");
        roundtrip("for (var i = 0; i < 4; i += 1) { if (i == 2) continue; break; }");
        roundtrip("for (;;) {}");
        roundtrip(";");
        roundtrip("{ var inner = 1; }");
    }

    #[test]
    fn roundtrip_literals_and_objects() {
        roundtrip("var o = { x: 1, [\"y\"]: 2, [1 + 2]: 3 };");
        roundtrip("var o = {};");
        roundtrip("var f = function (a, b) { return a + b; };");
        roundtrip("var f = function () {};");
        roundtrip("({ x: 1 }).x = 2;");
    }

    #[test]
    fn statement_position_objects_are_parenthesized() {
        let program = parse("({ x: 1 });").unwrap();
        let rendered = to_source(&program);
        assert!(rendered.starts_with("({"), "got: {rendered}");
        roundtrip("({ x: 1 });");
    }
}
