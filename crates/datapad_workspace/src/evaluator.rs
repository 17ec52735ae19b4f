//! Pluggable code-evaluation capability.
//!
//! The engine executes generated code through the [`Evaluator`] trait so the
//! execution substrate can vary (trusted in-process interpreter, sandboxed
//! subprocess, remote worker). This module ships the trusted-interpreter
//! variant: a small line-oriented analysis script language with tables,
//! figures, and timestamps.
//!
//! Execution runs to completion or error; there is no mid-flight
//! cancellation. The engine bounds work by retry attempts, not wall-clock
//! time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use datapad_core::{ExecutionError, Figure, FigureKind, Table, Value};

use crate::namespace::Namespace;

/// An explicit display registration made by executed code.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayCall {
    /// The value registered for display
    pub value: Value,
    /// Author-supplied label, if any; unlabeled calls receive sequential
    /// labels at capture time
    pub label: Option<String>,
}

/// Outcome of evaluating one cell's code against a namespace.
#[derive(Debug, Clone, Default)]
pub struct EvalOutcome {
    /// Console text, original whitespace preserved
    pub console_text: String,
    /// Explicit display registrations in registration order
    pub displays: Vec<DisplayCall>,
    /// Runtime error, if execution failed
    pub error: Option<ExecutionError>,
}

impl EvalOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Executes cell code against a mutable namespace.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Run `code` to completion, mutating `namespace` in place.
    ///
    /// Failures are reported in the outcome, not as a transport error; the
    /// namespace keeps whatever bindings executed lines already made.
    async fn execute(&self, code: &str, namespace: &mut Namespace) -> EvalOutcome;
}

/// The trusted in-process interpreter for the datapad script language.
///
/// Supported per line: `name = expr`, bare expressions (echoed to console
/// unless null), `#` comments. Expressions cover literals, lists,
/// arithmetic/comparison, column indexing (`t["col"]`), and a builtin
/// library (`table`, `select`, `filter_gt`, `head`, `count`, `sum`, `mean`,
/// `col`, `t_test`, `show`, `print`, `figure`, `interactive_figure`, `now`,
/// `timestamp`).
#[derive(Debug, Default, Clone)]
pub struct ScriptEvaluator;

impl ScriptEvaluator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Evaluator for ScriptEvaluator {
    async fn execute(&self, code: &str, namespace: &mut Namespace) -> EvalOutcome {
        let mut out = EvalOutcome::default();

        for (idx, raw_line) in code.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let stmt = match parse_line(line) {
                Ok(stmt) => stmt,
                Err(msg) => {
                    out.error = Some(error_at("SyntaxError", &msg, idx + 1, raw_line));
                    return out;
                }
            };

            let mut ctx = EvalCtx {
                namespace,
                console: &mut out.console_text,
                displays: &mut out.displays,
            };

            match exec_stmt(&stmt, &mut ctx) {
                Ok(()) => {}
                Err(e) => {
                    out.error = Some(error_at(&e.error_type, &e.message, idx + 1, raw_line));
                    return out;
                }
            }
        }

        out
    }
}

fn error_at(error_type: &str, message: &str, line_no: usize, source_line: &str) -> ExecutionError {
    let traceback = format!(
        "Traceback (most recent call last):\n  line {}: {}\n{}: {}",
        line_no,
        source_line.trim_end(),
        error_type,
        message
    );
    ExecutionError::new(error_type, message, traceback)
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Assign,
    Op(String),
}

fn tokenize(line: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '"' => {
                let mut s = String::new();
                i += 1;
                let mut closed = false;
                while i < chars.len() {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        s.push(chars[i + 1]);
                        i += 2;
                    } else if chars[i] == '"' {
                        closed = true;
                        i += 1;
                        break;
                    } else {
                        s.push(chars[i]);
                        i += 1;
                    }
                }
                if !closed {
                    return Err("unterminated string literal".to_string());
                }
                tokens.push(Token::Str(s));
            }
            '=' | '>' | '<' | '!' => {
                if i + 1 < chars.len() && chars[i + 1] == '=' {
                    tokens.push(Token::Op(format!("{}=", c)));
                    i += 2;
                } else if c == '=' {
                    tokens.push(Token::Assign);
                    i += 1;
                } else if c == '!' {
                    return Err("unexpected character '!'".to_string());
                } else {
                    tokens.push(Token::Op(c.to_string()));
                    i += 1;
                }
            }
            '+' | '-' | '*' | '/' => {
                tokens.push(Token::Op(c.to_string()));
                i += 1;
            }
            _ if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                if text.contains('.') {
                    let f: f64 = text
                        .parse()
                        .map_err(|_| format!("invalid number literal '{}'", text))?;
                    tokens.push(Token::Float(f));
                } else {
                    let n: i64 = text
                        .parse()
                        .map_err(|_| format!("invalid number literal '{}'", text))?;
                    tokens.push(Token::Int(n));
                }
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
    Ident(String),
    List(Vec<Expr>),
    Unary(Box<Expr>),
    Binary(String, Box<Expr>, Box<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone)]
enum Stmt {
    Assign(String, Expr),
    Expr(Expr),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

fn parse_line(line: &str) -> Result<Stmt, String> {
    let tokens = tokenize(line)?;
    let mut parser = Parser { tokens, pos: 0 };

    // Assignment: IDENT '=' expr
    if let (Some(Token::Ident(name)), Some(Token::Assign)) =
        (parser.peek(0).cloned(), parser.peek(1).cloned())
    {
        parser.pos = 2;
        let expr = parser.expr()?;
        parser.expect_end()?;
        return Ok(Stmt::Assign(name, expr));
    }

    let expr = parser.expr()?;
    parser.expect_end()?;
    Ok(Stmt::Expr(expr))
}

impl Parser {
    fn peek(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek(0) == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), String> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(format!("expected {}", what))
        }
    }

    fn expect_end(&self) -> Result<(), String> {
        if self.pos == self.tokens.len() {
            Ok(())
        } else {
            Err("unexpected trailing tokens".to_string())
        }
    }

    fn expr(&mut self) -> Result<Expr, String> {
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, String> {
        let lhs = self.additive()?;
        if let Some(Token::Op(op)) = self.peek(0) {
            if matches!(op.as_str(), ">" | "<" | ">=" | "<=" | "==" | "!=") {
                let op = op.clone();
                self.pos += 1;
                let rhs = self.additive()?;
                return Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)));
            }
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Expr, String> {
        let mut lhs = self.multiplicative()?;
        while let Some(Token::Op(op)) = self.peek(0) {
            if op == "+" || op == "-" {
                let op = op.clone();
                self.pos += 1;
                let rhs = self.multiplicative()?;
                lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Expr, String> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(op)) = self.peek(0) {
            if op == "*" || op == "/" {
                let op = op.clone();
                self.pos += 1;
                let rhs = self.unary()?;
                lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if let Some(Token::Op(op)) = self.peek(0) {
            if op == "-" {
                self.pos += 1;
                let inner = self.unary()?;
                return Ok(Expr::Unary(Box::new(inner)));
            }
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.primary()?;
        while self.eat(&Token::LBracket) {
            let index = self.expr()?;
            self.expect(Token::RBracket, "']'")?;
            expr = Expr::Index(Box::new(expr), Box::new(index));
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Int(n)) => Ok(Expr::Int(n)),
            Some(Token::Float(f)) => Ok(Expr::Float(f)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "null" => Ok(Expr::Null),
                _ => {
                    if self.eat(&Token::LParen) {
                        let args = self.expr_list(Token::RParen)?;
                        Ok(Expr::Call(name, args))
                    } else {
                        Ok(Expr::Ident(name))
                    }
                }
            },
            Some(Token::LParen) => {
                let expr = self.expr()?;
                self.expect(Token::RParen, "')'")?;
                Ok(expr)
            }
            Some(Token::LBracket) => {
                let items = self.expr_list(Token::RBracket)?;
                Ok(Expr::List(items))
            }
            Some(other) => Err(format!("unexpected token {:?}", other)),
            None => Err("unexpected end of line".to_string()),
        }
    }

    fn expr_list(&mut self, close: Token) -> Result<Vec<Expr>, String> {
        let mut items = Vec::new();
        if self.eat(&close) {
            return Ok(items);
        }
        loop {
            items.push(self.expr()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(close.clone(), "closing delimiter")?;
            return Ok(items);
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

struct EvalCtx<'a> {
    namespace: &'a mut Namespace,
    console: &'a mut String,
    displays: &'a mut Vec<DisplayCall>,
}

struct EvalError {
    error_type: String,
    message: String,
}

impl EvalError {
    fn new(error_type: &str, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.to_string(),
            message: message.into(),
        }
    }

    fn name(name: &str) -> Self {
        Self::new("NameError", format!("name '{}' is not defined", name))
    }

    fn key(key: &str) -> Self {
        Self::new("KeyError", format!("'{}'", key))
    }

    fn ty(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }
}

type EvalResult<T> = Result<T, EvalError>;

fn exec_stmt(stmt: &Stmt, ctx: &mut EvalCtx<'_>) -> EvalResult<()> {
    match stmt {
        Stmt::Assign(name, expr) => {
            let value = eval_expr(expr, ctx)?;
            ctx.namespace.set(name.clone(), value);
        }
        Stmt::Expr(expr) => {
            let value = eval_expr(expr, ctx)?;
            // REPL-style echo; statements that return null stay silent.
            if value != Value::Null {
                ctx.console.push_str(&value.render());
                ctx.console.push('\n');
            }
        }
    }
    Ok(())
}

fn eval_expr(expr: &Expr, ctx: &mut EvalCtx<'_>) -> EvalResult<Value> {
    match expr {
        Expr::Int(n) => Ok(Value::Int(*n)),
        Expr::Float(f) => Ok(Value::Float(*f)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Null => Ok(Value::Null),
        Expr::Ident(name) => ctx
            .namespace
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::name(name)),
        Expr::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval_expr(item, ctx)?);
            }
            Ok(Value::List(values))
        }
        Expr::Unary(inner) => match eval_expr(inner, ctx)? {
            Value::Int(n) => Ok(Value::Int(-n)),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(EvalError::ty(format!("cannot negate {}", other.type_name()))),
        },
        Expr::Binary(op, lhs, rhs) => {
            let l = eval_expr(lhs, ctx)?;
            let r = eval_expr(rhs, ctx)?;
            eval_binary(op, l, r)
        }
        Expr::Index(target, index) => {
            let target = eval_expr(target, ctx)?;
            let index = eval_expr(index, ctx)?;
            eval_index(target, index)
        }
        Expr::Call(name, args) => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_expr(arg, ctx)?);
            }
            call_function(name, values, ctx)
        }
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn eval_binary(op: &str, l: Value, r: Value) -> EvalResult<Value> {
    match op {
        "==" => return Ok(Value::Bool(l == r)),
        "!=" => return Ok(Value::Bool(l != r)),
        _ => {}
    }

    if op == "+" {
        if let (Value::Str(a), Value::Str(b)) = (&l, &r) {
            return Ok(Value::Str(format!("{}{}", a, b)));
        }
    }

    let (a, b) = match (as_f64(&l), as_f64(&r)) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(EvalError::ty(format!(
                "unsupported operand types for '{}': {} and {}",
                op,
                l.type_name(),
                r.type_name()
            )))
        }
    };

    let both_int = matches!((&l, &r), (Value::Int(_), Value::Int(_)));
    match op {
        "+" | "-" | "*" => {
            let v = match op {
                "+" => a + b,
                "-" => a - b,
                _ => a * b,
            };
            if both_int {
                Ok(Value::Int(v as i64))
            } else {
                Ok(Value::Float(v))
            }
        }
        "/" => {
            if b == 0.0 {
                Err(EvalError::new("ZeroDivisionError", "division by zero"))
            } else {
                Ok(Value::Float(a / b))
            }
        }
        ">" => Ok(Value::Bool(a > b)),
        "<" => Ok(Value::Bool(a < b)),
        ">=" => Ok(Value::Bool(a >= b)),
        "<=" => Ok(Value::Bool(a <= b)),
        other => Err(EvalError::ty(format!("unknown operator '{}'", other))),
    }
}

fn eval_index(target: Value, index: Value) -> EvalResult<Value> {
    match (target, index) {
        (Value::Table(t), Value::Str(column)) => {
            let idx = t
                .column_index(&column)
                .ok_or_else(|| EvalError::key(&column))?;
            Ok(Value::List(t.rows.iter().map(|r| r[idx].clone()).collect()))
        }
        (Value::List(items), Value::Int(i)) => {
            let idx = usize::try_from(i)
                .ok()
                .filter(|idx| *idx < items.len())
                .ok_or_else(|| EvalError::new("IndexError", "list index out of range"))?;
            Ok(items[idx].clone())
        }
        (target, index) => Err(EvalError::ty(format!(
            "cannot index {} with {}",
            target.type_name(),
            index.type_name()
        ))),
    }
}

const BUILTINS: &[&str] = &[
    "table",
    "select",
    "filter_gt",
    "head",
    "count",
    "sum",
    "mean",
    "col",
    "t_test",
    "show",
    "print",
    "figure",
    "interactive_figure",
    "now",
    "timestamp",
];

fn call_function(name: &str, args: Vec<Value>, ctx: &mut EvalCtx<'_>) -> EvalResult<Value> {
    if BUILTINS.contains(&name) {
        return call_builtin(name, args, ctx);
    }
    // A namespace binding may alias a builtin through a Callable value.
    match ctx.namespace.get(name).cloned() {
        Some(Value::Callable(builtin)) => call_builtin(&builtin, args, ctx),
        Some(other) => Err(EvalError::ty(format!(
            "{} object is not callable",
            other.type_name()
        ))),
        None => Err(EvalError::name(name)),
    }
}

fn expect_table(value: &Value, func: &str) -> EvalResult<Table> {
    match value {
        Value::Table(t) => Ok(t.clone()),
        other => Err(EvalError::ty(format!(
            "{}() expects a table, got {}",
            func,
            other.type_name()
        ))),
    }
}

fn expect_str(value: &Value, func: &str) -> EvalResult<String> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        other => Err(EvalError::ty(format!(
            "{}() expects a string, got {}",
            func,
            other.type_name()
        ))),
    }
}

fn arity(args: &[Value], expected: usize, func: &str) -> EvalResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(EvalError::ty(format!(
            "{}() takes {} argument(s), got {}",
            func,
            expected,
            args.len()
        )))
    }
}

fn numeric_column(table: &Table, column: &str, func: &str) -> EvalResult<Vec<f64>> {
    let idx = table
        .column_index(column)
        .ok_or_else(|| EvalError::key(column))?;
    table
        .rows
        .iter()
        .map(|row| {
            as_f64(&row[idx]).ok_or_else(|| {
                EvalError::ty(format!(
                    "{}() requires numeric column '{}', got {}",
                    func,
                    column,
                    row[idx].type_name()
                ))
            })
        })
        .collect()
}

fn call_builtin(name: &str, args: Vec<Value>, ctx: &mut EvalCtx<'_>) -> EvalResult<Value> {
    match name {
        "table" => {
            arity(&args, 2, "table")?;
            let columns = match &args[0] {
                Value::List(items) => items
                    .iter()
                    .map(|v| expect_str(v, "table"))
                    .collect::<EvalResult<Vec<String>>>()?,
                other => {
                    return Err(EvalError::ty(format!(
                        "table() expects a list of column names, got {}",
                        other.type_name()
                    )))
                }
            };
            let rows = match &args[1] {
                Value::List(rows) => rows
                    .iter()
                    .map(|row| match row {
                        Value::List(cells) if cells.len() == columns.len() => Ok(cells.clone()),
                        Value::List(cells) => Err(EvalError::ty(format!(
                            "table() row has {} cells, expected {}",
                            cells.len(),
                            columns.len()
                        ))),
                        other => Err(EvalError::ty(format!(
                            "table() expects rows as lists, got {}",
                            other.type_name()
                        ))),
                    })
                    .collect::<EvalResult<Vec<Vec<Value>>>>()?,
                other => {
                    return Err(EvalError::ty(format!(
                        "table() expects a list of rows, got {}",
                        other.type_name()
                    )))
                }
            };
            Ok(Value::Table(Table::new(columns, rows)))
        }
        "select" => {
            if args.len() < 2 {
                return Err(EvalError::ty("select() takes a table and column names"));
            }
            let t = expect_table(&args[0], "select")?;
            let mut indices = Vec::new();
            let mut columns = Vec::new();
            for arg in &args[1..] {
                let c = expect_str(arg, "select")?;
                let idx = t.column_index(&c).ok_or_else(|| EvalError::key(&c))?;
                indices.push(idx);
                columns.push(c);
            }
            let rows = t
                .rows
                .iter()
                .map(|row| indices.iter().map(|i| row[*i].clone()).collect())
                .collect();
            Ok(Value::Table(Table::new(columns, rows)))
        }
        "filter_gt" => {
            arity(&args, 3, "filter_gt")?;
            let t = expect_table(&args[0], "filter_gt")?;
            let column = expect_str(&args[1], "filter_gt")?;
            let threshold = as_f64(&args[2]).ok_or_else(|| {
                EvalError::ty("filter_gt() threshold must be numeric")
            })?;
            let idx = t
                .column_index(&column)
                .ok_or_else(|| EvalError::key(&column))?;
            let rows = t
                .rows
                .iter()
                .filter(|row| as_f64(&row[idx]).map(|v| v > threshold).unwrap_or(false))
                .cloned()
                .collect();
            Ok(Value::Table(Table::new(t.columns.clone(), rows)))
        }
        "head" => {
            arity(&args, 2, "head")?;
            let t = expect_table(&args[0], "head")?;
            let n = match &args[1] {
                Value::Int(n) if *n >= 0 => *n as usize,
                _ => return Err(EvalError::ty("head() count must be a non-negative int")),
            };
            let rows = t.rows.iter().take(n).cloned().collect();
            Ok(Value::Table(Table::new(t.columns.clone(), rows)))
        }
        "count" => {
            arity(&args, 1, "count")?;
            match &args[0] {
                Value::Table(t) => Ok(Value::Int(t.row_count() as i64)),
                Value::List(items) => Ok(Value::Int(items.len() as i64)),
                other => Err(EvalError::ty(format!(
                    "count() expects a table or list, got {}",
                    other.type_name()
                ))),
            }
        }
        "sum" => {
            arity(&args, 2, "sum")?;
            let t = expect_table(&args[0], "sum")?;
            let column = expect_str(&args[1], "sum")?;
            let values = numeric_column(&t, &column, "sum")?;
            Ok(Value::Float(values.iter().sum()))
        }
        "mean" => {
            arity(&args, 2, "mean")?;
            let t = expect_table(&args[0], "mean")?;
            let column = expect_str(&args[1], "mean")?;
            let values = numeric_column(&t, &column, "mean")?;
            if values.is_empty() {
                return Err(EvalError::ty(format!(
                    "mean() of empty column '{}'",
                    column
                )));
            }
            Ok(Value::Float(values.iter().sum::<f64>() / values.len() as f64))
        }
        "col" => {
            arity(&args, 2, "col")?;
            let t = expect_table(&args[0], "col")?;
            let column = expect_str(&args[1], "col")?;
            eval_index(Value::Table(t), Value::Str(column))
        }
        "t_test" => {
            arity(&args, 3, "t_test")?;
            let t = expect_table(&args[0], "t_test")?;
            let column = expect_str(&args[1], "t_test")?;
            let mu = as_f64(&args[2])
                .ok_or_else(|| EvalError::ty("t_test() reference mean must be numeric"))?;
            let values = numeric_column(&t, &column, "t_test")?;
            if values.len() < 2 {
                return Err(EvalError::ty("t_test() needs at least 2 observations"));
            }
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            let statistic = if var == 0.0 {
                0.0
            } else {
                (mean - mu) / (var.sqrt() / n.sqrt())
            };
            let p_value = 2.0 * (1.0 - normal_cdf(statistic.abs()));
            Ok(Value::Table(Table::new(
                vec!["statistic".to_string(), "p_value".to_string()],
                vec![vec![Value::Float(statistic), Value::Float(p_value)]],
            )))
        }
        "show" => {
            if args.is_empty() || args.len() > 2 {
                return Err(EvalError::ty("show() takes a value and an optional label"));
            }
            let label = match args.get(1) {
                Some(v) => Some(expect_str(v, "show")?),
                None => None,
            };
            ctx.displays.push(DisplayCall {
                value: args[0].clone(),
                label,
            });
            Ok(Value::Null)
        }
        "print" => {
            let rendered: Vec<String> = args.iter().map(|v| v.render()).collect();
            ctx.console.push_str(&rendered.join(" "));
            ctx.console.push('\n');
            Ok(Value::Null)
        }
        "figure" => {
            arity(&args, 1, "figure")?;
            let title = expect_str(&args[0], "figure")?;
            Ok(Value::Figure(Figure::new(title, FigureKind::Static)))
        }
        "interactive_figure" => {
            arity(&args, 1, "interactive_figure")?;
            let title = expect_str(&args[0], "interactive_figure")?;
            Ok(Value::Figure(Figure::new(title, FigureKind::Interactive)))
        }
        "now" => {
            arity(&args, 0, "now")?;
            Ok(Value::Timestamp(Some(Utc::now())))
        }
        "timestamp" => {
            // Missing or unparseable temporal input yields a null timestamp,
            // never an error.
            match args.first() {
                None | Some(Value::Null) => Ok(Value::Timestamp(None)),
                Some(Value::Str(s)) => Ok(Value::Timestamp(
                    DateTime::parse_from_rfc3339(s)
                        .ok()
                        .map(|t| t.with_timezone(&Utc)),
                )),
                Some(Value::Timestamp(t)) => Ok(Value::Timestamp(*t)),
                Some(other) => Err(EvalError::ty(format!(
                    "timestamp() expects a string, got {}",
                    other.type_name()
                ))),
            }
        }
        other => Err(EvalError::name(other)),
    }
}

// Abramowitz & Stegun 7.1.26 approximation, good to ~1e-7.
fn normal_cdf(x: f64) -> f64 {
    let t = 1.0 / (1.0 + 0.2316419 * x);
    let poly = t
        * (0.319381530
            + t * (-0.356563782 + t * (1.781477937 + t * (-1.821255978 + t * 1.330274429))));
    1.0 - (-x * x / 2.0).exp() / (2.0 * std::f64::consts::PI).sqrt() * poly
}
