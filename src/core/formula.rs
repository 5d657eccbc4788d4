//! Scalar formulas over the partial index `i`.
//!
//! Formulas are parsed by a small front-end and handed to rhai as fully
//! parenthesized expressions, so they read like plain arithmetic on reals:
//! - `^` is right-associative exponentiation and binds tighter than unary
//!   minus (`-i^2 == -(i^2)`, `2^-i == 2^(-i)`),
//! - every literal is a real (`1/2 == 0.5`, `.5 == 0.5`, no integer overflow),
//! - `log2`, `min` and `max` take and return reals.
//!
//! Anything outside `+ - * / ^`, parentheses, literals, names and calls is a
//! parse error.

use rhai::{AST, Dynamic, Engine, FLOAT, Scope};

const MAX_OPERATIONS: u64 = 10_000;
const MAX_EXPR_DEPTH: usize = 64;

/// Shared rhai engine with the formula function set registered.
pub struct FormulaEngine {
    engine: Engine,
}

impl Default for FormulaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FormulaEngine {
    pub fn new() -> Self {
        let mut engine = Engine::new();
        engine.set_max_operations(MAX_OPERATIONS);
        engine.set_max_expr_depths(MAX_EXPR_DEPTH, MAX_EXPR_DEPTH);

        // the front-end emits only float literals and `i` is a float
        engine.register_fn("log2", |x: FLOAT| -> FLOAT { x.log2() });
        engine.register_fn("min", |a: FLOAT, b: FLOAT| -> FLOAT { a.min(b) });
        engine.register_fn("max", |a: FLOAT, b: FLOAT| -> FLOAT { a.max(b) });

        Self { engine }
    }

    /// Compile `source` once; parse errors are kept and reported on every evaluation.
    pub fn compile(&self, source: &str) -> Formula {
        let ast = to_rhai(source).and_then(|rewritten| {
            self.engine
                .compile_expression(&rewritten)
                .map_err(|err| err.to_string())
        });
        Formula {
            source: source.to_string(),
            ast,
        }
    }

    /// Evaluate a compiled formula at partial index `i`.
    pub fn eval(&self, formula: &Formula, i: u32) -> Result<f64, FormulaError> {
        let ast = formula
            .ast
            .as_ref()
            .map_err(|msg| FormulaError::Parse(msg.clone()))?;

        let mut scope = Scope::new();
        scope.push_constant("i", i as FLOAT);
        let value: Dynamic = self
            .engine
            .eval_ast_with_scope(&mut scope, ast)
            .map_err(|err| FormulaError::Eval(err.to_string()))?;

        let x = if let Ok(f) = value.as_float() {
            f
        } else if let Ok(n) = value.as_int() {
            n as FLOAT
        } else {
            return Err(FormulaError::NotANumber(value.type_name().to_string()));
        };
        if x.is_finite() {
            Ok(x)
        } else {
            Err(FormulaError::NonFinite)
        }
    }

    /// Evaluate and fall back to `0.0` on any failure.
    #[inline]
    pub fn eval_or_zero(&self, formula: &Formula, i: u32) -> f64 {
        self.eval(formula, i).unwrap_or(0.0)
    }
}

/// A formula compiled against a [`FormulaEngine`].
#[derive(Clone, Debug)]
pub struct Formula {
    source: String,
    ast: Result<AST, String>,
}

impl Formula {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_valid(&self) -> bool {
        self.ast.is_ok()
    }
}

/// Per-term formula failures. Never escapes spectrum generation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    #[error("formula does not parse: {0}")]
    Parse(String),
    #[error("formula evaluation failed: {0}")]
    Eval(String),
    #[error("formula produced a non-number ({0})")]
    NotANumber(String),
    #[error("formula produced a non-finite value")]
    NonFinite,
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Num(String),
    Ident(String),
    Op(char),
    LParen,
    RParen,
    Comma,
}

/// Scan a numeric literal at `start`, normalized to rhai float syntax (`.5` → `0.5`, `2` → `2.0`).
fn scan_number(chars: &[char], start: usize) -> Result<(String, usize), String> {
    let digits = |from: usize| {
        let mut end = from;
        while end < chars.len() && chars[end].is_ascii_digit() {
            end += 1;
        }
        (chars[from..end].iter().collect::<String>(), end)
    };

    let (int_part, mut pos) = digits(start);
    let mut frac_part = String::new();
    if chars.get(pos) == Some(&'.') {
        let (frac, end) = digits(pos + 1);
        frac_part = frac;
        pos = end;
    }
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(format!("malformed number at position {}", start + 1));
    }

    let mut exponent = String::new();
    if matches!(chars.get(pos), Some('e' | 'E')) {
        let mut end = pos + 1;
        if matches!(chars.get(end), Some('+' | '-')) {
            end += 1;
        }
        let (exp_digits, after) = digits(end);
        if exp_digits.is_empty() {
            return Err(format!("malformed exponent at position {}", pos + 1));
        }
        exponent = format!("e{}{}", chars[pos + 1..end].iter().collect::<String>(), exp_digits);
        pos = after;
    }

    let int_part = if int_part.is_empty() { "0".to_string() } else { int_part };
    let frac_part = if frac_part.is_empty() { "0".to_string() } else { frac_part };
    Ok((format!("{int_part}.{frac_part}{exponent}"), pos))
}

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < chars.len() {
        let c = chars[pos];
        match c {
            c if c.is_whitespace() => pos += 1,
            '0'..='9' | '.' => {
                let (lit, next) = scan_number(&chars, pos)?;
                tokens.push(Token::Num(lit));
                pos = next;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = pos;
                while pos < chars.len() && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '_') {
                    pos += 1;
                }
                tokens.push(Token::Ident(chars[start..pos].iter().collect()));
            }
            '*' if chars.get(pos + 1) == Some(&'*') => {
                tokens.push(Token::Op('^'));
                pos += 2;
            }
            '+' | '-' | '*' | '/' | '^' => {
                tokens.push(Token::Op(c));
                pos += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                pos += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                pos += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                pos += 1;
            }
            other => return Err(format!("unexpected '{other}' at position {}", pos + 1)),
        }
    }
    Ok(tokens)
}

/// Recursive-descent rewrite into explicitly parenthesized rhai.
///
/// ```text
/// expr  := term (('+' | '-') term)*
/// term  := unary (('*' | '/') unary)*
/// unary := ('-' | '+') unary | power
/// power := atom ('^' unary)?
/// atom  := number | name | name '(' expr (',' expr)* ')' | '(' expr ')'
/// ```
struct Rewriter {
    tokens: Vec<Token>,
    pos: usize,
}

impl Rewriter {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, want: Token) -> Result<(), String> {
        match self.bump() {
            Some(token) if token == want => Ok(()),
            Some(token) => Err(format!("expected {want:?}, found {token:?}")),
            None => Err(format!("expected {want:?}, found end of formula")),
        }
    }

    fn expr(&mut self) -> Result<String, String> {
        let mut lhs = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.term()?;
            lhs = format!("({lhs} {op} {rhs})");
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<String, String> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = format!("({lhs} {op} {rhs})");
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<String, String> {
        match self.peek().cloned() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                Ok(format!("(-{})", self.unary()?))
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<String, String> {
        let base = self.atom()?;
        if matches!(self.peek(), Some(Token::Op('^'))) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(format!("({base} ** {exponent})"));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<String, String> {
        match self.bump() {
            Some(Token::Num(lit)) => Ok(lit),
            Some(Token::Ident(name)) => {
                if self.peek() != Some(&Token::LParen) {
                    return Ok(name);
                }
                self.pos += 1;
                let mut args = vec![self.expr()?];
                while self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                    args.push(self.expr()?);
                }
                self.expect(Token::RParen)?;
                Ok(format!("{name}({})", args.join(", ")))
            }
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(token) => Err(format!("unexpected {token:?}")),
            None => Err("unexpected end of formula".to_string()),
        }
    }
}

/// Rewrite formula syntax into an equivalent rhai expression.
fn to_rhai(source: &str) -> Result<String, String> {
    let mut rewriter = Rewriter {
        tokens: tokenize(source)?,
        pos: 0,
    };
    if rewriter.peek().is_none() {
        return Err("empty formula".to_string());
    }
    let out = rewriter.expr()?;
    match rewriter.peek() {
        None => Ok(out),
        Some(token) => Err(format!("unexpected trailing {token:?}")),
    }
}
