//! Band arithmetic expressions.
//!
//! Formulas such as `(b8-b7)/(b8+b7)` are parsed once into an [`Expr`] tree.
//! Band placeholders (a letter prefix followed by digits, e.g. `b8`) become
//! indices into the expression's placeholder list, so evaluation is a plain
//! tree walk over one `f64` per band with no name lookups.
//!
//! Supported syntax:
//! - numbers: `2`, `0.5`, `1e-3`
//! - placeholders: `b8`, `B13` (case-insensitive)
//! - operators: `+ - * /`, unary `-`, `**` (power, right associative)
//! - functions: `abs sqrt exp log log10` (one argument), `min max pow` (two)
//! - parentheses
//!
//! Evaluation follows IEEE-754: division by zero yields an infinity or NaN
//! rather than an error. Callers decide what a non-finite result means.

use std::collections::HashMap;

use tiler_common::{TilerError, TilerResult};

use crate::bands::BandSpec;

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Abs,
    Sqrt,
    Exp,
    Ln,
    Log10,
    Min,
    Max,
    Pow,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        match name {
            "abs" => Some(Function::Abs),
            "sqrt" => Some(Function::Sqrt),
            "exp" => Some(Function::Exp),
            "log" => Some(Function::Ln),
            "log10" => Some(Function::Log10),
            "min" => Some(Function::Min),
            "max" => Some(Function::Max),
            "pow" => Some(Function::Pow),
            _ => None,
        }
    }

    fn arity(&self) -> usize {
        match self {
            Function::Min | Function::Max | Function::Pow => 2,
            _ => 1,
        }
    }
}

/// Expression tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(f64),
    /// Index into [`Expression::placeholders`].
    Band(usize),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        func: Function,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Evaluate with `bands[i]` bound to placeholder `i`.
    pub fn eval(&self, bands: &[f64]) -> f64 {
        match self {
            Expr::Literal(v) => *v,
            Expr::Band(idx) => bands[*idx],
            Expr::Neg(inner) => -inner.eval(bands),
            Expr::Binary { op, lhs, rhs } => {
                let a = lhs.eval(bands);
                let b = rhs.eval(bands);
                match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Pow => a.powf(b),
                }
            }
            Expr::Call { func, args } => {
                let a = args[0].eval(bands);
                match func {
                    Function::Abs => a.abs(),
                    Function::Sqrt => a.sqrt(),
                    Function::Exp => a.exp(),
                    Function::Ln => a.ln(),
                    Function::Log10 => a.log10(),
                    Function::Min => a.min(args[1].eval(bands)),
                    Function::Max => a.max(args[1].eval(bands)),
                    Function::Pow => a.powf(args[1].eval(bands)),
                }
            }
        }
    }
}

/// A parsed formula with the band placeholders it references.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Expr,
    placeholders: Vec<String>,
}

impl Expression {
    /// Parse a formula. Placeholders are recorded in first-seen order.
    pub fn parse(source: &str) -> TilerResult<Self> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            placeholders: Vec::new(),
        };
        let root = parser.parse_expr()?;
        if let Some(token) = parser.peek() {
            return Err(TilerError::Expression(format!(
                "unexpected {} at offset {} in '{}'",
                token.kind.describe(),
                token.offset,
                source
            )));
        }
        if parser.placeholders.is_empty() {
            return Err(TilerError::Expression(format!(
                "'{}' references no bands",
                source
            )));
        }
        Ok(Self {
            source: source.to_string(),
            root,
            placeholders: parser.placeholders,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// Distinct placeholders (`"b8"`, `"b7"`) in first-seen order.
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// Numeric band identifiers of the placeholders, same order.
    pub fn band_ids(&self) -> Vec<String> {
        self.placeholders
            .iter()
            .map(|p| p.trim_start_matches(|c: char| c.is_ascii_alphabetic()).to_string())
            .collect()
    }

    /// The bands a raster fetch must return for this expression.
    pub fn band_spec(&self) -> TilerResult<BandSpec> {
        BandSpec::new(self.band_ids())
    }

    /// Evaluate for one pixel; `values` follows [`Self::placeholders`] order.
    #[inline]
    pub fn eval(&self, values: &[f64]) -> f64 {
        self.root.eval(values)
    }

    /// Order named planes by placeholder. Every placeholder must be present
    /// and all planes must share one length.
    pub fn bind<'a>(&self, planes: &HashMap<String, &'a [f64]>) -> TilerResult<Vec<&'a [f64]>> {
        let mut bound = Vec::with_capacity(self.placeholders.len());
        for name in &self.placeholders {
            let plane = planes.get(name).ok_or_else(|| {
                TilerError::Expression(format!(
                    "no plane bound to '{}' in '{}'",
                    name, self.source
                ))
            })?;
            bound.push(*plane);
        }
        if let Some(first) = bound.first() {
            if bound.iter().any(|p| p.len() != first.len()) {
                return Err(TilerError::Expression(
                    "bound planes differ in length".to_string(),
                ));
            }
        }
        Ok(bound)
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

// ============================================================================
// Tokenizer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    LParen,
    RParen,
    Comma,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            TokenKind::Number(v) => format!("number {}", v),
            TokenKind::Ident(name) => format!("identifier '{}'", name),
            TokenKind::Plus => "'+'".to_string(),
            TokenKind::Minus => "'-'".to_string(),
            TokenKind::Star => "'*'".to_string(),
            TokenKind::StarStar => "'**'".to_string(),
            TokenKind::Slash => "'/'".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Comma => "','".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn tokenize(source: &str) -> TilerResult<Vec<Token>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        let offset = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '/' => TokenKind::Slash,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            '*' => {
                if bytes.get(i + 1) == Some(&b'*') {
                    i += 1;
                    TokenKind::StarStar
                } else {
                    TokenKind::Star
                }
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                // Exponent: 1e-3, 2E5
                if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                    let mut j = i + 1;
                    if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                        j += 1;
                    }
                    if j < bytes.len() && bytes[j].is_ascii_digit() {
                        while j < bytes.len() && bytes[j].is_ascii_digit() {
                            j += 1;
                        }
                        i = j;
                    }
                }
                let text = &source[start..i];
                let value = text.parse::<f64>().map_err(|_| {
                    TilerError::Expression(format!("invalid number '{}' at offset {}", text, start))
                })?;
                tokens.push(Token {
                    kind: TokenKind::Number(value),
                    offset,
                });
                continue;
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Ident(source[start..i].to_ascii_lowercase()),
                    offset,
                });
                continue;
            }
            other => {
                return Err(TilerError::Expression(format!(
                    "unexpected character '{}' at offset {} in '{}'",
                    other, offset, source
                )))
            }
        };

        tokens.push(Token { kind, offset });
        i += 1;
    }

    Ok(tokens)
}

/// `letters` followed by `digits`, nothing else.
fn is_placeholder(name: &str) -> bool {
    let digits_at = match name.find(|c: char| c.is_ascii_digit()) {
        Some(idx) if idx > 0 => idx,
        _ => return false,
    };
    name[..digits_at].chars().all(|c| c.is_ascii_alphabetic())
        && name[digits_at..].chars().all(|c| c.is_ascii_digit())
}

// ============================================================================
// Parser
// ============================================================================

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    placeholders: Vec<String>,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().map(|t| &t.kind) == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> TilerResult<()> {
        if self.eat(&kind) {
            return Ok(());
        }
        Err(match self.peek() {
            Some(token) => TilerError::Expression(format!(
                "expected {} but found {} at offset {}",
                kind.describe(),
                token.kind.describe(),
                token.offset
            )),
            None => TilerError::Expression(format!(
                "expected {} but the expression ended",
                kind.describe()
            )),
        })
    }

    // expr := term (('+' | '-') term)*
    fn parse_expr(&mut self) -> TilerResult<Expr> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = if self.eat(&TokenKind::Plus) {
                BinaryOp::Add
            } else if self.eat(&TokenKind::Minus) {
                BinaryOp::Sub
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    // term := unary (('*' | '/') unary)*
    fn parse_term(&mut self) -> TilerResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = if self.eat(&TokenKind::Star) {
                BinaryOp::Mul
            } else if self.eat(&TokenKind::Slash) {
                BinaryOp::Div
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    // unary := ('-' | '+') unary | power
    fn parse_unary(&mut self) -> TilerResult<Expr> {
        if self.eat(&TokenKind::Minus) {
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
        }
        if self.eat(&TokenKind::Plus) {
            return self.parse_unary();
        }
        self.parse_power()
    }

    // power := primary ('**' unary)?
    fn parse_power(&mut self) -> TilerResult<Expr> {
        let base = self.parse_primary()?;
        if self.eat(&TokenKind::StarStar) {
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary {
                op: BinaryOp::Pow,
                lhs: Box::new(base),
                rhs: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> TilerResult<Expr> {
        let token = self
            .next()
            .ok_or_else(|| TilerError::Expression("expression ended unexpectedly".to_string()))?;

        match &token.kind {
            TokenKind::Number(v) => Ok(Expr::Literal(*v)),
            TokenKind::LParen => {
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Ident(name) if self.peek().map(|t| &t.kind) == Some(&TokenKind::LParen) => {
                let func = Function::lookup(name).ok_or_else(|| {
                    TilerError::Expression(format!(
                        "unknown function '{}' at offset {}",
                        name, token.offset
                    ))
                })?;
                self.expect(TokenKind::LParen)?;
                let mut args = vec![self.parse_expr()?];
                while self.eat(&TokenKind::Comma) {
                    args.push(self.parse_expr()?);
                }
                self.expect(TokenKind::RParen)?;
                if args.len() != func.arity() {
                    return Err(TilerError::Expression(format!(
                        "'{}' takes {} argument(s), got {}",
                        name,
                        func.arity(),
                        args.len()
                    )));
                }
                Ok(Expr::Call { func, args })
            }
            TokenKind::Ident(name) if is_placeholder(name) => {
                let idx = match self.placeholders.iter().position(|p| p == name) {
                    Some(idx) => idx,
                    None => {
                        self.placeholders.push(name.clone());
                        self.placeholders.len() - 1
                    }
                };
                Ok(Expr::Band(idx))
            }
            TokenKind::Ident(name) => Err(TilerError::Expression(format!(
                "'{}' at offset {} is not a band placeholder (expected e.g. 'b8')",
                name, token.offset
            ))),
            other => Err(TilerError::Expression(format!(
                "unexpected {} at offset {}",
                other.describe(),
                token.offset
            ))),
        }
    }
}
