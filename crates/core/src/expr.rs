//! Parameter expressions used by `expr:` constraints.
//!
//! Supports a small arithmetic language over parameter references:
//!
//! ```text
//! N2_6584A_amp/2.94
//! >2.0*H1_6563A_sigma
//! (O3_5007A_amp+O3_4959A_amp)*0.5
//! ```
//!
//! Grammar (informal):
//! ```text
//! tied     = [">" | "<"] expr
//! expr     = term (("+" | "-") term)*
//! term     = unary (("*" | "/") unary)*
//! unary    = "-" unary | primary
//! primary  = NUMBER | PARAM_REF | "(" expr ")"
//! ```

use crate::error::ExprError;
use crate::param::ParamRef;
use std::fmt;

/// How a tied parameter relates to its expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// The parameter is exactly the expression's value.
    Equal,
    /// `>`: the expression is a floor for a free parameter.
    Greater,
    /// `<`: the expression is a ceiling for a free parameter.
    Less,
}

impl Comparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Equal => "",
            Comparison::Greater => ">",
            Comparison::Less => "<",
        }
    }

    pub fn is_inequality(&self) -> bool {
        !matches!(self, Comparison::Equal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    fn precedence(&self) -> u8 {
        match self {
            BinOp::Add | BinOp::Sub => 1,
            BinOp::Mul | BinOp::Div => 2,
        }
    }

    fn symbol(&self) -> char {
        match self {
            BinOp::Add => '+',
            BinOp::Sub => '-',
            BinOp::Mul => '*',
            BinOp::Div => '/',
        }
    }

    pub fn apply(&self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinOp::Add => lhs + rhs,
            BinOp::Sub => lhs - rhs,
            BinOp::Mul => lhs * rhs,
            BinOp::Div => lhs / rhs,
        }
    }
}

/// A parsed arithmetic expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Ref(ParamRef),
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    /// Parse an expression body (no comparison prefix).
    pub fn parse(input: &str) -> Result<Self, ExprError> {
        let syntax = |detail: String| ExprError::Syntax {
            input: input.to_string(),
            detail,
        };
        let tokens = tokenize(input).map_err(syntax)?;
        if tokens.is_empty() {
            return Err(syntax("empty expression".into()));
        }
        let mut parser = Parser::new(&tokens);
        let expr = parser.parse_expr()?;
        if let Some(tok) = parser.peek() {
            return Err(syntax(format!("unexpected token after expression: {tok:?}")));
        }
        Ok(expr)
    }

    /// Every parameter referenced, in order of appearance (duplicates kept).
    pub fn references(&self) -> Vec<&ParamRef> {
        let mut out = Vec::new();
        self.collect_refs(&mut out);
        out
    }

    fn collect_refs<'a>(&'a self, out: &mut Vec<&'a ParamRef>) {
        match self {
            Expr::Num(_) => {}
            Expr::Ref(r) => out.push(r),
            Expr::Neg(inner) => inner.collect_refs(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_refs(out);
                rhs.collect_refs(out);
            }
        }
    }

    /// Evaluate with a lookup for referenced parameters.
    ///
    /// Returns `None` when a reference has no value or the result is not
    /// finite (e.g. division by zero).
    pub fn evaluate(&self, lookup: &impl Fn(&ParamRef) -> Option<f64>) -> Option<f64> {
        let value = match self {
            Expr::Num(n) => *n,
            Expr::Ref(r) => lookup(r)?,
            Expr::Neg(inner) => -inner.evaluate(lookup)?,
            Expr::Binary { op, lhs, rhs } => op.apply(lhs.evaluate(lookup)?, rhs.evaluate(lookup)?),
        };
        value.is_finite().then_some(value)
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary { op, .. } => op.precedence(),
            _ => 3,
        }
    }
}

impl fmt::Display for Expr {
    /// Canonical text: minimal parentheses, no whitespace. Parsing the output
    /// yields a structurally identical tree.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Num(n) => write!(f, "{n}"),
            Expr::Ref(r) => write!(f, "{r}"),
            Expr::Neg(inner) => {
                if inner.precedence() < 3 {
                    write!(f, "-({inner})")
                } else {
                    write!(f, "-{inner}")
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let prec = op.precedence();
                if lhs.precedence() < prec {
                    write!(f, "({lhs})")?;
                } else {
                    write!(f, "{lhs}")?;
                }
                write!(f, "{}", op.symbol())?;
                // Left-associative grammar: an equal-precedence right operand
                // only round-trips inside parentheses.
                if rhs.precedence() <= prec {
                    write!(f, "({rhs})")
                } else {
                    write!(f, "{rhs}")
                }
            }
        }
    }
}

/// An `expr:` body together with its comparison prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct TiedExpr {
    pub comparison: Comparison,
    pub expr: Expr,
}

impl TiedExpr {
    pub fn parse(input: &str) -> Result<Self, ExprError> {
        let input = input.trim();
        let (comparison, body) = if let Some(rest) = input.strip_prefix('>') {
            (Comparison::Greater, rest)
        } else if let Some(rest) = input.strip_prefix('<') {
            (Comparison::Less, rest)
        } else {
            (Comparison::Equal, input)
        };
        Ok(Self {
            comparison,
            expr: Expr::parse(body)?,
        })
    }
}

impl fmt::Display for TiedExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.comparison.symbol(), self.expr)
    }
}

// ─── Tokenizer / parser ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // Optional exponent: 1e-3, 2.5E+4
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        while j < chars.len() && chars[j].is_ascii_digit() {
                            j += 1;
                        }
                        i = j;
                    }
                }
                let num_str: String = chars[start..i].iter().collect();
                let num: f64 = num_str
                    .parse()
                    .ok()
                    .filter(|n: &f64| n.is_finite())
                    .ok_or_else(|| format!("invalid number: {num_str}"))?;
                tokens.push(Token::Number(num));
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            c => return Err(format!("unexpected character: '{c}'")),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, detail: impl Into<String>) -> ExprError {
        ExprError::Syntax {
            input: format!("{:?}", self.tokens),
            detail: detail.into(),
        }
    }

    // expr = term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.consume();
            let right = self.parse_term()?;
            left = Expr::Binary {
                op,
                lhs: Box::new(left),
                rhs: Box::new(right),
            };
        }
        Ok(left)
    }

    // term = unary (('*' | '/') unary)*
    fn parse_term(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => break,
            };
            self.consume();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                lhs: Box::new(left),
                rhs: Box::new(right),
            };
        }
        Ok(left)
    }

    // unary = '-' unary | primary
    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if let Some(Token::Minus) = self.peek() {
            self.consume();
            let inner = self.parse_unary()?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.parse_primary()
    }

    // primary = NUMBER | PARAM_REF | '(' expr ')'
    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        match self.consume().cloned() {
            Some(Token::Number(n)) => Ok(Expr::Num(n)),
            Some(Token::Ident(name)) => Ok(Expr::Ref(ParamRef::parse(&name)?)),
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                match self.consume() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.error("expected closing parenthesis")),
                }
            }
            Some(tok) => Err(self.error(format!("unexpected token: {tok:?}"))),
            None => Err(self.error("unexpected end of expression")),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
