//! Safe arithmetic evaluator backing the `calculator` tool.
//!
//! User input is normalized, parsed into an expression tree by a
//! recursive-descent parser, and walked bottom-up. Every operator and
//! function the evaluator will apply is a member of a closed enum or an
//! explicit match arm, so anything outside the arithmetic whitelist is
//! rejected before it can execute. There is no fallback evaluation path.
//!
//! The tool contract is string in, string out: [`calculate`] never returns
//! an error value and never panics on user input. Failures come back as
//! `Error: ...` strings with the offending expression embedded.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Decimal expansions substituted for the named constants before parsing.
const PI_LITERAL: &str = "3.141592653589793";
const E_LITERAL: &str = "2.718281828459045";

/// Hard cap on expression nesting. Parsing and evaluation both recurse, so
/// unbounded nesting from hostile input would blow the stack.
const MAX_DEPTH: usize = 100;

#[derive(Debug, Error, PartialEq)]
pub enum CalcError {
    #[error("Empty or invalid expression")]
    EmptyInput,
    #[error("Invalid syntax")]
    Syntax,
    #[error("{0} is not supported")]
    UnsupportedOperation(String),
    #[error("Unsupported operator '{0}'")]
    UnsupportedOperator(String),
    #[error("Unsupported identifier '{0}'")]
    UnsupportedIdentifier(String),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Invalid value")]
    InvalidValue,
    #[error("non-finite result")]
    NonFinite,
}

/// Integer-or-real value. Integer literals stay integral through exact
/// operations; anything inexact (true division, sqrt, overflow) promotes
/// to `f64`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(value) => value as f64,
            Number::Float(value) => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Number),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Name(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Neg,
    Pos,
}

/// Evaluates an expression and renders the outcome as a chat-friendly
/// string. This is the whole tool: every failure path ends up embedded in
/// the returned text, since the dispatch layer does not branch on errors.
pub fn calculate(expression: &str) -> String {
    let shown = expression.trim();
    match evaluate_expression(expression) {
        Ok(result) => {
            let formatted = format_number(result);
            tracing::info!("Calculator: {} = {}", shown, formatted);
            format!("Calculation: {} = {}", shown, formatted)
        }
        Err(CalcError::EmptyInput) => "Error: Empty or invalid expression".to_string(),
        Err(CalcError::NonFinite) => {
            tracing::error!("Calculator produced a non-finite result for '{}'", shown);
            format!("Error: Could not evaluate expression '{}'", shown)
        }
        Err(err) => {
            tracing::warn!("Calculator rejected '{}': {}", shown, err);
            format!("Error: {} in expression '{}'", err, shown)
        }
    }
}

/// Runs the normalize -> parse -> evaluate pipeline without formatting.
pub fn evaluate_expression(expression: &str) -> Result<Number, CalcError> {
    let normalized = normalize(expression)?;
    let tree = parse(&normalized)?;
    let value = evaluate(&tree)?;
    if let Number::Float(f) = value {
        if !f.is_finite() {
            return Err(CalcError::NonFinite);
        }
    }
    Ok(value)
}

/// Strips whitespace and substitutes the named constants `pi` and `e`.
///
/// Substitution is whole-word only: the `e` in `sqrt` or in `2e3` must
/// survive untouched.
pub fn normalize(raw: &str) -> Result<String, CalcError> {
    if raw.trim().is_empty() {
        return Err(CalcError::EmptyInput);
    }

    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();

    static CONSTANT_PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = CONSTANT_PATTERN
        .get_or_init(|| Regex::new(r"\b(pi|e)\b").expect("hardcoded pattern compiles"));

    let substituted = pattern.replace_all(&compact, |caps: &regex::Captures| {
        if &caps[1] == "pi" {
            PI_LITERAL
        } else {
            E_LITERAL
        }
    });

    Ok(substituted.into_owned())
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Number),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    DoubleStar,
    LParen,
    RParen,
    Comma,
    /// Operator syntax we recognize but refuse to evaluate (`<`, `&`, `//`, ...).
    Unsupported(String),
}

fn tokenize(input: &str) -> Result<Vec<Token>, CalcError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit()
            || (c == '.' && chars.get(i + 1).map_or(false, |d| d.is_ascii_digit()))
        {
            let (token, next) = lex_number(&chars, i)?;
            tokens.push(token);
            i = next;
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
            continue;
        }

        match c {
            '+' => tokens.push(Token::Plus),
            '-' => tokens.push(Token::Minus),
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    i += 1;
                    tokens.push(Token::DoubleStar);
                } else {
                    tokens.push(Token::Star);
                }
            }
            '/' => {
                if chars.get(i + 1) == Some(&'/') {
                    // floor division exists in the source syntax but is not
                    // on the operator whitelist
                    i += 1;
                    tokens.push(Token::Unsupported("//".to_string()));
                } else {
                    tokens.push(Token::Slash);
                }
            }
            '%' => tokens.push(Token::Percent),
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            ',' => tokens.push(Token::Comma),
            '<' | '>' | '=' | '!' | '&' | '|' | '^' | '~' | '@' => {
                tokens.push(Token::Unsupported(c.to_string()))
            }
            '.' => return Err(CalcError::UnsupportedOperation("attribute access".to_string())),
            '[' | ']' => return Err(CalcError::UnsupportedOperation("indexing".to_string())),
            _ => return Err(CalcError::Syntax),
        }
        i += 1;
    }

    Ok(tokens)
}

fn lex_number(chars: &[char], start: usize) -> Result<(Token, usize), CalcError> {
    let mut i = start;
    let mut is_float = false;

    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i < chars.len() && chars[i] == '.' {
        is_float = true;
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    // exponent suffix is only consumed when a digit actually follows,
    // otherwise the 'e' is left for the identifier lexer
    if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
        let mut j = i + 1;
        if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            is_float = true;
            i = j;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }

    let text: String = chars[start..i].iter().collect();
    if is_float {
        return text
            .parse::<f64>()
            .map(|v| (Token::Number(Number::Float(v)), i))
            .map_err(|_| CalcError::Syntax);
    }
    match text.parse::<i64>() {
        Ok(v) => Ok((Token::Number(Number::Int(v)), i)),
        // integer literals beyond i64 promote to f64
        Err(_) => text
            .parse::<f64>()
            .map(|v| (Token::Number(Number::Float(v)), i))
            .map_err(|_| CalcError::Syntax),
    }
}

/// Parses a normalized expression into a tree mirroring the grammar:
/// power > unary > mul/div/mod > add/sub, with `**` right-associative.
pub fn parse(normalized: &str) -> Result<Expr, CalcError> {
    let tokens = tokenize(normalized)?;
    if tokens.is_empty() {
        return Err(CalcError::EmptyInput);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_expr()?;
    match parser.peek() {
        None => Ok(expr),
        Some(Token::Unsupported(symbol)) => Err(CalcError::UnsupportedOperator(symbol.clone())),
        Some(_) => Err(CalcError::Syntax),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn enter(&mut self) -> Result<(), CalcError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(CalcError::Syntax);
        }
        Ok(())
    }

    fn parse_expr(&mut self) -> Result<Expr, CalcError> {
        self.enter()?;
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.depth -= 1;
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, CalcError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, CalcError> {
        self.enter()?;
        let expr = match self.peek() {
            Some(Token::Plus) => {
                self.pos += 1;
                Expr::Unary {
                    op: UnaryOp::Pos,
                    operand: Box::new(self.parse_unary()?),
                }
            }
            Some(Token::Minus) => {
                self.pos += 1;
                Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(self.parse_unary()?),
                }
            }
            _ => self.parse_power()?,
        };
        self.depth -= 1;
        Ok(expr)
    }

    fn parse_power(&mut self) -> Result<Expr, CalcError> {
        let base = self.parse_atom()?;
        if matches!(self.peek(), Some(Token::DoubleStar)) {
            self.pos += 1;
            // right-associative; the exponent may carry its own sign (2**-1)
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary {
                op: BinaryOp::Pow,
                lhs: Box::new(base),
                rhs: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> Result<Expr, CalcError> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(Expr::Literal(value)),
            Some(Token::Ident(name)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.pos += 1;
                    let args = self.parse_args()?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Name(name))
                }
            }
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    Some(Token::Unsupported(symbol)) => {
                        Err(CalcError::UnsupportedOperator(symbol))
                    }
                    _ => Err(CalcError::Syntax),
                }
            }
            Some(Token::Unsupported(symbol)) => Err(CalcError::UnsupportedOperator(symbol)),
            _ => Err(CalcError::Syntax),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, CalcError> {
        let mut args = Vec::new();
        if matches!(self.peek(), Some(Token::RParen)) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                Some(Token::Unsupported(symbol)) => {
                    return Err(CalcError::UnsupportedOperator(symbol))
                }
                _ => return Err(CalcError::Syntax),
            }
        }
    }
}

/// Walks the tree bottom-up. Literals yield their value, binary nodes
/// evaluate left before right, call arguments evaluate left-to-right before
/// the function is looked up. The operator and function sets are closed:
/// the `match` arms below are the entire whitelist.
pub fn evaluate(expr: &Expr) -> Result<Number, CalcError> {
    match expr {
        Expr::Literal(value) => Ok(*value),
        Expr::Binary { op, lhs, rhs } => {
            let left = evaluate(lhs)?;
            let right = evaluate(rhs)?;
            apply_binary(*op, left, right)
        }
        Expr::Unary { op, operand } => {
            let value = evaluate(operand)?;
            Ok(apply_unary(*op, value))
        }
        Expr::Call { name, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(evaluate(arg)?);
            }
            apply_function(name, &values)
        }
        Expr::Name(name) => match name.as_str() {
            "pi" => Ok(Number::Float(std::f64::consts::PI)),
            "e" => Ok(Number::Float(std::f64::consts::E)),
            _ => Err(CalcError::UnsupportedIdentifier(name.clone())),
        },
    }
}

fn apply_binary(op: BinaryOp, left: Number, right: Number) -> Result<Number, CalcError> {
    use Number::{Float, Int};

    match op {
        BinaryOp::Add => Ok(match (left, right) {
            (Int(a), Int(b)) => a
                .checked_add(b)
                .map(Int)
                .unwrap_or(Float(a as f64 + b as f64)),
            _ => Float(left.as_f64() + right.as_f64()),
        }),
        BinaryOp::Sub => Ok(match (left, right) {
            (Int(a), Int(b)) => a
                .checked_sub(b)
                .map(Int)
                .unwrap_or(Float(a as f64 - b as f64)),
            _ => Float(left.as_f64() - right.as_f64()),
        }),
        BinaryOp::Mul => Ok(match (left, right) {
            (Int(a), Int(b)) => a
                .checked_mul(b)
                .map(Int)
                .unwrap_or(Float(a as f64 * b as f64)),
            _ => Float(left.as_f64() * right.as_f64()),
        }),
        BinaryOp::Div => {
            // true division: always a real result, even for 10/5
            if right.as_f64() == 0.0 {
                return Err(CalcError::DivisionByZero);
            }
            Ok(Float(left.as_f64() / right.as_f64()))
        }
        BinaryOp::Mod => {
            if right.as_f64() == 0.0 {
                return Err(CalcError::DivisionByZero);
            }
            match (left, right) {
                // sign follows the divisor, so -7 % 3 == 2; the fold can
                // overflow near the i64 limits, in which case the float
                // path takes over
                (Int(a), Int(b)) => {
                    let folded = a
                        .checked_rem(b)
                        .and_then(|r| r.checked_add(b))
                        .and_then(|s| s.checked_rem(b));
                    match folded {
                        Some(value) => Ok(Int(value)),
                        None => Ok(Float(floor_mod(a as f64, b as f64))),
                    }
                }
                _ => Ok(Float(floor_mod(left.as_f64(), right.as_f64()))),
            }
        }
        BinaryOp::Pow => apply_pow(left, right),
    }
}

fn floor_mod(a: f64, b: f64) -> f64 {
    a - b * (a / b).floor()
}

fn apply_pow(base: Number, exponent: Number) -> Result<Number, CalcError> {
    use Number::{Float, Int};

    if let (Int(b), Int(e)) = (base, exponent) {
        if e >= 0 {
            if let Ok(exp) = u32::try_from(e) {
                if let Some(value) = b.checked_pow(exp) {
                    return Ok(Int(value));
                }
            }
        }
    }

    let b = base.as_f64();
    let e = exponent.as_f64();
    if b == 0.0 && e < 0.0 {
        return Err(CalcError::DivisionByZero);
    }
    // a fractional power of a negative base has no real result
    if b < 0.0 && e.fract() != 0.0 {
        return Err(CalcError::InvalidValue);
    }
    let value = b.powf(e);
    if !value.is_finite() {
        return Err(CalcError::NonFinite);
    }
    Ok(Float(value))
}

fn apply_unary(op: UnaryOp, value: Number) -> Number {
    use Number::{Float, Int};

    match op {
        UnaryOp::Pos => value,
        UnaryOp::Neg => match value {
            Int(v) => v.checked_neg().map(Int).unwrap_or(Float(-(v as f64))),
            Float(v) => Float(-v),
        },
    }
}

fn apply_function(name: &str, args: &[Number]) -> Result<Number, CalcError> {
    use Number::{Float, Int};

    match name {
        "abs" => match args {
            [Int(v)] => Ok(v.checked_abs().map(Int).unwrap_or(Float((*v as f64).abs()))),
            [Float(v)] => Ok(Float(v.abs())),
            _ => Err(CalcError::InvalidValue),
        },
        "sqrt" => match args {
            [value] => {
                let v = value.as_f64();
                if v < 0.0 {
                    return Err(CalcError::InvalidValue);
                }
                Ok(Float(v.sqrt()))
            }
            _ => Err(CalcError::InvalidValue),
        },
        // round(x) collapses to an integer (ties to even); round(x, n)
        // keeps the real representation
        "round" => match args {
            [value] => {
                let rounded = value.as_f64().round_ties_even();
                if rounded.abs() <= i64::MAX as f64 {
                    Ok(Int(rounded as i64))
                } else {
                    Ok(Float(rounded))
                }
            }
            [value, Int(digits)] => {
                let factor = 10f64.powi((*digits).clamp(-18, 18) as i32);
                Ok(Float((value.as_f64() * factor).round_ties_even() / factor))
            }
            _ => Err(CalcError::InvalidValue),
        },
        "pow" => match args {
            [base, exponent] => apply_pow(*base, *exponent),
            _ => Err(CalcError::InvalidValue),
        },
        _ => Err(CalcError::UnsupportedIdentifier(name.to_string())),
    }
}

/// Renders a result the way a person would write it: integral values
/// without a decimal point, everything else with 6 significant digits.
pub fn format_number(value: Number) -> String {
    match value {
        Number::Int(v) => v.to_string(),
        Number::Float(v) => {
            if v == 0.0 {
                "0".to_string()
            } else if v.is_finite() && v == v.trunc() {
                format!("{:.0}", v)
            } else {
                format_significant(v, 6)
            }
        }
    }
}

/// `%.6g`-style formatting: fixed notation when the magnitude is moderate,
/// scientific otherwise, with trailing zeros trimmed either way.
fn format_significant(value: f64, digits: usize) -> String {
    let precision = digits.saturating_sub(1);
    let scientific = format!("{:.*e}", precision, value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some(parts) => parts,
        None => return scientific,
    };
    let exp: i32 = match exponent.parse() {
        Ok(v) => v,
        Err(_) => return scientific,
    };

    if exp < -4 || exp >= digits as i32 {
        let mantissa = trim_trailing_zeros(mantissa);
        if exp < 0 {
            format!("{}e-{:02}", mantissa, -exp)
        } else {
            format!("{}e+{:02}", mantissa, exp)
        }
    } else {
        let decimals = (digits as i32 - 1 - exp).max(0) as usize;
        trim_trailing_zeros(&format!("{:.*}", decimals, value))
    }
}

fn trim_trailing_zeros(text: &str) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text.to_string()
    }
}
