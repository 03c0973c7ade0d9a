//! Small arithmetic evaluator backing the `calc` command.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr  := term (('+' | '-') term)*
//! term  := unary (('*' | '/' | '//' | '%') unary)*
//! unary := ('+' | '-') unary | power
//! power := atom ('**' unary)?
//! atom  := number | name | name '(' expr (',' expr)* ')' | '(' expr ')'
//! ```
//!
//! Integers stay integers until something forces a float, so `2 ** 10` prints `1024` while
//! `1 / 4` prints `0.2500`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
}

impl Value {
    fn as_f64(self) -> f64 {
        match self {
            Value::Int(i) => i as f64,
            Value::Float(f) => f,
        }
    }

    fn as_int(self, func: &'static str) -> Result<i64, EvalError> {
        match self {
            Value::Int(i) => Ok(i),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
            Value::Float(_) => Err(EvalError::NotIntegral(func)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:.4}", x),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EvalError {
    #[error("invalid syntax at `{0}`")]
    Syntax(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("name '{0}' is not defined")]
    UnknownName(String),
    #[error("{name}() takes {expected} argument(s) ({given} given)")]
    Arity {
        name: &'static str,
        expected: usize,
        given: usize,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    Overflow,
    #[error("math domain error")]
    Domain,
    #[error("{0}() only accepts integral values")]
    NotIntegral(&'static str),
    #[error("expression is nested too deeply")]
    TooDeep,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Name(String),
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    DoubleStar,
    LParen,
    RParen,
    Comma,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, EvalError> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => {
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                let mut is_float = false;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    is_float |= chars[i] == '.';
                    i += 1;
                }
                // Exponent, e.g. `1e-3`
                if i < chars.len() && matches!(chars[i], 'e' | 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && matches!(chars[j], '+' | '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        while j < chars.len() && chars[j].is_ascii_digit() {
                            j += 1;
                        }
                        is_float = true;
                        i = j;
                    }
                }
                let literal: String = chars[start..i].iter().collect();
                let token = if is_float {
                    literal
                        .parse()
                        .map(Token::Float)
                        .map_err(|_| EvalError::Syntax(literal.clone()))?
                } else {
                    literal.parse().map(Token::Int).map_err(|_| EvalError::Overflow)?
                };
                tokens.push(token);
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Name(chars[start..i].iter().collect()));
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::DoubleStar);
                i += 2;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                tokens.push(Token::DoubleSlash);
                i += 2;
            }
            _ => {
                let token = match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ',' => Token::Comma,
                    other => return Err(EvalError::Syntax(other.to_string())),
                };
                tokens.push(token);
                i += 1;
            }
        }
    }

    Ok(tokens)
}

/// Deepest nesting of parentheses, calls and signs the parser will follow.  Every level of
/// nesting costs several stack frames, and the command runs on a worker thread.
const MAX_DEPTH: usize = 100;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), EvalError> {
        match self.next() {
            Some(t) if t == token => Ok(()),
            Some(t) => Err(EvalError::Syntax(describe(&t))),
            None => Err(EvalError::UnexpectedEnd),
        }
    }

    fn expr(&mut self) -> Result<Value, EvalError> {
        let mut lhs = self.term()?;
        loop {
            if self.eat(&Token::Plus) {
                lhs = add(lhs, self.term()?)?;
            } else if self.eat(&Token::Minus) {
                lhs = sub(lhs, self.term()?)?;
            } else {
                return Ok(lhs);
            }
        }
    }

    fn term(&mut self) -> Result<Value, EvalError> {
        let mut lhs = self.unary()?;
        loop {
            if self.eat(&Token::Star) {
                lhs = mul(lhs, self.unary()?)?;
            } else if self.eat(&Token::Slash) {
                lhs = div(lhs, self.unary()?)?;
            } else if self.eat(&Token::DoubleSlash) {
                lhs = floor_div(lhs, self.unary()?)?;
            } else if self.eat(&Token::Percent) {
                lhs = rem(lhs, self.unary()?)?;
            } else {
                return Ok(lhs);
            }
        }
    }

    // All recursion passes through here, so this is where nesting is bounded.
    fn unary(&mut self) -> Result<Value, EvalError> {
        if self.depth >= MAX_DEPTH {
            return Err(EvalError::TooDeep);
        }
        self.depth += 1;
        let value = self.signed();
        self.depth -= 1;
        value
    }

    fn signed(&mut self) -> Result<Value, EvalError> {
        if self.eat(&Token::Minus) {
            return neg(self.unary()?);
        }
        if self.eat(&Token::Plus) {
            return self.unary();
        }
        self.power()
    }

    fn power(&mut self) -> Result<Value, EvalError> {
        let base = self.atom()?;
        if self.eat(&Token::DoubleStar) {
            // Right associative, and binds tighter than a unary minus on its left
            let exponent = self.unary()?;
            return pow(base, exponent);
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Value, EvalError> {
        match self.next() {
            Some(Token::Int(i)) => Ok(Value::Int(i)),
            Some(Token::Float(f)) => Ok(Value::Float(f)),
            Some(Token::LParen) => {
                let value = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(value)
            }
            Some(Token::Name(name)) => {
                if self.eat(&Token::LParen) {
                    let mut args = vec![self.expr()?];
                    while self.eat(&Token::Comma) {
                        args.push(self.expr()?);
                    }
                    self.expect(Token::RParen)?;
                    call(&name, &args)
                } else {
                    constant(&name)
                }
            }
            Some(token) => Err(EvalError::Syntax(describe(&token))),
            None => Err(EvalError::UnexpectedEnd),
        }
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Int(i) => i.to_string(),
        Token::Float(f) => f.to_string(),
        Token::Name(n) => n.clone(),
        Token::Plus => "+".to_owned(),
        Token::Minus => "-".to_owned(),
        Token::Star => "*".to_owned(),
        Token::Slash => "/".to_owned(),
        Token::DoubleSlash => "//".to_owned(),
        Token::Percent => "%".to_owned(),
        Token::DoubleStar => "**".to_owned(),
        Token::LParen => "(".to_owned(),
        Token::RParen => ")".to_owned(),
        Token::Comma => ",".to_owned(),
    }
}

fn float(x: f64) -> Result<Value, EvalError> {
    if x.is_nan() {
        Err(EvalError::Domain)
    } else {
        Ok(Value::Float(x))
    }
}

fn int_op(
    a: Value,
    b: Value,
    ints: fn(i64, i64) -> Option<i64>,
    floats: fn(f64, f64) -> f64,
) -> Result<Value, EvalError> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => ints(a, b).map(Value::Int).ok_or(EvalError::Overflow),
        (a, b) => float(floats(a.as_f64(), b.as_f64())),
    }
}

fn add(a: Value, b: Value) -> Result<Value, EvalError> {
    int_op(a, b, i64::checked_add, |a, b| a + b)
}

fn sub(a: Value, b: Value) -> Result<Value, EvalError> {
    int_op(a, b, i64::checked_sub, |a, b| a - b)
}

fn mul(a: Value, b: Value) -> Result<Value, EvalError> {
    int_op(a, b, i64::checked_mul, |a, b| a * b)
}

fn neg(a: Value) -> Result<Value, EvalError> {
    match a {
        Value::Int(i) => i.checked_neg().map(Value::Int).ok_or(EvalError::Overflow),
        Value::Float(f) => Ok(Value::Float(-f)),
    }
}

fn div(a: Value, b: Value) -> Result<Value, EvalError> {
    if b.as_f64() == 0.0 {
        return Err(EvalError::DivisionByZero);
    }
    float(a.as_f64() / b.as_f64())
}

fn floor_div(a: Value, b: Value) -> Result<Value, EvalError> {
    if b.as_f64() == 0.0 {
        return Err(EvalError::DivisionByZero);
    }
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => {
            let q = a.checked_div(b).ok_or(EvalError::Overflow)?;
            // Round toward negative infinity
            let q = if (a % b != 0) && ((a < 0) != (b < 0)) { q - 1 } else { q };
            Ok(Value::Int(q))
        }
        (a, b) => float((a.as_f64() / b.as_f64()).floor()),
    }
}

fn rem(a: Value, b: Value) -> Result<Value, EvalError> {
    if b.as_f64() == 0.0 {
        return Err(EvalError::DivisionByZero);
    }
    match (a, b) {
        // Result takes the sign of the divisor
        (Value::Int(a), Value::Int(b)) => {
            let r = a.checked_rem(b).ok_or(EvalError::Overflow)?;
            Ok(Value::Int(if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r }))
        }
        (a, b) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            let r = a % b;
            float(if r != 0.0 && ((r < 0.0) != (b < 0.0)) { r + b } else { r })
        }
    }
}

fn pow(base: Value, exponent: Value) -> Result<Value, EvalError> {
    match (base, exponent) {
        (Value::Int(b), Value::Int(e)) if e >= 0 => {
            let e = u32::try_from(e).map_err(|_| EvalError::Overflow)?;
            b.checked_pow(e).map(Value::Int).ok_or(EvalError::Overflow)
        }
        (b, e) => {
            let (b, e) = (b.as_f64(), e.as_f64());
            if b == 0.0 && e < 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            float(b.powf(e))
        }
    }
}

fn constant(name: &str) -> Result<Value, EvalError> {
    match name {
        "pi" => Ok(Value::Float(std::f64::consts::PI)),
        "e" => Ok(Value::Float(std::f64::consts::E)),
        "tau" => Ok(Value::Float(std::f64::consts::TAU)),
        "inf" => Ok(Value::Float(f64::INFINITY)),
        _ => Err(EvalError::UnknownName(name.to_owned())),
    }
}

fn unary_float(x: Value, f: fn(f64) -> f64) -> Result<Value, EvalError> {
    float(f(x.as_f64()))
}

/// Like `unary_float`, but rejects arguments outside `domain` rather than returning NaN or inf.
fn checked_float(x: Value, domain: fn(f64) -> bool, f: fn(f64) -> f64) -> Result<Value, EvalError> {
    let x = x.as_f64();
    if !domain(x) {
        return Err(EvalError::Domain);
    }
    float(f(x))
}

fn to_int(x: f64) -> Result<Value, EvalError> {
    if x.is_finite() && x.abs() < i64::MAX as f64 {
        Ok(Value::Int(x as i64))
    } else {
        Err(EvalError::Overflow)
    }
}

fn call(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    macro_rules! arity {
        ($name:literal, $n:literal) => {{
            if args.len() != $n {
                return Err(EvalError::Arity {
                    name: $name,
                    expected: $n,
                    given: args.len(),
                });
            }
        }};
    }

    match name {
        "sqrt" => {
            arity!("sqrt", 1);
            checked_float(args[0], |x| x >= 0.0, f64::sqrt)
        }
        "sin" => {
            arity!("sin", 1);
            unary_float(args[0], f64::sin)
        }
        "cos" => {
            arity!("cos", 1);
            unary_float(args[0], f64::cos)
        }
        "tan" => {
            arity!("tan", 1);
            unary_float(args[0], f64::tan)
        }
        "asin" => {
            arity!("asin", 1);
            checked_float(args[0], |x| (-1.0..=1.0).contains(&x), f64::asin)
        }
        "acos" => {
            arity!("acos", 1);
            checked_float(args[0], |x| (-1.0..=1.0).contains(&x), f64::acos)
        }
        "atan" => {
            arity!("atan", 1);
            unary_float(args[0], f64::atan)
        }
        "exp" => {
            arity!("exp", 1);
            unary_float(args[0], f64::exp)
        }
        "log" => match args {
            [x] => checked_float(*x, |x| x > 0.0, f64::ln),
            [x, base] => {
                let (x, base) = (x.as_f64(), base.as_f64());
                if x <= 0.0 || base <= 0.0 || base == 1.0 {
                    return Err(EvalError::Domain);
                }
                float(x.log(base))
            }
            _ => Err(EvalError::Arity {
                name: "log",
                expected: 1,
                given: args.len(),
            }),
        },
        "log10" => {
            arity!("log10", 1);
            checked_float(args[0], |x| x > 0.0, f64::log10)
        }
        "log2" => {
            arity!("log2", 1);
            checked_float(args[0], |x| x > 0.0, f64::log2)
        }
        "fabs" => {
            arity!("fabs", 1);
            unary_float(args[0], f64::abs)
        }
        "degrees" => {
            arity!("degrees", 1);
            unary_float(args[0], f64::to_degrees)
        }
        "radians" => {
            arity!("radians", 1);
            unary_float(args[0], f64::to_radians)
        }
        "abs" => {
            arity!("abs", 1);
            match args[0] {
                Value::Int(i) => i.checked_abs().map(Value::Int).ok_or(EvalError::Overflow),
                Value::Float(f) => Ok(Value::Float(f.abs())),
            }
        }
        "floor" => {
            arity!("floor", 1);
            to_int(args[0].as_f64().floor())
        }
        "ceil" => {
            arity!("ceil", 1);
            to_int(args[0].as_f64().ceil())
        }
        "trunc" => {
            arity!("trunc", 1);
            to_int(args[0].as_f64().trunc())
        }
        "factorial" => {
            arity!("factorial", 1);
            let n = args[0].as_int("factorial")?;
            if n < 0 {
                return Err(EvalError::Domain);
            }
            (1..=n)
                .try_fold(1i64, |acc, k| acc.checked_mul(k))
                .map(Value::Int)
                .ok_or(EvalError::Overflow)
        }
        "gcd" => {
            arity!("gcd", 2);
            let (mut a, mut b) = (args[0].as_int("gcd")?, args[1].as_int("gcd")?);
            while b != 0 {
                (a, b) = (b, a.checked_rem(b).ok_or(EvalError::Overflow)?);
            }
            a.checked_abs().map(Value::Int).ok_or(EvalError::Overflow)
        }
        "atan2" => {
            arity!("atan2", 2);
            float(args[0].as_f64().atan2(args[1].as_f64()))
        }
        "hypot" => {
            arity!("hypot", 2);
            float(args[0].as_f64().hypot(args[1].as_f64()))
        }
        "pow" => {
            arity!("pow", 2);
            let (b, e) = (args[0].as_f64(), args[1].as_f64());
            if b == 0.0 && e < 0.0 {
                return Err(EvalError::Domain);
            }
            float(b.powf(e))
        }
        _ => Err(EvalError::UnknownName(name.to_owned())),
    }
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expr: &str) -> Result<Value, EvalError> {
    let mut parser = Parser {
        tokens: tokenize(expr)?,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    match parser.next() {
        None => Ok(value),
        Some(token) => Err(EvalError::Syntax(describe(&token))),
    }
}

/// Render the outcome the way the `calc` command displays it.
pub fn render(result: &Result<Value, EvalError>) -> String {
    match result {
        Ok(value) => value.to_string(),
        Err(err) => format!("Error: {}", err),
    }
}
