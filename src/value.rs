//! Text-to-typed-value classification for request arguments.
//!
//! Command layers collect arguments as free-form text. [`classify`] turns one
//! token into a typed scalar [`Value`] before it is embedded in an outbound
//! request. Matching is anchored to the whole (trimmed) token; the first rule
//! that matches wins:
//!
//! | Shape                       | Result                |
//! |-----------------------------|-----------------------|
//! | `true` / `false`            | [`Value::Bool`]       |
//! | `digits`                    | [`Value::Int32`]      |
//! | `digits` + `L`/`l`          | [`Value::Int64`]      |
//! | `digits? . digits` + `f`/`F`| [`Value::Float32`]    |
//! | `digits? . digits`          | [`Value::Float64`]    |
//! | anything else               | [`Value::String`]     |
//!
//! A token that has a numeric shape but does not fit its type (for example an
//! all-digit token beyond `i32::MAX`) is a [`ValueParseError`], never a silent
//! fallback to a string.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// A typed scalar argument.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
}

/// Wire type of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
}

impl Value {
    /// The wire type of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Int32(_) => ValueKind::Int32,
            Value::Int64(_) => ValueKind::Int64,
            Value::Float32(_) => ValueKind::Float32,
            Value::Float64(_) => ValueKind::Float64,
            Value::String(_) => ValueKind::String,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "bool",
            ValueKind::Int32 => "int32",
            ValueKind::Int64 => "int64",
            ValueKind::Float32 => "float32",
            ValueKind::Float64 => "float64",
            ValueKind::String => "string",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}L"),
            Value::Float32(v) => write_decimal(f, *v, v.is_finite(), "f"),
            Value::Float64(v) => write_decimal(f, *v, v.is_finite(), ""),
            Value::String(v) => f.write_str(v),
        }
    }
}

/// Plain positional notation with at least one fractional digit, so a whole
/// float never reads back as an integer.
fn write_decimal(
    f: &mut fmt::Formatter<'_>,
    v: impl fmt::Display,
    finite: bool,
    suffix: &str,
) -> fmt::Result {
    let text = v.to_string();
    if finite && !text.contains('.') {
        write!(f, "{text}.0{suffix}")
    } else {
        write!(f, "{text}{suffix}")
    }
}

/// A token matched a numeric shape but its value does not fit the target type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot parse {token:?} as {kind}: {reason}")]
pub struct ValueParseError {
    /// The trimmed token that failed.
    pub token: String,
    /// The type its shape selected.
    pub kind: ValueKind,
    /// Why the conversion failed.
    pub reason: String,
}

impl ValueParseError {
    fn new(token: &str, kind: ValueKind, reason: impl fmt::Display) -> Self {
        Self {
            token: token.to_owned(),
            kind,
            reason: reason.to_string(),
        }
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// `digits? '.' digits`
fn is_decimal(s: &str) -> bool {
    match s.split_once('.') {
        Some((int, frac)) => (int.is_empty() || is_digits(int)) && is_digits(frac),
        None => false,
    }
}

/// Classify one text token into a typed [`Value`].
///
/// Surrounding whitespace is trimmed first. Total over all inputs: every
/// string yields either a value or a [`ValueParseError`].
///
/// ```
/// use pubsub_rpc::{classify, Value};
///
/// assert_eq!(classify("42").unwrap(), Value::Int32(42));
/// assert_eq!(classify("42L").unwrap(), Value::Int64(42));
/// assert_eq!(classify("3.5f").unwrap(), Value::Float32(3.5));
/// assert_eq!(classify("12abc").unwrap(), Value::String("12abc".into()));
/// assert!(classify("4294967296").is_err());
/// ```
pub fn classify(token: &str) -> Result<Value, ValueParseError> {
    // ---
    let token = token.trim();

    if token == "true" {
        return Ok(Value::Bool(true));
    }
    if token == "false" {
        return Ok(Value::Bool(false));
    }

    if is_digits(token) {
        return token
            .parse::<i32>()
            .map(Value::Int32)
            .map_err(|e| ValueParseError::new(token, ValueKind::Int32, e));
    }

    if let Some(body) = token.strip_suffix(&['L', 'l'][..]) {
        if is_digits(body) {
            return body
                .parse::<i64>()
                .map(Value::Int64)
                .map_err(|e| ValueParseError::new(token, ValueKind::Int64, e));
        }
    }

    if let Some(body) = token.strip_suffix(&['f', 'F'][..]) {
        if is_decimal(body) {
            return parse_finite::<f32>(token, body, ValueKind::Float32).map(Value::Float32);
        }
    }

    if is_decimal(token) {
        return parse_finite::<f64>(token, token, ValueKind::Float64).map(Value::Float64);
    }

    Ok(Value::String(token.to_owned()))
}

/// Classify a whole argument list, stopping at the first malformed token.
pub fn classify_all<I, S>(tokens: I) -> Result<Vec<Value>, ValueParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tokens.into_iter().map(|t| classify(t.as_ref())).collect()
}

trait Finite: std::str::FromStr {
    fn is_finite_value(&self) -> bool;
}

impl Finite for f32 {
    fn is_finite_value(&self) -> bool {
        self.is_finite()
    }
}

impl Finite for f64 {
    fn is_finite_value(&self) -> bool {
        self.is_finite()
    }
}

fn parse_finite<F>(token: &str, body: &str, kind: ValueKind) -> Result<F, ValueParseError>
where
    F: Finite,
    F::Err: fmt::Display,
{
    let value: F = body
        .parse()
        .map_err(|e| ValueParseError::new(token, kind, e))?;

    if !value.is_finite_value() {
        return Err(ValueParseError::new(token, kind, "value out of range"));
    }
    Ok(value)
}
