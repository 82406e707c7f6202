//! Value conversion into typed command arguments.

use crate::command::ParamType;
use crate::value::{format_number, HostHandle, Value};

/// A bound, typed command argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Host(HostHandle),
    Null,
    /// An optional parameter the caller did not supply.
    Missing,
}

impl Arg {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Arg::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Integers widen to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Arg::Float(n) => Some(*n),
            Arg::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Arg::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_host(&self) -> Option<&HostHandle> {
        match self {
            Arg::Host(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Arg::Missing)
    }

    pub fn to_value(&self) -> Value {
        match self {
            Arg::Str(s) => Value::String(s.clone()),
            Arg::Int(n) => Value::Number(*n as f64),
            Arg::Float(n) => Value::Number(*n),
            Arg::Bool(b) => Value::Boolean(*b),
            Arg::Host(handle) => Value::Host(handle.clone()),
            Arg::Null | Arg::Missing => Value::Null,
        }
    }
}

/// Converts runtime values to parameter types. `None` means the value
/// cannot be represented as the target.
pub trait ValueConverter {
    fn convert(&self, target: &ParamType, value: &Value) -> Option<Arg>;
}

/// Locale-invariant conversions for the built-in parameter types.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultConverter;

impl DefaultConverter {
    pub fn convert_text(&self, target: &ParamType, text: &str) -> Option<Arg> {
        self.convert(target, &Value::String(text.to_string()))
    }
}

impl ValueConverter for DefaultConverter {
    fn convert(&self, target: &ParamType, value: &Value) -> Option<Arg> {
        match target {
            ParamType::String => match value {
                Value::String(s) => Some(Arg::Str(s.clone())),
                Value::Number(n) => Some(Arg::Str(format_number(*n))),
                Value::Boolean(b) => Some(Arg::Str(b.to_string())),
                Value::Null | Value::Host(_) => None,
            },
            ParamType::Int => match value {
                Value::Number(n) => integral(*n).map(Arg::Int),
                Value::String(s) => s.parse::<i64>().ok().map(Arg::Int),
                _ => None,
            },
            ParamType::Float => match value {
                Value::Number(n) => Some(Arg::Float(*n)),
                Value::String(s) if looks_numeric(s) => s.parse::<f64>().ok().map(Arg::Float),
                _ => None,
            },
            ParamType::Bool => match value {
                Value::Boolean(b) => Some(Arg::Bool(*b)),
                Value::String(s) => parse_bool(s).map(Arg::Bool),
                _ => None,
            },
            ParamType::Object => Some(match value {
                Value::Number(n) => integral(*n).map_or(Arg::Float(*n), Arg::Int),
                Value::Boolean(b) => Arg::Bool(*b),
                Value::Null => Arg::Null,
                Value::Host(handle) => Arg::Host(handle.clone()),
                Value::String(s) => object_from_text(s),
            }),
            ParamType::Host(name) => match value {
                Value::Host(handle) if handle.type_name() == *name => Some(Arg::Host(handle.clone())),
                _ => None,
            },
        }
    }
}

fn integral(n: f64) -> Option<i64> {
    if n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Some(n as i64)
    } else {
        None
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Keeps words such as `inf` and `nan` out of float parsing.
fn looks_numeric(s: &str) -> bool {
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    digits.starts_with(|c: char| c.is_ascii_digit() || c == '.')
}

fn object_from_text(s: &str) -> Arg {
    if let Ok(n) = s.parse::<i64>() {
        return Arg::Int(n);
    }
    if looks_numeric(s) {
        if let Ok(n) = s.parse::<f64>() {
            return Arg::Float(n);
        }
    }
    match parse_bool(s) {
        Some(b) => Arg::Bool(b),
        None => Arg::Str(s.to_string()),
    }
}
