//! Values parsed from the command line.
//!
//! Flags and trailing `--args` tokens arrive as strings. They are coerced into
//! [`Value`] either against a declared [`Primitive`](crate::schema::Primitive)
//! or, for untyped positions, with the trailing-argument rule: anything that
//! parses as an `i64` becomes [`Value::Int`], everything else stays a string.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, InvocationError};
use crate::schema::Primitive;

/// Small tagged union for coerced argument values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

/// Keyword arguments in insertion order.
pub type Kwargs = IndexMap<String, Value>;

impl Value {
    /// Coerce a trailing-argument token: integers become `Int`, the rest `Str`.
    pub fn from_token(token: &str) -> Self {
        match token.parse::<i64>() {
            Ok(n) => Value::Int(n),
            Err(_) => Value::Str(token.to_string()),
        }
    }

    /// Coerce a flag value against its declared primitive type.
    pub fn parse_as(
        name: &str,
        raw: &str,
        primitive: Primitive,
    ) -> Result<Self, ConfigurationError> {
        let invalid = |expected: &'static str| ConfigurationError::InvalidValue {
            name: name.to_string(),
            value: raw.to_string(),
            expected,
        };

        match primitive {
            Primitive::Str => Ok(Value::Str(raw.to_string())),
            Primitive::Int => raw
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| invalid("an integer")),
            Primitive::Float => raw
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| invalid("a number")),
            Primitive::Bool => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
                "false" | "0" | "no" | "off" => Ok(Value::Bool(false)),
                _ => Err(invalid("a boolean")),
            },
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "str",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Float(x) => serde_json::Value::from(*x),
            Value::Bool(b) => serde_json::Value::from(*b),
            Value::Str(s) => serde_json::Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// Positional and keyword arguments forwarded to a spout method.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub args: Vec<Value>,
    pub kwargs: Kwargs,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split trailing tokens into positional and `key=value` arguments.
    ///
    /// Only the first `=` separates key from value, so `expr=a=b` yields the
    /// key `expr` with value `a=b`. A token starting with `=` is positional.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut call = CallArgs::new();
        for token in tokens {
            let token = token.as_ref();
            match token.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    call.kwargs.insert(key.to_string(), Value::from_token(value));
                }
                _ => call.args.push(Value::from_token(token)),
            }
        }
        call
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Bind a parameter by keyword first, then by position.
    pub fn get(&self, name: &str, position: usize) -> Option<&Value> {
        self.kwargs.get(name).or_else(|| self.args.get(position))
    }

    pub fn int(&self, name: &str, position: usize) -> Result<i64, InvocationError> {
        let value = self
            .get(name, position)
            .ok_or_else(|| InvocationError::MissingArgument(name.to_string()))?;
        value.as_i64().ok_or_else(|| InvocationError::InvalidArgument {
            name: name.to_string(),
            expected: "an integer",
            got: value.to_string(),
        })
    }

    pub fn optional_int(&self, name: &str, position: usize) -> Result<Option<i64>, InvocationError> {
        match self.get(name, position) {
            None => Ok(None),
            Some(_) => self.int(name, position).map(Some),
        }
    }

    pub fn number(&self, name: &str, position: usize) -> Result<f64, InvocationError> {
        let value = self
            .get(name, position)
            .ok_or_else(|| InvocationError::MissingArgument(name.to_string()))?;
        value.as_f64().ok_or_else(|| InvocationError::InvalidArgument {
            name: name.to_string(),
            expected: "a number",
            got: value.to_string(),
        })
    }

    pub fn str(&self, name: &str, position: usize) -> Result<String, InvocationError> {
        self.get(name, position)
            .map(Value::to_string)
            .ok_or_else(|| InvocationError::MissingArgument(name.to_string()))
    }
}
