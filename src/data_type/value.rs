//! # The values manipulated by readers and expressions
//!
//! A typed scalar value with runtime type checking and SQL semantics
//! (`NULL` propagates through arithmetic and comparisons).
//!

use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, error, fmt, hash, result};

use super::DataType;

// Error handling

/// The errors values can lead to
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    ZeroDenominator(String),
    InvalidOperation(String),
}

impl Error {
    pub fn zero_denominator(numerator: impl fmt::Display) -> Error {
        Error::ZeroDenominator(format!("Cannot divide {} by 0", numerator))
    }
    pub fn invalid_operation(
        op: impl fmt::Display,
        left: impl fmt::Display,
        right: impl fmt::Display,
    ) -> Error {
        Error::InvalidOperation(format!("Cannot compute {} {} {}", left, op, right))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ZeroDenominator(desc) => writeln!(f, "ZeroDenominator: {}", desc),
            Error::InvalidOperation(desc) => writeln!(f, "InvalidOperation: {}", desc),
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;

/// A Value type containing any value sub-type
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn null() -> Value {
        Value::Null
    }

    pub fn boolean(b: bool) -> Value {
        Value::Boolean(b)
    }

    pub fn integer(i: i64) -> Value {
        Value::Integer(i)
    }

    pub fn float(f: f64) -> Value {
        Value::Float(f)
    }

    pub fn text<S: Into<String>>(s: S) -> Value {
        Value::Text(s.into())
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Unknown,
            Value::Boolean(_) => DataType::Boolean,
            Value::Integer(_) => DataType::Integer,
            Value::Float(_) => DataType::Float,
            Value::Text(_) => DataType::Text,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Render as a SQL literal
    pub fn to_sql(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => format!("{:?}", f),
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
        }
    }

    /// Total order used for sorting: `NULL` first, numbers compared by value
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        fn rank(value: &Value) -> u8 {
            match value {
                Value::Null => 0,
                Value::Boolean(_) => 1,
                Value::Integer(_) | Value::Float(_) => 2,
                Value::Text(_) => 3,
            }
        }
        match (self, other) {
            (Value::Integer(l), Value::Integer(r)) => l.cmp(r),
            (Value::Boolean(l), Value::Boolean(r)) => l.cmp(r),
            (Value::Text(l), Value::Text(r)) => l.cmp(r),
            (l, r) => match (l.as_f64(), r.as_f64()) {
                (Some(l), Some(r)) => l.total_cmp(&r),
                _ => rank(l).cmp(&rank(r)),
            },
        }
    }

    /// SQL comparison: `None` if any side is `NULL` or the types do not compare
    pub fn sql_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Boolean(_), Value::Boolean(_)) | (Value::Text(_), Value::Text(_)) => {
                Some(self.total_cmp(other))
            }
            (l, r) => l.as_f64()?.partial_cmp(&r.as_f64()?),
        }
    }

    fn numeric_op<I, F>(&self, other: &Value, op: &str, int_op: I, float_op: F) -> Result<Value>
    where
        I: Fn(i64, i64) -> Option<i64>,
        F: Fn(f64, f64) -> f64,
    {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
            (Value::Integer(l), Value::Integer(r)) => int_op(*l, *r)
                .map(Value::Integer)
                .ok_or_else(|| Error::invalid_operation(op, l, r)),
            (l, r) => match (l.as_f64(), r.as_f64()) {
                (Some(lf), Some(rf)) => Ok(Value::Float(float_op(lf, rf))),
                _ => Err(Error::invalid_operation(op, l, r)),
            },
        }
    }

    pub fn add(&self, other: &Value) -> Result<Value> {
        self.numeric_op(other, "+", i64::checked_add, |l, r| l + r)
    }

    pub fn sub(&self, other: &Value) -> Result<Value> {
        self.numeric_op(other, "-", i64::checked_sub, |l, r| l - r)
    }

    pub fn mul(&self, other: &Value) -> Result<Value> {
        self.numeric_op(other, "*", i64::checked_mul, |l, r| l * r)
    }

    /// Division always returns a float, dividing by 0 is an error
    pub fn div(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
            (l, r) => match (l.as_f64(), r.as_f64()) {
                (Some(_), Some(d)) if d == 0. => Err(Error::zero_denominator(l)),
                (Some(n), Some(d)) => Ok(Value::Float(n / d)),
                _ => Err(Error::invalid_operation("/", l, r)),
            },
        }
    }

    pub fn rem(&self, other: &Value) -> Result<Value> {
        if other.as_f64() == Some(0.) {
            return Err(Error::zero_denominator(self));
        }
        self.numeric_op(other, "%", i64::checked_rem, |l, r| l % r)
    }

    pub fn neg(&self) -> Result<Value> {
        match self {
            Value::Null => Ok(Value::Null),
            Value::Integer(i) => i
                .checked_neg()
                .map(Value::Integer)
                .ok_or_else(|| Error::invalid_operation("-", "", i)),
            Value::Float(f) => Ok(Value::Float(-f)),
            value => Err(Error::invalid_operation("-", "", value)),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(l), Value::Boolean(r)) => l == r,
            (Value::Integer(l), Value::Integer(r)) => l == r,
            (Value::Float(l), Value::Float(r)) => l.to_bits() == r.to_bits(),
            (Value::Text(l), Value::Text(r)) => l == r,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl hash::Hash for Value {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0u8.hash(state),
            Value::Boolean(b) => b.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

macro_rules! impl_conversions {
    ($($Type:ty => $Variant:ident),*) => {
        $(
            impl From<$Type> for Value {
                fn from(value: $Type) -> Self {
                    Value::$Variant(value.into())
                }
            }

            impl From<Option<$Type>> for Value {
                fn from(value: Option<$Type>) -> Self {
                    value.map_or(Value::Null, |v| Value::$Variant(v.into()))
                }
            }
        )*
    };
}

impl_conversions!(bool => Boolean, i64 => Integer, i32 => Integer, f64 => Float, String => Text, &str => Text);
