//! # Data types of the values flowing through queries
//!
//! A deliberately small type system: integers, floats, text and booleans,
//! plus an `Unknown` type for expressions whose type cannot be inferred
//! (e.g. columns before symbol binding).
//!

pub mod intervals;
pub mod value;

use serde::{Deserialize, Serialize};
use std::{convert::Infallible, error, fmt, result, str::FromStr};

pub use intervals::Interval;
pub use value::Value;

// Error management

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    InvalidConversion(String),
    Other(String),
}

impl Error {
    pub fn invalid_conversion(this: impl fmt::Display, that: impl fmt::Display) -> Error {
        Error::InvalidConversion(format!("Cannot convert {} into {}", this, that))
    }
    pub fn other(desc: impl fmt::Display) -> Error {
        Error::Other(format!("{}", desc))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConversion(desc) => writeln!(f, "InvalidConversion: {}", desc),
            Error::Other(err) => writeln!(f, "{}", err),
        }
    }
}

impl error::Error for Error {}

impl From<Infallible> for Error {
    fn from(err: Infallible) -> Self {
        Error::Other(err.to_string())
    }
}

pub type Result<T> = result::Result<T, Error>;

/// DataType definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 64 bits signed integer
    #[serde(rename = "int", alias = "integer")]
    Integer,
    /// Double precision floating point value
    #[serde(rename = "float", alias = "double")]
    Float,
    /// Text
    #[serde(rename = "string", alias = "text")]
    Text,
    /// Boolean
    #[serde(rename = "boolean", alias = "bool")]
    Boolean,
    /// The type could not be inferred
    #[serde(rename = "unknown")]
    Unknown,
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Integer | DataType::Float)
    }

    /// The smallest type both types can be widened to
    pub fn widen(&self, other: &DataType) -> DataType {
        match (self, other) {
            (left, right) if left == right => *left,
            (DataType::Integer, DataType::Float) | (DataType::Float, DataType::Integer) => {
                DataType::Float
            }
            _ => DataType::Unknown,
        }
    }

    /// Cast a value into this type, `Null` stays `Null`
    pub fn cast(&self, value: Value) -> Result<Value> {
        Ok(match (self, value) {
            (_, Value::Null) => Value::Null,
            (DataType::Integer, Value::Integer(i)) => Value::Integer(i),
            (DataType::Integer, Value::Float(f)) if f.is_finite() => Value::Integer(f.round() as i64),
            (DataType::Integer, Value::Boolean(b)) => Value::Integer(b as i64),
            (DataType::Float, Value::Integer(i)) => Value::Float(i as f64),
            (DataType::Float, Value::Float(f)) => Value::Float(f),
            (DataType::Text, value) => Value::Text(value.to_string()),
            (DataType::Boolean, Value::Boolean(b)) => Value::Boolean(b),
            (DataType::Unknown, value) => value,
            (data_type, value) => return Err(Error::invalid_conversion(value, data_type)),
        })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Integer => write!(f, "int"),
            DataType::Float => write!(f, "float"),
            DataType::Text => write!(f, "string"),
            DataType::Boolean => write!(f, "boolean"),
            DataType::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "int" | "integer" | "bigint" => Ok(DataType::Integer),
            "float" | "double" | "real" => Ok(DataType::Float),
            "string" | "text" | "varchar" => Ok(DataType::Text),
            "boolean" | "bool" => Ok(DataType::Boolean),
            "unknown" => Ok(DataType::Unknown),
            other => Err(Error::invalid_conversion(other, "a data type")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widen() {
        assert_eq!(DataType::Integer.widen(&DataType::Integer), DataType::Integer);
        assert_eq!(DataType::Integer.widen(&DataType::Float), DataType::Float);
        assert_eq!(DataType::Text.widen(&DataType::Float), DataType::Unknown);
    }

    #[test]
    fn test_cast() {
        assert_eq!(DataType::Integer.cast(Value::Float(2.6)).unwrap(), Value::Integer(3));
        assert_eq!(DataType::Float.cast(Value::Integer(2)).unwrap(), Value::Float(2.));
        assert_eq!(DataType::Float.cast(Value::Null).unwrap(), Value::Null);
        assert!(DataType::Boolean.cast(Value::Integer(1)).is_err());
    }

    #[test]
    fn test_names() {
        assert_eq!("INT".parse::<DataType>().unwrap(), DataType::Integer);
        assert_eq!(DataType::Text.to_string(), "string");
        let data_type: DataType = serde_json::from_str(r#""float""#).unwrap();
        assert_eq!(data_type, DataType::Float);
        assert!("date".parse::<DataType>().is_err());
    }
}
