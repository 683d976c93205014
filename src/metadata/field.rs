use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data_type::{DataType, Interval};

/// A column of a table, with its type and optional declared bounds
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Field {
    name: String,
    #[serde(rename = "type")]
    data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lower: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    upper: Option<f64>,
}

impl Field {
    /// Constructor
    pub fn new<S: Into<String>>(name: S, data_type: DataType, bounds: Option<(f64, f64)>) -> Field {
        Field {
            name: name.into(),
            data_type,
            lower: bounds.map(|(lower, _)| lower),
            upper: bounds.map(|(_, upper)| upper),
        }
    }

    pub fn from_name_data_type<S: Into<String>>(name: S, data_type: DataType) -> Field {
        Field::new(name, data_type, None)
    }

    /// Return the `Field`'s name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn lower(&self) -> Option<f64> {
        self.lower
    }

    pub fn upper(&self) -> Option<f64> {
        self.upper
    }

    /// The declared bounds, only when both are declared
    pub fn bounds(&self) -> Option<Interval> {
        Some(Interval::new(self.lower?, self.upper?))
    }
}

impl<S: Into<String>> From<(S, DataType)> for Field {
    fn from((name, data_type): (S, DataType)) -> Self {
        Field::from_name_data_type(name, data_type)
    }
}

impl<S: Into<String>> From<(S, DataType, f64, f64)> for Field {
    fn from((name, data_type, lower, upper): (S, DataType, f64, f64)) -> Self {
        Field::new(name, data_type, Some((lower, upper)))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.bounds() {
            Some(bounds) => write!(f, "{}: {} {}", self.name, self.data_type, bounds),
            None => write!(f, "{}: {}", self.name, self.data_type),
        }
    }
}
