//! # The description of the private tables
//!
//! Metadata lists the tables a private reader exposes, the type and declared
//! bounds of their columns, and their number of rows.
//! It is built in code or loaded from JSON:
//!
//! ```json
//! {"tables": [{"name": "PUMS.PUMS", "rows": 1000,
//!   "columns": [{"name": "age", "type": "int", "lower": 0, "upper": 100}]}]}
//! ```
//!

pub mod field;
pub mod schema;

use serde::{Deserialize, Serialize};
use std::{convert::Infallible, error, fmt, result};

use crate::{
    ast::{self, Identifier},
    builder::With,
    hierarchy::{Found, Hierarchy},
};

pub use field::Field;
pub use schema::Schema;

// Error management

#[derive(Debug, Clone)]
pub enum Error {
    InvalidSchema(String),
    Other(String),
}

impl Error {
    pub fn invalid_schema(desc: impl fmt::Display) -> Error {
        Error::InvalidSchema(desc.to_string())
    }
    pub fn other(desc: impl fmt::Display) -> Error {
        Error::Other(desc.to_string())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidSchema(desc) => writeln!(f, "InvalidSchema: {}", desc),
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
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Other(err.to_string())
    }
}

pub type Result<T> = result::Result<T, Error>;

/// The tables, by name
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Tables", into = "Tables")]
pub struct Metadata(Hierarchy<Schema>);

/// The serialized form of [`Metadata`]
#[derive(Serialize, Deserialize)]
struct Tables {
    tables: Vec<Schema>,
}

impl From<Tables> for Metadata {
    fn from(tables: Tables) -> Self {
        Metadata::empty().with(tables.tables)
    }
}

impl From<Metadata> for Tables {
    fn from(metadata: Metadata) -> Self {
        Tables {
            tables: metadata.0.into_iter().map(|(_, schema)| schema).collect(),
        }
    }
}

impl Metadata {
    pub fn empty() -> Metadata {
        Metadata::default()
    }

    pub fn from_json(json: &str) -> Result<Metadata> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The table with this (possibly partial) name
    pub fn table(&self, name: &Identifier) -> ast::Result<&Schema> {
        match self.0.find(name) {
            Found::One(schema) => Ok(schema),
            _ => Err(ast::Error::unresolved_table(name)),
        }
    }

    pub fn tables(&self) -> impl Iterator<Item = &Schema> {
        self.0.values()
    }
}

impl With<Schema> for Metadata {
    fn with(mut self, schema: Schema) -> Self {
        let path: Vec<String> = schema.name().split('.').map(str::to_string).collect();
        self.0.extend([(path, schema)]);
        self
    }
}

impl With<Vec<Schema>> for Metadata {
    fn with(self, schemas: Vec<Schema>) -> Self {
        schemas.into_iter().fold(self, |metadata, schema| metadata.with(schema))
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for schema in self.tables() {
            writeln!(f, "{}", schema)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ast::tokens::identifier, data_type::DataType};

    const JSON: &str = r#"{
        "tables": [
            {
                "name": "PUMS.PUMS",
                "rows": 1000,
                "columns": [
                    {"name": "age", "type": "int", "lower": 0, "upper": 100},
                    {"name": "sex", "type": "string"},
                    {"name": "income", "type": "float", "lower": 0, "upper": 500000}
                ]
            },
            {"name": "other", "rows": 5, "columns": [{"name": "x", "type": "boolean"}]}
        ]
    }"#;

    #[test]
    fn test_from_json() {
        let metadata = Metadata::from_json(JSON).unwrap();
        println!("{}", metadata);
        let pums = metadata.table(&identifier("pums.pums")).unwrap();
        assert_eq!(pums.rows(), 1000);
        assert_eq!(pums.field("income").unwrap().data_type(), DataType::Float);
        assert_eq!(metadata.table(&identifier("OTHER")).unwrap().rows(), 5);
        assert!(matches!(
            metadata.table(&identifier("pums.other")),
            Err(ast::Error::UnresolvedTable(_))
        ));
        // Round trip through JSON
        let json = metadata.to_json().unwrap();
        assert_eq!(Metadata::from_json(&json).unwrap(), metadata);
    }

    #[test]
    fn test_invalid_json() {
        assert!(Metadata::from_json(r#"{"tables": [{"name": "t", "rows": 1, "columns": []}]}"#).is_err());
        assert!(Metadata::from_json(r#"{"tables": [{"name": "t", "columns": [{"name": "x", "type": "int"}]}]}"#).is_err());
        assert!(Metadata::from_json(r#"{"tables": [{"name": "t", "rows": 1, "columns": [{"name": "x", "type": "date"}]}]}"#).is_err());
        assert!(Metadata::from_json(r#"{"tables": [{"name": "t", "rows": 1, "columns": [{"name": "x", "type": "int"}]}]}"#).is_err());
        assert!(Metadata::from_json(r#"{"tables": [{"name": "t", "rows": 2, "columns": [{"name": "x", "type": "int"}]}]}"#).is_ok());
    }
}
