//! # Readers executing queries over data
//!
//! A [`Reader`] executes queries of the supported subset and returns a [`Rowset`].
//! For now supports:
//! - In-memory tables with the exact [`MemoryReader`]
//! - SQLite using the ["sqlite"] feature, to cross-check the exact reader.
//!
//! The private reader of [`crate::differential_privacy`] is also a [`Reader`].
//!

pub mod accumulator;
pub mod memory;
pub mod pums;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::{convert::Infallible, error, fmt, result};

use crate::{
    ast::{self, Query},
    data_type::{self, DataType, Value},
    metadata::{self, Metadata, Schema},
    rowset::{Rowset, TypedRowset},
    sql,
};

pub use memory::MemoryReader;

const DATA_GENERATION_SEED: u64 = 1234;

// Error management
#[derive(Debug)]
pub enum Error {
    Dataset(String),
    Query(ast::Error),
    Other(String),
}

impl Error {
    pub fn dataset(dataset: impl fmt::Display) -> Error {
        Error::Dataset(format!("Dataset error {}", dataset))
    }
    pub fn other(desc: impl fmt::Display) -> Error {
        Error::Other(format!("{}", desc))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Dataset(dataset) => writeln!(f, "Dataset: {}", dataset),
            Error::Query(err) => writeln!(f, "Query: {}", err),
            Error::Other(desc) => writeln!(f, "{}", desc),
        }
    }
}

impl error::Error for Error {}

impl From<Infallible> for Error {
    fn from(err: Infallible) -> Self {
        Error::Other(err.to_string())
    }
}
impl From<ast::Error> for Error {
    fn from(err: ast::Error) -> Self {
        Error::Query(err)
    }
}
impl From<data_type::Error> for Error {
    fn from(err: data_type::Error) -> Self {
        Error::Other(err.to_string())
    }
}
impl From<metadata::Error> for Error {
    fn from(err: metadata::Error) -> Self {
        Error::Dataset(err.to_string())
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Some data with its schema
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    schema: Schema,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Check the rows fit the schema and cast their values
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Result<Table> {
        let types: Vec<DataType> = schema.fields().iter().map(|field| field.data_type()).collect();
        let rows = rows
            .into_iter()
            .map(|row| {
                if row.len() != types.len() {
                    return Err(Error::dataset(format!(
                        "{} expects rows of {} values",
                        schema.name(),
                        types.len()
                    )));
                }
                row.into_iter()
                    .zip(&types)
                    .map(|(value, data_type)| -> Result<Value> { Ok(data_type.cast(value)?) })
                    .collect::<Result<Vec<Value>>>()
            })
            .collect::<Result<Vec<Vec<Value>>>>()?;
        Ok(Table { schema, rows })
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn names(&self) -> Vec<&str> {
        self.schema.fields().iter().map(|field| field.name()).collect()
    }
}

/// Executes queries over some data
pub trait Reader {
    type Error: error::Error + From<ast::Error> + From<data_type::Error>;

    /// The tables readable and their columns
    fn metadata(&self) -> &Metadata;

    /// Execute a parsed query
    fn execute_query(&self, query: &Query) -> result::Result<Rowset, Self::Error>;

    fn parse(&self, query: &str) -> result::Result<Query, Self::Error> {
        Ok(sql::parse(query)?)
    }

    /// Execute a query, the header is the first row of the result
    fn execute(&self, query: &str) -> result::Result<Rowset, Self::Error> {
        self.execute_query(&self.parse(query)?)
    }

    /// Execute a query and return its columns with their inferred types
    fn execute_typed(&self, query: &str) -> result::Result<TypedRowset, Self::Error> {
        let query = self.parse(query)?;
        let scope = query.bind(self.metadata())?;
        let types: Vec<DataType> = query
            .select
            .iter()
            .map(|item| item.expression.data_type(&scope))
            .collect();
        Ok(TypedRowset::new(&self.execute_query(&query)?, &types)?)
    }
}
