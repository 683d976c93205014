//! A reader delegating to an in-memory SQLite database, to cross-check the exact reader

use std::{collections::HashSet, result};

use rusqlite::{
    self, params_from_iter,
    types::{FromSql, FromSqlResult, Null, ToSql, ToSqlOutput, ValueRef},
    Connection,
};

use super::{Error, Reader, Result, Table};
use crate::{
    ast::Query,
    builder::With,
    data_type::{DataType, Value},
    metadata::Metadata,
    rowset::Rowset,
};

/// Converts sqlite errors to io errors
impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Other(err.to_string())
    }
}

fn sql_type(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Integer => "INTEGER",
        DataType::Float => "REAL",
        DataType::Text => "TEXT",
        DataType::Boolean => "BOOLEAN",
        DataType::Unknown => "",
    }
}

#[derive(Debug)]
pub struct SqliteReader {
    metadata: Metadata,
    connection: Connection,
}

impl SqliteReader {
    /// Load the tables in a fresh database, `a.b` tables are created in an attached `a` database
    pub fn new<I: IntoIterator<Item = Table>>(tables: I) -> Result<SqliteReader> {
        let connection = Connection::open_in_memory()?;
        let mut metadata = Metadata::empty();
        let mut attached = HashSet::new();
        for table in tables {
            let name = table.name().to_lowercase();
            if let Some((database, _)) = name.split_once('.') {
                if attached.insert(database.to_string()) {
                    connection.execute_batch(&format!("ATTACH DATABASE ':memory:' AS {}", database))?;
                }
            }
            let columns: Vec<String> = table
                .schema()
                .fields()
                .iter()
                .map(|field| format!("{} {}", field.name(), sql_type(field.data_type())))
                .collect();
            connection.execute_batch(&format!("CREATE TABLE {} ({})", name, columns.join(", ")))?;
            let placeholders = vec!["?"; columns.len()].join(", ");
            let mut statement =
                connection.prepare(&format!("INSERT INTO {} VALUES ({})", name, placeholders))?;
            for row in table.rows() {
                statement.execute(params_from_iter(row.iter()))?;
            }
            drop(statement);
            metadata = metadata.with(table.schema().clone());
        }
        Ok(SqliteReader {
            metadata,
            connection,
        })
    }
}

impl Reader for SqliteReader {
    type Error = Error;

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn execute_query(&self, query: &Query) -> Result<Rowset> {
        let mut statement = self.connection.prepare(&query.to_string())?;
        let rows: result::Result<Vec<Vec<Value>>, rusqlite::Error> = statement
            .query_map([], |row| {
                (0..row.as_ref().column_count())
                    .map(|i| row.get(i))
                    .collect()
            })?
            .collect();
        Ok(Rowset::new(query.names(), rows?))
    }
}

/// Implement the conversion of a Value to ToSqlOutput
impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Value::Null => Null.to_sql(),
            Value::Boolean(b) => b.to_sql(),
            Value::Integer(i) => i.to_sql(),
            Value::Float(f) => f.to_sql(),
            Value::Text(t) => t.to_sql(),
        }
    }
}

/// Read sql results as value
impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::integer(i),
            ValueRef::Real(f) => Value::float(f),
            ValueRef::Text(s) => Value::text(String::from_utf8_lossy(s)),
            ValueRef::Blob(_) => return Err(rusqlite::types::FromSqlError::InvalidType),
        })
    }
}
