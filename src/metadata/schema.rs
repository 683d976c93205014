use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt};

use super::{field::Field, Error, Result};
use crate::{
    builder::{Ready, With},
    data_type::DataType,
};

/// The description of a table: its name, its number of rows and its columns
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Builder")]
pub struct Schema {
    name: String,
    rows: usize,
    #[serde(rename = "columns")]
    fields: Vec<Field>,
}

impl Schema {
    /// Builder
    pub fn builder() -> Builder {
        Builder::new()
    }

    // Accessors

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The number of rows, used to derive the delta of approximate mechanisms
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Get a list of fields
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Access a field by name
    pub fn field(&self, name: &str) -> Result<&Field> {
        self.fields
            .iter()
            .find(|field| field.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::invalid_schema(format!("{} has no column {}", self.name, name)))
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} ({} rows) {{{}}}",
            self.name,
            self.rows,
            self.fields
                .iter()
                .map(|field| field.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Builder {
    name: Option<String>,
    rows: Option<usize>,
    /// Schema fields
    #[serde(default)]
    columns: Vec<Field>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn rows(mut self, rows: usize) -> Self {
        self.rows = Some(rows);
        self
    }
}

impl With<Field> for Builder {
    fn with(mut self, field: Field) -> Self {
        self.columns.push(field);
        self
    }
}

impl<S: Into<String>> With<(S, DataType)> for Builder {
    fn with(self, field: (S, DataType)) -> Self {
        self.with(Field::from(field))
    }
}

impl<S: Into<String>> With<(S, DataType, f64, f64)> for Builder {
    fn with(self, field: (S, DataType, f64, f64)) -> Self {
        self.with(Field::from(field))
    }
}

impl Ready<Schema> for Builder {
    type Error = Error;

    fn try_build(self) -> Result<Schema> {
        let name = self
            .name
            .ok_or_else(|| Error::invalid_schema("A table needs a name"))?;
        let rows = self
            .rows
            .ok_or_else(|| Error::invalid_schema(format!("{} needs a number of rows", name)))?;
        // delta = 1 / (n * sqrt(n)) must be below 1
        if rows < 2 {
            return Err(Error::invalid_schema(format!("{} needs at least 2 rows, got {}", name, rows)));
        }
        if self.columns.is_empty() {
            return Err(Error::invalid_schema(format!("{} has no column", name)));
        }
        // The fields must all be different
        let mut names = HashSet::new();
        for field in &self.columns {
            if !names.insert(field.name().to_lowercase()) {
                return Err(Error::invalid_schema(format!(
                    "{} has an ambiguous column {}",
                    name,
                    field.name()
                )));
            }
            if let (Some(lower), Some(upper)) = (field.lower(), field.upper()) {
                if !(lower <= upper) {
                    return Err(Error::invalid_schema(format!(
                        "{} has invalid bounds [{}, {}]",
                        field.name(),
                        lower,
                        upper
                    )));
                }
            }
        }
        Ok(Schema {
            name,
            rows,
            fields: self.columns,
        })
    }
}

impl TryFrom<Builder> for Schema {
    type Error = Error;

    fn try_from(builder: Builder) -> Result<Self> {
        builder.try_build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let schema = Schema::builder()
            .name("PUMS.PUMS")
            .rows(1000)
            .with(("age", DataType::Integer, 0., 100.))
            .with(("sex", DataType::Text))
            .try_build()
            .unwrap();
        println!("schema = {}", schema);
        assert_eq!(schema.fields().len(), 2);
        assert_eq!(schema.field("AGE").unwrap().bounds().unwrap().width(), 100.);
        assert!(schema.field("sex").unwrap().bounds().is_none());
        assert!(schema.field("income").is_err());
    }

    #[test]
    fn test_invalid() {
        let builder = || Schema::builder().name("t").rows(10);
        assert!(builder().try_build().is_err());
        assert!(builder()
            .with(("a", DataType::Float))
            .with(("A", DataType::Integer))
            .try_build()
            .is_err());
        assert!(builder()
            .with(("a", DataType::Float, 2., 1.))
            .try_build()
            .is_err());
        assert!(Schema::builder()
            .with(("a", DataType::Float))
            .try_build()
            .is_err());
        for rows in [0, 1] {
            assert!(Schema::builder()
                .name("t")
                .rows(rows)
                .with(("a", DataType::Float))
                .try_build()
                .is_err());
        }
    }
}
