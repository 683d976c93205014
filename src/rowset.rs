//! # Query results
//!
//! A [`Rowset`] is row-oriented: row 0 is the header (the column names) and
//! the following rows hold the data.
//! A [`TypedRowset`] is the column-oriented equivalent, with every value cast
//! to the type of its column.
//!

use std::{fmt, ops::Index};

use crate::data_type::{self, DataType, Value};

#[derive(Clone, Debug, PartialEq)]
pub struct Rowset(Vec<Vec<Value>>);

impl Rowset {
    pub fn new<S: Into<String>, N: IntoIterator<Item = S>>(names: N, rows: Vec<Vec<Value>>) -> Rowset {
        let header = names.into_iter().map(|name| Value::Text(name.into())).collect();
        Rowset(std::iter::once(header).chain(rows).collect())
    }

    /// The column names
    pub fn names(&self) -> Vec<String> {
        self.0[0].iter().map(|name| name.to_string()).collect()
    }

    /// The data rows, without the header
    pub fn data(&self) -> &[Vec<Value>] {
        &self.0[1..]
    }

    /// The number of rows, header included
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there is no data row
    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    /// The values of the column at `index`
    pub fn column(&self, index: usize) -> impl Iterator<Item = &Value> {
        self.data().iter().map(move |row| &row[index])
    }
}

impl Index<usize> for Rowset {
    type Output = Vec<Value>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl fmt::Display for Rowset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.0 {
            writeln!(
                f,
                "{}",
                row.iter().map(|value| value.to_string()).collect::<Vec<_>>().join(" | ")
            )?;
        }
        Ok(())
    }
}

/// Columns by name, with the values cast to the type of the column
#[derive(Clone, Debug, PartialEq)]
pub struct TypedRowset {
    columns: Vec<(String, DataType, Vec<Value>)>,
    len: usize,
}

impl TypedRowset {
    pub fn new(rowset: &Rowset, types: &[DataType]) -> data_type::Result<TypedRowset> {
        let columns = rowset
            .names()
            .into_iter()
            .zip(types)
            .enumerate()
            .map(|(index, (name, data_type))| {
                let values = rowset
                    .column(index)
                    .map(|value| data_type.cast(value.clone()))
                    .collect::<data_type::Result<Vec<Value>>>()?;
                Ok((name, *data_type, values))
            })
            .collect::<data_type::Result<Vec<_>>>()?;
        Ok(TypedRowset {
            columns,
            len: rowset.data().len(),
        })
    }

    /// The number of data rows
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _, _)| name.as_str()).collect()
    }

    pub fn data_type(&self, name: &str) -> Option<DataType> {
        self.find(name).map(|(_, data_type, _)| *data_type)
    }

    /// The first column with this name
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.find(name).map(|(_, _, values)| values.as_slice())
    }

    fn find(&self, name: &str) -> Option<&(String, DataType, Vec<Value>)> {
        self.columns
            .iter()
            .find(|(column, _, _)| column.eq_ignore_ascii_case(name))
    }
}

impl Index<&str> for TypedRowset {
    type Output = [Value];

    fn index(&self, name: &str) -> &Self::Output {
        self.column(name)
            .unwrap_or_else(|| panic!("No column {} in the rowset", name))
    }
}

impl fmt::Display for TypedRowset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, data_type, values) in &self.columns {
            writeln!(
                f,
                "{} ({}): [{}]",
                name,
                data_type,
                values.iter().map(|value| value.to_string()).collect::<Vec<_>>().join(", ")
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rowset() -> Rowset {
        Rowset::new(
            ["married", "n", "m"],
            vec![
                vec![Value::from(0), Value::from(451.3), Value::Null],
                vec![Value::from(1), Value::from(549), Value::from(2.5)],
            ],
        )
    }

    #[test]
    fn test_rowset() {
        let rowset = rowset();
        println!("{}", rowset);
        assert_eq!(rowset.len(), 3);
        assert_eq!(rowset.names(), vec!["married", "n", "m"]);
        assert_eq!(rowset[2][0], Value::from(1));
        assert_eq!(rowset.column(1).count(), 2);
        let empty = Rowset::new(["a"], vec![]);
        assert_eq!(empty.len(), 1);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_typed_rowset() {
        let typed = TypedRowset::new(&rowset(), &[DataType::Integer, DataType::Integer, DataType::Float]).unwrap();
        println!("{}", typed);
        assert_eq!(typed.len(), 2);
        assert_eq!(typed["n"], [Value::from(451), Value::from(549)]);
        assert_eq!(typed["M"], [Value::Null, Value::from(2.5)]);
        assert_eq!(typed.data_type("married"), Some(DataType::Integer));
        assert!(typed.column("x").is_none());
        assert!(TypedRowset::new(&rowset(), &[DataType::Boolean, DataType::Float, DataType::Float]).is_err());
    }
}
