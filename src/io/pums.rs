//! A PUMS-like test table
//!
//! 1000 rows with columns `age`, `sex`, `educ`, `income` and `married`:
//! 451 rows are not married then 549 are, ages range from 18 to 97,
//! each of the 10 education levels has 100 rows.

use rand::{rngs::StdRng, Rng, SeedableRng};

use super::{MemoryReader, Table, DATA_GENERATION_SEED};
use crate::{
    builder::{Ready, With},
    data_type::{DataType, Value},
    metadata::{Metadata, Schema},
};

pub const NAME: &str = "PUMS.PUMS";
pub const ROWS: usize = 1000;
pub const NOT_MARRIED: usize = 451;

/// The schema of the table, with the declared bounds of its columns
pub fn schema() -> Schema {
    Schema::builder()
        .name(NAME)
        .rows(ROWS)
        .with(("age", DataType::Integer, 0., 100.))
        .with(("sex", DataType::Integer, 0., 1.))
        .with(("educ", DataType::Integer, 1., 16.))
        .with(("income", DataType::Float, 0., 500_000.))
        .with(("married", DataType::Integer, 0., 1.))
        .try_build()
        .expect("the PUMS schema is valid")
}

pub fn metadata() -> Metadata {
    Metadata::empty().with(schema())
}

/// The rows, deterministic
pub fn rows() -> Vec<Vec<Value>> {
    let mut rng = StdRng::seed_from_u64(DATA_GENERATION_SEED);
    (0..ROWS)
        .map(|i| {
            let age = 18 + (i as i64 * 37) % 80;
            let sex = rng.gen_range(0..=1i64);
            let educ = (i as i64 % 10) + 1;
            let income = (rng.gen_range(0. ..1.) * 2_000. * (age as f64)).round();
            let married = i64::from(i >= NOT_MARRIED);
            vec![
                Value::from(age),
                Value::from(sex),
                Value::from(educ),
                Value::from(income),
                Value::from(married),
            ]
        })
        .collect()
}

pub fn table() -> Table {
    Table::new(schema(), rows()).expect("the PUMS rows fit the schema")
}

/// An exact reader of the PUMS table
pub fn reader() -> MemoryReader {
    MemoryReader::new([table()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Reader;

    #[test]
    fn test_table() {
        let table = table();
        assert_eq!(table.rows().len(), ROWS);
        let married = table.rows().iter().filter(|row| row[4] == Value::from(1)).count();
        assert_eq!(married, ROWS - NOT_MARRIED);
        let ages: Vec<i64> = table
            .rows()
            .iter()
            .filter_map(|row| match row[0] {
                Value::Integer(age) => Some(age),
                _ => None,
            })
            .collect();
        assert_eq!(ages.iter().min(), Some(&18));
        assert_eq!(ages.iter().max(), Some(&97));
        // Deterministic
        assert_eq!(rows(), rows());
    }

    #[test]
    fn test_reader() {
        let reader = reader();
        println!("{}", reader.metadata());
        let rowset = reader
            .execute("SELECT COUNT(*) AS n FROM PUMS.PUMS WHERE age > 90 AND educ = 8")
            .unwrap();
        println!("{}", rowset);
        assert!(rowset[1][0].as_f64().unwrap() > 0.);
    }
}
