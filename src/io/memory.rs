//! The exact in-memory reader
//!
//! Queries are executed in this order: WHERE, GROUP BY and aggregation,
//! projection, HAVING, ORDER BY then LIMIT.
//! An aggregate query without GROUP BY always returns one row.

use std::{cmp::Ordering, collections::HashMap};

use super::{
    accumulator::{accumulator, Accumulator},
    Error, Reader, Result, Table,
};
use crate::{
    ast::{self, expression::Bindings, AggregateFunction, Expression, Identifier, OrderItem, Query, Relation},
    builder::With,
    data_type::Value,
    hierarchy::{Found, Hierarchy},
    metadata::Metadata,
    rowset::Rowset,
};

/// Executes queries exactly over tables held in memory
#[derive(Clone, Debug)]
pub struct MemoryReader {
    metadata: Metadata,
    tables: Hierarchy<Table>,
}

impl MemoryReader {
    pub fn new<I: IntoIterator<Item = Table>>(tables: I) -> MemoryReader {
        let (metadata, tables) = tables.into_iter().fold(
            (Metadata::empty(), Hierarchy::empty()),
            |(metadata, tables), table| {
                let path: Vec<String> = table.name().split('.').map(str::to_string).collect();
                (
                    metadata.with(table.schema().clone()),
                    tables.with([(path, table)]),
                )
            },
        );
        MemoryReader { metadata, tables }
    }

    pub fn table(&self, name: &Identifier) -> ast::Result<&Table> {
        match self.tables.find(name) {
            Found::One(table) => Ok(table),
            _ => Err(ast::Error::unresolved_table(name)),
        }
    }
}

impl Reader for MemoryReader {
    type Error = Error;

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn execute_query(&self, query: &Query) -> Result<Rowset> {
        query.bind(&self.metadata)?;
        let relation = query.relation()?;
        let rowset = match relation {
            Relation::Table { name, .. } => {
                let table = self.table(name)?;
                let names: Vec<String> = table.names().into_iter().map(str::to_string).collect();
                execute(query, &relation.path(), &names, table.rows())?
            }
            Relation::Derived { query: derived, .. } => {
                let derived = self.execute_query(derived)?;
                execute(query, &relation.path(), &derived.names(), derived.data())?
            }
        };
        log::debug!("{} returned {} rows", query, rowset.data().len());
        Ok(rowset)
    }
}

/// Evaluate a cell, a division by zero gives a null cell
fn cell(expression: &Expression, bindings: &Bindings) -> ast::Result<Value> {
    match expression.evaluate(bindings) {
        Err(ast::Error::ZeroDenominator(_)) => Ok(Value::Null),
        result => result,
    }
}

/// The ordering of two rows of sort keys
fn compare(left: &[Value], right: &[Value], order_by: &[OrderItem]) -> Ordering {
    left.iter()
        .zip(right)
        .zip(order_by)
        .map(|((l, r), item)| {
            let ordering = l.total_cmp(r);
            if item.ascending {
                ordering
            } else {
                ordering.reverse()
            }
        })
        .find(|ordering| *ordering != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Execute `query` over the rows of a relation visible under `path`,
/// with columns `names`
pub fn execute(
    query: &Query,
    path: &[String],
    names: &[String],
    rows: &[Vec<Value>],
) -> ast::Result<Rowset> {
    let bindings = |row: &[Value]| -> Bindings {
        names
            .iter()
            .zip(row)
            .map(|(name, value)| {
                let mut key = path.to_vec();
                key.push(name.clone());
                (key, value.clone())
            })
            .collect()
    };
    let mut filtered = vec![];
    for row in rows {
        let bindings = bindings(row);
        if let Some(selection) = &query.selection {
            if cell(selection, &bindings)?.as_bool() != Some(true) {
                continue;
            }
        }
        filtered.push(bindings);
    }
    // Each row to output comes with the aggregates of its group
    let groups: Vec<(Bindings, HashMap<Expression, Expression>)> = if query.is_aggregate() {
        aggregate(query, filtered)?
    } else {
        filtered.into_iter().map(|bindings| (bindings, HashMap::new())).collect()
    };
    let output_names = query.names();
    let mut outputs: Vec<(Vec<Value>, Vec<Value>)> = vec![];
    for (bindings, aggregates) in groups {
        let values = query
            .select
            .iter()
            .map(|item| cell(&item.expression.replace(&aggregates), &bindings))
            .collect::<ast::Result<Vec<Value>>>()?;
        // HAVING and ORDER BY can use the output names
        let bindings = bindings.with(
            output_names
                .iter()
                .zip(&values)
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        if let Some(having) = &query.having {
            if cell(&having.replace(&aggregates), &bindings)?.as_bool() != Some(true) {
                continue;
            }
        }
        let keys = query
            .order_by
            .iter()
            .map(|item| cell(&item.expression.replace(&aggregates), &bindings))
            .collect::<ast::Result<Vec<Value>>>()?;
        outputs.push((values, keys));
    }
    // Stable sort
    outputs.sort_by(|(_, left), (_, right)| compare(left, right, &query.order_by));
    if let Some(limit) = query.limit() {
        outputs.truncate(limit);
    }
    Ok(Rowset::new(
        output_names,
        outputs.into_iter().map(|(values, _)| values).collect(),
    ))
}

/// Group the rows, in order of first appearance, and compute the aggregates of each group
fn aggregate(
    query: &Query,
    rows: Vec<Bindings>,
) -> ast::Result<Vec<(Bindings, HashMap<Expression, Expression>)>> {
    let aggregates: Vec<(&Expression, AggregateFunction, Option<&Expression>)> = query
        .aggregates()
        .into_iter()
        .filter_map(|expression| match expression {
            Expression::Aggregate {
                function, argument, ..
            } => Some((expression, *function, argument.as_deref())),
            _ => None,
        })
        .collect();
    let fresh = || -> Vec<Box<dyn Accumulator>> {
        aggregates
            .iter()
            .map(|(_, function, _)| accumulator(*function))
            .collect()
    };
    let mut groups: Vec<(Bindings, Vec<Box<dyn Accumulator>>)> = vec![];
    let mut index: HashMap<Vec<Value>, usize> = HashMap::new();
    for bindings in rows {
        let key = query
            .group_by
            .iter()
            .map(|expression| cell(expression, &bindings))
            .collect::<ast::Result<Vec<Value>>>()?;
        let position = match index.get(&key) {
            Some(position) => *position,
            None => {
                groups.push((bindings.clone(), fresh()));
                index.insert(key, groups.len() - 1);
                groups.len() - 1
            }
        };
        for ((_, _, argument), accumulator) in aggregates.iter().zip(groups[position].1.iter_mut()) {
            let value = match argument {
                Some(argument) => cell(argument, &bindings)?,
                // COUNT(*)
                None => Value::Boolean(true),
            };
            accumulator.update(&value)?;
        }
    }
    if groups.is_empty() && query.group_by.is_empty() {
        groups.push((Bindings::empty(), fresh()));
    }
    Ok(groups
        .into_iter()
        .map(|(bindings, accumulators)| {
            let values = aggregates
                .iter()
                .zip(accumulators)
                .map(|((expression, _, _), accumulator)| {
                    ((*expression).clone(), Expression::from(accumulator.finalize()))
                })
                .collect();
            (bindings, values)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::pums;

    fn first_column(rowset: &Rowset) -> Vec<Value> {
        rowset.column(0).cloned().collect()
    }

    #[test]
    fn test_count() {
        let reader = pums::reader();
        let rowset = reader.execute("SELECT COUNT(*) AS n FROM PUMS.PUMS").unwrap();
        println!("{}", rowset);
        assert_eq!(rowset.len(), 2);
        assert_eq!(rowset.names(), vec!["n"]);
        assert_eq!(rowset[1][0], Value::from(1000));
    }

    #[test]
    fn test_group_by() {
        let reader = pums::reader();
        let rowset = reader
            .execute("SELECT married, COUNT(*) AS n FROM PUMS.PUMS GROUP BY married ORDER BY n DESC")
            .unwrap();
        println!("{}", rowset);
        assert_eq!(first_column(&rowset), vec![Value::from(1), Value::from(0)]);
        assert_eq!(rowset.column(1).cloned().collect::<Vec<_>>(), vec![Value::from(549), Value::from(451)]);
        let rowset = reader
            .execute("SELECT educ, COUNT(*) AS n FROM PUMS.PUMS GROUP BY educ HAVING educ > 5 ORDER BY educ")
            .unwrap();
        assert_eq!(rowset.data().len(), 5);
        assert!(rowset.column(1).all(|n| *n == Value::from(100)));
    }

    #[test]
    fn test_grouping() {
        let reader = pums::reader();
        for query in [
            "SELECT age, COUNT(*) FROM PUMS.PUMS GROUP BY educ",
            "SELECT COUNT(*) AS n FROM PUMS.PUMS GROUP BY educ ORDER BY age",
        ] {
            assert!(
                matches!(
                    reader.execute(query),
                    Err(Error::Query(ast::Error::UnsupportedConstruct(_)))
                ),
                "{}",
                query
            );
        }
        let rowset = reader
            .execute("SELECT p.married, COUNT(*) AS n FROM PUMS.PUMS AS p GROUP BY married ORDER BY p.married")
            .unwrap();
        println!("{}", rowset);
        assert_eq!(first_column(&rowset), vec![Value::from(0), Value::from(1)]);
    }

    #[test]
    fn test_first_appearance_order() {
        let reader = pums::reader();
        let rowset = reader
            .execute("SELECT educ FROM PUMS.PUMS GROUP BY educ LIMIT 3")
            .unwrap();
        assert_eq!(first_column(&rowset), vec![Value::from(1), Value::from(2), Value::from(3)]);
    }

    #[test]
    fn test_empty_input() {
        let reader = pums::reader();
        let rowset = reader.execute("SELECT age AS a FROM PUMS.PUMS WHERE age > 100").unwrap();
        assert_eq!(rowset.len(), 1);
        let rowset = reader
            .execute("SELECT COUNT(*) AS n, SUM(age) AS s, AVG(age) AS m FROM PUMS.PUMS WHERE age > 100")
            .unwrap();
        assert_eq!(rowset[1], vec![Value::from(0), Value::Null, Value::Null]);
        let rowset = reader
            .execute("SELECT sex, COUNT(*) FROM PUMS.PUMS WHERE age > 100 GROUP BY sex")
            .unwrap();
        assert_eq!(rowset.len(), 1);
    }

    #[test]
    fn test_expressions() {
        let reader = pums::reader();
        let rowset = reader
            .execute("SELECT SUM(age) / COUNT(*) AS m, AVG(age) AS a, COUNT(*) / 0 AS z FROM PUMS.PUMS")
            .unwrap();
        println!("{}", rowset);
        assert_eq!(rowset[1][0], rowset[1][1]);
        // Division by zero is a null cell
        assert_eq!(rowset[1][2], Value::Null);
    }

    #[test]
    fn test_rows() {
        let reader = pums::reader();
        let rowset = reader
            .execute("SELECT p.age AS a, educ FROM PUMS.PUMS AS p WHERE p.age > 90 AND educ = 8 ORDER BY a DESC")
            .unwrap();
        println!("{}", rowset);
        assert!(rowset.data().len() > 0);
        let ages: Vec<f64> = rowset.column(0).filter_map(Value::as_f64).collect();
        assert!(ages.windows(2).all(|w| w[0] >= w[1]));
        assert!(ages.iter().all(|age| *age > 90.));
    }

    #[test]
    fn test_derived() {
        let reader = pums::reader();
        let inner = crate::sql::parse(
            "SELECT married AS m, COUNT(*) AS n, SUM(age) AS s FROM PUMS.PUMS GROUP BY married",
        )
        .unwrap();
        let outer = Query {
            select: vec![
                crate::ast::NamedExpression::new(Expression::column("m"), None),
                crate::ast::NamedExpression::new(
                    Expression::divide(Expression::column("s"), Expression::column("n")),
                    Some("mean_age"),
                ),
            ]
            .into(),
            from: vec![Relation::derived(inner, "exact")].into(),
            ..Query::default()
        };
        println!("{}", outer);
        let derived = reader.execute_query(&outer).unwrap();
        let direct = reader
            .execute("SELECT married AS m, AVG(age) AS mean_age FROM PUMS.PUMS GROUP BY married")
            .unwrap();
        assert_eq!(derived.data().len(), 2);
        for (left, right) in derived.data().iter().zip(direct.data()) {
            assert_eq!(left[0], right[0]);
            let (l, r) = (left[1].as_f64().unwrap(), right[1].as_f64().unwrap());
            assert!((l - r).abs() < 1e-9);
        }
    }
}
