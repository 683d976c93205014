//! # Rewriting of private queries into exact sub-plans
//!
//! A private query is split in two:
//! - an *inner* query computing, per group, the group keys and the raw aggregates
//!   (`COUNT`, `SUM`, `MIN`, `MAX`) that can be noised,
//! - an *outer* query reading the inner one as the derived relation `exact`,
//!   recombining the raw aggregates into the requested outputs
//!   (`AVG = SUM / COUNT`, `VAR = SUM(x * x) / COUNT - (SUM / COUNT) * (SUM / COUNT)`, `STD = SQRT(VAR)`)
//!   and applying `HAVING`, `ORDER BY` and `LIMIT`.
//!
//! The inner query is executed exactly once by [`preprocess`], the outer one every time the noisy
//! raw aggregates are released.

use std::{collections::HashMap, error, fmt, result, sync::Arc};

use crate::{
    ast::{self, AggregateFunction, Expression, NamedExpression, OrderItem, Query, Relation},
    data_type::DataType,
    io::{self, Reader},
    namer::{self, EXACT, KEY},
    rowset::Rowset,
};

#[derive(Debug)]
pub enum Error {
    Query(ast::Error),
    Reader(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Query(err) => writeln!(f, "Query: {}", err),
            Error::Reader(err) => writeln!(f, "Reader: {}", err),
        }
    }
}

impl error::Error for Error {}

impl From<ast::Error> for Error {
    fn from(err: ast::Error) -> Self {
        Error::Query(err)
    }
}
impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Reader(err)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// A column of the inner query to be noised
#[derive(Clone, Debug, PartialEq)]
pub struct InnerColumn {
    pub name: String,
    pub aggregate: Expression,
    pub data_type: DataType,
    pub sensitivity: Option<f64>,
}

impl InnerColumn {
    /// The raw aggregate function
    pub fn function(&self) -> AggregateFunction {
        match &self.aggregate {
            Expression::Aggregate { function, .. } => *function,
            _ => AggregateFunction::Count,
        }
    }
}

/// A private query, preprocessed: the exact raw aggregates and the way to recombine them
#[derive(Clone, Debug)]
pub struct SubPlan {
    pub inner: Query,
    pub outer: Query,
    /// The group keys, first columns of the inner query
    pub key_columns: Vec<String>,
    /// The noised columns, after the keys
    pub inner_columns: Vec<InnerColumn>,
    pub names: Vec<String>,
    pub types: Vec<DataType>,
    /// Defined for the outputs that are plain `COUNT`, `SUM`, `MIN` or `MAX`
    pub sensitivities: Vec<Option<f64>>,
    /// The position in `inner_columns` of the `COUNT(*)` used to suppress groups
    pub threshold_column: Option<usize>,
    /// The public number of rows of the table
    pub table_rows: usize,
    pub exact: Arc<Rowset>,
}

impl SubPlan {
    /// The column names of the exact rowset
    pub fn exact_names(&self) -> Vec<String> {
        self.key_columns
            .iter()
            .cloned()
            .chain(self.inner_columns.iter().map(|column| column.name.clone()))
            .collect()
    }

    /// The number of noised raw aggregates
    pub fn composition(&self) -> usize {
        self.inner_columns.len()
    }
}

impl fmt::Display for SubPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "inner: {}", self.inner)?;
        writeln!(f, "outer: {}", self.outer)
    }
}

/// Accumulates the distinct raw aggregates of the inner query
#[derive(Default)]
struct RawAggregates(Vec<Expression>);

impl RawAggregates {
    /// A column reading the raw aggregate from the exact relation
    fn column(&mut self, function: AggregateFunction, argument: Option<Expression>) -> Expression {
        let aggregate = Expression::aggregate(function, argument);
        let name = raw_name(&aggregate);
        if !self.0.contains(&aggregate) {
            self.0.push(aggregate);
        }
        Expression::column(name)
    }

    /// The expression recombining raw aggregates into `aggregate`
    fn recombine(&mut self, aggregate: &Expression) -> ast::Result<Expression> {
        let Expression::Aggregate {
            function, argument, ..
        } = aggregate
        else {
            return Err(ast::Error::invalid_expression(aggregate));
        };
        let argument = argument.as_deref().cloned();
        if function.is_raw() {
            return Ok(self.column(*function, argument));
        }
        let argument = argument.ok_or_else(|| ast::Error::invalid_expression(aggregate))?;
        let count = self.column(AggregateFunction::Count, Some(argument.clone()));
        let sum = self.column(AggregateFunction::Sum, Some(argument.clone()));
        let mean = Expression::nested(Expression::divide(sum, count.clone()));
        if *function == AggregateFunction::Mean {
            return Ok(mean);
        }
        let factor = match argument {
            Expression::Binary { .. } => Expression::nested(argument),
            argument => argument,
        };
        let square = Expression::multiply(factor.clone(), factor);
        let sum_of_squares = self.column(AggregateFunction::Sum, Some(square));
        let var = Expression::nested(Expression::minus(
            Expression::divide(sum_of_squares, count),
            Expression::multiply(mean.clone(), mean),
        ));
        Ok(if *function == AggregateFunction::Var {
            var
        } else {
            Expression::function("SQRT", vec![var])
        })
    }
}

/// The name of a raw aggregate column
fn raw_name(aggregate: &Expression) -> String {
    let prefix = match aggregate {
        Expression::Aggregate { function, .. } => function.name().to_lowercase(),
        _ => String::from("agg"),
    };
    namer::name_from_content(prefix, aggregate)
}

/// Build the sub-plan of a private query and execute its inner query exactly.
///
/// This is the only step reading the private data.
pub fn preprocess<R: Reader<Error = io::Error>>(query: &Query, reader: &R) -> Result<SubPlan> {
    let scope = query.bind(reader.metadata())?;
    let table = match query.relation()? {
        Relation::Table { name, .. } => reader.metadata().table(name)?,
        Relation::Derived { .. } => {
            return Err(ast::Error::unsupported_construct("A private query over a derived relation").into())
        }
    };
    if !query.is_aggregate() {
        return Err(ast::Error::unsupported_construct(format!(
            "The private query {} does not aggregate",
            query
        ))
        .into());
    }
    let keys: Vec<Expression> = query.group_by.iter().cloned().collect();
    // Map group keys and aggregates to the columns of the exact relation
    let mut raw = RawAggregates::default();
    let mut replacements: HashMap<Expression, Expression> = HashMap::new();
    let key_columns: Vec<String> = keys
        .iter()
        .map(|key| {
            let name = namer::name_from_content(KEY, key);
            replacements.insert(key.clone(), Expression::column(name.clone()));
            name
        })
        .collect();
    // Columns spelled differently from their key, e.g. `p.married` for `GROUP BY married`
    let references = query
        .select
        .iter()
        .map(|item| &item.expression)
        .chain(&query.having)
        .chain(query.order_by.iter().map(|item| &item.expression));
    for expression in references {
        for column in expression.columns() {
            if let Some(position) = query.group_key(&scope, &Expression::Column(column.clone())) {
                replacements
                    .entry(Expression::Column(column.clone()))
                    .or_insert_with(|| Expression::column(key_columns[position].clone()));
            }
        }
    }
    for aggregate in query.aggregates() {
        let recombined = raw.recombine(aggregate)?;
        replacements.insert(aggregate.clone(), recombined);
    }
    let threshold_column = if keys.is_empty() {
        None
    } else {
        let count = Expression::aggregate(AggregateFunction::Count, None);
        raw.column(AggregateFunction::Count, None);
        raw.0.iter().position(|aggregate| *aggregate == count)
    };
    let inner_columns: Vec<InnerColumn> = raw
        .0
        .into_iter()
        .map(|aggregate| InnerColumn {
            name: raw_name(&aggregate),
            data_type: aggregate.data_type(&scope),
            sensitivity: aggregate.sensitivity(&scope),
            aggregate,
        })
        .collect();
    let inner = Query {
        select: keys
            .iter()
            .zip(&key_columns)
            .map(|(key, name)| NamedExpression::new(key.clone(), Some(name.as_str())))
            .chain(
                inner_columns
                    .iter()
                    .map(|column| NamedExpression::new(column.aggregate.clone(), Some(column.name.as_str()))),
            )
            .collect(),
        from: query.from.clone(),
        selection: query.selection.clone(),
        group_by: query.group_by.clone(),
        ..Query::default()
    };
    let outer = Query {
        select: query
            .select
            .iter()
            .map(|item| NamedExpression::new(item.expression.replace(&replacements), Some(item.name().as_str())))
            .collect(),
        from: vec![Relation::derived(inner.clone(), EXACT)].into(),
        having: query.having.as_ref().map(|having| having.replace(&replacements)),
        order_by: query
            .order_by
            .iter()
            .map(|item| OrderItem::new(item.expression.replace(&replacements), item.ascending))
            .collect(),
        limit: query.limit.clone(),
        ..Query::default()
    };
    log::debug!("inner query: {}", inner);
    log::debug!("outer query: {}", outer);
    let exact = reader.execute_query(&inner)?;
    log::info!("{} exact rows materialized", exact.data().len());
    let sensitivities = query
        .select
        .iter()
        .map(|item| match &item.expression {
            Expression::Aggregate { function, .. } if function.is_raw() => item.expression.sensitivity(&scope),
            _ => None,
        })
        .collect();
    Ok(SubPlan {
        names: query.names(),
        types: query
            .select
            .iter()
            .map(|item| item.expression.data_type(&scope))
            .collect(),
        sensitivities,
        inner,
        outer,
        key_columns,
        inner_columns,
        threshold_column,
        table_rows: table.rows(),
        exact: Arc::new(exact),
    })
}
