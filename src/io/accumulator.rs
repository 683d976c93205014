//! Per-group aggregation states of the exact reader
//!
//! The reader evaluates the argument of an aggregate on every row of a group,
//! feeds it to [`Accumulator::update`], then calls [`Accumulator::finalize`]
//! once the group is complete. `COUNT(*)` is fed a non-null marker per row.

use std::cmp::Ordering;

use crate::{
    ast::{AggregateFunction, Error, Result},
    data_type::Value,
};

pub trait Accumulator: Send {
    /// Update the running state with the argument evaluated on one row
    fn update(&mut self, value: &Value) -> Result<()>;

    /// The aggregate of the values seen so far
    fn finalize(&self) -> Value;
}

/// A fresh accumulator for one group
pub fn accumulator(function: AggregateFunction) -> Box<dyn Accumulator> {
    match function {
        AggregateFunction::Count => Box::new(Count(0)),
        AggregateFunction::Sum => Box::new(Sum(Value::Null)),
        AggregateFunction::Min => Box::new(Extremum {
            value: Value::Null,
            keep: Ordering::Less,
        }),
        AggregateFunction::Max => Box::new(Extremum {
            value: Value::Null,
            keep: Ordering::Greater,
        }),
        AggregateFunction::Mean => Box::new(Moments::new(Statistic::Mean)),
        AggregateFunction::Var => Box::new(Moments::new(Statistic::Var)),
        AggregateFunction::Std => Box::new(Moments::new(Statistic::Std)),
    }
}

/// Counts non-null values
struct Count(i64);

impl Accumulator for Count {
    fn update(&mut self, value: &Value) -> Result<()> {
        if !value.is_null() {
            self.0 += 1;
        }
        Ok(())
    }

    fn finalize(&self) -> Value {
        Value::Integer(self.0)
    }
}

/// Null until a non-null value is seen
struct Sum(Value);

impl Accumulator for Sum {
    fn update(&mut self, value: &Value) -> Result<()> {
        match (&self.0, value) {
            (_, Value::Null) => {}
            (Value::Null, Value::Integer(_) | Value::Float(_)) => self.0 = value.clone(),
            (Value::Null, value) => return Err(Error::invalid_expression(format!("SUM({})", value))),
            (sum, value) => self.0 = sum.add(value)?,
        }
        Ok(())
    }

    fn finalize(&self) -> Value {
        self.0.clone()
    }
}

/// Keeps the value comparing as `keep` with all the others
struct Extremum {
    value: Value,
    keep: Ordering,
}

impl Accumulator for Extremum {
    fn update(&mut self, value: &Value) -> Result<()> {
        if !value.is_null() && (self.value.is_null() || value.sql_cmp(&self.value) == Some(self.keep)) {
            self.value = value.clone();
        }
        Ok(())
    }

    fn finalize(&self) -> Value {
        self.value.clone()
    }
}

#[derive(Clone, Copy)]
enum Statistic {
    Mean,
    Var,
    Std,
}

/// Running count, sum and sum of squares of the non-null values
struct Moments {
    statistic: Statistic,
    count: i64,
    sum: f64,
    sum_of_squares: f64,
}

impl Moments {
    fn new(statistic: Statistic) -> Self {
        Moments {
            statistic,
            count: 0,
            sum: 0.,
            sum_of_squares: 0.,
        }
    }
}

impl Accumulator for Moments {
    fn update(&mut self, value: &Value) -> Result<()> {
        if let Some(x) = value.as_f64() {
            self.count += 1;
            self.sum += x;
            self.sum_of_squares += x * x;
        }
        Ok(())
    }

    fn finalize(&self) -> Value {
        if self.count == 0 {
            return Value::Null;
        }
        let count = self.count as f64;
        let mean = self.sum / count;
        // Population variance
        let var = (self.sum_of_squares / count - mean * mean).max(0.);
        Value::Float(match self.statistic {
            Statistic::Mean => mean,
            Statistic::Var => var,
            Statistic::Std => var.sqrt(),
        })
    }
}
