//! Scalar and aggregate expressions
//!
//! Expressions carry their static analysis: type inference, propagation of
//! declared bounds, sensitivity of aggregates, and evaluation against bindings.

use std::{cmp::Ordering, collections::HashMap};

use super::{
    find_nodes, impl_syntax_traits,
    tokens::{self, FuncName, Identifier, Op},
    Error, Kind, Result, Scope, Sequence, Syntax,
};
use crate::{
    data_type::{DataType, Interval, Value},
    hierarchy::{Found, Hierarchy},
    visitor::{self, Visitor},
};

/// Values of the columns visible to an expression, addressed by (qualified) name
pub type Bindings = Hierarchy<Value>;

/// A literal value with the text it was written with
#[derive(Debug, Clone)]
pub struct Literal {
    value: Value,
    text: String,
}

impl Literal {
    pub fn new(value: Value) -> Literal {
        let text = value.to_sql();
        Literal { value, text }
    }

    pub fn parsed<S: Into<String>>(value: Value, text: S) -> Literal {
        Literal {
            value,
            text: text.into(),
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl Syntax for Literal {
    fn kind(&self) -> Kind {
        Kind::Literal
    }

    fn text(&self) -> Option<&str> {
        Some(&self.text)
    }

    fn children(&self) -> Vec<&dyn Syntax> {
        vec![]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Count,
    Sum,
    Min,
    Max,
    Mean,
    Var,
    Std,
}

impl AggregateFunction {
    pub fn from_name(name: &str) -> Option<AggregateFunction> {
        match name.to_uppercase().as_str() {
            "COUNT" => Some(AggregateFunction::Count),
            "SUM" => Some(AggregateFunction::Sum),
            "MIN" => Some(AggregateFunction::Min),
            "MAX" => Some(AggregateFunction::Max),
            "AVG" | "MEAN" => Some(AggregateFunction::Mean),
            "VAR" | "VARIANCE" | "VAR_POP" => Some(AggregateFunction::Var),
            "STD" | "STDDEV" | "STDDEV_POP" => Some(AggregateFunction::Std),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
            AggregateFunction::Mean => "AVG",
            AggregateFunction::Var => "VAR",
            AggregateFunction::Std => "STD",
        }
    }

    /// Raw aggregates are noised directly, the others are recombined from raw ones
    pub fn is_raw(&self) -> bool {
        matches!(
            self,
            AggregateFunction::Count
                | AggregateFunction::Sum
                | AggregateFunction::Min
                | AggregateFunction::Max
        )
    }
}

/// The scalar functions
pub const FUNCTIONS: [&str; 5] = ["ABS", "SQRT", "CEIL", "FLOOR", "ROUND"];

#[derive(Debug, Clone)]
pub enum Expression {
    Literal(Literal),
    Column(Identifier),
    Unary {
        op: Op,
        operand: Box<Expression>,
    },
    Binary {
        left: Box<Expression>,
        op: Op,
        right: Box<Expression>,
    },
    Nested(Box<Expression>),
    IsNull {
        operand: Box<Expression>,
        negated: bool,
    },
    Function {
        name: FuncName,
        args: Sequence<Expression>,
    },
    /// `argument` is `None` for `COUNT(*)`
    Aggregate {
        name: FuncName,
        function: AggregateFunction,
        argument: Option<Box<Expression>>,
    },
}

impl_syntax_traits!(Literal, Expression);

impl Syntax for Expression {
    fn kind(&self) -> Kind {
        Kind::Expression
    }

    fn children(&self) -> Vec<&dyn Syntax> {
        match self {
            Expression::Literal(literal) => vec![literal as &dyn Syntax],
            Expression::Column(identifier) => vec![identifier as &dyn Syntax],
            Expression::Unary { op, operand } => vec![op as &dyn Syntax, operand.as_ref()],
            Expression::Binary { left, op, right } => {
                vec![left.as_ref() as &dyn Syntax, op, right.as_ref()]
            }
            Expression::Nested(expression) => vec![
                &tokens::LEFT_PARENTHESIS as &dyn Syntax,
                expression.as_ref(),
                &tokens::RIGHT_PARENTHESIS,
            ],
            Expression::IsNull { operand, negated } => {
                let mut children: Vec<&dyn Syntax> = vec![operand.as_ref(), &tokens::IS];
                if *negated {
                    children.push(&tokens::NOT);
                }
                children.push(&tokens::NULL);
                children
            }
            Expression::Function { name, args } => vec![
                name as &dyn Syntax,
                &tokens::LEFT_PARENTHESIS,
                args,
                &tokens::RIGHT_PARENTHESIS,
            ],
            Expression::Aggregate { name, argument, .. } => vec![
                name as &dyn Syntax,
                &tokens::LEFT_PARENTHESIS,
                argument
                    .as_ref()
                    .map_or(&tokens::STAR as &dyn Syntax, |argument| {
                        argument.as_ref() as &dyn Syntax
                    }),
                &tokens::RIGHT_PARENTHESIS,
            ],
        }
    }
}

/// Builders for binary operations
macro_rules! binary_constructors {
    ($($name:ident => $op:literal),*) => {
        $(
            pub fn $name(left: Expression, right: Expression) -> Expression {
                Expression::binary(left, $op, right)
            }
        )*
    };
}

impl Expression {
    pub fn literal<V: Into<Value>>(value: V) -> Expression {
        Expression::Literal(Literal::new(value.into()))
    }

    pub fn column<S: Into<String>>(name: S) -> Expression {
        Expression::Column(Identifier::new(name))
    }

    pub fn unary(op: &str, operand: Expression) -> Expression {
        Expression::Unary {
            op: Op::from(op),
            operand: Box::new(operand),
        }
    }

    pub fn binary(left: Expression, op: &str, right: Expression) -> Expression {
        Expression::Binary {
            left: Box::new(left),
            op: Op::from(op),
            right: Box::new(right),
        }
    }

    pub fn nested(expression: Expression) -> Expression {
        Expression::Nested(Box::new(expression))
    }

    pub fn function(name: &str, args: Vec<Expression>) -> Expression {
        Expression::Function {
            name: FuncName::from(name.to_uppercase()),
            args: args.into(),
        }
    }

    pub fn aggregate(function: AggregateFunction, argument: Option<Expression>) -> Expression {
        Expression::Aggregate {
            name: FuncName::from_static(function.name()),
            function,
            argument: argument.map(Box::new),
        }
    }

    binary_constructors!(plus => "+", minus => "-", multiply => "*", divide => "/");

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Expression::Aggregate { .. })
    }

    /// The aggregate sub-expressions, outermost first
    pub fn aggregates(&self) -> Vec<&Expression> {
        find_nodes::<Expression>(self, None)
            .into_iter()
            .filter(|expression| expression.is_aggregate())
            .collect()
    }

    pub fn has_aggregate(&self) -> bool {
        !self.aggregates().is_empty()
    }

    /// The maximum number of nested aggregates, 2 for `SUM(COUNT(x))`
    pub fn aggregate_depth(&self) -> usize {
        visitor::accept(self, &AggregateDepth)
    }

    /// The columns referenced
    pub fn columns(&self) -> Vec<&Identifier> {
        find_nodes::<Expression>(self, None)
            .into_iter()
            .filter_map(|expression| match expression {
                Expression::Column(identifier) => Some(identifier),
                _ => None,
            })
            .collect()
    }

    /// Substitute the sub-expressions found in `map`, outermost first
    pub fn replace(&self, map: &HashMap<Expression, Expression>) -> Expression {
        if let Some(replacement) = map.get(self) {
            return replacement.clone();
        }
        match self {
            Expression::Literal(_) | Expression::Column(_) => self.clone(),
            Expression::Unary { op, operand } => Expression::Unary {
                op: op.clone(),
                operand: Box::new(operand.replace(map)),
            },
            Expression::Binary { left, op, right } => Expression::Binary {
                left: Box::new(left.replace(map)),
                op: op.clone(),
                right: Box::new(right.replace(map)),
            },
            Expression::Nested(expression) => Expression::nested(expression.replace(map)),
            Expression::IsNull { operand, negated } => Expression::IsNull {
                operand: Box::new(operand.replace(map)),
                negated: *negated,
            },
            Expression::Function { name, args } => Expression::Function {
                name: name.clone(),
                args: args.iter().map(|arg| arg.replace(map)).collect(),
            },
            Expression::Aggregate {
                name,
                function,
                argument,
            } => Expression::Aggregate {
                name: name.clone(),
                function: *function,
                argument: argument
                    .as_ref()
                    .map(|argument| Box::new(argument.replace(map))),
            },
        }
    }

    /// Structural type inference
    pub fn data_type(&self, scope: &Scope) -> DataType {
        match self {
            Expression::Literal(literal) => literal.value().data_type(),
            Expression::Column(identifier) => scope
                .symbol(identifier)
                .map_or(DataType::Unknown, |symbol| symbol.data_type()),
            Expression::Unary { op, operand } => {
                if op.as_str().eq_ignore_ascii_case("NOT") {
                    DataType::Boolean
                } else {
                    operand.data_type(scope)
                }
            }
            Expression::Binary { left, op, right } => match op.as_str() {
                "+" | "-" | "*" | "%" => {
                    let data_type = left.data_type(scope).widen(&right.data_type(scope));
                    if data_type.is_numeric() {
                        data_type
                    } else {
                        DataType::Unknown
                    }
                }
                "/" => DataType::Float,
                _ => DataType::Boolean,
            },
            Expression::Nested(expression) => expression.data_type(scope),
            Expression::IsNull { .. } => DataType::Boolean,
            Expression::Function { name, args } => match (name.as_str(), args.first()) {
                ("SQRT", _) => DataType::Float,
                (_, Some(arg)) => arg.data_type(scope),
                (_, None) => DataType::Unknown,
            },
            Expression::Aggregate {
                function, argument, ..
            } => match (function, argument) {
                (AggregateFunction::Count, _) => DataType::Integer,
                (AggregateFunction::Sum | AggregateFunction::Min | AggregateFunction::Max, Some(argument)) => {
                    argument.data_type(scope)
                }
                (AggregateFunction::Mean | AggregateFunction::Var | AggregateFunction::Std, _) => {
                    DataType::Float
                }
                _ => DataType::Unknown,
            },
        }
    }

    /// Bounds of the values, propagated from the declared bounds of the columns
    pub fn bounds(&self, scope: &Scope) -> Option<Interval> {
        match self {
            Expression::Literal(literal) => literal.value().as_f64().map(Interval::value),
            Expression::Column(identifier) => scope.symbol(identifier).ok()?.bounds(),
            Expression::Unary { op, operand } if op == "-" => Some(-operand.bounds(scope)?),
            Expression::Binary { left, op, right } => {
                let (left, right) = (left.bounds(scope)?, right.bounds(scope)?);
                match op.as_str() {
                    "+" => Some(left + right),
                    "-" => Some(left - right),
                    "*" => Some(left * right),
                    "/" => left.checked_div(&right),
                    _ => None,
                }
            }
            Expression::Nested(expression) => expression.bounds(scope),
            Expression::Function { name, args } => {
                let arg = args.first()?.bounds(scope)?;
                match name.as_str() {
                    "ABS" => Some(arg.abs()),
                    "SQRT" => arg.sqrt(),
                    "CEIL" => Some(arg.map_monotonic(f64::ceil)),
                    "FLOOR" => Some(arg.map_monotonic(f64::floor)),
                    "ROUND" if args.len() == 1 => Some(arg.map_monotonic(f64::round)),
                    _ => None,
                }
            }
            Expression::Aggregate {
                function: AggregateFunction::Min | AggregateFunction::Max | AggregateFunction::Mean,
                argument: Some(argument),
                ..
            } => argument.bounds(scope),
            _ => None,
        }
    }

    /// The maximum change of the exact value when one record is added, removed or changed.
    /// Only raw aggregates have one.
    pub fn sensitivity(&self, scope: &Scope) -> Option<f64> {
        match self {
            Expression::Aggregate {
                function: AggregateFunction::Count,
                ..
            } => Some(1.),
            Expression::Aggregate {
                function: AggregateFunction::Sum | AggregateFunction::Min | AggregateFunction::Max,
                argument: Some(argument),
                ..
            } => argument.bounds(scope).map(|bounds| bounds.width()),
            _ => None,
        }
    }

    /// Evaluate with the values of the columns in `bindings`.
    /// Columns absent from the bindings and aggregates are `Unevaluable`.
    pub fn evaluate(&self, bindings: &Bindings) -> Result<Value> {
        match self {
            Expression::Literal(literal) => Ok(literal.value().clone()),
            Expression::Column(identifier) => match bindings.find(identifier) {
                Found::One(value) => Ok(value.clone()),
                Found::Zero => Err(Error::unevaluable(self)),
                Found::More => Err(Error::ambiguous_column(identifier)),
            },
            Expression::Unary { op, operand } => {
                let value = operand.evaluate(bindings)?;
                if op == "-" {
                    Ok(value.neg()?)
                } else if op.as_str().eq_ignore_ascii_case("NOT") {
                    match value {
                        Value::Null => Ok(Value::Null),
                        Value::Boolean(b) => Ok(Value::Boolean(!b)),
                        _ => Err(Error::invalid_expression(self)),
                    }
                } else {
                    Err(Error::invalid_expression(self))
                }
            }
            Expression::Binary { left, op, right } => {
                let left = left.evaluate(bindings)?;
                match (op.as_str().to_uppercase().as_str(), left.as_bool()) {
                    ("AND", Some(false)) => return Ok(Value::Boolean(false)),
                    ("OR", Some(true)) => return Ok(Value::Boolean(true)),
                    _ => (),
                }
                binary_value(op, &left, &right.evaluate(bindings)?)
                    .ok_or_else(|| Error::invalid_expression(self))?
            }
            Expression::Nested(expression) => expression.evaluate(bindings),
            Expression::IsNull { operand, negated } => {
                Ok(Value::Boolean(operand.evaluate(bindings)?.is_null() != *negated))
            }
            Expression::Function { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| arg.evaluate(bindings))
                    .collect::<Result<Vec<Value>>>()?;
                function_value(name, &args).ok_or_else(|| Error::invalid_expression(self))
            }
            Expression::Aggregate { .. } => Err(Error::unevaluable(self)),
        }
    }
}

impl From<Value> for Expression {
    fn from(value: Value) -> Self {
        Expression::Literal(Literal::new(value))
    }
}

/// `None` for unknown operators or operands of the wrong type
fn binary_value(op: &Op, left: &Value, right: &Value) -> Option<Result<Value>> {
    let compare = |accept: fn(Ordering) -> bool| -> Result<Value> {
        Ok(left
            .sql_cmp(right)
            .map_or(Value::Null, |ordering| Value::Boolean(accept(ordering))))
    };
    let value = match op.as_str().to_uppercase().as_str() {
        "+" => left.add(right).map_err(Error::from),
        "-" => left.sub(right).map_err(Error::from),
        "*" => left.mul(right).map_err(Error::from),
        "/" => left.div(right).map_err(Error::from),
        "%" => left.rem(right).map_err(Error::from),
        "=" => compare(|o| o == Ordering::Equal),
        "<>" | "!=" => compare(|o| o != Ordering::Equal),
        "<" => compare(|o| o == Ordering::Less),
        "<=" => compare(|o| o != Ordering::Greater),
        ">" => compare(|o| o == Ordering::Greater),
        ">=" => compare(|o| o != Ordering::Less),
        // Three-valued logic, the short-circuits are handled by the caller
        "AND" => match (left, right) {
            (_, Value::Boolean(false)) => Ok(Value::Boolean(false)),
            (Value::Boolean(true), Value::Boolean(true)) => Ok(Value::Boolean(true)),
            (Value::Null | Value::Boolean(_), Value::Null | Value::Boolean(_)) => Ok(Value::Null),
            _ => return None,
        },
        "OR" => match (left, right) {
            (_, Value::Boolean(true)) => Ok(Value::Boolean(true)),
            (Value::Boolean(false), Value::Boolean(false)) => Ok(Value::Boolean(false)),
            (Value::Null | Value::Boolean(_), Value::Null | Value::Boolean(_)) => Ok(Value::Null),
            _ => return None,
        },
        _ => return None,
    };
    Some(value)
}

/// `None` for unknown functions or arguments of the wrong type
fn function_value(name: &FuncName, args: &[Value]) -> Option<Value> {
    let round = |x: f64, digits: i64| {
        let factor = 10f64.powi(digits as i32);
        (x * factor).round() / factor
    };
    Some(match (name.as_str(), args) {
        (_, [Value::Null, ..]) => Value::Null,
        ("ABS", [Value::Integer(i)]) => Value::Integer(i.checked_abs()?),
        ("ABS", [Value::Float(x)]) => Value::Float(x.abs()),
        // The square root of a negative noisy estimate is undefined
        ("SQRT", [x]) => match x.as_f64()? {
            x if x < 0. => Value::Null,
            x => Value::Float(x.sqrt()),
        },
        ("CEIL" | "FLOOR" | "ROUND", [Value::Integer(i)]) => Value::Integer(*i),
        ("CEIL", [Value::Float(x)]) => Value::Float(x.ceil()),
        ("FLOOR", [Value::Float(x)]) => Value::Float(x.floor()),
        ("ROUND", [Value::Float(x)]) => Value::Float(x.round()),
        ("ROUND", [Value::Float(x), Value::Integer(digits)]) => Value::Float(round(*x, *digits)),
        ("ROUND", [Value::Integer(i), Value::Integer(_)]) => Value::Integer(*i),
        _ => return None,
    })
}

/// Counts the nesting of aggregates
struct AggregateDepth;

impl<'a> Visitor<'a, usize> for AggregateDepth {
    fn visit(&self, node: &'a dyn Syntax, children: Vec<usize>) -> usize {
        let depth = children.into_iter().max().unwrap_or(0);
        match node.as_any().downcast_ref::<Expression>() {
            Some(expression) if expression.is_aggregate() => depth + 1,
            _ => depth,
        }
    }
}
