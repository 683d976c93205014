//! Conversion of `sqlparser` expressions

use sqlparser::ast;

use crate::{
    ast::{
        expression::FUNCTIONS, AggregateFunction, Error, Expression, Identifier, Literal, Result,
    },
    data_type::Value,
};

/// Returns the identifier value. If it is quoted it returns its value
/// as it is whereas if unquoted it returns the lowercase value.
pub fn lower_case_unquoted_ident(ident: &ast::Ident) -> String {
    if ident.quote_style.is_some() {
        ident.value.clone()
    } else {
        ident.value.to_lowercase()
    }
}

/// Implement conversion from Ident vector to Identifier
pub fn identifier(idents: &[ast::Ident]) -> Identifier {
    Identifier::new(
        idents
            .iter()
            .map(lower_case_unquoted_ident)
            .collect::<Vec<_>>()
            .join("."),
    )
}

fn value(value: &ast::Value) -> Result<Literal> {
    Ok(match value {
        ast::Value::Number(number, _) => {
            let parsed = match number.parse::<i64>() {
                Ok(integer) => Value::Integer(integer),
                Err(_) => Value::Float(
                    number
                        .parse::<f64>()
                        .map_err(|_| Error::parsing_error(number))?,
                ),
            };
            Literal::parsed(parsed, number.as_str())
        }
        ast::Value::SingleQuotedString(text) => Literal::new(Value::text(text.as_str())),
        ast::Value::Boolean(b) => Literal::parsed(Value::Boolean(*b), if *b { "TRUE" } else { "FALSE" }),
        ast::Value::Null => Literal::parsed(Value::Null, "NULL"),
        value => return Err(Error::unsupported_construct(format!("The literal {}", value))),
    })
}

fn binary_operator(op: &ast::BinaryOperator) -> Result<&'static str> {
    Ok(match op {
        ast::BinaryOperator::Plus => "+",
        ast::BinaryOperator::Minus => "-",
        ast::BinaryOperator::Multiply => "*",
        ast::BinaryOperator::Divide => "/",
        ast::BinaryOperator::Modulo => "%",
        ast::BinaryOperator::Gt => ">",
        ast::BinaryOperator::Lt => "<",
        ast::BinaryOperator::GtEq => ">=",
        ast::BinaryOperator::LtEq => "<=",
        ast::BinaryOperator::Eq => "=",
        ast::BinaryOperator::NotEq => "<>",
        ast::BinaryOperator::And => "AND",
        ast::BinaryOperator::Or => "OR",
        op => return Err(Error::unsupported_construct(format!("The operator {}", op))),
    })
}

fn function(function: &ast::Function) -> Result<Expression> {
    let name = function.name.to_string().to_uppercase();
    if function.over.is_some() {
        return Err(Error::unsupported_construct(format!("The window function {}", function)));
    }
    if function.filter.is_some() {
        return Err(Error::unsupported_construct(format!("The filtered aggregate {}", function)));
    }
    let list = match &function.args {
        ast::FunctionArguments::List(list) => list,
        ast::FunctionArguments::None => {
            return Err(Error::unsupported_construct(format!("The function {}", function)))
        }
        ast::FunctionArguments::Subquery(_) => {
            return Err(Error::unsupported_construct(format!("The subquery in {}", function)))
        }
    };
    if matches!(list.duplicate_treatment, Some(ast::DuplicateTreatment::Distinct)) {
        return Err(Error::unsupported_construct(format!("The distinct aggregate {}", function)));
    }
    // `None` stands for `*`
    let args = list
        .args
        .iter()
        .map(|arg| match arg {
            ast::FunctionArg::Unnamed(ast::FunctionArgExpr::Expr(expr)) => {
                Expression::try_from(expr).map(Some)
            }
            ast::FunctionArg::Unnamed(ast::FunctionArgExpr::Wildcard) => Ok(None),
            arg => Err(Error::unsupported_construct(format!("The argument {}", arg))),
        })
        .collect::<Result<Vec<Option<Expression>>>>()?;
    match (AggregateFunction::from_name(&name), args.as_slice()) {
        (Some(AggregateFunction::Count), [None]) => {
            Ok(Expression::aggregate(AggregateFunction::Count, None))
        }
        (Some(aggregate), [Some(argument)]) => {
            Ok(Expression::aggregate(aggregate, Some(argument.clone())))
        }
        (Some(_), _) => Err(Error::invalid_expression(function)),
        (None, _) if FUNCTIONS.contains(&name.as_str()) => {
            let args = args
                .into_iter()
                .collect::<Option<Vec<Expression>>>()
                .ok_or_else(|| Error::invalid_expression(function))?;
            Ok(Expression::function(&name, args))
        }
        (None, _) => Err(Error::unsupported_construct(format!("The function {}", name))),
    }
}

impl TryFrom<&ast::Expr> for Expression {
    type Error = Error;

    fn try_from(expr: &ast::Expr) -> Result<Self> {
        Ok(match expr {
            ast::Expr::Identifier(ident) => Expression::Column(identifier(std::slice::from_ref(ident))),
            ast::Expr::CompoundIdentifier(idents) => Expression::Column(identifier(idents)),
            ast::Expr::Value(literal) => Expression::Literal(value(literal)?),
            ast::Expr::Nested(expr) => Expression::nested(expr.as_ref().try_into()?),
            ast::Expr::UnaryOp { op, expr } => {
                let operand = Expression::try_from(expr.as_ref())?;
                match op {
                    ast::UnaryOperator::Plus => operand,
                    ast::UnaryOperator::Minus => Expression::unary("-", operand),
                    ast::UnaryOperator::Not => Expression::unary("NOT", operand),
                    op => return Err(Error::unsupported_construct(format!("The operator {}", op))),
                }
            }
            ast::Expr::BinaryOp { left, op, right } => Expression::binary(
                left.as_ref().try_into()?,
                binary_operator(op)?,
                right.as_ref().try_into()?,
            ),
            ast::Expr::IsNull(expr) => Expression::IsNull {
                operand: Box::new(expr.as_ref().try_into()?),
                negated: false,
            },
            ast::Expr::IsNotNull(expr) => Expression::IsNull {
                operand: Box::new(expr.as_ref().try_into()?),
                negated: true,
            },
            // x BETWEEN a AND b is x >= a AND x <= b
            ast::Expr::Between {
                expr,
                negated,
                low,
                high,
            } => {
                let operand = Expression::try_from(expr.as_ref())?;
                let between = Expression::nested(Expression::binary(
                    Expression::binary(operand.clone(), ">=", low.as_ref().try_into()?),
                    "AND",
                    Expression::binary(operand, "<=", high.as_ref().try_into()?),
                ));
                if *negated {
                    Expression::unary("NOT", between)
                } else {
                    between
                }
            }
            // x IN (a, b) is x = a OR x = b
            ast::Expr::InList {
                expr,
                list,
                negated,
            } => {
                let operand = Expression::try_from(expr.as_ref())?;
                let in_list = list
                    .iter()
                    .map(|item| -> Result<Expression> {
                        Ok(Expression::binary(operand.clone(), "=", item.try_into()?))
                    })
                    .reduce(|left: Result<Expression>, right| {
                        Ok(Expression::binary(left?, "OR", right?))
                    })
                    .ok_or_else(|| Error::invalid_expression(expr))??;
                let in_list = Expression::nested(in_list);
                if *negated {
                    Expression::unary("NOT", in_list)
                } else {
                    in_list
                }
            }
            ast::Expr::Function(func) => function(func)?,
            ast::Expr::Subquery(_) | ast::Expr::InSubquery { .. } | ast::Expr::Exists { .. } => {
                return Err(Error::unsupported_construct(format!("The subquery {}", expr)))
            }
            expr => return Err(Error::unsupported_construct(format!("The expression {}", expr))),
        })
    }
}
