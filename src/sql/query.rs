//! Conversion of `sqlparser` queries
//!
//! Only single `SELECT` blocks reading one table are accepted.

use sqlparser::ast;

use super::expr::{identifier, lower_case_unquoted_ident};
use crate::{
    ast::{Error, Expression, Literal, NamedExpression, OrderItem, Query, Relation, Result},
    data_type::Value,
};

fn relation(table: &ast::TableWithJoins) -> Result<Relation> {
    if !table.joins.is_empty() {
        return Err(Error::unsupported_construct(format!("The join in {}", table)));
    }
    match &table.relation {
        ast::TableFactor::Table {
            name, alias, args, ..
        } if args.is_none() => Ok(Relation::Table {
            name: identifier(&name.0),
            alias: alias
                .as_ref()
                .map(|alias| lower_case_unquoted_ident(&alias.name).into()),
        }),
        ast::TableFactor::Derived { .. } => Err(Error::unsupported_construct(format!(
            "The subquery {}",
            table.relation
        ))),
        factor => Err(Error::unsupported_construct(format!("The relation {}", factor))),
    }
}

fn named_expression(item: &ast::SelectItem) -> Result<NamedExpression> {
    match item {
        ast::SelectItem::UnnamedExpr(expr) => Ok(NamedExpression {
            expression: expr.try_into()?,
            alias: None,
        }),
        ast::SelectItem::ExprWithAlias { expr, alias } => Ok(NamedExpression {
            expression: expr.try_into()?,
            alias: Some(lower_case_unquoted_ident(alias).into()),
        }),
        item => Err(Error::unsupported_construct(format!("The projection {}", item))),
    }
}

fn order_item(order_by: &ast::OrderByExpr) -> Result<OrderItem> {
    Ok(OrderItem::new(
        Expression::try_from(&order_by.expr)?,
        order_by.asc.unwrap_or(true),
    ))
}

fn limit(limit: &ast::Expr) -> Result<Literal> {
    match Expression::try_from(limit)? {
        Expression::Literal(literal) if matches!(literal.value(), Value::Integer(l) if *l >= 0) => {
            Ok(literal)
        }
        _ => Err(Error::invalid_expression(format!("LIMIT {}", limit))),
    }
}

impl TryFrom<&ast::Query> for Query {
    type Error = Error;

    fn try_from(query: &ast::Query) -> Result<Self> {
        let ast::Query {
            with,
            body,
            order_by,
            limit: query_limit,
            offset,
            fetch,
            ..
        } = query;
        if with.is_some() {
            return Err(Error::unsupported_construct("WITH"));
        }
        if offset.is_some() || fetch.is_some() {
            return Err(Error::unsupported_construct("OFFSET"));
        }
        let select = match body.as_ref() {
            ast::SetExpr::Select(select) => select.as_ref(),
            body => return Err(Error::unsupported_construct(format!("The query {}", body))),
        };
        if select.distinct.is_some() {
            return Err(Error::unsupported_construct("SELECT DISTINCT"));
        }
        let from = match select.from.as_slice() {
            [table] => relation(table)?,
            [] => return Err(Error::unsupported_construct("A query without FROM")),
            _ => return Err(Error::unsupported_construct("Reading from many tables")),
        };
        let group_by = match &select.group_by {
            ast::GroupByExpr::Expressions(exprs) => exprs
                .iter()
                .map(Expression::try_from)
                .collect::<Result<Vec<_>>>()?,
            ast::GroupByExpr::All => return Err(Error::unsupported_construct("GROUP BY ALL")),
        };
        Ok(Query {
            select: select
                .projection
                .iter()
                .map(named_expression)
                .collect::<Result<_>>()?,
            from: vec![from].into(),
            selection: select.selection.as_ref().map(Expression::try_from).transpose()?,
            group_by: group_by.into(),
            having: select.having.as_ref().map(Expression::try_from).transpose()?,
            order_by: order_by.iter().map(order_item).collect::<Result<_>>()?,
            limit: query_limit.as_ref().map(limit).transpose()?,
        })
    }
}
