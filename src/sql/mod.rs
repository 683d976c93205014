//! # SQL parsing and conversion into the syntax tree
//!
//! This module parses SQL text with `sqlparser` and converts the result into
//! the [`crate::ast`] nodes of the supported subset.
//! Constructs outside the subset (joins, subqueries, window functions...) are
//! rejected with `UnsupportedConstruct` rather than approximated.
//!

pub mod expr;
pub mod query;

use sqlparser::{
    dialect::{Dialect, GenericDialect},
    parser::{Parser, ParserError},
    tokenizer::{Tokenizer, TokenizerError},
};

use crate::ast::{Error, Expression, Query, Result};

impl From<TokenizerError> for Error {
    fn from(err: TokenizerError) -> Self {
        Error::parsing_error(err)
    }
}

impl From<ParserError> for Error {
    fn from(err: ParserError) -> Self {
        Error::parsing_error(err)
    }
}

/// A SQL query parser with dialect
pub fn parse_with_dialect<D: Dialect>(query: &str, dialect: D) -> Result<Query> {
    let mut tokenizer = Tokenizer::new(&dialect, query);
    let tokens = tokenizer.tokenize()?;
    let mut parser = Parser::new(&dialect).with_tokens(tokens);
    let query = parser.parse_query()?;
    Query::try_from(&query)
}

/// Parse a query of the supported subset
pub fn parse(query: &str) -> Result<Query> {
    parse_with_dialect(query, GenericDialect)
}

/// A SQL expression parser with dialect
pub fn parse_expr_with_dialect<D: Dialect>(expr: &str, dialect: D) -> Result<Expression> {
    let mut tokenizer = Tokenizer::new(&dialect, expr);
    let tokens = tokenizer.tokenize()?;
    let mut parser = Parser::new(&dialect).with_tokens(tokens);
    let expr = parser.parse_expr()?;
    Expression::try_from(&expr)
}

/// Parse an expression, mostly to test the code
pub fn parse_expr(expr: &str) -> Result<Expression> {
    parse_expr_with_dialect(expr, GenericDialect)
}
