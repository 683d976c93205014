//! # The syntax tree of the supported SQL subset
//!
//! Every node implements [`Syntax`], whose single extension point is
//! [`Syntax::children`]. Equality, hashing and rendering are generic functions
//! over the children ([`syntax_eq`], [`syntax_hash`], [`render`]): two nodes
//! with the same shape and the same leaf text are interchangeable.
//!
//! Nodes are immutable once built. Symbol binding results live in a separate
//! side-table (see [`symbols`]).
//!

pub mod expression;
pub mod relation;
pub mod symbols;
pub mod tokens;

use std::{
    any::Any,
    convert::Infallible,
    error, fmt,
    hash::{Hash, Hasher},
    ops::Deref,
    result,
};

use crate::{data_type::value, visitor};

pub use expression::{AggregateFunction, Expression, Literal};
pub use relation::{NamedExpression, OrderItem, Query, Relation};
pub use symbols::{Scope, Symbol, SymbolTable};
pub use tokens::{FuncName, Identifier, Op, Token};

// Error management

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    ParsingError(String),
    UnsupportedConstruct(String),
    MalformedIdentifier(String),
    UnresolvedColumn(String),
    UnresolvedTable(String),
    Unevaluable(String),
    ZeroDenominator(String),
    InvalidExpression(String),
    Other(String),
}

impl Error {
    pub fn parsing_error(input: impl fmt::Display) -> Error {
        Error::ParsingError(format!("Cannot parse {}", input))
    }
    pub fn unsupported_construct(construct: impl fmt::Display) -> Error {
        Error::UnsupportedConstruct(format!("{} is not supported", construct))
    }
    pub fn malformed_identifier(identifier: impl fmt::Display) -> Error {
        Error::MalformedIdentifier(format!("{} has more than one qualifier", identifier))
    }
    pub fn unresolved_column(column: impl fmt::Display) -> Error {
        Error::UnresolvedColumn(format!("Cannot resolve column {}", column))
    }
    pub fn ambiguous_column(column: impl fmt::Display) -> Error {
        Error::UnresolvedColumn(format!("Column {} is ambiguous", column))
    }
    pub fn unresolved_table(table: impl fmt::Display) -> Error {
        Error::UnresolvedTable(format!("Cannot resolve table {}", table))
    }
    pub fn unevaluable(expression: impl fmt::Display) -> Error {
        Error::Unevaluable(format!("{} cannot be evaluated statically", expression))
    }
    pub fn invalid_expression(expression: impl fmt::Display) -> Error {
        Error::InvalidExpression(format!("{} is invalid", expression))
    }
    pub fn other(desc: impl fmt::Display) -> Error {
        Error::Other(desc.to_string())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ParsingError(desc) => writeln!(f, "ParsingError: {}", desc),
            Error::UnsupportedConstruct(desc) => writeln!(f, "UnsupportedConstruct: {}", desc),
            Error::MalformedIdentifier(desc) => writeln!(f, "MalformedIdentifier: {}", desc),
            Error::UnresolvedColumn(desc) => writeln!(f, "UnresolvedColumn: {}", desc),
            Error::UnresolvedTable(desc) => writeln!(f, "UnresolvedTable: {}", desc),
            Error::Unevaluable(desc) => writeln!(f, "Unevaluable: {}", desc),
            Error::ZeroDenominator(desc) => writeln!(f, "ZeroDenominator: {}", desc),
            Error::InvalidExpression(desc) => writeln!(f, "InvalidExpression: {}", desc),
            Error::Other(err) => writeln!(f, "{}", err),
        }
    }
}

impl error::Error for Error {}

impl From<Infallible> for Error {
    fn from(err: Infallible) -> Self {
        Error::Other(err.to_string())
    }
}
impl From<value::Error> for Error {
    fn from(err: value::Error) -> Self {
        match err {
            value::Error::ZeroDenominator(desc) => Error::ZeroDenominator(desc),
            value::Error::InvalidOperation(desc) => Error::InvalidExpression(desc),
        }
    }
}

pub type Result<T> = result::Result<T, Error>;

/// The variant of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Token,
    Op,
    Identifier,
    FuncName,
    Literal,
    Sequence,
    Expression,
    Relation,
    Query,
    Clause,
}

/// Conversion to `Any` for downcasting nodes
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A node of the syntax tree
pub trait Syntax: AsAny + fmt::Debug {
    fn kind(&self) -> Kind;
    /// The ordered sub-nodes
    fn children(&self) -> Vec<&dyn Syntax>;
    /// Leaf text, for atoms and literals
    fn text(&self) -> Option<&str> {
        None
    }
    /// Separator used when rendering children
    fn separator(&self) -> &'static str {
        " "
    }
}

/// Structural equality
pub fn syntax_eq(left: &dyn Syntax, right: &dyn Syntax) -> bool {
    if left.kind() != right.kind() || left.text() != right.text() {
        return false;
    }
    let (left, right) = (left.children(), right.children());
    left.len() == right.len() && left.iter().zip(right.iter()).all(|(l, r)| syntax_eq(*l, *r))
}

/// Structural hash, consistent with [`syntax_eq`]
pub fn syntax_hash<H: Hasher>(node: &dyn Syntax, state: &mut H) {
    node.kind().hash(state);
    node.text().hash(state);
    let children = node.children();
    children.len().hash(state);
    for child in children {
        syntax_hash(child, state);
    }
}

/// SQL-like rendering of a node
pub fn render(node: &dyn Syntax) -> String {
    if let Some(text) = node.text() {
        return text.to_string();
    }
    let separator = node.separator();
    let mut result = String::new();
    let mut previous: Option<&dyn Syntax> = None;
    for child in node.children() {
        let piece = render(child);
        if piece.is_empty() {
            continue;
        }
        if let Some(previous) = previous {
            let tight = separator == " "
                && (previous.text() == Some("(")
                    || piece == ")"
                    || piece == ","
                    || (piece == "(" && previous.kind() == Kind::FuncName));
            if !tight {
                result.push_str(separator);
            }
        }
        result.push_str(&piece);
        previous = Some(child);
    }
    result
}

/// First node of type `T` in a depth-first search from `root` (included)
pub fn find_node<'a, T: Syntax + 'static>(
    root: &'a dyn Syntax,
    not_child_of: Option<Kind>,
) -> Option<&'a T> {
    visitor::Iter::new(root, not_child_of).find_map(|node| node.as_any().downcast_ref::<T>())
}

/// All the nodes of type `T` in a depth-first search from `root` (included)
pub fn find_nodes<'a, T: Syntax + 'static>(
    root: &'a dyn Syntax,
    not_child_of: Option<Kind>,
) -> Vec<&'a T> {
    visitor::Iter::new(root, not_child_of)
        .filter_map(|node| node.as_any().downcast_ref::<T>())
        .collect()
}

/// Derive the standard traits from the children of a node
macro_rules! impl_syntax_traits {
    ($($Node:ty),*) => {
        $(
            impl PartialEq for $Node {
                fn eq(&self, other: &Self) -> bool {
                    $crate::ast::syntax_eq(self, other)
                }
            }

            impl Eq for $Node {}

            impl std::hash::Hash for $Node {
                fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                    $crate::ast::syntax_hash(self, state)
                }
            }

            impl std::fmt::Display for $Node {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", $crate::ast::render(self))
                }
            }
        )*
    };
}

pub(crate) use impl_syntax_traits;

/// An ordered list of nodes
#[derive(Debug, Clone)]
pub struct Sequence<T>(Vec<T>);

impl<T> Sequence<T> {
    pub fn new(nodes: Vec<T>) -> Self {
        Sequence(nodes)
    }

    pub fn empty() -> Self {
        Sequence(vec![])
    }

    pub fn into_vec(self) -> Vec<T> {
        self.0
    }
}

impl<T> Default for Sequence<T> {
    fn default() -> Self {
        Sequence::empty()
    }
}

impl<T> Deref for Sequence<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> FromIterator<T> for Sequence<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Sequence(iter.into_iter().collect())
    }
}

impl<T> IntoIterator for Sequence<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Sequence<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<T> From<Vec<T>> for Sequence<T> {
    fn from(nodes: Vec<T>) -> Self {
        Sequence(nodes)
    }
}

impl<T: Syntax + 'static> Syntax for Sequence<T> {
    fn kind(&self) -> Kind {
        Kind::Sequence
    }

    fn children(&self) -> Vec<&dyn Syntax> {
        self.0.iter().map(|node| node as &dyn Syntax).collect()
    }

    fn separator(&self) -> &'static str {
        ", "
    }
}

impl<T: Syntax + 'static> PartialEq for Sequence<T> {
    fn eq(&self, other: &Self) -> bool {
        syntax_eq(self, other)
    }
}

impl<T: Syntax + 'static> Eq for Sequence<T> {}

impl<T: Syntax + 'static> Hash for Sequence<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        syntax_hash(self, state)
    }
}

impl<T: Syntax + 'static> fmt::Display for Sequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", render(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::parse;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_structural_equality() {
        let left = parse("SELECT COUNT(*) AS c, married FROM PUMS.PUMS GROUP BY married").unwrap();
        let right = parse("select count(*) as c, married from pums.pums group by married").unwrap();
        assert_eq!(left, right);
        assert_eq!(hash_of(&left), hash_of(&right));
        let other = parse("SELECT COUNT(*) AS d, married FROM PUMS.PUMS GROUP BY married").unwrap();
        assert_ne!(left, other);
    }

    #[test]
    fn test_render() {
        let query = parse("SELECT SUM(age*2) AS s, (1 + age) FROM PUMS.PUMS WHERE age>90 ORDER BY s DESC").unwrap();
        println!("{}", query);
        assert_eq!(
            query.to_string(),
            "SELECT SUM(age * 2) AS s, (1 + age) FROM pums.pums WHERE age > 90 ORDER BY s DESC"
        );
    }

    #[test]
    fn test_find_nodes() {
        let query = parse("SELECT SUM(age) + COUNT(*), MAX(income) FROM PUMS.PUMS WHERE age > 10").unwrap();
        let aggregates: Vec<&Expression> = find_nodes::<Expression>(&query, None)
            .into_iter()
            .filter(|e| e.is_aggregate())
            .collect();
        assert_eq!(aggregates.len(), 3);
        let identifiers = find_nodes::<Identifier>(&query, None);
        assert_eq!(
            identifiers.iter().map(|i| i.as_str()).collect::<Vec<_>>(),
            vec!["age", "income", "pums.pums", "age"]
        );
        let first: &FuncName = find_node(&query, None).unwrap();
        assert_eq!(first, "SUM");
    }
}
