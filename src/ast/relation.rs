//! Relations and queries
//!
//! A [`Query`] reads from a list of [`Relation`]s: base tables, or derived
//! relations (a nested query with an alias), which is how the recombination
//! query of a rewritten plan reads the raw aggregates.

use std::collections::HashSet;

use super::{
    impl_syntax_traits,
    tokens::{self, Identifier},
    Error, Expression, Kind, Literal, Result, Scope, Sequence, Symbol, SymbolTable, Syntax,
};
use crate::{data_type::Value, metadata::Metadata};

/// An expression of the projection, with its optional alias
#[derive(Debug, Clone)]
pub struct NamedExpression {
    pub expression: Expression,
    pub alias: Option<Identifier>,
}

impl NamedExpression {
    pub fn new(expression: Expression, alias: Option<&str>) -> Self {
        NamedExpression {
            expression,
            alias: alias.map(Identifier::from),
        }
    }

    /// The output column name: the alias, else the column name, else the expression text
    pub fn name(&self) -> String {
        match (&self.alias, &self.expression) {
            (Some(alias), _) => alias.to_string(),
            (None, Expression::Column(identifier)) => identifier.name().to_string(),
            (None, expression) => expression.to_string(),
        }
    }
}

impl Syntax for NamedExpression {
    fn kind(&self) -> Kind {
        Kind::Clause
    }

    fn children(&self) -> Vec<&dyn Syntax> {
        match &self.alias {
            Some(alias) => vec![&self.expression as &dyn Syntax, &tokens::AS, alias],
            None => vec![&self.expression],
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderItem {
    pub expression: Expression,
    pub ascending: bool,
}

impl OrderItem {
    pub fn new(expression: Expression, ascending: bool) -> Self {
        OrderItem {
            expression,
            ascending,
        }
    }
}

impl Syntax for OrderItem {
    fn kind(&self) -> Kind {
        Kind::Clause
    }

    fn children(&self) -> Vec<&dyn Syntax> {
        vec![
            &self.expression as &dyn Syntax,
            if self.ascending {
                &tokens::ASC
            } else {
                &tokens::DESC
            },
        ]
    }
}

#[derive(Debug, Clone)]
pub enum Relation {
    Table {
        name: Identifier,
        alias: Option<Identifier>,
    },
    Derived {
        query: Box<Query>,
        alias: Identifier,
    },
}

impl Relation {
    pub fn table(name: &str, alias: Option<&str>) -> Relation {
        Relation::Table {
            name: Identifier::from(name),
            alias: alias.map(Identifier::from),
        }
    }

    pub fn derived(query: Query, alias: &str) -> Relation {
        Relation::Derived {
            query: Box::new(query),
            alias: Identifier::from(alias),
        }
    }

    pub fn alias(&self) -> Option<&Identifier> {
        match self {
            Relation::Table { alias, .. } => alias.as_ref(),
            Relation::Derived { alias, .. } => Some(alias),
        }
    }

    /// The path the columns of this relation are visible under
    pub fn path(&self) -> Vec<String> {
        match (self, self.alias()) {
            (_, Some(alias)) => vec![alias.to_string()],
            (Relation::Table { name, .. }, None) => {
                name.parts().into_iter().map(str::to_string).collect()
            }
            (Relation::Derived { .. }, None) => vec![],
        }
    }

    /// A bare identifier matches any relation, a qualified one only the relation
    /// with this alias (or table name when not aliased), ignoring case.
    pub fn alias_match(&self, identifier: &Identifier) -> Result<bool> {
        Ok(match identifier.split_alias()? {
            (None, _) => true,
            (Some(prefix), _) => match (self, self.alias()) {
                (_, Some(alias)) => alias.eq_ignore_case(prefix),
                (Relation::Table { name, .. }, None) => name.name().eq_ignore_ascii_case(prefix),
                _ => false,
            },
        })
    }

    /// Symbols are available when loaded for this relation or one of its children
    pub fn has_symbols(&self, table: &SymbolTable) -> bool {
        table.has(self.path())
            || match self {
                Relation::Table { .. } => false,
                Relation::Derived { query, .. } => query.has_symbols(table),
            }
    }

    /// Load the columns of the relation from the metadata.
    /// Already loaded relations are left untouched.
    pub fn load_symbols(&self, metadata: &Metadata, table: &mut SymbolTable) -> Result<()> {
        if table.has(self.path()) {
            return Ok(());
        }
        match self {
            Relation::Table { name, .. } => {
                let schema = metadata.table(name)?;
                table.insert(
                    self.path(),
                    schema
                        .fields()
                        .iter()
                        .map(|field| Symbol::new(field.name(), field.data_type(), field.bounds())),
                );
            }
            Relation::Derived { query, .. } => {
                let mut inner = SymbolTable::default();
                query.load_symbols(metadata, &mut inner)?;
                let scope = inner.scope();
                table.insert(
                    self.path(),
                    query.select.iter().map(|item| {
                        Symbol::new(
                            item.name(),
                            item.expression.data_type(&scope),
                            item.expression.bounds(&scope),
                        )
                    }),
                );
            }
        }
        Ok(())
    }
}

impl Syntax for Relation {
    fn kind(&self) -> Kind {
        Kind::Relation
    }

    fn children(&self) -> Vec<&dyn Syntax> {
        match self {
            Relation::Table { name, alias } => match alias {
                Some(alias) => vec![name as &dyn Syntax, &tokens::AS, alias],
                None => vec![name as &dyn Syntax],
            },
            Relation::Derived { query, alias } => vec![
                &tokens::LEFT_PARENTHESIS as &dyn Syntax,
                query.as_ref(),
                &tokens::RIGHT_PARENTHESIS,
                &tokens::AS,
                alias,
            ],
        }
    }
}

/// `SELECT .. FROM .. [WHERE ..] [GROUP BY ..] [HAVING ..] [ORDER BY ..] [LIMIT ..]`
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub select: Sequence<NamedExpression>,
    pub from: Sequence<Relation>,
    pub selection: Option<Expression>,
    pub group_by: Sequence<Expression>,
    pub having: Option<Expression>,
    pub order_by: Sequence<OrderItem>,
    pub limit: Option<Literal>,
}

impl_syntax_traits!(NamedExpression, OrderItem, Relation, Query);

impl Syntax for Query {
    fn kind(&self) -> Kind {
        Kind::Query
    }

    fn children(&self) -> Vec<&dyn Syntax> {
        let mut children: Vec<&dyn Syntax> =
            vec![&tokens::SELECT, &self.select, &tokens::FROM, &self.from];
        if let Some(selection) = &self.selection {
            children.extend([&tokens::WHERE as &dyn Syntax, selection]);
        }
        if !self.group_by.is_empty() {
            children.extend([&tokens::GROUP_BY as &dyn Syntax, &self.group_by]);
        }
        if let Some(having) = &self.having {
            children.extend([&tokens::HAVING as &dyn Syntax, having]);
        }
        if !self.order_by.is_empty() {
            children.extend([&tokens::ORDER_BY as &dyn Syntax, &self.order_by]);
        }
        if let Some(limit) = &self.limit {
            children.extend([&tokens::LIMIT as &dyn Syntax, limit]);
        }
        children
    }
}

impl Query {
    pub fn limit(&self) -> Option<usize> {
        match self.limit.as_ref()?.value() {
            Value::Integer(limit) if *limit >= 0 => Some(*limit as usize),
            _ => None,
        }
    }

    /// The output column names
    pub fn names(&self) -> Vec<String> {
        self.select.iter().map(NamedExpression::name).collect()
    }

    /// Is the query grouping rows
    pub fn is_aggregate(&self) -> bool {
        !self.group_by.is_empty() || !self.aggregates().is_empty()
    }

    /// The distinct aggregates of the projection, HAVING and ORDER BY clauses,
    /// in order of appearance
    pub fn aggregates(&self) -> Vec<&Expression> {
        let mut seen = HashSet::new();
        self.select
            .iter()
            .map(|item| &item.expression)
            .chain(&self.having)
            .chain(self.order_by.iter().map(|item| &item.expression))
            .flat_map(Expression::aggregates)
            .filter(|aggregate| seen.insert(*aggregate))
            .collect()
    }

    /// The single relation read, joins are not supported
    pub fn relation(&self) -> Result<&Relation> {
        match self.from.as_slice() {
            [relation] => Ok(relation),
            [] => Err(Error::unsupported_construct("A query without FROM")),
            _ => Err(Error::unsupported_construct("Reading from many relations")),
        }
    }

    pub fn has_symbols(&self, table: &SymbolTable) -> bool {
        self.from.iter().any(|relation| relation.has_symbols(table))
    }

    pub fn load_symbols(&self, metadata: &Metadata, table: &mut SymbolTable) -> Result<()> {
        self.from
            .iter()
            .try_for_each(|relation| relation.load_symbols(metadata, table))
    }

    /// Bind the query to the metadata: load the symbols of its relations and
    /// check that every column reference resolves.
    /// HAVING and ORDER BY may also reference output names.
    pub fn bind(&self, metadata: &Metadata) -> Result<Scope> {
        let mut table = SymbolTable::default();
        self.load_symbols(metadata, &mut table)?;
        let scope = table.scope();
        let names: HashSet<String> = self.names().iter().map(|name| name.to_lowercase()).collect();
        let inputs = self
            .select
            .iter()
            .map(|item| &item.expression)
            .chain(&self.selection)
            .chain(self.group_by.iter());
        for expression in inputs {
            for column in expression.columns() {
                scope.symbol(column)?;
            }
        }
        let outputs = self
            .having
            .iter()
            .chain(self.order_by.iter().map(|item| &item.expression));
        for expression in outputs {
            for column in expression.columns() {
                if !names.contains(&column.to_string().to_lowercase()) {
                    scope.symbol(column)?;
                }
            }
        }
        if let Some(selection) = &self.selection {
            if selection.has_aggregate() {
                return Err(Error::unsupported_construct("An aggregate in WHERE"));
            }
        }
        if self.group_by.iter().any(Expression::has_aggregate) {
            return Err(Error::unsupported_construct("An aggregate in GROUP BY"));
        }
        let all = self
            .select
            .iter()
            .map(|item| &item.expression)
            .chain(&self.having)
            .chain(self.order_by.iter().map(|item| &item.expression));
        for expression in all {
            if expression.aggregate_depth() > 1 {
                return Err(Error::unsupported_construct(format!(
                    "The nested aggregate in {}",
                    expression
                )));
            }
        }
        self.check_grouping(&scope)?;
        Ok(scope)
    }

    /// The position of the GROUP BY key `expression` stands for.
    /// Columns are compared by the symbol they resolve to, so `p.married` matches `GROUP BY married`.
    pub fn group_key(&self, scope: &Scope, expression: &Expression) -> Option<usize> {
        self.group_by.iter().position(|key| match (key, expression) {
            (Expression::Column(key), Expression::Column(column)) => {
                match (scope.symbol(key), scope.symbol(column)) {
                    (Ok(key), Ok(column)) => std::ptr::eq(key, column),
                    _ => key == column,
                }
            }
            (key, expression) => key == expression,
        })
    }

    fn is_grouped(&self, scope: &Scope, expression: &Expression, names: &HashSet<String>) -> bool {
        if self.group_key(scope, expression).is_some() {
            return true;
        }
        match expression {
            Expression::Literal(_) | Expression::Aggregate { .. } => true,
            Expression::Column(column) => names.contains(&column.to_string().to_lowercase()),
            Expression::Unary { operand, .. } | Expression::IsNull { operand, .. } => {
                self.is_grouped(scope, operand, names)
            }
            Expression::Nested(expression) => self.is_grouped(scope, expression, names),
            Expression::Binary { left, right, .. } => {
                self.is_grouped(scope, left, names) && self.is_grouped(scope, right, names)
            }
            Expression::Function { args, .. } => {
                args.iter().all(|arg| self.is_grouped(scope, arg, names))
            }
        }
    }

    /// In an aggregate query, a column read out of an aggregate must be a group key.
    /// HAVING and ORDER BY may also read output names.
    fn check_grouping(&self, scope: &Scope) -> Result<()> {
        if !self.is_aggregate() {
            return Ok(());
        }
        let outputs = HashSet::new();
        if let Some(item) = self
            .select
            .iter()
            .find(|item| !self.is_grouped(scope, &item.expression, &outputs))
        {
            return Err(Error::unsupported_construct(format!(
                "{} is neither aggregated nor a group key",
                item.expression
            )));
        }
        let outputs: HashSet<String> = self.names().iter().map(|name| name.to_lowercase()).collect();
        if let Some(expression) = self
            .having
            .iter()
            .chain(self.order_by.iter().map(|item| &item.expression))
            .find(|expression| !self.is_grouped(scope, expression, &outputs))
        {
            return Err(Error::unsupported_construct(format!(
                "{} is neither aggregated, a group key nor an output",
                expression
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::tokens::identifier,
        data_type::DataType,
        io::pums,
        sql::parse,
    };

    #[test]
    fn test_alias_match() {
        let aliased = Relation::table("PUMS.PUMS", Some("p"));
        let plain = Relation::table("PUMS.PUMS", None);
        assert!(aliased.alias_match(&identifier("age")).unwrap());
        assert!(aliased.alias_match(&identifier("P.age")).unwrap());
        assert!(!aliased.alias_match(&identifier("q.age")).unwrap());
        assert!(plain.alias_match(&identifier("pums.age")).unwrap());
        assert!(plain.alias_match(&identifier("a.b.c")).is_err());
    }

    #[test]
    fn test_load_symbols() {
        let metadata = pums::metadata();
        let query = parse("SELECT age FROM PUMS.PUMS AS p").unwrap();
        let relation = query.relation().unwrap();
        let mut table = SymbolTable::default();
        assert!(!relation.has_symbols(&table));
        relation.load_symbols(&metadata, &mut table).unwrap();
        assert!(relation.has_symbols(&table));
        // Loading twice changes nothing
        relation.load_symbols(&metadata, &mut table).unwrap();
        let scope = table.scope();
        assert_eq!(scope.symbols().len(), 5);
        assert_eq!(scope.symbol(&identifier("p.age")).unwrap().data_type(), DataType::Integer);
    }

    #[test]
    fn test_derived_symbols() {
        let metadata = pums::metadata();
        let inner = parse("SELECT married, COUNT(*) AS c, SUM(age) AS s FROM PUMS.PUMS GROUP BY married").unwrap();
        let derived = Relation::derived(inner, "exact");
        let mut table = SymbolTable::default();
        derived.load_symbols(&metadata, &mut table).unwrap();
        let scope = table.scope();
        println!("{}", scope);
        assert_eq!(scope.symbol(&identifier("c")).unwrap().data_type(), DataType::Integer);
        assert_eq!(scope.symbol(&identifier("exact.married")).unwrap().data_type(), DataType::Integer);
        assert!(scope.symbol(&identifier("age")).is_err());
    }

    #[test]
    fn test_bind() {
        let metadata = pums::metadata();
        for query in [
            "SELECT COUNT(*) AS c, married AS m FROM PUMS.PUMS GROUP BY married ORDER BY c",
            "SELECT AVG(p.age) FROM PUMS.PUMS p WHERE p.sex = 1",
            "SELECT SUM(income) AS s FROM PUMS.PUMS HAVING s > 10",
            "SELECT p.married, COUNT(*) AS c FROM PUMS.PUMS AS p GROUP BY married ORDER BY p.married",
            "SELECT married + 1 AS m, COUNT(*) AS c FROM PUMS.PUMS GROUP BY married HAVING m > 1",
        ] {
            assert!(parse(query).unwrap().bind(&metadata).is_ok(), "{}", query);
        }
        for (query, check) in [
            ("SELECT COUNT(x) FROM PUMS.PUMS", Error::UnresolvedColumn as fn(String) -> Error),
            ("SELECT COUNT(*) FROM PUMS.OTHER", Error::UnresolvedTable),
            ("SELECT COUNT(*) FROM PUMS.PUMS WHERE SUM(age) > 3", Error::UnsupportedConstruct),
            ("SELECT SUM(COUNT(age)) FROM PUMS.PUMS", Error::UnsupportedConstruct),
            ("SELECT q.age FROM PUMS.PUMS p", Error::UnresolvedColumn),
            ("SELECT age, COUNT(*) FROM PUMS.PUMS GROUP BY educ", Error::UnsupportedConstruct),
            ("SELECT COUNT(*) AS c FROM PUMS.PUMS GROUP BY educ HAVING age > 3", Error::UnsupportedConstruct),
            ("SELECT COUNT(*) AS c FROM PUMS.PUMS GROUP BY educ ORDER BY age", Error::UnsupportedConstruct),
        ] {
            let error = parse(query).unwrap().bind(&metadata).unwrap_err();
            println!("{}", error);
            assert_eq!(
                std::mem::discriminant(&error),
                std::mem::discriminant(&check(String::new())),
                "{}",
                query
            );
        }
    }
}
