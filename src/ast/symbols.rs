//! Symbol binding side-table
//!
//! Syntax nodes stay immutable. What binding learns about the columns of each
//! relation (type and declared bounds) is stored here, keyed by the path the
//! relation is visible under (its alias, or its table name).

use serde::Serialize;
use std::{collections::BTreeMap, fmt};

use super::{Error, Identifier, Result};
use crate::{
    data_type::{DataType, Interval},
    hierarchy::{Found, Hierarchy, Path},
};

/// A resolved column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Symbol {
    name: String,
    data_type: DataType,
    bounds: Option<Interval>,
}

impl Symbol {
    pub fn new<S: Into<String>>(name: S, data_type: DataType, bounds: Option<Interval>) -> Self {
        Symbol {
            name: name.into(),
            data_type,
            bounds,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn bounds(&self) -> Option<Interval> {
        self.bounds
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bounds {
            Some(bounds) => write!(f, "{}: {} {}", self.name, self.data_type, bounds),
            None => write!(f, "{}: {}", self.name, self.data_type),
        }
    }
}

/// The columns of each relation, by relation path
#[derive(Debug, Clone, Default)]
pub struct SymbolTable(BTreeMap<Vec<String>, Hierarchy<Symbol>>);

impl SymbolTable {
    pub fn has<P: Path>(&self, relation: P) -> bool {
        self.0.contains_key(&relation.path())
    }

    pub fn get<P: Path>(&self, relation: P) -> Option<&Hierarchy<Symbol>> {
        self.0.get(&relation.path())
    }

    /// Register the columns of a relation.
    /// Symbols already loaded are kept, returns false in this case.
    pub fn insert<P: Path, I: IntoIterator<Item = Symbol>>(
        &mut self,
        relation: P,
        symbols: I,
    ) -> bool {
        let relation = relation.path();
        if self.0.contains_key(&relation) {
            return false;
        }
        let symbols: Hierarchy<Symbol> = symbols
            .into_iter()
            .map(|symbol| (symbol.name.clone(), symbol))
            .collect();
        self.0.insert(relation, symbols);
        true
    }

    /// All the columns visible, qualified by the path of their relation
    pub fn scope(&self) -> Scope {
        Scope(
            self.0
                .iter()
                .flat_map(|(relation, symbols)| {
                    symbols.iter().map(move |(name, symbol)| {
                        (
                            relation.iter().chain(name).cloned().collect::<Vec<String>>(),
                            symbol.clone(),
                        )
                    })
                })
                .collect(),
        )
    }
}

/// The columns visible from an expression
#[derive(Debug, Clone, Default)]
pub struct Scope(Hierarchy<Symbol>);

impl Scope {
    /// Resolve a column, by its qualified name or, if unambiguous, its bare name
    pub fn symbol(&self, identifier: &Identifier) -> Result<&Symbol> {
        identifier.split_alias()?;
        match self.0.find(identifier) {
            Found::One(symbol) => Ok(symbol),
            Found::Zero => Err(Error::unresolved_column(identifier)),
            Found::More => Err(Error::ambiguous_column(identifier)),
        }
    }

    pub fn symbols(&self) -> &Hierarchy<Symbol> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
