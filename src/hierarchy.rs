//! # Hierarchy structure
//!
//! A map with paths as keys.
//! Suffix of paths are valid keys when non-ambiguous.
//! Path components are compared case-insensitively (they are stored lower-cased).
//!

use core::fmt;
use itertools::Itertools;
use std::{
    collections::BTreeMap,
    iter::Extend,
    ops::{Deref, Index},
};

use crate::builder::With;

/// How many times is the element
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Found<T> {
    Zero,
    One(T),
    More,
}

/// Found can be converted to Option
impl<T> From<Found<T>> for Option<T> {
    fn from(value: Found<T>) -> Self {
        match value {
            Found::One(t) => Some(t),
            _ => None,
        }
    }
}

/// A trait Path to manage conversions
pub trait Path: Clone {
    fn path(self) -> Vec<String>;
}

fn normalize<S: AsRef<str>>(s: S) -> String {
    s.as_ref().to_lowercase()
}

impl Path for &str {
    fn path(self) -> Vec<String> {
        vec![normalize(self)]
    }
}

impl Path for String {
    fn path(self) -> Vec<String> {
        vec![normalize(self)]
    }
}

impl<const N: usize> Path for [&str; N] {
    fn path(self) -> Vec<String> {
        self.iter().map(normalize).collect()
    }
}

impl Path for &[&str] {
    fn path(self) -> Vec<String> {
        self.iter().map(normalize).collect()
    }
}

impl Path for &[String] {
    fn path(self) -> Vec<String> {
        self.iter().map(normalize).collect()
    }
}

impl Path for Vec<&str> {
    fn path(self) -> Vec<String> {
        self.iter().map(normalize).collect()
    }
}

impl Path for Vec<String> {
    fn path(self) -> Vec<String> {
        self.iter().map(normalize).collect()
    }
}

fn is_prefix_of(left: &[String], right: &[String]) -> bool {
    left.len() <= right.len() && left.iter().zip(right.iter()).all(|(pr, pa)| pr == pa)
}

/// A utility function to check a path is a suffix of another
fn is_suffix_of(left: &[String], right: &[String]) -> bool {
    left.len() <= right.len()
        && left
            .iter()
            .rev()
            .zip(right.iter().rev())
            .all(|(s, p)| s == p)
}

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Hierarchy<T: Clone>(BTreeMap<Vec<String>, T>);

impl<T: Clone> Hierarchy<T> {
    pub fn new(objects: BTreeMap<Vec<String>, T>) -> Self {
        Hierarchy(objects)
    }

    pub fn empty() -> Self {
        Hierarchy::new(BTreeMap::new())
    }

    pub fn chain(self, other: Self) -> Self {
        self.into_iter().chain(other).collect()
    }

    /// Look a path up, exact match first, then unambiguous suffix match
    pub fn find<P: Path>(&self, path: P) -> Found<&T> {
        let path = path.path();
        if let Some(object) = self.0.get(&path) {
            return Found::One(object);
        }
        self.0
            .iter()
            .fold(Found::Zero, |f, (qualified_path, object)| {
                if is_suffix_of(&path, qualified_path) {
                    match f {
                        Found::Zero => Found::One(object),
                        _ => Found::More,
                    }
                } else {
                    f
                }
            })
    }

    pub fn get<P: Path>(&self, path: P) -> Option<&T> {
        self.find(path).into()
    }

    /// Insert unless the path is already there, returns true if inserted
    pub fn insert_new<P: Path>(&mut self, path: P, object: T) -> bool {
        let path = path.path();
        if self.0.contains_key(&path) {
            false
        } else {
            self.0.insert(path, object);
            true
        }
    }

    /// All the objects with a path starting with `path`
    pub fn filter<P: Path>(&self, path: P) -> Self {
        let path = path.path();
        self.iter()
            .filter_map(|(qualified_path, object)| {
                if is_prefix_of(&path, qualified_path) {
                    Some((qualified_path.clone(), object.clone()))
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn map<U: Clone, F: Fn(&T) -> U>(&self, f: F) -> Hierarchy<U> {
        self.iter().map(|(p, o)| (p.clone(), f(o))).collect()
    }
}

impl<T: Clone> Default for Hierarchy<T> {
    fn default() -> Self {
        Hierarchy::empty()
    }
}

impl<T: Clone> Deref for Hierarchy<T> {
    type Target = BTreeMap<Vec<String>, T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: Clone> IntoIterator for Hierarchy<T> {
    type Item = <BTreeMap<Vec<String>, T> as IntoIterator>::Item;
    type IntoIter = <BTreeMap<Vec<String>, T> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Create a hierarchy from an iterator
impl<P: Path, T: Clone> FromIterator<(P, T)> for Hierarchy<T> {
    fn from_iter<I: IntoIterator<Item = (P, T)>>(iter: I) -> Self {
        Hierarchy::new(iter.into_iter().map(|(p, o)| (p.path(), o)).collect())
    }
}

impl<P: Path, T: Clone> Extend<(P, T)> for Hierarchy<T> {
    fn extend<I: IntoIterator<Item = (P, T)>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(|(p, t)| (p.path(), t)))
    }
}

/// Create a hierarchy with an array of objects
impl<P: Path, T: Clone, const N: usize> From<[(P, T); N]> for Hierarchy<T> {
    fn from(value: [(P, T); N]) -> Self {
        value.into_iter().collect()
    }
}

/// Create a new hierarchy with new objects
impl<P: Path, T: Clone, I: IntoIterator<Item = (P, T)>> With<I> for Hierarchy<T> {
    fn with(mut self, input: I) -> Self {
        self.extend(input);
        self
    }
}

/// Index, panics on missing or ambiguous paths
impl<P: Path, T: Clone> Index<P> for Hierarchy<T> {
    type Output = T;

    fn index(&self, index: P) -> &Self::Output {
        match self.find(index) {
            Found::One(object) => object,
            Found::Zero => panic!("Path not found in hierarchy"),
            Found::More => panic!("Ambiguous path in hierarchy"),
        }
    }
}

impl<T: Clone + fmt::Display> fmt::Display for Hierarchy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{\n  {},\n}}",
            self.iter()
                .map(|(p, t)| format!("{} -> {}", p.join("."), t))
                .join(",\n  ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hierarchy() {
        let values = Hierarchy::from([
            (vec!["a", "b", "c"], 1),
            (vec!["a", "b", "d"], 2),
            (vec!["a", "c"], 3),
            (vec!["a", "e"], 4),
            (vec!["a", "e", "f"], 5),
            (vec!["b", "c"], 6),
        ]);
        println!("values = {}", values);
        assert_eq!(values[["a", "c"]], 3);
        assert_eq!(values[["e", "f"]], 5);
        assert_eq!(values[["b", "d"]], 2);
        assert_eq!(values[["d"]], 2);
        // `c` is a suffix of three paths
        assert_eq!(values.find(["c"]), Found::More);
        assert_eq!(values.get(["x"]), None);
    }

    #[test]
    fn test_case_insensitive() {
        let values = Hierarchy::from([(vec!["PUMS", "PUMS", "Age"], 1)]);
        assert_eq!(values.get(["pums", "age"]), Some(&1));
        assert_eq!(values.get("AGE"), Some(&1));
    }

    #[test]
    fn test_filter() {
        let values = Hierarchy::from([
            (vec!["a", "b", "c"], 1),
            (vec!["a", "b", "d"], 2),
            (vec!["a", "c"], 3),
        ]);
        let values = values.with([(vec!["b", "c"], 6), (vec!["b", "d"], 7)]);
        assert_eq!(values.filter(["a"]).len(), 3);
        assert_eq!(values.filter(["a", "b"]).len(), 2);
        assert_eq!(values.filter(["b"]).map(|v| v * 10)[["b", "d"]], 70);
    }

    #[test]
    fn test_insert_new() {
        let mut values = Hierarchy::from([(["t", "x"], 1)]);
        assert!(!values.insert_new(["t", "x"], 2));
        assert!(values.insert_new(["t", "y"], 3));
        assert_eq!(values[["t", "x"]], 1);
        assert_eq!(values.chain(Hierarchy::from([(["u", "x"], 4)])).find("x"), Found::More);
    }
}
