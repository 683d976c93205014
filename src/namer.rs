//! # Naming utilities
//!
//! Module dedicated to naming of the columns produced when rewriting queries
//!

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

pub const KEY: &str = "key";
pub const EXACT: &str = "exact";

const BASE_37: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz_";
const LENGTH: usize = 6;

/// A function used to hash named objects
fn hash<H: Hash>(content: &H) -> u64 {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

fn encode(mut input: u64) -> String {
    (0..LENGTH)
        .map(|_| {
            let c = BASE_37[(input % BASE_37.len() as u64) as usize] as char;
            input /= BASE_37.len() as u64;
            c
        })
        .collect()
}

/// A deterministic name derived from the content
pub fn name_from_content<S: Into<String>, H: Hash>(prefix: S, content: &H) -> String {
    format!("{}_{}", prefix.into(), encode(hash(content)))
}
