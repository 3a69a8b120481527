//! Natural-key to surrogate-key lookup table
//!
//! One registry per reference dimension. It is persisted with the dimension so
//! that a natural key keeps its surrogate key across runs; keys are never
//! reassigned or reused.

use crate::domain::SurrogateKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRegistry {
    entries: BTreeMap<String, SurrogateKey>,
    next_key: SurrogateKey,
}

impl Default for KeyRegistry {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_key: SurrogateKey::FIRST,
        }
    }
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Surrogate key of `natural_key`, if registered
    pub fn get(&self, natural_key: &str) -> Option<SurrogateKey> {
        self.entries.get(natural_key).copied()
    }

    /// Returns the existing key or assigns the next unused one
    ///
    /// The boolean is `true` when a key was newly assigned.
    pub fn get_or_assign(&mut self, natural_key: &str) -> (SurrogateKey, bool) {
        if let Some(existing) = self.get(natural_key) {
            return (existing, false);
        }

        let assigned = self.next_key;
        self.next_key = assigned.next();
        self.entries.insert(natural_key.to_string(), assigned);
        (assigned, true)
    }

    /// Next key that would be assigned
    pub fn next_key(&self) -> SurrogateKey {
        self.next_key
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered pairs in natural-key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, SurrogateKey)> {
        self.entries.iter().map(|(natural, key)| (natural.as_str(), *key))
    }
}
