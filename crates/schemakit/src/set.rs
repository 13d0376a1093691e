//! Hash-keyed sets
//!
//! Set elements are addressed by a hash code of their content, so two
//! sets holding the same elements in any order compare equal and their
//! elements land on the same flat paths (`ports.<code>.from`).

use crate::value::Value;
use std::collections::BTreeMap;

/// A set of values keyed by hash code
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Set {
    items: BTreeMap<u64, Value>,
}

impl Set {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value under its code
    ///
    /// Returns false if an element with the same code was already present;
    /// the existing element is kept.
    pub fn insert(&mut self, code: u64, value: Value) -> bool {
        if self.items.contains_key(&code) {
            return false;
        }
        self.items.insert(code, value);
        true
    }

    pub fn get(&self, code: u64) -> Option<&Value> {
        self.items.get(&code)
    }

    pub fn contains_code(&self, code: u64) -> bool {
        self.items.contains_key(&code)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Codes in ascending order
    pub fn codes(&self) -> impl Iterator<Item = u64> + '_ {
        self.items.keys().copied()
    }

    /// Elements in code order
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.items.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &Value)> {
        self.items.iter().map(|(code, value)| (*code, value))
    }

    /// Elements of `self` whose codes are not in `other`
    pub fn difference(&self, other: &Set) -> Set {
        Set {
            items: self
                .items
                .iter()
                .filter(|(code, _)| !other.contains_code(**code))
                .map(|(code, value)| (*code, value.clone()))
                .collect(),
        }
    }

    /// Whether both sets hold exactly the same codes
    pub fn same_codes(&self, other: &Set) -> bool {
        self.items.len() == other.items.len() && self.codes().eq(other.codes())
    }
}

/// Hash a value into a set code
///
/// The encoding is canonical: maps hash in key order, and every variant
/// is tagged so `"1"` and `1` get different codes.
pub fn hash_value(value: &Value) -> u64 {
    let mut hasher = blake3::Hasher::new();
    encode(value, &mut hasher);
    let digest = hasher.finalize();
    let mut code = [0u8; 8];
    code.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(code)
}

fn encode(value: &Value, hasher: &mut blake3::Hasher) {
    match value {
        Value::Bool(b) => {
            hasher.update(&[0, u8::from(*b)]);
        }
        Value::Int(i) => {
            hasher.update(&[1]);
            hasher.update(&i.to_le_bytes());
        }
        Value::Float(f) => {
            hasher.update(&[2]);
            hasher.update(&f.to_bits().to_le_bytes());
        }
        Value::String(s) => {
            hasher.update(&[3]);
            encode_str(s, hasher);
        }
        Value::List(items) => {
            hasher.update(&[4]);
            hasher.update(&(items.len() as u64).to_le_bytes());
            for item in items {
                encode(item, hasher);
            }
        }
        Value::Set(set) => {
            hasher.update(&[5]);
            hasher.update(&(set.len() as u64).to_le_bytes());
            for code in set.codes() {
                hasher.update(&code.to_le_bytes());
            }
        }
        Value::Map(map) => {
            hasher.update(&[6]);
            hasher.update(&(map.len() as u64).to_le_bytes());
            for (key, item) in map {
                encode_str(key, hasher);
                encode(item, hasher);
            }
        }
        Value::Unknown => {
            hasher.update(&[7]);
        }
    }
}

fn encode_str(s: &str, hasher: &mut blake3::Hasher) {
    hasher.update(&(s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}
