use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// A record loaded from one catalog: an id plus multi-valued attributes.
///
/// Values are trimmed on insert; empty values are never stored and repeated
/// values collapse into one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributedRecord {
    id: String,
    attributes: FxHashMap<String, BTreeSet<String>>,
}

impl AttributedRecord {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self {
            id: id.into(),
            attributes: FxHashMap::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn add_attribute(&mut self, name: &str, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        self.attributes
            .entry(name.to_string())
            .or_default()
            .insert(value.to_string());
    }

    /// Builder form of [`AttributedRecord::add_attribute`].
    pub fn with<I, V>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: AsRef<str>,
    {
        for value in values {
            self.add_attribute(name, value.as_ref());
        }
        self
    }

    /// Values of `name`, or an empty set when the record has none.
    pub fn attribute(&self, name: &str) -> &BTreeSet<String> {
        static EMPTY: BTreeSet<String> = BTreeSet::new();
        self.attributes.get(name).unwrap_or(&EMPTY)
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }
}

#[derive(Clone, Debug, Default)]
pub struct RecordCollection {
    records: FxHashMap<String, AttributedRecord>,
}

impl RecordCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record; an existing record with the same id is replaced.
    pub fn insert(&mut self, record: AttributedRecord) {
        if let Some(previous) = self.records.insert(record.id.clone(), record) {
            debug!(id = previous.id(), "record id loaded twice, keeping the last one");
        }
    }

    /// Merges every record of `other` into this collection, last one wins.
    pub fn extend(&mut self, other: RecordCollection) {
        for record in other.records.into_values() {
            self.insert(record);
        }
    }

    pub fn get(&self, id: &str) -> Option<&AttributedRecord> {
        self.records.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn records(&self) -> impl Iterator<Item = &AttributedRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<AttributedRecord> for RecordCollection {
    fn from_iter<T: IntoIterator<Item = AttributedRecord>>(iter: T) -> Self {
        let mut collection = RecordCollection::new();
        for record in iter {
            collection.insert(record);
        }
        collection
    }
}

/// Canonical key of an unordered id pair: `left <= right` lexicographically.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PairKey {
    pub left: String,
    pub right: String,
}

impl PairKey {
    pub fn new(a: &str, b: &str) -> Self {
        let (left, right) = if a <= b { (a, b) } else { (b, a) };
        Self {
            left: left.to_string(),
            right: right.to_string(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.left == id || self.right == id
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{},{}", self.left, self.right)
    }
}
