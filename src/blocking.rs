use crate::model::AttributedRecord;
use crate::similarity::parse_date;
use chrono::Datelike;
use rustc_hash::FxHashMap;
use tracing::warn;

/// Cheap per-record key used to prune candidate pairs.
///
/// `None` is the "no key" result. It never equals any key, another record's
/// `None` included, so a record without a key is never compared.
pub trait BlockingKeyFunction: Send + Sync {
    fn name(&self) -> &str;

    fn blocking_key(&self, record: &AttributedRecord) -> Option<String>;
}

impl<T: BlockingKeyFunction + ?Sized> BlockingKeyFunction for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn blocking_key(&self, record: &AttributedRecord) -> Option<String> {
        (**self).blocking_key(record)
    }
}

/// Two keys put a pair in the same block only when both exist and are equal.
pub fn same_block(k1: Option<&str>, k2: Option<&str>) -> bool {
    matches!((k1, k2), (Some(a), Some(b)) if a == b)
}

/// Every record lands in one block: the full cross product.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoBlocking;

impl BlockingKeyFunction for NoBlocking {
    fn name(&self) -> &str {
        "none"
    }

    fn blocking_key(&self, _record: &AttributedRecord) -> Option<String> {
        Some(String::new())
    }
}

/// First character of the record's title.
#[derive(Clone, Debug)]
pub struct TitleInitialBlocking {
    attribute: String,
}

impl TitleInitialBlocking {
    pub fn new(attribute: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
        }
    }
}

impl Default for TitleInitialBlocking {
    fn default() -> Self {
        Self::new("title")
    }
}

impl BlockingKeyFunction for TitleInitialBlocking {
    fn name(&self) -> &str {
        "titleInitial"
    }

    fn blocking_key(&self, record: &AttributedRecord) -> Option<String> {
        // values are kept sorted, the last one wins
        let key = record
            .attribute(&self.attribute)
            .iter()
            .filter_map(|title| title.chars().next())
            .last()
            .map(String::from);
        if key.is_none() {
            warn!(id = record.id(), "no blocking key for record without {}", self.attribute);
        }
        key
    }
}

/// Release year rounded down to its decade.
#[derive(Clone, Debug)]
pub struct DecadeBlocking {
    attribute: String,
}

impl DecadeBlocking {
    pub fn new(attribute: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
        }
    }
}

impl Default for DecadeBlocking {
    fn default() -> Self {
        Self::new("release")
    }
}

impl BlockingKeyFunction for DecadeBlocking {
    fn name(&self) -> &str {
        "decade"
    }

    fn blocking_key(&self, record: &AttributedRecord) -> Option<String> {
        let mut key = None;
        for value in record.attribute(&self.attribute) {
            match parse_date(value) {
                Some(date) => key = Some((date.year().div_euclid(10) * 10).to_string()),
                None => {
                    key = None;
                    break;
                }
            }
        }
        if key.is_none() {
            warn!(id = record.id(), "no blocking key, {} missing or unparsable", self.attribute);
        }
        key
    }
}

/// Memoizes a blocking function by record id.
///
/// One cache per instance; keys are stable because records are read-only
/// once loaded.
pub struct CachedBlocking<B> {
    inner: B,
    cache: FxHashMap<String, Option<String>>,
}

impl<B: BlockingKeyFunction> CachedBlocking<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            cache: FxHashMap::default(),
        }
    }

    pub fn blocking_key(&mut self, record: &AttributedRecord) -> Option<&str> {
        let inner = &self.inner;
        self.cache
            .entry(record.id().to_string())
            .or_insert_with(|| inner.blocking_key(record))
            .as_deref()
    }

    /// Key of an already cached id, without computing anything.
    pub fn cached_key(&self, id: &str) -> Option<&str> {
        self.cache.get(id).and_then(|key| key.as_deref())
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}
