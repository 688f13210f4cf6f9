use chrono::{Datelike, NaiveDate};
use rustc_hash::FxHashMap;
use tracing::warn;

/// Scores two attribute values into `[0, 1]`.
///
/// Implementations never fail: malformed input scores 0.
pub trait SimilarityFunction: Send + Sync {
    fn name(&self) -> &'static str;

    fn compare(&self, a: &str, b: &str) -> f64;
}

/// Edit distance normalized by the longer of the two strings.
#[derive(Clone, Copy, Debug, Default)]
pub struct LevenshteinSimilarity;

impl SimilarityFunction for LevenshteinSimilarity {
    fn name(&self) -> &'static str {
        "levenshtein"
    }

    fn compare(&self, a: &str, b: &str) -> f64 {
        let longest = a.chars().count().max(b.chars().count());
        if longest == 0 {
            return 1.0;
        }
        1.0 - strsim::levenshtein(a, b) as f64 / longest as f64
    }
}

/// `min(t1, t2) / max(t1, t2)` over day numbers, so close dates score near 1.
#[derive(Clone, Copy, Debug, Default)]
pub struct DateSimilarity;

impl SimilarityFunction for DateSimilarity {
    fn name(&self) -> &'static str {
        "date"
    }

    fn compare(&self, a: &str, b: &str) -> f64 {
        let (Some(d1), Some(d2)) = (parse_date(a), parse_date(b)) else {
            warn!(a, b, "wrong date format, scoring 0");
            return 0.0;
        };
        let t1 = d1.num_days_from_ce() as f64;
        let t2 = d2.num_days_from_ce() as f64;
        let hi = t1.max(t2);
        if hi <= 0.0 {
            return 0.0;
        }
        (t1.min(t2) / hi).clamp(0.0, 1.0)
    }
}

/// Parses `YYYY-MM-DD`, also accepting a longer ISO timestamp by its date prefix.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok().or_else(|| {
        value
            .get(..10)
            .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
    })
}

/// Cosine similarity of TF-IDF token vectors.
///
/// Document frequencies come from a corpus of attribute values, usually every
/// value of the compared attribute in both collections. Tokens never seen in
/// the corpus get the highest idf.
#[derive(Clone, Debug)]
pub struct TfIdfSimilarity {
    idf: FxHashMap<String, f64>,
    max_idf: f64,
}

impl TfIdfSimilarity {
    pub fn from_corpus<I, S>(documents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut doc_freq: FxHashMap<String, usize> = FxHashMap::default();
        let mut num_docs = 0usize;
        for doc in documents {
            num_docs += 1;
            let mut tokens = tokenize(doc.as_ref());
            tokens.sort_unstable();
            tokens.dedup();
            for token in tokens {
                *doc_freq.entry(token).or_insert(0) += 1;
            }
        }
        let n = num_docs.max(1) as f64;
        let idf: FxHashMap<String, f64> = doc_freq
            .into_iter()
            .map(|(token, df)| (token, (n / df as f64).ln() + 1.0))
            .collect();
        let max_idf = n.ln() + 1.0;
        Self { idf, max_idf }
    }

    fn weights(&self, value: &str) -> FxHashMap<String, f64> {
        let mut tf: FxHashMap<String, f64> = FxHashMap::default();
        for token in tokenize(value) {
            *tf.entry(token).or_insert(0.0) += 1.0;
        }
        for (token, weight) in tf.iter_mut() {
            *weight *= self.idf.get(token).copied().unwrap_or(self.max_idf);
        }
        tf
    }
}

impl SimilarityFunction for TfIdfSimilarity {
    fn name(&self) -> &'static str {
        "tfIdf"
    }

    fn compare(&self, a: &str, b: &str) -> f64 {
        let wa = self.weights(a);
        let wb = self.weights(b);
        let norm_a = wa.values().map(|w| w * w).sum::<f64>().sqrt();
        let norm_b = wb.values().map(|w| w * w).sum::<f64>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        let dot: f64 = wa
            .iter()
            .filter_map(|(token, w)| wb.get(token).map(|other| w * other))
            .sum();
        (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
    }
}

fn tokenize(value: &str) -> Vec<String> {
    value
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}
