use crate::engine::MatchOutcome;
use crate::error::ServiceError;
use crate::model::PairKey;
use csv::{ReaderBuilder, Trim, Writer};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Known matching pairs, plus every id that appears in one of them.
#[derive(Clone, Debug, Default)]
pub struct GoldStandard {
    pairs: FxHashMap<PairKey, f64>,
    ids: FxHashSet<String>,
}

impl GoldStandard {
    pub fn load(path: &Path) -> Result<Self, ServiceError> {
        let file = std::fs::File::open(path).map_err(|err| {
            ServiceError::not_found(format!("gold standard file {}: {}", path.display(), err))
        })?;
        Self::from_reader(file)
    }

    ///
    /// Reads `id1,id2` lines. Any line that does not hold exactly two fields
    /// fails the whole load.
    ///
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ServiceError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);
        let mut gold = GoldStandard::default();
        for record in reader.records() {
            let record = record.map_err(ServiceError::configuration)?;
            if record.len() != 2 || record.iter().any(str::is_empty) {
                let line = record.position().map_or(0, |pos| pos.line());
                let raw = record.iter().collect::<Vec<_>>().join(",");
                return Err(ServiceError::configuration(format!(
                    "wrong format of the gold standard file near line {}: {}",
                    line, raw
                )));
            }
            gold.insert(&record[0], &record[1]);
        }
        Ok(gold)
    }

    pub fn from_pairs<'s, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'s str, &'s str)>,
    {
        let mut gold = GoldStandard::default();
        for (a, b) in pairs {
            gold.insert(a, b);
        }
        gold
    }

    fn insert(&mut self, a: &str, b: &str) {
        self.ids.insert(a.to_string());
        self.ids.insert(b.to_string());
        self.pairs.insert(PairKey::new(a, b), 1.0);
    }

    pub fn contains(&self, pair: &PairKey) -> bool {
        self.pairs.contains_key(pair)
    }

    pub fn relevance(&self, pair: &PairKey) -> Option<f64> {
        self.pairs.get(pair).copied()
    }

    /// Whether `id` takes part in at least one gold pair.
    pub fn covers(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn pairs(&self) -> impl Iterator<Item = &PairKey> {
        self.pairs.keys()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Size of the result set
    pub matched: usize,
    /// Result pairs touching at least one gold-covered id
    pub partial_result_size: usize,
    pub true_positives: usize,
    pub invocations: u64,
    #[serde(skip)]
    pub elapsed: Duration,
    pub truncated: bool,
    #[serde(skip)]
    pub pairs: FxHashSet<PairKey>,
}

impl ScoreResult {
    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed.as_millis()
    }

    pub fn elapsed_minutes(&self) -> u128 {
        self.elapsed_ms() / 60_000
    }
}

/// Precision, recall and F1 against a gold standard that may cover only part
/// of the data.
pub struct Scorer {
    gold: GoldStandard,
}

impl Scorer {
    pub fn new(gold: GoldStandard) -> Self {
        Self { gold }
    }

    pub fn gold(&self) -> &GoldStandard {
        &self.gold
    }

    ///
    /// Pairs whose ids the gold standard never mentions cannot be judged, so
    /// they are left out of the precision denominator.
    ///
    pub fn score(&self, outcome: MatchOutcome) -> ScoreResult {
        let true_positives = outcome
            .pairs
            .iter()
            .filter(|pair| self.gold.contains(pair))
            .count();
        let partial_result_size = outcome
            .pairs
            .iter()
            .filter(|pair| self.gold.covers(&pair.left) || self.gold.covers(&pair.right))
            .count();
        let recall = ratio(true_positives, self.gold.len());
        let precision = ratio(true_positives, partial_result_size);
        let result = ScoreResult {
            precision,
            recall,
            f1: f1(precision, recall),
            matched: outcome.pairs.len(),
            partial_result_size,
            true_positives,
            invocations: outcome.invocations.count(),
            elapsed: outcome.elapsed,
            truncated: outcome.truncated,
            pairs: outcome.pairs,
        };
        info!(
            precision = result.precision,
            recall = result.recall,
            f1 = result.f1,
            true_positives = result.true_positives,
            partial_result_size = result.partial_result_size,
            "Scored {} matched pairs against {} gold pairs",
            result.matched,
            self.gold.len()
        );
        result
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Harmonic mean of precision and recall, 0 when both are 0.
pub fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Writes one `id1,id2` line per pair, sorted.
pub fn write_pairs<W: Write>(pairs: &FxHashSet<PairKey>, writer: W) -> Result<(), ServiceError> {
    let mut sorted: Vec<&PairKey> = pairs.iter().collect();
    sorted.sort();
    let mut writer = Writer::from_writer(writer);
    for pair in sorted {
        writer.write_record([pair.left.as_str(), pair.right.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}
