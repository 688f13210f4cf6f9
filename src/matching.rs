use crate::error::ServiceError;
use crate::model::{AttributedRecord, RecordCollection};
use crate::similarity::{DateSimilarity, LevenshteinSimilarity, SimilarityFunction, TfIdfSimilarity};

/// Caller-owned count of matcher decisions, kept outside the matchers so one
/// matcher can serve several workers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InvocationCounter {
    count: u64,
}

impl InvocationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self) {
        self.count += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn merge(self, other: InvocationCounter) -> Self {
        Self {
            count: self.count + other.count,
        }
    }
}

/// Pair-level matching capability.
pub trait Matcher: Send + Sync {
    fn name(&self) -> &str;

    /// Raw score of the pair on the matcher's own scale.
    fn do_match(&self, r1: &AttributedRecord, r2: &AttributedRecord) -> f64;

    fn threshold(&self) -> f64;

    fn set_threshold(&mut self, threshold: f64);

    /// Accepts the pair when its score reaches the threshold.
    fn matches(
        &self,
        r1: &AttributedRecord,
        r2: &AttributedRecord,
        counter: &mut InvocationCounter,
    ) -> bool {
        counter.record();
        self.do_match(r1, r2) >= self.threshold()
    }
}

/// Compares one attribute with one similarity function.
///
/// Multi-valued attributes take the best score over all value pairs: one
/// strong match among several values is enough evidence.
pub struct SimpleMatcher {
    name: String,
    attribute: String,
    function: Box<dyn SimilarityFunction>,
    threshold: f64,
}

impl SimpleMatcher {
    pub fn new<F>(attribute: &str, function: F, threshold: f64) -> Self
    where
        F: SimilarityFunction + 'static,
    {
        Self::boxed(attribute, Box::new(function), threshold)
    }

    pub fn boxed(attribute: &str, function: Box<dyn SimilarityFunction>, threshold: f64) -> Self {
        Self {
            name: format!("{}_{}", attribute, function.name()),
            attribute: attribute.to_string(),
            function,
            threshold,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }
}

impl Matcher for SimpleMatcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn do_match(&self, r1: &AttributedRecord, r2: &AttributedRecord) -> f64 {
        let values2 = r2.attribute(&self.attribute);
        r1.attribute(&self.attribute)
            .iter()
            .flat_map(|v1| values2.iter().map(move |v2| (v1, v2)))
            .map(|(v1, v2)| self.function.compare(v1, v2))
            .fold(0.0, f64::max)
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }
}

/// Linear combination of sub-matchers, clamped to `[0, 1]`:
/// `(offset + Σ wᵢ·scoreᵢ) / normalizer`.
pub struct CompoundMatcher {
    name: String,
    matchers: Vec<Box<dyn Matcher>>,
    weights: Vec<f64>,
    offset: f64,
    normalizer: f64,
    threshold: f64,
}

impl CompoundMatcher {
    /// Hand-picked weights, divided by their sum so they need not add up to 1.
    pub fn normalized(
        matchers: Vec<Box<dyn Matcher>>,
        weights: Vec<f64>,
        threshold: f64,
    ) -> Result<Self, ServiceError> {
        check_weights(&matchers, &weights)?;
        let normalizer: f64 = weights.iter().sum();
        if normalizer.abs() < f64::EPSILON {
            return Err(ServiceError::configuration(
                "compound matcher weights must not sum to zero",
            ));
        }
        Ok(Self::build(matchers, weights, 0.0, normalizer, threshold))
    }

    /// Coefficients fitted by linear regression, used verbatim.
    pub fn regression(
        matchers: Vec<Box<dyn Matcher>>,
        weights: Vec<f64>,
        offset: f64,
        threshold: f64,
    ) -> Result<Self, ServiceError> {
        check_weights(&matchers, &weights)?;
        Ok(Self::build(matchers, weights, offset, 1.0, threshold))
    }

    fn build(
        matchers: Vec<Box<dyn Matcher>>,
        weights: Vec<f64>,
        offset: f64,
        normalizer: f64,
        threshold: f64,
    ) -> Self {
        let name = matchers
            .iter()
            .map(|m| m.name())
            .collect::<Vec<_>>()
            .join("+");
        Self {
            name,
            matchers,
            weights,
            offset,
            normalizer,
            threshold,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
}

fn check_weights(matchers: &[Box<dyn Matcher>], weights: &[f64]) -> Result<(), ServiceError> {
    if matchers.is_empty() {
        return Err(ServiceError::configuration(
            "compound matcher needs at least one sub-matcher",
        ));
    }
    if matchers.len() != weights.len() {
        return Err(ServiceError::configuration(format!(
            "compound matcher has {} sub-matchers but {} weights",
            matchers.len(),
            weights.len()
        )));
    }
    if weights.iter().any(|w| !w.is_finite()) {
        return Err(ServiceError::configuration(
            "compound matcher weights must be finite",
        ));
    }
    Ok(())
}

impl Matcher for CompoundMatcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn do_match(&self, r1: &AttributedRecord, r2: &AttributedRecord) -> f64 {
        let weighted: f64 = self
            .matchers
            .iter()
            .zip(&self.weights)
            .map(|(matcher, weight)| weight * matcher.do_match(r1, r2))
            .sum();
        ((self.offset + weighted) / self.normalizer).clamp(0.0, 1.0)
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }
}

/// Titles by normalized edit distance.
pub fn title_matcher() -> SimpleMatcher {
    SimpleMatcher::new("title", LevenshteinSimilarity, 0.7).with_name("TitleMatcher")
}

/// Titles by TF-IDF cosine, weighted with the title frequencies of `corpus`.
pub fn tfidf_title_matcher(corpus: &[&RecordCollection]) -> SimpleMatcher {
    let titles = corpus
        .iter()
        .flat_map(|collection| collection.records())
        .flat_map(|record| record.attribute("title").iter());
    SimpleMatcher::new("title", TfIdfSimilarity::from_corpus(titles), 0.93)
        .with_name("TFIDFTitleMatcher")
}

/// Release dates by proximity.
pub fn date_matcher() -> SimpleMatcher {
    SimpleMatcher::new("release", DateSimilarity, 0.95).with_name("DateMatcher")
}

/// Titles weighted 9 to 1 against release dates.
pub fn title_date_matcher() -> CompoundMatcher {
    let matchers: Vec<Box<dyn Matcher>> = vec![Box::new(title_matcher()), Box::new(date_matcher())];
    CompoundMatcher::build(matchers, vec![9.0, 1.0], 0.0, 10.0, 0.5).with_name("TitleDateMatcher")
}
