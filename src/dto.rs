use crate::blocking::{BlockingKeyFunction, DecadeBlocking, NoBlocking, TitleInitialBlocking};
use crate::error::ServiceError;
use crate::matching::{CompoundMatcher, Matcher, SimpleMatcher};
use crate::model::RecordCollection;
use crate::similarity::{DateSimilarity, LevenshteinSimilarity, SimilarityFunction, TfIdfSimilarity};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFile {
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Further files merged into the same collection, later ids winning
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default = "default_value_separator")]
    pub value_separator: char,
}

impl DataFile {
    /// `path` first, then `paths` in order.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.path.iter().chain(&self.paths).map(PathBuf::as_path)
    }
}

fn default_id_column() -> String {
    "id".to_string()
}

fn default_value_separator() -> char {
    '|'
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    pub left: DataFile,
    /// Omitted to resolve duplicates within `left`
    #[serde(default)]
    pub right: Option<DataFile>,
    #[serde(default)]
    pub gold: Option<PathBuf>,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub regression_output: Option<PathBuf>,
    #[serde(default)]
    pub blocking: BlockingSpec,
    pub matcher: MatcherSpec,
    #[serde(default)]
    pub training_matchers: Vec<MatcherSpec>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

impl RunConfig {
    pub fn from_file(path: &Path) -> Result<Self, ServiceError> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            ServiceError::not_found(format!("config file {}: {}", path.display(), err))
        })?;
        serde_json::from_str(&raw).map_err(|err| {
            ServiceError::configuration(format!("config file {}: {}", path.display(), err))
        })
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BlockingSpec {
    #[default]
    None,
    TitleInitial {
        #[serde(default)]
        attribute: Option<String>,
    },
    Decade {
        #[serde(default)]
        attribute: Option<String>,
    },
}

impl BlockingSpec {
    pub fn build(&self) -> Box<dyn BlockingKeyFunction> {
        match self {
            BlockingSpec::None => Box::new(NoBlocking),
            BlockingSpec::TitleInitial { attribute } => Box::new(
                attribute
                    .as_deref()
                    .map(TitleInitialBlocking::new)
                    .unwrap_or_default(),
            ),
            BlockingSpec::Decade { attribute } => Box::new(
                attribute
                    .as_deref()
                    .map(DecadeBlocking::new)
                    .unwrap_or_default(),
            ),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SimilaritySpec {
    Levenshtein,
    Date,
    TfIdf,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MatcherSpec {
    Simple {
        #[serde(default)]
        name: Option<String>,
        attribute: String,
        similarity: SimilaritySpec,
        threshold: f64,
    },
    /// Hand-picked weights, normalized by their sum
    Compound {
        #[serde(default)]
        name: Option<String>,
        matchers: Vec<MatcherSpec>,
        weights: Vec<f64>,
        threshold: f64,
    },
    /// Fitted regression coefficients, used as they are
    Regression {
        #[serde(default)]
        name: Option<String>,
        matchers: Vec<MatcherSpec>,
        weights: Vec<f64>,
        offset: f64,
        threshold: f64,
    },
}

impl MatcherSpec {
    ///
    /// Builds the matcher. `corpus` supplies the document frequencies of
    /// TF-IDF similarities.
    ///
    pub fn build(&self, corpus: &[&RecordCollection]) -> Result<Box<dyn Matcher>, ServiceError> {
        match self {
            MatcherSpec::Simple {
                name,
                attribute,
                similarity,
                threshold,
            } => {
                let function = build_similarity(*similarity, attribute, corpus);
                let matcher = SimpleMatcher::boxed(attribute, function, *threshold);
                Ok(Box::new(match name {
                    Some(name) => matcher.with_name(name),
                    None => matcher,
                }))
            }
            MatcherSpec::Compound {
                name,
                matchers,
                weights,
                threshold,
            } => {
                let matchers = build_all(matchers, corpus)?;
                let matcher = CompoundMatcher::normalized(matchers, weights.clone(), *threshold)?;
                Ok(Box::new(match name {
                    Some(name) => matcher.with_name(name),
                    None => matcher,
                }))
            }
            MatcherSpec::Regression {
                name,
                matchers,
                weights,
                offset,
                threshold,
            } => {
                let matchers = build_all(matchers, corpus)?;
                let matcher =
                    CompoundMatcher::regression(matchers, weights.clone(), *offset, *threshold)?;
                Ok(Box::new(match name {
                    Some(name) => matcher.with_name(name),
                    None => matcher,
                }))
            }
        }
    }
}

pub fn build_all(
    specs: &[MatcherSpec],
    corpus: &[&RecordCollection],
) -> Result<Vec<Box<dyn Matcher>>, ServiceError> {
    specs.iter().map(|spec| spec.build(corpus)).collect()
}

fn build_similarity(
    spec: SimilaritySpec,
    attribute: &str,
    corpus: &[&RecordCollection],
) -> Box<dyn SimilarityFunction> {
    match spec {
        SimilaritySpec::Levenshtein => Box::new(LevenshteinSimilarity),
        SimilaritySpec::Date => Box::new(DateSimilarity),
        SimilaritySpec::TfIdf => Box::new(TfIdfSimilarity::from_corpus(
            corpus
                .iter()
                .flat_map(|collection| collection.records())
                .flat_map(|record| record.attribute(attribute).iter()),
        )),
    }
}
