use crate::dto::{build_all, DataFile, RunConfig};
use crate::engine::MatchEngine;
use crate::error::ServiceError;
use crate::loader::CsvRecordLoader;
use crate::model::RecordCollection;
use crate::scorer::{GoldStandard, Scorer};
use crate::training::write_regression_file;
use crate::util::{create_output, push_result_file};
use rand::prelude::*;
use serde_json::{json, Value};
use std::time::Duration;

/// The collections of one run; `right` is absent when resolving within `left`.
pub struct Collections {
    pub left: RecordCollection,
    pub right: Option<RecordCollection>,
}

impl Collections {
    pub fn right(&self) -> &RecordCollection {
        self.right.as_ref().unwrap_or(&self.left)
    }

    fn corpus(&self) -> Vec<&RecordCollection> {
        match &self.right {
            Some(right) => vec![&self.left, right],
            None => vec![&self.left],
        }
    }
}

/// Loads every file of `data` into one collection; a later file overwrites
/// records of an earlier one with the same id.
pub fn pull_data_file(data: &DataFile) -> Result<RecordCollection, ServiceError> {
    let loader = CsvRecordLoader::from_data_file(data);
    let mut files = data.files();
    let Some(first) = files.next() else {
        return Err(ServiceError::configuration("input has neither a path nor paths"));
    };
    let mut collection = loader.load_file(first)?;
    for path in files {
        collection.extend(loader.load_file(path)?);
    }
    Ok(collection)
}

pub fn load_collections(config: &RunConfig) -> Result<Collections, ServiceError> {
    let left = pull_data_file(&config.left)?;
    let right = config.right.as_ref().map(pull_data_file).transpose()?;
    Ok(Collections { left, right })
}

///
/// Matches the configured collections, writes the result pairs when an
/// output is configured and scores them when a gold standard is.
///
pub fn run_matching(config: &RunConfig) -> Result<Value, ServiceError> {
    let gold = config.gold.as_deref().map(GoldStandard::load).transpose()?;
    let collections = load_collections(config)?;
    let blocking = config.blocking.build();
    let matcher = config.matcher.build(&collections.corpus())?;

    let mut engine = MatchEngine::new(blocking.as_ref(), matcher.as_ref());
    if let Some(ms) = config.deadline_ms {
        engine = engine.with_deadline(Duration::from_millis(ms));
    }
    let outcome = engine.run(&collections.left, collections.right());

    if let Some(path) = &config.output {
        push_result_file(path, &outcome.pairs)?;
    }
    let Some(gold) = gold else {
        return Ok(json!({
            "matched": outcome.pairs.len(),
            "invocations": outcome.invocations.count(),
            "elapsedMs": outcome.elapsed.as_millis() as u64,
            "truncated": outcome.truncated,
            "output": config.output,
        }));
    };
    let result = Scorer::new(gold).score(outcome);
    let mut body = serde_json::to_value(&result).map_err(ServiceError::logic)?;
    body["elapsedMs"] = json!(result.elapsed_ms() as u64);
    body["elapsedMinutes"] = json!(result.elapsed_minutes() as u64);
    body["output"] = json!(config.output);
    Ok(body)
}

/// Writes the labeled training file for the configured training matchers.
pub fn run_regression_export(config: &RunConfig) -> Result<Value, ServiceError> {
    let gold_path = config
        .gold
        .as_deref()
        .ok_or_else(|| ServiceError::configuration("a gold standard is required for training"))?;
    let output = config
        .regression_output
        .as_deref()
        .ok_or_else(|| ServiceError::configuration("'regressionOutput' is not configured"))?;
    if config.training_matchers.is_empty() {
        return Err(ServiceError::configuration("'trainingMatchers' is empty"));
    }
    let gold = GoldStandard::load(gold_path)?;
    let collections = load_collections(config)?;
    let matchers = build_all(&config.training_matchers, &collections.corpus())?;
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let summary = write_regression_file(
        &collections.left,
        collections.right(),
        &gold,
        &matchers,
        &mut rng,
        create_output(output)?,
    )?;
    let mut body = serde_json::to_value(&summary).map_err(ServiceError::logic)?;
    body["output"] = json!(output);
    Ok(body)
}
