use crate::error::ServiceError;
use crate::matching::Matcher;
use crate::model::{AttributedRecord, PairKey, RecordCollection};
use crate::scorer::GoldStandard;
use csv::Writer;
use rand::prelude::*;
use serde::Serialize;
use std::io::Write;
use tracing::{info, warn};

/// How many draws per requested negative example before sampling gives up.
const MAX_DRAWS_PER_NEGATIVE: usize = 100;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub positives: usize,
    pub negatives: usize,
    /// Gold pairs whose ids were not found in either collection
    pub skipped: usize,
}

///
/// Writes a labeled CSV for fitting compound matcher weights offline: one
/// column per matcher plus a trailing `score` label. Every gold pair is a
/// `1.0` row; as many randomly drawn non-gold pairs become `0.0` rows.
///
/// ## Arguments
///
/// * `left`, `right` - The two collections the gold standard refers to.
/// * `gold` - Known matching pairs.
/// * `matchers` - Matchers whose raw scores form the feature columns.
/// * `rng` - Source of the negative samples.
/// * `writer` - Destination of the CSV.
///
pub fn write_regression_file<W, R>(
    left: &RecordCollection,
    right: &RecordCollection,
    gold: &GoldStandard,
    matchers: &[Box<dyn Matcher>],
    rng: &mut R,
    writer: W,
) -> Result<ExportSummary, ServiceError>
where
    W: Write,
    R: Rng,
{
    let mut writer = Writer::from_writer(writer);
    let mut header: Vec<&str> = matchers.iter().map(|m| m.name()).collect();
    header.push("score");
    writer.write_record(&header)?;

    let mut summary = ExportSummary::default();
    let mut gold_pairs: Vec<&PairKey> = gold.pairs().collect();
    gold_pairs.sort();
    for pair in gold_pairs {
        let Some((r1, r2)) = lookup(left, right, &pair.left, &pair.right) else {
            let err = ServiceError::logic(format!(
                "gold pair {} does not match the data, skipping it",
                pair
            ));
            warn!("{}", err);
            summary.skipped += 1;
            continue;
        };
        writer.write_record(feature_row(matchers, r1, r2, "1.0"))?;
        summary.positives += 1;
    }

    let mut ids1: Vec<&str> = left.ids().collect();
    let mut ids2: Vec<&str> = right.ids().collect();
    ids1.sort_unstable();
    ids2.sort_unstable();
    let quota = summary.positives;
    let max_draws = quota.saturating_mul(MAX_DRAWS_PER_NEGATIVE);
    let mut draws = 0;
    while summary.negatives < quota && draws < max_draws && !ids1.is_empty() && !ids2.is_empty() {
        draws += 1;
        let id1 = ids1[rng.gen_range(0..ids1.len())];
        let id2 = ids2[rng.gen_range(0..ids2.len())];
        // a record paired with itself is no negative example
        if id1 == id2 || gold.contains(&PairKey::new(id1, id2)) {
            continue;
        }
        let Some((r1, r2)) = lookup(left, right, id1, id2) else {
            continue;
        };
        writer.write_record(feature_row(matchers, r1, r2, "0.0"))?;
        summary.negatives += 1;
    }
    if summary.negatives < quota {
        warn!(
            wanted = quota,
            drawn = summary.negatives,
            "ran out of non-gold pairs to sample"
        );
    }
    writer.flush()?;
    info!(
        positives = summary.positives,
        negatives = summary.negatives,
        skipped = summary.skipped,
        "Regression file written"
    );
    Ok(summary)
}

/// Finds `id1` in `left` and `id2` in `right`, or the other way round.
fn lookup<'c>(
    left: &'c RecordCollection,
    right: &'c RecordCollection,
    id1: &str,
    id2: &str,
) -> Option<(&'c AttributedRecord, &'c AttributedRecord)> {
    match (left.get(id1), right.get(id2)) {
        (Some(r1), Some(r2)) => Some((r1, r2)),
        _ => right.get(id1).zip(left.get(id2)),
    }
}

fn feature_row(
    matchers: &[Box<dyn Matcher>],
    r1: &AttributedRecord,
    r2: &AttributedRecord,
    label: &str,
) -> Vec<String> {
    matchers
        .iter()
        .map(|m| m.do_match(r1, r2).to_string())
        .chain(std::iter::once(label.to_string()))
        .collect()
}
