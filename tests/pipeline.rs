use idres_service::blocking::NoBlocking;
use idres_service::dto::RunConfig;
use idres_service::engine::MatchEngine;
use idres_service::matching::{Matcher, SimpleMatcher};
use idres_service::model::{AttributedRecord, PairKey, RecordCollection};
use idres_service::pipeline::{run_matching, run_regression_export};
use idres_service::response::Status;
use idres_service::scorer::{GoldStandard, Scorer};
use idres_service::similarity::LevenshteinSimilarity;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn half_life_is_found_and_scored_perfectly() {
    let left: RecordCollection = [AttributedRecord::new("a1")
        .with("title", ["Half Life"])
        .with("release", ["1998-11-08"])]
    .into_iter()
    .collect();
    let right: RecordCollection = [AttributedRecord::new("b1")
        .with("title", ["Half-Life"])
        .with("release", ["1998-11-19"])]
    .into_iter()
    .collect();
    let gold = GoldStandard::from_reader("a1,b1\n".as_bytes()).unwrap();

    let matcher = SimpleMatcher::new("title", LevenshteinSimilarity, 0.7);
    let outcome = MatchEngine::new(&NoBlocking, &matcher).run(&left, &right);
    let result = Scorer::new(gold).score(outcome);

    assert!(result.pairs.contains(&PairKey::new("a1", "b1")));
    assert_eq!(result.pairs.len(), 1);
    assert_eq!(result.precision, 1.0);
    assert_eq!(result.recall, 1.0);
    assert_eq!(result.f1, 1.0);
    assert_eq!(result.invocations, 1);
    assert_eq!(matcher.threshold(), 0.7);
}

#[test]
fn configured_run_writes_results_and_reports_scores() {
    let dir = TempDir::new().unwrap();
    let left = write(
        dir.path(),
        "dbpedia.csv",
        "id,title,release\n\
         a1,Half Life,1998-11-08\n\
         a2,Myst,1993-09-24\n\
         a3,Zork,1980-01-01\n",
    );
    let right = write(
        dir.path(),
        "giantbomb.csv",
        "id,title,release\n\
         b1,Half-Life,1998-11-19\n\
         b2,Myst,1993-09-24\n\
         b3,Unreal,1998-05-22\n",
    );
    let gold = write(dir.path(), "gold.csv", "a1,b1\nb2,a2\n");
    let output = dir.path().join("matched.txt");
    let config: RunConfig = serde_json::from_value(json!({
        "left": { "path": left },
        "right": { "path": right },
        "gold": gold,
        "output": output,
        "blocking": { "type": "titleInitial" },
        "matcher": {
            "type": "simple",
            "attribute": "title",
            "similarity": "levenshtein",
            "threshold": 0.7
        }
    }))
    .unwrap();

    let body = run_matching(&config).unwrap();
    assert_eq!(body["precision"], json!(1.0));
    assert_eq!(body["recall"], json!(1.0));
    assert_eq!(body["truePositives"], json!(2));
    assert_eq!(body["matched"], json!(2));
    assert_eq!(fs::read_to_string(&output).unwrap(), "a1,b1\na2,b2\n");
}

#[test]
fn duplicates_within_one_collection() {
    let dir = TempDir::new().unwrap();
    let left = write(
        dir.path(),
        "games.csv",
        "id,title\n\
         g1,The Witcher\n\
         g2,The Witcher.\n\
         g3,Myst\n",
    );
    let config: RunConfig = serde_json::from_value(json!({
        "left": { "path": left },
        "matcher": {
            "type": "simple",
            "attribute": "title",
            "similarity": "levenshtein",
            "threshold": 0.9
        }
    }))
    .unwrap();
    let body = run_matching(&config).unwrap();
    assert_eq!(body["matched"], json!(1));
    assert_eq!(body["invocations"], json!(3));
}

#[test]
fn same_file_on_both_sides_resolves_duplicates() {
    let dir = TempDir::new().unwrap();
    let games = write(
        dir.path(),
        "games.csv",
        "id,title\n\
         g1,The Witcher\n\
         g2,The Witcher.\n\
         g3,Myst\n",
    );
    let output = dir.path().join("matched.txt");
    let config: RunConfig = serde_json::from_value(json!({
        "left": { "path": games },
        "right": { "path": games },
        "output": output,
        "matcher": {
            "type": "simple",
            "attribute": "title",
            "similarity": "levenshtein",
            "threshold": 0.9
        }
    }))
    .unwrap();
    let body = run_matching(&config).unwrap();
    assert_eq!(body["matched"], json!(1));
    assert_eq!(body["invocations"], json!(3));
    assert_eq!(fs::read_to_string(&output).unwrap(), "g1,g2\n");
}

#[test]
fn listed_files_merge_with_later_records_winning() {
    let dir = TempDir::new().unwrap();
    let base = write(dir.path(), "base.csv", "id,title\na1,Half Life\na2,Zork\n");
    let patch = write(dir.path(), "patch.csv", "id,title\na2,Myst\n");
    let right = write(dir.path(), "b.csv", "id,title\nb1,Half-Life\nb2,Myst\n");
    let output = dir.path().join("matched.txt");
    let config: RunConfig = serde_json::from_value(json!({
        "left": { "paths": [base, patch] },
        "right": { "path": right },
        "output": output,
        "matcher": {
            "type": "simple",
            "attribute": "title",
            "similarity": "levenshtein",
            "threshold": 0.7
        }
    }))
    .unwrap();
    let body = run_matching(&config).unwrap();
    assert_eq!(body["matched"], json!(2));
    assert_eq!(body["invocations"], json!(4));
    assert_eq!(fs::read_to_string(&output).unwrap(), "a1,b1\na2,b2\n");
}

#[test]
fn input_without_files_is_a_configuration_error() {
    let config: RunConfig = serde_json::from_value(json!({
        "left": {},
        "matcher": {
            "type": "simple",
            "attribute": "title",
            "similarity": "levenshtein",
            "threshold": 0.7
        }
    }))
    .unwrap();
    assert_eq!(
        run_matching(&config).unwrap_err().status,
        Status::ConfigurationError
    );
}

#[test]
fn malformed_gold_file_aborts_the_run() {
    let dir = TempDir::new().unwrap();
    let left = write(dir.path(), "a.csv", "id,title\na1,Doom\n");
    let gold = write(dir.path(), "gold.csv", "a1,b1\na2;b2\n");
    let config: RunConfig = serde_json::from_value(json!({
        "left": { "path": left },
        "gold": gold,
        "matcher": {
            "type": "simple",
            "attribute": "title",
            "similarity": "levenshtein",
            "threshold": 0.7
        }
    }))
    .unwrap();
    let err = run_matching(&config).unwrap_err();
    assert_eq!(err.status, Status::ConfigurationError);
}

#[test]
fn missing_record_file_is_reported_not_found() {
    let config: RunConfig = serde_json::from_value(json!({
        "left": { "path": "/nowhere/a.csv" },
        "matcher": {
            "type": "simple",
            "attribute": "title",
            "similarity": "levenshtein",
            "threshold": 0.7
        }
    }))
    .unwrap();
    assert_eq!(run_matching(&config).unwrap_err().status, Status::NotFound);
}

#[test]
fn regression_export_writes_header_and_balanced_rows() {
    let dir = TempDir::new().unwrap();
    let left = write(
        dir.path(),
        "a.csv",
        "id,title,release\na1,Half Life,1998-11-08\na2,Myst,1993-09-24\na3,Zork,1980-01-01\n",
    );
    let right = write(
        dir.path(),
        "b.csv",
        "id,title,release\nb1,Half-Life,1998-11-19\nb2,Myst,1993-09-24\nb3,Doom,1993-12-10\n",
    );
    let gold = write(dir.path(), "gold.csv", "a1,b1\na2,b2\n");
    let output = dir.path().join("regression.csv");
    let config: RunConfig = serde_json::from_value(json!({
        "left": { "path": left },
        "right": { "path": right },
        "gold": gold,
        "regressionOutput": output,
        "matcher": {
            "type": "simple",
            "attribute": "title",
            "similarity": "levenshtein",
            "threshold": 0.7
        },
        "trainingMatchers": [
            { "type": "simple", "name": "title", "attribute": "title",
              "similarity": "levenshtein", "threshold": 0.7 },
            { "type": "simple", "name": "release", "attribute": "release",
              "similarity": "date", "threshold": 0.95 }
        ],
        "seed": 11
    }))
    .unwrap();

    let body = run_regression_export(&config).unwrap();
    assert_eq!(body["positives"], json!(2));
    assert_eq!(body["negatives"], json!(2));
    let text = fs::read_to_string(&output).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("title,release,score"));
    assert_eq!(lines.filter(|l| l.ends_with(",1.0")).count(), 2);
}
