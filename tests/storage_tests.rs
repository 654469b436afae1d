//! JSON run store on disk.

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use rusty_quant::regression::{Regression, RegressionData, RegressionPoint, WeightingFactor};
use rusty_quant::storage::{AnalyticalRun, JsonRunStore, RunStore};
use rusty_quant::StorageError;

fn fitted_run(project: &str, run: &str) -> AnalyticalRun {
    let mut data = RegressionData::new();
    data.push(RegressionPoint::standard("Cal 1", 0.1, 12.36));
    data.push(RegressionPoint::standard("Cal 2", 0.2, 24.83));
    data.push(RegressionPoint::standard("Cal 3", 0.3, 35.91));
    data.push(RegressionPoint::quality_control("QC Mid", 0.25, 30.0));
    data.push(RegressionPoint::unknown("Subject 01", 20.0));
    data.standards[2].is_active = false;

    let mut regression = Regression::new(data, WeightingFactor::OneOverX);
    regression.update().unwrap();
    AnalyticalRun::new(project, run, WeightingFactor::OneOverX, regression.into_data())
}

#[test]
fn saved_run_loads_back_unchanged() {
    let dir = TempDir::new().unwrap();
    let mut store = JsonRunStore::new(dir.path());
    let run = fitted_run("study-7", "batch-01");

    store.save(&run).unwrap();
    assert!(dir.path().join("study-7").join("batch-01.json").is_file());

    let loaded = store.load_run("study-7", "batch-01").unwrap();
    assert_eq!(loaded, run);
    assert!(!loaded.data.standards[2].is_active);
    assert_eq!(store.load("study-7", "batch-01").unwrap(), run.data);
}

#[test]
fn saving_again_overwrites() {
    let dir = TempDir::new().unwrap();
    let mut store = JsonRunStore::new(dir.path());
    let mut run = fitted_run("p", "r");
    store.save(&run).unwrap();

    run.data.standards[2].is_active = true;
    store.save(&run).unwrap();
    assert!(store.load("p", "r").unwrap().standards[2].is_active);
    assert_eq!(store.list_runs("p").unwrap(), ["r"]);
}

#[test]
fn missing_run_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = JsonRunStore::new(dir.path());
    match store.load("p", "nope") {
        Err(StorageError::NotFound { project_id, run_id }) => {
            assert_eq!(project_id, "p");
            assert_eq!(run_id, "nope");
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn list_runs_is_sorted_and_per_project() {
    let dir = TempDir::new().unwrap();
    let mut store = JsonRunStore::new(dir.path());
    for (project, run) in [("a", "r3"), ("a", "r1"), ("b", "r2"), ("a", "r2")] {
        store.save(&fitted_run(project, run)).unwrap();
    }
    assert_eq!(store.list_runs("a").unwrap(), ["r1", "r2", "r3"]);
    assert_eq!(store.list_runs("b").unwrap(), ["r2"]);
    assert!(store.list_runs("c").unwrap().is_empty());
}

#[test]
fn path_like_ids_are_rejected() {
    let dir = TempDir::new().unwrap();
    let mut store = JsonRunStore::new(dir.path());
    let run = fitted_run("../outside", "r");
    assert!(matches!(store.save(&run), Err(StorageError::InvalidId(_))));
    assert!(matches!(store.load("p", "a/b"), Err(StorageError::InvalidId(_))));
}

#[test]
fn corrupt_document_is_a_serialization_error() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("p")).unwrap();
    std::fs::write(dir.path().join("p").join("r.json"), "{ not json").unwrap();
    let store = JsonRunStore::new(dir.path());
    assert!(matches!(store.load("p", "r"), Err(StorageError::Serialization(_))));
}

#[test]
fn document_layout() {
    let dir = TempDir::new().unwrap();
    let mut store = JsonRunStore::new(dir.path());
    store.save(&fitted_run("p", "r")).unwrap();

    let text = std::fs::read_to_string(dir.path().join("p").join("r.json")).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();

    assert_eq!(doc["project_id"], "p");
    assert_eq!(doc["weighting_factor"], "one_over_x");
    assert_eq!(doc["data"]["standards"].as_array().unwrap().len(), 3);
    let qc = &doc["data"]["quality_controls"][0];
    assert_eq!(qc["kind"], "quality_control");
    assert_eq!(qc["nominal_concentration"], 0.25);
    assert!(qc["accuracy"].is_f64());
    assert!(doc["data"]["unknowns"][0]["nominal_concentration"].is_null());
    assert!(doc["saved_at"].is_string());
}
