//! Persistence of analytical runs, addressed by project and run id.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::data::model::{PeakInfo, RegressionHeaderInfo};
use crate::error::StorageError;
use crate::regression::{RegressionData, WeightingFactor};

// ---------------------------------------------------------------------------
// AnalyticalRun – the persisted document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticalRun {
    pub project_id: String,
    pub run_id: String,
    pub weighting_factor: WeightingFactor,
    #[serde(default)]
    pub peaks: Vec<PeakInfo>,
    /// Regression parameters declared by the export, if the run came from one.
    #[serde(default)]
    pub declared: Option<RegressionHeaderInfo>,
    pub data: RegressionData,
    pub saved_at: DateTime<Utc>,
}

impl AnalyticalRun {
    pub fn new(
        project_id: impl Into<String>,
        run_id: impl Into<String>,
        weighting_factor: WeightingFactor,
        data: RegressionData,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            run_id: run_id.into(),
            weighting_factor,
            peaks: Vec::new(),
            declared: None,
            data,
            saved_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// RunStore
// ---------------------------------------------------------------------------

pub trait RunStore {
    fn load_run(&self, project_id: &str, run_id: &str) -> Result<AnalyticalRun, StorageError>;

    fn save(&mut self, run: &AnalyticalRun) -> Result<(), StorageError>;

    /// Run ids stored under a project, sorted.
    fn list_runs(&self, project_id: &str) -> Result<Vec<String>, StorageError>;

    /// The classified samples of a stored run.
    fn load(&self, project_id: &str, run_id: &str) -> Result<RegressionData, StorageError> {
        Ok(self.load_run(project_id, run_id)?.data)
    }
}

/// Ids become path components, so they must be plain names.
fn validate_id(id: &str) -> Result<(), StorageError> {
    let bad = id.is_empty()
        || id == "."
        || id == ".."
        || id.contains(['/', '\\'])
        || id.chars().any(char::is_control);
    if bad {
        return Err(StorageError::InvalidId(id.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// JsonRunStore – <root>/<project_id>/<run_id>.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct JsonRunStore {
    root: PathBuf,
}

impl JsonRunStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run_path(&self, project_id: &str, run_id: &str) -> Result<PathBuf, StorageError> {
        validate_id(project_id)?;
        validate_id(run_id)?;
        Ok(self.root.join(project_id).join(format!("{run_id}.json")))
    }
}

impl RunStore for JsonRunStore {
    fn load_run(&self, project_id: &str, run_id: &str) -> Result<AnalyticalRun, StorageError> {
        let path = self.run_path(project_id, run_id)?;
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound {
                    project_id: project_id.to_string(),
                    run_id: run_id.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        debug!("Loaded run document {}", path.display());
        Ok(serde_json::from_str(&text)?)
    }

    fn save(&mut self, run: &AnalyticalRun) -> Result<(), StorageError> {
        let path = self.run_path(&run.project_id, &run.run_id)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        // Write beside the target and rename so a failed save never leaves
        // a truncated document behind.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(run)?)?;
        fs::rename(&tmp, &path)?;
        info!(
            "Saved run {}/{} ({} points) to {}",
            run.project_id,
            run.run_id,
            run.data.len(),
            path.display()
        );
        Ok(())
    }

    fn list_runs(&self, project_id: &str) -> Result<Vec<String>, StorageError> {
        validate_id(project_id)?;
        let dir = self.root.join(project_id);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut runs = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    runs.push(stem.to_string());
                }
            }
        }
        runs.sort();
        Ok(runs)
    }
}

// ---------------------------------------------------------------------------
// MemoryRunStore
// ---------------------------------------------------------------------------

/// In-process store, used by tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryRunStore {
    runs: HashMap<(String, String), AnalyticalRun>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunStore for MemoryRunStore {
    fn load_run(&self, project_id: &str, run_id: &str) -> Result<AnalyticalRun, StorageError> {
        self.runs
            .get(&(project_id.to_string(), run_id.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                project_id: project_id.to_string(),
                run_id: run_id.to_string(),
            })
    }

    fn save(&mut self, run: &AnalyticalRun) -> Result<(), StorageError> {
        validate_id(&run.project_id)?;
        validate_id(&run.run_id)?;
        self.runs.insert(
            (run.project_id.clone(), run.run_id.clone()),
            run.clone(),
        );
        Ok(())
    }

    fn list_runs(&self, project_id: &str) -> Result<Vec<String>, StorageError> {
        let mut runs: Vec<String> = self
            .runs
            .keys()
            .filter(|(p, _)| p == project_id)
            .map(|(_, r)| r.clone())
            .collect();
        runs.sort();
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regression::RegressionPoint;

    fn run(project: &str, id: &str) -> AnalyticalRun {
        let mut data = RegressionData::new();
        data.push(RegressionPoint::standard("Cal 1", 0.1, 12.36));
        data.push(RegressionPoint::unknown("U1", 20.0));
        AnalyticalRun::new(project, id, WeightingFactor::OneOverX, data)
    }

    #[test]
    fn ids_must_be_plain_names() {
        assert!(validate_id("batch-01").is_ok());
        for bad in ["", "..", "a/b", "a\\b"] {
            assert!(matches!(validate_id(bad), Err(StorageError::InvalidId(_))), "{bad}");
        }
    }

    #[test]
    fn memory_store_round_trip() {
        let mut store = MemoryRunStore::new();
        store.save(&run("p1", "r2")).unwrap();
        store.save(&run("p1", "r1")).unwrap();
        store.save(&run("p2", "r9")).unwrap();

        assert_eq!(store.list_runs("p1").unwrap(), ["r1", "r2"]);
        let data = store.load("p1", "r1").unwrap();
        assert_eq!(data.standards.len(), 1);
        assert!(matches!(
            store.load("p1", "missing"),
            Err(StorageError::NotFound { .. })
        ));
    }
}
