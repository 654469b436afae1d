use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, bail, Context, Result};
use log::{info, warn};

use crate::data::classify::{classify, classify_analyte};
use crate::data::loader::load_export_file;
use crate::data::model::{ParsedExport, PeakInfo, RegressionHeaderInfo};
use crate::regression::{
    Regression, RegressionData, RegressionType, SampleKind, WeightingFactor,
};
use crate::storage::{AnalyticalRun, RunStore};

// ---------------------------------------------------------------------------
// Background import
// ---------------------------------------------------------------------------

/// A parsed and classified export, ready to become a run.
#[derive(Debug, Clone)]
pub struct ImportedRun {
    pub source: PathBuf,
    pub parsed: ParsedExport,
    pub data: RegressionData,
}

/// Reads, parses and classifies one export on a worker thread.
///
/// The worker delivers exactly one result: the whole import or the first
/// error. Nothing is observable before it finishes.
pub struct ImportJob {
    rx: Receiver<Result<ImportedRun>>,
    handle: Option<JoinHandle<()>>,
}

impl ImportJob {
    pub fn spawn(path: PathBuf, analyte: Option<String>) -> Self {
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            let result = load_export_file(&path).map(|parsed| {
                let data = match &analyte {
                    Some(name) => classify_analyte(&parsed.rows, name),
                    None => classify(&parsed.rows),
                };
                ImportedRun {
                    source: path,
                    parsed,
                    data,
                }
            });
            // The receiver may have been dropped; nothing to report to.
            let _ = tx.send(result);
        });
        Self {
            rx,
            handle: Some(handle),
        }
    }

    /// Non-blocking: `None` while the worker is still running.
    pub fn try_take(&mut self) -> Option<Result<ImportedRun>> {
        match self.rx.try_recv() {
            Ok(result) => {
                self.join();
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.join();
                Some(Err(anyhow!("import worker stopped without a result")))
            }
        }
    }

    /// Block until the worker finishes.
    pub fn wait(mut self) -> Result<ImportedRun> {
        let result = self
            .rx
            .recv()
            .map_err(|_| anyhow!("import worker stopped without a result"))?;
        self.join();
        result
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Import worker panicked");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RunSession – one open analytical run
// ---------------------------------------------------------------------------

/// Owner of one open run. Every mutation goes through `&mut self`, so a
/// recompute always completes before the next change is accepted.
pub struct RunSession {
    pub project_id: String,
    pub run_id: String,
    regression: Option<Regression>,
    peaks: Vec<PeakInfo>,
    declared: Option<RegressionHeaderInfo>,
    pending: Option<ImportJob>,
    /// Last error or import notice shown to the user.
    pub status_message: Option<String>,
}

impl RunSession {
    pub fn new(project_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            run_id: run_id.into(),
            regression: None,
            peaks: Vec::new(),
            declared: None,
            pending: None,
            status_message: None,
        }
    }

    /// Open a stored run and refit it.
    pub fn open(store: &dyn RunStore, project_id: &str, run_id: &str) -> Result<Self> {
        let run = store
            .load_run(project_id, run_id)
            .with_context(|| format!("opening run {project_id}/{run_id}"))?;
        let mut session = Self::new(project_id, run_id);
        session.peaks = run.peaks;
        session.declared = run.declared;

        let mut regression = Regression::new(run.data, run.weighting_factor);
        if let Err(e) = regression.update() {
            warn!("Stored run {project_id}/{run_id} does not fit: {e}");
            session.status_message = Some(format!("Error: {e}"));
        }
        session.regression = Some(regression);
        Ok(session)
    }

    pub fn regression(&self) -> Option<&Regression> {
        self.regression.as_ref()
    }

    pub fn peaks(&self) -> &[PeakInfo] {
        &self.peaks
    }

    pub fn declared(&self) -> Option<&RegressionHeaderInfo> {
        self.declared.as_ref()
    }

    /// Whether an import is in progress.
    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Start importing an export in the background.
    pub fn start_import(&mut self, path: PathBuf, analyte: Option<String>) -> Result<()> {
        if self.is_loading() {
            bail!("an import is already in progress");
        }
        info!("Importing {}", path.display());
        self.pending = Some(ImportJob::spawn(path, analyte));
        Ok(())
    }

    /// Collect a finished import, if any. `weighting` overrides the factor
    /// declared in the export.
    pub fn poll_import(&mut self, weighting: Option<WeightingFactor>) -> Option<Result<()>> {
        let result = self.pending.as_mut()?.try_take()?;
        self.pending = None;
        Some(self.finish(result, weighting))
    }

    /// Block until the running import completes.
    pub fn wait_import(&mut self, weighting: Option<WeightingFactor>) -> Result<()> {
        let job = self
            .pending
            .take()
            .context("no import in progress")?;
        let result = job.wait();
        self.finish(result, weighting)
    }

    fn finish(
        &mut self,
        result: Result<ImportedRun>,
        weighting: Option<WeightingFactor>,
    ) -> Result<()> {
        match result {
            Ok(imported) => self.set_import(imported, weighting),
            Err(e) => {
                // The previous run, if any, stays as it was.
                self.status_message = Some(format!("Error: {e:#}"));
                Err(e)
            }
        }
    }

    /// Replace the session's run with a freshly imported one and fit it.
    ///
    /// The data is kept even if the fit fails, so points can be toggled
    /// and refitted.
    pub fn set_import(
        &mut self,
        imported: ImportedRun,
        weighting: Option<WeightingFactor>,
    ) -> Result<()> {
        let weighting = weighting.unwrap_or(imported.parsed.header.weighting_factor);
        info!(
            "Imported {} point(s) from {}",
            imported.data.len(),
            imported.source.display()
        );
        // Only linear calibrations are fitted; a declared quadratic is noted.
        let notice = (imported.parsed.header.regression_type == RegressionType::Quadratic)
            .then(|| {
                warn!(
                    "{} declares a quadratic regression; fitting a linear one",
                    imported.source.display()
                );
                "Note: export declares Quadratic regression, fitted as Linear".to_string()
            });
        self.peaks = imported.parsed.peaks;
        self.declared = Some(imported.parsed.header);

        let mut regression = Regression::new(imported.data, weighting);
        let fitted = regression.update();
        self.regression = Some(regression);
        match fitted {
            Ok(()) => {
                self.status_message = notice;
                Ok(())
            }
            Err(e) => {
                self.status_message = Some(format!("Error: {e}"));
                Err(e).context("fitting imported run")
            }
        }
    }

    fn regression_mut(&mut self) -> Result<&mut Regression> {
        if self.is_loading() {
            bail!("an import is in progress");
        }
        self.regression.as_mut().context("no run loaded")
    }

    /// Include or exclude a point, then refit.
    ///
    /// If the refit fails the flag is restored, so the data stays
    /// consistent with the fit still on display.
    pub fn set_point_active(&mut self, kind: SampleKind, index: usize, active: bool) -> Result<()> {
        let regression = self.regression_mut()?;
        let previous = regression
            .data()
            .points(kind)
            .get(index)
            .map(|p| p.is_active);
        regression.set_active(kind, index, active)?;

        if let Err(e) = regression.update() {
            if let Some(previous) = previous {
                regression.set_active(kind, index, previous)?;
            }
            self.status_message = Some(format!("Error: {e}"));
            return Err(e).context("refitting after point toggle");
        }
        self.status_message = None;
        Ok(())
    }

    /// Change the weighting factor, then refit. Restored on failure.
    pub fn set_weighting_factor(&mut self, weighting: WeightingFactor) -> Result<()> {
        let regression = self.regression_mut()?;
        let previous = regression.weighting_factor();
        regression.set_weighting_factor(weighting);
        if let Err(e) = regression.update() {
            regression.set_weighting_factor(previous);
            self.status_message = Some(format!("Error: {e}"));
            return Err(e).context("refitting with new weighting");
        }
        self.status_message = None;
        Ok(())
    }

    /// Snapshot of the run for persistence.
    pub fn to_run(&self) -> Result<AnalyticalRun> {
        let regression = self.regression.as_ref().context("no run loaded")?;
        let mut run = AnalyticalRun::new(
            self.project_id.clone(),
            self.run_id.clone(),
            regression.weighting_factor(),
            regression.data().clone(),
        );
        run.peaks = self.peaks.clone();
        run.declared = self.declared.clone();
        Ok(run)
    }

    pub fn save(&self, store: &mut dyn RunStore) -> Result<()> {
        let run = self.to_run()?;
        store
            .save(&run)
            .with_context(|| format!("saving run {}/{}", self.project_id, self.run_id))
    }
}
