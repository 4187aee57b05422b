use super::{AuditRun, CallAudit, RunConfig, StageAudit, StageOutcome};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const CURRENT_RUN_FILE: &str = "current-run.json";

/// Writes one JSON record per pipeline invocation under `<output_dir>/audit/`.
///
/// While a run is active its state is mirrored to `current-run.json`, so a
/// crashed invocation still leaves a record of how far it got.
pub struct AuditLogger {
    audit_dir: PathBuf,
    current_run: Option<AuditRun>,
    current_run_file: PathBuf,
}

impl AuditLogger {
    pub fn new(audit_dir: &Path) -> Self {
        let current_run_file = audit_dir.join(CURRENT_RUN_FILE);
        Self {
            audit_dir: audit_dir.to_path_buf(),
            current_run: None,
            current_run_file,
        }
    }

    pub fn start_run(&mut self, config: RunConfig) -> Result<()> {
        fs::create_dir_all(&self.audit_dir).with_context(|| {
            format!("Failed to create audit directory: {}", self.audit_dir.display())
        })?;
        self.current_run = Some(AuditRun::new(config));
        self.save_current()
    }

    /// Open a stage record on the current run.
    pub fn start_stage(&mut self, stage: &str) -> Result<()> {
        let run = self
            .current_run
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("start_stage called with no active run"))?;
        run.stages.push(StageAudit::new(stage));
        self.save_current()
    }

    pub fn record_call(&mut self, call: CallAudit) -> Result<()> {
        self.update_last_stage(|stage| stage.calls.push(call))
    }

    pub fn finish_stage(&mut self, outcome: StageOutcome) -> Result<()> {
        self.update_last_stage(|stage| stage.finish(outcome))
    }

    fn update_last_stage<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut StageAudit),
    {
        let run = self
            .current_run
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("stage update with no active run"))?;
        let stage = run
            .stages
            .last_mut()
            .ok_or_else(|| anyhow::anyhow!("stage update with no stages in run"))?;
        f(stage);
        self.save_current()
    }

    /// Close the run and write `audit/<timestamp>_<run-id>.json`.
    pub fn finish_run(&mut self) -> Result<PathBuf> {
        let run = self
            .current_run
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("No current run to finish"))?;

        run.finish();

        let filename = format!(
            "{}_{}.json",
            run.started_at.format("%Y-%m-%dT%H-%M-%S"),
            &run.run_id.to_string()[..8]
        );
        let run_file = self.audit_dir.join(&filename);

        let json = serde_json::to_string_pretty(&run).context("Failed to serialize audit run")?;
        fs::write(&run_file, json).context("Failed to write audit run file")?;

        if self.current_run_file.exists() {
            fs::remove_file(&self.current_run_file)
                .context("Failed to remove current-run.json after finishing run")?;
        }

        self.current_run = None;
        Ok(run_file)
    }

    fn save_current(&self) -> Result<()> {
        if let Some(ref run) = self.current_run {
            let json =
                serde_json::to_string_pretty(&run).context("Failed to serialize current run")?;
            fs::write(&self.current_run_file, json).context("Failed to write current run file")?;
        }
        Ok(())
    }

    pub fn current_run(&self) -> Option<&AuditRun> {
        self.current_run.as_ref()
    }

    /// Finished runs, most recent first.
    pub fn list_runs(&self) -> Result<Vec<PathBuf>> {
        if !self.audit_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs: Vec<PathBuf> = fs::read_dir(&self.audit_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
            .filter(|p| p.file_name().map(|n| n != CURRENT_RUN_FILE).unwrap_or(false))
            .collect();

        runs.sort();
        runs.reverse();
        Ok(runs)
    }

    pub fn load_run(&self, path: &Path) -> Result<AuditRun> {
        let content = fs::read_to_string(path).context("Failed to read audit run file")?;
        let run: AuditRun =
            serde_json::from_str(&content).context("Failed to parse audit run file")?;
        Ok(run)
    }
}
