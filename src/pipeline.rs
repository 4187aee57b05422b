//! End-to-end orchestration: planning, config extraction, analysis, coding
//! and the run script, each driven through a [`StageRunner`].
//!
//! Every stage opens the cost ledger fresh, so running stages in one process or
//! in separate invocations accumulates the same totals.

use anyhow::Result;
use std::path::PathBuf;

use crate::audit::{AuditLogger, RunConfig};
use crate::config::Config;
use crate::context::{CONFIG_SENTINEL, DoneFiles};
use crate::cost::{CostLedger, CostRecord, PriceTable};
use crate::errors::ConfigError;
use crate::gateway::{CompletionGateway, CompletionOptions};
use crate::paper::PaperDocument;
use crate::planning::{self, PlanInputs, PlanningRecord};
use crate::stage::{
    AnalysisStage, CodingStage, ReproduceStage, StageKind, StageOutcome, StageRunner, run_planning,
};
use crate::store::{ArtifactStore, PLANNING_TRAJECTORIES, REPO_CONFIG};

pub struct Pipeline<'g> {
    gateway: &'g dyn CompletionGateway,
    store: ArtifactStore,
    audit: AuditLogger,
    model: String,
    options: CompletionOptions,
    context_limit: usize,
    prices: PriceTable,
    show_progress: bool,
    verbose: bool,
}

impl<'g> Pipeline<'g> {
    /// Start an audited pipeline run rooted at `store`.
    pub fn new(
        gateway: &'g dyn CompletionGateway,
        store: ArtifactStore,
        model: &str,
        run: RunConfig,
    ) -> Result<Self> {
        store.ensure_directories()?;
        let mut audit = AuditLogger::new(&store.path("audit"));
        audit.start_run(run)?;
        Ok(Self {
            gateway,
            store,
            audit,
            model: model.to_string(),
            options: CompletionOptions::default(),
            context_limit: usize::MAX,
            prices: PriceTable::builtin(),
            show_progress: false,
            verbose: false,
        })
    }

    /// Pipeline configured from the command line and `papercoder.toml`.
    pub fn from_config(gateway: &'g dyn CompletionGateway, config: &Config) -> Result<Self> {
        let pipeline = Self::new(gateway, config.store(), &config.model, config.audit_config())?;
        Ok(Self {
            options: config.completion_options(),
            context_limit: config.settings.context_budget()?,
            prices: config.settings.price_table(),
            show_progress: console::Term::stderr().is_term(),
            verbose: config.verbose,
            ..pipeline
        })
    }

    pub fn with_context_limit(mut self, limit: usize) -> Self {
        self.context_limit = limit;
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    fn runner<'a>(&'a mut self, ledger: &'a mut CostLedger) -> StageRunner<'a> {
        StageRunner::new(
            self.gateway,
            &self.store,
            ledger,
            &mut self.audit,
            self.model.clone(),
        )
        .with_options(self.options.clone())
        .with_context_limit(self.context_limit)
        .with_progress(self.show_progress, self.verbose)
    }

    fn open_ledger(&self) -> Result<CostLedger> {
        CostLedger::open(self.store.output_dir(), self.prices.clone())
    }

    /// Four-turn planning conversation.
    pub async fn plan(&mut self, paper: &PaperDocument) -> Result<PlanningRecord> {
        let mut ledger = self.open_ledger()?;
        let record = run_planning(&mut self.runner(&mut ledger), paper).await?;
        Ok(record)
    }

    /// Lift `config.yaml` out of the planning conversation.
    pub fn extract_config(&self) -> Result<PathBuf> {
        planning::extract_config(&self.store)
    }

    /// Logic analysis for every task-list file. With `resume`, files whose
    /// analysis response already exists are skipped.
    pub async fn analyze(&mut self, paper: &PaperDocument, resume: bool) -> Result<StageOutcome> {
        let inputs = PlanInputs::load(&self.store)?;
        let (done, pending) = if resume {
            analysis_resume_point(&self.store, &inputs.tasks.files)?
        } else {
            (DoneFiles::new(), inputs.tasks.files.clone())
        };

        let mut ledger = self.open_ledger()?;
        let stage = AnalysisStage::new(paper, &inputs);
        let outcome = self.runner(&mut ledger).run(&stage, &pending, done).await?;
        Ok(outcome)
    }

    /// Code generation in task-list order. With `resume`, generation restarts
    /// at the first file without both a response and a repository file.
    pub async fn code(&mut self, resume: bool) -> Result<StageOutcome> {
        let inputs = PlanInputs::load(&self.store)?;
        let (done, pending) = if resume {
            coding_resume_point(&self.store, &inputs.tasks.files)?
        } else {
            (DoneFiles::new(), inputs.tasks.files.clone())
        };

        let mut ledger = self.open_ledger()?;
        let stage = CodingStage::new(&inputs.config_yaml);
        let outcome = self.runner(&mut ledger).run(&stage, &pending, done).await?;
        Ok(outcome)
    }

    /// The run script, written after every task-list file exists.
    pub async fn reproduce(&mut self) -> Result<StageOutcome> {
        let inputs = PlanInputs::load(&self.store)?;
        let done = completed_repository(&self.store, &inputs.tasks.files)?;

        let mut ledger = self.open_ledger()?;
        let stage = ReproduceStage::new(&inputs.config_yaml, &inputs.tasks.required_packages);
        let files = vec![ReproduceStage::SCRIPT.to_string()];
        let outcome = self.runner(&mut ledger).run(&stage, &files, done).await?;
        Ok(outcome)
    }

    /// Every stage in order. With `resume`, finished planning and config
    /// extraction are reused and per-file stages resume.
    pub async fn run_all(&mut self, paper: &PaperDocument, resume: bool) -> Result<CostRecord> {
        let mut cost = CostRecord::default();

        let planned = resume
            && self.store.exists(PLANNING_TRAJECTORIES)
            && planning::extract_planning(&self.store.path(PLANNING_TRAJECTORIES))
                .map(|record| record.config.is_some())
                .unwrap_or(false);
        if planned {
            tracing::info!("Reusing existing planning");
        } else {
            let before = self.open_ledger()?.total().clone();
            self.plan(paper).await?;
            cost = cost.merge(&ledger_delta(&before, self.open_ledger()?.total()));
        }

        if resume && self.store.read_repo_file(REPO_CONFIG)?.is_some() {
            tracing::info!("Reusing existing config.yaml");
        } else {
            self.extract_config()?;
        }

        cost = cost.merge(&self.analyze(paper, resume).await?.cost);
        cost = cost.merge(&self.code(resume).await?.cost);
        if !(resume && self.store.has_response(StageKind::Reproduce, ReproduceStage::SCRIPT)) {
            cost = cost.merge(&self.reproduce().await?.cost);
        }
        Ok(cost)
    }

    /// Close the audit run.
    pub fn finish(mut self) -> Result<PathBuf> {
        self.audit.finish_run()
    }
}

/// Usage added between two ledger snapshots.
pub fn ledger_delta(before: &CostRecord, after: &CostRecord) -> CostRecord {
    CostRecord {
        prompt_units: after.prompt_units.saturating_sub(before.prompt_units),
        completion_units: after.completion_units.saturating_sub(before.completion_units),
        cached_units: after.cached_units.saturating_sub(before.cached_units),
        monetary_cost: after.monetary_cost - before.monetary_cost,
        calls: after.calls.saturating_sub(before.calls),
    }
}

/// Analyses are independent: seed the ones that exist, run the rest.
pub fn analysis_resume_point(
    store: &ArtifactStore,
    files: &[String],
) -> Result<(DoneFiles, Vec<String>)> {
    let mut done = DoneFiles::new();
    let mut pending = Vec::new();
    for file in files.iter().filter(|f| *f != CONFIG_SENTINEL) {
        match store.load_analysis(file)? {
            Some(analysis) => done.push(file, analysis),
            None => pending.push(file.clone()),
        }
    }
    if done.files().len() > 1 {
        tracing::info!(
            done = done.files().len() - 1,
            pending = pending.len(),
            "Resuming analysis"
        );
    }
    Ok((done, pending))
}

/// Coding is order-dependent: everything before the first unfinished file is
/// seeded from the repository, everything from it on is regenerated, so no
/// prompt ever contains code for a file later in the task list.
pub fn coding_resume_point(
    store: &ArtifactStore,
    files: &[String],
) -> Result<(DoneFiles, Vec<String>)> {
    let mut done = DoneFiles::new();
    for (index, file) in files.iter().enumerate() {
        if file == CONFIG_SENTINEL {
            continue;
        }
        let code = store.read_repo_file(file)?;
        match code {
            Some(code) if store.has_response(StageKind::Coding, file) => done.push(file, code),
            _ => {
                tracing::info!(
                    done = done.files().len() - 1,
                    restart_at = %file,
                    "Resuming coding"
                );
                return Ok((done, files[index..].to_vec()));
            }
        }
    }
    Ok((done, Vec::new()))
}

/// Code for every task-list file, which must all exist.
pub fn completed_repository(store: &ArtifactStore, files: &[String]) -> Result<DoneFiles> {
    let mut done = DoneFiles::new();
    for file in files.iter().filter(|f| *f != CONFIG_SENTINEL) {
        let Some(code) = store.read_repo_file(file)? else {
            return Err(ConfigError::MissingArtifact {
                file: file.clone(),
                path: store.repo_path(file)?,
            }
            .into());
        };
        done.push(file, code);
    }
    Ok(done)
}
