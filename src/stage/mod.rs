//! Stage Runner: drives one stage over an ordered work list.
//!
//! A stage differs from another only in its prompts and in what it keeps from
//! each response; both are behind [`Stage`]. The runner owns everything
//! shared: context budgeting, the completion call, response normalization,
//! persistence, cost accounting and audit records. Any error aborts the stage
//! at the file that raised it; files before it keep their artifacts.

pub mod analysis;
pub mod coding;
pub mod planning;

use chrono::Utc;
use std::path::PathBuf;
use std::time::Instant;

use crate::audit::{AuditLogger, CallAudit, StageOutcome as AuditOutcome};
use crate::context::{CONFIG_SENTINEL, DoneFiles, ensure_within_budget};
use crate::cost::{CostLedger, CostRecord};
use crate::errors::StageError;
use crate::gateway::{
    ChatMessage, CompletionGateway, CompletionOptions, CompletionRecord, normalize,
};
use crate::store::{ArtifactNames, ArtifactStore};
use crate::trajectory::Trajectory;
use crate::ui::StageProgress;

pub use analysis::AnalysisStage;
pub use coding::{CodingStage, ReproduceStage};
pub use planning::run_planning;

/// The stages that produce artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Planning,
    Analysis,
    Coding,
    Reproduce,
}

impl StageKind {
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Planning => "planning",
            StageKind::Analysis => "analysis",
            StageKind::Coding => "coding",
            StageKind::Reproduce => "reproduce",
        }
    }

    /// Progress label for one file, e.g. `[ANALYSIS] model.py`.
    pub fn label(&self, file: &str) -> String {
        format!("[{}] {}", self.name().to_uppercase(), file)
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What varies between per-file stages.
pub trait Stage {
    fn kind(&self) -> StageKind;

    fn system_prompt(&self) -> String;

    /// User turn for `file`, given the files completed earlier in this stage.
    fn instruction(
        &self,
        store: &ArtifactStore,
        file: &str,
        done: &DoneFiles,
    ) -> Result<String, StageError>;

    /// What to keep from the response text.
    fn extract_payload(&self, content: &str) -> String;

    /// Persist the payload where later stages look for it. Returns the path
    /// written.
    fn persist_payload(
        &self,
        store: &ArtifactStore,
        file: &str,
        content: &str,
        payload: &str,
    ) -> Result<PathBuf, StageError>;
}

/// Result of one stage invocation.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    /// Everything completed, seeded entries included, in task-list order.
    pub done: DoneFiles,
    /// Files completed by this invocation.
    pub completed: Vec<String>,
    /// Usage and cost of this invocation only.
    pub cost: CostRecord,
}

/// Shared machinery for running completion calls on behalf of a stage.
pub struct StageRunner<'a> {
    gateway: &'a dyn CompletionGateway,
    store: &'a ArtifactStore,
    ledger: &'a mut CostLedger,
    audit: &'a mut AuditLogger,
    model: String,
    options: CompletionOptions,
    context_limit: usize,
    verbose: bool,
    show_progress: bool,
}

impl<'a> StageRunner<'a> {
    pub fn new(
        gateway: &'a dyn CompletionGateway,
        store: &'a ArtifactStore,
        ledger: &'a mut CostLedger,
        audit: &'a mut AuditLogger,
        model: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            store,
            ledger,
            audit,
            model: model.into(),
            options: CompletionOptions::default(),
            context_limit: usize::MAX,
            verbose: false,
            show_progress: false,
        }
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_context_limit(mut self, limit: usize) -> Self {
        self.context_limit = limit;
        self
    }

    pub fn with_progress(mut self, show: bool, verbose: bool) -> Self {
        self.show_progress = show;
        self.verbose = verbose;
        self
    }

    pub fn store(&self) -> &'a ArtifactStore {
        self.store
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Open the audit record and progress bar for a stage of `total` items.
    pub(crate) fn begin(
        &mut self,
        kind: StageKind,
        total: usize,
    ) -> Result<StageProgress, StageError> {
        self.audit.start_stage(kind.name())?;
        Ok(if self.show_progress {
            StageProgress::new(kind.name(), total as u64, self.verbose)
        } else {
            StageProgress::hidden()
        })
    }

    /// Record a stage aborted at `file`.
    pub(crate) fn abort(
        &mut self,
        kind: StageKind,
        progress: &StageProgress,
        file: &str,
        error: &StageError,
    ) -> Result<(), StageError> {
        progress.fail(&kind.label(file), &error.to_string());
        tracing::error!(stage = %kind, file, error = %error, "Stage aborted");
        self.audit.finish_stage(AuditOutcome::Failed {
            file: Some(file.to_string()),
            message: error.to_string(),
        })?;
        Ok(())
    }

    /// Persist the ledger and close the stage's audit record.
    pub(crate) fn finish(
        &mut self,
        kind: StageKind,
        progress: &StageProgress,
        completed: usize,
        cost: &CostRecord,
    ) -> Result<(), StageError> {
        self.ledger.save()?;
        self.audit
            .finish_stage(AuditOutcome::Completed { files: completed })?;
        progress.finish(completed, self.ledger.total());
        tracing::info!(
            stage = %kind,
            files = completed,
            cost = %format!("${:.4}", cost.monetary_cost),
            total = %format!("${:.4}", self.ledger.total().monetary_cost),
            "Stage complete"
        );
        Ok(())
    }

    /// Run `stage` over `files` in order. `done` carries files completed
    /// before this invocation (always at least the config sentinel).
    pub async fn run<S: Stage + ?Sized>(
        &mut self,
        stage: &S,
        files: &[String],
        mut done: DoneFiles,
    ) -> Result<StageOutcome, StageError> {
        let kind = stage.kind();
        let progress = self.begin(kind, files.len())?;
        let mut completed = Vec::new();
        let mut cost = CostRecord::default();

        for file in files {
            let label = kind.label(file);
            if file == CONFIG_SENTINEL {
                progress.skip_file(&label);
                continue;
            }
            progress.start_file(&label);

            match self.run_file(stage, file, &done).await {
                Ok((payload, written, increment)) => {
                    progress.file_done(&label, &written.display().to_string(), &increment);
                    done.push(file, payload);
                    completed.push(file.clone());
                    cost = cost.merge(&increment);
                }
                Err(e) => {
                    self.abort(kind, &progress, file, &e)?;
                    return Err(e);
                }
            }
        }

        self.finish(kind, &progress, completed.len(), &cost)?;
        Ok(StageOutcome {
            done,
            completed,
            cost,
        })
    }

    async fn run_file<S: Stage + ?Sized>(
        &mut self,
        stage: &S,
        file: &str,
        done: &DoneFiles,
    ) -> Result<(String, PathBuf, CostRecord), StageError> {
        let kind = stage.kind();
        let mut trajectory = Trajectory::with_system(stage.system_prompt());
        trajectory.push(ChatMessage::user(
            stage.instruction(self.store, file, done)?,
        ));

        let (record, increment) = self.complete(kind, file, &trajectory).await?;
        let content = record.content()?.to_string();
        trajectory.push(record.to_chat_message()?);

        let payload = stage.extract_payload(&content);
        let names = ArtifactNames::for_file(kind, file);
        self.store.write_text(&names.transcript, &content)?;
        let written = stage.persist_payload(self.store, file, &content, &payload)?;
        self.store.write_json(&names.response, &vec![&record])?;
        trajectory.save(self.store, &names.trajectory)?;

        Ok((payload, written, increment))
    }

    /// One budgeted, normalized, costed and audited completion call.
    pub async fn complete(
        &mut self,
        kind: StageKind,
        file: &str,
        trajectory: &Trajectory,
    ) -> Result<(CompletionRecord, CostRecord), StageError> {
        let messages = trajectory.messages();
        let prompt_chars = ensure_within_budget(file, messages, self.context_limit)?;

        let started_at = Utc::now();
        let start = Instant::now();
        tracing::debug!(stage = %kind, file, prompt_chars, model = %self.model, "Sending completion");
        let raw = self
            .gateway
            .complete(&self.model, messages, &self.options)
            .await
            .map_err(|source| StageError::Gateway {
                file: file.to_string(),
                source,
            })?;
        tracing::debug!(shape = raw.shape(), "Received completion");
        let record = normalize(raw)?;

        let increment = self.ledger.record(&record, &self.model, kind.name())?;
        let response_chars = record.content().map(|c| c.chars().count()).unwrap_or(0);
        self.audit.record_call(CallAudit {
            file: file.to_string(),
            started_at,
            duration_secs: start.elapsed().as_secs_f64(),
            prompt_chars,
            response_chars,
            cost: increment.clone(),
        })?;

        Ok((record, increment))
    }
}
