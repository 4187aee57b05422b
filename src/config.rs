use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::audit;
use crate::gateway::CompletionOptions;
use crate::paper::{PaperDocument, PaperFormat};
use crate::settings::Settings;
use crate::store::ArtifactStore;

pub const DEFAULT_MODEL: &str = "o3-mini";

/// Runtime configuration for one invocation.
///
/// Bridges the command line with `papercoder.toml`: paths and model come from
/// flags, everything about the completion service from [`Settings`].
#[derive(Debug, Clone)]
pub struct Config {
    pub paper_name: String,
    pub model: String,
    pub paper_format: PaperFormat,
    pub pdf_json_path: Option<PathBuf>,
    pub pdf_latex_path: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub output_repo_dir: PathBuf,
    pub audit_dir: PathBuf,
    pub log_dir: PathBuf,
    pub resume: bool,
    pub verbose: bool,
    pub settings: Settings,
}

impl Config {
    /// Validate the paper format and derive run directories.
    ///
    /// The paper format is checked here, before any file is read or any
    /// completion is requested.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        paper_name: &str,
        model: &str,
        paper_format: &str,
        pdf_json_path: Option<PathBuf>,
        pdf_latex_path: Option<PathBuf>,
        output_dir: PathBuf,
        output_repo_dir: PathBuf,
        settings: Settings,
    ) -> Result<Self> {
        let paper_format: PaperFormat = paper_format.parse()?;
        let audit_dir = output_dir.join("audit");
        let log_dir = output_dir.join("logs");
        Ok(Self {
            paper_name: paper_name.to_string(),
            model: model.to_string(),
            paper_format,
            pdf_json_path,
            pdf_latex_path,
            output_dir,
            output_repo_dir,
            audit_dir,
            log_dir,
            resume: false,
            verbose: false,
            settings,
        })
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir).context("Failed to create output directory")?;
        std::fs::create_dir_all(&self.output_repo_dir)
            .context("Failed to create output repository directory")?;
        std::fs::create_dir_all(&self.audit_dir).context("Failed to create audit directory")?;
        std::fs::create_dir_all(&self.log_dir).context("Failed to create log directory")?;
        Ok(())
    }

    pub fn store(&self) -> ArtifactStore {
        ArtifactStore::new(&self.output_dir, &self.output_repo_dir)
    }

    pub fn load_paper(&self) -> Result<PaperDocument> {
        PaperDocument::load(
            self.paper_format,
            self.pdf_json_path.as_deref(),
            self.pdf_latex_path.as_deref(),
        )
    }

    pub fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            reasoning_effort: self.settings.reasoning_effort_for(&self.model),
        }
    }

    pub fn audit_config(&self) -> audit::RunConfig {
        audit::RunConfig {
            paper_name: self.paper_name.clone(),
            model: self.model.clone(),
            paper_format: self.paper_format.to_string(),
            output_dir: self.output_dir.clone(),
            output_repo_dir: self.output_repo_dir.clone(),
            resume: self.resume,
        }
    }
}
