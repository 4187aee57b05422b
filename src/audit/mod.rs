use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::cost::CostRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub config: RunConfig,
    pub stages: Vec<StageAudit>,
}

impl AuditRun {
    pub fn new(config: RunConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            ended_at: None,
            config,
            stages: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    pub fn total_calls(&self) -> usize {
        self.stages.iter().map(|s| s.calls.len()).sum()
    }
}

/// The invocation an audit run describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub paper_name: String,
    pub model: String,
    pub paper_format: String,
    pub output_dir: PathBuf,
    pub output_repo_dir: PathBuf,
    pub resume: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageAudit {
    pub stage: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub calls: Vec<CallAudit>,
    pub outcome: StageOutcome,
}

impl StageAudit {
    pub fn new(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            started_at: Utc::now(),
            ended_at: None,
            calls: Vec::new(),
            outcome: StageOutcome::InProgress,
        }
    }

    pub fn finish(&mut self, outcome: StageOutcome) {
        self.ended_at = Some(Utc::now());
        self.outcome = outcome;
    }
}

/// One completion call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallAudit {
    pub file: String,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub prompt_chars: usize,
    pub response_chars: usize,
    pub cost: CostRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StageOutcome {
    InProgress,
    Completed { files: usize },
    Failed { file: Option<String>, message: String },
}

pub mod logger;
pub use logger::AuditLogger;
