//! Test doubles shared by unit tests across the crate.

use async_trait::async_trait;
use std::sync::Mutex;
use tempfile::TempDir;

use crate::audit::{AuditLogger, RunConfig};
use crate::cost::{CostLedger, PriceTable};
use crate::errors::GatewayError;
use crate::gateway::{
    ChatMessage, CompletionGateway, CompletionOptions, CompletionRecord, RawCompletion, Usage,
};
use crate::stage::StageRunner;
use crate::store::ArtifactStore;
use crate::util::fence_language;

type Responder = Box<dyn Fn(&[ChatMessage]) -> RawCompletion + Send + Sync>;

/// Gateway that answers from a closure and records every request.
pub struct ScriptedGateway {
    responder: Responder,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
    fail_after: Option<usize>,
}

impl ScriptedGateway {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&[ChatMessage]) -> RawCompletion + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
            fail_after: None,
        }
    }

    /// Answers analysis requests with prose and coding requests with a fenced
    /// block naming the requested file.
    pub fn echo_files() -> Self {
        Self::new(|messages| {
            let text = echo_reply(messages).unwrap_or_else(|| "Nothing requested.".to_string());
            RawCompletion::Record(CompletionRecord::from_text(
                text,
                Some(Usage::new(1_000, 200)),
            ))
        })
    }

    /// Echoes for `n` calls, then fails with an API error.
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::echo_files()
        }
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionGateway for ScriptedGateway {
    async fn complete(
        &self,
        _model: &str,
        messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> Result<RawCompletion, GatewayError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(messages.to_vec());
            calls.len() - 1
        };
        if let Some(limit) = self.fail_after
            && index >= limit
        {
            return Err(GatewayError::Api {
                status: 500,
                message: "scripted failure".to_string(),
            });
        }
        Ok((self.responder)(messages))
    }
}

/// The reply [`ScriptedGateway::echo_files`] gives, keyed on the final
/// heading of the last user turn.
pub fn echo_reply(messages: &[ChatMessage]) -> Option<String> {
    let last = messages.last()?.content.lines().last()?;
    if let Some(file) = last.strip_prefix("## Code: ") {
        return Some(generated_reply(file.trim()));
    }
    last.strip_prefix("## Logic Analysis: ")
        .map(|file| format!("Logic analysis for {}.", file.trim()))
}

/// The reply [`ScriptedGateway::echo_files`] gives for `file`.
pub fn generated_reply(file: &str) -> String {
    format!(
        "Here it is.\n```{}\n# generated {file}\n```",
        fence_language(file)
    )
}

/// Temporary output/repo directories with an open ledger and audit run.
pub struct TestRun {
    pub store: ArtifactStore,
    pub ledger: CostLedger,
    pub audit: AuditLogger,
    _dir: TempDir,
}

impl TestRun {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("out"), dir.path().join("repo"));
        store.ensure_directories().unwrap();
        let ledger = CostLedger::open(store.output_dir(), PriceTable::builtin()).unwrap();
        let mut audit = AuditLogger::new(&store.path("audit"));
        audit.start_run(test_run_config(&store)).unwrap();
        Self {
            store,
            ledger,
            audit,
            _dir: dir,
        }
    }

    pub fn runner<'a>(&'a mut self, gateway: &'a dyn CompletionGateway) -> StageRunner<'a> {
        StageRunner::new(gateway, &self.store, &mut self.ledger, &mut self.audit, "o3-mini")
    }
}

pub fn test_run_config(store: &ArtifactStore) -> RunConfig {
    RunConfig {
        paper_name: "Test".to_string(),
        model: "o3-mini".to_string(),
        paper_format: "JSON".to_string(),
        output_dir: store.output_dir().to_path_buf(),
        output_repo_dir: store.repo_dir().to_path_buf(),
        resume: false,
    }
}
