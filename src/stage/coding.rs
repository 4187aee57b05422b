use std::path::PathBuf;

use super::{Stage, StageKind};
use crate::context::{self, DoneFiles};
use crate::errors::StageError;
use crate::prompts;
use crate::store::ArtifactStore;
use crate::util::extract_code_from_content;

/// Code generation for one repository file at a time. Each prompt carries the
/// code of every file completed before it.
pub struct CodingStage<'a> {
    config_yaml: &'a str,
}

impl<'a> CodingStage<'a> {
    pub fn new(config_yaml: &'a str) -> Self {
        Self { config_yaml }
    }
}

impl Stage for CodingStage<'_> {
    fn kind(&self) -> StageKind {
        StageKind::Coding
    }

    fn system_prompt(&self) -> String {
        prompts::CODING_SYSTEM.to_string()
    }

    fn instruction(
        &self,
        store: &ArtifactStore,
        file: &str,
        done: &DoneFiles,
    ) -> Result<String, StageError> {
        let analysis = match store.load_analysis(file)? {
            Some(analysis) => analysis,
            None => {
                tracing::warn!(file, "No logic analysis found; coding without one");
                String::new()
            }
        };
        Ok(context::coding_instruction(
            self.config_yaml,
            done,
            &analysis,
            file,
        ))
    }

    fn extract_payload(&self, content: &str) -> String {
        code_payload(content)
    }

    fn persist_payload(
        &self,
        store: &ArtifactStore,
        file: &str,
        _content: &str,
        payload: &str,
    ) -> Result<PathBuf, StageError> {
        Ok(store.write_repo_file(file, payload)?)
    }
}

/// The run script for the finished repository.
pub struct ReproduceStage<'a> {
    config_yaml: &'a str,
    required_packages: &'a [String],
}

impl<'a> ReproduceStage<'a> {
    pub const SCRIPT: &'static str = "reproduce.sh";

    pub fn new(config_yaml: &'a str, required_packages: &'a [String]) -> Self {
        Self {
            config_yaml,
            required_packages,
        }
    }
}

impl Stage for ReproduceStage<'_> {
    fn kind(&self) -> StageKind {
        StageKind::Reproduce
    }

    fn system_prompt(&self) -> String {
        prompts::REPRODUCE_SYSTEM.to_string()
    }

    fn instruction(
        &self,
        _store: &ArtifactStore,
        file: &str,
        done: &DoneFiles,
    ) -> Result<String, StageError> {
        Ok(context::reproduce_instruction(
            self.config_yaml,
            done,
            self.required_packages,
            file,
        ))
    }

    fn extract_payload(&self, content: &str) -> String {
        code_payload(content)
    }

    fn persist_payload(
        &self,
        store: &ArtifactStore,
        file: &str,
        _content: &str,
        payload: &str,
    ) -> Result<PathBuf, StageError> {
        Ok(store.write_repo_file(file, payload)?)
    }
}

/// Fenced code when present, otherwise the whole response.
fn code_payload(content: &str) -> String {
    match extract_code_from_content(content) {
        Some(code) => code,
        None => {
            tracing::warn!("Response has no fenced code block; keeping the full text");
            content.to_string()
        }
    }
}
