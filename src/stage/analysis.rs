use std::path::PathBuf;

use super::{Stage, StageKind};
use crate::context::{self, DoneFiles};
use crate::errors::StageError;
use crate::paper::PaperDocument;
use crate::planning::PlanInputs;
use crate::store::{ArtifactNames, ArtifactStore};

/// Per-file logic analysis. Each file is analysed independently; the done list
/// is carried but not rendered into the prompt.
pub struct AnalysisStage<'a> {
    paper: &'a PaperDocument,
    inputs: &'a PlanInputs,
}

impl<'a> AnalysisStage<'a> {
    pub fn new(paper: &'a PaperDocument, inputs: &'a PlanInputs) -> Self {
        Self { paper, inputs }
    }
}

impl Stage for AnalysisStage<'_> {
    fn kind(&self) -> StageKind {
        StageKind::Analysis
    }

    fn system_prompt(&self) -> String {
        context::analysis_system(self.paper.format())
    }

    fn instruction(
        &self,
        _store: &ArtifactStore,
        file: &str,
        _done: &DoneFiles,
    ) -> Result<String, StageError> {
        Ok(context::analysis_instruction(
            self.paper,
            &self.inputs.planning,
            &self.inputs.config_yaml,
            file,
            self.inputs.tasks.rationale(file),
        ))
    }

    fn extract_payload(&self, content: &str) -> String {
        content.to_string()
    }

    fn persist_payload(
        &self,
        store: &ArtifactStore,
        file: &str,
        _content: &str,
        _payload: &str,
    ) -> Result<PathBuf, StageError> {
        // The transcript the runner writes is the analysis artifact.
        Ok(store.path(&ArtifactNames::for_file(StageKind::Analysis, file).transcript))
    }
}
