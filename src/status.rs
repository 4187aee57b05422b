//! Read-only summary of a run directory.

use anyhow::Result;

use crate::audit::{AuditLogger, AuditRun};
use crate::context::CONFIG_SENTINEL;
use crate::cost::{COST_FILE, CostRecord, load_total};
use crate::planning::{self, PlanningRecord};
use crate::stage::{ReproduceStage, StageKind};
use crate::store::{ArtifactStore, PLANNING_TRAJECTORIES, REPO_CONFIG};
use crate::trajectory::Trajectory;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    pub file: String,
    pub analyzed: bool,
    pub coded: bool,
}

#[derive(Debug, Clone)]
pub struct PipelineStatus {
    /// Assistant turns present in the planning conversation.
    pub planning_turns: usize,
    pub config_extracted: bool,
    pub files: Vec<FileStatus>,
    /// Why the task list could not be read, when it could not.
    pub task_list_error: Option<String>,
    pub script_written: bool,
    pub cost: CostRecord,
    pub last_run: Option<AuditRun>,
}

impl PipelineStatus {
    pub fn collect(store: &ArtifactStore) -> Result<Self> {
        let trajectory_path = store.path(PLANNING_TRAJECTORIES);
        let planning_turns = if trajectory_path.exists() {
            Trajectory::load(&trajectory_path)?.assistant_turns().len()
        } else {
            0
        };

        let (files, task_list_error) = match task_files(store) {
            Ok(files) => (files, None),
            Err(_) if planning_turns == 0 => (Vec::new(), None),
            Err(e) => (Vec::new(), Some(format!("{e:#}"))),
        };

        let audit = AuditLogger::new(&store.path("audit"));
        let last_run = match audit.list_runs()?.first() {
            Some(path) => audit.load_run(path).ok(),
            None => None,
        };

        Ok(Self {
            planning_turns,
            config_extracted: store.read_repo_file(REPO_CONFIG)?.is_some(),
            files,
            task_list_error,
            script_written: store.read_repo_file(ReproduceStage::SCRIPT)?.is_some(),
            cost: load_total(&store.path(COST_FILE))?,
            last_run,
        })
    }

    pub fn analyzed(&self) -> usize {
        self.files.iter().filter(|f| f.analyzed).count()
    }

    pub fn coded(&self) -> usize {
        self.files.iter().filter(|f| f.coded).count()
    }
}

fn task_files(store: &ArtifactStore) -> Result<Vec<FileStatus>> {
    let record: PlanningRecord = planning::extract_planning(&store.path(PLANNING_TRAJECTORIES))?;
    let tasks = planning::load_task_list(store, &record)?;
    let mut files = Vec::new();
    for file in tasks.files.iter().filter(|f| *f != CONFIG_SENTINEL) {
        files.push(FileStatus {
            file: file.clone(),
            analyzed: store.has_response(StageKind::Analysis, file),
            coded: store.has_response(StageKind::Coding, file)
                && store.read_repo_file(file)?.is_some(),
        });
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::CompletionRecord;
    use crate::planning::fixtures::{TASKS, seed_planning};
    use crate::store::ArtifactNames;
    use tempfile::tempdir;

    #[test]
    fn test_empty_directory_reports_nothing() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("out"), dir.path().join("repo"));
        let status = PipelineStatus::collect(&store).unwrap();
        assert_eq!(status.planning_turns, 0);
        assert!(!status.config_extracted);
        assert!(status.files.is_empty());
        assert!(status.task_list_error.is_none());
        assert_eq!(status.cost, CostRecord::default());
        assert!(status.last_run.is_none());
    }

    #[test]
    fn test_reports_per_file_progress() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("out"), dir.path().join("repo"));
        seed_planning(&store, TASKS);
        store
            .write_json(
                &ArtifactNames::for_file(StageKind::Analysis, "model.py").response,
                &vec![CompletionRecord::from_text("a", None)],
            )
            .unwrap();

        let status = PipelineStatus::collect(&store).unwrap();
        assert_eq!(status.planning_turns, 4);
        assert!(status.config_extracted);
        assert_eq!(status.files.len(), 2);
        assert_eq!(status.analyzed(), 1);
        assert_eq!(status.coded(), 0);
        assert!(!status.script_written);
    }

    #[test]
    fn test_unreadable_task_list_is_reported_not_fatal() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("out"), dir.path().join("repo"));
        seed_planning(&store, "no json");
        let status = PipelineStatus::collect(&store).unwrap();
        assert!(status.task_list_error.unwrap().contains("could not be parsed"));
    }
}
