//! Planning artifacts: the four-turn planning conversation and what later
//! stages derive from it.

pub mod config;
pub mod task_list;

use anyhow::Result;
use std::path::Path;

use crate::errors::ConfigError;
use crate::store::{ArtifactStore, PLANNING_TRAJECTORIES, REPO_CONFIG, TASK_LIST_OVERRIDE};
use crate::trajectory::Trajectory;

pub use config::extract_config;
pub use task_list::{TaskList, canonical_key};

/// Assistant turns of the planning conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanningRecord {
    pub overview: String,
    pub design: String,
    pub task_list: String,
    /// The config-file turn; absent when planning stopped after three turns.
    pub config: Option<String>,
}

impl PlanningRecord {
    /// Build from a planning trajectory's assistant turns.
    pub fn from_trajectory(trajectory: &Trajectory) -> Result<Self, ConfigError> {
        let turns = trajectory.assistant_turns();
        if turns.len() < 3 {
            return Err(ConfigError::IncompletePlanning {
                found: turns.len(),
                expected: 3,
            });
        }
        Ok(Self {
            overview: turns[0].to_string(),
            design: turns[1].to_string(),
            task_list: turns[2].to_string(),
            config: turns.get(3).map(|s| s.to_string()),
        })
    }
}

/// Read the planning record from `planning_trajectories.json`.
pub fn extract_planning(path: &Path) -> Result<PlanningRecord> {
    if !path.exists() {
        return Err(ConfigError::MissingInput {
            what: "planning trajectories (run the planning stage first)",
            path: path.to_path_buf(),
        }
        .into());
    }
    let trajectory = Trajectory::load(path)?;
    Ok(PlanningRecord::from_trajectory(&trajectory)?)
}

/// Everything the analysis and coding stages need from planning, loaded and
/// validated before any completion call is made.
#[derive(Debug, Clone)]
pub struct PlanInputs {
    pub planning: PlanningRecord,
    pub tasks: TaskList,
    pub config_yaml: String,
}

impl PlanInputs {
    pub fn load(store: &ArtifactStore) -> Result<Self> {
        let planning = extract_planning(&store.path(PLANNING_TRAJECTORIES))?;
        let tasks = load_task_list(store, &planning)?;
        let config_path = store.repo_path(REPO_CONFIG)?;
        let Some(config_yaml) = store.read_repo_file(REPO_CONFIG)? else {
            return Err(ConfigError::MissingInput {
                what: "config.yaml (run extract-config first)",
                path: config_path,
            }
            .into());
        };
        Ok(Self {
            planning,
            tasks,
            config_yaml,
        })
    }
}

/// The task list, preferring a hand-edited `task_list.json` override.
pub fn load_task_list(store: &ArtifactStore, planning: &PlanningRecord) -> Result<TaskList> {
    if store.exists(TASK_LIST_OVERRIDE) {
        tracing::info!(path = %store.path(TASK_LIST_OVERRIDE).display(), "Using task list override");
        let value: serde_json::Value = store.read_json(TASK_LIST_OVERRIDE)?;
        return Ok(TaskList::from_value(value)?);
    }
    Ok(TaskList::parse(&planning.task_list)?)
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::gateway::ChatMessage;
    use tempfile::tempdir;

    #[test]
    fn test_record_from_four_turns() {
        let record = PlanningRecord::from_trajectory(&planning_trajectory(TASKS)).unwrap();
        assert_eq!(record.overview, "The overview");
        assert_eq!(record.design, "The design");
        assert_eq!(record.task_list, TASKS);
        assert_eq!(record.config.as_deref(), Some(CONFIG_TURN));
    }

    #[test]
    fn test_fewer_than_three_turns_is_incomplete() {
        let mut trajectory = Trajectory::with_system("plan");
        trajectory.push(ChatMessage::user("overview?"));
        trajectory.push(ChatMessage::assistant("only one"));
        let err = PlanningRecord::from_trajectory(&trajectory).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::IncompletePlanning { found: 1, expected: 3 }
        ));
    }

    #[test]
    fn test_missing_trajectory_file_is_config_error() {
        let dir = tempdir().unwrap();
        let err = extract_planning(&dir.path().join(PLANNING_TRAJECTORIES)).unwrap_err();
        assert!(crate::errors::find_config_error(&err).is_some());
    }

    #[test]
    fn test_inputs_load_from_store() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("out"), dir.path().join("repo"));
        seed_planning(&store, TASKS);

        let inputs = PlanInputs::load(&store).unwrap();
        assert_eq!(inputs.tasks.files, vec!["config.yaml", "model.py", "train.py"]);
        assert!(inputs.config_yaml.contains("lr: 0.001"));
    }

    #[test]
    fn test_override_file_replaces_parsed_task_list() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("out"), dir.path().join("repo"));
        seed_planning(&store, TASKS);
        store
            .write_json(
                TASK_LIST_OVERRIDE,
                &serde_json::json!({"task_list": ["only.py"], "logic_analysis": []}),
            )
            .unwrap();

        let inputs = PlanInputs::load(&store).unwrap();
        assert_eq!(inputs.tasks.files, vec!["only.py"]);
    }

    #[test]
    fn test_missing_config_yaml_is_config_error() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("out"), dir.path().join("repo"));
        planning_trajectory(TASKS)
            .save(&store, PLANNING_TRAJECTORIES)
            .unwrap();
        let err = PlanInputs::load(&store).unwrap_err();
        assert!(matches!(
            crate::errors::find_config_error(&err),
            Some(ConfigError::MissingInput { .. })
        ));
    }
}
