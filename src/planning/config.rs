//! Config extraction: lift the YAML block out of the fourth planning turn.

use anyhow::Result;
use std::path::PathBuf;

use crate::errors::ConfigError;
use crate::store::{ArtifactStore, PLANNING_CONFIG, PLANNING_TRAJECTORIES, REPO_CONFIG};
use crate::util::extract_fenced_block;

use super::extract_planning;

/// Write `planning_config.yaml` and copy it into the repository as
/// `config.yaml`. Returns the repository path.
pub fn extract_config(store: &ArtifactStore) -> Result<PathBuf> {
    let planning = extract_planning(&store.path(PLANNING_TRAJECTORIES))?;
    let Some(turn) = planning.config.as_deref() else {
        return Err(ConfigError::IncompletePlanning {
            found: 3,
            expected: 4,
        }
        .into());
    };

    let yaml = extract_fenced_block(turn, Some("yaml"))
        .or_else(|| extract_fenced_block(turn, Some("yml")))
        .ok_or(ConfigError::MissingConfigBlock)?;

    if let Err(e) = serde_yaml::from_str::<serde_yaml::Value>(&yaml) {
        tracing::warn!(error = %e, "Extracted config.yaml is not valid YAML; writing it anyway");
    }

    let planning_path = store.write_text(PLANNING_CONFIG, &yaml)?;
    let repo_path = store.write_repo_file(REPO_CONFIG, &yaml)?;
    tracing::info!(
        planning = %planning_path.display(),
        repo = %repo_path.display(),
        "Extracted config.yaml"
    );
    Ok(repo_path)
}
