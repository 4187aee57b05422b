//! Artifact Store: directory-backed persistence of every stage output.
//!
//! Layout of one run:
//!
//! ```text
//! <output_dir>/
//!   planning_trajectories.json       planning_response.json
//!   planning_config.yaml             task_list.json (optional override)
//!   {file}_simple_analysis_response.json / _trajectories.json
//!   {file}_coding_response.json / _trajectories.json
//!   accumulated_cost.json
//!   planning_artifacts/  analyzing_artifacts/  coding_artifacts/   (.txt transcripts)
//!   audit/  logs/
//! <repo_dir>/
//!   config.yaml  <task-list files, nested as named>  reproduce.sh
//! ```
//!
//! Flat per-file artifacts use [`flat_name`]; repository files keep the
//! identifier verbatim, directories included.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::gateway::CompletionRecord;
use crate::stage::StageKind;
use crate::util::flat_name;

pub const PLANNING_TRAJECTORIES: &str = "planning_trajectories.json";
pub const PLANNING_RESPONSE: &str = "planning_response.json";
pub const PLANNING_CONFIG: &str = "planning_config.yaml";
pub const TASK_LIST_OVERRIDE: &str = "task_list.json";
pub const REPO_CONFIG: &str = "config.yaml";

/// Names of the three per-file artifacts a stage writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNames {
    pub response: String,
    pub trajectory: String,
    pub transcript: String,
}

impl ArtifactNames {
    pub fn for_file(kind: StageKind, file: &str) -> Self {
        let flat = flat_name(file);
        match kind {
            StageKind::Planning => Self {
                response: PLANNING_RESPONSE.to_string(),
                trajectory: PLANNING_TRAJECTORIES.to_string(),
                transcript: format!("planning_artifacts/{flat}.txt"),
            },
            StageKind::Analysis => Self {
                response: format!("{flat}_simple_analysis_response.json"),
                trajectory: format!("{flat}_simple_analysis_trajectories.json"),
                transcript: format!("analyzing_artifacts/{flat}_simple_analysis.txt"),
            },
            StageKind::Coding | StageKind::Reproduce => Self {
                response: format!("{flat}_coding_response.json"),
                trajectory: format!("{flat}_coding_trajectories.json"),
                transcript: format!("coding_artifacts/{flat}_coding.txt"),
            },
        }
    }
}

/// Durable key/value persistence rooted at an output directory and a
/// generated-repository directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    output_dir: PathBuf,
    repo_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(output_dir: impl Into<PathBuf>, repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            repo_dir: repo_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output directory: {}", self.output_dir.display())
        })?;
        Ok(())
    }

    /// Absolute path of an output-directory artifact.
    pub fn path(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    pub fn write_text(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.path(name);
        write_creating_parents(&path, content)?;
        Ok(path)
    }

    pub fn read_text(&self, name: &str) -> Result<String> {
        let path = self.path(name);
        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))
    }

    pub fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let json = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize {name}"))?;
        self.write_text(name, &json)
    }

    pub fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let content = self.read_text(name)?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {name}"))
    }

    /// Path of a generated repository file. The identifier is used verbatim.
    pub fn repo_path(&self, file: &str) -> Result<PathBuf> {
        let relative = Path::new(file);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            bail!("Refusing to write '{file}' outside the repository directory");
        }
        Ok(self.repo_dir.join(relative))
    }

    /// Write a generated file, creating nested directories on demand.
    pub fn write_repo_file(&self, file: &str, content: &str) -> Result<PathBuf> {
        let path = self.repo_path(file)?;
        write_creating_parents(&path, content)?;
        Ok(path)
    }

    /// Generated source for `file`, if it exists.
    pub fn read_repo_file(&self, file: &str) -> Result<Option<String>> {
        let path = self.repo_path(file)?;
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    /// Whether a stage already produced its raw response for `file`.
    pub fn has_response(&self, kind: StageKind, file: &str) -> bool {
        self.exists(&ArtifactNames::for_file(kind, file).response)
    }

    /// Analysis text persisted for `file`, or `None` when the analysis stage
    /// has not produced it.
    pub fn load_analysis(&self, file: &str) -> Result<Option<String>> {
        let name = ArtifactNames::for_file(StageKind::Analysis, file).response;
        if !self.exists(&name) {
            return Ok(None);
        }
        let responses: Vec<CompletionRecord> = self.read_json(&name)?;
        let Some(first) = responses.first() else {
            return Ok(None);
        };
        Ok(Some(first.content()?.to_string()))
    }
}

fn write_creating_parents(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_store() -> (ArtifactStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("out"), dir.path().join("repo"));
        (store, dir)
    }

    #[test]
    fn test_artifact_names_follow_layout() {
        let names = ArtifactNames::for_file(StageKind::Analysis, "models/net.py");
        assert_eq!(names.response, "models_net.py_simple_analysis_response.json");
        assert_eq!(names.trajectory, "models_net.py_simple_analysis_trajectories.json");
        assert_eq!(names.transcript, "analyzing_artifacts/models_net.py_simple_analysis.txt");

        let names = ArtifactNames::for_file(StageKind::Reproduce, "reproduce.sh");
        assert_eq!(names.transcript, "coding_artifacts/reproduce.sh_coding.txt");
    }

    #[test]
    fn test_repo_files_keep_nested_identifiers() {
        let (store, _dir) = make_store();
        let path = store.write_repo_file("src/models/net.py", "class Net: pass").unwrap();
        assert!(path.ends_with("repo/src/models/net.py"));
        assert_eq!(
            store.read_repo_file("src/models/net.py").unwrap().as_deref(),
            Some("class Net: pass")
        );
        assert_eq!(store.read_repo_file("missing.py").unwrap(), None);
    }

    #[test]
    fn test_repo_path_rejects_escapes() {
        let (store, _dir) = make_store();
        assert!(store.repo_path("../outside.py").is_err());
        assert!(store.repo_path("/etc/passwd").is_err());
        assert!(store.repo_path("./ok.py").is_ok());
    }

    #[test]
    fn test_json_roundtrip_and_exists() {
        let (store, _dir) = make_store();
        assert!(!store.exists("x.json"));
        store.write_json("x.json", &vec![1, 2, 3]).unwrap();
        assert!(store.exists("x.json"));
        let back: Vec<i32> = store.read_json("x.json").unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[test]
    fn test_load_analysis_reads_first_response() {
        let (store, _dir) = make_store();
        assert_eq!(store.load_analysis("model.py").unwrap(), None);

        let records = vec![CompletionRecord::from_text("build the encoder", None)];
        store
            .write_json("model.py_simple_analysis_response.json", &records)
            .unwrap();
        assert!(store.has_response(StageKind::Analysis, "model.py"));
        assert_eq!(
            store.load_analysis("model.py").unwrap().as_deref(),
            Some("build the encoder")
        );
    }
}
