//! Trajectory: the ordered message history of one completion call.
//!
//! Persisted as a plain JSON array of `{role, content}` objects so a stage can
//! be inspected, or its input replayed, without re-issuing the call.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::gateway::{ChatMessage, Role};
use crate::store::ArtifactStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trajectory {
    messages: Vec<ChatMessage>,
}

impl Trajectory {
    /// Start a trajectory with its system prompt.
    pub fn with_system(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(prompt)],
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Contents of the assistant turns, in order.
    pub fn assistant_turns(&self) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
            .collect()
    }

    /// The messages that were sent for the last completion: everything before
    /// the final assistant turn.
    pub fn request(&self) -> &[ChatMessage] {
        match self.messages.last() {
            Some(last) if last.role == Role::Assistant => &self.messages[..self.messages.len() - 1],
            _ => &self.messages,
        }
    }

    pub fn save(&self, store: &ArtifactStore, name: &str) -> Result<PathBuf> {
        store.write_json(name, self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read trajectory: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse trajectory: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), dir.path().join("repo"));

        let mut trajectory = Trajectory::with_system("sys");
        trajectory.push(ChatMessage::user("write model.py"));
        trajectory.push(ChatMessage::assistant("```python\npass\n```"));
        let path = trajectory.save(&store, "model.py_coding_trajectories.json").unwrap();

        let loaded = Trajectory::load(&path).unwrap();
        assert_eq!(loaded, trajectory);
        assert_eq!(loaded.request().len(), 2);
        assert_eq!(loaded.assistant_turns(), vec!["```python\npass\n```"]);
    }

    #[test]
    fn test_persisted_shape_is_a_message_array() {
        let mut trajectory = Trajectory::with_system("s");
        trajectory.push(ChatMessage::user("u"));
        let json = serde_json::to_string(&trajectory).unwrap();
        assert_eq!(
            json,
            r#"[{"role":"system","content":"s"},{"role":"user","content":"u"}]"#
        );
    }

    #[test]
    fn test_request_without_assistant_turn_is_everything() {
        let trajectory = Trajectory::with_system("s");
        assert_eq!(trajectory.request().len(), 1);
        assert!(trajectory.assistant_turns().is_empty());
    }
}
