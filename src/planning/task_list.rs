//! Plan Extractor: turns the free-form task-list turn into a typed work list.
//!
//! Models rarely agree on key spelling ("Task list", "task_list",
//! "Logic_Analysis", ...), so keys are canonicalized exactly once when the
//! object is parsed and everything downstream sees a single spelling.

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::errors::{ConfigError, preview};
use crate::util::{extract_fenced_block, extract_json_object};

const TASK_LIST_KEY: &str = "task list";
const LOGIC_ANALYSIS_KEY: &str = "logic analysis";
const REQUIRED_PACKAGES_KEY: &str = "required packages";

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[\]}])").expect("valid regex"));

/// The ordered work list a stage iterates over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskList {
    /// File identifiers in dependency order, duplicates removed.
    pub files: Vec<String>,
    /// Per-file rationale from the "Logic Analysis" pairs.
    pub logic_analysis: HashMap<String, String>,
    pub required_packages: Vec<String>,
}

impl TaskList {
    /// Parse the planning turn's text: a fenced ```json block when present,
    /// otherwise the outermost JSON object in the prose.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let value = parse_json_payload(text)
            .ok_or_else(|| ConfigError::UnparseableTaskList(preview(text)))?;
        Self::from_value(value)
    }

    /// Build from an already-parsed JSON object (e.g. a `task_list.json`
    /// override).
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let Value::Object(object) = value else {
            return Err(ConfigError::UnparseableTaskList(
                "task list is not a JSON object".to_string(),
            ));
        };
        let mut canonical = canonicalize_keys(object);

        let files = match canonical.remove(TASK_LIST_KEY) {
            Some(value) => parse_files(value)?,
            None => return Err(ConfigError::MissingTaskListKey { key: "Task list" }),
        };
        let logic_analysis = match canonical.remove(LOGIC_ANALYSIS_KEY) {
            Some(value) => parse_logic_analysis(value),
            None => return Err(ConfigError::MissingTaskListKey { key: "Logic Analysis" }),
        };
        let required_packages = canonical
            .remove(REQUIRED_PACKAGES_KEY)
            .map(string_list)
            .unwrap_or_default();

        Ok(Self {
            files,
            logic_analysis,
            required_packages,
        })
    }

    /// Rationale for `file`; empty when the plan gave none.
    pub fn rationale(&self, file: &str) -> &str {
        self.logic_analysis.get(file).map(String::as_str).unwrap_or("")
    }
}

/// Canonical spelling of a plan key: lowercase, underscores as spaces,
/// whitespace collapsed.
pub fn canonical_key(key: &str) -> String {
    key.replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn canonicalize_keys(object: Map<String, Value>) -> HashMap<String, Value> {
    let mut out = HashMap::with_capacity(object.len());
    for (key, value) in object {
        out.entry(canonical_key(&key)).or_insert(value);
    }
    out
}

fn parse_json_payload(text: &str) -> Option<Value> {
    let candidates = [
        extract_fenced_block(text, Some("json")),
        Some(text.trim().to_string()),
        extract_json_object(text),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|candidate| parse_lenient(&candidate))
}

/// Strict parse first, then again with trailing commas removed.
fn parse_lenient(candidate: &str) -> Option<Value> {
    let parsed = serde_json::from_str::<Value>(candidate)
        .ok()
        .or_else(|| serde_json::from_str(&TRAILING_COMMA.replace_all(candidate, "$1")).ok())?;
    parsed.is_object().then_some(parsed)
}

fn parse_files(value: Value) -> Result<Vec<String>, ConfigError> {
    let Value::Array(items) = value else {
        return Err(ConfigError::UnparseableTaskList(
            "'Task list' is not a list".to_string(),
        ));
    };
    let mut files: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let Value::String(file) = item else {
            return Err(ConfigError::UnparseableTaskList(format!(
                "'Task list' entry is not a file name: {item}"
            )));
        };
        if files.contains(&file) {
            tracing::warn!(file = %file, "Duplicate task list entry ignored");
            continue;
        }
        files.push(file);
    }
    Ok(files)
}

fn parse_logic_analysis(value: Value) -> HashMap<String, String> {
    let mut analysis = HashMap::new();
    let Value::Array(entries) = value else {
        tracing::warn!("'Logic Analysis' is not a list; no per-file rationale available");
        return analysis;
    };
    for entry in entries {
        match entry {
            Value::Array(pair) if pair.len() >= 2 => {
                if let Value::String(file) = &pair[0] {
                    analysis
                        .entry(file.clone())
                        .or_insert_with(|| value_text(&pair[1]));
                }
            }
            other => {
                tracing::warn!(entry = %other, "Skipping malformed 'Logic Analysis' entry");
            }
        }
    }
    analysis
}

fn string_list(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(value_text).collect(),
        other => vec![value_text(&other)],
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = r#"Here is the breakdown:

```json
{
    "Required packages": ["torch==2.1", "numpy"],
    "Logic Analysis": [
        ["model.py", "Defines the Transformer"],
        ["train.py", "Training loop; imports model.py"]
    ],
    "Task list": ["config.yaml", "model.py", "train.py"]
}
```
"#;

    #[test]
    fn test_parses_fenced_json() {
        let tasks = TaskList::parse(PLAN).unwrap();
        assert_eq!(tasks.files, vec!["config.yaml", "model.py", "train.py"]);
        assert_eq!(tasks.rationale("model.py"), "Defines the Transformer");
        assert_eq!(tasks.rationale("config.yaml"), "");
        assert_eq!(tasks.required_packages, vec!["torch==2.1", "numpy"]);
    }

    #[test]
    fn test_key_spellings_are_equivalent() {
        let spellings = [
            (r#""Task list""#, r#""Logic Analysis""#),
            (r#""task_list""#, r#""logic_analysis""#),
            (r#""Task_list""#, r#""Logic_Analysis""#),
        ];
        let parsed: Vec<TaskList> = spellings
            .iter()
            .map(|(tasks, logic)| {
                let text = format!(
                    r#"{{{tasks}: ["a.py", "b.py"], {logic}: [["a.py", "first"], ["b.py", "second"]]}}"#
                );
                TaskList::parse(&text).unwrap()
            })
            .collect();
        assert_eq!(parsed[0], parsed[1]);
        assert_eq!(parsed[1], parsed[2]);
        assert_eq!(parsed[0].rationale("b.py"), "second");
    }

    #[test]
    fn test_unfenced_object_in_prose() {
        let text = r#"Sure. {"Task list": ["x.py"], "Logic Analysis": []} Hope this helps."#;
        let tasks = TaskList::parse(text).unwrap();
        assert_eq!(tasks.files, vec!["x.py"]);
        assert!(tasks.logic_analysis.is_empty());
    }

    #[test]
    fn test_trailing_commas_are_tolerated() {
        let text = "```json\n{\"Task list\": [\"x.py\",], \"Logic Analysis\": [],}\n```";
        assert_eq!(TaskList::parse(text).unwrap().files, vec!["x.py"]);
    }

    #[test]
    fn test_unparseable_text_is_fatal() {
        let err = TaskList::parse("no json here at all").unwrap_err();
        assert!(matches!(err, ConfigError::UnparseableTaskList(_)));
    }

    #[test]
    fn test_missing_task_list_is_fatal() {
        let err = TaskList::parse(r#"{"Logic Analysis": []}"#).unwrap_err();
        assert!(matches!(err, ConfigError::MissingTaskListKey { key: "Task list" }));
        assert!(err.to_string().contains("Please re-generate the planning"));
    }

    #[test]
    fn test_missing_logic_analysis_is_fatal() {
        let err = TaskList::parse(r#"{"Task list": ["a.py"]}"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingTaskListKey { key: "Logic Analysis" }
        ));
    }

    #[test]
    fn test_duplicates_keep_first_occurrence() {
        let tasks =
            TaskList::parse(r#"{"Task list": ["a.py", "b.py", "a.py"], "Logic Analysis": []}"#)
                .unwrap();
        assert_eq!(tasks.files, vec!["a.py", "b.py"]);
    }

    #[test]
    fn test_non_string_rationale_is_stringified() {
        let tasks = TaskList::parse(
            r#"{"Task list": ["a.py"], "Logic Analysis": [["a.py", ["step 1", "step 2"]], "junk"]}"#,
        )
        .unwrap();
        assert_eq!(tasks.rationale("a.py"), r#"["step 1","step 2"]"#);
    }

    #[test]
    fn test_canonical_key_normalizes_spelling() {
        assert_eq!(canonical_key("Task_list"), "task list");
        assert_eq!(canonical_key("  Logic   Analysis "), "logic analysis");
        assert_eq!(canonical_key("Required-Packages"), "required packages");
    }
}
