//! The source paper, read once per run and shared by every stage.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::errors::ConfigError;

/// Paper source format. Exactly two values are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperFormat {
    Json,
    Latex,
}

impl std::fmt::Display for PaperFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaperFormat::Json => write!(f, "JSON"),
            PaperFormat::Latex => write!(f, "LaTeX"),
        }
    }
}

impl FromStr for PaperFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "JSON" => Ok(PaperFormat::Json),
            "LaTeX" => Ok(PaperFormat::Latex),
            other => Err(ConfigError::InvalidPaperFormat(other.to_string())),
        }
    }
}

/// The paper, either a structured document tree or raw markup.
#[derive(Debug, Clone, PartialEq)]
pub enum PaperDocument {
    Structured(serde_json::Value),
    Markup(String),
}

impl PaperDocument {
    /// Read the paper in `format` from whichever path matches it.
    pub fn load(
        format: PaperFormat,
        json_path: Option<&Path>,
        latex_path: Option<&Path>,
    ) -> Result<Self> {
        match format {
            PaperFormat::Json => {
                let path = require_path(json_path, "paper JSON (--pdf-json-path)")?;
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read paper: {}", path.display()))?;
                let value = serde_json::from_str(&content)
                    .with_context(|| format!("Paper is not valid JSON: {}", path.display()))?;
                Ok(PaperDocument::Structured(value))
            }
            PaperFormat::Latex => {
                let path = require_path(latex_path, "paper LaTeX (--pdf-latex-path)")?;
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read paper: {}", path.display()))?;
                Ok(PaperDocument::Markup(content))
            }
        }
    }

    pub fn format(&self) -> PaperFormat {
        match self {
            PaperDocument::Structured(_) => PaperFormat::Json,
            PaperDocument::Markup(_) => PaperFormat::Latex,
        }
    }

    /// Prompt rendering. Structured papers are serialized compactly; object
    /// keys come out sorted, so the text is stable across runs.
    pub fn render(&self) -> String {
        match self {
            PaperDocument::Structured(value) => value.to_string(),
            PaperDocument::Markup(text) => text.clone(),
        }
    }
}

fn require_path(path: Option<&Path>, what: &'static str) -> Result<PathBuf> {
    match path {
        Some(p) if p.exists() => Ok(p.to_path_buf()),
        Some(p) => Err(ConfigError::MissingInput {
            what,
            path: p.to_path_buf(),
        }
        .into()),
        None => Err(ConfigError::MissingInput {
            what,
            path: PathBuf::new(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_format_accepts_exactly_two_values() {
        assert_eq!("JSON".parse::<PaperFormat>().unwrap(), PaperFormat::Json);
        assert_eq!("LaTeX".parse::<PaperFormat>().unwrap(), PaperFormat::Latex);
        for bad in ["json", "latex", "PDF", ""] {
            assert!(matches!(
                bad.parse::<PaperFormat>(),
                Err(ConfigError::InvalidPaperFormat(_))
            ));
        }
    }

    #[test]
    fn test_load_json_paper() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("paper.json");
        std::fs::write(&path, r#"{"title": "Attention", "sections": []}"#).unwrap();
        let paper = PaperDocument::load(PaperFormat::Json, Some(&path), None).unwrap();
        assert_eq!(paper.format(), PaperFormat::Json);
        assert_eq!(paper.render(), r#"{"sections":[],"title":"Attention"}"#);
    }

    #[test]
    fn test_load_latex_paper() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("paper.tex");
        std::fs::write(&path, "\\section{Intro}").unwrap();
        let paper = PaperDocument::load(PaperFormat::Latex, None, Some(&path)).unwrap();
        assert_eq!(paper.render(), "\\section{Intro}");
    }

    #[test]
    fn test_missing_paper_path_is_config_error() {
        let err = PaperDocument::load(PaperFormat::Json, None, None).unwrap_err();
        assert!(matches!(
            crate::errors::find_config_error(&err),
            Some(ConfigError::MissingInput { .. })
        ));
    }
}
