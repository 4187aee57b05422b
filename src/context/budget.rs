//! Prompt size budget.
//!
//! Context grows with every generated file, so each call is measured against a
//! configured limit before it is sent. Going over is fatal; nothing is
//! truncated.

use anyhow::{Result, anyhow};
use std::str::FromStr;

use crate::errors::StageError;
use crate::gateway::ChatMessage;

/// Default model input window in characters (~200k tokens at ~4 chars/token).
pub const DEFAULT_MODEL_WINDOW_CHARS: usize = 200_000 * 4;

/// `[context].limit`: a share of the model window or a fixed character count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContextLimit {
    /// `"80%"`
    Percentage(f64),
    /// `"500000"`
    Absolute(usize),
}

impl ContextLimit {
    /// Characters allowed per request for a model with `window` characters.
    pub fn effective_limit(self, window: usize) -> usize {
        match self {
            ContextLimit::Percentage(pct) => (window as f64 * pct / 100.0) as usize,
            ContextLimit::Absolute(chars) => chars,
        }
    }
}

impl Default for ContextLimit {
    fn default() -> Self {
        ContextLimit::Percentage(100.0)
    }
}

impl std::fmt::Display for ContextLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextLimit::Percentage(pct) => write!(f, "{pct}%"),
            ContextLimit::Absolute(chars) => write!(f, "{chars}"),
        }
    }
}

impl FromStr for ContextLimit {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        match raw.strip_suffix('%') {
            Some(pct) => match pct.trim().parse::<f64>() {
                Ok(pct) if pct > 0.0 && pct <= 100.0 => Ok(ContextLimit::Percentage(pct)),
                Ok(pct) => Err(format!("percentage must be in (0, 100], got {pct}")),
                Err(_) => Err(format!("'{raw}' is not a percentage")),
            },
            None => match raw.parse::<usize>() {
                Ok(0) => Err("character budget must be positive".to_string()),
                Ok(chars) => Ok(ContextLimit::Absolute(chars)),
                Err(_) => Err(format!("'{raw}' is neither a percentage nor a character count")),
            },
        }
    }
}

/// Parse a `[context].limit` value.
pub fn parse_context_limit(raw: &str) -> Result<ContextLimit> {
    raw.parse()
        .map_err(|reason| anyhow!("Invalid context limit: {reason}"))
}

/// Total characters across a message sequence.
pub fn message_chars(messages: &[ChatMessage]) -> usize {
    messages.iter().map(|m| m.content.chars().count()).sum()
}

/// Fail with [`StageError::ContextBudgetExceeded`] when `messages` do not fit.
pub fn ensure_within_budget(
    file: &str,
    messages: &[ChatMessage],
    limit: usize,
) -> Result<usize, StageError> {
    let chars = message_chars(messages);
    if chars > limit {
        return Err(StageError::ContextBudgetExceeded {
            file: file.to_string(),
            chars,
            limit,
        });
    }
    Ok(chars)
}
