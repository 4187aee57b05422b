//! Completion response normalization.
//!
//! Completion backends hand back responses in different shapes. Each shape is
//! a [`RawCompletion`] variant with its own conversion into the uniform
//! [`CompletionRecord`]; anything unrecognized is an error, never a silent
//! fallthrough.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ChatMessage, Role};
use crate::errors::{ResponseShapeError, preview};

/// Token counters reported by the completion service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens_details: Option<PromptTokensDetails>,
}

impl Usage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens: Some(prompt_tokens),
            completion_tokens: Some(completion_tokens),
            total_tokens: Some(prompt_tokens + completion_tokens),
            prompt_tokens_details: None,
        }
    }

    /// Prompt tokens served from the provider cache.
    pub fn cached_tokens(&self) -> u64 {
        self.prompt_tokens_details
            .as_ref()
            .and_then(|d| d.cached_tokens)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptTokensDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_tokens: Option<u64>,
}

fn assistant_role() -> Role {
    Role::Assistant
}

/// The generated turn inside a choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    #[serde(default = "assistant_role")]
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: ResponseMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Uniform record shape every completion is normalized into.
///
/// Fields the pipeline does not read are kept in `extra` so the persisted raw
/// response stays complete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CompletionRecord {
    /// Build a single-choice assistant record.
    pub fn from_text(content: impl Into<String>, usage: Option<Usage>) -> Self {
        Self {
            id: None,
            model: None,
            choices: vec![Choice {
                index: 0,
                message: ResponseMessage {
                    role: Role::Assistant,
                    content: Some(content.into()),
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage,
            extra: Map::new(),
        }
    }

    /// The first choice's message.
    pub fn message(&self) -> Result<&ResponseMessage, ResponseShapeError> {
        self.choices
            .first()
            .map(|choice| &choice.message)
            .ok_or(ResponseShapeError::NoChoices)
    }

    /// Text of the first choice; a null content reads as empty.
    pub fn content(&self) -> Result<&str, ResponseShapeError> {
        Ok(self.message()?.content.as_deref().unwrap_or(""))
    }

    /// The generated turn as a trajectory message.
    pub fn to_chat_message(&self) -> Result<ChatMessage, ResponseShapeError> {
        let message = self.message()?;
        Ok(ChatMessage::new(
            message.role,
            message.content.clone().unwrap_or_default(),
        ))
    }
}

/// A backend object that can serialize itself to JSON text.
pub trait JsonSerializable: std::fmt::Debug + Send + Sync {
    fn type_name(&self) -> &str;
    fn to_json(&self) -> Result<String, serde_json::Error>;
}

/// A backend object that only exposes its fields.
pub trait FieldAccess: std::fmt::Debug + Send + Sync {
    fn type_name(&self) -> &str;
    fn fields(&self) -> Map<String, Value>;
}

/// A completion response as handed back by a gateway, before normalization.
#[derive(Debug)]
pub enum RawCompletion {
    /// Already in record shape.
    Record(CompletionRecord),
    /// JSON-encoded record text (e.g. an HTTP body).
    JsonText(String),
    /// Object exposing a JSON-serialization method.
    Serializable(Box<dyn JsonSerializable>),
    /// Object exposing plain field access.
    Reflectable(Box<dyn FieldAccess>),
    /// Anything else; carried only so the error can describe it.
    Unrecognized { type_name: String, content: String },
}

impl RawCompletion {
    /// Short tag used in logs.
    pub fn shape(&self) -> &'static str {
        match self {
            RawCompletion::Record(_) => "record",
            RawCompletion::JsonText(_) => "json-text",
            RawCompletion::Serializable(_) => "serializable",
            RawCompletion::Reflectable(_) => "reflectable",
            RawCompletion::Unrecognized { .. } => "unrecognized",
        }
    }
}

fn parse_json_text(text: &str) -> Result<CompletionRecord, ResponseShapeError> {
    serde_json::from_str(text).map_err(|source| {
        tracing::debug!(error = %source, content = %preview(text), "completion text is not a record");
        ResponseShapeError::InvalidJson {
            preview: preview(text),
            source,
        }
    })
}

/// Convert any supported response shape into a [`CompletionRecord`].
pub fn normalize(raw: RawCompletion) -> Result<CompletionRecord, ResponseShapeError> {
    match raw {
        RawCompletion::Record(record) => Ok(record),
        RawCompletion::JsonText(text) => parse_json_text(&text),
        RawCompletion::Serializable(object) => {
            let text = object.to_json().map_err(|_| ResponseShapeError::Unrecognized {
                type_name: object.type_name().to_string(),
                preview: preview(&format!("{object:?}")),
            })?;
            parse_json_text(&text)
        }
        RawCompletion::Reflectable(object) => {
            let fields = Value::Object(object.fields());
            serde_json::from_value(fields.clone()).map_err(|_| ResponseShapeError::Unrecognized {
                type_name: object.type_name().to_string(),
                preview: preview(&fields.to_string()),
            })
        }
        RawCompletion::Unrecognized { type_name, content } => {
            tracing::debug!(%type_name, content = %preview(&content), "unknown completion object");
            Err(ResponseShapeError::Unrecognized {
                type_name,
                preview: preview(&content),
            })
        }
    }
}
