//! Completion Gateway: the seam between the pipeline and a language model.
//!
//! Stages only see [`CompletionGateway`]. The production implementation is
//! [`OpenAiGateway`]; tests plug in a scripted double.

pub mod openai;
pub mod response;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::GatewayError;

pub use openai::OpenAiGateway;
pub use response::{
    Choice, CompletionRecord, FieldAccess, JsonSerializable, RawCompletion, ResponseMessage,
    Usage, normalize,
};

/// Speaker of a message in a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single message in a trajectory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionOptions {
    /// Only sent to reasoning-capable models.
    pub reasoning_effort: Option<String>,
}

/// Abstraction over an external text-completion capability.
///
/// One call is one blocking round trip; the caller waits for the response or
/// the error. Implementations must not retry.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<RawCompletion, GatewayError>;
}
