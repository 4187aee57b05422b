//! HTTP client for OpenAI-compatible chat completion APIs.
//!
//! No pipeline awareness: one POST per call, the body is handed back as
//! [`RawCompletion::JsonText`] for normalization.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{ChatMessage, CompletionGateway, CompletionOptions, RawCompletion};
use crate::errors::GatewayError;
use crate::settings::Settings;

/// Request body for `/chat/completions`.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<&'a str>,
}

#[derive(Debug)]
pub struct OpenAiGateway {
    http: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiGateway {
    /// Create a client against `base_url` (already normalized to `/v1`).
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self, GatewayError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key,
            base_url,
        })
    }

    /// Build a gateway from layered settings.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.api_key()?;
        let base_url = settings.api_base();
        if base_url == crate::settings::DEFAULT_API_BASE {
            tracing::info!("Using the official OpenAI API");
        } else {
            tracing::info!(%base_url, "Using custom API base URL");
        }
        let gateway = Self::new(
            api_key,
            base_url,
            Duration::from_secs(settings.gateway.timeout_secs),
        )?;
        Ok(gateway)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CompletionGateway for OpenAiGateway {
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<RawCompletion, GatewayError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatCompletionRequest {
            model,
            messages,
            reasoning_effort: options.reasoning_effort.as_deref(),
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            return Err(GatewayError::RateLimited { retry_after });
        }

        if status >= 400 {
            let body = response.text().await.unwrap_or_else(|_| "(no body)".into());
            return Err(GatewayError::Api {
                status,
                message: body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::InvalidBody(e.to_string()))?;
        Ok(RawCompletion::JsonText(body))
    }
}
