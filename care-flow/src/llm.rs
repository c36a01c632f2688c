//! rig-core backed [`ReasoningEngine`] for the OpenAI and Gemini APIs

use async_trait::async_trait;
use rig::{
    completion::Prompt,
    prelude::*,
    providers::{
        gemini::{
            self,
            completion::gemini_api_types::{AdditionalParameters, GenerationConfig},
        },
        openai,
    },
};
use serde_json::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::{
    engine::{CompletionRequest, ModelSettings, ReasoningEngine},
    error::{FlowError, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Gemini,
}

/// Engine bound to a single API key; build one per run
pub struct RigEngine {
    provider: LlmProvider,
    api_key: String,
    settings: ModelSettings,
    base_url: Option<String>,
}

impl RigEngine {
    pub fn new(provider: LlmProvider, api_key: impl Into<String>, settings: ModelSettings) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            settings,
            base_url: None,
        }
    }

    /// Sends requests to another host than the provider's public API
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    async fn prompt_openai(&self, request: &CompletionRequest) -> Result<String> {
        let mut builder = openai::Client::builder(&self.api_key);
        if let Some(base_url) = &self.base_url {
            builder = builder.base_url(base_url);
        }
        let client = builder
            .build()
            .map_err(|e| FlowError::Upstream(format!("cannot create OpenAI client: {}", e)))?;

        let agent = client
            .agent(&self.settings.model)
            .preamble(&request.preamble)
            .temperature(self.settings.temperature)
            .max_tokens(self.settings.max_tokens)
            .build();
        agent
            .prompt(request.prompt.as_str())
            .await
            .map_err(|e| self.provider_error(&e.to_string()))
    }

    async fn prompt_gemini(&self, request: &CompletionRequest) -> Result<String> {
        let mut builder = gemini::Client::builder(&self.api_key);
        if let Some(base_url) = &self.base_url {
            builder = builder.base_url(base_url);
        }
        let client = builder
            .build()
            .map_err(|e| FlowError::Upstream(format!("cannot create Gemini client: {}", e)))?;

        // Gemini rejects requests whose additional params carry no generation config
        let agent = client
            .agent(&self.settings.model)
            .preamble(&request.preamble)
            .temperature(self.settings.temperature)
            .max_tokens(self.settings.max_tokens)
            .additional_params(gemini_params(&self.settings)?)
            .build();
        agent
            .prompt(request.prompt.as_str())
            .await
            .map_err(|e| self.provider_error(&e.to_string()))
    }

    /// Classifies a provider failure, keeping the key out of the message
    fn provider_error(&self, message: &str) -> FlowError {
        classify_provider_error(&message.replace(&self.api_key, "<redacted>"))
    }
}

/// Generation config for the Gemini API, built from the engine's model settings
pub fn gemini_params(settings: &ModelSettings) -> Result<Value> {
    let config = GenerationConfig {
        temperature: Some(settings.temperature),
        max_output_tokens: Some(settings.max_tokens),
        ..Default::default()
    };
    serde_json::to_value(AdditionalParameters::default().with_config(config))
        .map_err(|e| FlowError::Upstream(format!("cannot encode Gemini generation config: {}", e)))
}

impl fmt::Debug for RigEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RigEngine")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("settings", &self.settings)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl ReasoningEngine for RigEngine {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        if self.api_key.trim().is_empty() {
            return Err(FlowError::Authentication("no API key supplied".to_string()));
        }

        info!(
            provider = ?self.provider,
            model = %self.settings.model,
            "Calling reasoning engine"
        );

        match self.provider {
            LlmProvider::OpenAi => self.prompt_openai(request).await,
            LlmProvider::Gemini => self.prompt_gemini(request).await,
        }
    }
}

const AUTH_MARKERS: &[&str] = &[
    "401",
    "403",
    "invalid_api_key",
    "incorrect api key",
    "api key not valid",
    "api_key_invalid",
    "unauthorized",
    "unauthenticated",
    "permission_denied",
];

/// Splits provider failures into rejected credentials and everything else
pub fn classify_provider_error(message: &str) -> FlowError {
    let lowered = message.to_lowercase();
    if AUTH_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        FlowError::Authentication(message.to_string())
    } else {
        FlowError::Upstream(message.to_string())
    }
}
