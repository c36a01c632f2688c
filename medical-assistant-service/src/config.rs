use care_flow::{
    ModelSettings,
    engine::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE},
};
use std::{env, str::FromStr};
use thiserror::Error;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_GOOGLE_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a valid {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub openai_model: String,
    pub google_model: String,
    pub temperature: f64,
    pub max_tokens: u64,
    /// Server-side key for web search; search is disabled when unset
    pub serper_api_key: Option<String>,
}

impl ServiceConfig {
    /// Reads the process environment (after loading `.env`, if present)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |name: &str, default: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            host: text("HOST", "0.0.0.0"),
            port: parse(&lookup, "PORT", 3000, "port number")?,
            openai_model: text("OPENAI_MODEL", DEFAULT_OPENAI_MODEL),
            google_model: text("GOOGLE_MODEL", DEFAULT_GOOGLE_MODEL),
            temperature: parse(&lookup, "LLM_TEMPERATURE", DEFAULT_TEMPERATURE, "number")?,
            max_tokens: parse(&lookup, "LLM_MAX_TOKENS", DEFAULT_MAX_TOKENS, "token count")?,
            serper_api_key: lookup("SERPER_API_KEY").filter(|key| !key.trim().is_empty()),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn openai_settings(&self) -> ModelSettings {
        self.settings_for(&self.openai_model)
    }

    pub fn google_settings(&self) -> ModelSettings {
        self.settings_for(&self.google_model)
    }

    fn settings_for(&self, model: &str) -> ModelSettings {
        ModelSettings::new(model)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            google_model: DEFAULT_GOOGLE_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            serper_api_key: None,
        }
    }
}

fn parse<F, T>(
    lookup: &F,
    name: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => {
            value.trim().parse().map_err(|_| ConfigError::Invalid {
                name,
                expected,
                value,
            })
        }
        _ => Ok(default),
    }
}
