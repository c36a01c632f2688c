use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::{AppError, AppResult};

pub const MAX_AGE: u8 = 120;
pub const DEFAULT_AGE: i64 = 25;
pub const DEFAULT_SYMPTOMS: &str = "e.g., fever, cough";
pub const DEFAULT_MEDICAL_HISTORY: &str = "e.g., diabetes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Gender {
    #[default]
    Male,
    Female,
    Other,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Male, Gender::Female, Gender::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one user submitted about themselves; lives for a single run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub gender: Gender,
    pub age: u8,
    pub symptoms: String,
    pub medical_history: String,
}

impl PatientProfile {
    pub fn new(
        gender: Gender,
        age: i64,
        symptoms: impl Into<String>,
        medical_history: impl Into<String>,
    ) -> AppResult<Self> {
        let age = u8::try_from(age)
            .ok()
            .filter(|age| *age <= MAX_AGE)
            .ok_or_else(|| {
                AppError::Validation(format!("age must be between 0 and {}, got {}", MAX_AGE, age))
            })?;

        Ok(Self {
            gender,
            age,
            symptoms: symptoms.into(),
            medical_history: medical_history.into(),
        })
    }
}

/// Which model API the submitted key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ApiProvider {
    #[default]
    #[serde(rename = "OpenAI API", alias = "openai")]
    OpenAi,
    #[serde(rename = "Google API", alias = "google")]
    Google,
}

impl ApiProvider {
    pub const ALL: [ApiProvider; 2] = [ApiProvider::OpenAi, ApiProvider::Google];

    pub fn label(&self) -> &'static str {
        match self {
            ApiProvider::OpenAi => "OpenAI API",
            ApiProvider::Google => "Google API",
        }
    }
}

/// An API key scoped to one run. Never written to process environment.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    provider: ApiProvider,
    key: String,
}

impl Credential {
    /// Rejects empty and whitespace-only keys; the key format itself is not checked
    pub fn new(provider: ApiProvider, key: impl Into<String>) -> AppResult<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(AppError::MissingCredential);
        }
        Ok(Self { provider, key })
    }

    pub fn provider(&self) -> ApiProvider {
        self.provider
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("provider", &self.provider)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Form submission, accepted both urlencoded and as JSON. Not `Debug`: it carries the raw key.
///
/// `age` stays as submitted (a browser sends `age=` for a cleared number field) and is only
/// parsed once the credential has been checked.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsultationRequest {
    pub api_type: ApiProvider,
    pub api_key: String,
    pub gender: Gender,
    #[serde(deserialize_with = "number_or_text")]
    pub age: String,
    pub symptoms: String,
    pub medical_history: String,
}

impl Default for ConsultationRequest {
    fn default() -> Self {
        Self {
            api_type: ApiProvider::default(),
            api_key: String::new(),
            gender: Gender::default(),
            age: DEFAULT_AGE.to_string(),
            symptoms: DEFAULT_SYMPTOMS.to_string(),
            medical_history: DEFAULT_MEDICAL_HISTORY.to_string(),
        }
    }
}

impl ConsultationRequest {
    /// Splits the submission into the run's credential and profile.
    ///
    /// The credential is checked first, so a missing key is reported even when other fields
    /// are invalid.
    pub fn into_parts(self) -> AppResult<(Credential, PatientProfile)> {
        let credential = Credential::new(self.api_type, self.api_key)?;
        let age = self.age.trim().parse::<i64>().map_err(|_| {
            AppError::Validation(format!(
                "age must be a whole number between 0 and {}, got '{}'",
                MAX_AGE, self.age
            ))
        })?;
        let profile = PatientProfile::new(self.gender, age, self.symptoms, self.medical_history)?;
        Ok((credential, profile))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(i64),
    Text(String),
}

/// JSON clients send a number, forms send text
fn number_or_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(number) => number.to_string(),
        NumberOrText::Text(text) => text,
    })
}

/// Downloadable report as sent to the browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub filename: String,
    pub mime_type: String,
    pub base64: String,
    pub download_link: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Authentication,
    Upstream,
    Internal,
}

/// Result of one consultation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConsultationOutcome {
    Completed {
        run_id: String,
        result: String,
        diagnosis: Option<String>,
        report: Option<ReportPayload>,
        report_error: Option<String>,
    },
    Failed {
        kind: FailureKind,
        reason: String,
    },
}

impl ConsultationOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ConsultationOutcome::Completed { .. })
    }
}
