//! Askama template for the single-page form

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::models::{
    ApiProvider, ConsultationOutcome, ConsultationRequest, DEFAULT_AGE, DEFAULT_MEDICAL_HISTORY,
    DEFAULT_SYMPTOMS, Gender,
};

/// Helper function to convert Askama templates to Axum responses
fn render_template<T: Template>(template: T) -> Response {
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("Template rendering error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Template error: {}", e),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Clone)]
pub struct SelectOption {
    pub value: &'static str,
    pub selected: bool,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub api_options: Vec<SelectOption>,
    pub gender_options: Vec<SelectOption>,
    /// Label of the selected provider, shown in the key prompt
    pub api_label: &'static str,
    pub age: String,
    pub symptoms: String,
    pub medical_history: String,
    pub error: Option<String>,
    pub result: Option<String>,
    pub download_link: Option<String>,
    pub report_error: Option<String>,
}

impl IndexTemplate {
    /// Empty form with the default field values
    pub fn blank() -> Self {
        Self::with_values(
            ApiProvider::default(),
            Gender::default(),
            &DEFAULT_AGE.to_string(),
            DEFAULT_SYMPTOMS,
            DEFAULT_MEDICAL_HISTORY,
        )
    }

    /// Form echoing what was submitted, except the key
    pub fn from_request(request: &ConsultationRequest) -> Self {
        Self::with_values(
            request.api_type,
            request.gender,
            &request.age,
            &request.symptoms,
            &request.medical_history,
        )
    }

    fn with_values(
        api_type: ApiProvider,
        gender: Gender,
        age: &str,
        symptoms: &str,
        medical_history: &str,
    ) -> Self {
        Self {
            api_options: ApiProvider::ALL
                .iter()
                .map(|provider| SelectOption {
                    value: provider.label(),
                    selected: *provider == api_type,
                })
                .collect(),
            gender_options: Gender::ALL
                .iter()
                .map(|option| SelectOption {
                    value: option.as_str(),
                    selected: *option == gender,
                })
                .collect(),
            api_label: api_type.label(),
            age: age.to_string(),
            symptoms: symptoms.to_string(),
            medical_history: medical_history.to_string(),
            error: None,
            result: None,
            download_link: None,
            report_error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_outcome(mut self, outcome: ConsultationOutcome) -> Self {
        match outcome {
            ConsultationOutcome::Completed {
                result,
                report,
                report_error,
                ..
            } => {
                self.result = Some(result);
                self.download_link = report.map(|report| report.download_link);
                self.report_error = report_error;
            }
            ConsultationOutcome::Failed { reason, .. } => {
                self.error = Some(reason);
            }
        }
        self
    }
}

impl IntoResponse for IndexTemplate {
    fn into_response(self) -> Response {
        render_template(self)
    }
}
