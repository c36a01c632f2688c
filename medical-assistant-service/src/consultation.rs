use care_flow::{
    FlowError, LlmProvider, ModelSettings, PipelineRunner, ReasoningEngine, Retriever, RigEngine,
    SerperSearch,
};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    config::ServiceConfig,
    error::AppError,
    models::{ApiProvider, ConsultationOutcome, Credential, FailureKind, PatientProfile},
    report::ReportPackager,
    workflow::{DIAGNOSE_KEY, MedicalRoles, build_medical_pipeline},
};

/// Creates the reasoning engine for one run from that run's credential
pub trait EngineFactory: Send + Sync {
    fn engine_for(&self, credential: &Credential) -> Arc<dyn ReasoningEngine>;
}

/// Builds rig-core engines with the configured model for each provider
pub struct RigEngineFactory {
    openai: ModelSettings,
    google: ModelSettings,
}

impl RigEngineFactory {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            openai: config.openai_settings(),
            google: config.google_settings(),
        }
    }
}

impl EngineFactory for RigEngineFactory {
    fn engine_for(&self, credential: &Credential) -> Arc<dyn ReasoningEngine> {
        let (provider, settings) = match credential.provider() {
            ApiProvider::OpenAi => (LlmProvider::OpenAi, self.openai.clone()),
            ApiProvider::Google => (LlmProvider::Gemini, self.google.clone()),
        };
        Arc::new(RigEngine::new(provider, credential.key(), settings))
    }
}

/// Everything a run needs that is shared read-only across runs
pub struct Consultant {
    roles: MedicalRoles,
    engines: Arc<dyn EngineFactory>,
    retriever: Option<Arc<dyn Retriever>>,
    packager: ReportPackager,
}

impl Consultant {
    pub fn new(engines: Arc<dyn EngineFactory>, retriever: Option<Arc<dyn Retriever>>) -> Self {
        Self {
            roles: MedicalRoles::new(),
            engines,
            retriever,
            packager: ReportPackager::new(),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        let retriever: Option<Arc<dyn Retriever>> = match &config.serper_api_key {
            Some(key) => Some(Arc::new(SerperSearch::new(key.clone()))),
            None => {
                warn!("SERPER_API_KEY not set, roles will work without web search");
                None
            }
        };
        Self::new(Arc::new(RigEngineFactory::from_config(config)), retriever)
    }

    /// Runs diagnose then treat for one patient and packages the answer.
    ///
    /// Capability failures come back as [`ConsultationOutcome::Failed`]; a result that cannot be
    /// packaged still completes, without a report.
    pub async fn consult(
        &self,
        credential: Credential,
        profile: PatientProfile,
    ) -> ConsultationOutcome {
        let pipeline = match build_medical_pipeline(&profile, &self.roles) {
            Ok(pipeline) => pipeline,
            Err(e) => return failed(e),
        };

        let engine = self.engines.engine_for(&credential);
        let runner = PipelineRunner::new(engine, self.retriever.clone());

        let result = match runner.run(&pipeline).await {
            Ok(result) => result,
            Err(e) => {
                error!("Consultation failed: {}", e);
                return failed(e);
            }
        };

        let (report, report_error) = match self.packager.package(&result) {
            Ok(report) => (Some(report.to_payload()), None),
            Err(e) => {
                warn!("Report could not be packaged, returning text only: {}", e);
                (None, Some(e.to_string()))
            }
        };

        info!(run_id = %result.run_id, has_report = report.is_some(), "Consultation completed");
        ConsultationOutcome::Completed {
            run_id: result.run_id.to_string(),
            diagnosis: result.output(DIAGNOSE_KEY).map(|output| output.text.clone()),
            result: result.raw,
            report,
            report_error,
        }
    }
}

fn failed(error: FlowError) -> ConsultationOutcome {
    let kind = match &error {
        FlowError::Authentication(_) => FailureKind::Authentication,
        FlowError::Upstream(_) => FailureKind::Upstream,
        _ => FailureKind::Internal,
    };
    ConsultationOutcome::Failed {
        kind,
        reason: AppError::from(error).to_string(),
    }
}
