pub mod config;
pub mod consultation;
pub mod error;
pub mod models;
pub mod page;
pub mod report;
pub mod service;
pub mod workflow;

pub use config::ServiceConfig;
pub use consultation::{Consultant, EngineFactory, RigEngineFactory};
pub use error::{AppError, AppResult};
pub use models::*;
pub use report::{Report, ReportError, ReportPackager};
pub use service::{AppState, build_router, create_app};
pub use workflow::{MedicalRoles, build_medical_pipeline, build_work_items};
