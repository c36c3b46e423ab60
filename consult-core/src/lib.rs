pub mod error;
pub mod models;
pub mod prompt;
pub mod provider;
pub mod rate_limit;
pub mod service;
pub mod storage;
pub mod storage_postgres;

// Re-export commonly used types
pub use error::{ConsultError, Result};
pub use models::{
    AiProvider, ConsultationRequest, ConsultationTurn, Gender, HealthReport, PatientInfo,
    SessionHistory,
};
pub use provider::{DoctorModel, ProviderRegistry, RigDoctor, gemini_doctor, grok_doctor};
pub use rate_limit::RateLimiter;
pub use service::{ConsultSettings, ConsultationService, SERVICE_NAME};
pub use storage::{ConsultationStore, InMemoryConsultationStore};
pub use storage_postgres::PostgresConsultationStore;
