pub mod analyzer;
pub mod cache;
pub mod config;
pub mod consultation;
pub mod error;
pub mod extract;
pub mod journal;
pub mod llm;
pub mod models;
pub mod service;
pub mod sessions;
pub mod terms;

pub use analyzer::ReportAnalyzer;
pub use cache::{CachedGenerator, ResponseCache};
pub use config::AssistantConfig;
pub use consultation::{Consultant, ConsultationSession, ConsultationStage};
pub use error::{AnalysisError, ConfigError, GenerationError, UploadError};
pub use service::{AppState, build_router, create_app};
pub use sessions::{InMemorySessionStorage, SessionStorage};
