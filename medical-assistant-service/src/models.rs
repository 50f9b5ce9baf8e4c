use serde::{Deserialize, Serialize};

use crate::consultation::ConsultationStage;

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Conversation to continue. A new one is started when absent.
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub response: String,
    pub stage: ConsultationStage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub response: String,
}
