use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    cache::CachedGenerator,
    error::GenerationError,
    journal::ConsultationLog,
    terms::{TermValidator, normalize},
};

pub const REJECTION_PROMPT: &str = "Please enter a valid medical symptom or condition.";
pub const DURATION_PROMPT: &str = "How long have you had this symptom?";
pub const SEVERITY_PROMPT: &str = "On a scale of 1-10, how severe is it?";
pub const DECISION_PROMPT: &str =
    "Would you like to know precautions and when to see a doctor? (yes/no)";
pub const CLOSING_MESSAGE: &str = "Thank you for using AIMCA!";

/// Where a consultation currently is. Each variant names the answer it is waiting for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStage {
    #[default]
    AwaitingSymptom,
    AwaitingDuration,
    AwaitingSeverity,
    AwaitingFollowups,
    AwaitingDecision,
}

pub fn advice_prompt(symptom: &str) -> String {
    format!(
        "Provide a structured response for the symptom: {}. \
        Include Definition, Causes, Symptoms, Risk Factors, Precautions, and When to Consult a Doctor. \
        Also, suggest which specialist doctor to visit.",
        symptom
    )
}

/// Everything a consultation needs that is shared between sessions:
/// the term gate, the question script, the cached generator and the transcript.
pub struct Consultant {
    validator: TermValidator,
    followup_questions: Vec<String>,
    label: String,
    generator: CachedGenerator,
    transcript: ConsultationLog,
}

impl Consultant {
    pub fn new(
        validator: TermValidator,
        followup_questions: Vec<String>,
        label: impl Into<String>,
        generator: CachedGenerator,
        transcript: ConsultationLog,
    ) -> Self {
        Self {
            validator,
            followup_questions,
            label: label.into(),
            generator,
            transcript,
        }
    }

    pub fn followup_questions(&self) -> &[String] {
        &self.followup_questions
    }

    pub async fn structured_advice(&self, symptom: &str) -> Result<String, GenerationError> {
        self.generator.generate(&advice_prompt(symptom)).await
    }
}

/// Read-only view of a session, for status endpoints and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub stage: ConsultationStage,
    pub current_symptom: Option<String>,
    pub followup_index: usize,
}

/// One user's consultation. Only [`ConsultationSession::advance`] mutates it.
pub struct ConsultationSession {
    id: String,
    consultant: Arc<Consultant>,
    stage: ConsultationStage,
    current_symptom: Option<String>,
    followup_index: usize,
    duration: Option<String>,
    severity: Option<String>,
}

impl ConsultationSession {
    pub fn new(id: impl Into<String>, consultant: Arc<Consultant>) -> Self {
        Self {
            id: id.into(),
            consultant,
            stage: ConsultationStage::AwaitingSymptom,
            current_symptom: None,
            followup_index: 0,
            duration: None,
            severity: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn stage(&self) -> ConsultationStage {
        self.stage
    }

    pub fn current_symptom(&self) -> Option<&str> {
        self.current_symptom.as_deref()
    }

    pub fn followup_index(&self) -> usize {
        self.followup_index
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            stage: self.stage,
            current_symptom: self.current_symptom.clone(),
            followup_index: self.followup_index,
        }
    }

    /// Feed one user message and get the assistant's next message.
    pub async fn advance(&mut self, user_input: &str) -> String {
        let consultant = self.consultant.clone();
        consultant
            .transcript
            .record(&self.id, &format!("User: {}", user_input))
            .await;

        let from = self.stage;
        let reply = format!("{}{}", consultant.label, self.step(user_input).await);
        info!(
            session_id = %self.id,
            from = ?from,
            to = ?self.stage,
            "Consultation advanced"
        );

        consultant.transcript.record(&self.id, &reply).await;
        reply
    }

    async fn step(&mut self, user_input: &str) -> String {
        match self.stage {
            ConsultationStage::AwaitingSymptom => {
                if !self.consultant.validator.is_valid(user_input) {
                    return REJECTION_PROMPT.to_string();
                }
                self.current_symptom = Some(normalize(user_input));
                self.followup_index = 0;
                self.stage = ConsultationStage::AwaitingDuration;
                DURATION_PROMPT.to_string()
            }
            ConsultationStage::AwaitingDuration => {
                self.duration = Some(user_input.trim().to_string());
                self.stage = ConsultationStage::AwaitingSeverity;
                SEVERITY_PROMPT.to_string()
            }
            ConsultationStage::AwaitingSeverity => {
                self.severity = Some(user_input.trim().to_string());
                self.stage = ConsultationStage::AwaitingFollowups;
                self.next_followup()
            }
            ConsultationStage::AwaitingFollowups => self.next_followup(),
            ConsultationStage::AwaitingDecision => {
                let wants_advice = normalize(user_input) == "yes";
                let symptom = self.current_symptom.take();
                self.reset();

                match symptom {
                    Some(symptom) if wants_advice => {
                        match self.consultant.structured_advice(&symptom).await {
                            Ok(advice) => advice,
                            Err(e) => {
                                warn!(session_id = %self.id, error = %e, "Advice generation failed");
                                format!("Error: {}", e)
                            }
                        }
                    }
                    _ => CLOSING_MESSAGE.to_string(),
                }
            }
        }
    }

    fn next_followup(&mut self) -> String {
        match self.consultant.followup_questions.get(self.followup_index) {
            Some(question) => {
                self.followup_index += 1;
                question.clone()
            }
            None => {
                self.followup_index = 0;
                self.stage = ConsultationStage::AwaitingDecision;
                DECISION_PROMPT.to_string()
            }
        }
    }

    fn reset(&mut self) {
        self.stage = ConsultationStage::AwaitingSymptom;
        self.current_symptom = None;
        self.followup_index = 0;
        self.duration = None;
        self.severity = None;
    }
}
