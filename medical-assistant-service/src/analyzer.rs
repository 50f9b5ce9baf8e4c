use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    error::AnalysisError,
    extract::{DocumentExtractor, join_pages},
    journal::AnalysisLog,
    llm::TextGenerator,
};

pub fn analysis_prompt(report_text: &str) -> String {
    format!(
        "Analyze the following pathology report and provide a structured response including:\n\
        1. Identified abnormalities\n\
        2. Possible risk factors\n\
        3. Recommended next steps\n\
        4. Suggested specialist doctor to consult\n\
        5. At-home remedies or lifestyle changes (if applicable)\n\n\
        Report:\n{}",
        report_text
    )
}

/// Extract → analyze → log for a single uploaded report.
///
/// Generation goes straight to the collaborator; reports are never cached.
pub struct ReportAnalyzer {
    source_path: PathBuf,
    extracted_text: String,
    extractor: Arc<dyn DocumentExtractor>,
    generator: Arc<dyn TextGenerator>,
    log: AnalysisLog,
}

impl ReportAnalyzer {
    pub fn new(
        source_path: impl Into<PathBuf>,
        extractor: Arc<dyn DocumentExtractor>,
        generator: Arc<dyn TextGenerator>,
        log: AnalysisLog,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            extracted_text: String::new(),
            extractor,
            generator,
            log,
        }
    }

    pub fn extracted_text(&self) -> &str {
        &self.extracted_text
    }

    pub async fn extract_text(&mut self) -> Result<&str, AnalysisError> {
        let extractor = self.extractor.clone();
        let path = self.source_path.clone();
        let pages = tokio::task::spawn_blocking(move || extractor.extract_pages(&path))
            .await
            .map_err(|e| AnalysisError::Extraction(format!("extraction task failed: {}", e)))??;

        self.extracted_text = join_pages(&pages)?;
        info!(
            path = %self.source_path.display(),
            chars = self.extracted_text.len(),
            "Extracted report text"
        );
        Ok(&self.extracted_text)
    }

    pub async fn analyze(&self) -> Result<String, AnalysisError> {
        if self.extracted_text.is_empty() {
            return Err(AnalysisError::NoReadableText);
        }
        let response = self
            .generator
            .generate(&analysis_prompt(&self.extracted_text))
            .await?;
        Ok(response.trim().to_string())
    }

    /// Every analysis outcome is logged, including generation failures.
    pub async fn log_analysis(&self, result: &Result<String, AnalysisError>) -> std::io::Result<()> {
        let body = match result {
            Ok(analysis) => analysis.clone(),
            Err(e) => e.to_string(),
        };
        self.log.record(&body).await
    }

    pub async fn run(mut self) -> Result<String, AnalysisError> {
        info!(path = %self.source_path.display(), "Extracting text from pathology report");
        let extracted = self.extract_text().await.map(|text| text.len());
        if let Err(e) = extracted {
            warn!(path = %self.source_path.display(), error = %e, "Extraction failed");
            return Err(e);
        }

        info!("Analyzing report with LLM");
        let result = self.analyze().await;

        info!("Logging analysis result");
        if let Err(e) = self.log_analysis(&result).await {
            error!(error = %e, "Failed to write analysis log");
            if result.is_ok() {
                return Err(AnalysisError::Log(e));
            }
        }

        result
    }
}
