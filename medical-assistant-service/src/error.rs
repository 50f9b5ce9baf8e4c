use thiserror::Error;

/// Failures of the external text-generation collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("OPENROUTER_API_KEY not set")]
    MissingApiKey,

    #[error("LLM request failed: {0}")]
    Provider(String),

    #[error("LLM request timed out after {0}s")]
    Timeout(u64),

    #[error("LLM returned an empty response")]
    EmptyResponse,
}

/// Failures of the report analysis pipeline.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Error extracting text: {0}")]
    Extraction(String),

    #[error("Error: No readable text found.")]
    NoReadableText,

    #[error("Error analyzing report: {0}")]
    Generation(#[from] GenerationError),

    #[error("Failed to write analysis log: {0}")]
    Log(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Upload failures, reported to the caller as a structured `{ "error": ... }` payload.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No file part")]
    NoFilePart,

    #[error("No selected file")]
    NoSelectedFile,

    #[error("File too large. Maximum {0} bytes.")]
    TooLarge(usize),

    #[error("Failed to read upload: {0}")]
    Multipart(String),

    #[error("Failed to save file: {0}")]
    Staging(#[from] std::io::Error),
}
