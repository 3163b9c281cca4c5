use thiserror::Error;

#[derive(Error, Debug)]
pub enum CopilotError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Text extraction failed for {document}: {message}")]
    ExtractionError { document: String, message: String },

    #[error("Command `{command}` failed: {details}")]
    CommandError { command: String, details: String },

    #[error("LLM request failed ({provider}): {message}")]
    LlmError { provider: String, message: String },

    #[error("Vector store error: {message}")]
    VectorStoreError { message: String },

    #[error("Vector store not initialized at {path}")]
    NotInitialized { path: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Storage,
    Processing,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// CLI 退出碼：Low 視為成功
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl CopilotError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CopilotError::ConfigValidationError { .. }
            | CopilotError::InvalidConfigValueError { .. }
            | CopilotError::MissingConfigError { .. } => ErrorCategory::Configuration,
            CopilotError::HttpError(_) | CopilotError::LlmError { .. } => ErrorCategory::Network,
            CopilotError::IoError(_)
            | CopilotError::ZipError(_)
            | CopilotError::VectorStoreError { .. }
            | CopilotError::NotInitialized { .. } => ErrorCategory::Storage,
            CopilotError::CommandError { .. } => ErrorCategory::External,
            CopilotError::CsvError(_)
            | CopilotError::SerializationError(_)
            | CopilotError::ExtractionError { .. }
            | CopilotError::ProcessingError { .. } => ErrorCategory::Processing,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CopilotError::ExtractionError { .. } => ErrorSeverity::Low,
            CopilotError::HttpError(_)
            | CopilotError::LlmError { .. }
            | CopilotError::CommandError { .. } => ErrorSeverity::Medium,
            CopilotError::IoError(_) | CopilotError::ZipError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            CopilotError::ConfigValidationError { field, .. }
            | CopilotError::InvalidConfigValueError { field, .. } => {
                format!("Check the value of '{}' in safety-copilot.toml", field)
            }
            CopilotError::MissingConfigError { field } => {
                format!("Set '{}' in safety-copilot.toml or the environment", field)
            }
            CopilotError::HttpError(_) => {
                "Check network connectivity and the configured base URLs".to_string()
            }
            CopilotError::LlmError { provider, .. } => format!(
                "Verify the {} API key and model name; answers fall back to extracted text",
                provider
            ),
            CopilotError::CommandError { command, .. } => {
                format!("Make sure `{}` is installed and on PATH", command)
            }
            CopilotError::NotInitialized { .. } => {
                "Add documents under data/ and run safety-copilot-init".to_string()
            }
            CopilotError::VectorStoreError { .. } => {
                "Rebuild the vector store with safety-copilot-init".to_string()
            }
            CopilotError::ExtractionError { .. } => {
                "The document may be scanned or encrypted; try exporting it as text".to_string()
            }
            CopilotError::IoError(_) | CopilotError::ZipError(_) => {
                "Check file permissions and available disk space".to_string()
            }
            CopilotError::CsvError(_)
            | CopilotError::SerializationError(_)
            | CopilotError::ProcessingError { .. } => {
                "Run with --verbose to see which document caused the failure".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            CopilotError::NotInitialized { path } => {
                format!("No vector store found in {}. Run the initializer first.", path)
            }
            CopilotError::LlmError { provider, .. } => {
                format!("The {} language model could not be reached.", provider)
            }
            CopilotError::CommandError { command, .. } => {
                format!("External command `{}` did not complete.", command)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CopilotError>;
