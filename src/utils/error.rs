use thiserror::Error;

/// 診斷輸出中回應內容的最大字元數
pub const BODY_PREVIEW_CHARS: usize = 500;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Missing API key: set {env_var}")]
    MissingApiKey { env_var: String },

    #[error("Required file not found: {path}")]
    MissingPrecondition { path: String },

    #[error("Request failed: {0}")]
    TransportError(#[from] reqwest::Error),

    #[error("HTTP error (status {status}): {body}")]
    HttpStatusError { status: u16, body: String },

    #[error("JSON parse failed: {message}; body: {body}")]
    DecodeError { message: String, body: String },

    #[error("Invalid base64 image payload: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("No image returned for {step}")]
    NoImagesError { step: String },

    #[error("Unusable reply for {step}: {message}")]
    ExtractionError {
        step: String,
        message: String,
        content: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Api,
    Data,
    FileSystem,
}

pub type Result<T> = std::result::Result<T, ProbeError>;

impl ProbeError {
    /// 程序退出碼：1 前置條件與其他本地錯誤、2 傳輸、3 HTTP 狀態、4 回應本文不是 JSON
    pub fn exit_code(&self) -> i32 {
        match self {
            ProbeError::TransportError(_) => 2,
            ProbeError::HttpStatusError { .. } => 3,
            ProbeError::DecodeError { .. } => 4,
            _ => 1,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ProbeError::MissingApiKey { .. }
            | ProbeError::ConfigError { .. }
            | ProbeError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            ProbeError::TransportError(_) => ErrorCategory::Network,
            ProbeError::HttpStatusError { .. }
            | ProbeError::NoImagesError { .. }
            | ProbeError::ExtractionError { .. } => ErrorCategory::Api,
            ProbeError::DecodeError { .. }
            | ProbeError::Base64Error(_)
            | ProbeError::SerializationError(_) => ErrorCategory::Data,
            ProbeError::MissingPrecondition { .. } | ProbeError::IoError(_) => {
                ErrorCategory::FileSystem
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ProbeError::MissingApiKey { env_var } => {
                format!("API key not found. Please set the {} environment variable", env_var)
            }
            ProbeError::MissingPrecondition { path } => {
                format!("Required file not found: {}", path)
            }
            ProbeError::TransportError(e) => format!("Request could not be sent: {}", e),
            ProbeError::HttpStatusError { status, body } => {
                format!("HTTP error (Status Code: {})\nResponse: {}", status, body)
            }
            ProbeError::DecodeError { body, .. } => {
                format!("JSON parse failed\nResponse: {}", body)
            }
            ProbeError::NoImagesError { step } => format!("No image found in response for {}", step),
            ProbeError::ExtractionError {
                step,
                message,
                content,
            } => format!("{} for {}\nContent: {}", message, step, content),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check environment variables, the --config file and command-line flags"
            }
            ErrorCategory::Network => "Check network connectivity and the base URL",
            ErrorCategory::Api => "Check the API key, model id and account quota",
            ErrorCategory::Data => "The endpoint may not be chat-completion compatible",
            ErrorCategory::FileSystem => {
                "Check the input paths; run the references step before the storyboard step"
            }
        }
    }

    pub(crate) fn http_status(status: u16, body: &str, limit: usize) -> Self {
        ProbeError::HttpStatusError {
            status,
            body: truncate_chars(body, limit),
        }
    }

    pub(crate) fn extraction(step: &str, message: &str, content: &str) -> Self {
        ProbeError::ExtractionError {
            step: step.to_string(),
            message: message.to_string(),
            content: truncate_chars(content, BODY_PREVIEW_CHARS),
        }
    }

    pub(crate) fn decode(err: serde_json::Error, body: &str, limit: usize) -> Self {
        ProbeError::DecodeError {
            message: err.to_string(),
            body: truncate_chars(body, limit),
        }
    }
}

/// 依字元（而非位元組）截斷，避免切在 UTF-8 邊界中間
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
