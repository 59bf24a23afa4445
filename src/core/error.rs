use thiserror::Error;

#[derive(Debug, Error)]
pub enum SipError {
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("schedule export failed: {0}")]
    Export(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl SipError {
    pub(crate) fn invalid(field: &str, reason: &str) -> Self {
        SipError::InvalidInput {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<csv::Error> for SipError {
    fn from(e: csv::Error) -> Self {
        SipError::Export(e.to_string())
    }
}

impl From<serde_json::Error> for SipError {
    fn from(e: serde_json::Error) -> Self {
        SipError::Serialization(e.to_string())
    }
}

pub type SipResult<T> = Result<T, SipError>;
