use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("{field} {reason}")]
    InvalidParameter { field: &'static str, reason: String },

    #[error("Could not read parameters from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SimError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        SimError::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;
