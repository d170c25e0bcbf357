use autopattern_core::{CatalogError, PatternError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KibanaError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid Kibana URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Kibana returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("invalid Kibana version '{0}'")]
    Version(String),

    #[error("Kibana unreachable after {attempts} attempts")]
    Unreachable { attempts: u32 },

    #[error("cancelled")]
    Cancelled,
}

impl From<KibanaError> for CatalogError {
    fn from(e: KibanaError) -> Self {
        match e {
            KibanaError::Status { status, body } => CatalogError::Status { status, body },
            KibanaError::Decode(msg) => CatalogError::Decode(msg),
            KibanaError::Http(e) if e.is_decode() => CatalogError::Decode(e.to_string()),
            KibanaError::Http(e) => CatalogError::Request(e.to_string()),
            other => CatalogError::Other(other.to_string()),
        }
    }
}
