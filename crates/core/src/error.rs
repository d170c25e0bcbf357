use thiserror::Error;

/// Errors raised while loading or validating the configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid environment override {key}: {reason}")]
    Env { key: String, reason: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors raised while compiling a wildcard template.
#[derive(Error, Debug)]
pub enum PatternError {
    #[error("empty pattern")]
    Empty,

    #[error("pattern '{pattern}' does not compile: {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors returned by a [`Catalog`](crate::Catalog) implementation.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("catalog returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("{0}")]
    Other(String),
}
