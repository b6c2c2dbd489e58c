//! Error taxonomy shared by fetchers, the normalizer and the checker.
//!
//! Every variant is recovered where it is raised: a failing source contributes
//! nothing, a failing probe marks its endpoint dead and an invalid entry is
//! dropped. Only driver-level failures reach `main`, as `anyhow::Error`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    /// Network or HTTP-level failure talking to a source or through a proxy
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The body could not be parsed as the expected HTML, JSON or text
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Raw text that is not a usable `host:port` pair
    #[error("invalid endpoint: {0:?}")]
    InvalidEndpoint(String),
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProxyError::MalformedResponse(err.to_string())
        } else if err.is_timeout() {
            ProxyError::SourceUnavailable(format!("timed out: {err}"))
        } else {
            ProxyError::SourceUnavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(err: serde_json::Error) -> Self {
        ProxyError::MalformedResponse(err.to_string())
    }
}
