//! Council pipeline error types

use thiserror::Error;

/// Pipeline error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineError {
    pub kind: PipelineErrorKind,
    pub message: String,
}

impl PipelineError {
    #[must_use]
    pub fn new(kind: PipelineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::Network, message)
    }

    #[must_use]
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::Server, message)
    }

    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::Decode, message)
    }

    #[must_use]
    pub fn council(message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::Council, message)
    }
}

/// Where a pipeline failure originated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    /// Connection dropped, timeouts
    Network,
    /// Backend answered with a non-success status
    Server,
    /// A frame or payload could not be decoded
    Decode,
    /// The council itself reported an error event
    Council,
}

/// Rejections raised while validating a decoded stage payload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("response label is empty")]
    EmptyLabel,
    #[error("duplicate response label: {0}")]
    DuplicateLabel(String),
}
