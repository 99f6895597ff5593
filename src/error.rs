// src/error.rs
//! Error kinds the pipeline must be able to tell apart: a malformed model
//! response degrades the stage, a config error or an empty run aborts it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("configuration error: {0}")]
    Config(String),

    /// The model replied, but not with the structure we asked for.
    /// Callers downgrade this to an empty stage result.
    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    /// Transport or API failure while calling the model.
    #[error("model call failed: {0}")]
    Model(String),

    /// Nothing survived to assemble: no analyzed items and no tutorial.
    #[error("nothing to deliver")]
    EmptyRun,
}

impl DigestError {
    /// Aborting errors stop the run before assembly; everything else
    /// degrades the digest and lets the run finish.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DigestError::Config(_) | DigestError::EmptyRun)
    }
}
