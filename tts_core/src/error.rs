use thiserror::Error;

/// Failures of a single synthesis request.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not enough audio codes generated: got {found}, need at least {required}")]
    InsufficientAudioCodes { found: usize, required: usize },

    #[error("Generation model error: {0}")]
    Generation(#[source] anyhow::Error),

    #[error("Audio decoder error: {0}")]
    Decoder(#[source] anyhow::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("WAV encoding error: {0}")]
    Encoding(#[from] hound::Error),
}

impl SynthesisError {
    /// True when the caller sent something we refuse to synthesize.
    pub fn is_client_error(&self) -> bool {
        matches!(self, SynthesisError::InvalidInput(_))
    }
}

pub type Result<T> = std::result::Result<T, SynthesisError>;
