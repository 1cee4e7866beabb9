use crate::microphone::MicrophoneError;
use thiserror::Error;

/// Why voice mode could not be switched on
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VoiceError {
    #[error(transparent)]
    Microphone(#[from] MicrophoneError),
    #[error("voice control unavailable: {0}")]
    Unsupported(String),
}
