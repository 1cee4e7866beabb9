use thiserror::Error;

/// Processing requested from the capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MicrophoneError {
    #[error("microphone permission denied")]
    PermissionDenied,
    #[error("no microphone detected")]
    DeviceNotFound,
    #[error("microphone error: {0}")]
    Other(String),
}

impl MicrophoneError {
    /// Prompt shown when voice mode has to fall back to the keyboard
    pub fn fallback_message(&self) -> String {
        match self {
            MicrophoneError::PermissionDenied => "You need to allow microphone access for voice \
                 control to work. Starting with keyboard controls instead."
                .to_string(),
            MicrophoneError::DeviceNotFound => {
                "No microphone detected. Starting with keyboard controls instead.".to_string()
            }
            MicrophoneError::Other(reason) => {
                format!("Microphone error: {reason}. Starting with keyboard controls instead.")
            }
        }
    }
}

/// A live capture stream with an attached frequency analyser
pub trait AudioSource {
    /// Fill `bins` with the current byte frequency magnitudes (0..=255)
    fn frequency_data(&mut self, bins: &mut [u8]);
    /// Stop the capture track and tear down the analyser
    fn release(&mut self);
}

/// Permission gate in front of the capture device
pub trait MicrophoneAccess {
    fn request(
        &mut self,
        constraints: &AudioConstraints,
    ) -> Result<Box<dyn AudioSource>, MicrophoneError>;
}
