pub mod console;
pub mod scripted;

use std::fmt;
use thiserror::Error;

/// Identity of one recognition session object. Events are tagged with it so
/// anything a destroyed session still emits can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Settings handed to the engine when a session is built
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionConfig {
    pub continuous: bool,
    pub interim_results: bool,
    pub language: String,
    pub max_alternatives: u8,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            continuous: true,
            interim_results: true,
            language: "en-US".to_string(),
            max_alternatives: 3,
        }
    }
}

/// Error codes reported asynchronously by a running engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    Network,
    Aborted,
    AudioCapture,
    NotAllowed,
    ServiceNotAllowed,
    NoSpeech,
    LanguageNotSupported,
    BadGrammar,
    Other(String),
}

/// How the session manager reacts to an [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retried after a fixed delay, bounded by the attempt cap
    Transient,
    /// Fatal for this activation; permission must be requested again
    PermissionDenied,
    /// Fatal; voice control is unavailable in this runtime
    Unsupported,
    /// Logged only; the engine's end event takes care of restarting
    Benign,
}

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::Network => "network",
            ErrorCode::Aborted => "aborted",
            ErrorCode::AudioCapture => "audio-capture",
            ErrorCode::NotAllowed => "not-allowed",
            ErrorCode::ServiceNotAllowed => "service-not-allowed",
            ErrorCode::NoSpeech => "no-speech",
            ErrorCode::LanguageNotSupported => "language-not-supported",
            ErrorCode::BadGrammar => "bad-grammar",
            ErrorCode::Other(code) => code,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ErrorCode::Network | ErrorCode::Aborted | ErrorCode::AudioCapture => {
                ErrorClass::Transient
            }
            ErrorCode::NotAllowed | ErrorCode::ServiceNotAllowed => ErrorClass::PermissionDenied,
            ErrorCode::LanguageNotSupported | ErrorCode::BadGrammar => ErrorClass::Unsupported,
            ErrorCode::NoSpeech | ErrorCode::Other(_) => ErrorClass::Benign,
        }
    }

    /// Status line shown to the player
    pub fn status_text(&self) -> String {
        match self {
            ErrorCode::Network => "Network error - check connection".to_string(),
            ErrorCode::NotAllowed | ErrorCode::ServiceNotAllowed => {
                "Microphone access denied".to_string()
            }
            ErrorCode::Aborted => "Recognition aborted".to_string(),
            other => format!("Error: {}", other.as_str()),
        }
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        match code {
            "network" => ErrorCode::Network,
            "aborted" => ErrorCode::Aborted,
            "audio-capture" => ErrorCode::AudioCapture,
            "not-allowed" => ErrorCode::NotAllowed,
            "service-not-allowed" => ErrorCode::ServiceNotAllowed,
            "no-speech" => ErrorCode::NoSpeech,
            "language-not-supported" => ErrorCode::LanguageNotSupported,
            "bad-grammar" => ErrorCode::BadGrammar,
            other => ErrorCode::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callbacks of the external recognizer, flattened into one type
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Started,
    Result {
        transcript: String,
        confidence: f32,
        is_final: bool,
    },
    Error(ErrorCode),
    Ended,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechEvent {
    pub session: SessionId,
    pub event: EngineEvent,
}

impl SpeechEvent {
    pub fn new(session: SessionId, event: EngineEvent) -> Self {
        Self { session, event }
    }
}

/// Synchronous failures of engine calls
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("speech recognition is not supported: {0}")]
    Unsupported(String),
    #[error("recognition is already running")]
    AlreadyStarted,
    #[error("speech engine failure: {0}")]
    Failed(String),
}

/// One connection to an external speech recognizer.
///
/// Implementations deliver their callbacks as [`SpeechEvent`]s tagged with
/// the id they were created with.
pub trait SpeechEngine {
    fn start(&mut self) -> Result<(), EngineError>;
    fn stop(&mut self) -> Result<(), EngineError>;
    /// Stop delivering events for good. Called before the session is dropped.
    fn detach(&mut self) {}
}

/// Builds engine sessions; the seam where an unsupported runtime shows up
pub trait EngineFactory {
    fn create(
        &mut self,
        id: SessionId,
        config: &RecognitionConfig,
    ) -> Result<Box<dyn SpeechEngine>, EngineError>;

    /// Cheap availability check before voice mode is offered
    fn is_supported(&self) -> bool {
        true
    }
}
