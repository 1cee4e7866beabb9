use super::{
    EngineError, EngineEvent, EngineFactory, ErrorCode, RecognitionConfig, SessionId,
    SpeechEngine, SpeechEvent,
};
use crate::microphone::{AudioConstraints, AudioSource, MicrophoneAccess, MicrophoneError};
use crate::runtime::GameEvent;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc::Sender;
use std::time::Duration;

/// How fast the simulated input energy fades per sampled frame
const ENERGY_DECAY: f32 = 0.85;

#[derive(Debug)]
struct FeedState {
    tx: Sender<GameEvent>,
    listening: Option<SessionId>,
    utterance: String,
    confidence: f32,
    energy: f32,
    silence_timeout: Duration,
    last_activity: Option<Duration>,
    language: String,
}

impl FeedState {
    fn emit(&self, id: SessionId, event: EngineEvent) -> bool {
        self.tx
            .send(GameEvent::Speech(SpeechEvent::new(id, event)))
            .is_ok()
    }
}

/// Keyboard-backed stand-in for a speech recognizer.
///
/// Typed characters become interim transcripts of the current utterance,
/// Enter turns the utterance into a final transcript, and a stretch of
/// silence ends the session the way a real recognizer times out. Events go
/// straight into the game loop's channel.
#[derive(Debug, Clone)]
pub struct ConsoleFeed(Rc<RefCell<FeedState>>);

impl ConsoleFeed {
    pub fn new(tx: Sender<GameEvent>, silence_timeout: Duration, confidence: f32) -> Self {
        Self(Rc::new(RefCell::new(FeedState {
            tx,
            listening: None,
            utterance: String::new(),
            confidence: confidence.clamp(0.0, 1.0),
            energy: 0.0,
            silence_timeout,
            last_activity: None,
            language: String::new(),
        })))
    }

    pub fn is_listening(&self) -> bool {
        self.0.borrow().listening.is_some()
    }

    pub fn utterance(&self) -> String {
        self.0.borrow().utterance.clone()
    }

    pub fn language(&self) -> String {
        self.0.borrow().language.clone()
    }

    pub fn energy(&self) -> f32 {
        self.0.borrow().energy
    }

    /// Extend the utterance. Ignored while nobody is listening.
    pub fn type_char(&self, c: char, now: Duration) -> bool {
        let mut state = self.0.borrow_mut();
        let Some(id) = state.listening else {
            return false;
        };
        state.utterance.push(c);
        state.energy = 1.0;
        state.last_activity = Some(now);
        state.emit(
            id,
            EngineEvent::Result {
                transcript: state.utterance.clone(),
                confidence: state.confidence,
                is_final: false,
            },
        )
    }

    pub fn backspace(&self, now: Duration) -> bool {
        let mut state = self.0.borrow_mut();
        let Some(id) = state.listening else {
            return false;
        };
        if state.utterance.pop().is_none() {
            return false;
        }
        state.last_activity = Some(now);
        if state.utterance.is_empty() {
            return true;
        }
        state.emit(
            id,
            EngineEvent::Result {
                transcript: state.utterance.clone(),
                confidence: state.confidence,
                is_final: false,
            },
        )
    }

    /// Finish the utterance as a final transcript
    pub fn submit(&self, now: Duration) -> bool {
        let mut state = self.0.borrow_mut();
        let Some(id) = state.listening else {
            return false;
        };
        let transcript = std::mem::take(&mut state.utterance);
        if transcript.trim().is_empty() {
            return false;
        }
        state.last_activity = Some(now);
        state.emit(
            id,
            EngineEvent::Result {
                transcript,
                confidence: state.confidence,
                is_final: true,
            },
        )
    }

    /// Fail the running session with `code`. The recognizer stops, so the
    /// error is followed by an end event.
    pub fn inject_error(&self, code: ErrorCode) -> bool {
        let mut state = self.0.borrow_mut();
        let Some(id) = state.listening.take() else {
            return false;
        };
        state.utterance.clear();
        state.emit(id, EngineEvent::Error(code)) && state.emit(id, EngineEvent::Ended)
    }

    /// End the session once the player has been silent long enough
    pub fn poll(&self, now: Duration) {
        let mut state = self.0.borrow_mut();
        let Some(id) = state.listening else {
            return;
        };
        let last = *state.last_activity.get_or_insert(now);
        if now.saturating_sub(last) >= state.silence_timeout {
            tracing::debug!(session = %id, "console recognizer timed out on silence");
            state.listening = None;
            state.utterance.clear();
            state.emit(id, EngineEvent::Ended);
        }
    }

    fn take_energy(&self) -> f32 {
        let mut state = self.0.borrow_mut();
        let energy = state.energy;
        state.energy *= ENERGY_DECAY;
        if state.energy < 0.01 {
            state.energy = 0.0;
        }
        energy
    }
}

#[derive(Debug)]
pub struct ConsoleEngineFactory {
    feed: ConsoleFeed,
}

impl ConsoleEngineFactory {
    pub fn new(feed: ConsoleFeed) -> Self {
        Self { feed }
    }
}

impl EngineFactory for ConsoleEngineFactory {
    fn create(
        &mut self,
        id: SessionId,
        config: &RecognitionConfig,
    ) -> Result<Box<dyn SpeechEngine>, EngineError> {
        self.feed.0.borrow_mut().language = config.language.clone();
        Ok(Box::new(ConsoleEngine {
            id,
            feed: self.feed.clone(),
        }))
    }
}

#[derive(Debug)]
pub struct ConsoleEngine {
    id: SessionId,
    feed: ConsoleFeed,
}

impl SpeechEngine for ConsoleEngine {
    fn start(&mut self) -> Result<(), EngineError> {
        let mut state = self.feed.0.borrow_mut();
        if state.listening == Some(self.id) {
            return Err(EngineError::AlreadyStarted);
        }
        state.listening = Some(self.id);
        state.utterance.clear();
        state.last_activity = None;
        if !state.emit(self.id, EngineEvent::Started) {
            state.listening = None;
            return Err(EngineError::Failed("event loop is gone".into()));
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        let mut state = self.feed.0.borrow_mut();
        if state.listening == Some(self.id) {
            state.listening = None;
            state.utterance.clear();
            state.emit(self.id, EngineEvent::Ended);
        }
        Ok(())
    }

    fn detach(&mut self) {
        let mut state = self.feed.0.borrow_mut();
        if state.listening == Some(self.id) {
            state.listening = None;
            state.utterance.clear();
        }
    }
}

/// Microphone whose level follows typing activity on the console feed
#[derive(Debug)]
pub struct ConsoleMicrophone {
    feed: ConsoleFeed,
    denied: bool,
}

impl ConsoleMicrophone {
    pub fn new(feed: ConsoleFeed) -> Self {
        Self {
            feed,
            denied: false,
        }
    }

    /// Refuse every permission request
    pub fn denied(mut self) -> Self {
        self.denied = true;
        self
    }
}

impl MicrophoneAccess for ConsoleMicrophone {
    fn request(
        &mut self,
        _constraints: &AudioConstraints,
    ) -> Result<Box<dyn AudioSource>, MicrophoneError> {
        if self.denied {
            return Err(MicrophoneError::PermissionDenied);
        }
        Ok(Box::new(ConsoleAudioSource {
            feed: Some(self.feed.clone()),
        }))
    }
}

#[derive(Debug)]
pub struct ConsoleAudioSource {
    feed: Option<ConsoleFeed>,
}

impl AudioSource for ConsoleAudioSource {
    fn frequency_data(&mut self, bins: &mut [u8]) {
        let energy = self.feed.as_ref().map_or(0.0, ConsoleFeed::take_energy);
        let n = bins.len().max(1) as f32;
        // louder in the low bins, tapering off towards the top
        for (i, bin) in bins.iter_mut().enumerate() {
            let shape = 1.0 - 0.5 * (i as f32 / n);
            *bin = (energy * shape * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    }

    fn release(&mut self) {
        self.feed = None;
    }
}
