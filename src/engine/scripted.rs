use super::{
    EngineError, EngineEvent, EngineFactory, RecognitionConfig, SessionId, SpeechEngine,
    SpeechEvent,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Everything the scripted engines were asked to do
#[derive(Debug, Default)]
pub struct ProbeState {
    pub created: Vec<SessionId>,
    pub started: Vec<SessionId>,
    pub detached: Vec<SessionId>,
    pub running: Option<SessionId>,
    /// `start()` calls made while another session was still running
    pub overlapping_starts: u32,
    pub failing_starts: u32,
    pub unsupported: bool,
}

/// Shared view of a [`ScriptedFactory`] for assertions and fault injection
#[derive(Debug, Clone, Default)]
pub struct EngineProbe(Rc<RefCell<ProbeState>>);

impl EngineProbe {
    /// Make the next `n` calls to `start()` fail synchronously
    pub fn fail_next_starts(&self, n: u32) {
        self.0.borrow_mut().failing_starts = n;
    }

    pub fn set_unsupported(&self, unsupported: bool) {
        self.0.borrow_mut().unsupported = unsupported;
    }

    pub fn created(&self) -> Vec<SessionId> {
        self.0.borrow().created.clone()
    }

    pub fn start_calls(&self) -> usize {
        self.0.borrow().started.len()
    }

    pub fn detached(&self) -> Vec<SessionId> {
        self.0.borrow().detached.clone()
    }

    pub fn running(&self) -> Option<SessionId> {
        self.0.borrow().running
    }

    pub fn overlapping_starts(&self) -> u32 {
        self.0.borrow().overlapping_starts
    }

    /// Build an event as if session `id` emitted it. Errors and end events
    /// mean the recognizer stopped listening on its own.
    pub fn event(&self, id: SessionId, event: EngineEvent) -> SpeechEvent {
        if matches!(event, EngineEvent::Error(_) | EngineEvent::Ended) {
            let mut state = self.0.borrow_mut();
            if state.running == Some(id) {
                state.running = None;
            }
        }
        SpeechEvent::new(id, event)
    }
}

/// Engine factory that performs no recognition. Events are injected by the
/// caller, which makes it the engine of choice for headless runs.
#[derive(Debug, Default)]
pub struct ScriptedFactory {
    probe: EngineProbe,
}

impl ScriptedFactory {
    pub fn new() -> (Self, EngineProbe) {
        let probe = EngineProbe::default();
        (
            Self {
                probe: probe.clone(),
            },
            probe,
        )
    }
}

impl EngineFactory for ScriptedFactory {
    fn create(
        &mut self,
        id: SessionId,
        _config: &RecognitionConfig,
    ) -> Result<Box<dyn SpeechEngine>, EngineError> {
        let mut state = self.probe.0.borrow_mut();
        if state.unsupported {
            return Err(EngineError::Unsupported("scripted engine disabled".into()));
        }
        state.created.push(id);
        Ok(Box::new(ScriptedEngine {
            id,
            probe: self.probe.clone(),
        }))
    }

    fn is_supported(&self) -> bool {
        !self.probe.0.borrow().unsupported
    }
}

#[derive(Debug)]
pub struct ScriptedEngine {
    id: SessionId,
    probe: EngineProbe,
}

impl SpeechEngine for ScriptedEngine {
    fn start(&mut self) -> Result<(), EngineError> {
        let mut state = self.probe.0.borrow_mut();
        if state.failing_starts > 0 {
            state.failing_starts -= 1;
            return Err(EngineError::Failed("recognizer busy".into()));
        }
        match state.running {
            Some(running) if running == self.id => return Err(EngineError::AlreadyStarted),
            Some(_) => state.overlapping_starts += 1,
            None => {}
        }
        state.running = Some(self.id);
        state.started.push(self.id);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        let mut state = self.probe.0.borrow_mut();
        if state.running == Some(self.id) {
            state.running = None;
        }
        Ok(())
    }

    fn detach(&mut self) {
        let mut state = self.probe.0.borrow_mut();
        if state.running == Some(self.id) {
            state.running = None;
        }
        state.detached.push(self.id);
    }
}
