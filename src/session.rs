use crate::context::GameSessionContext;
use crate::engine::{
    EngineError, EngineEvent, EngineFactory, ErrorClass, ErrorCode, RecognitionConfig, SessionId,
    SpeechEngine, SpeechEvent,
};
use crate::scheduler::{Scheduler, TaskHandle, TimerTask};
use std::time::Duration;

/// Consecutive failures tolerated before the session object is rebuilt
pub const MAX_RECOGNITION_ATTEMPTS: u32 = 5;
pub const ERROR_RESTART_DELAY: Duration = Duration::from_millis(1000);
pub const NATURAL_END_RESTART_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum SessionState {
    Idle,
    Starting,
    Active,
    ErrorBackoff,
    Recreating,
}

impl SessionState {
    /// Starting or Active: the engine is (about to be) listening
    pub fn is_live(self) -> bool {
        matches!(self, SessionState::Starting | SessionState::Active)
    }
}

/// Things the manager wants the outside world to know about
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    Status(String),
    Transcript {
        text: String,
        confidence: f32,
        is_final: bool,
    },
    EngineError(ErrorCode),
    PermissionRevoked,
    Unsupported(String),
}

/// The one live connection to the speech engine
pub struct RecognitionSession {
    id: SessionId,
    engine: Box<dyn SpeechEngine>,
    active: bool,
    attempt_count: u32,
    pending_restart: Option<TaskHandle>,
}

impl RecognitionSession {
    fn new(id: SessionId, engine: Box<dyn SpeechEngine>) -> Self {
        Self {
            id,
            engine,
            active: false,
            attempt_count: 0,
            pending_restart: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn pending_restart(&self) -> Option<TaskHandle> {
        self.pending_restart
    }
}

impl std::fmt::Debug for RecognitionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognitionSession")
            .field("id", &self.id)
            .field("active", &self.active)
            .field("attempt_count", &self.attempt_count)
            .field("pending_restart", &self.pending_restart)
            .finish()
    }
}

/// Owns the speech engine session and keeps it alive.
///
/// Every engine callback goes through [`handle_event`](Self::handle_event)
/// and every deferred restart through [`on_timer`](Self::on_timer). At most
/// one restart timer is pending at a time; it lives on the session so
/// tearing the session down cancels it.
#[derive(Debug)]
pub struct SessionManager<F: EngineFactory> {
    factory: F,
    config: RecognitionConfig,
    session: Option<RecognitionSession>,
    state: SessionState,
    next_id: u64,
    notices: Vec<SessionNotice>,
}

impl<F: EngineFactory> SessionManager<F> {
    pub fn new(factory: F, config: RecognitionConfig) -> Self {
        Self {
            factory,
            config,
            session: None,
            state: SessionState::Idle,
            next_id: 0,
            notices: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> Option<&RecognitionSession> {
        self.session.as_ref()
    }

    pub fn attempt_count(&self) -> u32 {
        self.session.as_ref().map_or(0, |s| s.attempt_count)
    }

    pub fn has_pending_restart(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.pending_restart.is_some())
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn config(&self) -> &RecognitionConfig {
        &self.config
    }

    pub fn drain_notices(&mut self) -> Vec<SessionNotice> {
        std::mem::take(&mut self.notices)
    }

    /// Idle → Starting. Returns true when the engine accepted `start()`.
    pub fn start_session(
        &mut self,
        ctx: &GameSessionContext,
        scheduler: &mut Scheduler<TimerTask>,
        now: Duration,
    ) -> bool {
        if !ctx.allows_listening() {
            tracing::debug!("voice mode off or game paused, not starting recognition");
            return false;
        }
        if self.state.is_live() {
            tracing::debug!("recognition already active, not starting");
            return false;
        }

        self.cancel_restart(scheduler);
        if let Err(err) = self.ensure_session() {
            self.report_create_failure(err);
            return false;
        }
        self.try_start(ctx, scheduler, now)
    }

    /// Explicit stop: leaving voice mode, pausing, or leaving the game
    pub fn stop_session(&mut self, scheduler: &mut Scheduler<TimerTask>) {
        let was_running = self.session.is_some() || self.state != SessionState::Idle;
        self.teardown(scheduler);
        self.set_state(SessionState::Idle);
        if was_running {
            self.notices
                .push(SessionNotice::Status("Voice control inactive".into()));
        }
    }

    pub fn handle_event(
        &mut self,
        event: SpeechEvent,
        ctx: &GameSessionContext,
        scheduler: &mut Scheduler<TimerTask>,
        now: Duration,
    ) {
        let current = self.session.as_ref().map(|s| s.id);
        if current != Some(event.session) {
            tracing::debug!(session = %event.session, event = ?event.event, "ignoring event from a detached session");
            return;
        }

        match event.event {
            EngineEvent::Started => self.on_started(),
            EngineEvent::Result {
                transcript,
                confidence,
                is_final,
            } => self.on_result(transcript, confidence, is_final),
            EngineEvent::Error(code) => self.on_error(code, ctx, scheduler, now),
            EngineEvent::Ended => self.on_ended(ctx, scheduler, now),
        }
    }

    /// A restart or recreation timer fired
    pub fn on_timer(
        &mut self,
        handle: TaskHandle,
        task: TimerTask,
        ctx: &GameSessionContext,
        scheduler: &mut Scheduler<TimerTask>,
        now: Duration,
    ) {
        match self.session.as_mut() {
            Some(session) if session.pending_restart == Some(handle) => {
                session.pending_restart = None;
            }
            _ => {
                tracing::debug!(%task, "timer does not belong to the current session");
                return;
            }
        }

        match task {
            TimerTask::RestartSession => {
                if self.state.is_live() {
                    return;
                }
                self.set_state(SessionState::Idle);
                if ctx.allows_listening() {
                    tracing::info!("attempting to restart voice recognition");
                    self.start_session(ctx, scheduler, now);
                }
            }
            TimerTask::RecreateSession => self.recreate(ctx, scheduler, now),
            TimerTask::CooldownElapsed => {}
        }
    }

    fn on_started(&mut self) {
        if self.state != SessionState::Starting {
            tracing::debug!(state = %self.state, "unexpected start acknowledgement");
            return;
        }
        self.set_state(SessionState::Active);
        self.notices.push(SessionNotice::Status(
            "Voice control active - speak a direction".into(),
        ));
    }

    fn on_result(&mut self, text: String, confidence: f32, is_final: bool) {
        if !self.state.is_live() {
            tracing::debug!(state = %self.state, "dropping transcript outside a live session");
            return;
        }
        if self.state == SessionState::Starting {
            self.set_state(SessionState::Active);
        }
        if let Some(session) = self.session.as_mut() {
            session.attempt_count = 0;
        }
        self.notices.push(SessionNotice::Transcript {
            text,
            confidence,
            is_final,
        });
    }

    fn on_error(
        &mut self,
        code: ErrorCode,
        ctx: &GameSessionContext,
        scheduler: &mut Scheduler<TimerTask>,
        now: Duration,
    ) {
        tracing::warn!(%code, state = %self.state, "speech recognition error");
        self.notices.push(SessionNotice::EngineError(code.clone()));
        self.notices.push(SessionNotice::Status(code.status_text()));

        match code.class() {
            ErrorClass::Transient => {
                if self.state.is_live() {
                    self.enter_backoff(ctx, scheduler, now);
                }
            }
            ErrorClass::PermissionDenied => {
                self.teardown(scheduler);
                self.set_state(SessionState::Idle);
                self.notices.push(SessionNotice::PermissionRevoked);
            }
            ErrorClass::Unsupported => {
                self.teardown(scheduler);
                self.set_state(SessionState::Idle);
                self.notices.push(SessionNotice::Unsupported(format!(
                    "recognizer rejected the session: {code}"
                )));
            }
            // the end event that follows decides about restarting
            ErrorClass::Benign => {}
        }
    }

    fn on_ended(
        &mut self,
        ctx: &GameSessionContext,
        scheduler: &mut Scheduler<TimerTask>,
        now: Duration,
    ) {
        if !self.state.is_live() {
            tracing::debug!(state = %self.state, "end event for an already concluded session");
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.active = false;
        }
        self.set_state(SessionState::Idle);

        if ctx.allows_listening() {
            tracing::info!("recognition ended naturally, scheduling restart");
            self.schedule(
                scheduler,
                now,
                NATURAL_END_RESTART_DELAY,
                TimerTask::RestartSession,
            );
        }
    }

    fn try_start(
        &mut self,
        ctx: &GameSessionContext,
        scheduler: &mut Scheduler<TimerTask>,
        now: Duration,
    ) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };

        match session.engine.start() {
            Ok(()) => {
                session.active = true;
                tracing::info!(session = %session.id, "voice recognition starting");
                self.set_state(SessionState::Starting);
                true
            }
            Err(err) => {
                tracing::warn!(%err, session = %session.id, "failed to start voice recognition");
                session.active = false;
                self.notices.push(SessionNotice::Status(
                    "Voice start failed - retrying soon".into(),
                ));
                self.enter_backoff(ctx, scheduler, now);
                false
            }
        }
    }

    fn enter_backoff(
        &mut self,
        ctx: &GameSessionContext,
        scheduler: &mut Scheduler<TimerTask>,
        now: Duration,
    ) {
        let Some(session) = self.session.as_mut() else {
            self.set_state(SessionState::Idle);
            return;
        };
        session.active = false;
        session.attempt_count += 1;
        let attempts = session.attempt_count;

        if !ctx.allows_listening() {
            self.set_state(SessionState::Idle);
            return;
        }

        self.set_state(SessionState::ErrorBackoff);
        let task = if attempts >= MAX_RECOGNITION_ATTEMPTS {
            tracing::warn!(attempts, "too many failed attempts, recreating recognition session");
            TimerTask::RecreateSession
        } else {
            TimerTask::RestartSession
        };
        self.schedule(scheduler, now, ERROR_RESTART_DELAY, task);
    }

    fn recreate(
        &mut self,
        ctx: &GameSessionContext,
        scheduler: &mut Scheduler<TimerTask>,
        now: Duration,
    ) {
        self.set_state(SessionState::Recreating);
        self.teardown(scheduler);

        if let Err(err) = self.ensure_session() {
            self.report_create_failure(err);
            return;
        }

        if ctx.allows_listening() {
            self.start_session(ctx, scheduler, now);
        } else {
            self.set_state(SessionState::Idle);
        }
    }

    fn ensure_session(&mut self) -> Result<(), EngineError> {
        if self.session.is_some() {
            return Ok(());
        }
        self.next_id += 1;
        let id = SessionId(self.next_id);
        let engine = self.factory.create(id, &self.config)?;
        tracing::debug!(session = %id, "created recognition session");
        self.session = Some(RecognitionSession::new(id, engine));
        Ok(())
    }

    fn report_create_failure(&mut self, err: EngineError) {
        tracing::error!(%err, "could not create recognition session");
        self.set_state(SessionState::Idle);
        match err {
            EngineError::Unsupported(reason) => {
                self.notices.push(SessionNotice::Status(
                    "Voice control not supported".into(),
                ));
                self.notices.push(SessionNotice::Unsupported(reason));
            }
            other => self.notices.push(SessionNotice::Status(format!(
                "Failed to create recognition: {other}"
            ))),
        }
    }

    fn schedule(
        &mut self,
        scheduler: &mut Scheduler<TimerTask>,
        now: Duration,
        delay: Duration,
        task: TimerTask,
    ) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some(previous) = session.pending_restart.take() {
            scheduler.cancel(previous);
        }
        session.pending_restart = Some(scheduler.schedule(now, delay, task));
    }

    fn cancel_restart(&mut self, scheduler: &mut Scheduler<TimerTask>) {
        if let Some(handle) = self.session.as_mut().and_then(|s| s.pending_restart.take()) {
            scheduler.cancel(handle);
        }
    }

    /// Stop, detach and drop the session object
    fn teardown(&mut self, scheduler: &mut Scheduler<TimerTask>) {
        self.cancel_restart(scheduler);
        if let Some(mut session) = self.session.take() {
            if session.active {
                if let Err(err) = session.engine.stop() {
                    tracing::warn!(%err, "error stopping recognition");
                }
            }
            session.engine.detach();
            tracing::debug!(session = %session.id, "recognition session destroyed");
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            tracing::info!(from = %self.state, to = %state, "recognition session transition");
            self.state = state;
        }
    }
}
