use crate::classifier::Classifier;
use crate::command::{Command, Heading};
use crate::context::{ControlMode, GameSessionContext};
use crate::engine::{EngineFactory, RecognitionConfig, SpeechEvent};
use crate::error::VoiceError;
use crate::gate::CommandGate;
use crate::history::{CommandHistory, CommandLogEntry};
use crate::level::{LevelBand, LevelMonitor};
use crate::microphone::{AudioConstraints, MicrophoneAccess, MicrophoneError};
use crate::scheduler::{Scheduler, TimerTask};
use crate::session::{SessionManager, SessionNotice, SessionState};
use std::time::Duration;

const UNSUPPORTED_FALLBACK: &str =
    "Voice control is not supported here. Starting with keyboard controls instead.";

/// What the voice layer needs from the game
pub trait GameControl {
    fn apply_command(&mut self, command: Command);
    fn is_paused(&self) -> bool;
    fn set_paused(&mut self, paused: bool);
    /// Last applied movement vector
    fn heading(&self) -> Heading;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Feedback {
    CommandReceived,
    VoiceActive,
}

/// Presentation hooks; the voice layer never draws anything itself
pub trait Presenter {
    fn show_transient_feedback(&mut self, kind: Feedback);
    fn render_command_log(&mut self, lines: Vec<String>);
    fn set_status_text(&mut self, text: &str);
    fn session_state_changed(&mut self, state: SessionState);
    fn show_fallback(&mut self, message: &str);
    fn set_level(&mut self, level: f32, band: LevelBand);
}

/// Glue between the recognition session and the game.
///
/// Transcripts flow classifier → gate → [`GameControl`]; session notices
/// flow to the history log and the [`Presenter`]. All deferred work (restart
/// timers and the cooldown window) lives on one scheduler that is advanced
/// by [`on_frame`](Self::on_frame).
pub struct VoiceControl<F: EngineFactory, M: MicrophoneAccess> {
    ctx: GameSessionContext,
    classifier: Classifier,
    gate: CommandGate,
    sessions: SessionManager<F>,
    history: CommandHistory,
    scheduler: Scheduler<TimerTask>,
    microphone: M,
    constraints: AudioConstraints,
    level: LevelMonitor,
    last_state: SessionState,
}

impl<F: EngineFactory, M: MicrophoneAccess> VoiceControl<F, M> {
    pub fn new(factory: F, microphone: M, config: RecognitionConfig) -> Self {
        Self::with_classifier(factory, microphone, config, Classifier::new())
    }

    pub fn with_classifier(
        factory: F,
        microphone: M,
        config: RecognitionConfig,
        classifier: Classifier,
    ) -> Self {
        Self {
            ctx: GameSessionContext::default(),
            classifier,
            gate: CommandGate::default(),
            sessions: SessionManager::new(factory, config),
            history: CommandHistory::default(),
            scheduler: Scheduler::new(),
            microphone,
            constraints: AudioConstraints::default(),
            level: LevelMonitor::new(),
            last_state: SessionState::Idle,
        }
    }

    pub fn context(&self) -> &GameSessionContext {
        &self.ctx
    }

    pub fn is_voice_mode(&self) -> bool {
        self.ctx.control_mode == ControlMode::Voice && self.ctx.voice_enabled
    }

    pub fn session_state(&self) -> SessionState {
        self.sessions.state()
    }

    pub fn sessions(&self) -> &SessionManager<F> {
        &self.sessions
    }

    pub fn gate(&self) -> &CommandGate {
        &self.gate
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn scheduler(&self) -> &Scheduler<TimerTask> {
        &self.scheduler
    }

    pub fn level(&self) -> &LevelMonitor {
        &self.level
    }

    /// Switch the current game to voice control and start listening.
    ///
    /// On failure the context is left in keyboard mode and the presenter has
    /// already been told why.
    pub fn enable_voice_mode(
        &mut self,
        presenter: &mut dyn Presenter,
        now: Duration,
    ) -> Result<(), VoiceError> {
        if !self.sessions.factory().is_supported() {
            tracing::warn!("speech recognition unavailable, staying on keyboard");
            self.ctx.downgrade();
            presenter.show_fallback(UNSUPPORTED_FALLBACK);
            return Err(VoiceError::Unsupported(
                "no speech recognition engine".into(),
            ));
        }

        if !self.ctx.permission_granted {
            match self.microphone.request(&self.constraints) {
                Ok(mut probe) => {
                    // permission is all that is needed here
                    probe.release();
                    self.ctx.permission_granted = true;
                    tracing::info!("microphone permission granted");
                }
                Err(err) => {
                    tracing::warn!(%err, "microphone permission request failed");
                    self.ctx.permission_granted = false;
                    self.ctx.downgrade();
                    presenter.show_fallback(&err.fallback_message());
                    return Err(err.into());
                }
            }
        }

        self.ctx.control_mode = ControlMode::Voice;
        self.ctx.voice_enabled = true;
        self.ctx.paused = false;
        presenter.render_command_log(self.history.render());
        self.start_listening(presenter, now);
        Ok(())
    }

    /// Tear everything down, e.g. on game over or when leaving the game
    pub fn disable_voice_mode(&mut self, presenter: &mut dyn Presenter) {
        self.sessions.stop_session(&mut self.scheduler);
        self.gate.reset(&mut self.scheduler);
        self.level.release();
        let permission_granted = self.ctx.permission_granted;
        self.ctx = GameSessionContext {
            permission_granted,
            ..GameSessionContext::default()
        };
        self.process_notices(None, presenter, Duration::ZERO);
    }

    pub fn start_listening(&mut self, presenter: &mut dyn Presenter, now: Duration) -> bool {
        let started = self
            .sessions
            .start_session(&self.ctx, &mut self.scheduler, now);
        self.process_notices(None, presenter, now);
        started
    }

    /// Manual pause toggled from the keyboard: pausing stops listening,
    /// resuming starts it again.
    pub fn pause_changed(&mut self, paused: bool, presenter: &mut dyn Presenter, now: Duration) {
        if !self.is_voice_mode() {
            return;
        }
        self.ctx.paused = paused;
        if paused {
            self.sessions.stop_session(&mut self.scheduler);
            self.process_notices(None, presenter, now);
            presenter.set_status_text("Game paused - resume to keep listening");
        } else {
            self.start_listening(presenter, now);
        }
    }

    pub fn on_speech_event(
        &mut self,
        event: SpeechEvent,
        game: &mut dyn GameControl,
        presenter: &mut dyn Presenter,
        now: Duration,
    ) {
        self.fire_due(presenter, now);
        self.sessions
            .handle_event(event, &self.ctx, &mut self.scheduler, now);
        self.process_notices(Some(game), presenter, now);
    }

    /// Fire everything due at `now`, then sample the microphone level
    pub fn on_frame(&mut self, presenter: &mut dyn Presenter, now: Duration) {
        self.fire_due(presenter, now);

        if let Some(level) = self.level.sample() {
            presenter.set_level(level, self.level.band());
        }
    }

    fn fire_due(&mut self, presenter: &mut dyn Presenter, now: Duration) {
        while let Some((handle, task)) = self.scheduler.pop_due(now) {
            match task {
                TimerTask::CooldownElapsed => self.gate.on_cooldown_elapsed(),
                TimerTask::RestartSession | TimerTask::RecreateSession => {
                    self.sessions
                        .on_timer(handle, task, &self.ctx, &mut self.scheduler, now)
                }
            }
        }
        self.process_notices(None, presenter, now);
    }

    fn process_notices(
        &mut self,
        mut game: Option<&mut dyn GameControl>,
        presenter: &mut dyn Presenter,
        now: Duration,
    ) {
        let mut log_changed = false;

        for notice in self.sessions.drain_notices() {
            match notice {
                SessionNotice::Status(text) => presenter.set_status_text(&text),
                SessionNotice::Transcript {
                    text,
                    confidence,
                    is_final,
                } => {
                    let Some(game) = game.as_deref_mut() else {
                        continue;
                    };
                    let accepted = self.interpret(&text, confidence, game, presenter, now);
                    if is_final {
                        self.history
                            .record(CommandLogEntry::new(text, accepted, confidence));
                        log_changed = true;
                    }
                }
                SessionNotice::EngineError(code) => {
                    self.history
                        .record(CommandLogEntry::engine_error(code.as_str()));
                    log_changed = true;
                }
                SessionNotice::PermissionRevoked => {
                    self.ctx.permission_granted = false;
                    self.ctx.downgrade();
                    presenter.show_fallback(&MicrophoneError::PermissionDenied.fallback_message());
                }
                SessionNotice::Unsupported(reason) => {
                    tracing::warn!(%reason, "falling back to keyboard controls");
                    self.ctx.downgrade();
                    presenter.show_fallback(UNSUPPORTED_FALLBACK);
                }
            }
        }

        if log_changed {
            presenter.render_command_log(self.history.render());
        }
        self.sync_state(presenter);
    }

    /// Classify, gate and apply one transcript. Returns whether it was
    /// recognized as a command.
    fn interpret(
        &mut self,
        text: &str,
        confidence: f32,
        game: &mut dyn GameControl,
        presenter: &mut dyn Presenter,
        now: Duration,
    ) -> bool {
        let result = self
            .classifier
            .classify(text, confidence, game.heading(), game.is_paused());

        if self.gate.admit(&result, now, &mut self.scheduler) {
            if let Some(command) = result.command {
                tracing::info!(%command, text, confidence, "voice command accepted");
                game.apply_command(command);
                presenter.show_transient_feedback(Feedback::CommandReceived);
                presenter.set_status_text(command.status_text());
            }
        }
        result.recognized
    }

    fn sync_state(&mut self, presenter: &mut dyn Presenter) {
        let state = self.sessions.state();
        if state == self.last_state {
            return;
        }
        self.last_state = state;

        if state == SessionState::Active {
            presenter.show_transient_feedback(Feedback::VoiceActive);
            if !self.level.is_attached() {
                match self.microphone.request(&self.constraints) {
                    Ok(source) => self.level.attach(source),
                    Err(err) => tracing::warn!(%err, "audio level monitor unavailable"),
                }
            }
        } else {
            self.level.release();
            presenter.set_level(0.0, LevelBand::Quiet);
        }
        presenter.session_state_changed(state);
    }
}

impl<F: EngineFactory, M: MicrophoneAccess> std::fmt::Debug for VoiceControl<F, M>
where
    F: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceControl")
            .field("ctx", &self.ctx)
            .field("sessions", &self.sessions)
            .field("gate", &self.gate)
            .field("level", &self.level)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::scripted::{EngineProbe, ScriptedFactory};
    use crate::engine::{EngineEvent, ErrorCode, SessionId};
    use crate::microphone::AudioSource;
    use assert_matches::assert_matches;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Default)]
    struct FakeGame {
        heading: Heading,
        paused: bool,
        applied: Vec<Command>,
    }

    impl GameControl for FakeGame {
        fn apply_command(&mut self, command: Command) {
            match command.heading() {
                Some(heading) => self.heading = heading,
                None => self.paused = command == Command::Pause,
            }
            self.applied.push(command);
        }

        fn is_paused(&self) -> bool {
            self.paused
        }

        fn set_paused(&mut self, paused: bool) {
            self.paused = paused;
        }

        fn heading(&self) -> Heading {
            self.heading
        }
    }

    #[derive(Default)]
    struct Recorder {
        feedback: Vec<Feedback>,
        log: Vec<String>,
        status: Vec<String>,
        states: Vec<SessionState>,
        fallback: Option<String>,
        level: f32,
    }

    impl Presenter for Recorder {
        fn show_transient_feedback(&mut self, kind: Feedback) {
            self.feedback.push(kind);
        }
        fn render_command_log(&mut self, lines: Vec<String>) {
            self.log = lines;
        }
        fn set_status_text(&mut self, text: &str) {
            self.status.push(text.to_string());
        }
        fn session_state_changed(&mut self, state: SessionState) {
            self.states.push(state);
        }
        fn show_fallback(&mut self, message: &str) {
            self.fallback = Some(message.to_string());
        }
        fn set_level(&mut self, level: f32, _band: LevelBand) {
            self.level = level;
        }
    }

    struct Mic {
        deny: bool,
        requests: Rc<Cell<u32>>,
        released: Rc<Cell<u32>>,
    }

    struct Loud(Rc<Cell<u32>>);

    impl AudioSource for Loud {
        fn frequency_data(&mut self, bins: &mut [u8]) {
            bins.fill(204);
        }
        fn release(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    impl MicrophoneAccess for Mic {
        fn request(
            &mut self,
            _constraints: &AudioConstraints,
        ) -> Result<Box<dyn AudioSource>, MicrophoneError> {
            self.requests.set(self.requests.get() + 1);
            if self.deny {
                return Err(MicrophoneError::PermissionDenied);
            }
            Ok(Box::new(Loud(self.released.clone())))
        }
    }

    struct Fixture {
        voice: VoiceControl<ScriptedFactory, Mic>,
        probe: EngineProbe,
        game: FakeGame,
        ui: Recorder,
        requests: Rc<Cell<u32>>,
        released: Rc<Cell<u32>>,
        now: Duration,
    }

    impl Fixture {
        fn new(deny: bool) -> Self {
            let (factory, probe) = ScriptedFactory::new();
            let requests = Rc::new(Cell::new(0));
            let released = Rc::new(Cell::new(0));
            let mic = Mic {
                deny,
                requests: requests.clone(),
                released: released.clone(),
            };
            Self {
                voice: VoiceControl::new(factory, mic, RecognitionConfig::default()),
                probe,
                game: FakeGame::default(),
                ui: Recorder::default(),
                requests,
                released,
                now: Duration::ZERO,
            }
        }

        fn active() -> Self {
            let mut fx = Self::new(false);
            fx.voice.enable_voice_mode(&mut fx.ui, fx.now).unwrap();
            fx.send(EngineEvent::Started);
            fx
        }

        fn id(&self) -> SessionId {
            self.voice.sessions().session().map(|s| s.id()).unwrap()
        }

        fn send(&mut self, event: EngineEvent) {
            let ev = self.probe.event(self.id(), event);
            self.voice
                .on_speech_event(ev, &mut self.game, &mut self.ui, self.now);
        }

        fn say(&mut self, text: &str, confidence: f32, is_final: bool) {
            self.send(EngineEvent::Result {
                transcript: text.into(),
                confidence,
                is_final,
            });
        }

        fn advance(&mut self, ms: u64) {
            self.now += Duration::from_millis(ms);
            self.voice.on_frame(&mut self.ui, self.now);
        }
    }

    #[test]
    fn enabling_requests_permission_and_starts_listening() {
        let fx = Fixture::active();
        assert_eq!(fx.voice.session_state(), SessionState::Active);
        assert!(fx.voice.context().permission_granted);
        assert_eq!(fx.ui.states, vec![SessionState::Starting, SessionState::Active]);
        assert_eq!(fx.ui.feedback, vec![Feedback::VoiceActive]);
        // one request for permission, one for the level monitor
        assert_eq!(fx.requests.get(), 2);
        assert_eq!(fx.released.get(), 1);
        assert!(fx.voice.level().is_attached());
    }

    #[test]
    fn denied_permission_falls_back_to_keyboard() {
        let mut fx = Fixture::new(true);
        let err = fx.voice.enable_voice_mode(&mut fx.ui, fx.now).unwrap_err();
        assert_matches!(err, VoiceError::Microphone(MicrophoneError::PermissionDenied));
        assert_eq!(fx.voice.context().control_mode, ControlMode::Keyboard);
        assert!(!fx.voice.context().permission_granted);
        assert!(fx.ui.fallback.as_deref().unwrap().contains("allow microphone"));
        assert_eq!(fx.probe.start_calls(), 0);
    }

    #[test]
    fn unsupported_engine_falls_back_without_asking_permission() {
        let mut fx = Fixture::new(false);
        fx.probe.set_unsupported(true);
        let err = fx.voice.enable_voice_mode(&mut fx.ui, fx.now).unwrap_err();
        assert_matches!(err, VoiceError::Unsupported(_));
        assert_eq!(fx.requests.get(), 0);
        assert!(!fx.voice.is_voice_mode());
    }

    #[test]
    fn accepted_command_reaches_the_game_with_feedback() {
        let mut fx = Fixture::active();
        fx.say("go left", 0.9, true);

        assert_eq!(fx.game.applied, vec![Command::Left]);
        assert_eq!(
            fx.ui.feedback,
            vec![Feedback::VoiceActive, Feedback::CommandReceived]
        );
        assert_eq!(fx.ui.status.last().map(String::as_str), Some("Command: LEFT"));
        assert!(fx.ui.log[0].contains("\"go left\" 90%"));
        assert!(fx.ui.log[0].starts_with('✅'));
    }

    #[test]
    fn interim_and_final_of_one_utterance_fire_once() {
        let mut fx = Fixture::active();
        fx.say("up", 0.8, false);
        fx.now += Duration::from_millis(120);
        fx.say("up", 0.9, true);

        assert_eq!(fx.game.applied, vec![Command::Up]);
        assert_eq!(fx.voice.history().len(), 1);
    }

    #[test]
    fn cooldown_clears_on_frame() {
        let mut fx = Fixture::active();
        fx.say("up", 0.9, true);
        fx.advance(299);
        fx.say("left", 0.9, true);
        assert_eq!(fx.game.applied, vec![Command::Up]);

        fx.advance(1);
        fx.say("left", 0.9, true);
        assert_eq!(fx.game.applied, vec![Command::Up, Command::Left]);
    }

    #[test]
    fn low_confidence_transcript_is_logged_unrecognized() {
        let mut fx = Fixture::active();
        fx.say("up", 0.2, true);
        assert!(fx.game.applied.is_empty());
        assert!(!fx.voice.gate().state().on_cooldown);
        assert!(fx.ui.log[0].starts_with('❓'));
    }

    #[test]
    fn voice_pause_keeps_listening_for_resume() {
        let mut fx = Fixture::active();
        fx.say("pause", 0.9, true);
        assert!(fx.game.paused);
        assert_eq!(fx.voice.session_state(), SessionState::Active);

        // recognizer times out while paused and comes back
        fx.send(EngineEvent::Ended);
        fx.advance(500);
        assert_eq!(fx.voice.session_state(), SessionState::Starting);
        fx.send(EngineEvent::Started);

        fx.say("resume", 0.9, true);
        assert!(!fx.game.paused);
        assert_eq!(fx.game.applied, vec![Command::Pause, Command::Resume]);
    }

    #[test]
    fn manual_pause_stops_and_resume_restarts() {
        let mut fx = Fixture::active();
        fx.voice.pause_changed(true, &mut fx.ui, fx.now);
        assert_eq!(fx.voice.session_state(), SessionState::Idle);
        assert!(fx.voice.sessions().session().is_none());
        assert!(!fx.voice.level().is_attached());

        fx.voice.pause_changed(false, &mut fx.ui, fx.now);
        assert_eq!(fx.voice.session_state(), SessionState::Starting);
        assert_eq!(fx.probe.created().len(), 2);
    }

    #[test]
    fn engine_errors_are_logged_with_their_code() {
        let mut fx = Fixture::active();
        fx.send(EngineEvent::Error(ErrorCode::Network));
        assert_eq!(fx.voice.history().latest().unwrap().text, "network");
        assert!(fx.ui.log[0].contains("\"network\""));
        assert!(fx
            .ui
            .status
            .contains(&"Network error - check connection".to_string()));
        assert_eq!(fx.voice.session_state(), SessionState::ErrorBackoff);
        assert!(!fx.voice.level().is_attached());
        assert_eq!(fx.ui.level, 0.0);
    }

    #[test]
    fn revoked_permission_downgrades_to_keyboard() {
        let mut fx = Fixture::active();
        fx.send(EngineEvent::Error(ErrorCode::NotAllowed));

        let ctx = fx.voice.context();
        assert_eq!(ctx.control_mode, ControlMode::Keyboard);
        assert!(!ctx.permission_granted);
        assert!(fx.ui.fallback.is_some());
        assert!(fx.voice.scheduler().is_empty());
    }

    #[test]
    fn level_is_sampled_only_while_active() {
        let mut fx = Fixture::active();
        fx.advance(16);
        assert!((fx.ui.level - 0.8).abs() < 1e-6);

        fx.send(EngineEvent::Ended);
        assert_eq!(fx.ui.level, 0.0);
        assert_eq!(fx.released.get(), 2);
    }

    #[test]
    fn disable_tears_everything_down() {
        let mut fx = Fixture::active();
        fx.say("up", 0.9, true);
        fx.send(EngineEvent::Error(ErrorCode::Aborted));
        fx.voice.disable_voice_mode(&mut fx.ui);

        assert!(fx.voice.scheduler().is_empty());
        assert!(!fx.voice.gate().state().on_cooldown);
        assert!(fx.voice.sessions().session().is_none());
        assert!(!fx.voice.is_voice_mode());
        assert!(fx.voice.context().permission_granted);
        assert_eq!(fx.ui.states.last(), Some(&SessionState::Idle));
    }
}
