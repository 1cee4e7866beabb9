// End-to-end checks of the voice layer against the scripted engine: transcripts
// go through classifier, gate and into a real SnakeGame, and engine failures
// go through the session manager's retry policy.

use std::time::Duration;

use assert_matches::assert_matches;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use voxsnake::classifier::Classifier;
use voxsnake::engine::scripted::{EngineProbe, ScriptedFactory};
use voxsnake::engine::{EngineEvent, ErrorCode, RecognitionConfig, SessionId};
use voxsnake::game::{SnakeGame, START_SPEED};
use voxsnake::level::LevelBand;
use voxsnake::microphone::{AudioConstraints, AudioSource, MicrophoneAccess, MicrophoneError};
use voxsnake::scheduler::TimerTask;
use voxsnake::session::{SessionState, ERROR_RESTART_DELAY};
use voxsnake::voice::{Feedback, GameControl, Presenter, VoiceControl};
use voxsnake::{Command, Heading};

#[derive(Default)]
struct Screen {
    status: String,
    log: Vec<String>,
    pulses: usize,
    fallback: Option<String>,
}

impl Presenter for Screen {
    fn show_transient_feedback(&mut self, kind: Feedback) {
        if kind == Feedback::CommandReceived {
            self.pulses += 1;
        }
    }
    fn render_command_log(&mut self, lines: Vec<String>) {
        self.log = lines;
    }
    fn set_status_text(&mut self, text: &str) {
        self.status = text.to_string();
    }
    fn session_state_changed(&mut self, _state: SessionState) {}
    fn show_fallback(&mut self, message: &str) {
        self.fallback = Some(message.to_string());
    }
    fn set_level(&mut self, _level: f32, _band: LevelBand) {}
}

struct Silence;

impl AudioSource for Silence {
    fn frequency_data(&mut self, bins: &mut [u8]) {
        bins.fill(0);
    }
    fn release(&mut self) {}
}

struct AllowingMic;

impl MicrophoneAccess for AllowingMic {
    fn request(
        &mut self,
        _constraints: &AudioConstraints,
    ) -> Result<Box<dyn AudioSource>, MicrophoneError> {
        Ok(Box::new(Silence))
    }
}

struct Table {
    voice: VoiceControl<ScriptedFactory, AllowingMic>,
    probe: EngineProbe,
    game: SnakeGame,
    screen: Screen,
    now: Duration,
}

impl Table {
    fn new() -> Self {
        let (factory, probe) = ScriptedFactory::new();
        Self {
            voice: VoiceControl::new(factory, AllowingMic, RecognitionConfig::default()),
            probe,
            game: SnakeGame::seeded(START_SPEED, 42),
            screen: Screen::default(),
            now: Duration::ZERO,
        }
    }

    fn listening() -> Self {
        let mut table = Self::new();
        table
            .voice
            .enable_voice_mode(&mut table.screen, table.now)
            .unwrap();
        table.emit(EngineEvent::Started);
        assert_eq!(table.voice.session_state(), SessionState::Active);
        table
    }

    fn current(&self) -> SessionId {
        self.voice
            .sessions()
            .session()
            .map(|s| s.id())
            .expect("a recognition session exists")
    }

    fn emit(&mut self, event: EngineEvent) {
        let ev = self.probe.event(self.current(), event);
        self.voice
            .on_speech_event(ev, &mut self.game, &mut self.screen, self.now);
    }

    fn hear(&mut self, text: &str, confidence: f32) {
        self.emit(EngineEvent::Result {
            transcript: text.to_string(),
            confidence,
            is_final: true,
        });
    }

    fn wait(&mut self, ms: u64) {
        self.now += Duration::from_millis(ms);
        self.voice.on_frame(&mut self.screen, self.now);
    }

    fn pending(&self, task: TimerTask) -> usize {
        self.voice.scheduler().count(&task)
    }
}

#[test]
fn please_go_up_now_is_accepted() {
    let mut t = Table::listening();
    // moving right; up is a perpendicular turn
    t.game.apply_command(Command::Right);
    t.game.step();
    assert_eq!(t.game.heading(), Heading::RIGHT);

    t.hear("please go up now", 0.8);
    assert_eq!(t.game.next_direction(), Heading::UP);
    assert_eq!(t.screen.pulses, 1);
    assert_eq!(t.screen.status, "Command: UP");
}

#[test]
fn up_while_moving_up_is_still_emitted() {
    let mut t = Table::listening();
    t.game.apply_command(Command::Up);
    t.game.step();
    assert_eq!(t.game.heading(), Heading::UP);

    t.hear("up", 0.8);
    assert_eq!(t.voice.gate().state().last_command, Some(Command::Up));
    assert_eq!(t.screen.pulses, 1);
}

#[test]
fn reversal_falls_through_to_next_keyword() {
    let mut t = Table::listening();
    t.game.apply_command(Command::Down);
    t.game.step();

    // "up" would reverse the snake; "left" is the next candidate
    t.hear("up and left", 0.9);
    assert_eq!(t.game.next_direction(), Heading::LEFT);
}

#[test]
fn low_confidence_never_moves_the_snake() {
    let mut t = Table::listening();
    for text in ["up", "down", "left", "right", "pause", "go"] {
        t.hear(text, 0.39);
        t.wait(400);
    }
    assert_eq!(t.game.next_direction(), Heading::STILL);
    assert!(!t.game.is_paused());
    assert_eq!(t.screen.pulses, 0);
    assert_eq!(t.voice.history().len(), 6);
    assert!(t.screen.log.iter().all(|line| line.starts_with('❓')));
}

#[test]
fn repeated_pause_is_not_recognized() {
    let mut t = Table::listening();
    t.hear("pause", 0.9);
    assert!(t.game.is_paused());
    t.wait(300);
    t.hear("freeze", 0.9);
    assert!(t.screen.log[0].starts_with('❓'));
    t.hear("resume", 0.9);
    assert!(!t.game.is_paused());
}

#[test]
fn commands_inside_the_window_are_dropped() {
    let mut t = Table::listening();
    t.hear("left", 0.9);
    t.wait(150);
    t.hear("down", 0.9);
    assert_eq!(t.game.next_direction(), Heading::LEFT);

    t.wait(150);
    t.hear("down", 0.9);
    assert_eq!(t.game.next_direction(), Heading::DOWN);
    assert_eq!(t.screen.pulses, 2);
}

#[test]
fn cooldown_expires_without_an_intervening_frame() {
    let mut t = Table::listening();
    t.hear("left", 0.9);
    t.now += Duration::from_millis(350);
    t.hear("down", 0.9);

    assert_eq!(t.game.next_direction(), Heading::DOWN);
    assert_eq!(t.voice.gate().state().last_command, Some(Command::Down));
    assert_eq!(t.screen.pulses, 2);
}

#[test]
fn three_network_errors_restart_three_times() {
    let mut t = Table::listening();
    let first = t.current();

    for attempt in 1..=3 {
        t.emit(EngineEvent::Error(ErrorCode::Network));
        assert_eq!(t.voice.session_state(), SessionState::ErrorBackoff);
        assert_eq!(t.pending(TimerTask::RestartSession), 1);
        assert_eq!(t.voice.sessions().attempt_count(), attempt);

        t.wait(ERROR_RESTART_DELAY.as_millis() as u64 - 1);
        assert_eq!(t.voice.session_state(), SessionState::ErrorBackoff);
        t.wait(1);
        assert_eq!(t.voice.session_state(), SessionState::Starting);
        t.emit(EngineEvent::Started);
    }

    assert_eq!(t.voice.sessions().attempt_count(), 3);
    assert_eq!(t.probe.created(), vec![first]);
    assert_eq!(t.pending(TimerTask::RecreateSession), 0);
    assert_eq!(t.screen.status, "Voice control active - speak a direction");
    assert!(t.screen.log.iter().take(3).all(|l| l.contains("\"network\"")));
}

#[test]
fn fifth_transient_error_rebuilds_the_session() {
    let mut t = Table::listening();
    let first = t.current();

    for _ in 1..5 {
        t.emit(EngineEvent::Error(ErrorCode::AudioCapture));
        t.wait(1000);
        t.emit(EngineEvent::Started);
    }
    t.emit(EngineEvent::Error(ErrorCode::Aborted));
    assert_eq!(t.voice.sessions().attempt_count(), 5);
    assert_eq!(t.pending(TimerTask::RecreateSession), 1);
    assert_eq!(t.pending(TimerTask::RestartSession), 0);

    t.wait(1000);
    let second = t.current();
    assert_ne!(first, second);
    assert_eq!(t.voice.sessions().attempt_count(), 0);
    assert_eq!(t.voice.session_state(), SessionState::Starting);
    assert_eq!(t.probe.detached(), vec![first]);
}

#[test]
fn not_allowed_stops_for_good() {
    let mut t = Table::listening();
    t.emit(EngineEvent::Error(ErrorCode::NotAllowed));

    assert_eq!(t.voice.session_state(), SessionState::Idle);
    assert_eq!(t.pending(TimerTask::RestartSession), 0);
    assert_eq!(t.pending(TimerTask::RecreateSession), 0);
    assert_eq!(t.screen.status, "Microphone access denied");
    assert!(!t.voice.context().permission_granted);
    assert!(!t.voice.is_voice_mode());
    assert!(t.screen.fallback.is_some());

    t.wait(5_000);
    assert_eq!(t.probe.start_calls(), 1);
}

#[test]
fn unsupported_language_falls_back() {
    let mut t = Table::listening();
    t.emit(EngineEvent::Error(ErrorCode::LanguageNotSupported));
    assert_eq!(t.voice.session_state(), SessionState::Idle);
    assert!(!t.voice.is_voice_mode());
    assert!(t.voice.scheduler().is_empty());
}

#[test]
fn re_enabling_after_revocation_asks_again() {
    let mut t = Table::listening();
    t.emit(EngineEvent::Error(ErrorCode::ServiceNotAllowed));
    assert!(!t.voice.context().permission_granted);

    assert_matches!(t.voice.enable_voice_mode(&mut t.screen, t.now), Ok(()));
    assert!(t.voice.context().permission_granted);
    assert_eq!(t.voice.session_state(), SessionState::Starting);
}

#[test]
fn never_more_than_one_live_session() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut t = Table::listening();

    for _ in 0..2_000 {
        match rng.gen_range(0..9) {
            0 => t.emit(EngineEvent::Error(ErrorCode::Network)),
            1 => t.emit(EngineEvent::Error(ErrorCode::NoSpeech)),
            2 => t.emit(EngineEvent::Ended),
            3 => t.emit(EngineEvent::Started),
            4 => t.hear("left", 0.9),
            5 => t.probe.fail_next_starts(1),
            6 => {
                let paused = !t.voice.context().paused;
                t.voice.pause_changed(paused, &mut t.screen, t.now);
            }
            _ => t.wait(rng.gen_range(1..1_200)),
        }
        if t.voice.sessions().session().is_none() {
            // paused or torn down; bring it back
            t.voice.pause_changed(false, &mut t.screen, t.now);
        }

        assert_eq!(t.probe.overlapping_starts(), 0);
        assert!(t.pending(TimerTask::RestartSession) + t.pending(TimerTask::RecreateSession) <= 1);
        assert!(t.voice.history().len() <= 10);
    }
}

#[test]
fn classifier_priority_is_fixed() {
    let classifier = Classifier::new();
    let cases = [
        ("left or right", Command::Left),
        ("down then up", Command::Up),
        ("east and stop", Command::Right),
        ("halt and go", Command::Pause),
    ];
    for (text, expected) in cases {
        let result = classifier.classify(text, 0.9, Heading::STILL, false);
        assert_eq!(result.command, Some(expected), "{text}");
    }
}
