pub mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    sync::mpsc::Sender,
    time::{Duration, Instant},
};

use voxsnake::{
    app_dirs::AppDirs,
    classifier::Classifier,
    config::{Config, ConfigStore, FileConfigStore},
    context::ControlMode,
    engine::{
        console::{ConsoleEngineFactory, ConsoleFeed, ConsoleMicrophone},
        ErrorCode, RecognitionConfig, SpeechEvent,
    },
    game::{SnakeGame, StepOutcome},
    logging,
    runtime::{CrosstermEventSource, FixedTicker, GameEvent, Runner},
    score::HighScoreDb,
    voice::VoiceControl,
    Heading,
};

use crate::ui::{panel::VoicePanel, screen::current_screen};

const TICK_RATE_MS: u64 = 30;

/// terminal snake you can steer by voice
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Snake in the terminal, steered with the arrow keys or with spoken commands. \
                  The bundled console recognizer turns what you type into speech transcripts."
)]
pub struct Cli {
    /// control mode to preselect in the menu
    #[clap(short = 'm', long, value_enum)]
    mode: Option<ControlMode>,

    /// starting interval between snake moves in milliseconds
    #[clap(short = 's', long)]
    speed: Option<u64>,

    /// recognition language passed to the speech engine
    #[clap(short = 'l', long)]
    language: Option<String>,

    /// confidence attached to typed transcripts (0.0 - 1.0)
    #[clap(short = 'c', long)]
    confidence: Option<f32>,

    /// seconds of silence before the recognizer ends its session
    #[clap(long)]
    silence_secs: Option<u64>,
}

impl Cli {
    /// Command line values win over the stored config
    fn apply(&self, mut cfg: Config) -> Config {
        if let Some(mode) = self.mode {
            cfg.control_mode = mode;
        }
        if let Some(speed) = self.speed {
            cfg.speed_ms = speed;
        }
        if let Some(language) = &self.language {
            cfg.language = language.clone();
        }
        if let Some(confidence) = self.confidence {
            cfg.voice_confidence = confidence.clamp(0.0, 1.0);
        }
        if let Some(secs) = self.silence_secs {
            cfg.silence_secs = secs;
        }
        cfg
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Menu,
    Playing,
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct App {
    pub state: AppState,
    pub config: Config,
    pub game: SnakeGame,
    pub voice: VoiceControl<ConsoleEngineFactory, ConsoleMicrophone>,
    pub feed: ConsoleFeed,
    pub panel: VoicePanel,
    pub high_score: u32,
    pub new_record: bool,
    scores: Option<HighScoreDb>,
    last_step: Duration,
}

impl App {
    pub fn new(config: Config, tx: Sender<GameEvent>, scores: Option<HighScoreDb>) -> Self {
        let feed = ConsoleFeed::new(
            tx,
            Duration::from_secs(config.silence_secs.max(1)),
            config.voice_confidence,
        );
        let recognition = RecognitionConfig {
            language: config.language.clone(),
            ..RecognitionConfig::default()
        };
        let voice = VoiceControl::with_classifier(
            ConsoleEngineFactory::new(feed.clone()),
            ConsoleMicrophone::new(feed.clone()),
            recognition,
            Classifier::with_threshold(config.confidence_threshold),
        );
        let high_score = scores
            .as_ref()
            .and_then(|db| db.get().map_err(|err| tracing::warn!(%err, "could not read high score")).ok())
            .unwrap_or(0);

        Self {
            state: AppState::Menu,
            game: SnakeGame::new(Duration::from_millis(config.speed_ms)),
            config,
            voice,
            feed,
            panel: VoicePanel::default(),
            high_score,
            new_record: false,
            scores,
            last_step: Duration::ZERO,
        }
    }

    pub fn start_game(&mut self, mode: ControlMode, now: Duration) {
        self.game.reset();
        self.panel = VoicePanel::default();
        self.new_record = false;
        self.last_step = now;
        self.config.control_mode = mode;
        self.state = AppState::Playing;
        tracing::info!(%mode, "game started");

        if mode == ControlMode::Voice {
            if let Err(err) = self.voice.enable_voice_mode(&mut self.panel, now) {
                tracing::warn!(%err, "voice mode unavailable, playing with keyboard");
            }
        }
    }

    fn leave_game(&mut self) {
        self.voice.disable_voice_mode(&mut self.panel);
        self.state = AppState::Menu;
    }

    fn game_over(&mut self) {
        self.voice.disable_voice_mode(&mut self.panel);
        let score = self.game.score();
        if let Some(db) = &self.scores {
            match db.submit(score) {
                Ok(record) => self.new_record = record,
                Err(err) => tracing::warn!(%err, "could not store high score"),
            }
        } else {
            self.new_record = score > self.high_score;
        }
        self.high_score = self.high_score.max(score);
        tracing::info!(score, "game over");
        self.state = AppState::GameOver;
    }

    fn reset_high_score(&mut self) {
        if let Some(db) = &self.scores {
            if let Err(err) = db.reset() {
                tracing::warn!(%err, "could not reset high score");
                return;
            }
        }
        self.high_score = 0;
    }

    fn on_key(&mut self, key: KeyEvent, now: Duration) -> Flow {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Flow::Quit;
        }

        match self.state {
            AppState::Menu => match key.code {
                KeyCode::Char('k') => self.start_game(ControlMode::Keyboard, now),
                KeyCode::Char('v') => self.start_game(ControlMode::Voice, now),
                KeyCode::Enter => self.start_game(self.config.control_mode, now),
                KeyCode::Char('r') => self.reset_high_score(),
                KeyCode::Char('q') | KeyCode::Esc => return Flow::Quit,
                _ => {}
            },
            AppState::Playing if key.code == KeyCode::Esc => self.leave_game(),
            AppState::Playing if self.voice.is_voice_mode() => self.on_voice_key(key, now),
            AppState::Playing => match key.code {
                KeyCode::Up => {
                    self.game.steer(Heading::UP);
                }
                KeyCode::Down => {
                    self.game.steer(Heading::DOWN);
                }
                KeyCode::Left => {
                    self.game.steer(Heading::LEFT);
                }
                KeyCode::Right => {
                    self.game.steer(Heading::RIGHT);
                }
                KeyCode::Char(' ') => {
                    self.game.toggle_pause();
                }
                _ => {}
            },
            AppState::GameOver => match key.code {
                KeyCode::Char('r') => self.start_game(self.config.control_mode, now),
                KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Esc => self.state = AppState::Menu,
                KeyCode::Char('q') => return Flow::Quit,
                _ => {}
            },
        }
        Flow::Continue
    }

    /// While voice is active the keyboard is the microphone
    fn on_voice_key(&mut self, key: KeyEvent, now: Duration) {
        match key.code {
            KeyCode::Char(c) => {
                self.feed.type_char(c, now);
            }
            KeyCode::Backspace => {
                self.feed.backspace(now);
            }
            KeyCode::Enter => {
                self.feed.submit(now);
            }
            KeyCode::Tab => {
                let paused = self.game.toggle_pause();
                self.voice.pause_changed(paused, &mut self.panel, now);
            }
            KeyCode::F(9) => {
                self.feed.inject_error(ErrorCode::Network);
            }
            _ => {}
        }
    }

    fn on_speech(&mut self, event: SpeechEvent, now: Duration) {
        if self.state != AppState::Playing {
            return;
        }
        self.voice
            .on_speech_event(event, &mut self.game, &mut self.panel, now);
    }

    /// Runs after every loop step: timers, level meter, snake movement
    fn update(&mut self, now: Duration) {
        if self.state != AppState::Playing {
            return;
        }
        self.feed.poll(now);
        self.voice.on_frame(&mut self.panel, now);
        self.panel.tick();

        if now.saturating_sub(self.last_step) >= self.game.speed() {
            self.last_step = now;
            if self.game.step() == StepOutcome::Crashed {
                self.game_over();
            }
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Some(path) = AppDirs::log_path() {
        // the game is playable without a log file
        let _ = logging::init(&path);
    }

    let store = FileConfigStore::new();
    let config = cli.apply(store.load());
    let scores = HighScoreDb::open_default()
        .map_err(|err| tracing::warn!(%err, "high score database unavailable"))
        .ok();

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let events = CrosstermEventSource::new();
    let mut app = App::new(config, events.sender(), scores);
    let result = start_tui(&mut terminal, &mut app, events);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = store.save(&app.config) {
        tracing::warn!(%err, "could not save config");
    }
    result
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    events: CrosstermEventSource,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(events, FixedTicker::new(Duration::from_millis(TICK_RATE_MS)));
    let started = Instant::now();

    terminal.draw(|f| ui(app, f))?;
    loop {
        let event = runner.step();
        let now = started.elapsed();

        match event {
            GameEvent::Key(key) => {
                if app.on_key(key, now) == Flow::Quit {
                    break;
                }
            }
            GameEvent::Speech(speech) => app.on_speech(speech, now),
            GameEvent::Resize | GameEvent::Tick => {}
        }
        app.update(now);
        terminal.draw(|f| ui(app, f))?;
    }

    app.voice.disable_voice_mode(&mut app.panel);
    Ok(())
}

fn ui(app: &App, f: &mut Frame) {
    current_screen(&app.state).render(app, f);
}
