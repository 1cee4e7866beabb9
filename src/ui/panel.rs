use voxsnake::level::LevelBand;
use voxsnake::session::SessionState;
use voxsnake::voice::{Feedback, Presenter};

/// Frames a transient feedback pulse stays visible
const FEEDBACK_FRAMES: u8 = 8;

/// Everything the voice layer has told the screen, ready to draw
#[derive(Debug, Clone)]
pub struct VoicePanel {
    pub status: String,
    pub log: Vec<String>,
    pub session: SessionState,
    pub fallback: Option<String>,
    pub level: f32,
    pub band: LevelBand,
    feedback: Option<(Feedback, u8)>,
}

impl Default for VoicePanel {
    fn default() -> Self {
        Self {
            status: "Voice control inactive".to_string(),
            log: vec!["No commands detected yet".to_string()],
            session: SessionState::Idle,
            fallback: None,
            level: 0.0,
            band: LevelBand::Quiet,
            feedback: None,
        }
    }
}

impl VoicePanel {
    pub fn feedback(&self) -> Option<Feedback> {
        self.feedback.map(|(kind, _)| kind)
    }

    /// Age the feedback pulse by one frame
    pub fn tick(&mut self) {
        self.feedback = match self.feedback {
            Some((kind, frames)) if frames > 1 => Some((kind, frames - 1)),
            _ => None,
        };
    }

    pub fn is_listening(&self) -> bool {
        self.session == SessionState::Active
    }
}

impl Presenter for VoicePanel {
    fn show_transient_feedback(&mut self, kind: Feedback) {
        self.feedback = Some((kind, FEEDBACK_FRAMES));
    }

    fn render_command_log(&mut self, lines: Vec<String>) {
        self.log = lines;
    }

    fn set_status_text(&mut self, text: &str) {
        self.status = text.to_string();
    }

    fn session_state_changed(&mut self, state: SessionState) {
        self.session = state;
    }

    fn show_fallback(&mut self, message: &str) {
        self.fallback = Some(message.to_string());
    }

    fn set_level(&mut self, level: f32, band: LevelBand) {
        self.level = level;
        self.band = band;
    }
}
