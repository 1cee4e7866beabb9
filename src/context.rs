use serde::{Deserialize, Serialize};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ControlMode {
    #[default]
    Keyboard,
    Voice,
}

/// Flags shared by the voice components for one game.
///
/// Created when voice mode is activated and dropped at menu return. The
/// session manager only reads it. `paused` is the manual pause flag set
/// through `pause_changed`; a spoken pause only pauses the game.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameSessionContext {
    pub control_mode: ControlMode,
    pub voice_enabled: bool,
    pub permission_granted: bool,
    pub paused: bool,
}

impl GameSessionContext {
    pub fn voice() -> Self {
        Self {
            control_mode: ControlMode::Voice,
            voice_enabled: true,
            ..Self::default()
        }
    }

    /// Whether a recognition session may be (re)started right now
    pub fn allows_listening(&self) -> bool {
        self.voice_enabled && !self.paused
    }

    /// Drop back to keyboard input after a fatal voice failure
    pub fn downgrade(&mut self) {
        self.control_mode = ControlMode::Keyboard;
        self.voice_enabled = false;
    }
}
