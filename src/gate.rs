use crate::classifier::ClassificationResult;
use crate::command::Command;
use crate::scheduler::{Scheduler, TaskHandle, TimerTask};
use std::time::Duration;

/// Window after an accepted command during which everything is dropped
pub const COOLDOWN_WINDOW: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CooldownState {
    pub on_cooldown: bool,
    pub last_command: Option<Command>,
    pub last_command_at: Option<Duration>,
}

/// Debounce filter between the classifier and the game.
///
/// Interim and final results for one utterance usually arrive within a few
/// hundred milliseconds of each other; the cooldown keeps them from firing
/// the same command twice.
#[derive(Debug)]
pub struct CommandGate {
    state: CooldownState,
    window: Duration,
    pending_clear: Option<TaskHandle>,
}

impl Default for CommandGate {
    fn default() -> Self {
        Self::new(COOLDOWN_WINDOW)
    }
}

impl CommandGate {
    pub fn new(window: Duration) -> Self {
        Self {
            state: CooldownState::default(),
            window,
            pending_clear: None,
        }
    }

    pub fn state(&self) -> &CooldownState {
        &self.state
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns true when `result` should be forwarded to the game.
    /// Rejections leave the gate untouched.
    pub fn admit(
        &mut self,
        result: &ClassificationResult,
        now: Duration,
        scheduler: &mut Scheduler<TimerTask>,
    ) -> bool {
        if self.state.on_cooldown {
            tracing::debug!(text = %result.raw_text, "command dropped during cooldown");
            return false;
        }

        let Some(command) = result.command.filter(|_| result.recognized) else {
            return false;
        };

        self.state.on_cooldown = true;
        self.state.last_command = Some(command);
        self.state.last_command_at = Some(now);
        self.pending_clear = Some(scheduler.schedule(now, self.window, TimerTask::CooldownElapsed));
        true
    }

    /// Deferred half of [`admit`](Self::admit): the window has passed
    pub fn on_cooldown_elapsed(&mut self) {
        self.state.on_cooldown = false;
        self.pending_clear = None;
    }

    /// Drop any cooldown in flight, e.g. when leaving the game
    pub fn reset(&mut self, scheduler: &mut Scheduler<TimerTask>) {
        if let Some(handle) = self.pending_clear.take() {
            scheduler.cancel(handle);
        }
        self.state = CooldownState::default();
    }
}
