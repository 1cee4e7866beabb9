use ratatui::Frame;

use crate::{
    ui::{render_game_over, render_menu, render_playing},
    App, AppState,
};

/// A UI Screen boundary: responsible for rendering one app state
pub trait Screen {
    fn render(&self, app: &App, f: &mut Frame);
}

pub struct MenuScreen;

impl Screen for MenuScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_menu(app, f.area(), f.buffer_mut());
    }
}

pub struct PlayingScreen;

impl Screen for PlayingScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_playing(app, f.area(), f.buffer_mut());
    }
}

pub struct GameOverScreen;

impl Screen for GameOverScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_game_over(app, f.area(), f.buffer_mut());
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(state: &AppState) -> Box<dyn Screen> {
    match state {
        AppState::Menu => Box::new(MenuScreen),
        AppState::Playing => Box::new(PlayingScreen),
        AppState::GameOver => Box::new(GameOverScreen),
    }
}
