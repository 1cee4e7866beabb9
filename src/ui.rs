pub mod panel;
pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Widget, Wrap},
};

use voxsnake::game::{SnakeGame, GRID_SIZE};
use voxsnake::level::LevelBand;
use voxsnake::session::SessionState;
use voxsnake::voice::{Feedback, GameControl};

use crate::App;

const BOARD_WIDTH: u16 = GRID_SIZE as u16 * 2 + 2;
const BOARD_HEIGHT: u16 = GRID_SIZE as u16 + 2;
const SIDE_PANEL_WIDTH: u16 = 44;

/// The 20×20 grid, two terminal columns per cell
struct Board<'a> {
    game: &'a SnakeGame,
    border: Style,
}

impl Widget for Board<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = format!(" score {} {} ", self.game.score(), self.game.heading().arrow());
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.border)
            .title(title);
        let inner = block.inner(area);
        block.render(area, buf);

        let cell = |x: i16, y: i16| -> Option<(u16, u16)> {
            let cx = inner.x + x as u16 * 2;
            let cy = inner.y + y as u16;
            (cx + 1 < inner.right() && cy < inner.bottom()).then_some((cx, cy))
        };

        let apple = self.game.apple();
        if let Some((x, y)) = cell(apple.x, apple.y) {
            buf.set_string(x, y, "●", Style::default().fg(Color::Red));
        }

        for (idx, part) in self.game.snake().enumerate() {
            if let Some((x, y)) = cell(part.x, part.y) {
                let style = if idx == 0 {
                    Style::default()
                        .fg(Color::LightGreen)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Green)
                };
                buf.set_string(x, y, "██", style);
            }
        }

        if self.game.is_paused() {
            let msg = "PAUSED";
            let x = inner.x + inner.width.saturating_sub(msg.len() as u16) / 2;
            let y = inner.y + inner.height / 2;
            buf.set_string(
                x,
                y,
                msg,
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            );
        }
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

pub fn render_menu(app: &App, area: Rect, buf: &mut Buffer) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);

    let mut lines = vec![
        Line::from(Span::styled(
            "V O X S N A K E",
            Style::default().fg(Color::Green).patch(bold),
        )),
        Line::from(""),
        Line::from(format!("High score: {}", app.high_score)),
        Line::from(format!("Last mode: {}", app.config.control_mode)),
        Line::from(""),
        Line::from(Span::styled("(k) play with keyboard", bold)),
        Line::from(Span::styled("(v) play with voice", bold)),
        Line::from(Span::styled("(r) reset high score   (q) quit", dim)),
    ];

    if let Some(message) = &app.panel.fallback {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Yellow),
        )));
    }

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(centered(area, 60, 14), buf);
}

pub fn render_playing(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(BOARD_WIDTH),
            Constraint::Length(SIDE_PANEL_WIDTH),
            Constraint::Min(0),
        ])
        .split(centered(area, BOARD_WIDTH + SIDE_PANEL_WIDTH, BOARD_HEIGHT));

    let border = match app.panel.feedback() {
        Some(Feedback::CommandReceived) => Style::default().fg(Color::Cyan),
        Some(Feedback::VoiceActive) => Style::default().fg(Color::Green),
        None => Style::default(),
    };
    Board {
        game: &app.game,
        border,
    }
    .render(chunks[0], buf);

    if app.voice.is_voice_mode() {
        render_voice_panel(app, chunks[1], buf);
    } else {
        let help = vec![
            Line::from(Span::styled(
                "keyboard controls",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from("arrows  steer"),
            Line::from("space   pause"),
            Line::from("esc     back to menu"),
        ];
        let mut paragraph = Paragraph::new(help).block(Block::default().borders(Borders::ALL));
        if let Some(message) = &app.panel.fallback {
            paragraph = Paragraph::new(vec![
                Line::from("arrows steer, space pauses, esc leaves"),
                Line::from(""),
                Line::from(Span::styled(
                    message.clone(),
                    Style::default().fg(Color::Yellow),
                )),
            ])
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL));
        }
        paragraph.render(chunks[1], buf);
    }
}

fn render_voice_panel(app: &App, area: Rect, buf: &mut Buffer) {
    let panel = &app.panel;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(2),
        ])
        .split(area);

    let indicator = match panel.session {
        SessionState::Active => Span::styled("● listening", Style::default().fg(Color::Green)),
        SessionState::Starting | SessionState::Recreating => {
            Span::styled("◌ starting", Style::default().fg(Color::Yellow))
        }
        SessionState::ErrorBackoff => {
            Span::styled("◌ retrying", Style::default().fg(Color::Red))
        }
        SessionState::Idle => Span::styled("○ idle", Style::default().add_modifier(Modifier::DIM)),
    };
    Paragraph::new(Line::from(vec![indicator, Span::raw("  "), Span::raw(&panel.status)]))
        .block(Block::default().borders(Borders::ALL).title(" voice "))
        .render(rows[0], buf);

    let level_color = match panel.band {
        LevelBand::Quiet => Color::DarkGray,
        LevelBand::Normal => Color::Green,
        LevelBand::Loud => Color::Red,
    };
    Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" level "))
        .gauge_style(Style::default().fg(level_color))
        .ratio(f64::from(panel.level.clamp(0.0, 1.0)))
        .label(panel.band.to_string())
        .render(rows[1], buf);

    Paragraph::new(format!("> {}", app.feed.utterance()))
        .block(Block::default().borders(Borders::ALL).title(" say "))
        .render(rows[2], buf);

    let log: Vec<Line> = panel.log.iter().map(|l| Line::from(l.as_str())).collect();
    Paragraph::new(log)
        .block(Block::default().borders(Borders::ALL).title(" heard "))
        .render(rows[3], buf);

    Paragraph::new("enter say · tab pause · F9 drop network · esc menu")
        .style(Style::default().add_modifier(Modifier::DIM | Modifier::ITALIC))
        .wrap(Wrap { trim: true })
        .render(rows[4], buf);
}

pub fn render_game_over(app: &App, area: Rect, buf: &mut Buffer) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut lines = vec![
        Line::from(Span::styled("GAME OVER", bold.fg(Color::Red))),
        Line::from(""),
        Line::from(format!("Your score: {}", app.game.score())),
        Line::from(format!("High score: {}", app.high_score)),
    ];
    if app.new_record {
        lines.push(Line::from(Span::styled(
            "New high score!",
            Style::default().fg(Color::Yellow).patch(bold),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "(r)eplay / (enter) menu / (q)uit",
        Style::default().add_modifier(Modifier::ITALIC),
    )));

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(centered(area, 40, 9), buf);
}
