/// Discrete game command produced by the voice layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum Command {
    Up,
    Down,
    Left,
    Right,
    Pause,
    Resume,
}

impl Command {
    /// Evaluation order when several keyword sets match one transcript
    pub const PRIORITY: [Command; 6] = [
        Command::Up,
        Command::Down,
        Command::Left,
        Command::Right,
        Command::Pause,
        Command::Resume,
    ];

    /// Heading a directional command steers towards; `None` for pause/resume
    pub fn heading(self) -> Option<Heading> {
        match self {
            Command::Up => Some(Heading::UP),
            Command::Down => Some(Heading::DOWN),
            Command::Left => Some(Heading::LEFT),
            Command::Right => Some(Heading::RIGHT),
            Command::Pause | Command::Resume => None,
        }
    }

    pub fn is_directional(self) -> bool {
        self.heading().is_some()
    }

    /// Status line shown after the command was applied
    pub fn status_text(self) -> &'static str {
        match self {
            Command::Up => "Command: UP",
            Command::Down => "Command: DOWN",
            Command::Left => "Command: LEFT",
            Command::Right => "Command: RIGHT",
            Command::Pause => "Game paused",
            Command::Resume => "Game resumed",
        }
    }
}

/// Movement vector on the grid. `y` grows downward; `{0, 0}` is a snake
/// that has not started moving yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Heading {
    pub x: i8,
    pub y: i8,
}

impl Heading {
    pub const STILL: Heading = Heading { x: 0, y: 0 };
    pub const UP: Heading = Heading { x: 0, y: -1 };
    pub const DOWN: Heading = Heading { x: 0, y: 1 };
    pub const LEFT: Heading = Heading { x: -1, y: 0 };
    pub const RIGHT: Heading = Heading { x: 1, y: 0 };

    pub fn new(x: i8, y: i8) -> Self {
        Self { x, y }
    }

    pub fn is_still(self) -> bool {
        self == Heading::STILL
    }

    /// True when `self` points exactly against `current`
    pub fn reverses(self, current: Heading) -> bool {
        !current.is_still() && self.x == -current.x && self.y == -current.y
    }

    pub fn arrow(self) -> char {
        match (self.x, self.y) {
            (1, _) => '→',
            (-1, _) => '←',
            (_, 1) => '↓',
            (_, -1) => '↑',
            _ => '•',
        }
    }
}
