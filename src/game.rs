use crate::command::{Command, Heading};
use crate::voice::GameControl;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::time::Duration;

pub const GRID_SIZE: i16 = 20;
pub const START: Point = Point { x: 5, y: 5 };
pub const APPLE_POINTS: u32 = 10;
pub const START_SPEED: Duration = Duration::from_millis(200);
pub const MIN_SPEED: Duration = Duration::from_millis(50);
const SPEED_STEP: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i16,
    pub y: i16,
}

impl Point {
    pub fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }

    fn moved(self, heading: Heading) -> Self {
        Self {
            x: self.x + heading.x as i16,
            y: self.y + heading.y as i16,
        }
    }

    fn in_bounds(self) -> bool {
        (0..GRID_SIZE).contains(&self.x) && (0..GRID_SIZE).contains(&self.y)
    }
}

/// What happened on one movement tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Paused, over, or not moving yet
    Idle,
    Moved,
    Ate,
    Crashed,
}

/// Snake on a fixed 20×20 grid
#[derive(Debug)]
pub struct SnakeGame {
    snake: VecDeque<Point>,
    apple: Point,
    direction: Heading,
    next_direction: Heading,
    score: u32,
    speed: Duration,
    start_speed: Duration,
    paused: bool,
    over: bool,
    rng: StdRng,
}

impl SnakeGame {
    pub fn new(start_speed: Duration) -> Self {
        Self::with_rng(start_speed, StdRng::from_entropy())
    }

    /// Deterministic apple placement
    pub fn seeded(start_speed: Duration, seed: u64) -> Self {
        Self::with_rng(start_speed, StdRng::seed_from_u64(seed))
    }

    fn with_rng(start_speed: Duration, rng: StdRng) -> Self {
        let mut game = Self {
            snake: VecDeque::from([START]),
            apple: START,
            direction: Heading::STILL,
            next_direction: Heading::STILL,
            score: 0,
            speed: start_speed.max(MIN_SPEED),
            start_speed: start_speed.max(MIN_SPEED),
            paused: false,
            over: false,
            rng,
        };
        game.place_apple();
        game
    }

    pub fn reset(&mut self) {
        self.snake = VecDeque::from([START]);
        self.direction = Heading::STILL;
        self.next_direction = Heading::STILL;
        self.score = 0;
        self.speed = self.start_speed;
        self.paused = false;
        self.over = false;
        self.place_apple();
    }

    pub fn snake(&self) -> impl Iterator<Item = &Point> {
        self.snake.iter()
    }

    pub fn head(&self) -> Point {
        self.snake.front().copied().unwrap_or(START)
    }

    pub fn len(&self) -> usize {
        self.snake.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snake.is_empty()
    }

    pub fn apple(&self) -> Point {
        self.apple
    }

    pub fn next_direction(&self) -> Heading {
        self.next_direction
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    /// Current interval between movement ticks
    pub fn speed(&self) -> Duration {
        self.speed
    }

    pub fn is_over(&self) -> bool {
        self.over
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    /// Keyboard steering; refuses to turn the snake back onto itself
    pub fn steer(&mut self, heading: Heading) -> bool {
        if heading.reverses(self.direction) {
            return false;
        }
        self.next_direction = heading;
        true
    }

    pub fn step(&mut self) -> StepOutcome {
        if self.paused || self.over {
            return StepOutcome::Idle;
        }
        self.direction = self.next_direction;
        if self.direction.is_still() {
            return StepOutcome::Idle;
        }

        let head = self.head().moved(self.direction);
        if !head.in_bounds() || self.snake.contains(&head) {
            self.over = true;
            return StepOutcome::Crashed;
        }

        self.snake.push_front(head);
        if head == self.apple {
            self.score += APPLE_POINTS;
            self.speed = self.speed.saturating_sub(SPEED_STEP).max(MIN_SPEED);
            self.place_apple();
            StepOutcome::Ate
        } else {
            self.snake.pop_back();
            StepOutcome::Moved
        }
    }

    fn place_apple(&mut self) {
        if self.snake.len() >= (GRID_SIZE * GRID_SIZE) as usize {
            return;
        }
        loop {
            let candidate = Point::new(
                self.rng.gen_range(0..GRID_SIZE),
                self.rng.gen_range(0..GRID_SIZE),
            );
            if !self.snake.contains(&candidate) {
                self.apple = candidate;
                return;
            }
        }
    }

    #[cfg(test)]
    fn put_apple(&mut self, at: Point) {
        self.apple = at;
    }
}

impl GameControl for SnakeGame {
    fn apply_command(&mut self, command: Command) {
        match command {
            Command::Pause => self.paused = true,
            Command::Resume => self.paused = false,
            directional => {
                if let Some(heading) = directional.heading() {
                    self.next_direction = heading;
                }
            }
        }
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    fn heading(&self) -> Heading {
        self.direction
    }
}
