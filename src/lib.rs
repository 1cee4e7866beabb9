// Library surface for the binary and the headless integration tests.
// Terminal drawing stays in main.rs/ui; everything here runs without a TTY.
pub mod app_dirs;
pub mod classifier;
pub mod command;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod game;
pub mod gate;
pub mod history;
pub mod level;
pub mod logging;
pub mod microphone;
pub mod runtime;
pub mod scheduler;
pub mod score;
pub mod session;
pub mod util;
pub mod voice;

pub use command::{Command, Heading};
pub use error::VoiceError;
