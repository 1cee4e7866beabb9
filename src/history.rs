use crate::util::confidence_pct;
use chrono::{DateTime, Local};
use std::collections::VecDeque;

pub const MAX_COMMAND_HISTORY: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct CommandLogEntry {
    pub text: String,
    pub recognized_at: DateTime<Local>,
    pub accepted: bool,
    pub confidence_pct: u8,
}

impl CommandLogEntry {
    pub fn new(text: impl Into<String>, accepted: bool, confidence: f32) -> Self {
        Self {
            text: text.into(),
            recognized_at: Local::now(),
            accepted,
            confidence_pct: confidence_pct(confidence),
        }
    }

    /// Engine errors are logged as unaccepted entries with zero confidence
    pub fn engine_error(code: &str) -> Self {
        Self::new(code, false, 0.0)
    }

    pub fn at(mut self, recognized_at: DateTime<Local>) -> Self {
        self.recognized_at = recognized_at;
        self
    }
}

/// Most recent transcripts first, capped at a fixed capacity
#[derive(Debug, Clone)]
pub struct CommandHistory {
    entries: VecDeque<CommandLogEntry>,
    capacity: usize,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new(MAX_COMMAND_HISTORY)
    }
}

impl CommandHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn record(&mut self, entry: CommandLogEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    pub fn entries(&self) -> impl Iterator<Item = &CommandLogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&CommandLogEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Display lines, newest first
    pub fn render(&self) -> Vec<String> {
        if self.entries.is_empty() {
            return vec!["No commands detected yet".to_string()];
        }

        self.entries
            .iter()
            .map(|entry| {
                let marker = if entry.accepted { '✅' } else { '❓' };
                let time = entry.recognized_at.format("%H:%M:%S");
                match entry.confidence_pct {
                    0 => format!("{marker} [{time}] \"{}\"", entry.text),
                    pct => format!("{marker} [{time}] \"{}\" {pct}%", entry.text),
                }
            })
            .collect()
    }
}
