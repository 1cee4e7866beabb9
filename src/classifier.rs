use crate::command::{Command, Heading};
use itertools::Itertools;
use regex::Regex;

/// Transcripts below this engine confidence are never interpreted
pub const CONFIDENCE_THRESHOLD: f32 = 0.4;

/// Outcome of interpreting a single transcript
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub command: Option<Command>,
    pub recognized: bool,
    pub confidence: f32,
    pub raw_text: String,
}

impl ClassificationResult {
    fn hit(command: Command, confidence: f32, raw_text: &str) -> Self {
        Self {
            command: Some(command),
            recognized: true,
            confidence,
            raw_text: raw_text.to_string(),
        }
    }

    fn miss(confidence: f32, raw_text: &str) -> Self {
        Self {
            command: None,
            recognized: false,
            confidence,
            raw_text: raw_text.to_string(),
        }
    }
}

/// Synonyms accepted for each command
pub fn keywords(command: Command) -> &'static [&'static str] {
    match command {
        Command::Up => &["up", "top", "north", "above"],
        Command::Down => &["down", "bottom", "south", "below"],
        Command::Left => &["left", "west"],
        Command::Right => &["right", "east"],
        Command::Pause => &["stop", "pause", "wait", "halt", "freeze"],
        Command::Resume => &["start", "go", "resume", "continue", "play"],
    }
}

/// Keyword based transcript interpreter.
///
/// Stateless apart from the compiled whole-word patterns, one per command in
/// [`Command::PRIORITY`] order.
#[derive(Debug, Clone)]
pub struct Classifier {
    threshold: f32,
    patterns: Vec<(Command, Regex)>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    pub fn new() -> Self {
        Self::with_threshold(CONFIDENCE_THRESHOLD)
    }

    pub fn with_threshold(threshold: f32) -> Self {
        let patterns = Command::PRIORITY
            .iter()
            .map(|&command| {
                let alternatives = keywords(command).iter().map(|k| regex::escape(k)).join("|");
                let pattern = Regex::new(&format!(r"(?i)\b(?:{alternatives})\b"))
                    .expect("keyword patterns are static and valid");
                (command, pattern)
            })
            .collect();

        Self {
            threshold,
            patterns,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Interpret `raw_text` against the snake's applied heading and pause state.
    ///
    /// A directional match that would turn the snake back onto itself is
    /// skipped and evaluation falls through to the next keyword set. A
    /// pause/resume match ends evaluation, and is discarded when it would
    /// not change the pause state.
    pub fn classify(
        &self,
        raw_text: &str,
        confidence: f32,
        current: Heading,
        paused: bool,
    ) -> ClassificationResult {
        let raw_text = raw_text.trim();

        // NaN confidences fail this comparison too
        if !(confidence >= self.threshold) {
            tracing::debug!(confidence, text = raw_text, "skipping low confidence transcript");
            return ClassificationResult::miss(confidence, raw_text);
        }

        let text = raw_text.to_lowercase();
        for (command, pattern) in &self.patterns {
            if !pattern.is_match(&text) {
                continue;
            }

            match command.heading() {
                Some(heading) if heading.reverses(current) => continue,
                Some(_) => return ClassificationResult::hit(*command, confidence, raw_text),
                None => {
                    let changes_state = match command {
                        Command::Pause => !paused,
                        _ => paused,
                    };
                    return if changes_state {
                        ClassificationResult::hit(*command, confidence, raw_text)
                    } else {
                        ClassificationResult::miss(confidence, raw_text)
                    };
                }
            }
        }

        ClassificationResult::miss(confidence, raw_text)
    }
}
