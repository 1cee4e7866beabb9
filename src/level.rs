use crate::microphone::AudioSource;
use crate::util::mean;

/// Analyser size; half of it is the number of frequency bins
pub const FFT_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum LevelBand {
    Quiet,
    Normal,
    Loud,
}

impl LevelBand {
    pub fn from_level(level: f32) -> Self {
        if level > 0.8 {
            LevelBand::Loud
        } else if level > 0.4 {
            LevelBand::Normal
        } else {
            LevelBand::Quiet
        }
    }
}

/// Owned analyser tap; releasing the source is tied to dropping the tap
struct LevelTap {
    source: Box<dyn AudioSource>,
    bins: Vec<u8>,
}

impl Drop for LevelTap {
    fn drop(&mut self) {
        self.source.release();
    }
}

/// Microphone amplitude for the UI, sampled once per frame while the
/// recognition session is active.
#[derive(Default)]
pub struct LevelMonitor {
    tap: Option<LevelTap>,
    level: f32,
}

impl std::fmt::Debug for LevelMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelMonitor")
            .field("attached", &self.is_attached())
            .field("level", &self.level)
            .finish()
    }
}

impl LevelMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start sampling `source`, releasing whatever was attached before
    pub fn attach(&mut self, source: Box<dyn AudioSource>) {
        self.tap = Some(LevelTap {
            source,
            bins: vec![0; FFT_SIZE / 2],
        });
        tracing::debug!("audio level monitor attached");
    }

    pub fn release(&mut self) {
        if self.tap.take().is_some() {
            tracing::debug!("audio level monitor released");
        }
        self.level = 0.0;
    }

    pub fn is_attached(&self) -> bool {
        self.tap.is_some()
    }

    /// Read one frame; `None` when nothing is attached
    pub fn sample(&mut self) -> Option<f32> {
        let tap = self.tap.as_mut()?;
        tap.source.frequency_data(&mut tap.bins);
        let values: Vec<f64> = tap.bins.iter().map(|&b| b as f64).collect();
        self.level = (mean(&values).unwrap_or(0.0) / 255.0).clamp(0.0, 1.0) as f32;
        Some(self.level)
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn band(&self) -> LevelBand {
        LevelBand::from_level(self.level)
    }
}
