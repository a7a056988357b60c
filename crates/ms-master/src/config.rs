//! Player configuration.

use std::time::Duration;

use ms_engine::DEFAULT_CHANNEL_VOLUME;
use ms_ir::DEFAULT_TEMPO;

/// Maps user-facing volume levels onto a gain.
///
/// Level 0 is silence. Levels `1..=max_level` are spread linearly between
/// `min_gain` and `max_gain`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VolumeRange {
    pub max_level: u8,
    pub min_gain: f32,
    pub max_gain: f32,
}

impl VolumeRange {
    pub fn gain_for_level(&self, level: u8) -> f32 {
        if level == 0 {
            return 0.0;
        }
        let level = level.min(self.max_level);
        if self.max_level <= 1 {
            return self.max_gain;
        }
        let step = (self.max_gain - self.min_gain) / f32::from(self.max_level - 1);
        self.min_gain + step * f32::from(level - 1)
    }
}

impl Default for VolumeRange {
    fn default() -> Self {
        Self {
            max_level: 15,
            min_gain: 0.20,
            max_gain: 0.75,
        }
    }
}

/// Controller settings.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerConfig {
    /// Tempo programmed into the device on register, in microseconds per beat
    pub initial_tempo: u32,
    /// Channel volume assumed until the score sets one
    pub default_channel_volume: u8,
    pub volume: VolumeRange,
    /// Consecutive submission failures before the worker gives up.
    /// `None` retries forever.
    pub max_submit_failures: Option<u32>,
    /// Pause between submission retries
    pub submit_retry_delay: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            initial_tempo: DEFAULT_TEMPO,
            default_channel_volume: DEFAULT_CHANNEL_VOLUME,
            volume: VolumeRange::default(),
            max_submit_failures: Some(16),
            submit_retry_delay: Duration::from_millis(10),
        }
    }
}
