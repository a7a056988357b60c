//! Channel volume shaping.
//!
//! Output devices tend to have a strongly non-linear response to the main
//! volume controller, so a scaled volume is looked up in a correction curve
//! instead of being multiplied through directly.

use arrayvec::ArrayVec;
use ms_ir::{NativeEvent, ShortMessage, CONTROLLER_MAIN_VOLUME, MIDI_CHANNELS};

/// Perceptual correction curve, indexed by linearly scaled volume (0-127).
#[rustfmt::skip]
pub const VOLUME_CORRECTION: [u8; 128] = [
      0,   4,   7,  11,  13,  14,  16,  18,
     21,  22,  23,  24,  24,  24,  25,  25,
     25,  26,  26,  27,  27,  27,  28,  28,
     29,  29,  29,  30,  30,  31,  31,  32,
     32,  32,  33,  33,  34,  34,  35,  35,
     36,  37,  37,  38,  38,  39,  39,  40,
     40,  41,  42,  42,  43,  43,  44,  45,
     45,  46,  47,  47,  48,  49,  49,  50,
     51,  52,  52,  53,  54,  55,  56,  56,
     57,  58,  59,  60,  61,  62,  62,  63,
     64,  65,  66,  67,  68,  69,  70,  71,
     72,  73,  74,  75,  77,  78,  79,  80,
     81,  82,  84,  85,  86,  87,  89,  90,
     91,  92,  94,  95,  96,  98,  99, 101,
    102, 104, 105, 107, 108, 110, 112, 113,
    115, 117, 118, 120, 122, 123, 125, 127,
];

/// Channel volume assumed until a file sets its own.
pub const DEFAULT_CHANNEL_VOLUME: u8 = 100;

/// Last raw volume seen per channel, plus the global gain.
#[derive(Clone, Debug)]
pub struct VolumeShaper {
    channel_volume: [u8; MIDI_CHANNELS],
    /// 0.0 ..= 1.0
    gain: f32,
}

impl VolumeShaper {
    pub fn new() -> Self {
        Self {
            channel_volume: [DEFAULT_CHANNEL_VOLUME; MIDI_CHANNELS],
            gain: 1.0,
        }
    }

    /// Forget per-channel volumes (new score). The gain is kept.
    pub fn reset_channels(&mut self, volume: u8) {
        self.channel_volume = [volume.min(127); MIDI_CHANNELS];
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn channel_volume(&self, channel: u8) -> u8 {
        self.channel_volume[(channel & 0x0F) as usize]
    }

    /// Corrected output value for a raw channel volume at the current gain.
    pub fn scaled(&self, raw: u8) -> u8 {
        if self.gain <= 0.0 {
            return 0;
        }
        let index = (raw.min(127) as f32 * self.gain) as usize;
        VOLUME_CORRECTION[index.min(127)]
    }

    /// Rewrite a main-volume controller on its way to the device.
    ///
    /// The raw value is remembered for the channel so a later gain change can
    /// re-send it. Every other event passes through untouched.
    pub fn apply(&mut self, event: &mut NativeEvent) {
        let Some(msg) = event.message_mut() else { return };
        if !msg.is_main_volume() {
            return;
        }
        self.channel_volume[(msg.channel & 0x0F) as usize] = msg.data2;
        msg.data2 = self.scaled(msg.data2);
    }

    /// Change the gain and return one volume controller per channel to send out-of-band.
    pub fn set_gain(&mut self, gain: f32) -> ArrayVec<ShortMessage, MIDI_CHANNELS> {
        self.gain = if gain.is_nan() { 0.0 } else { gain.clamp(0.0, 1.0) };
        self.channel_messages()
    }

    /// Volume controllers reflecting the current state of every channel.
    pub fn channel_messages(&self) -> ArrayVec<ShortMessage, MIDI_CHANNELS> {
        self.channel_volume
            .iter()
            .enumerate()
            .map(|(ch, &raw)| ShortMessage::controller(ch as u8, CONTROLLER_MAIN_VOLUME, self.scaled(raw)))
            .collect()
    }
}

impl Default for VolumeShaper {
    fn default() -> Self {
        Self::new()
    }
}
