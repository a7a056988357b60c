//! Device-ready events.
//!
//! A [`NativeEvent`] is what an output device consumes: a delta time plus
//! either a tempo change or a short channel message. The packed form
//! follows the sequencer-stream layout of one 32-bit word per event, with
//! the event type in the top byte.

use crate::event::{ChannelEventKind, CONTROLLER_MAIN_VOLUME};

/// Packed event type for a short channel message.
pub const MEVT_SHORTMSG: u8 = 0x00;
/// Packed event type for a tempo change.
pub const MEVT_TEMPO: u8 = 0x01;

/// One device-ready instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeEvent {
    /// Ticks since the previous event in the table
    pub delta_time: u32,
    pub kind: NativeEventKind,
}

/// Native event payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativeEventKind {
    /// Microseconds per quarter note (24-bit)
    Tempo(u32),
    /// Channel voice message
    Short(ShortMessage),
}

impl NativeEvent {
    pub const fn short(delta_time: u32, message: ShortMessage) -> Self {
        Self {
            delta_time,
            kind: NativeEventKind::Short(message),
        }
    }

    pub const fn tempo(delta_time: u32, micros_per_beat: u32) -> Self {
        Self {
            delta_time,
            kind: NativeEventKind::Tempo(micros_per_beat & 0x00FF_FFFF),
        }
    }

    /// The short message, if this is one.
    pub fn message(&self) -> Option<&ShortMessage> {
        match &self.kind {
            NativeEventKind::Short(msg) => Some(msg),
            NativeEventKind::Tempo(_) => None,
        }
    }

    /// Mutable access to the short message, if this is one.
    pub fn message_mut(&mut self) -> Option<&mut ShortMessage> {
        match &mut self.kind {
            NativeEventKind::Short(msg) => Some(msg),
            NativeEventKind::Tempo(_) => None,
        }
    }

    /// Pack into the device word: type in bits 24-31, payload below.
    pub fn packed(&self) -> u32 {
        match self.kind {
            NativeEventKind::Tempo(tempo) => ((MEVT_TEMPO as u32) << 24) | (tempo & 0x00FF_FFFF),
            NativeEventKind::Short(msg) => ((MEVT_SHORTMSG as u32) << 24) | msg.packed(),
        }
    }
}

/// A channel voice message: status, channel and up to two data bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShortMessage {
    pub kind: ChannelEventKind,
    /// 0-15
    pub channel: u8,
    pub data1: u8,
    /// Always zero for program change and channel aftertouch
    pub data2: u8,
}

impl ShortMessage {
    pub fn new(kind: ChannelEventKind, channel: u8, data1: u8, data2: u8) -> Self {
        let data2 = if kind.data_len() == 1 { 0 } else { data2 & 0x7F };
        Self {
            kind,
            channel: channel & 0x0F,
            data1: data1 & 0x7F,
            data2,
        }
    }

    /// Controller message (`Bn cc vv`).
    pub fn controller(channel: u8, controller: u8, value: u8) -> Self {
        Self::new(ChannelEventKind::Controller, channel, controller, value)
    }

    pub fn status(&self) -> u8 {
        self.kind as u8 | self.channel
    }

    /// True for a channel main volume controller.
    pub fn is_main_volume(&self) -> bool {
        self.kind == ChannelEventKind::Controller && self.data1 == CONTROLLER_MAIN_VOLUME
    }

    /// Wire length in bytes (2 or 3).
    pub fn len(&self) -> usize {
        1 + self.kind.data_len()
    }

    /// Wire bytes; only the first [`len`](Self::len) are meaningful.
    pub fn bytes(&self) -> [u8; 3] {
        [self.status(), self.data1, self.data2]
    }

    /// `status | data1 << 8 | data2 << 16`.
    pub fn packed(&self) -> u32 {
        self.status() as u32 | (self.data1 as u32) << 8 | (self.data2 as u32) << 16
    }
}
