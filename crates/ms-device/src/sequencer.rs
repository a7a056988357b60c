//! Software stream sequencer.
//!
//! Emulates a hardware stream device: queued buffers are played on a
//! dedicated thread that converts delta ticks to wall-clock time using the
//! current tempo and time division, writes each message to a [`MidiSink`],
//! and reports every fully consumed buffer through a [`CompletionNotifier`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use ms_ir::{
    NativeEvent, NativeEventKind, ShortMessage, CONTROLLER_ALL_NOTES_OFF, CONTROLLER_RESET_ALL,
    DEFAULT_TEMPO, MIDI_CHANNELS,
};
use parking_lot::Mutex;

use crate::traits::{DeviceError, MidiSink, OutputDevice};
use crate::wake::CompletionNotifier;

/// Default division until one is set: 96 ticks per quarter note.
const DEFAULT_DIVISION: u16 = 96;

/// Largest tempo representable in a 24-bit tempo event.
const MAX_TEMPO: u32 = 0x00FF_FFFF;

enum Command {
    TimeDivision(u16),
    Tempo(u32),
    Submit(Vec<NativeEvent>),
    Start,
    Stop { ack: Sender<()> },
    Pause,
    Resume,
    Close,
}

/// Output device backed by a timing thread and a [`MidiSink`].
pub struct SequencerDevice<S: MidiSink> {
    commands: Sender<Command>,
    sink: Arc<Mutex<S>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl<S: MidiSink> SequencerDevice<S> {
    /// Open the device. Completed buffers are reported through `notifier`.
    pub fn open(sink: S, notifier: CompletionNotifier) -> Result<Self, DeviceError> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let sink = Arc::new(Mutex::new(sink));
        let sequencer = Sequencer::new(sink.clone(), notifier);

        let thread = thread::Builder::new()
            .name("midistream-sequencer".into())
            .spawn(move || sequencer.run(rx))
            .map_err(|e| DeviceError::DeviceInit(e.to_string()))?;

        log::debug!("sequencer device opened");
        Ok(Self {
            commands: tx,
            sink,
            thread: Mutex::new(Some(thread)),
        })
    }

    fn command(&self, command: Command) -> Result<(), DeviceError> {
        self.commands.send(command).map_err(|_| DeviceError::Closed)
    }

    fn is_closed(&self) -> bool {
        self.thread.lock().is_none()
    }

    /// Send a controller to every channel, directly to the sink.
    fn broadcast_controller(&self, controller: u8) -> Result<(), DeviceError> {
        let mut sink = self.sink.lock();
        for channel in 0..MIDI_CHANNELS as u8 {
            let msg = ShortMessage::controller(channel, controller, 0);
            sink.send(&msg.bytes()[..msg.len()])?;
        }
        Ok(())
    }

    /// Stop the timing thread and wait until it has let go of the queue.
    fn halt(&self) -> Result<(), DeviceError> {
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        self.command(Command::Stop { ack: ack_tx })?;
        ack_rx.recv().map_err(|_| DeviceError::Closed)
    }
}

impl<S: MidiSink> OutputDevice for SequencerDevice<S> {
    fn set_time_division(&self, division: u16) -> Result<(), DeviceError> {
        validate_division(division)?;
        self.command(Command::TimeDivision(division))
    }

    fn set_tempo(&self, micros_per_beat: u32) -> Result<(), DeviceError> {
        if micros_per_beat == 0 || micros_per_beat > MAX_TEMPO {
            return Err(DeviceError::Property(format!(
                "tempo {} out of range",
                micros_per_beat
            )));
        }
        self.command(Command::Tempo(micros_per_beat))
    }

    fn submit(&self, events: &[NativeEvent]) -> Result<(), DeviceError> {
        self.command(Command::Submit(events.to_vec()))
    }

    fn send_immediate(&self, message: ShortMessage) -> Result<(), DeviceError> {
        if self.is_closed() {
            return Err(DeviceError::Closed);
        }
        self.sink.lock().send(&message.bytes()[..message.len()])
    }

    fn start(&self) -> Result<(), DeviceError> {
        self.command(Command::Start)
    }

    fn stop(&self) -> Result<(), DeviceError> {
        self.halt()?;
        self.broadcast_controller(CONTROLLER_ALL_NOTES_OFF)
    }

    fn pause(&self) -> Result<(), DeviceError> {
        self.command(Command::Pause)
    }

    fn resume(&self) -> Result<(), DeviceError> {
        self.command(Command::Resume)
    }

    fn reset(&self) -> Result<(), DeviceError> {
        self.halt()?;
        self.broadcast_controller(CONTROLLER_ALL_NOTES_OFF)?;
        self.broadcast_controller(CONTROLLER_RESET_ALL)
    }

    fn close(&self) -> Result<(), DeviceError> {
        let Some(handle) = self.thread.lock().take() else {
            return Ok(());
        };
        let _ = self.commands.send(Command::Close);
        handle
            .join()
            .map_err(|_| DeviceError::DeviceInit("sequencer thread panicked".into()))?;
        log::debug!("sequencer device closed");
        Ok(())
    }
}

impl<S: MidiSink> Drop for SequencerDevice<S> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("closing sequencer device: {}", e);
        }
    }
}

/// Reject divisions that would make tick length undefined.
fn validate_division(division: u16) -> Result<(), DeviceError> {
    if division & 0x8000 != 0 {
        let fps = smpte_fps(division);
        let ticks_per_frame = division & 0xFF;
        if !matches!(fps, 24 | 25 | 29 | 30) || ticks_per_frame == 0 {
            return Err(DeviceError::Property(format!(
                "invalid SMPTE division {:#06x}",
                division
            )));
        }
    } else if division == 0 {
        return Err(DeviceError::Property("time division is zero".into()));
    }
    Ok(())
}

/// Frames per second from an SMPTE division (stored negated in the high byte).
fn smpte_fps(division: u16) -> i32 {
    -i32::from((division >> 8) as u8 as i8)
}

// ---------------------------------------------------------------------------
// Timing thread
// ---------------------------------------------------------------------------

struct QueuedBuffer {
    events: Vec<NativeEvent>,
    next: usize,
}

impl QueuedBuffer {
    fn is_done(&self) -> bool {
        self.next >= self.events.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Transport {
    Stopped,
    Running,
    Paused { at: Instant },
}

struct Sequencer<S: MidiSink> {
    sink: Arc<Mutex<S>>,
    notifier: CompletionNotifier,
    queue: VecDeque<QueuedBuffer>,
    time_division: u16,
    /// Microseconds per quarter note
    tempo: u32,
    transport: Transport,
    /// Origin for the next event's delta time.
    last_event: Instant,
    /// When the head event is due, once computed.
    due: Option<Instant>,
}

impl<S: MidiSink> Sequencer<S> {
    fn new(sink: Arc<Mutex<S>>, notifier: CompletionNotifier) -> Self {
        Self {
            sink,
            notifier,
            queue: VecDeque::new(),
            time_division: DEFAULT_DIVISION,
            tempo: DEFAULT_TEMPO,
            transport: Transport::Stopped,
            last_event: Instant::now(),
            due: None,
        }
    }

    fn run(mut self, commands: Receiver<Command>) {
        loop {
            self.retire_finished();
            let received = match self.next_due() {
                Some(due) => match commands.recv_deadline(due) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match commands.recv() {
                    Ok(command) => Some(command),
                    Err(_) => break,
                },
            };

            if let Some(command) = received {
                if !self.handle(command) {
                    break;
                }
            }
            self.emit_due();
        }
        log::trace!("sequencer thread exiting");
    }

    /// Apply a command. Returns false when the thread should exit.
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::TimeDivision(division) => {
                self.time_division = division;
                self.due = None;
            }
            Command::Tempo(tempo) => {
                self.tempo = tempo;
                self.due = None;
            }
            Command::Submit(events) => {
                self.queue.push_back(QueuedBuffer { events, next: 0 });
            }
            Command::Start => match self.transport {
                Transport::Stopped => {
                    self.last_event = Instant::now();
                    self.due = None;
                    self.transport = Transport::Running;
                }
                Transport::Paused { .. } => self.resume(),
                Transport::Running => {}
            },
            Command::Stop { ack } => {
                self.transport = Transport::Stopped;
                self.due = None;
                // Every queued buffer counts as returned.
                for _ in self.queue.drain(..) {
                    self.notifier.buffer_consumed();
                }
                let _ = ack.send(());
            }
            Command::Pause => {
                if self.transport == Transport::Running {
                    self.transport = Transport::Paused { at: Instant::now() };
                }
            }
            Command::Resume => self.resume(),
            Command::Close => return false,
        }
        true
    }

    fn resume(&mut self) {
        if let Transport::Paused { at } = self.transport {
            let held = at.elapsed();
            self.last_event += held;
            self.due = self.due.map(|due| due + held);
            self.transport = Transport::Running;
        }
    }

    /// Hand back buffers that have nothing left to play.
    fn retire_finished(&mut self) {
        if self.transport != Transport::Running {
            return;
        }
        while self.queue.front().is_some_and(QueuedBuffer::is_done) {
            self.queue.pop_front();
            self.notifier.buffer_consumed();
        }
    }

    /// When the head event should be emitted, if anything is playing.
    fn next_due(&mut self) -> Option<Instant> {
        if self.transport != Transport::Running {
            return None;
        }
        if self.due.is_none() {
            let buffer = self.queue.front()?;
            let event = buffer.events.get(buffer.next)?;
            self.due = Some(self.last_event + self.ticks_to_duration(event.delta_time));
        }
        self.due
    }

    fn emit_due(&mut self) {
        loop {
            self.retire_finished();
            let Some(due) = self.next_due() else { break };
            if Instant::now() < due {
                break;
            }
            let Some(buffer) = self.queue.front_mut() else { break };
            let event = buffer.events[buffer.next];
            buffer.next += 1;
            // Advance from the scheduled time, not from now, so lateness doesn't accumulate.
            self.last_event = due;
            self.due = None;
            self.emit(event);
        }
    }

    fn emit(&mut self, event: NativeEvent) {
        match event.kind {
            NativeEventKind::Tempo(tempo) => {
                log::trace!("tempo change: {} us/beat", tempo);
                if tempo > 0 {
                    self.tempo = tempo;
                }
            }
            NativeEventKind::Short(msg) => {
                if let Err(e) = self.sink.lock().send(&msg.bytes()[..msg.len()]) {
                    log::warn!("dropping {:?}: {}", msg, e);
                }
            }
        }
    }

    fn ticks_to_duration(&self, ticks: u32) -> Duration {
        let nanos = if self.time_division & 0x8000 != 0 {
            let fps = smpte_fps(self.time_division).max(1) as u128;
            let ticks_per_frame = ((self.time_division & 0xFF) as u128).max(1);
            ticks as u128 * 1_000_000_000 / (fps * ticks_per_frame)
        } else {
            let ppq = (self.time_division as u128).max(1);
            ticks as u128 * self.tempo as u128 * 1_000 / ppq
        };
        Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wake::{wake_channel, WakeReason, WakeReceiver};
    use ms_ir::ChannelEventKind;

    /// Sink that remembers everything written to it.
    #[derive(Clone, Default)]
    struct RecordingSink(Arc<Mutex<Vec<Vec<u8>>>>);

    impl RecordingSink {
        fn messages(&self) -> Vec<Vec<u8>> {
            self.0.lock().clone()
        }
    }

    impl MidiSink for RecordingSink {
        fn send(&mut self, bytes: &[u8]) -> Result<(), DeviceError> {
            self.0.lock().push(bytes.to_vec());
            Ok(())
        }
    }

    fn note(delta: u32, key: u8) -> NativeEvent {
        NativeEvent::short(delta, ShortMessage::new(ChannelEventKind::NoteOn, 0, key, 100))
    }

    /// Device ticking at one microsecond per tick.
    fn fast_device() -> (SequencerDevice<RecordingSink>, RecordingSink, WakeReceiver) {
        let (tx, rx) = wake_channel();
        let sink = RecordingSink::default();
        let device = SequencerDevice::open(sink.clone(), tx.notifier()).unwrap();
        device.set_time_division(1000).unwrap();
        device.set_tempo(1000).unwrap();
        (device, sink, rx)
    }

    fn expect_wake(rx: &WakeReceiver) {
        assert_eq!(
            rx.wait_timeout(Duration::from_secs(5)),
            Some(WakeReason::BufferConsumed)
        );
    }

    #[test]
    fn plays_buffers_in_order_and_reports_each() {
        let (device, sink, rx) = fast_device();
        device.submit(&[note(0, 60), note(100, 61)]).unwrap();
        device.submit(&[note(100, 62), note(100, 63)]).unwrap();
        device.start().unwrap();

        expect_wake(&rx);
        expect_wake(&rx);

        let keys: Vec<u8> = sink.messages().iter().map(|m| m[1]).collect();
        assert_eq!(keys, vec![60, 61, 62, 63]);
    }

    #[test]
    fn nothing_plays_before_start() {
        let (device, sink, rx) = fast_device();
        device.submit(&[note(0, 60)]).unwrap();

        assert_eq!(rx.wait_timeout(Duration::from_millis(30)), None);
        assert!(sink.messages().is_empty());

        device.start().unwrap();
        expect_wake(&rx);
        assert_eq!(sink.messages().len(), 1);
    }

    #[test]
    fn tempo_events_are_not_sent_to_the_port() {
        let (device, sink, rx) = fast_device();
        device.submit(&[NativeEvent::tempo(0, 2000), note(10, 60)]).unwrap();
        device.start().unwrap();
        expect_wake(&rx);
        assert_eq!(sink.messages(), vec![vec![0x90, 60, 100]]);
    }

    #[test]
    fn empty_buffer_is_returned_immediately() {
        let (device, _sink, rx) = fast_device();
        device.start().unwrap();
        device.submit(&[]).unwrap();
        expect_wake(&rx);
    }

    #[test]
    fn stop_returns_queued_buffers_and_silences() {
        let (device, sink, rx) = fast_device();
        // Ten seconds away at one microsecond per tick.
        device.submit(&[note(10_000_000, 60)]).unwrap();
        device.start().unwrap();
        device.stop().unwrap();

        expect_wake(&rx);
        let messages = sink.messages();
        assert_eq!(messages.len(), MIDI_CHANNELS);
        assert!(messages.iter().all(|m| m[0] & 0xF0 == 0xB0 && m[1] == CONTROLLER_ALL_NOTES_OFF));
    }

    #[test]
    fn reset_also_resets_controllers() {
        let (device, sink, _rx) = fast_device();
        device.reset().unwrap();
        let messages = sink.messages();
        assert_eq!(messages.len(), MIDI_CHANNELS * 2);
        assert!(messages[MIDI_CHANNELS..].iter().all(|m| m[1] == CONTROLLER_RESET_ALL));
    }

    #[test]
    fn pause_holds_playback_until_resume() {
        let (device, sink, rx) = fast_device();
        // 50ms after start.
        device.submit(&[note(50_000, 60)]).unwrap();
        device.start().unwrap();
        device.pause().unwrap();

        assert_eq!(rx.wait_timeout(Duration::from_millis(120)), None);
        assert!(sink.messages().is_empty());

        device.resume().unwrap();
        expect_wake(&rx);
        assert_eq!(sink.messages().len(), 1);
    }

    #[test]
    fn immediate_messages_bypass_the_queue() {
        let (device, sink, _rx) = fast_device();
        device.submit(&[note(0, 60)]).unwrap();
        device
            .send_immediate(ShortMessage::new(ChannelEventKind::ProgramChange, 1, 5, 0))
            .unwrap();
        assert_eq!(sink.messages(), vec![vec![0xC1, 5]]);
    }

    #[test]
    fn rejects_bad_properties() {
        let (device, _sink, _rx) = fast_device();
        assert!(matches!(device.set_time_division(0), Err(DeviceError::Property(_))));
        assert!(matches!(device.set_time_division(0x8000 | 0x1200), Err(DeviceError::Property(_))));
        assert!(device.set_time_division(0xE728).is_ok());
        assert!(matches!(device.set_tempo(0), Err(DeviceError::Property(_))));
        assert!(matches!(device.set_tempo(MAX_TEMPO + 1), Err(DeviceError::Property(_))));
    }

    #[test]
    fn closed_device_rejects_commands() {
        let (device, _sink, _rx) = fast_device();
        device.close().unwrap();
        assert_eq!(device.submit(&[note(0, 60)]), Err(DeviceError::Closed));
        assert_eq!(
            device.send_immediate(ShortMessage::controller(0, 7, 1)),
            Err(DeviceError::Closed)
        );
        // Closing twice is fine.
        assert!(device.close().is_ok());
    }

    #[test]
    fn tick_length_follows_tempo_and_division() {
        let (tx, _rx) = wake_channel();
        let mut seq = Sequencer::new(Arc::new(Mutex::new(RecordingSink::default())), tx.notifier());

        seq.time_division = 96;
        seq.tempo = 500_000;
        assert_eq!(seq.ticks_to_duration(96), Duration::from_millis(500));

        // 25 fps, 40 ticks per frame = 1ms per tick.
        seq.time_division = 0xE728;
        assert_eq!(seq.ticks_to_duration(250), Duration::from_millis(250));
    }
}
