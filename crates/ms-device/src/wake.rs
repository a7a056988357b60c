//! Wake-up channel between an output device and the playback worker.
//!
//! The device side only ever gets a [`CompletionNotifier`], which can do
//! exactly one thing: post [`WakeReason::BufferConsumed`]. All refill and
//! resubmission work happens on the worker after [`WakeReceiver::wait`]
//! returns, so the device is never re-entered from its own context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

/// Why the worker woke up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WakeReason {
    /// The device finished the buffer in flight
    BufferConsumed,
    /// Playback is being torn down
    Stop,
}

/// Create a connected sender/receiver pair.
pub fn wake_channel() -> (WakeSender, WakeReceiver) {
    let (tx, rx) = crossbeam_channel::unbounded();
    let stop_requested = Arc::new(AtomicBool::new(false));
    (
        WakeSender {
            tx,
            stop_requested: stop_requested.clone(),
        },
        WakeReceiver { rx, stop_requested },
    )
}

/// Controller-side handle: can request a stop and mint notifiers.
#[derive(Clone, Debug)]
pub struct WakeSender {
    tx: Sender<WakeReason>,
    stop_requested: Arc<AtomicBool>,
}

impl WakeSender {
    /// A handle for the device that can only report finished buffers.
    pub fn notifier(&self) -> CompletionNotifier {
        CompletionNotifier { tx: self.tx.clone() }
    }

    /// Ask the worker to exit. Takes priority over pending completions.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        let _ = self.tx.send(WakeReason::Stop);
    }
}

/// Device-side handle.
#[derive(Clone, Debug)]
pub struct CompletionNotifier {
    tx: Sender<WakeReason>,
}

impl CompletionNotifier {
    /// Report that a submitted buffer has been fully consumed.
    pub fn buffer_consumed(&self) {
        // The worker may already be gone; a dropped wake is harmless.
        let _ = self.tx.send(WakeReason::BufferConsumed);
    }
}

/// Worker-side handle.
#[derive(Clone, Debug)]
pub struct WakeReceiver {
    rx: Receiver<WakeReason>,
    stop_requested: Arc<AtomicBool>,
}

impl WakeReceiver {
    /// Block until woken.
    ///
    /// Once a stop has been requested this returns [`WakeReason::Stop`] no
    /// matter what else is queued.
    pub fn wait(&self) -> WakeReason {
        let reason = self.rx.recv().unwrap_or(WakeReason::Stop);
        self.resolve(reason)
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<WakeReason> {
        match self.rx.recv_timeout(timeout) {
            Ok(reason) => Some(self.resolve(reason)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(WakeReason::Stop),
        }
    }

    /// Discard stale wakes and clear the stop request. Returns how many were dropped.
    pub fn reset(&self) -> usize {
        let dropped = self.rx.try_iter().count();
        self.stop_requested.store(false, Ordering::Release);
        dropped
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    fn resolve(&self, reason: WakeReason) -> WakeReason {
        if self.stop_requested() {
            WakeReason::Stop
        } else {
            reason
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn notifier_wakes_with_buffer_consumed() {
        let (tx, rx) = wake_channel();
        tx.notifier().buffer_consumed();
        assert_eq!(rx.wait(), WakeReason::BufferConsumed);
    }

    #[test]
    fn stop_wins_over_queued_completions() {
        let (tx, rx) = wake_channel();
        let notifier = tx.notifier();
        notifier.buffer_consumed();
        notifier.buffer_consumed();
        tx.request_stop();
        assert_eq!(rx.wait(), WakeReason::Stop);
    }

    #[test]
    fn reset_drains_and_clears_stop() {
        let (tx, rx) = wake_channel();
        tx.notifier().buffer_consumed();
        tx.request_stop();
        assert_eq!(rx.reset(), 2);
        assert!(!rx.stop_requested());
        assert_eq!(rx.wait_timeout(Duration::from_millis(5)), None);
    }

    #[test]
    fn wakes_across_threads() {
        let (tx, rx) = wake_channel();
        let notifier = tx.notifier();
        let handle = thread::spawn(move || notifier.buffer_consumed());
        assert_eq!(
            rx.wait_timeout(Duration::from_secs(5)),
            Some(WakeReason::BufferConsumed)
        );
        handle.join().unwrap();
    }
}
