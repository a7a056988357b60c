//! Playback worker thread.
//!
//! Owns the score and the stream buffer while playing. Each time the device
//! reports a consumed buffer the worker refills from the score's cursor and
//! submits the next one, so exactly one buffer is ever in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ms_device::{OutputDevice, WakeReason, WakeReceiver};
use ms_engine::{Score, StreamBuffer, VolumeShaper};
use parking_lot::Mutex;

/// Score plus the buffer it streams through.
pub(crate) struct Session {
    pub score: Score,
    pub buffer: StreamBuffer,
}

impl Session {
    pub fn new(score: Score) -> Self {
        Self {
            score,
            buffer: StreamBuffer::new(),
        }
    }

    /// Refill the buffer from the score.
    pub fn refill(&mut self, volume: &Mutex<VolumeShaper>) -> usize {
        let mut volume = volume.lock();
        #[cfg(feature = "alloc_check")]
        {
            assert_no_alloc::assert_no_alloc(|| self.buffer.fill(&mut self.score, &mut volume))
        }
        #[cfg(not(feature = "alloc_check"))]
        {
            self.buffer.fill(&mut self.score, &mut volume)
        }
    }
}

/// Flags the worker reports back through.
#[derive(Debug, Default)]
pub(crate) struct PlaybackStatus {
    /// A non-looping score has been played out
    pub finished: AtomicBool,
    /// Gave up after too many submission failures
    pub aborted: AtomicBool,
}

impl PlaybackStatus {
    pub fn clear(&self) {
        self.finished.store(false, Ordering::Relaxed);
        self.aborted.store(false, Ordering::Relaxed);
    }
}

enum Delivery {
    Submitted,
    Stopped,
    Abandoned,
}

pub(crate) struct Worker<D: OutputDevice> {
    pub device: Arc<D>,
    pub wake: WakeReceiver,
    pub volume: Arc<Mutex<VolumeShaper>>,
    pub status: Arc<PlaybackStatus>,
    pub session: Session,
    pub max_submit_failures: Option<u32>,
    pub retry_delay: Duration,
}

impl<D: OutputDevice> Worker<D> {
    /// Run until stopped, drained or aborted. Hands the session back.
    pub fn run(mut self) -> Session {
        // The controller primes the first buffer; if it was empty nothing
        // will ever complete.
        if self.session.buffer.is_empty() {
            log::debug!("nothing to play");
            self.status.finished.store(true, Ordering::Release);
            return self.session;
        }

        loop {
            match self.wake.wait() {
                WakeReason::Stop => break,
                WakeReason::BufferConsumed => {}
            }

            if self.session.refill(&self.volume) == 0 {
                log::debug!("score drained at event {}", self.session.score.cursor());
                self.status.finished.store(true, Ordering::Release);
                break;
            }

            match self.deliver() {
                Delivery::Submitted => {}
                Delivery::Stopped => break,
                Delivery::Abandoned => {
                    self.status.aborted.store(true, Ordering::Release);
                    break;
                }
            }
        }

        log::trace!("playback worker exiting");
        self.session
    }

    /// Submit the current buffer, retrying until it sticks, a stop arrives,
    /// or the consecutive failure cap is hit.
    fn deliver(&mut self) -> Delivery {
        let mut failures = 0u32;
        loop {
            let Err(e) = self.device.submit(self.session.buffer.events()) else {
                return Delivery::Submitted;
            };
            failures += 1;
            log::warn!("buffer submission failed ({} in a row): {}", failures, e);

            if self.max_submit_failures.is_some_and(|max| failures >= max) {
                log::error!("giving up after {} failed submissions", failures);
                return Delivery::Abandoned;
            }
            if self.wake.wait_timeout(self.retry_delay) == Some(WakeReason::Stop) {
                return Delivery::Stopped;
            }
        }
    }
}
