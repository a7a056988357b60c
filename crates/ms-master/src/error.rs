//! Controller errors.

use ms_device::DeviceError;
use ms_formats::FormatError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlayerError {
    /// The score bytes are not a usable MIDI file
    #[error("failed to parse score: {0}")]
    ParseFailure(#[from] FormatError),
    /// The device rejected an operation; `step` names which one
    #[error("device unavailable while trying to {step}: {source}")]
    DeviceUnavailable {
        step: &'static str,
        #[source]
        source: DeviceError,
    },
    /// Operation not allowed in the current state
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// The playback worker could not be started
    #[error("failed to spawn playback worker: {0}")]
    Spawn(String),
    /// The playback worker panicked; its score was dropped
    #[error("playback worker panicked")]
    WorkerPanicked,
}

impl PlayerError {
    pub(crate) fn device(step: &'static str) -> impl FnOnce(DeviceError) -> Self {
        move |source| PlayerError::DeviceUnavailable { step, source }
    }
}
