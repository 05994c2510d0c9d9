use std::time::Duration;

use cadenza_audio_core::{AudioFormat, Tag};

use crate::error::BackendError;

/// Contract between the worker and a device backend.
///
/// Every method except [`delay`](Self::delay) is called with the
/// worker's state mutex released, so implementations may block.
/// `delay` is a cheap query the worker issues under the mutex; it must
/// not perform I/O.
///
/// Default methods mirror the optional parts of the contract: a backend
/// without its own enable/disable, pause, drain or cancel behavior
/// simply inherits them.
pub trait BackendPort: Send {
    fn plugin_name(&self) -> &'static str;

    /// Acquires whatever the backend needs before any session can be
    /// opened (e.g. a connection to the sound server). Called once;
    /// `open` may follow any time later.
    fn enable(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn disable(&mut self) {}

    /// Opens a playback session in the given format.
    fn open(&mut self, format: AudioFormat) -> Result<(), BackendError>;

    fn close(&mut self);

    /// Time until the device can accept more audio; zero means now.
    fn delay(&mut self) -> Duration {
        Duration::ZERO
    }

    /// Submits PCM; returns how many bytes the device accepted, always
    /// more than zero and a multiple of the open format's frame size.
    /// An error ends the session: the worker closes the backend and
    /// backs off before reopening.
    fn play(&mut self, data: &[u8]) -> Result<usize, BackendError>;

    /// Enters hardware pause. The worker calls this repeatedly while
    /// paused; each call should block roughly one period. Backends
    /// without pause support keep the default, which makes the worker
    /// fall back to closing the device.
    fn pause(&mut self) -> Result<(), BackendError> {
        Err(BackendError::Unsupported {
            plugin: self.plugin_name(),
        })
    }

    /// Blocks until all submitted audio has been played.
    fn drain(&mut self) {}

    /// Discards audio the device has buffered but not yet played.
    fn cancel(&mut self) {}

    /// Forwards song metadata to devices that can display it.
    fn send_tag(&mut self, _tag: &Tag) {}
}
