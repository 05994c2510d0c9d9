use std::time::{Duration, Instant};

use cadenza_audio_core::AudioFormat;

use crate::backend::BackendPort;
use crate::error::BackendError;

/// Plays audio into the void.
///
/// In `sync` mode a frame clock paces consumption at the nominal
/// sample rate, so `delay` behaves like a real device that accepts
/// audio no faster than it plays it. Without `sync` the backend
/// swallows everything instantly, which is what throughput tests want.
pub struct NullBackend {
    sync: bool,
    clock: Option<FrameClock>,
}

impl NullBackend {
    pub fn new(sync: bool) -> Self {
        Self { sync, clock: None }
    }
}

impl BackendPort for NullBackend {
    fn plugin_name(&self) -> &'static str {
        "null"
    }

    fn open(&mut self, format: AudioFormat) -> Result<(), BackendError> {
        if self.sync {
            self.clock = Some(FrameClock::new(format));
        }
        Ok(())
    }

    fn close(&mut self) {
        self.clock = None;
    }

    fn delay(&mut self) -> Duration {
        self.clock
            .as_ref()
            .map_or(Duration::ZERO, FrameClock::remaining)
    }

    fn play(&mut self, data: &[u8]) -> Result<usize, BackendError> {
        if let Some(clock) = &mut self.clock {
            clock.push(data.len());
        }
        Ok(data.len())
    }

    fn pause(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn drain(&mut self) {
        if let Some(clock) = &mut self.clock {
            clock.reset();
        }
    }

    fn cancel(&mut self) {
        if let Some(clock) = &mut self.clock {
            clock.reset();
        }
    }
}

/// Tracks how far ahead of real time the queued audio runs.
struct FrameClock {
    bytes_per_second: u64,
    started: Option<Instant>,
    queued: Duration,
}

impl FrameClock {
    fn new(format: AudioFormat) -> Self {
        Self {
            bytes_per_second: u64::from(format.sample_rate) * format.frame_size() as u64,
            started: None,
            queued: Duration::ZERO,
        }
    }

    fn push(&mut self, bytes: usize) {
        self.started.get_or_insert_with(Instant::now);
        self.queued += Duration::from_micros(bytes as u64 * 1_000_000 / self.bytes_per_second);
    }

    /// Time until everything queued so far has nominally played.
    fn remaining(&self) -> Duration {
        let Some(started) = self.started else {
            return Duration::ZERO;
        };
        self.queued.saturating_sub(started.elapsed())
    }

    fn reset(&mut self) {
        self.started = None;
        self.queued = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cadenza_audio_core::{AudioFormat, SampleFormat};

    use super::NullBackend;
    use crate::backend::BackendPort;

    fn format() -> AudioFormat {
        AudioFormat::new(44_100, SampleFormat::S16, 2)
    }

    #[test]
    fn without_sync_everything_is_instant() {
        let mut backend = NullBackend::new(false);
        backend.open(format()).expect("open");
        assert_eq!(backend.play(&[0u8; 1024]).expect("play"), 1024);
        assert_eq!(backend.delay(), Duration::ZERO);
    }

    #[test]
    fn sync_mode_paces_consumption() {
        let mut backend = NullBackend::new(true);
        backend.open(format()).expect("open");

        // One second of audio cannot drain immediately.
        let one_second = vec![0u8; 44_100 * 4];
        backend.play(&one_second).expect("play");
        assert!(backend.delay() > Duration::from_millis(500));

        // Cancel discards the queue.
        backend.cancel();
        assert_eq!(backend.delay(), Duration::ZERO);
    }
}
