use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cadenza_audio_core::{AudioFormat, SampleFormat};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, warn};

use crate::backend::BackendPort;
use crate::error::BackendError;

/// Real device output through cpal.
///
/// The worker pushes PCM into a ring buffer; the device callback
/// drains it. cpal streams are not `Send`, so the stream lives on a
/// keeper thread for the duration of the session and is controlled
/// over a channel. The stream error callback latches a failure flag
/// that turns the next `play` into a session-ending error.
pub struct CpalBackend {
    session: Option<Session>,
}

struct Session {
    ring: Arc<ByteRing>,
    failed: Arc<AtomicBool>,
    bytes_per_second: u64,
    paused: bool,
    commands: Sender<KeeperCommand>,
    keeper: Option<JoinHandle<()>>,
}

enum KeeperCommand {
    Pause,
    Resume,
    Stop,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self { session: None }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendPort for CpalBackend {
    fn plugin_name(&self) -> &'static str {
        "cpal"
    }

    fn open(&mut self, format: AudioFormat) -> Result<(), BackendError> {
        // Half a second of buffer between the worker and the callback.
        let bytes_per_second = u64::from(format.sample_rate) * format.frame_size() as u64;
        let ring = Arc::new(ByteRing::new(bytes_per_second as usize / 2));
        let failed = Arc::new(AtomicBool::new(false));

        let (commands, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        let keeper_ring = Arc::clone(&ring);
        let keeper_failed = Arc::clone(&failed);
        let keeper = thread::Builder::new()
            .name("cadenza-cpal-stream".to_string())
            .spawn(move || keeper_main(format, keeper_ring, keeper_failed, ready_tx, command_rx))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                let _ = keeper.join();
                return Err(error);
            }
            Err(_) => {
                let _ = keeper.join();
                return Err(BackendError::Device(
                    "cpal stream thread died during open".to_string(),
                ));
            }
        }

        self.session = Some(Session {
            ring,
            failed,
            bytes_per_second,
            paused: false,
            commands,
            keeper: Some(keeper),
        });
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            let _ = session.commands.send(KeeperCommand::Stop);
            if let Some(keeper) = session.keeper.take() {
                let _ = keeper.join();
            }
        }
    }

    fn delay(&mut self) -> Duration {
        let Some(session) = &self.session else {
            return Duration::ZERO;
        };
        if session.ring.free() > 0 {
            return Duration::ZERO;
        }
        // Ring is full: a quarter of it will have drained by then.
        Duration::from_micros(
            session.ring.capacity() as u64 / 4 * 1_000_000 / session.bytes_per_second,
        )
    }

    fn play(&mut self, data: &[u8]) -> Result<usize, BackendError> {
        let Some(session) = &mut self.session else {
            return Err(BackendError::Device("cpal backend is not open".to_string()));
        };

        if session.paused {
            session.paused = false;
            let _ = session.commands.send(KeeperCommand::Resume);
        }

        loop {
            if session.failed.load(Ordering::SeqCst) {
                return Err(BackendError::Device("cpal stream failed".to_string()));
            }
            let pushed = session.ring.push(data);
            if pushed > 0 {
                return Ok(pushed);
            }
            // Full ring with the callback healthy: behave like a
            // blocking device write.
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn pause(&mut self) -> Result<(), BackendError> {
        let Some(session) = &mut self.session else {
            return Err(BackendError::Device("cpal backend is not open".to_string()));
        };
        if session.failed.load(Ordering::SeqCst) {
            return Err(BackendError::Device("cpal stream failed".to_string()));
        }
        if !session.paused {
            session.paused = true;
            let _ = session.commands.send(KeeperCommand::Pause);
        }
        // Each pause call stands in for one period of silence.
        thread::sleep(Duration::from_millis(50));
        Ok(())
    }

    fn drain(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        while !session.ring.is_empty() && !session.failed.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn cancel(&mut self) {
        if let Some(session) = &self.session {
            session.ring.clear();
        }
    }
}

/// Runs on the keeper thread: builds the stream, reports readiness,
/// then executes pause/resume until told to stop. The stream is
/// dropped when this function returns.
fn keeper_main(
    format: AudioFormat,
    ring: Arc<ByteRing>,
    failed: Arc<AtomicBool>,
    ready_tx: Sender<Result<(), BackendError>>,
    commands: Receiver<KeeperCommand>,
) {
    let stream = match build_stream(format, ring, Arc::clone(&failed)) {
        Ok(stream) => stream,
        Err(error) => {
            let _ = ready_tx.send(Err(error));
            return;
        }
    };

    if let Err(error) = stream.play() {
        let _ = ready_tx.send(Err(BackendError::Device(format!(
            "failed to start stream: {error}"
        ))));
        return;
    }
    let _ = ready_tx.send(Ok(()));

    while let Ok(command) = commands.recv() {
        match command {
            KeeperCommand::Pause => {
                if let Err(error) = stream.pause() {
                    warn!(%error, "cpal pause failed");
                    failed.store(true, Ordering::SeqCst);
                }
            }
            KeeperCommand::Resume => {
                if let Err(error) = stream.play() {
                    warn!(%error, "cpal resume failed");
                    failed.store(true, Ordering::SeqCst);
                }
            }
            KeeperCommand::Stop => break,
        }
    }
}

fn build_stream(
    format: AudioFormat,
    ring: Arc<ByteRing>,
    failed: Arc<AtomicBool>,
) -> Result<cpal::Stream, BackendError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| BackendError::Unavailable("no default output device".to_string()))?;
    let supported = device
        .default_output_config()
        .map_err(|error| BackendError::Unavailable(error.to_string()))?;

    if supported.sample_rate().0 != format.sample_rate
        || supported.channels() != u16::from(format.channels)
    {
        return Err(BackendError::UnsupportedFormat { format });
    }

    let sample_format = supported.sample_format();
    let config = supported.config();
    let on_error = move |error: cpal::StreamError| {
        error!(%error, "cpal stream error");
        failed.store(true, Ordering::SeqCst);
    };

    let stream = match (format.format, sample_format) {
        (SampleFormat::F32, cpal::SampleFormat::F32) => device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    fill_from_ring(data, &ring, f32::from_ne_bytes);
                },
                on_error,
                None,
            )
            .map_err(|error| BackendError::Device(error.to_string()))?,
        (SampleFormat::S16, cpal::SampleFormat::I16) => device
            .build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    fill_from_ring(data, &ring, i16::from_ne_bytes);
                },
                on_error,
                None,
            )
            .map_err(|error| BackendError::Device(error.to_string()))?,
        _ => return Err(BackendError::UnsupportedFormat { format }),
    };

    Ok(stream)
}

/// Pops one sample's worth of bytes per output slot; underruns become
/// silence. Must stay allocation-free: it runs on the audio thread.
fn fill_from_ring<T: Default, const N: usize>(
    out: &mut [T],
    ring: &ByteRing,
    decode: impl Fn([u8; N]) -> T,
) {
    let mut inner = ring.guard();
    for slot in out.iter_mut() {
        if inner.len() < N {
            *slot = T::default();
            continue;
        }
        let mut bytes = [0u8; N];
        for byte in &mut bytes {
            *byte = inner.pop_front().expect("length checked");
        }
        *slot = decode(bytes);
    }
}

/// Bounded byte queue between the worker and the device callback.
/// A lock-free ring would be the real-time-correct choice; this is the
/// correctness-first placeholder and the contention window is a few
/// microseconds per callback.
struct ByteRing {
    capacity: usize,
    inner: Mutex<VecDeque<u8>>,
}

impl ByteRing {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    fn guard(&self) -> MutexGuard<'_, VecDeque<u8>> {
        self.inner.lock().expect("byte ring mutex poisoned")
    }

    fn push(&self, data: &[u8]) -> usize {
        let mut inner = self.guard();
        let free = self.capacity.saturating_sub(inner.len());
        let writable = free.min(data.len());
        inner.extend(&data[..writable]);
        writable
    }

    fn free(&self) -> usize {
        self.capacity.saturating_sub(self.guard().len())
    }

    fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    fn clear(&self) {
        self.guard().clear();
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
