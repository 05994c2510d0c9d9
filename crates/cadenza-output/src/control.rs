use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use cadenza_audio_core::{AudioFormat, MusicChunk, MusicPipe};

use crate::backend::BackendPort;
use crate::config::OutputConfig;
use crate::filter::{ChunkFilter, FilterChain, PcmFilter};
use crate::state::{Command, OutputShared, OutputState, StateLock};
use crate::worker::OutputWorker;

/// Receives the worker's "a chunk sequence finished" notification.
/// Called with the worker's mutex released.
pub trait PlayerSignal: Send + Sync {
    fn signal(&self);
}

/// The client half of one output: posts commands into the mailbox and
/// observes worker state. Owns the worker thread; dropping the handle
/// kills and joins it.
pub struct AudioOutputControl {
    shared: Arc<OutputShared>,
    config: OutputConfig,
    plugin: &'static str,
    /// The command rendezvous assumes one client at a time; this
    /// serializes command issuers without touching observers.
    commander: Mutex<()>,
    thread: Option<JoinHandle<()>>,
}

impl AudioOutputControl {
    /// Builds the output state and spawns the worker thread.
    pub fn start(
        config: OutputConfig,
        backend: Box<dyn BackendPort>,
        filters: Vec<Box<dyn PcmFilter>>,
        player: Arc<dyn PlayerSignal>,
    ) -> io::Result<Self> {
        let shared = Arc::new(OutputShared::new());
        let plugin = backend.plugin_name();

        let worker = OutputWorker {
            shared: Arc::clone(&shared),
            backend,
            filters: ChunkFilter::new(FilterChain::new(filters), config.replay_gain),
            config_format: config.format,
            send_tags: config.tags,
            name: config.name.clone(),
            plugin,
            player,
        };

        let thread = thread::Builder::new()
            .name(format!("cadenza-output:{}", config.name))
            .spawn(move || worker.run())?;

        Ok(Self {
            shared,
            config,
            plugin,
            commander: Mutex::new(()),
            thread: Some(thread),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn plugin_name(&self) -> &'static str {
        self.plugin
    }

    fn lock(&self) -> MutexGuard<'_, OutputState> {
        self.shared
            .state
            .lock()
            .expect("output state mutex poisoned")
    }

    /// Waits for the mailbox slot to clear, releasing the state lock
    /// around each client-notify wait.
    fn wait_idle(state: &mut StateLock<'_>, shared: &OutputShared) {
        while state.command != Command::None {
            let client = &shared.client;
            state.unlocked(|| client.wait());
        }
    }

    /// The rendezvous: writes the command into the empty slot, wakes
    /// the worker, and blocks until the worker acknowledges.
    fn post(state: &mut StateLock<'_>, shared: &OutputShared, command: Command) {
        debug_assert!(state.command == Command::None);
        state.command = command;
        shared.wake.notify_one();
        Self::wait_idle(state, shared);
    }

    fn command(&self, command: Command) {
        let _commander = self.commander.lock().expect("commander mutex poisoned");
        let mut state = StateLock::lock(&self.shared);
        Self::wait_idle(&mut state, &self.shared);
        Self::post(&mut state, &self.shared, command);
    }

    pub fn enable(&self) {
        self.command(Command::Enable);
    }

    pub fn disable(&self) {
        self.command(Command::Disable);
    }

    /// Installs the pipe and input format and opens the output,
    /// reopening if it is already open with a different format.
    /// Reports whether the output is open afterwards.
    pub fn open(&self, format: AudioFormat, pipe: &Arc<MusicPipe>) -> bool {
        assert!(format.valid());

        let _commander = self.commander.lock().expect("commander mutex poisoned");
        let mut state = StateLock::lock(&self.shared);
        Self::wait_idle(&mut state, &self.shared);

        state.fail_timer.reset();

        if state.open && state.in_audio_format == Some(format) {
            if state.pause {
                // Unpausing goes through CANCEL: it forces the worker
                // out of the pause loop without reopening the device.
                state.current_chunk = None;
                state.pipe = Some(Arc::clone(pipe));
                Self::post(&mut state, &self.shared, Command::Cancel);
            } else if !state.pipe.as_ref().is_some_and(|p| Arc::ptr_eq(p, pipe)) {
                state.pipe = Some(Arc::clone(pipe));
            }
            return true;
        }

        let reopen = state.open;
        state.in_audio_format = Some(format);
        state.current_chunk = None;
        state.pipe = Some(Arc::clone(pipe));
        state.allow_play = true;

        Self::post(
            &mut state,
            &self.shared,
            if reopen { Command::Reopen } else { Command::Open },
        );
        state.open
    }

    /// Scheduler entry point: like [`open`](Self::open), but skipped
    /// while the output is disabled or cooling down after a failure
    /// (unless `force`).
    pub fn update(&self, format: AudioFormat, pipe: &Arc<MusicPipe>, force: bool) -> bool {
        {
            let state = self.lock();
            if !state.really_enabled {
                return false;
            }
            if !force {
                if let Some(elapsed) = state.fail_timer.elapsed() {
                    if elapsed < self.config.reopen_cooldown {
                        return false;
                    }
                }
            }
        }
        self.open(format, pipe)
    }

    pub fn close(&self) {
        let _commander = self.commander.lock().expect("commander mutex poisoned");
        let mut state = StateLock::lock(&self.shared);
        Self::wait_idle(&mut state, &self.shared);
        if state.open {
            Self::post(&mut state, &self.shared, Command::Close);
        }
    }

    pub fn pause(&self) {
        self.command(Command::Pause);
    }

    /// Precondition: the current chunk stream has been fully consumed.
    pub fn drain(&self) {
        self.command(Command::Drain);
    }

    /// Discards the in-flight chunk stream. Play attempts stay
    /// suppressed until [`allow_play`](Self::allow_play) re-enables
    /// them.
    pub fn cancel(&self) {
        let _commander = self.commander.lock().expect("commander mutex poisoned");
        let mut state = StateLock::lock(&self.shared);
        Self::wait_idle(&mut state, &self.shared);
        state.allow_play = false;
        Self::post(&mut state, &self.shared, Command::Cancel);
    }

    /// Releases the worker's reference to the last played chunk once
    /// the player has removed it from the pipe. Clearing the tail is a
    /// precondition for [`drain`](Self::drain).
    pub fn clear_tail_chunk(&self, chunk: &Arc<MusicChunk>) {
        let mut state = self.lock();
        if state
            .current_chunk
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, chunk))
        {
            debug_assert!(state.current_chunk_finished);
            state.current_chunk = None;
        }
    }

    /// Wakes the worker for a play attempt without posting a command.
    pub fn play(&self) {
        let mut state = self.lock();
        state.allow_play = true;
        if !state.woken_for_play {
            state.woken_for_play = true;
            self.shared.wake.notify_one();
        }
    }

    pub fn allow_play(&self, allow: bool) {
        let mut state = self.lock();
        state.allow_play = allow;
        if allow {
            self.shared.wake.notify_one();
        }
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().really_enabled
    }

    pub fn is_paused(&self) -> bool {
        self.lock().pause
    }

    /// A command is posted and not yet acknowledged.
    pub fn is_busy(&self) -> bool {
        self.lock().command != Command::None
    }

    /// The format negotiated with the device, while open.
    pub fn audio_format(&self) -> Option<AudioFormat> {
        self.lock().out_audio_format
    }

    /// True whenever the worker is not inside a play loop.
    pub fn is_chunk_consumed(&self) -> bool {
        self.lock().current_chunk_finished
    }

    pub fn has_failed(&self) -> bool {
        self.lock().fail_timer.is_defined()
    }

    /// A failure is recorded and the reopen cooldown has not elapsed.
    pub fn is_in_cooldown(&self) -> bool {
        self.lock()
            .fail_timer
            .elapsed()
            .is_some_and(|elapsed| elapsed < self.config.reopen_cooldown)
    }

    /// Stops the worker and joins its thread.
    pub fn kill(mut self) {
        self.kill_and_join();
    }

    fn kill_and_join(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.command(Command::Kill);
        let _ = thread.join();
    }
}

impl Drop for AudioOutputControl {
    fn drop(&mut self) {
        self.kill_and_join();
    }
}
