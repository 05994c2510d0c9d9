use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use cadenza_audio_core::{AudioFormat, MusicChunk, MusicPipe};

use crate::fail_timer::FailTimer;
use crate::notify::Notify;

/// The single-slot command mailbox value. `None` is the empty slot; the
/// controller writes a command only when the slot reads `None` and the
/// worker acknowledges by writing `None` back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    None,
    Enable,
    Disable,
    Open,
    Reopen,
    Close,
    Pause,
    Drain,
    Cancel,
    Kill,
}

/// Everything both threads read or write, guarded by one mutex.
pub(crate) struct OutputState {
    pub command: Command,
    /// The device has been enabled and not disabled since.
    pub really_enabled: bool,
    /// The device is open for I/O.
    pub open: bool,
    /// The worker is inside the pause loop.
    pub pause: bool,
    /// The worker may attempt a play step when idle.
    pub allow_play: bool,
    /// A play wakeup has been delivered and not yet consumed.
    pub woken_for_play: bool,
    /// The worker is inside `play()`.
    pub in_playback_loop: bool,
    /// The chunk most recently handed to the backend; play resumes at
    /// its successor.
    pub current_chunk: Option<Arc<MusicChunk>>,
    /// True at rest; false only while `play()` works through chunks.
    pub current_chunk_finished: bool,
    pub pipe: Option<Arc<MusicPipe>>,
    pub in_audio_format: Option<AudioFormat>,
    /// The format negotiated with the device at open.
    pub out_audio_format: Option<AudioFormat>,
    pub fail_timer: FailTimer,
}

impl OutputState {
    fn new() -> Self {
        Self {
            command: Command::None,
            really_enabled: false,
            open: false,
            pause: false,
            allow_play: true,
            woken_for_play: false,
            in_playback_loop: false,
            current_chunk: None,
            current_chunk_finished: true,
            pipe: None,
            in_audio_format: None,
            out_audio_format: None,
            fail_timer: FailTimer::new(),
        }
    }
}

pub(crate) struct OutputShared {
    pub state: Mutex<OutputState>,
    /// Wakes the worker: a command was posted or play was allowed.
    pub wake: Condvar,
    /// Wakes the controller: a command was acknowledged.
    pub client: Notify,
}

impl OutputShared {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(OutputState::new()),
            wake: Condvar::new(),
            client: Notify::new(),
        }
    }
}

/// Holder of the state mutex expressing the locking discipline: the
/// holder owns the lock at all times except inside
/// [`unlocked`](Self::unlocked), which scopes every blocking backend,
/// filter or signal call. Dropping the guard before the call and
/// re-acquiring after means an unwind inside the call can never leak
/// the lock.
pub(crate) struct StateLock<'a> {
    shared: &'a OutputShared,
    guard: Option<MutexGuard<'a, OutputState>>,
}

impl<'a> StateLock<'a> {
    pub(crate) fn lock(shared: &'a OutputShared) -> Self {
        Self {
            shared,
            guard: Some(shared.state.lock().expect("output state mutex poisoned")),
        }
    }

    /// Releases the mutex, runs `f`, re-acquires.
    pub(crate) fn unlocked<R>(&mut self, f: impl FnOnce() -> R) -> R {
        self.guard = None;
        let value = f();
        self.guard = Some(
            self.shared
                .state
                .lock()
                .expect("output state mutex poisoned"),
        );
        value
    }

    /// Blocks on the wake condvar until signaled.
    pub(crate) fn wait(&mut self) {
        let guard = self.guard.take().expect("state lock released");
        self.guard = Some(
            self.shared
                .wake
                .wait(guard)
                .expect("output state mutex poisoned"),
        );
    }

    /// Blocks on the wake condvar for at most `timeout`.
    pub(crate) fn wait_timeout(&mut self, timeout: Duration) {
        let guard = self.guard.take().expect("state lock released");
        let (guard, _) = self
            .shared
            .wake
            .wait_timeout(guard, timeout)
            .expect("output state mutex poisoned");
        self.guard = Some(guard);
    }
}

impl Deref for StateLock<'_> {
    type Target = OutputState;

    fn deref(&self) -> &OutputState {
        self.guard.as_ref().expect("state lock released")
    }
}

impl DerefMut for StateLock<'_> {
    fn deref_mut(&mut self) -> &mut OutputState {
        self.guard.as_mut().expect("state lock released")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::{Command, OutputShared, StateLock};

    #[test]
    fn unlocked_releases_and_reacquires() {
        let shared = Arc::new(OutputShared::new());
        let mut state = StateLock::lock(&shared);
        assert_eq!(state.command, Command::None);

        let contender = Arc::clone(&shared);
        let value = state.unlocked(move || {
            // The lock must be free inside the region.
            let guard = contender
                .state
                .try_lock()
                .expect("state mutex free while unlocked");
            guard.really_enabled
        });
        assert!(!value);

        // And held again afterwards.
        let contender = Arc::clone(&shared);
        state.command = Command::Enable;
        let other = thread::spawn(move || contender.state.try_lock().is_err());
        assert!(other.join().expect("contender thread"));
    }
}
