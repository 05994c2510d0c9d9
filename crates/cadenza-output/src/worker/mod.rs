mod commands;
mod play;

use std::sync::Arc;

use cadenza_audio_core::AudioFormatMask;
use tracing::debug;

use crate::backend::BackendPort;
use crate::control::PlayerSignal;
use crate::filter::ChunkFilter;
use crate::state::{Command, OutputShared, StateLock};

/// What a dispatched command tells the main loop to do next.
enum Step {
    /// Fall through to the idle step (attempt a play, then wait).
    Idle,
    /// Re-dispatch immediately so a follow-up command cannot be
    /// overtaken by a play attempt.
    Continue,
    /// Leave the loop; the thread ends.
    Terminated,
}

/// One output's worker: exclusive owner of the backend and the filter
/// stack, driven by the command mailbox in [`OutputShared`].
pub(crate) struct OutputWorker {
    pub(crate) shared: Arc<OutputShared>,
    pub(crate) backend: Box<dyn BackendPort>,
    pub(crate) filters: ChunkFilter,
    pub(crate) config_format: AudioFormatMask,
    pub(crate) send_tags: bool,
    pub(crate) name: String,
    pub(crate) plugin: &'static str,
    pub(crate) player: Arc<dyn PlayerSignal>,
}

impl OutputWorker {
    pub(crate) fn run(mut self) {
        debug!(name = %self.name, plugin = self.plugin, "output worker started");

        let shared = Arc::clone(&self.shared);
        let mut state = StateLock::lock(&shared);

        loop {
            match self.dispatch(state.command, &mut state) {
                Step::Idle => {}
                Step::Continue => continue,
                Step::Terminated => {
                    debug!(name = %self.name, plugin = self.plugin, "output worker stopped");
                    return;
                }
            }

            if state.open && state.allow_play && self.play(&mut state) {
                // More chunks may already be waiting in the pipe.
                continue;
            }

            if state.command == Command::None {
                state.woken_for_play = false;
                state.wait();
            }
        }
    }

    fn dispatch(&mut self, command: Command, state: &mut StateLock<'_>) -> Step {
        match command {
            Command::None => Step::Idle,

            Command::Enable => {
                self.enable(state);
                self.command_finished(state);
                Step::Idle
            }

            Command::Disable => {
                self.disable(state);
                self.command_finished(state);
                Step::Idle
            }

            Command::Open => {
                self.open(state);
                self.command_finished(state);
                Step::Idle
            }

            Command::Reopen => {
                self.reopen(state);
                self.command_finished(state);
                Step::Idle
            }

            Command::Close => {
                if state.open {
                    debug_assert!(state.pipe.is_some());
                    self.close(state, false);
                }
                self.command_finished(state);
                Step::Idle
            }

            Command::Pause => {
                if !state.open {
                    // The output failed after the pause was submitted;
                    // nothing to do but acknowledge.
                    self.command_finished(state);
                    return Step::Idle;
                }
                self.pause(state);
                // Re-dispatch: the command that ended the pause loop
                // must be handled before any play attempt.
                Step::Continue
            }

            Command::Drain => {
                if state.open {
                    debug_assert!(state.current_chunk.is_none());
                    debug_assert!(
                        state
                            .pipe
                            .as_ref()
                            .is_none_or(|pipe| pipe.peek().is_none())
                    );
                    let backend = &mut self.backend;
                    state.unlocked(|| backend.drain());
                }
                self.command_finished(state);
                Step::Continue
            }

            Command::Cancel => {
                state.current_chunk = None;
                if state.open {
                    let backend = &mut self.backend;
                    state.unlocked(|| backend.cancel());
                }
                self.command_finished(state);
                Step::Continue
            }

            Command::Kill => {
                state.current_chunk = None;
                self.command_finished(state);
                Step::Terminated
            }
        }
    }

    /// Acknowledges the current command: clears the slot and signals
    /// the client notify with the mutex released.
    fn command_finished(&self, state: &mut StateLock<'_>) {
        debug_assert!(state.command != Command::None);
        state.command = Command::None;

        let client = &self.shared.client;
        state.unlocked(|| client.signal());
    }
}
