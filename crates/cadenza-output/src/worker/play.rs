use std::sync::Arc;

use cadenza_audio_core::{AudioFormat, MusicChunk};
use tracing::error;

use crate::backend::BackendPort;
use crate::error::OutputError;
use crate::state::{Command, StateLock};
use crate::worker::OutputWorker;

impl OutputWorker {
    fn next_chunk(state: &StateLock<'_>) -> Option<Arc<MusicChunk>> {
        match &state.current_chunk {
            // Continue behind the chunk of the previous play call.
            Some(chunk) => chunk.next(),
            // First chunk of the session, straight from the pipe.
            None => state.pipe.as_ref().and_then(|pipe| pipe.peek()),
        }
    }

    /// Plays chunks in order until a command arrives, the pipe runs
    /// dry, or the device fails. Returns false when there was nothing
    /// to play; a true return means chunks were consumed and the
    /// controller has been signaled once.
    pub(super) fn play(&mut self, state: &mut StateLock<'_>) -> bool {
        debug_assert!(state.open);
        debug_assert!(state.pipe.is_some());

        let Some(mut chunk) = Self::next_chunk(state) else {
            return false;
        };

        state.current_chunk_finished = false;

        debug_assert!(!state.in_playback_loop);
        state.in_playback_loop = true;

        while state.command == Command::None {
            debug_assert!(!state.current_chunk_finished);

            state.current_chunk = Some(Arc::clone(&chunk));
            if !self.play_chunk(state, Arc::clone(&chunk)) {
                // The failure path closed the output and cleared the
                // current chunk.
                debug_assert!(state.current_chunk.is_none());
                break;
            }

            match chunk.next() {
                Some(next) => chunk = next,
                None => break,
            }
        }

        debug_assert!(state.in_playback_loop);
        state.in_playback_loop = false;
        state.current_chunk_finished = true;

        let player = &self.player;
        state.unlocked(|| player.signal());

        true
    }

    /// Filters one chunk and pushes it to the device, honoring the
    /// device's delay between writes and polling for commands.
    fn play_chunk(&mut self, state: &mut StateLock<'_>, chunk: Arc<MusicChunk>) -> bool {
        if self.send_tags {
            if let Some(tag) = chunk.tag() {
                let backend = &mut self.backend;
                state.unlocked(|| backend.send_tag(tag));
            }
        }

        let Some(in_format) = state.in_audio_format else {
            debug_assert!(false, "playing without an input format");
            return false;
        };
        let out_frame_size = state.out_audio_format.map_or(1, AudioFormat::frame_size);

        let filters = &mut self.filters;
        let chunk_ref: &MusicChunk = &chunk;
        let filtered = state.unlocked(move || filters.filter_chunk(chunk_ref, in_format));
        let mut data: &[u8] = match filtered {
            Ok(data) => data,
            Err(error) => {
                error!(name = %self.name, plugin = self.plugin, %error, "closing output");
                self.close(state, false);
                // Hold reopen attempts off for the cooldown.
                state.fail_timer.update();
                return false;
            }
        };

        while !data.is_empty() && state.command == Command::None {
            if !wait_for_delay(self.backend.as_mut(), state) {
                break;
            }

            let backend = &mut self.backend;
            match state.unlocked(|| backend.play(data)) {
                Ok(played) => {
                    debug_assert!(played > 0);
                    debug_assert!(played <= data.len());
                    debug_assert_eq!(played % out_frame_size, 0);
                    data = &data[played..];
                }
                Err(error) => {
                    let error = OutputError::PlayFailed(error);
                    error!(name = %self.name, plugin = self.plugin, %error, "closing output");
                    self.close(state, false);

                    debug_assert!(!state.fail_timer.is_defined());
                    state.fail_timer.update();
                    return false;
                }
            }
        }

        true
    }
}

/// Waits until the device reports it can accept more audio.
///
/// Returns false as soon as a command interrupts the wait. The delay
/// query itself runs under the mutex; backends keep it cheap.
pub(super) fn wait_for_delay(backend: &mut dyn BackendPort, state: &mut StateLock<'_>) -> bool {
    loop {
        let delay = backend.delay();
        if delay.is_zero() {
            return true;
        }

        state.wait_timeout(delay);

        if state.command != Command::None {
            return false;
        }
    }
}
