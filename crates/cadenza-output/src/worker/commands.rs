use tracing::{debug, error};

use crate::error::OutputError;
use crate::state::{Command, StateLock};
use crate::worker::OutputWorker;
use crate::worker::play::wait_for_delay;

impl OutputWorker {
    /// Enables the backend if it is not enabled yet. A failure is
    /// reported and leaves the state unchanged.
    pub(super) fn enable(&mut self, state: &mut StateLock<'_>) -> bool {
        if state.really_enabled {
            return true;
        }

        let backend = &mut self.backend;
        match state.unlocked(|| backend.enable()) {
            Ok(()) => {
                state.really_enabled = true;
                true
            }
            Err(error) => {
                let error = OutputError::EnableFailed(error);
                error!(name = %self.name, plugin = self.plugin, %error, "cannot enable output");
                false
            }
        }
    }

    pub(super) fn disable(&mut self, state: &mut StateLock<'_>) {
        if state.open {
            self.close(state, false);
        }

        if state.really_enabled {
            state.really_enabled = false;
            let backend = &mut self.backend;
            state.unlocked(|| backend.disable());
        }
    }

    /// Opens the filter stack and the device. Any failure closes the
    /// pieces that did open and stamps the fail timer; the output
    /// stays closed.
    pub(super) fn open(&mut self, state: &mut StateLock<'_>) {
        debug_assert!(!state.open);
        debug_assert!(state.pipe.is_some());
        debug_assert!(state.current_chunk.is_none());

        let Some(in_format) = state.in_audio_format else {
            debug_assert!(false, "open without an input format");
            return;
        };
        debug_assert!(in_format.valid());

        state.fail_timer.reset();

        // The last enable may have failed; retry it here.
        if !self.enable(state) {
            state.fail_timer.update();
            return;
        }

        let filters = &mut self.filters;
        let filter_format = match state.unlocked(|| filters.open(in_format)) {
            Ok(format) => format,
            Err(error) => {
                let error = OutputError::FilterOpenFailed(error);
                error!(name = %self.name, plugin = self.plugin, %error, "cannot open output");
                state.fail_timer.update();
                return;
            }
        };
        debug_assert!(filter_format.valid());

        let out_format = filter_format.apply_mask(&self.config_format);

        let backend = &mut self.backend;
        let opened = state.unlocked(|| backend.open(out_format));
        debug_assert!(!state.open);
        if let Err(error) = opened {
            let error = OutputError::BackendOpenFailed(error);
            error!(name = %self.name, plugin = self.plugin, %error, "cannot open output");
            let filters = &mut self.filters;
            state.unlocked(|| filters.close());
            state.fail_timer.update();
            return;
        }

        let filters = &mut self.filters;
        if let Err(error) = state.unlocked(|| filters.set_output_format(out_format)) {
            let error = OutputError::ConvertConfigFailed(error);
            error!(name = %self.name, plugin = self.plugin, %error, "cannot open output");
            let backend = &mut self.backend;
            let filters = &mut self.filters;
            state.unlocked(|| {
                backend.close();
                filters.close();
            });
            state.fail_timer.update();
            return;
        }

        state.open = true;
        state.out_audio_format = Some(out_format);

        debug!(
            name = %self.name,
            plugin = self.plugin,
            format = %out_format,
            "opened output"
        );
        if out_format != in_format {
            debug!(name = %self.name, from = %in_format, "converting input");
        }
    }

    /// Tears the output down. With `drain` the device finishes the
    /// audio it buffered; without, it discards it.
    pub(super) fn close(&mut self, state: &mut StateLock<'_>, drain: bool) {
        debug_assert!(state.open);

        state.pipe = None;
        state.current_chunk = None;
        state.open = false;

        let backend = &mut self.backend;
        let filters = &mut self.filters;
        state.unlocked(|| {
            if drain {
                backend.drain();
            } else {
                backend.cancel();
            }
            backend.close();
            filters.close();
        });

        debug!(name = %self.name, plugin = self.plugin, "closed output");
    }

    /// Adapts an open output to a changed input format.
    ///
    /// Without a fully configured format the negotiated output format
    /// depends on the input, so the device goes through a full
    /// drain-close-open cycle (keeping the pipe). With one, only the
    /// filter stack needs reconfiguring.
    pub(super) fn reopen(&mut self, state: &mut StateLock<'_>) {
        if !self.config_format.is_fully_defined() {
            if state.open {
                let pipe = state.pipe.clone();
                self.close(state, true);
                state.pipe = pipe;
            }

            if let Some(in_format) = state.in_audio_format {
                state.out_audio_format = Some(in_format.apply_mask(&self.config_format));
            }
        }

        if state.open {
            self.reopen_filter(state);
        } else {
            self.open(state);
        }
    }

    fn reopen_filter(&mut self, state: &mut StateLock<'_>) {
        let Some(in_format) = state.in_audio_format else {
            debug_assert!(false, "reopen without an input format");
            return;
        };
        let Some(out_format) = state.out_audio_format else {
            debug_assert!(false, "reopen without a negotiated output format");
            return;
        };

        let filters = &mut self.filters;
        let result = state.unlocked(|| {
            filters.close();
            filters
                .open(in_format)
                .and_then(|_| filters.set_output_format(out_format))
        });

        if let Err(error) = result {
            let error = OutputError::FilterOpenFailed(error);
            error!(name = %self.name, plugin = self.plugin, %error, "cannot reopen filters");

            // Like close(), except the filter stack is already closed.
            state.pipe = None;
            state.current_chunk = None;
            state.open = false;
            state.fail_timer.update();

            let backend = &mut self.backend;
            state.unlocked(|| backend.close());
        }
    }

    /// The pause loop: cancel buffered audio, acknowledge, then keep
    /// the device paused until the next command arrives. A pause
    /// failure closes the output abruptly.
    pub(super) fn pause(&mut self, state: &mut StateLock<'_>) {
        {
            let backend = &mut self.backend;
            state.unlocked(|| backend.cancel());
        }

        state.pause = true;
        self.command_finished(state);

        loop {
            if !wait_for_delay(self.backend.as_mut(), state) {
                break;
            }

            let backend = &mut self.backend;
            if let Err(error) = state.unlocked(|| backend.pause()) {
                let error = OutputError::PauseFailed(error);
                error!(name = %self.name, plugin = self.plugin, %error, "pause failed, closing");
                self.close(state, false);
                state.fail_timer.update();
                break;
            }

            if state.command != Command::None {
                break;
            }
        }

        state.pause = false;
    }
}
