use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use cadenza_audio_core::AudioFormat;
use tracing::warn;

use crate::backend::BackendPort;
use crate::error::BackendError;

/// Writes raw interleaved PCM to a file, in the format the worker
/// negotiated. Useful for piping into external tools and for exercising
/// a real I/O path without audio hardware.
pub struct FileBackend {
    path: PathBuf,
    file: Option<BufWriter<File>>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }
}

impl BackendPort for FileBackend {
    fn plugin_name(&self) -> &'static str {
        "file"
    }

    fn open(&mut self, _format: AudioFormat) -> Result<(), BackendError> {
        let file = File::create(&self.path)?;
        self.file = Some(BufWriter::new(file));
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut file) = self.file.take() {
            if let Err(error) = file.flush() {
                warn!(path = %self.path.display(), %error, "flush on close failed");
            }
        }
    }

    fn play(&mut self, data: &[u8]) -> Result<usize, BackendError> {
        let Some(file) = &mut self.file else {
            return Err(BackendError::Device("file backend is not open".to_string()));
        };
        file.write_all(data)?;
        Ok(data.len())
    }

    fn drain(&mut self) {
        if let Some(file) = &mut self.file {
            if let Err(error) = file.flush() {
                warn!(path = %self.path.display(), %error, "flush failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use cadenza_audio_core::{AudioFormat, SampleFormat};

    use super::FileBackend;
    use crate::backend::BackendPort;

    #[test]
    fn writes_raw_pcm() {
        let dir = std::env::temp_dir().join("cadenza-file-backend-test");
        std::fs::create_dir_all(&dir).expect("create temp dir");
        let path = dir.join(format!("out-{}.pcm", std::process::id()));

        let mut backend = FileBackend::new(&path);
        backend
            .open(AudioFormat::new(44_100, SampleFormat::S16, 2))
            .expect("open");
        backend.play(&[1, 2, 3, 4]).expect("play");
        backend.play(&[5, 6, 7, 8]).expect("play");
        backend.close();

        let written = std::fs::read(&path).expect("read back");
        assert_eq!(written, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn play_without_open_is_an_error() {
        let mut backend = FileBackend::new("/nonexistent/never-created.pcm");
        assert!(backend.play(&[0u8; 4]).is_err());
    }
}
