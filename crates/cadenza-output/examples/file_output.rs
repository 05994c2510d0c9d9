//! Renders two cross-faded sine bursts through a full output worker
//! into `demo-output.pcm` (raw mono f32 at 44.1 kHz):
//!
//! ```sh
//! cargo run --example file_output
//! ffplay -f f32le -ar 44100 -ch_layout mono demo-output.pcm
//! ```

use std::sync::Arc;

use cadenza_audio_core::{AudioFormat, MusicChunk, MusicPipe, SampleFormat};
use cadenza_output::backends::FileBackend;
use cadenza_output::{AudioOutputControl, OutputConfig, PlayerSignal};
use crossbeam_channel::Sender;

struct Finished(Sender<()>);

impl PlayerSignal for Finished {
    fn signal(&self) {
        let _ = self.0.send(());
    }
}

fn sine(frames: usize, hz: f32, rate: u32) -> Vec<u8> {
    (0..frames)
        .flat_map(|i| {
            let t = i as f32 / rate as f32;
            let sample = (t * hz * std::f32::consts::TAU).sin() * 0.4;
            sample.to_ne_bytes()
        })
        .collect()
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let rate = 44_100;
    let format = AudioFormat::new(rate, SampleFormat::F32, 1);
    let pipe = Arc::new(MusicPipe::new());

    // One second of A4, a half-second cross-fade, one second of E5.
    pipe.push(MusicChunk::new(sine(rate as usize, 440.0, rate)));
    let incoming = Arc::new(MusicChunk::new(sine(rate as usize / 2, 659.3, rate)));
    pipe.push(MusicChunk::new(sine(rate as usize / 2, 440.0, rate)).with_other(incoming, 0.5));
    let tail = pipe.push(MusicChunk::new(sine(rate as usize, 659.3, rate)));

    let (finished_tx, finished_rx) = crossbeam_channel::unbounded();
    let control = AudioOutputControl::start(
        OutputConfig::new("demo"),
        Box::new(FileBackend::new("demo-output.pcm")),
        Vec::new(),
        Arc::new(Finished(finished_tx)),
    )
    .expect("spawn output worker");

    assert!(control.open(format, &pipe), "output failed to open");
    finished_rx.recv().expect("playback finished");

    // Consume the pipe the way a player would, then drain and stop.
    while pipe.shift().is_some() {}
    control.clear_tail_chunk(&tail);
    control.drain();
    control.kill();

    println!("wrote demo-output.pcm");
}
