use cadenza_audio_core::{AudioFormat, MusicChunk, SampleFormat};

use crate::config::OutputConfig;
use crate::tests::harness::{BackendCall, Harness};

#[test]
fn format_change_without_a_full_mask_cycles_the_device_but_keeps_the_pipe() {
    let mut config = OutputConfig::new("reopen-partial");
    config.format = "*:*:2".parse().expect("mask");
    let harness = Harness::start(config);
    let pipe = Harness::pipe_with_chunks(0, 0);

    let first = AudioFormat::new(44_100, SampleFormat::S16, 2);
    let second = AudioFormat::new(48_000, SampleFormat::S16, 2);

    assert!(harness.control.open(first, &pipe));
    assert_eq!(harness.control.audio_format(), Some(first));

    // The negotiated format depends on the input, so the device goes
    // through drain, close, open.
    assert!(harness.control.open(second, &pipe));
    assert!(harness.control.is_open());
    assert_eq!(harness.control.audio_format(), Some(second));

    let calls = harness.calls();
    let close_at = calls
        .iter()
        .position(|call| *call == BackendCall::Close)
        .expect("device cycled");
    assert_eq!(calls[close_at - 1], BackendCall::Drain);
    assert_eq!(calls[close_at + 1], BackendCall::Open(second));

    // The pipe survived the cycle: a pushed chunk plays without a new
    // open().
    pipe.push(MusicChunk::new(vec![0u8; 16]));
    harness.control.play();
    harness.wait_signal();
    assert_eq!(harness.played_bytes(), 16);
}

#[test]
fn format_change_with_a_full_mask_reconfigures_only_the_filters() {
    let mut config = OutputConfig::new("reopen-full");
    config.format = "44100:16:2".parse().expect("mask");
    let harness = Harness::start(config);
    let pipe = Harness::pipe_with_chunks(0, 0);

    let out = AudioFormat::new(44_100, SampleFormat::S16, 2);
    let first_in = AudioFormat::new(44_100, SampleFormat::F32, 2);
    let second_in = AudioFormat::new(44_100, SampleFormat::S24P32, 2);

    assert!(harness.control.open(first_in, &pipe));
    assert_eq!(harness.control.audio_format(), Some(out));

    assert!(harness.control.open(second_in, &pipe));
    assert!(harness.control.is_open());
    assert_eq!(harness.control.audio_format(), Some(out));

    // The device itself was opened exactly once and never closed.
    let calls = harness.calls();
    let opens = calls
        .iter()
        .filter(|call| matches!(call, BackendCall::Open(_)))
        .count();
    assert_eq!(opens, 1);
    assert!(!calls.contains(&BackendCall::Close));
    assert!(!calls.contains(&BackendCall::Drain));
}

#[test]
fn failed_filter_reopen_closes_the_device_and_starts_the_cooldown() {
    let mut config = OutputConfig::new("reopen-filter-fail");
    config.format = "44100:16:2".parse().expect("mask");
    let harness = Harness::start(config);
    let pipe = Harness::pipe_with_chunks(0, 0);

    assert!(harness.control.open(
        AudioFormat::new(44_100, SampleFormat::F32, 2),
        &pipe
    ));

    // The new input rate cannot be converted to the pinned 44.1 kHz
    // output, so reconfiguring the filters fails and the device is
    // torn down.
    assert!(!harness.control.open(
        AudioFormat::new(48_000, SampleFormat::F32, 2),
        &pipe
    ));
    assert!(!harness.control.is_open());
    assert!(harness.control.has_failed());
    assert!(harness.calls().contains(&BackendCall::Close));
}
