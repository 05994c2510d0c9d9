use std::sync::{Arc, OnceLock};

use crate::format::AudioFormat;
use crate::replay_gain::ReplayGainInfo;
use crate::tag::Tag;

/// One immutable unit of PCM from the upstream pipe.
///
/// Chunks are linked in play order through `next`, which the pipe sets
/// exactly once when the following chunk is appended. During a
/// cross-fade, `other` points at the overlapping chunk of the next song
/// and `mix_ratio` gives the weight split between the two.
pub struct MusicChunk {
    data: Box<[u8]>,
    tag: Option<Tag>,
    other: Option<Arc<MusicChunk>>,
    mix_ratio: f32,
    replay_gain_serial: u32,
    replay_gain_info: Option<ReplayGainInfo>,
    next: OnceLock<Arc<MusicChunk>>,
}

impl MusicChunk {
    pub fn new(data: impl Into<Box<[u8]>>) -> Self {
        Self {
            data: data.into(),
            tag: None,
            other: None,
            mix_ratio: 0.0,
            replay_gain_serial: 0,
            replay_gain_info: None,
            next: OnceLock::new(),
        }
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tag = Some(tag);
        self
    }

    /// Attaches the overlapping chunk of the next song.
    ///
    /// `mix_ratio` is clamped to [0, 1].
    pub fn with_other(mut self, other: Arc<MusicChunk>, mix_ratio: f32) -> Self {
        self.other = Some(other);
        self.mix_ratio = mix_ratio.clamp(0.0, 1.0);
        self
    }

    /// Attaches replay-gain info under a nonzero serial. The serial
    /// changes whenever the decoder starts a song with different info;
    /// serial zero means "no replay-gain info".
    pub fn with_replay_gain(mut self, serial: u32, info: ReplayGainInfo) -> Self {
        debug_assert!(serial != 0);
        self.replay_gain_serial = serial;
        self.replay_gain_info = Some(info);
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    pub fn other(&self) -> Option<&Arc<MusicChunk>> {
        self.other.as_ref()
    }

    pub fn mix_ratio(&self) -> f32 {
        self.mix_ratio
    }

    pub fn replay_gain_serial(&self) -> u32 {
        self.replay_gain_serial
    }

    pub fn replay_gain_info(&self) -> Option<&ReplayGainInfo> {
        self.replay_gain_info.as_ref()
    }

    /// The chunk following this one in play order, once appended.
    pub fn next(&self) -> Option<Arc<MusicChunk>> {
        self.next.get().cloned()
    }

    pub(crate) fn link_next(&self, next: Arc<MusicChunk>) {
        let linked = self.next.set(next);
        debug_assert!(linked.is_ok(), "chunk already has a successor");
    }

    /// Whether the payload is frame-aligned for `format`.
    pub fn check_format(&self, format: AudioFormat) -> bool {
        self.data.len() % format.frame_size() == 0
    }
}

impl std::fmt::Debug for MusicChunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MusicChunk")
            .field("len", &self.data.len())
            .field("tag", &self.tag.is_some())
            .field("other", &self.other.is_some())
            .field("mix_ratio", &self.mix_ratio)
            .field("replay_gain_serial", &self.replay_gain_serial)
            .finish_non_exhaustive()
    }
}
