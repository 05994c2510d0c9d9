use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::chunk::MusicChunk;

/// The queue of decoded chunks between the producer and the outputs.
///
/// The producer appends with [`push`](Self::push), which also links the
/// previous chunk's `next` pointer so consumers can walk the play order
/// without holding the pipe lock. Output workers only [`peek`](Self::peek)
/// and follow `next`; the player removes consumed chunks with
/// [`shift`](Self::shift).
#[derive(Default)]
pub struct MusicPipe {
    inner: Mutex<VecDeque<Arc<MusicChunk>>>,
}

impl MusicPipe {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, VecDeque<Arc<MusicChunk>>> {
        self.inner.lock().expect("music pipe mutex poisoned")
    }

    /// Appends a chunk, linking it behind the current tail.
    pub fn push(&self, chunk: MusicChunk) -> Arc<MusicChunk> {
        let chunk = Arc::new(chunk);
        let mut inner = self.guard();
        if let Some(tail) = inner.back() {
            tail.link_next(Arc::clone(&chunk));
        }
        inner.push_back(Arc::clone(&chunk));
        chunk
    }

    /// The oldest chunk still in the pipe, without removing it.
    pub fn peek(&self) -> Option<Arc<MusicChunk>> {
        self.guard().front().cloned()
    }

    /// Removes and returns the oldest chunk.
    pub fn shift(&self) -> Option<Arc<MusicChunk>> {
        self.guard().pop_front()
    }

    pub fn clear(&self) {
        self.guard().clear();
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::MusicPipe;
    use crate::chunk::MusicChunk;

    #[test]
    fn push_links_play_order() {
        let pipe = MusicPipe::new();
        let first = pipe.push(MusicChunk::new(vec![1u8; 4]));
        let second = pipe.push(MusicChunk::new(vec![2u8; 4]));
        let third = pipe.push(MusicChunk::new(vec![3u8; 4]));

        assert!(Arc::ptr_eq(&first.next().expect("first linked"), &second));
        assert!(Arc::ptr_eq(&second.next().expect("second linked"), &third));
        assert!(third.next().is_none());
    }

    #[test]
    fn peek_is_non_destructive() {
        let pipe = MusicPipe::new();
        pipe.push(MusicChunk::new(vec![0u8; 4]));

        assert_eq!(pipe.len(), 1);
        let peeked = pipe.peek().expect("chunk available");
        assert_eq!(pipe.len(), 1);
        let shifted = pipe.shift().expect("chunk available");
        assert!(Arc::ptr_eq(&peeked, &shifted));
        assert!(pipe.is_empty());
    }

    #[test]
    fn links_survive_shift() {
        let pipe = MusicPipe::new();
        let first = pipe.push(MusicChunk::new(vec![1u8; 4]));
        let second = pipe.push(MusicChunk::new(vec![2u8; 4]));

        pipe.shift();
        // A worker still holding the first chunk can reach the second.
        assert!(Arc::ptr_eq(&first.next().expect("still linked"), &second));
    }
}
