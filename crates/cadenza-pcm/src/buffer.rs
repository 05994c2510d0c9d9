/// A reusable byte buffer that only ever grows.
///
/// Filters and the cross-fade mixer borrow scratch space from one of
/// these per call; the allocation survives across calls so the hot path
/// settles into zero allocations.
#[derive(Debug, Default)]
pub struct PcmBuffer {
    data: Vec<u8>,
}

impl PcmBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrows `size` writable bytes, growing the backing store if
    /// needed. Contents beyond previously written data are zeroed.
    pub fn get(&mut self, size: usize) -> &mut [u8] {
        if self.data.len() < size {
            self.data.resize(size, 0);
        }
        &mut self.data[..size]
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }
}
