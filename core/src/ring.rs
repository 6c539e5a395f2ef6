/// Fixed-capacity circular byte storage.
///
/// The region is allocated as equally sized blocks rather than one large
/// buffer, but is addressed as a single circular range of `capacity` bytes.
/// `BlockRing` is a plain data structure; all synchronization lives in the
/// coordinator state that owns it.
pub(crate) struct BlockRing {
    blocks: Vec<Box<[u8]>>,
    block_size: usize,
    capacity: usize,
}

impl BlockRing {
    pub fn new(block_size: usize, num_blocks: usize) -> Self {
        let blocks = (0..num_blocks)
            .map(|_| vec![0; block_size].into_boxed_slice())
            .collect();

        Self {
            blocks,
            block_size,
            capacity: block_size * num_blocks,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy `src` into the ring starting at `index`, wrapping at block
    /// boundaries and at the end of the region.
    pub fn copy_in(&mut self, mut index: usize, src: &[u8]) {
        debug_assert!(src.len() <= self.capacity);

        let mut filled = 0;
        while filled < src.len() {
            let block = index / self.block_size;
            let offset = index % self.block_size;
            let span = (self.block_size - offset).min(src.len() - filled);

            self.blocks[block][offset..offset + span]
                .copy_from_slice(&src[filled..filled + span]);

            filled += span;
            index = (index + span) % self.capacity;
        }
    }

    /// Copy `dst.len()` bytes out of the ring starting at `index`.
    pub fn copy_out(&self, mut index: usize, dst: &mut [u8]) {
        debug_assert!(dst.len() <= self.capacity);

        let mut filled = 0;
        while filled < dst.len() {
            let block = index / self.block_size;
            let offset = index % self.block_size;
            let span = (self.block_size - offset).min(dst.len() - filled);

            dst[filled..filled + span]
                .copy_from_slice(&self.blocks[block][offset..offset + span]);

            filled += span;
            index = (index + span) % self.capacity;
        }
    }
}
