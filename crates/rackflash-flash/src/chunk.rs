//! Splitting segment data into transfer chunks

/// How a payload of `total` bytes is cut into `chunk_size` pieces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub total: usize,
    pub chunk_size: usize,
}

impl ChunkPlan {
    /// `chunk_size` must be non-zero
    pub fn new(total: usize, chunk_size: usize) -> Self {
        debug_assert!(chunk_size > 0);
        Self { total, chunk_size }
    }

    /// Number of chunks (`ceil(total / chunk_size)`)
    pub fn count(&self) -> usize {
        self.total.div_ceil(self.chunk_size)
    }

    /// Length of the final chunk (0 for an empty payload)
    pub fn last_len(&self) -> usize {
        match self.total % self.chunk_size {
            0 if self.total > 0 => self.chunk_size,
            rem => rem,
        }
    }

    /// Iterate the chunks of `data` in order
    pub fn split<'a>(&self, data: &'a [u8]) -> std::slice::Chunks<'a, u8> {
        data.chunks(self.chunk_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(30, 240, 1, 30)]
    #[case(240, 240, 1, 240)]
    #[case(241, 240, 2, 1)]
    #[case(0x56000, 240, 1468, 176)]
    #[case(0, 240, 0, 0)]
    fn counts(#[case] total: usize, #[case] size: usize, #[case] count: usize, #[case] last: usize) {
        let plan = ChunkPlan::new(total, size);
        assert_eq!(plan.count(), count);
        assert_eq!(plan.last_len(), last);
    }

    #[test]
    fn split_reassembles() {
        let data: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();
        let plan = ChunkPlan::new(data.len(), 240);

        let chunks: Vec<&[u8]> = plan.split(&data).collect();
        assert_eq!(chunks.len(), plan.count());
        assert_eq!(chunks.last().map(|c| c.len()), Some(plan.last_len()));
        assert_eq!(chunks.concat(), data);
    }
}
