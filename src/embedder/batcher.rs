// batcher.rs - fixed-size encoding chunks

pub struct Batcher {
    pub batch_size: usize,
}

impl Batcher {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// `batch_size`, but never more than `max_batch`, the most the model
    /// takes in one request.
    pub fn capped(batch_size: usize, max_batch: usize) -> Self {
        Self::new(batch_size.min(max_batch.max(1)))
    }

    pub fn split<'a>(&self, items: &'a [String]) -> Vec<&'a [String]> {
        items.chunks(self.batch_size).collect()
    }

    pub fn batch_count(&self, len: usize) -> usize {
        len.div_ceil(self.batch_size)
    }
}
