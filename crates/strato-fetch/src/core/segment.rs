/// One contiguous byte range of a planned transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    /// Starting byte offset in the destination file.
    pub offset: u64,
    /// Range length in bytes; equals the chunk size except possibly for the
    /// final span.
    pub length: u64,
}

impl ChunkSpan {
    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Number of chunks a resource of `total_size` splits into.
pub fn chunk_count(total_size: u64, chunk_size: u64) -> u64 {
    total_size.div_ceil(chunk_size)
}

/// Split `[0, total_size)` into fixed-size spans in ascending offset order.
///
/// The spans are contiguous and non-overlapping, every span is `chunk_size`
/// long except possibly the last, and their union covers the whole range.
/// A zero-size resource yields no spans.
pub fn plan_chunks(total_size: u64, chunk_size: u64) -> Vec<ChunkSpan> {
    let mut spans = Vec::with_capacity(chunk_count(total_size, chunk_size) as usize);
    let mut offset = 0;
    while offset < total_size {
        let length = chunk_size.min(total_size - offset);
        spans.push(ChunkSpan { offset, length });
        offset += length;
    }
    spans
}
