use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// What a chunk is currently waiting on, for status logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WaitReason {
    Scheduled = 0,
    RamToSchedule = 1,
    HeaderResponse = 2,
    Body = 3,
    QueueToWrite = 4,
    DiskIo = 5,
    Done = 6,
}

impl WaitReason {
    fn from_u8(value: u8) -> WaitReason {
        match value {
            1 => WaitReason::RamToSchedule,
            2 => WaitReason::HeaderResponse,
            3 => WaitReason::Body,
            4 => WaitReason::QueueToWrite,
            5 => WaitReason::DiskIo,
            6 => WaitReason::Done,
            _ => WaitReason::Scheduled,
        }
    }
}

/// Identity of one contiguous byte range of a transfer.
///
/// For a given transfer the set of chunk ids partitions `[0, size)` into
/// ascending, contiguous, non-overlapping ranges. The wait reason is shared
/// between the downloader and the writer so either side can report where a
/// chunk currently sits.
#[derive(Debug, Clone)]
pub struct ChunkId {
    destination: Arc<PathBuf>,
    offset: u64,
    length: u64,
    wait_reason: Arc<AtomicU8>,
}

impl ChunkId {
    pub fn new(destination: Arc<PathBuf>, offset: u64, length: u64) -> Self {
        Self {
            destination,
            offset,
            length,
            wait_reason: Arc::new(AtomicU8::new(WaitReason::Scheduled as u8)),
        }
    }

    pub fn destination(&self) -> &PathBuf {
        &self.destination
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn set_wait_reason(&self, reason: WaitReason) {
        self.wait_reason.store(reason as u8, Ordering::Relaxed);
    }

    pub fn wait_reason(&self) -> WaitReason {
        WaitReason::from_u8(self.wait_reason.load(Ordering::Relaxed))
    }
}

/// A fully buffered chunk body, in flight between downloader and writer.
///
/// Ownership transfers with the value: once enqueued, the downloader must
/// not touch the bytes again. The writer returns the buffer to its slice
/// pool immediately after the bytes hit the disk.
pub struct FileChunk {
    pub id: ChunkId,
    pub body: Vec<u8>,
}

impl FileChunk {
    pub fn new(id: ChunkId, body: Vec<u8>) -> Self {
        debug_assert_eq!(id.length() as usize, body.len());
        Self { id, body }
    }
}
