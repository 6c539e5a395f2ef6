use parking_lot::{Condvar, Mutex};

use crate::ring::BlockRing;

/// Coordinator state shared by the consumer handle and the prefetch worker.
///
/// One mutex guards everything; the two condition variables implement the
/// wake protocol between the two sides. Every wait on either condvar is
/// bounded by the configured poll interval, so a missed broadcast can only
/// delay a wakeup, never lose it.
pub(crate) struct Shared<E> {
    pub state: Mutex<State<E>>,

    /// Worker -> consumer: more data was buffered, or a terminal condition
    /// (abort, error, end of stream) was reached.
    pub read_wake: Condvar,

    /// Consumer -> worker: buffer space was freed, a seek was requested, or
    /// the stream is being shut down.
    pub write_wake: Condvar,
}

pub(crate) struct State<E> {
    pub ring: BlockRing,

    /// Ring index the consumer will copy from next.
    pub read_idx: usize,
    /// Ring index the worker will copy to next.
    pub write_idx: usize,
    /// Prefetched-but-unread byte count. Kept explicitly so a full ring and
    /// an empty ring are distinguishable.
    pub buffer_size: usize,

    /// Extent of *cached* bytes: everything still present in the ring,
    /// including already-read history kept for short backward seeks.
    /// `cache_idx` is the ring index of the absolute offset `cache_offset`.
    /// Invariant: each marker index equals its absolute stream offset modulo
    /// the ring capacity, and the cache always ends at the write cursor.
    pub cache_idx: usize,
    pub cache_size: usize,
    pub cache_offset: u64,

    /// Absolute offset of the next byte the consumer will read.
    pub stream_offset: u64,

    /// Pending consumer seek, serviced by the worker.
    pub seek_pos: u64,
    pub seek_requested: bool,

    /// The worker has buffered up to the end of the stream.
    pub buffered_eos: bool,

    /// Terminal flags. `error` holds the source failure until the consumer
    /// observes it; `failed` stays set afterwards.
    pub abort: bool,
    pub failed: bool,
    pub error: Option<E>,
}

impl<E> Shared<E> {
    pub fn new(ring: BlockRing, start_offset: u64) -> Self {
        let start_idx = (start_offset % ring.capacity() as u64) as usize;

        Shared {
            state: Mutex::new(State {
                ring,
                read_idx: start_idx,
                write_idx: start_idx,
                buffer_size: 0,
                cache_idx: start_idx,
                cache_size: 0,
                cache_offset: start_offset,
                stream_offset: start_offset,
                seek_pos: 0,
                seek_requested: false,
                buffered_eos: false,
                abort: false,
                failed: false,
                error: None,
            }),
            read_wake: Condvar::new(),
            write_wake: Condvar::new(),
        }
    }

    /// Request shutdown: set the abort flag and wake both sides so every
    /// blocked operation unwinds promptly.
    pub fn abort(&self) {
        let mut state = self.state.lock();
        state.abort = true;
        self.read_wake.notify_all();
        self.write_wake.notify_all();
    }
}

impl<E> State<E> {
    /// Absolute stream offset one past the last buffered byte. The cached
    /// window also ends here.
    pub fn write_offset(&self) -> u64 {
        self.stream_offset + self.buffer_size as u64
    }
}
