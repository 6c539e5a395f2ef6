#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(clippy::missing_panics_doc)]
#![warn(clippy::clone_on_ref_ptr)]
#![deny(trivial_numeric_casts)]

//! Prefetching seekable ring-buffer wrapper for slow byte streams.
//!
//! A [`RingReader`] sits between a high-latency [`Source`] (a network
//! stream, a throttled file, ...) and a single consumer. A dedicated worker
//! thread reads ahead into a fixed-capacity circular buffer, so consumer
//! reads are served from memory, short seeks are served from cached bytes
//! without touching the source, and only seeks far outside the cached window
//! are forwarded to the source.

use std::time::Duration;

mod ring;
mod server;
mod shared;

pub mod error;

mod client;
mod source;

pub use client::{AbortHandle, RingReader};
pub use error::{OpenError, ReadError};
pub use source::Source;

/// Tunables for a [`RingReader`].
///
/// The defaults match a remote media stream read by a local player: a 10 MiB
/// window filled in 32 KiB steps, keeping 1 MiB of already-read history
/// around for backward seeks.
#[derive(Debug, Clone, Copy)]
pub struct StreamOptions {
    /// The size in bytes of one ring block. The ring is allocated as
    /// `num_blocks` separate blocks of this size purely to avoid one huge
    /// contiguous allocation; block boundaries are invisible to the consumer.
    pub block_size: usize,

    /// The number of ring blocks. Total capacity is
    /// `block_size * num_blocks`.
    pub num_blocks: usize,

    /// Minimum number of unused bytes kept between the write cursor and the
    /// read cursor, so the worker can never overwrite unread data.
    pub rw_guard: usize,

    /// Reserved region behind the read cursor that preserves recently
    /// consumed bytes, so a short backward seek can be served from cache.
    pub seek_guard: usize,

    /// A forward seek landing more than this many bytes past the cached
    /// window is forwarded to the source instead of being reached by
    /// sequential reading.
    pub long_seek_threshold: u64,

    /// The unit request size issued to the source by the worker.
    pub step_read: usize,

    /// Upper bound on every internal condition-variable wait. Smaller values
    /// make cancellation more responsive at the cost of more wakeups.
    pub poll_interval: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        StreamOptions {
            block_size: 1024 * 1024,
            num_blocks: 10,
            rw_guard: 1024,
            seek_guard: 1024 * 1024,
            long_seek_threshold: 1024 * 1024,
            step_read: 32 * 1024,
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl StreamOptions {
    /// Total ring capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.block_size * self.num_blocks
    }

    /// The most the worker will ever buffer ahead of the read cursor.
    pub(crate) fn max_buffer(&self) -> usize {
        self.capacity() - self.rw_guard - self.seek_guard
    }

    pub(crate) fn validate(&self) {
        assert_ne!(self.block_size, 0);
        assert_ne!(self.num_blocks, 0);
        assert_ne!(self.step_read, 0);
        assert!(
            self.rw_guard + self.seek_guard < self.block_size,
            "guard gaps must fit inside one block"
        );
        assert!(
            self.step_read <= self.max_buffer(),
            "step_read must fit inside the bufferable window"
        );
    }
}
