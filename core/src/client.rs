use std::error::Error;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use parking_lot::MutexGuard;

use crate::error::{OpenError, ReadError};
use crate::ring::BlockRing;
use crate::server::PrefetchServer;
use crate::shared::{Shared, State};
use crate::{Source, StreamOptions};

/// A buffered, seekable reader over a slow [`Source`].
///
/// Opening a `RingReader` spawns a worker thread that continuously reads
/// ahead of the consumer into a circular in-memory window. `read` and `peek`
/// are served from that window, blocking only until enough bytes have been
/// prefetched. Seeks inside the cached window are resolved without touching
/// the source; only a seek far outside it is forwarded as a real source
/// seek.
///
/// One `RingReader` supports exactly one consumer. Dropping it shuts the
/// worker down and joins it.
pub struct RingReader<S: Source> {
    shared: Arc<Shared<S::Error>>,
    worker: Option<JoinHandle<()>>,

    peek_buf: Vec<u8>,

    stream_size: u64,
    can_seek: bool,
    max_buffer: usize,
    poll_interval: Duration,
}

impl<S: Source> RingReader<S> {
    /// Wrap `source` and start prefetching from its current position.
    ///
    /// The source must report a positive total size; the buffering protocol
    /// needs to know where the stream ends.
    ///
    /// # Panics
    ///
    /// Panics if the options are inconsistent: any size of zero, guard gaps
    /// that do not fit inside one block, or a `step_read` larger than the
    /// bufferable window.
    pub fn new(source: S, options: StreamOptions) -> Result<Self, OpenError> {
        options.validate();

        let stream_size = match source.size() {
            Some(size) if size > 0 => size,
            _ => {
                warn!("source does not report a usable size");
                return Err(OpenError::UnknownSize);
            }
        };

        let can_seek = source.can_seek();
        let start_offset = source.tell();
        info!(
            "buffering stream of {} bytes from {} (can_seek: {})",
            stream_size, start_offset, can_seek
        );

        let ring = BlockRing::new(options.block_size, options.num_blocks);
        let shared = Arc::new(Shared::new(ring, start_offset));
        let worker = PrefetchServer::spawn(source, Arc::clone(&shared), stream_size, &options);

        Ok(RingReader {
            shared,
            worker: Some(worker),
            peek_buf: Vec::new(),
            stream_size,
            can_seek,
            max_buffer: options.max_buffer(),
            poll_interval: options.poll_interval,
        })
    }

    /// Read the next bytes of the stream into `buf`.
    ///
    /// Blocks until `buf.len()` bytes are buffered or a terminal condition
    /// is reached. At the end of the stream, whatever remains is delivered
    /// as a short count; `Ok(0)` means the end was reached exactly.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError<S::Error>> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut state = self.shared.state.lock();
        let ready = wait_for_data(
            &self.shared,
            &mut state,
            buf.len(),
            self.max_buffer,
            self.poll_interval,
        )?;
        let count = ready.min(state.buffer_size);
        if count == 0 {
            return Ok(0);
        }

        let read_idx = state.read_idx;
        state.ring.copy_out(read_idx, &mut buf[..count]);
        state.read_idx = (read_idx + count) % state.ring.capacity();
        state.buffer_size -= count;
        state.stream_offset += count as u64;
        self.shared.write_wake.notify_all();

        if count < buf.len() {
            debug!("short read of {} for {} at end of stream", count, buf.len());
        }

        Ok(count)
    }

    /// Look at the next bytes of the stream without consuming them.
    ///
    /// Waits like [`read`](RingReader::read) and returns a view of up to
    /// `len` bytes. The view is a copy into a scratch buffer owned by this
    /// reader, so it stays valid until the next call — a zero-copy view is
    /// impossible across the ring's wrap boundary.
    pub fn peek(&mut self, len: usize) -> Result<&[u8], ReadError<S::Error>> {
        if len == 0 {
            return Ok(&[]);
        }

        if self.peek_buf.len() < len {
            let grow = len - self.peek_buf.len();
            self.peek_buf
                .try_reserve(grow)
                .map_err(|_| ReadError::OutOfMemory)?;
            self.peek_buf.resize(len, 0);
        }

        let mut state = self.shared.state.lock();
        let ready = wait_for_data(
            &self.shared,
            &mut state,
            len,
            self.max_buffer,
            self.poll_interval,
        )?;
        let count = ready.min(state.buffer_size);
        state.ring.copy_out(state.read_idx, &mut self.peek_buf[..count]);
        drop(state);

        Ok(&self.peek_buf[..count])
    }

    /// Request a seek to the absolute offset `target`.
    ///
    /// Returns immediately; the worker completes the seek. A target inside
    /// the cached window is resolved from memory, a target slightly past it
    /// is reached by reading through, and anything else becomes a single
    /// source seek. Until the worker has caught up, reads block and
    /// [`position`](RingReader::position) reports `target`.
    pub fn seek(&mut self, target: u64) -> Result<(), ReadError<S::Error>> {
        if !self.can_seek {
            return Err(ReadError::NotSeekable);
        }

        let mut state = self.shared.state.lock();
        state.seek_pos = target;
        state.seek_requested = true;
        debug!("seek requested to {}", target);
        self.shared.write_wake.notify_all();

        Ok(())
    }

    /// The absolute offset of the next byte [`read`](RingReader::read) will
    /// return. Immediately after a seek this is the seek target, even if the
    /// worker has not completed it yet.
    pub fn position(&self) -> u64 {
        let state = self.shared.state.lock();
        if state.seek_requested {
            state.seek_pos
        } else {
            state.stream_offset
        }
    }

    /// The total stream size in bytes.
    pub fn size(&self) -> u64 {
        self.stream_size
    }

    /// The highest absolute offset currently buffered ahead of the read
    /// position.
    pub fn cached_size(&self) -> u64 {
        let state = self.shared.state.lock();
        state.write_offset()
    }

    /// Whether [`seek`](RingReader::seek) is supported, inherited from the
    /// source.
    pub fn can_seek(&self) -> bool {
        self.can_seek
    }

    /// Always false. This filter exists because source seeks are expensive;
    /// advertising fast seeking would invite consumers to scan the stream
    /// as if they were free.
    pub fn can_fast_seek(&self) -> bool {
        false
    }

    /// A handle that can shut this reader down from another thread, e.g.
    /// while a `read` is blocked waiting for data.
    pub fn abort_handle(&self) -> AbortHandle<S::Error> {
        AbortHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: Source> Drop for RingReader<S> {
    fn drop(&mut self) {
        self.shared.abort();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("prefetch worker panicked");
            }
        }
    }
}

/// Shuts a [`RingReader`] down from outside the consumer thread.
///
/// Every blocked or future operation on the reader returns
/// [`ReadError::Aborted`] once [`abort`](AbortHandle::abort) was called.
pub struct AbortHandle<E> {
    shared: Arc<Shared<E>>,
}

impl<E> AbortHandle<E> {
    pub fn abort(&self) {
        self.shared.abort();
    }
}

impl<E> Clone for AbortHandle<E> {
    fn clone(&self) -> Self {
        AbortHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// The read-wait predicate shared by `read` and `peek`.
///
/// Waits until `want` bytes are buffered and no seek is pending, checking
/// the terminal conditions in a fixed order: abort, then a latched source
/// failure, then end of stream (which delivers whatever is buffered, unless
/// a pending seek is about to move the window). Each wait is bounded by the
/// poll interval so cancellation is observed within bounded time.
fn wait_for_data<'a, E: Error>(
    shared: &'a Shared<E>,
    state: &mut MutexGuard<'a, State<E>>,
    want: usize,
    max_buffer: usize,
    poll_interval: Duration,
) -> Result<usize, ReadError<E>> {
    // The worker never buffers more than `max_buffer` bytes, so a larger
    // request can only ever be served short.
    let want = want.min(max_buffer);

    let mut wait_start: Option<Instant> = None;
    loop {
        if !state.seek_requested && want <= state.buffer_size {
            break;
        }

        if state.abort {
            warn!("wait for {} bytes aborted", want);
            return Err(ReadError::Aborted);
        }

        if state.failed {
            return Err(match state.error.take() {
                Some(e) => ReadError::Source(e),
                None => ReadError::StreamFailed,
            });
        }

        // A pending seek is about to move the window and clear the end
        // state, so only report end of stream once no seek is in flight.
        if state.buffered_eos && !state.seek_requested {
            debug!(
                "end of stream at {} with {} bytes buffered",
                state.stream_offset, state.buffer_size
            );
            return Ok(state.buffer_size.min(want));
        }

        if wait_start.is_none() {
            debug!(
                "waiting for data: want {}, have {} (seek pending: {})",
                want, state.buffer_size, state.seek_requested
            );
            wait_start = Some(Instant::now());
        }

        // The worker may be parked on a full ring; nudge it unless it is
        // busy servicing a seek.
        if !state.seek_requested {
            shared.write_wake.notify_all();
        }

        shared.read_wake.wait_for(state, poll_interval);
    }

    if let Some(start) = wait_start {
        debug!("waited {} ms for data", start.elapsed().as_millis());
    }

    Ok(want)
}
