use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::shared::Shared;
use crate::{Source, StreamOptions};

/// The prefetch worker.
///
/// Owns the source exclusively and runs one outer loop: park at end of
/// stream, service a pending seek, fetch one step, store it into the ring.
/// All source I/O happens with the coordinator mutex released so the
/// consumer stays responsive while the source is slow.
pub(crate) struct PrefetchServer<S: Source> {
    source: S,
    shared: Arc<Shared<S::Error>>,

    stream_size: u64,
    capacity: usize,
    max_buffer: usize,
    rw_guard: usize,
    seek_guard: usize,
    long_seek_threshold: u64,
    poll_interval: Duration,

    step_buf: Vec<u8>,
}

impl<S: Source> PrefetchServer<S> {
    pub fn spawn(
        source: S,
        shared: Arc<Shared<S::Error>>,
        stream_size: u64,
        options: &StreamOptions,
    ) -> JoinHandle<()> {
        let server = PrefetchServer {
            source,
            shared,
            stream_size,
            capacity: options.capacity(),
            max_buffer: options.max_buffer(),
            rw_guard: options.rw_guard,
            seek_guard: options.seek_guard,
            long_seek_threshold: options.long_seek_threshold,
            poll_interval: options.poll_interval,
            step_buf: vec![0; options.step_read],
        };

        std::thread::spawn(move || server.run())
    }

    fn run(mut self) {
        debug!("prefetch worker running");

        loop {
            let at_end = self.source.tell() >= self.stream_size;

            {
                let mut state = self.shared.state.lock();
                if state.abort || state.failed {
                    break;
                }

                if at_end && !state.buffered_eos {
                    info!("buffered to end of stream at {}", self.stream_size);
                    state.buffered_eos = true;
                    self.shared.read_wake.notify_all();
                }

                // At end of stream there is nothing to fetch; park until a
                // seek request moves the window somewhere else.
                if state.buffered_eos {
                    while !state.abort && !state.failed && !state.seek_requested {
                        self.shared.write_wake.wait_for(&mut state, self.poll_interval);
                    }
                    if state.abort || state.failed {
                        break;
                    }
                    state.buffered_eos = false;
                }
            }

            if !self.service_seek() {
                break;
            }

            let count = match self.source.read(&mut self.step_buf) {
                Ok(count) => count,
                Err(e) => {
                    warn!("source read failed: {}", e);
                    self.fail(e);
                    break;
                }
            };

            if count > 0 && !self.store(count) {
                break;
            }

            if count < self.step_buf.len() {
                let position = self.source.tell();
                let mut state = self.shared.state.lock();
                if !state.buffered_eos {
                    if position < self.stream_size {
                        warn!(
                            "source ended early at {} of {}",
                            position, self.stream_size
                        );
                    }
                    state.buffered_eos = true;
                    self.shared.read_wake.notify_all();
                }
            }
        }

        // Leave a blocked consumer no reason to keep waiting: whatever is
        // still buffered is all there will ever be.
        let mut state = self.shared.state.lock();
        state.buffered_eos = true;
        self.shared.read_wake.notify_all();
        debug!("prefetch worker exiting");
    }

    /// Service a pending consumer seek, if any.
    ///
    /// The target is classified against the cached window every iteration,
    /// so a consumer re-seek during catch-up is picked up naturally. Returns
    /// false if the source seek failed and the worker must exit.
    fn service_seek(&mut self) -> bool {
        let target = {
            let mut state = self.shared.state.lock();
            if !state.seek_requested {
                return true;
            }

            let target = state.seek_pos;
            let cache_start = state.cache_offset;
            let cache_end = cache_start + state.cache_size as u64;

            if target < cache_start
                || target >= cache_end + self.long_seek_threshold
                || target >= self.stream_size
            {
                info!(
                    "long seek to {} outside cached [{}, {})",
                    target, cache_start, cache_end
                );
                target
            } else if target < cache_end {
                info!(
                    "short seek to {} inside cached [{}, {})",
                    target, cache_start, cache_end
                );
                let capacity = state.ring.capacity();
                let delta = (target - cache_start) as usize;
                state.read_idx = (state.cache_idx + delta) % capacity;
                state.buffer_size = (cache_end - target) as usize;
                state.stream_offset = target;
                state.seek_requested = false;
                self.shared.read_wake.notify_all();
                return true;
            } else {
                // Read through: sequential fetches will extend the cache
                // until the target becomes a short seek. The unread span is
                // dropped so the writer cannot fill up against a consumer
                // that is already waiting for post-seek data.
                debug!(
                    "middle seek to {} just past cached [{}, {}), reading through",
                    target, cache_start, cache_end
                );
                state.read_idx = state.write_idx;
                state.buffer_size = 0;
                return true;
            }
        };

        // Long seeks touch the source with the mutex released, so the
        // consumer can keep polling position() while the source repositions.
        if let Err(e) = self.source.seek(target) {
            warn!("source seek to {} failed: {}", target, e);
            self.fail(e);
            return false;
        }

        let mut state = self.shared.state.lock();
        let capacity = state.ring.capacity();
        let start_idx = (target % capacity as u64) as usize;
        state.cache_idx = start_idx;
        state.cache_size = 0;
        state.cache_offset = target;
        state.read_idx = start_idx;
        state.write_idx = start_idx;
        state.buffer_size = 0;
        state.stream_offset = target;
        // A consumer seek that landed while the source was repositioning
        // stays pending and is reclassified on the next iteration.
        if state.seek_pos == target {
            state.seek_requested = false;
        }

        true
    }

    /// Copy `count` fetched bytes into the ring, blocking while the ring is
    /// too full. Returns false if shut down while waiting.
    fn store(&mut self, count: usize) -> bool {
        let mut state = self.shared.state.lock();

        let mut wait_start: Option<Instant> = None;
        while state.buffer_size + count > self.max_buffer {
            if state.abort || state.failed {
                warn!("ring write of {} bytes interrupted", count);
                return false;
            }

            // A pending seek is about to invalidate the cached window, so
            // the seek guard no longer protects anything worth keeping; only
            // the read guard still has to hold.
            if state.seek_requested && state.buffer_size + count < self.capacity - self.rw_guard {
                debug!("writing {} bytes into the seek guard gap", count);
                break;
            }

            if wait_start.is_none() {
                debug!(
                    "ring full ({} bytes buffered), waiting for the consumer",
                    state.buffer_size
                );
                wait_start = Some(Instant::now());
            }

            self.shared.read_wake.notify_all();
            self.shared.write_wake.wait_for(&mut state, self.poll_interval);
        }

        if let Some(start) = wait_start {
            debug!("ring write resumed after {} ms", start.elapsed().as_millis());
        }

        let capacity = state.ring.capacity();
        debug_assert!(state.buffer_size + count <= capacity - self.rw_guard);

        let write_idx = state.write_idx;
        state.ring.copy_in(write_idx, &self.step_buf[..count]);
        state.write_idx = (write_idx + count) % capacity;
        state.buffer_size += count;
        state.cache_size += count;

        if state.cache_size > capacity {
            // Slide the cache base past the overshoot plus both guard gaps,
            // dropping the oldest seekable history.
            let slide = state.cache_size - capacity + self.rw_guard + self.seek_guard;
            state.cache_offset += slide as u64;
            state.cache_size -= slide;
            state.cache_idx = (state.cache_idx + slide) % capacity;
        }

        if !state.seek_requested {
            self.shared.read_wake.notify_all();
        }

        true
    }

    fn fail(&self, error: S::Error) {
        let mut state = self.shared.state.lock();
        state.error = Some(error);
        state.failed = true;
        self.shared.read_wake.notify_all();
    }
}
