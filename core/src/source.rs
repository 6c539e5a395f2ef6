use std::error::Error;

/// A byte stream that a [`RingReader`](crate::RingReader) can wrap.
///
/// The worker thread owns the source exclusively; implementations do not
/// need any internal synchronization.
pub trait Source: Send + 'static {
    /// The error type for fatal stream failures.
    type Error: Error + Send;

    /// Read up to `buf.len()` bytes from the current position, returning the
    /// number of bytes read. A count smaller than requested signals the end
    /// of the stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Reposition the stream to `offset` bytes from its start.
    ///
    /// Only called when [`can_seek`](Source::can_seek) returns true.
    fn seek(&mut self, offset: u64) -> Result<(), Self::Error>;

    /// The current absolute read position.
    fn tell(&self) -> u64;

    /// The total length of the stream in bytes, if known.
    ///
    /// Streams that cannot report a size are refused at open time; the
    /// buffering protocol needs to know where the end is.
    fn size(&self) -> Option<u64>;

    /// Whether [`seek`](Source::seek) is supported.
    fn can_seek(&self) -> bool;

    /// Whether seeking is cheap for this source (e.g. a local file).
    fn can_fast_seek(&self) -> bool {
        false
    }
}
