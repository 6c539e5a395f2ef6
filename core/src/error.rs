use std::error::Error;

/// Errors returned when opening a [`RingReader`](crate::RingReader).
#[derive(Debug)]
pub enum OpenError {
    /// The source did not report a positive total size. The buffering
    /// protocol needs to know where the stream ends, so such sources are
    /// refused and should be read directly instead.
    UnknownSize,
}

impl Error for OpenError {}

impl std::fmt::Display for OpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenError::UnknownSize => {
                write!(f, "The source stream has an unknown or zero size")
            }
        }
    }
}

/// Errors returned by [`RingReader`](crate::RingReader) operations.
///
/// Reaching the end of the stream is *not* an error: `read` and `peek`
/// report it as a short (possibly zero) byte count.
#[derive(Debug)]
pub enum ReadError<E: Error> {
    /// The stream was shut down while the operation was blocked.
    Aborted,
    /// The source failed. Delivered once; later calls return
    /// [`StreamFailed`](ReadError::StreamFailed).
    Source(E),
    /// A source failure was already reported by an earlier call. The stream
    /// is unusable; close and reopen it.
    StreamFailed,
    /// The source does not support seeking.
    NotSeekable,
    /// The peek scratch buffer could not be grown.
    OutOfMemory,
}

impl<E: Error> Error for ReadError<E> {}

impl<E: Error> std::fmt::Display for ReadError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadError::Aborted => write!(f, "The stream was shut down"),
            ReadError::Source(e) => write!(f, "Source error: {}", e),
            ReadError::StreamFailed => {
                write!(f, "The source failed earlier and the stream is dead")
            }
            ReadError::NotSeekable => write!(f, "The source does not support seeking"),
            ReadError::OutOfMemory => write!(f, "Failed to grow the peek buffer"),
        }
    }
}
