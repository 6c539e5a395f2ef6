#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(clippy::clone_on_ref_ptr)]
#![deny(trivial_numeric_casts)]

//! A local-file [`Source`] for eddy.
//!
//! Mostly useful for tests and demos: local files rarely need read-ahead
//! buffering, but they are the easiest way to exercise a
//! [`RingReader`](eddy_core::RingReader) end to end.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use log::debug;

use eddy_core::Source;

/// A [`Source`] backed by a local file.
pub struct FileSource {
    file: File,
    len: u64,
    pos: u64,
}

impl FileSource {
    /// Open the file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<FileSource> {
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        debug!("opened {} ({} bytes)", path.as_ref().display(), len);

        Ok(FileSource { file, len, pos: 0 })
    }
}

impl Source for FileSource {
    type Error = std::io::Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, std::io::Error> {
        // The source contract reserves short counts for the end of the
        // stream, so keep reading until the buffer is full or the file ends.
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(count) => filled += count,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        self.pos += filled as u64;
        Ok(filled)
    }

    fn seek(&mut self, offset: u64) -> Result<(), std::io::Error> {
        self.pos = self.file.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn size(&self) -> Option<u64> {
        Some(self.len)
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn can_fast_seek(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;
    use std::time::Duration;

    use eddy_core::{RingReader, StreamOptions};

    fn pattern_file(len: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..len).map(|i| (i % 256) as u8).collect();
        file.write_all(&data).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn reads_and_seeks() {
        let file = pattern_file(64 * 1024);
        let mut source = FileSource::open(file.path()).unwrap();

        assert_eq!(source.size(), Some(64 * 1024));
        assert!(source.can_seek());

        let mut buf = [0u8; 100];
        assert_eq!(source.read(&mut buf).unwrap(), 100);
        assert_eq!(buf[0], 0);
        assert_eq!(source.tell(), 100);

        source.seek(1000).unwrap();
        assert_eq!(source.read(&mut buf).unwrap(), 100);
        assert_eq!(buf[0], (1000 % 256) as u8);
    }

    #[test]
    fn short_read_at_end_of_file() {
        let file = pattern_file(130);
        let mut source = FileSource::open(file.path()).unwrap();

        let mut buf = [0u8; 100];
        assert_eq!(source.read(&mut buf).unwrap(), 100);
        assert_eq!(source.read(&mut buf).unwrap(), 30);
        assert_eq!(source.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn streams_through_the_ring_reader() {
        let file = pattern_file(48 * 1024);
        let source = FileSource::open(file.path()).unwrap();

        let options = StreamOptions {
            block_size: 4096,
            num_blocks: 4,
            rw_guard: 64,
            seek_guard: 1024,
            long_seek_threshold: 2048,
            step_read: 512,
            poll_interval: Duration::from_millis(25),
        };
        let mut reader = RingReader::new(source, options).unwrap();

        let mut buf = [0u8; 1024];
        assert_eq!(reader.read(&mut buf).unwrap(), 1024);
        assert_eq!(buf[5], 5);

        reader.seek(40 * 1024).unwrap();
        assert_eq!(reader.read(&mut buf).unwrap(), 1024);
        assert_eq!(buf[0], ((40 * 1024) % 256) as u8);

        // Local files claim fast seeking; the filter still hides it.
        assert!(!reader.can_fast_seek());
    }
}
