//! Streams a local file through the ring buffer over an artificially slow
//! source, then seeks backward to show the cache being hit.
//!
//! ```text
//! RUST_LOG=debug cargo run -- --ring-buffer --latency 30 some_file
//! ```

use std::process::exit;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Arg, Command};
use log::{error, info};

use eddy::{FileSource, RingReader, Source, StreamOptions};

/// Wraps a file in a fixed per-request delay, imitating a remote stream.
struct ThrottledSource {
    inner: FileSource,
    latency: Duration,
}

impl Source for ThrottledSource {
    type Error = std::io::Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, std::io::Error> {
        thread::sleep(self.latency);
        self.inner.read(buf)
    }

    fn seek(&mut self, offset: u64) -> Result<(), std::io::Error> {
        // Remote seeks are the expensive operation this filter exists to
        // avoid; make them hurt accordingly.
        thread::sleep(self.latency * 10);
        self.inner.seek(offset)
    }

    fn tell(&self) -> u64 {
        self.inner.tell()
    }

    fn size(&self) -> Option<u64> {
        self.inner.size()
    }

    fn can_seek(&self) -> bool {
        self.inner.can_seek()
    }
}

fn main() {
    pretty_env_logger::init();

    let matches = Command::new("eddy demo reader")
        .about("Stream a file through the prefetching ring buffer")
        .arg(
            Arg::new("ring-buffer")
                .long("ring-buffer")
                .help("Enable the ring buffer (off by default, like the original filter)"),
        )
        .arg(
            Arg::new("latency")
                .long("latency")
                .value_name("MS")
                .takes_value(true)
                .default_value("30")
                .help("Simulated source latency per request, in milliseconds"),
        )
        .arg(
            Arg::new("INPUT")
                .help("The input file path")
                .required(true)
                .index(1),
        )
        .get_matches();

    let path = matches.value_of("INPUT").unwrap();
    let latency: u64 = match matches.value_of("latency").unwrap().parse() {
        Ok(ms) => ms,
        Err(_) => {
            error!("--latency expects a number of milliseconds");
            exit(1);
        }
    };

    let inner = match FileSource::open(path) {
        Ok(source) => source,
        Err(e) => {
            error!("failed to open {}: {}", path, e);
            exit(1);
        }
    };
    let source = ThrottledSource {
        inner,
        latency: Duration::from_millis(latency),
    };

    if matches.is_present("ring-buffer") {
        buffered_read(source);
    } else {
        info!("ring buffer disabled, reading the source directly");
        direct_read(source);
    }
}

fn buffered_read(source: ThrottledSource) {
    let mut reader = match RingReader::new(source, StreamOptions::default()) {
        Ok(reader) => reader,
        Err(e) => {
            error!("cannot buffer this source: {}", e);
            exit(1);
        }
    };

    let size = reader.size();
    info!("streaming {} bytes through the ring buffer", size);

    let mut chunk = vec![0u8; 64 * 1024];
    let started = Instant::now();
    let mut total = 0u64;
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(count) => total += count as u64,
            Err(e) => {
                error!("read failed: {}", e);
                exit(1);
            }
        }
    }
    report("sequential read", total, started.elapsed());

    // Seek a quarter of the file back: this lands in the cached window and
    // never reaches the (slow) source.
    let target = size.saturating_sub(size / 4);
    let started = Instant::now();
    if let Err(e) = reader.seek(target) {
        error!("seek failed: {}", e);
        exit(1);
    }
    match reader.read(&mut chunk) {
        Ok(count) => {
            info!(
                "backward seek to {} served {} bytes in {} ms",
                target,
                count,
                started.elapsed().as_millis()
            );
        }
        Err(e) => {
            error!("read after seek failed: {}", e);
            exit(1);
        }
    }
}

fn direct_read(mut source: ThrottledSource) {
    let mut chunk = vec![0u8; 64 * 1024];
    let started = Instant::now();
    let mut total = 0u64;
    loop {
        match source.read(&mut chunk) {
            Ok(0) => break,
            Ok(count) => total += count as u64,
            Err(e) => {
                error!("read failed: {}", e);
                exit(1);
            }
        }
    }
    report("sequential read", total, started.elapsed());
}

fn report(label: &str, total: u64, elapsed: Duration) {
    let rate = total as f64 / 1_000_000.0 / elapsed.as_secs_f64().max(0.001);
    info!(
        "{}: {} bytes in {} ms ({:.1} MB/s)",
        label,
        total,
        elapsed.as_millis(),
        rate
    );
}
