//! Newline-delimited JSON packet record input.
//!
//! Each non-blank line is one `PacketRecord`:
//!
//! ```text
//! {"timestamp":{"secs_since_epoch":1700000000,"nanos_since_epoch":0},"src_ip":"198.51.100.9","dst_ip":"10.0.0.1","src_port":40000,"dst_port":53,"protocol":"UDP","size":64,"flags":"","payload_size":36}
//! ```
//!
//! Malformed lines are logged, counted and skipped so one bad record never
//! aborts the replay.

use std::io;
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::warn;

use ironwall_core::metrics as m;
use ironwall_core::types::PacketRecord;

/// Boxed line source (file or stdin).
pub type InputSource = Box<dyn AsyncBufRead + Unpin + Send>;

/// Default delay between end-of-input polls in follow mode.
const FOLLOW_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Opens `path` for reading, or stdin when `path` is `"-"`.
pub async fn open(path: &str) -> io::Result<InputSource> {
    if path == "-" {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let file = tokio::fs::File::open(Path::new(path)).await?;
    Ok(Box::new(BufReader::new(file)))
}

/// Reads `PacketRecord`s line by line.
pub struct PacketReader<R> {
    source: R,
    line: String,
    line_no: u64,
    skipped: u64,
    follow: bool,
    poll_interval: Duration,
}

impl<R: AsyncBufRead + Unpin> PacketReader<R> {
    /// Creates a reader that stops at end of input.
    pub fn new(source: R) -> Self {
        Self {
            source,
            line: String::new(),
            line_no: 0,
            skipped: 0,
            follow: false,
            poll_interval: FOLLOW_POLL_INTERVAL,
        }
    }

    /// Keep polling for new lines at end of input.
    pub fn follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    /// Sets the end-of-input poll interval used in follow mode.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Returns the next valid record, or `None` at end of input.
    ///
    /// In follow mode this only returns `None` if the source fails.
    pub async fn next_record(&mut self) -> io::Result<Option<PacketRecord>> {
        loop {
            self.line.clear();
            let read = self.source.read_line(&mut self.line).await?;
            if read == 0 {
                if self.follow {
                    tokio::time::sleep(self.poll_interval).await;
                    continue;
                }
                return Ok(None);
            }
            self.line_no += 1;

            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match parse_record(trimmed) {
                Ok(record) => return Ok(Some(record)),
                Err(e) => {
                    self.skipped += 1;
                    metrics::counter!(m::DAEMON_INPUT_ERRORS_TOTAL).increment(1);
                    warn!(line = self.line_no, error = %e, "skipping malformed packet record");
                }
            }
        }
    }

    /// Number of malformed lines skipped so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Number of lines read so far.
    pub fn lines_read(&self) -> u64 {
        self.line_no
    }
}

/// Parses one JSON line into a `PacketRecord`.
pub fn parse_record(line: &str) -> Result<PacketRecord, serde_json::Error> {
    serde_json::from_str(line)
}
