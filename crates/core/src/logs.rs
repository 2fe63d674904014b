//! Log multiplexing: tagged lines from several byte streams fanned into one
//! bounded, renderable buffer.
//!
//! Each byte stream (child stdout, child stderr, the internal logger) gets a
//! dedicated reader task that republishes newline-terminated lines on a
//! channel. The event loop consumes one line at a time, so ordering within a
//! source is preserved while interleaving across sources is arrival order.

use std::collections::VecDeque;
use std::fmt;

use log::error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc::UnboundedSender;

/// Maximum number of lines retained for display.
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// Where a log line originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    Stdout,
    Stderr,
    Internal,
}

impl LogSource {
    pub fn label(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::Internal => "burrow",
        }
    }
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One line of output, tagged with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub source: LogSource,
    pub text: String,
}

impl LogLine {
    pub fn new(source: LogSource, text: impl Into<String>) -> Self {
        Self {
            source,
            text: text.into(),
        }
    }
}

/// Bounded, append-only line buffer with FIFO eviction.
#[derive(Debug)]
pub struct LogBuffer {
    lines: VecDeque<LogLine>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY)),
            capacity,
        }
    }

    /// Appends a line, evicting the oldest line when at capacity.
    pub fn push(&mut self, line: LogLine) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

/// Spawns a task that reads `reader` line by line and republishes each line on
/// `tx`, tagged with `source`.
///
/// The task ends silently on end-of-stream or when the receiving side is gone;
/// a read error is logged and ends the task without propagating further.
pub fn spawn_line_reader<R>(source: LogSource, reader: R, tx: UnboundedSender<LogLine>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(text)) => {
                    if tx.send(LogLine::new(source, text)).is_err() {
                        return;
                    }
                }
                Ok(None) => return,
                Err(err) => {
                    error!("Error reading {source}: {err}");
                    return;
                }
            }
        }
    });
}
