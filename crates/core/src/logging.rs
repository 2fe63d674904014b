//! A `log` backend that feeds the dashboard's log pane.
//!
//! In dashboard mode every `log` record becomes an [`LogLine`] tagged
//! [`LogSource::Internal`] and travels over the same channel as child process
//! output, so internal diagnostics and process output share one ordered view.
//! Standalone mode installs `env_logger` instead.

use chrono::Local;
use log::{LevelFilter, Metadata, Record};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::Result;
use crate::logs::{LogLine, LogSource};

/// Forwards log records as internal log lines over a channel.
pub struct PaneLogger {
    tx: UnboundedSender<LogLine>,
    level: LevelFilter,
}

impl PaneLogger {
    fn new(tx: UnboundedSender<LogLine>) -> Self {
        Self {
            tx,
            level: LevelFilter::Info,
        }
    }

    /// Installs a `PaneLogger` as the global logger.
    ///
    /// # Errors
    ///
    /// Returns an error if a global logger is already installed.
    pub fn install(tx: UnboundedSender<LogLine>) -> Result<()> {
        let logger = Self::new(tx);
        log::set_max_level(logger.level);
        log::set_boxed_logger(Box::new(logger))?;
        Ok(())
    }
}

impl log::Log for PaneLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let text = format!(
            "{} {:<5} {}",
            Local::now().format("%H:%M:%S"),
            record.level(),
            record.args()
        );
        // The receiver outlives the loop; a send failure just means we are
        // shutting down.
        let _ = self.tx.send(LogLine::new(LogSource::Internal, text));
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::{Level, Log};
    use tokio::sync::mpsc;

    fn record(level: Level, message: &str) -> String {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let logger = PaneLogger::new(tx);
        logger.log(
            &Record::builder()
                .level(level)
                .args(format_args!("{message}"))
                .build(),
        );
        rx.try_recv().expect("expected a log line").text
    }

    #[test]
    fn test_records_become_internal_lines() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let logger = PaneLogger::new(tx);
        logger.log(
            &Record::builder()
                .level(Level::Info)
                .args(format_args!("listener ready"))
                .build(),
        );

        let line = rx.try_recv().unwrap();
        assert_eq!(line.source, LogSource::Internal);
        assert!(line.text.ends_with("listener ready"));
    }

    #[test]
    fn test_line_carries_level() {
        assert!(record(Level::Error, "boom").contains("ERROR"));
        assert!(record(Level::Info, "fine").contains("INFO"));
    }
}
