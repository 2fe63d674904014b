//! Filesystem watching with debounce.
//!
//! A recursive watch on the working directory produces raw events; the
//! debounce stage collapses any burst into a single activity signal, emitted
//! one quiet window after the last event. The event loop treats each signal as
//! a restart request.

use std::path::Path;
use std::time::Duration;

use log::{debug, error, info};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::time::{sleep_until, Instant};

use crate::error::Result;

/// Quiet window required before an activity signal fires.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(250);

/// Watches a directory tree and reports debounced activity.
pub struct Watcher {
    enabled: bool,
    activity_tx: UnboundedSender<()>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Watcher {
    /// Returns a watcher and the receiver its activity signals arrive on.
    ///
    /// A disabled watcher never signals; the receiver stays silent forever.
    pub fn new(enabled: bool) -> (Self, UnboundedReceiver<()>) {
        let (activity_tx, activity_rx) = mpsc::unbounded_channel();
        (
            Self {
                enabled,
                activity_tx,
                shutdown: None,
            },
            activity_rx,
        )
    }

    /// Starts watching `path` recursively.
    ///
    /// # Errors
    ///
    /// Returns an error if the filesystem watch cannot be registered.
    pub fn start(&mut self, path: &Path) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    let _ = raw_tx.send(event);
                }
                Err(err) => error!("Error watching for changes: {err}"),
            },
            notify::Config::default(),
        )?;
        watcher.watch(path, RecursiveMode::Recursive)?;
        info!("Watching {} for changes", path.display());

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown = Some(shutdown_tx);

        let activity_tx = self.activity_tx.clone();
        tokio::spawn(async move {
            // Keep the OS watch registered for as long as the task runs.
            let _watcher = watcher;
            debounce(raw_rx, activity_tx, DEBOUNCE_WINDOW, shutdown_rx).await;
        });
        Ok(())
    }

    /// Stops watching. Safe to call more than once, or on a watcher that was
    /// never started.
    pub fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// Collapses bursts of raw events into single activity signals.
///
/// Each raw event restarts the quiet-window timer; the signal fires only once
/// the window elapses with no further events. The loop ends when `shutdown`
/// resolves or the raw stream closes.
async fn debounce<E>(
    mut raw_rx: UnboundedReceiver<E>,
    activity_tx: UnboundedSender<()>,
    window: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut deadline: Option<Instant> = None;
    loop {
        tokio::select! {
            event = raw_rx.recv() => {
                if event.is_none() {
                    return;
                }
                debug!("Filesystem activity detected");
                deadline = Some(Instant::now() + window);
            }
            () = async {
                match deadline {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending().await,
                }
            } => {
                deadline = None;
                if activity_tx.send(()).is_err() {
                    return;
                }
            }
            _ = &mut shutdown => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, Duration};

    fn harness() -> (
        UnboundedSender<u32>,
        UnboundedReceiver<()>,
        oneshot::Sender<()>,
    ) {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (activity_tx, activity_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(debounce(
            raw_rx,
            activity_tx,
            Duration::from_millis(250),
            shutdown_rx,
        ));
        (raw_tx, activity_rx, shutdown_tx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_event_signals_after_quiet_window() {
        let (raw_tx, mut activity_rx, _shutdown) = harness();
        raw_tx.send(1).unwrap();

        advance(Duration::from_millis(249)).await;
        assert!(activity_rx.try_recv().is_err());

        advance(Duration::from_millis(2)).await;
        activity_rx.recv().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_into_one_signal() {
        let (raw_tx, mut activity_rx, _shutdown) = harness();
        for offset in [0, 50, 100, 300] {
            raw_tx.send(offset).unwrap();
            advance(Duration::from_millis(50)).await;
        }

        // The window restarts on every event, so the one signal lands a full
        // quiet window after the last event.
        advance(Duration::from_millis(300)).await;
        activity_rx.recv().await.unwrap();
        assert!(activity_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_signal_separately() {
        let (raw_tx, mut activity_rx, _shutdown) = harness();

        raw_tx.send(1).unwrap();
        advance(Duration::from_millis(300)).await;
        activity_rx.recv().await.unwrap();

        raw_tx.send(2).unwrap();
        advance(Duration::from_millis(300)).await;
        activity_rx.recv().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_events_never_signals() {
        let (_raw_tx, mut activity_rx, _shutdown) = harness();
        advance(Duration::from_secs(60)).await;
        assert!(activity_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_discards_pending_window() {
        let (raw_tx, mut activity_rx, shutdown) = harness();
        raw_tx.send(1).unwrap();
        advance(Duration::from_millis(100)).await;

        shutdown.send(()).unwrap();
        advance(Duration::from_secs(1)).await;
        // The loop exited, so the pending signal never fires and the channel
        // closes instead.
        assert!(activity_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_watch_registration_failure_is_reported() {
        let (mut watcher, _activity_rx) = Watcher::new(true);
        // Callers log this error and keep running; it must come back as a
        // value, not kill anything.
        assert!(watcher.start(Path::new("/nonexistent-path")).is_err());
        watcher.close();
    }

    #[tokio::test]
    async fn test_disabled_watcher_does_not_register_a_watch() {
        let (mut watcher, mut activity_rx) = Watcher::new(false);
        watcher.start(Path::new("/nonexistent-path")).unwrap();
        watcher.close();
        drop(watcher);
        assert!(activity_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_fs_activity_produces_signal() {
        let dir = tempfile::tempdir().unwrap();
        let (mut watcher, mut activity_rx) = Watcher::new(true);
        watcher.start(dir.path()).unwrap();

        std::fs::write(dir.path().join("touched.txt"), b"hello").unwrap();
        tokio::time::timeout(Duration::from_secs(5), activity_rx.recv())
            .await
            .expect("expected activity within the timeout")
            .unwrap();
        watcher.close();
    }
}
