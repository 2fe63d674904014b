//! The ordered quit sequence shared by the dashboard and standalone runners.

use crate::error::Result;
use crate::supervisor::Supervisor;
use crate::tunnel::TunnelCloser;
use crate::watcher::Watcher;

/// Tears the session down: stop watching, terminate the child, release the
/// tunnel pool, in that order.
///
/// Every step is a no-op for a component that was never started, so the
/// sequence is safe to run from any point of the startup path. The tunnel is
/// always released, even when stopping the child fails.
///
/// # Errors
///
/// Returns an error if the child could not be stopped cleanly.
pub async fn shutdown(
    watcher: &mut Watcher,
    supervisor: &Supervisor,
    closer: Option<TunnelCloser>,
) -> Result<()> {
    watcher.close();
    let stopped = supervisor.stop().await;
    if let Some(closer) = closer {
        closer.close();
    }
    stopped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::Status;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_shutdown_with_nothing_started() {
        let (log_tx, _log_rx) = mpsc::unbounded_channel();
        let supervisor = Supervisor::new(log_tx);
        let (mut watcher, _activity_rx) = Watcher::new(false);

        // No tunnel, no child, watcher never started: every step must be a
        // no-op, and running the sequence twice must be just as harmless.
        shutdown(&mut watcher, &supervisor, None).await.unwrap();
        shutdown(&mut watcher, &supervisor, None).await.unwrap();
        assert_eq!(supervisor.status(), Status::Idle);
    }

    #[tokio::test]
    async fn test_shutdown_stops_child_and_watcher() {
        let dir = tempfile::tempdir().unwrap();
        let (log_tx, _log_rx) = mpsc::unbounded_channel();
        let supervisor = Supervisor::new(log_tx);
        let (mut watcher, mut activity_rx) = Watcher::new(true);
        watcher.start(dir.path()).unwrap();

        let runner = supervisor.clone();
        let command = vec!["sleep".to_string(), "30".to_string()];
        let run = tokio::spawn(async move { runner.run(&command).await });
        timeout(Duration::from_secs(5), async {
            while supervisor.status() != Status::Running {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        shutdown(&mut watcher, &supervisor, None).await.unwrap();
        run.await.unwrap().unwrap();
        assert_eq!(supervisor.status(), Status::Exited);

        // The watch loop is gone, so later filesystem activity never
        // becomes a signal.
        std::fs::write(dir.path().join("late.txt"), b"late").unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(activity_rx.try_recv().is_err());
    }
}
