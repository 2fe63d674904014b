//! Process supervision: start, stop and restart one child command at a time.
//!
//! The child runs in its own process group so the whole subtree can be
//! signaled together. Its stdout and stderr are piped into tagged line
//! readers, and its exit is awaited by the task that started it, which is the
//! only place the child is reaped.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use parking_lot::Mutex;
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::watch;
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::logs::{spawn_line_reader, LogLine, LogSource};

/// Grace window between the terminate signal and the kill escalation.
const KILL_ESCALATION: Duration = Duration::from_millis(200);

/// Lifecycle of the supervised command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Starting,
    Running,
    Stopping,
    Exited,
}

struct Shared {
    /// Process-group id of the running child, cleared once the child exits.
    pgid: Mutex<Option<i32>>,
    status: watch::Sender<Status>,
}

/// Owns the lifecycle of one child command at a time.
///
/// Cloning is cheap; clones share the same child. At most one [`run`] may be
/// in flight per supervisor, and callers serialize a new start after a prior
/// [`stop`] by using [`restart`].
///
/// [`run`]: Supervisor::run
/// [`stop`]: Supervisor::stop
/// [`restart`]: Supervisor::restart
#[derive(Clone)]
pub struct Supervisor {
    log_tx: UnboundedSender<LogLine>,
    shared: Arc<Shared>,
}

impl Supervisor {
    /// Returns a new supervisor publishing child output on `log_tx`.
    pub fn new(log_tx: UnboundedSender<LogLine>) -> Self {
        let (status, _) = watch::channel(Status::Idle);
        Self {
            log_tx,
            shared: Arc::new(Shared {
                pgid: Mutex::new(None),
                status,
            }),
        }
    }

    pub fn status(&self) -> Status {
        *self.shared.status.borrow()
    }

    /// Runs the command, blocking the calling task until the process exits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyCommand`] for an empty spec, [`Error::Spawn`] if
    /// the process cannot be started, and [`Error::StartOverlap`] if another
    /// run is still in flight.
    pub async fn run(&self, spec: &[String]) -> Result<()> {
        let Some((program, args)) = spec.split_first() else {
            return Err(Error::EmptyCommand);
        };
        // Claiming Starting must be one atomic step with the check, or two
        // concurrent runs could both pass the guard.
        let claimed = self.shared.status.send_if_modified(|status| {
            if matches!(*status, Status::Idle | Status::Exited) {
                *status = Status::Starting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(Error::StartOverlap);
        }
        info!("Starting new process: {}", spec.join(" "));

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        command.process_group(0);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(original) => {
                self.shared.status.send_replace(Status::Idle);
                return Err(Error::spawn_error(program.clone(), original));
            }
        };

        if let Some(stdout) = child.stdout.take() {
            spawn_line_reader(LogSource::Stdout, stdout, self.log_tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_reader(LogSource::Stderr, stderr, self.log_tx.clone());
        }

        // The child leads its own process group, so its pid doubles as pgid.
        *self.shared.pgid.lock() = child.id().map(|pid| pid as i32);
        self.shared.status.send_replace(Status::Running);

        let exit = child.wait().await;
        *self.shared.pgid.lock() = None;
        self.shared.status.send_replace(Status::Exited);

        match exit {
            Ok(status) => {
                info!("Process exited: {program} ({status})");
                Ok(())
            }
            Err(original) => Err(Error::SubProcess(original)),
        }
    }

    /// Stops the running process group and waits for the process to be
    /// reaped. No-op when nothing is running.
    ///
    /// The group first receives a terminate signal; if the process has not
    /// exited within a short grace window it is killed. A delivery failure is
    /// reported but treated as success, since the target may have already
    /// exited on its own.
    pub async fn stop(&self) -> Result<()> {
        let pgid = self.shared.pgid.lock().take();
        let Some(pgid) = pgid else {
            return Ok(());
        };
        // The child can beat us here with a natural exit: once the run task
        // has published Exited there is nothing left to signal or wait for,
        // and overwriting the status would wait forever.
        let stopping = self.shared.status.send_if_modified(|status| {
            if matches!(*status, Status::Starting | Status::Running) {
                *status = Status::Stopping;
                true
            } else {
                false
            }
        });
        if !stopping {
            return Ok(());
        }

        signal_group(pgid, Signal::Terminate);
        let mut status_rx = self.shared.status.subscribe();
        if timeout(KILL_ESCALATION, wait_exited(&mut status_rx))
            .await
            .is_err()
        {
            signal_group(pgid, Signal::Kill);
            wait_exited(&mut status_rx).await?;
        }
        Ok(())
    }

    /// Defensive cleanup for a process group already marked exited; no-op
    /// otherwise.
    pub fn kill(&self) {
        if self.status() != Status::Exited {
            return;
        }
        if let Some(pgid) = *self.shared.pgid.lock() {
            signal_group(pgid, Signal::Kill);
        }
    }

    /// Stops the current process, waits for completion, then starts `spec`.
    ///
    /// Strictly sequential, so two processes never race for the same port.
    pub async fn restart(&self, spec: &[String]) -> Result<()> {
        self.stop().await?;
        self.run(spec).await
    }
}

async fn wait_exited(status_rx: &mut watch::Receiver<Status>) -> Result<()> {
    while !matches!(*status_rx.borrow_and_update(), Status::Exited | Status::Idle) {
        status_rx
            .changed()
            .await
            .map_err(|_| Error::ChannelClosed("supervisor status"))?;
    }
    Ok(())
}

enum Signal {
    Terminate,
    Kill,
}

#[cfg(unix)]
fn signal_group(pgid: i32, signal: Signal) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal as NixSignal};
    use nix::unistd::Pid;

    let signal = match signal {
        Signal::Terminate => NixSignal::SIGTERM,
        Signal::Kill => NixSignal::SIGKILL,
    };
    match killpg(Pid::from_raw(pgid), signal) {
        // Already gone counts as delivered.
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => warn!("Error trying to stop process group {pgid}: {err}"),
    }
}

#[cfg(not(unix))]
fn signal_group(_pgid: i32, _signal: Signal) {}
