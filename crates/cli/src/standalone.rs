//! Headless mode for process managers: no dashboard, child output goes to
//! stdout, internal logging to `env_logger` on stderr.
//!
//! Signals replace the keyboard: SIGHUP restarts the command, SIGUSR1 and
//! SIGUSR2 print the public URL, SIGINT and SIGTERM quit.

use std::path::Path;

use log::{error, info};
use tokio::sync::{mpsc, oneshot};

use burrow_core::config::Config;
use burrow_core::error::{Error, Result};
use burrow_core::logs::LogLine;
use burrow_core::proxy::Proxy;
use burrow_core::shutdown::shutdown;
use burrow_core::supervisor::Supervisor;
use burrow_core::tunnel::Tunnel;
use burrow_core::watcher::Watcher;

/// What an incoming process signal asks for.
enum Control {
    Quit,
    Restart,
    PrintAddress,
}

/// Runs headless until a quit signal arrives or the tunnel fails.
///
/// # Errors
///
/// Returns an error if the tunnel cannot be established or dies while
/// serving.
pub async fn run(config: Config) -> Result<()> {
    let (log_tx, mut log_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(LogLine { source, text }) = log_rx.recv().await {
            println!("[{source}] {text}");
        }
    });

    let supervisor = Supervisor::new(log_tx);
    let (mut watcher, mut activity_rx) = Watcher::new(config.watch);

    let client = reqwest::Client::new();
    let tunnel = Tunnel::open(&client, &config.server_base_url).await?;
    let public_url = tunnel.url().to_string();
    let closer = tunnel.closer();
    info!("Tunnel ready at {public_url}");
    info!("Forwarding tunnel traffic to {}", config.listen_url());
    // A watch registration failure is not worth dying for; SIGHUP still
    // restarts by hand.
    if let Err(err) = watcher.start(Path::new(".")) {
        error!("{err}");
    }

    let proxy = Proxy::new(client, &config);
    let (serve_tx, mut serve_rx) = oneshot::channel();
    tokio::spawn(async move {
        let _ = serve_tx.send(tunnel.serve(proxy).await);
    });

    let command = config.command.clone();
    spawn_restart(&supervisor, command.clone());

    let mut control_rx = spawn_signal_listeners()?;
    let outcome = loop {
        tokio::select! {
            control = control_rx.recv() => {
                match control {
                    Some(Control::Quit) | None => {
                        info!("Shutting down");
                        break Ok(());
                    }
                    Some(Control::Restart) => {
                        info!("Restart requested, restarting: {}", command.join(" "));
                        spawn_restart(&supervisor, command.clone());
                    }
                    Some(Control::PrintAddress) => {
                        info!("Tunnel address: {public_url}");
                    }
                }
            }
            activity = activity_rx.recv() => {
                match activity {
                    Some(()) => {
                        info!("Change detected, restarting: {}", command.join(" "));
                        spawn_restart(&supervisor, command.clone());
                    }
                    None => break Err(Error::ChannelClosed("watcher activity")),
                }
            }
            served = &mut serve_rx => {
                served.map_err(|_| Error::ChannelClosed("tunnel serving"))??;
                break Err(Error::TunnelWorker("tunnel closed unexpectedly".to_string()));
            }
        }
    };

    shutdown(&mut watcher, &supervisor, Some(closer)).await?;
    outcome
}

fn spawn_restart(supervisor: &Supervisor, command: Vec<String>) {
    let supervisor = supervisor.clone();
    tokio::spawn(async move {
        if let Err(err) = supervisor.restart(&command).await {
            error!("{err}");
        }
    });
}

/// Spawns one forwarding task per signal and returns the merged stream.
#[cfg(unix)]
fn spawn_signal_listeners() -> Result<mpsc::UnboundedReceiver<Control>> {
    use tokio::signal::unix::{signal, SignalKind};

    let (tx, rx) = mpsc::unbounded_channel();

    let interrupt = tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = interrupt.send(Control::Quit);
        }
    });

    let listeners: [(SignalKind, fn() -> Control); 4] = [
        (SignalKind::terminate(), || Control::Quit),
        (SignalKind::hangup(), || Control::Restart),
        (SignalKind::user_defined1(), || Control::PrintAddress),
        (SignalKind::user_defined2(), || Control::PrintAddress),
    ];
    for (kind, control) in listeners {
        let mut stream = signal(kind)?;
        let tx = tx.clone();
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                if tx.send(control()).is_err() {
                    return;
                }
            }
        });
    }
    Ok(rx)
}

#[cfg(not(unix))]
fn spawn_signal_listeners() -> Result<mpsc::UnboundedReceiver<Control>> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(Control::Quit);
        }
    });
    Ok(rx)
}
