//! The dashboard event loop.
//!
//! Terminal input is read on a dedicated thread and republished as events,
//! while everything else (child output, internal logs, tunnel establishment,
//! filesystem activity) arrives over channels. One `select!` loop owns all
//! state, so no mutation ever races.

use std::io::{stdout, Stdout};
use std::path::Path;
use std::time::Duration;

use crossterm::event::{Event, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{event, execute};
use log::{error, info};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::{mpsc, oneshot};

use burrow_core::config::Config;
use burrow_core::error::{Error, Result};
use burrow_core::logging::PaneLogger;
use burrow_core::proxy::Proxy;
use burrow_core::shutdown::shutdown;
use burrow_core::supervisor::Supervisor;
use burrow_core::tunnel::{Tunnel, TunnelCloser};
use burrow_core::watcher::Watcher;

use crate::app::{Action, App};
use crate::keymap::Keymap;
use crate::view;

const INPUT_POLL: Duration = Duration::from_millis(50);
const TICK_EVERY: u32 = 2;

enum InputEvent {
    Key(KeyEvent),
    Resize,
    Tick,
}

/// Reads terminal input on its own thread; async code only sees the channel.
///
/// One synthetic resize is sent up front so the loop learns the initial
/// dimensions; crossterm only reports subsequent changes.
fn spawn_input_thread(tx: mpsc::UnboundedSender<InputEvent>) {
    std::thread::spawn(move || {
        if tx.send(InputEvent::Resize).is_err() {
            return;
        }
        let mut polls: u32 = 0;
        loop {
            let input = match event::poll(INPUT_POLL) {
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) if key.kind != KeyEventKind::Release => {
                        Some(InputEvent::Key(key))
                    }
                    Ok(Event::Resize(_, _)) => Some(InputEvent::Resize),
                    Ok(_) => None,
                    Err(_) => return,
                },
                Ok(false) => {
                    polls += 1;
                    (polls % TICK_EVERY == 0).then_some(InputEvent::Tick)
                }
                Err(_) => return,
            };
            if let Some(input) = input {
                if tx.send(input).is_err() {
                    return;
                }
            }
        }
    });
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    execute!(stdout(), EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout()))?)
}

fn restore_terminal() -> Result<()> {
    execute!(stdout(), LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

fn spawn_restart(supervisor: &Supervisor, command: Vec<String>) {
    let supervisor = supervisor.clone();
    tokio::spawn(async move {
        if let Err(err) = supervisor.restart(&command).await {
            error!("{err}");
        }
    });
}

/// Runs the dashboard until the user quits or the tunnel fails.
///
/// # Errors
///
/// Returns an error if the terminal or logger cannot be set up, or if the
/// tunnel cannot be established or dies while serving.
pub async fn run(config: Config) -> Result<()> {
    let (log_tx, mut log_rx) = mpsc::unbounded_channel();
    PaneLogger::install(log_tx.clone())?;

    let supervisor = Supervisor::new(log_tx);
    let (mut watcher, mut activity_rx) = Watcher::new(config.watch);

    // The lease request and the serving pool run off-loop; the loop learns
    // the public URL from one channel and a fatal serve error from the other.
    let client = reqwest::Client::new();
    let proxy = Proxy::new(client.clone(), &config);
    let (established_tx, mut established_rx) = oneshot::channel();
    let (serve_tx, mut serve_rx) = oneshot::channel();
    {
        let base_url = config.server_base_url.clone();
        tokio::spawn(async move {
            match Tunnel::open(&client, &base_url).await {
                Ok(tunnel) => {
                    let handle = (tunnel.url().to_string(), tunnel.closer());
                    if established_tx.send(Ok(handle)).is_err() {
                        return;
                    }
                    let _ = serve_tx.send(tunnel.serve(proxy).await);
                }
                Err(err) => {
                    let _ = established_tx.send(Err(err));
                }
            }
        });
    }

    let mut terminal = setup_terminal()?;
    let (input_tx, mut input_rx) = mpsc::unbounded_channel();
    spawn_input_thread(input_tx);

    let keymap = Keymap::default();
    let mut app = App::new(config.command.clone());
    info!("Forwarding tunnel traffic to {}", config.listen_url());

    let mut closer: Option<TunnelCloser> = None;
    let outcome = event_loop(
        &mut terminal,
        &mut app,
        &keymap,
        &supervisor,
        &mut watcher,
        &mut established_rx,
        &mut serve_rx,
        &mut input_rx,
        &mut log_rx,
        &mut activity_rx,
        &mut closer,
    )
    .await;

    // Same teardown on quit and on failure, then hand the terminal back.
    let stopped = shutdown(&mut watcher, &supervisor, closer).await;
    restore_terminal()?;
    stopped?;
    outcome
}

#[allow(clippy::too_many_arguments)]
async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    keymap: &Keymap,
    supervisor: &Supervisor,
    watcher: &mut Watcher,
    established_rx: &mut oneshot::Receiver<Result<(String, TunnelCloser)>>,
    serve_rx: &mut oneshot::Receiver<Result<()>>,
    input_rx: &mut mpsc::UnboundedReceiver<InputEvent>,
    log_rx: &mut mpsc::UnboundedReceiver<burrow_core::logs::LogLine>,
    activity_rx: &mut mpsc::UnboundedReceiver<()>,
    closer: &mut Option<TunnelCloser>,
) -> Result<()> {
    let mut established = false;
    loop {
        terminal.draw(|frame| view::render(frame, app, keymap))?;

        tokio::select! {
            lease = &mut *established_rx, if !established => {
                established = true;
                let (public_url, tunnel_closer) =
                    lease.map_err(|_| Error::ChannelClosed("tunnel establishment"))??;
                info!("Tunnel ready at {public_url}");
                app.set_public_url(public_url);
                *closer = Some(tunnel_closer);
                // Only a reachable tunnel justifies starting the child and
                // watching for changes. A watch registration failure is not
                // worth dying for; reload still works by hand.
                spawn_restart(supervisor, app.command.clone());
                if let Err(err) = watcher.start(Path::new(".")) {
                    error!("{err}");
                }
            }
            served = &mut *serve_rx, if established => {
                // The pool only returns early on failure; closing it
                // ourselves happens after the loop ends.
                served.map_err(|_| Error::ChannelClosed("tunnel serving"))??;
                return Err(Error::TunnelWorker("tunnel closed unexpectedly".to_string()));
            }
            input = input_rx.recv() => {
                match input {
                    Some(InputEvent::Key(key)) => match app.handle_key(keymap, key) {
                        Action::Restart => spawn_restart(supervisor, app.command.clone()),
                        Action::Quit => return Ok(()),
                        Action::None => {}
                    },
                    Some(InputEvent::Resize) => app.handle_resize(),
                    Some(InputEvent::Tick) => app.tick(),
                    None => return Err(Error::ChannelClosed("terminal input")),
                }
            }
            line = log_rx.recv() => {
                match line {
                    Some(line) => app.push_log(line),
                    None => return Err(Error::ChannelClosed("log")),
                }
            }
            activity = activity_rx.recv() => {
                match activity {
                    Some(()) => {
                        info!("Change detected, restarting: {}", app.command.join(" "));
                        spawn_restart(supervisor, app.command.clone());
                    }
                    None => return Err(Error::ChannelClosed("watcher activity")),
                }
            }
        }
    }
}
