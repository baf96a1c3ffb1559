//! Entry point for the **hyprexpose** daemon.
//!
//! Runs an overview against the in-memory headless host, driven by commands
//! arriving on a Unix socket (and, inside a Hyprland session, by touchpad
//! swipes read from Hyprland's event socket).  The main thread runs a
//! ~60 Hz frame loop: apply pending commands, tick, refresh, render.
//!
//! ```text
//! hyprexpose [--windows N]
//! ```

use hyprexpose::backend::headless::HeadlessHost;
use hyprexpose::command::Command;
use hyprexpose::config::{Config, Settings};
use hyprexpose::gestures::HyprlandSwipeSource;
use hyprexpose::ipc::listener::UnixSocketListener;
use hyprexpose::manager::OverviewManager;
use hyprexpose::traits::{CommandSource, Compositor};
use log::{error, info, warn};
use std::sync::mpsc;
use std::time::{Duration, Instant};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Windows the headless host starts with when `--windows` is not given.
const DEFAULT_WINDOWS: usize = 6;

/// Default socket path for the command listener.
fn default_socket_path() -> String {
    let runtime = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".into());
    format!("{}/hyprexpose.sock", runtime)
}

/// Resolve the config directory (`$XDG_CONFIG_HOME/hyprexpose`).
fn config_dir() -> std::path::PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        format!("{}/.config", home)
    });
    std::path::PathBuf::from(base).join("hyprexpose")
}

/// Load and validate `$XDG_CONFIG_HOME/hyprexpose/config.json`, falling
/// back to compiled-in defaults.
fn load_settings() -> Settings {
    let path = config_dir().join("config.json");
    let config = match Config::load(&path) {
        Ok(cfg) => {
            info!("loaded config from {}", path.display());
            cfg
        }
        Err(e) => {
            info!("no config file ({}), using defaults", e);
            return Settings::default();
        }
    };
    match Settings::try_from(&config) {
        Ok(settings) => settings,
        Err(e) => {
            warn!("{}, using defaults", e);
            Settings::default()
        }
    }
}

/// Parse `--windows N`.
fn window_count() -> usize {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--windows" {
            match args.next().map(|n| n.parse::<usize>()) {
                Some(Ok(n)) => return n,
                _ => {
                    error!("--windows expects a number");
                    std::process::exit(2);
                }
            }
        }
    }
    DEFAULT_WINDOWS
}

//  Main

fn main() {
    env_logger::init();

    let settings = load_settings();
    let mut host = HeadlessHost::with_windows(window_count());
    info!(
        "headless host on {} with {} window(s)",
        host.monitor_info().name,
        host.window_ids().len()
    );

    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
    spawn_command_sources(cmd_tx);

    let mut manager = OverviewManager::new(settings);
    info!("hyprexpose running");
    run_frame_loop(&mut manager, &mut host, &cmd_rx);
    manager.shutdown(&mut host);
    info!("all command sources closed, exiting");
}

/// Apply commands and drive frames until every command source is gone.
fn run_frame_loop(
    manager: &mut OverviewManager<HeadlessHost>,
    host: &mut HeadlessHost,
    cmd_rx: &mpsc::Receiver<Command>,
) {
    let mut next_frame = Instant::now() + FRAME_INTERVAL;
    loop {
        let timeout = next_frame.saturating_duration_since(Instant::now());
        match cmd_rx.recv_timeout(timeout) {
            Ok(cmd) => {
                apply_to_host(host, &cmd);
                manager.apply(host, cmd, Instant::now());
                if Instant::now() < next_frame {
                    continue;
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => return,
        }

        let now = Instant::now();
        manager.tick(host, now);
        manager.on_pre_render(host, now);
        manager.render(host);
        next_frame = now + FRAME_INTERVAL;
    }
}

/// Mirror host-side events into the headless window table before the
/// overview hears about them.
fn apply_to_host(host: &mut HeadlessHost, cmd: &Command) {
    match *cmd {
        Command::WindowClosed(window) => {
            if !host.remove_window(window) {
                warn!("no window {} to close", window);
            }
        }
        Command::FocusChanged(window) => {
            if let Err(e) = host.focus_window(window) {
                warn!("cannot focus {}: {}", window, e);
            }
        }
        _ => {}
    }
}

//  Helpers

fn spawn_command_sources(tx: mpsc::Sender<Command>) {
    {
        let tx = tx.clone();
        let path = default_socket_path();
        std::thread::spawn(move || {
            let mut source = UnixSocketListener::new(&path);
            if let Err(e) = source.run(tx) {
                error!("socket listener error: {}", e);
            }
        });
    }

    if std::env::var_os("HYPRLAND_INSTANCE_SIGNATURE").is_some() {
        let tx = tx.clone();
        std::thread::spawn(move || {
            let mut source = HyprlandSwipeSource::new();
            if let Err(e) = source.run(tx) {
                error!("swipe source error: {}", e);
            }
        });
    }

    drop(tx);
}
