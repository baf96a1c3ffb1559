//! Multi-finger swipe handling.
//!
//! Two pieces live here:
//!
//! * [`SwipeTracker`] turns raw swipe begin / update / end events into the
//!   accumulated delta the session's swipe driver expects.  It is owned by
//!   the [`OverviewManager`](crate::manager::OverviewManager).
//! * [`HyprlandSwipeSource`] is a [`CommandSource`] that reads Hyprland's
//!   event socket (`socket2`) and forwards its swipe events as
//!   [`Command::SwipeBegin`] / [`Command::SwipeUpdate`] /
//!   [`Command::SwipeEnd`].
//!
//! Hyprland emits swipes on `socket2` as `EVENT>>DATA\n` lines:
//!
//! | Event           | Payload               | Meaning                               |
//! |-----------------|-----------------------|---------------------------------------|
//! | `swipebegin`    | `<fingers>`           | A multi-finger swipe has started      |
//! | `swipeupdate`   | `<fingers>,<dx>,<dy>` | Incremental finger movement (pixels)  |
//! | `swipeend`      | `<fingers>`           | Fingers lifted                        |

use crate::command::Command;
use crate::config::GestureConfig;
use crate::traits::CommandSource;
use log::{debug, error, info, warn};
use std::io::{BufRead, BufReader};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::mpsc;

/// Accumulates vertical finger travel for one swipe.
///
/// A swipe starts only with the configured finger count while gestures are
/// enabled.  Travel in the opening direction is positive; the delta handed
/// on is never negative, so swiping back past the start just holds the
/// fully zoomed-in view.
#[derive(Debug)]
pub struct SwipeTracker {
    config: GestureConfig,
    active: bool,
    accum: f64,
}

impl SwipeTracker {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            active: false,
            accum: 0.0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// A swipe with `fingers` fingers started.  Returns whether it is
    /// tracked.
    pub fn begin(&mut self, fingers: u32) -> bool {
        if !self.config.enabled || fingers != self.config.fingers {
            return false;
        }
        debug!("swipe begin: {} fingers", fingers);
        self.active = true;
        self.accum = 0.0;
        true
    }

    /// Add `dy` pixels of travel.  Returns the total travel in the opening
    /// direction, or `None` when no swipe is tracked.
    pub fn update(&mut self, dy: f64) -> Option<f64> {
        if !self.active {
            return None;
        }
        self.accum += if self.config.positive { dy } else { -dy };
        Some(self.accum.max(0.0))
    }

    /// Fingers lifted.  Returns whether a tracked swipe ended.
    pub fn end(&mut self) -> bool {
        let was_active = self.active;
        self.active = false;
        self.accum = 0.0;
        was_active
    }

    /// Forget any swipe in progress.
    pub fn reset(&mut self) {
        self.end();
    }
}

//  Hyprland socket2 source

/// A [`CommandSource`] that listens to Hyprland swipe events on the raw
/// IPC event socket.
///
/// Finger-count filtering is left to the [`SwipeTracker`]; every swipe
/// event is forwarded.
pub struct HyprlandSwipeSource {
    path: Option<PathBuf>,
}

/// Error from the Hyprland swipe source.
#[derive(Debug, thiserror::Error)]
#[error("hyprland swipe source: {0}")]
pub struct HyprlandSwipeError(String);

impl HyprlandSwipeSource {
    /// Connect to the socket of the running Hyprland instance.
    pub fn new() -> Self {
        Self { path: None }
    }

    /// Connect to an explicit socket path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}

impl Default for HyprlandSwipeSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the Hyprland event socket path.
///
/// Hyprland stores its sockets at
/// `$XDG_RUNTIME_DIR/hypr/$HYPRLAND_INSTANCE_SIGNATURE/.socket2.sock`.
pub fn socket2_path() -> Result<PathBuf, HyprlandSwipeError> {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .map_err(|_| HyprlandSwipeError("XDG_RUNTIME_DIR not set".into()))?;
    let his = std::env::var("HYPRLAND_INSTANCE_SIGNATURE")
        .map_err(|_| HyprlandSwipeError("HYPRLAND_INSTANCE_SIGNATURE not set".into()))?;
    Ok(PathBuf::from(format!(
        "{}/hypr/{}/.socket2.sock",
        runtime_dir, his
    )))
}

/// Split a socket2 line `EVENT>>DATA` into its parts.
fn parse_event_line(line: &str) -> Option<(&str, &str)> {
    let (event, data) = line.split_once(">>")?;
    // Strip any namespace prefix ("touchpad:swipebegin" -> "swipebegin").
    let event = event.rsplit_once(':').map_or(event, |(_, name)| name);
    Some((event, data))
}

/// Translate one socket2 event into a swipe command.
pub(crate) fn swipe_command(event: &str, data: &str) -> Option<Command> {
    match event {
        "swipebegin" => {
            let fingers = data.trim().parse::<u32>().ok()?;
            Some(Command::SwipeBegin { fingers })
        }
        "swipeupdate" => {
            // "<fingers>,<dx>,<dy>"
            let mut parts = data.trim().split(',');
            let (_fingers, _dx, dy) = (parts.next()?, parts.next()?, parts.next()?);
            let dy = dy.trim().parse::<f64>().ok()?;
            Some(Command::SwipeUpdate { dy })
        }
        "swipeend" => Some(Command::SwipeEnd),
        _ => None,
    }
}

impl CommandSource for HyprlandSwipeSource {
    type Error = HyprlandSwipeError;

    /// Connect to Hyprland's event socket and forward swipe events.
    ///
    /// This method **blocks** until the socket closes.  Run it on a
    /// dedicated thread.
    fn run(&mut self, sink: mpsc::Sender<Command>) -> Result<(), Self::Error> {
        let path = match &self.path {
            Some(path) => path.clone(),
            None => socket2_path()?,
        };
        let stream = UnixStream::connect(&path)
            .map_err(|e| HyprlandSwipeError(format!("connect to {}: {}", path.display(), e)))?;
        info!("swipe source connected to {}", path.display());

        for line in BufReader::new(stream).lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    error!("socket2 read error: {}", e);
                    return Err(HyprlandSwipeError(format!("read error: {}", e)));
                }
            };
            let Some(cmd) = parse_event_line(&line).and_then(|(event, data)| swipe_command(event, data))
            else {
                continue;
            };
            debug!("socket2: {:?}", cmd);
            if sink.send(cmd).is_err() {
                info!("sink closed, shutting down swipe source");
                return Ok(());
            }
        }

        warn!("socket2 stream ended");
        Ok(())
    }
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::net::UnixListener;
    use std::sync::atomic::{AtomicU32, Ordering};

    static TEST_ID: AtomicU32 = AtomicU32::new(0);

    fn tracker() -> SwipeTracker {
        SwipeTracker::new(GestureConfig::default())
    }

    #[test]
    fn begin_requires_configured_finger_count() {
        let mut t = tracker();
        assert!(!t.begin(3));
        assert!(!t.is_active());
        assert!(t.begin(4));
        assert!(t.is_active());
    }

    #[test]
    fn disabled_gestures_never_begin() {
        let mut t = SwipeTracker::new(GestureConfig {
            enabled: false,
            ..GestureConfig::default()
        });
        assert!(!t.begin(4));
        assert_eq!(t.update(10.0), None);
    }

    #[test]
    fn update_accumulates_and_floors_at_zero() {
        let mut t = tracker();
        t.begin(4);
        assert_eq!(t.update(40.0), Some(40.0));
        assert_eq!(t.update(20.0), Some(60.0));
        assert_eq!(t.update(-100.0), Some(0.0));
        assert_eq!(t.update(50.0), Some(10.0));
    }

    #[test]
    fn negative_direction_inverts_travel() {
        let mut t = SwipeTracker::new(GestureConfig {
            positive: false,
            ..GestureConfig::default()
        });
        t.begin(4);
        assert_eq!(t.update(-30.0), Some(30.0));
        assert_eq!(t.update(60.0), Some(0.0));
    }

    #[test]
    fn end_resets() {
        let mut t = tracker();
        assert!(!t.end());
        t.begin(4);
        t.update(25.0);
        assert!(t.end());
        assert!(!t.is_active());
        assert_eq!(t.update(5.0), None);
    }

    #[test]
    fn parse_event_line_valid() {
        assert_eq!(parse_event_line("swipebegin>>4"), Some(("swipebegin", "4")));
        assert_eq!(
            parse_event_line("touchpad:swipeupdate>>4,10.5,-2.3"),
            Some(("swipeupdate", "4,10.5,-2.3"))
        );
        assert_eq!(parse_event_line("garbage"), None);
    }

    #[test]
    fn swipe_events_become_commands() {
        assert_eq!(swipe_command("swipebegin", "4"), Some(Command::SwipeBegin { fingers: 4 }));
        assert_eq!(
            swipe_command("swipeupdate", "4,10.5,-2.5"),
            Some(Command::SwipeUpdate { dy: -2.5 })
        );
        assert_eq!(swipe_command("swipeend", "4"), Some(Command::SwipeEnd));
        assert_eq!(swipe_command("swipeupdate", "4,1.0"), None);
        assert_eq!(swipe_command("workspace", "2"), None);
    }

    #[test]
    fn source_forwards_swipes_from_socket() {
        let id = TEST_ID.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "hyprexpose-socket2-test-{}-{}.sock",
            std::process::id(),
            id
        ));
        let _ = std::fs::remove_file(&path);
        let server = UnixListener::bind(&path).unwrap();

        let client_path = path.clone();
        let (tx, rx) = mpsc::channel();
        let handle = std::thread::spawn(move || {
            let mut source = HyprlandSwipeSource::with_path(client_path);
            source.run(tx)
        });

        let (mut stream, _) = server.accept().unwrap();
        writeln!(stream, "activewindow>>kitty,~").unwrap();
        writeln!(stream, "swipebegin>>4").unwrap();
        writeln!(stream, "swipeupdate>>4,0.0,12.0").unwrap();
        writeln!(stream, "swipeend>>4").unwrap();
        drop(stream);

        handle.join().unwrap().unwrap();
        let cmds: Vec<Command> = rx.try_iter().collect();
        assert_eq!(
            cmds,
            vec![
                Command::SwipeBegin { fingers: 4 },
                Command::SwipeUpdate { dy: 12.0 },
                Command::SwipeEnd,
            ]
        );
        let _ = std::fs::remove_file(&path);
    }
}
