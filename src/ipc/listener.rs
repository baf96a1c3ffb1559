//! Unix-socket [`CommandSource`] implementation.
//!
//! Binds a Unix stream socket and accepts one connection at a time.
//! Each line received is parsed as a JSON-encoded [`Command`].
//!
//! # Wire format
//!
//! Every message is a single line of JSON followed by `\n`.  Blank lines
//! and lines starting with `#` are skipped, so a script file can be piped
//! straight in:
//!
//! ```text
//! # open, hover the second tile, pick it
//! "Toggle"
//! {"PointerMove":{"x":960.0,"y":200.0}}
//! "Select"
//! {"SwipeBegin":{"fingers":4}}
//! {"SwipeUpdate":{"dy":12.0}}
//! "SwipeEnd"
//! {"WindowClosed":7}
//! ```

use crate::command::Command;
use crate::traits::CommandSource;
use log::{debug, error, info};
use std::io::{BufRead, BufReader};
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

/// A [`CommandSource`] that listens on a Unix stream socket for
/// JSON-encoded commands.
///
/// Each accepted connection can send multiple newline-delimited JSON
/// commands.  When the connection closes, the listener waits for the
/// next one.
pub struct UnixSocketListener {
    path: PathBuf,
}

/// Errors produced by the Unix socket listener.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse one line of the wire format.
///
/// Returns `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str) -> Result<Option<Command>, ListenerError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line)?))
}

impl UnixSocketListener {
    /// Create a new listener bound to `path`.
    ///
    /// The socket file is created when [`run`](CommandSource::run) is called.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The filesystem path of the socket.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CommandSource for UnixSocketListener {
    type Error = ListenerError;

    /// Bind the socket and start accepting connections.
    ///
    /// This method **blocks** until the sink is dropped.  Run it on a
    /// dedicated thread.
    fn run(&mut self, sink: mpsc::Sender<Command>) -> Result<(), Self::Error> {
        // Remove stale socket if present.
        let _ = std::fs::remove_file(&self.path);

        let listener = UnixListener::bind(&self.path)?;
        info!("listening on {}", self.path.display());

        for stream in listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    error!("accept error: {}", e);
                    continue;
                }
            };
            debug!("client connected");
            for line in BufReader::new(stream).lines() {
                let text = match line {
                    Ok(text) => text,
                    Err(e) => {
                        error!("read error: {}", e);
                        break;
                    }
                };
                match parse_line(&text) {
                    Ok(Some(cmd)) => {
                        debug!("received {:?}", cmd);
                        if sink.send(cmd).is_err() {
                            info!("sink closed, shutting down");
                            return Ok(());
                        }
                    }
                    Ok(None) => {}
                    Err(e) => error!("bad command {:?}: {}", text, e),
                }
            }
            debug!("client disconnected");
        }
        Ok(())
    }
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::WindowId;
    use std::io::Write;
    use std::os::unix::net::UnixStream;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Monotonic counter to generate unique socket paths per test.
    static TEST_ID: AtomicU32 = AtomicU32::new(0);

    fn tmp_socket_path() -> PathBuf {
        let id = TEST_ID.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!(
            "hyprexpose-test-{}-{}.sock",
            std::process::id(),
            id
        ))
    }

    /// Start a listener on a fresh path and wait until it accepts.
    fn spawn_listener() -> (PathBuf, mpsc::Receiver<Command>) {
        let path = tmp_socket_path();
        let listener_path = path.clone();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut listener = UnixSocketListener::new(&listener_path);
            let _ = listener.run(tx);
        });
        for _ in 0..100 {
            if UnixStream::connect(&path).is_ok() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        (path, rx)
    }

    fn collect(rx: &mpsc::Receiver<Command>, expected: usize) -> Vec<Command> {
        let mut cmds = Vec::new();
        while cmds.len() < expected {
            match rx.recv_timeout(std::time::Duration::from_secs(2)) {
                Ok(cmd) => cmds.push(cmd),
                Err(_) => break,
            }
        }
        cmds
    }

    #[test]
    fn parse_line_skips_blank_and_comments() {
        assert!(parse_line("").unwrap().is_none());
        assert!(parse_line("   ").unwrap().is_none());
        assert!(parse_line("# comment").unwrap().is_none());
        assert_eq!(parse_line(r#" "Toggle" "#).unwrap(), Some(Command::Toggle));
        assert!(parse_line("{nope").is_err());
    }

    #[test]
    fn round_trip_commands_over_socket() {
        let (path, rx) = spawn_listener();

        {
            let mut stream = UnixStream::connect(&path).expect("connect");
            writeln!(stream, r#""Toggle""#).unwrap();
            writeln!(stream, r#"{{"PointerMove":{{"x":10.0,"y":20.0}}}}"#).unwrap();
            writeln!(stream, "# comment").unwrap();
            writeln!(stream, r#"{{"WindowClosed":7}}"#).unwrap();
            stream.shutdown(std::net::Shutdown::Write).unwrap();
        }

        let cmds = collect(&rx, 3);
        assert_eq!(
            cmds,
            vec![
                Command::Toggle,
                Command::PointerMove { x: 10.0, y: 20.0 },
                Command::WindowClosed(WindowId(7)),
            ]
        );
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn malformed_json_does_not_crash() {
        let (path, rx) = spawn_listener();

        {
            let mut stream = UnixStream::connect(&path).expect("connect");
            writeln!(stream, "not json at all").unwrap();
            writeln!(stream, r#""Close""#).unwrap();
            stream.shutdown(std::net::Shutdown::Write).unwrap();
        }

        let cmds = collect(&rx, 1);
        assert_eq!(cmds, vec![Command::Close]);
        assert!(rx.recv_timeout(std::time::Duration::from_millis(100)).is_err());
        let _ = std::fs::remove_file(&path);
    }
}
