//! Diagnostic envelope log
//!
//! The [`LoggingRouter`] never delivers anything. It records one line per
//! routed envelope and a background thread appends the lines to a file
//! every 100ms, at most 8192 lines per batch:
//!
//! ```text
//! <epoch millis>;<millis since router start>;<from>;<to>;<message id>
//! ```

use crate::envelope::Envelope;
use crate::error::{ActorError, Result};
use crate::router::Router;
use actor_config::defaults::logging::{FLUSH_INTERVAL_MS, MAX_BATCH};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

struct LogLine {
    at_millis: u128,
    relative_millis: u128,
    from: String,
    to: String,
    message_id: String,
}

struct Writer {
    sender: Sender<LogLine>,
    thread: JoinHandle<()>,
}

/// Router that appends every envelope to a log file
pub struct LoggingRouter {
    path: Option<PathBuf>,
    started: Instant,
    writer: RwLock<Option<Writer>>,
}

impl LoggingRouter {
    /// Router that records nothing
    pub fn disabled() -> Self {
        Self {
            path: None,
            started: Instant::now(),
            writer: RwLock::new(None),
        }
    }

    /// Start the background writer for `path`
    pub fn to_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                ActorError::configuration(
                    format!("cannot open envelope log {}: {}", path.display(), e),
                    Some("logging.path"),
                )
            })?;

        let (sender, receiver) = crossbeam_channel::unbounded();
        let thread = thread::Builder::new()
            .name("actor-envelope-log".to_string())
            .spawn(move || flush_loop(receiver, file))
            .map_err(|e| {
                ActorError::configuration(format!("cannot start log writer: {}", e), None)
            })?;

        debug!(path = %path.display(), "Envelope log started");
        Ok(Self {
            path: Some(path),
            started: Instant::now(),
            writer: RwLock::new(Some(Writer { sender, thread })),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Router for LoggingRouter {
    fn route(&self, envelope: &Envelope) -> Result<()> {
        let writer = self.writer.read();
        if let Some(writer) = writer.as_ref() {
            let at_millis = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or_default();
            let line = LogLine {
                at_millis,
                relative_millis: self.started.elapsed().as_millis(),
                from: envelope.from().to_string(),
                to: envelope.to().to_string(),
                message_id: envelope.message_id(),
            };
            // A closed writer only means the context is stopping
            let _ = writer.sender.send(line);
        }
        Ok(())
    }

    /// Flush what is buffered and stop the writer thread
    fn stop(&self) {
        let writer = self.writer.write().take();
        if let Some(Writer { sender, thread }) = writer {
            drop(sender);
            if thread.join().is_err() {
                warn!("Envelope log writer panicked");
            }
        }
    }
}

impl Drop for LoggingRouter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn flush_loop(receiver: Receiver<LogLine>, file: File) {
    let mut out = BufWriter::new(file);
    let interval = Duration::from_millis(FLUSH_INTERVAL_MS);
    let mut batch = Vec::with_capacity(MAX_BATCH);
    let mut closed = false;

    while !closed {
        match receiver.recv_timeout(interval) {
            Ok(line) => batch.push(line),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => closed = true,
        }
        batch.extend(receiver.try_iter().take(MAX_BATCH.saturating_sub(batch.len())));

        if batch.is_empty() {
            continue;
        }
        for line in batch.drain(..) {
            let written = writeln!(
                out,
                "{};{};{};{};{}",
                line.at_millis, line.relative_millis, line.from, line.to, line.message_id
            );
            if let Err(e) = written {
                warn!(error = %e, "Envelope log write failed");
            }
        }
        if let Err(e) = out.flush() {
            warn!(error = %e, "Envelope log flush failed");
        }
        if !closed {
            thread::sleep(interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::reference::Reference;

    #[test]
    fn test_lines_are_flushed_on_stop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("envelopes.log");
        let router = LoggingRouter::to_file(&path).unwrap();

        let from = Reference::parse("actor://alpha");
        let to = Reference::parse("actor://beta");
        let envelopes: Vec<_> = (0..3)
            .map(|i| Envelope::new(from.clone(), to.clone(), Message::value(i as i64)))
            .collect();
        for e in &envelopes {
            router.route(e).unwrap();
        }
        router.stop();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        for (line, envelope) in lines.iter().zip(&envelopes) {
            let fields: Vec<_> = line.split(';').collect();
            assert_eq!(fields.len(), 5);
            assert_eq!(fields[2], "actor://alpha");
            assert_eq!(fields[3], "actor://beta");
            assert_eq!(fields[4], envelope.message_id());
        }
    }

    #[test]
    fn test_disabled_router_accepts_everything() {
        let router = LoggingRouter::disabled();
        assert!(!router.is_enabled());
        let e = Envelope::new(Reference::nobody(), Reference::nobody(), Message::value(()));
        assert!(router.route(&e).is_ok());
        router.stop();
    }
}
