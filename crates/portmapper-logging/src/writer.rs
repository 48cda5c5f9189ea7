//! Buffered forwarding of log text to the log window
//!
//! The logging stack starts writing long before the main window exists.
//! [`LogMessageWriter`] keeps everything written until a
//! [`LogMessageListener`] registers, replays it in order, and from then on
//! hands every fragment straight to the listener. Nothing written is lost
//! and nothing is delivered twice.

use std::fmt;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;

use crate::error::{LoggingError, LoggingResult};
use crate::listener::LogMessageListener;

/// A destination for text fragments
///
/// This is the minimal stream contract log appenders expect. `flush` and
/// `close` exist so generic callers can treat any sink alike.
pub trait TextSink {
    /// Accept one fragment of text
    fn write_fragment(&self, fragment: &str);

    /// Push out pending output
    fn flush(&self) {}

    /// Release the sink
    fn close(&self) {}
}

enum State {
    /// No listener yet, fragments wait here in write order
    Buffering { pending: Vec<String> },
    /// Listener bound, the buffer is gone for good
    Forwarding {
        listener: Box<dyn LogMessageListener>,
    },
}

/// Writer that buffers log text until a listener is registered
///
/// Cloning yields another handle to the same writer, which is how the
/// subscriber and the UI share it.
///
/// # Example
///
/// ```ignore
/// use portmapper_logging::{LogMessageWriter, TextBuffer};
///
/// let writer = LogMessageWriter::new();
/// writer.add_message("early line\n");
///
/// let text_area = TextBuffer::new();
/// writer.register_listener(text_area.clone())?;
/// writer.add_message("live line\n");
///
/// assert_eq!(text_area.contents(), "early line\nlive line\n");
/// ```
#[derive(Clone)]
pub struct LogMessageWriter {
    state: Arc<Mutex<State>>,
}

impl LogMessageWriter {
    /// Create a writer with an empty buffer and no listener
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::Buffering {
                pending: Vec::new(),
            })),
        }
    }

    /// Append a message to the listener, or to the buffer if none is registered
    pub fn add_message(&self, message: impl Into<String> + AsRef<str>) {
        let mut state = self.state.lock();
        match &mut *state {
            State::Buffering { pending } => pending.push(message.into()),
            State::Forwarding { listener } => listener.add_log_message(message.as_ref()),
        }
    }

    /// Bind `listener` as the sole recipient of all text
    ///
    /// Buffered messages are delivered first, in the order they were
    /// written. A writer accepts exactly one listener; later registrations
    /// fail with [`LoggingError::ListenerAlreadyRegistered`] and leave the
    /// first listener in place.
    pub fn register_listener<L>(&self, listener: L) -> LoggingResult<()>
    where
        L: LogMessageListener + 'static,
    {
        let replayed = {
            let mut state = self.state.lock();
            // Retire the buffer only after a complete replay
            let replayed = match &*state {
                State::Forwarding { .. } => None,
                State::Buffering { pending } => {
                    for message in pending {
                        listener.add_log_message(message);
                    }
                    Some(pending.len())
                }
            };

            if replayed.is_some() {
                *state = State::Forwarding {
                    listener: Box::new(listener),
                };
            }
            replayed
        };

        // Log only once the lock is released: this writer may be the sink
        // for these very events.
        match replayed {
            Some(replayed) => {
                tracing::debug!(replayed, "log message listener registered");
                Ok(())
            }
            None => {
                tracing::warn!("ignoring second log message listener");
                Err(LoggingError::ListenerAlreadyRegistered)
            }
        }
    }

    /// Whether a listener is bound
    pub fn is_forwarding(&self) -> bool {
        matches!(*self.state.lock(), State::Forwarding { .. })
    }

    /// Number of messages waiting for a listener (zero once forwarding)
    pub fn pending_len(&self) -> usize {
        match &*self.state.lock() {
            State::Buffering { pending } => pending.len(),
            State::Forwarding { .. } => 0,
        }
    }
}

impl Default for LogMessageWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LogMessageWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.state.lock() {
            State::Buffering { pending } => f
                .debug_struct("LogMessageWriter")
                .field("state", &"buffering")
                .field("pending", &pending.len())
                .finish(),
            State::Forwarding { .. } => f
                .debug_struct("LogMessageWriter")
                .field("state", &"forwarding")
                .finish(),
        }
    }
}

impl TextSink for LogMessageWriter {
    fn write_fragment(&self, fragment: &str) {
        self.add_message(fragment);
    }
}

impl io::Write for LogMessageWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.add_message(String::from_utf8_lossy(buf).into_owned());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Write for LogMessageWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.add_message(s);
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogMessageWriter {
    type Writer = LogMessageWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::TextBuffer;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl LogMessageListener + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |msg: &str| sink.lock().push(msg.to_string()))
    }

    #[test]
    fn test_new_writer_is_buffering() {
        let writer = LogMessageWriter::new();
        assert!(!writer.is_forwarding());
        assert_eq!(writer.pending_len(), 0);
    }

    #[test]
    fn test_replays_buffer_in_order() {
        let writer = LogMessageWriter::new();
        writer.add_message("F1");
        writer.add_message("F2");
        writer.add_message("F3");

        let (seen, listener) = recorder();
        writer.register_listener(listener).unwrap();

        assert_eq!(*seen.lock(), vec!["F1", "F2", "F3"]);
        assert!(writer.is_forwarding());
        assert_eq!(writer.pending_len(), 0);
    }

    #[test]
    fn test_forwards_after_registration_without_replay() {
        let writer = LogMessageWriter::new();
        writer.add_message("F1");
        writer.add_message("F2");
        writer.add_message("F3");

        let (seen, listener) = recorder();
        writer.register_listener(listener).unwrap();
        writer.add_message("F4");

        assert_eq!(*seen.lock(), vec!["F1", "F2", "F3", "F4"]);
    }

    #[test]
    fn test_buffer_grows_without_listener() {
        let writer = LogMessageWriter::new();
        for i in 0..100 {
            writer.add_message(format!("line {i}"));
        }
        assert_eq!(writer.pending_len(), 100);
        assert!(!writer.is_forwarding());
    }

    #[test]
    fn test_empty_fragments_are_kept() {
        let writer = LogMessageWriter::new();
        writer.add_message("");
        writer.add_message("x");

        let (seen, listener) = recorder();
        writer.register_listener(listener).unwrap();
        writer.add_message("");

        assert_eq!(*seen.lock(), vec!["", "x", ""]);
    }

    #[test]
    fn test_register_with_empty_buffer() {
        let writer = LogMessageWriter::new();
        let (seen, listener) = recorder();
        writer.register_listener(listener).unwrap();

        assert!(seen.lock().is_empty());
        assert!(writer.is_forwarding());
    }

    #[test]
    fn test_second_registration_rejected() {
        let writer = LogMessageWriter::new();
        writer.add_message("early");

        let (first, listener) = recorder();
        writer.register_listener(listener).unwrap();

        let (second, listener) = recorder();
        let result = writer.register_listener(listener);
        assert!(matches!(result, Err(LoggingError::ListenerAlreadyRegistered)));

        writer.add_message("late");
        assert_eq!(*first.lock(), vec!["early", "late"]);
        assert!(second.lock().is_empty());
    }

    #[test]
    fn test_panicking_listener_keeps_buffer() {
        use std::panic::{self, AssertUnwindSafe};

        let writer = LogMessageWriter::new();
        writer.add_message("F1");
        writer.add_message("F2");
        writer.add_message("F3");

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            writer.register_listener(|msg: &str| {
                if msg == "F2" {
                    panic!("widget gone");
                }
            })
        }));
        assert!(result.is_err());
        assert!(!writer.is_forwarding());
        assert_eq!(writer.pending_len(), 3);

        let (seen, listener) = recorder();
        writer.register_listener(listener).unwrap();
        assert_eq!(*seen.lock(), vec!["F1", "F2", "F3"]);
    }

    #[test]
    fn test_close_and_flush_are_noops() {
        let writer = LogMessageWriter::new();
        writer.add_message("a");

        for _ in 0..3 {
            TextSink::flush(&writer);
            TextSink::close(&writer);
        }
        assert_eq!(writer.pending_len(), 1);
        assert!(!writer.is_forwarding());

        let text = TextBuffer::new();
        writer.register_listener(text.clone()).unwrap();
        for _ in 0..3 {
            TextSink::flush(&writer);
            TextSink::close(&writer);
        }
        assert!(writer.is_forwarding());

        // Closing does not stop forwarding
        writer.write_fragment("b");
        assert_eq!(text.contents(), "ab");
    }

    #[test]
    fn test_clones_share_state() {
        let writer = LogMessageWriter::new();
        let handle = writer.clone();
        handle.add_message("from clone");

        let text = TextBuffer::new();
        writer.register_listener(text.clone()).unwrap();
        assert!(handle.is_forwarding());

        handle.add_message(" and after");
        assert_eq!(text.contents(), "from clone and after");
    }

    #[test]
    fn test_io_write_decodes_utf8() {
        use std::io::Write;

        let mut writer = LogMessageWriter::new();
        let written = writer.write(b"caf\xc3\xa9 ").unwrap();
        assert_eq!(written, 6);
        writer.write_all(b"bad \xff byte").unwrap();
        io::Write::flush(&mut writer).unwrap();

        let text = TextBuffer::new();
        writer.register_listener(text.clone()).unwrap();
        assert_eq!(text.contents(), "café bad \u{fffd} byte");
    }

    #[test]
    fn test_fmt_write_forwards_fragments() {
        use std::fmt::Write;

        let mut writer = LogMessageWriter::new();
        let text = TextBuffer::new();
        writer.register_listener(text.clone()).unwrap();

        write!(writer, "mapped port {} -> {}", 8080, "192.168.1.10:80").unwrap();
        assert_eq!(text.contents(), "mapped port 8080 -> 192.168.1.10:80");
    }

    #[test]
    fn test_make_writer_shares_state() {
        use std::io::Write;

        let writer = LogMessageWriter::new();
        writer.make_writer().write_all(b"via make_writer").unwrap();
        assert_eq!(writer.pending_len(), 1);
    }

    #[test]
    fn test_debug_shows_state() {
        let writer = LogMessageWriter::new();
        writer.add_message("a");
        assert!(format!("{writer:?}").contains("buffering"));

        writer.register_listener(TextBuffer::new()).unwrap();
        assert!(format!("{writer:?}").contains("forwarding"));
    }
}
