//! Consumers of forwarded log text
//!
//! A [`LogMessageListener`] is whatever displays the log: the text area in
//! the main window, a channel into the UI event loop, or a plain closure.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Receives log text one fragment at a time
///
/// Implementations are called while the forwarding writer holds its lock,
/// so they must not log back into the same writer.
pub trait LogMessageListener: Send + Sync {
    /// Append one fragment of log text
    fn add_log_message(&self, message: &str);
}

impl<F> LogMessageListener for F
where
    F: Fn(&str) + Send + Sync,
{
    fn add_log_message(&self, message: &str) {
        self(message)
    }
}

/// Shared, growable text that fragments are appended to
///
/// This is the headless counterpart of the log text area: every fragment is
/// appended verbatim, so the contents read exactly as the window would.
#[derive(Debug, Clone, Default)]
pub struct TextBuffer {
    text: Arc<Mutex<String>>,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far
    pub fn contents(&self) -> String {
        self.text.lock().clone()
    }

    /// Snapshot split into lines
    pub fn lines(&self) -> Vec<String> {
        self.text.lock().lines().map(str::to_owned).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.text.lock().is_empty()
    }

    /// Drop all text, like the "clear log" button
    pub fn clear(&self) {
        self.text.lock().clear();
    }
}

impl LogMessageListener for TextBuffer {
    fn add_log_message(&self, message: &str) {
        self.text.lock().push_str(message);
    }
}

/// Forwards fragments into an unbounded tokio channel
///
/// Use this when the widget lives on a UI thread that drains a receiver.
/// Fragments sent after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelListener {
    /// Create a listener and the receiver the UI side should poll
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Wrap an existing sender
    pub fn from_sender(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl LogMessageListener for ChannelListener {
    fn add_log_message(&self, message: &str) {
        // Receiver gone means the window was closed
        let _ = self.tx.send(message.to_owned());
    }
}
