//! Log forwarding from `tracing` into the PortMapper log window
//!
//! The port mapper logs from the moment it starts, but the window that shows
//! the log only appears later. This crate bridges the gap:
//!
//! - **[`LogMessageWriter`]**: buffers text until a [`LogMessageListener`]
//!   registers, replays it in order, then forwards every write live
//! - **Listeners**: [`TextBuffer`] (text-area style), [`ChannelListener`]
//!   (tokio channel into a UI loop), or any `Fn(&str)`
//! - **Subscriber wiring**: console, JSONL file and log window outputs,
//!   each with its own level filter
//!
//! # Quick Start
//!
//! ```ignore
//! use portmapper_logging::{LogMessageWriter, PortMapperSubscriberBuilder, TextBuffer};
//!
//! let window = LogMessageWriter::new();
//! let _guard = PortMapperSubscriberBuilder::new()
//!     .with_log_window(window.clone())
//!     .init();
//!
//! tracing::info!("searching for routers");
//!
//! // Later, once the window exists
//! let text_area = TextBuffer::new();
//! window.register_listener(text_area.clone())?;
//! ```

pub mod config;
pub mod error;
pub mod listener;
pub mod writer;

pub use config::{ConsoleConfig, FileConfig, LogConfig, RotationStrategy, WindowConfig};
pub use error::{LoggingError, LoggingResult};
pub use listener::{ChannelListener, LogMessageListener, TextBuffer};
pub use writer::{LogMessageWriter, TextSink};

use std::fs::{self, File};
use std::io;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// A type-erased output layer over the base registry
pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// The subscriber assembled by [`PortMapperSubscriberBuilder`]
pub type PortMapperSubscriber = Layered<Vec<BoxedLayer>, Registry>;

/// Builder for configuring and initializing the PortMapper logging subscriber
///
/// By default events go to a pretty console and, once a writer is supplied
/// through [`with_log_window`](Self::with_log_window), to the log window.
pub struct PortMapperSubscriberBuilder {
    config: LogConfig,
    window: Option<LogMessageWriter>,
}

impl PortMapperSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
            window: None,
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// Send formatted events to `writer`, which feeds the log window
    pub fn with_log_window(mut self, writer: LogMessageWriter) -> Self {
        self.window = Some(writer);
        self
    }

    /// Build one layer per enabled output
    ///
    /// The guard must be kept alive while file output is in use.
    pub fn build_layers(&self) -> LoggingResult<(Vec<BoxedLayer>, Option<WorkerGuard>)> {
        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guard = None;

        if self.config.console.enabled {
            let filter = level_filter(
                self.config.console.level.as_deref(),
                &self.config.default_level,
            );
            let layer: BoxedLayer = if self.config.console.pretty {
                tracing_subscriber::fmt::layer()
                    .with_ansi(self.config.console.ansi)
                    .with_target(true)
                    .with_filter(filter)
                    .boxed()
            } else {
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .flatten_event(true)
                    .with_filter(filter)
                    .boxed()
            };
            layers.push(layer);
        }

        if let Some(file_config) = &self.config.file {
            let (non_blocking, file_guard) = create_file_writer(file_config)?;
            guard = Some(file_guard);

            layers.push(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .flatten_event(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_writer(non_blocking)
                    .with_filter(level_filter(None, &self.config.default_level))
                    .boxed(),
            );
        }

        if let Some(window) = self.window.as_ref().filter(|_| self.config.window.enabled) {
            layers.push(
                tracing_subscriber::fmt::layer()
                    .with_writer(window.clone())
                    .with_ansi(false)
                    .without_time()
                    .with_target(self.config.window.show_target)
                    .with_filter(level_filter(
                        self.config.window.level.as_deref(),
                        &self.config.default_level,
                    ))
                    .boxed(),
            );
        }

        Ok((layers, guard))
    }

    /// Build the subscriber without installing it
    ///
    /// Useful with [`tracing::subscriber::with_default`] for scoped logging.
    pub fn build(&self) -> LoggingResult<(PortMapperSubscriber, Option<WorkerGuard>)> {
        let (layers, guard) = self.build_layers()?;
        Ok((Registry::default().with(layers), guard))
    }

    /// Try to initialize the subscriber globally
    ///
    /// Returns an error if a global subscriber has already been set or a
    /// log file cannot be opened.
    pub fn try_init(self) -> LoggingResult<Option<WorkerGuard>> {
        let (subscriber, guard) = self.build()?;
        subscriber
            .try_init()
            .map_err(|e| LoggingError::SubscriberInit(e.to_string()))?;
        Ok(guard)
    }

    /// Initialize the subscriber globally
    ///
    /// Failures are reported on stderr; the application keeps running
    /// without the affected outputs.
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: Failed to initialize logging: {}", e);
                None
            }
        }
    }
}

impl Default for PortMapperSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Level filter for one output
///
/// An explicit output level always applies. Without one, RUST_LOG wins over
/// the default level.
fn level_filter(explicit: Option<&str>, default_level: &str) -> EnvFilter {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    resolve_filter(explicit, env.as_deref(), default_level)
}

fn resolve_filter(explicit: Option<&str>, env: Option<&str>, default_level: &str) -> EnvFilter {
    if let Some(level) = explicit {
        return EnvFilter::new(level);
    }
    env.and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default_level))
}

/// Open the file writer; truncates for `Never` rotation, appends for others
fn create_file_writer(file_config: &FileConfig) -> LoggingResult<(NonBlocking, WorkerGuard)> {
    let rotation = match file_config.rotation {
        RotationStrategy::Never => {
            fs::create_dir_all(&file_config.directory)?;
            let file_path = file_config
                .directory
                .join(format!("{}.log", file_config.prefix));
            let file = File::create(&file_path)?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&file_config.prefix)
        .build(&file_config.directory)
        .map_err(io::Error::other)?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize console logging and route events to `window`
pub fn init_with_window(window: &LogMessageWriter) -> Option<WorkerGuard> {
    PortMapperSubscriberBuilder::new()
        .with_log_window(window.clone())
        .init()
}

/// Initialize logging for development (verbose, pretty console output)
pub fn init_development(window: &LogMessageWriter) -> Option<WorkerGuard> {
    PortMapperSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .with_log_window(window.clone())
        .init()
}

/// Initialize logging for testing (minimal output)
pub fn init_testing() {
    let _ = PortMapperSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}
