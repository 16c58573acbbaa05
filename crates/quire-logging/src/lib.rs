//! Logging setup for Quire
//!
//! Libraries in this workspace only emit `tracing` events and spans. This
//! crate turns them into output: JSON lines, pretty or compact text on
//! stderr, and optionally a rotating JSONL file via `tracing-appender`.
//! [`RunContext`] opens the `publish_run` span, so every line of one
//! publish run carries the same `run_id`.
//!
//! ```ignore
//! use quire_logging::{LogConfig, QuireSubscriberBuilder, RunContext};
//!
//! let _guard = QuireSubscriberBuilder::new()
//!     .with_config(LogConfig::production("/var/log/quire"))
//!     .init()?;
//!
//! let ctx = RunContext::new("My Book");
//! async { tracing::info!("compiling") }.instrument(ctx.span()).await;
//! ```

pub mod config;
pub mod context;
pub mod fields;

pub use config::{ConsoleSink, FileSink, JsonFields, LogConfig, LogFormat, Rotation};
pub use context::RunContext;

use thiserror::Error;
use tracing::Subscriber;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{directive}': {reason}")]
    InvalidFilter { directive: String, reason: String },

    #[error("Failed to open log file: {0}")]
    File(String),

    #[error("A global subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Builds and installs the Quire `tracing` subscriber
///
/// Console output goes to stderr, so stdout stays free for
/// machine-readable reports.
#[derive(Debug, Clone, Default)]
pub struct QuireSubscriberBuilder {
    config: LogConfig,
}

impl QuireSubscriberBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Filter directive used when `RUST_LOG` is unset
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    pub fn with_console(mut self, format: LogFormat) -> Self {
        let sink = self.config.console.get_or_insert_with(ConsoleSink::default);
        sink.format = format;
        self
    }

    pub fn without_console(mut self) -> Self {
        self.config.console = None;
        self
    }

    pub fn with_file(mut self, sink: FileSink) -> Self {
        self.config.file = Some(sink);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Install the subscriber globally
    ///
    /// The returned guard flushes the file writer on drop; hold it until
    /// the program exits.
    pub fn init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => parse_filter(&self.config.level)?,
        };
        let (layers, guard) = self.layers::<Registry>()?;

        Registry::default()
            .with(layers)
            .with(filter)
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;
        Ok(guard)
    }

    /// Build one layer per configured sink without installing anything
    pub fn layers<S>(&self) -> Result<(Vec<BoxedLayer<S>>, Option<WorkerGuard>), LoggingError>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let mut layers = Vec::new();
        let mut guard = None;

        if let Some(console) = &self.config.console {
            let layer = match console.format {
                LogFormat::Json => self.json_layer(std::io::stderr),
                LogFormat::Pretty => tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_ansi(console.color)
                    .with_writer(std::io::stderr)
                    .boxed(),
                LogFormat::Compact => tracing_subscriber::fmt::layer()
                    .compact()
                    .with_ansi(console.color)
                    .with_writer(std::io::stderr)
                    .boxed(),
            };
            layers.push(match &console.filter {
                Some(directive) => layer.with_filter(parse_filter(directive)?).boxed(),
                None => layer,
            });
        }

        if let Some(file) = &self.config.file {
            let (writer, worker) = file_writer(file)?;
            layers.push(self.json_layer(writer));
            guard = Some(worker);
        }

        Ok((layers, guard))
    }

    fn json_layer<S, W>(&self, writer: W) -> BoxedLayer<S>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let fields = &self.config.json;
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(fields.current_span)
            .with_span_list(fields.span_list)
            .with_file(fields.source_location)
            .with_line_number(fields.source_location)
            .with_thread_ids(fields.thread_ids)
            .with_writer(writer)
            .boxed()
    }
}

fn parse_filter(directive: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directive).map_err(|e| LoggingError::InvalidFilter {
        directive: directive.to_string(),
        reason: e.to_string(),
    })
}

fn file_writer(sink: &FileSink) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    let rotation = match sink.rotation {
        Rotation::Daily => rolling::Rotation::DAILY,
        Rotation::Hourly => rolling::Rotation::HOURLY,
        Rotation::Never => rolling::Rotation::NEVER,
    };
    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(sink.prefix.as_str())
        .filename_suffix("log");
    if let Some(keep) = sink.keep {
        builder = builder.max_log_files(keep);
    }
    let appender = builder
        .build(&sink.directory)
        .map_err(|e| LoggingError::File(e.to_string()))?;
    Ok(tracing_appender::non_blocking(appender))
}

/// JSONL to stderr at `info`
pub fn init_default() -> Result<Option<WorkerGuard>, LoggingError> {
    QuireSubscriberBuilder::new().init()
}

pub fn init_development() -> Result<Option<WorkerGuard>, LoggingError> {
    QuireSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
}

/// Warnings only; a subscriber installed earlier is left in place
pub fn init_testing() {
    let _ = QuireSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .init();
}
