use anyhow::{anyhow, Context, Result};
use std::io;
use std::path::Path;
use std::str::FromStr;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::domain::models::config::{LogFormat, LoggingConfig, RotationPolicy};

const LOG_FILE_NAME: &str = "driftscan.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Process-wide scan logger
///
/// Events go to stderr so stdout stays free for scan results, and to a
/// rolling JSON file when `log_dir` is set. Hold the value until exit:
/// dropping it flushes the file writer.
pub struct LoggerImpl {
    file_guard: Option<WorkerGuard>,
}

impl LoggerImpl {
    /// Install the global subscriber
    ///
    /// `RUST_LOG` directives take precedence over `config.level`.
    ///
    /// # Errors
    /// Fails on an unknown level, or when a global subscriber is already set
    pub fn init(config: &LoggingConfig) -> Result<Self> {
        let level = level_from_config(&config.level)?;
        let filter = EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy();

        let mut layers = vec![console_layer(config.format)];
        let file_guard = config.log_dir.as_deref().map(|dir| {
            let (layer, guard) = json_file_layer(appender(dir, config.rotation));
            layers.push(layer);
            guard
        });

        tracing_subscriber::registry()
            .with(layers)
            .with(filter)
            .try_init()
            .context("a global tracing subscriber is already installed")?;

        tracing::debug!(
            %level,
            format = ?config.format,
            log_dir = ?config.log_dir,
            rotation = ?config.rotation,
            "scan logging ready"
        );

        Ok(Self { file_guard })
    }

    /// Whether log events are also written to a file
    pub fn writes_file(&self) -> bool {
        self.file_guard.is_some()
    }
}

fn console_layer(format: LogFormat) -> BoxedLayer {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(true);
    match format {
        LogFormat::Json => layer.json().with_current_span(true).boxed(),
        LogFormat::Pretty => layer.pretty().with_file(false).boxed(),
    }
}

fn appender(dir: &Path, rotation: RotationPolicy) -> RollingFileAppender {
    match rotation {
        RotationPolicy::Daily => rolling::daily(dir, LOG_FILE_NAME),
        RotationPolicy::Hourly => rolling::hourly(dir, LOG_FILE_NAME),
        RotationPolicy::Never => rolling::never(dir, LOG_FILE_NAME),
    }
}

/// One JSON object per line, with the enclosing spans so every event of a
/// scan carries its `scan_id`
fn json_file_layer(appender: RollingFileAppender) -> (BoxedLayer, WorkerGuard) {
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(writer)
        .with_ansi(false)
        .with_current_span(true)
        .with_span_list(true)
        .with_thread_ids(true)
        .boxed();
    (layer, guard)
}

fn level_from_config(level: &str) -> Result<Level> {
    Level::from_str(level.trim()).map_err(|_| anyhow!("unknown log level `{level}`"))
}
