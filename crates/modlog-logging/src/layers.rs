//! Output layers and writers for the modlog subscriber

use std::fs::{self, File};
use std::io;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{
    self, MakeWriter,
    format::{DefaultFields, Format, Full, Json, JsonFields},
};

use crate::LoggingError;
use crate::config::{FileConfig, JsonlConfig, RotationStrategy};

/// Writer handing out stderr
pub type StderrWriter = fn() -> io::Stderr;

/// JSON formatting layer over any writer, one event per line
pub fn jsonl_layer<S, W>(
    writer: W,
    config: &JsonlConfig,
) -> fmt::Layer<S, JsonFields, Format<Json>, W>
where
    W: for<'writer> MakeWriter<'writer> + 'static,
{
    fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_span_list(config.include_spans)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_writer(writer)
}

/// Create a human-readable layer writing to stderr
pub fn pretty_layer<S>(ansi: bool) -> fmt::Layer<S, DefaultFields, Format<Full>, StderrWriter> {
    fmt::layer()
        .with_ansi(ansi)
        .with_target(true)
        .with_writer(io::stderr as StderrWriter)
}

/// Create a JSONL layer writing to stderr
pub fn jsonl_console_layer<S>(
    config: &JsonlConfig,
) -> fmt::Layer<S, JsonFields, Format<Json>, StderrWriter> {
    jsonl_layer(io::stderr as StderrWriter, config)
}

/// Open the non-blocking writer for file output
///
/// `Never` truncates a single `{prefix}.log`; the rotating strategies append
/// to `{prefix}.{date}.log` and keep at most `max_files` files.
pub fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    let rotation = match config.rotation {
        RotationStrategy::Never => {
            fs::create_dir_all(&config.directory)?;
            let file = File::create(config.directory.join(format!("{}.log", config.prefix)))?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(config.prefix.as_str())
        .filename_suffix("log");
    if let Some(max_files) = config.max_files {
        builder = builder.max_log_files(max_files);
    }
    let appender = builder.build(&config.directory)?;

    Ok(tracing_appender::non_blocking(appender))
}
