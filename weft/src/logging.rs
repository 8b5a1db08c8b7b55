// Logging for weft
//
// Built on the `tracing` ecosystem. The library itself only emits events and
// spans; installing a subscriber is up to the host, using one of the `init_*`
// functions below or its own.
//
// # Usage Examples
//
// ```rust
// use weft::logging;
//
// // INFO level, console output
// logging::init_default();
//
// // Or pick the settings
// let config = logging::LogConfig {
//     level: tracing::Level::DEBUG,
//     json_format: false,
//     ..Default::default()
// };
// logging::init(config);
// ```
//
// Unit threads inherit the dispatcher that was current on the thread that
// created the pool, so events raised inside deployed functions land in the
// same subscriber.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::{Mutex, Once};
use tracing::{Level, Subscriber};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

/// Configuration for the weft logging system
///
/// # Examples
///
/// ```rust
/// use weft::logging::LogConfig;
/// use tracing::Level;
///
/// let config = LogConfig {
///     level: Level::DEBUG,
///     json_format: true,
///     show_file_line: false,
///     show_thread_info: true,
///     show_time: true,
///     target_filters: Some("weft=debug,weft::proxy=trace".to_string()),
/// };
/// ```
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to use JSON format for logs
    pub json_format: bool,
    /// Whether to include file and line information
    pub show_file_line: bool,
    /// Whether to include thread name/id
    pub show_thread_info: bool,
    /// Whether to include timestamps
    pub show_time: bool,
    /// Target filter expressions (format: "target=level,target2=level2,...")
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_file_line: true,
            show_thread_info: true,
            show_time: true,
            target_filters: None,
        }
    }
}

// Initialization guard to ensure we only initialize once
static INIT: Once = Once::new();

fn env_filter(config: &LogConfig) -> EnvFilter {
    let mut env_filter = EnvFilter::from_default_env().add_directive(config.level.into());

    if let Some(filters) = &config.target_filters {
        for filter in filters.split(',') {
            if let Ok(directive) = filter.trim().parse() {
                env_filter = env_filter.add_directive(directive);
            }
        }
    }

    env_filter
}

/// Console layer shaped by `config`
fn console_layer<S>(config: &LogConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    let layer = fmt::layer()
        .with_file(config.show_file_line)
        .with_line_number(config.show_file_line)
        .with_thread_names(config.show_thread_info)
        .with_thread_ids(config.show_thread_info);

    if config.json_format {
        layer.json().flatten_event(true).boxed()
    } else if config.show_time {
        layer.with_ansi(atty::is(atty::Stream::Stdout)).boxed()
    } else {
        layer
            .without_time()
            .with_ansi(atty::is(atty::Stream::Stdout))
            .boxed()
    }
}

/// Initialize the logging system with the given configuration
///
/// Safe to call multiple times; only the first call takes effect.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let subscriber = tracing_subscriber::registry()
            .with(env_filter(&config))
            .with(console_layer(&config));
        if let Err(err) = subscriber.try_init() {
            eprintln!("weft: another tracing subscriber is already installed: {}", err);
        }
    });
}

/// Open `path` for appending log lines, creating it if needed
pub fn open_log_file(path: impl AsRef<Path>) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Initialize logging to the console and to `log_file`
///
/// The file is opened once and every event is appended to it as plain text,
/// always with location and thread details.
///
/// # Errors
/// Returns an error if the log file cannot be opened; nothing is installed then.
pub fn init_with_file(config: LogConfig, log_file: impl AsRef<Path>) -> io::Result<()> {
    let file = open_log_file(log_file)?;

    INIT.call_once(move || {
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_thread_ids(true);

        let subscriber = tracing_subscriber::registry()
            .with(env_filter(&config))
            .with(console_layer(&config))
            .with(file_layer);
        if let Err(err) = subscriber.try_init() {
            eprintln!("weft: another tracing subscriber is already installed: {}", err);
        }
    });

    Ok(())
}

/// INFO level with human-readable console output
pub fn init_default() {
    init(LogConfig::default());
}

/// DEBUG level for weft, TRACE for the correlation layer, colors and locations
pub fn init_development() {
    init(LogConfig {
        level: Level::DEBUG,
        json_format: false,
        show_file_line: true,
        show_thread_info: true,
        show_time: true,
        target_filters: Some("weft=debug,weft::proxy=trace".to_string()),
    });
}

/// JSON output for log aggregators, no file/line information
pub fn init_production() {
    init(LogConfig {
        level: Level::INFO,
        json_format: true,
        show_file_line: false,
        show_thread_info: true,
        show_time: true,
        target_filters: None,
    });
}

/// Warnings and errors only, compact
///
/// ```rust
/// #[test]
/// fn my_test() {
///     weft::logging::init_test();
///     // ...
/// }
/// ```
pub fn init_test() {
    init(LogConfig {
        level: Level::WARN,
        json_format: false,
        show_file_line: true,
        show_thread_info: false,
        show_time: false,
        target_filters: None,
    });
}

/// Create a span covering pool-level operations
///
/// ```rust
/// let span = weft::pool_span!("p-1");
/// let _guard = span.enter();
///
/// let span = weft::pool_span!("p-1", operation = "deploy");
/// ```
#[macro_export]
macro_rules! pool_span {
    ($pool_id:expr) => {
        $crate::__private::tracing::info_span!("pool", id = %$pool_id)
    };
    ($pool_id:expr, $($fields:tt)*) => {
        $crate::__private::tracing::info_span!("pool", id = %$pool_id, $($fields)*)
    };
}

/// Create a span covering the work of one execution unit
#[macro_export]
macro_rules! unit_span {
    ($unit_id:expr) => {
        $crate::__private::tracing::debug_span!("unit", id = %$unit_id)
    };
    ($unit_id:expr, $($fields:tt)*) => {
        $crate::__private::tracing::debug_span!("unit", id = %$unit_id, $($fields)*)
    };
}

/// Log unit lifecycle events
///
/// ```rust
/// weft::log_lifecycle!("u-1", "started");
/// weft::log_lifecycle!("u-1", "stopped", pool = "p-1");
/// ```
#[macro_export]
macro_rules! log_lifecycle {
    ($unit_id:expr, $event:expr) => {
        $crate::__private::tracing::info!(unit = %$unit_id, event = $event)
    };
    ($unit_id:expr, $event:expr, $($fields:tt)*) => {
        $crate::__private::tracing::info!(unit = %$unit_id, event = $event, $($fields)*)
    };
}

/// Log protocol traffic at debug level
///
/// ```rust
/// weft::log_protocol!("register", "sent", function = "f-1");
/// ```
#[macro_export]
macro_rules! log_protocol {
    ($kind:expr, $status:expr) => {
        $crate::__private::tracing::debug!(kind = $kind, status = $status)
    };
    ($kind:expr, $status:expr, $($fields:tt)*) => {
        $crate::__private::tracing::debug!(kind = $kind, status = $status, $($fields)*)
    };
}

/// Log error events
///
/// ```rust
/// let error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
/// weft::log_error!(error);
/// weft::log_error!(error, unit = "u-1");
/// ```
#[macro_export]
macro_rules! log_error {
    ($error:expr) => {
        $crate::__private::tracing::error!(error = %$error)
    };
    ($error:expr, $($fields:tt)*) => {
        $crate::__private::tracing::error!(error = %$error, $($fields)*)
    };
}

/// Get the current tracing dispatcher
///
/// Used when spawning unit threads so they log through the same subscriber.
#[inline]
pub fn current_subscriber() -> tracing::Dispatch {
    tracing::dispatcher::get_default(|d| d.clone())
}

// Re-export the most commonly used tracing macros for convenience
pub use tracing::{debug, error, info, trace, warn};
