//! Logging setup shared by the `jigsaw` binary and tests.
//!
//! By default only records from the workspace crates (`jigsaw*` targets) are
//! shown, so dependency chatter stays out of planner logs:
//!
//! ```text
//! [   0.012s  INFO jigsaw_solver::manager] matched 3 of 3 measured pieces (Greedy)
//! ```

use std::fmt::Display;
use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, fmt::format::FmtSpan, EnvFilter};

/// What the stderr logger prints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogConfig {
    pub level: LevelFilter,
    /// Target prefixes to keep; empty keeps everything.
    pub modules: Vec<String>,
    /// Prefix lines with seconds since the logger was installed.
    pub elapsed: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            modules: vec!["jigsaw".to_string()],
            elapsed: true,
        }
    }
}

impl LogConfig {
    fn keeps(&self, target: &str) -> bool {
        self.modules.is_empty() || self.modules.iter().any(|m| target.starts_with(m.as_str()))
    }
}

struct StderrLogger {
    config: LogConfig,
    started: Instant,
}

fn render(
    elapsed: Option<f64>,
    level: log::Level,
    target: &str,
    message: &dyn Display,
) -> String {
    match elapsed {
        Some(t) => format!("[{t:8.3}s {level:>5} {target}] {message}"),
        None => format!("[{level:>5} {target}] {message}"),
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.config.level && self.config.keeps(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let elapsed = self
            .config
            .elapsed
            .then(|| self.started.elapsed().as_secs_f64());
        let line = render(elapsed, record.level(), record.target(), record.args());
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger. The first configuration wins; later calls
/// return `Ok` without changing it.
pub fn init(config: LogConfig) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let level = config.level;
    let logger = LOGGER.get_or_init(|| StderrLogger {
        config,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// [`init`] with the default module filter at `level`.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    init(LogConfig {
        level,
        ..LogConfig::default()
    })
}

/// Route `log` records and `tracing` spans into one `tracing-subscriber`
/// filtered by `RUST_LOG` (default `info`), as plain text or JSON lines.
///
/// Span close events are reported so instrumented solver turns show their timing.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true);
    let installed = if json {
        tracing::subscriber::set_global_default(builder.json().flatten_event(true).finish())
    } else {
        tracing::subscriber::set_global_default(
            builder.with_timer(fmt::time::Uptime::default()).finish(),
        )
    };
    if installed.is_ok() {
        let _ = tracing_log::LogTracer::init();
    }
}
