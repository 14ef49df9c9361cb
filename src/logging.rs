//! Minimal `log` backend writing to stderr.

use log::{LevelFilter, Log, Metadata, Record};

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!(
                "[{:<5} {}] {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

/// Install the stderr logger. A second call only adjusts the level.
pub fn init(level: LevelFilter) {
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level);
}

/// `--trace` wins over `--verbose`, which wins over the environment value
/// (`error`, `warn`, `info`, `debug`, `trace` or `off`). Default is `warn`.
pub fn level_from(verbose: bool, trace: bool, env: Option<&str>) -> LevelFilter {
    if trace {
        return LevelFilter::Trace;
    }
    if verbose {
        return LevelFilter::Debug;
    }
    env.and_then(|value| value.trim().parse().ok())
        .unwrap_or(LevelFilter::Warn)
}
