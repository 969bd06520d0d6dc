use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const PIXPACK_TARGETS: [&str; 4] = [
    "pixpack",
    "pixpack_transport",
    "pixpack_frame",
    "pixpack_pipeline",
];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// The pixpack crates log at `level`; everything else stays at warn or quieter.
pub fn target_filter(level: LogLevel) -> Targets {
    let level = level.as_filter();
    PIXPACK_TARGETS.iter().fold(
        Targets::new().with_default(level.min(LevelFilter::WARN)),
        |targets, name| targets.with_target(*name, level),
    )
}

/// Send library logs to stderr; stdout is reserved for reports.
///
/// Thread names are included so producer and consumer lines can be told apart.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_thread_names(true);
    let registry = tracing_subscriber::registry().with(target_filter(level));

    match format {
        LogFormat::Text => {
            let _ = registry.with(layer).try_init();
        }
        LogFormat::Json => {
            let _ = registry.with(layer.json()).try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_map_to_filters() {
        assert_eq!(LogLevel::Warn.as_filter(), LevelFilter::WARN);
        assert_eq!(LogLevel::Trace.as_filter(), LevelFilter::TRACE);
        assert!(LogLevel::Error.as_filter() < LogLevel::Debug.as_filter());
    }

    #[test]
    fn verbose_levels_only_apply_to_pixpack() {
        use tracing::Level;

        let filter = target_filter(LogLevel::Trace);
        assert!(filter.would_enable("pixpack_pipeline::run", &Level::TRACE));
        assert!(filter.would_enable("pixpack_frame::reader", &Level::DEBUG));
        assert!(!filter.would_enable("some_dependency", &Level::DEBUG));
        assert!(filter.would_enable("some_dependency", &Level::WARN));

        let filter = target_filter(LogLevel::Error);
        assert!(!filter.would_enable("pixpack_pipeline::run", &Level::WARN));
        assert!(!filter.would_enable("some_dependency", &Level::WARN));
    }
}
