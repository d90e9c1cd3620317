use colored::{ColoredString, Colorize};
use once_cell::sync::Lazy;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Step,
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    const ALL: [LogLevel; 5] = [
        LogLevel::Step,
        LogLevel::Info,
        LogLevel::Success,
        LogLevel::Warning,
        LogLevel::Error,
    ];

    fn tag(self) -> &'static str {
        match self {
            LogLevel::Step => "STEP",
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }

    fn paint(self, text: &str) -> ColoredString {
        match self {
            LogLevel::Step => text.magenta(),
            LogLevel::Info => text.cyan(),
            LogLevel::Success => text.green(),
            LogLevel::Warning => text.yellow(),
            LogLevel::Error => text.red(),
        }
    }
}

static PREFIX_WIDTH: Lazy<usize> = Lazy::new(|| {
    LogLevel::ALL
        .iter()
        .map(|level| level.tag().len() + 4)
        .max()
        .unwrap_or(11)
        + 1
});

static LOG_PREFIXES: Lazy<HashMap<LogLevel, String>> = Lazy::new(|| {
    LogLevel::ALL
        .iter()
        .map(|&level| {
            let inner = format!(" {} ", level.tag());
            let padding = PREFIX_WIDTH.saturating_sub(level.tag().len() + 4);
            (
                level,
                format!("[{}]{}", level.paint(&inner).bold(), " ".repeat(padding)),
            )
        })
        .collect()
});

pub fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let format = tracing_subscriber::fmt::format()
        .without_time()
        .with_level(false)
        .with_target(false)
        .compact();

    // stdout is reserved for command output such as `--json`.
    let _ = tracing_subscriber::fmt()
        .event_format(format)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_env_filter(filter)
        .try_init();
}

pub fn log(level: LogLevel, message: &str) {
    let prefix = LOG_PREFIXES
        .get(&level)
        .map(String::as_str)
        .unwrap_or_default();

    match level {
        LogLevel::Step => tracing::info!(target: "step", "{}{}", prefix, message),
        LogLevel::Info | LogLevel::Success => tracing::info!("{}{}", prefix, message),
        LogLevel::Warning => tracing::warn!("{}{}", prefix, message),
        LogLevel::Error => tracing::error!("{}{}", prefix, message),
    }
}
