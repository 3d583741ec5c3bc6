use parking_lot::Mutex;
/// Debug logging for the tab-tree engine
///
/// Controlled by the DEBUG_LEVEL environment variable:
/// - 0 or unset: No debugging
/// - 1: Errors only
/// - 2: Info level (window moves, reconciliation, persistence)
/// - 3: Debug level (every tree mutation)
/// - 4: Trace level (every event and request)
///
/// Output goes to `tab_tree_debug.log` in the system temp directory, so the
/// CLI's stdout stays clean for JSON output.
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Debug level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugLevel {
    Off = 0,
    Error = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl DebugLevel {
    fn from_env() -> Self {
        match std::env::var("DEBUG_LEVEL") {
            Ok(val) => Self::from_number(val.trim().parse::<u8>().unwrap_or(0)),
            Err(_) => DebugLevel::Off,
        }
    }

    fn from_number(n: u8) -> Self {
        match n {
            1 => DebugLevel::Error,
            2 => DebugLevel::Info,
            3 => DebugLevel::Debug,
            4 => DebugLevel::Trace,
            _ => DebugLevel::Off,
        }
    }

    fn from_log_level(level: log::Level) -> Self {
        match level {
            log::Level::Error => DebugLevel::Error,
            log::Level::Warn | log::Level::Info => DebugLevel::Info,
            log::Level::Debug => DebugLevel::Debug,
            log::Level::Trace => DebugLevel::Trace,
        }
    }

    fn from_level_filter(filter: log::LevelFilter) -> Self {
        match filter.to_level() {
            Some(level) => Self::from_log_level(level),
            None => DebugLevel::Off,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            DebugLevel::Off => "OFF  ",
            DebugLevel::Error => "ERROR",
            DebugLevel::Info => "INFO ",
            DebugLevel::Debug => "DEBUG",
            DebugLevel::Trace => "TRACE",
        }
    }
}

/// Path of the debug log file
pub fn log_path() -> std::path::PathBuf {
    std::env::temp_dir().join("tab_tree_debug.log")
}

/// Global debug logger
struct DebugLogger {
    level: DebugLevel,
    file: Option<std::fs::File>,
}

impl DebugLogger {
    fn new() -> Self {
        let mut logger = DebugLogger {
            level: DebugLevel::from_env(),
            file: None,
        };
        if logger.level != DebugLevel::Off {
            logger.open_file();
        }
        logger
    }

    fn open_file(&mut self) {
        if self.file.is_some() {
            return;
        }
        // Silently skip file logging if the file can't be opened
        if let Ok(f) = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(log_path())
        {
            self.file = Some(f);
            self.write_raw(&format!(
                "\n{}\ntab-tree debug session started at {} (level={:?})\n{}\n",
                "=".repeat(80),
                get_timestamp(),
                self.level,
                "=".repeat(80)
            ));
        }
    }

    fn set_level(&mut self, level: DebugLevel) {
        self.level = level;
        if level != DebugLevel::Off {
            self.open_file();
        }
    }

    fn write_raw(&mut self, msg: &str) {
        if let Some(ref mut file) = self.file {
            let _ = file.write_all(msg.as_bytes());
            let _ = file.flush();
        }
    }

    fn log(&mut self, level: DebugLevel, category: &str, msg: &str) {
        if level == DebugLevel::Off || level > self.level {
            return;
        }
        self.write_raw(&format!(
            "[{}] [{}] [{}] {}\n",
            get_timestamp(),
            level.label(),
            category,
            msg
        ));
    }
}

static LOGGER: OnceLock<Mutex<DebugLogger>> = OnceLock::new();

fn get_logger() -> &'static Mutex<DebugLogger> {
    LOGGER.get_or_init(|| Mutex::new(DebugLogger::new()))
}

fn get_timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:06}", now.as_secs(), now.subsec_micros())
}

/// Check if debugging is enabled at given level
pub fn is_enabled(level: DebugLevel) -> bool {
    let logger = get_logger().lock();
    level <= logger.level
}

/// Log a message at specified level
pub fn log(level: DebugLevel, category: &str, msg: &str) {
    let mut logger = get_logger().lock();
    logger.log(level, category, msg);
}

/// Log formatted message
pub fn logf(level: DebugLevel, category: &str, args: fmt::Arguments) {
    if is_enabled(level) {
        log(level, category, &format!("{}", args));
    }
}

// ============================================================================
// `log` crate bridge
// ============================================================================

/// Routes `log::info!()` and friends into the debug log file.
/// Mirrors to stderr when `RUST_LOG` is set.
struct LogBridge {
    mirror_stderr: bool,
}

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let category = record.target().rsplit("::").next().unwrap_or("log");
        let level = DebugLevel::from_log_level(record.level());
        log(level, category, &record.args().to_string());
        if self.mirror_stderr {
            eprintln!("[{}] [{}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static BRIDGE: OnceLock<LogBridge> = OnceLock::new();

/// Install the `log` bridge.
///
/// Precedence: the explicit `level` (CLI flag), then `RUST_LOG`, then
/// `DEBUG_LEVEL`. Config `log_level` is applied later through
/// [`apply_log_level`]. Calling this more than once is harmless.
pub fn init_log_bridge(level: Option<log::LevelFilter>) {
    let rust_log = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| v.trim().parse::<log::LevelFilter>().ok());

    let filter = level.or(rust_log).unwrap_or_else(|| {
        match get_logger().lock().level {
            DebugLevel::Off => log::LevelFilter::Off,
            DebugLevel::Error => log::LevelFilter::Error,
            DebugLevel::Info => log::LevelFilter::Info,
            DebugLevel::Debug => log::LevelFilter::Debug,
            DebugLevel::Trace => log::LevelFilter::Trace,
        }
    });

    let bridge = BRIDGE.get_or_init(|| LogBridge {
        mirror_stderr: rust_log.is_some(),
    });
    if log::set_logger(bridge).is_ok() {
        apply_filter(filter);
    }
}

/// Apply the configured log level unless a CLI flag or `RUST_LOG` already
/// chose one.
pub fn apply_log_level(level: tab_tree_config::LogLevel, cli_override: bool) {
    if cli_override || std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    apply_filter(level.to_level_filter());
}

fn apply_filter(filter: log::LevelFilter) {
    log::set_max_level(filter);
    let mut logger = get_logger().lock();
    let from_filter = DebugLevel::from_level_filter(filter);
    if from_filter > logger.level {
        logger.set_level(from_filter);
    }
}

// Convenience macros for logging
#[macro_export]
macro_rules! debug_info {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Info, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_log {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Debug, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_trace {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Trace, $category, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_level_from_number() {
        assert_eq!(DebugLevel::from_number(0), DebugLevel::Off);
        assert_eq!(DebugLevel::from_number(2), DebugLevel::Info);
        assert_eq!(DebugLevel::from_number(4), DebugLevel::Trace);
        assert_eq!(DebugLevel::from_number(9), DebugLevel::Off);
    }

    #[test]
    fn test_level_filter_mapping() {
        assert_eq!(
            DebugLevel::from_level_filter(log::LevelFilter::Off),
            DebugLevel::Off
        );
        assert_eq!(
            DebugLevel::from_level_filter(log::LevelFilter::Warn),
            DebugLevel::Info
        );
        assert_eq!(
            DebugLevel::from_level_filter(log::LevelFilter::Trace),
            DebugLevel::Trace
        );
    }
}
