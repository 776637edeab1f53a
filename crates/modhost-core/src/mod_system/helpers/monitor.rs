use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use log::Level;
use parking_lot::Mutex;

/// Destination for mod log lines.
///
/// Mod libraries carry their own copy of the `log` facade, whose global
/// logger is never installed. Routing through a host-owned sink makes
/// their lines reach the host's logger.
pub trait LogSink: Send + Sync {
    fn write(&self, source: &str, level: Level, message: &str);
}

/// Forwards to the host's `log` logger under the `modhost::mods` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCrateSink;

impl LogSink for LogCrateSink {
    fn write(&self, source: &str, level: Level, message: &str) {
        log::log!(target: "modhost::mods", level, "[{source}] {message}");
    }
}

/// A logger labelled with one mod's display name.
pub struct Monitor {
    source: String,
    sink: Arc<dyn LogSink>,
    verbose: bool,
    logged: Mutex<HashSet<(Level, String)>>,
}

impl Monitor {
    pub fn new(source: impl Into<String>, sink: Arc<dyn LogSink>, verbose: bool) -> Self {
        Self {
            source: source.into(),
            sink,
            verbose,
            logged: Mutex::new(HashSet::new()),
        }
    }

    /// Label prefixed to every line
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether [`verbose_log`](Self::verbose_log) lines are emitted.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn log(&self, message: &str, level: Level) {
        self.sink.write(&self.source, level, message);
    }

    /// Log a message only the first time it's seen at this level.
    pub fn log_once(&self, message: &str, level: Level) {
        if self.logged.lock().insert((level, message.to_string())) {
            self.log(message, level);
        }
    }

    /// Log at trace level when verbose logging is enabled for this mod.
    pub fn verbose_log(&self, message: &str) {
        if self.verbose {
            self.log(message, Level::Trace);
        }
    }

    pub fn trace(&self, message: &str) {
        self.log(message, Level::Trace);
    }

    pub fn debug(&self, message: &str) {
        self.log(message, Level::Debug);
    }

    pub fn info(&self, message: &str) {
        self.log(message, Level::Info);
    }

    pub fn warn(&self, message: &str) {
        self.log(message, Level::Warn);
    }

    pub fn error(&self, message: &str) {
        self.log(message, Level::Error);
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("source", &self.source)
            .field("verbose", &self.verbose)
            .finish()
    }
}
