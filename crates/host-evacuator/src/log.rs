//! Logging facilities.

use std::rc::Rc;

use atty::Stream;
use colored::{Color, ColoredString, Colorize};

use crate::clock::Clock;

/// Applies the color to the string if stderr (log) goes to console.
pub fn get_colored(s: &str, color: Color) -> ColoredString {
    if atty::is(Stream::Stderr) {
        s.color(color)
    } else {
        s.normal()
    }
}

/// Named component together with the clock of the run, used as the first argument of logging macros.
#[derive(Clone)]
pub struct LogContext {
    name: String,
    clock: Rc<dyn Clock>,
}

impl LogContext {
    pub fn new(name: &str, clock: Rc<dyn Clock>) -> Self {
        Self {
            name: name.to_string(),
            clock,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of seconds since the start of the run.
    pub fn time(&self) -> f64 {
        self.clock.now()
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_with_context {
    ($level:ident, $tag:expr, $color:ident, $ctx:expr, $msg:expr) => (
        log::$level!(
            target: $ctx.name(),
            "[{:.3} {} {}] {}",
            $ctx.time(), $crate::log::get_colored($tag, $crate::colored::Color::$color), $ctx.name(), $msg
        )
    );
    ($level:ident, $tag:expr, $color:ident, $ctx:expr, $format:expr, $($arg:tt)+) => (
        log::$level!(
            target: $ctx.name(),
            concat!("[{:.3} {} {}] ", $format),
            $ctx.time(), $crate::log::get_colored($tag, $crate::colored::Color::$color), $ctx.name(), $($arg)+
        )
    );
}

/// Logs a message at the info level.
///
/// The first argument is a [`LogContext`], the rest are the same as in [`log::info!`].
///
/// # Examples
///
/// ```rust
/// use std::io::Write;
/// use std::rc::Rc;
/// use env_logger::Builder;
/// use host_evacuator::clock::SystemClock;
/// use host_evacuator::log::LogContext;
/// use host_evacuator::log_info;
///
/// Builder::from_default_env()
///     .format(|buf, record| writeln!(buf, "{}", record.args()))
///     .init();
///
/// let ctx = LogContext::new("evacuator", Rc::new(SystemClock::new()));
/// log_info!(ctx, "evacuating host {}", "compute5");
/// ```
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_context!(info, "INFO", Green, $ctx, $($arg)+));
}

/// Logs a message at the debug level.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_context!(debug, "DEBUG", Blue, $ctx, $($arg)+));
}

/// Logs a message at the trace level.
#[macro_export]
macro_rules! log_trace {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_context!(trace, "TRACE", Cyan, $ctx, $($arg)+));
}

/// Logs a message at the warn level.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_context!(warn, "WARN", Yellow, $ctx, $($arg)+));
}

/// Logs a message at the error level.
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_context!(error, "ERROR", Red, $ctx, $($arg)+));
}
