//! Logging facilities.
//!
//! The macros take any value with a `name()` method returning `&str` (every storsim component has one)
//! and use it both as the log target and as the message prefix.

use atty::Stream;
use colored::{Color, ColoredString, Colorize};

/// Applies the color to the string if stderr (log) goes to console.
pub fn get_colored(s: &str, color: Color) -> ColoredString {
    if atty::is(Stream::Stderr) {
        s.color(color)
    } else {
        s.normal()
    }
}

/// Logs a message at the info level.
///
/// # Examples
///
/// ```rust
/// use storsim_core::log_info;
///
/// struct Component {
///     name: String,
/// }
///
/// impl Component {
///     fn name(&self) -> &str {
///         &self.name
///     }
///
///     fn start(&self) {
///         log_info!(self, "started");
///     }
/// }
///
/// let comp = Component { name: "comp".to_string() };
/// comp.start();
/// ```
#[macro_export]
macro_rules! log_info {
    ($comp:expr, $msg:expr) => (
        log::info!(
            target: $comp.name(),
            "[{}  {}] {}",
            $crate::log::get_colored("INFO", $crate::colored::Color::Green), $comp.name(), $msg
        )
    );
    ($comp:expr, $format:expr, $($arg:tt)+) => (
        log::info!(
            target: $comp.name(),
            concat!("[{}  {}] ", $format),
            $crate::log::get_colored("INFO", $crate::colored::Color::Green), $comp.name(), $($arg)+
        )
    );
}

/// Logs a message at the debug level.
///
/// # Examples
///
/// See [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_debug {
    ($comp:expr, $msg:expr) => (
        log::debug!(
            target: $comp.name(),
            "[{} {}] {}",
            $crate::log::get_colored("DEBUG", $crate::colored::Color::Blue), $comp.name(), $msg
        )
    );
    ($comp:expr, $format:expr, $($arg:tt)+) => (
        log::debug!(
            target: $comp.name(),
            concat!("[{} {}] ", $format),
            $crate::log::get_colored("DEBUG", $crate::colored::Color::Blue), $comp.name(), $($arg)+
        )
    );
}

/// Logs a message at the trace level.
///
/// # Examples
///
/// See [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_trace {
    ($comp:expr, $msg:expr) => (
        log::trace!(
            target: $comp.name(),
            "[{} {}] {}",
            $crate::log::get_colored("TRACE", $crate::colored::Color::Cyan), $comp.name(), $msg
        )
    );
    ($comp:expr, $format:expr, $($arg:tt)+) => (
        log::trace!(
            target: $comp.name(),
            concat!("[{} {}] ", $format),
            $crate::log::get_colored("TRACE", $crate::colored::Color::Cyan), $comp.name(), $($arg)+
        )
    );
}

/// Logs a message at the warn level.
///
/// # Examples
///
/// See [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_warn {
    ($comp:expr, $msg:expr) => (
        log::warn!(
            target: $comp.name(),
            "[{}  {}] {}",
            $crate::log::get_colored("WARN", $crate::colored::Color::Yellow), $comp.name(), $msg
        )
    );
    ($comp:expr, $format:expr, $($arg:tt)+) => (
        log::warn!(
            target: $comp.name(),
            concat!("[{}  {}] ", $format),
            $crate::log::get_colored("WARN", $crate::colored::Color::Yellow), $comp.name(), $($arg)+
        )
    );
}
