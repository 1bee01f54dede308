//! Leveled stderr logging for assignment runs. Every line carries a level
//! tag, and while a team is being processed the allocator installs a scope
//! label so bundle-by-bundle output stays attributable to its team.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    fn tag(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

static LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static SCOPE: Mutex<Option<String>> = Mutex::new(None);

pub fn set_log_level(level: LogLevel) {
    LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn current_log_level() -> LogLevel {
    match LEVEL.load(Ordering::Relaxed) {
        0 => LogLevel::Error,
        1 => LogLevel::Warn,
        2 => LogLevel::Info,
        _ => LogLevel::Debug,
    }
}

/// Parse a log level string. Returns `Err` with a message for invalid input.
pub fn parse_log_level(s: &str) -> Result<LogLevel, String> {
    match s.to_lowercase().as_str() {
        "error" => Ok(LogLevel::Error),
        "warn" => Ok(LogLevel::Warn),
        "info" => Ok(LogLevel::Info),
        "debug" => Ok(LogLevel::Debug),
        _ => Err(format!(
            "Invalid log level '{}': expected error, warn, info, or debug",
            s
        )),
    }
}

/// Prefix log lines with `label` until the returned guard drops.
pub fn scope(label: impl Into<String>) -> ScopeGuard {
    if let Ok(mut slot) = SCOPE.lock() {
        *slot = Some(label.into());
    }
    ScopeGuard
}

pub struct ScopeGuard;

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if let Ok(mut slot) = SCOPE.lock() {
            *slot = None;
        }
    }
}

fn line(level: LogLevel, scope: Option<&str>, args: fmt::Arguments<'_>) -> String {
    match scope {
        Some(label) => format!("[{}] {}: {}", level.tag(), label, args),
        None => format!("[{}] {}", level.tag(), args),
    }
}

pub fn emit(level: LogLevel, args: fmt::Arguments<'_>) {
    if level > current_log_level() {
        return;
    }
    let scope = SCOPE.lock().ok().and_then(|slot| slot.clone());
    eprintln!("{}", line(level, scope.as_deref(), args));
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::log::emit($crate::log::LogLevel::Warn, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::log::emit($crate::log::LogLevel::Info, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::log::emit($crate::log::LogLevel::Debug, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("error").unwrap(), LogLevel::Error);
        assert_eq!(parse_log_level("warn").unwrap(), LogLevel::Warn);
        assert_eq!(parse_log_level("info").unwrap(), LogLevel::Info);
        assert_eq!(parse_log_level("Debug").unwrap(), LogLevel::Debug);
        assert!(parse_log_level("verbose").is_err());
    }

    #[test]
    fn test_lines_carry_level_tag_and_scope() {
        let bare = line(LogLevel::Warn, None, format_args!("pool drained"));
        assert_eq!(bare, "[warn] pool drained");

        let scoped = line(
            LogLevel::Debug,
            Some("team EMEA"),
            format_args!("bundle of {} lead(s)", 5),
        );
        assert_eq!(scoped, "[debug] team EMEA: bundle of 5 lead(s)");
    }

    #[test]
    fn test_scope_guard_clears_label_on_drop() {
        {
            let _guard = scope("team APAC");
            let held = SCOPE.lock().unwrap().clone();
            assert_eq!(held.as_deref(), Some("team APAC"));
        }
        assert_eq!(*SCOPE.lock().unwrap(), None);
    }

    #[test]
    fn test_level_threshold_round_trip() {
        set_log_level(LogLevel::Debug);
        assert_eq!(current_log_level(), LogLevel::Debug);
        set_log_level(LogLevel::Error);
        assert_eq!(current_log_level(), LogLevel::Error);
        // Restore default for other tests
        set_log_level(LogLevel::Info);
    }
}
