use crate::severity::LogSeverity;
use crate::systime::now;
use once_cell::sync::Lazy;
use std::env;
use std::sync::atomic::{AtomicU8, Ordering};

/// Environment variable holding the minimum severity that gets printed.
pub const LOG_LEVEL_ENV: &str = "BLOCKFINDER_LOG";

static MIN_SEVERITY: Lazy<AtomicU8> = Lazy::new(|| {
    let initial = env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|value| value.parse::<LogSeverity>().ok())
        .unwrap_or(LogSeverity::Info);
    AtomicU8::new(initial.as_u8())
});

pub fn min_severity() -> LogSeverity {
    LogSeverity::from_u8(MIN_SEVERITY.load(Ordering::Relaxed))
}

pub fn set_min_severity(severity: LogSeverity) {
    MIN_SEVERITY.store(severity.as_u8(), Ordering::Relaxed);
}

pub fn enabled(severity: LogSeverity) -> bool {
    severity >= min_severity()
}

pub fn log(msg: String, log_severity: LogSeverity) {
    if enabled(log_severity) {
        println!("[{}] {} {}", log_severity, now(), msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_filters_lower_severities() {
        set_min_severity(LogSeverity::Warning);
        assert!(!enabled(LogSeverity::Info));
        assert!(enabled(LogSeverity::Warning));
        assert!(enabled(LogSeverity::Fatal));

        set_min_severity(LogSeverity::Debug);
        assert!(enabled(LogSeverity::Debug));
        assert_eq!(min_severity(), LogSeverity::Debug);
    }
}
