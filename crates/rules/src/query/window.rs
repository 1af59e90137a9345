//! Time windows bound to wall-clock time when a query is built.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::error::ConfigurationError;

/// Half-open `[start, end)` interval. Invariant: `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// The window ending now and spanning `duration`.
    pub fn last(duration: Duration) -> Result<Self, ConfigurationError> {
        Self::last_at(duration, Utc::now())
    }

    /// The window ending at `now` and spanning `duration`.
    pub fn last_at(duration: Duration, now: DateTime<Utc>) -> Result<Self, ConfigurationError> {
        if duration <= Duration::zero() {
            return Err(ConfigurationError::new(format!(
                "window duration must be positive, got {}s",
                duration.num_seconds()
            )));
        }
        let start = now.checked_sub_signed(duration).ok_or_else(|| {
            ConfigurationError::new(format!(
                "window of {}s reaches before the earliest representable time",
                duration.num_seconds()
            ))
        })?;
        Self::between(start, now)
    }

    /// An explicit absolute window.
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ConfigurationError> {
        if start >= end {
            return Err(ConfigurationError::new(format!(
                "window start {} is not before end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// How a rule asks for its window: relative to now, or pinned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSpec {
    Last(Duration),
    Pinned(TimeWindow),
}

impl WindowSpec {
    /// Bind to a concrete window. Relative specs are evaluated against `now`.
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<TimeWindow, ConfigurationError> {
        match self {
            WindowSpec::Last(duration) => TimeWindow::last_at(*duration, now),
            WindowSpec::Pinned(window) => Ok(*window),
        }
    }
}

impl From<Duration> for WindowSpec {
    fn from(duration: Duration) -> Self {
        WindowSpec::Last(duration)
    }
}

impl From<TimeWindow> for WindowSpec {
    fn from(window: TimeWindow) -> Self {
        WindowSpec::Pinned(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_spans_duration() {
        let now = Utc::now();
        let window = TimeWindow::last_at(Duration::minutes(15), now).unwrap();
        assert_eq!(window.end(), now);
        assert_eq!(window.end() - window.start(), Duration::minutes(15));
        assert!(window.contains(now - Duration::minutes(1)));
        assert!(!window.contains(now));
    }

    #[test]
    fn zero_or_negative_duration_rejected() {
        assert!(TimeWindow::last(Duration::zero()).is_err());
        assert!(TimeWindow::last(Duration::seconds(-5)).is_err());
    }

    #[test]
    fn out_of_range_duration_rejected() {
        let err = TimeWindow::last(Duration::days(100_000_000)).unwrap_err();
        assert!(err.to_string().contains("earliest representable"));
    }

    #[test]
    fn inverted_window_rejected() {
        let now = Utc::now();
        assert!(TimeWindow::between(now, now).is_err());
        assert!(TimeWindow::between(now, now - Duration::seconds(1)).is_err());
    }

    #[test]
    fn relative_windows_move_with_the_clock() {
        let spec = WindowSpec::from(Duration::minutes(10));
        let now = Utc::now();
        let first = spec.resolve(now).unwrap();
        let second = spec.resolve(now + Duration::seconds(1)).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn pinned_windows_are_stable() {
        let now = Utc::now();
        let window = TimeWindow::between(now - Duration::hours(1), now).unwrap();
        let spec = WindowSpec::from(window);
        assert_eq!(spec.resolve(now).unwrap(), spec.resolve(now + Duration::hours(3)).unwrap());
    }
}
