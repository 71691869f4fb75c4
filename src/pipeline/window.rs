//! Time window applied to feed elements

use crate::config::WindowConfig;
use crate::ConfigError;
use chrono::{DateTime, NaiveDate, Utc};

/// Where an element's timestamp falls relative to the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowVerdict {
    /// Inside the window (or the window is disabled)
    Within,
    /// Newer than the end bound; skip it and keep scanning
    After,
    /// At or before the start bound; everything further down is older still
    AtOrBeforeStart,
}

/// Start/end bounds used to filter and terminate a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    enabled: bool,
}

impl WindowPolicy {
    /// Creates an enabled window
    ///
    /// Fails with [`ConfigError::InvalidWindow`] if `start` is after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::InvalidWindow(format!(
                "start {} is after end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self {
            start,
            end,
            enabled: true,
        })
    }

    /// A window that accepts every element and never stops a scan
    pub fn disabled() -> Self {
        Self {
            start: DateTime::<Utc>::MIN_UTC,
            end: DateTime::<Utc>::MAX_UTC,
            enabled: false,
        }
    }

    /// Builds the policy from the `[window]` section
    ///
    /// Date-only bounds cover whole days: the start bound is midnight of its
    /// day and the end bound is 23:59:59 of its day, both in UTC.
    pub fn from_config(config: &WindowConfig) -> Result<Self, ConfigError> {
        if !config.enabled {
            return Ok(Self::disabled());
        }

        let (Some(start), Some(end)) = (&config.start, &config.end) else {
            return Err(ConfigError::InvalidWindow(
                "an enabled window needs both start and end".to_string(),
            ));
        };

        let start = parse_bound(start, (0, 0, 0))?;
        let end = parse_bound(end, (23, 59, 59))?;
        Self::new(start, end)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Classifies a timestamp against the window
    pub fn judge(&self, timestamp: DateTime<Utc>) -> WindowVerdict {
        if !self.enabled {
            WindowVerdict::Within
        } else if timestamp <= self.start {
            WindowVerdict::AtOrBeforeStart
        } else if timestamp > self.end {
            WindowVerdict::After
        } else {
            WindowVerdict::Within
        }
    }

    /// Human-readable description, used in transcript headers and logs
    pub fn describe(&self) -> String {
        if self.enabled {
            format!("{} .. {}", self.start.to_rfc3339(), self.end.to_rfc3339())
        } else {
            "unbounded".to_string()
        }
    }
}

/// Parses `YYYY-MM-DD` (at the given time of day) or an RFC 3339 instant
fn parse_bound(raw: &str, (h, m, s): (u32, u32, u32)) -> Result<DateTime<Utc>, ConfigError> {
    let raw = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date
            .and_hms_opt(h, m, s)
            .map(|t| t.and_utc())
            .ok_or_else(|| ConfigError::InvalidWindow(format!("invalid time of day for '{}'", raw)));
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| {
            ConfigError::InvalidWindow(format!(
                "'{}' is neither YYYY-MM-DD nor an RFC 3339 instant",
                raw
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window_config(start: &str, end: &str) -> WindowConfig {
        WindowConfig {
            start: Some(start.to_string()),
            end: Some(end.to_string()),
            enabled: true,
        }
    }

    #[test]
    fn test_date_bounds_cover_whole_days() {
        let policy = WindowPolicy::from_config(&window_config("2025-06-01", "2025-06-10")).unwrap();

        assert_eq!(
            policy.start(),
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            policy.end(),
            Utc.with_ymd_and_hms(2025, 6, 10, 23, 59, 59).unwrap()
        );
    }

    #[test]
    fn test_rfc3339_bounds() {
        let policy = WindowPolicy::from_config(&window_config(
            "2025-06-01T08:00:00+02:00",
            "2025-06-01T12:00:00Z",
        ))
        .unwrap();
        assert_eq!(
            policy.start(),
            Utc.with_ymd_and_hms(2025, 6, 1, 6, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let result = WindowPolicy::from_config(&window_config("2025-06-10", "2025-06-01"));
        assert!(matches!(result, Err(ConfigError::InvalidWindow(_))));

        let start = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        assert!(WindowPolicy::new(start, end).is_err());
    }

    #[test]
    fn test_equal_bounds_allowed() {
        let instant = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        assert!(WindowPolicy::new(instant, instant).is_ok());
    }

    #[test]
    fn test_missing_or_garbage_bounds() {
        let missing = WindowConfig {
            start: Some("2025-06-01".to_string()),
            end: None,
            enabled: true,
        };
        assert!(WindowPolicy::from_config(&missing).is_err());
        assert!(WindowPolicy::from_config(&window_config("June", "2025-06-01")).is_err());
    }

    #[test]
    fn test_disabled_window_ignores_bounds() {
        let config = WindowConfig {
            start: Some("2025-06-10".to_string()),
            end: Some("2025-06-01".to_string()),
            enabled: false,
        };
        let policy = WindowPolicy::from_config(&config).unwrap();
        assert!(!policy.is_enabled());
        assert_eq!(
            policy.judge(Utc.with_ymd_and_hms(1999, 1, 1, 0, 0, 0).unwrap()),
            WindowVerdict::Within
        );
    }

    #[test]
    fn test_judge() {
        let policy = WindowPolicy::from_config(&window_config("2025-06-01", "2025-06-10")).unwrap();

        assert_eq!(
            policy.judge(Utc.with_ymd_and_hms(2025, 6, 5, 12, 0, 0).unwrap()),
            WindowVerdict::Within
        );
        assert_eq!(
            policy.judge(Utc.with_ymd_and_hms(2025, 6, 10, 23, 59, 59).unwrap()),
            WindowVerdict::Within
        );
        assert_eq!(
            policy.judge(Utc.with_ymd_and_hms(2025, 6, 11, 0, 0, 0).unwrap()),
            WindowVerdict::After
        );
        assert_eq!(
            policy.judge(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()),
            WindowVerdict::AtOrBeforeStart
        );
        assert_eq!(
            policy.judge(Utc.with_ymd_and_hms(2025, 5, 20, 0, 0, 0).unwrap()),
            WindowVerdict::AtOrBeforeStart
        );
    }
}
