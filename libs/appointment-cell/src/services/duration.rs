use regex::Regex;
use tracing::debug;

use shared_config::DEFAULT_SERVICE_DURATION_MINUTES;

/// Turns a service's free-text duration ("30 min", "1 hora", "45") into
/// minutes. Anything it cannot read falls back to the default so a badly
/// written service never blocks a booking.
#[derive(Debug, Clone)]
pub struct DurationParser {
    default_minutes: i64,
    non_digits: Regex,
}

impl Default for DurationParser {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_DURATION_MINUTES)
    }
}

impl DurationParser {
    pub fn new(default_minutes: i64) -> Self {
        Self {
            default_minutes,
            non_digits: Regex::new(r"[^0-9]").expect("static pattern"),
        }
    }

    pub fn default_minutes(&self) -> i64 {
        self.default_minutes
    }

    pub fn parse(&self, text: Option<&str>) -> i64 {
        let normalized = match text.map(|t| t.trim().to_lowercase()) {
            Some(t) if !t.is_empty() => t,
            _ => return self.default_minutes,
        };

        let minutes = if normalized.contains("hora") {
            self.digits(&normalized).and_then(|hours| hours.checked_mul(60))
        } else if normalized.contains("min") {
            self.digits(&normalized)
        } else {
            normalized.parse::<i32>().ok()
        };

        match minutes {
            Some(m) if m >= 0 => i64::from(m),
            _ => {
                debug!("Unreadable duration {:?}, using {} minutes", normalized, self.default_minutes);
                self.default_minutes
            }
        }
    }

    fn digits(&self, text: &str) -> Option<i32> {
        self.non_digits.replace_all(text, "").parse::<i32>().ok()
    }
}
