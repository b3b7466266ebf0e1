use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};

use crate::error::{GifStampError, Result};

/// Day and month, then hour and minute: `"07.03. 09:05"`.
pub const DEFAULT_PATTERN: &str = "%d.%m. %H:%M";

/// Source of "now" for the overlay text.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Always returns the same instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Local>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

/// Reject empty patterns and unknown `%` specifiers up front, so formatting
/// can never fail halfway through a render.
pub fn validate_pattern(pattern: &str) -> Result<()> {
    if pattern.is_empty() {
        return Err(GifStampError::Config("timestamp pattern is empty".to_string()));
    }
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(GifStampError::Config(format!(
            "invalid timestamp pattern '{}'",
            pattern
        )));
    }
    Ok(())
}

/// Render `time` with a pattern that already passed [`validate_pattern`].
pub fn format_timestamp(time: &DateTime<Local>, pattern: &str) -> String {
    time.format(pattern).to_string()
}

/// Sample `clock` and format it.
pub fn timestamp_text<C: Clock + ?Sized>(clock: &C, pattern: &str) -> String {
    format_timestamp(&clock.now(), pattern)
}
