//! Human-readable class times for notification text.

use chrono::{DateTime, FixedOffset, Offset, Utc};

/// Display offset for rendering times. Out-of-range values fall back to UTC.
pub fn display_offset(utc_offset_minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60))
        .unwrap_or_else(|| Utc.fix())
}

/// e.g. `Mon, Oct 19, 3:05 PM`; `TBD` when the class has no time yet.
pub fn format_class_schedule(at: Option<DateTime<Utc>>, offset: FixedOffset) -> String {
    match at {
        Some(at) => at
            .with_timezone(&offset)
            .format("%a, %b %-d, %-I:%M %p")
            .to_string(),
        None => "TBD".to_string(),
    }
}

/// e.g. `03:05 PM`; `Unknown time` when the class has no time.
pub fn format_reminder_time(at: Option<DateTime<Utc>>, offset: FixedOffset) -> String {
    match at {
        Some(at) => at.with_timezone(&offset).format("%I:%M %p").to_string(),
        None => "Unknown time".to_string(),
    }
}
