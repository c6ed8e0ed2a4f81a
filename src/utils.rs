//! # Utility Functions and Helper Module
//!
//! Small helpers shared by the runners, the coordinator and the console
//! output: human-readable formatting of durations and message rates, run
//! identifiers, and padding for the report headers.
//!
//! ## Usage Examples
//!
//! ```rust
//! use deepstream_bench::utils::*;
//! use std::time::Duration;
//!
//! assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
//! assert_eq!(format_message_rate(1500.0), "1.5k msg/s");
//! assert_eq!(pad_end("Runners", 10), "Runners   ");
//! ```

use std::time::Duration;
use uuid::Uuid;

/// Generate a unique identifier for a benchmark run
///
/// The coordinator creates one per invocation and hands it to every worker
/// process so their log lines can be correlated.
///
/// ## Returns
/// String representation of a UUID v4 (e.g., "550e8400-e29b-41d4-a716-446655440000")
pub fn generate_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Format how long a runner ran for.
///
/// Runner timeouts are given in milliseconds, so that is the finest unit:
/// `"0ms"`, `"250ms"`, `"1.50s"`, `"1m 30s"`, `"1h 2m 5s"`.
///
/// ```rust
/// # use deepstream_bench::utils::format_duration;
/// # use std::time::Duration;
/// assert_eq!(format_duration(Duration::from_micros(250_400)), "250ms");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        0 => format!("{}ms", duration.as_millis()),
        1..=59 => format!("{:.2}s", duration.as_secs_f64()),
        60..=3599 => format!("{}m {}s", secs / 60, secs % 60),
        _ => format!("{}h {}m {}s", secs / 3600, secs / 60 % 60, secs % 60),
    }
}

/// Format an emit or receive rate, scaling to `k` above a thousand per
/// second.
pub fn format_message_rate(messages_per_second: f64) -> String {
    if messages_per_second >= 1000.0 {
        format!("{:.1}k msg/s", messages_per_second / 1000.0)
    } else {
        format!("{:.0} msg/s", messages_per_second)
    }
}

/// Right-pad `text` with spaces to at least `width` characters.
///
/// Text that is already wider is returned unchanged.
pub fn pad_end(text: &str, width: usize) -> String {
    format!("{:<width$}", text, width = width)
}
