//! Human-readable time formatting for position readouts
//!
//! The player shows `current / duration` as `HH:MM:SS.mmm`.

/// Format seconds as `HH:MM:SS.mmm`.
///
/// Negative and non-finite values are treated as zero. Hours are not wrapped,
/// so recordings longer than a day keep counting up (`25:00:00.000`).
///
/// # Examples
///
/// ```
/// use annotator_common::human_time::format_timestamp;
///
/// assert_eq!(format_timestamp(0.0), "00:00:00.000");
/// assert_eq!(format_timestamp(61.5), "00:01:01.500");
/// assert_eq!(format_timestamp(3725.042), "01:02:05.042");
/// ```
pub fn format_timestamp(raw_seconds: f64) -> String {
    let raw_seconds = if raw_seconds.is_finite() && raw_seconds > 0.0 {
        raw_seconds
    } else {
        0.0
    };

    // Round to whole milliseconds once so 59.9996 carries into the next second
    let total_ms = (raw_seconds * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let seconds = total_secs % 60;
    let minutes = (total_secs / 60) % 60;
    let hours = total_secs / 3600;

    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, ms)
}

/// Format a `current / duration` readout
pub fn format_progress(current_secs: f64, duration_secs: f64) -> String {
    format!(
        "{} / {}",
        format_timestamp(current_secs),
        format_timestamp(duration_secs)
    )
}
