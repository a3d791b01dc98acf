//! Conversion between WebVTT clock text (`[HH:]MM:SS.mmm`) and seconds.

/// Parse a WebVTT timestamp into seconds.
///
/// Accepted grammar is `[HH:]MM:SS.mmm`: an optional two-digit hour group, two-digit minutes
/// and seconds, and exactly three millisecond digits. Surrounding whitespace is ignored.
/// Anything else returns `None`; callers treat that as "skip this input".
pub fn parse(text: &str) -> Option<f64> {
    let text = text.trim();
    let (clock, millis) = text.split_once('.')?;
    let millis = fixed_digits(millis, 3)?;

    let mut groups = clock.split(':');
    let first = groups.next()?;
    let second = groups.next()?;
    let (hours, minutes, seconds) = match groups.next() {
        Some(third) => (fixed_digits(first, 2)?, fixed_digits(second, 2)?, fixed_digits(third, 2)?),
        None => (0, fixed_digits(first, 2)?, fixed_digits(second, 2)?),
    };
    if groups.next().is_some() {
        return None;
    }

    Some(
        f64::from(hours) * 3600.0
            + f64::from(minutes) * 60.0
            + f64::from(seconds)
            + f64::from(millis) / 1000.0,
    )
}

/// Format seconds as a WebVTT timestamp (`HH:MM:SS.mmm`).
///
/// We round to the nearest millisecond. Negative and non-finite values clamp to zero.
pub fn format(seconds: f64) -> String {
    let total_ms = if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    };

    let ms = total_ms % 1000;
    let total_s = total_ms / 1000;

    let s = total_s % 60;
    let total_m = total_s / 60;

    let m = total_m % 60;
    let h = total_m / 60;

    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}

fn fixed_digits(group: &str, width: usize) -> Option<u32> {
    if group.len() != width || !group.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    group.parse().ok()
}
