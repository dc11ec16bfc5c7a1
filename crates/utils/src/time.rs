//! Parsing and formatting of "HH:MM" wall-clock times.

/// Parse a 24h "HH:MM" string into minutes since midnight.
///
/// Returns `None` for anything that is not a valid wall-clock time.
pub fn parse_hhmm(s: &str) -> Option<u32> {
    let (h, m) = s.trim().split_once(':')?;
    let h: u32 = h.trim().parse().ok()?;
    let m: u32 = m.trim().parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

/// Format minutes-since-midnight as "HH:MM", wrapping past 24:00 for display.
pub fn format_hhmm_wrapped(total_minutes: i64) -> String {
    let h = (total_minutes / 60).rem_euclid(24);
    let m = total_minutes.rem_euclid(60);
    format!("{h:02}:{m:02}")
}
