// src/timefmt.rs
// Clock-string helpers for durations and elapsed times reported by clients

/// Convert an `h:m:s` or `m:s` string into whole seconds.
///
/// Anything that does not parse (wrong number of components, non-numeric
/// parts, empty input) is treated as zero rather than an error.
pub fn to_seconds(value: &str) -> u64 {
    let parts: Option<Vec<u64>> = value
        .trim()
        .split(':')
        .map(|p| p.trim().parse::<u64>().ok())
        .collect();
    match parts.as_deref() {
        Some([h, m, s]) => h
            .saturating_mul(3600)
            .saturating_add(m.saturating_mul(60))
            .saturating_add(*s),
        Some([m, s]) => m.saturating_mul(60).saturating_add(*s),
        _ => 0,
    }
}

/// Render seconds as `m:ss`, or `h:mm:ss` when `with_hours` is set.
///
/// Without hours the minutes keep accumulating past 59.
pub fn format_clock(secs: u64, with_hours: bool) -> String {
    if with_hours {
        format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else {
        format!("{}:{:02}", secs / 60, secs % 60)
    }
}

/// Render seconds in the same layout as `template`: the same number of
/// fields and the same zero padding on the leading field, so `00:03:45`
/// yields `00:00:07` and `3:45` yields `0:07`. A template that does not
/// parse falls back to [`format_clock`].
pub fn format_like(secs: u64, template: &str) -> String {
    let fields: Vec<&str> = template.trim().split(':').map(str::trim).collect();
    let numeric = fields
        .iter()
        .all(|f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()));
    let width = fields[0].len();
    match (numeric, fields.len()) {
        (true, 3) => format!(
            "{:0width$}:{:02}:{:02}",
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60
        ),
        (true, 2) => format!("{:0width$}:{:02}", secs / 60, secs % 60),
        _ => format_clock(secs, secs >= 3600),
    }
}

/// Render a duration and an elapsed value with the same layout so the two
/// labels line up on screen. The layout is picked from the duration.
pub fn aligned_labels(duration: &str, elapsed: &str) -> (String, String) {
    let dur = to_seconds(duration);
    let el = to_seconds(elapsed);
    let split = |s: u64| (s / 3600, (s % 3600) / 60, s % 60);
    let (dh, dm, ds) = split(dur);
    let (eh, em, es) = split(el);

    if dh >= 10 {
        (
            format!("{dh:02}:{dm:02}:{ds:02}"),
            format!("{eh:02}:{em:02}:{es:02}"),
        )
    } else if dh >= 1 {
        (format!("{dh}:{dm:02}:{ds:02}"), format!("{eh}:{em:02}:{es:02}"))
    } else if dm >= 10 {
        (format!("{dm:02}:{ds:02}"), format!("{:02}:{es:02}", el / 60))
    } else {
        (format!("{dm}:{ds:02}"), format!("{}:{es:02}", el / 60))
    }
}

/// Percentage of `duration` covered by `elapsed`, clamped to 0..=100.
pub fn progress_percent(elapsed: &str, duration: &str) -> f64 {
    let dur = to_seconds(duration);
    if dur == 0 {
        return 0.0;
    }
    (to_seconds(elapsed) as f64 / dur as f64 * 100.0).clamp(0.0, 100.0)
}
