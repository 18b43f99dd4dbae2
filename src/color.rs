//! Colour helpers that turn a dimming fraction into concrete text/bar
//! colours and an artwork mask.

/// Parse `#RRGGBB` (leading `#` optional) into an RGB triple.
pub fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

pub fn to_hex((r, g, b): (u8, u8, u8)) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// Linear blend from `active` towards `night`.
///
/// Fractions at or beyond the ends return the end colour untouched, so a
/// fully bright or fully dim display keeps the configured spelling.
pub fn lerp_hex(active: &str, night: &str, fraction: f64) -> String {
    if fraction.is_nan() || fraction <= 0.0 {
        return active.to_string();
    }
    if fraction >= 1.0 {
        return night.to_string();
    }
    let (Some(a), Some(n)) = (parse_hex(active), parse_hex(night)) else {
        return active.to_string();
    };
    let mix = |c1: u8, c2: u8| {
        (f64::from(c1) + (f64::from(c2) - f64::from(c1)) * fraction)
            .round()
            .clamp(0.0, 255.0) as u8
    };
    to_hex((mix(a.0, n.0), mix(a.1, n.1), mix(a.2, n.2)))
}

/// Multiply each channel by `brightness` (clamped to 0..=1).
pub fn scale_hex(hex: &str, brightness: f64) -> String {
    let Some((r, g, b)) = parse_hex(hex) else {
        return hex.to_string();
    };
    let f = if brightness.is_nan() { 0.0 } else { brightness.clamp(0.0, 1.0) };
    let scale = |c: u8| (f64::from(c) * f) as u8;
    to_hex((scale(r), scale(g), scale(b)))
}

/// Alpha of the black overlay drawn over artwork: 0 is untouched, 255 black.
pub fn art_mask(fraction: f64, max_mask: u8) -> u8 {
    if fraction.is_nan() {
        return 0;
    }
    (fraction * f64::from(max_mask)).round().clamp(0.0, 255.0) as u8
}
