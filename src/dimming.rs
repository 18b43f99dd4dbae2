//! Night-time dimming schedule.
//!
//! Between dawn and dusk the display runs at full brightness. From dusk the
//! dimming fraction ramps linearly from 0 to 1 over the configured number of
//! minutes and stays at 1 until the next dawn. Dawn and dusk are civil
//! twilight instants (sun 6° below the horizon) computed with the NOAA
//! general solar position approximation, which is good to a couple of
//! minutes.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use std::f64::consts::PI;

/// Solar zenith angle for civil twilight, in degrees.
const CIVIL_ZENITH_DEG: f64 = 96.0;

/// Dawn and dusk for one calendar day, as absolute instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SunEvents {
    pub dawn: DateTime<Utc>,
    pub dusk: DateTime<Utc>,
}

fn valid_location(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

/// Compute civil dawn and dusk for `date` at the given coordinates.
///
/// Returns `None` for out-of-range coordinates and on days where the sun
/// never crosses the twilight angle (polar day or night).
pub fn sun_events(date: NaiveDate, latitude: f64, longitude: f64) -> Option<SunEvents> {
    if !valid_location(latitude, longitude) {
        return None;
    }

    let days_in_year = if date.leap_year() { 366.0 } else { 365.0 };
    // fractional year at local solar noon
    let gamma = 2.0 * PI / days_in_year * (f64::from(date.ordinal0()));

    let eqtime = 229.18
        * (0.000075 + 0.001868 * gamma.cos()
            - 0.032077 * gamma.sin()
            - 0.014615 * (2.0 * gamma).cos()
            - 0.040849 * (2.0 * gamma).sin());
    let decl = 0.006918 - 0.399912 * gamma.cos() + 0.070257 * gamma.sin()
        - 0.006758 * (2.0 * gamma).cos()
        + 0.000907 * (2.0 * gamma).sin()
        - 0.002697 * (3.0 * gamma).cos()
        + 0.00148 * (3.0 * gamma).sin();

    let lat = latitude.to_radians();
    let cos_ha =
        CIVIL_ZENITH_DEG.to_radians().cos() / (lat.cos() * decl.cos()) - lat.tan() * decl.tan();
    if !cos_ha.is_finite() || !(-1.0..=1.0).contains(&cos_ha) {
        return None;
    }
    let ha_deg = cos_ha.acos().to_degrees();

    let dawn_minutes = 720.0 - 4.0 * (longitude + ha_deg) - eqtime;
    let dusk_minutes = 720.0 - 4.0 * (longitude - ha_deg) - eqtime;

    let midnight = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?);
    let at = |minutes: f64| midnight + Duration::seconds((minutes * 60.0).round() as i64);
    Some(SunEvents {
        dawn: at(dawn_minutes),
        dusk: at(dusk_minutes),
    })
}

/// Dimming fraction for `now` given today's dawn and dusk.
///
/// The daytime window is inclusive on both ends: at dawn the display is
/// bright again and at dusk the ramp starts from zero.
pub fn fraction_between<Tz: TimeZone>(
    now: &DateTime<Tz>,
    dawn: &DateTime<Tz>,
    dusk: &DateTime<Tz>,
    ramp_minutes: u32,
) -> f64 {
    if dawn <= now && now <= dusk {
        return 0.0;
    }
    if now < dawn {
        // after midnight, still dark until dawn
        return 1.0;
    }
    let minutes_since_dusk = (now.clone() - dusk.clone()).num_milliseconds() as f64 / 60_000.0;
    let ramp = f64::from(ramp_minutes.max(1));
    if minutes_since_dusk >= ramp {
        1.0
    } else {
        (minutes_since_dusk / ramp).clamp(0.0, 1.0)
    }
}

/// Calendar day at the location's mean solar time (UTC shifted by four
/// minutes per degree of longitude). Local solar midnight always falls
/// between one day's dusk and the next day's dawn.
pub fn solar_date(now: &DateTime<Utc>, longitude: f64) -> NaiveDate {
    let offset = Duration::seconds((longitude * 240.0).round() as i64);
    (*now + offset).date_naive()
}

/// Dimming fraction for `now` at the given coordinates. Dimming is
/// disabled (fraction 0) when no dawn/dusk can be computed.
///
/// Only the instant matters: the time zone `now` is expressed in has no
/// effect on the result.
pub fn dimming_fraction<Tz: TimeZone>(
    now: &DateTime<Tz>,
    latitude: f64,
    longitude: f64,
    ramp_minutes: u32,
) -> f64 {
    let now = now.with_timezone(&Utc);
    if !valid_location(latitude, longitude) {
        tracing::debug!(latitude, longitude, "Invalid coordinates, dimming is disabled");
        return 0.0;
    }
    let Some(events) = sun_events(solar_date(&now, longitude), latitude, longitude) else {
        tracing::debug!(latitude, longitude, "No dawn/dusk available, dimming is disabled");
        return 0.0;
    };
    fraction_between(&now, &events.dawn, &events.dusk, ramp_minutes)
}

/// Dimming configuration bound to a location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DimmingScheduler {
    location: Option<(f64, f64)>,
    ramp_minutes: u32,
}

impl DimmingScheduler {
    pub fn new(location: Option<(f64, f64)>, ramp_minutes: u32) -> Self {
        Self {
            location,
            ramp_minutes: ramp_minutes.max(1),
        }
    }

    /// A scheduler that never dims.
    pub fn disabled() -> Self {
        Self::new(None, 60)
    }

    pub fn fraction<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> f64 {
        match self.location {
            Some((lat, lon)) => dimming_fraction(now, lat, lon, self.ramp_minutes),
            None => 0.0,
        }
    }
}
