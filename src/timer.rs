use crate::timefmt::{format_like, to_seconds};
use chrono::{DateTime, Duration, Utc};

/// Extrapolates the elapsed playback time between sparse client updates.
///
/// The clock keeps a wall-clock baseline (`epoch_start`) such that
/// `now - epoch_start` is the elapsed time. Reads never move the baseline;
/// only [`ElapsedClock::rebase`] does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElapsedClock {
    epoch_start: DateTime<Utc>,
    /// Track duration exactly as the client reported it.
    duration: String,
}

impl ElapsedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            epoch_start: now,
            duration: String::new(),
        }
    }

    pub fn epoch_start(&self) -> DateTime<Utc> {
        self.epoch_start
    }

    pub fn duration(&self) -> &str {
        &self.duration
    }

    pub fn set_duration(&mut self, duration: &str) {
        self.duration = duration.to_string();
    }

    /// Move the baseline so that the clock reads `elapsed` at `now`.
    pub fn rebase(&mut self, elapsed: &str, now: DateTime<Utc>) {
        // u32 seconds is well past any real track and keeps chrono in range
        let secs = i64::try_from(to_seconds(elapsed))
            .unwrap_or(i64::MAX)
            .min(i64::from(u32::MAX));
        self.epoch_start = now - Duration::seconds(secs);
    }

    /// Elapsed whole seconds at `now`, clamped to `0..=duration`.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> u64 {
        let raw = (now - self.epoch_start).num_seconds().max(0);
        let raw = u64::try_from(raw).unwrap_or(0);
        raw.min(to_seconds(&self.duration))
    }

    /// True once the extrapolated time has run past the reported duration.
    pub fn is_finished(&self, now: DateTime<Utc>) -> bool {
        let raw = (now - self.epoch_start).num_seconds();
        raw > 0 && raw.unsigned_abs() > to_seconds(&self.duration)
    }

    /// Elapsed time rendered in the duration's own layout, so the label
    /// keeps its shape up to and past the end of the track.
    ///
    /// Once the estimate passes the end of the track the reported duration
    /// string is returned unchanged, which callers use as the signal to let
    /// the display go idle.
    pub fn elapsed(&self, now: DateTime<Utc>) -> String {
        if self.is_finished(now) && !self.duration.is_empty() {
            return self.duration.clone();
        }
        format_like(self.elapsed_secs(now), &self.duration)
    }
}
