// refresh.rs: The display refresh loop
//
// One task owns the screen. Every tick it sleeps the fast interval, applies
// at most one queued payload and then either redraws what changed or, when
// nothing arrived, advances the elapsed clock and idles for the rest of the
// slow interval. A newly queued payload or shutdown cuts the idle short.

use crate::artcache;
use crate::color::{art_mask, lerp_hex, scale_hex};
use crate::engine::NowPlaying;
use crate::state::StateStore;
use crate::timefmt::{aligned_labels, progress_percent};
use crate::ui::{Palette, ProgressCard, Screen, TrackCard, split_lines};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// Text, bar and artwork settings for day, night and idle rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorScheme {
    pub active_text: String,
    pub night_text: String,
    pub active_bar: String,
    pub night_bar: String,
    /// Artwork mask at full night dimming.
    pub max_art_mask: u8,
    /// Artwork mask while nothing is playing.
    pub inactive_art_mask: u8,
    /// Brightness multiplier for text and bar while nothing is playing.
    pub inactive_dimming: f64,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            active_text: "#DCDCDC".to_string(),
            night_text: "#686868".to_string(),
            active_bar: "#424242".to_string(),
            night_bar: "#424242".to_string(),
            max_art_mask: 105,
            inactive_art_mask: 200,
            inactive_dimming: 0.35,
        }
    }
}

impl ColorScheme {
    pub fn active_palette(&self, fraction: f64) -> Palette {
        Palette {
            text: lerp_hex(&self.active_text, &self.night_text, fraction),
            bar: lerp_hex(&self.active_bar, &self.night_bar, fraction),
            art_mask: art_mask(fraction, self.max_art_mask),
        }
    }

    pub fn inactive_palette(&self, fraction: f64) -> Palette {
        let active = self.active_palette(fraction);
        Palette {
            text: scale_hex(&active.text, self.inactive_dimming),
            bar: scale_hex(&active.bar, self.inactive_dimming),
            art_mask: self.inactive_art_mask,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshSettings {
    pub fast: Duration,
    pub slow: Duration,
    pub art_dir: PathBuf,
    pub max_art_files: usize,
    pub colors: ColorScheme,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            fast: Duration::from_millis(50),
            slow: Duration::from_secs(1),
            art_dir: PathBuf::from("album_images"),
            max_art_files: 10_000,
            colors: ColorScheme::default(),
        }
    }
}

impl RefreshSettings {
    /// Enforce `0 < fast <= slow`; an out-of-range fast interval falls back
    /// to the slow one.
    pub fn normalized(mut self) -> Self {
        if self.slow.is_zero() {
            self.slow = Duration::from_secs(1);
        }
        if self.fast.is_zero() || self.fast > self.slow {
            self.fast = self.slow;
        }
        self
    }
}

/// Owns the screen and drives it from the shared state.
pub struct DisplayLoop<S: Screen> {
    np: NowPlaying,
    screen: S,
    settings: RefreshSettings,
    display_active: bool,
    shown: Option<(String, String)>,
}

impl<S: Screen> DisplayLoop<S> {
    pub fn new(np: NowPlaying, screen: S, settings: RefreshSettings) -> Self {
        Self {
            np,
            screen,
            settings: settings.normalized(),
            display_active: false,
            shown: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.display_active
    }

    /// One refresh step at `now` with the given dimming fraction. Returns
    /// `true` when a payload was applied.
    pub async fn tick(&mut self, now: DateTime<Utc>, fraction: f64) -> bool {
        if !self.np.consume_at(now).await {
            if self.display_active {
                self.push_progress(now, fraction).await;
            }
            return false;
        }

        let (playing, title, album) = self
            .np
            .read(|s| (s.player_state.is_playing(), s.title.clone(), s.album.clone()))
            .await;

        if playing && !self.display_active {
            tracing::debug!("Display active");
            self.display_active = true;
            self.screen.set_active(&self.settings.colors.active_palette(fraction));
        } else if !playing && self.display_active {
            tracing::debug!("Display inactive");
            self.go_inactive(fraction);
            self.evict_art().await;
        }

        let key = (title, album);
        if self.shown.as_ref() != Some(&key) {
            tracing::debug!(title = %key.0, album = %key.1, "Title or album changed");
            if key.0.is_empty() {
                self.screen.clear();
                if self.display_active {
                    self.go_inactive(fraction);
                }
            } else {
                let card = self.track_card().await;
                self.screen.show_track(&card);
            }
            self.shown = Some(key);
        }

        if self.display_active {
            self.screen.set_active(&self.settings.colors.active_palette(fraction));
            self.push_progress(now, fraction).await;
        }
        true
    }

    fn go_inactive(&mut self, fraction: f64) {
        self.display_active = false;
        self.screen
            .set_inactive(&self.settings.colors.inactive_palette(fraction));
    }

    async fn push_progress(&mut self, now: DateTime<Utc>, fraction: f64) {
        let (finished, duration, elapsed) = self
            .np
            .read(|s: &StateStore| {
                (
                    s.clock().is_finished(now),
                    s.duration().to_string(),
                    s.elapsed(now),
                )
            })
            .await;
        let (duration_label, elapsed_label) = aligned_labels(&duration, &elapsed);
        self.screen.show_progress(&ProgressCard {
            percent: progress_percent(&elapsed, &duration),
            elapsed: elapsed_label,
            duration: duration_label,
        });
        if finished {
            tracing::debug!("Elapsed reached duration, dimming display");
            self.go_inactive(fraction);
        }
    }

    async fn track_card(&self) -> TrackCard {
        let mut card = self
            .np
            .read(|s| TrackCard {
                title: split_lines(&s.title),
                artist: s.artist_block(),
                album: split_lines(&s.album),
                track: s.track.map(|t| t.to_string()).unwrap_or_default(),
                quality: s.quality.clone(),
                art: (!s.art_url.is_empty())
                    .then(|| artcache::art_path(&self.settings.art_dir, &s.art_url)),
            })
            .await;
        if let Some(path) = card.art.take() {
            match tokio::fs::try_exists(&path).await {
                Ok(true) => card.art = Some(path),
                Ok(false) => {}
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Cannot check cached artwork");
                }
            }
        }
        card
    }

    async fn evict_art(&self) {
        match artcache::evict(&self.settings.art_dir, self.settings.max_art_files).await {
            Ok(report) if !report.deleted.is_empty() || report.failed > 0 => {
                tracing::info!(
                    scanned = report.scanned,
                    deleted = report.deleted.len(),
                    failed = report.failed,
                    "Trimmed artwork cache"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Artwork cache eviction skipped"),
        }
    }

    /// Run until `shutdown_rx` fires (or its sender is dropped). A tick that
    /// has started always completes.
    pub async fn run(mut self, mut shutdown_rx: mpsc::Receiver<()>) -> S {
        let fast = self.settings.fast;
        let idle = self.settings.slow.saturating_sub(fast);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = tokio::time::sleep(fast) => {}
            }

            let fraction = self.np.fraction();
            if self.tick(Utc::now(), fraction).await {
                continue;
            }

            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = self.np.payload_queued() => {}
                _ = tokio::time::sleep(idle) => {}
            }
        }
        tracing::info!("Refresh loop stopped");
        self.screen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimming::DimmingScheduler;
    use crate::payload::{Payload, PlaybackState};
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq)]
    enum Shown {
        Track(TrackCard),
        Progress(String, String),
        Active(Palette),
        Inactive(Palette),
        Clear,
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Shown>>>);

    impl Recorder {
        fn take(&self) -> Vec<Shown> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    impl Screen for Recorder {
        fn show_track(&mut self, card: &TrackCard) {
            self.0.lock().unwrap().push(Shown::Track(card.clone()));
        }
        fn show_progress(&mut self, p: &ProgressCard) {
            self.0
                .lock()
                .unwrap()
                .push(Shown::Progress(p.elapsed.clone(), p.duration.clone()));
        }
        fn set_active(&mut self, palette: &Palette) {
            self.0.lock().unwrap().push(Shown::Active(palette.clone()));
        }
        fn set_inactive(&mut self, palette: &Palette) {
            self.0.lock().unwrap().push(Shown::Inactive(palette.clone()));
        }
        fn clear(&mut self) {
            self.0.lock().unwrap().push(Shown::Clear);
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap()
    }

    fn payload(state: PlaybackState, elapsed: &str) -> Payload {
        Payload {
            album: "Abbey Road".into(),
            artist: vec!["The Beatles".into()],
            title: "Something (Remastered)".into(),
            duration: "3:02".into(),
            elapsed: elapsed.into(),
            state,
            npclient: "wiim".into(),
            art_url: "http://art/abbey.jpg".into(),
            quality: String::new(),
        }
    }

    fn setup(tmp: &TempDir) -> (NowPlaying, Recorder, DisplayLoop<Recorder>) {
        let np = NowPlaying::starting_at(DimmingScheduler::disabled(), t0());
        let rec = Recorder::default();
        let settings = RefreshSettings {
            art_dir: tmp.path().to_path_buf(),
            max_art_files: 1,
            ..Default::default()
        };
        let dl = DisplayLoop::new(np.clone(), rec.clone(), settings);
        (np, rec, dl)
    }

    #[test]
    fn settings_enforce_fast_not_above_slow() {
        let s = RefreshSettings {
            fast: Duration::from_secs(5),
            slow: Duration::from_secs(1),
            ..Default::default()
        }
        .normalized();
        assert_eq!(s.fast, Duration::from_secs(1));
        let s = RefreshSettings {
            fast: Duration::ZERO,
            ..Default::default()
        }
        .normalized();
        assert_eq!(s.fast, s.slow);
    }

    #[test]
    fn palettes_follow_dimming() {
        let colors = ColorScheme::default();
        let day = colors.active_palette(0.0);
        assert_eq!(day.text, "#DCDCDC");
        assert_eq!(day.art_mask, 0);
        let night = colors.active_palette(1.0);
        assert_eq!(night.text, "#686868");
        assert_eq!(night.art_mask, 105);
        let half = ColorScheme {
            inactive_dimming: 0.5,
            ..ColorScheme::default()
        };
        let idle = half.inactive_palette(0.0);
        assert_eq!(idle.text, "#6e6e6e");
        assert_eq!(idle.art_mask, 200);
    }

    #[tokio::test]
    async fn playing_payload_activates_and_shows_track() {
        let tmp = TempDir::new().unwrap();
        let (np, rec, mut dl) = setup(&tmp);
        std::fs::write(artcache::art_path(tmp.path(), "http://art/abbey.jpg"), b"png").unwrap();
        np.set_tracks(vec!["Come Together".into(), "Something".into()]).await;

        np.submit_at(payload(PlaybackState::Playing, "0:10"), t0()).await.unwrap();
        assert!(dl.tick(t0(), 0.0).await);
        assert!(dl.is_active());

        let shown = rec.take();
        assert!(matches!(shown[0], Shown::Active(_)));
        let Shown::Track(card) = &shown[1] else {
            panic!("expected track card, got {shown:?}");
        };
        assert_eq!(card.title, "Something\n(Remastered)");
        assert_eq!(card.artist, "The Beatles");
        assert_eq!(card.track, "2 of 2");
        assert!(card.art.is_some());
        assert_eq!(shown.last(), Some(&Shown::Progress("0:10".into(), "3:02".into())));
    }

    #[tokio::test]
    async fn idle_ticks_advance_the_clock() {
        let tmp = TempDir::new().unwrap();
        let (np, rec, mut dl) = setup(&tmp);
        np.submit_at(payload(PlaybackState::Playing, "0:10"), t0()).await.unwrap();
        dl.tick(t0(), 0.0).await;
        rec.take();

        assert!(!dl.tick(t0() + ChronoDuration::seconds(5), 0.0).await);
        assert_eq!(rec.take(), vec![Shown::Progress("0:15".into(), "3:02".into())]);
    }

    #[tokio::test]
    async fn pausing_dims_and_trims_the_art_cache() {
        let tmp = TempDir::new().unwrap();
        let (np, rec, mut dl) = setup(&tmp);
        for i in 0..3 {
            std::fs::write(artcache::art_path(tmp.path(), &format!("http://art/{i}")), b"png")
                .unwrap();
        }
        np.submit_at(payload(PlaybackState::Playing, "0:10"), t0()).await.unwrap();
        dl.tick(t0(), 0.0).await;
        rec.take();

        let t1 = t0() + ChronoDuration::seconds(3);
        np.submit_at(payload(PlaybackState::Paused, "0:13"), t1).await.unwrap();
        assert!(dl.tick(t1, 0.0).await);
        assert!(!dl.is_active());
        assert!(matches!(rec.take().as_slice(), [Shown::Inactive(_)]));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);

        // idle ticks while paused draw nothing
        assert!(!dl.tick(t1 + ChronoDuration::seconds(1), 0.0).await);
        assert!(rec.take().is_empty());
    }

    #[tokio::test]
    async fn missing_art_dir_does_not_stall_the_tick() {
        let tmp = TempDir::new().unwrap();
        let np = NowPlaying::starting_at(DimmingScheduler::disabled(), t0());
        let rec = Recorder::default();
        let settings = RefreshSettings {
            art_dir: tmp.path().join("missing"),
            max_art_files: 1,
            ..Default::default()
        };
        let mut dl = DisplayLoop::new(np.clone(), rec.clone(), settings);

        np.submit_at(payload(PlaybackState::Playing, "0:10"), t0()).await.unwrap();
        assert!(dl.tick(t0(), 0.0).await);
        let shown = rec.take();
        let Shown::Track(card) = &shown[1] else {
            panic!("expected track card, got {shown:?}");
        };
        assert_eq!(card.art, None);

        let t1 = t0() + ChronoDuration::seconds(2);
        np.submit_at(payload(PlaybackState::Paused, "0:12"), t1).await.unwrap();
        assert!(dl.tick(t1, 0.0).await);
        assert!(!dl.is_active());
        assert!(matches!(rec.take().as_slice(), [Shown::Inactive(_)]));
    }

    #[tokio::test]
    async fn finished_track_dims_until_next_update() {
        let tmp = TempDir::new().unwrap();
        let (np, rec, mut dl) = setup(&tmp);
        np.submit_at(payload(PlaybackState::Playing, "3:00"), t0()).await.unwrap();
        dl.tick(t0(), 0.0).await;
        rec.take();

        assert!(!dl.tick(t0() + ChronoDuration::seconds(10), 0.0).await);
        let shown = rec.take();
        assert_eq!(shown[0], Shown::Progress("3:02".into(), "3:02".into()));
        assert!(matches!(shown[1], Shown::Inactive(_)));
        assert!(!dl.is_active());

        let t1 = t0() + ChronoDuration::seconds(12);
        let mut next = payload(PlaybackState::Playing, "0:01");
        next.title = "Maxwell's Silver Hammer".into();
        np.submit_at(next, t1).await.unwrap();
        assert!(dl.tick(t1, 0.0).await);
        assert!(dl.is_active());
    }

    #[tokio::test]
    async fn empty_title_clears_the_screen() {
        let tmp = TempDir::new().unwrap();
        let (np, rec, mut dl) = setup(&tmp);
        let mut blank = payload(PlaybackState::Stopped, "0:00");
        blank.title.clear();
        np.submit_at(blank, t0()).await.unwrap();
        assert!(dl.tick(t0(), 0.0).await);
        assert_eq!(rec.take(), vec![Shown::Clear]);
    }

    #[tokio::test]
    async fn run_applies_payloads_and_stops_on_shutdown() {
        let tmp = TempDir::new().unwrap();
        let np = NowPlaying::new(DimmingScheduler::disabled());
        let rec = Recorder::default();
        let settings = RefreshSettings {
            fast: Duration::from_millis(5),
            slow: Duration::from_millis(20),
            art_dir: tmp.path().to_path_buf(),
            ..Default::default()
        };
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(DisplayLoop::new(np.clone(), rec.clone(), settings).run(shutdown_rx));

        np.submit(payload(PlaybackState::Playing, "0:10")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(np.pending_len().await, 0);
        assert!(rec.take().iter().any(|s| matches!(s, Shown::Track(_))));

        shutdown_tx.send(()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("loop did not stop")
            .unwrap();
    }
}
