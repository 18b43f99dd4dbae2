// state.rs: The authoritative now-playing record

use crate::matching::TrackPosition;
use crate::payload::{Payload, PlaybackState};
use crate::timer::ElapsedClock;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Seconds a silent owner keeps the display before another client may take it.
pub const CLIENT_SWITCH_GRACE_SECS: i64 = 60;

/// Everything the display knows about what is playing right now.
#[derive(Debug, Clone, PartialEq)]
pub struct StateStore {
    pub album: String,
    pub artist: Vec<String>,
    pub title: String,
    pub player_state: PlaybackState,
    pub previous_state: PlaybackState,
    /// Client currently trusted to drive the display; empty until the first payload.
    pub npclient: String,
    pub art_url: String,
    pub quality: String,
    pub tracks: Vec<String>,
    pub track: Option<TrackPosition>,
    pub last_update_time: DateTime<Utc>,
    pub last_applied_payload: Option<Payload>,
    clock: ElapsedClock,
}

impl StateStore {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            album: String::new(),
            artist: Vec::new(),
            title: String::new(),
            player_state: PlaybackState::Stopped,
            previous_state: PlaybackState::Startup,
            npclient: String::new(),
            art_url: String::new(),
            quality: String::new(),
            tracks: Vec::new(),
            track: None,
            // start outside the grace window so the first client is never blocked
            last_update_time: now - Duration::seconds(CLIENT_SWITCH_GRACE_SECS),
            last_applied_payload: None,
            clock: ElapsedClock::new(now),
        }
    }

    pub fn clock(&self) -> &ElapsedClock {
        &self.clock
    }

    pub fn duration(&self) -> &str {
        self.clock.duration()
    }

    pub fn epoch_start(&self) -> DateTime<Utc> {
        self.clock.epoch_start()
    }

    pub fn set_player_state(&mut self, state: PlaybackState) {
        self.previous_state = self.player_state;
        self.player_state = state;
    }

    /// Check whether `client` may drive the display at `now`.
    ///
    /// A different client is only let in once the owner has been silent for
    /// the full grace period.
    pub fn accepts_client(&self, client: &str, now: DateTime<Utc>) -> bool {
        if self.npclient.is_empty() || self.npclient == client {
            return true;
        }
        now - self.last_update_time >= Duration::seconds(CLIENT_SWITCH_GRACE_SECS)
    }

    /// Apply a payload unless it repeats the last applied one.
    ///
    /// Returns `true` when the store changed. Duration and the elapsed
    /// baseline only move for `playing` payloads; elapsed values reported
    /// while paused or stopped are stale by nature.
    pub fn apply(&mut self, payload: Payload, now: DateTime<Utc>) -> bool {
        if self.last_applied_payload.as_ref() == Some(&payload) {
            return false;
        }
        if payload.state.is_playing() {
            self.clock.set_duration(&payload.duration);
            self.clock.rebase(&payload.elapsed, now);
        }
        let title_changed = self.title != payload.title;
        self.title = payload.title.clone();
        self.artist = payload.artist.clone();
        self.album = payload.album.clone();
        self.npclient = payload.npclient.clone();
        self.art_url = payload.art_url.clone();
        self.quality = payload.quality.clone();
        self.set_player_state(payload.state);
        self.last_update_time = now;
        self.last_applied_payload = Some(payload);
        if title_changed {
            self.refresh_track_position();
        }
        true
    }

    /// Replace the album's track list and recompute the track position.
    pub fn set_tracks(&mut self, tracks: Vec<String>) {
        self.tracks = tracks;
        self.refresh_track_position();
    }

    fn refresh_track_position(&mut self) {
        self.track = TrackPosition::locate(&self.title, &self.tracks);
    }

    /// Live elapsed estimate; never written back into the store.
    pub fn elapsed(&self, now: DateTime<Utc>) -> String {
        self.clock.elapsed(now)
    }

    /// Artists on one line, comma separated.
    pub fn artist_line(&self) -> String {
        self.artist
            .iter()
            .map(|a| a.trim())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Artists laid out for a label: one per line for small groups,
    /// comma separated once the list gets long.
    pub fn artist_block(&self) -> String {
        let names: Vec<&str> = self.artist.iter().map(|a| a.trim()).collect();
        match names.len() {
            2..=4 => names.join("\n"),
            _ => names.join(", "),
        }
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> StatusSnapshot {
        StatusSnapshot {
            album: self.album.clone(),
            artist: self.artist.clone(),
            title: self.title.clone(),
            duration: self.duration().to_string(),
            elapsed: self.elapsed(now),
            state: self.player_state,
            previous_state: self.previous_state,
            art_url: self.art_url.clone(),
            npclient: self.npclient.clone(),
            quality: self.quality.clone(),
            track: self.track.map(|t| t.to_string()),
        }
    }
}

/// Read-only view of the store for status pages and the display loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub album: String,
    pub artist: Vec<String>,
    pub title: String,
    pub duration: String,
    pub elapsed: String,
    pub state: PlaybackState,
    pub previous_state: PlaybackState,
    pub art_url: String,
    pub npclient: String,
    pub quality: String,
    pub track: Option<String>,
}
