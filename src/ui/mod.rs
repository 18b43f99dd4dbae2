//! Display seam: what the refresh loop pushes to whatever draws the screen.

pub mod pipe;
pub mod util;

use std::path::PathBuf;

/// Static information about the current track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackCard {
    pub title: String,
    pub artist: String,
    pub album: String,
    /// e.g. `3 of 12`; empty when the album's track list is unknown.
    pub track: String,
    pub quality: String,
    /// Cached artwork, when it is already on disk.
    pub art: Option<PathBuf>,
}

/// Live progress line, refreshed every tick while the display is active.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressCard {
    pub elapsed: String,
    pub duration: String,
    pub percent: f64,
}

/// Colours and artwork mask to render with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub text: String,
    pub bar: String,
    /// Alpha of the black overlay over artwork (0 untouched, 255 black).
    pub art_mask: u8,
}

/// Anything that can show the now-playing display.
pub trait Screen: Send {
    fn show_track(&mut self, card: &TrackCard);
    fn show_progress(&mut self, progress: &ProgressCard);
    fn set_active(&mut self, palette: &Palette);
    fn set_inactive(&mut self, palette: &Palette);
    fn clear(&mut self);
}

pub use util::split_lines;
