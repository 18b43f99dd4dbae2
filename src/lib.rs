//! Now-playing state synchronisation for a dedicated display.
//!
//! Remote player clients push metadata snapshots; [`engine::NowPlaying`]
//! arbitrates which client owns the display and queues the snapshots, and
//! [`refresh::DisplayLoop`] applies them and keeps the screen's elapsed
//! clock, night dimming and artwork cache up to date.

pub mod artcache;
pub mod color;
pub mod dimming;
pub mod engine;
pub mod matching;
pub mod payload;
pub mod refresh;
pub mod state;
pub mod timefmt;
pub mod timer;
pub mod ui;

pub use engine::NowPlaying;
pub use payload::{IngestError, Payload, PlaybackState};
