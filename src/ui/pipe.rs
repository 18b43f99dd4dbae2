use crate::ui::{Palette, ProgressCard, Screen, TrackCard};
use std::io::{self, Write};

/// Line-oriented display for scripting and headless setups.
///
/// Prints one line per track change and one progress line whenever the
/// rendered elapsed time changes.
pub struct PipeScreen<W: Write + Send> {
    out: W,
    last_track_id: Option<(String, String, String)>,
    last_progress: Option<String>,
    active: bool,
}

impl PipeScreen<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> PipeScreen<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_track_id: None,
            last_progress: None,
            active: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            tracing::debug!(error = %e, "Pipe display write failed");
        }
    }
}

fn one_line(s: &str) -> String {
    s.split('\n').collect::<Vec<_>>().join(" / ")
}

impl<W: Write + Send> Screen for PipeScreen<W> {
    fn show_track(&mut self, card: &TrackCard) {
        let track_id = (card.artist.clone(), card.title.clone(), card.album.clone());
        if self.last_track_id.as_ref() == Some(&track_id) {
            return;
        }
        self.last_track_id = Some(track_id);
        self.last_progress = None;

        let mut line = format!(
            "{} - {} - {}",
            one_line(&card.title),
            one_line(&card.artist),
            one_line(&card.album)
        );
        if !card.track.is_empty() {
            line.push_str(&format!(" [{}]", card.track));
        }
        if !card.quality.is_empty() {
            line.push_str(&format!(" ({})", card.quality));
        }
        self.emit(&line);
    }

    fn show_progress(&mut self, progress: &ProgressCard) {
        let line = format!(
            "{} / {} ({:.0}%)",
            progress.elapsed, progress.duration, progress.percent
        );
        if self.last_progress.as_deref() == Some(line.as_str()) {
            return;
        }
        self.emit(&line);
        self.last_progress = Some(line);
    }

    fn set_active(&mut self, _palette: &Palette) {
        if !self.active {
            self.active = true;
            self.emit("[active]");
        }
    }

    fn set_inactive(&mut self, _palette: &Palette) {
        if self.active {
            self.active = false;
            self.emit("[inactive]");
        }
    }

    fn clear(&mut self) {
        self.last_track_id = None;
        self.last_progress = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette() -> Palette {
        Palette {
            text: "#dcdcdc".into(),
            bar: "#424242".into(),
            art_mask: 0,
        }
    }

    #[test]
    fn prints_track_changes_and_progress_once() {
        let mut screen = PipeScreen::new(Vec::new());
        let card = TrackCard {
            title: "Song\n(Live)".into(),
            artist: "X\nY".into(),
            album: "M".into(),
            track: "2 of 9".into(),
            ..Default::default()
        };
        screen.set_active(&palette());
        screen.show_track(&card);
        screen.show_track(&card);
        let progress = ProgressCard {
            elapsed: "0:15".into(),
            duration: "3:45".into(),
            percent: 6.6,
        };
        screen.show_progress(&progress);
        screen.show_progress(&progress);
        screen.set_inactive(&palette());
        screen.set_inactive(&palette());

        let out = String::from_utf8(screen.into_inner()).unwrap();
        assert_eq!(
            out,
            "[active]\nSong / (Live) - X / Y - M [2 of 9]\n0:15 / 3:45 (7%)\n[inactive]\n"
        );
    }
}
