//! Text layout helpers for display labels.

/// Break a long title or album name onto two lines at the first
/// `" ("` (keeping the parenthesis) or, failing that, the first `": "`.
pub fn split_lines(text: &str) -> String {
    if let Some((head, tail)) = text.split_once(" (") {
        return format!("{head}\n({tail}");
    }
    if let Some((head, tail)) = text.split_once(": ") {
        return format!("{head}:\n{tail}");
    }
    text.to_string()
}
