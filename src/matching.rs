//! Best-effort lookup of the playing title inside the album's track list.
//!
//! Clients report titles that drift from catalogue spellings ("Song
//! (Remastered 2011)", punctuation, casing), so the lookup scores every
//! track and keeps the best one. Ties resolve to the first track; a best
//! score under [`MIN_SCORE`] means "no good match".

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;

/// Scores below this are treated as no match.
pub const MIN_SCORE: f64 = 0.5;

static PARENTHESES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]").unwrap());
static NON_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Position of the current track within the album, e.g. `3 of 12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackPosition {
    /// Zero-based index of the matched track, `None` when nothing matched.
    pub index: Option<usize>,
    pub total: usize,
}

impl TrackPosition {
    /// Locate `title` within `tracks`. An empty list has no position.
    pub fn locate(title: &str, tracks: &[String]) -> Option<Self> {
        if tracks.is_empty() {
            return None;
        }
        Some(Self {
            index: best_track_match(title, tracks),
            total: tracks.len(),
        })
    }
}

impl fmt::Display for TrackPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "{} of {}", i + 1, self.total),
            None => write!(f, "? of {}", self.total),
        }
    }
}

fn normalize_title(s: &str) -> String {
    let lower = s.to_lowercase();
    let stripped = PARENTHESES_RE.replace_all(&lower, " ");
    let replaced = NON_WORD_RE.replace_all(&stripped, " ");
    WHITESPACE_RE.replace_all(&replaced, " ").trim().to_string()
}

fn get_bigrams(s: &str) -> HashSet<(char, char)> {
    let chars: Vec<char> = s.chars().collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

fn dice_coefficient(a: &str, b: &str) -> f64 {
    let a_grams = get_bigrams(a);
    let b_grams = get_bigrams(b);
    if a_grams.is_empty() && b_grams.is_empty() {
        return if a == b { 1.0 } else { 0.0 };
    }
    if a_grams.is_empty() || b_grams.is_empty() {
        return 0.0;
    }
    let inter = a_grams.intersection(&b_grams).count() as f64;
    (2.0 * inter) / ((a_grams.len() + b_grams.len()) as f64)
}

fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    if s1 == s2 {
        return 0;
    }
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=a.len()).collect();
    let mut curr: Vec<usize> = vec![0; a.len() + 1];
    for (j, bj) in b.iter().enumerate() {
        curr[0] = j + 1;
        for (i, ai) in a.iter().enumerate() {
            let cost = usize::from(ai != bj);
            curr[i + 1] = (prev[i + 1] + 1).min(curr[i] + 1).min(prev[i] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[a.len()]
}

/// Similarity of two already-normalised titles in 0.0..=1.0.
fn title_score(query: &str, candidate: &str) -> f64 {
    if query.is_empty() || candidate.is_empty() {
        return 0.0;
    }
    if query == candidate || query.contains(candidate) || candidate.contains(query) {
        return 1.0;
    }
    let max_len = query.chars().count().max(candidate.chars().count()) as f64;
    let lev = 1.0 - levenshtein_distance(query, candidate) as f64 / max_len;
    dice_coefficient(query, candidate) * 0.6 + lev * 0.4
}

/// Index of the track that best matches `title`, or `None` when no track
/// scores at least [`MIN_SCORE`].
pub fn best_track_match(title: &str, tracks: &[String]) -> Option<usize> {
    let query = normalize_title(title);
    if query.is_empty() {
        return None;
    }
    let mut best: Option<(usize, f64)> = None;
    for (i, track) in tracks.iter().enumerate() {
        let score = title_score(&query, &normalize_title(track));
        // strict comparison keeps the earliest index on ties
        if best.is_none_or(|(_, s)| score > s) {
            best = Some((i, score));
        }
    }
    best.filter(|(_, s)| *s >= MIN_SCORE).map(|(i, _)| i)
}
