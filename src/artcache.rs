//! On-disk artwork cache bookkeeping.
//!
//! Artwork files are named after the SHA-256 of their source URL
//! (`<64 hex chars>.png`), so concurrent fetches of the same URL land on the
//! same path and the evictor only ever removes whole files. Fetching and
//! writing the images happens elsewhere; this module names files and keeps
//! the directory under a count bound.
//!
//! # Eviction
//!
//! ```text
//! list *.png with atime ──▶ count ≤ max? ──yes──▶ done
//!                               │ no
//!                               ▼
//!             bounded max-heap keeps the (count - max) oldest
//!                               │
//!                               ▼
//!             delete each, log and skip failures
//! ```

use sha2::{Digest, Sha256};
use std::collections::BinaryHeap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tokio::fs;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache I/O on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of one eviction pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EvictionReport {
    /// Artwork files found in the directory.
    pub scanned: usize,
    /// Files removed, oldest access first.
    pub deleted: Vec<PathBuf>,
    /// Files selected for removal that could not be deleted.
    pub failed: usize,
}

/// Cache file name for an artwork URL.
pub fn art_file_name(art_url: &str) -> String {
    let digest = Sha256::digest(art_url.as_bytes());
    format!("{}.png", hex::encode(digest))
}

pub fn art_path(dir: &Path, art_url: &str) -> PathBuf {
    dir.join(art_file_name(art_url))
}

fn is_art_file(path: &Path) -> bool {
    let ext_ok = path.extension().is_some_and(|e| e == "png");
    let stem_ok = path.file_stem().and_then(|s| s.to_str()).is_some_and(|s| {
        s.len() == 64 && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    });
    ext_ok && stem_ok
}

async fn list_art_files(dir: &Path) -> Result<Vec<(SystemTime, PathBuf)>, CacheError> {
    let io_err = |source: std::io::Error| CacheError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = fs::read_dir(dir).await.map_err(io_err)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let path = entry.path();
        if !is_art_file(&path) {
            continue;
        }
        let meta = match entry.metadata().await {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to stat cached artwork");
                continue;
            }
        };
        // filesystems without atime support fall back to mtime
        match meta.accessed().or_else(|_| meta.modified()) {
            Ok(at) => files.push((at, path)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "No access time for cached artwork");
            }
        }
    }
    Ok(files)
}

/// Pick the `k` entries with the oldest access time without sorting the
/// whole listing.
fn oldest(files: Vec<(SystemTime, PathBuf)>, k: usize) -> Vec<PathBuf> {
    if k == 0 {
        return Vec::new();
    }
    let mut heap: BinaryHeap<(SystemTime, PathBuf)> = BinaryHeap::with_capacity(k + 1);
    for entry in files {
        heap.push(entry);
        if heap.len() > k {
            heap.pop();
        }
    }
    let mut picked = heap.into_vec();
    picked.sort_unstable();
    picked.into_iter().map(|(_, p)| p).collect()
}

/// Keep at most `max_count` artwork files in `dir`, deleting the least
/// recently accessed ones.
///
/// Only a failure to list the directory is returned as an error; files
/// that cannot be deleted are logged and counted in the report.
pub async fn evict(dir: &Path, max_count: usize) -> Result<EvictionReport, CacheError> {
    let files = list_art_files(dir).await?;
    let mut report = EvictionReport {
        scanned: files.len(),
        ..Default::default()
    };
    if files.len() <= max_count {
        return Ok(report);
    }

    let excess = files.len() - max_count;
    remove_all(oldest(files, excess), &mut report).await;
    Ok(report)
}

/// Delete `paths` in order. A file that cannot be removed is logged and
/// counted; the rest of the batch still runs.
async fn remove_all(paths: Vec<PathBuf>, report: &mut EvictionReport) {
    for path in paths {
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Deleted cached artwork");
                report.deleted.push(path);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to delete cached artwork");
                report.failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{File, FileTimes};
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    fn touch(dir: &Path, url: &str, accessed_secs: u64) -> PathBuf {
        let path = art_path(dir, url);
        std::fs::write(&path, b"png").unwrap();
        let at = UNIX_EPOCH + Duration::from_secs(accessed_secs);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_times(FileTimes::new().set_accessed(at).set_modified(at))
            .unwrap();
        path
    }

    #[test]
    fn file_name_is_sha256_hex() {
        let name = art_file_name("http://example.com/cover.jpg");
        assert_eq!(name.len(), 64 + 4);
        assert!(name.ends_with(".png"));
        assert!(is_art_file(Path::new(&name)));
        assert_eq!(
            art_file_name(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855.png"
        );
    }

    #[tokio::test]
    async fn evicts_exactly_the_oldest() {
        let tmp = TempDir::new().unwrap();
        // access times deliberately out of creation order
        let order = [7u64, 2, 11, 0, 5, 9, 1, 3, 10, 4, 8, 6];
        let paths: Vec<PathBuf> = order
            .iter()
            .map(|&t| touch(tmp.path(), &format!("http://art/{t}"), 1_700_000_000 + t * 60))
            .collect();

        let report = evict(tmp.path(), 10).await.unwrap();
        assert_eq!(report.scanned, 12);
        assert_eq!(report.failed, 0);
        assert_eq!(report.deleted, vec![paths[3].clone(), paths[6].clone()]);

        for (path, t) in paths.iter().zip(order) {
            assert_eq!(path.exists(), t >= 2, "access slot {t}");
        }
    }

    #[tokio::test]
    async fn failed_delete_is_skipped_and_counted() {
        let tmp = TempDir::new().unwrap();
        let first = touch(tmp.path(), "http://art/1", 1_700_000_000);
        let gone = art_path(tmp.path(), "http://art/gone");
        let last = touch(tmp.path(), "http://art/3", 1_700_000_200);

        let mut report = EvictionReport::default();
        remove_all(vec![first.clone(), gone, last.clone()], &mut report).await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.deleted, vec![first.clone(), last.clone()]);
        assert!(!first.exists());
        assert!(!last.exists());
    }

    #[tokio::test]
    async fn under_the_bound_is_a_no_op() {
        let tmp = TempDir::new().unwrap();
        for t in 0..3 {
            touch(tmp.path(), &format!("http://art/{t}"), 1_700_000_000 + t);
        }
        let report = evict(tmp.path(), 3).await.unwrap();
        assert_eq!(report.scanned, 3);
        assert!(report.deleted.is_empty());
    }

    #[tokio::test]
    async fn unrelated_files_are_left_alone() {
        let tmp = TempDir::new().unwrap();
        let stray = tmp.path().join("missing_art.png");
        std::fs::write(&stray, b"x").unwrap();
        let notes = tmp.path().join("notes.txt");
        std::fs::write(&notes, b"x").unwrap();
        touch(tmp.path(), "http://art/a", 1_700_000_000);
        touch(tmp.path(), "http://art/b", 1_700_000_100);

        let report = evict(tmp.path(), 1).await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.deleted.len(), 1);
        assert!(stray.exists());
        assert!(notes.exists());
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = evict(&tmp.path().join("nope"), 10).await.unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn heap_selection_orders_oldest_first() {
        let at = |s| UNIX_EPOCH + Duration::from_secs(s);
        let files = vec![
            (at(30), PathBuf::from("c")),
            (at(10), PathBuf::from("a")),
            (at(40), PathBuf::from("d")),
            (at(20), PathBuf::from("b")),
        ];
        assert_eq!(oldest(files.clone(), 2), vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert!(oldest(files, 0).is_empty());
    }
}
