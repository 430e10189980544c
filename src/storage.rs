//! Save file on disk (XDG data dir or ~/.local/share/qlinktui).

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::snapshot::Snapshot;

const FILENAME: &str = "save.txt";

/// Default save path: data dir / qlinktui / save.txt.
pub fn default_save_path() -> PathBuf {
    let base = match std::env::var("XDG_DATA_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
        _ => std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".local").join("share"))
            .unwrap_or_else(|_| PathBuf::from(".")),
    };
    base.join("qlinktui").join(FILENAME)
}

/// Write a snapshot, creating the parent directory if needed.
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, snapshot.to_string()).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Read and parse a snapshot for a `rows x cols` board.
pub fn load_snapshot(path: &Path, rows: usize, cols: usize) -> Result<Snapshot> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let snapshot = Snapshot::parse(&text, rows, cols)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::rng::SessionRng;
    use crate::session::{Mode, Session};

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("qlinktui-{}-{name}", std::process::id()))
    }

    #[test]
    fn test_save_then_load_file() {
        let dir = scratch_dir("roundtrip");
        let path = dir.join("nested").join(FILENAME);
        let mut session = Session::new(GameConfig::default(), SessionRng::new(9));
        session.prepare_new_game(Mode::Single).expect("generated");
        let snapshot = session.snapshot();

        save_snapshot(&path, &snapshot).expect("saved");
        let loaded = load_snapshot(&path, 15, 30).expect("loaded");
        assert_eq!(loaded, snapshot);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let path = scratch_dir("missing").join(FILENAME);
        let err = load_snapshot(&path, 15, 30).expect_err("no file");
        assert!(err.to_string().contains("reading"));
    }

    #[test]
    fn test_default_path_ends_in_app_dir() {
        let path = default_save_path();
        assert!(path.ends_with(Path::new("qlinktui").join(FILENAME)));
    }
}
