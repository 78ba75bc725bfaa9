use crate::types::{Session, RAW_DATA_DIR, TRIGGER_MARKER};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Finds sessions carrying a trigger marker under a data root.
///
/// Holds no state between calls: every call to [`sessions`](Self::sessions)
/// re-walks the tree, so discovery can be restarted at any time.
pub struct SessionDiscoverer {
    root: PathBuf,
}

impl SessionDiscoverer {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily yields every directory that directly contains the trigger marker.
    ///
    /// Raw-data folders and hidden directories are not descended into, so
    /// recordings are never listed unless their session is triggered.
    pub fn sessions(&self) -> impl Iterator<Item = Session> {
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_pruned(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::warn!("Skipping unreadable path during discovery: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_dir())
            .filter(|entry| entry.path().join(TRIGGER_MARKER).is_file())
            .map(|entry| Session::new(entry.path()))
    }
}

fn is_pruned(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || name == RAW_DATA_DIR
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch_marker(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(TRIGGER_MARKER), "").unwrap();
    }

    #[test]
    fn test_finds_marked_sessions_only() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("mouse1/2024-01-01/001");
        let b = tmp.path().join("mouse2/2024-02-01/001");
        let unmarked = tmp.path().join("mouse3/2024-03-01/001");
        touch_marker(&a);
        touch_marker(&b);
        fs::create_dir_all(&unmarked).unwrap();

        let found: Vec<PathBuf> = SessionDiscoverer::new(tmp.path())
            .sessions()
            .map(|s| s.path().to_path_buf())
            .collect();
        assert_eq!(found, vec![a, b]);
    }

    #[test]
    fn test_marker_is_not_inherited() {
        let tmp = tempfile::tempdir().unwrap();
        let parent = tmp.path().join("mouse1");
        touch_marker(&parent);
        fs::create_dir_all(parent.join("2024-01-01/001")).unwrap();

        let found: Vec<Session> = SessionDiscoverer::new(tmp.path()).sessions().collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path(), parent.as_path());
    }

    #[test]
    fn test_marker_at_root() {
        let tmp = tempfile::tempdir().unwrap();
        touch_marker(tmp.path());

        let found: Vec<Session> = SessionDiscoverer::new(tmp.path()).sessions().collect();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_does_not_descend_into_raw_or_hidden() {
        let tmp = tempfile::tempdir().unwrap();
        touch_marker(&tmp.path().join("s1/raw_ephys_data/run_g0"));
        touch_marker(&tmp.path().join(".trash/s2"));

        let found: Vec<Session> = SessionDiscoverer::new(tmp.path()).sessions().collect();
        assert!(found.is_empty());
    }

    #[test]
    fn test_restartable() {
        let tmp = tempfile::tempdir().unwrap();
        touch_marker(&tmp.path().join("s1"));
        let discoverer = SessionDiscoverer::new(tmp.path());

        assert_eq!(discoverer.sessions().count(), 1);
        assert_eq!(discoverer.sessions().count(), 1);
    }

    #[test]
    fn test_missing_root_yields_nothing() {
        let discoverer = SessionDiscoverer::new("/nonexistent_dir_12345");
        assert_eq!(discoverer.sessions().count(), 0);
    }
}
