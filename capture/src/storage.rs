use std::path::{Path, PathBuf};

use timelapse_common::config::StorageConfig;
use timelapse_common::frame::{Frame, FrameError};
use tracing::{debug, info};

/// On-disk shot sequence: `{storage_path}/{prefix}{index}{extension}`.
///
/// There is no index file. The next free slot is "the smallest index with no
/// file on disk", so a restarted process continues numbering where the last
/// one stopped instead of overwriting it. Indices start at 0, are not
/// zero-padded, and must stay contiguous for the scan to work.
///
/// After [`ShotStore::next_available_path`] returns, `index` names the slot it
/// just handed out. Once that file is written the following scan skips past
/// it; if nothing was written, the same slot is handed out again.
#[derive(Debug)]
pub struct ShotStore {
    storage_path: PathBuf,
    prefix: String,
    extension: String,
    index: u64,
}

impl ShotStore {
    pub fn new(storage_path: impl Into<PathBuf>, prefix: &str, extension: &str) -> Self {
        Self {
            storage_path: storage_path.into(),
            prefix: prefix.to_string(),
            extension: extension.to_string(),
            index: 0,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.path, &config.prefix, &config.normalized_extension())
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Whether the storage directory exists and this process may write into it.
    pub fn is_writable(&self) -> bool {
        self.storage_path.is_dir() && can_write(&self.storage_path)
    }

    /// Fatal-error form of [`ShotStore::is_writable`], used before any capture.
    pub fn ensure_writable(&self) -> Result<(), StoreError> {
        if self.is_writable() {
            Ok(())
        } else {
            Err(StoreError::NotWritable(self.storage_path.display().to_string()))
        }
    }

    pub fn path_for(&self, index: u64) -> PathBuf {
        self.storage_path
            .join(format!("{}{}{}", self.prefix, index, self.extension))
    }

    /// Scan forward from the current index, skipping every slot that already
    /// has a file, and return the first free one.
    pub fn next_available_path(&mut self) -> PathBuf {
        loop {
            let path = self.path_for(self.index);
            if !path.exists() {
                return path;
            }
            self.index += 1;
        }
    }

    /// Path of the shot `offset` slots behind the current index, if that file
    /// exists.
    pub fn comparison_path(&self, offset: u64) -> Option<PathBuf> {
        let index = self.index.checked_sub(offset)?;
        let path = self.path_for(index);
        path.exists().then_some(path)
    }

    /// Write `frame` into the next free slot and return its path.
    pub fn store(&mut self, frame: &Frame) -> Result<PathBuf, StoreError> {
        self.ensure_writable()?;
        let path = self.next_available_path();
        frame.save(&path)?;
        info!(index = self.index, path = %path.display(), "stored shot");
        Ok(path)
    }

    /// Load the shot `offset` slots behind the current index. `Ok(None)` when
    /// that file is missing.
    pub fn load_previous(&self, offset: u64) -> Result<Option<Frame>, StoreError> {
        self.ensure_writable()?;
        match self.comparison_path(offset) {
            Some(path) => {
                debug!(path = %path.display(), "loading comparison shot from disk");
                Ok(Some(Frame::open(&path)?))
            }
            None => Ok(None),
        }
    }
}

#[cfg(unix)]
fn can_write(path: &Path) -> bool {
    use nix::unistd::{access, AccessFlags};
    access(path, AccessFlags::W_OK).is_ok()
}

/// No `access(2)` here, so create and remove a scratch file instead.
#[cfg(not(unix))]
fn can_write(path: &Path) -> bool {
    let scratch = path.join(format!(".write-check-{}", std::process::id()));
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&scratch)
    {
        Ok(_) => std::fs::remove_file(&scratch).is_ok(),
        Err(_) => false,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage directory {0} is not writable")]
    NotWritable(String),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn frame(value: u8) -> Frame {
        Frame::new(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([value, value, value]))),
            0,
        )
    }

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn empty_directory_starts_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ShotStore::new(dir.path(), "shot-", ".jpg");
        assert_eq!(store.next_available_path(), dir.path().join("shot-0.jpg"));
        assert_eq!(store.index(), 0);
    }

    #[test]
    fn resume_skips_existing_shots() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            touch(dir.path(), &format!("shot-{i}.jpg"));
        }
        // A fresh store, as after a restart.
        let mut store = ShotStore::new(dir.path(), "shot-", ".jpg");
        assert_eq!(store.next_available_path(), dir.path().join("shot-5.jpg"));
        assert_eq!(store.index(), 5);
    }

    #[test]
    fn other_prefixes_and_extensions_do_not_count() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "shot-0.jpg");
        touch(dir.path(), "other-1.jpg");
        touch(dir.path(), "shot-1.png");
        let mut store = ShotStore::new(dir.path(), "shot-", ".jpg");
        assert_eq!(store.next_available_path(), dir.path().join("shot-1.jpg"));
    }

    #[test]
    fn unwritten_slot_is_handed_out_again() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ShotStore::new(dir.path(), "shot-", ".jpg");
        let first = store.next_available_path();
        let second = store.next_available_path();
        assert_eq!(first, second);
    }

    #[test]
    fn stored_paths_are_unique_and_increasing() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ShotStore::new(dir.path(), "shot-", ".png");
        let mut last_index = None;
        let mut seen = std::collections::HashSet::new();
        for i in 0..4u8 {
            let path = store.store(&frame(10 + i)).unwrap();
            assert!(seen.insert(path.clone()), "duplicate path {}", path.display());
            if let Some(prev) = last_index {
                assert!(store.index() > prev);
            }
            last_index = Some(store.index());
        }
        assert_eq!(store.index(), 3);
        assert!(dir.path().join("shot-3.png").exists());
    }

    #[test]
    fn comparison_path_points_behind_current_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ShotStore::new(dir.path(), "shot-", ".png");
        store.store(&frame(1)).unwrap();
        store.store(&frame(2)).unwrap();
        assert_eq!(store.index(), 1);
        assert_eq!(store.comparison_path(1), Some(dir.path().join("shot-0.png")));
        assert_eq!(store.comparison_path(0), Some(dir.path().join("shot-1.png")));
    }

    #[test]
    fn comparison_path_absent_when_missing_or_negative() {
        let dir = tempfile::tempdir().unwrap();
        let store = ShotStore::new(dir.path(), "shot-", ".png");
        assert_eq!(store.comparison_path(1), None);
        assert_eq!(store.comparison_path(0), None);
    }

    #[test]
    fn load_previous_reads_stored_shot() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ShotStore::new(dir.path(), "shot-", ".png");
        store.store(&frame(40)).unwrap();
        store.store(&frame(80)).unwrap();
        let previous = store.load_previous(1).unwrap().unwrap();
        assert_eq!(previous.to_gray().get_pixel(0, 0).0[0], 40);
    }

    #[test]
    fn missing_directory_is_not_writable() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ShotStore::new(dir.path().join("missing"), "shot-", ".png");
        assert!(!store.is_writable());
        assert!(matches!(
            store.store(&frame(1)),
            Err(StoreError::NotWritable(_))
        ));
    }

    #[test]
    fn existing_directory_is_writable() {
        let dir = tempfile::tempdir().unwrap();
        let store = ShotStore::new(dir.path(), "shot-", ".png");
        assert!(store.is_writable());
        assert!(store.ensure_writable().is_ok());
        // The check leaves nothing behind in the directory.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn read_only_directory_is_not_writable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();

        // Privileged users ignore mode bits; nothing to check there.
        let bypassed = std::fs::write(locked.join("x"), b"x").is_ok();
        if !bypassed {
            let store = ShotStore::new(&locked, "shot-", ".png");
            assert!(!store.is_writable());
            assert!(matches!(
                store.ensure_writable(),
                Err(StoreError::NotWritable(_))
            ));
        }
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}
