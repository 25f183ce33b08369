// SPDX-License-Identifier: MPL-2.0

//! Rotating output slots for saved frames
//!
//! Frames are written to `<dir>/<prefix><index>.png` with the index cycling
//! through a fixed number of slots, which bounds disk usage. Each file is
//! written under a temporary name and renamed into place, so a reader never
//! sees a half-written PNG.

use std::path::PathBuf;

use image::{GrayImage, ImageFormat};
use tracing::{debug, info, warn};

use crate::constants::CleanupPolicy;
use crate::errors::StorageError;

/// A fixed set of numbered output files written in rotation
#[derive(Debug)]
pub struct SlotRing {
    dir: PathBuf,
    prefix: String,
    slots: usize,
    policy: CleanupPolicy,
    next: usize,
    /// Set once the index has gone from the last slot back to 0
    wrapped: bool,
}

impl SlotRing {
    /// A ring of `slots` files (at least one) in `dir`
    pub fn new(
        dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        slots: usize,
        policy: CleanupPolicy,
    ) -> Self {
        let dir = dir.into();
        let slots = slots.max(1);
        info!(dir = %dir.display(), slots, policy = %policy, "Output slots configured");
        Self {
            dir,
            prefix: prefix.into(),
            slots,
            policy,
            next: 0,
            wrapped: false,
        }
    }

    /// Index the next `store` writes to
    pub fn next_index(&self) -> usize {
        self.next
    }

    /// Path of slot `index`
    pub fn slot_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}{}.png", self.prefix, index))
    }

    fn temp_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!(".{}{}.png.tmp", self.prefix, index))
    }

    /// Write `image` into the next slot and advance
    ///
    /// The index advances even when the write fails, so one bad slot does not
    /// stall the rotation.
    pub fn store(&mut self, image: &GrayImage) -> Result<PathBuf, StorageError> {
        let index = self.next;
        self.next = (self.next + 1) % self.slots;

        // Files from an earlier run survive until this ring wraps itself
        if index == 0 && self.wrapped && self.policy.deletes_on_wrap() {
            self.sweep();
        }
        if self.next == 0 {
            self.wrapped = true;
        }

        std::fs::create_dir_all(&self.dir).map_err(|e| {
            StorageError::CreateDirFailed(format!("{}: {}", self.dir.display(), e))
        })?;

        let temp = self.temp_path(index);
        let path = self.slot_path(index);

        if let Err(e) = image.save_with_format(&temp, ImageFormat::Png) {
            let _ = std::fs::remove_file(&temp);
            return Err(StorageError::WriteFailed(format!("{}: {}", temp.display(), e)));
        }
        std::fs::rename(&temp, &path).map_err(|e| {
            let _ = std::fs::remove_file(&temp);
            StorageError::RenameFailed(format!("{}: {}", path.display(), e))
        })?;

        debug!(path = %path.display(), index, "Frame stored");
        Ok(path)
    }

    /// Delete every slot file; missing files are fine, other failures are logged
    pub fn sweep(&self) {
        for index in 0..self.slots {
            let path = self.slot_path(index);
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "Removed slot file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove slot file")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn frame(value: u8) -> GrayImage {
        GrayImage::from_pixel(4, 3, Luma([value]))
    }

    #[test]
    fn test_slot_names() {
        let ring = SlotRing::new("/tmp/out", "test_", 11, CleanupPolicy::Overwrite);
        assert_eq!(ring.slot_path(0), PathBuf::from("/tmp/out/test_0.png"));
        assert_eq!(ring.slot_path(10), PathBuf::from("/tmp/out/test_10.png"));
    }

    #[test]
    fn test_indices_wrap() {
        let dir = tempfile::tempdir().unwrap();
        let mut ring = SlotRing::new(dir.path(), "test_", 3, CleanupPolicy::Overwrite);
        let written: Vec<PathBuf> = (0..4).map(|i| ring.store(&frame(i)).unwrap()).collect();
        assert_eq!(written[0], ring.slot_path(0));
        assert_eq!(written[2], ring.slot_path(2));
        assert_eq!(written[3], ring.slot_path(0));
        assert_eq!(ring.next_index(), 1);

        // Slot 0 holds the newest frame
        let reloaded = image::open(ring.slot_path(0)).unwrap().to_luma8();
        assert_eq!(reloaded.get_pixel(0, 0).0[0], 3);
    }

    #[test]
    fn test_overwrite_keeps_other_slots() {
        let dir = tempfile::tempdir().unwrap();
        let mut ring = SlotRing::new(dir.path(), "test_", 3, CleanupPolicy::Overwrite);
        for i in 0..4 {
            ring.store(&frame(i)).unwrap();
        }
        assert!(ring.slot_path(1).exists());
        assert!(ring.slot_path(2).exists());
    }

    #[test]
    fn test_sweep_deletes_on_wrap() {
        let dir = tempfile::tempdir().unwrap();
        let mut ring = SlotRing::new(dir.path(), "test_", 3, CleanupPolicy::Sweep);
        for i in 0..4 {
            ring.store(&frame(i)).unwrap();
        }
        assert!(ring.slot_path(0).exists());
        assert!(!ring.slot_path(1).exists());
        assert!(!ring.slot_path(2).exists());
    }

    #[test]
    fn test_sweep_keeps_files_before_first_wrap() {
        let dir = tempfile::tempdir().unwrap();
        let mut ring = SlotRing::new(dir.path(), "test_", 3, CleanupPolicy::Sweep);
        let leftover = ring.slot_path(2);
        std::fs::write(&leftover, b"previous run").unwrap();

        ring.store(&frame(0)).unwrap();
        ring.store(&frame(1)).unwrap();
        assert!(leftover.exists());

        // Third store overwrites slot 2, the fourth wraps and sweeps
        ring.store(&frame(2)).unwrap();
        ring.store(&frame(3)).unwrap();
        assert!(!ring.slot_path(2).exists());
        assert!(!ring.slot_path(1).exists());
        assert!(ring.slot_path(0).exists());
    }

    #[test]
    fn test_single_slot_sweeps_from_second_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut ring = SlotRing::new(dir.path(), "test_", 1, CleanupPolicy::Sweep);
        std::fs::write(ring.slot_path(0), b"previous run").unwrap();
        ring.store(&frame(7)).unwrap();
        ring.store(&frame(8)).unwrap();
        let reloaded = image::open(ring.slot_path(0)).unwrap().to_luma8();
        assert_eq!(reloaded.get_pixel(0, 0).0[0], 8);
    }

    #[test]
    fn test_no_temp_files_left() {
        let dir = tempfile::tempdir().unwrap();
        let mut ring = SlotRing::new(dir.path(), "test_", 2, CleanupPolicy::Overwrite);
        ring.store(&frame(1)).unwrap();
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["test_0.png".to_string()]);
    }

    #[test]
    fn test_failed_write_still_advances() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let mut ring = SlotRing::new(blocker.join("out"), "test_", 3, CleanupPolicy::Overwrite);
        assert!(matches!(
            ring.store(&frame(0)),
            Err(StorageError::CreateDirFailed(_))
        ));
        assert_eq!(ring.next_index(), 1);
    }
}
