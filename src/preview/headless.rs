// SPDX-License-Identifier: GPL-3.0-only

//! Preview that draws nothing

use std::time::Duration;

use tracing::debug;

use super::{Key, Preview, PreviewFrame};
use crate::errors::AppResult;

/// Paces the loop without a display; never reports a key
#[derive(Debug, Default)]
pub struct HeadlessPreview {
    shown: u64,
}

impl HeadlessPreview {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `show` calls so far
    pub fn frames_shown(&self) -> u64 {
        self.shown
    }
}

impl Preview for HeadlessPreview {
    fn show(&mut self, window: &str, frame: PreviewFrame<'_>) -> AppResult<()> {
        let (width, height) = frame.dimensions();
        debug!(window, width, height, "Frame ready");
        self.shown += 1;
        Ok(())
    }

    fn wait_key(&mut self, timeout: Duration) -> AppResult<Option<Key>> {
        std::thread::sleep(timeout);
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    #[test]
    fn test_never_returns_key() {
        let mut preview = HeadlessPreview::new();
        let image = GrayImage::new(2, 2);
        preview.show("output", PreviewFrame::Gray(&image)).unwrap();
        assert_eq!(preview.wait_key(Duration::ZERO).unwrap(), None);
        assert_eq!(preview.frames_shown(), 1);
    }
}
