// SPDX-License-Identifier: GPL-3.0-only

//! Preview windows and keyboard input
//!
//! The capture loop shows the color frame and the processed output, then
//! blocks in [`Preview::wait_key`] for one refresh interval. Two
//! implementations exist:
//!
//! - [`terminal::TerminalPreview`]: renders into the terminal with
//!   half-block characters (ratatui + crossterm)
//! - [`headless::HeadlessPreview`]: draws nothing, only paces the loop

pub mod headless;
pub mod terminal;

use std::time::Duration;

use image::{GrayImage, RgbaImage};

use crate::errors::AppResult;

/// A key press relevant to the capture loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Quit
    Escape,
    /// Ctrl+C while the terminal is in raw mode
    Interrupt,
    /// Raise the threshold
    Up,
    /// Lower the threshold
    Down,
    Char(char),
    Other,
}

impl Key {
    /// Whether this key ends the session
    pub fn requests_shutdown(&self) -> bool {
        matches!(self, Key::Escape | Key::Interrupt)
    }
}

/// An image to show in a preview window
#[derive(Debug, Clone, Copy)]
pub enum PreviewFrame<'a> {
    Rgba(&'a RgbaImage),
    Gray(&'a GrayImage),
}

impl PreviewFrame<'_> {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            PreviewFrame::Rgba(image) => image.dimensions(),
            PreviewFrame::Gray(image) => image.dimensions(),
        }
    }
}

/// Display surface for the capture loop
pub trait Preview {
    /// Replace the contents of the named window
    fn show(&mut self, window: &str, frame: PreviewFrame<'_>) -> AppResult<()>;

    /// Refresh the display and wait up to `timeout` for a key
    ///
    /// Returns as soon as a key arrives; `None` after the full timeout.
    fn wait_key(&mut self, timeout: Duration) -> AppResult<Option<Key>>;

    /// Text for the status line, if the preview has one
    fn set_status(&mut self, _status: &str) {}
}

/// Create the preview for this session
pub fn create(headless: bool) -> AppResult<Box<dyn Preview>> {
    if headless {
        Ok(Box::new(headless::HeadlessPreview::new()))
    } else {
        Ok(Box::new(terminal::TerminalPreview::new()?))
    }
}
