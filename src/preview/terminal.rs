// SPDX-License-Identifier: GPL-3.0-only

//! Terminal preview
//!
//! Renders the preview windows side by side using Unicode half-block
//! characters for improved vertical resolution. The terminal is switched to
//! raw mode on the alternate screen and restored on drop.

use std::io::{self, Stdout, stdout};
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use image::{Rgba, RgbaImage};
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    style::Style, widgets::Widget,
};
use tracing::{info, warn};

use super::{Key, Preview, PreviewFrame};
use crate::errors::AppResult;

/// Preview drawing into the controlling terminal
pub struct TerminalPreview {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    /// Windows in the order they were first shown
    windows: Vec<(String, RgbaImage)>,
    status: String,
}

impl TerminalPreview {
    pub fn new() -> AppResult<Self> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(e.into());
        }
        let backend = CrosstermBackend::new(stdout);
        let terminal = match Terminal::new(backend) {
            Ok(terminal) => terminal,
            Err(e) => {
                let _ = disable_raw_mode();
                let _ = execute!(io::stdout(), LeaveAlternateScreen);
                return Err(e.into());
            }
        };
        info!("Terminal preview started");

        Ok(Self {
            terminal,
            windows: Vec::new(),
            status: String::new(),
        })
    }

    fn draw(&mut self) -> AppResult<()> {
        let windows = &self.windows;
        let status = &self.status;

        self.terminal.draw(|f| {
            let area = f.area();

            // Reserve bottom line for status
            let panes_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(1),
            };

            for (rect, (title, image)) in split_columns(panes_area, windows.len())
                .into_iter()
                .zip(windows)
            {
                f.render_widget(FrameWidget { title, image }, rect);
            }

            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };
            f.render_widget(StatusBar { message: status }, status_area);
        })?;

        Ok(())
    }
}

impl Preview for TerminalPreview {
    fn show(&mut self, window: &str, frame: PreviewFrame<'_>) -> AppResult<()> {
        let image = to_rgba(frame);
        match self.windows.iter_mut().find(|(name, _)| name == window) {
            Some((_, existing)) => *existing = image,
            None => self.windows.push((window.to_string(), image)),
        }
        Ok(())
    }

    fn wait_key(&mut self, timeout: Duration) -> AppResult<Option<Key>> {
        self.draw()?;

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !event::poll(remaining)? {
                return Ok(None);
            }
            if let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                let mapped = match key.code {
                    KeyCode::Esc => Key::Escape,
                    KeyCode::Up => Key::Up,
                    KeyCode::Down => Key::Down,
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        Key::Interrupt
                    }
                    KeyCode::Char(c) => Key::Char(c),
                    _ => Key::Other,
                };
                return Ok(Some(mapped));
            }
            if remaining.is_zero() {
                return Ok(None);
            }
        }
    }

    fn set_status(&mut self, status: &str) {
        let timestamp = chrono::Local::now().format("%H:%M:%S");
        self.status = format!("{} | {}", timestamp, status);
    }
}

impl Drop for TerminalPreview {
    fn drop(&mut self) {
        // Restore terminal
        if let Err(e) = disable_raw_mode() {
            warn!("Failed to leave raw mode: {}", e);
        }
        if let Err(e) = execute!(self.terminal.backend_mut(), LeaveAlternateScreen) {
            warn!("Failed to leave alternate screen: {}", e);
        }
        let _ = self.terminal.show_cursor();
    }
}

fn to_rgba(frame: PreviewFrame<'_>) -> RgbaImage {
    match frame {
        PreviewFrame::Rgba(image) => image.clone(),
        PreviewFrame::Gray(image) => RgbaImage::from_fn(image.width(), image.height(), |x, y| {
            let v = image.get_pixel(x, y).0[0];
            Rgba([v, v, v, 255])
        }),
    }
}

/// Split `area` into `count` equal-width columns
fn split_columns(area: Rect, count: usize) -> Vec<Rect> {
    if count == 0 {
        return Vec::new();
    }
    let count = count.min(usize::from(area.width.max(1))) as u16;
    let column_width = area.width / count;
    (0..count)
        .map(|i| {
            let x = area.x + i * column_width;
            let width = if i + 1 == count {
                area.width - i * column_width
            } else {
                column_width
            };
            Rect {
                x,
                y: area.y,
                width,
                height: area.height,
            }
        })
        .collect()
}

/// Widget that renders one preview window using half-block characters
struct FrameWidget<'a> {
    title: &'a str,
    image: &'a RgbaImage,
}

impl Widget for FrameWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height < 2 {
            return;
        }

        // Title on the first row
        let title: String = self.title.chars().take(area.width as usize).collect();
        buf.set_string(area.x, area.y, title, Style::default().fg(Color::Yellow));

        let area = Rect {
            y: area.y + 1,
            height: area.height - 1,
            ..area
        };

        let (width, height) = self.image.dimensions();
        if width == 0 || height == 0 {
            return;
        }

        // Each terminal cell displays 2 vertical pixels using half-block characters
        let frame_aspect = width as f64 / height as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            // Terminal is wider - fit to height
            let h = term_height;
            let w = h * frame_aspect;
            (w as u16, (h / 2.0) as u16)
        } else {
            // Terminal is taller - fit to width
            let w = term_width;
            let h = w / frame_aspect;
            (w as u16, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        // Center the image
        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = width as f64 / display_width as f64;
        let y_scale = height as f64 / (display_height * 2) as f64;

        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;

                if term_x >= area.x + area.width || term_y >= area.y + area.height {
                    continue;
                }

                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                let top_color = sample_pixel(self.image, src_x, src_y_top);
                let bottom_color = sample_pixel(self.image, src_x, src_y_bottom);

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(top_color);
                    cell.set_bg(bottom_color);
                }
            }
        }
    }
}

fn sample_pixel(image: &RgbaImage, x: u32, y: u32) -> Color {
    let x = x.min(image.width() - 1);
    let y = y.min(image.height() - 1);
    let [r, g, b, _] = image.get_pixel(x, y).0;
    Color::Rgb(r, g, b)
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Fill background
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();

        buf.set_string(
            area.x,
            area.y,
            text,
            Style::default().fg(Color::White).bg(Color::DarkGray),
        );
    }
}
