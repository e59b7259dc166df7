use crate::monitor::Monitor;
use crate::stimulus::render_stimulus;
use crate::text::TextCache;
use ab_glyph::FontArc;
use anyhow::{Result, anyhow, ensure};
use constim_core::DrawRequest;
use constim_timing::Timer;
use std::time::Duration;
use tiny_skia::{Color, Pixmap, PixmapPaint, Transform};
use tracing::debug;

pub const INSTRUCTIONS: &str = "Instructions :\n\nYou will be shown different stimuli\n\n\
Press Y if you see something, N if not.\n\n Strike a key when ready to start !";
pub const QUESTION: &str = "Have you seen something ? (y/n)";

/// What should be on screen right now.
#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Blank,
    Instructions,
    Announce { position: usize, total: usize },
    Stimulus(DrawRequest),
    Question,
    Message(String),
}

impl Screen {
    fn text(&self) -> Option<String> {
        match self {
            Screen::Instructions => Some(INSTRUCTIONS.to_string()),
            Screen::Announce { position, total } => Some(format!("Trial {position} / {total}")),
            Screen::Question => Some(QUESTION.to_string()),
            Screen::Message(m) => Some(m.clone()),
            Screen::Blank | Screen::Stimulus(_) => None,
        }
    }
}

pub struct FrameStats {
    pub draw: Duration,
    pub copy: Duration,
    /// False when the screen was unchanged and the frame buffer was left alone.
    pub redrawn: bool,
}

pub struct SkiaRenderer {
    width: u32,
    height: u32,
    monitor: Monitor,
    background: f64,
    background_color: Color,

    canvas: Pixmap,
    text_cache: TextCache,
    stimulus_cache: Option<(DrawRequest, Pixmap)>,

    shown: Option<Screen>,
}

impl SkiaRenderer {
    /// `background` is the mean luminance already mapped to [-1, 1].
    pub fn new(
        width: u32,
        height: u32,
        monitor: Monitor,
        background: f64,
        font: Option<FontArc>,
    ) -> Result<Self> {
        let gray = monitor.encode(background);
        let background_color = Color::from_rgba8(gray, gray, gray, 255);
        let mut canvas =
            Pixmap::new(width, height).ok_or_else(|| anyhow!("invalid canvas {width}x{height}"))?;
        canvas.fill(background_color);

        Ok(SkiaRenderer {
            width,
            height,
            monitor,
            background,
            background_color,
            canvas,
            text_cache: TextCache::new(font, 32.0, Color::BLACK),
            stimulus_cache: None,
            shown: None,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.canvas =
            Pixmap::new(width, height).ok_or_else(|| anyhow!("invalid canvas {width}x{height}"))?;
        self.width = width;
        self.height = height;
        self.shown = None;
        Ok(())
    }

    /// Draws `screen` into `frame_buffer` (RGBA8, canvas-sized). Skips the work
    /// when the same screen is already shown.
    pub fn render_frame<T: Timer>(
        &mut self,
        screen: &Screen,
        frame_buffer: &mut [u8],
        timer: &T,
    ) -> Result<FrameStats> {
        ensure!(
            frame_buffer.len() == self.canvas.data().len(),
            "frame buffer is {} bytes, canvas needs {}",
            frame_buffer.len(),
            self.canvas.data().len()
        );
        if self.shown.as_ref() == Some(screen) {
            return Ok(FrameStats {
                draw: Duration::ZERO,
                copy: Duration::ZERO,
                redrawn: false,
            });
        }

        let t = timer.now();
        self.draw_screen(screen)?;
        let draw = timer.elapsed(t);

        let t = timer.now();
        frame_buffer.copy_from_slice(self.canvas.data());
        let copy = timer.elapsed(t);

        debug!(?screen, draw_us = draw.as_micros() as u64, "screen drawn");
        self.shown = Some(screen.clone());
        Ok(FrameStats {
            draw,
            copy,
            redrawn: true,
        })
    }

    /// Draws `screen` onto the internal canvas.
    pub fn draw_screen(&mut self, screen: &Screen) -> Result<()> {
        self.clear();
        let center = (self.width as f32 * 0.5, self.height as f32 * 0.5);

        if let Screen::Stimulus(request) = screen {
            self.blit_stimulus(request, center)?;
        }
        if let Some(text) = screen.text() {
            self.blit_text(&text, center);
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.canvas.fill(self.background_color);
    }

    fn blit_stimulus(&mut self, request: &DrawRequest, pos: (f32, f32)) -> Result<()> {
        let cached = matches!(&self.stimulus_cache, Some((r, _)) if r == request);
        if !cached {
            let pm = render_stimulus(request, &self.monitor, self.background)?;
            self.stimulus_cache = Some((*request, pm));
        }
        let Some((_, pixmap)) = &self.stimulus_cache else {
            return Ok(());
        };

        let (w, h) = (pixmap.width() as i32, pixmap.height() as i32);
        let x0 = (pos.0 - w as f32 * 0.5).floor() as i32;
        let y0 = (pos.1 - h as f32 * 0.5).floor() as i32;

        let cw = self.canvas.width() as i32;
        let ch = self.canvas.height() as i32;
        let dst_x_start = x0.max(0);
        let dst_y_start = y0.max(0);
        let dst_x_end = (x0 + w).min(cw);
        let dst_y_end = (y0 + h).min(ch);
        if dst_x_end <= dst_x_start || dst_y_end <= dst_y_start {
            return Ok(());
        }
        let src_x_start = (dst_x_start - x0) as usize;
        let src_y_start = (dst_y_start - y0) as usize;
        let copy_w = (dst_x_end - dst_x_start) as usize;
        let copy_h = (dst_y_end - dst_y_start) as usize;

        // Stimulus pixmaps are opaque: plain row copies
        let src = pixmap.pixels();
        let src_stride = w as usize;
        let dst_stride = cw as usize;
        let dst = self.canvas.pixels_mut();
        for row in 0..copy_h {
            let s = (src_y_start + row) * src_stride + src_x_start;
            let d = (dst_y_start as usize + row) * dst_stride + dst_x_start as usize;
            dst[d..d + copy_w].copy_from_slice(&src[s..s + copy_w]);
        }
        Ok(())
    }

    fn blit_text(&mut self, text: &str, pos: (f32, f32)) {
        let Some(pm) = self.text_cache.get_or_render(text) else {
            return;
        };
        let x = (pos.0 - pm.width() as f32 * 0.5) as i32;
        let y = (pos.1 - pm.height() as f32 * 0.5) as i32;
        self.canvas.draw_pixmap(
            x,
            y,
            (*pm).as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }
}
