use ab_glyph::{Font, FontArc, Glyph, PxScale, ScaleFont, point};
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use tiny_skia::{Color, Pixmap, PixmapPaint, PremultipliedColorU8, Transform};
use tracing::{debug, warn};

/// First loadable font among `paths`.
pub fn load_font(paths: &[String]) -> Option<FontArc> {
    for path in paths {
        let Ok(bytes) = fs::read(path) else {
            continue;
        };
        match FontArc::try_from_vec(bytes) {
            Ok(font) => {
                debug!(%path, "font loaded");
                return Some(font);
            }
            Err(err) => warn!(%path, %err, "not a usable font"),
        }
    }
    warn!("no font found, on-screen text is disabled");
    None
}

/// Rasterizes one line of text into a tight, transparent, premultiplied pixmap.
pub fn render_text_pixmap<F: Font>(text: &str, font_size: f32, font: &F, color: Color) -> Pixmap {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    // Layout with baseline at ascent
    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let outlines: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();

    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    for out in &outlines {
        let b = out.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }

    // Blank line: keep its height so stacked blocks keep their spacing.
    if outlines.is_empty() {
        let h = (sf.ascent() - sf.descent()).ceil().max(1.0) as u32;
        return Pixmap::new(1, h).unwrap_or_else(blank);
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let Some(mut pm) = Pixmap::new(w, h) else {
        return blank();
    };

    let stride = w as usize;
    let dst = pm.pixels_mut();
    let cu = color.to_color_u8();

    for out in &outlines {
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = (x as f32 + b.min.x - min_x).floor() as i32;
            let iy = (y as f32 + b.min.y - min_y).floor() as i32;
            if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                return;
            }
            let i = iy as usize * stride + ix as usize;

            let a = (cov * cu.alpha() as f32 / 255.0).clamp(0.0, 1.0);
            let sa = (a * 255.0) as u8;
            let src = [
                (cu.red() as f32 * a) as u8,
                (cu.green() as f32 * a) as u8,
                (cu.blue() as f32 * a) as u8,
            ];

            // Porter-Duff over in premultiplied space
            let bg = dst[i];
            let inv = 1.0 - a;
            let r = src[0].saturating_add((bg.red() as f32 * inv) as u8);
            let g = src[1].saturating_add((bg.green() as f32 * inv) as u8);
            let bl = src[2].saturating_add((bg.blue() as f32 * inv) as u8);
            let al = sa.saturating_add((bg.alpha() as f32 * inv) as u8);
            if let Some(px) = PremultipliedColorU8::from_rgba(r.min(al), g.min(al), bl.min(al), al)
            {
                dst[i] = px;
            }
        });
    }

    pm
}

fn blank() -> Pixmap {
    // 1x1 always allocates
    Pixmap::new(1, 1).expect("1x1 pixmap")
}

/// Stacks rendered lines, each centred horizontally.
fn render_block<F: Font>(text: &str, font_size: f32, font: &F, color: Color) -> Pixmap {
    let lines: Vec<Pixmap> = text
        .lines()
        .map(|line| render_text_pixmap(line, font_size, font, color))
        .collect();
    if lines.len() == 1 {
        return lines.into_iter().next().unwrap_or_else(blank);
    }

    let gap = (font_size * 0.3).ceil() as u32;
    let w = lines.iter().map(|p| p.width()).max().unwrap_or(1);
    let h = lines.iter().map(|p| p.height() + gap).sum::<u32>().max(1);
    let Some(mut block) = Pixmap::new(w, h) else {
        return blank();
    };

    let mut y = 0;
    for line in &lines {
        let x = (w - line.width()) / 2;
        block.draw_pixmap(
            x as i32,
            y as i32,
            line.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
        y += line.height() + gap;
    }
    block
}

/// Rendered text blocks keyed by content.
pub struct TextCache {
    font: Option<FontArc>,
    size_px: f32,
    color: Color,
    map: HashMap<String, Arc<Pixmap>>,
}

impl TextCache {
    pub fn new(font: Option<FontArc>, size_px: f32, color: Color) -> Self {
        Self {
            font,
            size_px,
            color,
            map: HashMap::new(),
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// `None` when no font is available.
    pub fn get_or_render(&mut self, text: &str) -> Option<Arc<Pixmap>> {
        let font = self.font.as_ref()?;
        if let Some(p) = self.map.get(text) {
            return Some(Arc::clone(p));
        }
        let pm = Arc::new(render_block(text, self.size_px, font, self.color));
        self.map.insert(text.to_string(), Arc::clone(&pm));
        Some(pm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fonts_disable_text() {
        let font = load_font(&["/definitely/not/here.ttf".to_string()]);
        assert!(font.is_none());

        let mut cache = TextCache::new(None, 32.0, Color::BLACK);
        assert!(!cache.has_font());
        assert!(cache.get_or_render("Trial 1 / 300").is_none());
    }

    #[test]
    fn non_font_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.ttf");
        fs::write(&bogus, b"not a font").unwrap();
        assert!(load_font(&[bogus.to_string_lossy().to_string()]).is_none());
    }
}
