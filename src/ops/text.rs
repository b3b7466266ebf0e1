use ab_glyph::{point, Font, FontArc, GlyphId, ScaleFont};
use std::path::{Path, PathBuf};

use crate::canvas::Surface;
use crate::error::{GifStampError, Result};

/// Where [`find_system_font`] looks for a usable TrueType font.
const SYSTEM_FONT_PATTERNS: &[&str] = &[
    "/usr/share/fonts/**/*.ttf",
    "/usr/local/share/fonts/**/*.ttf",
    "/Library/Fonts/*.ttf",
    "/System/Library/Fonts/**/*.ttf",
    "C:/Windows/Fonts/*.ttf",
];

// ============================================================================
// FONT RESOURCE
// ============================================================================

/// A parsed outline font. Cheap to clone and safe to share across threads.
#[derive(Clone, Debug)]
pub struct FontResource {
    font: FontArc,
}

impl FontResource {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let font = FontArc::try_from_vec(bytes)?;
        Ok(Self { font })
    }

    /// Read and parse a font file. Unreadable files are reported as font
    /// errors, not source errors.
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            GifStampError::FontLoad(format!("could not read '{}': {}", path.display(), e))
        })?;
        Self::from_bytes(bytes)
            .map_err(|e| GifStampError::FontLoad(format!("'{}': {}", path.display(), e)))
    }
}

/// First installed `.ttf` that parses, in [`SYSTEM_FONT_PATTERNS`] order.
pub fn find_system_font() -> Option<(PathBuf, FontResource)> {
    for pattern in SYSTEM_FONT_PATTERNS {
        let Ok(entries) = glob::glob(pattern) else {
            continue;
        };
        for path in entries.flatten() {
            if let Ok(font) = FontResource::open(&path) {
                return Some((path, font));
            }
        }
    }
    None
}

// ============================================================================
// LAYOUT
// ============================================================================

/// Size of a laid-out line of text, in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TextMetrics {
    /// Total advance width including kerning.
    pub width: f32,
    pub ascent: f32,
    /// Negative below the baseline.
    pub descent: f32,
    /// `ascent - descent`: the height of the anchoring box.
    pub height: f32,
}

/// Lay out a single line of text left-aligned at x = 0.
/// Returns `(glyph, x)` pairs plus the line metrics.
pub fn layout_line(font: &FontArc, text: &str, font_size: f32) -> (Vec<(GlyphId, f32)>, TextMetrics) {
    let scaled = font.as_scaled(font_size);
    let ascent = scaled.ascent();
    let descent = scaled.descent();

    let mut glyphs = Vec::new();
    let mut cursor_x = 0.0f32;
    let mut last_glyph: Option<GlyphId> = None;

    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, cursor_x));
        cursor_x += scaled.h_advance(glyph_id);
        last_glyph = Some(glyph_id);
    }

    let metrics = TextMetrics {
        width: cursor_x,
        ascent,
        descent,
        height: ascent - descent,
    };
    (glyphs, metrics)
}

/// Top-left corner of a `width × height` box placed so that `anchor` lands
/// at the fractional position `align` inside it.
pub fn anchored_origin(anchor: (f32, f32), align: (f32, f32), width: f32, height: f32) -> (f32, f32) {
    (anchor.0 - align.0 * width, anchor.1 - align.1 * height)
}

// ============================================================================
// RENDERING
// ============================================================================

/// Draws a single line of text onto a [`Surface`].
pub trait TextRenderer {
    fn measure(&self, text: &str) -> TextMetrics;

    /// Draw `text` so that `anchor` sits at fractional position `align` of
    /// its bounding box ((0.5, 0.5) centres the text on `anchor`).
    fn draw_anchored_text(
        &self,
        surface: &mut dyn Surface,
        text: &str,
        anchor: (f32, f32),
        align: (f32, f32),
        color: [u8; 4],
    );
}

/// [`TextRenderer`] backed by `ab_glyph` outlines at a fixed pixel size.
#[derive(Clone, Debug)]
pub struct GlyphRenderer {
    font: FontArc,
    size: f32,
}

impl GlyphRenderer {
    /// Fails with [`GifStampError::FontLoad`] unless `size` is finite and positive.
    pub fn new(font: &FontResource, size: f32) -> Result<Self> {
        if !size.is_finite() || size <= 0.0 {
            return Err(GifStampError::FontLoad(format!("unusable font size {}", size)));
        }
        Ok(Self { font: font.font.clone(), size })
    }
}

impl TextRenderer for GlyphRenderer {
    fn measure(&self, text: &str) -> TextMetrics {
        layout_line(&self.font, text, self.size).1
    }

    fn draw_anchored_text(
        &self,
        surface: &mut dyn Surface,
        text: &str,
        anchor: (f32, f32),
        align: (f32, f32),
        color: [u8; 4],
    ) {
        let (glyphs, metrics) = layout_line(&self.font, text, self.size);
        if glyphs.is_empty() {
            return;
        }
        let (left, top) = anchored_origin(anchor, align, metrics.width, metrics.height);
        let baseline = top + metrics.ascent;

        let outlined: Vec<_> = glyphs
            .iter()
            .filter_map(|&(id, gx)| {
                let glyph = id.with_scale_and_position(self.size, point(left + gx, baseline));
                self.font.outline_glyph(glyph)
            })
            .collect();
        if outlined.is_empty() {
            return;
        }

        // Union of pixel bounds, clamped to the surface
        let (canvas_w, canvas_h) = surface.extent();
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        for g in &outlined {
            let b = g.px_bounds();
            min_x = min_x.min(b.min.x);
            min_y = min_y.min(b.min.y);
            max_x = max_x.max(b.max.x);
            max_y = max_y.max(b.max.y);
        }
        let x0 = (min_x.floor() as i32).max(0);
        let y0 = (min_y.floor() as i32).max(0);
        let x1 = (max_x.ceil() as i32).min(canvas_w as i32);
        let y1 = (max_y.ceil() as i32).min(canvas_h as i32);
        if x1 <= x0 || y1 <= y0 {
            return;
        }
        let buf_w = (x1 - x0) as usize;
        let buf_h = (y1 - y0) as usize;

        // Accumulate coverage first so overlapping glyph edges blend once
        let mut coverage = vec![0.0f32; buf_w * buf_h];
        for g in &outlined {
            let b = g.px_bounds();
            let gx0 = b.min.x as i32;
            let gy0 = b.min.y as i32;
            g.draw(|px, py, cov| {
                let ix = gx0 + px as i32 - x0;
                let iy = gy0 + py as i32 - y0;
                if ix >= 0 && iy >= 0 && (ix as usize) < buf_w && (iy as usize) < buf_h {
                    let idx = iy as usize * buf_w + ix as usize;
                    coverage[idx] = coverage[idx].max(cov);
                }
            });
        }

        for (i, &cov) in coverage.iter().enumerate() {
            if cov > 0.001 {
                let x = x0 as u32 + (i % buf_w) as u32;
                let y = y0 as u32 + (i / buf_w) as u32;
                surface.paint_pixel(x, y, color, cov);
            }
        }
    }
}

/// One-shot helper: validate the size, then draw.
pub fn draw_anchored_text(
    surface: &mut dyn Surface,
    font: &FontResource,
    font_size: f32,
    text: &str,
    anchor: (f32, f32),
    align: (f32, f32),
    color: [u8; 4],
) -> Result<()> {
    let renderer = GlyphRenderer::new(font, font_size)?;
    renderer.draw_anchored_text(surface, text, anchor, align, color);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    const WHITE: [u8; 4] = [255, 255, 255, 255];
    const BLACK: [u8; 4] = [0, 0, 0, 255];

    fn font() -> FontResource {
        FontResource::from_bytes(include_bytes!("../../tests/fixtures/DejaVuSansMono.ttf").to_vec())
            .unwrap()
    }

    #[test]
    fn anchored_origin_centres_box() {
        assert_eq!(anchored_origin((50.0, 50.0), (0.5, 0.5), 20.0, 10.0), (40.0, 45.0));
        assert_eq!(anchored_origin((50.0, 50.0), (0.0, 0.0), 20.0, 10.0), (50.0, 50.0));
        assert_eq!(anchored_origin((50.0, 50.0), (1.0, 1.0), 20.0, 10.0), (30.0, 40.0));
    }

    #[test]
    fn garbage_font_is_font_error() {
        let err = FontResource::from_bytes(vec![0, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, GifStampError::FontLoad(_)));
    }

    #[test]
    fn missing_font_file_is_font_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FontResource::open(&dir.path().join("none.ttf")).unwrap_err();
        assert!(matches!(err, GifStampError::FontLoad(_)));
    }

    #[test]
    fn bad_size_is_font_error() {
        let font = font();
        for size in [0.0, -4.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(GlyphRenderer::new(&font, size), Err(GifStampError::FontLoad(_))));
        }
    }

    #[test]
    fn measure_grows_with_text() {
        let font = font();
        let r = GlyphRenderer::new(&font, 16.0).unwrap();
        assert_eq!(r.measure("").width, 0.0);
        let short = r.measure("1");
        let long = r.measure("11.11. 11:11");
        assert!(long.width > short.width);
        assert!(short.height > 0.0);
    }

    #[test]
    fn monospace_width_is_additive() {
        let r = GlyphRenderer::new(&font(), 20.0).unwrap();
        let one = r.measure("0").width;
        assert!(one > 0.0);
        assert!((r.measure("0000").width - 4.0 * one).abs() < 0.01);
    }

    #[test]
    fn centred_text_marks_centre_and_spares_corners() {
        let font = font();
        let mut img = RgbaImage::from_pixel(120, 40, Rgba(WHITE));
        draw_anchored_text(&mut img, &font, 16.0, "07.03. 09:05", (60.0, 20.0), (0.5, 0.5), BLACK)
            .unwrap();

        let centre_marked = (40..80)
            .flat_map(|x| (12..28).map(move |y| (x, y)))
            .any(|(x, y)| img.get_pixel(x, y).0 != WHITE);
        assert!(centre_marked);
        for (x, y) in [(0, 0), (119, 0), (0, 39), (119, 39)] {
            assert_eq!(img.get_pixel(x, y).0, WHITE);
        }
    }

    #[test]
    fn text_off_surface_is_clipped() {
        let font = font();
        let r = GlyphRenderer::new(&font, 16.0).unwrap();
        let mut img = RgbaImage::from_pixel(10, 10, Rgba(WHITE));
        r.draw_anchored_text(&mut img, "0000", (-200.0, -200.0), (0.5, 0.5), BLACK);
        assert!(img.pixels().all(|p| p.0 == WHITE));
    }

    #[test]
    fn empty_text_draws_nothing() {
        let font = font();
        let r = GlyphRenderer::new(&font, 16.0).unwrap();
        let mut img = RgbaImage::from_pixel(10, 10, Rgba(WHITE));
        r.draw_anchored_text(&mut img, "", (5.0, 5.0), (0.5, 0.5), BLACK);
        assert!(img.pixels().all(|p| p.0 == WHITE));
    }
}
