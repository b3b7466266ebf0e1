use image::{Rgba, RgbaImage};

/// GIF colour tables hold at most 256 entries.
pub const MAX_PALETTE_LEN: usize = 256;

// ============================================================================
// PALETTE
// ============================================================================

/// Ordered colour table referenced by frame indices. Entries are RGBA; the
/// entry at a frame's transparent index carries alpha 0.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<[u8; 4]>,
}

impl Palette {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from RGBA entries. Length is not checked here; the encoder
    /// rejects oversized palettes.
    pub fn from_colors(colors: Vec<[u8; 4]>) -> Self {
        Self { colors }
    }

    /// Build from a packed `[R,G,B, R,G,B, ...]` table as stored in GIF files.
    /// Trailing bytes that do not form a full triple are ignored.
    pub fn from_rgb(table: &[u8], transparent: Option<u8>) -> Self {
        let mut colors: Vec<[u8; 4]> = table
            .chunks_exact(3)
            .take(MAX_PALETTE_LEN)
            .map(|c| [c[0], c[1], c[2], 255])
            .collect();
        if let Some(t) = transparent
            && let Some(entry) = colors.get_mut(t as usize)
        {
            entry[3] = 0;
        }
        Self { colors }
    }

    /// Packed RGB table for the gif encoder (alpha dropped).
    pub fn to_rgb(&self) -> Vec<u8> {
        self.colors.iter().flat_map(|c| [c[0], c[1], c[2]]).collect()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.colors.len() >= MAX_PALETTE_LEN
    }

    pub fn colors(&self) -> &[[u8; 4]] {
        &self.colors
    }

    pub fn get(&self, index: u8) -> Option<[u8; 4]> {
        self.colors.get(index as usize).copied()
    }

    /// Lowest index holding exactly `color`.
    pub fn position(&self, color: [u8; 4]) -> Option<u8> {
        self.colors.iter().position(|&c| c == color).map(|i| i as u8)
    }

    pub fn contains(&self, color: [u8; 4]) -> bool {
        self.position(color).is_some()
    }

    /// Append a colour, returning its index, or `None` when the palette is full.
    pub fn push(&mut self, color: [u8; 4]) -> Option<u8> {
        if self.is_full() {
            return None;
        }
        self.colors.push(color);
        Some((self.colors.len() - 1) as u8)
    }

    pub(crate) fn set(&mut self, index: u8, color: [u8; 4]) {
        if let Some(entry) = self.colors.get_mut(index as usize) {
            *entry = color;
        }
    }
}

// ============================================================================
// FRAMES & ANIMATION
// ============================================================================

/// One indexed frame: a `width × height` grid of palette indices placed at
/// `(left, top)` on the logical screen.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    /// Row-major palette indices, `width * height` long.
    pub indices: Vec<u8>,
    pub palette: Palette,
    /// Per-frame override of [`AnimatedImage::delay`], in centiseconds.
    pub delay: Option<u16>,
    pub dispose: gif::DisposalMethod,
    pub transparent: Option<u8>,
}

impl Frame {
    /// Full-screen frame at the origin with default timing.
    pub fn new(width: u16, height: u16, indices: Vec<u8>, palette: Palette) -> Self {
        Self {
            left: 0,
            top: 0,
            width,
            height,
            indices,
            palette,
            delay: None,
            dispose: gif::DisposalMethod::Keep,
            transparent: None,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Colour of the pixel at `(x, y)` in frame coordinates. Indices past the
    /// end of the palette read as fully transparent.
    pub fn color_at(&self, x: u16, y: u16) -> [u8; 4] {
        let i = y as usize * self.width as usize + x as usize;
        self.indices
            .get(i)
            .and_then(|&idx| self.palette.get(idx))
            .unwrap_or([0, 0, 0, 0])
    }

    /// Number of pixels referencing each palette slot.
    pub fn usage(&self) -> [u32; MAX_PALETTE_LEN] {
        let mut counts = [0u32; MAX_PALETTE_LEN];
        for &idx in &self.indices {
            counts[idx as usize] += 1;
        }
        counts
    }

    /// Expand the indexed data against this frame's own palette into a fresh
    /// full-colour canvas of the frame's bounds.
    pub fn composite(&self) -> RgbaImage {
        let (w, h) = (self.width as u32, self.height as u32);
        let mut canvas = RgbaImage::new(w, h);
        for (i, px) in canvas.pixels_mut().enumerate() {
            let color = self
                .indices
                .get(i)
                .and_then(|&idx| self.palette.get(idx))
                .unwrap_or([0, 0, 0, 0]);
            *px = Rgba(color);
        }
        canvas
    }
}

/// A decoded animation: frames in playback order plus timing and loop
/// metadata shared by all of them.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimatedImage {
    /// Logical screen size.
    pub width: u16,
    pub height: u16,
    pub frames: Vec<Frame>,
    /// Default inter-frame delay in centiseconds.
    pub delay: u16,
    /// `Repeat::Infinite` is loop count 0; `Repeat::Finite(0)` plays once.
    pub repeat: gif::Repeat,
}

impl AnimatedImage {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Effective delay of frame `index` in centiseconds.
    pub fn frame_delay(&self, index: usize) -> Option<u16> {
        self.frames.get(index).map(|f| f.delay.unwrap_or(self.delay))
    }
}

// ============================================================================
// SURFACE: full-colour drawing target
// ============================================================================

/// Minimal pixel access needed by the text rasterizer and the quantizer.
/// Lets both run against any RGBA buffer, not just `RgbaImage`.
pub trait Surface {
    /// `(width, height)` in pixels.
    fn extent(&self) -> (u32, u32);

    /// RGBA value at `(x, y)`. Callers stay within [`Surface::extent`].
    fn read_pixel(&self, x: u32, y: u32) -> [u8; 4];

    /// Composite `color` over the pixel at `(x, y)` with the given coverage
    /// (0.0..=1.0). Out-of-bounds coordinates are ignored.
    fn paint_pixel(&mut self, x: u32, y: u32, color: [u8; 4], coverage: f32);
}

impl Surface for RgbaImage {
    fn extent(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    fn read_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.get_pixel(x, y).0
    }

    fn paint_pixel(&mut self, x: u32, y: u32, color: [u8; 4], coverage: f32) {
        if x >= self.width() || y >= self.height() {
            return;
        }
        let dst = self.get_pixel(x, y).0;
        self.put_pixel(x, y, Rgba(blend_over(dst, color, coverage)));
    }
}

/// Porter-Duff "source over" with the source alpha scaled by `coverage`.
pub fn blend_over(dst: [u8; 4], src: [u8; 4], coverage: f32) -> [u8; 4] {
    let sa = (src[3] as f32 / 255.0) * coverage.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return dst;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    let mut out = [0u8; 4];
    for c in 0..3 {
        let v = (src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_color() -> Palette {
        Palette::from_colors(vec![[255, 255, 255, 255], [255, 0, 0, 255]])
    }

    #[test]
    fn from_rgb_marks_transparent_entry() {
        let p = Palette::from_rgb(&[1, 2, 3, 4, 5, 6, 7], Some(1));
        assert_eq!(p.len(), 2);
        assert_eq!(p.get(0), Some([1, 2, 3, 255]));
        assert_eq!(p.get(1), Some([4, 5, 6, 0]));
        assert_eq!(p.to_rgb(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn push_stops_at_capacity() {
        let mut p = Palette::from_colors(vec![[0, 0, 0, 255]; MAX_PALETTE_LEN - 1]);
        assert_eq!(p.push([9, 9, 9, 255]), Some(255));
        assert!(p.is_full());
        assert_eq!(p.push([8, 8, 8, 255]), None);
        assert_eq!(p.len(), MAX_PALETTE_LEN);
    }

    #[test]
    fn position_returns_lowest_duplicate() {
        let p = Palette::from_colors(vec![[1, 1, 1, 255], [2, 2, 2, 255], [1, 1, 1, 255]]);
        assert_eq!(p.position([1, 1, 1, 255]), Some(0));
        assert_eq!(p.position([3, 3, 3, 255]), None);
    }

    #[test]
    fn composite_expands_indices() {
        let frame = Frame::new(2, 2, vec![0, 1, 1, 0], two_color());
        let canvas = frame.composite();
        assert_eq!(canvas.dimensions(), (2, 2));
        assert_eq!(canvas.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(canvas.get_pixel(1, 0).0, [255, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(0, 1).0, [255, 0, 0, 255]);
    }

    #[test]
    fn composite_out_of_range_index_is_transparent() {
        let frame = Frame::new(1, 1, vec![7], two_color());
        assert_eq!(frame.composite().get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert_eq!(frame.color_at(0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn usage_counts_references() {
        let frame = Frame::new(2, 2, vec![0, 1, 1, 1], two_color());
        let usage = frame.usage();
        assert_eq!(usage[0], 1);
        assert_eq!(usage[1], 3);
        assert_eq!(usage[2], 0);
    }

    #[test]
    fn opaque_full_coverage_replaces_pixel() {
        assert_eq!(blend_over([10, 200, 30, 255], [0, 0, 0, 255], 1.0), [0, 0, 0, 255]);
    }

    #[test]
    fn zero_coverage_keeps_pixel() {
        assert_eq!(blend_over([10, 200, 30, 255], [0, 0, 0, 255], 0.0), [10, 200, 30, 255]);
    }

    #[test]
    fn half_coverage_mixes() {
        let out = blend_over([200, 200, 200, 255], [0, 0, 0, 255], 0.5);
        assert_eq!(out, [100, 100, 100, 255]);
    }

    #[test]
    fn paint_onto_transparent_takes_source_color() {
        let mut img = RgbaImage::new(1, 1);
        img.paint_pixel(0, 0, [0, 0, 0, 255], 1.0);
        img.paint_pixel(5, 5, [0, 0, 0, 255], 1.0);
        assert_eq!(img.read_pixel(0, 0), [0, 0, 0, 255]);
    }

    #[test]
    fn frame_delay_falls_back_to_default() {
        let mut second = Frame::new(1, 1, vec![0], two_color());
        second.delay = Some(50);
        let anim = AnimatedImage {
            width: 1,
            height: 1,
            frames: vec![Frame::new(1, 1, vec![0], two_color()), second],
            delay: 10,
            repeat: gif::Repeat::Infinite,
        };
        assert_eq!(anim.frame_delay(0), Some(10));
        assert_eq!(anim.frame_delay(1), Some(50));
        assert_eq!(anim.frame_delay(2), None);
    }
}
