use std::collections::HashMap;

use crate::canvas::{Frame, MAX_PALETTE_LEN, Palette, Surface};

/// Map a full-colour surface back onto an indexed frame.
///
/// Starts from a copy of `base` and, per pixel: reuses an exact match,
/// appends the colour while the palette has room, and otherwise falls back
/// to the nearest existing entry (squared RGBA distance, lowest index wins
/// ties). Every `base` entry keeps its index in the result.
///
/// Geometry, timing, disposal and transparency are copied from `template`;
/// the surface must have the template's dimensions.
pub fn quantize(canvas: &impl Surface, base: &Palette, template: &Frame) -> Frame {
    let (w, h) = canvas.extent();
    let mut palette = base.clone();
    let mut lookup: HashMap<[u8; 4], u8> = HashMap::new();
    for (i, &c) in palette.colors().iter().enumerate() {
        lookup.entry(c).or_insert(i as u8);
    }

    let mut indices = Vec::with_capacity(w as usize * h as usize);
    for y in 0..h {
        for x in 0..w {
            let color = canvas.read_pixel(x, y);
            let idx = match lookup.get(&color) {
                Some(&idx) => idx,
                None => {
                    let idx = match palette.push(color) {
                        Some(idx) => idx,
                        None => nearest(&palette, color),
                    };
                    lookup.insert(color, idx);
                    idx
                }
            };
            indices.push(idx);
        }
    }

    Frame {
        indices,
        palette,
        ..template.clone_geometry()
    }
}

/// Index of the palette entry closest to `color`. Lowest index wins ties.
pub fn nearest(palette: &Palette, color: [u8; 4]) -> u8 {
    let mut best = 0usize;
    let mut best_dist = u32::MAX;
    for (i, &c) in palette.colors().iter().enumerate() {
        let d = distance_sq(c, color);
        if d < best_dist {
            best = i;
            best_dist = d;
            if d == 0 {
                break;
            }
        }
    }
    best as u8
}

fn distance_sq(a: [u8; 4], b: [u8; 4]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x as i32 - y as i32;
            (d * d) as u32
        })
        .sum()
}

impl Frame {
    /// Same geometry and metadata with empty pixel data.
    fn clone_geometry(&self) -> Frame {
        Frame {
            left: self.left,
            top: self.top,
            width: self.width,
            height: self.height,
            indices: Vec::new(),
            palette: Palette::new(),
            delay: self.delay,
            dispose: self.dispose,
            transparent: self.transparent,
        }
    }
}

impl Palette {
    /// Return a palette that is guaranteed to contain `color` exactly.
    ///
    /// Present → unchanged copy. Room left → appended. Full → the slot with
    /// the fewest references in `usage` is overwritten (highest index wins
    /// ties); `protect` (the transparent index) is never chosen.
    pub fn reserve(&self, color: [u8; 4], usage: &[u32; MAX_PALETTE_LEN], protect: Option<u8>) -> Palette {
        let mut out = self.clone();
        if out.contains(color) || out.push(color).is_some() {
            return out;
        }

        let victim = (0..out.len())
            .rev()
            .filter(|&i| Some(i as u8) != protect)
            .min_by_key(|&i| usage[i]);
        if let Some(i) = victim {
            log_warn!(
                "palette full, slot {} ({} px) replaced by {:?}",
                i,
                usage[i],
                color
            );
            out.set(i as u8, color);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    const WHITE: [u8; 4] = [255, 255, 255, 255];
    const BLACK: [u8; 4] = [0, 0, 0, 255];
    const RED: [u8; 4] = [255, 0, 0, 255];

    fn template(w: u16, h: u16) -> Frame {
        let mut f = Frame::new(w, h, vec![0; w as usize * h as usize], Palette::from_colors(vec![WHITE]));
        f.delay = Some(7);
        f.transparent = Some(0);
        f
    }

    #[test]
    fn exact_colors_reuse_existing_slots() {
        let base = Palette::from_colors(vec![WHITE, RED]);
        let mut img = RgbaImage::from_pixel(2, 1, Rgba(WHITE));
        img.put_pixel(1, 0, Rgba(RED));
        let out = quantize(&img, &base, &template(2, 1));
        assert_eq!(out.indices, vec![0, 1]);
        assert_eq!(out.palette, base);
    }

    #[test]
    fn new_colors_are_appended_in_order() {
        let base = Palette::from_colors(vec![WHITE]);
        let mut img = RgbaImage::from_pixel(3, 1, Rgba(WHITE));
        img.put_pixel(0, 0, Rgba(RED));
        img.put_pixel(2, 0, Rgba(BLACK));
        let out = quantize(&img, &base, &template(3, 1));
        assert_eq!(out.palette.colors(), &[WHITE, RED, BLACK]);
        assert_eq!(out.indices, vec![1, 0, 2]);
    }

    #[test]
    fn full_palette_falls_back_to_nearest() {
        let mut colors: Vec<[u8; 4]> = (0..=255u8).map(|v| [v, 0, 0, 255]).collect();
        colors[0] = [0, 0, 0, 255];
        let base = Palette::from_colors(colors);
        let img = RgbaImage::from_pixel(1, 1, Rgba([100, 3, 0, 255]));
        let out = quantize(&img, &base, &template(1, 1));
        assert_eq!(out.palette.len(), MAX_PALETTE_LEN);
        assert_eq!(out.indices, vec![100]);
    }

    #[test]
    fn nearest_breaks_ties_by_lowest_index() {
        let p = Palette::from_colors(vec![[10, 0, 0, 255], [0, 10, 0, 255], [0, 0, 0, 255]]);
        assert_eq!(nearest(&p, [5, 5, 0, 255]), 0);
        assert_eq!(nearest(&p, [0, 0, 0, 255]), 2);
    }

    #[test]
    fn base_palette_is_not_mutated() {
        let base = Palette::from_colors(vec![WHITE]);
        let img = RgbaImage::from_pixel(1, 1, Rgba(RED));
        let _ = quantize(&img, &base, &template(1, 1));
        assert_eq!(base.len(), 1);
    }

    #[test]
    fn metadata_comes_from_template() {
        let base = Palette::from_colors(vec![WHITE]);
        let img = RgbaImage::from_pixel(2, 2, Rgba(WHITE));
        let out = quantize(&img, &base, &template(2, 2));
        assert_eq!((out.width, out.height), (2, 2));
        assert_eq!(out.delay, Some(7));
        assert_eq!(out.transparent, Some(0));
        assert_eq!(out.indices.len(), 4);
    }

    #[test]
    fn reserve_present_or_appended() {
        let usage = [0u32; MAX_PALETTE_LEN];
        let p = Palette::from_colors(vec![WHITE, BLACK]);
        assert_eq!(p.reserve(BLACK, &usage, None), p);
        let q = Palette::from_colors(vec![WHITE]).reserve(BLACK, &usage, None);
        assert_eq!(q.colors(), &[WHITE, BLACK]);
    }

    #[test]
    fn reserve_evicts_least_used_slot() {
        let colors: Vec<[u8; 4]> = (0..=255u8).map(|v| [v, v, 255, 255]).collect();
        let p = Palette::from_colors(colors);
        let mut usage = [5u32; MAX_PALETTE_LEN];
        usage[40] = 0;
        usage[200] = 0;
        usage[255] = 1;
        let out = p.reserve(BLACK, &usage, Some(200));
        assert_eq!(out.len(), MAX_PALETTE_LEN);
        assert_eq!(out.get(40), Some(BLACK));
        assert_eq!(out.get(200), p.get(200));
    }

    #[test]
    fn reserve_prefers_highest_index_on_ties() {
        let colors: Vec<[u8; 4]> = (0..=255u8).map(|v| [v, 1, 1, 255]).collect();
        let p = Palette::from_colors(colors);
        let usage = [3u32; MAX_PALETTE_LEN];
        let out = p.reserve(BLACK, &usage, None);
        assert_eq!(out.get(255), Some(BLACK));
        assert_eq!(out.get(254), p.get(254));
    }
}
