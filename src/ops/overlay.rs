use std::path::Path;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::canvas::{AnimatedImage, Frame};
use crate::config::{OverlayConfig, TimestampMode};
use crate::error::{GifStampError, Result};
use crate::io::{load_animation, save_animation};
use crate::ops::quantize::quantize;
use crate::ops::text::{FontResource, GlyphRenderer, TextRenderer};
use crate::ops::timestamp::{Clock, SystemClock, timestamp_text};

/// Summary of one [`stamp_file`] run.
#[derive(Clone, Copy, Debug)]
pub struct RenderStats {
    pub frames: usize,
    pub elapsed: Duration,
}

// ============================================================================
// PER-FRAME PIPELINE
// ============================================================================

/// Stamp the current time onto every frame of `background`.
///
/// Each output frame is a new allocation: composite → draw text at the frame
/// centre → re-quantize against the frame's palette extended with the text
/// colour. Timing, loop count and per-frame delay overrides carry over
/// unchanged. Nothing is returned unless every frame succeeds.
pub fn render_timestamped_animation<R, C>(
    background: &AnimatedImage,
    renderer: &R,
    clock: &C,
    config: &OverlayConfig,
) -> Result<AnimatedImage>
where
    R: TextRenderer + Sync + ?Sized,
    C: Clock + Sync + ?Sized,
{
    config.validate()?;
    if background.frames.is_empty() {
        return Err(GifStampError::Format("animation has no frames".to_string()));
    }

    let shared = match config.timestamp_mode {
        TimestampMode::Shared => Some(timestamp_text(clock, &config.timestamp_pattern)),
        TimestampMode::PerFrame => None,
    };

    let render = |(index, frame): (usize, &Frame)| {
        let text = match &shared {
            Some(t) => t.clone(),
            None => timestamp_text(clock, &config.timestamp_pattern),
        };
        stamp_frame(index, frame, renderer, &text, config)
    };

    // Each slot is written by exactly one task; collect keeps input order.
    let frames: Vec<Frame> = if config.parallel {
        background.frames.par_iter().enumerate().map(render).collect()
    } else {
        background.frames.iter().enumerate().map(render).collect()
    };

    Ok(AnimatedImage {
        width: background.width,
        height: background.height,
        frames,
        delay: background.delay,
        repeat: background.repeat,
    })
}

/// Render `text` onto one frame and return its replacement.
pub fn stamp_frame<R>(
    index: usize,
    frame: &Frame,
    renderer: &R,
    text: &str,
    config: &OverlayConfig,
) -> Frame
where
    R: TextRenderer + ?Sized,
{
    let mut canvas = frame.composite();
    let centre = (frame.width as f32 / 2.0, frame.height as f32 / 2.0);
    let metrics = renderer.measure(text);
    if metrics.width > frame.width as f32 || metrics.height > frame.height as f32 {
        log_warn!(
            "frame {}: {:.0}x{:.0}px text is clipped by the {}x{} frame",
            index,
            metrics.width,
            metrics.height,
            frame.width,
            frame.height
        );
    }
    renderer.draw_anchored_text(&mut canvas, text, centre, config.alignment(), config.text_color);

    let base = frame
        .palette
        .reserve(config.text_color, &frame.usage(), frame.transparent);
    let stamped = quantize(&canvas, &base, frame);
    log_info!(
        "frame {}: \"{}\" ({:.0}px wide) palette {} -> {}",
        index,
        text,
        metrics.width,
        frame.palette.len(),
        stamped.palette.len()
    );
    stamped
}

// ============================================================================
// FILE-LEVEL ENTRY POINT
// ============================================================================

/// Read `background`, stamp every frame with the wall-clock time and write
/// the result to `output`. The output file only appears once the whole
/// animation has been encoded.
pub fn stamp_file(
    background: &Path,
    output: &Path,
    font: &FontResource,
    config: &OverlayConfig,
) -> Result<RenderStats> {
    let start = Instant::now();

    // -- Step 1: Load ----------------------------------------------------
    let anim = load_animation(background)?;

    // -- Step 2: Font at the configured size (checked once, not per frame)
    let renderer = GlyphRenderer::new(font, config.font_size)?;

    // -- Step 3: Render --------------------------------------------------
    let stamped = render_timestamped_animation(&anim, &renderer, &SystemClock, config)?;

    // -- Step 4: Save ----------------------------------------------------
    save_animation(output, &stamped)?;

    let stats = RenderStats {
        frames: stamped.frame_count(),
        elapsed: start.elapsed(),
    };
    log_info!(
        "stamped {} -> {} ({} frames, {:.0}ms)",
        background.display(),
        output.display(),
        stats.frames,
        stats.elapsed.as_secs_f64() * 1000.0
    );
    Ok(stats)
}
