use std::borrow::Cow;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::canvas::{AnimatedImage, Frame, MAX_PALETTE_LEN, Palette};
use crate::error::{GifStampError, Result};

// ============================================================================
// GIF DECODING
// ============================================================================

/// Decode every frame of an animated GIF as indexed data.
///
/// Frames are kept exactly as stored (no disposal compositing): each one
/// owns its local colour table, or a copy of the global one. The default
/// delay is taken from the first frame and any frame with a different delay
/// records it as an override.
pub fn decode_gif(bytes: &[u8]) -> Result<AnimatedImage> {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::Indexed);
    let mut decoder = options.read_info(bytes)?;

    let width = decoder.width();
    let height = decoder.height();
    let global_palette: Option<Vec<u8>> = decoder.global_palette().map(|p| p.to_vec());

    let mut raw: Vec<(Frame, u16)> = Vec::new();
    while let Some(frame) = decoder.read_next_frame()? {
        let n = raw.len();
        if frame.left as u32 + frame.width as u32 > width as u32
            || frame.top as u32 + frame.height as u32 > height as u32
        {
            return Err(GifStampError::Format(format!(
                "frame {} ({}x{} at {},{}) exceeds the {}x{} screen",
                n, frame.width, frame.height, frame.left, frame.top, width, height
            )));
        }
        let expected = frame.width as usize * frame.height as usize;
        if frame.buffer.len() != expected {
            return Err(GifStampError::Format(format!(
                "frame {} has {} pixels, expected {}",
                n,
                frame.buffer.len(),
                expected
            )));
        }
        let table = match (&frame.palette, &global_palette) {
            (Some(local), _) => local.as_slice(),
            (None, Some(global)) => global.as_slice(),
            (None, None) => {
                return Err(GifStampError::Format(format!(
                    "frame {} has no colour table",
                    n
                )));
            }
        };
        let colours = table.len() / 3;
        if let Some(&bad) = frame.buffer.iter().find(|&&idx| idx as usize >= colours) {
            return Err(GifStampError::Format(format!(
                "frame {} uses colour {} of a {}-entry palette",
                n, bad, colours
            )));
        }

        raw.push((
            Frame {
                left: frame.left,
                top: frame.top,
                width: frame.width,
                height: frame.height,
                indices: frame.buffer.to_vec(),
                palette: Palette::from_rgb(table, frame.transparent),
                delay: None,
                dispose: frame.dispose,
                transparent: frame.transparent,
            },
            frame.delay,
        ));
    }

    let Some(&(_, delay)) = raw.first() else {
        return Err(GifStampError::Format("GIF contains no frames".to_string()));
    };

    let frames = raw
        .into_iter()
        .map(|(mut frame, frame_delay)| {
            if frame_delay != delay {
                frame.delay = Some(frame_delay);
            }
            frame
        })
        .collect();

    Ok(AnimatedImage {
        width,
        height,
        frames,
        delay,
        // Read after the last frame so a late NETSCAPE block is still seen.
        repeat: decoder.repeat(),
    })
}

// ============================================================================
// GIF ENCODING
// ============================================================================

/// Encode an animation as GIF89a bytes. No global colour table is written;
/// every frame carries its own local palette.
pub fn encode_gif(anim: &AnimatedImage) -> Result<Vec<u8>> {
    if anim.frames.is_empty() {
        return Err(GifStampError::Encode("no frames to encode".to_string()));
    }
    for (i, frame) in anim.frames.iter().enumerate() {
        validate_frame(i, frame, anim.width, anim.height)?;
    }

    let mut out = Vec::new();
    {
        let mut encoder = gif::Encoder::new(&mut out, anim.width, anim.height, &[])?;
        // Finite(0) means "no loop extension"; writing one would change playback.
        if anim.repeat != gif::Repeat::Finite(0) {
            encoder.set_repeat(anim.repeat)?;
        }

        for frame in &anim.frames {
            let gif_frame = gif::Frame {
                left: frame.left,
                top: frame.top,
                width: frame.width,
                height: frame.height,
                delay: frame.delay.unwrap_or(anim.delay),
                dispose: frame.dispose,
                transparent: frame.transparent,
                palette: Some(frame.palette.to_rgb()),
                buffer: Cow::Borrowed(&frame.indices),
                ..Default::default()
            };
            encoder.write_frame(&gif_frame)?;
        }
        // Dropping the encoder writes the trailer.
    }

    Ok(out)
}

fn validate_frame(i: usize, frame: &Frame, screen_w: u16, screen_h: u16) -> Result<()> {
    let palette_len = frame.palette.len();
    if palette_len == 0 || palette_len > MAX_PALETTE_LEN {
        return Err(GifStampError::Encode(format!(
            "frame {} palette has {} colours (allowed 1-{})",
            i, palette_len, MAX_PALETTE_LEN
        )));
    }
    if frame.indices.len() != frame.pixel_count() {
        return Err(GifStampError::Encode(format!(
            "frame {} has {} indices for a {}x{} frame",
            i,
            frame.indices.len(),
            frame.width,
            frame.height
        )));
    }
    if frame.left as u32 + frame.width as u32 > screen_w as u32
        || frame.top as u32 + frame.height as u32 > screen_h as u32
    {
        return Err(GifStampError::Encode(format!(
            "frame {} ({}x{} at {},{}) exceeds the {}x{} screen",
            i, frame.width, frame.height, frame.left, frame.top, screen_w, screen_h
        )));
    }
    if let Some(&bad) = frame.indices.iter().find(|&&idx| idx as usize >= palette_len) {
        return Err(GifStampError::Encode(format!(
            "frame {} references colour {} of a {}-entry palette",
            i, bad, palette_len
        )));
    }
    Ok(())
}

// ============================================================================
// FILE HANDLING
// ============================================================================

/// Read a whole source file into memory.
pub fn read_source(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| GifStampError::SourceRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `bytes` to `path` through a temp file in the same directory that is
/// renamed over the target. On failure the target is left untouched and the
/// temp file is removed when it drops.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let wrap = |source: std::io::Error| GifStampError::DestinationWrite {
        path: path.to_path_buf(),
        source,
    };

    let dir: PathBuf = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut tmp = NamedTempFile::new_in(&dir).map_err(wrap)?;
    tmp.write_all(bytes).map_err(wrap)?;
    tmp.as_file().sync_all().map_err(wrap)?;
    tmp.persist(path).map_err(|e| wrap(e.error))?;
    Ok(())
}

/// Read and decode a GIF file.
pub fn load_animation(path: &Path) -> Result<AnimatedImage> {
    let bytes = read_source(path)?;
    let anim = decode_gif(&bytes)?;
    log_info!(
        "decoded {} ({}x{}, {} frames, delay {}cs, {:?})",
        path.display(),
        anim.width,
        anim.height,
        anim.frame_count(),
        anim.delay,
        anim.repeat
    );
    Ok(anim)
}

/// Encode and atomically write a GIF file.
pub fn save_animation(path: &Path, anim: &AnimatedImage) -> Result<()> {
    let bytes = encode_gif(anim)?;
    write_atomic(path, &bytes)?;
    log_info!("wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
