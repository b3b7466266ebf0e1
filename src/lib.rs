//! Stamp the current time onto every frame of an animated GIF.
//!
//! The pipeline decodes the GIF as indexed frames ([`io::decode_gif`]),
//! draws a timestamp onto a full-colour copy of each frame
//! ([`ops::text`]), maps the result back onto the frame's palette
//! ([`ops::quantize`]) and re-encodes with the original timing
//! ([`io::encode_gif`]). [`ops::overlay`] ties the steps together.

#[macro_use]
pub mod logger;
pub mod canvas;
pub mod config;
pub mod error;
pub mod io;
pub mod ops;

pub use canvas::{AnimatedImage, Frame, Palette, Surface};
pub use config::{OverlayConfig, TimestampMode};
pub use error::{GifStampError, Result};
pub use ops::overlay::{RenderStats, render_timestamped_animation, stamp_file};
pub use ops::text::{FontResource, GlyphRenderer, TextRenderer};
pub use ops::timestamp::{Clock, FixedClock, SystemClock};
