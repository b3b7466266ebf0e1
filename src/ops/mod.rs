pub mod overlay;
pub mod quantize;
pub mod text;
pub mod timestamp;
