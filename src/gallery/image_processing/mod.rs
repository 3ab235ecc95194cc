// Image processing - orientation, resizing and encoding of thumbnail renditions
pub mod formats;
mod orientation;
mod resize;
mod types;

pub use orientation::{apply_orientation, read_orientation, swaps_dimensions};
pub use resize::{EncodeSettings, RenditionSpec, decode_oriented, derive_renditions, probe_dimensions};
pub use types::{ImageSize, OutputFormat};

// All functions here block; callers run them through spawn_blocking.
