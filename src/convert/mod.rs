//! Format conversion module
//!
//! Converts HEIC images to JPEG while keeping the capture metadata intact.
//!
//! # Submodules
//!
//! - `metadata` - HEIF box walking, Exif block extraction, parsed capture fields
//! - `decoder` - `RasterDecoder` trait and the libheif implementation
//! - `jpeg` - JPEG encoding at fixed quality and APP1 Exif insertion
//! - `converter` - The `Converter` tying the steps together

pub mod converter;
pub mod decoder;
pub mod jpeg;
pub mod metadata;

pub use converter::{Converted, Converter};
pub use decoder::{default_decoder, heif_supported, Raster, RasterDecoder, UnavailableDecoder};
#[cfg(feature = "heif")]
pub use decoder::LibHeifDecoder;
pub use metadata::{is_heif_signature, read_jpeg_exif, CaptureMetadata, ExifBlock};
