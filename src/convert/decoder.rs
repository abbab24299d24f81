//! Raster decoding
//!
//! Decoding the HEVC payload of a HEIF container is delegated to libheif
//! behind the `heif` feature. The converter only sees the `RasterDecoder`
//! trait, so tests and builds without libheif use other implementations.

use crate::core::error::ConversionError;
use std::sync::Arc;

/// Decoded 8-bit RGB image, rows packed without padding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Raster {
    /// Bytes per pixel
    pub const CHANNELS: usize = 3;

    /// Check that the pixel buffer matches the dimensions
    pub fn validate(&self) -> Result<(), ConversionError> {
        let expected = self.width as usize * self.height as usize * Self::CHANNELS;
        if self.width == 0 || self.height == 0 {
            return Err(ConversionError::decode("decoded image has zero size"));
        }
        if self.pixels.len() != expected {
            return Err(ConversionError::decode(format!(
                "decoded buffer holds {} bytes, expected {} for {}x{}",
                self.pixels.len(),
                expected,
                self.width,
                self.height
            )));
        }
        Ok(())
    }
}

/// Decodes the primary image of a HEIF container
pub trait RasterDecoder: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Decode the primary image without applying container transforms
    ///
    /// Rotation and mirroring stay as described by the Exif `Orientation`
    /// tag, which is carried over unchanged.
    fn decode(&self, container: &[u8]) -> Result<Raster, ConversionError>;
}

/// Decoder backed by libheif
#[cfg(feature = "heif")]
pub struct LibHeifDecoder;

#[cfg(feature = "heif")]
impl RasterDecoder for LibHeifDecoder {
    fn name(&self) -> &'static str {
        "libheif"
    }

    fn decode(&self, container: &[u8]) -> Result<Raster, ConversionError> {
        use libheif_rs::{ColorSpace, DecodingOptions, HeifContext, LibHeif, RgbChroma};

        let lib_heif = LibHeif::new();
        let ctx = HeifContext::read_from_bytes(container)
            .map_err(|e| ConversionError::decode(format!("unreadable HEIF container: {}", e)))?;
        let handle = ctx
            .primary_image_handle()
            .map_err(|e| ConversionError::decode(format!("no primary image: {}", e)))?;

        let mut options = DecodingOptions::new()
            .ok_or_else(|| ConversionError::decode("libheif could not allocate decoding options"))?;
        options.set_ignore_transformations(true);

        let image = lib_heif
            .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), Some(options))
            .map_err(|e| ConversionError::decode(format!("HEVC decode failed: {}", e)))?;

        let planes = image.planes();
        let plane = planes
            .interleaved
            .ok_or_else(|| ConversionError::decode("decoded image has no interleaved RGB plane"))?;

        if plane.bits_per_pixel != 8 {
            return Err(ConversionError::decode(format!(
                "unsupported bit depth {}",
                plane.bits_per_pixel
            )));
        }

        let width = plane.width;
        let height = plane.height;
        let row_len = width as usize * Raster::CHANNELS;

        let mut pixels = Vec::with_capacity(row_len * height as usize);
        for row in plane.data.chunks(plane.stride).take(height as usize) {
            let row = row
                .get(..row_len)
                .ok_or_else(|| ConversionError::decode("decoded row shorter than image width"))?;
            pixels.extend_from_slice(row);
        }

        let raster = Raster {
            width,
            height,
            pixels,
        };
        raster.validate()?;
        Ok(raster)
    }
}

/// Stand-in used when the crate is built without HEIF support
pub struct UnavailableDecoder;

impl RasterDecoder for UnavailableDecoder {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn decode(&self, _container: &[u8]) -> Result<Raster, ConversionError> {
        Err(ConversionError::decode(
            "built without HEIF support (rebuild with the default `heif` feature)",
        ))
    }
}

/// The best decoder this build provides
pub fn default_decoder() -> Arc<dyn RasterDecoder> {
    #[cfg(feature = "heif")]
    {
        Arc::new(LibHeifDecoder)
    }
    #[cfg(not(feature = "heif"))]
    {
        Arc::new(UnavailableDecoder)
    }
}

/// Whether this build can decode HEIC
pub fn heif_supported() -> bool {
    cfg!(feature = "heif")
}
