//! HEIC → JPEG format converter

use crate::convert::decoder::{default_decoder, RasterDecoder};
use crate::convert::jpeg::{encode_jpeg, insert_exif};
use crate::convert::metadata::{extract_heif_exif, is_heif_signature, ExifBlock};
use crate::core::error::ConversionError;
use log::{debug, trace};
use std::sync::Arc;

/// Result of a successful conversion
#[derive(Debug, Clone)]
pub struct Converted {
    /// Complete JPEG stream
    pub jpeg: Vec<u8>,
    /// Exif block carried over from the source, if it had one
    pub metadata: Option<ExifBlock>,
}

/// Converts HEIC buffers to JPEG buffers
///
/// Pure with respect to the filesystem: it takes bytes and returns bytes, and
/// leaves writing to the caller. Cheap to clone and safe to share between
/// worker threads.
#[derive(Clone)]
pub struct Converter {
    decoder: Arc<dyn RasterDecoder>,
}

impl Converter {
    pub fn new(decoder: Arc<dyn RasterDecoder>) -> Self {
        Self { decoder }
    }

    pub fn decoder_name(&self) -> &'static str {
        self.decoder.name()
    }

    /// Convert one HEIC container
    ///
    /// On success the output's Exif block is byte-for-byte the input's.
    pub fn convert(&self, source: &[u8]) -> Result<Converted, ConversionError> {
        if !is_heif_signature(source) {
            return Err(ConversionError::decode(
                "file content is not a HEIF container",
            ));
        }

        let metadata = extract_heif_exif(source)?;
        match &metadata {
            Some(block) => trace!("Exif block of {} bytes", block.len()),
            None => debug!("HEIC has no Exif item, converting without metadata"),
        }

        let raster = self.decoder.decode(source)?;
        trace!("Decoded {}x{} raster with {}", raster.width, raster.height, self.decoder.name());

        let encoded = encode_jpeg(&raster)?;
        let jpeg = match &metadata {
            Some(block) => insert_exif(&encoded, block)?,
            None => encoded,
        };

        Ok(Converted { jpeg, metadata })
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(default_decoder())
    }
}
