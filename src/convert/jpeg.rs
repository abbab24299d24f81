//! JPEG encoding and Exif embedding

use crate::convert::decoder::Raster;
use crate::convert::metadata::ExifBlock;
use crate::core::error::ConversionError;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

/// Fixed output quality
pub const JPEG_QUALITY: u8 = 95;

const EXIF_HEADER: &[u8; 6] = b"Exif\0\0";

/// Largest TIFF block one APP1 segment can carry
///
/// The segment length field is 16 bits and counts itself and the Exif header.
pub const MAX_EXIF_LEN: usize = u16::MAX as usize - 2 - EXIF_HEADER.len();

/// Encode an RGB raster as baseline JPEG
pub fn encode_jpeg(raster: &Raster) -> Result<Vec<u8>, ConversionError> {
    raster.validate()?;

    let mut out = Vec::with_capacity(raster.pixels.len() / 4);
    let mut encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    encoder
        .encode(&raster.pixels, raster.width, raster.height, ExtendedColorType::Rgb8)
        .map_err(|e| ConversionError::encode(format!("JPEG encoding failed: {}", e)))?;

    Ok(out)
}

/// Insert `exif` as an APP1 segment after SOI and any APP0 (JFIF) segment
pub fn insert_exif(jpeg: &[u8], exif: &ExifBlock) -> Result<Vec<u8>, ConversionError> {
    if exif.len() > MAX_EXIF_LEN {
        return Err(ConversionError::metadata_overflow(format!(
            "Exif block is {} bytes, a single APP1 segment holds at most {}",
            exif.len(),
            MAX_EXIF_LEN
        )));
    }

    if jpeg.len() < 4 || jpeg[0] != 0xFF || jpeg[1] != 0xD8 {
        return Err(ConversionError::encode("encoder output is not a JPEG stream"));
    }

    let mut insert_at = 2;
    if jpeg[2] == 0xFF && jpeg[3] == 0xE0 {
        let app0_len = jpeg
            .get(4..6)
            .map(|b| u16::from_be_bytes([b[0], b[1]]) as usize)
            .ok_or_else(|| ConversionError::encode("truncated APP0 segment"))?;
        insert_at = 4 + app0_len;
        if insert_at > jpeg.len() {
            return Err(ConversionError::encode("APP0 segment overruns the stream"));
        }
    }

    let segment_len = (2 + EXIF_HEADER.len() + exif.len()) as u16;

    let mut out = Vec::with_capacity(jpeg.len() + segment_len as usize + 2);
    out.extend_from_slice(&jpeg[..insert_at]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(EXIF_HEADER);
    out.extend_from_slice(exif.as_bytes());
    out.extend_from_slice(&jpeg[insert_at..]);

    Ok(out)
}
