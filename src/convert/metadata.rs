//! Capture metadata extraction
//!
//! HEIF files store Exif as a separate item in the `meta` box rather than in a
//! marker segment. Both container kinds are read through kamadak-exif and the
//! block is returned verbatim; nothing here rewrites it.

use crate::core::error::ConversionError;
use std::io::Cursor;

/// `ftyp` brands that identify a HEIF still image container
pub const HEIF_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"heim", b"heis", b"hevc", b"hevx", b"mif1", b"msf1",
];

/// Check whether `bytes` starts with an `ftyp` box carrying a HEIF brand
///
/// Both the major brand and the compatible brands are checked, since some
/// encoders write `mif1` as major brand and `heic` only as compatible.
pub fn is_heif_signature(bytes: &[u8]) -> bool {
    if bytes.len() < 12 || &bytes[4..8] != b"ftyp" {
        return false;
    }

    let declared = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let end = declared.clamp(12, bytes.len());

    let major = &bytes[8..12];
    if HEIF_BRANDS.iter().any(|b| &b[..] == major) {
        return true;
    }

    // Compatible brands start after the 4-byte minor version
    bytes
        .get(16..end)
        .map(|compat| {
            compat
                .chunks_exact(4)
                .any(|brand| HEIF_BRANDS.iter().any(|b| &b[..] == brand))
        })
        .unwrap_or(false)
}

/// Raw Exif block: the TIFF header and IFDs, without any container prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExifBlock(Vec<u8>);

impl ExifBlock {
    /// Wrap TIFF bytes, checking the byte-order header
    pub fn from_tiff(bytes: Vec<u8>) -> Result<Self, ConversionError> {
        if bytes.len() < 8 || !(bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*")) {
            return Err(ConversionError::decode("Exif item does not start with a TIFF header"));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// Extract the Exif block from a HEIF container
///
/// kamadak-exif resolves the `Exif` item through `iinf`/`iloc` (file data or
/// `idat`) and strips the item's TIFF header offset; `buf()` is the TIFF
/// block exactly as stored. Returns `Ok(None)` when the container has no Exif
/// item. Any other read error is a `DecodeFailure`.
pub fn extract_heif_exif(container: &[u8]) -> Result<Option<ExifBlock>, ConversionError> {
    if !is_heif_signature(container) {
        return Err(ConversionError::decode("not a HEIF container (missing ftyp brand)"));
    }

    match exif::Reader::new().read_from_container(&mut Cursor::new(container)) {
        Ok(exif) => ExifBlock::from_tiff(exif.buf().to_vec()).map(Some),
        Err(exif::Error::NotFound(_)) => Ok(None),
        Err(e) => Err(ConversionError::decode(format!("unreadable Exif item: {}", e))),
    }
}

/// Read the raw Exif block from a JPEG's APP1 segment
pub fn read_jpeg_exif(jpeg: &[u8]) -> Option<ExifBlock> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(jpeg))
        .ok()?;
    Some(ExifBlock(exif.buf().to_vec()))
}

// ============================================================================
// Parsed view
// ============================================================================

/// The fields of an Exif block that matter for a photo library
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureMetadata {
    pub orientation: Option<u32>,
    /// `DateTimeOriginal`, falling back to `DateTime`
    pub timestamp: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    /// Signed decimal degrees
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
}

impl CaptureMetadata {
    /// Parse a raw Exif block
    pub fn parse(block: &ExifBlock) -> Result<Self, exif::Error> {
        let exif = exif::Reader::new().read_raw(block.as_bytes().to_vec())?;

        let text = |tag: exif::Tag| -> Option<String> {
            let field = exif.get_field(tag, exif::In::PRIMARY)?;
            match &field.value {
                exif::Value::Ascii(parts) => parts
                    .first()
                    .map(|p| String::from_utf8_lossy(p).trim_end_matches('\0').trim().to_string()),
                _ => None,
            }
        };

        Ok(Self {
            orientation: exif
                .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                .and_then(|f| f.value.get_uint(0)),
            timestamp: text(exif::Tag::DateTimeOriginal).or_else(|| text(exif::Tag::DateTime)),
            make: text(exif::Tag::Make),
            model: text(exif::Tag::Model),
            gps_latitude: gps_coordinate(&exif, exif::Tag::GPSLatitude, exif::Tag::GPSLatitudeRef),
            gps_longitude: gps_coordinate(&exif, exif::Tag::GPSLongitude, exif::Tag::GPSLongitudeRef),
        })
    }
}

fn gps_coordinate(exif: &exif::Exif, value_tag: exif::Tag, ref_tag: exif::Tag) -> Option<f64> {
    let field = exif.get_field(value_tag, exif::In::PRIMARY)?;
    let exif::Value::Rational(parts) = &field.value else {
        return None;
    };
    if parts.len() < 3 {
        return None;
    }

    let degrees = parts[0].to_f64() + parts[1].to_f64() / 60.0 + parts[2].to_f64() / 3600.0;

    let negative = exif
        .get_field(ref_tag, exif::In::PRIMARY)
        .map(|f| match &f.value {
            exif::Value::Ascii(parts) => parts
                .first()
                .map(|p| p.starts_with(b"S") || p.starts_with(b"W"))
                .unwrap_or(false),
            _ => false,
        })
        .unwrap_or(false);

    Some(if negative { -degrees } else { degrees })
}
