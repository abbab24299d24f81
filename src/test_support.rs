//! Fixtures shared by the unit tests
//!
//! Builds synthetic HEIF containers and TIFF Exif blocks byte by byte, and
//! provides fake probe strategies and a fake raster decoder so the pipeline can
//! be tested without libheif or a device attached.

use crate::convert::decoder::{Raster, RasterDecoder};
use crate::convert::metadata::is_heif_signature;
use crate::core::error::ConversionError;
use crate::device::traits::{ProbeResult, ProbeStrategy};
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

// ============================================================================
// ISO-BMFF
// ============================================================================

fn bmff_box(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 8);
    out.extend_from_slice(&((payload.len() + 8) as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(payload);
    out
}

fn full_box(kind: &[u8; 4], version: u8, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![version, 0, 0, 0];
    body.extend_from_slice(payload);
    bmff_box(kind, &body)
}

fn infe(item_id: u16, item_type: &[u8; 4]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&item_id.to_be_bytes());
    body.extend_from_slice(&0u16.to_be_bytes());
    body.extend_from_slice(item_type);
    body.push(0);
    full_box(b"infe", 2, &body)
}

/// Shape of a synthetic HEIF file
pub struct HeifFixture {
    pub major_brand: [u8; 4],
    /// TIFF bytes of the Exif item, if any
    pub exif: Option<Vec<u8>>,
    /// Bytes placed between the offset field and the TIFF header
    pub exif_prefix: Vec<u8>,
    /// Store the Exif item in `idat` instead of `mdat`
    pub exif_in_idat: bool,
}

impl Default for HeifFixture {
    fn default() -> Self {
        Self {
            major_brand: *b"heic",
            exif: None,
            exif_prefix: Vec::new(),
            exif_in_idat: false,
        }
    }
}

const FAKE_HEVC: &[u8] = b"fake hevc primary image payload";

/// Build a HEIF container with an `hvc1` primary item and optional Exif item
pub fn heif_container(fixture: &HeifFixture) -> Vec<u8> {
    let mut ftyp = Vec::new();
    ftyp.extend_from_slice(&fixture.major_brand);
    ftyp.extend_from_slice(&0u32.to_be_bytes());
    ftyp.extend_from_slice(b"mif1heic");
    let ftyp = bmff_box(b"ftyp", &ftyp);

    let exif_payload = fixture.exif.as_ref().map(|tiff| {
        let mut payload = (fixture.exif_prefix.len() as u32).to_be_bytes().to_vec();
        payload.extend_from_slice(&fixture.exif_prefix);
        payload.extend_from_slice(tiff);
        payload
    });

    // Sizes are fixed, so build once to learn the meta length, then again
    // with real offsets.
    let meta_len = build_meta(fixture, exif_payload.as_deref(), 0).len();
    let mdat_start = (ftyp.len() + meta_len + 8) as u32;
    let meta = build_meta(fixture, exif_payload.as_deref(), mdat_start);

    let mut mdat = FAKE_HEVC.to_vec();
    if !fixture.exif_in_idat {
        if let Some(payload) = &exif_payload {
            mdat.extend_from_slice(payload);
        }
    }

    let mut out = ftyp;
    out.extend_from_slice(&meta);
    out.extend_from_slice(&bmff_box(b"mdat", &mdat));
    out
}

fn build_meta(fixture: &HeifFixture, exif_payload: Option<&[u8]>, mdat_start: u32) -> Vec<u8> {
    let mut hdlr = vec![0u8; 4];
    hdlr.extend_from_slice(b"pict");
    hdlr.extend_from_slice(&[0u8; 12]);
    hdlr.push(0);

    let pitm = 1u16.to_be_bytes();

    let mut iinf = Vec::new();
    let entries: u16 = if exif_payload.is_some() { 2 } else { 1 };
    iinf.extend_from_slice(&entries.to_be_bytes());
    iinf.extend_from_slice(&infe(1, b"hvc1"));
    if exif_payload.is_some() {
        iinf.extend_from_slice(&infe(2, b"Exif"));
    }

    // Version 1 so an item can point into idat
    let mut iloc = vec![0x44, 0x00];
    iloc.extend_from_slice(&entries.to_be_bytes());
    let mut push_item = |id: u16, method: u16, offset: u32, len: u32| {
        iloc.extend_from_slice(&id.to_be_bytes());
        iloc.extend_from_slice(&method.to_be_bytes());
        iloc.extend_from_slice(&0u16.to_be_bytes());
        iloc.extend_from_slice(&1u16.to_be_bytes());
        iloc.extend_from_slice(&offset.to_be_bytes());
        iloc.extend_from_slice(&len.to_be_bytes());
    };
    push_item(1, 0, mdat_start, FAKE_HEVC.len() as u32);
    if let Some(payload) = exif_payload {
        if fixture.exif_in_idat {
            push_item(2, 1, 0, payload.len() as u32);
        } else {
            push_item(2, 0, mdat_start + FAKE_HEVC.len() as u32, payload.len() as u32);
        }
    }

    let mut children = full_box(b"hdlr", 0, &hdlr);
    children.extend_from_slice(&full_box(b"pitm", 0, &pitm));
    children.extend_from_slice(&full_box(b"iinf", 0, &iinf));
    children.extend_from_slice(&full_box(b"iloc", 1, &iloc));
    if fixture.exif_in_idat {
        if let Some(payload) = exif_payload {
            children.extend_from_slice(&bmff_box(b"idat", payload));
        }
    }

    full_box(b"meta", 0, &children)
}

/// HEIC with the sample Exif block, the common case in pipeline tests
pub fn sample_heic() -> Vec<u8> {
    heif_container(&HeifFixture {
        exif: Some(sample_tiff()),
        ..Default::default()
    })
}

// ============================================================================
// TIFF / Exif
// ============================================================================

const ASCII: u16 = 2;
const SHORT: u16 = 3;
const LONG: u16 = 4;
const RATIONAL: u16 = 5;

struct TiffEntry {
    tag: u16,
    kind: u16,
    count: u32,
    data: Vec<u8>,
}

impl TiffEntry {
    fn ascii(tag: u16, text: &str) -> Self {
        let mut data = text.as_bytes().to_vec();
        data.push(0);
        Self {
            tag,
            kind: ASCII,
            count: data.len() as u32,
            data,
        }
    }

    fn short(tag: u16, value: u16) -> Self {
        Self {
            tag,
            kind: SHORT,
            count: 1,
            data: value.to_le_bytes().to_vec(),
        }
    }

    fn long(tag: u16, value: u32) -> Self {
        Self {
            tag,
            kind: LONG,
            count: 1,
            data: value.to_le_bytes().to_vec(),
        }
    }

    fn rationals(tag: u16, values: &[(u32, u32)]) -> Self {
        let mut data = Vec::new();
        for (num, den) in values {
            data.extend_from_slice(&num.to_le_bytes());
            data.extend_from_slice(&den.to_le_bytes());
        }
        Self {
            tag,
            kind: RATIONAL,
            count: values.len() as u32,
            data,
        }
    }
}

/// Append an IFD (entries sorted by tag) and its out-of-line values
fn write_ifd(out: &mut Vec<u8>, entries: &[TiffEntry]) -> u32 {
    let start = out.len();
    let data_start = start + 2 + entries.len() * 12 + 4;

    let mut ifd = Vec::new();
    let mut data = Vec::new();
    ifd.extend_from_slice(&(entries.len() as u16).to_le_bytes());

    for entry in entries {
        ifd.extend_from_slice(&entry.tag.to_le_bytes());
        ifd.extend_from_slice(&entry.kind.to_le_bytes());
        ifd.extend_from_slice(&entry.count.to_le_bytes());
        if entry.data.len() <= 4 {
            let mut inline = entry.data.clone();
            inline.resize(4, 0);
            ifd.extend_from_slice(&inline);
        } else {
            ifd.extend_from_slice(&((data_start + data.len()) as u32).to_le_bytes());
            data.extend_from_slice(&entry.data);
            if data.len() % 2 == 1 {
                data.push(0);
            }
        }
    }
    ifd.extend_from_slice(&0u32.to_le_bytes());

    out.extend_from_slice(&ifd);
    out.extend_from_slice(&data);
    start as u32
}

/// Little-endian TIFF block with orientation 6, a capture timestamp, make and
/// model, and GPS coordinates of roughly 37.7749 N, 122.4194 W
pub fn sample_tiff() -> Vec<u8> {
    let mut out = b"II*\0".to_vec();
    out.extend_from_slice(&0u32.to_le_bytes());

    let exif_ifd = write_ifd(&mut out, &[TiffEntry::ascii(0x9003, "2024:06:01 12:34:56")]);

    let gps_ifd = write_ifd(
        &mut out,
        &[
            TiffEntry::ascii(0x0001, "N"),
            TiffEntry::rationals(0x0002, &[(37, 1), (46, 1), (2964, 100)]),
            TiffEntry::ascii(0x0003, "W"),
            TiffEntry::rationals(0x0004, &[(122, 1), (25, 1), (984, 100)]),
        ],
    );

    let ifd0 = write_ifd(
        &mut out,
        &[
            TiffEntry::ascii(0x010f, "Apple"),
            TiffEntry::ascii(0x0110, "iPhone 15 Pro"),
            TiffEntry::short(0x0112, 6),
            TiffEntry::ascii(0x0132, "2024:06:01 12:34:56"),
            TiffEntry::long(0x8769, exif_ifd),
            TiffEntry::long(0x8825, gps_ifd),
        ],
    );

    out[4..8].copy_from_slice(&ifd0.to_le_bytes());
    out
}

// ============================================================================
// Fakes
// ============================================================================

/// Horizontal gradient, enough structure for the JPEG encoder
pub fn gradient_raster(width: u32, height: u32) -> Raster {
    let mut pixels = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.push((x * 255 / width.max(1)) as u8);
            pixels.push((y * 255 / height.max(1)) as u8);
            pixels.push(128);
        }
    }
    Raster {
        width,
        height,
        pixels,
    }
}

/// Decoder that accepts any HEIF-branded buffer and returns a fixed raster
pub struct FakeDecoder {
    width: u32,
    height: u32,
}

impl FakeDecoder {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Default for FakeDecoder {
    fn default() -> Self {
        Self {
            width: 24,
            height: 16,
        }
    }
}

impl RasterDecoder for FakeDecoder {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn decode(&self, container: &[u8]) -> Result<Raster, ConversionError> {
        if !is_heif_signature(container) {
            return Err(ConversionError::decode("fake decoder: not HEIF"));
        }
        Ok(gradient_raster(self.width, self.height))
    }
}

/// Probe strategy that always returns the same result
pub struct FakeProbe {
    name: String,
    result: ProbeResult,
}

impl FakeProbe {
    pub fn new(name: &str, result: ProbeResult) -> Self {
        Self {
            name: name.to_string(),
            result,
        }
    }
}

impl ProbeStrategy for FakeProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn attempt(&self) -> ProbeResult {
        self.result.clone()
    }
}

/// Probe strategy that blocks for a long time before failing
pub struct SlowProbe {
    name: String,
    delay: Duration,
}

impl SlowProbe {
    pub fn new(name: &str, delay: Duration) -> Self {
        Self {
            name: name.to_string(),
            delay,
        }
    }
}

impl ProbeStrategy for SlowProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn attempt(&self) -> ProbeResult {
        thread::sleep(self.delay);
        ProbeResult::failed("slow probe finished")
    }
}

// ============================================================================
// Filesystem
// ============================================================================

/// Create a device-like tree: `<tmp>/DCIM/<relative path>` for each file
pub fn device_tree(files: &[(&str, &[u8])]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (relative, contents) in files {
        write_file(&dir.path().join("DCIM").join(relative), contents);
    }
    fs::create_dir_all(dir.path().join("DCIM")).unwrap();
    dir
}

pub fn write_file(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

/// Visible file names directly inside `dir`, sorted
pub fn visible_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| !n.starts_with('.'))
        .collect();
    names.sort();
    names
}
