//! Raster-image ingestion.
//!
//! Turns raw JPEG/PNG/GIF bytes into an [`ImageInfo`] descriptor holding
//! everything the writer needs to emit the image XObject: dimensions,
//! color space, bits per component, compression filter, decode
//! parameters, the (already compressed) sample data, and the optional
//! palette, transparency key or soft mask.
//!
//! Format dispatch is a closed enum: JPEG is embedded as-is with the DCT
//! filter, PNG is parsed at the chunk level so its zlib scanline data
//! passes through undecoded, and GIF is decoded and re-encoded as an
//! in-memory PNG first.

mod gif;
mod jpeg;
mod png;

use crate::error::Result;

/// Supported raster image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// JPEG/JFIF, embedded with pass-through DCTDecode
    Jpeg,
    /// PNG, embedded with FlateDecode and PNG predictors
    Png,
    /// GIF, converted to PNG in memory
    Gif,
}

impl ImageKind {
    /// Infer the format from a (case-insensitive) file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            "gif" => Some(ImageKind::Gif),
            _ => None,
        }
    }
}

/// Color space of embedded image samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColorSpace {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
    /// Palette-indexed; the palette itself is stored in DeviceRGB
    Indexed,
}

impl ColorSpace {
    pub(crate) fn pdf_name(self) -> &'static str {
        match self {
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceRgb => "DeviceRGB",
            ColorSpace::DeviceCmyk => "DeviceCMYK",
            ColorSpace::Indexed => "Indexed",
        }
    }
}

/// Normalized raster descriptor produced by the format parsers.
#[derive(Debug)]
pub(crate) struct ImageInfo {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) color_space: ColorSpace,
    pub(crate) bits_per_component: u8,
    /// Compression filter of `data` (`DCTDecode` or `FlateDecode`)
    pub(crate) filter: Option<&'static str>,
    /// Body of the /DecodeParms dictionary, when the filter needs one
    pub(crate) decode_parms: Option<String>,
    /// Compressed sample data, embedded verbatim
    pub(crate) data: Vec<u8>,
    /// RGB palette bytes for indexed images
    pub(crate) palette: Vec<u8>,
    /// Color-key transparency values
    pub(crate) transparency: Option<Vec<u8>>,
    /// Flate-compressed grayscale alpha samples, serialized as a
    /// soft-mask image
    pub(crate) soft_mask: Option<Vec<u8>>,
    /// 1-based resource index, giving the /I<i> name
    pub(crate) index: usize,
    /// XObject number (set during serialization)
    pub(crate) obj: u32,
}

/// Decode raw image bytes according to the declared format.
pub(crate) fn decode(data: &[u8], kind: ImageKind) -> Result<ImageInfo> {
    match kind {
        ImageKind::Jpeg => jpeg::parse(data),
        ImageKind::Png => png::parse(data),
        ImageKind::Gif => gif::parse(data),
    }
}
