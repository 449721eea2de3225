//! GIF support via in-memory PNG conversion.
//!
//! PDF has no native GIF filter. The GIF is decoded to a raster,
//! re-encoded as a non-interlaced PNG in memory, and handed to the PNG
//! chunk parser.

use super::ImageInfo;
use crate::error::{Error, Result};
use std::io::Cursor;

pub(crate) fn parse(data: &[u8]) -> Result<ImageInfo> {
    let img = image::load_from_memory_with_format(data, image::ImageFormat::Gif)
        .map_err(|e| Error::Format(format!("GIF decode failed: {}", e)))?;

    let mut png = Cursor::new(Vec::new());
    img.write_to(&mut png, image::ImageOutputFormat::Png)
        .map_err(|e| Error::Format(format!("PNG re-encode failed: {}", e)))?;

    log::debug!("GIF converted to {}-byte in-memory PNG", png.get_ref().len());
    super::png::parse(&png.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_gif() {
        assert!(matches!(parse(b"\x89PNG\r\n\x1a\n"), Err(Error::Format(_))));
    }
}
