//! Chunk-level PNG parsing.
//!
//! The PNG scanline data is already a zlib stream with PNG row filters
//! applied, which PDF can consume directly via FlateDecode plus a
//! `/Predictor 15` decode-parms entry. So instead of decoding pixels,
//! this parser validates the header, collects the raw IDAT bytes and the
//! palette/transparency side chunks, and only inflates when an alpha
//! channel has to be split out into a soft mask.

use super::{ColorSpace, ImageInfo};
use crate::error::{Error, Result};
use crate::writer::{compress, decompress};
use byteorder::{BigEndian, ByteOrder};

const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Forward-only reader over the raw PNG bytes.
struct SliceReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| Error::Format("unexpected end of PNG stream".to_string()))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }
}

pub(crate) fn parse(data: &[u8]) -> Result<ImageInfo> {
    let mut r = SliceReader::new(data);
    if r.take(8)? != &SIGNATURE[..] {
        return Err(Error::Format("not a PNG stream".to_string()));
    }

    // IHDR must come first
    r.take(4)?;
    if r.take(4)? != b"IHDR" {
        return Err(Error::Format("malformed PNG: missing IHDR".to_string()));
    }
    let width = r.read_u32()?;
    let height = r.read_u32()?;
    let bpc = r.take(1)?[0];
    if bpc > 8 {
        return Err(Error::Format("16-bit depth not supported".to_string()));
    }
    let color_type = r.take(1)?[0];
    let color_space = match color_type {
        0 | 4 => ColorSpace::DeviceGray,
        2 | 6 => ColorSpace::DeviceRgb,
        3 => ColorSpace::Indexed,
        ct => return Err(Error::Format(format!("unknown PNG color type: {}", ct))),
    };
    if r.take(1)?[0] != 0 {
        return Err(Error::Format("unknown PNG compression method".to_string()));
    }
    if r.take(1)?[0] != 0 {
        return Err(Error::Format("unknown PNG filter method".to_string()));
    }
    if r.take(1)?[0] != 0 {
        return Err(Error::Format("interlacing not supported".to_string()));
    }
    r.take(4)?; // IHDR CRC

    let colors = if color_space == ColorSpace::DeviceRgb { 3 } else { 1 };
    let decode_parms = format!(
        "/Predictor 15 /Colors {} /BitsPerComponent {} /Columns {}",
        colors, bpc, width
    );

    // Scan the remaining chunks for palette, transparency and image data
    let mut palette = Vec::new();
    let mut transparency = None;
    let mut idat = Vec::new();
    loop {
        let n = r.read_u32()? as usize;
        let chunk_type: [u8; 4] = r.take(4)?.try_into().unwrap_or([0; 4]);
        match &chunk_type {
            b"PLTE" => {
                palette = r.take(n)?.to_vec();
                r.take(4)?;
            },
            b"tRNS" => {
                let t = r.take(n)?;
                transparency = read_transparency(t, color_type)?;
                r.take(4)?;
            },
            b"IDAT" => {
                idat.extend_from_slice(r.take(n)?);
                r.take(4)?;
            },
            b"IEND" => break,
            _ => {
                r.take(n + 4)?;
            },
        }
    }

    if color_space == ColorSpace::Indexed && palette.is_empty() {
        return Err(Error::Format("missing palette in indexed PNG".to_string()));
    }

    log::debug!(
        "PNG {}x{}, color type {}, {} bits, {} IDAT bytes",
        width,
        height,
        color_type,
        bpc,
        idat.len()
    );

    let mut info = ImageInfo {
        width,
        height,
        color_space,
        bits_per_component: bpc,
        filter: Some("FlateDecode"),
        decode_parms: Some(decode_parms),
        data: idat,
        palette,
        transparency,
        soft_mask: None,
        index: 0,
        obj: 0,
    };

    if color_type >= 4 {
        split_alpha(&mut info, color_type)?;
    }

    Ok(info)
}

/// Interpret a tRNS chunk per color type: a single gray key, an RGB key
/// triple, or the first fully transparent palette index.
fn read_transparency(t: &[u8], color_type: u8) -> Result<Option<Vec<u8>>> {
    let short = || Error::Format("malformed tRNS chunk".to_string());
    match color_type {
        0 => Ok(Some(vec![*t.get(1).ok_or_else(short)?])),
        2 => Ok(Some(vec![
            *t.get(1).ok_or_else(short)?,
            *t.get(3).ok_or_else(short)?,
            *t.get(5).ok_or_else(short)?,
        ])),
        _ => Ok(t.iter().position(|&b| b == 0).map(|pos| vec![pos as u8])),
    }
}

/// De-interleave the alpha channel of a color type 4/6 PNG.
///
/// The inflated scanlines are split into a color stream and an alpha
/// stream; the per-row filter byte is kept in both so the predictor
/// declared in /DecodeParms can be reversed on either stream. Both
/// streams are re-deflated independently.
fn split_alpha(info: &mut ImageInfo, color_type: u8) -> Result<()> {
    let data = decompress(&info.data)?;
    let channels: usize = if color_type == 4 { 2 } else { 4 };
    let width = info.width as usize;
    let height = info.height as usize;
    let line_len = channels * width;
    if data.len() < (1 + line_len) * height {
        return Err(Error::Format("truncated PNG image data".to_string()));
    }

    let mut color = Vec::with_capacity((1 + (channels - 1) * width) * height);
    let mut alpha = Vec::with_capacity((1 + width) * height);
    for row in 0..height {
        let pos = (1 + line_len) * row;
        color.push(data[pos]);
        alpha.push(data[pos]);
        for px in data[pos + 1..pos + 1 + line_len].chunks_exact(channels) {
            color.extend_from_slice(&px[..channels - 1]);
            alpha.push(px[channels - 1]);
        }
    }

    info.data = compress(&color)?;
    info.soft_mask = Some(compress(&alpha)?);
    Ok(())
}
