//! JPEG metadata inspection.
//!
//! JPEG streams are embedded without transcoding: only the SOF frame
//! header is read to learn dimensions, sample precision and channel
//! count; the raw file bytes become the XObject data with the DCTDecode
//! filter.

use super::{ColorSpace, ImageInfo};
use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder};

pub(crate) fn parse(data: &[u8]) -> Result<ImageInfo> {
    if data.len() < 2 || data[0] != 0xFF || data[1] != 0xD8 {
        return Err(Error::Format("not a JPEG stream".to_string()));
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = data[pos + 1];
        pos += 2;

        // Fill bytes and stuffed zero markers carry no segment
        if marker == 0xFF || marker == 0x00 {
            continue;
        }

        // SOF0-SOF15 except the DHT/JPG/DAC pseudo-markers
        if matches!(
            marker,
            0xC0 | 0xC1 | 0xC2 | 0xC3 | 0xC5 | 0xC6 | 0xC7 | 0xC9 | 0xCA | 0xCB | 0xCD | 0xCE
                | 0xCF
        ) {
            if pos + 8 > data.len() {
                return Err(Error::Format("truncated JPEG frame header".to_string()));
            }
            let precision = data[pos + 2];
            let height = BigEndian::read_u16(&data[pos + 3..pos + 5]) as u32;
            let width = BigEndian::read_u16(&data[pos + 5..pos + 7]) as u32;
            let channels = data[pos + 7];

            let color_space = match channels {
                3 => ColorSpace::DeviceRgb,
                4 => ColorSpace::DeviceCmyk,
                _ => ColorSpace::DeviceGray,
            };

            log::debug!(
                "JPEG {}x{}, {} channel(s), {} bits",
                width,
                height,
                channels,
                precision
            );

            return Ok(ImageInfo {
                width,
                height,
                color_space,
                bits_per_component: precision,
                filter: Some("DCTDecode"),
                decode_parms: None,
                data: data.to_vec(),
                palette: Vec::new(),
                transparency: None,
                soft_mask: None,
                index: 0,
                obj: 0,
            });
        }

        if pos + 2 > data.len() {
            break;
        }
        pos += BigEndian::read_u16(&data[pos..pos + 2]) as usize;
    }

    Err(Error::Format("no JPEG frame header found".to_string()))
}
