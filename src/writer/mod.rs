//! PDF output assembly.
//!
//! [`ObjectWriter`] owns the growing output buffer, the object-number
//! counter and the object-number to byte-offset table that becomes the
//! cross-reference table. Document finalization (the fixed serialization
//! order: header, pages, resources, info, catalog, xref, trailer) lives
//! in [`finalize`].

mod finalize;
mod serializer;

pub use serializer::ObjectSerializer;
pub(crate) use serializer::escape_str;

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::io::{Read, Write};

/// Compress bytes into a zlib-wrapped deflate stream (`/FlateDecode`).
pub(crate) fn compress(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress a zlib-wrapped deflate stream.
pub(crate) fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::Decode(e.to_string()))?;
    Ok(out)
}

/// Accumulates the serialized PDF: output bytes, object numbers and their
/// byte offsets.
///
/// Object numbers 1 (pages root) and 2 (resource dictionary) are reserved
/// up front; the counter hands out 3, 4, ... for everything else.
pub(crate) struct ObjectWriter {
    buf: Vec<u8>,
    offsets: BTreeMap<u32, usize>,
    n: u32,
    /// Whether stream objects get Flate-compressed
    pub(crate) compress: bool,
}

impl ObjectWriter {
    pub(crate) fn new() -> Self {
        Self {
            buf: Vec::new(),
            offsets: BTreeMap::new(),
            n: 2,
            compress: false,
        }
    }

    /// Current byte offset (length of the output so far).
    pub(crate) fn offset(&self) -> usize {
        self.buf.len()
    }

    /// Highest object number allocated so far.
    pub(crate) fn object_count(&self) -> u32 {
        self.n
    }

    /// The number the next implicit [`begin_object`] call will allocate.
    ///
    /// [`begin_object`]: ObjectWriter::begin_object
    pub(crate) fn peek_next(&self) -> u32 {
        self.n + 1
    }

    pub(crate) fn offset_of(&self, n: u32) -> Option<usize> {
        self.offsets.get(&n).copied()
    }

    /// Append a line (raw bytes plus a newline) to the output.
    pub(crate) fn put_line(&mut self, line: impl AsRef<[u8]>) {
        self.buf.extend_from_slice(line.as_ref());
        self.buf.push(b'\n');
    }

    /// Begin an indirect object: allocate the next number (or use the
    /// explicit one), record the current offset, and emit the object
    /// header line.
    pub(crate) fn begin_object(&mut self, number: Option<u32>) -> u32 {
        let n = match number {
            Some(n) => n,
            None => {
                self.n += 1;
                self.n
            },
        };
        self.offsets.insert(n, self.buf.len());
        self.put_line(format!("{} 0 obj", n));
        n
    }

    pub(crate) fn end_object(&mut self) {
        self.put_line("endobj");
    }

    /// Emit the stream section of an object whose dictionary has already
    /// been written.
    pub(crate) fn put_stream(&mut self, data: &[u8]) {
        self.put_line("stream");
        self.put_line(data);
        self.put_line("endstream");
    }

    /// Emit a complete stream object, compressing the data when the
    /// document-level flag is on. Returns the allocated object number.
    pub(crate) fn put_stream_object(&mut self, data: &[u8]) -> Result<u32> {
        let (filter, data) = if self.compress {
            ("/Filter /FlateDecode ", compress(data)?)
        } else {
            ("", data.to_vec())
        };
        let n = self.begin_object(None);
        self.put_line(format!("<<{}/Length {}>>", filter, data.len()));
        self.put_stream(&data);
        self.end_object();
        Ok(n)
    }

    pub(crate) fn buffer(&self) -> &[u8] {
        &self.buf
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
