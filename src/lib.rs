// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]

//! # pdf_quill
//!
//! Programmatic PDF generation: place text, shapes, images and links on
//! a sequence of pages and serialize everything into a complete PDF
//! byte buffer.
//!
//! ## Features
//!
//! - **Layout**: fixed cells, word-wrapped cell blocks with optional
//!   justification, flowing text, automatic page breaks, header/footer
//!   callbacks
//! - **Fonts**: the 14 core faces with standard metrics, embedded
//!   Type1/TrueType fonts with custom encodings and ToUnicode CMaps
//! - **Images**: JPEG (pass-through), PNG (chunk-level, including
//!   color-key transparency and alpha soft masks), GIF (via in-memory
//!   PNG conversion)
//! - **Links**: external URIs and internal page destinations
//! - **Output**: object graph, cross-reference table and trailer emitted
//!   into one byte buffer; content streams optionally Flate-compressed
//!
//! ## Quick start
//!
//! ```no_run
//! use pdf_quill::{Align, Border, CellFlow, Document, Orientation, PageSize, Unit};
//!
//! # fn main() -> pdf_quill::Result<()> {
//! let mut pdf = Document::new(Orientation::Portrait, Unit::Mm, PageSize::A4)?;
//! pdf.set_font("Arial", "B", 16.0)?;
//! pdf.cell(40.0, 10.0, "Hello World!", Border::None, CellFlow::Right, Align::Left, false, None)?;
//! pdf.save("hello.pdf")?;
//! # Ok(())
//! # }
//! ```
//!
//! A [`Document`] is built strictly sequentially: drawing calls append
//! operators to the current page, and [`Document::close`] (or
//! [`Document::into_bytes`] / [`Document::save`]) freezes the last page
//! and serializes the object graph. Any error is terminal for the
//! document instance.

pub mod document;
pub mod error;
pub mod fonts;
pub mod image;
pub mod object;
pub mod types;
pub mod writer;

pub use document::Document;
pub use error::{Error, Result};
pub use fonts::{FontDef, FontKind, FontProgram, UnicodeMapping};
pub use image::ImageKind;
pub use types::{
    Align, Border, CellFlow, Color, DrawMode, Edges, LayoutMode, LinkId, LinkTarget, Orientation,
    PageSize, TextStyle, Unit, ZoomMode,
};
