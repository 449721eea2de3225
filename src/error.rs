//! Error types for the PDF generation library.
//!
//! All failures are terminal for the document instance being built: the
//! library performs no retries, and partially built state must not be
//! reused after an error.

/// Result type alias for PDF generation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while building a document.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A drawing operation was issued before any page existed
    #[error("No page has been added yet")]
    NoPage,

    /// The document was closed and can no longer be mutated
    #[error("The document is closed")]
    DocumentClosed,

    /// A text operation was issued with no font selected
    #[error("No font has been set")]
    NoFont,

    /// The requested font is neither registered nor a core font
    #[error("Undefined font: {family} {style}")]
    UndefinedFont {
        /// Normalized (lowercase) family name
        family: String,
        /// Normalized (uppercase) style letters
        style: String,
    },

    /// Page rotation must be a multiple of 90 degrees
    #[error("Incorrect rotation value: {0}")]
    BadRotation(i32),

    /// The image type is not one of the supported formats
    #[error("Unsupported image type: {0}")]
    UnsupportedImageType(String),

    /// An image was given without an extension or an explicit type
    #[error("Image has no extension and no type was specified: {0}")]
    UnknownImageType(String),

    /// An image was registered under an empty name
    #[error("Image name is empty")]
    EmptyImageName,

    /// Malformed or unsupported image data
    #[error("Image format error: {0}")]
    Format(String),

    /// Stream decompression failed
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Font registration or embedding error
    #[error("Font error: {0}")]
    Font(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
