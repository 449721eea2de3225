//! Shared value types for document setup and layout calls.

use bitflags::bitflags;

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// Portrait (height > width)
    #[default]
    Portrait,
    /// Landscape (width > height)
    Landscape,
}

/// Caller-facing coordinate unit.
///
/// All positions and dimensions passed to the document are expressed in
/// this unit and converted to PDF points (1/72 inch) at serialization time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unit {
    /// PDF points
    Pt,
    /// Millimeters
    #[default]
    Mm,
    /// Centimeters
    Cm,
    /// Inches
    In,
}

impl Unit {
    /// Number of points per user unit.
    pub fn scale(self) -> f64 {
        match self {
            Unit::Pt => 1.0,
            Unit::Mm => 72.0 / 25.4,
            Unit::Cm => 72.0 / 2.54,
            Unit::In => 72.0,
        }
    }
}

/// Page size: a standard format or a custom (width, height) pair in user
/// units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageSize {
    /// ISO A3 (841.89 x 1190.55 pt)
    A3,
    /// ISO A4 (595.28 x 841.89 pt)
    A4,
    /// ISO A5 (420.94 x 595.28 pt)
    A5,
    /// US Letter (612 x 792 pt)
    Letter,
    /// US Legal (612 x 1008 pt)
    Legal,
    /// Custom size in user units; normalized so the smaller dimension
    /// comes first
    Custom(f64, f64),
}

impl PageSize {
    /// Resolve to a portrait-ordered (width, height) pair in user units
    /// for the given scale factor.
    pub(crate) fn dimensions(self, k: f64) -> (f64, f64) {
        let pt = match self {
            PageSize::A3 => (841.89, 1190.55),
            PageSize::A4 => (595.28, 841.89),
            PageSize::A5 => (420.94, 595.28),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
            PageSize::Custom(w, h) => {
                return if w > h { (h, w) } else { (w, h) };
            },
        };
        (pt.0 / k, pt.1 / k)
    }
}

/// Initial zoom hint written into the document catalog.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ZoomMode {
    /// Viewer default
    #[default]
    Default,
    /// Fit the whole page in the window
    FullPage,
    /// Fit the page width
    FullWidth,
    /// Actual size (100%)
    Real,
    /// Explicit zoom percentage
    Percent(f64),
}

/// Page layout hint written into the document catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutMode {
    /// Viewer default
    #[default]
    Default,
    /// One page at a time
    Single,
    /// Continuous scrolling
    Continuous,
    /// Two columns
    Two,
}

/// A stroke, fill or text color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    /// Gray level, 0 (black) to 255 (white)
    Gray(u8),
    /// RGB components, 0-255 each
    Rgb(u8, u8, u8),
}

impl Color {
    /// Black.
    pub const BLACK: Color = Color::Gray(0);

    /// Render the color-setting operator, uppercase for stroking
    /// (`G`/`RG`) and lowercase for non-stroking (`g`/`rg`).
    ///
    /// Pure black always uses the single-component gray form.
    pub(crate) fn operator(self, stroke: bool) -> String {
        match self {
            Color::Gray(g) => {
                format!("{:.3} {}", g as f64 / 255.0, if stroke { "G" } else { "g" })
            },
            // Pure black collapses to the single-component gray form
            Color::Rgb(0, 0, 0) => format!("0.000 {}", if stroke { "G" } else { "g" }),
            Color::Rgb(r, g, b) => {
                format!(
                    "{:.3} {:.3} {:.3} {}",
                    r as f64 / 255.0,
                    g as f64 / 255.0,
                    b as f64 / 255.0,
                    if stroke { "RG" } else { "rg" }
                )
            },
        }
    }
}

/// Horizontal alignment of text inside a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    /// Left-aligned (default)
    #[default]
    Left,
    /// Centered
    Center,
    /// Right-aligned
    Right,
    /// Justified; only meaningful for wrapped blocks, treated as left
    /// alignment in single-line cells
    Justify,
}

bitflags! {
    /// Which edges of a cell get a border line.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Edges: u8 {
        /// Left edge
        const LEFT = 1;
        /// Top edge
        const TOP = 2;
        /// Right edge
        const RIGHT = 4;
        /// Bottom edge
        const BOTTOM = 8;
    }
}

/// Cell border specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Border {
    /// No border
    #[default]
    None,
    /// Full frame drawn as a single rectangle
    Frame,
    /// Individual edge lines
    Edges(Edges),
}

/// Where the cursor moves after a cell is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellFlow {
    /// To the right of the cell (same line)
    #[default]
    Right,
    /// To the beginning of the next line
    NextLine,
    /// Below the cell, keeping the horizontal position
    Below,
}

/// Style of a rectangle drawing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawMode {
    /// Outline only
    #[default]
    Stroke,
    /// Filled only
    Fill,
    /// Filled and outlined
    FillStroke,
}

/// Identifier of an internal link destination created by
/// [`Document::add_link`](crate::Document::add_link).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkId(pub(crate) usize);

/// Target of a link annotation: an external URI or an internal
/// destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// External URI opened by the viewer
    Uri(String),
    /// Internal destination (page + vertical offset), set via
    /// [`Document::set_link`](crate::Document::set_link)
    Internal(LinkId),
}

/// Optional overrides applied on top of the document's current text state.
///
/// Absent fields fall back to the supplied default during [`merge`]; the
/// override always wins when present.
///
/// [`merge`]: TextStyle::merge
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextStyle {
    pub(crate) color: Option<String>,
    pub(crate) size: Option<f64>,
    pub(crate) underline: Option<bool>,
}

impl TextStyle {
    /// Create an empty style (all fields fall back to the defaults).
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the text color.
    pub fn color(mut self, color: Color) -> Self {
        self.color = Some(color.operator(false));
        self
    }

    /// Override the font size in points.
    pub fn size(mut self, size: f64) -> Self {
        self.size = Some(size);
        self
    }

    /// Override the underline flag.
    pub fn underline(mut self, underline: bool) -> Self {
        self.underline = Some(underline);
        self
    }

    /// Fill absent fields from `default`, keeping present ones.
    pub fn merge(mut self, default: &TextStyle) -> Self {
        if self.color.is_none() {
            self.color = default.color.clone();
        }
        if self.size.is_none() {
            self.size = default.size;
        }
        if self.underline.is_none() {
            self.underline = default.underline;
        }
        self
    }
}
