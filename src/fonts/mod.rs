//! Font subsystem: metrics records, core-font resolution, encoding data
//! and ToUnicode CMap synthesis.
//!
//! A font is described by a [`FontDef`]: a 256-entry glyph-width table
//! plus underline metrics, and for embedded fonts a descriptor, optional
//! encoding differences, an optional Unicode map and the embeddable font
//! program. Core fonts come from the built-in metrics bundle in
//! [`metrics`]; embedded fonts are supplied by the caller.
//!
//! Only single-byte encodings are supported: every byte value indexes the
//! width table directly, and text outside that range must be mapped by
//! the caller before layout.

pub(crate) mod metrics;

/// Kind of font, driving how it is serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontKind {
    /// One of the 14 standard fonts every PDF consumer provides;
    /// metrics only, no embedded program
    Core,
    /// Embedded Type1 font
    Type1,
    /// Embedded TrueType/OpenType font
    TrueType,
}

impl FontKind {
    /// The /Subtype name written into the font dictionary.
    pub(crate) fn subtype(self) -> &'static str {
        match self {
            FontKind::Core | FontKind::Type1 => "Type1",
            FontKind::TrueType => "TrueType",
        }
    }
}

/// One entry of a sparse byte-to-Unicode map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnicodeMapping {
    /// A single byte maps to one Unicode scalar
    Single(u32),
    /// `len` consecutive bytes map to `len` consecutive scalars starting
    /// at `start`
    Range {
        /// First Unicode scalar of the run
        start: u32,
        /// Number of consecutive byte values covered
        len: u32,
    },
}

/// Embeddable font program bytes plus the length metadata the font-file
/// stream declares.
#[derive(Debug, Clone)]
pub struct FontProgram {
    /// Raw program bytes as provided by the font source
    pub data: Vec<u8>,
    /// Whether `data` is already Flate-compressed
    pub compressed: bool,
    /// TrueType: original file size. Type1: cleartext segment length.
    pub length1: usize,
    /// Type1 only: encrypted segment length; the zero-padding trailer
    /// length is always written as 0
    pub length2: Option<usize>,
}

/// Structured font metrics record.
///
/// This is the opaque "font data source" output: glyph widths for byte
/// values 0-255, underline metrics, and the embedding data for non-core
/// fonts.
#[derive(Debug, Clone)]
pub struct FontDef {
    /// PostScript base font name (e.g. `Helvetica-Bold`)
    pub name: String,
    /// Font kind
    pub kind: FontKind,
    /// Glyph width in 1/1000 em for each byte value
    pub widths: [u16; 256],
    /// Underline position in 1/1000 em (negative, below the baseline)
    pub underline_position: i32,
    /// Underline thickness in 1/1000 em
    pub underline_thickness: i32,
    /// Font descriptor entries (embedded fonts only), written in order
    pub descriptor: Vec<(String, String)>,
    /// Custom encoding differences from WinAnsi, as the body of a
    /// /Differences array
    pub diff: Option<String>,
    /// Encoding name used to share encoding and CMap objects between
    /// fonts
    pub enc: Option<String>,
    /// Sparse byte-to-Unicode map used to build the ToUnicode CMap
    pub uv: Option<Vec<(u8, UnicodeMapping)>>,
    /// Embeddable program bytes (None for core fonts)
    pub program: Option<FontProgram>,
    /// Whether the program is a subset (prefixes the base name with
    /// `AAAAAA+`)
    pub subsetted: bool,
}

impl FontDef {
    /// Width of a byte sequence in 1/1000 em units.
    pub(crate) fn text_width(&self, text: &[u8]) -> u32 {
        text.iter().map(|&b| self.widths[b as usize] as u32).sum()
    }
}

/// A registered font: its definition plus the resource index and the
/// object numbers assigned at serialization time.
pub(crate) struct Font {
    pub(crate) def: FontDef,
    /// 1-based resource index, giving the /F<i> name
    pub(crate) index: usize,
    /// Font dictionary object number (set during serialization)
    pub(crate) obj: u32,
    /// Font-file stream object number (embedded fonts only)
    pub(crate) file_obj: u32,
}

/// Normalize a style string: uppercase, extract the underline flag, and
/// canonicalize `IB` to `BI`.
pub(crate) fn normalize_style(style: &str) -> (String, bool) {
    let mut style = style.to_uppercase();
    let underline = style.contains('U');
    if underline {
        style = style.replace('U', "");
    }
    if style == "IB" {
        style = "BI".to_string();
    }
    (style, underline)
}

/// The five core font families.
const CORE_FAMILIES: [&str; 5] = ["courier", "helvetica", "times", "symbol", "zapfdingbats"];

/// Whether `family` (already lowercased) is a core font family.
pub(crate) fn is_core(family: &str) -> bool {
    CORE_FAMILIES.contains(&family)
}

/// Synthesize a ToUnicode CMap program from a sparse byte-to-Unicode
/// map. Run entries and single entries are emitted as separate counted
/// `beginbfrange`/`beginbfchar` blocks.
pub(crate) fn to_unicode_cmap(uv: &[(u8, UnicodeMapping)]) -> String {
    let mut ranges = String::new();
    let mut nbr = 0;
    let mut chars = String::new();
    let mut nbc = 0;
    for &(c, mapping) in uv {
        match mapping {
            UnicodeMapping::Range { start, len } => {
                ranges.push_str(&format!(
                    "<{:02X}> <{:02X}> <{:04X}>\n",
                    c,
                    c as u32 + len - 1,
                    start
                ));
                nbr += 1;
            },
            UnicodeMapping::Single(v) => {
                chars.push_str(&format!("<{:02X}> <{:04X}>\n", c, v));
                nbc += 1;
            },
        }
    }
    let mut s = String::new();
    s.push_str("/CIDInit /ProcSet findresource begin\n");
    s.push_str("12 dict begin\n");
    s.push_str("begincmap\n");
    s.push_str("/CIDSystemInfo\n");
    s.push_str("<</Registry (Adobe)\n");
    s.push_str("/Ordering (UCS)\n");
    s.push_str("/Supplement 0\n");
    s.push_str(">> def\n");
    s.push_str("/CMapName /Adobe-Identity-UCS def\n");
    s.push_str("/CMapType 2 def\n");
    s.push_str("1 begincodespacerange\n");
    s.push_str("<00> <FF>\n");
    s.push_str("endcodespacerange\n");
    if nbr > 0 {
        s.push_str(&format!("{} beginbfrange\n", nbr));
        s.push_str(&ranges);
        s.push_str("endbfrange\n");
    }
    if nbc > 0 {
        s.push_str(&format!("{} beginbfchar\n", nbc));
        s.push_str(&chars);
        s.push_str("endbfchar\n");
    }
    s.push_str("endcmap\n");
    s.push_str("CMapName currentdict /CMap defineresource pop\n");
    s.push_str("end\n");
    s.push_str("end");
    s
}
