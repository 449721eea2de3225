//! Document state machine and layout engine.
//!
//! A [`Document`] is a single exclusively-owned mutable value carrying the
//! cursor, margins, current style, the per-page content buffers and the
//! font/image caches. Drawing calls append operators to the active page;
//! closing the document freezes the last page and serializes the whole
//! object graph (see [`crate::writer`]).
//!
//! Lifecycle: `NoPage -> BeginPage -> EndPage -> EndDocument`. Operators
//! are only accepted while a page is open; after the last page is frozen
//! the writer routes its own resource output straight into the output
//! buffer; a closed document rejects every further mutation.

use crate::error::{Error, Result};
use crate::fonts::{self, Font, FontDef};
use crate::image as raster;
use crate::image::ImageKind;
use crate::types::{
    Align, Border, CellFlow, Color, DrawMode, Edges, LayoutMode, LinkId, LinkTarget, Orientation,
    PageSize, TextStyle, Unit, ZoomMode,
};
use crate::writer::{escape_str, ObjectWriter};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::Path;

/// Document lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    NoPage,
    BeginPage,
    EndPage,
    EndDocument,
}

/// A link-annotation rectangle recorded on a page, in points with the
/// vertical flip already applied.
pub(crate) struct PageLink {
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) w: f64,
    pub(crate) h: f64,
    pub(crate) target: LinkTarget,
    /// Annotation object number (set during serialization)
    pub(crate) obj: u32,
}

/// One page: its content stream plus geometry overrides and link
/// rectangles. Frozen once the page is closed.
#[derive(Default)]
pub(crate) struct Page {
    pub(crate) content: String,
    /// (width, height) in points, recorded only when differing from the
    /// document default
    pub(crate) size_pt: Option<(f64, f64)>,
    pub(crate) rotation: Option<i32>,
    pub(crate) links: Vec<PageLink>,
    /// Page object number (set during serialization)
    pub(crate) obj: u32,
}

type PageHook = Box<dyn Fn(&mut Document) -> Result<()>>;

/// An in-progress PDF document.
pub struct Document {
    pub(crate) state: State,
    pub(crate) pages: Vec<Page>,
    /// Points per user unit
    pub(crate) scale: f64,
    pub(crate) default_orientation: Orientation,
    pub(crate) current_orientation: Orientation,
    /// Portrait-ordered page size in user units
    pub(crate) default_size: (f64, f64),
    pub(crate) current_size: (f64, f64),
    pub(crate) current_rotation: i32,
    /// Current page dimensions in points
    pub(crate) width_pt: f64,
    pub(crate) height_pt: f64,
    /// Current page dimensions in user units
    pub(crate) width: f64,
    pub(crate) height: f64,
    pub(crate) left_margin: f64,
    pub(crate) top_margin: f64,
    pub(crate) right_margin: f64,
    /// Page-break margin at the bottom
    pub(crate) bottom_margin: f64,
    /// Interior cell padding
    pub(crate) cell_margin: f64,
    pub(crate) x: f64,
    pub(crate) y: f64,
    /// Height of the last printed cell, used by `ln(None)`
    pub(crate) last_height: f64,
    pub(crate) line_width: f64,
    pub(crate) fonts: IndexMap<String, Font>,
    /// Encoding-differences objects shared between fonts, by encoding name
    pub(crate) encodings: HashMap<String, u32>,
    /// ToUnicode CMap objects shared between fonts, by encoding/font name
    pub(crate) cmaps: HashMap<String, u32>,
    pub(crate) font_family: String,
    pub(crate) font_style: String,
    pub(crate) underline: bool,
    /// Key of the selected font in `fonts`
    pub(crate) current_font: Option<String>,
    pub(crate) font_size_pt: f64,
    /// Font size in user units
    pub(crate) font_size: f64,
    pub(crate) draw_color: String,
    pub(crate) fill_color: String,
    pub(crate) text_color: String,
    /// Whether fill and text colors differ (text needs its own q/Q)
    pub(crate) color_flag: bool,
    pub(crate) with_alpha: bool,
    pub(crate) word_spacing: f64,
    pub(crate) images: IndexMap<String, raster::ImageInfo>,
    /// Internal link destinations: (page number, y in user units)
    pub(crate) links: Vec<(usize, f64)>,
    pub(crate) auto_page_break: bool,
    pub(crate) page_break_trigger: f64,
    pub(crate) in_header: bool,
    pub(crate) in_footer: bool,
    pub(crate) alias_nb_pages: Option<String>,
    pub(crate) zoom_mode: ZoomMode,
    pub(crate) layout_mode: LayoutMode,
    /// Info-dictionary entries in insertion order
    pub(crate) metadata: Vec<(String, String)>,
    pub(crate) pdf_version: String,
    header_fn: Option<PageHook>,
    footer_fn: Option<PageHook>,
    pub(crate) out: ObjectWriter,
}

impl Document {
    /// Create a document, open its first page and select the default
    /// font (helvetica 12pt, via the `arial` alias).
    ///
    /// Defaults mirror common print setup: 1 cm page margins, 1 mm cell
    /// padding, 0.2 mm lines, automatic page breaks 2 cm from the bottom
    /// edge, stream compression on.
    pub fn new(orientation: Orientation, unit: Unit, size: PageSize) -> Result<Self> {
        let k = unit.scale();
        let size_uu = size.dimensions(k);
        let (w, h) = match orientation {
            Orientation::Portrait => size_uu,
            Orientation::Landscape => (size_uu.1, size_uu.0),
        };
        let margin = 28.35 / k;
        let mut doc = Document {
            state: State::NoPage,
            pages: Vec::new(),
            scale: k,
            default_orientation: orientation,
            current_orientation: orientation,
            default_size: size_uu,
            current_size: size_uu,
            current_rotation: 0,
            width_pt: w * k,
            height_pt: h * k,
            width: w,
            height: h,
            left_margin: margin,
            top_margin: margin,
            right_margin: margin,
            bottom_margin: 0.0,
            cell_margin: margin / 10.0,
            x: 0.0,
            y: 0.0,
            last_height: 0.0,
            line_width: 0.567 / k,
            fonts: IndexMap::new(),
            encodings: HashMap::new(),
            cmaps: HashMap::new(),
            font_family: String::new(),
            font_style: String::new(),
            underline: false,
            current_font: None,
            font_size_pt: 12.0,
            font_size: 0.0,
            draw_color: "0 G".to_string(),
            fill_color: "0 g".to_string(),
            text_color: "0 g".to_string(),
            color_flag: false,
            with_alpha: false,
            word_spacing: 0.0,
            images: IndexMap::new(),
            links: Vec::new(),
            auto_page_break: true,
            page_break_trigger: 0.0,
            in_header: false,
            in_footer: false,
            alias_nb_pages: None,
            zoom_mode: ZoomMode::Default,
            layout_mode: LayoutMode::Default,
            metadata: Vec::new(),
            pdf_version: "1.3".to_string(),
            header_fn: None,
            footer_fn: None,
            out: ObjectWriter::new(),
        };
        doc.set_auto_page_break(true, 2.0 * margin);
        doc.set_compression(true);
        doc.add_page(None, None, 0)?;
        doc.set_font("arial", "", 12.0)?;
        Ok(doc)
    }

    // ----- setup -----------------------------------------------------

    /// Set the left, top and (optionally distinct) right margins.
    pub fn set_margins(&mut self, left: f64, top: f64, right: Option<f64>) {
        self.left_margin = left;
        self.top_margin = top;
        self.right_margin = right.unwrap_or(left);
    }

    /// Set the left margin; bumps the cursor forward on a live page.
    pub fn set_left_margin(&mut self, margin: f64) {
        self.left_margin = margin;
        if !self.pages.is_empty() && self.x < margin {
            self.x = margin;
        }
    }

    /// Set the top margin.
    pub fn set_top_margin(&mut self, margin: f64) {
        self.top_margin = margin;
    }

    /// Set the right margin.
    pub fn set_right_margin(&mut self, margin: f64) {
        self.right_margin = margin;
    }

    /// Enable or disable automatic page breaking and set the bottom
    /// margin that triggers it.
    pub fn set_auto_page_break(&mut self, auto: bool, margin: f64) {
        self.auto_page_break = auto;
        self.bottom_margin = margin;
        self.page_break_trigger = self.height - margin;
    }

    /// Set the viewer display hints written into the catalog.
    pub fn set_display_mode(&mut self, zoom: ZoomMode, layout: LayoutMode) {
        self.zoom_mode = zoom;
        self.layout_mode = layout;
    }

    /// Enable or disable Flate compression of stream objects.
    pub fn set_compression(&mut self, compress: bool) {
        self.out.compress = compress;
    }

    fn set_metadata(&mut self, key: &str, value: &str) {
        if let Some(entry) = self.metadata.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value.to_string();
        } else {
            self.metadata.push((key.to_string(), value.to_string()));
        }
    }

    /// Set the document title.
    pub fn set_title(&mut self, title: &str) {
        self.set_metadata("Title", title);
    }

    /// Set the document author.
    pub fn set_author(&mut self, author: &str) {
        self.set_metadata("Author", author);
    }

    /// Set the document subject.
    pub fn set_subject(&mut self, subject: &str) {
        self.set_metadata("Subject", subject);
    }

    /// Set the document keywords.
    pub fn set_keywords(&mut self, keywords: &str) {
        self.set_metadata("Keywords", keywords);
    }

    /// Set the creator application name.
    pub fn set_creator(&mut self, creator: &str) {
        self.set_metadata("Creator", creator);
    }

    /// Define the placeholder substituted with the total page count when
    /// pages are serialized. Defaults to `{nb}` when `alias` is None.
    pub fn alias_nb_pages(&mut self, alias: Option<&str>) {
        self.alias_nb_pages = Some(alias.unwrap_or("{nb}").to_string());
    }

    /// Register a header callback, run at the top of every page.
    pub fn set_header<F>(&mut self, hook: F)
    where
        F: Fn(&mut Document) -> Result<()> + 'static,
    {
        self.header_fn = Some(Box::new(hook));
    }

    /// Register a footer callback, run when each page is closed.
    pub fn set_footer<F>(&mut self, hook: F)
    where
        F: Fn(&mut Document) -> Result<()> + 'static,
    {
        self.footer_fn = Some(Box::new(hook));
    }

    // ----- lifecycle -------------------------------------------------

    /// Current page number (1-based).
    pub fn page_no(&self) -> usize {
        self.pages.len()
    }

    /// Route an operator line to the active page buffer, or to the
    /// output buffer once pages are frozen (resource serialization).
    pub(crate) fn write_out(&mut self, s: &str) -> Result<()> {
        match self.state {
            State::BeginPage => {
                let page = self.pages.last_mut().ok_or(Error::NoPage)?;
                page.content.push_str(s);
                page.content.push('\n');
                Ok(())
            },
            State::EndPage => {
                self.out.put_line(s);
                Ok(())
            },
            State::NoPage => Err(Error::NoPage),
            State::EndDocument => Err(Error::DocumentClosed),
        }
    }

    fn run_header(&mut self) -> Result<()> {
        if let Some(hook) = self.header_fn.take() {
            self.in_header = true;
            let result = hook(self);
            self.in_header = false;
            self.header_fn = Some(hook);
            result
        } else {
            Ok(())
        }
    }

    fn run_footer(&mut self) -> Result<()> {
        if let Some(hook) = self.footer_fn.take() {
            self.in_footer = true;
            let result = hook(self);
            self.in_footer = false;
            self.footer_fn = Some(hook);
            result
        } else {
            Ok(())
        }
    }

    /// Start a new page, closing the previous one (footer, freeze) and
    /// restoring font, line width and colors across the transition.
    ///
    /// None arguments fall back to the document defaults. A non-default
    /// size or orientation is recorded on the page itself; `rotation`
    /// must be a multiple of 90.
    pub fn add_page(
        &mut self,
        orientation: Option<Orientation>,
        size: Option<PageSize>,
        rotation: i32,
    ) -> Result<()> {
        if self.state == State::EndDocument {
            return Err(Error::DocumentClosed);
        }
        let family = self.font_family.clone();
        let style = format!("{}{}", self.font_style, if self.underline { "U" } else { "" });
        let font_size = self.font_size_pt;
        let lw = self.line_width;
        let dc = self.draw_color.clone();
        let fc = self.fill_color.clone();
        let tc = self.text_color.clone();
        let cf = self.color_flag;
        if !self.pages.is_empty() {
            self.run_footer()?;
            self.end_page();
        }
        self.begin_page(orientation, size, rotation)?;
        // Square line caps
        self.write_out("2 J")?;
        self.line_width = lw;
        let lw_op = format!("{:.2} w", lw * self.scale);
        self.write_out(&lw_op)?;
        if !family.is_empty() {
            self.set_font(&family, &style, font_size)?;
        }
        self.draw_color = dc.clone();
        if dc != "0 G" {
            let op = dc.clone();
            self.write_out(&op)?;
        }
        self.fill_color = fc.clone();
        if fc != "0 g" {
            let op = fc.clone();
            self.write_out(&op)?;
        }
        self.text_color = tc.clone();
        self.color_flag = cf;
        // Page header, then restore whatever it changed
        self.run_header()?;
        if self.line_width != lw {
            self.line_width = lw;
            self.write_out(&lw_op)?;
        }
        if !family.is_empty() {
            self.set_font(&family, &style, font_size)?;
        }
        if self.draw_color != dc {
            self.draw_color = dc.clone();
            self.write_out(&dc)?;
        }
        if self.fill_color != fc {
            self.fill_color = fc.clone();
            self.write_out(&fc)?;
        }
        self.text_color = tc;
        self.color_flag = cf;
        Ok(())
    }

    fn begin_page(
        &mut self,
        orientation: Option<Orientation>,
        size: Option<PageSize>,
        rotation: i32,
    ) -> Result<()> {
        if rotation % 90 != 0 {
            return Err(Error::BadRotation(rotation));
        }
        let orientation = orientation.unwrap_or(self.default_orientation);
        let size = match size {
            Some(s) => s.dimensions(self.scale),
            None => self.default_size,
        };
        if orientation != self.current_orientation || size != self.current_size {
            let (w, h) = match orientation {
                Orientation::Portrait => size,
                Orientation::Landscape => (size.1, size.0),
            };
            self.width = w;
            self.height = h;
            self.width_pt = w * self.scale;
            self.height_pt = h * self.scale;
            self.page_break_trigger = self.height - self.bottom_margin;
            self.current_orientation = orientation;
            self.current_size = size;
        }

        let mut page = Page::default();
        if orientation != self.default_orientation || size != self.default_size {
            page.size_pt = Some((self.width_pt, self.height_pt));
        }
        if rotation != 0 {
            self.current_rotation = rotation;
            page.rotation = Some(rotation);
        }
        self.pages.push(page);
        self.state = State::BeginPage;
        self.x = self.left_margin;
        self.y = self.top_margin;
        self.font_family.clear();
        Ok(())
    }

    fn end_page(&mut self) {
        self.state = State::EndPage;
    }

    /// Whether an automatic page break is currently accepted.
    pub fn accept_page_break(&self) -> bool {
        self.auto_page_break
    }

    /// Terminate the document: run the final footer, freeze the last
    /// page and serialize everything. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.state == State::EndDocument {
            return Ok(());
        }
        if self.pages.is_empty() {
            self.add_page(None, None, 0)?;
        }
        self.run_footer()?;
        self.end_page();
        self.end_doc()
    }

    /// Close the document (if still open) and return the finished PDF
    /// bytes.
    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        self.close()?;
        Ok(self.out.into_bytes())
    }

    /// The serialized output; complete once [`close`](Document::close)
    /// has run.
    pub fn buffer(&self) -> &[u8] {
        self.out.buffer()
    }

    /// Close the document (if still open) and write it to a file.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.close()?;
        std::fs::write(path, self.out.buffer())?;
        Ok(())
    }

    // ----- cursor and geometry ---------------------------------------

    /// Current page width in user units.
    pub fn page_width(&self) -> f64 {
        self.width
    }

    /// Current page height in user units.
    pub fn page_height(&self) -> f64 {
        self.height
    }

    /// Horizontal cursor position.
    pub fn get_x(&self) -> f64 {
        self.x
    }

    /// Set the horizontal cursor; a negative value measures from the
    /// right edge.
    pub fn set_x(&mut self, x: f64) {
        self.x = if x >= 0.0 { x } else { self.width + x };
    }

    /// Vertical cursor position.
    pub fn get_y(&self) -> f64 {
        self.y
    }

    /// Set the vertical cursor (negative measures from the bottom edge),
    /// optionally resetting x to the left margin.
    pub fn set_y(&mut self, y: f64, reset_x: bool) {
        self.y = if y >= 0.0 { y } else { self.height + y };
        if reset_x {
            self.x = self.left_margin;
        }
    }

    /// Set both cursor coordinates.
    pub fn set_xy(&mut self, x: f64, y: f64) {
        self.set_x(x);
        self.set_y(y, false);
    }

    /// Line feed: back to the left margin and down by `h`, or by the
    /// last cell height when `h` is None.
    pub fn ln(&mut self, h: Option<f64>) {
        self.x = self.left_margin;
        self.y += h.unwrap_or(self.last_height);
    }

    // ----- colors and lines ------------------------------------------

    /// Set the color for stroking operations.
    pub fn set_draw_color(&mut self, color: Color) -> Result<()> {
        self.draw_color = color.operator(true);
        if !self.pages.is_empty() {
            let op = self.draw_color.clone();
            self.write_out(&op)?;
        }
        Ok(())
    }

    /// Set the color for filling operations.
    pub fn set_fill_color(&mut self, color: Color) -> Result<()> {
        self.fill_color = color.operator(false);
        self.color_flag = self.fill_color != self.text_color;
        if !self.pages.is_empty() {
            let op = self.fill_color.clone();
            self.write_out(&op)?;
        }
        Ok(())
    }

    /// Set the text color; applied when text is drawn.
    pub fn set_text_color(&mut self, color: Color) {
        self.text_color = color.operator(false);
        self.color_flag = self.fill_color != self.text_color;
    }

    /// Set the stroking line width.
    pub fn set_line_width(&mut self, width: f64) -> Result<()> {
        self.line_width = width;
        if !self.pages.is_empty() {
            let op = format!("{:.2} w", width * self.scale);
            self.write_out(&op)?;
        }
        Ok(())
    }

    /// Draw a line between two points.
    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) -> Result<()> {
        let k = self.scale;
        let op = format!(
            "{:.2} {:.2} m {:.2} {:.2} l S",
            x1 * k,
            (self.height - y1) * k,
            x2 * k,
            (self.height - y2) * k
        );
        self.write_out(&op)
    }

    /// Draw a rectangle, outlined, filled or both.
    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, mode: DrawMode) -> Result<()> {
        let op = match mode {
            DrawMode::Stroke => "S",
            DrawMode::Fill => "f",
            DrawMode::FillStroke => "B",
        };
        let k = self.scale;
        let s = format!(
            "{:.2} {:.2} {:.2} {:.2} re {}",
            x * k,
            (self.height - y) * k,
            w * k,
            -h * k,
            op
        );
        self.write_out(&s)
    }

    // ----- fonts -----------------------------------------------------

    /// Register an embedded (Type1/TrueType) font definition under the
    /// normalized family+style key. Re-registering an existing key is a
    /// no-op.
    pub fn add_font(&mut self, family: &str, style: &str, def: FontDef) -> Result<()> {
        let family = family.to_lowercase();
        let (style, _) = fonts::normalize_style(style);
        let key = format!("{}{}", family, style);
        if self.fonts.contains_key(&key) {
            return Ok(());
        }
        log::debug!("registering font {} as {}", def.name, key);
        self.register_font(key, def);
        Ok(())
    }

    fn register_font(&mut self, key: String, def: FontDef) {
        let index = self.fonts.len() + 1;
        self.fonts.insert(
            key,
            Font {
                def,
                index,
                obj: 0,
                file_obj: 0,
            },
        );
    }

    /// Select a font by family, style letters (`B`, `I`, `U` in any
    /// combination) and size in points.
    ///
    /// An empty family keeps the current one; size 0 keeps the current
    /// size. Re-selecting the active triple is a no-op. Unregistered
    /// non-core families fail with [`Error::UndefinedFont`].
    pub fn set_font(&mut self, family: &str, style: &str, size: f64) -> Result<()> {
        let mut family = if family.is_empty() {
            self.font_family.clone()
        } else {
            family.to_lowercase()
        };
        let (mut style, underline) = fonts::normalize_style(style);
        self.underline = underline;
        let size = if size == 0.0 { self.font_size_pt } else { size };
        if self.font_family == family && self.font_style == style && self.font_size_pt == size {
            return Ok(());
        }
        let mut key = format!("{}{}", family, style);
        if !self.fonts.contains_key(&key) {
            if family == "arial" {
                family = "helvetica".to_string();
            }
            if !fonts::is_core(&family) {
                return Err(Error::UndefinedFont { family, style });
            }
            if family == "symbol" || family == "zapfdingbats" {
                style.clear();
            }
            key = format!("{}{}", family, style);
            if !self.fonts.contains_key(&key) {
                let def = fonts::metrics::core_font(&family, &style).ok_or_else(|| {
                    Error::UndefinedFont {
                        family: family.clone(),
                        style: style.clone(),
                    }
                })?;
                self.register_font(key.clone(), def);
            }
        }
        self.font_family = family;
        self.font_style = style;
        self.font_size_pt = size;
        self.font_size = size / self.scale;
        self.current_font = Some(key.clone());
        if !self.pages.is_empty() {
            let index = self.fonts[&key].index;
            let op = format!("BT /F{} {:.2} Tf ET", index, self.font_size_pt);
            self.write_out(&op)?;
        }
        Ok(())
    }

    /// Change the size of the current font, in points.
    pub fn set_font_size(&mut self, size: f64) -> Result<()> {
        if self.font_size_pt == size {
            return Ok(());
        }
        self.font_size_pt = size;
        self.font_size = size / self.scale;
        if !self.pages.is_empty() {
            let key = self.current_font.clone().ok_or(Error::NoFont)?;
            let index = self.fonts[&key].index;
            let op = format!("BT /F{} {:.2} Tf ET", index, self.font_size_pt);
            self.write_out(&op)?;
        }
        Ok(())
    }

    /// Width of a string in the current font, in user units.
    ///
    /// Widths are summed per byte of the input, so only single-byte
    /// encodings measure meaningfully.
    pub fn get_string_width(&self, s: &str) -> f64 {
        let Some(font) = self.current_font.as_ref().and_then(|k| self.fonts.get(k)) else {
            return 0.0;
        };
        font.def.text_width(s.as_bytes()) as f64 * self.font_size / 1000.0
    }

    fn make_underline(&self, x: f64, y: f64, txt: &str) -> String {
        let (up, ut) = self
            .current_font
            .as_ref()
            .and_then(|k| self.fonts.get(k))
            .map(|f| (f.def.underline_position, f.def.underline_thickness))
            .unwrap_or((-100, 50));
        let spaces = txt.bytes().filter(|&b| b == b' ').count();
        let w = self.get_string_width(txt) + self.word_spacing * spaces as f64;
        format!(
            "{:.2} {:.2} {:.2} {:.2} re f",
            x * self.scale,
            (self.height - (y - up as f64 / 1000.0 * self.font_size)) * self.scale,
            w * self.scale,
            -(ut as f64) / 1000.0 * self.font_size_pt
        )
    }

    // ----- links -----------------------------------------------------

    /// Allocate an internal link destination; point it somewhere with
    /// [`set_link`](Document::set_link).
    pub fn add_link(&mut self) -> LinkId {
        self.links.push((0, 0.0));
        LinkId(self.links.len() - 1)
    }

    /// Set the destination of an internal link. None falls back to the
    /// current y position / current page.
    pub fn set_link(&mut self, link: LinkId, y: Option<f64>, page: Option<usize>) {
        let y = y.unwrap_or(self.y);
        let page = page.unwrap_or_else(|| self.page_no());
        if let Some(slot) = self.links.get_mut(link.0) {
            *slot = (page, y);
        }
    }

    /// Put a link rectangle on the current page.
    pub fn link(&mut self, x: f64, y: f64, w: f64, h: f64, target: LinkTarget) -> Result<()> {
        let k = self.scale;
        let rect = PageLink {
            x: x * k,
            y: self.height_pt - y * k,
            w: w * k,
            h: h * k,
            target,
            obj: 0,
        };
        let page = self.pages.last_mut().ok_or(Error::NoPage)?;
        page.links.push(rect);
        Ok(())
    }

    // ----- text ------------------------------------------------------

    /// Print a string at an exact position, without cursor movement.
    pub fn text(&mut self, x: f64, y: f64, txt: &str) -> Result<()> {
        if self.current_font.is_none() {
            return Err(Error::NoFont);
        }
        let k = self.scale;
        let mut s = format!(
            "BT {:.2} {:.2} Td ({}) Tj ET",
            x * k,
            (self.height - y) * k,
            escape_str(txt)
        );
        if self.underline && !txt.is_empty() {
            s.push(' ');
            s.push_str(&self.make_underline(x, y, txt));
        }
        if self.color_flag {
            s = format!("q {} {} Q", self.text_color, s);
        }
        self.write_out(&s)
    }

    /// The current text state as a [`TextStyle`], used as the merge
    /// default by [`write_text`](Document::write_text).
    pub fn default_text_style(&self) -> TextStyle {
        TextStyle {
            color: Some(self.text_color.clone()),
            size: Some(self.font_size_pt),
            underline: Some(self.underline),
        }
    }

    /// Print a string at an exact position with per-call style
    /// overrides, resolved against the current state.
    pub fn write_text(
        &mut self,
        text: &str,
        x: f64,
        y: f64,
        style: Option<TextStyle>,
    ) -> Result<()> {
        if self.current_font.is_none() {
            return Err(Error::NoFont);
        }
        let default = self.default_text_style();
        let style = match style {
            Some(s) => s.merge(&default),
            None => default,
        };
        if let Some(size) = style.size {
            self.set_font_size(size)?;
        }
        let k = self.scale;
        let mut s = format!(
            "BT {:.2} {:.2} Td ({}) Tj ET",
            x * k,
            (self.height - y) * k,
            escape_str(text)
        );
        if style.underline == Some(true) && !text.is_empty() {
            s.push(' ');
            s.push_str(&self.make_underline(x, y, text));
        }
        let color = style.color.unwrap_or_else(|| self.text_color.clone());
        let s = format!("q {} {} Q", color, s);
        self.write_out(&s)
    }

    // ----- cell layout -----------------------------------------------

    /// Draw one cell: an optional fill/border rectangle with a single
    /// line of text, then advance the cursor per `ln`.
    ///
    /// Width 0 extends to the right margin. If the cell would cross the
    /// page-break trigger (outside header/footer, auto-break on), a new
    /// page is started first, preserving the horizontal position and any
    /// active word spacing. Height is the only break criterion.
    #[allow(clippy::too_many_arguments)]
    pub fn cell(
        &mut self,
        w: f64,
        h: f64,
        txt: &str,
        border: Border,
        ln: CellFlow,
        align: Align,
        fill: bool,
        link: Option<LinkTarget>,
    ) -> Result<()> {
        let k = self.scale;
        if self.y + h > self.page_break_trigger
            && !self.in_header
            && !self.in_footer
            && self.accept_page_break()
        {
            // Automatic page break
            let x = self.x;
            let ws = self.word_spacing;
            if ws > 0.0 {
                self.word_spacing = 0.0;
                self.write_out("0 Tw")?;
            }
            self.add_page(
                Some(self.current_orientation),
                Some(PageSize::Custom(self.current_size.0, self.current_size.1)),
                self.current_rotation,
            )?;
            self.x = x;
            if ws > 0.0 {
                self.word_spacing = ws;
                let op = format!("{:.3} Tw", ws * k);
                self.write_out(&op)?;
            }
        }
        let w = if w == 0.0 { self.width - self.right_margin - self.x } else { w };
        let mut s = String::new();
        if fill || border == Border::Frame {
            let op = if fill {
                if border == Border::Frame {
                    "B"
                } else {
                    "f"
                }
            } else {
                "S"
            };
            s.push_str(&format!(
                "{:.2} {:.2} {:.2} {:.2} re {} ",
                self.x * k,
                (self.height - self.y) * k,
                w * k,
                -h * k,
                op
            ));
        }
        if let Border::Edges(edges) = border {
            let x = self.x;
            let y = self.y;
            if edges.contains(Edges::LEFT) {
                s.push_str(&format!(
                    "{:.2} {:.2} m {:.2} {:.2} l S ",
                    x * k,
                    (self.height - y) * k,
                    x * k,
                    (self.height - (y + h)) * k
                ));
            }
            if edges.contains(Edges::TOP) {
                s.push_str(&format!(
                    "{:.2} {:.2} m {:.2} {:.2} l S ",
                    x * k,
                    (self.height - y) * k,
                    (x + w) * k,
                    (self.height - y) * k
                ));
            }
            if edges.contains(Edges::RIGHT) {
                s.push_str(&format!(
                    "{:.2} {:.2} m {:.2} {:.2} l S ",
                    (x + w) * k,
                    (self.height - y) * k,
                    (x + w) * k,
                    (self.height - (y + h)) * k
                ));
            }
            if edges.contains(Edges::BOTTOM) {
                s.push_str(&format!(
                    "{:.2} {:.2} m {:.2} {:.2} l S ",
                    x * k,
                    (self.height - (y + h)) * k,
                    (x + w) * k,
                    (self.height - (y + h)) * k
                ));
            }
        }
        if !txt.is_empty() {
            if self.current_font.is_none() {
                return Err(Error::NoFont);
            }
            let dx = match align {
                Align::Right => w - self.cell_margin - self.get_string_width(txt),
                Align::Center => (w - self.get_string_width(txt)) / 2.0,
                _ => self.cell_margin,
            };
            if self.color_flag {
                s.push_str(&format!("q {} ", self.text_color));
            }
            let baseline = self.y + 0.5 * h + 0.3 * self.font_size;
            s.push_str(&format!(
                "BT {:.2} {:.2} Td ({}) Tj ET",
                (self.x + dx) * k,
                (self.height - baseline) * k,
                escape_str(txt)
            ));
            if self.underline {
                s.push(' ');
                s.push_str(&self.make_underline(self.x + dx, baseline, txt));
            }
            if self.color_flag {
                s.push_str(" Q");
            }
            if let Some(target) = link {
                self.link(
                    self.x + dx,
                    self.y + 0.5 * h - 0.5 * self.font_size,
                    self.get_string_width(txt),
                    self.font_size,
                    target,
                )?;
            }
        }
        if !s.is_empty() {
            self.write_out(&s)?;
        }
        self.last_height = h;
        match ln {
            CellFlow::Right => self.x += w,
            CellFlow::NextLine => {
                self.y += h;
                self.x = self.left_margin;
            },
            CellFlow::Below => self.y += h,
        }
        Ok(())
    }

    /// Print text as a wrapped block of cells of width `w` and line
    /// height `h`.
    ///
    /// Explicit `\n` breaks are honored; otherwise lines break at the
    /// last space that fits, or mid-word when none does. Justification
    /// spreads the shortfall over the inter-word gaps of the line. With
    /// a border, top/bottom edges apply only to the first/last line.
    /// The cursor ends at the left margin under the block.
    pub fn multi_cell(
        &mut self,
        w: f64,
        h: f64,
        txt: &str,
        border: Border,
        align: Align,
        fill: bool,
    ) -> Result<()> {
        let key = self.current_font.clone().ok_or(Error::NoFont)?;
        let widths = self.fonts.get(&key).map(|f| f.def.widths).ok_or(Error::NoFont)?;
        let w = if w == 0.0 { self.width - self.right_margin - self.x } else { w };
        let wmax = (w - 2.0 * self.cell_margin) * 1000.0 / self.font_size;
        let s: Vec<u8> = txt.bytes().filter(|&c| c != b'\r').collect();
        let mut nb = s.len();
        if nb > 0 && s[nb - 1] == b'\n' {
            nb -= 1;
        }

        // Border decomposition: sides run the whole block, top only on
        // the first line, bottom only on the last.
        let (mut b, b2, has_bottom) = match border {
            Border::None => (Border::None, Edges::empty(), false),
            Border::Frame => (
                Border::Edges(Edges::LEFT | Edges::RIGHT | Edges::TOP),
                Edges::LEFT | Edges::RIGHT,
                true,
            ),
            Border::Edges(edges) => {
                let sides = edges & (Edges::LEFT | Edges::RIGHT);
                let first = if edges.contains(Edges::TOP) { sides | Edges::TOP } else { sides };
                (Border::Edges(first), sides, edges.contains(Edges::BOTTOM))
            },
        };
        let middle_border = |b2: Edges| {
            if b2.is_empty() {
                Border::None
            } else {
                Border::Edges(b2)
            }
        };

        let mut sep: Option<usize> = None;
        let mut i = 0;
        let mut j = 0;
        let mut l: u32 = 0;
        let mut ls: u32 = 0;
        let mut ns: usize = 0;
        let mut nl = 1;
        while i < nb {
            let c = s[i];
            if c == b'\n' {
                // Explicit line break
                if self.word_spacing > 0.0 {
                    self.word_spacing = 0.0;
                    self.write_out("0 Tw")?;
                }
                let line = String::from_utf8_lossy(&s[j..i]).into_owned();
                self.cell(w, h, &line, b, CellFlow::Below, align, fill, None)?;
                i += 1;
                sep = None;
                j = i;
                l = 0;
                ns = 0;
                nl += 1;
                if border != Border::None && nl == 2 {
                    b = middle_border(b2);
                }
                continue;
            }
            if c == b' ' {
                sep = Some(i);
                ls = l;
                ns += 1;
            }
            l += widths[c as usize] as u32;
            if (l as f64) > wmax {
                // Automatic line break
                match sep {
                    None => {
                        if i == j {
                            i += 1;
                        }
                        if self.word_spacing > 0.0 {
                            self.word_spacing = 0.0;
                            self.write_out("0 Tw")?;
                        }
                        let line = String::from_utf8_lossy(&s[j..i]).into_owned();
                        self.cell(w, h, &line, b, CellFlow::Below, align, fill, None)?;
                    },
                    Some(sep_i) => {
                        if align == Align::Justify {
                            self.word_spacing = if ns > 1 {
                                (wmax - ls as f64) / 1000.0 * self.font_size / (ns - 1) as f64
                            } else {
                                0.0
                            };
                            let op = format!("{:.3} Tw", self.word_spacing * self.scale);
                            self.write_out(&op)?;
                        }
                        let line = String::from_utf8_lossy(&s[j..sep_i]).into_owned();
                        self.cell(w, h, &line, b, CellFlow::Below, align, fill, None)?;
                        i = sep_i + 1;
                    },
                }
                sep = None;
                j = i;
                l = 0;
                ns = 0;
                nl += 1;
                if border != Border::None && nl == 2 {
                    b = middle_border(b2);
                }
            } else {
                i += 1;
            }
        }
        // Last chunk
        if self.word_spacing > 0.0 {
            self.word_spacing = 0.0;
            self.write_out("0 Tw")?;
        }
        if has_bottom {
            b = match b {
                Border::Edges(edges) => Border::Edges(edges | Edges::BOTTOM),
                _ => Border::Edges(Edges::BOTTOM),
            };
        }
        let line = String::from_utf8_lossy(&s[j..i]).into_owned();
        self.cell(w, h, &line, b, CellFlow::Below, align, fill, None)?;
        self.x = self.left_margin;
        Ok(())
    }

    /// Print flowing text: it fills the remaining width of the current
    /// line and continues from the left margin on subsequent lines. The
    /// cursor ends just after the last word.
    ///
    /// When a single word does not fit on a line that is not at the left
    /// margin, the cursor moves to the next line instead of breaking the
    /// word; on an empty line the word is force-broken.
    pub fn write(&mut self, h: f64, txt: &str, link: Option<LinkTarget>) -> Result<()> {
        let key = self.current_font.clone().ok_or(Error::NoFont)?;
        let widths = self.fonts.get(&key).map(|f| f.def.widths).ok_or(Error::NoFont)?;
        let mut w = self.width - self.right_margin - self.x;
        let mut wmax = (w - 2.0 * self.cell_margin) * 1000.0 / self.font_size;
        let s: Vec<u8> = txt.bytes().filter(|&c| c != b'\r').collect();
        let nb = s.len();
        let mut sep: Option<usize> = None;
        let mut i = 0;
        let mut j = 0;
        let mut l: u32 = 0;
        let mut nl = 1;
        while i < nb {
            let c = s[i];
            if c == b'\n' {
                // Explicit line break
                let line = String::from_utf8_lossy(&s[j..i]).into_owned();
                self.cell(
                    w,
                    h,
                    &line,
                    Border::None,
                    CellFlow::Below,
                    Align::Left,
                    false,
                    link.clone(),
                )?;
                i += 1;
                sep = None;
                j = i;
                l = 0;
                if nl == 1 {
                    self.x = self.left_margin;
                    w = self.width - self.right_margin - self.x;
                    wmax = (w - 2.0 * self.cell_margin) * 1000.0 / self.font_size;
                }
                nl += 1;
                continue;
            }
            if c == b' ' {
                sep = Some(i);
            }
            l += widths[c as usize] as u32;
            if (l as f64) > wmax {
                // Automatic line break
                match sep {
                    None => {
                        if self.x > self.left_margin {
                            // Move to next line instead of splitting the word
                            self.x = self.left_margin;
                            self.y += h;
                            w = self.width - self.right_margin - self.x;
                            wmax = (w - 2.0 * self.cell_margin) * 1000.0 / self.font_size;
                            i += 1;
                            nl += 1;
                            continue;
                        }
                        if i == j {
                            i += 1;
                        }
                        let line = String::from_utf8_lossy(&s[j..i]).into_owned();
                        self.cell(
                            w,
                            h,
                            &line,
                            Border::None,
                            CellFlow::Below,
                            Align::Left,
                            false,
                            link.clone(),
                        )?;
                    },
                    Some(sep_i) => {
                        let line = String::from_utf8_lossy(&s[j..sep_i]).into_owned();
                        self.cell(
                            w,
                            h,
                            &line,
                            Border::None,
                            CellFlow::Below,
                            Align::Left,
                            false,
                            link.clone(),
                        )?;
                        i = sep_i + 1;
                    },
                }
                sep = None;
                j = i;
                l = 0;
                if nl == 1 {
                    self.x = self.left_margin;
                    w = self.width - self.right_margin - self.x;
                    wmax = (w - 2.0 * self.cell_margin) * 1000.0 / self.font_size;
                }
                nl += 1;
            } else {
                i += 1;
            }
        }
        // Last chunk advances the cursor horizontally
        if i != j {
            let line = String::from_utf8_lossy(&s[j..]).into_owned();
            self.cell(
                l as f64 / 1000.0 * self.font_size,
                h,
                &line,
                Border::None,
                CellFlow::Right,
                Align::Left,
                false,
                link,
            )?;
        }
        Ok(())
    }

    // ----- images ----------------------------------------------------

    /// Place an image from a file, decoding and caching it on first use.
    ///
    /// The format is taken from `kind` or inferred from the extension.
    /// None coordinates mean "at the cursor"; a missing `y` also flows
    /// the image (auto page break, cursor advances below it). Negative
    /// w/h are interpreted as a DPI; both zero places at 96 dpi; one
    /// zero derives from the aspect ratio.
    #[allow(clippy::too_many_arguments)]
    pub fn image(
        &mut self,
        file: impl AsRef<Path>,
        x: Option<f64>,
        y: Option<f64>,
        w: f64,
        h: f64,
        kind: Option<ImageKind>,
        link: Option<LinkTarget>,
    ) -> Result<()> {
        let path = file.as_ref();
        let name = path.to_string_lossy().into_owned();
        if name.is_empty() {
            return Err(Error::EmptyImageName);
        }
        if !self.images.contains_key(&name) {
            let kind = match kind {
                Some(kind) => kind,
                None => {
                    let ext = path
                        .extension()
                        .and_then(|e| e.to_str())
                        .ok_or_else(|| Error::UnknownImageType(name.clone()))?;
                    ImageKind::from_extension(ext)
                        .ok_or_else(|| Error::UnsupportedImageType(ext.to_string()))?
                },
            };
            let data = std::fs::read(path)?;
            self.register_image(name.clone(), &data, kind)?;
        }
        self.place_image(&name, x, y, w, h, link)
    }

    /// Place an image from in-memory bytes, cached under `name`.
    #[allow(clippy::too_many_arguments)]
    pub fn image_data(
        &mut self,
        name: &str,
        data: &[u8],
        kind: ImageKind,
        x: Option<f64>,
        y: Option<f64>,
        w: f64,
        h: f64,
        link: Option<LinkTarget>,
    ) -> Result<()> {
        if name.is_empty() {
            return Err(Error::EmptyImageName);
        }
        if !self.images.contains_key(name) {
            self.register_image(name.to_string(), data, kind)?;
        }
        self.place_image(name, x, y, w, h, link)
    }

    fn register_image(&mut self, name: String, data: &[u8], kind: ImageKind) -> Result<()> {
        let mut info = raster::decode(data, kind)?;
        if info.soft_mask.is_some() {
            // Soft masks need PDF 1.4 transparency
            self.with_alpha = true;
            if self.pdf_version.as_str() < "1.4" {
                self.pdf_version = "1.4".to_string();
            }
        }
        info.index = self.images.len() + 1;
        log::debug!("image {} registered as /I{}", name, info.index);
        self.images.insert(name, info);
        Ok(())
    }

    fn place_image(
        &mut self,
        name: &str,
        x: Option<f64>,
        y: Option<f64>,
        w: f64,
        h: f64,
        link: Option<LinkTarget>,
    ) -> Result<()> {
        let (iw, ih, index) = match self.images.get(name) {
            Some(info) => (info.width as f64, info.height as f64, info.index),
            None => return Err(Error::UnknownImageType(name.to_string())),
        };
        let (mut w, mut h) = (w, h);
        if w == 0.0 && h == 0.0 {
            // Place at 96 dpi
            w = -96.0;
            h = -96.0;
        }
        if w < 0.0 {
            w = -iw * 72.0 / w / self.scale;
        }
        if h < 0.0 {
            h = -ih * 72.0 / h / self.scale;
        }
        if w == 0.0 {
            w = h * iw / ih;
        }
        if h == 0.0 {
            h = w * ih / iw;
        }

        // Flowing mode
        let y = match y {
            Some(y) => y,
            None => {
                if self.y + h > self.page_break_trigger
                    && !self.in_header
                    && !self.in_footer
                    && self.accept_page_break()
                {
                    let x2 = self.x;
                    self.add_page(
                        Some(self.current_orientation),
                        Some(PageSize::Custom(self.current_size.0, self.current_size.1)),
                        self.current_rotation,
                    )?;
                    self.x = x2;
                }
                let y = self.y;
                self.y += h;
                y
            },
        };
        let x = x.unwrap_or(self.x);

        let k = self.scale;
        let op = format!(
            "q {:.2} 0 0 {:.2} {:.2} {:.2} cm /I{} Do Q",
            w * k,
            h * k,
            x * k,
            (self.height - (y + h)) * k,
            index
        );
        self.write_out(&op)?;
        if let Some(target) = link {
            self.link(x, y, w, h, target)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::new(Orientation::Portrait, Unit::Mm, PageSize::A4).unwrap()
    }

    #[test]
    fn test_new_opens_first_page_with_default_font() {
        let d = doc();
        assert_eq!(d.page_no(), 1);
        assert_eq!(d.font_family, "helvetica");
        assert_eq!(d.font_size_pt, 12.0);
        assert_eq!(d.state, State::BeginPage);
    }

    #[test]
    fn test_negative_coordinates_measure_from_far_edge() {
        let mut d = doc();
        d.set_x(-10.0);
        assert!((d.get_x() - (d.page_width() - 10.0)).abs() < 1e-9);
        d.set_y(-20.0, true);
        assert!((d.get_y() - (d.page_height() - 20.0)).abs() < 1e-9);
        assert_eq!(d.get_x(), d.left_margin);
    }

    #[test]
    fn test_set_font_is_idempotent() {
        let mut d = doc();
        d.set_font("helvetica", "B", 14.0).unwrap();
        let len = d.pages[0].content.len();
        d.set_font("helvetica", "B", 14.0).unwrap();
        assert_eq!(d.pages[0].content.len(), len);
    }

    #[test]
    fn test_arial_aliases_helvetica() {
        let mut d = doc();
        d.set_font("Arial", "b", 10.0).unwrap();
        assert_eq!(d.font_family, "helvetica");
        assert_eq!(d.font_style, "B");
        assert!(d.fonts.contains_key("helveticaB"));
    }

    #[test]
    fn test_symbol_drops_style() {
        let mut d = doc();
        d.set_font("symbol", "B", 12.0).unwrap();
        assert!(d.fonts.contains_key("symbol"));
        assert_eq!(d.font_style, "");
    }

    #[test]
    fn test_undefined_font_errors() {
        let mut d = doc();
        let err = d.set_font("garamond", "", 12.0).unwrap_err();
        assert!(matches!(err, Error::UndefinedFont { .. }));
    }

    #[test]
    fn test_underline_style_letter_sets_flag() {
        let mut d = doc();
        d.set_font("helvetica", "BU", 12.0).unwrap();
        assert!(d.underline);
        assert_eq!(d.font_style, "B");
        d.set_font("helvetica", "", 12.0).unwrap();
        assert!(!d.underline);
    }

    #[test]
    fn test_get_string_width_uses_byte_widths() {
        let mut d = Document::new(Orientation::Portrait, Unit::Pt, PageSize::A4).unwrap();
        d.set_font("courier", "", 10.0).unwrap();
        // 5 monospaced glyphs at 600/1000 * 10pt
        assert!((d.get_string_width("hello") - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_rotation_must_be_multiple_of_90() {
        let mut d = doc();
        assert!(matches!(d.add_page(None, None, 45), Err(Error::BadRotation(45))));
        d.add_page(None, None, 90).unwrap();
        assert_eq!(d.pages.last().unwrap().rotation, Some(90));
    }

    #[test]
    fn test_non_default_page_size_recorded_per_page() {
        let mut d = doc();
        assert!(d.pages[0].size_pt.is_none());
        d.add_page(Some(Orientation::Landscape), None, 0).unwrap();
        let (w_pt, h_pt) = d.pages[1].size_pt.unwrap();
        assert!(w_pt > h_pt);
    }

    #[test]
    fn test_drawing_after_close_errors() {
        let mut d = doc();
        d.close().unwrap();
        assert!(matches!(
            d.cell(10.0, 10.0, "x", Border::None, CellFlow::Right, Align::Left, false, None),
            Err(Error::DocumentClosed)
        ));
        assert!(matches!(d.add_page(None, None, 0), Err(Error::DocumentClosed)));
    }

    #[test]
    fn test_cell_fill_and_frame_operators() {
        let mut d = doc();
        d.cell(40.0, 10.0, "", Border::Frame, CellFlow::Right, Align::Left, true, None).unwrap();
        assert!(d.pages[0].content.contains("re B"));
        d.cell(40.0, 10.0, "", Border::None, CellFlow::Right, Align::Left, true, None).unwrap();
        assert!(d.pages[0].content.contains("re f"));
    }

    #[test]
    fn test_cell_advances_cursor() {
        let mut d = doc();
        let x0 = d.get_x();
        let y0 = d.get_y();
        d.cell(40.0, 10.0, "", Border::None, CellFlow::Right, Align::Left, false, None).unwrap();
        assert_eq!(d.get_x(), x0 + 40.0);
        d.cell(40.0, 10.0, "", Border::None, CellFlow::NextLine, Align::Left, false, None)
            .unwrap();
        assert_eq!(d.get_x(), d.left_margin);
        assert_eq!(d.get_y(), y0 + 10.0);
    }

    #[test]
    fn test_ln_uses_last_cell_height() {
        let mut d = doc();
        d.cell(40.0, 7.5, "", Border::None, CellFlow::Right, Align::Left, false, None).unwrap();
        let y = d.get_y();
        d.ln(None);
        assert_eq!(d.get_y(), y + 7.5);
        d.ln(Some(3.0));
        assert_eq!(d.get_y(), y + 10.5);
    }

    #[test]
    fn test_text_color_deferred_until_drawn() {
        let mut d = doc();
        d.set_text_color(Color::Rgb(255, 0, 0));
        assert!(!d.pages[0].content.contains("1.000 0.000 0.000 rg"));
        d.cell(40.0, 10.0, "x", Border::None, CellFlow::Right, Align::Left, false, None).unwrap();
        assert!(d.pages[0].content.contains("q 1.000 0.000 0.000 rg"));
    }
}
