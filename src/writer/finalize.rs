//! Document finalization: walks the frozen pages, the font and image
//! caches and the shared resources, and emits the complete PDF byte
//! sequence in a fixed order: header, page objects (dict + content
//! stream + annotations), pages root, fonts, images, resource
//! dictionary, info, catalog, cross-reference table and trailer.
//!
//! Object numbers 1 and 2 are reserved for the pages root and the
//! resource dictionary so every page can reference them before they are
//! written.

use crate::document::{Document, State};
use crate::error::{Error, Result};
use crate::fonts::{self, FontKind};
use crate::image::ColorSpace;
use crate::object::Object;
use crate::types::Orientation;
use crate::writer::ObjectSerializer;

impl Document {
    pub(crate) fn end_doc(&mut self) -> Result<()> {
        log::debug!(
            "serializing document: {} page(s), {} font(s), {} image(s)",
            self.pages.len(),
            self.fonts.len(),
            self.images.len()
        );
        self.out.put_line(format!("%PDF-{}", self.pdf_version));
        self.put_pages()?;
        self.put_resources()?;

        let serializer = ObjectSerializer::new();

        // Info
        let info_obj = self.out.begin_object(None);
        let info = self.info_dict();
        self.out.put_line(serializer.serialize(&info));
        self.out.end_object();

        // Catalog
        let root_obj = self.out.begin_object(None);
        let catalog = self.catalog_dict();
        self.out.put_line(serializer.serialize(&catalog));
        self.out.end_object();

        // Cross-reference table
        let count = self.out.object_count();
        let xref_offset = self.out.offset();
        self.out.put_line("xref");
        self.out.put_line(format!("0 {}", count + 1));
        self.out.put_line("0000000000 65535 f ");
        for n in 1..=count {
            let offset = self.out.offset_of(n).unwrap_or(0);
            self.out.put_line(format!("{:010} 00000 n ", offset));
        }

        // Trailer
        self.out.put_line("trailer");
        self.out.put_line("<<");
        self.out.put_line(format!("/Size {}", count + 1));
        self.out.put_line(format!("/Root {} 0 R", root_obj));
        self.out.put_line(format!("/Info {} 0 R", info_obj));
        self.out.put_line(">>");
        self.out.put_line("startxref");
        self.out.put_line(xref_offset.to_string());
        self.out.put_line("%%EOF");
        self.state = State::EndDocument;
        Ok(())
    }

    fn put_pages(&mut self) -> Result<()> {
        let nb = self.pages.len();
        // Pre-assign object numbers so pages can reference their content
        // stream and annotations, and links can reference target pages.
        let mut n = self.out.object_count();
        for page in &mut self.pages {
            n += 1;
            page.obj = n;
            n += 1; // content stream
            for link in &mut page.links {
                n += 1;
                link.obj = n;
            }
        }
        for i in 0..nb {
            self.put_page(i)?;
        }
        // Pages root
        self.out.begin_object(Some(1));
        self.out.put_line("<</Type /Pages");
        let mut kids = String::from("/Kids [");
        for page in &self.pages {
            kids.push_str(&format!("{} 0 R ", page.obj));
        }
        kids.push(']');
        self.out.put_line(kids);
        self.out.put_line(format!("/Count {}", nb));
        let (w, h) = match self.default_orientation {
            Orientation::Portrait => self.default_size,
            Orientation::Landscape => (self.default_size.1, self.default_size.0),
        };
        self.out.put_line(format!(
            "/MediaBox [0 0 {:.2} {:.2}]",
            w * self.scale,
            h * self.scale
        ));
        self.out.put_line(">>");
        self.out.end_object();
        Ok(())
    }

    fn put_page(&mut self, i: usize) -> Result<()> {
        let allocated = self.out.begin_object(None);
        debug_assert_eq!(allocated, self.pages[i].obj);
        self.out.put_line("<</Type /Page");
        self.out.put_line("/Parent 1 0 R");
        if let Some((w, h)) = self.pages[i].size_pt {
            self.out.put_line(format!("/MediaBox [0 0 {:.2} {:.2}]", w, h));
        }
        if let Some(rotation) = self.pages[i].rotation {
            self.out.put_line(format!("/Rotate {}", rotation));
        }
        self.out.put_line("/Resources 2 0 R");
        if !self.pages[i].links.is_empty() {
            let mut annots = String::from("/Annots [");
            for link in &self.pages[i].links {
                annots.push_str(&format!("{} 0 R ", link.obj));
            }
            annots.push(']');
            self.out.put_line(annots);
        }
        if self.with_alpha {
            self.out.put_line("/Group <</Type /Group /S /Transparency /CS /DeviceRGB>>");
        }
        self.out.put_line(format!("/Contents {} 0 R>>", self.out.peek_next()));
        self.out.end_object();

        // Page content, with the total-page-count alias substituted
        let mut content = std::mem::take(&mut self.pages[i].content);
        if let Some(alias) = &self.alias_nb_pages {
            content = content.replace(alias, &self.pages.len().to_string());
        }
        self.out.put_stream_object(content.as_bytes())?;

        // Link annotations
        let annots: Vec<Object> = self.pages[i]
            .links
            .iter()
            .map(|link| self.annotation_dict(link))
            .collect();
        for annot in annots {
            self.out.begin_object(None);
            self.out.put_line(ObjectSerializer::new().serialize(&annot));
            self.out.end_object();
        }
        Ok(())
    }

    fn annotation_dict(&self, link: &crate::document::PageLink) -> Object {
        let mut entries = vec![
            ("Type".to_string(), Object::name("Annot")),
            ("Subtype".to_string(), Object::name("Link")),
            (
                "Rect".to_string(),
                Object::Array(vec![
                    Object::Real(link.x),
                    Object::Real(link.y),
                    Object::Real(link.x + link.w),
                    Object::Real(link.y - link.h),
                ]),
            ),
            (
                "Border".to_string(),
                Object::Array(vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)]),
            ),
        ];
        match &link.target {
            crate::types::LinkTarget::Uri(uri) => {
                entries.push((
                    "A".to_string(),
                    Object::dict(vec![("S", Object::name("URI")), ("URI", Object::string(uri))]),
                ));
            },
            crate::types::LinkTarget::Internal(id) => {
                let (page_no, y) = self.links.get(id.0).copied().unwrap_or((1, 0.0));
                let index = page_no.max(1) - 1;
                let target = self.pages.get(index).or_else(|| self.pages.first());
                let target_obj = target.map(|p| p.obj).unwrap_or(0);
                // The Y flip uses the target page's own media-box height
                let target_h = match target.and_then(|p| p.size_pt) {
                    Some((_, h)) => h,
                    None => match self.default_orientation {
                        Orientation::Portrait => self.default_size.1 * self.scale,
                        Orientation::Landscape => self.default_size.0 * self.scale,
                    },
                };
                entries.push((
                    "Dest".to_string(),
                    Object::Array(vec![
                        Object::reference(target_obj),
                        Object::name("XYZ"),
                        Object::Integer(0),
                        Object::Real(target_h - y * self.scale),
                        Object::Null,
                    ]),
                ));
            },
        }
        Object::Dictionary(entries)
    }

    fn put_resources(&mut self) -> Result<()> {
        self.put_fonts()?;
        self.put_images()?;
        // Shared resource dictionary
        self.out.begin_object(Some(2));
        self.out.put_line("<<");
        self.out.put_line("/ProcSet [/PDF /Text /ImageB /ImageC /ImageI]");
        self.out.put_line("/Font <<");
        let font_refs: Vec<(usize, u32)> =
            self.fonts.values().map(|f| (f.index, f.obj)).collect();
        for (index, obj) in font_refs {
            self.out.put_line(format!("/F{} {} 0 R", index, obj));
        }
        self.out.put_line(">>");
        self.out.put_line("/XObject <<");
        let image_refs: Vec<(usize, u32)> =
            self.images.values().map(|img| (img.index, img.obj)).collect();
        for (index, obj) in image_refs {
            self.out.put_line(format!("/I{} {} 0 R", index, obj));
        }
        self.out.put_line(">>");
        self.out.put_line(">>");
        self.out.end_object();
        Ok(())
    }

    fn put_fonts(&mut self) -> Result<()> {
        // Embedded font programs first, so font descriptors can
        // reference them.
        for i in 0..self.fonts.len() {
            let program = match self.fonts.get_index_mut(i) {
                Some((_, font)) => match font.def.program.take() {
                    Some(program) => program,
                    None => continue,
                },
                None => continue,
            };
            let data = if !program.compressed && program.length2.is_some() {
                // Type1: strip the two 6-byte segment headers
                let l1 = program.length1;
                let l2 = program.length2.unwrap_or(0);
                if program.data.len() < 12 + l1 + l2 {
                    return Err(Error::Font(
                        "font program shorter than declared segment lengths".to_string(),
                    ));
                }
                let mut stripped = Vec::with_capacity(l1 + l2);
                stripped.extend_from_slice(&program.data[6..6 + l1]);
                stripped.extend_from_slice(&program.data[12 + l1..12 + l1 + l2]);
                stripped
            } else {
                program.data
            };
            let n = self.out.begin_object(None);
            self.out.put_line(format!("<</Length {}", data.len()));
            if program.compressed {
                self.out.put_line("/Filter /FlateDecode");
            }
            self.out.put_line(format!("/Length1 {}", program.length1));
            if let Some(l2) = program.length2 {
                self.out.put_line(format!("/Length2 {} /Length3 0", l2));
            }
            self.out.put_line(">>");
            self.out.put_stream(&data);
            self.out.end_object();
            if let Some((_, font)) = self.fonts.get_index_mut(i) {
                font.file_obj = n;
            }
        }

        for i in 0..self.fonts.len() {
            let (kind, name, subsetted, widths, descriptor, diff, enc, uv, file_obj) =
                match self.fonts.get_index(i) {
                    Some((_, font)) => (
                        font.def.kind,
                        font.def.name.clone(),
                        font.def.subsetted,
                        font.def.widths,
                        font.def.descriptor.clone(),
                        font.def.diff.clone(),
                        font.def.enc.clone(),
                        font.def.uv.clone(),
                        font.file_obj,
                    ),
                    None => continue,
                };

            // Encoding differences, shared by encoding name
            let cmap_key = enc.clone().unwrap_or_else(|| name.clone());
            if let Some(diff) = &diff {
                if !self.encodings.contains_key(&cmap_key) {
                    let n = self.out.begin_object(None);
                    self.out.put_line(format!(
                        "<</Type /Encoding /BaseEncoding /WinAnsiEncoding /Differences [{}]>>",
                        diff
                    ));
                    self.out.end_object();
                    self.encodings.insert(cmap_key.clone(), n);
                }
            }

            // ToUnicode CMap, shared by encoding (or font) name
            if let Some(uv) = &uv {
                if !self.cmaps.contains_key(&cmap_key) {
                    let cmap = fonts::to_unicode_cmap(uv);
                    let n = self.out.put_stream_object(cmap.as_bytes())?;
                    self.cmaps.insert(cmap_key.clone(), n);
                }
            }

            let name = if subsetted { format!("AAAAAA+{}", name) } else { name };
            let font_obj = self.out.peek_next();
            if let Some((_, font)) = self.fonts.get_index_mut(i) {
                font.obj = font_obj;
            }
            match kind {
                FontKind::Core => {
                    self.out.begin_object(None);
                    self.out.put_line("<</Type /Font");
                    self.out.put_line(format!("/BaseFont /{}", name));
                    self.out.put_line("/Subtype /Type1");
                    if name != "Symbol" && name != "ZapfDingbats" {
                        self.out.put_line("/Encoding /WinAnsiEncoding");
                    }
                    if uv.is_some() {
                        if let Some(cmap_obj) = self.cmaps.get(&cmap_key) {
                            self.out.put_line(format!("/ToUnicode {} 0 R", cmap_obj));
                        }
                    }
                    self.out.put_line(">>");
                    self.out.end_object();
                },
                FontKind::Type1 | FontKind::TrueType => {
                    self.out.begin_object(None);
                    self.out.put_line("<</Type /Font");
                    self.out.put_line(format!("/BaseFont /{}", name));
                    self.out.put_line(format!("/Subtype /{}", kind.subtype()));
                    self.out.put_line("/FirstChar 32 /LastChar 255");
                    self.out.put_line(format!("/Widths {} 0 R", font_obj + 1));
                    self.out.put_line(format!("/FontDescriptor {} 0 R", font_obj + 2));
                    if diff.is_some() {
                        if let Some(enc_obj) = self.encodings.get(&cmap_key) {
                            self.out.put_line(format!("/Encoding {} 0 R", enc_obj));
                        }
                    } else {
                        self.out.put_line("/Encoding /WinAnsiEncoding");
                    }
                    if uv.is_some() {
                        if let Some(cmap_obj) = self.cmaps.get(&cmap_key) {
                            self.out.put_line(format!("/ToUnicode {} 0 R", cmap_obj));
                        }
                    }
                    self.out.put_line(">>");
                    self.out.end_object();
                    // Character widths for bytes 32..=255
                    self.out.begin_object(None);
                    let mut s = String::from("[");
                    for c in 32..=255usize {
                        s.push_str(&format!("{} ", widths[c]));
                    }
                    s.push(']');
                    self.out.put_line(s);
                    self.out.end_object();
                    // Descriptor
                    self.out.begin_object(None);
                    let mut s = format!("<</Type /FontDescriptor /FontName /{}", name);
                    for (key, value) in &descriptor {
                        s.push_str(&format!(" /{} {}", key, value));
                    }
                    if file_obj != 0 {
                        let suffix = if kind == FontKind::Type1 { "" } else { "2" };
                        s.push_str(&format!(" /FontFile{} {} 0 R", suffix, file_obj));
                    }
                    s.push_str(">>");
                    self.out.put_line(s);
                    self.out.end_object();
                },
            }
        }
        Ok(())
    }

    fn put_images(&mut self) -> Result<()> {
        for i in 0..self.images.len() {
            self.put_image(i)?;
        }
        Ok(())
    }

    fn put_image(&mut self, i: usize) -> Result<()> {
        let (width, height, color_space, bpc, filter, decode_parms, transparency, data, palette, soft_mask) =
            match self.images.get_index_mut(i) {
                Some((_, info)) => (
                    info.width,
                    info.height,
                    info.color_space,
                    info.bits_per_component,
                    info.filter,
                    info.decode_parms.take(),
                    info.transparency.take(),
                    std::mem::take(&mut info.data),
                    std::mem::take(&mut info.palette),
                    info.soft_mask.take(),
                ),
                None => return Ok(()),
            };

        let n = self.out.begin_object(None);
        if let Some((_, info)) = self.images.get_index_mut(i) {
            info.obj = n;
        }
        self.out.put_line("<</Type /XObject");
        self.out.put_line("/Subtype /Image");
        self.out.put_line(format!("/Width {}", width));
        self.out.put_line(format!("/Height {}", height));
        if color_space == ColorSpace::Indexed {
            // The palette stream is emitted immediately after this image
            self.out.put_line(format!(
                "/ColorSpace [/Indexed /DeviceRGB {} {} 0 R]",
                palette.len() / 3 - 1,
                self.out.peek_next()
            ));
        } else {
            self.out.put_line(format!("/ColorSpace /{}", color_space.pdf_name()));
            if color_space == ColorSpace::DeviceCmyk {
                self.out.put_line("/Decode [1 0 1 0 1 0 1 0]");
            }
        }
        self.out.put_line(format!("/BitsPerComponent {}", bpc));
        if let Some(filter) = filter {
            self.out.put_line(format!("/Filter /{}", filter));
        }
        if let Some(dp) = &decode_parms {
            self.out.put_line(format!("/DecodeParms <<{}>>", dp));
        }
        if let Some(trns) = &transparency {
            let mut mask = String::from("/Mask [");
            for value in trns {
                mask.push_str(&format!("{} {} ", value, value));
            }
            mask.push(']');
            self.out.put_line(mask);
        }
        if soft_mask.is_some() {
            self.out.put_line(format!("/SMask {} 0 R", self.out.peek_next()));
        }
        self.out.put_line(format!("/Length {}>>", data.len()));
        self.out.put_stream(&data);
        self.out.end_object();

        // Soft mask as a second, grayscale image
        if let Some(mask_data) = soft_mask {
            self.out.begin_object(None);
            self.out.put_line("<</Type /XObject");
            self.out.put_line("/Subtype /Image");
            self.out.put_line(format!("/Width {}", width));
            self.out.put_line(format!("/Height {}", height));
            self.out.put_line("/ColorSpace /DeviceGray");
            self.out.put_line("/BitsPerComponent 8");
            if let Some(filter) = filter {
                self.out.put_line(format!("/Filter /{}", filter));
            }
            self.out.put_line(format!(
                "/DecodeParms <</Predictor 15 /Colors 1 /BitsPerComponent 8 /Columns {}>>",
                width
            ));
            self.out.put_line(format!("/Length {}>>", mask_data.len()));
            self.out.put_stream(&mask_data);
            self.out.end_object();
        }

        // Palette stream for indexed color
        if color_space == ColorSpace::Indexed {
            self.out.put_stream_object(&palette)?;
        }
        Ok(())
    }

    fn info_dict(&self) -> Object {
        let mut entries: Vec<(String, Object)> = self
            .metadata
            .iter()
            .map(|(key, value)| (key.clone(), Object::String(value.clone())))
            .collect();
        entries.push((
            "Producer".to_string(),
            Object::String(format!("pdf_quill {}", env!("CARGO_PKG_VERSION"))),
        ));
        entries.push((
            "CreationDate".to_string(),
            Object::String(chrono::Local::now().format("D:%Y%m%d%H%M%S").to_string()),
        ));
        Object::Dictionary(entries)
    }

    fn catalog_dict(&self) -> Object {
        let first_page = self.pages.first().map(|p| p.obj).unwrap_or(0);
        let mut entries = vec![
            ("Type".to_string(), Object::name("Catalog")),
            ("Pages".to_string(), Object::reference(1)),
        ];
        let open_action = match self.zoom_mode {
            crate::types::ZoomMode::FullPage => {
                Some(vec![Object::reference(first_page), Object::name("Fit")])
            },
            crate::types::ZoomMode::FullWidth => Some(vec![
                Object::reference(first_page),
                Object::name("FitH"),
                Object::Null,
            ]),
            crate::types::ZoomMode::Real => Some(vec![
                Object::reference(first_page),
                Object::name("XYZ"),
                Object::Null,
                Object::Null,
                Object::Integer(1),
            ]),
            crate::types::ZoomMode::Percent(zoom) => Some(vec![
                Object::reference(first_page),
                Object::name("XYZ"),
                Object::Null,
                Object::Null,
                Object::Real(zoom / 100.0),
            ]),
            crate::types::ZoomMode::Default => None,
        };
        if let Some(action) = open_action {
            entries.push(("OpenAction".to_string(), Object::Array(action)));
        }
        let layout = match self.layout_mode {
            crate::types::LayoutMode::Single => Some("SinglePage"),
            crate::types::LayoutMode::Continuous => Some("OneColumn"),
            crate::types::LayoutMode::Two => Some("TwoColumnLeft"),
            crate::types::LayoutMode::Default => None,
        };
        if let Some(layout) = layout {
            entries.push(("PageLayout".to_string(), Object::name(layout)));
        }
        Object::Dictionary(entries)
    }
}
