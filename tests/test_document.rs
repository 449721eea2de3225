//! Document structure tests: header, object graph, cross-reference
//! table, trailer, metadata and lifecycle.

use pdf_quill::{Align, Border, CellFlow, Color, Document, LayoutMode, Orientation, PageSize, Unit, ZoomMode};

fn doc() -> Document {
    Document::new(Orientation::Portrait, Unit::Mm, PageSize::A4).unwrap()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Parse the xref table: returns (entry count, offsets of objects 1..).
fn parse_xref(pdf: &[u8]) -> (usize, Vec<usize>) {
    let pos = rfind(pdf, b"\nxref\n").expect("no xref table") + 1;
    let tail = std::str::from_utf8(&pdf[pos..]).expect("xref section is ASCII");
    let mut lines = tail.lines();
    assert_eq!(lines.next(), Some("xref"));
    let header = lines.next().unwrap();
    let mut parts = header.split_whitespace();
    assert_eq!(parts.next(), Some("0"));
    let count: usize = parts.next().unwrap().parse().unwrap();
    let free = lines.next().unwrap();
    assert!(free.starts_with("0000000000 65535 f"), "free-list head: {}", free);
    let mut offsets = Vec::new();
    for _ in 1..count {
        let line = lines.next().unwrap();
        assert!(line.ends_with("00000 n "), "xref entry: {:?}", line);
        offsets.push(line.split_whitespace().next().unwrap().parse().unwrap());
    }
    (count, offsets)
}

#[test]
fn test_header_and_eof_markers() {
    let bytes = doc().into_bytes().unwrap();
    assert!(bytes.starts_with(b"%PDF-1.3\n"));
    assert!(String::from_utf8_lossy(&bytes).trim_end().ends_with("%%EOF"));
}

#[test]
fn test_xref_entries_point_at_matching_objects() {
    let mut d = doc();
    d.set_font("times", "", 11.0).unwrap();
    d.cell(40.0, 10.0, "xref check", Border::None, CellFlow::NextLine, Align::Left, false, None)
        .unwrap();
    d.add_page(None, None, 0).unwrap();
    let bytes = d.into_bytes().unwrap();

    let (count, offsets) = parse_xref(&bytes);
    assert_eq!(offsets.len(), count - 1);
    for (i, offset) in offsets.iter().enumerate() {
        let n = i + 1;
        let expected = format!("{} 0 obj", n);
        assert!(
            bytes[*offset..].starts_with(expected.as_bytes()),
            "object {} offset {} does not start an object",
            n,
            offset
        );
    }
}

#[test]
fn test_startxref_points_at_xref_table() {
    let bytes = doc().into_bytes().unwrap();
    let pos = rfind(&bytes, b"startxref\n").unwrap() + "startxref\n".len();
    let tail = std::str::from_utf8(&bytes[pos..]).unwrap();
    let offset: usize = tail.lines().next().unwrap().parse().unwrap();
    assert!(bytes[offset..].starts_with(b"xref\n"));
}

#[test]
fn test_hello_world_content_stream() {
    let mut d = doc();
    d.set_compression(false);
    d.set_font("Arial", "B", 16.0).unwrap();
    d.cell(40.0, 10.0, "Hello World!", Border::None, CellFlow::Right, Align::Left, false, None)
        .unwrap();
    let bytes = d.into_bytes().unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("(Hello World!) Tj"));
    assert!(text.contains("/Type /Page"));
    assert!(text.contains("/Type /Pages"));
    assert!(text.contains("/Type /Catalog"));
}

#[test]
fn test_close_is_idempotent() {
    let mut d = doc();
    d.cell(40.0, 10.0, "once", Border::None, CellFlow::Right, Align::Left, false, None).unwrap();
    d.close().unwrap();
    let first = d.buffer().to_vec();
    d.close().unwrap();
    assert_eq!(first, d.buffer());
}

#[test]
fn test_compression_flag_controls_content_filter() {
    let mut plain = doc();
    plain.set_compression(false);
    plain
        .cell(40.0, 10.0, "some cell text", Border::None, CellFlow::Right, Align::Left, false, None)
        .unwrap();
    let plain_bytes = plain.into_bytes().unwrap();
    assert!(find(&plain_bytes, b"(some cell text) Tj").is_some());

    let mut packed = doc();
    packed
        .cell(40.0, 10.0, "some cell text", Border::None, CellFlow::Right, Align::Left, false, None)
        .unwrap();
    let packed_bytes = packed.into_bytes().unwrap();
    assert!(find(&packed_bytes, b"/Filter /FlateDecode").is_some());
    assert!(find(&packed_bytes, b"(some cell text) Tj").is_none());
}

#[test]
fn test_metadata_written_and_escaped() {
    let mut d = doc();
    d.set_title("Report (draft)");
    d.set_author("A\\B");
    d.set_subject("Subject");
    d.set_keywords("alpha beta");
    d.set_creator("unit test");
    let bytes = d.into_bytes().unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("/Title (Report \\(draft\\))"));
    assert!(text.contains("/Author (A\\\\B)"));
    assert!(text.contains("/Keywords (alpha beta)"));
    assert!(text.contains("/Producer (pdf_quill"));
    assert!(text.contains("/CreationDate (D:20"));
}

#[test]
fn test_non_ascii_metadata_transcoded_to_utf16() {
    let mut d = doc();
    d.set_title("Café");
    let bytes = d.into_bytes().unwrap();
    // BOM followed by "C" in UTF-16BE
    assert!(find(&bytes, &[0xFE, 0xFF, 0x00, b'C']).is_some());
}

#[test]
fn test_display_mode_hints_in_catalog() {
    let mut d = doc();
    d.set_display_mode(ZoomMode::FullPage, LayoutMode::Single);
    let bytes = d.into_bytes().unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("/OpenAction [3 0 R /Fit]"));
    assert!(text.contains("/PageLayout /SinglePage"));
}

#[test]
fn test_zoom_percentage_open_action() {
    let mut d = doc();
    d.set_display_mode(ZoomMode::Percent(75.0), LayoutMode::Default);
    let bytes = d.into_bytes().unwrap();
    assert!(find(&bytes, b"/OpenAction [3 0 R /XYZ null null 0.75]").is_some());
}

#[test]
fn test_pages_root_lists_all_pages() {
    let mut d = doc();
    d.add_page(None, None, 0).unwrap();
    d.add_page(None, None, 0).unwrap();
    let bytes = d.into_bytes().unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("/Count 3"));
    // Three page objects: 3/4, 5/6, 7/8 (dict + content each)
    assert!(text.contains("/Kids [3 0 R 5 0 R 7 0 R ]"));
}

#[test]
fn test_landscape_page_records_own_media_box() {
    let mut d = doc();
    d.add_page(Some(Orientation::Landscape), None, 0).unwrap();
    let bytes = d.into_bytes().unwrap();
    let text = String::from_utf8_lossy(&bytes);
    // Default A4 portrait on the root, flipped box on page 2
    assert!(text.contains("/MediaBox [0 0 595.28 841.89]"));
    assert!(text.contains("/MediaBox [0 0 841.89 595.28]"));
}

#[test]
fn test_rotation_recorded_on_page() {
    let mut d = doc();
    d.add_page(None, None, 90).unwrap();
    let bytes = d.into_bytes().unwrap();
    assert!(find(&bytes, b"/Rotate 90").is_some());
}

#[test]
fn test_alias_nb_pages_substitution() {
    let mut d = doc();
    d.set_compression(false);
    d.alias_nb_pages(None);
    d.set_footer(|doc| {
        let label = format!("Page {} of {{nb}}", doc.page_no());
        doc.set_y(-15.0, true);
        doc.cell(0.0, 10.0, &label, Border::None, CellFlow::Right, Align::Center, false, None)
    });
    d.add_page(None, None, 0).unwrap();
    d.add_page(None, None, 0).unwrap();
    let bytes = d.into_bytes().unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("(Page 1 of 3) Tj"));
    assert!(text.contains("(Page 3 of 3) Tj"));
    assert!(!text.contains("{nb}"));
}

#[test]
fn test_header_footer_hooks_run_every_page() {
    let mut d = doc();
    d.set_compression(false);
    d.set_header(|doc| {
        doc.cell(0.0, 6.0, "HEADER", Border::None, CellFlow::NextLine, Align::Center, false, None)
    });
    d.add_page(None, None, 0).unwrap();
    let bytes = d.into_bytes().unwrap();
    let text = String::from_utf8_lossy(&bytes);
    // Registered after page 1 was opened, so only page 2 carries it
    assert_eq!(text.matches("(HEADER) Tj").count(), 1);
}

#[test]
fn test_save_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.pdf");
    let mut d = doc();
    d.save(&path).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"%PDF-"));
}

#[test]
fn test_uri_link_annotation() {
    let mut d = doc();
    d.cell(
        40.0,
        10.0,
        "example.org",
        Border::None,
        CellFlow::Right,
        Align::Left,
        false,
        Some(pdf_quill::LinkTarget::Uri("https://example.org".to_string())),
    )
    .unwrap();
    let bytes = d.into_bytes().unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("/Subtype /Link"));
    assert!(text.contains("/A <</S /URI /URI (https://example.org)>>"));
    assert!(text.contains("/Annots ["));
}

#[test]
fn test_internal_link_dest_targets_first_page() {
    let mut d = doc();
    let home = d.add_link();
    d.set_link(home, Some(0.0), Some(1));
    d.add_page(None, None, 0).unwrap();
    d.cell(
        40.0,
        10.0,
        "back",
        Border::None,
        CellFlow::Right,
        Align::Left,
        false,
        Some(pdf_quill::LinkTarget::Internal(home)),
    )
    .unwrap();
    let bytes = d.into_bytes().unwrap();
    let text = String::from_utf8_lossy(&bytes);
    // First page object is 3; y=0 maps to the full page height
    assert!(text.contains("/Dest [3 0 R /XYZ 0 841.89 null]"));
}

#[test]
fn test_draw_and_fill_colors_in_stream() {
    let mut d = doc();
    d.set_compression(false);
    d.set_draw_color(Color::Rgb(255, 0, 0)).unwrap();
    d.set_fill_color(Color::Gray(128)).unwrap();
    d.line(10.0, 10.0, 50.0, 10.0).unwrap();
    d.rect(10.0, 20.0, 30.0, 15.0, pdf_quill::DrawMode::Fill).unwrap();
    let bytes = d.into_bytes().unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("1.000 0.000 0.000 RG"));
    assert!(text.contains("0.502 g"));
    assert!(text.contains(" l S"));
    assert!(text.contains("re f"));
}
