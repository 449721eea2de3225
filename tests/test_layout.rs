//! Text layout tests: cell alignment, word wrapping, justification,
//! flowing text and automatic page breaks.

use pdf_quill::{Align, Border, CellFlow, Document, Edges, Orientation, PageSize, Unit};

/// Point-unit document with a monospaced font for easy width math.
fn pt_doc() -> Document {
    let mut d = Document::new(Orientation::Portrait, Unit::Pt, PageSize::A4).unwrap();
    d.set_compression(false);
    d.set_font("courier", "", 12.0).unwrap();
    d
}

fn mm_doc() -> Document {
    let mut d = Document::new(Orientation::Portrait, Unit::Mm, PageSize::A4).unwrap();
    d.set_compression(false);
    d
}

fn text_of(d: Document) -> String {
    String::from_utf8_lossy(&d.into_bytes().unwrap()).into_owned()
}

#[test]
fn test_cell_zero_width_extends_to_right_margin() {
    let mut d = pt_doc();
    let x0 = d.get_x();
    let margin = x0; // left == right margin by default
    d.cell(0.0, 10.0, "", Border::None, CellFlow::Right, Align::Left, false, None).unwrap();
    assert!((d.get_x() - (d.page_width() - margin)).abs() < 1e-9);
}

#[test]
fn test_cell_alignment_offsets() {
    // Text "mm" in courier 12pt is 14.4pt wide; cell is 100pt.
    let mut d = pt_doc();
    d.set_xy(100.0, 100.0);
    d.cell(100.0, 10.0, "mm", Border::None, CellFlow::Below, Align::Left, false, None).unwrap();
    d.cell(100.0, 10.0, "mm", Border::None, CellFlow::Below, Align::Center, false, None).unwrap();
    d.cell(100.0, 10.0, "mm", Border::None, CellFlow::Below, Align::Right, false, None).unwrap();
    let text = text_of(d);
    // cell margin 2.835 -> left at ~102.8; center at 100+(100-14.4)/2;
    // right at 100+100-2.835-14.4 = ~182.8
    assert!(text.contains("BT 102.8"));
    assert!(text.contains("BT 142.8"));
    assert!(text.contains("BT 182.7"));
}

#[test]
fn test_multi_cell_honors_explicit_line_breaks() {
    let mut d = pt_doc();
    d.multi_cell(200.0, 12.0, "first line\nsecond line", Border::None, Align::Left, false)
        .unwrap();
    let text = text_of(d);
    assert!(text.contains("(first line) Tj"));
    assert!(text.contains("(second line) Tj"));
}

#[test]
fn test_word_wrap_breaks_at_last_space() {
    // wmax = (150 - 5.67) * 1000 / 12 = 12027 glyph units; 20 glyphs
    // fit, so the break lands on the space before "eeee"
    let mut d = pt_doc();
    d.multi_cell(150.0, 12.0, "aaaa bbbb cccc dddd eeee", Border::None, Align::Left, false)
        .unwrap();
    let text = text_of(d);
    assert!(text.contains("(aaaa bbbb cccc dddd) Tj"));
    assert!(text.contains("(eeee) Tj"));
}

#[test]
fn test_word_wrap_forces_break_inside_long_word() {
    // wmax = (20 - 5.67) * 1000 / 12 = 1194 glyph units: one 600-unit
    // glyph fits, two do not, so every line carries a single character.
    let mut d = pt_doc();
    let word = "a".repeat(30);
    d.multi_cell(20.0, 5.0, &word, Border::None, Align::Left, false).unwrap();
    let text = text_of(d);
    assert_eq!(text.matches("(a) Tj").count(), 30);
    assert!(!text.contains("() Tj"));
}

#[test]
fn test_justification_fills_line_exactly() {
    let mut d = pt_doc();
    d.multi_cell(100.0, 12.0, "aa bb cc dd ee ff", Border::None, Align::Justify, false).unwrap();
    let text = text_of(d);

    // The first wrapped line is justified with a positive word spacing
    let tw_line = text
        .lines()
        .find(|line| line.ends_with(" Tw") && !line.starts_with('0'))
        .expect("no word-spacing operator emitted");
    let tw: f64 = tw_line.trim_end_matches(" Tw").parse().unwrap();
    assert!(text.contains("(aa bb cc dd) Tj"));

    // Base width of "aa bb cc dd": 11 glyphs * 600/1000 * 12pt
    let base = 11.0 * 600.0 / 1000.0 * 12.0;
    let gaps = 3.0;
    let target = 100.0 - 2.0 * 2.835; // cell width minus both cell margins
    assert!(
        (base + tw * gaps - target).abs() < 0.02,
        "tw {} does not fill the line: {} vs {}",
        tw,
        base + tw * gaps,
        target
    );
    // Spacing is reset after the block
    assert!(text.contains("0 Tw"));
}

#[test]
fn test_no_justification_with_single_space() {
    // One space before the break point: spacing must stay zero
    let mut d = pt_doc();
    d.multi_cell(100.0, 12.0, "aaaaaaaaaaaa bb", Border::None, Align::Justify, false).unwrap();
    let text = text_of(d);
    let positive_tw = text
        .lines()
        .any(|line| line.ends_with(" Tw") && !line.starts_with("0 ") && line != "0.000 Tw");
    assert!(!positive_tw, "unexpected word spacing for a single-gap line");
}

#[test]
fn test_multi_cell_border_decomposition() {
    // Three lines inside a frame: sides on every line, top on the
    // first, bottom on the last -> 8 edge segments in total.
    let mut d = pt_doc();
    d.multi_cell(20.0, 5.0, "aaa", Border::Frame, Align::Left, false).unwrap();
    let text = text_of(d);
    assert_eq!(text.matches(" l S ").count(), 8);
}

#[test]
fn test_multi_cell_resets_x_to_left_margin() {
    let mut d = pt_doc();
    d.set_x(200.0);
    d.multi_cell(100.0, 12.0, "wrapped text here", Border::None, Align::Left, false).unwrap();
    assert!((d.get_x() - 28.35).abs() < 1e-9);
}

#[test]
fn test_write_flows_and_leaves_cursor_after_text() {
    let mut d = pt_doc();
    let x0 = d.get_x();
    d.write(12.0, "abc", None).unwrap();
    // 3 glyphs * 600/1000 * 12pt
    assert!((d.get_x() - (x0 + 21.6)).abs() < 1e-6);
    let text = text_of(d);
    assert!(text.contains("(abc) Tj"));
}

#[test]
fn test_write_moves_to_next_line_instead_of_splitting_word() {
    let mut d = pt_doc();
    // Park the cursor near the right margin, then write a word that
    // cannot fit in the remainder
    d.set_x(500.0);
    let y0 = d.get_y();
    d.write(12.0, "unbreakable", None).unwrap();
    assert!(d.get_y() > y0);
    let text = text_of(d);
    assert!(text.contains("(unbreakable) Tj"));
}

#[test]
fn test_write_honors_explicit_breaks() {
    let mut d = pt_doc();
    d.write(12.0, "one\ntwo", None).unwrap();
    let text = text_of(d);
    assert!(text.contains("(one) Tj"));
    assert!(text.contains("(two) Tj"));
}

#[test]
fn test_auto_page_break_preserves_x() {
    let mut d = mm_doc();
    d.set_xy(25.0, 270.0);
    d.cell(40.0, 10.0, "over the edge", Border::None, CellFlow::Right, Align::Left, false, None)
        .unwrap();
    assert_eq!(d.page_no(), 2);
    // x survived the break, then advanced by the cell width
    assert!((d.get_x() - 65.0).abs() < 1e-9);
    // y restarted at the top margin
    assert!(d.get_y() < 20.0);
}

#[test]
fn test_auto_page_break_disabled() {
    let mut d = mm_doc();
    d.set_auto_page_break(false, 0.0);
    d.set_y(290.0, true);
    d.cell(40.0, 10.0, "keep going", Border::None, CellFlow::Right, Align::Left, false, None)
        .unwrap();
    assert_eq!(d.page_no(), 1);
}

#[test]
fn test_page_break_increments_count_by_exactly_one() {
    let mut d = mm_doc();
    d.set_y(275.0, true);
    d.cell(40.0, 10.0, "x", Border::None, CellFlow::Right, Align::Left, false, None).unwrap();
    assert_eq!(d.page_no(), 2);
}

#[test]
fn test_edge_border_subset() {
    let mut d = pt_doc();
    d.cell(
        40.0,
        10.0,
        "",
        Border::Edges(Edges::LEFT | Edges::BOTTOM),
        CellFlow::Right,
        Align::Left,
        false,
        None,
    )
    .unwrap();
    let text = text_of(d);
    assert_eq!(text.matches(" l S ").count(), 2);
}

#[test]
fn test_underline_emits_fill_rectangle() {
    let mut d = pt_doc();
    d.set_font("courier", "U", 12.0).unwrap();
    d.cell(100.0, 10.0, "underlined", Border::None, CellFlow::Right, Align::Left, false, None)
        .unwrap();
    let text = text_of(d);
    assert!(text.contains("re f"));
}

#[test]
fn test_text_places_string_without_cursor_move() {
    let mut d = pt_doc();
    let (x0, y0) = (d.get_x(), d.get_y());
    d.text(72.0, 144.0, "pinned").unwrap();
    assert_eq!((d.get_x(), d.get_y()), (x0, y0));
    let text = text_of(d);
    // A4 height 841.89 - 144 = 697.89
    assert!(text.contains("BT 72.00 697.89 Td (pinned) Tj ET"));
}

#[test]
fn test_write_text_applies_style_overrides() {
    use pdf_quill::{Color, TextStyle};
    let mut d = pt_doc();
    let style = TextStyle::new().color(Color::Rgb(0, 0, 255)).size(18.0);
    d.write_text("styled", 50.0, 50.0, Some(style)).unwrap();
    let text = text_of(d);
    assert!(text.contains("q 0.000 0.000 1.000 rg"));
    // Courier was selected by pt_doc() and is font resource 2
    assert!(text.contains("/F2 18.00 Tf"));
    assert!(text.contains("(styled) Tj"));
}
