use std::io::BufWriter;

use anyhow::Context;
use printpdf::{BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point};

use super::content::LetterContent;

const PAGE_WIDTH_MM: f64 = 215.9;
const PAGE_HEIGHT_MM: f64 = 279.4;
const MARGIN_MM: f64 = 25.4;
const LABEL_COL_MM: f64 = 50.8;
const VALUE_COL_MM: f64 = 101.6;
const ROW_HEIGHT_MM: f64 = 9.0;
const BODY_PT: f64 = 12.0;
const TITLE_PT: f64 = 24.0;
const WRAP_CHARS: usize = 80;

// Characters above U+007F that WinAnsiEncoding maps into 0x80..=0x9F.
const WIN_ANSI_EXTRAS: &str = "€‚ƒ„…†‡ˆ‰Š‹ŒŽ‘’“”•–—˜™š›œžŸ";

/// Whether the built-in fonts can draw `c`. Anything else would be dropped
/// from the page.
pub fn encodable(c: char) -> bool {
    matches!(c, ' '..='~' | '\u{a0}'..='\u{ff}') || WIN_ANSI_EXTRAS.contains(c)
}

/// Lays the letter out on a single US-letter page.
pub fn render_pdf(content: &LetterContent) -> anyhow::Result<Vec<u8>> {
    let unencodable = content
        .rows
        .iter()
        .map(|(_, v)| v.as_str())
        .chain(content.paragraphs.iter().map(String::as_str))
        .find(|text| !text.chars().all(encodable));
    if let Some(text) = unencodable {
        anyhow::bail!("letter text {text:?} has characters Helvetica cannot encode");
    }

    let (doc, page, layer) = PdfDocument::new(
        content.title,
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "letter",
    );
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .context("load Helvetica")?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .context("load Helvetica-Bold")?;
    let layer = doc.get_page(page).get_layer(layer);

    let mut y = PAGE_HEIGHT_MM - MARGIN_MM;

    // roughly centred; Helvetica caps average ~0.6em
    let title_width = content.title.len() as f64 * TITLE_PT * 0.6 * 0.3528;
    layer.use_text(
        content.title,
        TITLE_PT,
        Mm((PAGE_WIDTH_MM - title_width) / 2.0),
        Mm(y),
        &bold,
    );
    y -= 20.0;

    layer.use_text(content.date_line.clone(), BODY_PT, Mm(MARGIN_MM), Mm(y), &regular);
    y -= 15.0;

    y = draw_table(&layer, &content.rows, y, &regular, &bold);
    y -= 12.0;

    for paragraph in &content.paragraphs {
        for line in wrap(paragraph, WRAP_CHARS) {
            layer.use_text(line, BODY_PT, Mm(MARGIN_MM), Mm(y), &regular);
            y -= 5.5;
        }
        y -= 3.0;
    }

    let mut out = BufWriter::new(Vec::new());
    doc.save(&mut out).context("write pdf")?;
    out.into_inner().context("flush pdf buffer")
}

fn draw_table(
    layer: &PdfLayerReference,
    rows: &[(&'static str, String)],
    top: f64,
    regular: &IndirectFontRef,
    bold: &IndirectFontRef,
) -> f64 {
    let left = MARGIN_MM;
    let middle = left + LABEL_COL_MM;
    let right = middle + VALUE_COL_MM;
    let bottom = top - ROW_HEIGHT_MM * rows.len() as f64;

    layer.set_outline_thickness(1.0);
    for i in 0..=rows.len() {
        let y = top - ROW_HEIGHT_MM * i as f64;
        layer.add_shape(segment((left, y), (right, y)));
    }
    for x in [left, middle, right] {
        layer.add_shape(segment((x, top), (x, bottom)));
    }

    for (i, (label, value)) in rows.iter().enumerate() {
        let baseline = top - ROW_HEIGHT_MM * (i as f64 + 1.0) + 3.0;
        layer.use_text(*label, BODY_PT, Mm(left + 2.0), Mm(baseline), bold);
        layer.use_text(value.clone(), BODY_PT, Mm(middle + 2.0), Mm(baseline), regular);
    }
    bottom
}

fn segment(from: (f64, f64), to: (f64, f64)) -> Line {
    Line {
        points: vec![
            (Point::new(Mm(from.0), Mm(from.1)), false),
            (Point::new(Mm(to.0), Mm(to.1)), false),
        ],
        is_closed: false,
        has_fill: false,
        has_stroke: true,
        is_clipping_path: false,
    }
}

/// Greedy word wrap at `width` characters.
pub(crate) fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
