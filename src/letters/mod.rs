//! Admission letters for approved applications.

pub mod content;
mod render;

use time::Date;

use crate::applications::repo_types::Application;
pub use content::LetterContent;

pub const CONTENT_TYPE: &str = "application/pdf";

/// Whether every character of `text` can be printed on a letter.
pub fn is_printable(text: &str) -> bool {
    text.chars().all(render::encodable)
}

/// Renders the letter for `app` dated `issued_on`.
pub fn generate(app: &Application, issued_on: Date) -> anyhow::Result<Vec<u8>> {
    let content = LetterContent::for_application(app, issued_on)?;
    render::render_pdf(&content)
}

/// Text drawn on every page of `pdf`, one shown string per line.
#[cfg(test)]
pub(crate) fn pdf_text(pdf: &[u8]) -> String {
    use lopdf::{content::Content, Document, Object};

    fn shown(obj: &Object, out: &mut String) {
        match obj {
            Object::String(bytes, _) => out.extend(bytes.iter().map(|&b| b as char)),
            Object::Array(items) => items.iter().for_each(|i| shown(i, out)),
            _ => {}
        }
    }

    let doc = Document::load_mem(pdf).expect("parse pdf");
    let mut out = String::new();
    for page in doc.get_pages().into_values() {
        let data = doc.get_page_content(page).expect("page content");
        let content = Content::decode(&data).expect("decode content stream");
        for op in content.operations {
            if op.operator == "Tj" || op.operator == "TJ" {
                op.operands.iter().for_each(|o| shown(o, &mut out));
                out.push('\n');
            }
        }
    }
    out
}
