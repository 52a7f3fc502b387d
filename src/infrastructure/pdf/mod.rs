//! Invoice PDF rendering.
//!
//! Pages are A4 portrait drawn with the standard Helvetica fonts, so text is
//! limited to Latin-1; anything outside it prints as `?`. The Persian print
//! view covers Persian-script output.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use thiserror::Error;

use crate::domain::services::invoice_document::format_tax_rate;
use crate::domain::services::persian::format_grouped;
use crate::domain::services::{InvoiceDocument, Party};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: f32 = 40.0;
const LINE_HEIGHT: f32 = 14.0;
const BODY_SIZE: f32 = 9.0;

/// Table columns: header and x offset.
const COLUMNS: [(&str, f32); 7] = [
    ("#", 40.0),
    ("Product", 62.0),
    ("SKU", 252.0),
    ("Qty", 322.0),
    ("Unit price", 362.0),
    ("Discount", 437.0),
    ("Net", 502.0),
];

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF encoding failed: {0}")]
    Encode(#[from] lopdf::Error),

    #[error("PDF write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PdfError> for AppError {
    fn from(err: PdfError) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Font resource names.
#[derive(Clone, Copy)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn name(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

/// Encode text for a WinAnsi Type1 font.
fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| {
            let code = c as u32;
            if code < 0x100 { code as u8 } else { b'?' }
        })
        .collect()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

/// Accumulates page content streams, breaking to a new page when the cursor
/// reaches the bottom margin.
struct PageWriter {
    pages: Vec<Vec<Operation>>,
    y: f32,
}

impl PageWriter {
    fn new() -> Self {
        Self {
            pages: vec![Vec::new()],
            y: PAGE_HEIGHT as f32 - MARGIN,
        }
    }

    fn current(&mut self) -> &mut Vec<Operation> {
        // `pages` always holds at least one page
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn text_at(&mut self, x: f32, y: f32, font: Font, size: f32, text: &str) {
        let ops = self.current();
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new("Tf", vec![font.name().into(), size.into()]));
        ops.push(Operation::new("Td", vec![x.into(), y.into()]));
        ops.push(Operation::new(
            "Tj",
            vec![Object::String(latin1(text), StringFormat::Literal)],
        ));
        ops.push(Operation::new("ET", vec![]));
    }

    fn rule(&mut self, y: f32) {
        let ops = self.current();
        ops.push(Operation::new("w", vec![0.5f32.into()]));
        ops.push(Operation::new("m", vec![MARGIN.into(), y.into()]));
        ops.push(Operation::new(
            "l",
            vec![(PAGE_WIDTH as f32 - MARGIN).into(), y.into()],
        ));
        ops.push(Operation::new("S", vec![]));
    }

    /// Reserve one line, starting a new page when needed. Returns the
    /// baseline y of the reserved line.
    fn next_line(&mut self) -> f32 {
        if self.y - LINE_HEIGHT < MARGIN + LINE_HEIGHT {
            self.pages.push(Vec::new());
            self.y = PAGE_HEIGHT as f32 - MARGIN;
        }
        self.y -= LINE_HEIGHT;
        self.y
    }

    fn line(&mut self, font: Font, size: f32, text: &str) {
        let y = self.next_line();
        self.text_at(MARGIN, y, font, size, text);
    }

    fn gap(&mut self) {
        self.y -= LINE_HEIGHT / 2.0;
    }

    fn table_header(&mut self) {
        let y = self.next_line();
        for (title, x) in COLUMNS {
            self.text_at(x, y, Font::Bold, BODY_SIZE, title);
        }
        self.rule(y - 4.0);
    }

    fn table_row(&mut self, cells: [String; 7]) {
        let before = self.pages.len();
        let y = self.next_line();
        if self.pages.len() != before {
            // repeat the header on continuation pages
            self.y += LINE_HEIGHT;
            self.table_header();
            return self.table_row(cells);
        }
        for ((_, x), cell) in COLUMNS.iter().zip(cells.iter()) {
            self.text_at(*x, y, Font::Regular, BODY_SIZE, cell);
        }
    }
}

fn party_lines(title: &str, party: &Party) -> Vec<(Font, String)> {
    let mut lines = vec![(Font::Bold, title.to_string()), (Font::Regular, party.name.clone())];
    let fields = [
        ("National ID", &party.national_id),
        ("Economic code", &party.economic_code),
        ("Address", &party.address),
        ("Postal code", &party.postal_code),
        ("Phone", &party.phone),
        ("Email", &party.email),
    ];
    for (label, value) in fields {
        if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
            lines.push((Font::Regular, format!("{}: {}", label, truncate(v, 80))));
        }
    }
    lines
}

fn write_body(doc: &InvoiceDocument, w: &mut PageWriter) {
    w.line(Font::Bold, 18.0, "INVOICE");
    w.gap();
    w.line(Font::Regular, 10.0, &format!("Invoice number: {}", doc.invoice_number));
    w.line(
        Font::Regular,
        10.0,
        &format!(
            "Issue date: {} ({})",
            doc.issue_date.format("%Y-%m-%d"),
            doc.issue_date_jalali()
        ),
    );
    if let (Some(due), Some(due_jalali)) = (doc.due_date, doc.due_date_jalali()) {
        w.line(
            Font::Regular,
            10.0,
            &format!("Due date: {} ({})", due.format("%Y-%m-%d"), due_jalali),
        );
    }
    w.line(Font::Regular, 10.0, &format!("Status: {}", doc.status));
    w.gap();

    for (font, text) in party_lines("Seller", &doc.seller) {
        w.line(font, 10.0, &text);
    }
    w.gap();
    for (font, text) in party_lines("Buyer", &doc.buyer) {
        w.line(font, 10.0, &text);
    }
    w.gap();

    w.table_header();
    for line in &doc.lines {
        let name = match &line.description {
            Some(d) if !d.is_empty() => format!("{} - {}", line.product_name, d),
            _ => line.product_name.clone(),
        };
        w.table_row([
            line.row.to_string(),
            truncate(&name, 38),
            truncate(&line.sku, 12),
            line.quantity.to_string(),
            format_grouped(line.unit_price),
            format_grouped(line.discount),
            format_grouped(line.net),
        ]);
    }
    let y = w.y - 4.0;
    w.rule(y);
    w.gap();

    let t = &doc.totals;
    let totals = [
        ("Subtotal", format_grouped(t.subtotal)),
        ("Discount", format_grouped(t.discount)),
        (
            "Tax",
            format!("{} ({})", format_grouped(t.tax_amount), format_tax_rate(t.tax_rate_bp)),
        ),
        ("Total", format!("{} {}", format_grouped(t.total), doc.currency)),
    ];
    for (label, value) in totals {
        let font = if label == "Total" { Font::Bold } else { Font::Regular };
        let y = w.next_line();
        w.text_at(362.0, y, font, 10.0, label);
        w.text_at(437.0, y, font, 10.0, &value);
    }
    w.gap();
    w.line(
        Font::Regular,
        BODY_SIZE,
        &format!("Amount in words: {}", truncate(&doc.total_in_english_words(), 110)),
    );

    if let Some(notes) = doc.notes.as_deref().filter(|n| !n.is_empty()) {
        w.gap();
        w.line(Font::Bold, 10.0, "Notes");
        for chunk in notes.lines() {
            w.line(Font::Regular, BODY_SIZE, &truncate(chunk, 110));
        }
    }
}

/// Render an invoice to PDF bytes.
pub fn render_invoice_pdf(invoice: &InvoiceDocument) -> Result<Vec<u8>, PdfError> {
    let mut writer = PageWriter::new();
    write_body(invoice, &mut writer);

    let page_count = writer.pages.len();
    for (index, ops) in writer.pages.iter_mut().enumerate() {
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new("Tf", vec![Font::Regular.name().into(), 8.0f32.into()]));
        ops.push(Operation::new("Td", vec![MARGIN.into(), (MARGIN / 2.0).into()]));
        ops.push(Operation::new(
            "Tj",
            vec![Object::String(
                latin1(&format!(
                    "{}  -  page {} of {}",
                    invoice.invoice_number,
                    index + 1,
                    page_count
                )),
                StringFormat::Literal,
            )],
        ));
        ops.push(Operation::new("ET", vec![]));
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(page_count);
    for operations in writer.pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(page_count as i64),
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(PAGE_WIDTH),
            Object::Integer(PAGE_HEIGHT),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;

    metrics::record_pdf_rendered();
    tracing::debug!(
        invoice_number = %invoice.invoice_number,
        pages = page_count,
        bytes = bytes.len(),
        "Invoice PDF rendered"
    );

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::services::invoice_document::tests::create_test_document;

    #[test]
    fn test_renders_pdf_header() {
        let bytes = render_invoice_pdf(&create_test_document(3)).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn test_single_page_for_short_invoice() {
        let bytes = render_invoice_pdf(&create_test_document(3)).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_long_invoice_spans_pages() {
        let bytes = render_invoice_pdf(&create_test_document(120)).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().len() >= 3);
    }

    #[test]
    fn test_latin1_replaces_non_latin() {
        assert_eq!(latin1("Ali"), b"Ali".to_vec());
        assert_eq!(latin1("café"), vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(latin1("علی"), b"???".to_vec());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long product name", 10), "a very ...");
    }
}
