//! Render-ready invoice model shared by the PDF renderer and the Persian
//! print view.

use chrono::NaiveDate;
use serde::Serialize;

use super::invoice_calculator::InvoiceTotals;
use super::number_words::{to_english_words, to_persian_words};
use super::persian::{format_grouped, gregorian_to_jalali, to_persian_digits};
use crate::domain::entities::InvoiceStatus;

/// Seller or buyer block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Party {
    pub name: String,
    /// National code for individuals, national id for companies
    pub national_id: Option<String>,
    pub economic_code: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentLine {
    /// 1-based row number
    pub row: usize,
    pub product_name: String,
    pub sku: String,
    pub description: Option<String>,
    pub unit: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub discount: i64,
    pub net: i64,
}

/// Everything needed to print one invoice.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDocument {
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub seller: Party,
    pub buyer: Party,
    pub lines: Vec<DocumentLine>,
    pub totals: InvoiceTotals,
    pub currency: String,
    pub notes: Option<String>,
}

impl InvoiceDocument {
    /// `1403/01/01`
    pub fn issue_date_jalali(&self) -> String {
        gregorian_to_jalali(self.issue_date).to_string()
    }

    pub fn due_date_jalali(&self) -> Option<String> {
        self.due_date.map(|d| gregorian_to_jalali(d).to_string())
    }

    /// "one thousand two hundred fifty Rials"
    pub fn total_in_english_words(&self) -> String {
        format!("{} {}", to_english_words(self.totals.total), self.currency)
    }

    /// Persian-digit, Jalali-dated view consumed by the front end's print page.
    pub fn to_print_view(&self) -> PrintView {
        let money = |v: i64| to_persian_digits(&format_grouped(v));

        PrintView {
            invoice_number: to_persian_digits(&self.invoice_number),
            status: self.status.persian_label().to_string(),
            issue_date: gregorian_to_jalali(self.issue_date).to_persian_string(),
            due_date: self
                .due_date
                .map(|d| gregorian_to_jalali(d).to_persian_string()),
            seller: PrintParty::from(&self.seller),
            buyer: PrintParty::from(&self.buyer),
            lines: self
                .lines
                .iter()
                .map(|l| PrintLine {
                    row: to_persian_digits(&l.row.to_string()),
                    product_name: l.product_name.clone(),
                    sku: l.sku.clone(),
                    description: l.description.clone(),
                    unit: l.unit.clone(),
                    quantity: to_persian_digits(&l.quantity.to_string()),
                    unit_price: money(l.unit_price),
                    discount: money(l.discount),
                    net: money(l.net),
                })
                .collect(),
            subtotal: money(self.totals.subtotal),
            discount: money(self.totals.discount),
            tax_rate: to_persian_digits(&format_tax_rate(self.totals.tax_rate_bp)),
            tax_amount: money(self.totals.tax_amount),
            total: money(self.totals.total),
            total_in_words: format!("{} ریال", to_persian_words(self.totals.total)),
            notes: self.notes.clone(),
        }
    }
}

/// `900` → `9%`, `925` → `9.25%`
pub fn format_tax_rate(bp: i32) -> String {
    let whole = bp / 100;
    let frac = bp % 100;
    if frac == 0 {
        format!("{}%", whole)
    } else if frac % 10 == 0 {
        format!("{}.{}%", whole, frac / 10)
    } else {
        format!("{}.{:02}%", whole, frac)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PrintParty {
    pub name: String,
    pub national_id: Option<String>,
    pub economic_code: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub phone: Option<String>,
}

impl From<&Party> for PrintParty {
    fn from(p: &Party) -> Self {
        let digits = |v: &Option<String>| v.as_deref().map(to_persian_digits);
        Self {
            name: p.name.clone(),
            national_id: digits(&p.national_id),
            economic_code: digits(&p.economic_code),
            address: p.address.clone(),
            postal_code: digits(&p.postal_code),
            phone: digits(&p.phone),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PrintLine {
    pub row: String,
    pub product_name: String,
    pub sku: String,
    pub description: Option<String>,
    pub unit: String,
    pub quantity: String,
    pub unit_price: String,
    pub discount: String,
    pub net: String,
}

/// Invoice print model with Persian digits and Jalali dates.
#[derive(Debug, Clone, Serialize)]
pub struct PrintView {
    pub invoice_number: String,
    pub status: String,
    pub issue_date: String,
    pub due_date: Option<String>,
    pub seller: PrintParty,
    pub buyer: PrintParty,
    pub lines: Vec<PrintLine>,
    pub subtotal: String,
    pub discount: String,
    pub tax_rate: String,
    pub tax_amount: String,
    pub total: String,
    pub total_in_words: String,
    pub notes: Option<String>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::services::invoice_calculator::{calculate_totals, LineInput};
    use pretty_assertions::assert_eq;

    pub(crate) fn create_test_document(line_count: usize) -> InvoiceDocument {
        let lines: Vec<DocumentLine> = (1..=line_count)
            .map(|row| DocumentLine {
                row,
                product_name: format!("Product {}", row),
                sku: format!("SKU-{:03}", row),
                description: None,
                unit: "pcs".into(),
                quantity: 1,
                unit_price: 1_250,
                discount: 0,
                net: 1_250,
            })
            .collect();
        let inputs: Vec<LineInput> = lines
            .iter()
            .map(|l| LineInput {
                quantity: l.quantity,
                unit_price: l.unit_price,
                discount: l.discount,
            })
            .collect();

        InvoiceDocument {
            invoice_number: "1403-00012".into(),
            status: InvoiceStatus::Issued,
            issue_date: NaiveDate::from_ymd_opt(2024, 3, 20).unwrap(),
            due_date: Some(NaiveDate::from_ymd_opt(2024, 4, 19).unwrap()),
            seller: Party {
                name: "Pars Trading".into(),
                national_id: Some("10101234567".into()),
                ..Party::default()
            },
            buyer: Party {
                name: "Ali Rezaei".into(),
                phone: Some("09121234567".into()),
                ..Party::default()
            },
            lines,
            totals: calculate_totals(&inputs, 0, 0).unwrap(),
            currency: "Rials".into(),
            notes: None,
        }
    }

    #[test]
    fn test_jalali_dates() {
        let doc = create_test_document(1);
        assert_eq!(doc.issue_date_jalali(), "1403/01/01");
        assert_eq!(doc.due_date_jalali().as_deref(), Some("1403/01/31"));
    }

    #[test]
    fn test_english_words_total() {
        let doc = create_test_document(1);
        assert_eq!(doc.total_in_english_words(), "one thousand two hundred fifty Rials");
    }

    #[test]
    fn test_print_view_uses_persian_digits() {
        let view = create_test_document(1).to_print_view();
        assert_eq!(view.invoice_number, "۱۴۰۳-۰۰۰۱۲");
        assert_eq!(view.issue_date, "۱۴۰۳/۰۱/۰۱");
        assert_eq!(view.total, "۱,۲۵۰");
        assert_eq!(view.total_in_words, "یک هزار و دویست و پنجاه ریال");
        assert_eq!(view.status, "صادر شده");
        assert_eq!(view.seller.national_id.as_deref(), Some("۱۰۱۰۱۲۳۴۵۶۷"));
        assert_eq!(view.buyer.phone.as_deref(), Some("۰۹۱۲۱۲۳۴۵۶۷"));
        assert_eq!(view.lines[0].row, "۱");
    }

    #[test]
    fn test_format_tax_rate() {
        assert_eq!(format_tax_rate(900), "9%");
        assert_eq!(format_tax_rate(1000), "10%");
        assert_eq!(format_tax_rate(950), "9.5%");
        assert_eq!(format_tax_rate(925), "9.25%");
        assert_eq!(format_tax_rate(0), "0%");
    }
}
