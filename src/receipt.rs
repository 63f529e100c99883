//! # Receipt Builders
//!
//! Turns receipt content (header, body and footer lines) into one immutable
//! ESC/POS [`PrintJob`].
//!
//! ## Job Layout
//!
//! ```text
//! ESC @            initialize
//! ESC R 8          Arabic character set
//! ESC t n, GS t n  code page (both opcodes)
//! ESC a 1          ┐
//! header lines LF  │ only when there is a header
//! LF               ┘
//! ESC a 0
//! body lines LF
//! LF ESC a 1       ┐
//! footer lines LF  │ only when there is a footer
//! ESC a 0          ┘
//! LF
//! GS V 66 0        full cut
//! ESC d 3          feed 3 lines
//! ```
//!
//! Every line goes through [`normalize`] and the profile's [`CodePage`]
//! before it is appended.
//!
//! Also here: the printer self-test page, the code page diagnostics sheet,
//! and the sale receipt layout used by the point-of-sale screens.

use serde::{Deserialize, Serialize};

use crate::printer::PrinterProfile;
use crate::protocol::codepage::CodePage;
use crate::protocol::commands::{self, CHARSET_ARABIC, DEFAULT_ARABIC_CODE_PAGE, LF};
use crate::protocol::normalize::normalize;
use crate::protocol::text::{align_center, align_left, push_line};

// ============================================================================
// PRINT JOB
// ============================================================================

/// A finished command buffer. Immutable once built; consumed by transmission.
#[derive(Debug, PartialEq, Eq)]
pub struct PrintJob {
    bytes: Vec<u8>,
}

impl PrintJob {
    /// Wrap raw ESC/POS bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Bytes every receipt job ends with: full cut, then feed 3 lines.
pub fn job_trailer() -> Vec<u8> {
    let mut out = commands::cut_full();
    out.extend(commands::feed_lines(3));
    out
}

// ============================================================================
// RECEIPT CONTENT
// ============================================================================

/// Lines of a receipt. Any section may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptContent {
    pub header: Vec<String>,
    pub body: Vec<String>,
    pub footer: Vec<String>,
}

impl ReceiptContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.header = lines.into_iter().map(Into::into).collect();
        self
    }

    pub fn body<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.body = lines.into_iter().map(Into::into).collect();
        self
    }

    pub fn footer<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.footer = lines.into_iter().map(Into::into).collect();
        self
    }
}

// ============================================================================
// JOB BUILDER
// ============================================================================

/// Character-table settings a job is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobBuilder {
    pub code_page: u8,
    pub charset: u8,
    pub encoding: CodePage,
}

impl Default for JobBuilder {
    fn default() -> Self {
        Self {
            code_page: DEFAULT_ARABIC_CODE_PAGE,
            charset: CHARSET_ARABIC,
            encoding: CodePage::default(),
        }
    }
}

impl JobBuilder {
    pub fn from_profile(profile: &PrinterProfile) -> Self {
        Self {
            code_page: profile.code_page,
            charset: profile.charset,
            encoding: profile.encoding,
        }
    }

    pub fn code_page(mut self, code_page: u8) -> Self {
        self.code_page = code_page;
        self
    }

    fn push_text(&self, out: &mut Vec<u8>, line: &str) {
        push_line(out, &self.encoding.encode(&normalize(line)));
    }

    /// Build the job for `content`.
    pub fn build(&self, content: &ReceiptContent) -> PrintJob {
        let mut out = commands::init();
        out.extend(commands::select_international_charset(self.charset));
        out.extend(commands::select_code_page(self.code_page));
        out.extend(commands::select_code_page_gs(self.code_page));

        if !content.header.is_empty() {
            out.extend(align_center());
            for line in &content.header {
                self.push_text(&mut out, line);
            }
            out.push(LF);
        }

        out.extend(align_left());
        for line in &content.body {
            self.push_text(&mut out, line);
        }

        if !content.footer.is_empty() {
            out.push(LF);
            out.extend(align_center());
            for line in &content.footer {
                self.push_text(&mut out, line);
            }
            out.extend(align_left());
        }

        out.push(LF);
        out.extend(job_trailer());

        tracing::debug!(
            bytes = out.len(),
            code_page = self.code_page,
            lines = content.header.len() + content.body.len() + content.footer.len(),
            "built print job"
        );
        PrintJob::from_bytes(out)
    }
}

/// Build a receipt job with the default charset and Windows-1256 encoding.
pub fn build_print_job(
    header: &[String],
    body: &[String],
    footer: &[String],
    code_page: u8,
) -> PrintJob {
    let content = ReceiptContent {
        header: header.to_vec(),
        body: body.to_vec(),
        footer: footer.to_vec(),
    };
    JobBuilder::default().code_page(code_page).build(&content)
}

// ============================================================================
// SELF-TEST AND DIAGNOSTICS
// ============================================================================

/// Short ASCII-only page for checking that the link works at all.
pub fn test_page() -> PrintJob {
    let mut out = commands::init();
    out.extend(align_center());
    push_line(&mut out, b"TEST PRINT");
    push_line(&mut out, b"Printer is working!");
    out.extend(commands::feed_lines(3));
    out.extend(commands::cut_partial());
    PrintJob::from_bytes(out)
}

/// Code pages printed by the diagnostics sheet when none are given.
pub fn default_diagnostic_pages() -> Vec<u8> {
    (0x10..=0x29).collect()
}

/// Print the upper half (0x80-0xFF) of each code page under its number.
///
/// The operator looks for the page whose glyphs are Arabic and puts that
/// number in the printer profile.
///
/// ```text
/// CodePage 0x16
/// ················   16 glyphs per row, 8 rows
/// ```
pub fn code_page_diagnostics(pages: &[u8]) -> PrintJob {
    let mut out = commands::init();
    out.extend(align_left());

    for &page in pages {
        out.extend(commands::init());
        out.extend(commands::select_code_page(page));
        out.extend(commands::select_code_page_gs(page));
        push_line(&mut out, format!("CodePage 0x{:02X}", page).as_bytes());

        for row in (0x80u8..=0xFF).collect::<Vec<_>>().chunks(16) {
            push_line(&mut out, row);
        }
        out.extend([LF, LF]);
    }

    out.extend(commands::feed_lines(5));
    PrintJob::from_bytes(out)
}

// ============================================================================
// SALE RECEIPTS
// ============================================================================

/// One line item of a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub total: f64,
}

/// A completed sale, as printed at the till.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleReceipt {
    pub shop_name: String,
    pub invoice_number: String,
    pub customer_name: Option<String>,
    pub date: String,
    pub van_id: u32,
    pub cashier_name: String,
    pub items: Vec<SaleItem>,
    pub subtotal: f64,
    pub discount: f64,
    pub tax: f64,
    pub total: f64,
    #[serde(default)]
    pub currency: String,
}

/// Characters per line of a 58mm printer in its default font
pub const DEFAULT_COLUMNS: usize = 32;

/// Longest item name printed before truncation
const ITEM_NAME_CHARS: usize = 20;

/// `left` and `right` on one line of `width` characters.
///
/// Falls back to a single separating space when they do not fit.
fn columns(left: &str, right: &str, width: usize) -> String {
    let used = left.chars().count() + right.chars().count();
    let gap = width.saturating_sub(used).max(1);
    format!("{}{}{}", left, " ".repeat(gap), right)
}

impl SaleReceipt {
    fn money(&self, amount: f64) -> String {
        format!("{}{:.2}", self.currency, amount)
    }

    /// Lay the sale out for a printer with `width` columns.
    pub fn to_content(&self, width: usize) -> ReceiptContent {
        let double = "=".repeat(width);
        let single = "-".repeat(width);

        let mut body = vec![
            format!("Invoice: {}", self.invoice_number),
            format!("Date: {}", self.date),
            format!("Van: {}", self.van_id),
            format!("Cashier: {}", self.cashier_name),
        ];
        if let Some(customer) = &self.customer_name {
            body.push(format!("Customer: {}", customer));
        }
        body.push(double.clone());
        body.push("ITEMS:".to_string());
        body.push(single);

        for item in &self.items {
            body.push(item.name.chars().take(ITEM_NAME_CHARS).collect());
            body.push(columns(
                &format!("  {} x {}", item.quantity, self.money(item.unit_price)),
                &self.money(item.total),
                width,
            ));
        }

        body.push(double.clone());
        body.push(columns("Subtotal:", &self.money(self.subtotal), width));
        if self.discount > 0.0 {
            body.push(columns(
                "Discount:",
                &format!("-{}", self.money(self.discount)),
                width,
            ));
        }
        if self.tax > 0.0 {
            body.push(columns("Tax:", &self.money(self.tax), width));
        }
        body.push(double.clone());
        body.push(columns("TOTAL:", &self.money(self.total), width));
        body.push(double.clone());

        ReceiptContent::new()
            .header([self.shop_name.clone(), "Point of Sale System".to_string(), double])
            .body(body)
            .footer(["Thank you for your business!", "Please come again"])
    }
}

// ============================================================================
// SAMPLE RECEIPTS
// ============================================================================

fn demo_content() -> ReceiptContent {
    ReceiptContent::new()
        .header(["RECEIPT"])
        .body(["Item A  $5.00"])
        .footer(["THANK YOU"])
}

fn arabic_content() -> ReceiptContent {
    ReceiptContent::new()
        .header(["========", "إيصال تجريبي", "========"])
        .body(["فاتورة تجريبية", "المنتج: اسم المنتج", "السعر: ١٠٠ ريال"])
        .footer(["========", "شكراً لك"])
}

/// A representative sale, for trying the layout.
pub fn sample_sale() -> SaleReceipt {
    SaleReceipt {
        shop_name: "DIYAA STOCK".to_string(),
        invoice_number: "INV-000123".to_string(),
        customer_name: Some("محل النور".to_string()),
        date: "2024-03-14 10:32".to_string(),
        van_id: 7,
        cashier_name: "Ahmad".to_string(),
        items: vec![
            SaleItem {
                name: "مياه معدنية 500مل".to_string(),
                quantity: 12,
                unit_price: 0.5,
                total: 6.0,
            },
            SaleItem {
                name: "Orange juice 1L carton".to_string(),
                quantity: 2,
                unit_price: 2.75,
                total: 5.5,
            },
        ],
        subtotal: 11.5,
        discount: 1.0,
        tax: 0.0,
        total: 10.5,
        currency: "$".to_string(),
    }
}

// ============================================================================
// LOOKUP FUNCTIONS
// ============================================================================

/// List available sample receipts
pub fn list_receipts() -> &'static [&'static str] {
    &["demo", "arabic", "sale"]
}

/// Get sample receipt content by name, laid out for [`DEFAULT_COLUMNS`].
pub fn by_name(name: &str) -> Option<ReceiptContent> {
    by_name_with_width(name, DEFAULT_COLUMNS)
}

/// Get sample receipt content by name, laid out for a printer with `width`
/// columns (see [`PrinterProfile::columns`]).
pub fn by_name_with_width(name: &str, width: usize) -> Option<ReceiptContent> {
    match name.to_lowercase().as_str() {
        "demo" => Some(demo_content()),
        "arabic" => Some(arabic_content()),
        "sale" => Some(sample_sale().to_content(width)),
        _ => None,
    }
}
