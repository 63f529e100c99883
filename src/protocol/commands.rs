//! # ESC/POS Protocol Commands
//!
//! This module implements the subset of the ESC/POS command language used to
//! drive generic 58mm/80mm Bluetooth receipt printers (Xprinter, Goojprt,
//! MTP, and the many ISSC-module clones sold with POS tablets).
//!
//! ## Protocol Overview
//!
//! ESC/POS is a byte-oriented protocol: printable bytes are rendered through
//! the active code page, and control sequences start with an escape byte.
//! This crate only needs:
//!
//! - **Initialization**: reset the printer to power-on defaults
//! - **Character tables**: international character set and code page
//! - **Layout**: alignment and line feeds
//! - **Paper control**: feeding and cutting
//!
//! ## Escape Sequence Structure
//!
//! - Single byte: `LF`
//! - Two bytes: `ESC @`
//! - With parameters: `ESC t n`, `GS V m n`
//!
//! ## Code Page Selection
//!
//! Firmware disagrees about which opcode selects the character table. Epson
//! documents `ESC t n`; several clone firmwares only honour `GS t n`. Both are
//! sent by the job builder, see [`select_code_page`] and
//! [`select_code_page_gs`].

// ============================================================================
// ESCAPE SEQUENCE CONSTANTS
// ============================================================================

/// ESC (Escape) - Command prefix byte
pub const ESC: u8 = 0x1B;

/// GS (Group Separator) - Extended command prefix
///
/// - Hex: 0x1D, Decimal: 29
/// - Used for cutter control and the alternate code-page opcode
pub const GS: u8 = 0x1D;

/// LF (Line Feed) - Print the line buffer and advance one line
pub const LF: u8 = 0x0A;

/// `ESC R` value that selects the Arabic/international character set on the
/// printers this crate targets.
pub const CHARSET_ARABIC: u8 = 0x08;

/// Code page number that renders Arabic on the reference printer.
///
/// Found with the code page diagnostics sheet
/// ([`crate::receipt::code_page_diagnostics`]); other firmwares may differ,
/// which is why the value lives in [`crate::printer::PrinterProfile`].
///
/// Firmware tables list slot 0x16 as "CP864", but the diagnostics sheet shows
/// the reference printer rendering Windows-1256 bytes there, so the default
/// profile pairs this number with
/// [`CodePage::Windows1256`](crate::protocol::codepage::CodePage::Windows1256).
/// IBM CP864 proper stores pre-shaped presentation forms and is not offered.
pub const DEFAULT_ARABIC_CODE_PAGE: u8 = 0x16;

// ============================================================================
// INITIALIZATION COMMANDS
// ============================================================================

/// # Initialize Printer (ESC @)
///
/// Resets the printer to its power-on default state. Every job starts with it.
///
/// ## Protocol Details
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | ESC @ |
/// | Hex     | 1B 40 |
/// | Decimal | 27 64 |
///
/// ## What Gets Reset
///
/// - Print buffer is cleared
/// - Alignment reset to left
/// - Character table reset to the firmware default (usually PC437)
///
/// ## Example
///
/// ```
/// use warraq::protocol::commands;
///
/// assert_eq!(commands::init(), vec![0x1B, 0x40]);
/// ```
#[inline]
pub fn init() -> Vec<u8> {
    vec![ESC, b'@']
}

// ============================================================================
// CHARACTER TABLE COMMANDS
// ============================================================================

/// # Select International Character Set (ESC R n)
///
/// | Format  | Bytes    |
/// |---------|----------|
/// | ASCII   | ESC R n  |
/// | Hex     | 1B 52 n  |
///
/// Replaces a handful of ASCII punctuation slots with national variants.
/// The Arabic-capable firmwares expect `n = 8` before a code page switch.
#[inline]
pub fn select_international_charset(n: u8) -> Vec<u8> {
    vec![ESC, b'R', n]
}

/// # Select Character Code Table (ESC t n)
///
/// | Format  | Bytes    |
/// |---------|----------|
/// | ASCII   | ESC t n  |
/// | Hex     | 1B 74 n  |
/// | Decimal | 27 116 n |
///
/// Selects which table bytes 0x80–0xFF are rendered from.
///
/// ## Example
///
/// ```
/// use warraq::protocol::commands;
///
/// assert_eq!(commands::select_code_page(0x16), vec![0x1B, 0x74, 0x16]);
/// ```
#[inline]
pub fn select_code_page(n: u8) -> Vec<u8> {
    vec![ESC, b't', n]
}

/// # Select Character Code Table, clone firmware variant (GS t n)
///
/// | Format  | Bytes    |
/// |---------|----------|
/// | ASCII   | GS t n   |
/// | Hex     | 1D 74 n  |
///
/// Same meaning as [`select_code_page`] on firmwares that ignore `ESC t`.
#[inline]
pub fn select_code_page_gs(n: u8) -> Vec<u8> {
    vec![GS, b't', n]
}

// ============================================================================
// PAPER FEED COMMANDS
// ============================================================================

/// # Print and Feed n Lines (ESC d n)
///
/// | Format  | Bytes    |
/// |---------|----------|
/// | ASCII   | ESC d n  |
/// | Hex     | 1B 64 n  |
/// | Decimal | 27 100 n |
///
/// Prints the line buffer and feeds `n` lines at the current line spacing.
///
/// ## Example
///
/// ```
/// use warraq::protocol::commands;
///
/// assert_eq!(commands::feed_lines(3), vec![0x1B, 0x64, 0x03]);
/// ```
#[inline]
pub fn feed_lines(n: u8) -> Vec<u8> {
    vec![ESC, b'd', n]
}

// ============================================================================
// CUTTER CONTROL COMMANDS
// ============================================================================

/// # Feed and Full Cut (GS V 66 n)
///
/// | Format  | Bytes       |
/// |---------|-------------|
/// | ASCII   | GS V B n    |
/// | Hex     | 1D 56 42 n  |
/// | Decimal | 29 86 66 n  |
///
/// Feeds to the cutting position plus `n` motion units and performs a full
/// cut. This crate always sends `n = 0`.
///
/// Some printers cut before the last printed line has cleared the head, so
/// the job builder follows this with [`feed_lines`].
#[inline]
pub fn cut_full() -> Vec<u8> {
    vec![GS, b'V', 0x42, 0x00]
}

/// # Partial Cut (GS V 1)
///
/// | Format  | Bytes    |
/// |---------|----------|
/// | ASCII   | GS V 1   |
/// | Hex     | 1D 56 01 |
///
/// Cuts leaving a small hinge. Used by the self-test page.
#[inline]
pub fn cut_partial() -> Vec<u8> {
    vec![GS, b'V', 0x01]
}

// ============================================================================
// TESTS
// ============================================================================
