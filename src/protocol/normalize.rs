//! # Arabic Text Normalization
//!
//! Brings arbitrary Unicode Arabic/Persian input into the form the single-byte
//! code page tables can represent:
//!
//! 1. NFKC compatibility normalization (folds presentation forms back to base
//!    letters and composes hamza/madda combinations)
//! 2. Lam-Alef ligatures (U+FEF5–U+FEFC) split into Lam + the Alef variant
//! 3. Arabic-Indic (U+0660–U+0669) and Extended Arabic-Indic (U+06F0–U+06F9)
//!    digits rewritten to ASCII `0`–`9`
//!
//! The function is total and idempotent: `normalize(normalize(s)) ==
//! normalize(s)` for every input.

use unicode_normalization::UnicodeNormalization;

const LAM: char = '\u{0644}';

/// Normalize text for single-byte Arabic encoding.
///
/// ## Example
///
/// ```
/// use warraq::protocol::normalize::normalize;
///
/// // Lam-Alef isolated ligature becomes two letters
/// assert_eq!(normalize("\u{FEFB}"), "\u{0644}\u{0627}");
/// // Arabic-Indic digits become ASCII
/// assert_eq!(normalize("١٢٣"), "123");
/// ```
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.nfkc() {
        match ch {
            '\u{FEF5}' | '\u{FEF6}' => {
                out.push(LAM);
                out.push('\u{0622}');
            }
            '\u{FEF7}' | '\u{FEF8}' => {
                out.push(LAM);
                out.push('\u{0623}');
            }
            '\u{FEF9}' | '\u{FEFA}' => {
                out.push(LAM);
                out.push('\u{0625}');
            }
            '\u{FEFB}' | '\u{FEFC}' => {
                out.push(LAM);
                out.push('\u{0627}');
            }
            other => out.push(ascii_digit(other).unwrap_or(other)),
        }
    }
    out
}

/// Map an Arabic-Indic or Extended Arabic-Indic digit to its ASCII digit.
fn ascii_digit(ch: char) -> Option<char> {
    let base = match ch {
        '\u{0660}'..='\u{0669}' => 0x0660,
        '\u{06F0}'..='\u{06F9}' => 0x06F0,
        _ => return None,
    };
    char::from_digit(ch as u32 - base, 10)
}
