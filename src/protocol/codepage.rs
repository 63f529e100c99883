//! # Arabic Single-Byte Code Pages
//!
//! Converts Unicode strings to one of the legacy 8-bit Arabic code pages the
//! printer firmware can render once the matching table is selected
//! (`ESC t n` / `GS t n`).
//!
//! - ASCII (U+0000–U+007F) passes through unchanged
//! - Mapped characters become a single byte in 0x80–0xFF
//! - Anything else becomes `?` (0x3F); encoding never fails
//!
//! Run input through [`crate::protocol::normalize::normalize`] first. Neither
//! table has slots for presentation-form ligatures or Arabic-Indic digits.
//!
//! ## Tables
//!
//! | Profile | Standard | Extra letters |
//! |---------|----------|---------------|
//! | [`CodePage::Windows1256`] | Microsoft Windows-1256 | پ چ ژ گ ک ٹ ڈ ڑ ں ھ ہ ے |
//! | [`CodePage::Iso8859_6`] | ISO/IEC 8859-6 | none |

use serde::{Deserialize, Serialize};

/// Placeholder byte for characters the active table cannot represent.
pub const PLACEHOLDER: u8 = b'?';

/// A legacy 8-bit Arabic character table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CodePage {
    /// Microsoft Windows-1256 (Arabic, with Persian/Urdu letters)
    #[default]
    #[serde(rename = "windows-1256")]
    Windows1256,
    /// ISO/IEC 8859-6 (Arabic letters and harakat only)
    #[serde(rename = "iso-8859-6")]
    Iso8859_6,
}

impl CodePage {
    /// Encode a Unicode string into this code page.
    ///
    /// ## Example
    ///
    /// ```
    /// use warraq::protocol::codepage::CodePage;
    ///
    /// // "سلام" → seen, lam, alef, meem
    /// assert_eq!(CodePage::Windows1256.encode("سلام"), vec![0xD3, 0xE1, 0xC7, 0xE3]);
    /// ```
    pub fn encode(&self, text: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(text.len());
        for ch in text.chars() {
            if (ch as u32) < 0x80 {
                out.push(ch as u8);
            } else if let Some(byte) = self.byte_for(ch) {
                out.push(byte);
            } else {
                tracing::warn!(
                    code_page = self.name(),
                    "unmapped character '{}' (U+{:04X}), replacing with '?'",
                    ch,
                    ch as u32
                );
                out.push(PLACEHOLDER);
            }
        }
        out
    }

    /// Look up the byte for a non-ASCII character.
    ///
    /// Returns `None` if the character has no slot in this table.
    pub fn byte_for(&self, ch: char) -> Option<u8> {
        self.table()
            .iter()
            .find(|(mapped, _)| *mapped == ch)
            .map(|&(_, byte)| byte)
    }

    /// The full reverse table (character → byte) for the upper half.
    pub fn table(&self) -> &'static [(char, u8)] {
        match self {
            Self::Windows1256 => WINDOWS_1256,
            Self::Iso8859_6 => ISO_8859_6,
        }
    }

    /// Short identifier used in profiles and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Windows1256 => "windows-1256",
            Self::Iso8859_6 => "iso-8859-6",
        }
    }

    /// Parse a code page identifier (`windows-1256`, `cp1256`, `iso-8859-6`).
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "windows-1256" | "cp1256" | "1256" => Ok(Self::Windows1256),
            "iso-8859-6" | "iso8859-6" | "latin-arabic" => Ok(Self::Iso8859_6),
            other => Err(format!(
                "Unknown code page '{}'. Use 'windows-1256' or 'iso-8859-6'",
                other
            )),
        }
    }
}

/// Encode with the default table (Windows-1256).
pub fn encode(text: &str) -> Vec<u8> {
    CodePage::default().encode(text)
}

// ============================================================================
// WINDOWS-1256
// ============================================================================

/// Windows-1256 upper half: every slot 0x80–0xFF is assigned.
static WINDOWS_1256: &[(char, u8)] = &[
    // 0x80–0x8F
    ('€', 0x80),        // U+20AC
    ('پ', 0x81),        // U+067E Peh
    ('‚', 0x82),        // U+201A
    ('ƒ', 0x83),        // U+0192
    ('„', 0x84),        // U+201E
    ('…', 0x85),        // U+2026
    ('†', 0x86),        // U+2020
    ('‡', 0x87),        // U+2021
    ('ˆ', 0x88),        // U+02C6
    ('‰', 0x89),        // U+2030
    ('ٹ', 0x8A),        // U+0679 Tteh
    ('‹', 0x8B),        // U+2039
    ('Œ', 0x8C),        // U+0152
    ('چ', 0x8D),        // U+0686 Tcheh
    ('ژ', 0x8E),        // U+0698 Jeh
    ('ڈ', 0x8F),        // U+0688 Ddal
    // 0x90–0x9F
    ('گ', 0x90),        // U+06AF Gaf
    ('\u{2018}', 0x91), // left single quote
    ('\u{2019}', 0x92), // right single quote
    ('\u{201C}', 0x93), // left double quote
    ('\u{201D}', 0x94), // right double quote
    ('•', 0x95),        // U+2022
    ('–', 0x96),        // U+2013
    ('—', 0x97),        // U+2014
    ('ک', 0x98),        // U+06A9 Keheh
    ('™', 0x99),        // U+2122
    ('ڑ', 0x9A),        // U+0691 Rreh
    ('›', 0x9B),        // U+203A
    ('œ', 0x9C),        // U+0153
    ('\u{200C}', 0x9D), // ZWNJ
    ('\u{200D}', 0x9E), // ZWJ
    ('ں', 0x9F),        // U+06BA Noon Ghunna
    // 0xA0–0xAF
    ('\u{00A0}', 0xA0), // no-break space
    ('،', 0xA1),        // U+060C Arabic comma
    ('¢', 0xA2),
    ('£', 0xA3),
    ('¤', 0xA4),
    ('¥', 0xA5),
    ('¦', 0xA6),
    ('§', 0xA7),
    ('¨', 0xA8),
    ('©', 0xA9),
    ('ھ', 0xAA),        // U+06BE Heh Doachashmee
    ('«', 0xAB),
    ('¬', 0xAC),
    ('\u{00AD}', 0xAD), // soft hyphen
    ('®', 0xAE),
    ('¯', 0xAF),
    // 0xB0–0xBF
    ('°', 0xB0),
    ('±', 0xB1),
    ('²', 0xB2),
    ('³', 0xB3),
    ('´', 0xB4),
    ('µ', 0xB5),
    ('¶', 0xB6),
    ('·', 0xB7),
    ('¸', 0xB8),
    ('¹', 0xB9),
    ('؛', 0xBA),        // U+061B Arabic semicolon
    ('»', 0xBB),
    ('¼', 0xBC),
    ('½', 0xBD),
    ('¾', 0xBE),
    ('؟', 0xBF),        // U+061F Arabic question mark
    // 0xC0–0xCF
    ('ہ', 0xC0),        // U+06C1 Heh Goal
    ('ء', 0xC1),        // U+0621 Hamza
    ('آ', 0xC2),        // U+0622 Alef with Madda
    ('أ', 0xC3),        // U+0623 Alef with Hamza above
    ('ؤ', 0xC4),        // U+0624 Waw with Hamza
    ('إ', 0xC5),        // U+0625 Alef with Hamza below
    ('ئ', 0xC6),        // U+0626 Yeh with Hamza
    ('ا', 0xC7),        // U+0627 Alef
    ('ب', 0xC8),        // U+0628 Beh
    ('ة', 0xC9),        // U+0629 Teh Marbuta
    ('ت', 0xCA),        // U+062A Teh
    ('ث', 0xCB),        // U+062B Theh
    ('ج', 0xCC),        // U+062C Jeem
    ('ح', 0xCD),        // U+062D Hah
    ('خ', 0xCE),        // U+062E Khah
    ('د', 0xCF),        // U+062F Dal
    // 0xD0–0xDF
    ('ذ', 0xD0),        // U+0630 Thal
    ('ر', 0xD1),        // U+0631 Reh
    ('ز', 0xD2),        // U+0632 Zain
    ('س', 0xD3),        // U+0633 Seen
    ('ش', 0xD4),        // U+0634 Sheen
    ('ص', 0xD5),        // U+0635 Sad
    ('ض', 0xD6),        // U+0636 Dad
    ('×', 0xD7),        // U+00D7
    ('ط', 0xD8),        // U+0637 Tah
    ('ظ', 0xD9),        // U+0638 Zah
    ('ع', 0xDA),        // U+0639 Ain
    ('غ', 0xDB),        // U+063A Ghain
    ('ـ', 0xDC),        // U+0640 Tatweel
    ('ف', 0xDD),        // U+0641 Feh
    ('ق', 0xDE),        // U+0642 Qaf
    ('ك', 0xDF),        // U+0643 Kaf
    // 0xE0–0xEF
    ('à', 0xE0),
    ('ل', 0xE1),        // U+0644 Lam
    ('â', 0xE2),
    ('م', 0xE3),        // U+0645 Meem
    ('ن', 0xE4),        // U+0646 Noon
    ('ه', 0xE5),        // U+0647 Heh
    ('و', 0xE6),        // U+0648 Waw
    ('ç', 0xE7),
    ('è', 0xE8),
    ('é', 0xE9),
    ('ê', 0xEA),
    ('ë', 0xEB),
    ('ى', 0xEC),        // U+0649 Alef Maksura
    ('ي', 0xED),        // U+064A Yeh
    ('î', 0xEE),
    ('ï', 0xEF),
    // 0xF0–0xFF
    ('\u{064B}', 0xF0), // Fathatan
    ('\u{064C}', 0xF1), // Dammatan
    ('\u{064D}', 0xF2), // Kasratan
    ('\u{064E}', 0xF3), // Fatha
    ('ô', 0xF4),
    ('\u{064F}', 0xF5), // Damma
    ('\u{0650}', 0xF6), // Kasra
    ('÷', 0xF7),
    ('\u{0651}', 0xF8), // Shadda
    ('ù', 0xF9),
    ('\u{0652}', 0xFA), // Sukun
    ('û', 0xFB),
    ('ü', 0xFC),
    ('\u{200E}', 0xFD), // LRM
    ('\u{200F}', 0xFE), // RLM
    ('ے', 0xFF),        // U+06D2 Yeh Barree
];

// ============================================================================
// ISO-8859-6
// ============================================================================

/// ISO-8859-6 upper half: only the assigned slots are listed.
static ISO_8859_6: &[(char, u8)] = &[
    ('\u{00A0}', 0xA0),
    ('¤', 0xA4),
    ('،', 0xAC),
    ('\u{00AD}', 0xAD),
    ('؛', 0xBB),
    ('؟', 0xBF),
    ('ء', 0xC1),
    ('آ', 0xC2),
    ('أ', 0xC3),
    ('ؤ', 0xC4),
    ('إ', 0xC5),
    ('ئ', 0xC6),
    ('ا', 0xC7),
    ('ب', 0xC8),
    ('ة', 0xC9),
    ('ت', 0xCA),
    ('ث', 0xCB),
    ('ج', 0xCC),
    ('ح', 0xCD),
    ('خ', 0xCE),
    ('د', 0xCF),
    ('ذ', 0xD0),
    ('ر', 0xD1),
    ('ز', 0xD2),
    ('س', 0xD3),
    ('ش', 0xD4),
    ('ص', 0xD5),
    ('ض', 0xD6),
    ('ط', 0xD7),
    ('ظ', 0xD8),
    ('ع', 0xD9),
    ('غ', 0xDA),
    ('ـ', 0xE0),
    ('ف', 0xE1),
    ('ق', 0xE2),
    ('ك', 0xE3),
    ('ل', 0xE4),
    ('م', 0xE5),
    ('ن', 0xE6),
    ('ه', 0xE7),
    ('و', 0xE8),
    ('ى', 0xE9),
    ('ي', 0xEA),
    ('\u{064B}', 0xEB),
    ('\u{064C}', 0xEC),
    ('\u{064D}', 0xED),
    ('\u{064E}', 0xEE),
    ('\u{064F}', 0xEF),
    ('\u{0650}', 0xF0),
    ('\u{0651}', 0xF1),
    ('\u{0652}', 0xF2),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::normalize::normalize;
    use std::collections::HashSet;

    const ALL: [CodePage; 2] = [CodePage::Windows1256, CodePage::Iso8859_6];

    #[test]
    fn test_ascii_passthrough() {
        for cp in ALL {
            assert_eq!(cp.encode("Hello, world!"), b"Hello, world!");
            assert_eq!(cp.encode("Item A  $5.00"), b"Item A  $5.00");
        }
    }

    #[test]
    fn test_ascii_survives_normalize_then_encode() {
        let s: String = (0u8..0x80).map(char::from).collect();
        assert_eq!(encode(&normalize(&s)), s.as_bytes());
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(encode(""), b"");
    }

    #[test]
    fn test_every_table_entry_maps_exactly() {
        for cp in ALL {
            for &(ch, byte) in cp.table() {
                assert_eq!(cp.encode(&ch.to_string()), vec![byte], "{} {:?}", cp.name(), ch);
            }
        }
    }

    #[test]
    fn test_tables_are_one_to_one_in_upper_half() {
        for cp in ALL {
            let mut chars = HashSet::new();
            let mut bytes = HashSet::new();
            for &(ch, byte) in cp.table() {
                assert!(byte >= 0x80, "{} maps {:?} below 0x80", cp.name(), ch);
                assert!((ch as u32) >= 0x80);
                assert!(chars.insert(ch), "duplicate char {:?}", ch);
                assert!(bytes.insert(byte), "duplicate byte {:#04X}", byte);
            }
        }
        assert_eq!(WINDOWS_1256.len(), 128);
    }

    #[test]
    fn test_windows_1256_letters() {
        assert_eq!(encode("ء"), vec![0xC1]);
        assert_eq!(encode("ا"), vec![0xC7]);
        assert_eq!(encode("ط"), vec![0xD8]);
        assert_eq!(encode("ـ"), vec![0xDC]);
        assert_eq!(encode("ل"), vec![0xE1]);
        assert_eq!(encode("ي"), vec![0xED]);
    }

    #[test]
    fn test_windows_1256_persian_letters() {
        assert_eq!(encode("پچژگ"), vec![0x81, 0x8D, 0x8E, 0x90]);
    }

    #[test]
    fn test_windows_1256_punctuation_and_harakat() {
        assert_eq!(encode("،؛؟"), vec![0xA1, 0xBA, 0xBF]);
        assert_eq!(
            encode("\u{064B}\u{064C}\u{064D}\u{064E}\u{064F}\u{0650}\u{0651}\u{0652}"),
            vec![0xF0, 0xF1, 0xF2, 0xF3, 0xF5, 0xF6, 0xF8, 0xFA]
        );
    }

    #[test]
    fn test_iso_8859_6_letters() {
        let cp = CodePage::Iso8859_6;
        assert_eq!(cp.encode("ا"), vec![0xC7]);
        assert_eq!(cp.encode("ط"), vec![0xD7]);
        assert_eq!(cp.encode("ـ"), vec![0xE0]);
        assert_eq!(cp.encode("ل"), vec![0xE4]);
        assert_eq!(cp.encode("،؛؟"), vec![0xAC, 0xBB, 0xBF]);
    }

    #[test]
    fn test_unmapped_char_becomes_question_mark() {
        assert_eq!(encode("★"), vec![PLACEHOLDER]);
        // Arabic-Indic digits are not in either table
        assert_eq!(encode("٣"), vec![PLACEHOLDER]);
        // ISO-8859-6 has no Persian letters
        assert_eq!(CodePage::Iso8859_6.encode("پ"), vec![PLACEHOLDER]);
        // Lam-Alef ligature is not a slot
        assert_eq!(encode("\u{FEFB}"), vec![PLACEHOLDER]);
    }

    #[test]
    fn test_lam_alef_ligature_after_normalize() {
        assert_eq!(encode(&normalize("\u{FEFB}")), vec![0xE1, 0xC7]);
    }

    #[test]
    fn test_mixed_text() {
        // "Total: ١٠٠ ريال" after normalization
        assert_eq!(
            encode(&normalize("ريال ١٠٠")),
            vec![0xD1, 0xED, 0xC7, 0xE1, b' ', b'1', b'0', b'0']
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!(CodePage::parse("windows-1256"), Ok(CodePage::Windows1256));
        assert_eq!(CodePage::parse("CP1256"), Ok(CodePage::Windows1256));
        assert_eq!(CodePage::parse("ISO_8859_6"), Ok(CodePage::Iso8859_6));
        assert!(CodePage::parse("cp437").is_err());
    }

    #[test]
    fn test_serde_names_match_parse() {
        for cp in ALL {
            let json = serde_json::to_string(&cp).unwrap();
            assert_eq!(json, format!("\"{}\"", cp.name()));
            assert_eq!(serde_json::from_str::<CodePage>(&json).unwrap(), cp);
        }
    }
}
