//! # ESC/POS Text Layout Commands
//!
//! Alignment is the only text styling the receipt jobs use. Arabic lines are
//! sent in logical order and the firmware lays them out right-to-left once an
//! Arabic code page is active, so alignment is all that is left to decide.
//!
//! ```text
//! Left aligned (body)       |Item A  $5.00
//! Center aligned (header)   |    RECEIPT
//! ```

use super::commands::{ESC, LF};

// ============================================================================
// TEXT ALIGNMENT
// ============================================================================

/// Text alignment options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left = 0,
    Center = 1,
    Right = 2,
}

/// # Set Text Alignment (ESC a n)
///
/// ## Protocol Details
///
/// | Format  | Bytes    |
/// |---------|----------|
/// | ASCII   | ESC a n  |
/// | Hex     | 1B 61 n  |
/// | Decimal | 27 97 n  |
///
/// ## Parameters
///
/// - `n = 0`: Left alignment (default)
/// - `n = 1`: Center alignment
/// - `n = 2`: Right alignment
///
/// ## Behavior
///
/// - Affects all subsequent lines until changed
/// - Only takes effect at the start of a line
/// - Reset by ESC @ (initialize)
///
/// ## Example
///
/// ```
/// use warraq::protocol::text::{align, Alignment};
///
/// assert_eq!(align(Alignment::Center), vec![0x1B, 0x61, 0x01]);
/// ```
pub fn align(alignment: Alignment) -> Vec<u8> {
    vec![ESC, b'a', alignment as u8]
}

/// Convenience function for left alignment
#[inline]
pub fn align_left() -> Vec<u8> {
    align(Alignment::Left)
}

/// Convenience function for center alignment
#[inline]
pub fn align_center() -> Vec<u8> {
    align(Alignment::Center)
}

/// Convenience function for right alignment
#[inline]
pub fn align_right() -> Vec<u8> {
    align(Alignment::Right)
}

/// Append already-encoded line bytes followed by a line feed.
#[inline]
pub fn push_line(out: &mut Vec<u8>, encoded: &[u8]) {
    out.extend_from_slice(encoded);
    out.push(LF);
}
