//! # ESC/POS Protocol Implementation
//!
//! Low-level builders for the ESC/POS control language and the Arabic text
//! pipeline that feeds it.
//!
//! ## Module Structure
//!
//! - [`commands`]: Initialization, character tables, feed and cut
//! - [`text`]: Alignment
//! - [`normalize`]: Unicode Arabic/Persian canonicalization
//! - [`codepage`]: Unicode → legacy 8-bit Arabic code pages
//!
//! ## Usage Example
//!
//! ```
//! use warraq::protocol::{codepage, commands, normalize::normalize, text};
//!
//! let mut data = Vec::new();
//! data.extend(commands::init());
//! data.extend(commands::select_code_page(commands::DEFAULT_ARABIC_CODE_PAGE));
//! data.extend(text::align_center());
//! text::push_line(&mut data, &codepage::encode(&normalize("فاتورة")));
//! data.extend(commands::cut_full());
//!
//! assert_eq!(&data[..2], &[0x1B, 0x40]);
//! ```

pub mod codepage;
pub mod commands;
pub mod normalize;
pub mod text;
