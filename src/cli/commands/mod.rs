//! Command implementations.

pub mod archive;
pub mod completions;
pub mod sync;
pub mod version;

use crate::archive::TextMode;

/// Text transform selected by `--raw-text`.
#[must_use]
pub fn text_mode(raw_text: bool) -> TextMode {
    if raw_text { TextMode::Raw } else { TextMode::Base64 }
}
