//! Reversible safe-alphabet transform for stored text.
//!
//! Field values scraped from the tracker may hold raw control bytes. In
//! [`TextMode::Base64`] every transformable value is stored as standard
//! base64 of its UTF-8 bytes and decoded exactly on load.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{Error, Result};

/// How text values are written into a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextMode {
    /// Base64 of the UTF-8 bytes.
    #[default]
    Base64,
    /// Stored verbatim. The container is not guaranteed to reload.
    Raw,
}

impl TextMode {
    #[must_use]
    pub fn encode(self, value: &str) -> String {
        match self {
            Self::Base64 => STANDARD.encode(value.as_bytes()),
            Self::Raw => value.to_string(),
        }
    }

    /// Reverse [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedContainer`] if the value is not valid base64
    /// or does not decode to UTF-8.
    pub fn decode(self, value: &str) -> Result<String> {
        match self {
            Self::Base64 => {
                let bytes = STANDARD
                    .decode(value)
                    .map_err(|e| Error::MalformedContainer(format!("bad base64 value: {e}")))?;
                String::from_utf8(bytes)
                    .map_err(|e| Error::MalformedContainer(format!("value is not UTF-8: {e}")))
            }
            Self::Raw => Ok(value.to_string()),
        }
    }
}
