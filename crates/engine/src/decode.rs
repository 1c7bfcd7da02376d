//! Legacy archive text decoding.

use encoding_rs::SHIFT_JIS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    /// Some byte sequences were undecodable and replaced with U+FFFD.
    pub had_replacements: bool,
}

/// Decodes archive bytes as Shift_JIS (the Windows-31J superset encoding_rs ships).
///
/// Never fails: stray bytes become replacement characters and the rest of the text
/// is kept.
pub fn decode(raw: &[u8]) -> Decoded {
    let (text, had_replacements) = SHIFT_JIS.decode_without_bom_handling(raw);
    if had_replacements {
        tracing::debug!(bytes = raw.len(), "malformed shift_jis sequences replaced");
    }
    Decoded {
        text: text.into_owned(),
        had_replacements,
    }
}
