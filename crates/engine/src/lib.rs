//! Document engine: archive bytes → decoded text → structured document.

use bunko_core::{Settings, StructuredDocument};

mod decode;
mod markup;
pub mod render;

pub use decode::{Decoded, decode};
pub use markup::{ParseOptions, parse};

#[derive(Debug, Clone, Default)]
pub struct Engine {
    options: ParseOptions,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::with_options(ParseOptions::from_settings(settings))
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn decode(&self, raw: &[u8]) -> Decoded {
        decode(raw)
    }

    pub fn parse(&self, text: &str) -> StructuredDocument {
        parse(text, &self.options)
    }

    /// Decodes and parses in one step. The flag reports replaced bytes.
    pub fn read(&self, raw: &[u8]) -> (StructuredDocument, bool) {
        let decoded = self.decode(raw);
        (self.parse(&decoded.text), decoded.had_replacements)
    }
}
