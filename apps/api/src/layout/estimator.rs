//! Layout Estimator — heuristic rendered-height estimation for content blocks.
//!
//! This is an approximation, not a measurement: average character width is a
//! fraction of the font size, wider for dual-width scripts (Hangul, CJK, kana)
//! than for Latin-only text. The estimate is order-preserving (monotonic in
//! text length) but not pixel-exact against any real font renderer — the
//! packer's safety margin absorbs the residual error.
//!
//! The width fractions are empirically tuned configuration defaults, not
//! normative physical constants.

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// Semantic role of a content block on the printed page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    Instruction,
    Passage,
    Options,
    Translation,
}

/// A named chunk of text to be placed on a printed page, with its estimated
/// rendered height in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub kind: BlockKind,
    pub text: String,
    pub estimated_height: f32,
}

/// Font and container parameters for height estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMetrics {
    pub font_size_px: f32,
    pub line_height_multiplier: f32,
    pub container_width_px: f32,
    /// Vertical padding added once per block.
    pub padding_px: f32,
    /// Average character width as a fraction of font size, Latin-only text.
    pub latin_width_fraction: f32,
    /// Average character width fraction when dual-width script chars appear.
    pub dual_width_fraction: f32,
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self {
            font_size_px: 17.0,
            line_height_multiplier: 1.55,
            container_width_px: 365.0,
            padding_px: 12.0,
            latin_width_fraction: 0.58,
            dual_width_fraction: 0.70,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Estimation
// ────────────────────────────────────────────────────────────────────────────

/// Estimates the rendered height of `text` in pixels.
///
/// `chars_per_line = floor(width / (font_size * width_fraction))`,
/// `lines = ceil(chars / chars_per_line)`,
/// `height = lines * font_size * line_height + padding`.
pub fn estimate_height(text: &str, metrics: &TextMetrics) -> f32 {
    let char_count = text.chars().count();
    if char_count == 0 {
        return metrics.padding_px;
    }

    let fraction = if contains_dual_width(text) {
        metrics.dual_width_fraction
    } else {
        metrics.latin_width_fraction
    };

    let chars_per_line = ((metrics.container_width_px / (metrics.font_size_px * fraction)).floor()
        as usize)
        .max(1);
    let lines = (char_count + chars_per_line - 1) / chars_per_line;

    lines as f32 * metrics.font_size_px * metrics.line_height_multiplier + metrics.padding_px
}

/// Builds a `ContentBlock` with its height pre-estimated.
pub fn make_block(kind: BlockKind, text: String, metrics: &TextMetrics) -> ContentBlock {
    let estimated_height = estimate_height(&text, metrics);
    ContentBlock {
        kind,
        text,
        estimated_height,
    }
}

/// True if the text contains characters from a dual-width script:
/// Hangul (syllables and jamo), CJK ideographs, hiragana, or katakana.
pub fn contains_dual_width(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c,
            '\u{AC00}'..='\u{D7A3}'   // Hangul syllables
            | '\u{1100}'..='\u{11FF}' // Hangul jamo
            | '\u{3130}'..='\u{318F}' // Hangul compatibility jamo
            | '\u{3040}'..='\u{30FF}' // hiragana + katakana
            | '\u{4E00}'..='\u{9FFF}' // CJK unified ideographs
        )
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
