//! Approximate text metrics.
//!
//! Widths come from per-character advance estimates for a sans-serif face;
//! good enough for margins and legend boxes.

use crate::primitives::{FontWeight, TextStyle};

#[derive(Debug, Clone, Copy)]
pub struct TextMetrics {
    pub width: f64,
    pub height: f64,
    pub ascent: f64,
}

/// Advance of one character in units of the font size.
fn advance(ch: char) -> f64 {
    match ch {
        'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '\'' | '|' | '!' => 0.28,
        'f' | 't' | 'r' | '(' | ')' | '[' | ']' | ' ' | '/' => 0.36,
        'm' | 'w' | 'M' | 'W' => 0.86,
        'A'..='Z' => 0.68,
        '0'..='9' => 0.56,
        '\u{2070}'..='\u{209F}' | '\u{00B2}' | '\u{00B3}' | '\u{00B9}' | '\u{1D00}'..='\u{1DBF}' => 0.36,
        _ if ch.is_ascii() => 0.52,
        _ => 0.6,
    }
}

pub fn measure_text(text: &str, style: &TextStyle) -> TextMetrics {
    let bold = if style.weight == FontWeight::Bold { 1.07 } else { 1.0 };
    let width = text.chars().map(advance).sum::<f64>() * style.size * bold;
    TextMetrics { width, height: style.size * 1.2, ascent: style.size * 0.93 }
}
