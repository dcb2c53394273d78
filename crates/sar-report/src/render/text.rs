//! Standard-font metrics, WinAnsi encoding and word wrapping
//!
//! Generated pages only use the two standard Helvetica faces, so text can be
//! measured from the AFM advance widths without embedding any font program.

use crate::constants::{BOLD_FONT_NAME, REGULAR_FONT_NAME};

/// Font face used for a run of text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontStyle {
    #[default]
    Regular,
    Bold,
}

impl FontStyle {
    /// Name of the font in page resources
    pub fn resource_name(self) -> &'static str {
        match self {
            FontStyle::Regular => REGULAR_FONT_NAME,
            FontStyle::Bold => BOLD_FONT_NAME,
        }
    }

    /// PostScript name of the standard font
    pub fn base_font(self) -> &'static str {
        match self {
            FontStyle::Regular => "Helvetica",
            FontStyle::Bold => "Helvetica-Bold",
        }
    }

    fn ascii_widths(self) -> &'static [u16; 95] {
        match self {
            FontStyle::Regular => &HELVETICA_WIDTHS,
            FontStyle::Bold => &HELVETICA_BOLD_WIDTHS,
        }
    }
}

// Advance widths for codes 32..=126, in 1/1000 em
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    278, 278, 584, 584, 584, 556, 1015,
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    278, 278, 278, 469, 556, 333,
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,
    334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889,
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];

/// Map a character to its WinAnsiEncoding code, if it has one.
pub fn win_ansi_code(ch: char) -> Option<u8> {
    let code = ch as u32;
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as u8),
        _ => match ch {
            '\t' => Some(b' '),
            '\u{20AC}' => Some(0x80),
            '\u{201A}' => Some(0x82),
            '\u{0192}' => Some(0x83),
            '\u{201E}' => Some(0x84),
            '\u{2026}' => Some(0x85),
            '\u{2020}' => Some(0x86),
            '\u{2021}' => Some(0x87),
            '\u{02C6}' => Some(0x88),
            '\u{2030}' => Some(0x89),
            '\u{0160}' => Some(0x8A),
            '\u{2039}' => Some(0x8B),
            '\u{0152}' => Some(0x8C),
            '\u{017D}' => Some(0x8E),
            '\u{2018}' => Some(0x91),
            '\u{2019}' => Some(0x92),
            '\u{201C}' => Some(0x93),
            '\u{201D}' => Some(0x94),
            '\u{2022}' => Some(0x95),
            '\u{2013}' => Some(0x96),
            '\u{2014}' => Some(0x97),
            '\u{02DC}' => Some(0x98),
            '\u{2122}' => Some(0x99),
            '\u{0161}' => Some(0x9A),
            '\u{203A}' => Some(0x9B),
            '\u{0153}' => Some(0x9C),
            '\u{017E}' => Some(0x9E),
            '\u{0178}' => Some(0x9F),
            _ => None,
        },
    }
}

/// Encode text for a WinAnsi standard font; unmappable characters become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| win_ansi_code(ch).unwrap_or(b'?'))
        .collect()
}

/// Characters of `text` that have no WinAnsi code and print as `?`.
pub fn unmappable_characters(text: &str) -> usize {
    text.chars()
        .filter(|&ch| ch != '\n' && win_ansi_code(ch).is_none())
        .count()
}

fn code_width(code: u8, style: FontStyle) -> u16 {
    match code {
        0x20..=0x7E => style.ascii_widths()[(code - 0x20) as usize],
        0x95 => 350,
        0x85 | 0x89 | 0x97 | 0x99 => 1000,
        0x91 | 0x92 | 0x82 => 278,
        0x93 | 0x94 | 0x84 => 500,
        0xA0 => 278,
        _ => 556,
    }
}

/// Width of `text` in points at `size`.
pub fn text_width(text: &str, style: FontStyle, size: f32) -> f32 {
    let units: u32 = encode_win_ansi(text)
        .into_iter()
        .map(|code| code_width(code, style) as u32)
        .sum();
    units as f32 * size / 1000.0
}

/// Greedy word wrap. Explicit newlines always start a new line; words wider
/// than `max_width` are broken between characters.
pub fn wrap_text(text: &str, style: FontStyle, size: f32, max_width: f32) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut lines = Vec::new();
    for segment in text.split('\n') {
        let mut current = String::new();

        for word in segment.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };

            if text_width(&candidate, style, size) <= max_width {
                current = candidate;
                continue;
            }

            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }

            if text_width(word, style, size) <= max_width {
                current = word.to_string();
            } else {
                let mut pieces = break_word(word, style, size, max_width);
                current = pieces.pop().unwrap_or_default();
                lines.extend(pieces);
            }
        }

        lines.push(current);
    }

    lines
}

fn break_word(word: &str, style: FontStyle, size: f32, max_width: f32) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for ch in word.chars() {
        current.push(ch);
        if current.chars().count() > 1 && text_width(&current, style, size) > max_width {
            current.pop();
            pieces.push(std::mem::take(&mut current));
            current.push(ch);
        }
    }

    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}
