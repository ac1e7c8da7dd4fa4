//! Colour/format code handling
//!
//! Text arrives with `&` alternate codes and leaves with the `§` escape
//! introducer. An escape sequence is always two characters: the introducer and
//! one payload character. Escape sequences render no glyph, so every width
//! calculation here runs over the stripped text.

use std::borrow::Cow;

use regex::{NoExpand, Regex};

use crate::addressing::ESCAPE;

/// Alternate escape introducer accepted in configuration
pub const ALT_ESCAPE: char = '&';

/// Payload of the reset code
pub const RESET_CODE: char = 'r';

/// Payload of the bold code
pub const BOLD_CODE: char = 'l';

/// Payload introducing an `§x§R§R§G§G§B§B` hex colour
pub const HEX_CODE: char = 'x';

/// Kind of an escape payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    /// `0-9`, `a-f`
    Color,
    /// `k-o`
    Format,
    /// `r`
    Reset,
    /// `x`, start of a hex colour
    Hex,
}

/// Classify an escape payload, case-insensitively
#[must_use]
pub fn code_kind(code: char) -> Option<CodeKind> {
    match code.to_ascii_lowercase() {
        '0'..='9' | 'a'..='f' => Some(CodeKind::Color),
        'k'..='o' => Some(CodeKind::Format),
        RESET_CODE => Some(CodeKind::Reset),
        HEX_CODE => Some(CodeKind::Hex),
        _ => None,
    }
}

/// Translate `&` codes (and `&#RRGGBB`) into `§` escape sequences
#[must_use]
pub fn colorize(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == ALT_ESCAPE {
            if let Some(hex) = hex_color_at(&chars, i + 1) {
                out.push(ESCAPE);
                out.push(HEX_CODE);
                for digit in hex {
                    out.push(ESCAPE);
                    out.push(digit);
                }
                i += 8;
                continue;
            }
            if let Some(&code) = chars.get(i + 1) {
                if code_kind(code).is_some() {
                    out.push(ESCAPE);
                    out.push(code.to_ascii_lowercase());
                    i += 2;
                    continue;
                }
            }
        }
        out.push(c);
        i += 1;
    }

    out
}

fn hex_color_at(chars: &[char], start: usize) -> Option<[char; 6]> {
    if chars.get(start) != Some(&'#') {
        return None;
    }
    let digits = chars.get(start + 1..start + 7)?;
    if !digits.iter().all(char::is_ascii_hexdigit) {
        return None;
    }
    let mut hex = ['0'; 6];
    for (slot, digit) in hex.iter_mut().zip(digits) {
        *slot = digit.to_ascii_lowercase();
    }
    Some(hex)
}

/// Remove every escape sequence, plus a dangling trailing introducer
#[must_use]
pub fn strip(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == ESCAPE {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}

/// Number of printable characters
#[must_use]
pub fn visible_len(text: &str) -> usize {
    let mut len = 0;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == ESCAPE {
            chars.next();
        } else {
            len += 1;
        }
    }
    len
}

/// Rendered width, counting bold glyphs as `1 + bold_compensation`
#[must_use]
pub fn visual_width(text: &str, bold_compensation: f32) -> f32 {
    let mut width = 0.0;
    let mut bold = false;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == ESCAPE {
            if let Some(code) = chars.next() {
                bold = code.eq_ignore_ascii_case(&BOLD_CODE);
            }
        } else {
            width += if bold { 1.0 + bold_compensation } else { 1.0 };
        }
    }
    width
}

/// Width-trimming rule for one column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimRule {
    /// Maximum printable characters before trimming kicks in
    pub width: usize,
    /// Extra visual width charged per bold character
    pub bold_compensation: f32,
    /// Characters kept free at the right edge once trimming applies
    pub margin: usize,
}

impl TrimRule {
    /// Trim `text` if its stripped length exceeds the column width
    ///
    /// Escape sequences are never split; a trailing introducer is dropped.
    #[must_use]
    pub fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if visible_len(text) <= self.width {
            return Cow::Borrowed(text);
        }

        #[allow(clippy::cast_precision_loss)]
        let budget = self.width.saturating_sub(self.margin) as f32;
        let mut used = 0.0;
        let mut bold = false;
        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars();

        while let Some(c) = chars.next() {
            if c == ESCAPE {
                let Some(code) = chars.next() else { break };
                bold = code.eq_ignore_ascii_case(&BOLD_CODE);
                out.push(c);
                out.push(code);
                continue;
            }
            let cost = if bold { 1.0 + self.bold_compensation } else { 1.0 };
            if used + cost > budget {
                break;
            }
            used += cost;
            out.push(c);
        }

        Cow::Owned(out)
    }

    /// Left-pad `text` so it sits in the middle of the column
    #[must_use]
    pub fn center(&self, text: &str) -> String {
        #[allow(clippy::cast_precision_loss)]
        let free = self.width as f32 - visual_width(text, self.bold_compensation);
        if free < 2.0 {
            return text.to_string();
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let pad = (free / 2.0) as usize;
        format!("{}{text}", " ".repeat(pad))
    }
}

// =============================================================================
// Placeholders
// =============================================================================

/// Compiled matcher for `%key%` and `{key}`
#[derive(Debug, Clone)]
pub struct PlaceholderPattern {
    key: String,
    regex: Regex,
}

impl PlaceholderPattern {
    /// Compile the matcher for one key
    ///
    /// # Errors
    ///
    /// Returns the regex error if the escaped key still fails to compile.
    pub fn new(key: &str) -> Result<Self, regex::Error> {
        let escaped = regex::escape(key);
        let regex = Regex::new(&format!(r"%{escaped}%|\{{{escaped}\}}"))?;
        Ok(Self {
            key: key.to_string(),
            regex,
        })
    }

    /// The key this pattern matches
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Replace every occurrence with `value`, taken literally
    #[must_use]
    pub fn replace<'a>(&self, text: &'a str, value: &str) -> Cow<'a, str> {
        self.regex.replace_all(text, NoExpand(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_colorize_alternate_codes() {
        assert_eq!(colorize("&aHello &lWorld"), "§aHello §lWorld");
        assert_eq!(colorize("A & B"), "A & B");
        assert_eq!(colorize("&zinvalid"), "&zinvalid");
    }

    #[test]
    fn test_colorize_hex() {
        assert_eq!(colorize("&#FF00aaX"), "§x§f§f§0§0§a§aX");
        assert_eq!(colorize("&#FF00"), "&#FF00");
    }

    #[test]
    fn test_strip_and_len() {
        assert_eq!(strip("§aHi §lthere§"), "Hi there");
        assert_eq!(visible_len("§aHi §lthere"), 8);
        assert_eq!(visible_len(""), 0);
    }

    #[test]
    fn test_visual_width_counts_bold() {
        assert!((visual_width("ab§lcd", 0.5) - 5.0).abs() < f32::EPSILON);
        assert!((visual_width("§lab§rcd", 0.5) - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_trim_leaves_short_text() {
        let rule = TrimRule {
            width: 10,
            bold_compensation: 0.125,
            margin: 4,
        };
        assert!(matches!(rule.apply("§ashort"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_trim_long_text_keeps_codes_whole() {
        let rule = TrimRule {
            width: 10,
            bold_compensation: 0.125,
            margin: 4,
        };
        let trimmed = rule.apply("§aabcdefghijklmnop");
        assert_eq!(trimmed, "§aabcdef");
        assert_eq!(visible_len(&trimmed), 6);
    }

    #[test]
    fn test_trim_charges_bold() {
        let rule = TrimRule {
            width: 10,
            bold_compensation: 1.0,
            margin: 4,
        };
        // budget 6, bold glyphs cost 2
        assert_eq!(rule.apply("§labcdefghijkl"), "§labc");
    }

    #[test]
    fn test_center_pads_left() {
        let rule = TrimRule {
            width: 10,
            bold_compensation: 0.125,
            margin: 4,
        };
        assert_eq!(rule.center("abcd"), "   abcd");
        assert_eq!(rule.center("abcdefghi"), "abcdefghi");
    }

    #[test]
    fn test_placeholder_both_forms() {
        let pattern = PlaceholderPattern::new("player").unwrap();
        assert_eq!(
            pattern.replace("%player% and {player}", "Alex"),
            "Alex and Alex"
        );
        assert_eq!(pattern.replace("%other%", "Alex"), "%other%");
    }

    #[test]
    fn test_placeholder_value_is_literal() {
        let pattern = PlaceholderPattern::new("cost").unwrap();
        assert_eq!(pattern.replace("{cost}", "$1.00"), "$1.00");
    }

    #[test]
    fn test_placeholder_key_is_escaped() {
        let pattern = PlaceholderPattern::new("a.b").unwrap();
        assert_eq!(pattern.replace("%a.b% %axb%", "x"), "x %axb%");
    }
}
