//! Character-scrolling text
//!
//! Slides a fixed-width window across one long string. The window is measured
//! in printable characters; escape sequences ride along with the glyph they
//! precede and never consume width.
//!
//! ```text
//!   source:  §aHello §lWorld        width = 5
//!
//!   offset -2   "  §aHel"            enters from the right
//!   offset  0   "§aHello"
//!   offset  6   "§a§lWorld"          carried colour + format re-applied
//!   offset 11   "     "              end of string, then wraps to 1 - width
//! ```

use super::format::{code_kind, colorize, CodeKind, PlaceholderPattern, HEX_CODE};
use super::Cooldown;
use crate::addressing::ESCAPE;

/// Active colour and format at a glyph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Style {
    /// Full colour escape sequence (`§a`, or `§x§r§r§g§g§b§b`)
    color: String,
    format: Option<char>,
}

impl Style {
    fn write_prefix(&self, out: &mut String) {
        out.push_str(&self.color);
        if let Some(format) = self.format {
            out.push(ESCAPE);
            out.push(format);
        }
    }
}

/// One printable character with the escape sequences directly before it
#[derive(Debug, Clone)]
struct Glyph {
    ch: char,
    codes_before: String,
    style: Style,
}

/// Text that scrolls through a fixed-width window
#[derive(Debug, Clone)]
pub struct ScrollingText {
    /// Text as configured, before colour translation
    original: String,
    /// Text currently scrolled, placeholders applied
    current: String,
    glyphs: Vec<Glyph>,
    width: usize,
    offset: isize,
    cooldown: Cooldown,
}

impl ScrollingText {
    /// Create scrolling text over `text` with a window of `width` characters
    #[must_use]
    pub fn new(text: impl Into<String>, width: usize, cooldown: Cooldown) -> Self {
        let original = text.into();
        let glyphs = parse(&colorize(&original));
        Self {
            current: original.clone(),
            original,
            glyphs,
            width: width.max(1),
            offset: 0,
            cooldown,
        }
    }

    /// Window width in printable characters
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Printable length of the scrolled text
    #[must_use]
    pub fn printable_len(&self) -> usize {
        self.glyphs.len()
    }

    /// Current scroll offset; negative while the text enters from the right
    #[must_use]
    pub fn offset(&self) -> isize {
        self.offset
    }

    /// Whether the text is long enough to scroll at all
    #[must_use]
    pub fn scrolls(&self) -> bool {
        self.glyphs.len() > self.width
    }

    /// Render the window at the current offset
    #[must_use]
    pub fn visible(&self) -> String {
        let mut out = String::new();
        let mut shown = 0;

        let start = if self.offset < 0 {
            let blanks = self.offset.unsigned_abs().min(self.width);
            out.extend(std::iter::repeat(' ').take(blanks));
            shown = blanks;
            0
        } else {
            let start = self.offset.unsigned_abs();
            if let Some(first) = self.glyphs.get(start) {
                first.style.write_prefix(&mut out);
            }
            start
        };

        for (index, glyph) in self.glyphs.iter().enumerate().skip(start) {
            if shown >= self.width {
                break;
            }
            if self.offset < 0 || index != start {
                out.push_str(&glyph.codes_before);
            }
            out.push(glyph.ch);
            shown += 1;
        }

        out.extend(std::iter::repeat(' ').take(self.width - shown));
        out
    }

    /// Move one printable character forward if the cooldown fires
    pub fn advance(&mut self) {
        if !self.scrolls() || !self.cooldown.fire() {
            return;
        }
        if self.offset >= self.end() {
            self.offset = 1 - self.width_signed();
        } else {
            self.offset += 1;
        }
    }

    /// Replace `%key%` / `{key}` in the scrolled text
    pub fn apply_placeholder(&mut self, pattern: &PlaceholderPattern, value: &str) {
        self.current = pattern.replace(&self.current, value).into_owned();
        self.reparse();
    }

    /// Restore the configured text
    pub fn reset_placeholders(&mut self) {
        self.current.clone_from(&self.original);
        self.reparse();
    }

    /// Configured text with placeholders applied
    #[must_use]
    pub fn text(&self) -> &str {
        &self.current
    }

    fn reparse(&mut self) {
        self.glyphs = parse(&colorize(&self.current));
        if !self.scrolls() || self.offset > self.end() {
            self.offset = 0;
        }
    }

    fn end(&self) -> isize {
        isize::try_from(self.glyphs.len()).unwrap_or(isize::MAX)
    }

    fn width_signed(&self) -> isize {
        isize::try_from(self.width).unwrap_or(isize::MAX)
    }
}

/// Split colourised text into glyphs, tracking the style each one renders in
fn parse(text: &str) -> Vec<Glyph> {
    let chars: Vec<char> = text.chars().collect();
    let mut glyphs = Vec::with_capacity(chars.len());
    let mut style = Style::default();
    let mut pending = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != ESCAPE {
            glyphs.push(Glyph {
                ch: c,
                codes_before: std::mem::take(&mut pending),
                style: style.clone(),
            });
            i += 1;
            continue;
        }

        // A trailing introducer with no payload renders nothing
        let Some(&code) = chars.get(i + 1) else {
            break;
        };
        i += 2;

        match code_kind(code) {
            Some(CodeKind::Hex) => {
                let mut sequence = format!("{ESCAPE}{HEX_CODE}");
                for _ in 0..6 {
                    match (chars.get(i), chars.get(i + 1)) {
                        (Some(&ESCAPE), Some(digit)) if digit.is_ascii_hexdigit() => {
                            sequence.push(ESCAPE);
                            sequence.push(*digit);
                            i += 2;
                        }
                        _ => break,
                    }
                }
                pending.push_str(&sequence);
                style.color = sequence;
            }
            Some(CodeKind::Color) => {
                style.color = format!("{ESCAPE}{code}");
                pending.push(ESCAPE);
                pending.push(code);
            }
            Some(CodeKind::Format) => {
                style.format = Some(code);
                pending.push(ESCAPE);
                pending.push(code);
            }
            Some(CodeKind::Reset) => {
                style = Style::default();
                pending.push(ESCAPE);
                pending.push(code);
            }
            None => {
                tracing::warn!(code = %code, "Dropping invalid colour code in scrolling text");
            }
        }
    }

    glyphs
}
