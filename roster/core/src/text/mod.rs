//! Animated Text - Frame Cycling and Scrolling
//!
//! Every string the roster shows (column titles, entries, header and footer
//! lines) is an [`AnimatedText`]. [`AnimatedText::advance`] is called once
//! per delivered render; each text decides from its own [`Cooldown`] whether
//! that call moves it.
//!
//! # Design Philosophy
//!
//! Time is measured in delivered ticks, not wall-clock time. A text configured
//! with an interval of 20 moves on every 20th tick no matter how long the host
//! took to render, so every slot on a page stays in lockstep.
//!
//! ```text
//!   tick:      1   2   3   4   5   6
//!   interval 2     ●       ●       ●      (● = advance fires)
//!   interval 3         ●           ●
//!   disabled                               (never fires)
//! ```

pub mod format;
pub mod frames;
pub mod scrolling;

use std::borrow::Cow;

pub use format::{PlaceholderPattern, TrimRule};
pub use frames::{FrameState, FrameText};
pub use scrolling::ScrollingText;

/// Tick-counted cooldown
///
/// Fires on every `interval`-th call to [`Cooldown::fire`]. Intervals of 0 and
/// 1 fire on every call; a negative interval never fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cooldown {
    interval: i32,
    elapsed: i32,
}

impl Cooldown {
    /// Cooldown that fires every `interval` ticks
    #[must_use]
    pub const fn new(interval: i32) -> Self {
        Self {
            interval,
            elapsed: 0,
        }
    }

    /// Cooldown that never fires
    #[must_use]
    pub const fn disabled() -> Self {
        Self::new(-1)
    }

    /// Whether this cooldown can ever fire
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.interval < 0
    }

    /// Count one tick; true when the cooldown fires
    pub fn fire(&mut self) -> bool {
        if self.is_disabled() {
            return false;
        }
        self.elapsed += 1;
        if self.elapsed >= self.interval.max(1) {
            self.elapsed = 0;
            true
        } else {
            false
        }
    }

    /// Start counting again from zero
    pub fn reset(&mut self) {
        self.elapsed = 0;
    }
}

/// A value that produces successive display strings over time
#[derive(Debug, Clone)]
pub enum AnimatedText {
    /// Steps through whole frames
    Frames(FrameText),
    /// Slides a window across one string
    Scrolling(ScrollingText),
}

impl AnimatedText {
    /// Text that never changes
    #[must_use]
    pub fn fixed(text: impl Into<String>) -> Self {
        Self::Frames(FrameText::fixed(text))
    }

    /// Current display string
    #[must_use]
    pub fn visible(&self) -> Cow<'_, str> {
        match self {
            Self::Frames(text) => Cow::Borrowed(text.visible()),
            Self::Scrolling(text) => Cow::Owned(text.visible()),
        }
    }

    /// Count one tick
    pub fn advance(&mut self) {
        match self {
            Self::Frames(text) => text.advance(),
            Self::Scrolling(text) => text.advance(),
        }
    }

    /// Substitute a placeholder, keeping the configured text for reset
    pub fn apply_placeholder(&mut self, pattern: &PlaceholderPattern, value: &str) {
        match self {
            Self::Frames(text) => text.apply_placeholder(pattern, value),
            Self::Scrolling(text) => text.apply_placeholder(pattern, value),
        }
    }

    /// Restore the configured text
    pub fn reset_placeholders(&mut self) {
        match self {
            Self::Frames(text) => text.reset_placeholders(),
            Self::Scrolling(text) => text.reset_placeholders(),
        }
    }
}

impl From<FrameText> for AnimatedText {
    fn from(text: FrameText) -> Self {
        Self::Frames(text)
    }
}

impl From<ScrollingText> for AnimatedText {
    fn from(text: ScrollingText) -> Self {
        Self::Scrolling(text)
    }
}
