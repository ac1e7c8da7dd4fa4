//! Frame-cycling text
//!
//! Steps through a fixed list of whole strings. The cursor is a plain index
//! taken modulo the frame count.

use super::format::PlaceholderPattern;
use super::Cooldown;

/// Position of a [`FrameText`] in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Never advanced; renders frame 0
    Uninitialized,
    /// Showing the frame at this index
    AtFrame(usize),
}

/// Text that cycles through frames on a cooldown
#[derive(Debug, Clone)]
pub struct FrameText {
    /// Frames as configured
    original: Vec<String>,
    /// Frames with placeholders applied
    frames: Vec<String>,
    state: FrameState,
    cooldown: Cooldown,
}

impl FrameText {
    /// Create frame text; an empty list becomes a single blank frame
    #[must_use]
    pub fn new(frames: Vec<String>, cooldown: Cooldown) -> Self {
        let frames = if frames.is_empty() {
            vec![String::new()]
        } else {
            frames
        };
        Self {
            original: frames.clone(),
            frames,
            state: FrameState::Uninitialized,
            cooldown,
        }
    }

    /// Single static frame
    #[must_use]
    pub fn fixed(text: impl Into<String>) -> Self {
        Self::new(vec![text.into()], Cooldown::disabled())
    }

    /// Current frame
    #[must_use]
    pub fn visible(&self) -> &str {
        &self.frames[self.index()]
    }

    /// Step forward one frame if the cooldown fires
    pub fn advance(&mut self) {
        if !self.cooldown.fire() {
            return;
        }
        let next = (self.index() + 1) % self.frames.len();
        self.state = FrameState::AtFrame(next);
    }

    /// Current state of the cycle
    #[must_use]
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Number of frames
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Frames with placeholders applied
    #[must_use]
    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    /// Replace `%key%` / `{key}` in every frame; the configured frames are kept
    pub fn apply_placeholder(&mut self, pattern: &PlaceholderPattern, value: &str) {
        for frame in &mut self.frames {
            let replaced = pattern.replace(frame, value).into_owned();
            *frame = replaced;
        }
    }

    /// Restore the configured frames
    pub fn reset_placeholders(&mut self) {
        self.frames.clone_from(&self.original);
    }

    fn index(&self) -> usize {
        match self.state {
            FrameState::Uninitialized => 0,
            FrameState::AtFrame(i) => i % self.frames.len(),
        }
    }
}
