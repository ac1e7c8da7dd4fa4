//! Pagination Engine - Windowing a Long List onto a Fixed Column
//!
//! A column has a fixed number of rows. When titles are shown, the first two
//! rows hold the title and a blank spacer; the rest hold entries. A list
//! longer than one page loses one more row to a "page X / Y" indicator and
//! scrolls on its own cooldown.
//!
//! ```text
//!   rows = 20, titles shown            45 entries, capacity 18
//!
//!   row  1   title                     page 1: entries  0..17   cursor  0
//!   row  2   (spacer)                  page 2: entries 17..34   cursor 17
//!   rows 3-19  17 entries              page 3: entries 34..45   cursor 34
//!   row 20   "1/3"                     then cursor resets to 0
//! ```
//!
//! # Page Arithmetic
//!
//! All divisions are integer divisions:
//!
//! - `capacity = rows - title_offset`
//! - `page     = (cursor + title_offset) / capacity + 1`
//! - `max_page = (size + 2 * size / capacity) / capacity + 1`
//!
//! Both are clamped to at least 1. For some size/capacity ratios `max_page`
//! is one larger than the number of pages actually reachable; the reset rule
//! below decides which pages are shown.
//!
//! A column with a single entry row has no room for an indicator. It steps
//! through the list one entry per scroll, reporting the entry index as the
//! page. A column whose title rows take every row shows no entries at all.

use crate::text::Cooldown;

/// Rows taken by the title and its spacer
pub const TITLE_ROWS: usize = 2;

/// Row layout of one column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    /// Grid rows available to the column
    pub rows: usize,
    /// Whether the title and spacer rows are shown
    pub show_titles: bool,
    /// Whether long lists page at all
    pub enabled: bool,
    /// Upper bound for the reported page count
    pub max_pages: Option<usize>,
}

impl PageLayout {
    /// Rows reserved before the first entry
    #[must_use]
    pub fn title_offset(&self) -> usize {
        if self.show_titles {
            TITLE_ROWS
        } else {
            0
        }
    }

    /// Rows left for entries on an unpaginated page
    #[must_use]
    pub fn page_capacity(&self) -> usize {
        self.entry_rows().max(1)
    }

    /// Rows actually left for entries, possibly none
    #[must_use]
    pub fn entry_rows(&self) -> usize {
        self.rows.saturating_sub(self.title_offset())
    }
}

/// Offset into the entries list plus what the list looked like
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageCursor {
    /// Index of the first entry on the current page
    pub cursor: usize,
    /// Length of the list when it was last refreshed
    pub len: usize,
    /// Fingerprint of the list when it was last refreshed
    pub fingerprint: u32,
}

/// What the current page shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// First entry index, inclusive
    pub start: usize,
    /// Last entry index, exclusive
    pub end: usize,
    /// Current page, from 1
    pub page: usize,
    /// Reported page count, from 1
    pub max_page: usize,
    /// Whether an indicator row is appended
    pub paginated: bool,
    /// Whether the cursor moves on scroll ticks
    pub scrolling: bool,
}

impl PageWindow {
    /// Number of entries on the page
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the page shows no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Fingerprint of an entries list from its keys
#[must_use]
pub fn fingerprint<'a>(keys: impl IntoIterator<Item = &'a str>) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    for key in keys {
        hasher.update(key.as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize()
}

/// Cursor-driven pager over a list of entries
#[derive(Debug)]
pub struct PaginationEngine<T> {
    layout: PageLayout,
    cursor: PageCursor,
    entries: Vec<T>,
    refresh: Cooldown,
    scroll: Cooldown,
}

impl<T> PaginationEngine<T> {
    /// Create an engine with no entries loaded
    ///
    /// `refresh` gates reloading entries that are already loaded; `scroll`
    /// gates moving to the next page.
    #[must_use]
    pub fn new(layout: PageLayout, refresh: Cooldown, scroll: Cooldown) -> Self {
        Self {
            layout,
            cursor: PageCursor::default(),
            entries: Vec::new(),
            refresh,
            scroll,
        }
    }

    /// Row layout
    #[must_use]
    pub fn layout(&self) -> PageLayout {
        self.layout
    }

    /// Cursor state
    #[must_use]
    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    /// Loaded entries
    #[must_use]
    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    /// Loaded entries, mutably
    pub fn entries_mut(&mut self) -> &mut [T] {
        &mut self.entries
    }

    /// Whether the caller should supply fresh entries this cycle
    ///
    /// True when nothing is loaded, or when the refresh cooldown fires.
    pub fn needs_refresh(&mut self) -> bool {
        let due = self.refresh.fire();
        self.entries.is_empty() || due
    }

    /// Hand over the loaded entries so their state can be reused
    pub fn take_entries(&mut self) -> Vec<T> {
        std::mem::take(&mut self.entries)
    }

    /// Load a fresh entries list
    ///
    /// A fingerprint different from the last one sends the cursor back to
    /// the first page.
    pub fn refresh(&mut self, entries: Vec<T>, fingerprint: u32) {
        if fingerprint != self.cursor.fingerprint {
            if self.cursor.cursor != 0 {
                tracing::debug!(
                    old = self.cursor.fingerprint,
                    new = fingerprint,
                    "Entries changed shape, returning to first page"
                );
            }
            self.cursor.cursor = 0;
        }
        self.cursor.len = entries.len();
        self.cursor.fingerprint = fingerprint;
        self.entries = entries;
    }

    /// Window for the current cursor
    #[must_use]
    pub fn window(&self) -> PageWindow {
        let size = self.entries.len();
        let entry_rows = self.layout.entry_rows();
        let capacity = self.layout.page_capacity();
        let offset = self.layout.title_offset();
        let scrolling = self.layout.enabled && entry_rows > 0 && size > entry_rows;
        let paginated = scrolling && entry_rows > 1;

        let rows = if paginated { entry_rows - 1 } else { entry_rows };
        let start = self.cursor.cursor.min(size);
        let end = size.min(self.cursor.cursor + rows);

        let (page, mut max_page) = if scrolling && !paginated {
            (start + 1, size)
        } else {
            (
                ((self.cursor.cursor + offset) / capacity + 1).max(1),
                ((size + 2 * size / capacity) / capacity + 1).max(1),
            )
        };
        if let Some(limit) = self.layout.max_pages {
            max_page = max_page.min(limit.max(1));
        }

        PageWindow {
            start,
            end,
            page,
            max_page,
            paginated,
            scrolling,
        }
    }

    /// Entries on the current page
    pub fn visible_mut(&mut self) -> &mut [T] {
        let window = self.window();
        &mut self.entries[window.start..window.end]
    }

    /// Count one tick of the scroll cooldown, moving to the next page if due
    ///
    /// Returns true when the cursor moved or was reset.
    pub fn scroll(&mut self) -> bool {
        let window = self.window();
        if !window.scrolling {
            self.scroll.reset();
            return false;
        }
        if !self.scroll.fire() {
            return false;
        }

        if window.page > window.max_page {
            self.restart();
            return true;
        }

        // The next page starts right after the last entry shown
        self.cursor.cursor += window.len();

        let size = self.entries.len();
        let threshold = if window.paginated {
            size.saturating_sub(self.layout.title_offset() * size / self.layout.page_capacity())
        } else {
            size
        };
        if self.cursor.cursor >= threshold {
            self.restart();
        }
        true
    }

    fn restart(&mut self) {
        self.cursor.cursor = 0;
        self.entries.clear();
    }
}
