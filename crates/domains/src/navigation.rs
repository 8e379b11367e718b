//! # Navigation state
//!
//! Pure pagination transform shared by the browsing scenes (gallery,
//! my-photos, search results). Page 0 is a sentinel meaning "not yet
//! computed"; the first render stores the real page count.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Navigation {
    /// The message the scene keeps editing in place, when known.
    pub message_ref: Option<i64>,
    /// Whether the rendered message can be edited instead of re-sent.
    pub updatable: bool,
    pub current_page: u32,
    pub total_pages: u32,
}

impl Default for Navigation {
    fn default() -> Self {
        Self {
            message_ref: None,
            updatable: false,
            current_page: 0,
            total_pages: 0,
        }
    }
}

impl Navigation {
    /// Entering any browsing scene starts from the sentinel state.
    pub fn reset(&mut self) {
        *self = Navigation::default();
    }

    /// Stores the computed page count, landing on the first page
    /// (or staying at the sentinel when there is nothing to show).
    pub fn set_total(&mut self, total_pages: u32) {
        self.total_pages = total_pages;
        self.current_page = if total_pages > 0 { 1 } else { 0 };
    }

    /// Re-applies a freshly computed page count. When the result set
    /// shrank since the last render, the cursor is pulled back onto the
    /// new last page (or to the sentinel when nothing is left).
    pub fn rebase_total(&mut self, total_pages: u32) {
        self.total_pages = total_pages;
        if self.current_page > total_pages {
            self.current_page = total_pages;
        }
    }

    /// Decrements only when a previous page exists; no-op otherwise.
    pub fn prev(&mut self) -> bool {
        if self.current_page > 1 {
            self.current_page -= 1;
            true
        } else {
            false
        }
    }

    /// Increments only when a next page exists; no-op otherwise.
    pub fn next(&mut self) -> bool {
        if self.current_page < self.total_pages {
            self.current_page += 1;
            true
        } else {
            false
        }
    }

    pub fn remember_message(&mut self, message_ref: i64) {
        self.message_ref = Some(message_ref);
        self.updatable = true;
    }
}
