//! Page-by-page iteration over search results.
//!
//! [`PageTracker`] is a pure state machine: it hands out the next
//! [`PageRequest`], and swallows each response page, returning the issues
//! not seen before. Two continuation styles are understood:
//!
//! - **token**: follow `nextPageToken` until it disappears or `isLast` is `true`
//! - **offset**: advance `startAt` by the page size until it reaches `total`,
//!   or until a short page when `total` is absent
//!
//! Once a token has been seen the run is in token mode for good, and a page
//! without a token ends it. An offset-mode page that adds no new keys also
//! ends the run, so a server that ignores `startAt` cannot loop forever.

use serde_json::Value;
use std::collections::HashSet;

/// Parameters of the next page to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Continuation token from the previous page
    pub next_page_token: Option<String>,
    /// Offset of the first result
    pub start_at: usize,
    /// Page size
    pub max_results: usize,
}

/// Tracks continuation state and seen keys across pages.
#[derive(Debug, Clone)]
pub struct PageTracker {
    page_size: usize,
    max_pages: usize,
    pages: usize,
    start_at: usize,
    token: Option<String>,
    token_mode: bool,
    seen: HashSet<String>,
    done: bool,
}

impl PageTracker {
    /// Creates a tracker. `max_pages == 0` means no page cap; a zero page
    /// size is treated as one.
    #[must_use]
    pub fn new(page_size: usize, max_pages: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            max_pages,
            pages: 0,
            start_at: 0,
            token: None,
            token_mode: false,
            seen: HashSet::new(),
            done: false,
        }
    }

    /// The next page to request, or `None` once iteration has ended.
    #[must_use]
    pub fn next_request(&self) -> Option<PageRequest> {
        if self.done {
            return None;
        }
        Some(PageRequest {
            next_page_token: self.token.clone(),
            start_at: self.start_at,
            max_results: self.page_size,
        })
    }

    /// Whether iteration has ended.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Pages consumed so far.
    #[must_use]
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Distinct issue keys seen so far.
    #[must_use]
    pub fn seen(&self) -> usize {
        self.seen.len()
    }

    /// Consumes a response page and returns its issues whose keys were not
    /// seen on earlier pages. Issues without a key are dropped.
    pub fn accept(&mut self, mut page: Value) -> Vec<Value> {
        let issues = match page.get_mut("issues").map(Value::take) {
            Some(Value::Array(issues)) => issues,
            _ => Vec::new(),
        };
        let returned = issues.len();

        let fresh: Vec<Value> = issues
            .into_iter()
            .filter(|issue| {
                issue
                    .get("key")
                    .and_then(Value::as_str)
                    .filter(|k| !k.is_empty())
                    .is_some_and(|k| self.seen.insert(k.to_string()))
            })
            .collect();

        self.pages += 1;
        self.advance(&page, returned, fresh.len());
        tracing::debug!(
            page = self.pages,
            returned,
            fresh = fresh.len(),
            done = self.done,
            "search page"
        );
        fresh
    }

    fn advance(&mut self, page: &Value, returned: usize, fresh: usize) {
        if self.max_pages > 0 && self.pages >= self.max_pages {
            self.done = true;
            return;
        }
        if page.get("isLast").and_then(Value::as_bool) == Some(true) {
            self.done = true;
            return;
        }

        let token = page
            .get("nextPageToken")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty());
        if let Some(token) = token {
            self.token_mode = true;
            self.token = Some(token.to_string());
            return;
        }
        if self.token_mode {
            self.done = true;
            return;
        }

        self.start_at += self.page_size;
        // A server that ignores startAt without reporting a total would repeat
        // the same page forever, so a page with nothing new ends that run.
        let exhausted = match page.get("total").and_then(Value::as_u64) {
            Some(total) => u64::try_from(self.start_at).ok().is_none_or(|s| s >= total),
            None => returned < self.page_size || fresh == 0,
        };
        if exhausted {
            self.done = true;
        }
    }
}
