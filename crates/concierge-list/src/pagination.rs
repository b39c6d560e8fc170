//! Pagination metadata and pager derivation.
//!
//! # Design
//! - A server that omits the pagination block, or the page count within it, leaves
//!   the page count unknown; that is tracked as [`TotalPages::Unknown`] instead of
//!   collapsing it to `1`.
//! - A reported page count of `0` or `1` is ambiguous (some endpoints report `1` for
//!   filtered queries they did not paginate) and is treated as unknown too.
//! - When the page count is unknown, "next" falls back to a full-page heuristic and
//!   [`PagerControls::next_is_heuristic`] says so.

use concierge_api_models::Pagination;
use serde::Serialize;

/// Number of pages the current query spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "pages")]
pub enum TotalPages {
    /// Reported by the server.
    Known(u32),
    /// Not reported, or invalidated by a query change.
    Unknown,
}

/// Pagination state of the last committed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    /// Page the data belongs to.
    pub current_page: u32,
    /// Page count, when known.
    pub total_pages: TotalPages,
    /// Records across all pages.
    pub total_count: u64,
    /// Records returned by the last fetch.
    pub returned: usize,
}

impl Default for PageInfo {
    fn default() -> Self {
        Self::unknown()
    }
}

impl PageInfo {
    /// State before the first fetch and after a filter change.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            current_page: 1,
            total_pages: TotalPages::Unknown,
            total_count: 0,
            returned: 0,
        }
    }

    /// Metadata copied from the server's pagination block.
    ///
    /// Missing keys fall back to the requested page and the returned record count.
    #[must_use]
    pub fn from_server(pagination: &Pagination, requested_page: u32, returned: usize) -> Self {
        let total_pages = match pagination.total_pages {
            Some(total) if total > 1 => TotalPages::Known(total),
            _ => TotalPages::Unknown,
        };
        Self {
            current_page: pagination.current_page.unwrap_or(requested_page).max(1),
            total_pages,
            total_count: pagination
                .total_count
                .unwrap_or_else(|| u64::try_from(returned).unwrap_or(u64::MAX)),
            returned,
        }
    }

    /// Metadata built locally when the server sent none.
    #[must_use]
    pub fn synthesized(requested_page: u32, returned: usize) -> Self {
        Self {
            current_page: requested_page.max(1),
            total_pages: TotalPages::Unknown,
            total_count: u64::try_from(returned).unwrap_or(u64::MAX),
            returned,
        }
    }
}

/// Enabled state of the previous/next controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PagerControls {
    /// "Previous" is enabled.
    pub previous: bool,
    /// "Next" is enabled.
    pub next: bool,
    /// `next` was guessed from the size of the last page rather than a known page count.
    pub next_is_heuristic: bool,
}

impl PagerControls {
    /// Derive controls for `page` given the last committed metadata.
    ///
    /// With an unknown page count, "next" is enabled when the last fetch returned at
    /// least `page_size` records. This is a best-effort guess: an exactly full final
    /// page still enables "next", and the following fetch comes back empty.
    #[must_use]
    pub fn derive(page: u32, info: &PageInfo, page_size: u32) -> Self {
        let (next, next_is_heuristic) = match info.total_pages {
            TotalPages::Known(total) => (page < total, false),
            TotalPages::Unknown => {
                let full = usize::try_from(page_size).is_ok_and(|size| info.returned >= size);
                (full, true)
            }
        };
        Self {
            previous: page > 1,
            next,
            next_is_heuristic,
        }
    }
}

/// One entry of the numbered pager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSlot {
    /// Link to a page.
    Page(u32),
    /// Gap marker.
    Ellipsis,
}

/// Numbered page links around `current`.
///
/// Up to 7 pages are listed in full. Past that: the first page, a three-page window
/// (pinned to the start or end when `current` is near either edge) with gap markers,
/// and the last page. Empty when the page count is unknown or a single page.
#[must_use]
pub fn page_window(current: u32, total_pages: TotalPages) -> Vec<PageSlot> {
    let TotalPages::Known(total) = total_pages else {
        return Vec::new();
    };
    if total <= 1 {
        return Vec::new();
    }
    if total <= 7 {
        return (1..=total).map(PageSlot::Page).collect();
    }

    let current = current.clamp(1, total);
    let mut slots = vec![PageSlot::Page(1)];
    if current <= 3 {
        slots.extend((2..=4).map(PageSlot::Page));
        slots.push(PageSlot::Ellipsis);
    } else if current >= total - 2 {
        slots.push(PageSlot::Ellipsis);
        slots.extend((total - 3..total).map(PageSlot::Page));
    } else {
        slots.push(PageSlot::Ellipsis);
        slots.extend((current - 1..=current + 1).map(PageSlot::Page));
        slots.push(PageSlot::Ellipsis);
    }
    slots.push(PageSlot::Page(total));
    slots
}

/// One-line pager summary, e.g. `Page 2 of 4 | Total 80`.
#[must_use]
pub fn summary_label(page: u32, info: &PageInfo) -> String {
    let mut label = format!("Page {page}");
    if let TotalPages::Known(total) = info.total_pages
        && total > 1
    {
        label.push_str(&format!(" of {total}"));
    }
    if info.total_count > 0 {
        label.push_str(&format!(" | Total {}", info.total_count));
    }
    label
}
