// Pagination helpers shared by every post listing

use serde::Deserialize;

/// `?page=` query parameter. Kept as a raw string so malformed values fall back to page 1
/// instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// A requested page before the total row count is known.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRequest {
    requested: i64,
    pub per_page: u32,
}

/// The concrete slice of rows to fetch once the total is known.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageWindow {
    pub number: u32,
    pub num_pages: u32,
    pub limit: i64,
    pub offset: i64,
}

/// One page of results plus what the paginator links need.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub num_pages: u32,
    pub total: i64,
}

/// A link rendered by the shared paginator template.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLink {
    pub number: u32,
    pub current: bool,
}

impl PageQuery {
    pub fn request(&self, per_page: u32) -> PageRequest {
        PageRequest::from_query(self.page.as_deref(), per_page)
    }
}

impl PageRequest {
    /// ページ番号の解釈は寛容にする: 数値でなければ 1 ページ目、1 未満や範囲外なら最終ページ。
    pub fn from_query(page: Option<&str>, per_page: u32) -> Self {
        let requested = page
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(1);

        PageRequest {
            requested,
            per_page: per_page.max(1),
        }
    }

    pub fn first(per_page: u32) -> Self {
        Self::from_query(None, per_page)
    }

    /// Resolves the request against the total number of rows.
    pub fn window(&self, total: i64) -> PageWindow {
        let per_page = i64::from(self.per_page);
        let total = total.max(0);
        let num_pages = ((total + per_page - 1) / per_page).max(1);

        let number = if (1..=num_pages).contains(&self.requested) {
            self.requested
        } else {
            num_pages
        };

        PageWindow {
            number: number as u32,
            num_pages: num_pages as u32,
            limit: per_page,
            offset: (number - 1) * per_page,
        }
    }
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow, total: i64) -> Self {
        Page {
            items,
            number: window.number,
            num_pages: window.num_pages,
            total,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_other_pages(&self) -> bool {
        self.num_pages > 1
    }

    pub fn previous_number(&self) -> u32 {
        self.number.saturating_sub(1).max(1)
    }

    pub fn next_number(&self) -> u32 {
        (self.number + 1).min(self.num_pages)
    }

    /// Links for every page within two of the current one.
    pub fn links(&self) -> Vec<PageLink> {
        let start = self.number.saturating_sub(2).max(1);
        let end = (self.number + 2).min(self.num_pages);
        (start..=end)
            .map(|number| PageLink {
                number,
                current: number == self.number,
            })
            .collect()
    }
}
