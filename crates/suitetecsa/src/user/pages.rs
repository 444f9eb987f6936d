use std::fmt::Display;

/// How a history page is addressed in the list URL.
///
/// Page 1 is requested as `<slug>_list/<ym>/<count>`, so its marker is the row
/// count itself. Every other page appends its number: `.../<count>/<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMarker {
    Count(u32),
    Number(u32),
}

impl PageMarker {
    pub fn page_number(&self) -> u32 {
        match self {
            PageMarker::Count(_) => 1,
            PageMarker::Number(n) => *n,
        }
    }

    /// Path suffix after `<slug>_list/<year_month_selected>/`.
    pub fn path(&self, count: u32) -> String {
        match self {
            PageMarker::Count(count) => count.to_string(),
            PageMarker::Number(n) => format!("{}/{}", count, n),
        }
    }
}

impl Display for PageMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageMarker::Count(count) => write!(f, "{}", count),
            PageMarker::Number(n) => write!(f, "{}", n),
        }
    }
}

pub fn total_pages(count: u32, page_size: u32) -> u32 {
    if count == 0 || page_size == 0 {
        0
    } else {
        count.div_ceil(page_size)
    }
}

/// Iteration order over the pages of one month's history.
///
/// Yields every page, ascending or (when reversed) descending. The row fetcher
/// stops pulling markers once it has `limit()` rows.
#[derive(Debug, Clone)]
pub struct PagePlan {
    count: u32,
    limit: u32,
    reversed: bool,
    page_size: u32,
    front: u32,
    back: u32,
}

impl PagePlan {
    /// `large == 0` means no limit.
    pub fn new(count: u32, large: u32, reversed: bool, page_size: u32) -> Self {
        let pages = total_pages(count, page_size);
        let limit = if large == 0 { count } else { large };
        Self {
            count,
            limit,
            reversed,
            page_size,
            front: 1,
            back: pages,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Rows to collect before stopping.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn reversed(&self) -> bool {
        self.reversed
    }

    pub fn total_pages(&self) -> u32 {
        total_pages(self.count, self.page_size)
    }

    /// Requests a well-behaved server needs to satisfy the limit, given full
    /// pages everywhere except the last one.
    pub fn expected_requests(&self) -> u32 {
        let pages = self.total_pages();
        if pages == 0 {
            return 0;
        }
        let wanted = self.limit.min(self.count);
        if !self.reversed {
            return wanted.div_ceil(self.page_size).min(pages);
        }

        let last_page_rows = self.count - (pages - 1) * self.page_size;
        if wanted <= last_page_rows {
            1
        } else {
            (1 + (wanted - last_page_rows).div_ceil(self.page_size)).min(pages)
        }
    }

    fn marker(&self, page: u32) -> PageMarker {
        if page == 1 {
            PageMarker::Count(self.count)
        } else {
            PageMarker::Number(page)
        }
    }
}

impl Iterator for PagePlan {
    type Item = PageMarker;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front > self.back {
            return None;
        }
        let page = if self.reversed {
            let page = self.back;
            self.back -= 1;
            page
        } else {
            let page = self.front;
            self.front += 1;
            page
        };
        Some(self.marker(page))
    }
}

/// Appends one page of rows to `rows`, never exceeding `limit` in total.
///
/// A reversed plan flips the page first so that truncation keeps the page's
/// tail, i.e. the most recent rows of a forward-ordered table.
pub fn take_page_rows<T>(rows: &mut Vec<T>, mut page: Vec<T>, limit: u32, reversed: bool) {
    if reversed {
        page.reverse();
    }
    let room = (limit as usize).saturating_sub(rows.len());
    page.truncate(room);
    rows.extend(page);
}
