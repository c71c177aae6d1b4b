use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageQuery {
    #[serde(default)]
    pub(crate) page: Option<u64>,
    #[serde(default)]
    pub(crate) per_page: Option<u64>,
}

impl PageQuery {
    /// One-based page and a page size capped at `max_per_page`.
    pub(crate) fn resolve(&self, default_per_page: u64, max_per_page: u64) -> (u64, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(default_per_page).clamp(1, max_per_page);
        (page, per_page)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PaginatedResponse<T> {
    pub(crate) items: Vec<T>,
    pub(crate) total_count: u64,
    pub(crate) page: u64,
    pub(crate) per_page: u64,
    pub(crate) total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    /// Slices one page out of the full ordered list.
    pub(crate) fn from_all<S>(
        all: Vec<S>,
        page: u64,
        per_page: u64,
        map: impl FnMut((usize, S)) -> T,
    ) -> Self {
        let total_count = all.len() as u64;
        let skip = usize::try_from(page.saturating_sub(1).saturating_mul(per_page))
            .unwrap_or(usize::MAX);
        let take = usize::try_from(per_page).unwrap_or(usize::MAX);
        let items = all.into_iter().enumerate().skip(skip).take(take).map(map).collect();

        Self { items, total_count, page, per_page, total_pages: total_count.div_ceil(per_page) }
    }
}
