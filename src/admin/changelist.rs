//! Changelist paging, search and boolean filters.

use serde::Serialize;

/// What a changelist request asks the store for.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub search: Option<String>,
    pub filters: Vec<(String, bool)>,
    /// 1-based.
    pub page: u32,
    pub per_page: u32,
}

impl ListQuery {
    #[must_use]
    pub fn new(per_page: u32) -> Self {
        Self {
            search: None,
            filters: Vec::new(),
            page: 1,
            per_page: per_page.max(1),
        }
    }

    #[must_use]
    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = search
            .map(|term| term.trim().to_string())
            .filter(|term| !term.is_empty());
        self
    }

    #[must_use]
    pub fn with_filter(mut self, field: &str, value: bool) -> Self {
        self.filters.push((field.to_string(), value));
        self
    }

    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    #[must_use]
    pub fn filter(&self, field: &str) -> Option<bool> {
        self.filters
            .iter()
            .rev()
            .find(|(name, _)| name == field)
            .map(|(_, value)| *value)
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }
}

/// One page of results plus the unpaged total.
#[derive(Clone, Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    /// Slice an already filtered and ordered collection.
    #[must_use]
    pub fn from_sorted(all: Vec<T>, query: &ListQuery) -> Self {
        let total = all.len() as u64;
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let items = all
            .into_iter()
            .skip(offset)
            .take(query.per_page as usize)
            .collect();
        Self {
            items,
            total,
            page: query.page,
            per_page: query.per_page,
        }
    }

    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

/// Parse a boolean filter value the way changelist links encode it.
#[must_use]
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_search_is_dropped() {
        let query = ListQuery::new(50).with_search(Some("   ".to_string()));
        assert_eq!(query.search, None);
        let query = ListQuery::new(50).with_search(Some(" ada ".to_string()));
        assert_eq!(query.search.as_deref(), Some("ada"));
    }

    #[test]
    fn page_zero_is_first_page() {
        let query = ListQuery::new(50).with_page(0);
        assert_eq!(query.page, 1);
        assert_eq!(query.offset(), 0);
        assert_eq!(ListQuery::new(50).with_page(3).offset(), 100);
    }

    #[test]
    fn last_filter_wins() {
        let query = ListQuery::new(10)
            .with_filter("is_active", true)
            .with_filter("is_active", false);
        assert_eq!(query.filter("is_active"), Some(false));
        assert_eq!(query.filter("is_superuser"), None);
    }

    #[test]
    fn page_slices_and_keeps_total() {
        let query = ListQuery::new(2).with_page(2);
        let page = Page::from_sorted(vec![1, 2, 3, 4, 5], &query);
        assert_eq!(page.items, vec![3, 4]);
        assert_eq!(page.total, 5);

        let beyond = Page::from_sorted(vec![1, 2], &ListQuery::new(2).with_page(5));
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total, 2);
    }

    #[test]
    fn flags_parse() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("False"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
