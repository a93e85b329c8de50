use crate::shared::config::model::QueryConfig;

const DEFAULT_PAGE_SIZE: u32 = 100;
const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl QueryLimits {
    pub fn from_config(cfg: QueryConfig) -> Self {
        let max_page_size = cfg.max_page_size.unwrap_or(MAX_PAGE_SIZE).max(1);
        Self {
            default_page_size: cfg
                .default_page_size
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .min(max_page_size),
            max_page_size,
        }
    }
}

/// Zero-based page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub page_size: u32,
}

impl Page {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Page window for row listings; a missing size falls back to the default.
    pub fn resolve(page: Option<u32>, page_size: Option<u32>, limits: QueryLimits) -> Self {
        Self {
            page: page.unwrap_or(0),
            page_size: page_size
                .unwrap_or(limits.default_page_size)
                .min(limits.max_page_size),
        }
    }

    /// Page window for bucket listings, which are unbounded unless a size is given.
    pub fn optional(page: Option<u32>, page_size: Option<u32>, limits: QueryLimits) -> Option<Self> {
        page_size.map(|size| Self::resolve(page, Some(size), limits))
    }

    pub fn offset(&self) -> i64 {
        self.page as i64 * self.page_size as i64
    }

    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }
}
