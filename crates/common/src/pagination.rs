//! Offset pagination for listings.

use serde::{Deserialize, Serialize};

use crate::config::ListingConfig;

/// A requested page, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct PageRequest {
    /// Page number. Zero and missing both mean the first page.
    #[serde(default)]
    pub page: u64,
    /// Page size. Missing means the configured default.
    #[serde(default)]
    pub limit: Option<u64>,
}

impl PageRequest {
    /// Create a page request.
    #[must_use]
    pub const fn new(page: u64, limit: u64) -> Self {
        Self {
            page,
            limit: Some(limit),
        }
    }

    /// Resolve against the listing limits: page is at least 1 and the limit
    /// falls within `1..=max_limit`.
    #[must_use]
    pub fn resolve(&self, config: &ListingConfig) -> ResolvedPage {
        let limit = self
            .limit
            .unwrap_or(config.default_limit)
            .clamp(1, config.max_limit.max(1));
        ResolvedPage {
            page: self.page.max(1),
            limit,
        }
    }
}

/// A page request after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPage {
    /// Page number, 1-based.
    pub page: u64,
    /// Page size.
    pub limit: u64,
}

impl ResolvedPage {
    /// Number of rows to skip.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Wrap a fetched page with its pagination block.
    #[must_use]
    pub fn into_page<T>(self, items: Vec<T>, total: u64) -> Page<T> {
        Page {
            items,
            pagination: Pagination {
                total,
                pages: total.div_ceil(self.limit),
                page: self.page,
                limit: self.limit,
            },
        }
    }
}

/// Pagination block returned with every listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: u64,
    pub pages: u64,
    pub page: u64,
    pub limit: u64,
}

/// One page of items.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    /// Transform the items, keeping order and pagination.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}
