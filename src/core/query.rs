//! Query parameters and pagination utilities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hard ceiling on page size, protecting the backing store from oversized reads
pub const MAX_PAGE_SIZE: usize = 1000;

/// Page size used when the caller does not supply one
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Bounds applied to every page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageLimits {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

/// A request for one page of results (pages start at 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub limit: usize,
}

impl PageRequest {
    pub fn new(page: usize, limit: usize) -> Self {
        Self { page, limit }
    }

    /// Clamp page to a minimum of 1 and limit into `1..=max_page_size`.
    ///
    /// No other validation happens here; semantic checks belong to callers.
    pub fn clamped(self, limits: &PageLimits) -> Self {
        let max = limits.max_page_size.max(1);
        Self {
            page: self.page.max(1),
            limit: self.limit.clamp(1, max),
        }
    }

    /// Row offset of the first item on this page
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// A single sort field and direction
///
/// Field names are passed to the store untouched; a misspelled column
/// surfaces as a store error rather than being validated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Parse a sort expression
    ///
    /// # Format
    /// - `field:asc` or `field` (ascending)
    /// - `field:desc` (descending)
    ///
    /// Returns `None` for an empty expression.
    pub fn parse(expr: &str) -> Option<Self> {
        let expr = expr.trim();
        if expr.is_empty() {
            return None;
        }

        let (field, direction) = match expr.rsplit_once(':') {
            Some((field, dir)) if dir.eq_ignore_ascii_case("desc") => (field, SortDirection::Desc),
            Some((field, dir)) if dir.eq_ignore_ascii_case("asc") => (field, SortDirection::Asc),
            _ => (expr, SortDirection::Asc),
        };

        Some(Self {
            field: field.trim().to_string(),
            direction,
        })
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.direction.as_str())
    }
}

/// Query parameters for pagination and sorting
///
/// Extracted from URL query strings; filters are extracted separately
/// into the entity-specific filter types.
///
/// # Example
/// ```text
/// GET /pickups?page=2&limit=10&sort=scheduled_date:desc
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PageParams {
    /// Page number (starts at 1)
    pub page: Option<usize>,

    /// Number of items per page
    pub limit: Option<usize>,

    /// Sort expression, `field[:asc|:desc]`
    pub sort: Option<String>,
}

impl PageParams {
    /// Resolve into a clamped page request
    pub fn page_request(&self, limits: &PageLimits) -> PageRequest {
        PageRequest::new(
            self.page.unwrap_or(1),
            self.limit.unwrap_or(limits.default_page_size),
        )
        .clamped(limits)
    }

    pub fn sort_spec(&self) -> Option<SortSpec> {
        self.sort.as_deref().and_then(SortSpec::parse)
    }
}

/// Paginated response structure
///
/// This structure wraps paginated data with metadata about pagination state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaginatedResponse<T> {
    /// The paginated data
    pub data: Vec<T>,

    /// Pagination metadata
    pub pagination: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
    /// An empty page carrying a zero total
    pub fn empty(page: PageRequest) -> Self {
        Self {
            data: Vec::new(),
            pagination: PaginationMeta::new(page.page, page.limit, 0),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResponse<U> {
        PaginatedResponse {
            data: self.data.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

/// Pagination metadata
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    /// Current page number (starts at 1)
    pub page: usize,

    /// Number of items per page
    pub limit: usize,

    /// Total number of items (after filters)
    pub total: usize,

    /// Total number of pages
    pub total_pages: usize,

    /// Whether there is a next page
    pub has_next: bool,

    /// Whether there is a previous page
    pub has_prev: bool,
}

impl PaginationMeta {
    /// Create pagination metadata from calculation
    pub fn new(page: usize, limit: usize, total: usize) -> Self {
        // Ensure limit is at least 1 to avoid division by zero
        let limit = limit.max(1);
        let total_pages = total.div_ceil(limit);

        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}
