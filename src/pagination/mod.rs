use serde::Serialize;

use crate::config::config;
use crate::database::{DatabaseError, Row, Store};
use crate::filter::{Filter, QueryParams};

/// Default and maximum page sizes
#[derive(Debug, Clone, Copy)]
pub struct PageLimits {
    pub default_per_page: i64,
    pub max_per_page: i64,
}

impl PageLimits {
    pub fn from_config() -> Self {
        let pagination = &config().pagination;
        Self {
            default_per_page: pagination.default_per_page.max(1),
            max_per_page: pagination.max_per_page.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRequest {
    Page { page: i64, per_page: i64 },
    /// `per_page=all`: every matching row in one response
    All,
}

impl PageRequest {
    /// Lenient parsing: values that do not parse fall back to defaults, numbers are clamped.
    pub fn from_params(params: &QueryParams, limits: PageLimits) -> Self {
        let per_page_raw = params.get("per_page").map(|s| s.trim());
        if per_page_raw.map_or(false, |s| s.eq_ignore_ascii_case("all")) {
            return PageRequest::All;
        }

        let per_page = per_page_raw
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(limits.default_per_page)
            .clamp(1, limits.max_per_page.max(1));
        let page = params
            .get("page")
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(1)
            .max(1);

        PageRequest::Page { page, per_page }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(total: i64, page: i64, per_page: i64) -> Self {
        let per_page = per_page.max(1);
        Self {
            total,
            page,
            per_page,
            total_pages: (total + per_page - 1) / per_page,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Paged {
    pub items: Vec<Row>,
    pub pagination: Pagination,
}

/// Count the filtered rows, then fetch the requested page in the filter's order
pub async fn paginate(store: &dyn Store, filter: &Filter, request: PageRequest) -> Result<Paged, DatabaseError> {
    let total = store.count(filter).await?;

    match request {
        PageRequest::All => {
            let items = store.fetch(filter).await?;
            Ok(Paged {
                items,
                pagination: Pagination::new(total, 1, total.max(1)),
            })
        }
        PageRequest::Page { page, per_page } => {
            let offset = (page - 1).saturating_mul(per_page);
            let mut bounded = filter.clone();
            bounded.limit(per_page, Some(offset));
            let items = if offset >= total { Vec::new() } else { store.fetch(&bounded).await? };
            tracing::debug!(
                table = filter.table_name(),
                total,
                page,
                per_page,
                returned = items.len(),
                "paginated"
            );
            Ok(Paged {
                items,
                pagination: Pagination::new(total, page, per_page),
            })
        }
    }
}
