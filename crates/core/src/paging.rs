//! Paged list results: `{data, pagination: {total, page, limit, pages}}`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::config::CoreConfig;
use crate::{PatientError, PatientResult};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// A requested page. `page` is 1-based; `limit` falls back to the configured default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    /// Resolves to `(page, limit)`, rejecting zero values and pages above `max_limit`.
    pub(crate) fn resolve(self, default_limit: u32, max_limit: u32) -> PatientResult<(u32, u32)> {
        let page = self.page.unwrap_or(1);
        let limit = self.limit.unwrap_or(default_limit);
        if page == 0 {
            return Err(PatientError::InvalidInput("page numbers start at 1".into()));
        }
        if limit == 0 || limit > max_limit {
            return Err(PatientError::InvalidInput(format!(
                "page size must be between 1 and {max_limit}, got {limit}"
            )));
        }
        Ok((page, limit))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: usize,
    pub page: u32,
    pub limit: u32,
    pub pages: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Paginated<T> {
    /// Cuts one page out of an already filtered and sorted list.
    pub(crate) fn from_sorted(items: Vec<T>, request: PageRequest, cfg: &CoreConfig) -> PatientResult<Self> {
        let (page, limit) = request.resolve(cfg.default_page_size(), cfg.max_page_size())?;
        let total = items.len();
        let pages = total.div_ceil(limit as usize) as u32;
        let offset = (page as usize - 1).saturating_mul(limit as usize);
        let data = items.into_iter().skip(offset).take(limit as usize).collect();
        Ok(Self {
            data,
            pagination: Pagination {
                total,
                page,
                limit,
                pages,
            },
        })
    }
}
