//! Response bodies for list, batch and search endpoints.
//!
//! These complement the envelopes in [`crate::responses`]: handlers build one
//! and return it through [`crate::responses::success`] or `HttpResponse::json`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use pagination::{PageLinks, PageMeta};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Items plus page metadata and optional navigation links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse<T> {
    /// Items on this page.
    pub data: Vec<T>,
    /// Counts and paging state.
    pub meta: ListMeta,
    /// Navigation links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<PageLinks>,
}

/// Metadata for a [`ListResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMeta {
    /// Items in this response.
    pub count: usize,
    /// Paging state, absent for unpaged lists.
    #[serde(flatten)]
    pub page: Option<PageMeta>,
    /// When the response was built.
    pub timestamp: DateTime<Utc>,
}

impl<T> ListResponse<T> {
    /// Unpaged list.
    #[must_use]
    pub fn new(data: Vec<T>, now: DateTime<Utc>) -> Self {
        Self {
            meta: ListMeta {
                count: data.len(),
                page: None,
                timestamp: now,
            },
            data,
            links: None,
        }
    }

    /// One page of a larger result set.
    #[must_use]
    pub fn paged(data: Vec<T>, page: PageMeta, now: DateTime<Utc>) -> Self {
        let mut list = Self::new(data, now);
        list.meta.page = Some(page);
        list
    }

    /// Attach links built from `base_url`; unpaged lists are left unchanged.
    #[must_use]
    pub fn with_links(mut self, base_url: &str) -> Self {
        self.links = self
            .meta
            .page
            .map(|page| PageLinks::build(base_url, &page));
        self
    }
}

/// One failed item of a batch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchError {
    /// Position of the item in the request.
    pub index: usize,
    /// Identifier of the item, when it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Human-readable message.
    pub error: String,
    /// Machine-readable code.
    pub code: String,
    /// Extra context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl BatchError {
    /// Failure of item `index`.
    pub fn new(index: usize, code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            index,
            id: None,
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    /// Attach the item's identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Counts for a [`BatchResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Items submitted.
    pub total: usize,
    /// Items that succeeded.
    pub successful: usize,
    /// Items that failed.
    pub failed: usize,
}

/// Outcome of an operation applied to many items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse<T> {
    /// Results of the items that succeeded.
    pub successful: Vec<T>,
    /// Items that failed.
    pub failed: Vec<BatchError>,
    /// Counts.
    pub summary: BatchSummary,
    /// Extra context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl<T> BatchResponse<T> {
    /// Split per-item results; the summary is derived from them.
    pub fn from_results(results: impl IntoIterator<Item = Result<T, BatchError>>) -> Self {
        let (successful, failed): (Vec<_>, Vec<_>) =
            results.into_iter().partition(Result::is_ok);
        let successful: Vec<T> = successful.into_iter().filter_map(Result::ok).collect();
        let failed: Vec<BatchError> = failed.into_iter().filter_map(Result::err).collect();
        let summary = BatchSummary {
            total: successful.len() + failed.len(),
            successful: successful.len(),
            failed: failed.len(),
        };
        Self {
            successful,
            failed,
            summary,
            metadata: None,
        }
    }

    /// Whether every item succeeded.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.summary.failed == 0
    }
}

/// Count of results sharing one facet value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetValue {
    /// Facet value.
    pub value: String,
    /// Matching results.
    pub count: u64,
}

/// Value counts for one facet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Facet {
    /// Values with their counts.
    pub values: Vec<FacetValue>,
}

/// Results of a search query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse<T> {
    /// Matching items on this page.
    pub results: Vec<T>,
    /// Total matches.
    pub total: u64,
    /// Query as received.
    pub query: String,
    /// Applied filters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, String>,
    /// Facet counts by facet name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub facets: BTreeMap<String, Facet>,
    /// Alternative queries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    /// Paging state.
    pub pagination: PageMeta,
}

impl<T> SearchResponse<T> {
    /// Page `page` of `total` matches for `query`.
    pub fn new(
        query: impl Into<String>,
        results: Vec<T>,
        total: u64,
        page: u32,
        page_size: u32,
    ) -> Self {
        Self {
            results,
            total,
            query: query.into(),
            filters: BTreeMap::new(),
            facets: BTreeMap::new(),
            suggestions: Vec::new(),
            pagination: PageMeta::new(total, page, page_size),
        }
    }

    /// Record an applied filter.
    #[must_use]
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    /// Add facet counts under `name`.
    #[must_use]
    pub fn with_facet(mut self, name: impl Into<String>, facet: Facet) -> Self {
        self.facets.insert(name.into(), facet);
        self
    }
}
