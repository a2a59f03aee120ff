//! Query parameters for the sustainability telemetry API
//!
//! Filters, sorts and pagination are accumulated on a [`Params`] builder and
//! serialized into repeated `filter=` / `sort=` query keys plus scalar
//! `offset=` / `limit=` values. The textual grammar of each filter is a wire
//! contract with the telemetry API.

mod filter;
mod sort;

pub use filter::{Filter, FilterOperator, FilterValue};
pub use sort::{Sort, SortOrder};

use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

/// Validation failures raised while constructing filters or sorts
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamsError {
    #[error("invalid filter or sort key: {0}")]
    InvalidKey(String),

    #[error("invalid filter operator: {0}")]
    InvalidOperator(String),

    #[error("invalid sort order: {0}")]
    InvalidSortOrder(String),

    #[error("operator '{operator}' expects {expected}, got {got} value(s)")]
    Arity {
        operator: FilterOperator,
        expected: &'static str,
        got: usize,
    },

    #[error("filter value {0:?} contains a single quote, which the filter syntax cannot express")]
    QuotedValue(String),

    #[error("malformed {kind} expression '{input}' (expected {expected})")]
    Malformed {
        kind: &'static str,
        input: String,
        expected: &'static str,
    },
}

/// Entity attributes the telemetry API can filter and sort on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    EntityId,
    EntityMake,
    EntityModel,
    EntityType,
    EntitySerialNum,
    EntityProductId,
    LocationName,
    LocationId,
    LocationCity,
    LocationState,
    LocationCountry,
    Name,
}

impl Field {
    pub const ALL: [Field; 12] = [
        Field::EntityId,
        Field::EntityMake,
        Field::EntityModel,
        Field::EntityType,
        Field::EntitySerialNum,
        Field::EntityProductId,
        Field::LocationName,
        Field::LocationId,
        Field::LocationCity,
        Field::LocationState,
        Field::LocationCountry,
        Field::Name,
    ];

    /// Name of the attribute as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::EntityId => "entityId",
            Field::EntityMake => "entityMake",
            Field::EntityModel => "entityModel",
            Field::EntityType => "entityType",
            Field::EntitySerialNum => "entitySerialNum",
            Field::EntityProductId => "entityProductId",
            Field::LocationName => "locationName",
            Field::LocationId => "locationId",
            Field::LocationCity => "locationCity",
            Field::LocationState => "locationState",
            Field::LocationCountry => "locationCountry",
            Field::Name => "name",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = ParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| ParamsError::InvalidKey(s.to_string()))
    }
}

/// Number of records to skip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset(pub u32);

/// Maximum number of records to return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit(pub u32);

/// Accumulated filter, sort and pagination parameters
///
/// Insertion order of filters and sorts is preserved in the query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    filters: Vec<Filter>,
    sorts: Vec<Sort>,
    offset: Option<Offset>,
    limit: Option<Limit>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sorts.push(sort);
        self
    }

    pub fn with_offset(mut self, offset: Offset) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_limit(mut self, limit: Limit) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn sorts(&self) -> &[Sort] {
        &self.sorts
    }

    pub fn offset(&self) -> Option<Offset> {
        self.offset
    }

    pub fn limit(&self) -> Option<Limit> {
        self.limit
    }

    /// Flatten into `(key, value)` pairs, one per filter and sort
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(self.filters.len() + self.sorts.len() + 2);

        for filter in &self.filters {
            pairs.push(("filter", filter.query_value()));
        }
        for sort in &self.sorts {
            pairs.push(("sort", sort.query_value()));
        }
        if let Some(Offset(offset)) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        if let Some(Limit(limit)) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }

        pairs
    }

    /// Append the encoded parameters to an existing URL query
    pub fn append_to(&self, url: &mut Url) {
        let pairs = self.to_query_pairs();
        if pairs.is_empty() {
            return;
        }

        let mut query = url.query_pairs_mut();
        for (key, value) in &pairs {
            query.append_pair(key, value);
        }
    }
}
