//! Sort conditions

use super::{Field, ParamsError};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = ParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Ascending),
            "desc" => Ok(SortOrder::Descending),
            other => Err(ParamsError::InvalidSortOrder(other.to_string())),
        }
    }
}

/// Sort on a single entity attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    key: Field,
    order: SortOrder,
}

impl Sort {
    pub fn new(key: Field, order: SortOrder) -> Self {
        Self { key, order }
    }

    pub fn key(&self) -> Field {
        self.key
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    /// Textual form sent as a `sort=` query value, e.g. `entityId asc`
    pub fn query_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.key, self.order.as_str())
    }
}

/// Parses `key:order` (e.g. `entityId:desc`); order defaults to ascending
impl FromStr for Sort {
    type Err = ParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, order) = match s.split_once(':') {
            Some((key, order)) => (key, order.parse()?),
            None => (s, SortOrder::Ascending),
        };
        if key.is_empty() {
            return Err(ParamsError::Malformed {
                kind: "sort",
                input: s.to_string(),
                expected: "key[:asc|desc]",
            });
        }
        Ok(Sort::new(key.parse()?, order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_serialization() {
        assert_eq!(
            Sort::new(Field::EntityId, SortOrder::Ascending).query_value(),
            "entityId asc"
        );
        assert_eq!(
            Sort::new(Field::LocationState, SortOrder::Descending).query_value(),
            "locationState desc"
        );
    }

    #[test]
    fn test_parse_sort_expressions() {
        let sort: Sort = "entityModel:desc".parse().unwrap();
        assert_eq!(sort, Sort::new(Field::EntityModel, SortOrder::Descending));

        let default_order: Sort = "name".parse().unwrap();
        assert_eq!(default_order.order(), SortOrder::Ascending);
    }

    #[test]
    fn test_parse_sort_rejects_invalid_input() {
        assert_eq!(
            "name:up".parse::<Sort>().unwrap_err(),
            ParamsError::InvalidSortOrder("up".to_string())
        );
        assert_eq!(
            "rack:asc".parse::<Sort>().unwrap_err(),
            ParamsError::InvalidKey("rack".to_string())
        );
        assert!(matches!(
            ":asc".parse::<Sort>().unwrap_err(),
            ParamsError::Malformed { .. }
        ));
    }
}
