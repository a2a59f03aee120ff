//! Filter conditions
//!
//! Each operator carries its own value shape, so an `in` filter always holds
//! a list and `eq` / `contains` always hold exactly one value.

use super::{Field, ParamsError};
use std::fmt;
use std::str::FromStr;

/// Comparison applied by a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Equals,
    Contains,
    In,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Equals => "eq",
            FilterOperator::Contains => "contains",
            FilterOperator::In => "in",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = ParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(FilterOperator::Equals),
            "contains" => Ok(FilterOperator::Contains),
            "in" => Ok(FilterOperator::In),
            other => Err(ParamsError::InvalidOperator(other.to_string())),
        }
    }
}

/// Operator together with its operand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Equals(String),
    Contains(String),
    In(Vec<String>),
}

impl FilterValue {
    pub fn operator(&self) -> FilterOperator {
        match self {
            FilterValue::Equals(_) => FilterOperator::Equals,
            FilterValue::Contains(_) => FilterOperator::Contains,
            FilterValue::In(_) => FilterOperator::In,
        }
    }
}

/// Values are written between single quotes with no escape syntax
fn quotable(value: String) -> Result<String, ParamsError> {
    if value.contains('\'') {
        return Err(ParamsError::QuotedValue(value));
    }
    Ok(value)
}

/// A single filter condition on an entity attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    key: Field,
    value: FilterValue,
}

impl Filter {
    /// `key eq 'value'`
    pub fn equals(key: Field, value: impl Into<String>) -> Result<Self, ParamsError> {
        Ok(Self {
            key,
            value: FilterValue::Equals(quotable(value.into())?),
        })
    }

    /// `contains(key, 'value')`
    pub fn contains(key: Field, value: impl Into<String>) -> Result<Self, ParamsError> {
        Ok(Self {
            key,
            value: FilterValue::Contains(quotable(value.into())?),
        })
    }

    /// `key in ('v1', 'v2', ...)`
    ///
    /// Fails when `values` is empty, since `in ()` matches nothing and is
    /// rejected by the API.
    pub fn one_of<I, S>(key: Field, values: I) -> Result<Self, ParamsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values
            .into_iter()
            .map(|value| quotable(value.into()))
            .collect::<Result<Vec<String>, _>>()?;
        if values.is_empty() {
            return Err(ParamsError::Arity {
                operator: FilterOperator::In,
                expected: "at least one value",
                got: 0,
            });
        }
        Ok(Self {
            key,
            value: FilterValue::In(values),
        })
    }

    /// Build a filter from an operator chosen at runtime
    pub fn new(
        key: Field,
        operator: FilterOperator,
        values: Vec<String>,
    ) -> Result<Self, ParamsError> {
        match operator {
            FilterOperator::In => Self::one_of(key, values),
            FilterOperator::Equals | FilterOperator::Contains => {
                let got = values.len();
                let mut values = values.into_iter();
                match (values.next(), values.next()) {
                    (Some(value), None) if operator == FilterOperator::Equals => {
                        Self::equals(key, value)
                    }
                    (Some(value), None) => Self::contains(key, value),
                    _ => Err(ParamsError::Arity {
                        operator,
                        expected: "exactly one value",
                        got,
                    }),
                }
            }
        }
    }

    pub fn key(&self) -> Field {
        self.key
    }

    pub fn operator(&self) -> FilterOperator {
        self.value.operator()
    }

    pub fn value(&self) -> &FilterValue {
        &self.value
    }

    /// Textual form sent as a `filter=` query value
    pub fn query_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            FilterValue::Equals(value) => write!(f, "{} eq '{}'", self.key, value),
            FilterValue::Contains(value) => write!(f, "contains({}, '{}')", self.key, value),
            FilterValue::In(values) => {
                write!(f, "{} in (", self.key)?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "'{}'", value)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Parses `key:operator:value[,value...]`, e.g. `entityMake:contains:Dell`
impl FromStr for Filter {
    type Err = ParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let (Some(key), Some(operator), Some(raw)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(ParamsError::Malformed {
                kind: "filter",
                input: s.to_string(),
                expected: "key:operator:value",
            });
        };

        let key: Field = key.parse()?;
        let operator: FilterOperator = operator.parse()?;
        let values = match operator {
            FilterOperator::In => raw
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect(),
            _ => vec![raw.to_string()],
        };

        Filter::new(key, operator, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equals_serialization() {
        let filter = Filter::equals(Field::EntitySerialNum, "ABC123").unwrap();
        assert_eq!(filter.query_value(), "entitySerialNum eq 'ABC123'");
        assert_eq!(filter.operator(), FilterOperator::Equals);
    }

    #[test]
    fn test_contains_serialization() {
        let filter = Filter::contains(Field::EntityMake, "Dell").unwrap();
        assert_eq!(filter.query_value(), "contains(entityMake, 'Dell')");
    }

    #[test]
    fn test_in_serialization_quotes_each_member() {
        let filter = Filter::one_of(Field::LocationCity, ["a", "b"]).unwrap();
        assert_eq!(filter.query_value(), "locationCity in ('a', 'b')");

        let single = Filter::one_of(Field::Name, vec!["only".to_string()]).unwrap();
        assert_eq!(single.query_value(), "name in ('only')");
    }

    #[test]
    fn test_in_requires_values() {
        let err = Filter::one_of(Field::Name, Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, ParamsError::Arity { got: 0, .. }));
    }

    #[test]
    fn test_single_quote_in_value_is_rejected() {
        let quoted = ParamsError::QuotedValue("O'Brien".to_string());
        assert_eq!(Filter::equals(Field::Name, "O'Brien").unwrap_err(), quoted);
        assert_eq!(Filter::contains(Field::Name, "O'Brien").unwrap_err(), quoted);
        assert_eq!(
            Filter::one_of(Field::Name, ["ok", "O'Brien"]).unwrap_err(),
            quoted
        );
        assert_eq!("name:eq:O'Brien".parse::<Filter>().unwrap_err(), quoted);
    }

    #[test]
    fn test_runtime_operator_checks_arity() {
        let ok = Filter::new(
            Field::EntityId,
            FilterOperator::Contains,
            vec!["x".to_string()],
        )
        .unwrap();
        assert_eq!(ok.query_value(), "contains(entityId, 'x')");

        let err = Filter::new(
            Field::EntityId,
            FilterOperator::Equals,
            vec!["x".to_string(), "y".to_string()],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ParamsError::Arity {
                operator: FilterOperator::Equals,
                expected: "exactly one value",
                got: 2,
            }
        );

        assert!(Filter::new(Field::EntityId, FilterOperator::Equals, vec![]).is_err());
    }

    #[test]
    fn test_parse_filter_expressions() {
        let eq: Filter = "entitySerialNum:eq:ABC123".parse().unwrap();
        assert_eq!(eq, Filter::equals(Field::EntitySerialNum, "ABC123").unwrap());

        let within: Filter = "locationCountry:in:US, DE".parse().unwrap();
        assert_eq!(within.query_value(), "locationCountry in ('US', 'DE')");

        // value may itself contain the separator
        let url: Filter = "name:eq:host:8080".parse().unwrap();
        assert_eq!(url.query_value(), "name eq 'host:8080'");
    }

    #[test]
    fn test_parse_rejects_unknown_key_and_operator() {
        assert_eq!(
            "serial:eq:x".parse::<Filter>().unwrap_err(),
            ParamsError::InvalidKey("serial".to_string())
        );
        assert_eq!(
            "entityId:ne:x".parse::<Filter>().unwrap_err(),
            ParamsError::InvalidOperator("ne".to_string())
        );
        assert!(matches!(
            "entityId".parse::<Filter>().unwrap_err(),
            ParamsError::Malformed { .. }
        ));
    }
}
