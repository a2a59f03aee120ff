//! Wire types returned by the telemetry API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Treat an explicit JSON `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Cost, emissions and energy attached to an entity or a time bucket
///
/// Any of the three may be `null` on the wire; the accessors read a missing
/// value as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageTotals {
    pub cost_usd: Option<f64>,
    pub co2e_metric_ton: Option<f64>,
    pub kwh: Option<f64>,
}

impl UsageTotals {
    pub fn cost_usd(&self) -> f64 {
        self.cost_usd.unwrap_or(0.0)
    }

    pub fn co2e_metric_ton(&self) -> f64 {
        self.co2e_metric_ton.unwrap_or(0.0)
    }

    pub fn kwh(&self) -> f64 {
        self.kwh.unwrap_or(0.0)
    }
}

/// One entity in a usage-by-entity response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageEntity {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(deserialize_with = "null_as_default")]
    pub entity_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub entity_make: String,
    #[serde(deserialize_with = "null_as_default")]
    pub entity_model: String,
    #[serde(deserialize_with = "null_as_default")]
    pub entity_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub entity_serial_num: String,
    #[serde(deserialize_with = "null_as_default")]
    pub entity_product_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub entity_manufacture_timestamp: String,
    pub location_name: Option<String>,
    pub location_id: Option<String>,
    pub location_city: Option<String>,
    pub location_state: Option<String>,
    pub location_country: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(flatten)]
    pub usage: UsageTotals,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageByEntityResponse {
    #[serde(deserialize_with = "null_as_default")]
    pub items: Vec<UsageEntity>,
    #[serde(deserialize_with = "null_as_default")]
    pub count: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub total: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub offset: i64,
}

/// One time bucket in a usage-series response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageSeriesItem {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(deserialize_with = "null_as_default")]
    pub time_bucket: String,
    #[serde(flatten)]
    pub usage: UsageTotals,
}

impl UsageSeriesItem {
    /// Start of the bucket, parsed as RFC 3339
    pub fn time_bucket(&self) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(&self.time_bucket).map(|t| t.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageSeriesResponse {
    #[serde(deserialize_with = "null_as_default")]
    pub items: Vec<UsageSeriesItem>,
    #[serde(deserialize_with = "null_as_default")]
    pub count: i64,
}
