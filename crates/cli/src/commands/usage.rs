//! Telemetry usage queries

use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use scheduler_lib::telemetry::{
    TelemetryClient, TimeWindow, UsageByEntityResponse, UsageSeriesResponse,
};
use tabled::Tabled;

use crate::output::{format_metric, print_info, print_table, OutputFormat};
use crate::QueryArgs;

#[derive(Tabled, serde::Serialize)]
struct EntityRow {
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Make / Model")]
    model: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "CO2e (t)")]
    co2e: String,
    #[tabled(rename = "Cost (USD)")]
    cost: String,
    #[tabled(rename = "Energy (kWh)")]
    energy: String,
}

#[derive(Tabled, serde::Serialize)]
struct SeriesRow {
    #[tabled(rename = "Entity")]
    id: String,
    #[tabled(rename = "Time Bucket")]
    time_bucket: String,
    #[tabled(rename = "CO2e (t)")]
    co2e: String,
    #[tabled(rename = "Cost (USD)")]
    cost: String,
    #[tabled(rename = "Energy (kWh)")]
    energy: String,
}

fn entity_rows(response: &UsageByEntityResponse) -> Vec<EntityRow> {
    response
        .items
        .iter()
        .map(|entity| {
            let location = [&entity.location_city, &entity.location_country]
                .into_iter()
                .filter_map(|part| part.as_deref())
                .collect::<Vec<_>>()
                .join(", ");

            EntityRow {
                serial: entity.entity_serial_num.clone(),
                name: entity.name.clone(),
                model: format!("{} {}", entity.entity_make, entity.entity_model)
                    .trim()
                    .to_string(),
                location,
                co2e: format_metric(entity.usage.co2e_metric_ton()),
                cost: format_metric(entity.usage.cost_usd()),
                energy: format_metric(entity.usage.kwh()),
            }
        })
        .collect()
}

fn series_rows(response: &UsageSeriesResponse) -> Vec<SeriesRow> {
    response
        .items
        .iter()
        .map(|item| SeriesRow {
            id: item.id.clone(),
            time_bucket: item.time_bucket.clone(),
            co2e: format_metric(item.usage.co2e_metric_ton()),
            cost: format_metric(item.usage.cost_usd()),
            energy: format_metric(item.usage.kwh()),
        })
        .collect()
}

/// Show aggregate usage per entity
pub async fn show_entities(
    client: &TelemetryClient,
    query: &QueryArgs,
    format: OutputFormat,
) -> Result<()> {
    let window = TimeWindow::lookback(Utc::now(), query.days);
    let response = client
        .usage_by_entity(&window, &query.params())
        .await
        .context("Failed to query usage by entity")?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Table => {
            println!("{}", "Usage by Entity".bold());
            print_table(&entity_rows(&response), format);
            print_info(&format!(
                "Showing {} of {} entities (offset {})",
                response.count, response.total, response.offset
            ));
        }
    }

    Ok(())
}

/// Show time-bucketed usage
pub async fn show_series(
    client: &TelemetryClient,
    query: &QueryArgs,
    interval: &str,
    format: OutputFormat,
) -> Result<()> {
    let window = TimeWindow::lookback(Utc::now(), query.days);
    let response = client
        .usage_series(&window, interval, &query.params())
        .await
        .context("Failed to query usage series")?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Table => {
            println!("{} ({})", "Usage Series".bold(), interval.cyan());
            print_table(&series_rows(&response), format);
            print_info(&format!("{} buckets", response.count));
        }
    }

    Ok(())
}
