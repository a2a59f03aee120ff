//! On-demand sustainability scoring

use anyhow::{Context, Result};
use colored::Colorize;
use kube::config::{KubeConfigOptions, Kubeconfig};
use scheduler_lib::{
    scoring::{scale_score, SCORE_SCALING_FACTOR},
    CycleContext, KubeNodeLabels, NodeEvaluation, NodeLabelSource, StaticNodeLabels,
    SustainabilityScorer,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::output::{print_success, print_warning, OutputFormat};
use crate::{ApiArgs, ScoreArgs};

#[derive(Debug, Serialize)]
struct ScoreReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    serial: Option<String>,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_score: Option<f64>,
    score: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl ScoreReport {
    fn from_evaluation(node: &str, evaluation: NodeEvaluation) -> Self {
        let outcome = evaluation.outcome().as_str();
        let score = evaluation.score();
        match evaluation {
            NodeEvaluation::Scored {
                serial, raw_score, ..
            } => Self {
                node: Some(node.to_string()),
                serial: Some(serial),
                outcome,
                raw_score: Some(raw_score),
                score,
                reason: None,
            },
            NodeEvaluation::NoLabel { reason } => Self {
                node: Some(node.to_string()),
                serial: None,
                outcome,
                raw_score: None,
                score,
                reason: Some(reason),
            },
            NodeEvaluation::NoTelemetry { serial } => Self {
                node: Some(node.to_string()),
                serial: Some(serial),
                outcome,
                raw_score: None,
                score,
                reason: Some("no telemetry entity matched the serial number".to_string()),
            },
        }
    }

    fn from_raw_score(serial: &str, raw_score: Option<f64>) -> Self {
        Self {
            node: None,
            serial: Some(serial.to_string()),
            outcome: if raw_score.is_some() { "scored" } else { "no_telemetry" },
            score: raw_score.map(scale_score).unwrap_or(0),
            raw_score,
            reason: None,
        }
    }
}

async fn kube_labels(kubeconfig: Option<&str>) -> Result<KubeNodeLabels> {
    let client = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .with_context(|| format!("Failed to read kubeconfig {}", path))?;
            let config =
                kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .context("Invalid kubeconfig")?;
            kube::Client::try_from(config).context("Failed to create Kubernetes client")?
        }
        None => kube::Client::try_default()
            .await
            .context("Failed to create Kubernetes client")?,
    };
    Ok(KubeNodeLabels::new(client))
}

/// Score a serial number directly or a node via its serial number label
pub async fn show_score(
    api: &ApiArgs,
    args: &ScoreArgs,
    kubeconfig: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let labels: Arc<dyn NodeLabelSource> = match &args.node {
        Some(_) => Arc::new(kube_labels(kubeconfig).await?),
        None => Arc::new(StaticNodeLabels::new()),
    };

    let scorer = SustainabilityScorer::new(&args.scheduler_args(api), labels)
        .context("Failed to create scorer")?;
    let ctx = CycleContext::with_timeout(Duration::from_secs(args.timeout_secs));

    let report = match (&args.node, &args.serial) {
        (Some(node), _) => {
            let evaluation = scorer
                .evaluate_node(node, &ctx)
                .await
                .with_context(|| format!("Failed to score node {}", node))?;
            ScoreReport::from_evaluation(node, evaluation)
        }
        (None, Some(serial)) => {
            let raw_score = scorer
                .raw_score(serial, &ctx)
                .await
                .with_context(|| format!("Failed to score serial number {}", serial))?;
            ScoreReport::from_raw_score(serial, raw_score)
        }
        (None, None) => anyhow::bail!("either --serial or --node is required"),
    };

    print_report(&report, format)
}

fn print_report(report: &ScoreReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Table => {
            println!("{}", "Sustainability Score".bold());
            println!("{}", "=".repeat(50));
            if let Some(node) = &report.node {
                println!("Node:                   {}", node.cyan());
            }
            if let Some(serial) = &report.serial {
                println!("Serial number:          {}", serial.cyan());
            }

            match report.raw_score {
                Some(raw) => {
                    println!("Raw score:              {:.4}", raw);
                    println!(
                        "Scaled score:           {} (x{})",
                        report.score.to_string().green(),
                        SCORE_SCALING_FACTOR
                    );
                    println!();
                    print_success("Score computed from telemetry");
                }
                None => {
                    println!("Scaled score:           {}", report.score);
                    println!();
                    let reason = report.reason.as_deref().unwrap_or("no telemetry");
                    print_warning(&format!("Neutral score: {}", reason));
                }
            }
        }
    }

    Ok(())
}
