//! Green Scheduler CLI
//!
//! Query the sustainability telemetry API and compute node scores the same
//! way the scheduler extender does.

mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use commands::{score, usage};
use scheduler_lib::{
    params::{Filter, Limit, Offset, Params, Sort},
    telemetry::{ClientConfig, TokenConfig},
    SchedulerArgs,
};
use tracing_subscriber::EnvFilter;

/// Green Scheduler CLI
#[derive(Debug, Parser)]
#[command(name = "greenctl")]
#[command(author, version, about = "CLI for the Green Scheduler", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub api: ApiArgs,

    /// Path to kubeconfig file (uses default if not specified)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Telemetry API endpoint and credentials
#[derive(Debug, Args)]
pub struct ApiArgs {
    /// Telemetry API host, or base URL including scheme
    #[arg(long, env = "GREENCTL_TELEMETRY_HOST")]
    pub telemetry_host: String,

    /// OAuth2 token endpoint
    #[arg(long, env = "GREENCTL_TOKEN_URL")]
    pub token_url: String,

    #[arg(long, env = "GREENCTL_CLIENT_ID")]
    pub client_id: String,

    #[arg(long, env = "GREENCTL_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,
}

impl ApiArgs {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            hostname: self.telemetry_host.clone(),
            token: TokenConfig {
                url: self.token_url.clone(),
                client_id: self.client_id.clone(),
                client_secret: self.client_secret.clone(),
            },
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Query usage telemetry
    #[command(subcommand)]
    Usage(UsageCommands),

    /// Compute the sustainability score of a node or serial number
    Score(ScoreArgs),
}

#[derive(Debug, Subcommand)]
pub enum UsageCommands {
    /// Aggregate usage per entity
    Entities(QueryArgs),

    /// Time-bucketed usage per entity
    Series {
        #[command(flatten)]
        query: QueryArgs,

        /// Bucket size (e.g. 1h, 1d)
        #[arg(long, default_value = "1h")]
        interval: String,
    },
}

/// Filters, sorts and paging shared by the usage queries
#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    /// Filter as KEY:OP:VALUE with OP one of eq, contains, in (comma-separated values)
    #[arg(long = "filter")]
    pub filters: Vec<Filter>,

    /// Sort as KEY[:asc|desc]
    #[arg(long = "sort")]
    pub sorts: Vec<Sort>,

    #[arg(long)]
    pub offset: Option<u32>,

    #[arg(long)]
    pub limit: Option<u32>,

    /// Lookback window in days
    #[arg(long, default_value_t = 7.0)]
    pub days: f64,
}

impl QueryArgs {
    pub fn params(&self) -> Params {
        let mut params = Params::new();
        for filter in &self.filters {
            params = params.with_filter(filter.clone());
        }
        for sort in &self.sorts {
            params = params.with_sort(*sort);
        }
        if let Some(offset) = self.offset {
            params = params.with_offset(Offset(offset));
        }
        if let Some(limit) = self.limit {
            params = params.with_limit(Limit(limit));
        }
        params
    }
}

#[derive(Debug, Clone, Args)]
#[command(group(ArgGroup::new("target").required(true).args(["serial", "node"])))]
pub struct ScoreArgs {
    /// Hardware serial number as known to the telemetry API
    #[arg(long)]
    pub serial: Option<String>,

    /// Cluster node whose serial number label is looked up
    #[arg(long)]
    pub node: Option<String>,

    /// Node label holding the serial number
    #[arg(long, env = "GREENCTL_SERIAL_LABEL", default_value = "serial-number")]
    pub serial_label: String,

    /// Lookback window in days
    #[arg(long, default_value_t = 7.0)]
    pub days: f64,

    /// Series bucket size (e.g. 1h, 1d)
    #[arg(long, default_value = "1h")]
    pub interval: String,

    #[arg(long, default_value_t = 1.0)]
    pub co2_decay_weight: f64,

    #[arg(long, default_value_t = 1.0)]
    pub total_co2_weight: f64,

    #[arg(long, default_value_t = 1.0)]
    pub cost_weight: f64,

    /// Logistic decay rate per hour, in [0, 1]
    #[arg(long, default_value_t = 0.1)]
    pub decay_rate: f64,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

impl ScoreArgs {
    pub fn scheduler_args(&self, api: &ApiArgs) -> SchedulerArgs {
        SchedulerArgs {
            telemetry_hostname: api.telemetry_host.clone(),
            token_url: api.token_url.clone(),
            client_id: api.client_id.clone(),
            client_secret: api.client_secret.clone(),
            serial_num_label: self.serial_label.clone(),
            consideration_days: self.days,
            time_series_interval: self.interval.clone(),
            co2_decay_weight: self.co2_decay_weight,
            total_co2_weight: self.total_co2_weight,
            cost_weight: self.cost_weight,
            decay_rate: self.decay_rate,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("debug"))
            .with_writer(std::io::stderr)
            .init();
    }

    match &cli.command {
        Commands::Usage(usage_cmd) => {
            let client = scheduler_lib::TelemetryClient::new(cli.api.client_config())
                .context("Failed to create telemetry client")?;
            match usage_cmd {
                UsageCommands::Entities(query) => {
                    usage::show_entities(&client, query, cli.format).await?;
                }
                UsageCommands::Series { query, interval } => {
                    usage::show_series(&client, query, interval, cli.format).await?;
                }
            }
        }
        Commands::Score(args) => {
            score::show_score(&cli.api, args, cli.kubeconfig.as_deref(), cli.format).await?;
        }
    }

    Ok(())
}
