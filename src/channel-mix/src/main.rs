//! Channel Mix — marketing mix analytics engine.
//!
//! CLI driver that feeds daily channel records (from a JSON file or the
//! synthetic generator) through the attribution, saturation, optimization,
//! and metrics engines, printing results as JSON on stdout.

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use mix_attribution::{AttributionEngine, AttributionModel, ComparisonReporter};
use mix_core::config::EngineConfig;
use mix_core::types::{DailyChannelRecord, DateRange};
use mix_core::TimeSeriesStore;
use mix_datagen::DataGenerator;
use mix_metrics::{channel_performance, overview, weekly_trends};
use mix_optimizer::{BudgetOptimizer, ScenarioRequest, SpendBounds};
use mix_response::SaturationEstimator;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "channel-mix")]
#[command(about = "Marketing mix analytics: attribution, saturation, budget optimization")]
#[command(version)]
struct Cli {
    /// JSON file holding an array of daily channel records; omitted means
    /// synthetic data
    #[arg(long, global = true, env = "CHANNEL_MIX__DATA")]
    data: Option<PathBuf>,

    /// Seed for synthetic data
    #[arg(long, global = true, default_value_t = 42)]
    seed: u64,

    /// Days of synthetic data
    #[arg(long, global = true, default_value_t = 90)]
    days: u32,

    /// Time-decay half-life override, in days
    #[arg(long, global = true, env = "CHANNEL_MIX__ATTRIBUTION__HALF_LIFE_DAYS")]
    half_life: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Emit a synthetic daily series (records plus external factors)
    Generate,
    /// Attribute the range's conversions and revenue across channels
    Attribute {
        /// One of: linear, time_decay, u_shaped, data_driven
        #[arg(long, default_value = "linear")]
        model: String,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Run every attribution model and report cross-model variance
    Compare {
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Fit response curves and report saturation per channel
    Saturation,
    /// Allocate a budget across channels by marginal return
    Optimize {
        #[arg(long)]
        budget: f64,
        /// Per-channel bounds as JSON, e.g. '{"Email":{"min":100,"max":500}}'
        #[arg(long)]
        bounds: Option<String>,
    },
    /// Compare several total-budget scenarios
    Scenarios {
        /// Candidate budgets
        #[arg(long, required = true, num_args = 1..)]
        budgets: Vec<f64>,
    },
    /// Program overview metrics with prior-period deltas
    Overview {
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Detailed performance and weekly trends for one channel
    Channel {
        name: String,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "channel_mix=info,mix_core=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = EngineConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "failed to load config, using defaults");
        EngineConfig::default()
    });
    if let Some(half_life) = cli.half_life {
        config.attribution.half_life_days = half_life;
    }

    let records = load_records(&cli)?;
    info!(records = records.len(), "input series loaded");

    let store = TimeSeriesStore::new();
    store.extend(records.iter().cloned());
    let full_range = full_range(&records)?;

    let output = match &cli.command {
        Command::Generate => {
            let series = DataGenerator::new(cli.seed)
                .generate(NaiveDate::from_ymd_opt(2024, 1, 1).context("start date")?, cli.days);
            serde_json::to_value(&series)?
        }

        Command::Attribute { model, start, end } => {
            let range = requested_range(full_range, *start, *end);
            let model = parse_model(model)?;
            let engine = AttributionEngine::new(config.attribution.clone());
            let report = engine.attribute(&store.all_in_range(&range), range, model);
            serde_json::to_value(&report)?
        }

        Command::Compare { start, end } => {
            let range = requested_range(full_range, *start, *end);
            let reporter = ComparisonReporter::new(config.attribution.clone());
            let comparison = reporter.compare(&store.all_in_range(&range), range);
            serde_json::to_value(&comparison)?
        }

        Command::Saturation => {
            let estimator = SaturationEstimator::new(config.saturation.clone());
            let mut analyses = BTreeMap::new();
            let mut skipped = BTreeMap::new();
            for channel in store.channels() {
                let rows = store.records_in_range(&channel, &full_range);
                match estimator.analyze(&channel, &rows) {
                    Ok(analysis) => {
                        analyses.insert(channel, analysis);
                    }
                    Err(e) => {
                        warn!(channel = %channel, error = %e, "saturation analysis skipped");
                        skipped.insert(channel, e.to_string());
                    }
                }
            }
            json!({ "channels": analyses, "skipped": skipped })
        }

        Command::Optimize { budget, bounds } => {
            let bounds: BTreeMap<String, SpendBounds> = match bounds {
                Some(raw) => serde_json::from_str(raw).context("parsing --bounds")?,
                None => BTreeMap::new(),
            };
            let (curves, current_spend, skipped) = fit_all(&store, &config, &full_range);
            let optimizer = BudgetOptimizer::new(config.optimizer.clone());
            let plan = optimizer.optimize(&curves, &current_spend, *budget, &bounds)?;
            json!({ "plan": plan, "skipped": skipped })
        }

        Command::Scenarios { budgets } => {
            let (curves, current_spend, skipped) = fit_all(&store, &config, &full_range);
            let requests: Vec<ScenarioRequest> = budgets
                .iter()
                .enumerate()
                .map(|(i, &budget)| ScenarioRequest {
                    name: format!("scenario-{}", i + 1),
                    total_budget: budget,
                    bounds: BTreeMap::new(),
                })
                .collect();
            let optimizer = BudgetOptimizer::new(config.optimizer.clone());
            let comparison = optimizer.simulate_scenarios(&curves, &current_spend, &requests)?;
            json!({ "comparison": comparison, "skipped": skipped })
        }

        Command::Overview { start, end } => {
            let range = requested_range(full_range, *start, *end);
            let metrics = overview(&store.all_in_range(&range), range);
            serde_json::to_value(&metrics)?
        }

        Command::Channel { name, start, end } => {
            let range = requested_range(full_range, *start, *end);
            let rows = store.all_in_range(&range);
            let performance = channel_performance(&rows, name, range)?;
            let trends = weekly_trends(&rows, name, range)?;
            json!({ "performance": performance, "weekly_trends": trends })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn load_records(cli: &Cli) -> anyhow::Result<Vec<DailyChannelRecord>> {
    match &cli.data {
        Some(path) => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("opening {}", path.display()))?;
            let records: Vec<DailyChannelRecord> = serde_json::from_reader(file)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok(records)
        }
        None => {
            let start = NaiveDate::from_ymd_opt(2024, 1, 1).context("start date")?;
            Ok(DataGenerator::new(cli.seed).generate(start, cli.days).records)
        }
    }
}

fn full_range(records: &[DailyChannelRecord]) -> anyhow::Result<DateRange> {
    let start = records.iter().map(|r| r.date).min();
    let end = records.iter().map(|r| r.date).max();
    match (start, end) {
        (Some(start), Some(end)) => Ok(DateRange::new(start, end)),
        _ => bail!("input series is empty"),
    }
}

fn requested_range(full: DateRange, start: Option<NaiveDate>, end: Option<NaiveDate>) -> DateRange {
    DateRange::new(start.unwrap_or(full.start), end.unwrap_or(full.end))
}

fn parse_model(raw: &str) -> anyhow::Result<AttributionModel> {
    AttributionModel::ALL
        .into_iter()
        .find(|m| m.name() == raw)
        .with_context(|| {
            format!("unknown attribution model '{raw}'; expected linear, time_decay, u_shaped, or data_driven")
        })
}

/// Fit every channel's response curve over the window, collecting the
/// fitted curves, current trailing spend, and any channels that could not
/// be fitted. Fits are independent per channel, so they run on scoped
/// threads; only the water-filling loop itself is sequential.
fn fit_all(
    store: &TimeSeriesStore,
    config: &EngineConfig,
    range: &DateRange,
) -> (
    BTreeMap<String, mix_response::ResponseCurve>,
    BTreeMap<String, f64>,
    BTreeMap<String, String>,
) {
    let estimator = SaturationEstimator::new(config.saturation.clone());

    let outcomes = std::thread::scope(|scope| {
        let handles: Vec<_> = store
            .channels()
            .into_iter()
            .map(|channel| {
                let estimator = &estimator;
                let rows = store.records_in_range(&channel, range);
                scope.spawn(move || {
                    let outcome = estimator.analyze(&channel, &rows);
                    (channel, outcome)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("fit thread panicked"))
            .collect::<Vec<_>>()
    });

    let mut curves = BTreeMap::new();
    let mut current_spend = BTreeMap::new();
    let mut skipped = BTreeMap::new();
    for (channel, outcome) in outcomes {
        match outcome {
            Ok(analysis) => {
                current_spend.insert(channel.clone(), analysis.current_spend);
                curves.insert(channel, analysis.curve);
            }
            Err(e) => {
                warn!(channel = %channel, error = %e, "channel excluded from optimization");
                skipped.insert(channel, e.to_string());
            }
        }
    }

    (curves, current_spend, skipped)
}
