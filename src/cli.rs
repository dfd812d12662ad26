//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvTableAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{build_run_config, RunConfig};
use crate::domain::engine::PanelEngine;
use crate::domain::error::{PanelError, ToolkitError};
use crate::domain::frame::{Container, LabeledSeries, LabeledTable};
use crate::domain::label::Label;
use crate::domain::layout::LayoutKind;
use crate::domain::performance::Performance;
use crate::domain::portfolio::PortfolioTags;
use crate::domain::rolling::rolling;
use crate::domain::window_fns::Stat;
use crate::ports::table_port::TableSink;

#[derive(Parser, Debug)]
#[command(name = "quantpanel", about = "Panel-data engine for quantitative research")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the layout kind and shape of a CSV table
    Inspect {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(long, default_value_t = 2)]
        index_levels: usize,
    },
    /// Evaluate a weight panel: profit, turnover, net worth and performance
    Evaluate {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        weights: PathBuf,
        #[arg(long)]
        prices: PathBuf,
        /// Key columns in the prices file (1 for a wide date x asset table)
        #[arg(long, default_value_t = 2)]
        price_index_levels: usize,
        /// Per-period returns; derived from prices between rebalances if absent
        #[arg(long)]
        returns: Option<PathBuf>,
        #[arg(long, default_value_t = 2)]
        returns_index_levels: usize,
        /// Directory to write result tables to
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Apply a window statistic through the rolling engine
    RollingStat {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        input: PathBuf,
        #[arg(long, default_value_t = 2)]
        index_levels: usize,
        /// sum, mean, stddev or last
        #[arg(long)]
        stat: Stat,
        #[arg(long)]
        window: Option<usize>,
        #[arg(long)]
        offset: Option<usize>,
        #[arg(long)]
        interval: Option<usize>,
        #[arg(long)]
        processes: Option<usize>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Inspect {
            input,
            index_levels,
        } => {
            init_tracing(None);
            run_inspect(&input, index_levels)
        }
        Command::Evaluate {
            config,
            weights,
            prices,
            price_index_levels,
            returns,
            returns_index_levels,
            output,
        } => load_run_config(config.as_deref()).and_then(|run| {
            init_tracing(run.log_level.as_deref());
            let inputs = EvaluateInputs {
                weights: load_table(&weights, 2)?,
                prices: load_table(&prices, price_index_levels)?,
                returns: returns
                    .map(|path| load_table(&path, returns_index_levels))
                    .transpose()?,
            };
            run_evaluate(&run, inputs, output.as_deref())
        }),
        Command::RollingStat {
            config,
            input,
            index_levels,
            stat,
            window,
            offset,
            interval,
            processes,
            output,
        } => load_run_config(config.as_deref()).and_then(|mut run| {
            init_tracing(run.log_level.as_deref());
            run.window = window.unwrap_or(run.window);
            run.offset = offset.unwrap_or(run.offset);
            run.interval = interval.unwrap_or(run.interval);
            run.processes = processes.unwrap_or(run.processes);
            let container = load_table(&input, index_levels)?;
            let table = rolling_stat(&run, &container, stat)?;
            match output {
                Some(path) => {
                    CsvTableAdapter::new(PathBuf::new()).write_file(&path, &table.into())?;
                    eprintln!("Result written to: {}", path.display());
                }
                None => print_table(&table),
            }
            Ok(())
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Log to stderr, filtered by `RUST_LOG`, else `level`, else `info`.
pub fn init_tracing(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("info")));
    // A subscriber may already be installed when called more than once in-process.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn load_run_config(path: Option<&Path>) -> Result<RunConfig, ToolkitError> {
    match path {
        Some(path) => {
            eprintln!("Loading config from {}", path.display());
            let adapter = FileConfigAdapter::from_file(path)?;
            build_run_config(&adapter)
        }
        None => Ok(RunConfig::default()),
    }
}

pub fn load_table(path: &Path, index_levels: usize) -> Result<Container, ToolkitError> {
    CsvTableAdapter::new(PathBuf::new())
        .with_index_levels(index_levels)
        .read_file(path)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inspection {
    pub kind: LayoutKind,
    pub rows: usize,
    pub columns: usize,
    pub levels: Vec<String>,
}

pub fn inspect(container: &Container) -> Result<Inspection, ToolkitError> {
    let kind = PanelEngine::default().classify(container)?;
    let columns = match container {
        Container::Table(t) => t.ncols(),
        Container::Series(_) => 1,
    };
    Ok(Inspection {
        kind,
        rows: container.nrows(),
        columns,
        levels: container.index().names().to_vec(),
    })
}

fn run_inspect(path: &Path, index_levels: usize) -> Result<(), ToolkitError> {
    let inspection = inspect(&load_table(path, index_levels)?)?;
    println!(
        "{}: {} ({} rows x {} columns, levels: {})",
        path.display(),
        inspection.kind,
        inspection.rows,
        inspection.columns,
        inspection.levels.join(", ")
    );
    Ok(())
}

pub struct EvaluateInputs {
    pub weights: Container,
    pub prices: Container,
    pub returns: Option<Container>,
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub weights: LabeledSeries,
    pub returns: Container,
    pub profit: LabeledSeries,
    pub turnover: LabeledSeries,
    pub networth: LabeledSeries,
    pub performance: Performance,
}

/// Pull the configured tag column out of a weight table.
pub fn split_tags(
    weights: Container,
    tag_column: Option<&str>,
) -> Result<(Container, Option<PortfolioTags>), ToolkitError> {
    let Some(column) = tag_column else {
        return Ok((weights, None));
    };
    let label = Label::parse(column);
    let table = match weights {
        Container::Table(t) => t,
        Container::Series(_) => {
            return Err(PanelError::key_not_found(&label, "indicator").into());
        }
    };
    let tag_idx = (0..table.ncols())
        .find(|&c| table.columns().key(c).outer() == &label)
        .ok_or_else(|| PanelError::key_not_found(&label, "indicator"))?;
    let tags = PortfolioTags::from_series(&table.column_series(tag_idx))?;
    let rest: Vec<usize> = (0..table.ncols()).filter(|&c| c != tag_idx).collect();
    Ok((table.take_columns(&rest).into_container(), Some(tags)))
}

pub fn evaluate(run: &RunConfig, inputs: EvaluateInputs) -> Result<Evaluation, ToolkitError> {
    let accountant = run.accountant();
    let (weights, tags) = split_tags(inputs.weights, run.tag_column.as_deref())?;

    let returns = match inputs.returns {
        Some(returns) => returns,
        None => Container::Series(accountant.rebalance_returns(&weights, &inputs.prices)?),
    };
    let normalized = accountant.normalize(&weights, tags.as_ref())?;
    let profit = accountant.profit(&weights, &returns, tags.as_ref())?;
    let turnover = accountant.turnover(&weights, run.turnover_side, tags.as_ref())?;
    let networth = accountant.networth(&weights, &inputs.prices)?;
    let performance = Performance::compute(&networth, run.risk_free_rate, run.periods_per_year);
    info!(
        rebalances = profit.len(),
        periods = networth.len(),
        "evaluation complete"
    );

    Ok(Evaluation {
        weights: normalized,
        returns,
        profit,
        turnover,
        networth,
        performance,
    })
}

pub fn write_evaluation(evaluation: &Evaluation, sink: &dyn TableSink) -> Result<(), ToolkitError> {
    sink.write("weights", &evaluation.weights.clone().into())?;
    sink.write("returns", &evaluation.returns)?;
    sink.write("profit", &evaluation.profit.clone().into())?;
    sink.write("turnover", &evaluation.turnover.clone().into())?;
    sink.write("networth", &evaluation.networth.clone().into())?;
    Ok(())
}

fn run_evaluate(
    run: &RunConfig,
    inputs: EvaluateInputs,
    output: Option<&Path>,
) -> Result<(), ToolkitError> {
    let evaluation = evaluate(run, inputs)?;
    let perf = &evaluation.performance;

    eprintln!("\n=== Portfolio Results ===");
    eprintln!("Rebalances:       {}", evaluation.profit.len());
    eprintln!("Periods:          {}", perf.periods);
    eprintln!("Total Return:     {:.2}%", perf.total_return * 100.0);
    eprintln!("Annualized:       {:.2}%", perf.annualized_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", perf.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", perf.sortino_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", perf.max_drawdown * 100.0);
    let turnover: Vec<f64> = evaluation
        .turnover
        .values()
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .collect();
    if !turnover.is_empty() {
        eprintln!(
            "Mean Turnover:    {:.2}% ({})",
            turnover.iter().sum::<f64>() / turnover.len() as f64 * 100.0,
            run.turnover_side
        );
    }

    if let Some(dir) = output {
        write_evaluation(&evaluation, &CsvTableAdapter::new(dir.to_path_buf()))?;
        eprintln!("\nResults written to: {}", dir.display());
    }
    Ok(())
}

pub fn rolling_stat(
    run: &RunConfig,
    container: &Container,
    stat: Stat,
) -> Result<LabeledTable, ToolkitError> {
    let table = rolling(container, &run.rolling_options(), |w: &Container| stat.apply(w))?;
    Ok(table)
}

fn print_table(table: &LabeledTable) {
    let mut header: Vec<String> = table.index().names().to_vec();
    header.extend(table.columns().keys().iter().map(|k| k.to_string()));
    println!("{}", header.join(","));
    for r in 0..table.nrows() {
        let mut cells: Vec<String> = table
            .index()
            .key(r)
            .levels()
            .iter()
            .map(|l| l.to_string())
            .collect();
        cells.extend(table.row(r).iter().map(|v| {
            if v.is_nan() {
                String::new()
            } else {
                v.to_string()
            }
        }));
        println!("{}", cells.join(","));
    }
}
