//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config::StrategyConfig;
use crate::domain::config_validation::{load_strategy_config, validate_data_config};
use crate::domain::error::MispricerError;
use crate::domain::factor::ScoreLabel;
use crate::domain::pipeline::{
    run_rebalance_with, score_universe_at, DegeneratePolicy, RebalanceOutcome, ScoringOutcome,
};
use crate::domain::position::Position;
use crate::domain::risk::{RiskController, WealthHistory};
use crate::logging::{init_logging, LogFormat};
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(
    name = "mispricer",
    about = "Fundamental mispricing stock selection with beta ranking and drawdown control"
)]
pub struct Cli {
    /// Log level, overrides [logging] level
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    /// Log format (pretty or json), overrides [logging] format
    #[arg(long, global = true)]
    pub log_format: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Score the universe on fundamentals and label it by quintile
    Score {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        date: NaiveDate,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run one two-stage selection and compute target weights
    Rebalance {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        date: NaiveDate,
        /// Date of the factor update feeding the high-score group
        #[arg(long)]
        factor_date: Option<NaiveDate>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Fall back to equal weights when weighting degenerates, as
        /// [weighting] equal_weight_fallback does
        #[arg(long)]
        equal_weight_fallback: bool,
    },
    /// Apply the drawdown rule and stop-loss to a wealth history and positions
    Risk {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        wealth: PathBuf,
        #[arg(long)]
        positions: Option<PathBuf>,
    },
    /// Validate a strategy configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let overrides = LogOverrides {
        level: cli.log_level,
        format: cli.log_format,
    };
    match cli.command {
        Command::Score {
            config,
            date,
            output,
        } => run_score(&config, date, output.as_deref(), &overrides),
        Command::Rebalance {
            config,
            date,
            factor_date,
            output,
            equal_weight_fallback,
        } => run_rebalance_cmd(
            &config,
            date,
            factor_date.unwrap_or(date),
            output.as_deref(),
            equal_weight_fallback,
            &overrides,
        ),
        Command::Risk {
            config,
            wealth,
            positions,
        } => run_risk(config.as_deref(), &wealth, positions.as_deref(), &overrides),
        Command::Validate { config } => run_validate(&config, &overrides),
    }
}

#[derive(Debug, Default)]
pub struct LogOverrides {
    pub level: Option<String>,
    pub format: Option<String>,
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = MispricerError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Start logging from `[logging]`, with command-line flags taking precedence.
pub fn setup_logging(config: Option<&dyn ConfigPort>, overrides: &LogOverrides) {
    let level = overrides
        .level
        .clone()
        .or_else(|| config.and_then(|c| c.get_string("logging", "level")))
        .unwrap_or_else(|| "warn".to_string());
    let format = overrides
        .format
        .clone()
        .or_else(|| config.and_then(|c| c.get_string("logging", "format")))
        .and_then(|f| f.parse::<LogFormat>().ok())
        .unwrap_or_default();
    init_logging(&level, format);
}

fn report_error(e: &MispricerError) -> ExitCode {
    eprintln!("error: {e}");
    e.into()
}

/// Config file, validated strategy config and the CSV data source it names.
fn open_run(
    config_path: &Path,
    overrides: &LogOverrides,
) -> Result<(StrategyConfig, CsvAdapter), ExitCode> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    setup_logging(Some(&adapter), overrides);

    let config = load_strategy_config(&adapter).map_err(|e| report_error(&e))?;
    let data_path = validate_data_config(&adapter).map_err(|e| report_error(&e))?;
    let data_path = resolve_data_path(config_path, &data_path);
    eprintln!("Reading data from {}", data_path.display());
    Ok((config, CsvAdapter::new(data_path)))
}

/// Relative data paths are taken from the config file's directory.
pub fn resolve_data_path(config_path: &Path, data_path: &str) -> PathBuf {
    let path = PathBuf::from(data_path);
    if path.is_absolute() {
        return path;
    }
    match config_path.parent() {
        Some(dir) => dir.join(path),
        None => path,
    }
}

fn run_score(
    config_path: &Path,
    date: NaiveDate,
    output: Option<&Path>,
    overrides: &LogOverrides,
) -> ExitCode {
    let (config, data) = match open_run(config_path, overrides) {
        Ok(r) => r,
        Err(code) => return code,
    };

    eprintln!("Scoring universe at {date}...");
    let outcome = match score_universe_at(&data, &config, date) {
        Ok(o) => o,
        Err(e) => return report_error(&e),
    };

    print_scores(&outcome, config.selection.high_score_label);

    if let Some(path) = output {
        if let Err(e) = write_report(path, |p| CsvReportAdapter.write_scores(&outcome, p)) {
            return report_error(&e);
        }
        eprintln!("Scores written to {}", path.display());
    }
    ExitCode::SUCCESS
}

pub fn print_scores(outcome: &ScoringOutcome, high_label: ScoreLabel) {
    println!("Date:       {}", outcome.date);
    println!("Universe:   {}", outcome.universe.count());
    println!("Scored:     {}", outcome.scored.records.len());
    println!("Dropped:    {}", outcome.scored.dropped.len());
    for label in ScoreLabel::ALL {
        let n = outcome.scored.codes_with_label(label).len();
        println!("  {:<9} {}", label.as_str(), n);
    }
    println!("High-score group ({}):", high_label);
    for code in &outcome.high_score {
        println!("  {code}");
    }
}

fn run_rebalance_cmd(
    config_path: &Path,
    date: NaiveDate,
    factor_date: NaiveDate,
    output: Option<&Path>,
    equal_weight_fallback: bool,
    overrides: &LogOverrides,
) -> ExitCode {
    let (config, data) = match open_run(config_path, overrides) {
        Ok(r) => r,
        Err(code) => return code,
    };
    let policy = if equal_weight_fallback || config.weighting.equal_weight_fallback {
        DegeneratePolicy::EqualWeight
    } else {
        DegeneratePolicy::Fail
    };

    eprintln!("Updating high-score group at {factor_date}...");
    let scoring = match score_universe_at(&data, &config, factor_date) {
        Ok(o) => o,
        Err(e) => return report_error(&e),
    };

    eprintln!("Rebalancing at {date}...");
    let outcome = match run_rebalance_with(&data, &data, &config, date, &scoring.high_score, policy)
    {
        Ok(o) => o,
        Err(e) => return report_error(&e),
    };

    print_rebalance(&outcome);

    if let Some(path) = output {
        if let Err(e) = write_report(path, |p| CsvReportAdapter.write_rebalance(&outcome, p)) {
            return report_error(&e);
        }
        eprintln!("Report written to {}", path.display());
    }
    ExitCode::SUCCESS
}

pub fn print_rebalance(outcome: &RebalanceOutcome) {
    println!("Date:          {}", outcome.date);
    println!("Stage 1:       {}", outcome.stage1.len());
    println!("Stage 2:       {}", outcome.stage2.len());
    if outcome.equal_weighted {
        println!("Weighting:     equal (fallback)");
    }
    println!("Target weights:");
    for (code, weight) in &outcome.weights.weights {
        println!("  {:<14} {:>8.4}", code, weight);
    }
    if !outcome.dropped.is_empty() {
        println!("Dropped ({}):", outcome.dropped.len());
        for d in &outcome.dropped {
            println!("  {:<14} {}", d.code, d.reason);
        }
    }
}

fn write_report(
    path: &Path,
    write: impl FnOnce(&str) -> Result<(), MispricerError>,
) -> Result<(), MispricerError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| MispricerError::Io(format!("non-UTF-8 output path {}", path.display())))?;
    write(path_str)
}

#[derive(Debug, Deserialize)]
struct WealthRow {
    value: f64,
}

#[derive(Debug, Deserialize)]
struct PositionRow {
    code: String,
    avg_cost: f64,
    current_price: f64,
}

fn read_csv_rows<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>, MispricerError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| MispricerError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        rows.push(result.map_err(|e| MispricerError::Data {
            reason: format!("CSV parse error in {}: {}", path.display(), e),
        })?);
    }
    Ok(rows)
}

/// Wealth history from a CSV with a `value` column, oldest first. Only the
/// last window of values is retained; a non-finite value is a data error.
pub fn read_wealth(path: &Path) -> Result<WealthHistory, MispricerError> {
    let rows: Vec<WealthRow> = read_csv_rows(path)?;
    if let Some(i) = rows.iter().position(|r| !r.value.is_finite()) {
        return Err(MispricerError::Data {
            reason: format!(
                "non-finite value {} on row {} of {}",
                rows[i].value,
                i + 1,
                path.display()
            ),
        });
    }
    Ok(WealthHistory::from_values(rows.into_iter().map(|r| r.value)))
}

/// Positions from a CSV with `code,avg_cost,current_price` columns.
pub fn read_positions(path: &Path) -> Result<Vec<Position>, MispricerError> {
    let rows: Vec<PositionRow> = read_csv_rows(path)?;
    Ok(rows
        .into_iter()
        .map(|r| Position::new(r.code, r.avg_cost, r.current_price))
        .collect())
}

fn run_risk(
    config_path: Option<&Path>,
    wealth_path: &Path,
    positions_path: Option<&Path>,
    overrides: &LogOverrides,
) -> ExitCode {
    let config = match config_path {
        Some(path) => {
            let adapter = match load_config(path) {
                Ok(a) => a,
                Err(code) => return code,
            };
            setup_logging(Some(&adapter), overrides);
            match load_strategy_config(&adapter) {
                Ok(c) => c,
                Err(e) => return report_error(&e),
            }
        }
        None => {
            setup_logging(None, overrides);
            StrategyConfig::default()
        }
    };
    let controller = RiskController::new(config.risk);

    let wealth = match read_wealth(wealth_path) {
        Ok(w) => w,
        Err(e) => return report_error(&e),
    };
    let positions = match positions_path.map(read_positions).transpose() {
        Ok(p) => p.unwrap_or_default(),
        Err(e) => return report_error(&e),
    };

    match wealth.drawdown() {
        Some(dd) => println!("Drawdown:        {:.4}", dd),
        None => println!("Drawdown:        n/a ({} observations)", wealth.len()),
    }
    println!(
        "Position ratio:  {:.4}",
        controller.current_position_ratio(&wealth)
    );

    let liquidations = controller.liquidations(&positions);
    if liquidations.is_empty() {
        println!("Stop loss:       none");
    } else {
        println!("Stop loss:");
        for code in &liquidations {
            println!("  {code}");
        }
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path, overrides: &LogOverrides) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    setup_logging(Some(&adapter), overrides);

    let config = match load_strategy_config(&adapter) {
        Ok(c) => c,
        Err(e) => return report_error(&e),
    };

    eprintln!("\nSchedule:");
    eprintln!("  rebalance every {} days", config.schedule.rebalance_interval_days);
    eprintln!(
        "  factors every   {} days",
        config.schedule.factor_update_interval_days
    );
    eprintln!("\nSelection:");
    eprintln!(
        "  stage 1 {} / stage 2 {}, beta window {} days, benchmark label {}",
        config.selection.num_first_stage,
        config.selection.num_second_stage,
        config.selection.beta_window_days,
        config.selection.high_score_label
    );
    eprintln!("\nRisk:");
    eprintln!(
        "  drawdown threshold {}, floor {}, stop loss {}",
        config.risk.max_drawdown_threshold,
        config.risk.min_position_ratio,
        config.risk.single_stock_stop_loss
    );

    if adapter.get_string("data", "path").is_none() {
        eprintln!("\nwarning: no [data] path, score and rebalance will not run");
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}
