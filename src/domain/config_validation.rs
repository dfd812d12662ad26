//! Configuration validation.
//!
//! Checks every recognised key before a run and builds the typed
//! [`RunConfig`] the command line hands to the engine.

use crate::domain::error::ToolkitError;
use crate::domain::label::Label;
use crate::domain::performance::DEFAULT_PERIODS_PER_YEAR;
use crate::domain::portfolio::{PortfolioAccountant, TurnoverSide};
use crate::domain::rolling::RollingOptions;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub processes: usize,
    pub window: usize,
    pub interval: usize,
    pub offset: usize,
    pub turnover_side: TurnoverSide,
    pub weight_column: Option<String>,
    pub tag_column: Option<String>,
    pub risk_free_rate: f64,
    pub periods_per_year: f64,
    pub log_level: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            processes: 1,
            window: 1,
            interval: 1,
            offset: 0,
            turnover_side: TurnoverSide::Both,
            weight_column: None,
            tag_column: None,
            risk_free_rate: 0.0,
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
            log_level: None,
        }
    }
}

impl RunConfig {
    pub fn rolling_options(&self) -> RollingOptions {
        RollingOptions::new(self.window)
            .with_offset(self.offset)
            .with_interval(self.interval)
            .with_processes(self.processes)
    }

    pub fn accountant(&self) -> PortfolioAccountant {
        match &self.weight_column {
            Some(column) => PortfolioAccountant::new().with_weight_column(Label::parse(column)),
            None => PortfolioAccountant::new(),
        }
    }
}

pub fn validate_engine_config(config: &dyn ConfigPort) -> Result<(), ToolkitError> {
    let processes = read_int(config, "engine", "processes", 1)?;
    if processes < 1 {
        return Err(invalid("engine", "processes", "processes must be at least 1"));
    }
    let window = read_int(config, "engine", "window", 1)?;
    if window < 1 {
        return Err(invalid("engine", "window", "window must be at least 1"));
    }
    let interval = read_int(config, "engine", "interval", 1)?;
    if interval < 1 {
        return Err(invalid("engine", "interval", "interval must be at least 1"));
    }
    let offset = read_int(config, "engine", "offset", 0)?;
    if offset < 0 || offset >= window {
        return Err(invalid(
            "engine",
            "offset",
            "offset must be non-negative and smaller than window",
        ));
    }
    Ok(())
}

pub fn validate_portfolio_config(config: &dyn ConfigPort) -> Result<(), ToolkitError> {
    read_side(config)?;
    for key in ["weight_column", "tag_column"] {
        if let Some(value) = config.get_string("portfolio", key) {
            if value.trim().is_empty() {
                return Err(invalid("portfolio", key, "column name must not be empty"));
            }
        }
    }
    Ok(())
}

pub fn validate_performance_config(config: &dyn ConfigPort) -> Result<(), ToolkitError> {
    let rf = read_float(config, "performance", "risk_free_rate", 0.0)?;
    if !(0.0..1.0).contains(&rf) {
        return Err(invalid(
            "performance",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    let periods = read_float(config, "performance", "periods_per_year", DEFAULT_PERIODS_PER_YEAR)?;
    if periods <= 0.0 {
        return Err(invalid(
            "performance",
            "periods_per_year",
            "periods_per_year must be positive",
        ));
    }
    Ok(())
}

/// Validate every section, then read it into a [`RunConfig`].
pub fn build_run_config(config: &dyn ConfigPort) -> Result<RunConfig, ToolkitError> {
    validate_engine_config(config)?;
    validate_portfolio_config(config)?;
    validate_performance_config(config)?;

    let defaults = RunConfig::default();
    Ok(RunConfig {
        processes: read_int(config, "engine", "processes", 1)? as usize,
        window: read_int(config, "engine", "window", 1)? as usize,
        interval: read_int(config, "engine", "interval", 1)? as usize,
        offset: read_int(config, "engine", "offset", 0)? as usize,
        turnover_side: read_side(config)?,
        weight_column: non_empty(config.get_string("portfolio", "weight_column")),
        tag_column: non_empty(config.get_string("portfolio", "tag_column")),
        risk_free_rate: read_float(config, "performance", "risk_free_rate", 0.0)?,
        periods_per_year: read_float(
            config,
            "performance",
            "periods_per_year",
            defaults.periods_per_year,
        )?,
        log_level: non_empty(config.get_string("log", "level")),
    })
}

fn invalid(section: &str, key: &str, reason: &str) -> ToolkitError {
    ToolkitError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// `ConfigPort::get_int` falls back to the default on garbage; a typo in a
// window size should fail the run instead.
fn read_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, ToolkitError> {
    match non_empty(config.get_string(section, key)) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|_| invalid(section, key, &format!("'{}' is not an integer", raw))),
    }
}

fn read_float(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, ToolkitError> {
    match non_empty(config.get_string(section, key)) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<f64>()
            .map_err(|_| invalid(section, key, &format!("'{}' is not a number", raw))),
    }
}

fn read_side(config: &dyn ConfigPort) -> Result<TurnoverSide, ToolkitError> {
    match non_empty(config.get_string("portfolio", "turnover_side")) {
        None => Ok(TurnoverSide::Both),
        Some(raw) => raw
            .parse()
            .map_err(|_| invalid("portfolio", "turnover_side", "expected buy, sell or both")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = make_config("");
        assert_eq!(build_run_config(&config).unwrap(), RunConfig::default());
    }

    #[test]
    fn full_config_is_read() {
        let config = make_config(
            r#"
[engine]
processes = 4
window = 20
interval = 5
offset = 2

[portfolio]
turnover_side = sell
weight_column = weight
tag_column = group

[performance]
risk_free_rate = 0.03
periods_per_year = 12

[log]
level = debug
"#,
        );
        let run = build_run_config(&config).unwrap();
        assert_eq!(run.processes, 4);
        assert_eq!(run.window, 20);
        assert_eq!(run.interval, 5);
        assert_eq!(run.offset, 2);
        assert_eq!(run.turnover_side, TurnoverSide::Sell);
        assert_eq!(run.weight_column.as_deref(), Some("weight"));
        assert_eq!(run.tag_column.as_deref(), Some("group"));
        assert_eq!(run.risk_free_rate, 0.03);
        assert_eq!(run.periods_per_year, 12.0);
        assert_eq!(run.log_level.as_deref(), Some("debug"));

        let options = run.rolling_options();
        assert_eq!(options.window, 20);
        assert_eq!(options.processes, 4);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn processes_zero_fails() {
        let config = make_config("[engine]\nprocesses = 0\n");
        let err = validate_engine_config(&config).unwrap_err();
        assert!(matches!(err, ToolkitError::ConfigInvalid { key, .. } if key == "processes"));
    }

    #[test]
    fn window_zero_fails() {
        let config = make_config("[engine]\nwindow = 0\n");
        let err = validate_engine_config(&config).unwrap_err();
        assert!(matches!(err, ToolkitError::ConfigInvalid { key, .. } if key == "window"));
    }

    #[test]
    fn offset_must_be_inside_window() {
        let config = make_config("[engine]\nwindow = 3\noffset = 3\n");
        let err = validate_engine_config(&config).unwrap_err();
        assert!(matches!(err, ToolkitError::ConfigInvalid { key, .. } if key == "offset"));
    }

    #[test]
    fn non_numeric_window_fails() {
        let config = make_config("[engine]\nwindow = abc\n");
        let err = validate_engine_config(&config).unwrap_err();
        assert!(matches!(err, ToolkitError::ConfigInvalid { key, .. } if key == "window"));
    }

    #[test]
    fn unknown_turnover_side_fails() {
        let config = make_config("[portfolio]\nturnover_side = hold\n");
        let err = validate_portfolio_config(&config).unwrap_err();
        assert!(matches!(err, ToolkitError::ConfigInvalid { key, .. } if key == "turnover_side"));
    }

    #[test]
    fn risk_free_rate_out_of_range_fails() {
        let config = make_config("[performance]\nrisk_free_rate = 1.5\n");
        let err = validate_performance_config(&config).unwrap_err();
        assert!(matches!(err, ToolkitError::ConfigInvalid { key, .. } if key == "risk_free_rate"));
    }

    #[test]
    fn periods_per_year_must_be_positive() {
        let config = make_config("[performance]\nperiods_per_year = 0\n");
        let err = validate_performance_config(&config).unwrap_err();
        assert!(
            matches!(err, ToolkitError::ConfigInvalid { key, .. } if key == "periods_per_year")
        );
    }

    #[test]
    fn weight_column_selects_accountant_column() {
        let config = make_config("[portfolio]\nweight_column = w\n");
        let run = build_run_config(&config).unwrap();
        assert_eq!(run.weight_column.as_deref(), Some("w"));
        assert_eq!(run.accountant().weight_column(), Some(&Label::from("w")));
    }
}
