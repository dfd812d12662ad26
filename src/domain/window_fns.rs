//! Ready-made window reducers for [`rolling`](crate::domain::rolling::rolling).
//!
//! Each reducer collapses the window along time: a time series becomes a
//! scalar (series) or one value per column (table); a panel becomes one value
//! per asset. Missing cells are skipped.

use crate::domain::axis::Axis;
use crate::domain::error::PanelError;
use crate::domain::frame::{Container, LabeledSeries, LabeledTable, Slice};
use crate::domain::label::Label;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stat {
    Sum,
    Mean,
    Stddev,
    Last,
}

impl Stat {
    pub fn apply(&self, window: &Container) -> Result<Slice, PanelError> {
        let f: fn(&[f64]) -> f64 = match self {
            Stat::Sum => sum,
            Stat::Mean => mean,
            Stat::Stddev => stddev,
            Stat::Last => last,
        };
        reduce(window, f)
    }
}

impl FromStr for Stat {
    type Err = PanelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sum" => Ok(Stat::Sum),
            "mean" => Ok(Stat::Mean),
            "stddev" | "std" => Ok(Stat::Stddev),
            "last" => Ok(Stat::Last),
            other => Err(PanelError::InvalidParameter {
                name: "stat".into(),
                reason: format!("unknown statistic '{}'", other),
            }),
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stat::Sum => write!(f, "sum"),
            Stat::Mean => write!(f, "mean"),
            Stat::Stddev => write!(f, "stddev"),
            Stat::Last => write!(f, "last"),
        }
    }
}

fn present(values: &[f64]) -> impl Iterator<Item = f64> + '_ {
    values.iter().copied().filter(|v| !v.is_nan())
}

pub fn sum(values: &[f64]) -> f64 {
    present(values).sum()
}

pub fn mean(values: &[f64]) -> f64 {
    let n = present(values).count();
    if n == 0 {
        return f64::NAN;
    }
    sum(values) / n as f64
}

/// Population standard deviation.
pub fn stddev(values: &[f64]) -> f64 {
    let n = present(values).count();
    if n == 0 {
        return f64::NAN;
    }
    let m = mean(values);
    let variance: f64 = present(values)
        .map(|v| {
            let diff = v - m;
            diff * diff
        })
        .sum::<f64>()
        / n as f64;
    variance.sqrt()
}

pub fn last(values: &[f64]) -> f64 {
    present(values).last().unwrap_or(f64::NAN)
}

/// Collapse a window along time with `f`.
pub fn reduce(window: &Container, f: fn(&[f64]) -> f64) -> Result<Slice, PanelError> {
    match window {
        Container::Series(s) if s.index().nlevels() == 1 => Ok(Slice::Scalar(f(s.values()))),
        Container::Series(s) => {
            let groups = group_by_asset(s.index(), |row| vec![s.get(row)]);
            let assets: Vec<Label> = groups.keys().cloned().collect();
            let values = groups.values().map(|cols| f(&cols[0])).collect();
            let name = s.index().names()[1].as_str();
            Ok(Slice::Series(LabeledSeries::new(
                Axis::single(name, assets)?,
                s.name().cloned(),
                values,
            )?))
        }
        Container::Table(t) if t.index().nlevels() == 1 => {
            let values = (0..t.ncols()).map(|c| f(&t.column(c))).collect();
            Ok(Slice::Series(LabeledSeries::new(
                t.columns().clone(),
                None,
                values,
            )?))
        }
        Container::Table(t) => {
            let groups = group_by_asset(t.index(), |row| t.row(row).to_vec());
            let assets: Vec<Label> = groups.keys().cloned().collect();
            let rows = groups
                .values()
                .map(|cols| cols.iter().map(|c| f(c)).collect())
                .collect();
            let name = t.index().names()[1].as_str();
            Ok(Slice::Table(LabeledTable::from_rows(
                Axis::single(name, assets)?,
                t.columns().clone(),
                rows,
            )?))
        }
    }
}

/// Column-wise values per inner-level label, assets in sorted order.
fn group_by_asset(
    index: &Axis,
    row_values: impl Fn(usize) -> Vec<f64>,
) -> BTreeMap<Label, Vec<Vec<f64>>> {
    let mut groups: BTreeMap<Label, Vec<Vec<f64>>> = BTreeMap::new();
    for row in 0..index.len() {
        let cells = row_values(row);
        let cols = groups
            .entry(index.key(row).level(1).clone())
            .or_insert_with(|| vec![Vec::new(); cells.len()]);
        for (c, v) in cells.into_iter().enumerate() {
            cols[c].push(v);
        }
    }
    groups
}
