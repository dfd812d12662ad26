//! Multi-dimensional selection over classified containers.
//!
//! Keys are given per dimension (time, asset, indicator) as a [`Sel`]. The
//! shape of the result follows from which dimensions are pinned to a single
//! label: pinned dimensions are dropped, a pinned indicator on a panel is
//! unstacked to a time x asset table, and one-column results collapse to
//! series.

use crate::domain::axis::Axis;
use crate::domain::error::PanelError;
use crate::domain::frame::{Container, LabeledSeries, LabeledTable, Slice};
use crate::domain::label::{Key, Label};
use crate::domain::layout::{LayoutFamily, LayoutKind};
use tracing::warn;

/// Partial key for one dimension.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Sel {
    #[default]
    All,
    One(Label),
    Many(Vec<Label>),
    /// Inclusive range.
    Between(Label, Label),
}

impl Sel {
    pub fn one(label: impl Into<Label>) -> Self {
        Sel::One(label.into())
    }

    pub fn many<L: Into<Label>>(labels: impl IntoIterator<Item = L>) -> Self {
        Sel::Many(labels.into_iter().map(Into::into).collect())
    }

    pub fn between(start: impl Into<Label>, end: impl Into<Label>) -> Self {
        Sel::Between(start.into(), end.into())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Sel::All)
    }

    pub fn as_one(&self) -> Option<&Label> {
        match self {
            Sel::One(l) => Some(l),
            _ => None,
        }
    }

    pub fn matches(&self, label: &Label) -> bool {
        match self {
            Sel::All => true,
            Sel::One(l) => l == label,
            Sel::Many(ls) => ls.contains(label),
            Sel::Between(start, end) => start <= label && label <= end,
        }
    }

    /// Concrete labels must exist on `level` of `axis`.
    fn check_present(&self, axis: &Axis, level: usize, axis_name: &str) -> Result<(), PanelError> {
        let concrete: &[Label] = match self {
            Sel::One(l) => std::slice::from_ref(l),
            Sel::Many(ls) => ls,
            _ => return Ok(()),
        };
        match concrete.iter().find(|l| !axis.level_contains(level, l)) {
            Some(missing) => Err(PanelError::key_not_found(missing, axis_name)),
            None => Ok(()),
        }
    }
}

/// Select a sub-container. `layout` must be the container's classification.
pub fn select(
    container: &Container,
    layout: LayoutKind,
    time: &Sel,
    asset: &Sel,
    indicator: &Sel,
) -> Result<Slice, PanelError> {
    match (layout.family(), container) {
        (LayoutFamily::Panel, Container::Table(t)) if t.ncols() > 1 => {
            select_panel_table(t, time, asset, indicator)
        }
        (LayoutFamily::Panel, c) => select_panel_series(&as_series(c), time, asset),
        (LayoutFamily::TimeSeries, c) => {
            if !asset.is_all() {
                return Err(PanelError::dimension(
                    "a time series has no asset dimension to select on",
                ));
            }
            select_single_level(c, time, "time", indicator)
        }
        (LayoutFamily::CrossSection, c) => {
            if !time.is_all() {
                return Err(PanelError::dimension(
                    "a cross-section has no time dimension to select on",
                ));
            }
            select_single_level(c, asset, "asset", indicator)
        }
    }
}

fn as_series(container: &Container) -> LabeledSeries {
    match container {
        Container::Series(s) => s.clone(),
        Container::Table(t) => t.column_series(0),
    }
}

fn select_columns(columns: &Axis, indicator: &Sel) -> Result<Vec<usize>, PanelError> {
    indicator.check_present(columns, 0, "indicator")?;
    Ok((0..columns.len())
        .filter(|&c| indicator.matches(columns.key(c).outer()))
        .collect())
}

fn single_value(
    table: &LabeledTable,
    time: &Label,
    asset: &Label,
) -> Result<f64, PanelError> {
    if table.nrows() == 0 || table.ncols() == 0 {
        return Err(PanelError::key_not_found(
            Key::pair(time.clone(), asset.clone()),
            "row",
        ));
    }
    warn!(%time, %asset, "selection reduced to a single value");
    Ok(table.get(0, 0))
}

fn select_panel_table(
    table: &LabeledTable,
    time: &Sel,
    asset: &Sel,
    indicator: &Sel,
) -> Result<Slice, PanelError> {
    if time.is_all() && asset.is_all() && indicator.is_all() {
        return Err(PanelError::dimension(
            "panel selection needs at least one non-wildcard key",
        ));
    }
    let index = table.index();
    time.check_present(index, 0, "time")?;
    asset.check_present(index, 1, "asset")?;
    let cols = select_columns(table.columns(), indicator)?;

    let rows: Vec<usize> = (0..table.nrows())
        .filter(|&r| {
            let key = index.key(r);
            time.matches(key.level(0)) && asset.matches(key.level(1))
        })
        .collect();
    let sub = table.take_rows(&rows).take_columns(&cols);
    let single_indicator = indicator.as_one().is_some() && cols.len() == 1;

    match (time.as_one(), asset.as_one()) {
        (Some(t), Some(a)) if single_indicator => Ok(Slice::Scalar(single_value(&sub, t, a)?)),
        (Some(t), Some(a)) => {
            if sub.nrows() == 0 {
                return Err(PanelError::key_not_found(Key::pair(t.clone(), a.clone()), "row"));
            }
            let series = LabeledSeries::new(sub.columns().clone(), None, sub.row(0).to_vec())?;
            Ok(Slice::Series(series))
        }
        (Some(_), None) => {
            let by_asset = sub.index().drop_level(0)?;
            Ok(Slice::from(Container::Table(sub.with_index(by_asset)?)))
        }
        (None, Some(_)) => {
            let by_time = sub.index().drop_level(1)?;
            Ok(Slice::from(Container::Table(sub.with_index(by_time)?)))
        }
        (None, None) if single_indicator => {
            let wide = sub.column_series(0).unstack()?;
            Ok(Slice::from(Container::Table(wide)))
        }
        (None, None) => Ok(Slice::from(Container::Table(sub))),
    }
}

fn select_panel_series(
    series: &LabeledSeries,
    time: &Sel,
    asset: &Sel,
) -> Result<Slice, PanelError> {
    if time.is_all() && asset.is_all() {
        return Err(PanelError::dimension(
            "panel selection needs a time or asset key",
        ));
    }
    let index = series.index();
    time.check_present(index, 0, "time")?;
    asset.check_present(index, 1, "asset")?;

    let rows: Vec<usize> = (0..series.len())
        .filter(|&r| {
            let key = index.key(r);
            time.matches(key.level(0)) && asset.matches(key.level(1))
        })
        .collect();
    let sub = series.take(&rows);

    match (time.as_one(), asset.as_one()) {
        (Some(t), Some(a)) => {
            if sub.is_empty() {
                return Err(PanelError::key_not_found(Key::pair(t.clone(), a.clone()), "row"));
            }
            warn!(time = %t, asset = %a, "selection reduced to a single value");
            Ok(Slice::Scalar(sub.get(0)))
        }
        (Some(_), None) => {
            let by_asset = sub.index().drop_level(0)?;
            Ok(Slice::Series(sub.with_index(by_asset)?))
        }
        (None, Some(_)) => {
            let by_time = sub.index().drop_level(1)?;
            Ok(Slice::Series(sub.with_index(by_time)?))
        }
        (None, None) if !asset.is_all() => {
            Ok(Slice::from(Container::Table(sub.unstack()?)))
        }
        (None, None) => Ok(Slice::Series(sub)),
    }
}

fn select_single_level(
    container: &Container,
    key: &Sel,
    axis_name: &str,
    indicator: &Sel,
) -> Result<Slice, PanelError> {
    let index = container.index();
    key.check_present(index, 0, axis_name)?;
    let rows: Vec<usize> = (0..index.len())
        .filter(|&r| key.matches(index.key(r).outer()))
        .collect();

    match container {
        Container::Table(t) if t.ncols() > 1 => {
            let cols = select_columns(t.columns(), indicator)?;
            let sub = t.take_rows(&rows).take_columns(&cols);
            let single_indicator = indicator.as_one().is_some() && cols.len() == 1;
            match key.as_one() {
                Some(_) if single_indicator => Ok(Slice::Scalar(sub.get(0, 0))),
                Some(_) => Ok(Slice::Series(LabeledSeries::new(
                    sub.columns().clone(),
                    None,
                    sub.row(0).to_vec(),
                )?)),
                None => Ok(Slice::from(Container::Table(sub))),
            }
        }
        c => {
            let sub = as_series(c).take(&rows);
            match key.as_one() {
                Some(_) => Ok(Slice::Scalar(sub.get(0))),
                None => Ok(Slice::Series(sub)),
            }
        }
    }
}
