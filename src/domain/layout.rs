//! Layout classification.
//!
//! `classify` is the single place that turns an axis shape into a
//! [`LayoutKind`]. Every other component matches on the returned tag instead
//! of re-deriving shape facts.

use crate::domain::error::PanelError;
use crate::domain::frame::Container;
use crate::domain::label::LabelKind;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutFamily {
    TimeSeries,
    CrossSection,
    Panel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    Table,
    Series,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutKind {
    TimeSeriesTable,
    TimeSeriesSeries,
    CrossSectionTable,
    CrossSectionSeries,
    PanelTable,
    PanelSeries,
}

impl LayoutKind {
    pub fn from_parts(family: LayoutFamily, arity: Arity) -> Self {
        match (family, arity) {
            (LayoutFamily::TimeSeries, Arity::Table) => LayoutKind::TimeSeriesTable,
            (LayoutFamily::TimeSeries, Arity::Series) => LayoutKind::TimeSeriesSeries,
            (LayoutFamily::CrossSection, Arity::Table) => LayoutKind::CrossSectionTable,
            (LayoutFamily::CrossSection, Arity::Series) => LayoutKind::CrossSectionSeries,
            (LayoutFamily::Panel, Arity::Table) => LayoutKind::PanelTable,
            (LayoutFamily::Panel, Arity::Series) => LayoutKind::PanelSeries,
        }
    }

    pub fn family(&self) -> LayoutFamily {
        match self {
            LayoutKind::TimeSeriesTable | LayoutKind::TimeSeriesSeries => LayoutFamily::TimeSeries,
            LayoutKind::CrossSectionTable | LayoutKind::CrossSectionSeries => {
                LayoutFamily::CrossSection
            }
            LayoutKind::PanelTable | LayoutKind::PanelSeries => LayoutFamily::Panel,
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            LayoutKind::TimeSeriesTable
            | LayoutKind::CrossSectionTable
            | LayoutKind::PanelTable => Arity::Table,
            _ => Arity::Series,
        }
    }

    pub fn is_panel(&self) -> bool {
        self.family() == LayoutFamily::Panel
    }
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayoutKind::TimeSeriesTable => "time-series table",
            LayoutKind::TimeSeriesSeries => "time-series series",
            LayoutKind::CrossSectionTable => "cross-section table",
            LayoutKind::CrossSectionSeries => "cross-section series",
            LayoutKind::PanelTable => "panel table",
            LayoutKind::PanelSeries => "panel series",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifyOptions {
    /// Accept row axes with more than two levels, classifying on the outer two.
    pub allow_extra_levels: bool,
}

pub fn classify(container: &Container) -> Result<LayoutKind, PanelError> {
    classify_with(container, ClassifyOptions::default())
}

pub fn classify_with(
    container: &Container,
    options: ClassifyOptions,
) -> Result<LayoutKind, PanelError> {
    if container.is_empty() {
        return Err(PanelError::shape("cannot classify an empty container"));
    }

    // A one-column table carries nothing in its columns; treat it as a series.
    let arity = match container {
        Container::Table(t) if t.ncols() > 1 => Arity::Table,
        _ => Arity::Series,
    };

    let index = container.index();
    let family = match index.nlevels() {
        1 => match index.level_kind(0) {
            Some(LabelKind::Date) => LayoutFamily::TimeSeries,
            Some(_) => LayoutFamily::CrossSection,
            None => {
                return Err(PanelError::shape(format!(
                    "row level '{}' mixes label kinds",
                    index.names()[0]
                )));
            }
        },
        n if n == 2 || options.allow_extra_levels => {
            match index.level_kind(0) {
                Some(LabelKind::Date) => {}
                _ => {
                    return Err(PanelError::shape(format!(
                        "outer row level '{}' is not chronological",
                        index.names()[0]
                    )));
                }
            }
            if index.level_kind(1).is_none() {
                return Err(PanelError::shape(format!(
                    "inner row level '{}' mixes label kinds",
                    index.names()[1]
                )));
            }
            LayoutFamily::Panel
        }
        n => {
            return Err(PanelError::shape(format!(
                "row axis has {} levels; only one or two are recognised",
                n
            )));
        }
    };

    Ok(LayoutKind::from_parts(family, arity))
}

/// Classify and require one of the given families.
pub fn require_family(
    container: &Container,
    allowed: &[LayoutFamily],
    operation: &str,
) -> Result<LayoutKind, PanelError> {
    let kind = classify(container)?;
    if allowed.contains(&kind.family()) {
        Ok(kind)
    } else {
        Err(PanelError::shape(format!(
            "{} does not accept a {}",
            operation, kind
        )))
    }
}
