//! Labeled tables and series, the containers every engine operation consumes.
//!
//! - `LabeledTable`: row axis x column axis of `f64` cells, `NaN` for missing
//! - `LabeledSeries`: the one-column case, a row axis with an optional name
//! - `Container`: either of the above, as handed to the engine
//! - `Slice`: what a selection or a window function hands back (adds scalars)

use crate::domain::axis::Axis;
use crate::domain::error::PanelError;
use crate::domain::label::{Key, Label};
use std::collections::{BTreeSet, HashMap};

/// Column label used when a series or scalar has no name of its own.
pub const VALUE_COLUMN: &str = "value";

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledTable {
    index: Axis,
    columns: Axis,
    values: Vec<f64>,
}

impl LabeledTable {
    /// Row-major cells; `values.len()` must equal rows x columns.
    pub fn new(index: Axis, columns: Axis, values: Vec<f64>) -> Result<Self, PanelError> {
        if values.len() != index.len() * columns.len() {
            return Err(PanelError::shape(format!(
                "{} cells for a {}x{} table",
                values.len(),
                index.len(),
                columns.len()
            )));
        }
        Ok(Self {
            index,
            columns,
            values,
        })
    }

    pub fn from_rows(index: Axis, columns: Axis, rows: Vec<Vec<f64>>) -> Result<Self, PanelError> {
        if let Some(bad) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(PanelError::shape(format!(
                "row with {} cells for {} columns",
                bad.len(),
                columns.len()
            )));
        }
        Self::new(index, columns, rows.into_iter().flatten().collect())
    }

    pub fn index(&self) -> &Axis {
        &self.index
    }

    pub fn columns(&self) -> &Axis {
        &self.columns
    }

    pub fn nrows(&self) -> usize {
        self.index.len()
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nrows() == 0 || self.ncols() == 0
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.ncols() + col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        let width = self.ncols();
        &self.values[row * width..(row + 1) * width]
    }

    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.nrows()).map(|r| self.get(r, col)).collect()
    }

    /// Cell lookup by row and column key.
    pub fn value(&self, row: &Key, col: &Key) -> Option<f64> {
        let r = self.index.position(row)?;
        let c = self.columns.position(col)?;
        Some(self.get(r, c))
    }

    pub fn column_series(&self, col: usize) -> LabeledSeries {
        let name = self.columns.key(col).levels().first().cloned();
        LabeledSeries {
            index: self.index.clone(),
            name,
            values: self.column(col),
        }
    }

    pub fn take_rows(&self, rows: &[usize]) -> LabeledTable {
        let mut values = Vec::with_capacity(rows.len() * self.ncols());
        for &r in rows {
            values.extend_from_slice(self.row(r));
        }
        LabeledTable {
            index: self.index.take(rows),
            columns: self.columns.clone(),
            values,
        }
    }

    pub fn take_columns(&self, cols: &[usize]) -> LabeledTable {
        let mut values = Vec::with_capacity(self.nrows() * cols.len());
        for r in 0..self.nrows() {
            values.extend(cols.iter().map(|&c| self.get(r, c)));
        }
        LabeledTable {
            index: self.index.clone(),
            columns: self.columns.take(cols),
            values,
        }
    }

    pub fn with_index(self, index: Axis) -> Result<LabeledTable, PanelError> {
        LabeledTable::new(index, self.columns, self.values)
    }

    pub fn sort_by_index(&self) -> LabeledTable {
        self.take_rows(&self.index.argsort())
    }

    /// Move single-level columns into the inner level of the row axis.
    /// Missing cells are dropped.
    pub fn stack(&self, inner_name: &str) -> Result<LabeledSeries, PanelError> {
        if self.index.nlevels() != 1 || self.columns.nlevels() != 1 {
            return Err(PanelError::shape(
                "stack needs a single-level row axis and single-level columns",
            ));
        }
        let mut keys = Vec::new();
        let mut values = Vec::new();
        for r in 0..self.nrows() {
            let outer = self.index.key(r).outer();
            for c in 0..self.ncols() {
                let v = self.get(r, c);
                if v.is_nan() {
                    continue;
                }
                keys.push(Key::pair(outer.clone(), self.columns.key(c).outer().clone()));
                values.push(v);
            }
        }
        let names = vec![self.index.names()[0].clone(), inner_name.to_string()];
        LabeledSeries::new(Axis::new(names, keys)?, None, values)
    }

    /// Collapse to a series when there is exactly one column.
    pub fn into_container(self) -> Container {
        if self.ncols() == 1 {
            Container::Series(self.column_series(0))
        } else {
            Container::Table(self)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSeries {
    index: Axis,
    name: Option<Label>,
    values: Vec<f64>,
}

impl LabeledSeries {
    pub fn new(index: Axis, name: Option<Label>, values: Vec<f64>) -> Result<Self, PanelError> {
        if values.len() != index.len() {
            return Err(PanelError::shape(format!(
                "{} values for an axis of {} keys",
                values.len(),
                index.len()
            )));
        }
        Ok(Self {
            index,
            name,
            values,
        })
    }

    pub fn index(&self) -> &Axis {
        &self.index
    }

    pub fn name(&self) -> Option<&Label> {
        self.name.as_ref()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, position: usize) -> f64 {
        self.values[position]
    }

    pub fn value(&self, key: &Key) -> Option<f64> {
        self.index.position(key).map(|p| self.values[p])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, f64)> {
        self.index.keys().iter().zip(self.values.iter().copied())
    }

    pub fn renamed(mut self, name: impl Into<Label>) -> LabeledSeries {
        self.name = Some(name.into());
        self
    }

    pub fn take(&self, positions: &[usize]) -> LabeledSeries {
        LabeledSeries {
            index: self.index.take(positions),
            name: self.name.clone(),
            values: positions.iter().map(|&p| self.values[p]).collect(),
        }
    }

    pub fn with_index(self, index: Axis) -> Result<LabeledSeries, PanelError> {
        LabeledSeries::new(index, self.name, self.values)
    }

    pub fn sort_by_index(&self) -> LabeledSeries {
        self.take(&self.index.argsort())
    }

    pub fn to_table(&self) -> LabeledTable {
        let column = self
            .name
            .clone()
            .unwrap_or_else(|| Label::from(VALUE_COLUMN));
        LabeledTable {
            index: self.index.clone(),
            columns: Axis::unit("", column),
            values: self.values.clone(),
        }
    }

    /// Pivot a two-level series: outer level becomes rows, inner level
    /// becomes columns. Both are sorted; missing pairs are `NaN`.
    pub fn unstack(&self) -> Result<LabeledTable, PanelError> {
        if self.index.nlevels() != 2 {
            return Err(PanelError::dimension(format!(
                "unstack needs a two-level axis, got {} levels",
                self.index.nlevels()
            )));
        }
        let rows: Vec<Label> = self
            .index
            .keys()
            .iter()
            .map(|k| k.level(0).clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let cols: Vec<Label> = self
            .index
            .keys()
            .iter()
            .map(|k| k.level(1).clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let row_pos: HashMap<&Label, usize> = rows.iter().enumerate().map(|(i, l)| (l, i)).collect();
        let col_pos: HashMap<&Label, usize> = cols.iter().enumerate().map(|(i, l)| (l, i)).collect();

        let mut values = vec![f64::NAN; rows.len() * cols.len()];
        for (key, v) in self.iter() {
            let r = row_pos[key.level(0)];
            let c = col_pos[key.level(1)];
            values[r * cols.len() + c] = v;
        }
        let names = self.index.names();
        LabeledTable::new(
            Axis::single(&names[0], rows)?,
            Axis::single(&names[1], cols)?,
            values,
        )
    }
}

/// A table or a series, as handed to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Container {
    Table(LabeledTable),
    Series(LabeledSeries),
}

impl Container {
    pub fn index(&self) -> &Axis {
        match self {
            Container::Table(t) => t.index(),
            Container::Series(s) => s.index(),
        }
    }

    pub fn nrows(&self) -> usize {
        self.index().len()
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Container::Table(t) => t.is_empty(),
            Container::Series(s) => s.is_empty(),
        }
    }

    /// One-column tables collapse to series; everything else is unchanged.
    pub fn canonical(self) -> Container {
        match self {
            Container::Table(t) => t.into_container(),
            series => series,
        }
    }

    pub fn take_rows(&self, rows: &[usize]) -> Container {
        match self {
            Container::Table(t) => Container::Table(t.take_rows(rows)),
            Container::Series(s) => Container::Series(s.take(rows)),
        }
    }

    pub fn sort_by_index(&self) -> Container {
        self.take_rows(&self.index().argsort())
    }
}

impl From<LabeledTable> for Container {
    fn from(table: LabeledTable) -> Self {
        Container::Table(table)
    }
}

impl From<LabeledSeries> for Container {
    fn from(series: LabeledSeries) -> Self {
        Container::Series(series)
    }
}

/// Result of a selection or of one rolling window.
#[derive(Debug, Clone, PartialEq)]
pub enum Slice {
    Scalar(f64),
    Series(LabeledSeries),
    Table(LabeledTable),
}

impl Slice {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Slice::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_series(&self) -> Option<&LabeledSeries> {
        match self {
            Slice::Series(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&LabeledTable> {
        match self {
            Slice::Table(t) => Some(t),
            _ => None,
        }
    }
}

impl From<Container> for Slice {
    fn from(container: Container) -> Self {
        match container.canonical() {
            Container::Table(t) => Slice::Table(t),
            Container::Series(s) => Slice::Series(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(day: u32) -> Label {
        Label::Date(NaiveDate::from_ymd_opt(2024, 1, day).unwrap())
    }

    fn wide() -> LabeledTable {
        LabeledTable::from_rows(
            Axis::single("date", vec![d(1), d(2)]).unwrap(),
            Axis::single("asset", vec!["A".into(), "B".into()]).unwrap(),
            vec![vec![1.0, 2.0], vec![3.0, f64::NAN]],
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_wrong_cell_count() {
        let result = LabeledTable::new(
            Axis::single("date", vec![d(1)]).unwrap(),
            Axis::single("col", vec!["x".into(), "y".into()]).unwrap(),
            vec![1.0],
        );
        assert!(matches!(result, Err(PanelError::Shape { .. })));
    }

    #[test]
    fn one_column_table_collapses_to_named_series() {
        let table = wide().take_columns(&[1]);
        match table.into_container() {
            Container::Series(s) => {
                assert_eq!(s.name(), Some(&Label::from("B")));
                assert_eq!(s.len(), 2);
            }
            other => panic!("expected series, got {:?}", other),
        }
    }

    #[test]
    fn stack_drops_missing_cells() {
        let stacked = wide().stack("asset").unwrap();
        assert_eq!(stacked.len(), 3);
        assert_eq!(stacked.index().names(), &["date".to_string(), "asset".to_string()]);
        assert_eq!(stacked.value(&Key::pair(d(2), "A")), Some(3.0));
        assert_eq!(stacked.value(&Key::pair(d(2), "B")), None);
    }

    #[test]
    fn unstack_reverses_stack() {
        let table = wide().stack("asset").unwrap().unstack().unwrap();
        assert_eq!(table.nrows(), 2);
        assert_eq!(table.ncols(), 2);
        assert_eq!(table.value(&Key::single(d(1)), &Key::single("B")), Some(2.0));
        assert!(table.get(1, 1).is_nan());
    }

    #[test]
    fn series_to_table_uses_value_column_without_name() {
        let series = LabeledSeries::new(
            Axis::single("date", vec![d(1)]).unwrap(),
            None,
            vec![5.0],
        )
        .unwrap();
        let table = series.to_table();
        assert_eq!(table.columns().key(0), &Key::single(VALUE_COLUMN));
        assert_eq!(table.get(0, 0), 5.0);
    }

    #[test]
    fn sort_by_index_reorders_rows() {
        let table = LabeledTable::from_rows(
            Axis::single("date", vec![d(2), d(1)]).unwrap(),
            Axis::single("col", vec!["x".into()]).unwrap(),
            vec![vec![2.0], vec![1.0]],
        )
        .unwrap();
        let sorted = table.sort_by_index();
        assert_eq!(sorted.index().key(0), &Key::single(d(1)));
        assert_eq!(sorted.column(0), vec![1.0, 2.0]);
    }
}
