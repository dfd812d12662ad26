//! Rolling window engine.
//!
//! A container is sorted by its time level, cut into windows of `window`
//! consecutive distinct times advancing by `interval`, and a caller-supplied
//! function is applied to each window. Results are re-keyed by the window's
//! reporting time and concatenated in window order.

use crate::domain::axis::Axis;
use crate::domain::error::PanelError;
use crate::domain::frame::{Container, LabeledTable, Slice, VALUE_COLUMN};
use crate::domain::label::{Key, Label};
use crate::domain::layout::{require_family, LayoutFamily};
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingOptions {
    pub window: usize,
    /// Report each window under the time this many steps before its end.
    pub offset: usize,
    pub interval: usize,
    pub processes: usize,
}

impl Default for RollingOptions {
    fn default() -> Self {
        Self {
            window: 1,
            offset: 0,
            interval: 1,
            processes: 1,
        }
    }
}

impl RollingOptions {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            ..Self::default()
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_interval(mut self, interval: usize) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_processes(mut self, processes: usize) -> Self {
        self.processes = processes;
        self
    }

    pub fn validate(&self) -> Result<(), PanelError> {
        if self.window == 0 {
            return Err(invalid("window", "must be at least 1"));
        }
        if self.interval == 0 {
            return Err(invalid("interval", "must be at least 1"));
        }
        if self.offset >= self.window {
            return Err(invalid(
                "offset",
                &format!("must be smaller than the window ({})", self.window),
            ));
        }
        Ok(())
    }
}

fn invalid(name: &str, reason: &str) -> PanelError {
    PanelError::InvalidParameter {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

/// One unit of work: an owned copy of the rows between `start` and `end`.
#[derive(Debug, Clone)]
pub struct Window {
    pub key: Label,
    pub start: Label,
    pub end: Label,
    pub data: Container,
}

/// Runs window tasks and joins them, preserving window order.
///
/// Implementations must not let tasks share state; each task owns its window.
pub trait WorkerPool {
    fn run<F>(&self, windows: Vec<Window>, func: &F) -> Result<Vec<(Label, Slice)>, PanelError>
    where
        F: Fn(&Container) -> Result<Slice, PanelError> + Send + Sync;
}

/// Runs every window on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialPool;

impl WorkerPool for SequentialPool {
    fn run<F>(&self, windows: Vec<Window>, func: &F) -> Result<Vec<(Label, Slice)>, PanelError>
    where
        F: Fn(&Container) -> Result<Slice, PanelError> + Send + Sync,
    {
        windows
            .into_iter()
            .map(|w| func(&w.data).map(|out| (w.key, out)))
            .collect()
    }
}

/// Fans windows out over a rayon pool that lives only for one `run` call.
#[derive(Debug, Clone, Copy)]
pub struct RayonPool {
    threads: usize,
}

impl RayonPool {
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }
}

impl WorkerPool for RayonPool {
    fn run<F>(&self, windows: Vec<Window>, func: &F) -> Result<Vec<(Label, Slice)>, PanelError>
    where
        F: Fn(&Container) -> Result<Slice, PanelError> + Send + Sync,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| invalid("processes", &e.to_string()))?;

        let outcomes: Vec<Result<(Label, Slice), PanelError>> = pool.install(|| {
            windows
                .into_par_iter()
                .map(|w| func(&w.data).map(|out| (w.key, out)))
                .collect()
        });
        // Indexed collect keeps window order; report the earliest failure.
        outcomes.into_iter().collect()
    }
}

/// Cut a sorted copy of `container` into windows.
pub fn make_windows(
    container: &Container,
    options: &RollingOptions,
) -> Result<Vec<Window>, PanelError> {
    options.validate()?;
    let sorted = container.sort_by_index();
    let index = sorted.index();

    // Start row of every distinct time; rows for one time are contiguous once sorted.
    let mut times: Vec<Label> = Vec::new();
    let mut bounds: Vec<usize> = Vec::new();
    for (row, key) in index.keys().iter().enumerate() {
        if times.last() != Some(key.outer()) {
            times.push(key.outer().clone());
            bounds.push(row);
        }
    }
    bounds.push(index.len());

    if options.window > times.len() {
        return Ok(Vec::new());
    }

    let windows = (options.window - 1..times.len())
        .step_by(options.interval)
        .map(|end| {
            let start = end + 1 - options.window;
            let rows: Vec<usize> = (bounds[start]..bounds[end + 1]).collect();
            Window {
                key: times[end - options.offset].clone(),
                start: times[start].clone(),
                end: times[end].clone(),
                data: sorted.take_rows(&rows),
            }
        })
        .collect();
    Ok(windows)
}

/// Apply `func` to every window of a time series or panel.
///
/// With `processes > 1` windows are evaluated on a [`RayonPool`]. Any window
/// failing fails the whole call.
pub fn rolling<F>(
    container: &Container,
    options: &RollingOptions,
    func: F,
) -> Result<LabeledTable, PanelError>
where
    F: Fn(&Container) -> Result<Slice, PanelError> + Send + Sync,
{
    if options.processes > 1 {
        rolling_with(&RayonPool::new(options.processes), container, options, func)
    } else {
        rolling_with(&SequentialPool, container, options, func)
    }
}

pub fn rolling_with<P, F>(
    pool: &P,
    container: &Container,
    options: &RollingOptions,
    func: F,
) -> Result<LabeledTable, PanelError>
where
    P: WorkerPool,
    F: Fn(&Container) -> Result<Slice, PanelError> + Send + Sync,
{
    require_family(
        container,
        &[LayoutFamily::TimeSeries, LayoutFamily::Panel],
        "rolling",
    )?;
    let time_name = container.index().names()[0].clone();
    let windows = make_windows(container, options)?;
    debug!(
        windows = windows.len(),
        window = options.window,
        interval = options.interval,
        processes = options.processes,
        "rolling plan"
    );

    if windows.is_empty() {
        return LabeledTable::new(
            Axis::empty(vec![time_name]),
            Axis::empty(vec![String::new()]),
            Vec::new(),
        );
    }

    let results = pool.run(windows, &func)?;
    assemble(results, &time_name)
}

/// Re-key per-window results and concatenate them in window order.
fn assemble(results: Vec<(Label, Slice)>, time_name: &str) -> Result<LabeledTable, PanelError> {
    let mut column_keys: Vec<Key> = Vec::new();
    let mut column_pos: HashMap<Key, usize> = HashMap::new();
    let mut column_names: Option<Vec<String>> = None;
    let mut sub_name: Option<String> = None;
    let mut scalar_rows: Option<bool> = None;
    let mut rows: Vec<(Key, Vec<(usize, f64)>)> = Vec::new();

    let mut column_index = |key: Key, names: &[String]| -> Result<usize, PanelError> {
        if let Some(&pos) = column_pos.get(&key) {
            return Ok(pos);
        }
        let expected = column_names.get_or_insert_with(|| names.to_vec());
        if expected.len() != key.nlevels() {
            return Err(PanelError::ResultShape {
                key: key.to_string(),
                reason: "column levels differ between windows".into(),
            });
        }
        column_pos.insert(key.clone(), column_keys.len());
        column_keys.push(key);
        Ok(column_keys.len() - 1)
    };

    for (window_key, output) in results {
        let is_scalar = matches!(output, Slice::Scalar(_));
        if *scalar_rows.get_or_insert(is_scalar) != is_scalar {
            return Err(PanelError::ResultShape {
                key: window_key.to_string(),
                reason: "windows mix scalar and indexed results".into(),
            });
        }
        match output {
            Slice::Scalar(v) => {
                let col = column_index(Key::single(VALUE_COLUMN), &[String::new()])?;
                rows.push((Key::from(window_key), vec![(col, v)]));
            }
            Slice::Series(s) => {
                check_single_level(s.index(), &window_key)?;
                sub_name.get_or_insert_with(|| s.index().names()[0].clone());
                let column = s.name().cloned().unwrap_or_else(|| Label::from(VALUE_COLUMN));
                let col = column_index(Key::from(column), &[String::new()])?;
                for (sub, v) in s.iter() {
                    rows.push((sub.prefixed(window_key.clone()), vec![(col, v)]));
                }
            }
            Slice::Table(t) => {
                check_single_level(t.index(), &window_key)?;
                sub_name.get_or_insert_with(|| t.index().names()[0].clone());
                let cols = t
                    .columns()
                    .keys()
                    .iter()
                    .map(|k| column_index(k.clone(), t.columns().names()))
                    .collect::<Result<Vec<_>, _>>()?;
                for r in 0..t.nrows() {
                    let cells = cols.iter().copied().zip(t.row(r).iter().copied()).collect();
                    rows.push((t.index().key(r).prefixed(window_key.clone()), cells));
                }
            }
        }
    }

    let ncols = column_keys.len();
    let mut values = vec![f64::NAN; rows.len() * ncols];
    let mut keys = Vec::with_capacity(rows.len());
    for (r, (key, cells)) in rows.into_iter().enumerate() {
        for (c, v) in cells {
            values[r * ncols + c] = v;
        }
        keys.push(key);
    }

    let mut index_names = vec![time_name.to_string()];
    if let Some(name) = sub_name {
        index_names.push(name);
    }
    let columns = Axis::new(column_names.unwrap_or_else(|| vec![String::new()]), column_keys)?;
    LabeledTable::new(Axis::new(index_names, keys)?, columns, values)
}

fn check_single_level(index: &Axis, window_key: &Label) -> Result<(), PanelError> {
    if index.nlevels() == 1 {
        Ok(())
    } else {
        Err(PanelError::ResultShape {
            key: window_key.to_string(),
            reason: format!(
                "result is indexed by {} levels; collapse it to one level first",
                index.nlevels()
            ),
        })
    }
}
