#![allow(dead_code)]

use chrono::NaiveDate;
use quantpanel::domain::axis::Axis;
use quantpanel::domain::frame::{Container, LabeledSeries, LabeledTable};
use quantpanel::domain::label::Label;
use std::fs;
use std::path::Path;

pub fn date(y: i32, m: u32, d: u32) -> Label {
    Label::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

/// Panel series from (time, asset, value) rows.
pub fn panel_series(rows: &[(Label, &str, f64)]) -> Container {
    let pairs = rows
        .iter()
        .map(|(t, a, _)| (t.clone(), Label::from(*a)))
        .collect();
    let values = rows.iter().map(|(_, _, v)| *v).collect();
    let index = Axis::composite("date", "asset", pairs).unwrap();
    Container::Series(LabeledSeries::new(index, None, values).unwrap())
}

/// Three dates x two assets x (close, volume).
pub fn price_panel() -> Container {
    let mut pairs = Vec::new();
    let mut rows = Vec::new();
    for (i, day) in [2, 3, 6].into_iter().enumerate() {
        for (j, asset) in ["BHP", "CBA"].into_iter().enumerate() {
            pairs.push((date(2024, 5, day), Label::from(asset)));
            let close = 10.0 * (j + 1) as f64 + i as f64;
            rows.push(vec![close, 1000.0 * (i + 1) as f64]);
        }
    }
    let table = LabeledTable::from_rows(
        Axis::composite("date", "asset", pairs).unwrap(),
        Axis::single("indicator", vec!["close".into(), "volume".into()]).unwrap(),
        rows,
    )
    .unwrap();
    Container::Table(table)
}

pub fn scenario_weights() -> Container {
    panel_series(&[
        (date(2020, 1, 1), "A", 1.0),
        (date(2020, 1, 1), "B", 1.0),
        (date(2020, 2, 1), "A", 2.0),
        (date(2020, 2, 1), "B", 0.0),
    ])
}

pub fn scenario_returns() -> Container {
    panel_series(&[
        (date(2020, 1, 1), "A", 0.1),
        (date(2020, 1, 1), "B", -0.1),
        (date(2020, 2, 1), "A", 0.0),
        (date(2020, 2, 1), "B", 0.2),
    ])
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

pub const WEIGHTS_CSV: &str = "date,asset,weight\n\
2020-01-01,A,1\n\
2020-01-01,B,1\n\
2020-02-01,A,2\n\
2020-02-01,B,0\n";

pub const PRICES_CSV: &str = "date,asset,close\n\
2020-01-01,A,10\n\
2020-01-01,B,20\n\
2020-01-15,A,11\n\
2020-01-15,B,18\n\
2020-02-01,A,12\n\
2020-02-01,B,22\n\
2020-02-14,A,15\n\
2020-02-14,B,20\n";
