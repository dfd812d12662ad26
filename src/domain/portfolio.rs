//! Portfolio accounting over weight panels.
//!
//! A weight panel assigns a raw weight to each (rebalance time, asset) pair.
//! Weights are relative: they are renormalised per rebalance time (and per
//! portfolio tag, when tags split the panel into sub-portfolios) before
//! profit and turnover are computed. The net-worth curve instead compounds the
//! raw holdings recorded at each rebalance.

use crate::domain::axis::Axis;
use crate::domain::error::PanelError;
use crate::domain::frame::{Container, LabeledSeries};
use crate::domain::label::{Key, Label};
use crate::domain::layout::{classify, LayoutFamily, LayoutKind};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, trace};

const TAG_LEVEL: &str = "portfolio";

/// One row of a weight panel.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightRecord {
    pub time: Label,
    pub asset: Label,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnoverSide {
    Buy,
    Sell,
    Both,
}

impl FromStr for TurnoverSide {
    type Err = PanelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buy" => Ok(TurnoverSide::Buy),
            "sell" => Ok(TurnoverSide::Sell),
            "both" => Ok(TurnoverSide::Both),
            other => Err(PanelError::InvalidParameter {
                name: "side".into(),
                reason: format!("expected buy, sell or both, got '{}'", other),
            }),
        }
    }
}

impl fmt::Display for TurnoverSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnoverSide::Buy => write!(f, "buy"),
            TurnoverSide::Sell => write!(f, "sell"),
            TurnoverSide::Both => write!(f, "both"),
        }
    }
}

/// Grouping label per (time, asset), splitting one weight panel into
/// independent sub-portfolios.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortfolioTags {
    tags: HashMap<Key, Label>,
}

impl PortfolioTags {
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (Label, Label, Label)>,
    {
        let tags = records
            .into_iter()
            .map(|(time, asset, tag)| (Key::pair(time, asset), tag))
            .collect();
        Self { tags }
    }

    /// Tags from a numeric panel series, e.g. quantile group numbers.
    /// Values must be integral; missing values leave the pair untagged.
    pub fn from_series(series: &LabeledSeries) -> Result<Self, PanelError> {
        if series.index().nlevels() != 2 {
            return Err(PanelError::shape("portfolio tags must be keyed by (time, asset)"));
        }
        let mut tags = HashMap::with_capacity(series.len());
        for (key, v) in series.iter() {
            if v.is_nan() {
                continue;
            }
            if v.fract() != 0.0 {
                return Err(PanelError::shape(format!(
                    "portfolio tag {} at {} is not a whole number",
                    v, key
                )));
            }
            tags.insert(key.clone(), Label::Int(v as i64));
        }
        Ok(Self { tags })
    }

    pub fn get(&self, time: &Label, asset: &Label) -> Option<&Label> {
        self.tags.get(&Key::pair(time.clone(), asset.clone()))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

type Group = (Label, Option<Label>);

/// Normalisation, profit attribution, turnover and net worth for weight panels.
#[derive(Debug, Clone, Default)]
pub struct PortfolioAccountant {
    weight_column: Option<Label>,
}

impl PortfolioAccountant {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the weight column when weight panels carry several columns.
    pub fn with_weight_column(mut self, column: impl Into<Label>) -> Self {
        self.weight_column = Some(column.into());
        self
    }

    pub fn weight_column(&self) -> Option<&Label> {
        self.weight_column.as_ref()
    }

    /// Weight panel as records sorted by (time, asset). Missing weights are
    /// treated as absent assets.
    pub fn weight_records(&self, weights: &Container) -> Result<Vec<WeightRecord>, PanelError> {
        let kind = classify(weights)?;
        if !kind.is_panel() {
            return Err(PanelError::shape(format!(
                "weights must be a panel, got a {}",
                kind
            )));
        }
        let series = match weights {
            Container::Series(s) => s.clone(),
            Container::Table(t) if t.ncols() == 1 => t.column_series(0),
            Container::Table(t) => match &self.weight_column {
                Some(column) => {
                    let col = (0..t.ncols())
                        .find(|&c| t.columns().key(c).outer() == column)
                        .ok_or_else(|| PanelError::key_not_found(column, "indicator"))?;
                    t.column_series(col)
                }
                None => {
                    return Err(PanelError::shape(format!(
                        "weight table has {} columns and no weight column was chosen",
                        t.ncols()
                    )));
                }
            },
        };

        let mut records: Vec<WeightRecord> = series
            .iter()
            .filter(|(_, w)| !w.is_nan())
            .map(|(key, weight)| WeightRecord {
                time: key.level(0).clone(),
                asset: key.level(1).clone(),
                weight,
            })
            .collect();
        records.sort_by(|a, b| (&a.time, &a.asset).cmp(&(&b.time, &b.asset)));
        Ok(records)
    }

    fn tag_of(
        record: &WeightRecord,
        tags: Option<&PortfolioTags>,
    ) -> Result<Option<Label>, PanelError> {
        match tags {
            None => Ok(None),
            Some(tags) => tags
                .get(&record.time, &record.asset)
                .cloned()
                .map(Some)
                .ok_or_else(|| {
                    PanelError::key_not_found(
                        Key::pair(record.time.clone(), record.asset.clone()),
                        TAG_LEVEL,
                    )
                }),
        }
    }

    fn normalized_records(
        &self,
        weights: &Container,
        tags: Option<&PortfolioTags>,
    ) -> Result<Vec<(WeightRecord, Option<Label>)>, PanelError> {
        let records = self.weight_records(weights)?;
        let tagged = records
            .into_iter()
            .map(|r| Self::tag_of(&r, tags).map(|tag| (r, tag)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut totals: HashMap<Group, f64> = HashMap::new();
        for (record, tag) in &tagged {
            *totals.entry((record.time.clone(), tag.clone())).or_insert(0.0) += record.weight;
        }

        Ok(tagged
            .into_iter()
            .map(|(mut record, tag)| {
                let total = totals[&(record.time.clone(), tag.clone())];
                if total != 0.0 {
                    record.weight /= total;
                } else {
                    debug!(time = %record.time, "weights sum to zero; slice left as is");
                }
                (record, tag)
            })
            .collect())
    }

    /// Weights divided by their per-rebalance (per-tag) total.
    pub fn normalize(
        &self,
        weights: &Container,
        tags: Option<&PortfolioTags>,
    ) -> Result<LabeledSeries, PanelError> {
        let names = weights.index().names().to_vec();
        let records = self.normalized_records(weights, tags)?;
        let (keys, values): (Vec<Key>, Vec<f64>) = records
            .into_iter()
            .map(|(r, _)| (Key::pair(r.time, r.asset), r.weight))
            .unzip();
        LabeledSeries::new(Axis::new(names, keys)?, Some(Label::from("weight")), values)
    }

    /// Weighted return of each rebalance (and tag), using normalised weights.
    ///
    /// Returns for assets without a weight are ignored; a weighted asset
    /// without a return contributes nothing. A period where no weighted asset
    /// has a return is `NaN`.
    pub fn profit(
        &self,
        weights: &Container,
        returns: &Container,
        tags: Option<&PortfolioTags>,
    ) -> Result<LabeledSeries, PanelError> {
        let returns = panel_values(returns, "returns")?;
        let records = self.normalized_records(weights, tags)?;

        let mut periods: BTreeMap<Group, Option<f64>> = BTreeMap::new();
        for (record, tag) in records {
            let slot = periods.entry((record.time.clone(), tag)).or_insert(None);
            let key = Key::pair(record.time, record.asset);
            if let Some(r) = returns.get(&key).copied().filter(|r| !r.is_nan()) {
                *slot = Some(slot.unwrap_or(0.0) + record.weight * r);
            }
        }

        let time_name = weights.index().names()[0].clone();
        group_series(
            periods.into_iter().map(|(g, v)| (g, v.unwrap_or(f64::NAN))),
            &time_name,
            tags.is_some(),
            "profit",
        )
    }

    /// Weight traded between consecutive rebalances.
    ///
    /// Normalised weights are laid on the full grid of rebalance times x
    /// assets (missing pairs are zero) and differenced per asset. With tags,
    /// every tag walks the rebalance times of the whole panel, so a group
    /// that empties out reports a full exit and later a full re-entry. The
    /// first rebalance has no predecessor and is not reported.
    pub fn turnover(
        &self,
        weights: &Container,
        side: TurnoverSide,
        tags: Option<&PortfolioTags>,
    ) -> Result<LabeledSeries, PanelError> {
        let records = self.normalized_records(weights, tags)?;

        let mut books: BTreeMap<Option<Label>, BTreeMap<Label, HashMap<Label, f64>>> =
            BTreeMap::new();
        let mut assets: BTreeMap<Option<Label>, BTreeSet<Label>> = BTreeMap::new();
        let mut rebalance_times: BTreeSet<Label> = BTreeSet::new();
        for (record, tag) in records {
            rebalance_times.insert(record.time.clone());
            assets
                .entry(tag.clone())
                .or_default()
                .insert(record.asset.clone());
            books
                .entry(tag)
                .or_default()
                .entry(record.time)
                .or_default()
                .insert(record.asset, record.weight);
        }

        // A tag with nothing at some rebalance holds zero there.
        let empty = HashMap::new();
        let times: Vec<&Label> = rebalance_times.iter().collect();
        let mut periods: BTreeMap<Group, f64> = BTreeMap::new();
        for (tag, book) in &books {
            let universe = &assets[tag];
            for pair in times.windows(2) {
                let prev = book.get(pair[0]).unwrap_or(&empty);
                let curr = book.get(pair[1]).unwrap_or(&empty);
                let traded: f64 = universe
                    .iter()
                    .map(|asset| {
                        let delta = curr.get(asset).copied().unwrap_or(0.0)
                            - prev.get(asset).copied().unwrap_or(0.0);
                        match side {
                            TurnoverSide::Both => delta.abs(),
                            TurnoverSide::Buy => delta.max(0.0),
                            TurnoverSide::Sell => delta.min(0.0).abs(),
                        }
                    })
                    .sum();
                periods.insert((pair[1].clone(), tag.clone()), traded);
            }
        }

        let time_name = weights.index().names()[0].clone();
        group_series(
            periods.into_iter(),
            &time_name,
            tags.is_some(),
            &format!("turnover_{}", side),
        )
    }

    /// Compounded net worth of holding the raw rebalance weights.
    ///
    /// Starts at 1.0 on the first price time at or after the first rebalance.
    /// Between rebalances the value drifts with `sum(h * p_t) / sum(h * p_lrd)`;
    /// on reaching a new rebalance the value is marked with the outgoing
    /// holdings, then the baseline resets to the new holdings at that value.
    /// Prices are carried forward per asset.
    ///
    /// A rebalance dated between price times takes effect at the next price
    /// time. A held asset with no quote yet at that point is left out of the
    /// holdings until the following rebalance, even if quotes for it arrive
    /// in between.
    pub fn networth(
        &self,
        weights: &Container,
        prices: &Container,
    ) -> Result<LabeledSeries, PanelError> {
        let records = self.weight_records(weights)?;
        let mut rebalances: BTreeMap<Label, Vec<(Label, f64)>> = BTreeMap::new();
        for r in records {
            rebalances.entry(r.time).or_default().push((r.asset, r.weight));
        }
        let first_rebalance = match rebalances.keys().next() {
            Some(t) => t.clone(),
            None => return Err(PanelError::shape("weight panel has no weights")),
        };

        let price_values = panel_values(prices, "prices")?;
        let mut by_time: BTreeMap<Label, Vec<(Label, f64)>> = BTreeMap::new();
        for (key, p) in price_values {
            if !p.is_nan() {
                by_time
                    .entry(key.level(0).clone())
                    .or_default()
                    .push((key.level(1).clone(), p));
            }
        }

        let mut last_price: HashMap<Label, f64> = HashMap::new();
        let mut pending = rebalances.into_iter().peekable();
        let mut holdings: Option<(Vec<(Label, f64)>, f64)> = None;
        let mut base = 1.0;
        let mut times = Vec::new();
        let mut values = Vec::new();

        for (t, quotes) in by_time {
            last_price.extend(quotes);
            if t < first_rebalance {
                continue;
            }

            let mut latest = None;
            while let Some((when, _)) = pending.peek() {
                if *when > t {
                    break;
                }
                latest = pending.next();
            }

            let value = match &holdings {
                Some((held, baseline)) if *baseline != 0.0 => {
                    base * mark(held, &last_price) / baseline
                }
                Some(_) => base,
                None => 1.0,
            };

            if let Some((when, new_holdings)) = latest {
                let priced: Vec<(Label, f64)> = new_holdings
                    .into_iter()
                    .filter(|(asset, _)| last_price.contains_key(asset))
                    .collect();
                let baseline = mark(&priced, &last_price);
                trace!(rebalance = %when, at = %t, value, "networth baseline reset");
                base = value;
                holdings = Some((priced, baseline));
            }

            times.push(t);
            values.push(value);
        }

        let time_name = prices.index().names()[0].clone();
        LabeledSeries::new(
            Axis::single(&time_name, times)?,
            Some(Label::from("networth")),
            values,
        )
    }

    /// Per-asset return from each rebalance to the next one (the last
    /// rebalance runs to the final price time), keyed at the rebalance.
    ///
    /// Prices are looked up as the latest quote at or before each date.
    pub fn rebalance_returns(
        &self,
        weights: &Container,
        prices: &Container,
    ) -> Result<LabeledSeries, PanelError> {
        let rebalance_times: Vec<Label> = self
            .weight_records(weights)?
            .into_iter()
            .map(|r| r.time)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut quotes: BTreeMap<Label, Vec<(Label, f64)>> = BTreeMap::new();
        for (key, p) in panel_values(prices, "prices")? {
            if !p.is_nan() {
                quotes
                    .entry(key.level(1).clone())
                    .or_default()
                    .push((key.level(0).clone(), p));
            }
        }
        let final_time = quotes
            .values()
            .flat_map(|q| q.iter().map(|(t, _)| t))
            .max()
            .cloned();
        for q in quotes.values_mut() {
            q.sort_by(|a, b| a.0.cmp(&b.0));
        }

        let mut entries: Vec<(Key, f64)> = Vec::new();
        for (i, start) in rebalance_times.iter().enumerate() {
            let end = match rebalance_times.get(i + 1).or(final_time.as_ref()) {
                Some(end) if end > start => end,
                _ => continue,
            };
            for (asset, q) in &quotes {
                if let (Some(p0), Some(p1)) = (price_at(q, start), price_at(q, end)) {
                    if p0 != 0.0 {
                        entries.push((Key::pair(start.clone(), asset.clone()), p1 / p0 - 1.0));
                    }
                }
            }
        }

        let names = weights.index().names().to_vec();
        let (keys, values): (Vec<Key>, Vec<f64>) = entries.into_iter().unzip();
        LabeledSeries::new(Axis::new(names, keys)?, Some(Label::from("return")), values)
    }
}

fn mark(holdings: &[(Label, f64)], prices: &HashMap<Label, f64>) -> f64 {
    holdings
        .iter()
        .filter_map(|(asset, h)| prices.get(asset).map(|p| h * p))
        .sum()
}

fn price_at(quotes: &[(Label, f64)], when: &Label) -> Option<f64> {
    let idx = quotes.partition_point(|(t, _)| t <= when);
    (idx > 0).then(|| quotes[idx - 1].1)
}

/// (time, asset) -> value for a single-valued panel, or a time-series table
/// whose columns are assets.
pub fn panel_values(container: &Container, what: &str) -> Result<HashMap<Key, f64>, PanelError> {
    let kind = classify(container)?;
    let series = match (kind, container) {
        (LayoutKind::PanelSeries, Container::Series(s)) => s.clone(),
        (LayoutKind::PanelSeries, Container::Table(t)) => t.column_series(0),
        (LayoutKind::TimeSeriesTable, Container::Table(t)) => t.stack("asset")?,
        (kind, _) if kind.family() == LayoutFamily::Panel => {
            return Err(PanelError::shape(format!(
                "{} panel must hold a single value per (time, asset)",
                what
            )));
        }
        (kind, _) => {
            return Err(PanelError::shape(format!(
                "{} must be a panel or a time-series table of assets, got a {}",
                what, kind
            )));
        }
    };
    Ok(series.iter().map(|(k, v)| (k.clone(), v)).collect())
}

fn group_series(
    periods: impl Iterator<Item = (Group, f64)>,
    time_name: &str,
    tagged: bool,
    name: &str,
) -> Result<LabeledSeries, PanelError> {
    let (keys, values): (Vec<Key>, Vec<f64>) = periods
        .map(|((time, tag), v)| {
            let key = match tag {
                Some(tag) if tagged => Key::pair(time, tag),
                _ => Key::single(time),
            };
            (key, v)
        })
        .unzip();
    let names = if tagged {
        vec![time_name.to_string(), TAG_LEVEL.to_string()]
    } else {
        vec![time_name.to_string()]
    };
    LabeledSeries::new(Axis::new(names, keys)?, Some(Label::from(name)), values)
}
