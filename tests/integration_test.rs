//! End-to-end tests of the panel engine.
//!
//! Tests cover:
//! - Weight normalization, profit attribution and turnover on a two-asset book
//! - Arity collapse of one-column tables during classification
//! - Selection round trips on a (date, asset) x indicator panel
//! - Rolling identity and boundary behaviour, sequential vs parallel
//! - CSV ingestion feeding the accountant and the performance summary

mod common;

use approx::assert_relative_eq;
use common::*;
use quantpanel::adapters::csv_adapter::CsvTableAdapter;
use quantpanel::domain::axis::Axis;
use quantpanel::domain::engine::PanelEngine;
use quantpanel::domain::error::PanelError;
use quantpanel::domain::frame::{Container, LabeledTable, Slice};
use quantpanel::domain::label::{Key, Label};
use quantpanel::domain::layout::{classify, LayoutKind};
use quantpanel::domain::performance::Performance;
use quantpanel::domain::portfolio::{PortfolioAccountant, TurnoverSide};
use quantpanel::domain::rolling::{rolling, RollingOptions};
use quantpanel::domain::selector::{select, Sel};
use quantpanel::domain::window_fns::Stat;
use quantpanel::ports::table_port::TableSource;

mod accountant_scenarios {
    use super::*;

    #[test]
    fn normalize_and_profit_on_two_asset_book() {
        let acct = PortfolioAccountant::new();
        let weights = scenario_weights();

        let normalized = acct.normalize(&weights, None).unwrap();
        assert_eq!(normalized.values(), &[0.5, 0.5, 1.0, 0.0]);

        let profit = acct.profit(&weights, &scenario_returns(), None).unwrap();
        assert_eq!(profit.name(), Some(&Label::from("profit")));
        assert_eq!(
            profit.index().keys(),
            &[Key::single(date(2020, 1, 1)), Key::single(date(2020, 2, 1))]
        );
        assert_relative_eq!(profit.get(0), 0.0, epsilon = 1e-12);
        assert_relative_eq!(profit.get(1), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn turnover_after_full_rotation_into_one_asset() {
        let acct = PortfolioAccountant::new();
        let weights = scenario_weights();

        let buy = acct.turnover(&weights, TurnoverSide::Buy, None).unwrap();
        let sell = acct.turnover(&weights, TurnoverSide::Sell, None).unwrap();
        let both = acct.turnover(&weights, TurnoverSide::Both, None).unwrap();

        assert_eq!(buy.len(), 1);
        assert_relative_eq!(buy.get(0), 0.5, epsilon = 1e-12);
        assert_relative_eq!(sell.get(0), 0.5, epsilon = 1e-12);
        assert_relative_eq!(both.get(0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn scaling_raw_weights_leaves_results_unchanged() {
        let acct = PortfolioAccountant::new();
        let scaled = panel_series(&[
            (date(2020, 1, 1), "A", 10.0),
            (date(2020, 1, 1), "B", 10.0),
            (date(2020, 2, 1), "A", 7.0),
            (date(2020, 2, 1), "B", 0.0),
        ]);
        assert_eq!(
            acct.normalize(&scaled, None).unwrap().values(),
            acct.normalize(&scenario_weights(), None).unwrap().values()
        );
    }
}

mod classification {
    use super::*;

    #[test]
    fn one_column_date_table_is_time_series_series() {
        let table = LabeledTable::from_rows(
            Axis::single("date", vec![date(2024, 1, 1), date(2024, 1, 2)]).unwrap(),
            Axis::single("indicator", vec!["close".into()]).unwrap(),
            vec![vec![1.0], vec![2.0]],
        )
        .unwrap();
        assert_eq!(
            classify(&Container::Table(table)).unwrap(),
            LayoutKind::TimeSeriesSeries
        );
    }

    #[test]
    fn panel_stays_panel_after_row_subset() {
        let panel = price_panel();
        assert_eq!(classify(&panel).unwrap(), LayoutKind::PanelTable);
        let subset = panel.take_rows(&[0, 1, 4]);
        assert_eq!(classify(&subset).unwrap(), LayoutKind::PanelTable);
    }

    #[test]
    fn engine_classifies_without_mutating() {
        let panel = price_panel();
        let before = panel.clone();
        PanelEngine::default().classify(&panel).unwrap();
        assert_eq!(panel, before);
    }
}

mod selection {
    use super::*;

    #[test]
    fn time_and_asset_round_trip_to_row() {
        let panel = price_panel();
        let layout = classify(&panel).unwrap();
        let table = match &panel {
            Container::Table(t) => t,
            Container::Series(_) => unreachable!(),
        };
        for r in 0..table.nrows() {
            let key = table.index().key(r);
            let out = select(
                &panel,
                layout,
                &Sel::One(key.level(0).clone()),
                &Sel::One(key.level(1).clone()),
                &Sel::All,
            )
            .unwrap();
            let series = out.as_series().unwrap();
            assert_eq!(series.values(), table.row(r));
        }
    }

    #[test]
    fn pinned_indicator_unstacks_to_time_by_asset() {
        let panel = price_panel();
        let out = PanelEngine::default()
            .select(&panel, &Sel::All, &Sel::All, &Sel::one("close"))
            .unwrap();
        let wide = out.as_table().unwrap();
        assert_eq!(wide.nrows(), 3);
        assert_eq!(wide.ncols(), 2);
        assert_eq!(
            wide.value(&Key::single(date(2024, 5, 3)), &Key::single("CBA")),
            Some(21.0)
        );
    }

    #[test]
    fn date_range_filters_rows() {
        let panel = price_panel();
        let out = PanelEngine::default()
            .select(
                &panel,
                &Sel::between(date(2024, 5, 3), date(2024, 5, 6)),
                &Sel::one("BHP"),
                &Sel::one("close"),
            )
            .unwrap();
        assert_eq!(out.as_series().unwrap().values(), &[11.0, 12.0]);
    }

    #[test]
    fn absent_asset_is_reported_with_axis() {
        let panel = price_panel();
        let err = PanelEngine::default()
            .select(&panel, &Sel::All, &Sel::one("WBC"), &Sel::All)
            .unwrap_err();
        assert_eq!(
            err,
            PanelError::KeyNotFound {
                key: "WBC".into(),
                axis: "asset".into()
            }
        );
    }
}

mod rolling_engine {
    use super::*;

    fn identity(w: &Container) -> Result<Slice, PanelError> {
        match w.clone().canonical() {
            Container::Series(s) => Ok(Slice::Series(s.with_index(
                w.index().drop_level(0)?,
            )?)),
            Container::Table(t) => {
                let index = t.index().drop_level(0)?;
                Ok(Slice::Table(t.with_index(index)?))
            }
        }
    }

    #[test]
    fn window_of_one_reproduces_panel() {
        let panel = price_panel();
        let out = rolling(&panel, &RollingOptions::new(1), identity).unwrap();
        let original = match &panel {
            Container::Table(t) => t,
            Container::Series(_) => unreachable!(),
        };
        assert_eq!(out.index().keys(), original.index().keys());
        for r in 0..out.nrows() {
            assert_eq!(out.row(r), original.row(r));
        }
    }

    #[test]
    fn window_larger_than_history_is_empty() {
        let panel = price_panel();
        let out = rolling(&panel, &RollingOptions::new(10), identity).unwrap();
        assert_eq!(out.nrows(), 0);
    }

    #[test]
    fn parallel_stat_matches_sequential() {
        let panel = price_panel();
        let options = RollingOptions::new(2);
        let sequential = rolling(&panel, &options, |w: &Container| Stat::Mean.apply(w)).unwrap();
        let parallel = rolling(&panel, &options.with_processes(4), |w: &Container| {
            Stat::Mean.apply(w)
        })
        .unwrap();
        assert_eq!(sequential, parallel);
        // Two windows x two assets.
        assert_eq!(sequential.nrows(), 4);
        assert_eq!(
            sequential.value(
                &Key::pair(date(2024, 5, 6), "BHP"),
                &Key::single("close")
            ),
            Some(11.5)
        );
    }
}

mod csv_pipeline {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn weights_and_prices_from_csv_compound_networth() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "weights.csv", WEIGHTS_CSV);
        write_file(dir.path(), "prices.csv", PRICES_CSV);
        let source = CsvTableAdapter::new(dir.path().to_path_buf());

        let weights = source.load("weights").unwrap();
        let prices = source.load("prices").unwrap();
        let acct = PortfolioAccountant::new();
        let curve = acct.networth(&weights, &prices).unwrap();

        // Equal holdings of A and B until February, then only A.
        let expected = [1.0, 29.0 / 30.0, 34.0 / 30.0, 34.0 / 30.0 * 15.0 / 12.0];
        assert_eq!(curve.len(), expected.len());
        for (got, want) in curve.values().iter().zip(expected) {
            assert_relative_eq!(*got, want, epsilon = 1e-12);
        }

        let perf = Performance::compute(&curve, 0.0, 12.0);
        assert_relative_eq!(perf.total_return, expected[3] - 1.0, epsilon = 1e-12);
        assert_relative_eq!(perf.max_drawdown, 1.0 / 30.0, epsilon = 1e-12);
    }

    #[test]
    fn rebalance_returns_feed_profit() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "weights.csv", WEIGHTS_CSV);
        write_file(dir.path(), "prices.csv", PRICES_CSV);
        let source = CsvTableAdapter::new(dir.path().to_path_buf());
        let weights = source.load("weights").unwrap();
        let prices = source.load("prices").unwrap();

        let acct = PortfolioAccountant::new();
        let returns = acct.rebalance_returns(&weights, &prices).unwrap();
        let profit = acct
            .profit(&weights, &Container::Series(returns), None)
            .unwrap();
        // January: A +20%, B +10%; February: A +25%.
        assert_relative_eq!(profit.get(0), 0.15, epsilon = 1e-12);
        assert_relative_eq!(profit.get(1), 0.25, epsilon = 1e-12);
    }
}
