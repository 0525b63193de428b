use chrono::{TimeZone, Utc};
use std::ops::Range;
use tchart_core::{Bar, ChartData, Series};
use tchart_indicators::bollinger::{BollingerBands, BollingerParams};
use tchart_indicators::dmi::{Dmi, DmiParams};
use tchart_indicators::ema::{Ema, EmaParams};
use tchart_indicators::envelope::{Envelope, EnvelopeParams};
use tchart_indicators::ichimoku::{Ichimoku, IchimokuParams};
use tchart_indicators::ma_difference::{MaDifference, MaDifferenceParams};
use tchart_indicators::macd::{Macd, MacdParams, SignalType};
use tchart_indicators::momentum::{Momentum, MomentumParams, MomentumType};
use tchart_indicators::parabolic::{ParabolicParams, ParabolicSar};
use tchart_indicators::psychological::{Psychological, PsychologicalParams};
use tchart_indicators::rci::{Rci, RciParams};
use tchart_indicators::rsi::{Rsi, RsiParams};
use tchart_indicators::sma::{Sma, SmaParams};
use tchart_indicators::std_dev::{StdDev, StdDevParams};
use tchart_indicators::stochastics::{Stochastics, StochasticsParams};
use tchart_indicators::turning_point::{TurningPointDetector, TurningPointParams};
use tchart_indicators::{ChartSettings, Indicator, IndicatorCache, IndicatorSet, Results};

const EPSILON: f64 = 1e-9;

fn bar(minute: usize, close: f64) -> Bar {
    Bar {
        timestamp: Utc.timestamp_opt(minute as i64 * 60, 0).unwrap(),
        open: close,
        high: close + 1.5,
        low: close - 1.0,
        close,
        volume: 1_000.0,
    }
}

fn prices(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| {
            let x = i as f64;
            50.0 + 8.0 * (x / 4.0).sin() + 2.5 * (x / 1.3).cos() + x * 0.05
        })
        .collect()
}

fn chart(len: usize) -> ChartData {
    ChartData::from_bars(prices(len).into_iter().enumerate().map(|(i, c)| bar(i, c))).unwrap()
}

/// Same bars as `chart`, with every price of bar `gap` missing.
fn chart_with_gap(len: usize, gap: usize) -> ChartData {
    chart_with_price(len, gap, f64::NAN)
}

/// Same bars as `chart`, with every price of bar `at` replaced by `price`.
fn chart_with_price(len: usize, at: usize, price: f64) -> ChartData {
    ChartData::from_bars(prices(len).into_iter().enumerate().map(|(i, c)| {
        if i == at {
            Bar {
                open: price,
                high: price,
                low: price,
                close: price,
                ..bar(i, c)
            }
        } else {
            bar(i, c)
        }
    }))
    .unwrap()
}

/// Random-walk bars from a fixed seed followed by `quiet` bars where open,
/// high, low and close all sit on the last close.
fn noisy_then_quiet(seed: u64, noisy: usize, quiet: usize) -> ChartData {
    let mut state = seed;
    let mut next = move || {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (state >> 11) as f64 / (1u64 << 53) as f64
    };
    let mut close = 100.0;
    let mut bars = Vec::with_capacity(noisy + quiet);
    for i in 0..noisy {
        close += (next() - 0.5) * 4.0;
        let spread = next() * 2.0;
        bars.push(Bar {
            high: close + spread,
            low: close - spread,
            ..bar(i, close)
        });
    }
    for i in noisy..noisy + quiet {
        bars.push(Bar {
            high: close,
            low: close,
            ..bar(i, close)
        });
    }
    ChartData::from_bars(bars).unwrap()
}

fn assert_within(label: &str, series: &Series, lo: f64, hi: f64) {
    for (i, value) in series.iter().enumerate() {
        if let Some(v) = value {
            assert!(lo - EPSILON <= v && v <= hi + EPSILON, "{label}[{i}] = {v}");
        }
    }
}

/// Asserts that inside `checked` each column is a gap exactly on the
/// `blanked` ranges (per-column `overrides` win) and has a value elsewhere.
fn assert_blanked<R: Results>(
    label: &str,
    results: &R,
    checked: Range<usize>,
    blanked: &[Range<usize>],
    overrides: &[(&str, Vec<Range<usize>>)],
) {
    for (name, series) in results.columns() {
        let ranges = overrides
            .iter()
            .find(|(column, _)| *column == name)
            .map_or(blanked, |(_, ranges)| ranges.as_slice());
        for i in checked.clone() {
            let expect_gap = ranges.iter().any(|r| r.contains(&i));
            assert_eq!(
                series.get(i).is_none(),
                expect_gap,
                "{label}.{name}[{i}] = {:?}",
                series.get(i)
            );
        }
    }
}

fn assert_columns_close<R: Results>(label: &str, actual: &R, expected: &R) {
    let (actual, expected) = (actual.columns(), expected.columns());
    assert_eq!(actual.len(), expected.len(), "{label}: column count");
    for ((name, a), (_, e)) in actual.iter().zip(expected.iter()) {
        assert_eq!(a.len(), e.len(), "{label}.{name}: length");
        for (i, (x, y)) in a.iter().zip(e.iter()).enumerate() {
            match (x, y) {
                (Some(x), Some(y)) => {
                    assert!((x - y).abs() < EPSILON, "{label}.{name}[{i}]: {x} vs {y}")
                }
                (None, None) => {}
                _ => panic!("{label}.{name}[{i}]: {x:?} vs {y:?}"),
            }
        }
    }
}

/// Feeds `data` one bar at a time and compares against a single pass.
fn check_incremental<I: Indicator>(params: I::Params, data: &ChartData) {
    let indicator = I::from_params(&params).unwrap();
    let full = indicator.compute(data, None);

    let mut growing = ChartData::new();
    let mut result: Option<I::Output> = None;
    for bar in data.bars() {
        growing.push(bar).unwrap();
        result = Some(indicator.compute(&growing, result));
    }
    let result = result.unwrap();
    assert_eq!(result.len(), data.len(), "{}: length", I::NAME);
    assert_columns_close(I::NAME, &result, &full);
}

/// Revises the newest bar after a full pass, then checks the cache output
/// against a fresh pass over the revised data.
fn check_revision<I: Indicator>(params: I::Params, data: &ChartData) {
    let mut cache: IndicatorCache<I> = IndicatorCache::new();
    let mut data = data.clone();
    cache.refresh(&params, &data, None).unwrap();

    let revised = data.update_latest_close(70.0);
    let refreshed = cache.refresh(&params, &data, revised).unwrap().clone();

    let fresh = I::from_params(&params).unwrap().compute(&data, None);
    assert_columns_close(I::NAME, &refreshed, &fresh);
}

/// Replaces the last `tail` bars with different prices through `merge`.
fn check_tail_merge<I: Indicator>(params: I::Params, len: usize, tail: usize) {
    let mut cache: IndicatorCache<I> = IndicatorCache::new();
    let mut data = chart(len);
    cache.refresh(&params, &data, None).unwrap();

    let replacement = ChartData::from_bars(
        (len - tail..len + 2).map(|i| bar(i, 40.0 + (i % 7) as f64)),
    )
    .unwrap();
    let revised = data.merge(&replacement);
    assert_eq!(revised, Some(len - tail));
    let refreshed = cache.refresh(&params, &data, revised).unwrap().clone();

    let fresh = I::from_params(&params).unwrap().compute(&data, None);
    assert_columns_close(I::NAME, &refreshed, &fresh);
}

macro_rules! for_every_indicator {
    ($check:ident $(, $arg:expr)*) => {
        $check::<Sma>(SmaParams::new(5) $(, $arg)*);
        $check::<Ema>(EmaParams::new(12) $(, $arg)*);
        $check::<BollingerBands>(BollingerParams::default() $(, $arg)*);
        $check::<Envelope>(EnvelopeParams::default() $(, $arg)*);
        $check::<Ichimoku>(IchimokuParams::default() $(, $arg)*);
        $check::<ParabolicSar>(ParabolicParams::default() $(, $arg)*);
        $check::<TurningPointDetector>(TurningPointParams { span: 3, reversal_rate: 0.5 } $(, $arg)*);
        $check::<Macd>(MacdParams::default() $(, $arg)*);
        $check::<Rsi>(RsiParams::default() $(, $arg)*);
        $check::<Rci>(RciParams::default() $(, $arg)*);
        $check::<Stochastics>(StochasticsParams::default() $(, $arg)*);
        $check::<Dmi>(DmiParams::default() $(, $arg)*);
        $check::<Momentum>(MomentumParams::default() $(, $arg)*);
        $check::<StdDev>(StdDevParams::default() $(, $arg)*);
        $check::<MaDifference>(MaDifferenceParams::default() $(, $arg)*);
        $check::<Psychological>(PsychologicalParams::default() $(, $arg)*);
    };
}

#[test]
fn full_recompute_is_idempotent() {
    fn check<I: Indicator>(params: I::Params, data: &ChartData) {
        let indicator = I::from_params(&params).unwrap();
        let first = indicator.compute(data, None);
        let second = indicator.compute(data, None);
        assert_columns_close(I::NAME, &first, &second);
    }
    let data = chart(120);
    for_every_indicator!(check, &data);
}

#[test]
fn bar_by_bar_updates_match_full_pass() {
    let data = chart(120);
    for_every_indicator!(check_incremental, &data);
}

#[test]
fn bar_by_bar_updates_match_full_pass_across_gaps() {
    let data = chart_with_gap(120, 60);
    for_every_indicator!(check_incremental, &data);
}

#[test]
fn latest_close_revision_matches_full_pass() {
    let data = chart(100);
    for_every_indicator!(check_revision, &data);
}

#[test]
fn tail_replacement_matches_full_pass() {
    for_every_indicator!(check_tail_merge, 100, 6);
}

#[test]
fn sma_revision_is_exact() {
    let params = SmaParams::new(7);
    let mut cache: IndicatorCache<Sma> = IndicatorCache::new();
    let mut data = chart(80);
    cache.refresh(&params, &data, None).unwrap();

    let revised = data.update_latest_close(12.0);
    let refreshed = cache.refresh(&params, &data, revised).unwrap().clone();
    assert_eq!(refreshed, Sma::new(7).unwrap().calculate(data.close()));
}

#[test]
fn warm_up_ends_at_span_minus_one() {
    let data = chart(40);
    let close = data.close();
    let span = 6;

    let sma = Sma::new(span).unwrap().calculate(close);
    let ema = Ema::new(span).unwrap().calculate(close);
    let rsi = Rsi::new(span).unwrap().calculate(close).rsi;
    let bollinger = BollingerBands::new(span, vec![2.0]).unwrap().calculate(close);

    for (name, series) in [
        ("sma", &sma),
        ("ema", &ema),
        ("rsi", &rsi),
        ("bollinger.center", &bollinger.center),
        ("bollinger.upper", &bollinger.upper[0]),
        ("bollinger.lower", &bollinger.lower[0]),
    ] {
        for i in 0..span - 1 {
            assert_eq!(series.get(i), None, "{name}[{i}]");
        }
        assert!(series.get(span - 1).is_some(), "{name}[{}]", span - 1);
    }
}

#[test]
fn gap_blanks_every_window_containing_it() {
    let data = chart_with_gap(120, 60);
    let checked = 50..100;
    let span = 5;
    let window = [60..65];

    fn run<I: Indicator>(params: I::Params, data: &ChartData) -> I::Output {
        I::from_params(&params).unwrap().compute(data, None)
    }

    let out = run::<Sma>(SmaParams::new(span), &data);
    assert_blanked("sma", &out, checked.clone(), &window, &[]);
    let out = run::<Ema>(EmaParams::new(span), &data);
    assert_blanked("ema", &out, checked.clone(), &window, &[]);
    let out = run::<StdDev>(StdDevParams { span, ..Default::default() }, &data);
    assert_blanked("std_dev", &out, checked.clone(), &window, &[]);
    let out = run::<MaDifference>(MaDifferenceParams { span, ..Default::default() }, &data);
    assert_blanked("ma_difference", &out, checked.clone(), &window, &[]);
    let out = run::<Rci>(RciParams { span, ..Default::default() }, &data);
    assert_blanked("rci", &out, checked.clone(), &window, &[]);

    let params = BollingerParams {
        span,
        sigma_rates: vec![1.0, 2.0],
        ..Default::default()
    };
    let out = run::<BollingerBands>(params, &data);
    assert_blanked("bollinger", &out, checked.clone(), &window, &[]);
    let out = run::<Envelope>(EnvelopeParams { span, ..Default::default() }, &data);
    assert_blanked("envelope", &out, checked.clone(), &window, &[]);

    // Both compare a bar with the one before it.
    let out = run::<Rsi>(RsiParams { span, ..Default::default() }, &data);
    assert_blanked("rsi", &out, checked.clone(), &[60..66], &[]);
    let out = run::<Psychological>(PsychologicalParams { span, ..Default::default() }, &data);
    assert_blanked("psychological", &out, checked.clone(), &[60..66], &[]);

    let params = MomentumParams {
        span,
        kind: MomentumType::Subtract,
        ..Default::default()
    };
    let out = run::<Momentum>(params, &data);
    assert_blanked("momentum", &out, checked.clone(), &[60..61, 65..66], &[]);

    let params = MacdParams {
        short_span: 3,
        long_span: 6,
        signal_span: 3,
        signal_type: SignalType::Ema,
        ..Default::default()
    };
    let out = run::<Macd>(params, &data);
    assert_blanked("macd", &out, checked.clone(), &[60..68], &[("macd", vec![60..66])]);

    let params = StochasticsParams {
        k_span: span,
        d_span: 3,
        slow_d_span: 3,
    };
    let out = run::<Stochastics>(params, &data);
    assert_blanked(
        "stochastics",
        &out,
        checked.clone(),
        &window,
        &[("d", vec![60..67]), ("slow_d", vec![60..69])],
    );

    let params = DmiParams {
        average_span: span,
        adx_span: 3,
        adxr_span: 3,
    };
    let out = run::<Dmi>(params, &data);
    assert_blanked(
        "dmi",
        &out,
        checked.clone(),
        &[60..66],
        &[("adx", vec![60..68]), ("adxr", vec![60..70])],
    );

    let params = IchimokuParams {
        span,
        tenkan_span: 3,
        kijun_span: span,
    };
    let out = run::<Ichimoku>(params, &data);
    assert_blanked(
        "ichimoku",
        &out,
        checked.clone(),
        &[],
        &[
            ("tenkan", vec![60..63]),
            ("kijun", vec![60..65]),
            ("senko1", vec![64..69]),
            ("senko2", vec![64..74]),
            ("chiko", vec![56..57]),
        ],
    );

    // The SAR restarts from the two bars after the gap.
    let out = run::<ParabolicSar>(ParabolicParams::default(), &data);
    for i in 59..62 {
        let blank = i >= 60;
        let empty = out.rising.get(i).is_none() && out.falling.get(i).is_none();
        assert_eq!(empty, blank, "parabolic[{i}]");
    }
    assert!(out.rising.get(62).is_some() != out.falling.get(62).is_some());
}

#[test]
fn infinite_price_is_a_gap_in_both_modes() {
    let src = Series::from(vec![1.0, f64::INFINITY, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let sma = Sma::new(2).unwrap();
    let full = sma.calculate(&src);
    assert_eq!(
        full,
        Series::from(vec![None, None, None, Some(2.5), Some(3.5), Some(4.5), Some(5.5)])
    );

    let mut growing = Series::new();
    for i in 0..src.len() {
        growing = sma.update(&Series::from(src.as_slice()[..=i].to_vec()), growing);
    }
    assert_eq!(growing, full);

    let data = chart_with_price(120, 60, f64::INFINITY);
    assert_eq!(data.close().get(60), None);
    for_every_indicator!(check_incremental, &data);
}

#[test]
fn rsi_stays_in_range_through_quiet_runs() {
    let span = 5;
    let rsi = Rsi::new(span).unwrap();
    for seed in 0..200 {
        let data = noisy_then_quiet(seed, 20, 8);
        let out = rsi.calculate(data.close()).rsi;
        assert_within(&format!("rsi seed {seed}"), &out, 0.0, 100.0);
        // windows lying wholly inside the quiet run have no movement
        for i in 20 + span - 1..28 {
            assert_eq!(out.get(i), None, "seed {seed} index {i}");
        }
    }
}

#[test]
fn dmi_stays_in_range_through_quiet_runs() {
    let quick = DmiParams {
        average_span: 5,
        adx_span: 3,
        adxr_span: 3,
    };
    for params in [DmiParams::default(), quick] {
        let dmi = Dmi::from_params(&params).unwrap();
        for seed in 0..200 {
            let data = noisy_then_quiet(seed, 30, 10);
            let out = dmi.compute(&data, None);
            let label = format!("{params:?} seed {seed}");
            assert_within(&label, &out.plus_di, 0.0, f64::INFINITY);
            assert_within(&label, &out.minus_di, 0.0, f64::INFINITY);
            assert_within(&label, &out.dx, 0.0, 100.0);
            assert_within(&label, &out.adx, 0.0, 100.0);
            assert_within(&label, &out.adxr, 0.0, 100.0);
        }
    }
}

#[test]
fn every_indicator_survives_gaps() {
    let mut data = chart_with_gap(150, 40);
    let more = chart_with_gap(160, 155);
    data.merge(&ChartData::from_bars(more.bars().skip(150)).unwrap());

    let mut set = IndicatorSet::new();
    set.refresh(&ChartSettings::all(), &data, None).unwrap();
    for (name, series) in set.columns() {
        assert!(series.len() >= data.len(), "{name}");
        assert!(series.iter().flatten().all(f64::is_finite), "{name}");
    }
}

#[test]
fn sma_of_one_to_five() {
    let out = Sma::new(3).unwrap().calculate(&Series::from(vec![1.0, 2.0, 3.0, 4.0, 5.0]));
    assert_eq!(out, Series::from(vec![None, None, Some(2.0), Some(3.0), Some(4.0)]));
}

#[test]
fn rsi_of_rising_prices_is_one_hundred() {
    let src = Series::from((0..30).map(|i| 10.0 + i as f64).collect::<Vec<_>>());
    let out = Rsi::new(14).unwrap().calculate(&src);
    for i in 13..30 {
        let value = out.rsi.get(i).unwrap();
        assert!((value - 100.0).abs() < EPSILON, "index {i}: {value}");
    }
}

#[test]
fn rci_of_monotonic_runs() {
    let rci = Rci::new(3).unwrap();
    assert_eq!(rci.calculate(&Series::from(vec![1.0, 2.0, 3.0])).get(2), Some(100.0));
    assert_eq!(rci.calculate(&Series::from(vec![3.0, 2.0, 1.0])).get(2), Some(-100.0));
}

#[test]
fn v_shape_has_a_single_bottom() {
    let s = Series::from(vec![5.0, 4.0, 3.0, 2.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    let out = TurningPointDetector::new(2, 0.5).unwrap().calculate(&s, &s).unwrap();
    assert_eq!(out.points().len(), 1);
    assert_eq!(out.points()[0].index, 4);
}

#[test]
fn retention_keeps_cache_aligned_with_data() {
    let params = SmaParams::new(4);
    let mut cache: IndicatorCache<Sma> = IndicatorCache::new();
    let mut data = chart(50);
    cache.refresh(&params, &data, None).unwrap();

    data.remove_old(20);
    cache.remove_old(20);
    let next = ChartData::from_bars([bar(50, 55.0)]).unwrap();
    let revised = data.merge(&next);
    let out = cache.refresh(&params, &data, revised).unwrap();

    assert_eq!(out.len(), data.len());
    let expected = Sma::new(4).unwrap().calculate(data.close());
    let tail = out.len() - 1;
    let (a, e) = (out.get(tail).unwrap(), expected.get(tail).unwrap());
    assert!((a - e).abs() < EPSILON);
}
