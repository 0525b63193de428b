use crate::bollinger::BollingerBands;
use crate::cache::IndicatorCache;
use crate::dmi::Dmi;
use crate::ema::Ema;
use crate::envelope::Envelope;
use crate::error::CalcError;
use crate::ichimoku::Ichimoku;
use crate::ma_difference::MaDifference;
use crate::macd::Macd;
use crate::momentum::Momentum;
use crate::parabolic::ParabolicSar;
use crate::psychological::Psychological;
use crate::rci::Rci;
use crate::rsi::Rsi;
use crate::settings::ChartSettings;
use crate::sma::Sma;
use crate::std_dev::StdDev;
use crate::stochastics::Stochastics;
use crate::turning_point::TurningPointDetector;
use crate::{Indicator, Results};
use tchart_core::{ChartData, Series};
use tracing::debug;

/// The cached results of every indicator enabled in a [`ChartSettings`],
/// all driven from one [`ChartData`].
#[derive(Debug, Default)]
pub struct IndicatorSet {
    sma: Vec<IndicatorCache<Sma>>,
    ema: Vec<IndicatorCache<Ema>>,
    bollinger: IndicatorCache<BollingerBands>,
    envelope: IndicatorCache<Envelope>,
    ichimoku: IndicatorCache<Ichimoku>,
    parabolic: IndicatorCache<ParabolicSar>,
    turning_point: IndicatorCache<TurningPointDetector>,
    macd: IndicatorCache<Macd>,
    rsi: IndicatorCache<Rsi>,
    rci: IndicatorCache<Rci>,
    stochastics: IndicatorCache<Stochastics>,
    dmi: IndicatorCache<Dmi>,
    momentum: IndicatorCache<Momentum>,
    std_dev: IndicatorCache<StdDev>,
    ma_difference: IndicatorCache<MaDifference>,
    psychological: IndicatorCache<Psychological>,
}

fn refresh_each<I: Indicator>(
    caches: &mut Vec<IndicatorCache<I>>,
    params: &[I::Params],
    data: &ChartData,
    revised_from: Option<usize>,
) -> Result<(), CalcError> {
    caches.resize_with(params.len(), IndicatorCache::new);
    for (cache, p) in caches.iter_mut().zip(params) {
        cache.refresh(p, data, revised_from)?;
    }
    Ok(())
}

fn refresh_optional<I: Indicator>(
    cache: &mut IndicatorCache<I>,
    params: Option<&I::Params>,
    data: &ChartData,
    revised_from: Option<usize>,
) -> Result<(), CalcError> {
    match params {
        Some(p) => {
            cache.refresh(p, data, revised_from)?;
        }
        None => cache.clear(),
    }
    Ok(())
}

fn push_columns<R: Results>(out: &mut Vec<(String, Series)>, label: &str, result: Option<&R>) {
    let Some(result) = result else {
        return;
    };
    for (column, series) in result.columns() {
        let name = if column.is_empty() {
            label.to_string()
        } else {
            format!("{label}.{column}")
        };
        out.push((name, series));
    }
}

impl IndicatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates every enabled indicator and drops the results of disabled
    /// ones. `revised_from` is the revision boundary reported by the data
    /// source, `None` for a pure append.
    pub fn refresh(
        &mut self,
        settings: &ChartSettings,
        data: &ChartData,
        revised_from: Option<usize>,
    ) -> Result<(), CalcError> {
        debug!(bars = data.len(), ?revised_from, "Refreshing indicators");
        refresh_each(&mut self.sma, &settings.sma, data, revised_from)?;
        refresh_each(&mut self.ema, &settings.ema, data, revised_from)?;
        refresh_optional(&mut self.bollinger, settings.bollinger.as_ref(), data, revised_from)?;
        refresh_optional(&mut self.envelope, settings.envelope.as_ref(), data, revised_from)?;
        refresh_optional(&mut self.ichimoku, settings.ichimoku.as_ref(), data, revised_from)?;
        refresh_optional(&mut self.parabolic, settings.parabolic.as_ref(), data, revised_from)?;
        refresh_optional(
            &mut self.turning_point,
            settings.turning_point.as_ref(),
            data,
            revised_from,
        )?;
        refresh_optional(&mut self.macd, settings.macd.as_ref(), data, revised_from)?;
        refresh_optional(&mut self.rsi, settings.rsi.as_ref(), data, revised_from)?;
        refresh_optional(&mut self.rci, settings.rci.as_ref(), data, revised_from)?;
        refresh_optional(&mut self.stochastics, settings.stochastics.as_ref(), data, revised_from)?;
        refresh_optional(&mut self.dmi, settings.dmi.as_ref(), data, revised_from)?;
        refresh_optional(&mut self.momentum, settings.momentum.as_ref(), data, revised_from)?;
        refresh_optional(&mut self.std_dev, settings.std_dev.as_ref(), data, revised_from)?;
        refresh_optional(
            &mut self.ma_difference,
            settings.ma_difference.as_ref(),
            data,
            revised_from,
        )?;
        refresh_optional(
            &mut self.psychological,
            settings.psychological.as_ref(),
            data,
            revised_from,
        )?;
        Ok(())
    }

    /// Drops the oldest `count` bars from every cached result. Call together
    /// with [`ChartData::remove_old`].
    pub fn remove_old(&mut self, count: usize) {
        for cache in &mut self.sma {
            cache.remove_old(count);
        }
        for cache in &mut self.ema {
            cache.remove_old(count);
        }
        self.bollinger.remove_old(count);
        self.envelope.remove_old(count);
        self.ichimoku.remove_old(count);
        self.parabolic.remove_old(count);
        self.turning_point.remove_old(count);
        self.macd.remove_old(count);
        self.rsi.remove_old(count);
        self.rci.remove_old(count);
        self.stochastics.remove_old(count);
        self.dmi.remove_old(count);
        self.momentum.remove_old(count);
        self.std_dev.remove_old(count);
        self.ma_difference.remove_old(count);
        self.psychological.remove_old(count);
    }

    /// Every plotted line of every enabled indicator, named
    /// `indicator[.line]`. Moving averages carry their span in the name.
    pub fn columns(&self) -> Vec<(String, Series)> {
        let mut out = Vec::new();
        for cache in &self.sma {
            if let Some(span) = cache.params().map(|p| p.span) {
                push_columns(&mut out, &format!("sma_{span}"), cache.latest());
            }
        }
        for cache in &self.ema {
            if let Some(span) = cache.params().map(|p| p.span) {
                push_columns(&mut out, &format!("ema_{span}"), cache.latest());
            }
        }
        push_columns(&mut out, BollingerBands::NAME, self.bollinger.latest());
        push_columns(&mut out, Envelope::NAME, self.envelope.latest());
        push_columns(&mut out, Ichimoku::NAME, self.ichimoku.latest());
        push_columns(&mut out, ParabolicSar::NAME, self.parabolic.latest());
        push_columns(&mut out, TurningPointDetector::NAME, self.turning_point.latest());
        push_columns(&mut out, Macd::NAME, self.macd.latest());
        push_columns(&mut out, Rsi::NAME, self.rsi.latest());
        push_columns(&mut out, Rci::NAME, self.rci.latest());
        push_columns(&mut out, Stochastics::NAME, self.stochastics.latest());
        push_columns(&mut out, Dmi::NAME, self.dmi.latest());
        push_columns(&mut out, Momentum::NAME, self.momentum.latest());
        push_columns(&mut out, StdDev::NAME, self.std_dev.latest());
        push_columns(&mut out, MaDifference::NAME, self.ma_difference.latest());
        push_columns(&mut out, Psychological::NAME, self.psychological.latest());
        out
    }
}
