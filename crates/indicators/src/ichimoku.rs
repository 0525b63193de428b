use crate::error::{check_span, CalcError};
use crate::window::MovingExtremum;
use crate::{Indicator, Results};
use serde::{Deserialize, Serialize};
use tchart_core::{map2, ChartData, Series};

/// Ichimoku Kinko Hyo.
///
/// - Tenkan (conversion) = midpoint of the `tenkan_span` high/low range
/// - Kijun (base) = midpoint of the `kijun_span` high/low range
/// - Senko 1 = (tenkan + kijun) / 2, plotted `span - 1` bars ahead
/// - Senko 2 = midpoint of the `2 * span` high/low range, plotted `span - 1` bars ahead
/// - Chiko (lagging) = close plotted `span - 1` bars behind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ichimoku {
    span: usize,
    tenkan_span: usize,
    kijun_span: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IchimokuParams {
    pub span: usize,
    pub tenkan_span: usize,
    pub kijun_span: usize,
}

impl Default for IchimokuParams {
    fn default() -> Self {
        Self {
            span: 26,
            tenkan_span: 9,
            kijun_span: 26,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Trackers {
    tenkan_high: MovingExtremum,
    tenkan_low: MovingExtremum,
    kijun_high: MovingExtremum,
    kijun_low: MovingExtremum,
    senko_high: MovingExtremum,
    senko_low: MovingExtremum,
}

impl Trackers {
    fn new(ichimoku: &Ichimoku) -> Self {
        Self {
            tenkan_high: MovingExtremum::max(ichimoku.tenkan_span),
            tenkan_low: MovingExtremum::min(ichimoku.tenkan_span),
            kijun_high: MovingExtremum::max(ichimoku.kijun_span),
            kijun_low: MovingExtremum::min(ichimoku.kijun_span),
            senko_high: MovingExtremum::max(2 * ichimoku.span),
            senko_low: MovingExtremum::min(2 * ichimoku.span),
        }
    }

    fn matches(&self, ichimoku: &Ichimoku) -> bool {
        self.tenkan_high.span() == ichimoku.tenkan_span
            && self.kijun_high.span() == ichimoku.kijun_span
            && self.senko_high.span() == 2 * ichimoku.span
    }

    fn reset(&mut self) {
        for tracker in [
            &mut self.tenkan_high,
            &mut self.tenkan_low,
            &mut self.kijun_high,
            &mut self.kijun_low,
            &mut self.senko_high,
            &mut self.senko_low,
        ] {
            tracker.reset();
        }
    }
}

/// Ichimoku lines indexed by plot position.
///
/// `tenkan`, `kijun` and `chiko` have one entry per source bar. The senko
/// lines are `forward_shift()` entries longer: their first `forward_shift()`
/// entries are gaps and the last ones lie past the newest bar, so the host
/// has to extend its time axis by that many bars.
#[derive(Debug, Clone, PartialEq)]
pub struct IchimokuResults {
    pub tenkan: Series,
    pub kijun: Series,
    pub senko1: Series,
    pub senko2: Series,
    pub chiko: Series,
    shift: usize,
    trackers: Trackers,
}

impl IchimokuResults {
    fn empty(ichimoku: &Ichimoku) -> Self {
        Self {
            tenkan: Series::new(),
            kijun: Series::new(),
            senko1: Series::new(),
            senko2: Series::new(),
            chiko: Series::new(),
            shift: ichimoku.span - 1,
            trackers: Trackers::new(ichimoku),
        }
    }

    /// Number of bars the senko lines extend past the newest bar, and the
    /// chiko line lags behind it.
    pub fn forward_shift(&self) -> usize {
        self.shift
    }

    /// Source bars whose every line is complete.
    fn computed(&self) -> usize {
        self.tenkan
            .len()
            .min(self.kijun.len())
            .min(self.senko1.len().saturating_sub(self.shift))
            .min(self.senko2.len().saturating_sub(self.shift))
    }
}

impl Results for IchimokuResults {
    fn len(&self) -> usize {
        self.tenkan.len()
    }

    fn truncate_from(&mut self, index: usize) {
        self.tenkan.truncate_from(index);
        self.kijun.truncate_from(index);
        self.senko1.truncate_from(index + self.shift);
        self.senko2.truncate_from(index + self.shift);
        self.chiko.truncate_from(index.saturating_sub(self.shift));
        self.trackers.reset();
    }

    fn remove_first(&mut self, count: usize) {
        self.tenkan.remove_first(count);
        self.kijun.remove_first(count);
        self.senko1.remove_first(count);
        self.senko2.remove_first(count);
        self.chiko.remove_first(count);
        self.trackers.reset();
    }

    fn columns(&self) -> Vec<(String, Series)> {
        vec![
            ("tenkan".to_string(), self.tenkan.clone()),
            ("kijun".to_string(), self.kijun.clone()),
            ("senko1".to_string(), self.senko1.clone()),
            ("senko2".to_string(), self.senko2.clone()),
            ("chiko".to_string(), self.chiko.clone()),
        ]
    }
}

impl Ichimoku {
    pub fn new(span: usize, tenkan_span: usize, kijun_span: usize) -> Result<Self, CalcError> {
        Ok(Self {
            span: check_span("Ichimoku", span)?,
            tenkan_span: check_span("Ichimoku", tenkan_span)?,
            kijun_span: check_span("Ichimoku", kijun_span)?,
        })
    }

    pub fn forward_shift(&self) -> usize {
        self.span - 1
    }

    pub fn calculate(&self, high: &Series, low: &Series, close: &Series) -> Result<IchimokuResults, CalcError> {
        self.update(high, low, close, IchimokuResults::empty(self))
    }

    pub fn update(
        &self,
        high: &Series,
        low: &Series,
        close: &Series,
        existing: IchimokuResults,
    ) -> Result<IchimokuResults, CalcError> {
        crate::error::check_lengths("Ichimoku", &[high.len(), low.len(), close.len()])?;
        Ok(self.extend(high, low, close, existing))
    }

    fn extend(&self, high: &Series, low: &Series, close: &Series, mut existing: IchimokuResults) -> IchimokuResults {
        if existing.shift != self.forward_shift() || !existing.trackers.matches(self) {
            existing = IchimokuResults::empty(self);
        }
        let shift = existing.shift;
        let len = close.len();
        let start = existing.computed().min(len);
        existing.tenkan.truncate_from(start);
        existing.kijun.truncate_from(start);
        existing.senko1.truncate_from(start + shift);
        existing.senko2.truncate_from(start + shift);
        // The newest lagging entries read closes that may have arrived since.
        existing.chiko.truncate_from(start.saturating_sub(shift));

        while existing.senko1.len() < shift {
            existing.senko1.push(None);
        }
        while existing.senko2.len() < shift {
            existing.senko2.push(None);
        }

        let t = &mut existing.trackers;
        for i in start..len {
            let tenkan = map2(t.tenkan_high.at(high, i), t.tenkan_low.at(low, i), midpoint);
            let kijun = map2(t.kijun_high.at(high, i), t.kijun_low.at(low, i), midpoint);
            let senko2 = map2(t.senko_high.at(high, i), t.senko_low.at(low, i), midpoint);
            existing.tenkan.push(tenkan);
            existing.kijun.push(kijun);
            existing.senko1.push(map2(tenkan, kijun, midpoint));
            existing.senko2.push(senko2);
        }

        for j in existing.chiko.len()..len {
            existing.chiko.push(close.get(j + shift));
        }
        existing
    }
}

fn midpoint(a: f64, b: f64) -> f64 {
    (a + b) / 2.0
}

impl Indicator for Ichimoku {
    type Params = IchimokuParams;
    type Output = IchimokuResults;
    const NAME: &'static str = "ichimoku";

    fn from_params(params: &IchimokuParams) -> Result<Self, CalcError> {
        Self::new(params.span, params.tenkan_span, params.kijun_span)
    }

    fn compute(&self, data: &ChartData, existing: Option<IchimokuResults>) -> IchimokuResults {
        let existing = existing.unwrap_or_else(|| IchimokuResults::empty(self));
        self.extend(data.high(), data.low(), data.close(), existing)
    }
}
