use crate::ema::Ema;
use crate::error::CalcError;
use crate::sma::Sma;
use crate::{Indicator, Results};
use serde::{Deserialize, Serialize};
use tchart_core::{map2, ChartData, PriceSource, Series};

/// How the MACD signal line smooths the MACD line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    #[default]
    Ema,
    Sma,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SignalLine {
    Ema(Ema),
    Sma(Sma),
}

impl SignalLine {
    fn update(&self, src: &Series, existing: Series) -> Series {
        match self {
            SignalLine::Ema(ema) => ema.update(src, existing),
            SignalLine::Sma(sma) => sma.update(src, existing),
        }
    }
}

/// MACD (Moving Average Convergence Divergence).
///
/// - MACD line = EMA(short) - EMA(long)
/// - Signal = EMA or SMA of the MACD line over `signal_span`
/// - Oscillator = MACD - signal
#[derive(Debug, Clone, PartialEq)]
pub struct Macd {
    short: Ema,
    long: Ema,
    signal: SignalLine,
    source: PriceSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacdParams {
    pub short_span: usize,
    pub long_span: usize,
    pub signal_span: usize,
    pub signal_type: SignalType,
    pub source: PriceSource,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            short_span: 12,
            long_span: 26,
            signal_span: 9,
            signal_type: SignalType::Ema,
            source: PriceSource::Close,
        }
    }
}

/// The plotted lines plus both base EMAs, kept so later updates extend them
/// instead of recomputing from the start.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacdResults {
    pub macd: Series,
    pub signal: Series,
    pub oscillator: Series,
    pub short_ema: Series,
    pub long_ema: Series,
}

impl Results for MacdResults {
    fn len(&self) -> usize {
        self.macd.len()
    }

    fn truncate_from(&mut self, index: usize) {
        self.macd.truncate_from(index);
        self.signal.truncate_from(index);
        self.oscillator.truncate_from(index);
        self.short_ema.truncate_from(index);
        self.long_ema.truncate_from(index);
    }

    fn remove_first(&mut self, count: usize) {
        self.macd.remove_first(count);
        self.signal.remove_first(count);
        self.oscillator.remove_first(count);
        self.short_ema.remove_first(count);
        self.long_ema.remove_first(count);
    }

    fn columns(&self) -> Vec<(String, Series)> {
        vec![
            ("macd".to_string(), self.macd.clone()),
            ("signal".to_string(), self.signal.clone()),
            ("oscillator".to_string(), self.oscillator.clone()),
        ]
    }
}

impl Macd {
    pub fn new(
        short_span: usize,
        long_span: usize,
        signal_span: usize,
        signal_type: SignalType,
    ) -> Result<Self, CalcError> {
        let signal = match signal_type {
            SignalType::Ema => SignalLine::Ema(Ema::new(signal_span)?),
            SignalType::Sma => SignalLine::Sma(Sma::new(signal_span)?),
        };
        Ok(Self {
            short: Ema::new(short_span)?,
            long: Ema::new(long_span)?,
            signal,
            source: PriceSource::Close,
        })
    }

    pub fn with_source(mut self, source: PriceSource) -> Self {
        self.source = source;
        self
    }

    pub fn calculate(&self, src: &Series) -> MacdResults {
        self.update(src, MacdResults::default())
    }

    /// Updates the base EMAs, then the MACD line, the signal and finally
    /// the oscillator for the indices that were not computed yet.
    pub fn update(&self, src: &Series, mut existing: MacdResults) -> MacdResults {
        existing.truncate_from(src.len());
        let start = existing
            .macd
            .len()
            .min(existing.short_ema.len())
            .min(existing.long_ema.len());
        existing.truncate_from(start);
        let start = start.min(existing.signal.len()).min(existing.oscillator.len());
        existing.truncate_from(start);

        existing.short_ema = self.short.update(src, std::mem::take(&mut existing.short_ema));
        existing.long_ema = self.long.update(src, std::mem::take(&mut existing.long_ema));

        for i in start..src.len() {
            let line = map2(existing.short_ema.get(i), existing.long_ema.get(i), |s, l| s - l);
            existing.macd.push(line);
        }

        existing.signal = self
            .signal
            .update(&existing.macd, std::mem::take(&mut existing.signal));

        for i in start..src.len() {
            let osc = map2(existing.macd.get(i), existing.signal.get(i), |m, s| m - s);
            existing.oscillator.push(osc);
        }
        existing
    }
}

impl Indicator for Macd {
    type Params = MacdParams;
    type Output = MacdResults;
    const NAME: &'static str = "macd";

    fn from_params(params: &MacdParams) -> Result<Self, CalcError> {
        Ok(Self::new(
            params.short_span,
            params.long_span,
            params.signal_span,
            params.signal_type,
        )?
        .with_source(params.source))
    }

    fn compute(&self, data: &ChartData, existing: Option<MacdResults>) -> MacdResults {
        self.update(data.source(self.source), existing.unwrap_or_default())
    }
}
