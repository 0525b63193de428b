use crate::error::{check_lengths, check_rate, CalcError};
use crate::sma::Sma;
use crate::{Indicator, Results};
use serde::{Deserialize, Serialize};
use tchart_core::{ChartData, PriceSource, Series};

/// Moving-average envelope.
///
/// The center line is SMA(span) of `source`. Upper lines scale the SMA of
/// the highs by each upper rate and lower lines scale the SMA of the lows by
/// each lower rate, so the band follows the bar range rather than the close.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    sma: Sma,
    upper_rates: Vec<f64>,
    lower_rates: Vec<f64>,
    source: PriceSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeParams {
    pub span: usize,
    pub upper_rates: Vec<f64>,
    pub lower_rates: Vec<f64>,
    pub source: PriceSource,
}

impl Default for EnvelopeParams {
    fn default() -> Self {
        Self {
            span: 25,
            upper_rates: vec![1.005, 1.01],
            lower_rates: vec![0.995, 0.99],
            source: PriceSource::Close,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvelopeResults {
    pub sma: Series,
    pub upper: Vec<Series>,
    pub lower: Vec<Series>,
    high_sma: Series,
    low_sma: Series,
    upper_rates: Vec<f64>,
    lower_rates: Vec<f64>,
}

impl EnvelopeResults {
    fn empty(envelope: &Envelope) -> Self {
        Self {
            upper: vec![Series::new(); envelope.upper_rates.len()],
            lower: vec![Series::new(); envelope.lower_rates.len()],
            upper_rates: envelope.upper_rates.clone(),
            lower_rates: envelope.lower_rates.clone(),
            ..Self::default()
        }
    }

    fn lines_mut(&mut self) -> impl Iterator<Item = &mut Series> {
        [&mut self.sma, &mut self.high_sma, &mut self.low_sma]
            .into_iter()
            .chain(self.upper.iter_mut())
            .chain(self.lower.iter_mut())
    }

    fn computed(&self) -> usize {
        [&self.sma, &self.high_sma, &self.low_sma]
            .into_iter()
            .chain(&self.upper)
            .chain(&self.lower)
            .map(Series::len)
            .min()
            .unwrap_or(0)
    }
}

impl Results for EnvelopeResults {
    fn len(&self) -> usize {
        self.sma.len()
    }

    fn truncate_from(&mut self, index: usize) {
        for line in self.lines_mut() {
            line.truncate_from(index);
        }
    }

    fn remove_first(&mut self, count: usize) {
        for line in self.lines_mut() {
            line.remove_first(count);
        }
    }

    fn columns(&self) -> Vec<(String, Series)> {
        let mut columns = vec![("sma".to_string(), self.sma.clone())];
        for (rate, line) in self.upper_rates.iter().zip(&self.upper) {
            columns.push((format!("upper_{rate}"), line.clone()));
        }
        for (rate, line) in self.lower_rates.iter().zip(&self.lower) {
            columns.push((format!("lower_{rate}"), line.clone()));
        }
        columns
    }
}

impl Envelope {
    pub fn new(span: usize, upper_rates: Vec<f64>, lower_rates: Vec<f64>) -> Result<Self, CalcError> {
        for &rate in upper_rates.iter().chain(&lower_rates) {
            check_rate("Envelope", "rate", rate, false)?;
        }
        Ok(Self {
            sma: Sma::new(span)?,
            upper_rates,
            lower_rates,
            source: PriceSource::Close,
        })
    }

    pub fn with_source(mut self, source: PriceSource) -> Self {
        self.source = source;
        self
    }

    pub fn calculate(&self, src: &Series, high: &Series, low: &Series) -> Result<EnvelopeResults, CalcError> {
        self.update(src, high, low, EnvelopeResults::empty(self))
    }

    pub fn update(
        &self,
        src: &Series,
        high: &Series,
        low: &Series,
        existing: EnvelopeResults,
    ) -> Result<EnvelopeResults, CalcError> {
        check_lengths("Envelope", &[src.len(), high.len(), low.len()])?;
        Ok(self.extend(src, high, low, existing))
    }

    fn extend(&self, src: &Series, high: &Series, low: &Series, mut existing: EnvelopeResults) -> EnvelopeResults {
        if existing.upper_rates != self.upper_rates || existing.lower_rates != self.lower_rates {
            existing = EnvelopeResults::empty(self);
        }
        let start = existing.computed().min(src.len());
        existing.truncate_from(start);

        existing.sma = self.sma.update(src, std::mem::take(&mut existing.sma));
        existing.high_sma = self.sma.update(high, std::mem::take(&mut existing.high_sma));
        existing.low_sma = self.sma.update(low, std::mem::take(&mut existing.low_sma));

        for i in start..src.len() {
            let (top, bottom) = (existing.high_sma.get(i), existing.low_sma.get(i));
            for (line, rate) in existing.upper.iter_mut().zip(&self.upper_rates) {
                line.push(top.map(|m| m * rate));
            }
            for (line, rate) in existing.lower.iter_mut().zip(&self.lower_rates) {
                line.push(bottom.map(|m| m * rate));
            }
        }
        existing
    }
}

impl Indicator for Envelope {
    type Params = EnvelopeParams;
    type Output = EnvelopeResults;
    const NAME: &'static str = "envelope";

    fn from_params(params: &EnvelopeParams) -> Result<Self, CalcError> {
        Ok(Self::new(params.span, params.upper_rates.clone(), params.lower_rates.clone())?
            .with_source(params.source))
    }

    fn compute(&self, data: &ChartData, existing: Option<EnvelopeResults>) -> EnvelopeResults {
        let existing = existing.unwrap_or_else(|| EnvelopeResults::empty(self));
        self.extend(data.source(self.source), data.high(), data.low(), existing)
    }
}
