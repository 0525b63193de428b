use crate::error::{check_rate, CalcError};
use crate::sma::Sma;
use crate::std_dev::population_std;
use crate::{Indicator, Results};
use serde::{Deserialize, Serialize};
use tchart_core::{map2, ChartData, PriceSource, Series};

/// Bollinger Bands.
///
/// The center line is SMA(span); for each sigma rate `k` there is a band pair
/// `center ± k·σ`, where σ is the population standard deviation of the same
/// window. σ is evaluated from the window at every index rather than carried
/// as a running variance.
#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    sma: Sma,
    sigma_rates: Vec<f64>,
    source: PriceSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BollingerParams {
    pub span: usize,
    pub sigma_rates: Vec<f64>,
    pub source: PriceSource,
}

impl Default for BollingerParams {
    fn default() -> Self {
        Self {
            span: 20,
            sigma_rates: vec![1.0, 2.0, 3.0],
            source: PriceSource::Close,
        }
    }
}

/// Center line plus one upper and one lower band per sigma rate, in rate order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BollingerResults {
    pub center: Series,
    pub upper: Vec<Series>,
    pub lower: Vec<Series>,
    rates: Vec<f64>,
}

impl BollingerResults {
    fn empty(rates: &[f64]) -> Self {
        Self {
            center: Series::new(),
            upper: vec![Series::new(); rates.len()],
            lower: vec![Series::new(); rates.len()],
            rates: rates.to_vec(),
        }
    }
}

impl Results for BollingerResults {
    fn len(&self) -> usize {
        self.center.len()
    }

    fn truncate_from(&mut self, index: usize) {
        self.center.truncate_from(index);
        for band in self.upper.iter_mut().chain(self.lower.iter_mut()) {
            band.truncate_from(index);
        }
    }

    fn remove_first(&mut self, count: usize) {
        self.center.remove_first(count);
        for band in self.upper.iter_mut().chain(self.lower.iter_mut()) {
            band.remove_first(count);
        }
    }

    fn columns(&self) -> Vec<(String, Series)> {
        let mut columns = vec![("center".to_string(), self.center.clone())];
        for (i, rate) in self.rates.iter().enumerate() {
            columns.push((format!("upper_{rate}"), self.upper[i].clone()));
            columns.push((format!("lower_{rate}"), self.lower[i].clone()));
        }
        columns
    }
}

impl BollingerBands {
    pub fn new(span: usize, sigma_rates: Vec<f64>) -> Result<Self, CalcError> {
        for &rate in &sigma_rates {
            check_rate("Bollinger", "sigma_rate", rate, false)?;
        }
        Ok(Self {
            sma: Sma::new(span)?,
            sigma_rates,
            source: PriceSource::Close,
        })
    }

    pub fn with_source(mut self, source: PriceSource) -> Self {
        self.source = source;
        self
    }

    pub fn calculate(&self, src: &Series) -> BollingerResults {
        self.update(src, BollingerResults::empty(&self.sigma_rates))
    }

    pub fn update(&self, src: &Series, mut existing: BollingerResults) -> BollingerResults {
        if existing.rates != self.sigma_rates {
            existing = BollingerResults::empty(&self.sigma_rates);
        }
        existing.truncate_from(src.len());
        let start = existing.len();
        for band in existing.upper.iter_mut().chain(existing.lower.iter_mut()) {
            band.truncate_from(start);
        }

        let center = std::mem::take(&mut existing.center);
        existing.center = self.sma.update(src, center);

        let span = self.sma.span();
        for i in start..src.len() {
            let mid = existing.center.get(i);
            let sigma = mid.and_then(|mean| population_std(src, i, span, mean));
            for (k, rate) in self.sigma_rates.iter().enumerate() {
                existing.upper[k].push(map2(mid, sigma, |m, s| m + rate * s));
                existing.lower[k].push(map2(mid, sigma, |m, s| m - rate * s));
            }
        }
        existing
    }
}

impl Indicator for BollingerBands {
    type Params = BollingerParams;
    type Output = BollingerResults;
    const NAME: &'static str = "bollinger";

    fn from_params(params: &BollingerParams) -> Result<Self, CalcError> {
        Ok(Self::new(params.span, params.sigma_rates.clone())?.with_source(params.source))
    }

    fn compute(&self, data: &ChartData, existing: Option<BollingerResults>) -> BollingerResults {
        let existing = existing.unwrap_or_else(|| BollingerResults::empty(&self.sigma_rates));
        self.update(data.source(self.source), existing)
    }
}
