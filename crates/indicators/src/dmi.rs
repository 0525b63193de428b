use crate::error::{check_lengths, CalcError};
use crate::sma::Sma;
use crate::{Indicator, Results};
use serde::{Deserialize, Serialize};
use tchart_core::{and_then2, map2, map3, ratio, ChartData, Series, EPSILON};

/// Directional Movement Index with ADX and ADXR.
///
/// +DI and -DI are the `average_span` SMAs of +DM and -DM relative to the SMA
/// of the true range, DX is their normalized spread, ADX is SMA(adx_span, DX)
/// and ADXR is SMA(adxr_span, ADX). The first bar has no previous bar and
/// produces gaps throughout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dmi {
    average: Sma,
    adx: Sma,
    adxr: Sma,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmiParams {
    pub average_span: usize,
    pub adx_span: usize,
    pub adxr_span: usize,
}

impl Default for DmiParams {
    fn default() -> Self {
        Self {
            average_span: 14,
            adx_span: 9,
            adxr_span: 9,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DmiResults {
    pub plus_di: Series,
    pub minus_di: Series,
    pub adx: Series,
    pub adxr: Series,
    pub dx: Series,
    pub plus_dm: Series,
    pub minus_dm: Series,
    pub true_range: Series,
    pub avg_plus_dm: Series,
    pub avg_minus_dm: Series,
    pub avg_true_range: Series,
}

impl DmiResults {
    fn all_mut(&mut self) -> [&mut Series; 11] {
        [
            &mut self.plus_di,
            &mut self.minus_di,
            &mut self.adx,
            &mut self.adxr,
            &mut self.dx,
            &mut self.plus_dm,
            &mut self.minus_dm,
            &mut self.true_range,
            &mut self.avg_plus_dm,
            &mut self.avg_minus_dm,
            &mut self.avg_true_range,
        ]
    }

    fn computed(&mut self) -> usize {
        self.all_mut().iter().map(|s| s.len()).min().unwrap_or(0)
    }
}

impl Results for DmiResults {
    fn len(&self) -> usize {
        self.plus_di.len()
    }

    fn truncate_from(&mut self, index: usize) {
        for s in self.all_mut() {
            s.truncate_from(index);
        }
    }

    fn remove_first(&mut self, count: usize) {
        for s in self.all_mut() {
            s.remove_first(count);
        }
    }

    fn columns(&self) -> Vec<(String, Series)> {
        vec![
            ("plus_di".to_string(), self.plus_di.clone()),
            ("minus_di".to_string(), self.minus_di.clone()),
            ("adx".to_string(), self.adx.clone()),
            ("adxr".to_string(), self.adxr.clone()),
        ]
    }
}

/// +DM and -DM of bar `index`. Only the strictly larger move counts; a tie
/// zeroes both.
fn directional_movement(high: &Series, low: &Series, index: usize) -> (Option<f64>, Option<f64>) {
    let Some(prev) = index.checked_sub(1) else {
        return (None, None);
    };
    let up = map2(high.get(index), high.get(prev), |h, ph| h - ph);
    let down = map2(low.get(prev), low.get(index), |pl, l| pl - l);
    let plus = map2(up, down, |u, d| if u > d && u > 0.0 { u } else { 0.0 });
    let minus = map2(up, down, |u, d| if d > u && d > 0.0 { d } else { 0.0 });
    (plus, minus)
}

/// Running averages of non-negative terms, floored at zero.
fn floor(value: f64) -> f64 {
    value.max(0.0)
}

/// Largest of high - low, |high - previous close| and |low - previous close|.
fn true_range(high: &Series, low: &Series, close: &Series, index: usize) -> Option<f64> {
    map3(high.get(index), low.get(index), close.get_back(index, 1), |h, l, prev_close| {
        let hl = h - l;
        let hc = (h - prev_close).abs();
        let lc = (l - prev_close).abs();
        hl.max(hc).max(lc)
    })
}

impl Dmi {
    pub fn new(average_span: usize, adx_span: usize, adxr_span: usize) -> Result<Self, CalcError> {
        Ok(Self {
            average: Sma::new(average_span)?,
            adx: Sma::new(adx_span)?,
            adxr: Sma::new(adxr_span)?,
        })
    }

    pub fn calculate(
        &self,
        high: &Series,
        low: &Series,
        close: &Series,
    ) -> Result<DmiResults, CalcError> {
        self.update(high, low, close, DmiResults::default())
    }

    pub fn update(
        &self,
        high: &Series,
        low: &Series,
        close: &Series,
        existing: DmiResults,
    ) -> Result<DmiResults, CalcError> {
        check_lengths("DMI", &[high.len(), low.len(), close.len()])?;
        Ok(self.extend(high, low, close, existing))
    }

    fn extend(&self, high: &Series, low: &Series, close: &Series, mut existing: DmiResults) -> DmiResults {
        let len = close.len();
        let start = existing.computed().min(len);
        existing.truncate_from(start);

        for i in start..len {
            let (plus, minus) = directional_movement(high, low, i);
            existing.plus_dm.push(plus);
            existing.minus_dm.push(minus);
            existing.true_range.push(true_range(high, low, close, i));
        }

        existing.avg_plus_dm = self
            .average
            .update(&existing.plus_dm, std::mem::take(&mut existing.avg_plus_dm));
        existing.avg_minus_dm = self
            .average
            .update(&existing.minus_dm, std::mem::take(&mut existing.avg_minus_dm));
        existing.avg_true_range = self
            .average
            .update(&existing.true_range, std::mem::take(&mut existing.avg_true_range));

        for i in start..len {
            let tr = existing.avg_true_range.get(i).map(floor);
            let plus_di = and_then2(existing.avg_plus_dm.get(i).map(floor), tr, |dm, tr| {
                ratio(100.0 * dm, tr, EPSILON)
            });
            let minus_di = and_then2(existing.avg_minus_dm.get(i).map(floor), tr, |dm, tr| {
                ratio(100.0 * dm, tr, EPSILON)
            });
            let dx = map2(plus_di, minus_di, |p, m| {
                if p + m <= EPSILON {
                    0.0
                } else {
                    100.0 * (p - m).abs() / (p + m)
                }
            });
            existing.plus_di.push(plus_di);
            existing.minus_di.push(minus_di);
            existing.dx.push(dx);
        }

        existing.adx = self.adx.update(&existing.dx, std::mem::take(&mut existing.adx));
        existing.adxr = self.adxr.update(&existing.adx, std::mem::take(&mut existing.adxr));
        existing
    }
}

impl Indicator for Dmi {
    type Params = DmiParams;
    type Output = DmiResults;
    const NAME: &'static str = "dmi";

    fn from_params(params: &DmiParams) -> Result<Self, CalcError> {
        Self::new(params.average_span, params.adx_span, params.adxr_span)
    }

    fn compute(&self, data: &ChartData, existing: Option<DmiResults>) -> DmiResults {
        self.extend(data.high(), data.low(), data.close(), existing.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::assert_close;

    #[test]
    fn test_directional_movement_tie_zeroes_both() {
        let high = Series::from(vec![10.0, 12.0, 13.0]);
        let low = Series::from(vec![8.0, 6.0, 7.0]);
        assert_eq!(directional_movement(&high, &low, 0), (None, None));
        // up 2, down 2
        assert_eq!(directional_movement(&high, &low, 1), (Some(0.0), Some(0.0)));
        // up 1, down -1
        assert_eq!(directional_movement(&high, &low, 2), (Some(1.0), Some(0.0)));
    }

    #[test]
    fn test_true_range_uses_previous_close() {
        let high = Series::from(vec![10.0, 11.0]);
        let low = Series::from(vec![9.0, 10.5]);
        let close = Series::from(vec![9.5, 11.0]);
        assert_eq!(true_range(&high, &low, &close, 0), None);
        assert_eq!(true_range(&high, &low, &close, 1), Some(1.5));
    }

    #[test]
    fn test_dmi_uptrend() {
        let dmi = Dmi::new(2, 2, 2).unwrap();
        let high = Series::from(vec![10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
        let low = Series::from(vec![9.0, 10.0, 11.0, 12.0, 13.0, 14.0]);
        let close = Series::from(vec![9.5, 10.5, 11.5, 12.5, 13.5, 14.5]);
        let out = dmi.calculate(&high, &low, &close).unwrap();

        assert_eq!(out.plus_di.get(1), None);
        // +DM 1, TR 1.5 each bar
        assert_close(out.plus_di.get(2), 100.0 / 1.5);
        assert_close(out.minus_di.get(2), 0.0);
        assert_close(out.dx.get(2), 100.0);
        assert_eq!(out.adx.get(2), None);
        assert_close(out.adx.get(3), 100.0);
        assert_close(out.adxr.get(4), 100.0);
    }

    #[test]
    fn test_dmi_flat_market_is_gap() {
        let dmi = Dmi::new(2, 2, 2).unwrap();
        let flat = Series::from(vec![5.0; 5]);
        let out = dmi.calculate(&flat, &flat, &flat).unwrap();
        assert_eq!(out.plus_di.get(4), None);
        assert_eq!(out.adx.get(4), None);
    }
}
