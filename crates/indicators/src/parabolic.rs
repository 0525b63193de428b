use crate::error::{check_lengths, check_rate, CalcError};
use crate::{Indicator, Results};
use serde::{Deserialize, Serialize};
use tchart_core::{ChartData, Series};

/// Parabolic SAR (Stop and Reverse).
///
/// A run of valid bars is seeded on its second bar: the trend is rising when
/// the close did not fall, the SAR starts at the lower low (higher high when
/// falling) of the two bars and the extreme point at the higher high (lower
/// low). Each further bar moves the SAR by `af * (ep - sar)`, never past the
/// lows (highs) of the previous two bars. A new extreme raises `af` by
/// `acceleration` up to `max_acceleration`; a bar crossing the SAR flips
/// the trend, the SAR jumps to the old extreme point and `af` resets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParabolicSar {
    acceleration: f64,
    max_acceleration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParabolicParams {
    pub acceleration: f64,
    pub max_acceleration: f64,
}

impl Default for ParabolicParams {
    fn default() -> Self {
        Self {
            acceleration: 0.02,
            max_acceleration: 0.2,
        }
    }
}

/// Recurrence state after one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SarState {
    pub rising: bool,
    pub sar: f64,
    pub ep: f64,
    pub af: f64,
}

/// SAR values split by trend, plus the state behind each bar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParabolicResults {
    pub rising: Series,
    pub falling: Series,
    states: Vec<Option<SarState>>,
}

impl ParabolicResults {
    pub fn state(&self, index: usize) -> Option<SarState> {
        self.states.get(index).copied().flatten()
    }

    fn push(&mut self, state: Option<SarState>) {
        self.rising.push(state.filter(|s| s.rising).map(|s| s.sar));
        self.falling.push(state.filter(|s| !s.rising).map(|s| s.sar));
        self.states.push(state);
    }
}

impl Results for ParabolicResults {
    fn len(&self) -> usize {
        self.states.len()
    }

    fn truncate_from(&mut self, index: usize) {
        self.rising.truncate_from(index);
        self.falling.truncate_from(index);
        self.states.truncate(index);
    }

    fn remove_first(&mut self, count: usize) {
        self.rising.remove_first(count);
        self.falling.remove_first(count);
        self.states.drain(..count.min(self.states.len()));
    }

    fn columns(&self) -> Vec<(String, Series)> {
        vec![
            ("rising".to_string(), self.rising.clone()),
            ("falling".to_string(), self.falling.clone()),
        ]
    }
}

struct Bars<'a> {
    high: &'a Series,
    low: &'a Series,
    close: &'a Series,
}

impl Bars<'_> {
    fn valid(&self, index: usize) -> bool {
        self.high.get(index).is_some() && self.low.get(index).is_some() && self.close.get(index).is_some()
    }
}

impl ParabolicSar {
    pub fn new(acceleration: f64, max_acceleration: f64) -> Result<Self, CalcError> {
        let acceleration = check_rate("Parabolic", "acceleration", acceleration, false)?;
        let max_acceleration = check_rate("Parabolic", "max_acceleration", max_acceleration, false)?;
        if max_acceleration < acceleration {
            return Err(CalcError::invalid_parameter(
                "Parabolic",
                "max_acceleration",
                max_acceleration,
            ));
        }
        Ok(Self {
            acceleration,
            max_acceleration,
        })
    }

    pub fn calculate(&self, high: &Series, low: &Series, close: &Series) -> Result<ParabolicResults, CalcError> {
        self.update(high, low, close, ParabolicResults::default())
    }

    pub fn update(
        &self,
        high: &Series,
        low: &Series,
        close: &Series,
        existing: ParabolicResults,
    ) -> Result<ParabolicResults, CalcError> {
        check_lengths("Parabolic", &[high.len(), low.len(), close.len()])?;
        Ok(self.extend(&Bars { high, low, close }, existing))
    }

    fn extend(&self, bars: &Bars<'_>, mut existing: ParabolicResults) -> ParabolicResults {
        let len = bars.close.len();
        let start = existing
            .states
            .len()
            .min(existing.rising.len())
            .min(existing.falling.len())
            .min(len);
        existing.truncate_from(start);

        for i in start..len {
            let state = if !bars.valid(i) {
                None
            } else {
                match i.checked_sub(1) {
                    Some(prev) if bars.valid(prev) => match existing.state(prev) {
                        Some(last) => Some(self.step(bars, i, last)),
                        None => self.seed(bars, i),
                    },
                    _ => None,
                }
            };
            existing.push(state);
        }
        existing
    }

    fn seed(&self, bars: &Bars<'_>, i: usize) -> Option<SarState> {
        let (h0, l0, c0) = (bars.high.get(i - 1)?, bars.low.get(i - 1)?, bars.close.get(i - 1)?);
        let (h1, l1, c1) = (bars.high.get(i)?, bars.low.get(i)?, bars.close.get(i)?);
        let rising = c1 >= c0;
        Some(SarState {
            rising,
            sar: if rising { l0.min(l1) } else { h0.max(h1) },
            ep: if rising { h0.max(h1) } else { l0.min(l1) },
            af: self.acceleration,
        })
    }

    fn step(&self, bars: &Bars<'_>, i: usize, last: SarState) -> SarState {
        let (high, low) = match (bars.high.get(i), bars.low.get(i)) {
            (Some(h), Some(l)) => (h, l),
            _ => return last,
        };
        let mut sar = last.sar + last.af * (last.ep - last.sar);

        // The SAR may not move into the range of the previous two bars.
        let prior = [i.checked_sub(1), i.checked_sub(2)];
        for j in prior.into_iter().flatten() {
            if last.rising {
                if let Some(l) = bars.low.get(j) {
                    sar = sar.min(l);
                }
            } else if let Some(h) = bars.high.get(j) {
                sar = sar.max(h);
            }
        }

        if last.rising && low < sar {
            return SarState {
                rising: false,
                sar: last.ep,
                ep: low,
                af: self.acceleration,
            };
        }
        if !last.rising && high > sar {
            return SarState {
                rising: true,
                sar: last.ep,
                ep: high,
                af: self.acceleration,
            };
        }

        let (ep, extended) = if last.rising {
            (last.ep.max(high), high > last.ep)
        } else {
            (last.ep.min(low), low < last.ep)
        };
        let af = if extended {
            (last.af + self.acceleration).min(self.max_acceleration)
        } else {
            last.af
        };
        SarState {
            rising: last.rising,
            sar,
            ep,
            af,
        }
    }
}

impl Indicator for ParabolicSar {
    type Params = ParabolicParams;
    type Output = ParabolicResults;
    const NAME: &'static str = "parabolic";

    fn from_params(params: &ParabolicParams) -> Result<Self, CalcError> {
        Self::new(params.acceleration, params.max_acceleration)
    }

    fn compute(&self, data: &ChartData, existing: Option<ParabolicResults>) -> ParabolicResults {
        let bars = Bars {
            high: data.high(),
            low: data.low(),
            close: data.close(),
        };
        self.extend(&bars, existing.unwrap_or_default())
    }
}
