/// Contract violations detected when a calculator is built or called.
///
/// Missing history and zero denominators are not errors; they surface as
/// gaps in the output series.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalcError {
    #[error("{indicator} span must be > 0, got {span}")]
    InvalidSpan { indicator: &'static str, span: usize },
    #[error("{indicator}: invalid {name} = {value}")]
    InvalidParameter {
        indicator: &'static str,
        name: &'static str,
        value: f64,
    },
    #[error("{indicator}: input series have different lengths ({expected} vs {actual})")]
    LengthMismatch {
        indicator: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl CalcError {
    pub fn invalid_span(indicator: &'static str, span: usize) -> Self {
        Self::InvalidSpan { indicator, span }
    }

    pub fn invalid_parameter(indicator: &'static str, name: &'static str, value: f64) -> Self {
        Self::InvalidParameter {
            indicator,
            name,
            value,
        }
    }
}

/// Rejects a zero span.
pub(crate) fn check_span(indicator: &'static str, span: usize) -> Result<usize, CalcError> {
    if span == 0 {
        Err(CalcError::invalid_span(indicator, span))
    } else {
        Ok(span)
    }
}

/// Rejects NaN, infinite and (unless `allow_zero`) non-positive rates.
pub(crate) fn check_rate(
    indicator: &'static str,
    name: &'static str,
    value: f64,
    allow_zero: bool,
) -> Result<f64, CalcError> {
    let ok = value.is_finite() && (value > 0.0 || (allow_zero && value == 0.0));
    if ok {
        Ok(value)
    } else {
        Err(CalcError::invalid_parameter(indicator, name, value))
    }
}

/// Ensures every input series has the same length as the first.
pub(crate) fn check_lengths(
    indicator: &'static str,
    lengths: &[usize],
) -> Result<usize, CalcError> {
    let expected = lengths.first().copied().unwrap_or(0);
    match lengths.iter().find(|&&len| len != expected) {
        Some(&actual) => Err(CalcError::LengthMismatch {
            indicator,
            expected,
            actual,
        }),
        None => Ok(expected),
    }
}
