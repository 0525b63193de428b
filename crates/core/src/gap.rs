//! Gap-aware arithmetic.
//!
//! A sample is `Option<f64>`: `None` is a gap ("no data" or "not enough
//! history"), never zero. The helpers below let calculators combine samples
//! without spelling out the gap checks at every call site.

/// One value of a [`Series`](crate::Series). `None` is a gap.
pub type Sample = Option<f64>;

/// Denominators whose magnitude is at or below this limit yield a gap.
pub const EPSILON: f64 = 0.000001;

/// Converts a raw float into a sample, mapping NaN and infinities to a gap.
#[inline]
pub fn valid(value: f64) -> Sample {
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

/// Combines two samples, propagating a gap from either operand.
#[inline]
pub fn map2(a: Sample, b: Sample, f: impl FnOnce(f64, f64) -> f64) -> Sample {
    Some(f(a?, b?))
}

/// Combines three samples, propagating a gap from any operand.
#[inline]
pub fn map3(a: Sample, b: Sample, c: Sample, f: impl FnOnce(f64, f64, f64) -> f64) -> Sample {
    Some(f(a?, b?, c?))
}

/// Like [`map2`], for combinators that may themselves produce a gap.
#[inline]
pub fn and_then2(a: Sample, b: Sample, f: impl FnOnce(f64, f64) -> Sample) -> Sample {
    f(a?, b?)
}

/// `numerator / denominator`, or a gap when the denominator is within
/// `eps` of zero.
#[inline]
pub fn ratio(numerator: f64, denominator: f64, eps: f64) -> Sample {
    if denominator.abs() <= eps {
        None
    } else {
        Some(numerator / denominator)
    }
}

/// Collects the samples into plain values, or returns `None` if any of them
/// is a gap.
pub fn propagate_gap<I>(samples: I) -> Option<Vec<f64>>
where
    I: IntoIterator<Item = Sample>,
{
    samples.into_iter().collect()
}
