//! Decay parameterisations for the exponentially weighted availability estimates.

use crate::error::CitibikeError;

/// How fast older buckets lose weight in an exponentially weighted mean.
///
/// Every variant resolves to a smoothing factor `alpha` in `(0, 1]`:
///
/// * `Alpha(a)`: used as is, `0 < a <= 1`.
/// * `Com(c)`: center of mass, `alpha = 1 / (1 + c)`, `c >= 0`.
/// * `Span(s)`: `alpha = 2 / (s + 1)`, `s >= 1`.
/// * `HalfLife(h)`: `alpha = 1 - exp(ln(0.5) / h)`, `h > 0`, in buckets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decay {
    Alpha(f64),
    Com(f64),
    Span(f64),
    HalfLife(f64),
}

impl Decay {
    /// Resolves the smoothing factor, rejecting out-of-range parameters with
    /// [`CitibikeError::InvalidDecay`].
    pub fn alpha(self) -> Result<f64, CitibikeError> {
        let alpha = match self {
            Decay::Alpha(a) if a > 0.0 && a <= 1.0 => a,
            Decay::Com(c) if c.is_finite() && c >= 0.0 => 1.0 / (1.0 + c),
            Decay::Span(s) if s.is_finite() && s >= 1.0 => 2.0 / (s + 1.0),
            Decay::HalfLife(h) if h.is_finite() && h > 0.0 => 1.0 - (0.5f64.ln() / h).exp(),
            other => return Err(CitibikeError::InvalidDecay(format!("{:?}", other))),
        };
        Ok(alpha)
    }
}
