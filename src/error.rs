use thiserror::Error;

use crate::pattern::CutType;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatternError {
    #[error("{context}: need at least {needed} distinct samples, found {found}")]
    InsufficientSamples {
        context: &'static str,
        needed: usize,
        found: usize,
    },
    #[error("invalid array geometry: {parameter} {reason}")]
    InvalidGeometry {
        parameter: &'static str,
        reason: String,
    },
    #[error("invalid frequency or wavelength: {value} (must be finite and > 0)")]
    InvalidFrequency { value: f64 },
    #[error("expected a {expected:?} cut, got {found:?}")]
    CutMismatch { expected: CutType, found: CutType },
    #[error("no -3 dB crossing found on the {side} side of the main lobe")]
    NoCrossingFound { side: &'static str },
    #[error("attenuation curve has no points")]
    EmptyCurve,
    #[error("attenuation curve has a single point at {frequency_mhz} MHz")]
    SinglePointCurve { frequency_mhz: f64 },
    #[error("invalid {name}: {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, PatternError>;

impl PatternError {
    pub(crate) fn param(name: &'static str, value: f64, reason: &'static str) -> Self {
        PatternError::InvalidParameter {
            name,
            value,
            reason,
        }
    }
}

/// Rejects NaN and infinities for a named scalar input.
pub(crate) fn ensure_finite(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PatternError::param(name, value, "must be finite"))
    }
}
