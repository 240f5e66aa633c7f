use num_complex::Complex64;
use serde::Serialize;

use crate::error::{PatternError, Result};
use crate::units::{amplitude_to_db, db_to_amplitude};

/// Summary of one reflection measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SParameter {
    pub magnitude_linear: f64,
    pub magnitude_db: f64,
    pub phase_deg: f64,
    pub gamma: Complex64,
    pub gamma_magnitude: f64,
    /// Mismatch loss, infinite for total reflection.
    pub mismatch_loss_db: f64,
    pub return_loss_db: f64,
    pub vswr: f64,
}

fn positive(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(PatternError::param(name, value, "must be finite and > 0"))
    }
}

fn reflection(name: &'static str, gamma: f64, allow_zero: bool) -> Result<f64> {
    let lower_ok = if allow_zero { gamma >= 0.0 } else { gamma > 0.0 };
    if gamma.is_finite() && lower_ok && gamma < 1.0 {
        Ok(gamma)
    } else if allow_zero {
        Err(PatternError::param(name, gamma, "must lie in [0, 1)"))
    } else {
        Err(PatternError::param(name, gamma, "must lie in (0, 1)"))
    }
}

pub fn magnitude_to_db(magnitude: f64) -> Result<f64> {
    Ok(20.0 * positive("|S|", magnitude)?.log10())
}

pub fn gamma_from_vswr(vswr: f64) -> Result<f64> {
    let vswr = positive("VSWR", vswr)?;
    if vswr < 1.0 {
        return Err(PatternError::param("VSWR", vswr, "must be >= 1"));
    }
    Ok((vswr - 1.0) / (vswr + 1.0))
}

pub fn vswr_from_gamma(gamma: f64) -> Result<f64> {
    let g = reflection("|Gamma|", gamma, true)?;
    Ok((1.0 + g) / (1.0 - g))
}

pub fn return_loss_from_gamma(gamma: f64) -> Result<f64> {
    let g = reflection("|Gamma|", gamma, false)?;
    Ok(-20.0 * g.log10())
}

pub fn gamma_from_return_loss(return_loss_db: f64) -> Result<f64> {
    let rl = positive("return loss (dB)", return_loss_db)?;
    Ok(db_to_amplitude(-rl))
}

pub fn vswr_from_return_loss(return_loss_db: f64) -> Result<f64> {
    vswr_from_gamma(gamma_from_return_loss(return_loss_db)?)
}

pub fn return_loss_from_vswr(vswr: f64) -> Result<f64> {
    return_loss_from_gamma(gamma_from_vswr(vswr)?)
}

/// Power lost to reflection, `-10 log10(1 - |Gamma|^2)`.
pub fn mismatch_loss_db(gamma: f64) -> Result<f64> {
    let g = reflection("|Gamma|", gamma, true)?;
    Ok(-10.0 * (1.0 - g * g).log10())
}

pub fn from_linear_phase(magnitude_linear: f64, phase_deg: f64) -> Result<SParameter> {
    let magnitude_linear = positive("|S|", magnitude_linear)?;
    if !phase_deg.is_finite() {
        return Err(PatternError::param("phase (deg)", phase_deg, "must be finite"));
    }
    let gamma = Complex64::from_polar(magnitude_linear, phase_deg.to_radians());
    let gamma_magnitude = gamma.norm();

    // |Gamma| >= 1 is a passive-network impossibility but still reported
    let (vswr, return_loss_db, mismatch_loss_db) = if gamma_magnitude >= 1.0 {
        (f64::INFINITY, 0.0, f64::INFINITY)
    } else {
        (
            vswr_from_gamma(gamma_magnitude)?,
            return_loss_from_gamma(gamma_magnitude)?,
            mismatch_loss_db(gamma_magnitude)?,
        )
    };

    Ok(SParameter {
        magnitude_linear,
        magnitude_db: amplitude_to_db(magnitude_linear),
        phase_deg,
        gamma,
        gamma_magnitude,
        mismatch_loss_db,
        return_loss_db,
        vswr,
    })
}

pub fn from_db_phase(magnitude_db: f64, phase_deg: f64) -> Result<SParameter> {
    from_linear_phase(db_to_amplitude(magnitude_db), phase_deg)
}

/// A perfect match (VSWR 1) has no reflection to describe and is rejected.
pub fn from_vswr(vswr: f64, phase_deg: f64) -> Result<SParameter> {
    from_linear_phase(gamma_from_vswr(vswr)?, phase_deg)
}

/// Wraps a phase into [-180, 180).
pub fn normalized_phase(angle_deg: f64) -> f64 {
    (angle_deg + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_half_reflection() {
        let s = from_linear_phase(0.5, -45.0).unwrap();
        assert_relative_eq!(s.return_loss_db, 6.0206, epsilon = 1e-4);
        assert_relative_eq!(s.vswr, 3.0, epsilon = 1e-12);
        assert_relative_eq!(s.magnitude_db, -6.0206, epsilon = 1e-4);
        assert_relative_eq!(s.mismatch_loss_db, 1.2494, epsilon = 1e-4);
        assert_relative_eq!(s.gamma.arg().to_degrees(), -45.0, epsilon = 1e-9);
    }

    #[test]
    fn test_vswr_conversions() {
        assert_relative_eq!(gamma_from_vswr(1.2).unwrap(), 0.090909, epsilon = 1e-6);
        assert_relative_eq!(return_loss_from_vswr(1.2).unwrap(), 20.8278, epsilon = 1e-4);
        assert_relative_eq!(vswr_from_return_loss(20.8278).unwrap(), 1.2, epsilon = 1e-4);
        assert!(gamma_from_vswr(0.8).is_err());
        assert!(from_vswr(1.0, 0.0).is_err());
    }

    #[test]
    fn test_db_magnitude() {
        let s = from_db_phase(-3.0, 10.0).unwrap();
        assert_relative_eq!(s.magnitude_linear, 0.7079457, epsilon = 1e-7);
        assert!(magnitude_to_db(0.0).is_err());
    }

    #[test]
    fn test_total_reflection_is_reported() {
        let s = from_linear_phase(1.0, 0.0).unwrap();
        assert!(s.vswr.is_infinite());
        assert_eq!(s.return_loss_db, 0.0);
    }

    #[test]
    fn test_gamma_domain() {
        assert!(vswr_from_gamma(1.0).is_err());
        assert_eq!(vswr_from_gamma(0.0).unwrap(), 1.0);
        assert!(return_loss_from_gamma(0.0).is_err());
        assert_eq!(mismatch_loss_db(0.0).unwrap(), 0.0);
    }

    #[test]
    fn test_normalized_phase() {
        assert_eq!(normalized_phase(180.0), -180.0);
        assert_eq!(normalized_phase(-180.0), -180.0);
        assert_eq!(normalized_phase(190.0), -170.0);
        assert_eq!(normalized_phase(-540.0), -180.0);
        assert_eq!(normalized_phase(45.0), 45.0);
    }
}
