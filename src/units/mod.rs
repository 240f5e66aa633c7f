use serde::{Deserialize, Serialize};

use crate::error::{PatternError, Result};

pub const C_LIGHT: f64 = 299_792_458.0;

/// Floor applied to every linear quantity before a logarithm.
pub const EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyUnit {
    Hz,
    #[serde(alias = "KHz")]
    Khz,
    #[default]
    #[serde(alias = "MHz")]
    Mhz,
    #[serde(alias = "GHz")]
    Ghz,
}

impl FrequencyUnit {
    pub fn multiplier(self) -> f64 {
        match self {
            FrequencyUnit::Hz => 1.0,
            FrequencyUnit::Khz => 1e3,
            FrequencyUnit::Mhz => 1e6,
            FrequencyUnit::Ghz => 1e9,
        }
    }

    pub fn to_hz(self, value: f64) -> f64 {
        value * self.multiplier()
    }

    pub fn to_mhz(self, value: f64) -> f64 {
        self.to_hz(value) / 1e6
    }
}

pub fn checked_frequency_mhz(frequency_mhz: f64) -> Result<f64> {
    if frequency_mhz.is_finite() && frequency_mhz > 0.0 {
        Ok(frequency_mhz)
    } else {
        Err(PatternError::InvalidFrequency {
            value: frequency_mhz,
        })
    }
}

pub fn wavelength_m(frequency_mhz: f64) -> Result<f64> {
    let f = checked_frequency_mhz(frequency_mhz)?;
    Ok(C_LIGHT / (f * 1e6))
}

pub fn wave_number(wavelength_m: f64) -> f64 {
    2.0 * std::f64::consts::PI / wavelength_m
}

/// Power ratio to dB, clamped at [`EPSILON`].
pub fn power_to_db(linear: f64) -> f64 {
    10.0 * linear.max(EPSILON).log10()
}

pub fn db_to_power(db: f64) -> f64 {
    10.0f64.powf(db / 10.0)
}

/// Field (amplitude) ratio to dB, clamped at [`EPSILON`].
pub fn amplitude_to_db(linear: f64) -> f64 {
    20.0 * linear.max(EPSILON).log10()
}

pub fn db_to_amplitude(db: f64) -> f64 {
    10.0f64.powf(db / 20.0)
}

/// Propagation velocity inside a line with the given velocity factor.
pub fn propagation_velocity(velocity_factor: f64) -> f64 {
    velocity_factor * C_LIGHT
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_wavelength_at_300_mhz() {
        let l = wavelength_m(299.792458).unwrap();
        assert_relative_eq!(l, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_wavelength_rejects_zero() {
        assert!(matches!(
            wavelength_m(0.0),
            Err(PatternError::InvalidFrequency { .. })
        ));
        assert!(wavelength_m(-10.0).is_err());
        assert!(wavelength_m(f64::NAN).is_err());
    }

    #[test]
    fn test_db_clamps_zero() {
        assert_relative_eq!(power_to_db(0.0), -120.0);
        assert_relative_eq!(amplitude_to_db(0.0), -240.0);
    }

    #[test]
    fn test_frequency_units() {
        assert_relative_eq!(FrequencyUnit::Ghz.to_mhz(1.2), 1200.0);
        assert_relative_eq!(FrequencyUnit::Khz.to_hz(3.0), 3000.0);
    }
}
