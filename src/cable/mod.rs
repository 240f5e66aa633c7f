use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ensure_finite, PatternError, Result};
use crate::units::{checked_frequency_mhz, propagation_velocity, FrequencyUnit};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttenuationPoint {
    pub frequency_mhz: f64,
    pub attenuation_db_per_100m: f64,
}

/// Datasheet attenuation of a cable vs frequency.
///
/// Points are kept in MHz, strictly increasing in frequency, with positive
/// attenuation. Invalid points are dropped on construction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawCurve", into = "RawCurve")]
pub struct CableAttenuationCurve {
    points: Vec<AttenuationPoint>,
}

#[derive(Serialize, Deserialize)]
struct RawCurve {
    #[serde(default)]
    unit: FrequencyUnit,
    points: Vec<(f64, f64)>,
}

impl From<RawCurve> for CableAttenuationCurve {
    fn from(raw: RawCurve) -> Self {
        CableAttenuationCurve::from_unit(raw.unit, raw.points)
    }
}

impl From<CableAttenuationCurve> for RawCurve {
    fn from(curve: CableAttenuationCurve) -> Self {
        RawCurve {
            unit: FrequencyUnit::Mhz,
            points: curve
                .points
                .iter()
                .map(|p| (p.frequency_mhz, p.attenuation_db_per_100m))
                .collect(),
        }
    }
}

impl CableAttenuationCurve {
    /// `points` are `(frequency_mhz, db_per_100m)` pairs.
    pub fn new(points: impl IntoIterator<Item = (f64, f64)>) -> Self {
        Self::from_unit(FrequencyUnit::Mhz, points)
    }

    pub fn from_unit(unit: FrequencyUnit, points: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let mut points: Vec<AttenuationPoint> = points
            .into_iter()
            .filter(|(f, a)| f.is_finite() && *f > 0.0 && a.is_finite() && *a > 0.0)
            .map(|(f, a)| AttenuationPoint {
                frequency_mhz: unit.to_mhz(f),
                attenuation_db_per_100m: a,
            })
            .collect();
        points.sort_by(|a, b| a.frequency_mhz.total_cmp(&b.frequency_mhz));
        points.dedup_by(|a, b| a.frequency_mhz == b.frequency_mhz);
        Self { points }
    }

    pub fn points(&self) -> &[AttenuationPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Interpolated,
    Extrapolated,
    /// Flat value of a one-point curve. Low confidence away from that point.
    SinglePoint,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interpolation {
    pub frequency_mhz: f64,
    pub attenuation_db_per_100m: f64,
    pub extrapolated: bool,
    pub origin: Origin,
    /// Curve points the value was derived from.
    pub support: Vec<AttenuationPoint>,
}

/// Attenuation at `frequency_mhz`, interpolated in log-log space.
///
/// Outside the curve the edge segment is extended and `extrapolated` is
/// set. A single-point curve yields that point's value for every
/// frequency; see [`interpolate_attenuation_strict`] to reject it.
pub fn interpolate_attenuation(curve: &CableAttenuationCurve, frequency_mhz: f64) -> Result<Interpolation> {
    let pts = curve.points();
    if pts.is_empty() {
        return Err(PatternError::EmptyCurve);
    }
    let f = checked_frequency_mhz(frequency_mhz)?;

    if let [only] = pts {
        return Ok(Interpolation {
            frequency_mhz: f,
            attenuation_db_per_100m: only.attenuation_db_per_100m,
            extrapolated: f != only.frequency_mhz,
            origin: Origin::SinglePoint,
            support: vec![*only],
        });
    }

    let last = pts.len() - 1;
    let (p0, p1, extrapolated) = if f < pts[0].frequency_mhz {
        (pts[0], pts[1], true)
    } else if f > pts[last].frequency_mhz {
        (pts[last - 1], pts[last], true)
    } else {
        let i = pts
            .partition_point(|p| p.frequency_mhz <= f)
            .clamp(1, last);
        (pts[i - 1], pts[i], false)
    };

    let (lf0, lf1) = (p0.frequency_mhz.ln(), p1.frequency_mhz.ln());
    let (la0, la1) = (p0.attenuation_db_per_100m.ln(), p1.attenuation_db_per_100m.ln());
    let slope = (la1 - la0) / (lf1 - lf0);
    let attenuation = (la0 + slope * (f.ln() - lf0)).exp();

    Ok(Interpolation {
        frequency_mhz: f,
        attenuation_db_per_100m: attenuation,
        extrapolated,
        origin: if extrapolated {
            Origin::Extrapolated
        } else {
            Origin::Interpolated
        },
        support: vec![p0, p1],
    })
}

/// Like [`interpolate_attenuation`] but fails on a one-point curve.
pub fn interpolate_attenuation_strict(
    curve: &CableAttenuationCurve,
    frequency_mhz: f64,
) -> Result<Interpolation> {
    match curve.points() {
        [only] => Err(PatternError::SinglePointCurve {
            frequency_mhz: only.frequency_mhz,
        }),
        _ => interpolate_attenuation(curve, frequency_mhz),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cable {
    pub name: String,
    #[serde(default)]
    pub impedance_ohms: Option<f64>,
    #[serde(default)]
    pub velocity_factor: Option<f64>,
    pub curve: CableAttenuationCurve,
}

impl Cable {
    pub fn propagation_velocity_m_s(&self) -> Option<f64> {
        self.velocity_factor
            .filter(|vf| vf.is_finite() && *vf > 0.0)
            .map(propagation_velocity)
    }

    pub fn loss(&self, frequency_mhz: f64, length_m: f64, connectors_db: &[f64]) -> Result<CableLoss> {
        let mut loss = total_cable_loss(&self.curve, frequency_mhz, length_m, connectors_db)?;
        loss.propagation_velocity_m_s = self.propagation_velocity_m_s();
        Ok(loss)
    }
}

/// Feeder loss record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CableLoss {
    pub length_m: f64,
    pub cable_loss_db: f64,
    pub connector_loss_db: f64,
    pub total_db: f64,
    pub interpolation: Interpolation,
    pub propagation_velocity_m_s: Option<f64>,
}

/// `length/100 * attenuation + sum(connectors)`.
pub fn total_cable_loss(
    curve: &CableAttenuationCurve,
    frequency_mhz: f64,
    length_m: f64,
    connectors_db: &[f64],
) -> Result<CableLoss> {
    let length_m = ensure_finite("cable length (m)", length_m)?;
    if length_m < 0.0 {
        return Err(PatternError::param("cable length (m)", length_m, "must be >= 0"));
    }
    for &c in connectors_db {
        if ensure_finite("connector loss (dB)", c)? < 0.0 {
            return Err(PatternError::param("connector loss (dB)", c, "must be >= 0"));
        }
    }

    let interpolation = interpolate_attenuation(curve, frequency_mhz)?;
    match interpolation.origin {
        Origin::SinglePoint if interpolation.extrapolated => warn!(
            frequency_mhz,
            "single-point attenuation curve used away from its only point"
        ),
        Origin::Extrapolated => warn!(frequency_mhz, "attenuation extrapolated outside the cable curve"),
        _ => {}
    }

    let cable_loss_db = length_m / 100.0 * interpolation.attenuation_db_per_100m;
    let connector_loss_db: f64 = connectors_db.iter().sum();

    Ok(CableLoss {
        length_m,
        cable_loss_db,
        connector_loss_db,
        total_db: cable_loss_db + connector_loss_db,
        interpolation,
        propagation_velocity_m_s: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn datasheet() -> CableAttenuationCurve {
        CableAttenuationCurve::new([(600.0, 9.8), (100.0, 4.1), (300.0, 6.5)])
    }

    #[test]
    fn test_log_log_interpolation() {
        let loss = total_cable_loss(&datasheet(), 200.0, 50.0, &[0.2, 0.15]).unwrap();
        assert_relative_eq!(loss.interpolation.attenuation_db_per_100m, 5.48342, epsilon = 1e-5);
        assert_relative_eq!(loss.cable_loss_db, 2.74171, epsilon = 1e-5);
        assert_relative_eq!(loss.total_db, 3.09171, epsilon = 1e-5);
        assert_eq!(loss.interpolation.origin, Origin::Interpolated);
        assert_eq!(loss.interpolation.support.len(), 2);
    }

    #[test]
    fn test_extrapolation_is_flagged() {
        let below = interpolate_attenuation(&datasheet(), 50.0).unwrap();
        assert!(below.extrapolated);
        assert_eq!(below.origin, Origin::Extrapolated);
        assert_relative_eq!(below.attenuation_db_per_100m, 3.06561, epsilon = 1e-5);
        assert!(interpolate_attenuation(&datasheet(), 2000.0).unwrap().extrapolated);
    }

    #[test]
    fn test_control_points_are_exact() {
        for (f, a) in [(100.0, 4.1), (300.0, 6.5), (600.0, 9.8)] {
            let r = interpolate_attenuation(&datasheet(), f).unwrap();
            assert!(!r.extrapolated);
            assert_relative_eq!(r.attenuation_db_per_100m, a, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_single_point_curve() {
        let curve = CableAttenuationCurve::new([(500.0, 5.2)]);
        let loss = total_cable_loss(&curve, 500.0, 80.0, &[0.20, 0.15]).unwrap();
        assert_relative_eq!(loss.total_db, 4.510, epsilon = 1e-12);
        assert!(!loss.interpolation.extrapolated);

        let off = interpolate_attenuation(&curve, 100.0).unwrap();
        assert!(off.extrapolated);
        assert_eq!(off.origin, Origin::SinglePoint);
        assert_relative_eq!(off.attenuation_db_per_100m, 5.2);

        assert_eq!(
            interpolate_attenuation_strict(&curve, 100.0),
            Err(PatternError::SinglePointCurve { frequency_mhz: 500.0 })
        );
    }

    #[test]
    fn test_malformed_inputs() {
        let empty = CableAttenuationCurve::new([(0.0, 1.0), (100.0, -2.0), (f64::NAN, 3.0)]);
        assert!(empty.is_empty());
        assert_eq!(interpolate_attenuation(&empty, 100.0), Err(PatternError::EmptyCurve));
        assert!(matches!(
            interpolate_attenuation(&datasheet(), 0.0),
            Err(PatternError::InvalidFrequency { .. })
        ));
        assert!(total_cable_loss(&datasheet(), 100.0, -1.0, &[]).is_err());
        assert!(total_cable_loss(&datasheet(), 100.0, 1.0, &[-0.1]).is_err());
    }

    #[test]
    fn test_units_are_normalized() {
        let curve = CableAttenuationCurve::from_unit(FrequencyUnit::Ghz, [(0.5, 5.0), (1.0, 7.0)]);
        assert_eq!(curve.points()[0].frequency_mhz, 500.0);
        let json = r#"{"unit": "GHz", "points": [[1.0, 7.0], [0.5, 5.0]]}"#;
        let parsed: CableAttenuationCurve = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, curve);
    }

    #[test]
    fn test_cable_reports_velocity() {
        let cable = Cable {
            name: "LCF 7/8".into(),
            impedance_ohms: Some(50.0),
            velocity_factor: Some(0.88),
            curve: datasheet(),
        };
        let loss = cable.loss(300.0, 100.0, &[]).unwrap();
        assert_relative_eq!(loss.total_db, 6.5, epsilon = 1e-12);
        assert_relative_eq!(loss.propagation_velocity_m_s.unwrap(), 0.88 * 299_792_458.0);
    }
}
