use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ensure_finite, PatternError, Result};
use crate::metrics::PatternMetrics;
use crate::pattern::{AngularGrid, CutType};
use crate::physics::array_factor::CompositePattern;
use crate::physics::resample::{resample, PatternInterpolator};
use crate::units::{amplitude_to_db, checked_frequency_mhz, db_to_power, power_to_db, EPSILON};

/// Named loss contributions between the transmitter and the antenna.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LossBreakdown {
    pub feeder_db: f64,
    pub connectors_db: Vec<f64>,
    pub splitter_db: f64,
    pub misc_db: Vec<f64>,
}

impl LossBreakdown {
    pub fn entries(&self) -> Vec<f64> {
        let mut out = vec![self.feeder_db, self.splitter_db];
        out.extend(&self.connectors_db);
        out.extend(&self.misc_db);
        out
    }

    pub fn total_db(&self) -> f64 {
        self.entries().iter().sum()
    }
}

/// Antenna gain vs frequency, used to correct the nominal gain away from
/// the frequency it was specified at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGainTable")]
pub struct GainTable {
    points: Vec<(f64, f64)>,
    reference_mhz: f64,
}

#[derive(Deserialize)]
struct RawGainTable {
    points: Vec<(f64, f64)>,
    reference_mhz: f64,
}

impl TryFrom<RawGainTable> for GainTable {
    type Error = PatternError;

    fn try_from(raw: RawGainTable) -> Result<Self> {
        GainTable::new(raw.points, raw.reference_mhz)
    }
}

impl GainTable {
    /// `points` are `(frequency_mhz, gain_db)` pairs in any order.
    pub fn new(points: Vec<(f64, f64)>, reference_mhz: f64) -> Result<Self> {
        let reference_mhz = checked_frequency_mhz(reference_mhz)?;
        let mut points: Vec<(f64, f64)> = points
            .into_iter()
            .filter(|(f, g)| f.is_finite() && *f > 0.0 && g.is_finite())
            .collect();
        if points.is_empty() {
            return Err(PatternError::InsufficientSamples {
                context: "gain table",
                needed: 1,
                found: 0,
            });
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        points.dedup_by(|a, b| a.0 == b.0);
        Ok(Self {
            points,
            reference_mhz,
        })
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn reference_mhz(&self) -> f64 {
        self.reference_mhz
    }

    /// Linear in frequency between points, held flat outside the table.
    pub fn gain_at(&self, frequency_mhz: f64) -> f64 {
        let pts = &self.points;
        let i = pts.partition_point(|&(f, _)| f <= frequency_mhz);
        if i == 0 {
            return pts[0].1;
        }
        if i == pts.len() {
            return pts[pts.len() - 1].1;
        }
        let (f0, g0) = pts[i - 1];
        let (f1, g1) = pts[i];
        g0 + (frequency_mhz - f0) / (f1 - f0) * (g1 - g0)
    }

    pub fn delta_db(&self, frequency_mhz: f64) -> f64 {
        self.gain_at(frequency_mhz) - self.gain_at(self.reference_mhz)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub table: GainTable,
    pub frequency_mhz: f64,
}

impl Calibration {
    pub fn delta_db(&self) -> Result<f64> {
        let f = checked_frequency_mhz(self.frequency_mhz)?;
        Ok(self.table.delta_db(f))
    }
}

/// Effective radiated power on the canonical azimuth grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErpResult {
    pub angles_deg: Vec<f64>,
    pub horizontal_linear: Vec<f64>,
    /// Field level of each radial relative to unity, in dB (<= 0 for a
    /// normalized pattern).
    pub attenuation_db: Vec<f64>,
    pub erp_w: Vec<f64>,
    pub erp_dbw: Vec<f64>,
    pub vertical_angles_deg: Vec<f64>,
    pub vertical_linear: Vec<f64>,
    /// Vertical field at the horizon, applied to every horizontal radial.
    pub vertical_scalar: f64,
    pub input_power_w: f64,
    pub total_losses_db: f64,
    pub net_loss_is_gain: bool,
    pub calibrated_gain_db: f64,
    pub metrics: PatternMetrics,
}

impl ErpResult {
    pub fn peak_erp_w(&self) -> f64 {
        self.erp_w.iter().copied().fold(0.0, f64::max)
    }

    pub fn peak_erp_dbw(&self) -> f64 {
        power_to_db(self.peak_erp_w())
    }

    pub fn peak_azimuth_deg(&self) -> Option<f64> {
        self.erp_w
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(&a.0)))
            .map(|(i, _)| self.angles_deg[i])
    }
}

/// Combines a horizontal and a vertical composite with transmitter power,
/// losses and gain into per-azimuth ERP.
///
/// `ERP(phi) = P * 10^(-L/10) * 10^(G/10) * (h(phi) * v(0))^2` where `L` is
/// the sum of `losses_db`, `G` the nominal gain corrected by `calibration`,
/// `h` the horizontal cut resampled to 0..359 deg and `v(0)` the vertical
/// field at the horizon.
pub fn compute_erp(
    horizontal: &CompositePattern,
    vertical: &CompositePattern,
    input_power_w: f64,
    losses_db: &[f64],
    nominal_gain_db: f64,
    calibration: Option<&Calibration>,
) -> Result<ErpResult> {
    if !(input_power_w.is_finite() && input_power_w > 0.0) {
        return Err(PatternError::param(
            "input power (W)",
            input_power_w,
            "must be finite and > 0",
        ));
    }
    for &loss in losses_db {
        ensure_finite("loss (dB)", loss)?;
    }
    ensure_finite("nominal gain (dB)", nominal_gain_db)?;
    for (expected, pattern) in [(CutType::Hrp, horizontal), (CutType::Vrp, vertical)] {
        if pattern.cut() != expected {
            return Err(PatternError::CutMismatch {
                expected,
                found: pattern.cut(),
            });
        }
    }

    let grid = AngularGrid::canonical_horizontal();
    let horizontal_cut = if grid.matches(&horizontal.angles()) {
        horizontal.pattern().clone()
    } else {
        debug!("resampling horizontal composite onto the canonical azimuth grid");
        resample(horizontal.pattern(), &grid)?
    };

    let vertical_scalar = PatternInterpolator::new(vertical.pattern())?
        .at(0.0)
        .max(EPSILON);

    let total_losses_db: f64 = losses_db.iter().sum();
    let net_loss_is_gain = total_losses_db < 0.0;
    if net_loss_is_gain {
        warn!(total_losses_db, "losses sum to a net gain");
    }

    let calibration_delta = match calibration {
        Some(c) => c.delta_db()?,
        None => 0.0,
    };
    let calibrated_gain_db = nominal_gain_db + calibration_delta;

    let scale_w = input_power_w * db_to_power(calibrated_gain_db - total_losses_db);

    let horizontal_linear = horizontal_cut.amplitudes();
    let mut attenuation_db = Vec::with_capacity(horizontal_linear.len());
    let mut erp_w = Vec::with_capacity(horizontal_linear.len());
    let mut erp_dbw = Vec::with_capacity(horizontal_linear.len());
    for &h in &horizontal_linear {
        let field = h * vertical_scalar;
        let p = scale_w * field * field;
        attenuation_db.push(amplitude_to_db(field));
        erp_w.push(p);
        erp_dbw.push(power_to_db(p));
    }

    let angles_deg = horizontal_cut.angles();
    let vertical_angles_deg = vertical.angles();
    let vertical_linear = vertical.amplitudes();
    let metrics = PatternMetrics::evaluate(
        &angles_deg,
        &horizontal_linear,
        &vertical_angles_deg,
        &vertical_linear,
    );

    Ok(ErpResult {
        angles_deg,
        horizontal_linear,
        attenuation_db,
        erp_w,
        erp_dbw,
        vertical_angles_deg,
        vertical_linear,
        vertical_scalar,
        input_power_w,
        total_losses_db,
        net_loss_is_gain,
        calibrated_gain_db,
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::ElementalPattern;
    use crate::physics::array_factor::{compose_horizontal, compose_vertical, ArrayGeometry};
    use approx::assert_relative_eq;

    fn omni_pair() -> (CompositePattern, CompositePattern) {
        let g = ArrayGeometry::new(1).unwrap();
        let h = compose_horizontal(&ElementalPattern::omnidirectional(CutType::Hrp), &g, 1.0).unwrap();
        let v = compose_vertical(&ElementalPattern::omnidirectional(CutType::Vrp), &g, 1.0).unwrap();
        (h, v)
    }

    #[test]
    fn test_erp_of_omni_antenna() {
        let (h, v) = omni_pair();
        let r = compute_erp(&h, &v, 1000.0, &[1.0, 2.0], 3.0, None).unwrap();
        assert_eq!(r.erp_w.len(), 360);
        // 1 kW, 3 dB loss, 3 dB gain
        for p in &r.erp_w {
            assert_relative_eq!(*p, 1000.0, max_relative = 1e-12);
        }
        assert_relative_eq!(r.erp_dbw[0], 30.0, epsilon = 1e-9);
        assert!(!r.net_loss_is_gain);
    }

    #[test]
    fn test_negative_losses_are_flagged() {
        let (h, v) = omni_pair();
        let r = compute_erp(&h, &v, 10.0, &[-1.0], 0.0, None).unwrap();
        assert!(r.net_loss_is_gain);
        assert_relative_eq!(r.total_losses_db, -1.0);
        assert!(r.erp_w[0] > 10.0);
    }

    #[test]
    fn test_rejects_bad_power() {
        let (h, v) = omni_pair();
        for p in [0.0, -5.0, f64::NAN] {
            assert!(matches!(
                compute_erp(&h, &v, p, &[], 0.0, None),
                Err(PatternError::InvalidParameter { .. })
            ));
        }
        assert!(compute_erp(&h, &v, 1.0, &[f64::INFINITY], 0.0, None).is_err());
    }

    #[test]
    fn test_swapped_cuts_are_rejected() {
        let (h, v) = omni_pair();
        assert!(matches!(
            compute_erp(&v, &h, 1.0, &[], 0.0, None),
            Err(PatternError::CutMismatch { .. })
        ));
    }

    #[test]
    fn test_calibration_shifts_gain() {
        let (h, v) = omni_pair();
        let table = GainTable::new(vec![(500.0, 10.0), (700.0, 11.0)], 500.0).unwrap();
        let cal = Calibration {
            table,
            frequency_mhz: 600.0,
        };
        let r = compute_erp(&h, &v, 1.0, &[], 10.0, Some(&cal)).unwrap();
        assert_relative_eq!(r.calibrated_gain_db, 10.5, epsilon = 1e-12);
        assert_relative_eq!(r.erp_dbw[0], 10.5, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_field_is_clamped() {
        let g = ArrayGeometry::new(1).unwrap();
        let hrp = ElementalPattern::new(CutType::Hrp, vec![(0.0, 1.0).into(), (180.0, 0.0).into()]);
        let h = compose_horizontal(&hrp, &g, 1.0).unwrap();
        let v = compose_vertical(&ElementalPattern::omnidirectional(CutType::Vrp), &g, 1.0).unwrap();
        let r = compute_erp(&h, &v, 1.0, &[], 0.0, None).unwrap();
        assert_eq!(r.erp_w[180], 0.0);
        assert_relative_eq!(r.erp_dbw[180], -120.0);
        assert!(r.erp_dbw.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_loss_breakdown_total() {
        let l = LossBreakdown {
            feeder_db: 2.0,
            connectors_db: vec![0.2, 0.15],
            splitter_db: 3.0,
            misc_db: vec![0.5],
        };
        assert_relative_eq!(l.total_db(), 5.85, epsilon = 1e-12);
        assert_eq!(l.entries().len(), 5);
    }

    #[test]
    fn test_gain_table_holds_edges() {
        let t = GainTable::new(vec![(700.0, 11.0), (500.0, 10.0)], 600.0).unwrap();
        assert_relative_eq!(t.gain_at(100.0), 10.0);
        assert_relative_eq!(t.gain_at(900.0), 11.0);
        assert_relative_eq!(t.delta_db(700.0), 0.5, epsilon = 1e-12);
        assert!(GainTable::new(vec![], 600.0).is_err());
        assert!(GainTable::new(vec![(1.0, 1.0)], 0.0).is_err());
    }
}
