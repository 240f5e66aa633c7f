//! Scalar descriptors of a single pattern cut.
//!
//! Every function takes angles in degrees (ascending) and linear field
//! amplitudes, normalizes them to their own peak and needs at least three
//! distinct samples. A cut that spans a full turn (e.g. 0..359 deg) is
//! scanned circularly, so a main lobe straddling 0/360 deg is measured as
//! one lobe.

use std::f64::consts::FRAC_1_SQRT_2;

use itertools::Itertools;
use serde::Serialize;
use tracing::warn;

use crate::error::{PatternError, Result};
use crate::units::{amplitude_to_db, power_to_db, EPSILON};

pub const MAINLOBE_THRESHOLD_DB: f64 = -6.0;
pub const REAR_WINDOW_DEG: (f64, f64) = (150.0, 210.0);
/// Fraction of the peak at or below which a sample counts as a null.
pub const NULL_FRACTION: f64 = 0.05;

struct Cut<'a> {
    angles: &'a [f64],
    values: Vec<f64>,
    circular: bool,
    peak: usize,
}

impl<'a> Cut<'a> {
    fn new(context: &'static str, angles: &'a [f64], amplitudes: &[f64]) -> Result<Self> {
        if angles.len() != amplitudes.len() {
            return Err(PatternError::param(
                "amplitudes length",
                amplitudes.len() as f64,
                "must match the number of angles",
            ));
        }
        let distinct = angles
            .iter()
            .copied()
            .sorted_by(f64::total_cmp)
            .dedup()
            .count();
        if distinct < 3 {
            return Err(PatternError::InsufficientSamples {
                context,
                needed: 3,
                found: distinct,
            });
        }
        if let Some(&bad) = angles.iter().find(|a| !a.is_finite()) {
            return Err(PatternError::param("angle (deg)", bad, "must be finite"));
        }
        if let Some(w) = angles.windows(2).find(|w| w[1] <= w[0]) {
            return Err(PatternError::param("angle (deg)", w[1], "angles must be strictly increasing"));
        }
        if let Some(&bad) = amplitudes.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(PatternError::param("amplitude", bad, "must be finite and >= 0"));
        }

        let (peak, &max) = amplitudes
            .iter()
            .enumerate()
            // ties go to the lowest angle
            .max_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(&a.0)))
            .ok_or(PatternError::InsufficientSamples {
                context,
                needed: 3,
                found: 0,
            })?;
        if max <= EPSILON {
            return Err(PatternError::param("peak amplitude", max, "cut carries no field"));
        }

        let first = angles[0];
        let last = angles[angles.len() - 1];
        let step = (last - first) / (angles.len() - 1) as f64;
        let (angles, circular) = if (last - first - 360.0).abs() < 1e-9 {
            // closed turn, the last sample repeats the first
            (&angles[..angles.len() - 1], true)
        } else {
            (angles, last - first < 360.0 && last - first + step >= 360.0 - 1e-9)
        };
        let values: Vec<f64> = amplitudes[..angles.len()].iter().map(|v| v / max).collect();
        let peak = if peak < angles.len() { peak } else { 0 };

        Ok(Self {
            angles,
            values,
            circular,
            peak,
        })
    }

    fn len(&self) -> isize {
        self.values.len() as isize
    }

    /// Offset range reachable from the peak, per direction.
    fn reach(&self) -> (isize, isize) {
        if self.circular {
            (self.len() - 1, self.len() - 1)
        } else {
            (self.peak as isize, self.len() - 1 - self.peak as isize)
        }
    }

    fn index(&self, offset: isize) -> usize {
        (self.peak as isize + offset).rem_euclid(self.len()) as usize
    }

    /// Angle at `offset` samples from the peak, unwrapped across 0/360.
    fn angle(&self, offset: isize) -> f64 {
        let raw = self.peak as isize + offset;
        let turns = raw.div_euclid(self.len()) as f64;
        self.angles[self.index(offset)] + 360.0 * turns
    }

    fn value(&self, offset: isize) -> f64 {
        self.values[self.index(offset)]
    }

    fn peak_angle(&self) -> f64 {
        self.angles[self.peak]
    }

    /// Offsets `(left, right)` bounding the contiguous region around the peak
    /// at or above `threshold_db`.
    fn main_lobe(&self, threshold_db: f64) -> (isize, isize) {
        let above = |off: isize| amplitude_to_db(self.value(off)) >= threshold_db;
        let (max_left, max_right) = self.reach();
        let mut left = 0;
        while -left < max_left && above(left - 1) {
            left -= 1;
        }
        // a circular lobe may not wrap onto itself
        let right_limit = if self.circular { self.len() - 1 + left } else { max_right };
        let mut right = 0;
        while right < right_limit && above(right + 1) {
            right += 1;
        }
        (left, right)
    }
}

/// Half-power beamwidth in degrees: distance between the two sqrt(0.5)
/// crossings nearest the peak, each linearly interpolated.
pub fn hpbw(angles_deg: &[f64], amplitudes: &[f64]) -> Result<f64> {
    let cut = Cut::new("hpbw", angles_deg, amplitudes)?;
    let (max_left, max_right) = cut.reach();

    let crossing = |below: isize, above: isize| {
        let (v0, v1) = (cut.value(below), cut.value(above));
        let (a0, a1) = (cut.angle(below), cut.angle(above));
        a0 + (FRAC_1_SQRT_2 - v0) / (v1 - v0) * (a1 - a0)
    };

    let left = (1..=max_left)
        .map(|k| -k)
        .find(|&off| cut.value(off) < FRAC_1_SQRT_2)
        .map(|off| crossing(off, off + 1))
        .ok_or(PatternError::NoCrossingFound { side: "left" })?;
    let right = (1..=max_right)
        .find(|&off| cut.value(off) < FRAC_1_SQRT_2)
        .map(|off| crossing(off, off - 1))
        .ok_or(PatternError::NoCrossingFound { side: "right" })?;

    Ok(right - left)
}

/// Composite Simpson's rule over possibly irregular abscissae.
fn simpson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    let intervals = n - 1;
    let mut total = 0.0;
    let mut i = 0;
    while i + 2 < n {
        let h0 = x[i + 1] - x[i];
        let h1 = x[i + 2] - x[i + 1];
        total += (h0 + h1) / 6.0
            * ((2.0 - h1 / h0) * y[i]
                + (h0 + h1) * (h0 + h1) / (h0 * h1) * y[i + 1]
                + (2.0 - h0 / h1) * y[i + 2]);
        i += 2;
    }
    if intervals % 2 == 1 {
        // last interval closed with a parabola through the final three points
        let h0 = x[n - 2] - x[n - 3];
        let h1 = x[n - 1] - x[n - 2];
        let alpha = (2.0 * h1 * h1 + 3.0 * h0 * h1) / (6.0 * (h0 + h1));
        let beta = (h1 * h1 + 3.0 * h0 * h1) / (6.0 * h0);
        let eta = h1 * h1 * h1 / (6.0 * h0 * (h0 + h1));
        total += alpha * y[n - 1] + beta * y[n - 2] - eta * y[n - 3];
    }
    total
}

/// Two-dimensional directivity estimate of one cut, in dBi.
///
/// `D = span / integral(|E/Emax|^2)` over the covered angular span, so a
/// uniform cut gives 0 dBi. This is a planar approximation, not a 3D
/// integral.
pub fn directivity(angles_deg: &[f64], amplitudes: &[f64]) -> Result<f64> {
    let cut = Cut::new("directivity", angles_deg, amplitudes)?;

    let mut x: Vec<f64> = cut.angles.iter().map(|a| a.to_radians()).collect();
    let mut y: Vec<f64> = cut.values.iter().map(|v| v * v).collect();
    if cut.circular {
        x.push((cut.angles[0] + 360.0).to_radians());
        y.push(y[0]);
    }

    let integral = simpson(&x, &y);
    let span = x[x.len() - 1] - x[0];
    if integral <= EPSILON {
        return Err(PatternError::param("radiated power integral", integral, "must be > 0"));
    }
    Ok(power_to_db(span / integral))
}

/// Peak over the strongest sample whose angle, measured from the peak,
/// falls in `window_deg`. Returned as a positive dB figure.
pub fn front_to_back(angles_deg: &[f64], amplitudes: &[f64], window_deg: (f64, f64)) -> Result<f64> {
    let (start, end) = window_deg;
    if !(start.is_finite() && end.is_finite() && start <= end) {
        return Err(PatternError::param("rear window start (deg)", start, "window must be finite and ordered"));
    }
    let cut = Cut::new("front_to_back", angles_deg, amplitudes)?;
    let peak_angle = cut.peak_angle();

    let back = cut
        .angles
        .iter()
        .zip(&cut.values)
        .filter(|(a, _)| {
            let rel = (**a - peak_angle).rem_euclid(360.0);
            rel >= start && rel <= end
        })
        .map(|(_, v)| *v)
        .reduce(f64::max)
        .ok_or(PatternError::InsufficientSamples {
            context: "front_to_back window",
            needed: 1,
            found: 0,
        })?;

    Ok((-amplitude_to_db(back)).max(0.0))
}

/// Peak-to-peak variation, in dB, inside the main lobe.
pub fn ripple(angles_deg: &[f64], amplitudes: &[f64], mainlobe_threshold_db: f64) -> Result<f64> {
    let cut = Cut::new("ripple", angles_deg, amplitudes)?;
    let (left, right) = cut.main_lobe(mainlobe_threshold_db);
    let (min, max) = (left..=right)
        .map(|off| amplitude_to_db(cut.value(off)))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), db| (lo.min(db), hi.max(db)));
    Ok(max - min)
}

/// Strongest sample outside the main lobe, in dB relative to the peak.
/// `None` when the main lobe covers the whole cut.
pub fn sidelobe_level(
    angles_deg: &[f64],
    amplitudes: &[f64],
    mainlobe_threshold_db: f64,
) -> Result<Option<f64>> {
    let cut = Cut::new("sidelobe_level", angles_deg, amplitudes)?;
    let (left, right) = cut.main_lobe(mainlobe_threshold_db);

    let outside: Vec<isize> = if cut.circular {
        (right + 1..left + cut.len()).collect()
    } else {
        (-(cut.peak as isize)..left).chain(right + 1..cut.len() - cut.peak as isize).collect()
    };

    Ok(outside
        .into_iter()
        .map(|off| amplitude_to_db(cut.value(off)))
        .reduce(f64::max))
}

pub fn peak_angle(angles_deg: &[f64], amplitudes: &[f64]) -> Result<f64> {
    Ok(Cut::new("peak_angle", angles_deg, amplitudes)?.peak_angle())
}

/// First angle past the peak (ascending) where the field drops to
/// [`NULL_FRACTION`] of the peak or below.
pub fn first_null(angles_deg: &[f64], amplitudes: &[f64]) -> Result<Option<f64>> {
    let cut = Cut::new("first_null", angles_deg, amplitudes)?;
    let (_, max_right) = cut.reach();
    Ok((1..=max_right)
        .find(|&off| cut.value(off) <= NULL_FRACTION)
        .map(|off| cut.angles[cut.index(off)]))
}

/// Gain estimate from the two principal-plane beamwidths,
/// `10 log10(41253 / (h * v))`.
pub fn estimate_gain_dbi(h_hpbw_deg: f64, v_hpbw_deg: f64) -> Option<f64> {
    let valid = |x: f64| x.is_finite() && x > 0.0;
    if !(valid(h_hpbw_deg) && valid(v_hpbw_deg)) {
        return None;
    }
    Some(power_to_db(41253.0 / (h_hpbw_deg * v_hpbw_deg)))
}

/// Every metric of one cut. A metric that cannot be evaluated is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CutMetrics {
    pub peak_angle_deg: Option<f64>,
    pub hpbw_deg: Option<f64>,
    pub directivity_dbi: Option<f64>,
    pub front_to_back_db: Option<f64>,
    pub ripple_db: Option<f64>,
    pub sidelobe_level_db: Option<f64>,
    pub first_null_deg: Option<f64>,
}

fn evaluated<T>(metric: &'static str, result: Result<T>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(metric, error = %e, "metric not evaluated");
            None
        }
    }
}

impl CutMetrics {
    pub fn evaluate(angles_deg: &[f64], amplitudes: &[f64]) -> Self {
        Self {
            peak_angle_deg: evaluated("peak_angle", peak_angle(angles_deg, amplitudes)),
            hpbw_deg: evaluated("hpbw", hpbw(angles_deg, amplitudes)),
            directivity_dbi: evaluated("directivity", directivity(angles_deg, amplitudes)),
            front_to_back_db: evaluated(
                "front_to_back",
                front_to_back(angles_deg, amplitudes, REAR_WINDOW_DEG),
            ),
            ripple_db: evaluated("ripple", ripple(angles_deg, amplitudes, MAINLOBE_THRESHOLD_DB)),
            sidelobe_level_db: evaluated(
                "sidelobe_level",
                sidelobe_level(angles_deg, amplitudes, MAINLOBE_THRESHOLD_DB),
            )
            .flatten(),
            first_null_deg: evaluated("first_null", first_null(angles_deg, amplitudes)).flatten(),
        }
    }
}

/// Metrics of both principal planes plus the beamwidth gain estimate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PatternMetrics {
    pub horizontal: CutMetrics,
    pub vertical: CutMetrics,
    pub estimated_gain_dbi: Option<f64>,
}

impl PatternMetrics {
    pub fn evaluate(
        h_angles_deg: &[f64],
        h_amplitudes: &[f64],
        v_angles_deg: &[f64],
        v_amplitudes: &[f64],
    ) -> Self {
        let horizontal = CutMetrics::evaluate(h_angles_deg, h_amplitudes);
        let vertical = CutMetrics::evaluate(v_angles_deg, v_amplitudes);
        let estimated_gain_dbi = horizontal
            .hpbw_deg
            .zip(vertical.hpbw_deg)
            .and_then(|(h, v)| estimate_gain_dbi(h, v));
        Self {
            horizontal,
            vertical,
            estimated_gain_dbi,
        }
    }
}
