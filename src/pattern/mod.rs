use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{PatternError, Result};
use crate::units::EPSILON;

/// One (angle, linear amplitude) pair of a radiation pattern cut.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngularSample {
    pub angle_deg: f64,
    pub amplitude: f64,
}

impl AngularSample {
    pub fn new(angle_deg: f64, amplitude: f64) -> Self {
        Self {
            angle_deg,
            amplitude,
        }
    }
}

impl From<(f64, f64)> for AngularSample {
    fn from((angle_deg, amplitude): (f64, f64)) -> Self {
        Self::new(angle_deg, amplitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CutType {
    /// Horizontal radiation pattern, amplitude vs azimuth over a full turn.
    #[serde(alias = "HRP")]
    Hrp,
    /// Vertical radiation pattern, amplitude vs elevation in [-90, +90].
    #[serde(alias = "VRP")]
    Vrp,
}

impl CutType {
    pub fn is_circular(self) -> bool {
        matches!(self, CutType::Hrp)
    }

    pub fn canonical_grid(self) -> AngularGrid {
        match self {
            CutType::Hrp => AngularGrid::canonical_horizontal(),
            CutType::Vrp => AngularGrid::canonical_vertical(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    #[default]
    None,
    Max,
    Rms,
}

impl Normalization {
    pub fn apply(self, values: &mut [f64]) {
        let divisor = match self {
            Normalization::None => return,
            Normalization::Max => values
                .iter()
                .copied()
                .fold(0.0f64, f64::max)
                .max(EPSILON),
            Normalization::Rms => {
                if values.is_empty() {
                    return;
                }
                let mean_sq = values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64;
                mean_sq.sqrt().max(EPSILON)
            }
        };
        for v in values.iter_mut() {
            *v /= divisor;
        }
    }
}

/// A sampled radiation pattern cut.
///
/// Samples are always kept sorted by angle with unique angles, finite values
/// and non-negative amplitudes; [`ElementalPattern::new`] enforces this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawPattern")]
pub struct ElementalPattern {
    cut: CutType,
    normalization: Normalization,
    samples: Vec<AngularSample>,
}

#[derive(Deserialize)]
struct RawPattern {
    cut: CutType,
    #[serde(default)]
    normalization: Normalization,
    samples: Vec<AngularSample>,
}

impl From<RawPattern> for ElementalPattern {
    fn from(raw: RawPattern) -> Self {
        ElementalPattern::new(raw.cut, raw.samples).with_normalization(raw.normalization)
    }
}

impl ElementalPattern {
    pub fn new(cut: CutType, samples: impl IntoIterator<Item = AngularSample>) -> Self {
        Self {
            cut,
            normalization: Normalization::None,
            samples: prepare_series(samples),
        }
    }

    pub fn from_arrays(cut: CutType, angles_deg: &[f64], amplitudes: &[f64]) -> Result<Self> {
        if angles_deg.len() != amplitudes.len() {
            return Err(PatternError::param(
                "amplitudes length",
                amplitudes.len() as f64,
                "must match the number of angles",
            ));
        }
        Ok(Self::new(
            cut,
            angles_deg
                .iter()
                .zip(amplitudes)
                .map(|(&a, &v)| AngularSample::new(a, v)),
        ))
    }

    /// Constant unit amplitude over the canonical grid of `cut`.
    pub fn omnidirectional(cut: CutType) -> Self {
        let grid = cut.canonical_grid();
        let angles = grid.angles();
        let ones = vec![1.0; angles.len()];
        Self::from_grid(cut, Normalization::None, &angles, &ones)
    }

    /// Builds a pattern from values already laid on a grid (sorted, unique).
    pub(crate) fn from_grid(
        cut: CutType,
        normalization: Normalization,
        angles_deg: &[f64],
        amplitudes: &[f64],
    ) -> Self {
        Self {
            cut,
            normalization,
            samples: angles_deg
                .iter()
                .zip(amplitudes)
                .map(|(&a, &v)| AngularSample::new(a, v))
                .collect(),
        }
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn cut(&self) -> CutType {
        self.cut
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    pub fn samples(&self) -> &[AngularSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn angles(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.angle_deg).collect()
    }

    pub fn amplitudes(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.amplitude).collect()
    }

    pub fn peak(&self) -> Option<AngularSample> {
        self.samples
            .iter()
            .copied()
            .max_by(|a, b| a.amplitude.total_cmp(&b.amplitude))
    }
}

/// Drops non-finite pairs, clamps negative amplitudes, sorts by angle and
/// averages the amplitudes of repeated angles.
fn prepare_series(samples: impl IntoIterator<Item = AngularSample>) -> Vec<AngularSample> {
    let mut cleaned: Vec<AngularSample> = samples
        .into_iter()
        .filter(|s| s.angle_deg.is_finite() && s.amplitude.is_finite())
        // + 0.0 folds -0.0 onto 0.0 so both land in the same group
        .map(|s| AngularSample::new(s.angle_deg + 0.0, s.amplitude.max(0.0)))
        .collect();
    cleaned.sort_by(|a, b| a.angle_deg.total_cmp(&b.angle_deg));

    let groups = cleaned.into_iter().chunk_by(|s| s.angle_deg.to_bits());
    groups
        .into_iter()
        .map(|(_, group)| {
            let group: Vec<AngularSample> = group.collect();
            let mean = group.iter().map(|s| s.amplitude).sum::<f64>() / group.len() as f64;
            AngularSample::new(group[0].angle_deg, mean)
        })
        .collect()
}

/// A regularly spaced set of output angles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngularGrid {
    start_deg: f64,
    step_deg: f64,
    count: usize,
}

impl AngularGrid {
    pub fn new(start_deg: f64, step_deg: f64, count: usize) -> Result<Self> {
        if !start_deg.is_finite() {
            return Err(PatternError::param("grid start", start_deg, "must be finite"));
        }
        if !(step_deg.is_finite() && step_deg > 0.0) {
            return Err(PatternError::param("grid step", step_deg, "must be finite and > 0"));
        }
        if count == 0 {
            return Err(PatternError::param("grid size", 0.0, "must hold at least one angle"));
        }
        Ok(Self {
            start_deg,
            step_deg,
            count,
        })
    }

    /// Full turn starting at 0 deg, end excluded: 0, step, .., 360 - step.
    pub fn horizontal(step_deg: f64) -> Result<Self> {
        let count = (360.0 / step_deg).round();
        Self::new(0.0, step_deg, count.max(0.0) as usize)
    }

    /// Closed elevation interval -90..=+90.
    pub fn vertical(step_deg: f64) -> Result<Self> {
        let count = (180.0 / step_deg).round() + 1.0;
        Self::new(-90.0, step_deg, count.max(0.0) as usize)
    }

    /// 360 points, 0..359 deg.
    pub const fn canonical_horizontal() -> Self {
        Self {
            start_deg: 0.0,
            step_deg: 1.0,
            count: 360,
        }
    }

    /// 181 points, -90..=90 deg.
    pub const fn canonical_vertical() -> Self {
        Self {
            start_deg: -90.0,
            step_deg: 1.0,
            count: 181,
        }
    }

    pub fn start_deg(&self) -> f64 {
        self.start_deg
    }

    pub fn step_deg(&self) -> f64 {
        self.step_deg
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn angle(&self, index: usize) -> f64 {
        let raw = self.start_deg + index as f64 * self.step_deg;
        // keeps 0.1 deg grids on exact decimal angles
        (raw * 1e9).round() / 1e9
    }

    pub fn angles(&self) -> Vec<f64> {
        (0..self.count).map(|i| self.angle(i)).collect()
    }

    pub fn matches(&self, angles_deg: &[f64]) -> bool {
        angles_deg.len() == self.count
            && angles_deg
                .iter()
                .enumerate()
                .all(|(i, a)| (a - self.angle(i)).abs() < 1e-9)
    }
}
