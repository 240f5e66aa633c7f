use std::f64::consts::PI;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{PatternError, Result};
use crate::pattern::{AngularGrid, CutType, ElementalPattern};
use crate::physics::resample::{resample, PatternInterpolator};
use crate::units::wave_number;

/// Per-element amplitude law.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Taper {
    #[default]
    Uniform,
    /// Element `i` is driven at `level^i`. A level of 0 means no taper.
    Progressive(f64),
    /// One explicit amplitude per element.
    PerElement(Vec<f64>),
}

impl Taper {
    pub fn weights(&self, count: usize) -> Vec<f64> {
        match self {
            Taper::Uniform => vec![1.0; count],
            Taper::Progressive(level) if *level == 0.0 => vec![1.0; count],
            Taper::Progressive(level) => (0..count).map(|i| level.powi(i as i32)).collect(),
            Taper::PerElement(w) => w.clone(),
        }
    }
}

/// A vertical stack or horizontal ring of identical elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrayGeometry {
    pub count: usize,
    /// Element spacing in meters. `None` means half a wavelength once the
    /// array has more than one element.
    pub spacing_m: Option<f64>,
    /// Progressive excitation phase, degrees per element index.
    pub excitation_phase_deg: f64,
    pub taper: Taper,
    /// Vertical arrays only: electrical beam tilt.
    pub tilt_deg: f64,
    /// Horizontal arrays only: extra mechanical rotation per element index.
    pub step_deg: f64,
}

impl Default for ArrayGeometry {
    fn default() -> Self {
        Self {
            count: 1,
            spacing_m: None,
            excitation_phase_deg: 0.0,
            taper: Taper::Uniform,
            tilt_deg: 0.0,
            step_deg: 0.0,
        }
    }
}

impl ArrayGeometry {
    pub fn new(count: usize) -> Result<Self> {
        let geometry = Self {
            count,
            ..Self::default()
        };
        geometry.validate()?;
        Ok(geometry)
    }

    pub fn with_spacing(mut self, spacing_m: f64) -> Self {
        self.spacing_m = Some(spacing_m);
        self
    }

    pub fn with_excitation_phase(mut self, phase_deg: f64) -> Self {
        self.excitation_phase_deg = phase_deg;
        self
    }

    pub fn with_taper(mut self, taper: Taper) -> Self {
        self.taper = taper;
        self
    }

    pub fn with_tilt(mut self, tilt_deg: f64) -> Self {
        self.tilt_deg = tilt_deg;
        self
    }

    pub fn with_step(mut self, step_deg: f64) -> Self {
        self.step_deg = step_deg;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.count < 1 {
            return Err(PatternError::InvalidGeometry {
                parameter: "count",
                reason: format!("must be at least 1, got {}", self.count),
            });
        }
        if let Some(s) = self.spacing_m {
            if !(s.is_finite() && s >= 0.0) {
                return Err(PatternError::InvalidGeometry {
                    parameter: "spacing_m",
                    reason: format!("must be finite and >= 0, got {s}"),
                });
            }
        }
        for (parameter, value) in [
            ("excitation_phase_deg", self.excitation_phase_deg),
            ("tilt_deg", self.tilt_deg),
            ("step_deg", self.step_deg),
        ] {
            if !value.is_finite() {
                return Err(PatternError::InvalidGeometry {
                    parameter,
                    reason: format!("must be finite, got {value}"),
                });
            }
        }
        match &self.taper {
            Taper::Uniform => {}
            Taper::Progressive(level) => {
                if !(level.is_finite() && *level >= 0.0) {
                    return Err(PatternError::InvalidGeometry {
                        parameter: "taper",
                        reason: format!("progressive level must be finite and >= 0, got {level}"),
                    });
                }
                if self.weights().iter().any(|w| !w.is_finite()) {
                    return Err(PatternError::InvalidGeometry {
                        parameter: "taper",
                        reason: format!(
                            "progressive level {level} overflows over {} elements",
                            self.count
                        ),
                    });
                }
            }
            Taper::PerElement(w) => {
                if w.len() != self.count {
                    return Err(PatternError::InvalidGeometry {
                        parameter: "taper",
                        reason: format!("has {} entries for {} elements", w.len(), self.count),
                    });
                }
                if let Some(bad) = w.iter().find(|v| !(v.is_finite() && **v >= 0.0)) {
                    return Err(PatternError::InvalidGeometry {
                        parameter: "taper",
                        reason: format!("entries must be finite and >= 0, got {bad}"),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn effective_spacing_m(&self, wavelength_m: f64) -> f64 {
        match self.spacing_m {
            Some(s) => s,
            None if self.count > 1 => wavelength_m / 2.0,
            None => 0.0,
        }
    }

    pub fn weights(&self) -> Vec<f64> {
        self.taper.weights(self.count)
    }
}

/// Per-element phase (degrees) that points a vertical stack at `tilt_deg`.
pub fn tilt_beta_deg(spacing_m: f64, tilt_deg: f64, wavelength_m: f64) -> f64 {
    -360.0 * spacing_m * tilt_deg.to_radians().sin() / wavelength_m
}

/// Result of array-factor synthesis: the composed cut plus the geometry that
/// produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositePattern {
    pattern: ElementalPattern,
    geometry: ArrayGeometry,
    wavelength_m: f64,
    effective_spacing_m: f64,
    beta_deg: f64,
    ring_radius_m: Option<f64>,
}

impl CompositePattern {
    pub fn pattern(&self) -> &ElementalPattern {
        &self.pattern
    }

    pub fn cut(&self) -> CutType {
        self.pattern.cut()
    }

    pub fn angles(&self) -> Vec<f64> {
        self.pattern.angles()
    }

    pub fn amplitudes(&self) -> Vec<f64> {
        self.pattern.amplitudes()
    }

    pub fn geometry(&self) -> &ArrayGeometry {
        &self.geometry
    }

    pub fn wavelength_m(&self) -> f64 {
        self.wavelength_m
    }

    /// Spacing actually used, after the half-wavelength default.
    pub fn effective_spacing_m(&self) -> f64 {
        self.effective_spacing_m
    }

    /// Total progressive phase per element index (excitation + tilt).
    pub fn beta_deg(&self) -> f64 {
        self.beta_deg
    }

    /// Horizontal rings only: radius of the circle whose circumference is
    /// `count * spacing`. Informational; the phase uses the chord geometry.
    pub fn ring_radius_m(&self) -> Option<f64> {
        self.ring_radius_m
    }
}

fn check_inputs(
    elemental: &ElementalPattern,
    expected: CutType,
    geometry: &ArrayGeometry,
    wavelength_m: f64,
) -> Result<()> {
    if elemental.cut() != expected {
        return Err(PatternError::CutMismatch {
            expected,
            found: elemental.cut(),
        });
    }
    geometry.validate()?;
    if !(wavelength_m.is_finite() && wavelength_m > 0.0) {
        return Err(PatternError::InvalidFrequency {
            value: wavelength_m,
        });
    }
    Ok(())
}

pub fn compose_vertical(
    elemental: &ElementalPattern,
    geometry: &ArrayGeometry,
    wavelength_m: f64,
) -> Result<CompositePattern> {
    compose_vertical_on(elemental, geometry, wavelength_m, &AngularGrid::canonical_vertical())
}

/// Stacks `geometry.count` copies of a vertical element along the vertical
/// axis and evaluates the composite on `grid`.
pub fn compose_vertical_on(
    elemental: &ElementalPattern,
    geometry: &ArrayGeometry,
    wavelength_m: f64,
    grid: &AngularGrid,
) -> Result<CompositePattern> {
    check_inputs(elemental, CutType::Vrp, geometry, wavelength_m)?;

    let element = resample(elemental, grid)?;
    let spacing = geometry.effective_spacing_m(wavelength_m);
    let beta_deg =
        geometry.excitation_phase_deg + tilt_beta_deg(spacing, geometry.tilt_deg, wavelength_m);

    if geometry.count == 1 {
        return Ok(CompositePattern {
            pattern: element,
            geometry: geometry.clone(),
            wavelength_m,
            effective_spacing_m: spacing,
            beta_deg,
            ring_radius_m: None,
        });
    }

    let k = wave_number(wavelength_m);
    let beta = beta_deg.to_radians();
    let weights = geometry.weights();

    let angles = element.angles();
    let mut values: Vec<f64> = element
        .samples()
        .iter()
        .map(|s| {
            let psi = k * spacing * s.angle_deg.to_radians().sin() + beta;
            let sum: Complex64 = weights
                .iter()
                .enumerate()
                .map(|(i, &w)| Complex64::from_polar(w * s.amplitude, i as f64 * psi))
                .sum();
            sum.norm()
        })
        .collect();
    elemental.normalization().apply(&mut values);

    Ok(CompositePattern {
        pattern: ElementalPattern::from_grid(
            CutType::Vrp,
            elemental.normalization(),
            &angles,
            &values,
        ),
        geometry: geometry.clone(),
        wavelength_m,
        effective_spacing_m: spacing,
        beta_deg,
        ring_radius_m: None,
    })
}

pub fn compose_horizontal(
    elemental: &ElementalPattern,
    geometry: &ArrayGeometry,
    wavelength_m: f64,
) -> Result<CompositePattern> {
    compose_horizontal_on(
        elemental,
        geometry,
        wavelength_m,
        &AngularGrid::canonical_horizontal(),
    )
}

/// Places `geometry.count` elements on a ring, element `i` at azimuth
/// `i * 360/N + i * step_deg` and facing outward, and evaluates the
/// composite on `grid`.
///
/// Adjacent elements are `spacing` apart along the chord, so the phase
/// centre radius is `spacing / (2 sin(pi/N))`.
pub fn compose_horizontal_on(
    elemental: &ElementalPattern,
    geometry: &ArrayGeometry,
    wavelength_m: f64,
    grid: &AngularGrid,
) -> Result<CompositePattern> {
    check_inputs(elemental, CutType::Hrp, geometry, wavelength_m)?;

    let element = resample(elemental, grid)?;
    let spacing = geometry.effective_spacing_m(wavelength_m);
    let beta_deg = geometry.excitation_phase_deg;

    if geometry.count == 1 {
        return Ok(CompositePattern {
            pattern: element,
            geometry: geometry.clone(),
            wavelength_m,
            effective_spacing_m: spacing,
            beta_deg,
            ring_radius_m: None,
        });
    }

    let n = geometry.count;
    let k = wave_number(wavelength_m);
    let beta = beta_deg.to_radians();
    let weights = geometry.weights();
    let chord_radius = spacing / (2.0 * (PI / n as f64).sin());
    let positions_deg: Vec<f64> = (0..n)
        .map(|i| i as f64 * (360.0 / n as f64) + i as f64 * geometry.step_deg)
        .collect();

    let lookup = PatternInterpolator::new(&element)?;
    let angles = element.angles();
    let mut values: Vec<f64> = angles
        .iter()
        .map(|&phi_deg| {
            let sum: Complex64 = positions_deg
                .iter()
                .zip(&weights)
                .enumerate()
                .map(|(i, (&alpha_deg, &w))| {
                    let relative_deg = phi_deg - alpha_deg;
                    let gain = lookup.at(relative_deg.rem_euclid(360.0));
                    let phase = k * chord_radius * relative_deg.to_radians().cos() + i as f64 * beta;
                    Complex64::from_polar(w * gain, phase)
                })
                .sum();
            sum.norm()
        })
        .collect();
    elemental.normalization().apply(&mut values);

    Ok(CompositePattern {
        pattern: ElementalPattern::from_grid(
            CutType::Hrp,
            elemental.normalization(),
            &angles,
            &values,
        ),
        geometry: geometry.clone(),
        wavelength_m,
        effective_spacing_m: spacing,
        beta_deg,
        ring_radius_m: Some(spacing * n as f64 / (2.0 * PI)),
    })
}
