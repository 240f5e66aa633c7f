use crate::error::{PatternError, Result};
use crate::pattern::{AngularGrid, AngularSample, ElementalPattern};

/// Linear interpolator over one pattern cut.
///
/// Horizontal cuts are interpolated circularly: the samples are replicated one
/// turn below and one turn above so that queries near 0/360 deg see both
/// neighbours. Vertical cuts hold the edge value outside the covered range.
#[derive(Debug, Clone)]
pub struct PatternInterpolator {
    angles: Vec<f64>,
    values: Vec<f64>,
}

impl PatternInterpolator {
    pub fn new(pattern: &ElementalPattern) -> Result<Self> {
        // samples are unique after preparation, so len() counts distinct angles
        if pattern.len() < 2 {
            return Err(PatternError::InsufficientSamples {
                context: "resample",
                needed: 2,
                found: pattern.len(),
            });
        }

        let src_angles = pattern.angles();
        let src_values = pattern.amplitudes();

        if !pattern.cut().is_circular() {
            return Ok(Self {
                angles: src_angles,
                values: src_values,
            });
        }

        let mut angles = Vec::with_capacity(src_angles.len() * 3);
        let mut values = Vec::with_capacity(src_values.len() * 3);
        for offset in [-360.0, 0.0, 360.0] {
            for (a, v) in src_angles.iter().zip(&src_values) {
                let shifted = a + offset;
                // a pattern given on -180..=180 repeats its seam sample one turn later
                if angles.last().is_some_and(|&last: &f64| shifted - last < 1e-9) {
                    continue;
                }
                angles.push(shifted);
                values.push(*v);
            }
        }

        Ok(Self { angles, values })
    }

    pub fn at(&self, angle_deg: f64) -> f64 {
        let xs = &self.angles;
        let ys = &self.values;
        let i = xs.partition_point(|&a| a <= angle_deg);
        if i == 0 {
            return ys[0];
        }
        if i == xs.len() {
            return ys[xs.len() - 1];
        }
        let (x0, x1) = (xs[i - 1], xs[i]);
        let t = (angle_deg - x0) / (x1 - x0);
        ys[i - 1] + t * (ys[i] - ys[i - 1])
    }
}

/// Resamples `pattern` onto `grid`, then applies the pattern's normalization.
pub fn resample(pattern: &ElementalPattern, grid: &AngularGrid) -> Result<ElementalPattern> {
    let interpolator = PatternInterpolator::new(pattern)?;
    let targets = grid.angles();

    let mut values: Vec<f64> = targets.iter().map(|&a| interpolator.at(a)).collect();
    pattern.normalization().apply(&mut values);

    let cut = pattern.cut();
    if cut.is_circular() {
        // wrap only once the values are known
        let samples = targets
            .iter()
            .zip(&values)
            .map(|(&a, &v)| AngularSample::new(a.rem_euclid(360.0), v));
        Ok(ElementalPattern::new(cut, samples).with_normalization(pattern.normalization()))
    } else {
        Ok(ElementalPattern::from_grid(
            cut,
            pattern.normalization(),
            &targets,
            &values,
        ))
    }
}

pub fn resample_canonical(pattern: &ElementalPattern) -> Result<ElementalPattern> {
    resample(pattern, &pattern.cut().canonical_grid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{CutType, Normalization};
    use approx::assert_abs_diff_eq;

    fn hrp(points: &[(f64, f64)]) -> ElementalPattern {
        ElementalPattern::new(CutType::Hrp, points.iter().map(|&p| p.into()))
    }

    #[test]
    fn test_circular_interpolation_wraps() {
        let p = hrp(&[(10.0, 1.0), (350.0, 3.0)]);
        let interp = PatternInterpolator::new(&p).unwrap();
        // 0 deg lies halfway between 350 and 370 (= 10)
        assert_abs_diff_eq!(interp.at(0.0), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(interp.at(180.0), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_seam_duplicate_is_dropped() {
        let p = hrp(&[(-180.0, 1.0), (0.0, 2.0), (180.0, 1.0)]);
        let out = resample(&p, &AngularGrid::canonical_horizontal()).unwrap();
        assert_eq!(out.len(), 360);
        assert_abs_diff_eq!(out.amplitudes()[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.amplitudes()[180], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_negative_grid_start_is_wrapped_and_sorted() {
        let p = hrp(&[(0.0, 1.0), (90.0, 0.5), (180.0, 0.25), (270.0, 0.5)]);
        let grid = AngularGrid::new(-180.0, 1.0, 360).unwrap();
        let out = resample(&p, &grid).unwrap();
        let angles = out.angles();
        assert_eq!(angles.first().copied(), Some(0.0));
        assert_eq!(angles.last().copied(), Some(359.0));
        assert_abs_diff_eq!(out.amplitudes()[90], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_vertical_holds_edges() {
        let p = ElementalPattern::new(
            CutType::Vrp,
            vec![(-10.0, 0.2).into(), (10.0, 0.6).into()],
        );
        let out = resample_canonical(&p).unwrap();
        let v = out.amplitudes();
        assert_eq!(v.len(), 181);
        assert_abs_diff_eq!(v[0], 0.2);
        assert_abs_diff_eq!(v[180], 0.6);
        assert_abs_diff_eq!(v[90], 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_single_sample_is_rejected() {
        let p = hrp(&[(0.0, 1.0), (0.0, 2.0)]);
        let err = resample_canonical(&p).unwrap_err();
        assert_eq!(
            err,
            PatternError::InsufficientSamples {
                context: "resample",
                needed: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_max_normalization_after_interpolation() {
        let p = hrp(&[(0.0, 4.0), (180.0, 2.0)]).with_normalization(Normalization::Max);
        let out = resample_canonical(&p).unwrap();
        assert_abs_diff_eq!(out.amplitudes()[0], 1.0);
        assert_abs_diff_eq!(out.amplitudes()[180], 0.5);
    }
}
