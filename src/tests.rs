use approx::{assert_relative_eq, assert_abs_diff_eq};

use crate::cable::{interpolate_attenuation, total_cable_loss, CableAttenuationCurve};
use crate::composer::compose_project;
use crate::error::PatternError;
use crate::io::Project;
use crate::metrics::hpbw;
use crate::pattern::{AngularGrid, AngularSample, CutType, ElementalPattern, Normalization};
use crate::physics::array_factor::{compose_horizontal, compose_vertical, ArrayGeometry};
use crate::physics::resample::{resample, resample_canonical};
use crate::physics::sparams;
use crate::units::{db_to_power, power_to_db, wavelength_m};

fn cardioid_hrp(step: usize) -> ElementalPattern {
    ElementalPattern::new(
        CutType::Hrp,
        (0..360).step_by(step).map(|a| {
            let phi = f64::from(a as u32);
            AngularSample::new(phi, (1.0 + phi.to_radians().cos()) / 2.0)
        }),
    )
    .with_normalization(Normalization::Max)
}

fn cosine_vrp(step: usize) -> ElementalPattern {
    ElementalPattern::new(
        CutType::Vrp,
        (-90i32..=90).step_by(step).map(|a| {
            let theta = f64::from(a);
            AngularSample::new(theta, theta.to_radians().cos())
        }),
    )
    .with_normalization(Normalization::Max)
}

#[test]
fn test_resampling_is_idempotent() {
    let grid = AngularGrid::canonical_horizontal();
    let once = resample(&cardioid_hrp(7), &grid).unwrap();
    let twice = resample(&once, &grid).unwrap();
    assert_eq!(once.len(), twice.len());
    for (a, b) in once.amplitudes().iter().zip(twice.amplitudes()) {
        assert_abs_diff_eq!(*a, b, epsilon = 1e-9);
    }

    let vgrid = AngularGrid::vertical(0.1).unwrap();
    let once = resample(&cosine_vrp(5), &vgrid).unwrap();
    let twice = resample(&once, &vgrid).unwrap();
    for (a, b) in once.amplitudes().iter().zip(twice.amplitudes()) {
        assert_abs_diff_eq!(*a, b, epsilon = 1e-9);
    }
}

#[test]
fn test_single_element_equals_resampled_element() {
    let single = ArrayGeometry::new(1).unwrap().with_spacing(3.0).with_excitation_phase(45.0);

    let vrp = cosine_vrp(5);
    let composite = compose_vertical(&vrp, &single, 0.5).unwrap();
    assert_eq!(composite.pattern(), &resample_canonical(&vrp).unwrap());

    let hrp = cardioid_hrp(10);
    let composite = compose_horizontal(&hrp, &single, 0.5).unwrap();
    assert_eq!(composite.pattern(), &resample_canonical(&hrp).unwrap());
}

#[test]
fn test_hpbw_narrows_with_element_count() {
    let element = ElementalPattern::omnidirectional(CutType::Vrp);
    let widths: Vec<f64> = [2, 4, 8]
        .iter()
        .map(|&n| {
            let geometry = ArrayGeometry::new(n).unwrap();
            let c = compose_vertical(&element, &geometry, 1.0).unwrap();
            hpbw(&c.angles(), &c.amplitudes()).unwrap()
        })
        .collect();

    // two elements at half a wavelength: |cos(pi/2 sin theta)| halves power at 30 deg
    assert_abs_diff_eq!(widths[0], 60.0, epsilon = 0.5);
    assert!(widths[0] > widths[1]);
    assert!(widths[1] > widths[2]);
}

#[test]
fn test_isotropic_element_has_no_beamwidth() {
    let element = ElementalPattern::omnidirectional(CutType::Hrp);
    let c = compose_horizontal(&element, &ArrayGeometry::default(), 1.0).unwrap();
    assert!(matches!(
        hpbw(&c.angles(), &c.amplitudes()),
        Err(PatternError::NoCrossingFound { .. })
    ));
}

#[test]
fn test_db_round_trip() {
    let mut x = 1e-6;
    while x < 1e6 {
        assert_relative_eq!(db_to_power(power_to_db(x)), x, max_relative = 1e-6);
        x *= 3.7;
    }
}

#[test]
fn test_sparameter_sanity() {
    let s = sparams::from_linear_phase(0.5, -45.0).unwrap();
    assert_abs_diff_eq!(s.return_loss_db, 6.021, epsilon = 1e-3);
    assert_abs_diff_eq!(s.vswr, 3.000, epsilon = 1e-9);
}

#[test]
fn test_single_point_cable_budget() {
    let curve = CableAttenuationCurve::new([(500.0, 5.2)]);
    let at_point = total_cable_loss(&curve, 500.0, 80.0, &[0.20, 0.15]).unwrap();
    assert_abs_diff_eq!(at_point.total_db, 4.510, epsilon = 1e-9);
    assert!(!at_point.interpolation.extrapolated);
    assert!(interpolate_attenuation(&curve, 100.0).unwrap().extrapolated);
}

#[test]
fn test_cable_interpolation_is_idempotent() {
    let curve = CableAttenuationCurve::new([(50.0, 1.5), (150.0, 2.7), (450.0, 4.9), (900.0, 7.2)]);
    for f in [30.0, 75.0, 150.0, 600.0, 2000.0] {
        let a = interpolate_attenuation(&curve, f).unwrap();
        let b = interpolate_attenuation(&curve, f).unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn test_two_element_stack_single_main_lobe() {
    let lambda = wavelength_m(600.0).unwrap();
    let geometry = ArrayGeometry::new(2).unwrap().with_spacing(lambda / 2.0);
    let c = compose_vertical(&ElementalPattern::omnidirectional(CutType::Vrp), &geometry, lambda).unwrap();
    let angles = c.angles();
    let values = c.amplitudes();

    let peak = c.pattern().peak().unwrap();
    assert_eq!(peak.angle_deg, 0.0);
    assert_abs_diff_eq!(peak.amplitude, 2.0, epsilon = 1e-12);

    // the only zeros sit at the +-90 deg edges
    for (i, a) in angles.iter().enumerate() {
        if a.abs() < 90.0 {
            assert!(values[i] > 1e-6, "spurious null at {a}");
        }
    }
    // monotonic away from boresight on both sides
    let centre = angles.iter().position(|&a| a == 0.0).unwrap();
    assert!(values[centre..].windows(2).all(|w| w[1] <= w[0]));
    assert!(values[..=centre].windows(2).all(|w| w[1] >= w[0]));
}

#[test]
fn test_full_composition() {
    let mut project = Project::new("panel stack", 600.0, 1000.0);
    project.nominal_gain_db = 10.0;
    project.hrp = Some(cardioid_hrp(10));
    project.vrp = Some(cosine_vrp(5));
    project.vertical = ArrayGeometry::new(8).unwrap();
    project.losses.misc_db = vec![1.0];

    let result = compose_project(&project).unwrap();
    let erp = &result.erp;

    assert_eq!(erp.angles_deg.len(), 360);
    assert_eq!(erp.vertical_angles_deg.len(), 181);
    assert_eq!(erp.peak_azimuth_deg(), Some(0.0));
    assert_relative_eq!(erp.vertical_scalar, 1.0, epsilon = 1e-12);
    assert_relative_eq!(erp.peak_erp_w(), 1000.0 * db_to_power(9.0), max_relative = 1e-9);
    assert_abs_diff_eq!(erp.peak_erp_dbw(), 39.0, epsilon = 1e-9);
    assert!(erp.erp_w[180] < erp.erp_w[0] * 1e-3);

    let h = erp.metrics.horizontal;
    let v = erp.metrics.vertical;
    let h_width = h.hpbw_deg.unwrap();
    assert!((120.0..140.0).contains(&h_width), "h hpbw {h_width}");
    assert!(v.hpbw_deg.unwrap() < 20.0);
    assert!(erp.metrics.estimated_gain_dbi.unwrap() > 10.0);
    assert!(h.front_to_back_db.unwrap() > 20.0);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["erp"]["erp_dbw"].as_array().map(Vec::len), Some(360));
    assert_eq!(json["effective_v_spacing_m"].as_f64(), Some(result.wavelength_m / 2.0));
}
