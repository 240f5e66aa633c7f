use serde::Serialize;
use tracing::{debug, info};

use crate::cable::CableLoss;
use crate::error::Result;
use crate::io::Project;
use crate::pattern::{AngularGrid, CutType, ElementalPattern, Normalization};
use crate::physics::array_factor::{compose_horizontal_on, compose_vertical_on, CompositePattern};
use crate::physics::erp::{compute_erp, Calibration, ErpResult, LossBreakdown};
use crate::units::wavelength_m;

/// Everything a composition run produces, ready for serialization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionResult {
    pub name: String,
    pub frequency_mhz: f64,
    pub wavelength_m: f64,
    pub effective_h_spacing_m: f64,
    pub effective_v_spacing_m: f64,
    pub h_beta_deg: f64,
    pub v_beta_deg: f64,
    pub ring_radius_m: Option<f64>,
    pub losses: LossBreakdown,
    pub feeder: Option<CableLoss>,
    pub erp: ErpResult,
}

fn element_or_omni(pattern: Option<&ElementalPattern>, cut: CutType) -> ElementalPattern {
    match pattern {
        Some(p) => p.clone(),
        None => {
            debug!(?cut, "no pattern supplied, using an omnidirectional element");
            ElementalPattern::omnidirectional(cut).with_normalization(Normalization::Max)
        }
    }
}

pub fn compose_planes(project: &Project) -> Result<(CompositePattern, CompositePattern)> {
    let lambda = wavelength_m(project.frequency_mhz)?;
    let hrp = element_or_omni(project.hrp.as_ref(), CutType::Hrp);
    let vrp = element_or_omni(project.vrp.as_ref(), CutType::Vrp);

    let h_grid = AngularGrid::horizontal(project.options.horizontal_step_deg)?;
    let v_grid = AngularGrid::vertical(project.options.vertical_step_deg)?;

    let horizontal = compose_horizontal_on(&hrp, &project.horizontal, lambda, &h_grid)?;
    let vertical = compose_vertical_on(&vrp, &project.vertical, lambda, &v_grid)?;
    Ok((horizontal, vertical))
}

/// Runs the whole chain for one project: compose both planes, resolve the
/// feeder loss, then integrate ERP.
pub fn compose_project(project: &Project) -> Result<CompositionResult> {
    info!(project = %project.name, frequency_mhz = project.frequency_mhz, "composing");

    let (horizontal, vertical) = compose_planes(project)?;
    debug!(
        h_count = project.horizontal.count,
        v_count = project.vertical.count,
        h_spacing = horizontal.effective_spacing_m(),
        v_spacing = vertical.effective_spacing_m(),
        v_beta = vertical.beta_deg(),
        "array factors applied"
    );

    let feeder = project
        .feeder
        .as_ref()
        .map(|f| f.cable.loss(project.frequency_mhz, f.length_m, &f.connectors_db))
        .transpose()?;

    let mut losses = project.losses.clone();
    if let Some(feeder) = &feeder {
        losses.feeder_db = feeder.total_db;
    }

    let calibration = project.calibration.clone().map(|table| Calibration {
        table,
        frequency_mhz: project.frequency_mhz,
    });

    let erp = compute_erp(
        &horizontal,
        &vertical,
        project.tx_power_w,
        &losses.entries(),
        project.nominal_gain_db,
        calibration.as_ref(),
    )?;

    info!(
        peak_erp_dbw = erp.peak_erp_dbw(),
        total_losses_db = erp.total_losses_db,
        "composition done"
    );

    Ok(CompositionResult {
        name: project.name.clone(),
        frequency_mhz: project.frequency_mhz,
        wavelength_m: horizontal.wavelength_m(),
        effective_h_spacing_m: horizontal.effective_spacing_m(),
        effective_v_spacing_m: vertical.effective_spacing_m(),
        h_beta_deg: horizontal.beta_deg(),
        v_beta_deg: vertical.beta_deg(),
        ring_radius_m: horizontal.ring_radius_m(),
        losses,
        feeder,
        erp,
    })
}
