use crate::model::BandModel;
use crate::observables::{
    AbsorptionSpectrum, BandStructure, ChernResult, ConductivitySpectrum, DensityOfStates,
    RamanSpectrum,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Everything a run computed, in the shape written by `--export`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Report {
    pub model: String,
    pub twist_angle: f64,
    pub dimension: usize,
    pub unit_cell_area: f64,
    pub bands: Option<BandStructure>,
    pub dos: Option<DensityOfStates>,
    pub jdos: Option<DensityOfStates>,
    pub absorption: Option<AbsorptionSpectrum>,
    pub conductivity: Option<ConductivitySpectrum>,
    pub raman: Option<RamanSpectrum>,
    pub chern: Vec<ChernResult>,
    pub fermi_velocity: Option<f64>,
    /// Windowed energies on the patch, `t` varying fastest.
    pub patch: Option<Vec<Vec<f64>>>,
    pub energy_difference: Option<Vec<f64>>,
}

impl Report {
    pub fn new(model: &dyn BandModel) -> Self {
        Report {
            model: model.name().to_string(),
            twist_angle: model.twist_angle(),
            dimension: model.dimension(),
            unit_cell_area: model.unit_cell_area(),
            ..Report::default()
        }
    }
}

pub fn report_summary(report: &Report) {
    info!("\n===========================================");
    info!("        Results Summary");
    info!("===========================================");
    info!("Model:              {}", report.model);
    info!("Twist angle:        {:.6}°", report.twist_angle);
    info!("Hamiltonian size:   {}", report.dimension);
    info!("Unit cell area:     {:.4} Å²", report.unit_cell_area);

    if let Some(bands) = &report.bands {
        info!(
            "Bands:              {} points, {} bands, shifted by {:.4} meV",
            bands.energies.len(),
            bands.energies.first().map_or(0, Vec::len),
            bands.half_filling_energy
        );
    }
    if let Some(dos) = &report.dos {
        report_peak("DOS", dos);
    }
    if let Some(jdos) = &report.jdos {
        report_peak("JDOS", jdos);
    }
    if let Some(absorption) = &report.absorption {
        if let Some((energy, value)) = absorption
            .photon_energies
            .iter()
            .zip(absorption.absorption.iter())
            .max_by(|a, b| a.1.total_cmp(b.1))
        {
            info!("Absorption peak:    {:.6e} at {:.2} meV", value, energy);
        }
    }
    if let Some(conductivity) = &report.conductivity {
        if let Some((energy, value)) = conductivity
            .photon_energies
            .iter()
            .zip(conductivity.sigma_xx.iter())
            .max_by(|a, b| a.1.total_cmp(b.1))
        {
            info!("σ_xx / σ0 peak:     {:.6} at {:.2} meV", value, energy);
        }
    }
    if let Some(raman) = &report.raman {
        info!("Raman intensity:    {:.6e}", raman.intensity);
    }
    for chern in &report.chern {
        info!(
            "Chern number:       {:+.4} (band {}, {}² grid)",
            chern.chern, chern.band, chern.kp_num
        );
    }
    if let Some(v) = report.fermi_velocity {
        info!("Fermi velocity:     {:.4e} m/s", v);
    }
    if let Some(patch) = &report.patch {
        info!("Patch:              {} points", patch.len());
    }
    if let Some(map) = &report.energy_difference {
        let lowest = map.iter().copied().fold(f64::INFINITY, f64::min);
        info!("Smallest gap:       {:.4} meV over {} points", lowest, map.len());
    }
    info!("===========================================\n");
}

fn report_peak(name: &str, dos: &DensityOfStates) {
    if let Some((energy, value)) = dos
        .energies
        .iter()
        .zip(dos.density.iter())
        .max_by(|a, b| a.1.total_cmp(b.1))
    {
        info!("{:<20}peak {:.6e} at {:.2} meV", format!("{}:", name), value, energy);
    }
}
