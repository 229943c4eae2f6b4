//! Configuration management for twisted-bilayer calculations
//!
//! A YAML file selects the model and its parameters, the list of tasks to
//! run and the sampling used by each observable. Every optional field is
//! filled in by `with_defaults()`; CLI overrides are applied by the app.

mod args;

pub use args::Args;

use crate::model_impl::{ContinuumParams, TightBindingParams};
use crate::observables::BandWindow;
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub model: ModelConfig,
    #[serde(default)]
    pub tasks: Vec<Task>,
    pub observables: Option<ObservableParams>,
    pub parallel: Option<ParallelParams>,
    pub cache: Option<CacheParams>,
}

/// Model selection; the `type` field picks the variant.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelConfig {
    Continuum(ContinuumParams),
    TightBinding(TightBindingParams),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Bands,
    Dos,
    Jdos,
    Absorption,
    Conductivity,
    Raman,
    Chern,
    FermiVelocity,
    /// Band energies on a square patch around the first path vertex.
    Patch,
    /// `E_c − E_v` of one band pair over the grid.
    EnergyDifference,
}

/// Sampling and broadening for the observables. Energies in meV.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservableParams {
    /// Grid points along each reciprocal vector.
    pub kp_num: Option<usize>,
    /// Path points per unit length.
    pub path_density: Option<f64>,
    pub band_window: Option<BandWindow>,
    pub shift_to_half_filling: Option<bool>,
    pub dos_bins: Option<usize>,
    pub dos_range: Option<(f64, f64)>,
    /// Transition-energy range of the joint DOS; spans the data when unset.
    pub jdos_range: Option<(f64, f64)>,
    /// Valence and conduction bands used for optical transitions.
    pub num_half: Option<usize>,
    pub photon_energies: Option<Vec<f64>>,
    pub broadening: Option<f64>,
    pub conductivity_eta: Option<f64>,
    pub raman_photon_energy: Option<f64>,
    pub raman_phonon_energy: Option<f64>,
    pub raman_gamma: Option<f64>,
    pub raman_inner_transitions: Option<usize>,
    pub chern_band: Option<i32>,
    pub chern_kp_num: Option<usize>,
    /// Fraction of the K1 → M distance used for the tight-binding Fermi
    /// velocity.
    pub fermi_proportion: Option<f64>,
    /// Half-width of the patch in path units.
    pub patch_radius: Option<f64>,
    pub patch_density: Option<usize>,
    /// `(valence, conduction)`, both counted outwards from the gap.
    pub transition_pair: Option<(usize, usize)>,
}

impl Default for ObservableParams {
    fn default() -> Self {
        ObservableParams {
            kp_num: Some(70),
            path_density: Some(100.0),
            band_window: Some(BandWindow::default()),
            shift_to_half_filling: Some(true),
            dos_bins: Some(200),
            dos_range: None,
            jdos_range: None,
            num_half: Some(2),
            photon_energies: Some((1..=50).map(|i| 20.0 * i as f64).collect()),
            broadening: Some(100.0),
            conductivity_eta: Some(20.0),
            raman_photon_energy: Some(2000.0),
            raman_phonon_energy: Some(196.0),
            raman_gamma: Some(100.0),
            raman_inner_transitions: None,
            chern_band: Some(1),
            chern_kp_num: Some(30),
            fermi_proportion: Some(0.01),
            patch_radius: Some(0.1),
            patch_density: Some(20),
            transition_pair: Some((1, 1)),
        }
    }
}

impl ObservableParams {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        self.kp_num = self.kp_num.or(defaults.kp_num);
        self.path_density = self.path_density.or(defaults.path_density);
        self.band_window = self.band_window.or(defaults.band_window);
        self.shift_to_half_filling = self.shift_to_half_filling.or(defaults.shift_to_half_filling);
        self.dos_bins = self.dos_bins.or(defaults.dos_bins);
        self.num_half = self.num_half.or(defaults.num_half);
        if self.photon_energies.is_none() {
            self.photon_energies = defaults.photon_energies;
        }
        self.broadening = self.broadening.or(defaults.broadening);
        self.conductivity_eta = self.conductivity_eta.or(defaults.conductivity_eta);
        self.raman_photon_energy = self.raman_photon_energy.or(defaults.raman_photon_energy);
        self.raman_phonon_energy = self.raman_phonon_energy.or(defaults.raman_phonon_energy);
        self.raman_gamma = self.raman_gamma.or(defaults.raman_gamma);
        self.chern_band = self.chern_band.or(defaults.chern_band);
        self.chern_kp_num = self.chern_kp_num.or(defaults.chern_kp_num);
        self.fermi_proportion = self.fermi_proportion.or(defaults.fermi_proportion);
        self.patch_radius = self.patch_radius.or(defaults.patch_radius);
        self.patch_density = self.patch_density.or(defaults.patch_density);
        self.transition_pair = self.transition_pair.or(defaults.transition_pair);
        self
    }
}

/// Worker pool size. `None` lets the app pick (CLI flag, then
/// `SLURM_CPUS_PER_TASK`, then available parallelism).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ParallelParams {
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheParams {
    pub enabled: Option<bool>,
    pub directory: Option<String>,
    /// Recompute and overwrite cached entries.
    pub refresh: Option<bool>,
}

impl Default for CacheParams {
    fn default() -> Self {
        CacheParams {
            enabled: Some(true),
            directory: Some("cache".to_string()),
            refresh: Some(false),
        }
    }
}

impl CacheParams {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        self.enabled = self.enabled.or(defaults.enabled);
        if self.directory.is_none() {
            self.directory = defaults.directory;
        }
        self.refresh = self.refresh.or(defaults.refresh);
        self
    }
}

impl Config {
    /// Apply defaults to all configuration sections
    pub fn with_defaults(mut self) -> Self {
        self.observables = Some(self.observables.take().unwrap_or_default().with_defaults());
        self.parallel = Some(self.parallel.take().unwrap_or_default());
        self.cache = Some(self.cache.take().unwrap_or_default().with_defaults());
        if self.tasks.is_empty() {
            self.tasks = vec![Task::Bands];
        }
        self
    }

    pub fn observables(&self) -> ObservableParams {
        self.observables
            .clone()
            .unwrap_or_default()
            .with_defaults()
    }

    pub fn workers(&self) -> Option<usize> {
        self.parallel.as_ref().and_then(|p| p.workers)
    }

    pub fn is_cache_enabled(&self) -> bool {
        self.cache.as_ref().and_then(|c| c.enabled).unwrap_or(true)
    }

    pub fn cache_directory(&self) -> String {
        self.cache
            .as_ref()
            .and_then(|c| c.directory.clone())
            .unwrap_or_else(|| "cache".to_string())
    }

    pub fn is_cache_refresh(&self) -> bool {
        self.cache.as_ref().and_then(|c| c.refresh).unwrap_or(false)
    }
}
