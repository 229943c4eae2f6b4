use crate::config::{Config, ModelConfig};
use crate::error::Result;
use crate::model::BandModel;
use crate::model_impl::{ContinuumModel, TightBindingModel};
use crate::parallel::ParallelEvaluator;
use crate::sampler::HighSymmetryPath;
use tracing::{info, warn};

/// Environment variable consulted for the worker count on batch clusters.
pub const SLURM_CPUS_VAR: &str = "SLURM_CPUS_PER_TASK";

/// The configured model together with the model-specific extras that sit
/// outside [`BandModel`].
pub enum BuiltModel {
    Continuum(ContinuumModel),
    TightBinding(TightBindingModel),
}

impl BuiltModel {
    pub fn as_band_model(&self) -> &dyn BandModel {
        match self {
            BuiltModel::Continuum(model) => model,
            BuiltModel::TightBinding(model) => model,
        }
    }

    pub fn default_path(&self) -> HighSymmetryPath {
        match self {
            BuiltModel::Continuum(_) => ContinuumModel::default_path(),
            BuiltModel::TightBinding(model) => model.default_path(),
        }
    }

    pub fn raman_path(&self) -> HighSymmetryPath {
        match self {
            BuiltModel::Continuum(_) => ContinuumModel::raman_path(),
            BuiltModel::TightBinding(model) => model.default_path(),
        }
    }

    /// In m/s. `proportion` is only used by the tight-binding model.
    pub fn fermi_velocity(&self, proportion: f64) -> Result<f64> {
        match self {
            BuiltModel::Continuum(model) => model.fermi_velocity(),
            BuiltModel::TightBinding(model) => model.fermi_velocity(proportion),
        }
    }
}

pub fn build_model(config: &Config) -> Result<BuiltModel> {
    let model = match &config.model {
        ModelConfig::Continuum(params) => {
            info!(
                "Building continuum model: θ = {}°, w = {} meV, {} hops",
                params.twist_angle, params.interlayer_coupling, params.loop_times
            );
            BuiltModel::Continuum(ContinuumModel::new(params.clone())?)
        }
        ModelConfig::TightBinding(params) => {
            info!("Building tight-binding model: m0 = {}, r = {}", params.m0, params.r);
            BuiltModel::TightBinding(TightBindingModel::new(params.clone())?)
        }
    };
    info!("Hamiltonian dimension: {}", model.as_band_model().dimension());
    Ok(model)
}

/// Explicit request first, then the batch-scheduler variable, then the
/// available parallelism.
pub fn resolve_workers(requested: Option<usize>, scheduler: Option<&str>) -> usize {
    if let Some(workers) = requested.filter(|&w| w > 0) {
        return workers;
    }
    if let Some(value) = scheduler {
        match value.trim().parse::<usize>() {
            Ok(workers) if workers > 0 => return workers,
            _ => warn!("Ignoring {}={:?}", SLURM_CPUS_VAR, value),
        }
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

pub fn build_evaluator(requested: Option<usize>) -> Result<ParallelEvaluator> {
    let scheduler = std::env::var(SLURM_CPUS_VAR).ok();
    let workers = resolve_workers(requested, scheduler.as_deref());
    info!("Using {} worker threads", workers);
    ParallelEvaluator::new(workers)
}
