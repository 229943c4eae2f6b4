//! Observables aggregated from per-k eigenpairs
//!
//! Everything here is built on top of [`BandModel`](crate::model::BandModel)
//! and the [`ParallelEvaluator`](crate::parallel::ParallelEvaluator): per-k
//! work runs on the worker pool, the reduction (summation or histogram
//! binning) happens on the calling thread.
//!
//! - [`bands`]: windowed band energies, band structures along paths,
//!   DOS, joint DOS and energy-difference maps
//! - [`optics`]: interband velocity matrix elements, absorption, dynamic
//!   optical conductivity and resonant Raman amplitudes
//! - [`berry`]: Berry curvature and Chern numbers by the Kubo sum and by
//!   plaquette phases

pub mod bands;
pub mod berry;
pub mod optics;

pub use bands::{
    band_energies, band_structure, density_of_states, energy_difference_map,
    half_filling_energy, joint_density_of_states, path_energies, BandStructure, BandWindow,
    DensityOfStates, Histogram,
};
pub use berry::{chern_number_kubo, chern_number_plaquette, ChernResult};
pub use optics::{
    absorption, optical_conductivity, raman, raman_term_rows, transitions, AbsorptionSpectrum,
    ConductivitySpectrum, RamanParams, RamanSpectrum, Transition,
};
