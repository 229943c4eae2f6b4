//! Concrete band models.
//!
//! - [`ContinuumModel`]: plane-wave continuum Hamiltonian around the K
//!   valleys of both layers, coupled by the three inter-layer hopping
//!   matrices. k is measured in units of `|K_moire|`.
//! - [`TightBindingModel`]: atomistic Hamiltonian of a commensurate
//!   supercell labelled by `(m0, r)`. k is in Å⁻¹.

mod continuum;
mod tight_binding;
#[cfg(test)]
mod tests;

pub use continuum::{
    b_minus, b_plus, gamma, gamma_shifted, k_bottom, k_top, m_point, ContinuumModel,
    ContinuumParams,
};
pub use tight_binding::{
    commensurate_angle, SupercellGeometry, TightBindingModel, TightBindingParams,
};
