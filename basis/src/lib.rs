//! Finite bases for twisted bilayer graphene: plane-wave components of the
//! continuum model and lattice indices of the tight-binding supercell.

pub mod basis;
pub mod continuum;
mod error;
pub mod lattice;


pub use basis::{BasisSet, BasisVector, Hop, Layer};
pub use error::BasisError;
pub use lattice::{LatticeIndex, LatticeIndexSet};
