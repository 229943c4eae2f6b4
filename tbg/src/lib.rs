//! Band structures and optical and topological observables of twisted
//! bilayer graphene, from a continuum or an atomistic tight-binding model.

pub mod app;
pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod io;
pub mod model;
pub mod model_impl;
pub mod observables;
pub mod parallel;
pub mod sampler;

pub use cache::{cache_key, CachedArray, MemoryCache, PickleCache, ResultCache};
pub use error::{Result, Stage, TbgError};
pub use model::{BandModel, EigenPairs, Hamiltonian, KPoint};
pub use model_impl::{ContinuumModel, ContinuumParams, TightBindingModel, TightBindingParams};
pub use parallel::{ChunkResult, ParallelEvaluator};
