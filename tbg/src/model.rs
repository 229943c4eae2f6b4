//! The band-model abstraction shared by the continuum and tight-binding
//! Hamiltonians, and the sorted eigen-decomposition built on top of it.

use crate::error::{Result, Stage, TbgError};
use nalgebra::{DMatrix, DVector, DVectorView, Vector2};
use num_complex::Complex;
use std::cmp::Ordering;

pub type KPoint = Vector2<f64>;
pub type Hamiltonian = DMatrix<Complex<f64>>;

const EIGEN_SWEEPS_PER_DIM: usize = 64;

/// A k-dependent Hermitian Hamiltonian of fixed dimension.
///
/// Implementors hold only immutable, precomputed data so a single instance
/// can be shared by reference across the worker pool.
pub trait BandModel: Send + Sync {
    /// Short identifier used in cache keys, e.g. `"continuum"`.
    fn name(&self) -> &'static str;

    /// Twist angle in degrees.
    fn twist_angle(&self) -> f64;

    fn dimension(&self) -> usize;

    fn hamiltonian(&self, k: &KPoint) -> Hamiltonian;

    /// Primitive vectors of the Brillouin zone in the model's k units.
    fn grid_vectors(&self) -> (KPoint, KPoint);

    /// Real-space unit cell area in Å².
    fn unit_cell_area(&self) -> f64;

    /// Å⁻¹ per unit of the model's k coordinates.
    fn momentum_scale(&self) -> f64;

    /// Length of one "unit" along a high-symmetry path, in the model's k
    /// coordinates. Path densities are given per unit.
    fn path_unit(&self) -> f64 {
        1.0
    }

    /// Finite-difference step in the model's k coordinates.
    fn interval_k(&self) -> f64;

    fn valley_degeneracy(&self) -> f64;

    fn eigen(&self, k: &KPoint) -> Result<EigenPairs> {
        EigenPairs::from_hamiltonian(self.hamiltonian(k))
    }

    /// `H(k)` together with forward differences `∂H/∂k_x`, `∂H/∂k_y` in
    /// meV·Å.
    fn derivatives(&self, k: &KPoint) -> Derivatives {
        let step = self.interval_k();
        let scale = step * self.momentum_scale();
        let h = self.hamiltonian(k);
        let dx = (self.hamiltonian(&(k + KPoint::new(step, 0.0))) - &h) / Complex::from(scale);
        let dy = (self.hamiltonian(&(k + KPoint::new(0.0, step))) - &h) / Complex::from(scale);
        Derivatives { h, dx, dy }
    }
}

pub struct Derivatives {
    pub h: Hamiltonian,
    pub dx: Hamiltonian,
    pub dy: Hamiltonian,
}

/// Eigenvalues in ascending order with eigenvector columns in the same
/// order.
#[derive(Debug, Clone)]
pub struct EigenPairs {
    pub energies: DVector<f64>,
    pub states: DMatrix<Complex<f64>>,
}

impl EigenPairs {
    pub fn from_hamiltonian(h: Hamiltonian) -> Result<Self> {
        if h.nrows() != h.ncols() {
            return Err(TbgError::DimensionMismatch {
                context: "Hamiltonian".to_string(),
                expected: h.nrows(),
                found: h.ncols(),
            });
        }
        if !h.iter().all(|z| z.re.is_finite() && z.im.is_finite()) {
            return Err(TbgError::Numerical {
                stage: Stage::HamiltonianAssembly,
                message: "Hamiltonian has non-finite entries".to_string(),
            });
        }

        let dim = h.nrows();
        let eig = h
            .try_symmetric_eigen(f64::EPSILON, EIGEN_SWEEPS_PER_DIM * dim.max(1))
            .ok_or_else(|| TbgError::Numerical {
                stage: Stage::EigenDecomposition,
                message: format!("no convergence for a {}x{} Hamiltonian", dim, dim),
            })?;

        let mut indices: Vec<usize> = (0..dim).collect();
        indices.sort_by(|&a, &b| {
            eig.eigenvalues[a]
                .partial_cmp(&eig.eigenvalues[b])
                .unwrap_or(Ordering::Equal)
        });

        let energies = DVector::from_iterator(dim, indices.iter().map(|&i| eig.eigenvalues[i]));
        let states = eig.eigenvectors.select_columns(&indices);
        Ok(EigenPairs { energies, states })
    }

    pub fn len(&self) -> usize {
        self.energies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energies.is_empty()
    }

    /// Index of the lowest conduction band at half filling.
    pub fn mid(&self) -> usize {
        self.len() / 2
    }

    pub fn state(&self, index: usize) -> DVectorView<'_, Complex<f64>> {
        self.states.column(index)
    }

    /// Energies of bands `mid + lower .. mid + upper`.
    pub fn window(&self, lower: isize, upper: isize) -> Result<Vec<f64>> {
        let (start, end) = self.window_bounds(lower, upper)?;
        Ok(self.energies.as_slice()[start..end].to_vec())
    }

    fn window_bounds(&self, lower: isize, upper: isize) -> Result<(usize, usize)> {
        let mid = self.mid() as isize;
        let (start, end) = (mid + lower, mid + upper);
        if lower >= upper || start < 0 || end > self.len() as isize {
            return Err(TbgError::invalid(
                "band_window",
                format!(
                    "window [{}, {}) does not fit {} bands around {}",
                    lower,
                    upper,
                    self.len(),
                    mid
                ),
            ));
        }
        Ok((start as usize, end as usize))
    }

    /// Valence band indices from the top of the valence band downwards.
    pub fn valence(&self, count: usize) -> Result<Vec<usize>> {
        let mid = self.mid();
        if count > mid {
            return Err(TbgError::invalid(
                "num_half",
                format!("{} valence bands requested, {} available", count, mid),
            ));
        }
        Ok((0..count).map(|i| mid - 1 - i).collect())
    }

    /// Conduction band indices from the bottom of the conduction band upwards.
    pub fn conduction(&self, count: usize) -> Result<Vec<usize>> {
        let mid = self.mid();
        if mid + count > self.len() {
            return Err(TbgError::invalid(
                "num_half",
                format!(
                    "{} conduction bands requested, {} available",
                    count,
                    self.len() - mid
                ),
            ));
        }
        Ok((mid..mid + count).collect())
    }

    /// Band `+1` is the lowest conduction band, `-1` the highest valence
    /// band. Zero is rejected.
    pub fn band_index(&self, band: i32) -> Result<usize> {
        let mid = self.mid() as i64;
        let index = match band.cmp(&0) {
            Ordering::Greater => mid + band as i64 - 1,
            Ordering::Less => mid + band as i64,
            Ordering::Equal => {
                return Err(TbgError::invalid("band", "band index must be non-zero"))
            }
        };
        if index < 0 || index >= self.len() as i64 {
            return Err(TbgError::invalid(
                "band",
                format!("band {} is outside the {} computed bands", band, self.len()),
            ));
        }
        Ok(index as usize)
    }
}
