//! Berry curvature and Chern numbers of an isolated band.
//!
//! Two independent estimates over the same half-open grid:
//!
//! - Kubo sum: `Ω_n = i Σ_{m≠n} (⟨n|∂ₓH|m⟩⟨m|∂ᵧH|n⟩ − (x↔y)) / (E_n − E_m)²`
//!   from finite-difference Hamiltonian derivatives. Near-degenerate bands
//!   make the denominator blow up; no regularization is applied, so choose
//!   a band separated by a gap.
//! - Plaquette sum: the phase of the product of normalized overlaps around
//!   each grid cell, which is gauge invariant and integer-valued once the
//!   grid resolves the curvature.
//!
//! Both use the grid orientation given by `v1 × v2`, so they agree in sign.

use crate::error::{Result, Stage, TbgError};
use crate::model::{BandModel, EigenPairs, KPoint};
use crate::parallel::ParallelEvaluator;
use crate::sampler::uniform_grid;
use nalgebra::DVector;
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChernResult {
    pub band: i32,
    pub kp_num: usize,
    /// Curvature (Kubo) or plaquette phase, per grid point.
    pub curvature: Vec<f64>,
    pub chern: f64,
}

/// Berry curvature of `band` at `k` in Å², from the Kubo sum.
pub fn berry_curvature<M: BandModel + ?Sized>(model: &M, k: &KPoint, band: i32) -> Result<f64> {
    let derivatives = model.derivatives(k);
    let eig = EigenPairs::from_hamiltonian(derivatives.h)?;
    let n = eig.band_index(band)?;
    let state = eig.state(n);
    let dx_n: DVector<Complex<f64>> = &derivatives.dx * state;
    let dy_n: DVector<Complex<f64>> = &derivatives.dy * state;

    let mut sum = Complex::new(0.0, 0.0);
    for m in (0..eig.len()).filter(|&m| m != n) {
        let other = eig.state(m);
        // ⟨n|X|m⟩ = conj(⟨m|X|n⟩) for Hermitian X
        let x_mn = other.dotc(&dx_n);
        let y_mn = other.dotc(&dy_n);
        let gap = eig.energies[n] - eig.energies[m];
        sum += (x_mn.conj() * y_mn - y_mn.conj() * x_mn) / (gap * gap);
    }
    Ok((Complex::<f64>::i() * sum).re)
}

/// `Σ Ω · 2π / (N_k A)` over a `kp_num × kp_num` grid.
pub fn chern_number_kubo<M: BandModel + ?Sized>(
    model: &M,
    evaluator: &ParallelEvaluator,
    kp_num: usize,
    band: i32,
) -> Result<ChernResult> {
    let grid = chern_grid(model, kp_num)?;
    info!("Chern number (Kubo) of band {} on a {}² grid", band, kp_num);
    let curvature = evaluator.evaluate(&grid, |k| berry_curvature(model, k, band))?;
    let n_k = grid.len() as f64;
    let chern = curvature.iter().sum::<f64>() * 2.0 * PI / (n_k * model.unit_cell_area());
    Ok(ChernResult {
        band,
        kp_num,
        curvature,
        chern,
    })
}

/// Berry phase `Re(i ln P)` around the plaquette `k → k+δ1 → k+δ1+δ2 →
/// k+δ2`, where `P = U1(k) U2(k+δ1) / (U1(k+δ2) U2(k))`.
pub fn plaquette_phase<M: BandModel + ?Sized>(
    model: &M,
    k: &KPoint,
    delta1: &KPoint,
    delta2: &KPoint,
    band: i32,
) -> Result<f64> {
    let corner = |p: KPoint| -> Result<DVector<Complex<f64>>> {
        let eig = model.eigen(&p)?;
        let index = eig.band_index(band)?;
        Ok(eig.state(index).into_owned())
    };
    let u00 = corner(*k)?;
    let u10 = corner(k + delta1)?;
    let u11 = corner(k + delta1 + delta2)?;
    let u01 = corner(k + delta2)?;

    let product = link(&u00, &u10)? * link(&u10, &u11)? / (link(&u01, &u11)? * link(&u00, &u01)?);
    Ok((Complex::<f64>::i() * product.ln()).re)
}

/// Plaquette (Fukui) Chern number over a `kp_num × kp_num` grid.
pub fn chern_number_plaquette<M: BandModel + ?Sized>(
    model: &M,
    evaluator: &ParallelEvaluator,
    kp_num: usize,
    band: i32,
) -> Result<ChernResult> {
    let grid = chern_grid(model, kp_num)?;
    let (v1, v2) = model.grid_vectors();
    let (delta1, delta2) = (v1 / kp_num as f64, v2 / kp_num as f64);
    let orientation = v1.perp(&v2).signum();
    info!("Chern number (plaquette) of band {} on a {}² grid", band, kp_num);

    let curvature =
        evaluator.evaluate(&grid, |k| plaquette_phase(model, k, &delta1, &delta2, band))?;
    let chern = orientation * curvature.iter().sum::<f64>() / (2.0 * PI);
    Ok(ChernResult {
        band,
        kp_num,
        curvature,
        chern,
    })
}

fn chern_grid<M: BandModel + ?Sized>(model: &M, kp_num: usize) -> Result<Vec<KPoint>> {
    if kp_num == 0 {
        return Err(TbgError::invalid("kp_num", "Chern grid needs at least one point"));
    }
    let (v1, v2) = model.grid_vectors();
    Ok(uniform_grid(&v1, &v2, kp_num))
}

/// Normalized overlap `⟨a|b⟩ / |⟨a|b⟩|`.
fn link(a: &DVector<Complex<f64>>, b: &DVector<Complex<f64>>) -> Result<Complex<f64>> {
    let overlap = a.dotc(b);
    let norm = overlap.norm();
    if norm < f64::EPSILON {
        return Err(TbgError::Numerical {
            stage: Stage::Aggregation,
            message: "vanishing overlap between neighbouring eigenstates".to_string(),
        });
    }
    Ok(overlap / norm)
}
