extern crate nalgebra as na;

use crate::constants::{
    EV_TO_MEV, GRAPHENE_LATTICE_CONSTANT, HBAR_EV_S, METER_TO_ANGSTROM, SQRT_3,
};
use crate::error::{Result, TbgError};
use crate::model::{BandModel, Hamiltonian, KPoint};
use crate::sampler::HighSymmetryPath;
use basis::{continuum, BasisSet, BasisVector, Hop, Layer};
use na::{DMatrix, Matrix2};
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{debug, info};

const HALF_SQRT_3: f64 = SQRT_3 / 2.0;

/// Continuum model inputs. Energies in meV, lengths in Å.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuumParams {
    /// Twist angle in degrees.
    pub twist_angle: f64,
    /// Monolayer Fermi velocity in m/s.
    pub fermi_velocity: f64,
    /// Inter-layer tunnelling `w`.
    pub interlayer_coupling: f64,
    pub lattice_constant: f64,
    /// Single hops used to grow the plane-wave basis.
    pub loop_times: usize,
    /// Finite-difference step in reduced k units.
    pub interval_k: f64,
}

impl Default for ContinuumParams {
    fn default() -> Self {
        ContinuumParams {
            twist_angle: 1.05,
            fermi_velocity: 1e6,
            interlayer_coupling: 118.0,
            lattice_constant: GRAPHENE_LATTICE_CONSTANT,
            loop_times: 7,
            interval_k: 0.005,
        }
    }
}

/// Reduced reciprocal vectors, in units of `|K_moire|`.
pub fn b_plus() -> KPoint {
    KPoint::new(HALF_SQRT_3, 1.5)
}

pub fn b_minus() -> KPoint {
    KPoint::new(-HALF_SQRT_3, 1.5)
}

pub fn k_bottom() -> KPoint {
    KPoint::new(-HALF_SQRT_3, -0.5)
}

pub fn k_top() -> KPoint {
    KPoint::new(-HALF_SQRT_3, 0.5)
}

pub fn m_point() -> KPoint {
    KPoint::new(-HALF_SQRT_3, 0.0)
}

pub fn gamma() -> KPoint {
    KPoint::new(0.0, 0.0)
}

/// Γ of the moire zone shifted by `b_-`.
pub fn gamma_shifted() -> KPoint {
    b_minus()
}

/// `σ_φ·p` for one sublattice pair.
fn rotated_dirac(p: &KPoint, phi: f64) -> Matrix2<Complex<f64>> {
    let zero = Complex::new(0.0, 0.0);
    let lower = Complex::from_polar(1.0, phi) * Complex::new(p.x, p.y);
    Matrix2::new(zero, lower.conj(), lower, zero)
}

fn coupling(hop: Hop, w: f64) -> Matrix2<Complex<f64>> {
    let one = Complex::new(w, 0.0);
    let omega = Complex::from_polar(w, 2.0 * PI / 3.0);
    match hop {
        Hop::Same => Matrix2::new(one, one, one, one),
        Hop::AlongPlus => Matrix2::new(one, omega.conj(), omega, one),
        Hop::AlongMinus => Matrix2::new(one, omega, omega.conj(), one),
    }
}

/// Bistritzer-MacDonald Hamiltonian in a truncated plane-wave basis.
#[derive(Debug, Clone)]
pub struct ContinuumModel {
    params: ContinuumParams,
    basis: BasisSet,
    bottom_offsets: Vec<KPoint>,
    top_offsets: Vec<KPoint>,
    interlayer: Hamiltonian,
    interlayer_adjoint: Hamiltonian,
    epsilon: f64,
    moire_lattice_constant: f64,
    k_moire: f64,
}

impl ContinuumModel {
    pub fn new(params: ContinuumParams) -> Result<Self> {
        validate(&params)?;

        let basis = continuum::generate(params.loop_times);
        let bottom = basis.layer(Layer::Bottom);
        let top = basis.layer(Layer::Top);
        if bottom.is_empty() {
            return Err(TbgError::invalid(
                "loop_times",
                "basis has no bottom-layer component",
            ));
        }

        let bottom_offsets = offsets(&bottom, &k_bottom());
        let top_offsets = offsets(&top, &k_top());
        let interlayer = interlayer_block(&bottom, &top, params.interlayer_coupling);
        let dimension = 2 * basis.len();
        if interlayer.nrows() + interlayer.ncols() != dimension {
            return Err(TbgError::DimensionMismatch {
                context: "inter-layer coupling block".to_string(),
                expected: dimension,
                found: interlayer.nrows() + interlayer.ncols(),
            });
        }

        let theta = params.twist_angle.to_radians();
        let moire_lattice_constant = params.lattice_constant / (2.0 * (theta / 2.0).sin());
        let k_moire = 4.0 * PI / (3.0 * moire_lattice_constant);
        let epsilon =
            HBAR_EV_S * params.fermi_velocity * k_moire * METER_TO_ANGSTROM * EV_TO_MEV;

        info!(
            "Continuum model at {:.4}°: {} plane waves ({} bottom, {} top), dimension {}",
            params.twist_angle,
            basis.len(),
            bottom.len(),
            top.len(),
            dimension
        );
        debug!(
            "moire lattice constant {:.4} Å, |K_moire| {:.6} 1/Å, ħv|K| {:.4} meV",
            moire_lattice_constant, k_moire, epsilon
        );

        Ok(ContinuumModel {
            interlayer_adjoint: interlayer.adjoint(),
            params,
            basis,
            bottom_offsets,
            top_offsets,
            interlayer,
            epsilon,
            moire_lattice_constant,
            k_moire,
        })
    }

    pub fn params(&self) -> &ContinuumParams {
        &self.params
    }

    pub fn basis(&self) -> &BasisSet {
        &self.basis
    }

    /// `ħ v_F |K_moire|` in meV.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn moire_lattice_constant(&self) -> f64 {
        self.moire_lattice_constant
    }

    /// `|K_moire|` in Å⁻¹.
    pub fn k_moire(&self) -> f64 {
        self.k_moire
    }

    pub fn moire_area(&self) -> f64 {
        HALF_SQRT_3 * self.moire_lattice_constant.powi(2)
    }

    /// Renormalized velocity of the first conduction band between K_b and
    /// M, in m/s.
    pub fn fermi_velocity(&self) -> Result<f64> {
        let at_k = self.eigen(&k_bottom())?;
        let at_m = self.eigen(&m_point())?;
        let band = at_k.mid();
        let delta_e = at_m.energies[band] - at_k.energies[band];
        let delta_k = (m_point() - k_bottom()).norm() * self.k_moire;
        Ok((delta_e / (delta_k * HBAR_EV_S * METER_TO_ANGSTROM * EV_TO_MEV)).abs())
    }

    /// K_b → K_t → Γ(b_-) → Γ → K_b
    pub fn default_path() -> HighSymmetryPath {
        HighSymmetryPath::new(vec![
            ("K_b", k_bottom()),
            ("K_t", k_top()),
            ("Γ", gamma_shifted()),
            ("Γ", gamma()),
            ("K_b", k_bottom()),
        ])
    }

    /// K_b → Γ → M → K_t
    pub fn raman_path() -> HighSymmetryPath {
        HighSymmetryPath::new(vec![
            ("K_b", k_bottom()),
            ("Γ", gamma()),
            ("M", m_point()),
            ("K_t", k_top()),
        ])
    }

    fn write_layer(&self, h: &mut Hamiltonian, start: usize, offsets: &[KPoint], k: &KPoint, phi: f64) {
        for (i, offset) in offsets.iter().enumerate() {
            let p = k + offset;
            let block = rotated_dirac(&p, phi) * Complex::from(self.epsilon);
            h.fixed_view_mut::<2, 2>(start + 2 * i, start + 2 * i)
                .copy_from(&block);
        }
    }
}

impl BandModel for ContinuumModel {
    fn name(&self) -> &'static str {
        "continuum"
    }

    fn twist_angle(&self) -> f64 {
        self.params.twist_angle
    }

    fn dimension(&self) -> usize {
        2 * self.basis.len()
    }

    fn hamiltonian(&self, k: &KPoint) -> Hamiltonian {
        let dim = self.dimension();
        let nb = 2 * self.bottom_offsets.len();
        let nt = 2 * self.top_offsets.len();
        let half_angle = self.params.twist_angle.to_radians() / 2.0;

        let mut h = DMatrix::zeros(dim, dim);
        self.write_layer(&mut h, 0, &self.bottom_offsets, k, half_angle);
        self.write_layer(&mut h, nb, &self.top_offsets, k, -half_angle);
        h.view_mut((0, nb), (nb, nt)).copy_from(&self.interlayer);
        h.view_mut((nb, 0), (nt, nb))
            .copy_from(&self.interlayer_adjoint);
        h
    }

    fn grid_vectors(&self) -> (KPoint, KPoint) {
        (b_plus(), b_minus())
    }

    fn unit_cell_area(&self) -> f64 {
        self.moire_area()
    }

    fn momentum_scale(&self) -> f64 {
        self.k_moire
    }

    fn interval_k(&self) -> f64 {
        self.params.interval_k
    }

    fn valley_degeneracy(&self) -> f64 {
        2.0
    }
}

fn validate(params: &ContinuumParams) -> Result<()> {
    if !params.twist_angle.is_finite() || params.twist_angle <= 0.0 || params.twist_angle >= 180.0 {
        return Err(TbgError::invalid(
            "twist_angle",
            format!("{} is not in (0, 180) degrees", params.twist_angle),
        ));
    }
    if !params.fermi_velocity.is_finite() || params.fermi_velocity <= 0.0 {
        return Err(TbgError::invalid("fermi_velocity", "must be positive"));
    }
    if !params.interlayer_coupling.is_finite() {
        return Err(TbgError::invalid("interlayer_coupling", "must be finite"));
    }
    if !params.lattice_constant.is_finite() || params.lattice_constant <= 0.0 {
        return Err(TbgError::invalid("lattice_constant", "must be positive"));
    }
    if !params.interval_k.is_finite() || params.interval_k <= 0.0 {
        return Err(TbgError::invalid("interval_k", "must be positive"));
    }
    Ok(())
}

/// `m·b₊ + n·b₋ − K_layer` for each vector, in basis order.
fn offsets(vectors: &[BasisVector], valley: &KPoint) -> Vec<KPoint> {
    vectors
        .iter()
        .map(|v| v.wave_vector(&b_plus(), &b_minus()) - valley)
        .collect()
}

fn interlayer_block(bottom: &[BasisVector], top: &[BasisVector], w: f64) -> Hamiltonian {
    let mut block = DMatrix::zeros(2 * bottom.len(), 2 * top.len());
    for (i, source) in bottom.iter().enumerate() {
        for (j, target) in top.iter().enumerate() {
            if let Some(hop) = source.hop_to(target) {
                block
                    .fixed_view_mut::<2, 2>(2 * i, 2 * j)
                    .copy_from(&coupling(hop, w));
            }
        }
    }
    block
}
