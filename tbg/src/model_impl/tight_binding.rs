extern crate nalgebra as na;

use crate::constants::{
    EV_TO_MEV, GRAPHENE_LATTICE_CONSTANT, HBAR_EV_S, INTERLAYER_DISTANCE, METER_TO_ANGSTROM, SQRT_3,
};
use crate::error::{Result, TbgError};
use crate::model::{BandModel, Hamiltonian, KPoint};
use crate::sampler::HighSymmetryPath;
use basis::lattice::{self, LatticeIndexSet, DEFAULT_MAX_ROUNDS};
use itertools::iproduct;
use na::{DMatrix, Vector2, Vector3};
use num_complex::Complex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{debug, info};

const FRACTION_TOLERANCE: f64 = 1e-6;

/// Commensurate tight-binding inputs. Hoppings in meV, lengths in Å.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TightBindingParams {
    pub m0: u32,
    pub r: u32,
    /// In-plane π hopping `t_intra`.
    pub intra_hopping: f64,
    /// Out-of-plane σ hopping `t_inter`.
    pub inter_hopping: f64,
    pub lattice_constant: f64,
    pub interlayer_distance: f64,
    /// Finite-difference step in Å⁻¹.
    pub interval_k: f64,
    /// Cap on breadth-first lattice rounds.
    pub max_lattice_rounds: usize,
}

impl Default for TightBindingParams {
    fn default() -> Self {
        TightBindingParams {
            m0: 31,
            r: 1,
            intra_hopping: -2700.0,
            inter_hopping: 480.0,
            lattice_constant: GRAPHENE_LATTICE_CONSTANT,
            interlayer_distance: INTERLAYER_DISTANCE,
            interval_k: 1e-5,
            max_lattice_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

/// Commensurate twist angle in degrees for the pair `(m0, r)`.
pub fn commensurate_angle(m0: u32, r: u32) -> f64 {
    let (m0, r) = (m0 as f64, r as f64);
    let base = 3.0 * m0 * m0 + 3.0 * m0 * r;
    let cos = (base + r * r / 2.0) / (base + r * r);
    cos.clamp(-1.0, 1.0).acos().to_degrees()
}

/// Lattice vectors of both layers and of the commensurate supercell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupercellGeometry {
    pub a1: Vector2<f64>,
    pub a2: Vector2<f64>,
    pub delta: Vector2<f64>,
    pub rotated_a1: Vector2<f64>,
    pub rotated_a2: Vector2<f64>,
    pub rotated_delta: Vector2<f64>,
    pub r1: Vector2<f64>,
    pub r2: Vector2<f64>,
    pub g1: Vector2<f64>,
    pub g2: Vector2<f64>,
    /// Graphene cells per layer inside the supercell.
    pub cells: usize,
}

impl SupercellGeometry {
    pub fn new(m0: u32, r: u32, a0: f64) -> Self {
        let theta = commensurate_angle(m0, r).to_radians();
        let (sin, cos) = theta.sin_cos();

        let a1 = Vector2::new(SQRT_3 / 2.0, -0.5) * a0;
        let a2 = Vector2::new(SQRT_3 / 2.0, 0.5) * a0;
        let b1 = Vector2::new(1.0 / SQRT_3, -1.0) * (2.0 * PI / a0);
        let b2 = Vector2::new(1.0 / SQRT_3, 1.0) * (2.0 * PI / a0);
        let rotated_a1 = a1 * (cos - sin / SQRT_3) + a2 * (2.0 * sin / SQRT_3);
        let rotated_a2 = a2 * (cos + sin / SQRT_3) - a1 * (2.0 * sin / SQRT_3);

        let divisible = r % 3 == 0;
        let (m, r) = (m0 as f64, r as f64);
        let (r1, r2, g1, g2, cells) = if !divisible {
            let cells = 3.0 * m * m + 3.0 * m * r + r * r;
            (
                a1 * m + a2 * (m + r),
                -a1 * (m + r) + a2 * (2.0 * m + r),
                (b1 * (2.0 * m + r) + b2 * (m + r)) / cells,
                (-b1 * (m + r) + b2 * m) / cells,
                cells,
            )
        } else {
            let n = r / 3.0;
            let cells = m * m + m * r + r * r / 3.0;
            (
                a1 * (m + n) + a2 * n,
                -a1 * n + a2 * (m + 2.0 * n),
                (b1 * (m + 2.0 * n) + b2 * n) / cells,
                (-b1 * n + b2 * (m + n)) / cells,
                cells,
            )
        };

        SupercellGeometry {
            a1,
            a2,
            delta: (a1 + a2) / 3.0,
            rotated_a1,
            rotated_a2,
            rotated_delta: (rotated_a1 + rotated_a2) / 3.0,
            r1,
            r2,
            g1,
            g2,
            cells: cells.round() as usize,
        }
    }

    pub fn atom_count(&self) -> usize {
        4 * self.cells
    }

    pub fn cell_area(&self) -> f64 {
        SQRT_3 / 2.0 * self.r1.norm_squared()
    }

    pub fn k1(&self) -> KPoint {
        (self.g1 + self.g2 * 2.0) / 3.0
    }

    pub fn k2(&self) -> KPoint {
        (self.g1 * 2.0 + self.g2) / 3.0
    }

    pub fn m(&self) -> KPoint {
        (self.k1() + self.k2()) / 2.0
    }

    /// Fractional coordinates along `R1` and `R2 - R1`.
    fn fractional(&self, p: &Vector2<f64>) -> (f64, f64) {
        let r3 = self.r2 - self.r1;
        let det = self.r1.x * r3.y - self.r1.y * r3.x;
        (
            (p.x * r3.y - p.y * r3.x) / det,
            (self.r1.x * p.y - self.r1.y * p.x) / det,
        )
    }

    fn inside(&self, p: &Vector2<f64>) -> bool {
        let (u, v) = self.fractional(p);
        let half_open = |x: f64| x >= -FRACTION_TOLERANCE && x < 1.0 - FRACTION_TOLERANCE;
        half_open(u) && half_open(v)
    }

    /// `{0, ±R1, ±R2, ±(R2−R1), ±(R1+R2), ±(2R2−R1), ±(2R1−R2)}`
    fn translations(&self) -> [Vector3<f64>; 13] {
        let lift = |v: Vector2<f64>| Vector3::new(v.x, v.y, 0.0);
        let (r1, r2) = (self.r1, self.r2);
        [
            Vector3::zeros(),
            lift(r1),
            lift(-r1),
            lift(r2),
            lift(-r2),
            lift(r2 - r1),
            lift(r1 - r2),
            lift(r1 + r2),
            lift(-r1 - r2),
            lift(r2 * 2.0 - r1),
            lift(r1 - r2 * 2.0),
            lift(r1 * 2.0 - r2),
            lift(r2 - r1 * 2.0),
        ]
    }
}

/// Commensurate twisted bilayer with exponentially decaying Slater-Koster
/// hoppings between every pair of atoms in the supercell.
#[derive(Debug, Clone)]
pub struct TightBindingModel {
    params: TightBindingParams,
    geometry: SupercellGeometry,
    lattice: LatticeIndexSet,
    atoms: Vec<Vector3<f64>>,
    /// Hopping amplitude and in-plane displacement for each pair `i < j`,
    /// stored row-major over the upper triangle.
    hoppings: Vec<(f64, Vector2<f64>)>,
}

impl TightBindingModel {
    pub fn new(params: TightBindingParams) -> Result<Self> {
        validate(&params)?;

        let geometry = SupercellGeometry::new(params.m0, params.r, params.lattice_constant);
        let target = lattice::commensurate_target(params.m0, params.r);
        let lattice = lattice::expand_until(target, params.max_lattice_rounds)?;
        let atoms = place_atoms(&geometry, &lattice, params.interlayer_distance);
        if atoms.len() != geometry.atom_count() {
            return Err(TbgError::DimensionMismatch {
                context: "atoms inside the commensurate supercell".to_string(),
                expected: geometry.atom_count(),
                found: atoms.len(),
            });
        }

        info!(
            "Tight-binding model (m0={}, r={}) at {:.4}°: {} atoms, cell area {:.2} Å²",
            params.m0,
            params.r,
            commensurate_angle(params.m0, params.r),
            atoms.len(),
            geometry.cell_area()
        );

        let hoppings = pair_hoppings(&params, &geometry, &atoms);
        debug!("precomputed {} pair hoppings", hoppings.len());

        Ok(TightBindingModel {
            params,
            geometry,
            lattice,
            atoms,
            hoppings,
        })
    }

    pub fn params(&self) -> &TightBindingParams {
        &self.params
    }

    pub fn geometry(&self) -> &SupercellGeometry {
        &self.geometry
    }

    pub fn lattice(&self) -> &LatticeIndexSet {
        &self.lattice
    }

    pub fn atoms(&self) -> &[Vector3<f64>] {
        &self.atoms
    }

    /// K1 → Γ → M → K2
    pub fn default_path(&self) -> HighSymmetryPath {
        HighSymmetryPath::new(vec![
            ("K_1", self.geometry.k1()),
            ("Γ", KPoint::zeros()),
            ("M", self.geometry.m()),
            ("K_2", self.geometry.k2()),
        ])
    }

    /// Slope of the lowest conduction band from K1 towards M, in m/s.
    pub fn fermi_velocity(&self, proportion_k_to_m: f64) -> Result<f64> {
        let k1 = self.geometry.k1();
        let target = k1 + (self.geometry.m() - k1) * proportion_k_to_m;
        let at_k = self.eigen(&k1)?;
        let at_target = self.eigen(&target)?;
        let band = at_k.mid();
        let delta_e = at_target.energies[band] - at_k.energies[band];
        let delta_k = (target - k1).norm();
        if delta_k == 0.0 {
            return Err(TbgError::invalid(
                "proportion_k_to_m",
                "must move away from K1",
            ));
        }
        Ok((delta_e / (delta_k * HBAR_EV_S * METER_TO_ANGSTROM * EV_TO_MEV)).abs())
    }
}

impl BandModel for TightBindingModel {
    fn name(&self) -> &'static str {
        "tight_binding"
    }

    fn twist_angle(&self) -> f64 {
        commensurate_angle(self.params.m0, self.params.r)
    }

    fn dimension(&self) -> usize {
        self.atoms.len()
    }

    fn hamiltonian(&self, k: &KPoint) -> Hamiltonian {
        let n = self.atoms.len();
        let mut h = DMatrix::zeros(n, n);
        let mut pairs = self.hoppings.iter();
        for (i, j) in iproduct!(0..n, 0..n).filter(|(i, j)| i < j) {
            if let Some((amplitude, d)) = pairs.next() {
                let value = Complex::from_polar(*amplitude, -k.dot(d));
                h[(i, j)] = value;
                h[(j, i)] = value.conj();
            }
        }
        h
    }

    fn grid_vectors(&self) -> (KPoint, KPoint) {
        (self.geometry.g1 + self.geometry.g2, self.geometry.g2)
    }

    fn unit_cell_area(&self) -> f64 {
        self.geometry.cell_area()
    }

    fn momentum_scale(&self) -> f64 {
        1.0
    }

    fn path_unit(&self) -> f64 {
        self.geometry.k1().norm()
    }

    fn interval_k(&self) -> f64 {
        self.params.interval_k
    }

    fn valley_degeneracy(&self) -> f64 {
        1.0
    }
}

fn validate(params: &TightBindingParams) -> Result<()> {
    if params.r == 0 {
        return Err(TbgError::invalid("r", "r = 0 describes an untwisted bilayer"));
    }
    for (name, value) in [
        ("lattice_constant", params.lattice_constant),
        ("interlayer_distance", params.interlayer_distance),
        ("interval_k", params.interval_k),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(TbgError::invalid(name, format!("{} must be positive", value)));
        }
    }
    Ok(())
}

/// A and B sublattices of both layers falling inside the half-open
/// supercell, in lattice-index order.
fn place_atoms(geometry: &SupercellGeometry, lattice: &LatticeIndexSet, d0: f64) -> Vec<Vector3<f64>> {
    let mut atoms = Vec::with_capacity(geometry.atom_count());
    for index in lattice.iter() {
        let (i, j) = (index.i as f64, index.j as f64);
        let bottom = geometry.a1 * i + geometry.a2 * j;
        let top = geometry.rotated_a1 * i + geometry.rotated_a2 * j;
        let candidates = [
            (bottom, 0.0),
            (bottom + geometry.delta, 0.0),
            (top, d0),
            (top + geometry.rotated_delta, d0),
        ];
        for (p, z) in candidates {
            if geometry.inside(&p) {
                atoms.push(Vector3::new(p.x, p.y, z));
            }
        }
    }
    atoms
}

fn pair_hoppings(
    params: &TightBindingParams,
    geometry: &SupercellGeometry,
    atoms: &[Vector3<f64>],
) -> Vec<(f64, Vector2<f64>)> {
    let a0 = params.lattice_constant;
    let decay = 0.184 * a0;
    let translations = geometry.translations();
    let n = atoms.len();

    (0..n)
        .into_par_iter()
        .flat_map_iter(|i| {
            let translations = &translations;
            (i + 1..n).map(move |j| {
                let raw = atoms[j] - atoms[i];
                let d = translations
                    .iter()
                    .map(|t| raw + t)
                    .min_by(|a, b| a.norm().total_cmp(&b.norm()))
                    .unwrap_or(raw);
                let distance = d.norm();
                let cos2 = (d.z / distance).powi(2);
                let v_pi = params.intra_hopping * (-(distance - a0 / SQRT_3) / decay).exp();
                let v_sigma =
                    params.inter_hopping * (-(distance - params.interlayer_distance) / decay).exp();
                (v_pi * (1.0 - cos2) + v_sigma * cos2, Vector2::new(d.x, d.y))
            })
        })
        .collect()
}
