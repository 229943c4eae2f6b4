use crate::constants::absorption_prefactor;
use crate::error::{Result, TbgError};
use crate::model::{BandModel, EigenPairs, KPoint};
use crate::parallel::ParallelEvaluator;
use nalgebra::DVector;
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Monolayer sheet conductivity `e²/(4ħ)` in units of `e²/ħ`.
const MONOLAYER_CONDUCTIVITY: f64 = 0.25;
const SPIN_DEGENERACY: f64 = 2.0;

/// Optical transition between one valence and one conduction band at a
/// single k-point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// 1 is the topmost valence band.
    pub valence: usize,
    /// 1 is the lowest conduction band.
    pub conduction: usize,
    /// `E_c − E_v` in meV.
    pub energy: f64,
    /// `⟨c|∂H/∂k_x|v⟩`
    pub velocity_x: Complex<f64>,
    /// `⟨c|∂H/∂k_y|v⟩`
    pub velocity_y: Complex<f64>,
}

impl Transition {
    pub fn strength(&self) -> f64 {
        self.velocity_x.norm_sqr() + self.velocity_y.norm_sqr()
    }
}

/// All `num_half²` transitions at `k`, conduction-major: entry
/// `c·num_half + v` couples conduction band `c+1` to valence band `v+1`.
pub fn transitions<M: BandModel + ?Sized>(
    model: &M,
    k: &KPoint,
    num_half: usize,
) -> Result<Vec<Transition>> {
    let derivatives = model.derivatives(k);
    let eig = EigenPairs::from_hamiltonian(derivatives.h)?;
    let valence = eig.valence(num_half)?;
    let conduction = eig.conduction(num_half)?;

    let dx_v: Vec<DVector<Complex<f64>>> = valence
        .iter()
        .map(|&v| &derivatives.dx * eig.state(v))
        .collect();
    let dy_v: Vec<DVector<Complex<f64>>> = valence
        .iter()
        .map(|&v| &derivatives.dy * eig.state(v))
        .collect();

    let mut out = Vec::with_capacity(num_half * num_half);
    for (ci, &c) in conduction.iter().enumerate() {
        let bra = eig.state(c);
        for (vi, &v) in valence.iter().enumerate() {
            out.push(Transition {
                valence: vi + 1,
                conduction: ci + 1,
                energy: eig.energies[c] - eig.energies[v],
                velocity_x: bra.dotc(&dx_v[vi]),
                velocity_y: bra.dotc(&dy_v[vi]),
            });
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AbsorptionSpectrum {
    pub photon_energies: Vec<f64>,
    pub absorption: Vec<f64>,
}

/// Absorption with Lorentzian broadening `δ`, normalized per unit cell and
/// k-point.
pub fn absorption<M: BandModel + ?Sized>(
    model: &M,
    evaluator: &ParallelEvaluator,
    points: &[KPoint],
    num_half: usize,
    photon_energies: &[f64],
    broadening: f64,
) -> Result<AbsorptionSpectrum> {
    if photon_energies.is_empty() {
        return Ok(AbsorptionSpectrum::default());
    }
    validate_spectrum(points, photon_energies, broadening, "broadening")?;
    info!(
        "Absorption: {} photon energies, {} bands each side, δ = {} meV",
        photon_energies.len(),
        num_half,
        broadening
    );

    let per_k = evaluator.evaluate(points, |k| {
        let list = transitions(model, k, num_half)?;
        Ok(photon_energies
            .iter()
            .map(|&e| {
                list.iter()
                    .map(|t| {
                        t.strength() * broadening
                            / ((t.energy - e).powi(2) + broadening * broadening)
                            / e
                    })
                    .sum::<f64>()
            })
            .collect::<Vec<f64>>())
    })?;

    let renorm = model.valley_degeneracy() * absorption_prefactor()
        / (points.len() as f64 * model.unit_cell_area());
    Ok(AbsorptionSpectrum {
        photon_energies: photon_energies.to_vec(),
        absorption: sum_columns(&per_k, photon_energies.len())
            .into_iter()
            .map(|a| a * renorm)
            .collect(),
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConductivitySpectrum {
    pub photon_energies: Vec<f64>,
    /// Complex response `Σ |⟨c|∂ₓH|v⟩|² / (ΔE (ΔE − E + iη))`, normalized.
    pub response: Vec<Complex<f64>>,
    /// Real conductivity `σ_xx / σ0`, i.e. the negated imaginary part.
    pub sigma_xx: Vec<f64>,
}

/// Dynamic optical conductivity along x in units of the monolayer value.
pub fn optical_conductivity<M: BandModel + ?Sized>(
    model: &M,
    evaluator: &ParallelEvaluator,
    points: &[KPoint],
    num_half: usize,
    photon_energies: &[f64],
    eta: f64,
) -> Result<ConductivitySpectrum> {
    if photon_energies.is_empty() {
        return Ok(ConductivitySpectrum::default());
    }
    validate_spectrum(points, photon_energies, eta, "eta")?;

    let per_k = evaluator.evaluate(points, |k| {
        let list = transitions(model, k, num_half)?;
        Ok(photon_energies
            .iter()
            .map(|&e| {
                list.iter()
                    .map(|t| {
                        Complex::from(t.velocity_x.norm_sqr())
                            / (t.energy * Complex::new(t.energy - e, eta))
                    })
                    .sum::<Complex<f64>>()
            })
            .collect::<Vec<Complex<f64>>>())
    })?;

    let renorm = SPIN_DEGENERACY / (points.len() as f64 * model.unit_cell_area())
        / MONOLAYER_CONDUCTIVITY;
    let response: Vec<Complex<f64>> = (0..photon_energies.len())
        .map(|i| per_k.iter().map(|row| row[i]).sum::<Complex<f64>>() * renorm)
        .collect();
    Ok(ConductivitySpectrum {
        photon_energies: photon_energies.to_vec(),
        sigma_xx: response.iter().map(|z| -z.im).collect(),
        response,
    })
}

/// Resonant Raman inputs, energies in meV.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RamanParams {
    pub photon_energy: f64,
    pub phonon_energy: f64,
    pub gamma: f64,
    pub num_half: usize,
    /// Keep only transitions among the innermost `n` valence and `n`
    /// conduction bands.
    pub inner_transitions: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RamanSpectrum {
    /// Amplitude at each k-point, summed over the selected transitions.
    pub per_k: Vec<Complex<f64>>,
    /// Amplitude of each selected transition, summed over k.
    pub per_transition: Vec<Complex<f64>>,
    /// `|Σ_k Σ_t|² / A²`
    pub intensity: f64,
}

/// `trans / ((E − ΔE − iγ)(E − ΔE − E_ph − iγ))` for every selected
/// transition at `k`.
pub fn raman_terms<M: BandModel + ?Sized>(
    model: &M,
    k: &KPoint,
    params: &RamanParams,
) -> Result<Vec<Complex<f64>>> {
    let inner = params.inner_transitions.unwrap_or(params.num_half);
    let gamma = Complex::new(0.0, params.gamma);
    Ok(transitions(model, k, params.num_half)?
        .iter()
        .filter(|t| t.valence <= inner && t.conduction <= inner)
        .map(|t| {
            let incoming = params.photon_energy - t.energy - gamma;
            let outgoing = params.photon_energy - t.energy - params.phonon_energy - gamma;
            Complex::from(t.strength()) / (incoming * outgoing)
        })
        .collect())
}

pub fn raman<M: BandModel + ?Sized>(
    model: &M,
    evaluator: &ParallelEvaluator,
    points: &[KPoint],
    params: &RamanParams,
) -> Result<RamanSpectrum> {
    let per_k_terms = raman_term_rows(model, evaluator, points, params)?;
    Ok(RamanSpectrum::from_terms(&per_k_terms, model.unit_cell_area()))
}

/// Selected Raman terms at every point, one row per k-point.
pub fn raman_term_rows<M: BandModel + ?Sized>(
    model: &M,
    evaluator: &ParallelEvaluator,
    points: &[KPoint],
    params: &RamanParams,
) -> Result<Vec<Vec<Complex<f64>>>> {
    if points.is_empty() {
        return Err(TbgError::invalid("k_points", "Raman sum needs at least one k-point"));
    }
    if let Some(inner) = params.inner_transitions {
        if inner == 0 || inner > params.num_half {
            return Err(TbgError::invalid(
                "inner_transitions",
                format!("{} is not in 1..={}", inner, params.num_half),
            ));
        }
    }
    info!(
        "Raman: E_photon = {} meV, E_phonon = {} meV, γ = {} meV",
        params.photon_energy, params.phonon_energy, params.gamma
    );
    evaluator.evaluate(points, |k| raman_terms(model, k, params))
}

impl RamanSpectrum {
    /// Sums per-k term rows over transitions and over k.
    pub fn from_terms(per_k_terms: &[Vec<Complex<f64>>], area: f64) -> Self {
        let width = per_k_terms.first().map_or(0, Vec::len);
        let per_transition: Vec<Complex<f64>> = (0..width)
            .map(|i| per_k_terms.iter().map(|row| row[i]).sum())
            .collect();
        let per_k: Vec<Complex<f64>> = per_k_terms.iter().map(|row| row.iter().sum()).collect();
        let total: Complex<f64> = per_k.iter().sum();

        RamanSpectrum {
            intensity: total.norm_sqr() / area.powi(2),
            per_k,
            per_transition,
        }
    }
}

fn validate_spectrum(
    points: &[KPoint],
    photon_energies: &[f64],
    broadening: f64,
    name: &'static str,
) -> Result<()> {
    if points.is_empty() {
        return Err(TbgError::invalid("k_points", "spectrum needs at least one k-point"));
    }
    if !broadening.is_finite() || broadening <= 0.0 {
        return Err(TbgError::invalid(name, "must be positive"));
    }
    if let Some(e) = photon_energies.iter().find(|e| !e.is_finite() || **e <= 0.0) {
        return Err(TbgError::invalid(
            "photon_energies",
            format!("{} meV is not a positive photon energy", e),
        ));
    }
    Ok(())
}

fn sum_columns(rows: &[Vec<f64>], width: usize) -> Vec<f64> {
    (0..width)
        .map(|i| rows.iter().map(|row| row[i]).sum())
        .collect()
}
