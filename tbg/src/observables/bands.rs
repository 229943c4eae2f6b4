use crate::error::{Result, TbgError};
use crate::model::{BandModel, KPoint};
use crate::parallel::ParallelEvaluator;
use crate::sampler::KPath;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::info;

const SPIN_DEGENERACY: f64 = 2.0;

/// Bands `mid + lower .. mid + upper` around half filling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandWindow {
    pub lower: isize,
    pub upper: isize,
}

impl BandWindow {
    pub fn new(lower: isize, upper: isize) -> Self {
        BandWindow { lower, upper }
    }

    pub fn symmetric(half_width: usize) -> Self {
        BandWindow::new(-(half_width as isize), half_width as isize)
    }

    /// Leading entries of a windowed row that lie below the gap.
    pub fn valence_count(&self) -> usize {
        (-self.lower).max(0) as usize
    }
}

impl Default for BandWindow {
    fn default() -> Self {
        BandWindow::symmetric(10)
    }
}

/// Windowed, ascending band energies at every point, in input order.
pub fn band_energies<M: BandModel + ?Sized>(
    model: &M,
    evaluator: &ParallelEvaluator,
    points: &[KPoint],
    window: BandWindow,
) -> Result<Vec<Vec<f64>>> {
    evaluator.evaluate(points, |k| model.eigen(k)?.window(window.lower, window.upper))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandStructure {
    /// One row of windowed energies per path point.
    pub energies: Vec<Vec<f64>>,
    pub labels: Vec<String>,
    pub label_positions: Vec<usize>,
    /// Subtracted from every energy when the structure was shifted.
    pub half_filling_energy: f64,
}

/// Band energies along a path, one chunk per segment.
pub fn band_structure<M: BandModel + ?Sized>(
    model: &M,
    evaluator: &ParallelEvaluator,
    path: &KPath,
    window: BandWindow,
    shift_to_half_filling: bool,
) -> Result<BandStructure> {
    let energies = path_energies(model, evaluator, path, window)?;
    Ok(BandStructure::from_path_energies(energies, path, shift_to_half_filling))
}

/// Unshifted windowed energies along `path`, one row per path point.
pub fn path_energies<M: BandModel + ?Sized>(
    model: &M,
    evaluator: &ParallelEvaluator,
    path: &KPath,
    window: BandWindow,
) -> Result<Vec<Vec<f64>>> {
    let chunks: Vec<&[KPoint]> = path.segments.iter().map(Vec::as_slice).collect();
    info!(
        "Band structure along {} ({} points)",
        path.labels.join(" → "),
        path.len()
    );
    Ok(evaluator
        .evaluate_chunks(&chunks, |k| model.eigen(k)?.window(window.lower, window.upper))?
        .into_iter()
        .flatten()
        .collect())
}

impl BandStructure {
    /// Attaches the path labels to raw rows, optionally moving the median
    /// energy to zero.
    pub fn from_path_energies(mut energies: Vec<Vec<f64>>, path: &KPath, shift_to_half_filling: bool) -> Self {
        let pooled: Vec<f64> = energies.iter().flatten().copied().collect();
        let shift = if shift_to_half_filling {
            half_filling_energy(&pooled).unwrap_or(0.0)
        } else {
            0.0
        };
        if shift != 0.0 {
            energies
                .iter_mut()
                .flat_map(|row| row.iter_mut())
                .for_each(|e| *e -= shift);
        }

        BandStructure {
            energies,
            labels: path.labels.clone(),
            label_positions: path.label_positions.clone(),
            half_filling_energy: shift,
        }
    }
}

/// Median of the pooled energies: the mean of the two central values for
/// an even count.
pub fn half_filling_energy(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sorted: Vec<f64> = values
        .iter()
        .copied()
        .sorted_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
        .collect();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Fixed-width histogram following NumPy: values outside the range are
/// dropped and the last bin is closed on the right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn new(values: &[f64], bins: usize, range: Option<(f64, f64)>) -> Result<Self> {
        if bins == 0 {
            return Err(TbgError::invalid("bins", "at least one bin is required"));
        }
        let (lower, upper) = match range {
            Some(range) => range,
            None if values.is_empty() => (0.0, 1.0),
            None => values
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                }),
        };
        if !lower.is_finite() || !upper.is_finite() || lower > upper {
            return Err(TbgError::invalid(
                "energy_range",
                format!("invalid histogram range ({}, {})", lower, upper),
            ));
        }
        let (lower, upper) = if lower == upper {
            (lower - 0.5, upper + 0.5)
        } else {
            (lower, upper)
        };

        let width = (upper - lower) / bins as f64;
        let edges = (0..=bins).map(|i| lower + width * i as f64).collect();
        let mut counts = vec![0; bins];
        for &v in values {
            if v < lower || v > upper {
                continue;
            }
            let bin = (((v - lower) / width) as usize).min(bins - 1);
            counts[bin] += 1;
        }

        Ok(Histogram { edges, counts })
    }

    pub fn bin_width(&self) -> f64 {
        self.edges[1] - self.edges[0]
    }

    pub fn centers(&self) -> Vec<f64> {
        self.edges
            .iter()
            .tuple_windows()
            .map(|(a, b)| (a + b) / 2.0)
            .collect()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// States per meV per Å², spin included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DensityOfStates {
    pub energies: Vec<f64>,
    pub density: Vec<f64>,
    pub histogram: Histogram,
}

impl DensityOfStates {
    fn from_samples(samples: &[f64], k_points: usize, bins: usize, range: Option<(f64, f64)>, area: f64) -> Result<Self> {
        if k_points == 0 {
            return Err(TbgError::invalid("k_points", "no band energies to bin"));
        }
        let histogram = Histogram::new(samples, bins, range)?;
        let renorm = SPIN_DEGENERACY / (k_points as f64 * area) / histogram.bin_width();
        Ok(DensityOfStates {
            energies: histogram.centers(),
            density: histogram.counts.iter().map(|&c| c as f64 * renorm).collect(),
            histogram,
        })
    }
}

/// DOS of the pooled windowed energies. `energies` holds one row per
/// k-point.
pub fn density_of_states(
    energies: &[Vec<f64>],
    bins: usize,
    range: Option<(f64, f64)>,
    area: f64,
) -> Result<DensityOfStates> {
    let pooled: Vec<f64> = energies.iter().flatten().copied().collect();
    DensityOfStates::from_samples(&pooled, energies.len(), bins, range, area)
}

/// `E_c − E_v` for every valence/conduction pair of one windowed row. The
/// first `valence` entries lie below the gap.
pub fn transition_energies(row: &[f64], valence: usize) -> Vec<f64> {
    let (valence, conduction) = row.split_at(valence.min(row.len()));
    conduction
        .iter()
        .cartesian_product(valence.iter())
        .map(|(c, v)| c - v)
        .collect()
}

/// Joint DOS from all vertical transitions inside each row's window.
pub fn joint_density_of_states(
    energies: &[Vec<f64>],
    window: BandWindow,
    bins: usize,
    range: Option<(f64, f64)>,
    area: f64,
) -> Result<DensityOfStates> {
    let valence = window.valence_count();
    let differences: Vec<f64> = energies
        .iter()
        .flat_map(|row| transition_energies(row, valence))
        .collect();
    DensityOfStates::from_samples(&differences, energies.len(), bins, range, area)
}

/// Per-k `E_c − E_v` for one pair; `valence = 1` is the topmost valence
/// band and `conduction = 1` the lowest conduction band of each row.
pub fn energy_difference_map(
    energies: &[Vec<f64>],
    window: BandWindow,
    valence: usize,
    conduction: usize,
) -> Result<Vec<f64>> {
    let gap = window.valence_count();
    energies
        .iter()
        .map(|row| {
            if valence == 0 || conduction == 0 || valence > gap || gap + conduction > row.len() {
                return Err(TbgError::invalid(
                    "band_pair",
                    format!(
                        "pair (v{}, c{}) is outside window [{}, {}) of {} bands",
                        valence,
                        conduction,
                        window.lower,
                        window.upper,
                        row.len()
                    ),
                ));
            }
            Ok(row[gap + conduction - 1] - row[gap - valence])
        })
        .collect()
}
