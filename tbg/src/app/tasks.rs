use crate::app::report::Report;
use crate::app::runner::BuiltModel;
use crate::cache::{cache_key, cached_rows, ResultCache};
use crate::config::{ObservableParams, Task};
use crate::error::{Result, TbgError};
use crate::model::{BandModel, KPoint};
use crate::observables::{
    absorption, band_energies, chern_number_kubo, chern_number_plaquette, density_of_states,
    energy_difference_map, joint_density_of_states, optical_conductivity, path_energies,
    raman_term_rows, AbsorptionSpectrum, BandStructure, BandWindow, ConductivitySpectrum,
    RamanParams, RamanSpectrum,
};
use crate::parallel::ParallelEvaluator;
use crate::sampler::{patch, uniform_grid};
use num_complex::Complex;
use tracing::{debug, info};

/// Shared inputs of every task in one run.
pub struct TaskContext<'a> {
    pub model: &'a BuiltModel,
    pub evaluator: &'a ParallelEvaluator,
    pub params: &'a ObservableParams,
    pub refresh: bool,
}

pub fn run_task(
    task: Task,
    ctx: &TaskContext<'_>,
    cache: &mut dyn ResultCache,
    report: &mut Report,
) -> Result<()> {
    info!("\n===========================================");
    info!("       Starting task: {:?}", task);
    info!("===========================================");

    let model = ctx.model.as_band_model();
    let params = ctx.params;
    let kp_num = params.kp_num.unwrap_or(70);
    let window = params.band_window.unwrap_or_default();
    let num_half = params.num_half.unwrap_or(2);
    let photons = params.photon_energies.clone().unwrap_or_default();

    match task {
        Task::Bands => {
            let density = params.path_density.unwrap_or(100.0) / model.path_unit();
            let path = ctx.model.default_path().sample(density, true);
            let key = format!(
                "{}_{}_{}",
                cache_key(model, "bands", path.len()),
                window.lower,
                window.upper
            );
            let energies = cached_rows(cache, &key, ctx.refresh, || {
                path_energies(model, ctx.evaluator, &path, window)
            })?;
            let shift = params.shift_to_half_filling.unwrap_or(true);
            report.bands = Some(BandStructure::from_path_energies(energies, &path, shift));
        }
        Task::Dos => {
            let energies = grid_energies(ctx, cache, kp_num, window)?;
            let bins = params.dos_bins.unwrap_or(200);
            report.dos = Some(density_of_states(
                &energies,
                bins,
                params.dos_range,
                model.unit_cell_area(),
            )?);
        }
        Task::Jdos => {
            let energies = grid_energies(ctx, cache, kp_num, window)?;
            let bins = params.dos_bins.unwrap_or(200);
            report.jdos = Some(joint_density_of_states(
                &energies,
                window,
                bins,
                params.jdos_range,
                model.unit_cell_area(),
            )?);
        }
        Task::Absorption => {
            let broadening = params.broadening.unwrap_or(100.0);
            let key = format!(
                "{}_half{}_delta{}",
                cache_key(model, "absorption", kp_num),
                num_half,
                broadening
            );
            let rows = spectrum_rows(ctx, cache, &key, &photons, 2, || {
                let grid = brillouin_grid(model, kp_num);
                let spectrum =
                    absorption(model, ctx.evaluator, &grid, num_half, &photons, broadening)?;
                Ok(spectrum
                    .photon_energies
                    .iter()
                    .zip(&spectrum.absorption)
                    .map(|(e, a)| vec![*e, *a])
                    .collect())
            })?;
            report.absorption = Some(AbsorptionSpectrum {
                photon_energies: rows.iter().map(|row| row[0]).collect(),
                absorption: rows.iter().map(|row| row[1]).collect(),
            });
        }
        Task::Conductivity => {
            let eta = params.conductivity_eta.unwrap_or(20.0);
            let key = format!(
                "{}_half{}_eta{}",
                cache_key(model, "conductivity", kp_num),
                num_half,
                eta
            );
            let rows = spectrum_rows(ctx, cache, &key, &photons, 3, || {
                let grid = brillouin_grid(model, kp_num);
                let spectrum =
                    optical_conductivity(model, ctx.evaluator, &grid, num_half, &photons, eta)?;
                Ok(spectrum
                    .photon_energies
                    .iter()
                    .zip(&spectrum.response)
                    .map(|(e, z)| vec![*e, z.re, z.im])
                    .collect())
            })?;
            let response: Vec<Complex<f64>> =
                rows.iter().map(|row| Complex::new(row[1], row[2])).collect();
            report.conductivity = Some(ConductivitySpectrum {
                photon_energies: rows.iter().map(|row| row[0]).collect(),
                sigma_xx: response.iter().map(|z| -z.im).collect(),
                response,
            });
        }
        Task::Raman => {
            let density = params.path_density.unwrap_or(100.0) / model.path_unit();
            let path = ctx.model.raman_path().sample(density, false);
            let points: Vec<_> = path.points().copied().collect();
            let raman_params = RamanParams {
                photon_energy: params.raman_photon_energy.unwrap_or(2000.0),
                phonon_energy: params.raman_phonon_energy.unwrap_or(196.0),
                gamma: params.raman_gamma.unwrap_or(100.0),
                num_half,
                inner_transitions: params.raman_inner_transitions,
            };
            let key = format!(
                "{}_half{}_inner{}_e{}_ph{}_g{}",
                cache_key(model, "raman", points.len()),
                num_half,
                raman_params.inner_transitions.unwrap_or(num_half),
                raman_params.photon_energy,
                raman_params.phonon_energy,
                raman_params.gamma
            );
            // Complex terms are stored as interleaved (re, im) columns.
            let rows = cached_rows(cache, &key, ctx.refresh, || {
                Ok(raman_term_rows(model, ctx.evaluator, &points, &raman_params)?
                    .iter()
                    .map(|row| row.iter().flat_map(|z| [z.re, z.im]).collect())
                    .collect())
            })?;
            let terms = rows
                .iter()
                .map(|row| {
                    if row.len() % 2 != 0 {
                        return Err(TbgError::Cache {
                            key: key.clone(),
                            message: format!("odd Raman row width {}", row.len()),
                        });
                    }
                    Ok(row
                        .chunks_exact(2)
                        .map(|pair| Complex::new(pair[0], pair[1]))
                        .collect())
                })
                .collect::<Result<Vec<Vec<Complex<f64>>>>>()?;
            report.raman = Some(RamanSpectrum::from_terms(&terms, model.unit_cell_area()));
        }
        Task::Chern => {
            let band = params.chern_band.unwrap_or(1);
            let chern_kp_num = params.chern_kp_num.unwrap_or(30);
            report.chern.push(chern_number_kubo(model, ctx.evaluator, chern_kp_num, band)?);
            report.chern.push(chern_number_plaquette(model, ctx.evaluator, chern_kp_num, band)?);
        }
        Task::FermiVelocity => {
            let proportion = params.fermi_proportion.unwrap_or(0.01);
            report.fermi_velocity = Some(ctx.model.fermi_velocity(proportion)?);
        }
        Task::Patch => {
            let path = ctx.model.default_path();
            let center = path.vertices.first().copied().unwrap_or_else(KPoint::zeros);
            let radius = params.patch_radius.unwrap_or(0.1) * model.path_unit();
            let points = patch(
                &center,
                &KPoint::new(radius, 0.0),
                params.patch_density.unwrap_or(20),
            );
            report.patch = Some(band_energies(model, ctx.evaluator, &points, window)?);
        }
        Task::EnergyDifference => {
            let (valence, conduction) = params.transition_pair.unwrap_or((1, 1));
            let energies = grid_energies(ctx, cache, kp_num, window)?;
            report.energy_difference =
                Some(energy_difference_map(&energies, window, valence, conduction)?);
        }
    }
    Ok(())
}

/// Windowed energies over the full grid, shared by DOS and JDOS.
fn grid_energies(
    ctx: &TaskContext<'_>,
    cache: &mut dyn ResultCache,
    kp_num: usize,
    window: BandWindow,
) -> Result<Vec<Vec<f64>>> {
    let model = ctx.model.as_band_model();
    let key = format!(
        "{}_{}_{}",
        cache_key(model, "energies", kp_num),
        window.lower,
        window.upper
    );
    cached_rows(cache, &key, ctx.refresh, || {
        let grid = brillouin_grid(model, kp_num);
        band_energies(model, ctx.evaluator, &grid, window)
    })
}

/// Spectrum rows `[E, values..]` of `width` columns. A cached entry is
/// reused only when its photon energies are the requested ones.
fn spectrum_rows<F>(
    ctx: &TaskContext<'_>,
    cache: &mut dyn ResultCache,
    key: &str,
    photons: &[f64],
    width: usize,
    compute: F,
) -> Result<Vec<Vec<f64>>>
where
    F: FnOnce() -> Result<Vec<Vec<f64>>>,
{
    if !ctx.refresh {
        if let Some(hit) = cache.load(key)? {
            let rows = hit.to_rows()?;
            let matches = rows.len() == photons.len()
                && rows
                    .iter()
                    .zip(photons)
                    .all(|(row, e)| row.len() == width && row[0] == *e);
            if matches {
                info!("Loaded {} from cache", key);
                return Ok(rows);
            }
            debug!("photon energies changed, recomputing {}", key);
        }
    }
    cached_rows(cache, key, true, compute)
}

fn brillouin_grid(model: &dyn BandModel, kp_num: usize) -> Vec<KPoint> {
    let (v1, v2) = model.grid_vectors();
    uniform_grid(&v1, &v2, kp_num)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CachedArray, MemoryCache};
    use crate::model_impl::{ContinuumModel, ContinuumParams};

    fn small_model() -> BuiltModel {
        BuiltModel::Continuum(
            ContinuumModel::new(ContinuumParams {
                twist_angle: 1.5,
                loop_times: 2,
                ..ContinuumParams::default()
            })
            .unwrap(),
        )
    }

    fn small_params() -> ObservableParams {
        ObservableParams {
            kp_num: Some(3),
            path_density: Some(5.0),
            band_window: Some(BandWindow::symmetric(2)),
            dos_bins: Some(30),
            jdos_range: Some((0.0, 300.0)),
            photon_energies: Some(vec![50.0, 150.0]),
            ..ObservableParams::default()
        }
        .with_defaults()
    }

    const CACHED_TASKS: [Task; 4] = [Task::Bands, Task::Absorption, Task::Conductivity, Task::Raman];

    /// Replaces every stored value except the photon column of spectra.
    fn overwrite_entries(cache: &mut MemoryCache, value: f64) {
        let keys: Vec<String> = cache.keys().map(str::to_string).collect();
        for key in keys {
            let stored = cache.load(&key).unwrap().unwrap();
            let spectrum = key.contains("_absorption_") || key.contains("_conductivity_");
            let rows: Vec<Vec<f64>> = stored
                .to_rows()
                .unwrap()
                .into_iter()
                .map(|row| {
                    row.iter()
                        .enumerate()
                        .map(|(i, x)| if spectrum && i == 0 { *x } else { value })
                        .collect()
                })
                .collect();
            cache.save(&key, &CachedArray::from_rows(&rows).unwrap()).unwrap();
        }
    }

    #[test]
    fn test_second_run_reads_every_cached_task() {
        let model = small_model();
        let evaluator = ParallelEvaluator::new(2).unwrap();
        let params = small_params();
        let mut ctx = TaskContext {
            model: &model,
            evaluator: &evaluator,
            params: &params,
            refresh: false,
        };
        let mut cache = MemoryCache::new();
        let mut report = Report::new(model.as_band_model());
        for task in CACHED_TASKS {
            run_task(task, &ctx, &mut cache, &mut report).unwrap();
        }
        assert_eq!(cache.len(), 4);
        let computed = report.absorption.clone().unwrap();
        assert!(computed.absorption.iter().all(|a| *a != 7.0));

        overwrite_entries(&mut cache, 7.0);
        let mut cached = Report::new(model.as_band_model());
        for task in CACHED_TASKS {
            run_task(task, &ctx, &mut cache, &mut cached).unwrap();
        }
        let bands = cached.bands.unwrap();
        assert_eq!(bands.half_filling_energy, 7.0);
        assert!(bands.energies.iter().flatten().all(|e| *e == 0.0));
        assert_eq!(cached.absorption.unwrap().absorption, vec![7.0, 7.0]);
        assert_eq!(cached.conductivity.unwrap().sigma_xx, vec![-7.0, -7.0]);
        let raman = cached.raman.unwrap();
        let (width, points) = (raman.per_transition.len() as f64, raman.per_k.len() as f64);
        assert!(width > 0.0);
        assert!(raman.per_k.iter().all(|z| *z == Complex::new(7.0 * width, 7.0 * width)));
        assert!(raman
            .per_transition
            .iter()
            .all(|z| *z == Complex::new(7.0 * points, 7.0 * points)));

        ctx.refresh = true;
        let mut refreshed = Report::new(model.as_band_model());
        run_task(Task::Absorption, &ctx, &mut cache, &mut refreshed).unwrap();
        assert_eq!(refreshed.absorption.unwrap().absorption, computed.absorption);
    }

    #[test]
    fn test_changed_photon_energies_are_recomputed() {
        let model = small_model();
        let evaluator = ParallelEvaluator::new(2).unwrap();
        let params = small_params();
        let ctx = TaskContext {
            model: &model,
            evaluator: &evaluator,
            params: &params,
            refresh: false,
        };
        let mut cache = MemoryCache::new();
        let mut report = Report::new(model.as_band_model());
        run_task(Task::Absorption, &ctx, &mut cache, &mut report).unwrap();

        let wider = ObservableParams {
            photon_energies: Some(vec![50.0, 150.0, 250.0]),
            ..params.clone()
        };
        let ctx = TaskContext {
            params: &wider,
            ..ctx
        };
        run_task(Task::Absorption, &ctx, &mut cache, &mut report).unwrap();
        let spectrum = report.absorption.unwrap();
        assert_eq!(spectrum.photon_energies, vec![50.0, 150.0, 250.0]);
        assert_eq!(spectrum.absorption.len(), 3);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_jdos_uses_configured_range() {
        let model = small_model();
        let evaluator = ParallelEvaluator::new(2).unwrap();
        let params = small_params();
        let ctx = TaskContext {
            model: &model,
            evaluator: &evaluator,
            params: &params,
            refresh: false,
        };
        let mut cache = MemoryCache::new();
        let mut report = Report::new(model.as_band_model());
        run_task(Task::Jdos, &ctx, &mut cache, &mut report).unwrap();

        let edges = &report.jdos.unwrap().histogram.edges;
        assert_eq!(edges.len(), 31);
        assert_eq!(edges[0], 0.0);
        assert!((edges[30] - 300.0).abs() < 1e-9);
    }
}
