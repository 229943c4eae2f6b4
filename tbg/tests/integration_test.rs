//! End-to-end runs of both models through the public API
//!
//! The YAML files under `configs/` are parsed as shipped, then shrunk so
//! every task finishes quickly.

use std::path::PathBuf;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use tbg::app::{build_model, run_task, BuiltModel, Report, TaskContext};
    use tbg::cache::{cached_rows, MemoryCache, PickleCache, ResultCache};
    use tbg::config::{Config, ModelConfig, ObservableParams, Task};
    use tbg::io::{export_json, read_json};
    use tbg::observables::{band_energies, band_structure, BandWindow};
    use tbg::sampler::uniform_grid;
    use tbg::{BandModel, ContinuumModel, ContinuumParams, ParallelEvaluator};

    fn config_path(filename: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("configs")
            .join(filename)
    }

    fn load(filename: &str) -> Config {
        let content = std::fs::read_to_string(config_path(filename)).unwrap();
        serde_yml::from_str::<Config>(&content).unwrap().with_defaults()
    }

    fn small_params() -> ObservableParams {
        ObservableParams {
            kp_num: Some(4),
            path_density: Some(5.0),
            band_window: Some(BandWindow::symmetric(2)),
            dos_bins: Some(20),
            photon_energies: Some(vec![50.0, 100.0, 200.0]),
            chern_kp_num: Some(4),
            patch_density: Some(4),
            ..ObservableParams::default()
        }
        .with_defaults()
    }

    #[test]
    fn test_shipped_configs_parse() {
        let continuum = load("continuum.yaml");
        assert!(matches!(continuum.model, ModelConfig::Continuum(_)));
        assert_eq!(continuum.workers(), Some(8));
        assert!(continuum.tasks.contains(&Task::FermiVelocity));

        let tight_binding = load("tight_binding.yaml");
        match &tight_binding.model {
            ModelConfig::TightBinding(params) => assert_eq!((params.m0, params.r), (6, 1)),
            other => panic!("unexpected model {:?}", other),
        }
        assert!(!tight_binding.is_cache_enabled());
    }

    #[test]
    fn test_every_task_on_a_small_continuum_model() {
        let mut config = load("continuum.yaml");
        if let ModelConfig::Continuum(params) = &mut config.model {
            params.loop_times = 3;
            params.twist_angle = 1.5;
        }
        let model = build_model(&config).unwrap();
        assert!(matches!(model, BuiltModel::Continuum(_)));

        let evaluator = ParallelEvaluator::new(3).unwrap();
        let params = small_params();
        let ctx = TaskContext {
            model: &model,
            evaluator: &evaluator,
            params: &params,
            refresh: false,
        };
        let mut cache = MemoryCache::new();
        let mut report = Report::new(model.as_band_model());

        let tasks = [
            Task::Bands,
            Task::Dos,
            Task::Jdos,
            Task::Absorption,
            Task::Conductivity,
            Task::Raman,
            Task::Chern,
            Task::FermiVelocity,
            Task::Patch,
            Task::EnergyDifference,
        ];
        for task in tasks {
            run_task(task, &ctx, &mut cache, &mut report).unwrap();
        }

        // DOS, JDOS and the energy-difference map share one cached grid;
        // bands and the three optical tasks add one entry each
        assert_eq!(cache.len(), 5);
        let dos = report.dos.as_ref().unwrap();
        assert_eq!(dos.histogram.total(), 16 * 4);
        assert_eq!(report.jdos.as_ref().unwrap().histogram.total(), 16 * 4);
        assert_eq!(report.absorption.as_ref().unwrap().absorption.len(), 3);
        assert_eq!(report.conductivity.as_ref().unwrap().sigma_xx.len(), 3);
        assert!(report.raman.as_ref().unwrap().intensity.is_finite());
        assert_eq!(report.chern.len(), 2);
        assert!(report.fermi_velocity.unwrap() > 0.0);
        assert_eq!(report.patch.as_ref().unwrap().len(), 25);
        let gaps = report.energy_difference.as_ref().unwrap();
        assert_eq!(gaps.len(), 16);
        assert!(gaps.iter().all(|g| *g >= 0.0));

        let path = std::env::temp_dir().join(format!("tbg-report-{}.json", std::process::id()));
        export_json(&report, &path).unwrap();
        let back: Report = read_json(&path).unwrap();
        assert_eq!(back.model, "continuum");
        assert_eq!(back.dimension, report.dimension);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_tight_binding_band_structure() {
        let mut config = load("tight_binding.yaml");
        if let ModelConfig::TightBinding(params) = &mut config.model {
            params.m0 = 1;
            params.r = 1;
        }
        let model = build_model(&config).unwrap();
        let band_model = model.as_band_model();
        assert_eq!(band_model.dimension(), 28);

        let evaluator = ParallelEvaluator::new(2).unwrap();
        let path = model
            .default_path()
            .sample(10.0 / band_model.path_unit(), true);
        let bands = band_structure(band_model, &evaluator, &path, BandWindow::symmetric(4), false)
            .unwrap();

        assert_eq!(bands.energies.len(), path.len());
        assert_eq!(bands.labels, vec!["K_1", "Γ", "M", "K_2"]);
        for row in &bands.energies {
            assert_eq!(row.len(), 8);
            assert!(row.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_pickle_cache_serves_second_run() {
        let model = ContinuumModel::new(ContinuumParams {
            loop_times: 2,
            ..ContinuumParams::default()
        })
        .unwrap();
        let evaluator = ParallelEvaluator::new(2).unwrap();
        let (v1, v2) = model.grid_vectors();
        let grid = uniform_grid(&v1, &v2, 3);
        let root = std::env::temp_dir().join(format!("tbg-it-cache-{}", std::process::id()));
        let key = tbg::cache_key(&model, "energies", 3);

        let mut cache = PickleCache::new(&root).unwrap();
        let first = cached_rows(&mut cache, &key, false, || {
            band_energies(&model, &evaluator, &grid, BandWindow::symmetric(2))
        })
        .unwrap();

        let reopened = PickleCache::new(&root).unwrap();
        let stored = reopened.load(&key).unwrap().unwrap();
        assert_eq!(stored.shape, vec![9, 4]);
        assert_eq!(stored.to_rows().unwrap(), first);

        std::fs::remove_dir_all(&root).unwrap();
    }
}
