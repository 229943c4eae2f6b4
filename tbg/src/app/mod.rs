mod report;
mod runner;
mod tasks;

pub use report::{report_summary, Report};
pub use runner::{build_evaluator, build_model, resolve_workers, BuiltModel, SLURM_CPUS_VAR};
pub use tasks::{run_task, TaskContext};

use crate::cache::{MemoryCache, PickleCache, ResultCache};
use crate::config::{Args, Config, ModelConfig};
use crate::io::{export_json, setup_output};
use clap::Parser;
use color_eyre::eyre::{bail, Result, WrapErr};
use std::fs;
use tracing::info;

pub struct TbgApplication {
    args: Args,
    config: Config,
}

impl TbgApplication {
    pub fn from_cli() -> Result<Self> {
        let args = Args::parse();
        let config = load_config(&args)?;
        Ok(Self { args, config })
    }

    pub fn run(self) -> Result<()> {
        setup_output(self.args.output.as_ref());

        let model = build_model(&self.config).wrap_err("Failed to build the band model")?;
        let evaluator = build_evaluator(self.config.workers())?;
        let params = self.config.observables();

        let mut cache: Box<dyn ResultCache> = if self.config.is_cache_enabled() {
            let directory = self.config.cache_directory();
            info!("Caching results under {}", directory);
            Box::new(
                PickleCache::new(&directory)
                    .wrap_err_with(|| format!("Unable to open cache directory: {}", directory))?,
            )
        } else {
            Box::new(MemoryCache::new())
        };

        let ctx = TaskContext {
            model: &model,
            evaluator: &evaluator,
            params: &params,
            refresh: self.config.is_cache_refresh(),
        };
        let mut report = Report::new(model.as_band_model());
        for task in &self.config.tasks {
            run_task(*task, &ctx, cache.as_mut(), &mut report)
                .wrap_err_with(|| format!("Task {:?} failed", task))?;
        }

        report_summary(&report);
        if let Some(path) = &self.args.export {
            export_json(&report, path)?;
        }
        Ok(())
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let config_content = fs::read_to_string(&args.config_file)
        .wrap_err_with(|| format!("Unable to read configuration file: {}", args.config_file))?;

    let config = serde_yml::from_str::<Config>(&config_content)
        .wrap_err("Failed to parse configuration file")?
        .with_defaults();

    apply_overrides(config, args)
}

/// CLI flags take precedence over the file.
fn apply_overrides(mut config: Config, args: &Args) -> Result<Config> {
    if let Some(workers) = args.workers {
        config.parallel.get_or_insert_with(Default::default).workers = Some(workers);
    }
    if let Some(kp_num) = args.kp_num {
        config.observables.get_or_insert_with(Default::default).kp_num = Some(kp_num);
    }
    if let Some(angle) = args.twist_angle {
        match &mut config.model {
            ModelConfig::Continuum(params) => params.twist_angle = angle,
            ModelConfig::TightBinding(params) => bail!(
                "--twist-angle does not apply to the tight-binding model; \
                 its angle is fixed by m0 = {} and r = {}",
                params.m0,
                params.r
            ),
        }
    }
    let cache = config.cache.get_or_insert_with(Default::default);
    if let Some(directory) = &args.cache_dir {
        cache.directory = Some(directory.clone());
    }
    if args.no_cache {
        cache.enabled = Some(false);
    }
    if args.refresh {
        cache.refresh = Some(true);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let yaml = "model:\n  type: continuum\nparallel:\n  workers: 2\n";
        let config = serde_yml::from_str::<Config>(yaml).unwrap().with_defaults();
        let args = Args::parse_from([
            "tbg",
            "--workers",
            "6",
            "--kp-num",
            "9",
            "--twist-angle",
            "1.3",
            "--no-cache",
        ]);
        let config = apply_overrides(config, &args).unwrap();

        assert_eq!(config.workers(), Some(6));
        assert_eq!(config.observables().kp_num, Some(9));
        assert!(!config.is_cache_enabled());
        match config.model {
            ModelConfig::Continuum(params) => assert_eq!(params.twist_angle, 1.3),
            other => panic!("unexpected model {:?}", other),
        }
    }

    #[test]
    fn test_twist_angle_rejected_for_tight_binding() {
        let yaml = "model:\n  type: tight_binding\n  m0: 2\n  r: 1\n";
        let config = serde_yml::from_str::<Config>(yaml).unwrap().with_defaults();
        let args = Args::parse_from(["tbg", "--twist-angle", "1.3"]);
        let err = apply_overrides(config.clone(), &args).unwrap_err();
        assert!(err.to_string().contains("m0 = 2"));

        let args = Args::parse_from(["tbg", "--kp-num", "5"]);
        let config = apply_overrides(config, &args).unwrap();
        assert_eq!(config.observables().kp_num, Some(5));
    }
}
