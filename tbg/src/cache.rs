//! Persistence of computed arrays keyed by model, observable, angle and
//! sampling density.

use crate::error::{Result, TbgError};
use crate::model::BandModel;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Row-major array of `f64` with an explicit shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedArray {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl CachedArray {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(TbgError::DimensionMismatch {
                context: format!("cached array of shape {:?}", shape),
                expected,
                found: data.len(),
            });
        }
        Ok(CachedArray { shape, data })
    }

    /// Packs equally long rows into a 2-d array.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let width = rows.first().map_or(0, Vec::len);
        if let Some(row) = rows.iter().find(|row| row.len() != width) {
            return Err(TbgError::DimensionMismatch {
                context: "cached rows".to_string(),
                expected: width,
                found: row.len(),
            });
        }
        Self::new(vec![rows.len(), width], rows.concat())
    }

    pub fn to_rows(&self) -> Result<Vec<Vec<f64>>> {
        match self.shape.as_slice() {
            [_, 0] => Ok(vec![Vec::new(); self.shape[0]]),
            [_, width] => Ok(self.data.chunks(*width).map(<[f64]>::to_vec).collect()),
            _ => Err(TbgError::DimensionMismatch {
                context: "cached array rank".to_string(),
                expected: 2,
                found: self.shape.len(),
            }),
        }
    }
}

/// Keyed storage of result arrays. Consulted before dispatch, written once
/// after aggregation.
pub trait ResultCache {
    fn load(&self, key: &str) -> Result<Option<CachedArray>>;

    fn save(&mut self, key: &str, value: &CachedArray) -> Result<()>;
}

/// `"{model}_{kind}_{angle:.4}_density_{kp_num}"`
pub fn cache_key<M: BandModel + ?Sized>(model: &M, kind: &str, kp_num: usize) -> String {
    format!(
        "{}_{}_{:.4}_density_{}",
        model.name(),
        kind,
        model.twist_angle(),
        kp_num
    )
}

/// Returns the cached rows under `key`, or computes, stores and returns
/// them. With `refresh` set the cached value is ignored and overwritten.
pub fn cached_rows<C, F>(cache: &mut C, key: &str, refresh: bool, compute: F) -> Result<Vec<Vec<f64>>>
where
    C: ResultCache + ?Sized,
    F: FnOnce() -> Result<Vec<Vec<f64>>>,
{
    if !refresh {
        if let Some(hit) = cache.load(key)? {
            info!("Loaded {} from cache", key);
            return hit.to_rows();
        }
    }
    let rows = compute()?;
    cache.save(key, &CachedArray::from_rows(&rows)?)?;
    Ok(rows)
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: HashMap<String, CachedArray>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl ResultCache for MemoryCache {
    fn load(&self, key: &str) -> Result<Option<CachedArray>> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &CachedArray) -> Result<()> {
        self.entries.insert(key.to_string(), value.clone());
        Ok(())
    }
}

/// One `<key>.pkl` file per entry under a root directory.
#[derive(Debug, Clone)]
pub struct PickleCache {
    root: PathBuf,
}

impl PickleCache {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| TbgError::Cache {
            key: root.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(PickleCache { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.pkl", key))
    }
}

impl ResultCache for PickleCache {
    fn load(&self, key: &str) -> Result<Option<CachedArray>> {
        let path = self.path_for(key);
        if !path.exists() {
            debug!("cache miss: {}", path.display());
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(|e| cache_error(key, e))?;
        let value = serde_pickle::from_slice(&bytes, serde_pickle::DeOptions::new())
            .map_err(|e| cache_error(key, e))?;
        Ok(Some(value))
    }

    fn save(&mut self, key: &str, value: &CachedArray) -> Result<()> {
        let bytes = serde_pickle::to_vec(value, serde_pickle::SerOptions::new())
            .map_err(|e| cache_error(key, e))?;
        let path = self.path_for(key);
        fs::write(&path, bytes).map_err(|e| cache_error(key, e))?;
        debug!("cached {} at {}", key, path.display());
        Ok(())
    }
}

fn cache_error<E: std::fmt::Display>(key: &str, err: E) -> TbgError {
    TbgError::Cache {
        key: key.to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_impl::{ContinuumModel, ContinuumParams};
    use std::cell::Cell;

    fn temp_root(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tbg-cache-{}-{}", name, std::process::id()))
    }

    #[test]
    fn test_rows_round_trip_through_pickle_files() {
        let root = temp_root("pickle");
        let mut cache = PickleCache::new(&root).unwrap();
        let rows = vec![vec![1.0, -2.5], vec![3.25, 4.0], vec![0.0, 1e-9]];
        let array = CachedArray::from_rows(&rows).unwrap();
        assert_eq!(array.shape, vec![3, 2]);

        assert_eq!(cache.load("bands").unwrap(), None);
        cache.save("bands", &array).unwrap();
        assert!(cache.path_for("bands").exists());
        let loaded = cache.load("bands").unwrap().unwrap();
        assert_eq!(loaded.to_rows().unwrap(), rows);

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_cached_rows_computes_once() {
        let mut cache = MemoryCache::new();
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Ok(vec![vec![1.0, 2.0]])
        };

        let first = cached_rows(&mut cache, "k", false, compute).unwrap();
        let second = cached_rows(&mut cache, "k", false, compute).unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);

        cached_rows(&mut cache, "k", true, compute).unwrap();
        assert_eq!(calls.get(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_ragged_rows_are_rejected() {
        let rows = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(matches!(
            CachedArray::from_rows(&rows),
            Err(TbgError::DimensionMismatch { expected: 2, found: 1, .. })
        ));
        assert!(CachedArray::new(vec![2, 2], vec![0.0; 3]).is_err());
    }

    #[test]
    fn test_cache_key_format() {
        let model = ContinuumModel::new(ContinuumParams {
            twist_angle: 1.05,
            loop_times: 1,
            ..ContinuumParams::default()
        })
        .unwrap();
        assert_eq!(cache_key(&model, "dos", 70), "continuum_dos_1.0500_density_70");
    }
}
