use crate::error::{Result, TbgError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Writes `value` as pretty-printed JSON for the plotting layer.
pub fn export_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| export_error(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| export_error(path, e))?;
    writer.flush().map_err(|e| export_error(path, e))?;
    info!("Exported results to {}", path.display());
    Ok(())
}

pub fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| export_error(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| export_error(path, e))
}

fn export_error<E: std::fmt::Display>(path: &Path, err: E) -> TbgError {
    TbgError::Export {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observables::BandWindow;

    #[test]
    fn test_json_export_round_trip() {
        let path = std::env::temp_dir().join(format!("tbg-export-{}.json", std::process::id()));
        let window = BandWindow::new(-3, 5);
        export_json(&window, &path).unwrap();
        let back: BandWindow = read_json(&path).unwrap();
        assert_eq!(back, window);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_export_failure_names_the_path() {
        let path = std::env::temp_dir()
            .join(format!("tbg-missing-{}", std::process::id()))
            .join("report.json");
        let err = export_json(&BandWindow::default(), &path).unwrap_err();
        assert!(matches!(err, TbgError::Export { .. }));
        assert!(err.to_string().starts_with("export to"));

        let err = read_json::<BandWindow, _>(&path).unwrap_err();
        assert!(matches!(err, TbgError::Export { .. }));
    }
}
