//! Data validation utilities.

use std::path::{Path, PathBuf};

use dyson_core::data::GameData;
use dyson_core::error::{GameError, Result};

/// Validation result for one data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    /// File that was checked.
    pub path: PathBuf,
    /// Parse or consistency errors; empty when the file is valid.
    pub errors: Vec<String>,
}

impl FileReport {
    /// Whether the file passed.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validation result for a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// One report per `.ron` file, sorted by path.
    pub files: Vec<FileReport>,
}

impl ValidationReport {
    /// Whether every file passed.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.files.iter().all(FileReport::is_ok)
    }

    /// Total errors across all files.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.files.iter().map(|f| f.errors.len()).sum()
    }
}

/// Parse and validate one RON game data file.
///
/// IO and parse failures are reported as file errors rather than returned.
#[must_use]
pub fn validate_file(path: &Path) -> FileReport {
    let errors = match std::fs::read_to_string(path) {
        Ok(source) => match ron::from_str::<GameData>(&source) {
            Ok(data) => data.validate(),
            Err(e) => vec![format!("Parse error: {e}")],
        },
        Err(e) => vec![format!("Read error: {e}")],
    };

    for error in &errors {
        tracing::warn!(path = %path.display(), %error, "Invalid data");
    }
    FileReport {
        path: path.to_path_buf(),
        errors,
    }
}

/// Validate all RON data files in a directory.
///
/// # Errors
///
/// Returns an error if the directory cannot be read or holds no `.ron`
/// files. Invalid files are listed in the report instead.
pub fn validate_data_directory(path: &Path) -> Result<ValidationReport> {
    let entries = std::fs::read_dir(path).map_err(|e| GameError::DataParseError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "ron"))
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(GameError::InvalidData(format!(
            "No .ron data files in {}",
            path.display()
        )));
    }

    let report = ValidationReport {
        files: files.iter().map(|file| validate_file(file)).collect(),
    };
    tracing::info!(
        files = report.files.len(),
        errors = report.error_count(),
        "Validated data directory"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        GameData(
            zones: [
                (id: "earth", name: "Earth", radius_au: 1.0, metal_percentage: 0.3,
                 metal_stores_kg: 1.0e20, total_mass_kg: 5.0e20),
            ],
        )
    "#;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_bundled_data_is_valid() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../dyson_core/data");
        let report = validate_data_directory(&dir).unwrap();
        assert!(report.is_ok(), "{report:?}");
        assert!(!report.files.is_empty());
    }

    #[test]
    fn test_minimal_file_passes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "minimal.ron", MINIMAL);
        assert!(validate_file(&path).is_ok());
    }

    #[test]
    fn test_inconsistent_file_reported() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "good.ron", MINIMAL);
        write(
            dir.path(),
            "bad.ron",
            r#"GameData(
                zones: [
                    (id: "a", name: "A", radius_au: 1.0, metal_percentage: 1.5,
                     metal_stores_kg: 10.0, total_mass_kg: 5.0),
                    (id: "a", name: "A again", radius_au: 2.0),
                ],
            )"#,
        );
        write(dir.path(), "notes.txt", "not data");

        let report = validate_data_directory(dir.path()).unwrap();
        assert_eq!(report.files.len(), 2);
        assert!(!report.is_ok());

        let bad = &report.files[0];
        assert!(bad.path.ends_with("bad.ron"));
        assert!(bad.errors.iter().any(|e| e.contains("Duplicate zone id 'a'")));
        assert!(bad.errors.iter().any(|e| e.contains("metal_percentage")));
        assert!(bad.errors.iter().any(|e| e.contains("less total mass")));
        assert!(report.files[1].is_ok());
        assert!(report.error_count() >= 3);
    }

    #[test]
    fn test_parse_error_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "broken.ron", "GameData(zones: [");
        let report = validate_file(&path);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("Parse error"));
    }

    #[test]
    fn test_empty_or_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            validate_data_directory(dir.path()),
            Err(GameError::InvalidData(_))
        ));
        assert!(matches!(
            validate_data_directory(&dir.path().join("missing")),
            Err(GameError::DataParseError { .. })
        ));
    }
}
