//! Trial documents on disk.
//!
//! A trial is stored as one pretty-printed JSON file. A library is a
//! directory of such files; listing walks it and orders trials by their
//! last modification time.

use crate::models::Trial;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Read and validate a trial document.
pub fn load_trial(path: &Path) -> Result<Trial> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read trial file: {}", path.display()))?;

    let trial: Trial = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse trial file: {}", path.display()))?;

    trial
        .validate_layout()
        .with_context(|| format!("Invalid trial file: {}", path.display()))?;

    debug!(
        "Loaded trial '{}' ({} plots, {} dates)",
        trial.name,
        trial.plots().count(),
        trial.assessment_dates.len()
    );
    Ok(trial)
}

/// Write a trial document, stamping its modification time.
pub fn save_trial(trial: &mut Trial, path: &Path) -> Result<()> {
    trial.last_modified = Utc::now();
    let content = serde_json::to_string_pretty(trial)?;
    fs::write(path, content)
        .with_context(|| format!("Failed to write trial file: {}", path.display()))?;
    info!("Saved trial '{}' to {}", trial.name, path.display());
    Ok(())
}

/// File name used for a trial inside a library directory.
pub fn library_file_name(trial: &Trial) -> String {
    let stem: String = trial
        .name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    format!("{}_{}.json", stem, trial.id)
}

/// Copy a trial into `library` under a fresh id.
///
/// Returns the path of the imported file.
pub fn import_trial(source: &Path, library: &Path) -> Result<PathBuf> {
    let mut trial = load_trial(source)?;
    let now = Utc::now();
    trial.id = now.timestamp_millis().to_string();
    trial.last_modified = now;

    fs::create_dir_all(library)
        .with_context(|| format!("Failed to create library directory: {}", library.display()))?;

    let target = library.join(library_file_name(&trial));
    save_trial(&mut trial, &target)?;
    Ok(target)
}

/// One entry in a trial library listing.
#[derive(Debug, Clone)]
pub struct TrialEntry {
    pub path: PathBuf,
    pub id: String,
    pub name: String,
    pub plots: usize,
    pub dates: usize,
    pub last_modified: DateTime<Utc>,
}

/// List the trials in `library`, most recently modified first.
///
/// Files that are not valid trial documents are skipped.
pub fn list_trials(library: &Path) -> Result<Vec<TrialEntry>> {
    if !library.is_dir() {
        return Err(anyhow::anyhow!(
            "Library is not a directory: {}",
            library.display()
        ));
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(library)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("json")
        {
            continue;
        }

        match load_trial(path) {
            Ok(trial) => entries.push(TrialEntry {
                path: path.to_path_buf(),
                plots: trial.plots().count(),
                dates: trial.assessment_dates.len(),
                id: trial.id,
                name: trial.name,
                last_modified: trial.last_modified,
            }),
            Err(e) => warn!("Skipping {}: {:#}", path.display(), e),
        }
    }

    entries.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Plot, TrialConfig};
    use chrono::{Duration, NaiveDate};
    use tempfile::TempDir;

    fn sample_trial(name: &str) -> Trial {
        let mut config = TrialConfig::default();
        config.trial_name = name.to_string();
        Trial::new(
            config,
            vec![vec![Plot::real("B1-T1-R1", 1, 0), Plot::real("B1-T2-R1", 1, 1)]],
        )
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trial.json");
        let mut trial = sample_trial("Fairway 2024");

        save_trial(&mut trial, &path).unwrap();
        let loaded = load_trial(&path).unwrap();
        assert_eq!(loaded, trial);
    }

    #[test]
    fn test_load_browser_backup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Fairway_backup.json");
        let backup = r#"{
  "id": "1718000000000",
  "name": "Fairway",
  "config": {
    "trialName": "Fairway",
    "numBlocks": 1,
    "numTreatments": 2,
    "numReps": 1,
    "treatments": ["A", "B"],
    "assessmentTypes": [{ "name": "NDVI", "min": 0, "max": 1 }]
  },
  "layout": [[
    { "block": 1, "treatment": 1, "treatmentName": "B", "plot": "B1-T2-R1" },
    { "id": "blank-b1-1718000000001", "isBlank": true, "block": 1, "position": 1 },
    { "block": 1, "treatment": 0, "treatmentName": "A", "plot": "B1-T1-R1" }
  ]],
  "assessmentDates": [{
    "date": "2024-05-01",
    "assessments": {
      "NDVI": {
        "B1-T2-R1": { "value": "0.71", "entered": true },
        "B1-T1-R1": { "value": "", "entered": false }
      }
    }
  }],
  "photos": { "2024-05-01_B1-T2-R1": ["data:image/png;base64,AAAA"] },
  "notes": { "2024-05-01_NDVI": "dew on the canopy" },
  "lastModified": "2024-05-02T08:30:00.000Z",
  "created": "2024-05-01T07:00:00.000Z"
}"#;
        fs::write(&path, backup).unwrap();

        let trial = load_trial(&path).unwrap();
        assert_eq!(trial.plots().count(), 3);
        assert_eq!(trial.layout[0][0], Plot::real("B1-T2-R1", 1, 1));
        assert!(trial.layout[0][1].is_blank());
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let ndvi = trial.date(date).unwrap().observations("NDVI").unwrap();
        assert_eq!(ndvi["B1-T2-R1"].numeric_value(), Some(0.71));
        assert_eq!(trial.note(date, "NDVI"), Some("dew on the canopy"));

        let library = dir.path().join("library");
        let imported = import_trial(&path, &library).unwrap();
        let copy = load_trial(&imported).unwrap();
        assert_ne!(copy.id, "1718000000000");
        assert_eq!(copy.layout, trial.layout);
    }

    #[test]
    fn test_load_rejects_zero_blocks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("zero.json");
        let mut trial = sample_trial("Zero");
        trial.config.num_blocks = 0;
        fs::write(&path, serde_json::to_string(&trial).unwrap()).unwrap();

        let err = load_trial(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("blocks"));
    }

    #[test]
    fn test_load_rejects_invalid_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        let mut trial = sample_trial("Bad");
        trial.layout[0].push(Plot::real("B1-T9-R1", 1, 8));
        fs::write(&path, serde_json::to_string(&trial).unwrap()).unwrap();

        let err = load_trial(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("treatment 8"));
    }

    #[test]
    fn test_import_assigns_new_id() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("export.json");
        let mut trial = sample_trial("Green Speed");
        trial.id = "1".to_string();
        save_trial(&mut trial, &source).unwrap();

        let library = dir.path().join("library");
        let target = import_trial(&source, &library).unwrap();
        let imported = load_trial(&target).unwrap();

        assert_ne!(imported.id, "1");
        assert_eq!(imported.name, "Green Speed");
        assert!(target
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("Green_Speed_"));
    }

    #[test]
    fn test_list_trials_newest_first_and_skips_garbage() {
        let dir = TempDir::new().unwrap();

        let mut older = sample_trial("Older");
        older.id = "100".to_string();
        let mut newer = sample_trial("Newer");
        newer.id = "200".to_string();

        // save_trial stamps "now", so write the documents directly.
        older.last_modified = Utc::now() - Duration::days(2);
        newer.last_modified = Utc::now();
        fs::write(
            dir.path().join("older.json"),
            serde_json::to_string(&older).unwrap(),
        )
        .unwrap();
        fs::write(
            dir.path().join("newer.json"),
            serde_json::to_string(&newer).unwrap(),
        )
        .unwrap();
        fs::write(dir.path().join("notes.json"), "{ not a trial").unwrap();
        fs::write(dir.path().join("readme.txt"), "hello").unwrap();

        let entries = list_trials(dir.path()).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Newer", "Older"]);
        assert_eq!(entries[0].plots, 2);
    }

    #[test]
    fn test_list_trials_requires_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("x.json");
        fs::write(&file, "{}").unwrap();
        assert!(list_trials(&file).is_err());
    }
}
