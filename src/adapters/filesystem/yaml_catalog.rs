//! YAML catalog adapter.
//!
//! Reads the authored catalog from a data directory:
//!
//! ```text
//! {data_dir}/
//! ├── profiles.yaml      # list of CulturalProfile
//! ├── rules.yaml         # list of PersonalizationRule
//! └── experiments.yaml   # list of Experiment (rewritten on save)
//! ```
//!
//! A missing file reads as an empty list.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

use crate::domain::culture::CulturalProfile;
use crate::domain::experiment::{Experiment, ExperimentStatus};
use crate::domain::foundation::DomainError;
use crate::domain::personalization::{PersonalizationRule, TestingPhase};
use crate::ports::{CultureStore, ExperimentRepository};

pub const PROFILES_FILE: &str = "profiles.yaml";
pub const RULES_FILE: &str = "rules.yaml";
pub const EXPERIMENTS_FILE: &str = "experiments.yaml";

/// Filesystem-backed culture catalog and experiment repository.
pub struct YamlCatalog {
    data_dir: PathBuf,
    // Serializes experiment read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl YamlCatalog {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    async fn read_list<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>, DomainError> {
        let path = self.data_dir.join(file);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Catalog file missing, treating as empty");
            return Ok(Vec::new());
        }

        let yaml = fs::read_to_string(&path).await.map_err(|e| {
            DomainError::unavailable("yaml_catalog", format!("Failed to read {}: {}", path.display(), e))
        })?;
        if yaml.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_yaml::from_str(&yaml).map_err(|e| {
            DomainError::unavailable("yaml_catalog", format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    async fn write_list<T: Serialize>(&self, file: &str, items: &[T]) -> Result<(), DomainError> {
        fs::create_dir_all(&self.data_dir).await.map_err(|e| {
            DomainError::unavailable("yaml_catalog", format!("Failed to create data directory: {}", e))
        })?;

        let path = self.data_dir.join(file);
        let yaml = serde_yaml::to_string(items).map_err(|e| {
            DomainError::unavailable("yaml_catalog", format!("Failed to serialize {}: {}", file, e))
        })?;

        // Temp file plus rename keeps the swap atomic.
        let temp_path = path.with_extension("yaml.tmp");
        fs::write(&temp_path, yaml).await.map_err(|e| {
            DomainError::unavailable("yaml_catalog", format!("Failed to write temporary file: {}", e))
        })?;
        fs::rename(&temp_path, &path).await.map_err(|e| {
            DomainError::unavailable("yaml_catalog", format!("Failed to rename file: {}", e))
        })
    }
}

#[async_trait]
impl CultureStore for YamlCatalog {
    async fn load_cultural_profiles(&self) -> Result<Vec<CulturalProfile>, DomainError> {
        self.read_list(PROFILES_FILE).await
    }

    async fn load_personalization_rules(
        &self,
        active_only: bool,
    ) -> Result<Vec<PersonalizationRule>, DomainError> {
        let rules: Vec<PersonalizationRule> = self.read_list(RULES_FILE).await?;
        Ok(rules
            .into_iter()
            .filter(|r| !active_only || r.phase == TestingPhase::Production)
            .collect())
    }
}

#[async_trait]
impl ExperimentRepository for YamlCatalog {
    async fn load_experiments(
        &self,
        status: Option<ExperimentStatus>,
    ) -> Result<Vec<Experiment>, DomainError> {
        let experiments: Vec<Experiment> = self.read_list(EXPERIMENTS_FILE).await?;
        Ok(experiments
            .into_iter()
            .filter(|e| status.map_or(true, |s| e.status == s))
            .collect())
    }

    async fn save(&self, experiment: &Experiment) -> Result<(), DomainError> {
        let _guard = self.write_lock.lock().await;

        let mut experiments: Vec<Experiment> = self.read_list(EXPERIMENTS_FILE).await?;
        match experiments.iter_mut().find(|e| e.id == experiment.id) {
            Some(existing) => *existing = experiment.clone(),
            None => experiments.push(experiment.clone()),
        }
        self.write_list(EXPERIMENTS_FILE, &experiments).await
    }
}
