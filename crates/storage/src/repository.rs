use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quote_core::model::{
    AnalysisId, AnalysisResult, BatchId, CertificationType, PricingSnapshot,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Keyed access to analysis results, scoped by batch.
///
/// The pricing snapshot is the only part of a record this engine writes;
/// everything else is owned by the OCR/AI pipeline or manual insertion.
#[async_trait]
pub trait AnalysisRepository: Send + Sync {
    /// List every analysis result in a batch, ordered by `created_at`
    /// then id so sheets rebuild in a stable order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the batch cannot be read.
    async fn list_for_batch(&self, batch_id: BatchId) -> Result<Vec<AnalysisResult>, StorageError>;

    /// Fetch one analysis result.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get(&self, id: AnalysisId) -> Result<AnalysisResult, StorageError>;

    /// Insert a new analysis result (pipeline output or manual insertion).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id already exists.
    async fn insert(&self, result: &AnalysisResult) -> Result<(), StorageError>;

    /// Write the pricing snapshot for one result, replacing any prior one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the result does not exist.
    async fn update_pricing(
        &self,
        id: AnalysisId,
        pricing: &PricingSnapshot,
    ) -> Result<(), StorageError>;

    /// The `saved_at` of the currently persisted snapshot, if any. Used to
    /// detect a save racing a newer snapshot from another operator.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the result does not exist.
    async fn current_saved_at(&self, id: AnalysisId)
        -> Result<Option<DateTime<Utc>>, StorageError>;

    /// Delete an analysis result. Only manually-created entries are ever
    /// deleted; callers enforce that rule.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the result does not exist.
    async fn delete(&self, id: AnalysisId) -> Result<(), StorageError>;
}

/// Read-only certification reference data, externally owned.
#[async_trait]
pub trait CertificationTypeRepository: Send + Sync {
    /// Active certification types ordered by sort key, then name.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on persistence failures.
    async fn list_active(&self) -> Result<Vec<CertificationType>, StorageError>;
}

/// Key→value lookup for billing constants.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Fetch one setting value; `None` when the key is unset.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on persistence failures.
    async fn get_value(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Fetch every `(key, value)` pair whose key starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on persistence failures.
    async fn list_prefixed(&self, prefix: &str) -> Result<Vec<(String, String)>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    analyses: Arc<Mutex<HashMap<AnalysisId, AnalysisResult>>>,
    certifications: Arc<Mutex<Vec<CertificationType>>>,
    settings: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a certification type. Test/prototype helper; the real
    /// reference data is externally owned.
    pub fn add_certification_type(&self, certification: CertificationType) {
        if let Ok(mut guard) = self.certifications.lock() {
            guard.push(certification);
        }
    }

    /// Seed a setting key. Test/prototype helper.
    pub fn set_setting(&self, key: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut guard) = self.settings.lock() {
            guard.insert(key.into(), value.into());
        }
    }
}

#[async_trait]
impl AnalysisRepository for InMemoryRepository {
    async fn list_for_batch(&self, batch_id: BatchId) -> Result<Vec<AnalysisResult>, StorageError> {
        let guard = self
            .analyses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut results: Vec<AnalysisResult> = guard
            .values()
            .filter(|r| r.batch_id == batch_id)
            .cloned()
            .collect();
        results.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(results)
    }

    async fn get(&self, id: AnalysisId) -> Result<AnalysisResult, StorageError> {
        let guard = self
            .analyses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn insert(&self, result: &AnalysisResult) -> Result<(), StorageError> {
        let mut guard = self
            .analyses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.contains_key(&result.id) {
            return Err(StorageError::Conflict);
        }
        guard.insert(result.id, result.clone());
        Ok(())
    }

    async fn update_pricing(
        &self,
        id: AnalysisId,
        pricing: &PricingSnapshot,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .analyses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let result = guard.get_mut(&id).ok_or(StorageError::NotFound)?;
        result.pricing = Some(pricing.clone());
        Ok(())
    }

    async fn current_saved_at(
        &self,
        id: AnalysisId,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        let guard = self
            .analyses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let result = guard.get(&id).ok_or(StorageError::NotFound)?;
        Ok(result.pricing.as_ref().map(|p| p.saved_at))
    }

    async fn delete(&self, id: AnalysisId) -> Result<(), StorageError> {
        let mut guard = self
            .analyses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(&id).map(|_| ()).ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl CertificationTypeRepository for InMemoryRepository {
    async fn list_active(&self) -> Result<Vec<CertificationType>, StorageError> {
        let guard = self
            .certifications
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut types: Vec<CertificationType> =
            guard.iter().filter(|t| t.active).cloned().collect();
        types.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(types)
    }
}

#[async_trait]
impl SettingsRepository for InMemoryRepository {
    async fn get_value(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .settings
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn list_prefixed(&self, prefix: &str) -> Result<Vec<(String, String)>, StorageError> {
        let guard = self
            .settings
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut pairs: Vec<(String, String)> = guard
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        pairs.sort();
        Ok(pairs)
    }
}

/// Aggregates the repositories behind trait objects for easy backend
/// swapping.
#[derive(Clone)]
pub struct Storage {
    pub analyses: Arc<dyn AnalysisRepository>,
    pub certification_types: Arc<dyn CertificationTypeRepository>,
    pub settings: Arc<dyn SettingsRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(InMemoryRepository::new())
    }

    /// Wrap an existing in-memory repository, keeping a handle for seeding.
    #[must_use]
    pub fn from_in_memory(repo: InMemoryRepository) -> Self {
        let analyses: Arc<dyn AnalysisRepository> = Arc::new(repo.clone());
        let certification_types: Arc<dyn CertificationTypeRepository> = Arc::new(repo.clone());
        let settings: Arc<dyn SettingsRepository> = Arc::new(repo);
        Self {
            analyses,
            certification_types,
            settings,
        }
    }
}
