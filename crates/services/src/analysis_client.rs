use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use quote_core::model::{
    AnalysisId, AnalysisJob, AnalysisResult, BatchId, Complexity, EntryMethod, FileId, JobId,
    JobStatus, PageDetail, ProcessingStatus, SubDocument,
};

use crate::error::AnalysisClientError;

/// The OCR/AI analysis pipeline, seen from the engine.
///
/// Submission is idempotent to re-invoke: re-analysis simply submits the
/// same file ids again and yields a fresh job.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Submit files for analysis. Synchronous single-shot backends may
    /// return an already-terminal job.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisClientError` if the submission fails.
    async fn submit(
        &self,
        batch_id: BatchId,
        file_ids: &[FileId],
    ) -> Result<AnalysisJob, AnalysisClientError>;

    /// Fetch the current state of a job.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisClientError` if the poll fails.
    async fn poll(&self, job_id: JobId) -> Result<AnalysisJob, AnalysisClientError>;

    /// Fetch the per-document results of a terminal job.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisClientError` if the fetch fails.
    async fn results(&self, job_id: JobId) -> Result<Vec<AnalysisResult>, AnalysisClientError>;

    /// Fetch per-page counts for one file.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisClientError` if the fetch fails.
    async fn page_detail(&self, file_id: FileId) -> Result<PageDetail, AnalysisClientError>;
}

//
// ─── HTTP CLIENT ───────────────────────────────────────────────────────────────
//

#[derive(Clone, Debug)]
pub struct AnalysisConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl AnalysisConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("QUOTE_ANALYSIS_BASE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let api_key = env::var("QUOTE_ANALYSIS_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        Some(Self { base_url, api_key })
    }
}

/// REST adapter for the external analysis pipeline.
#[derive(Clone)]
pub struct HttpAnalysisClient {
    client: Client,
    config: Option<AnalysisConfig>,
}

impl HttpAnalysisClient {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(AnalysisConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<AnalysisConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    fn url(&self, path: &str) -> Result<(String, Option<&str>), AnalysisClientError> {
        let config = self.config.as_ref().ok_or(AnalysisClientError::Disabled)?;
        Ok((
            format!("{}/{path}", config.base_url.trim_end_matches('/')),
            config.api_key.as_deref(),
        ))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, AnalysisClientError> {
        let (url, api_key) = self.url(path)?;
        let mut request = self.client.get(url);
        if let Some(key) = api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(AnalysisClientError::HttpStatus(response.status()));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    async fn submit(
        &self,
        batch_id: BatchId,
        file_ids: &[FileId],
    ) -> Result<AnalysisJob, AnalysisClientError> {
        let (url, api_key) = self.url("v1/analysis/jobs")?;
        let mut request = self.client.post(url).json(&SubmitRequest {
            batch_id,
            file_ids: file_ids.to_vec(),
        });
        if let Some(key) = api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(AnalysisClientError::HttpStatus(response.status()));
        }
        let job: JobDto = response.json().await?;
        job.into_domain()
    }

    async fn poll(&self, job_id: JobId) -> Result<AnalysisJob, AnalysisClientError> {
        let job: JobDto = self.get_json(&format!("v1/analysis/jobs/{job_id}")).await?;
        job.into_domain()
    }

    async fn results(&self, job_id: JobId) -> Result<Vec<AnalysisResult>, AnalysisClientError> {
        let results: Vec<AnalysisResultDto> = self
            .get_json(&format!("v1/analysis/jobs/{job_id}/results"))
            .await?;
        Ok(results.into_iter().map(AnalysisResultDto::into_domain).collect())
    }

    async fn page_detail(&self, file_id: FileId) -> Result<PageDetail, AnalysisClientError> {
        self.get_json(&format!("v1/files/{file_id}/pages")).await
    }
}

//
// ─── WIRE SHAPES ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize)]
struct SubmitRequest {
    batch_id: BatchId,
    file_ids: Vec<FileId>,
}

#[derive(Debug, Deserialize)]
struct JobDto {
    id: JobId,
    batch_id: BatchId,
    status: String,
    #[serde(default)]
    total_files: u32,
    #[serde(default)]
    completed_files: u32,
    #[serde(default)]
    failed_files: u32,
}

impl JobDto {
    fn into_domain(self) -> Result<AnalysisJob, AnalysisClientError> {
        let status = match self.status.as_str() {
            "queued" => JobStatus::Queued,
            "processing" => JobStatus::Processing,
            "completed" => JobStatus::Completed,
            "partial" => JobStatus::Partial,
            "failed" => JobStatus::Failed,
            other => {
                return Err(AnalysisClientError::Decode(format!(
                    "unknown job status: {other}"
                )));
            }
        };
        Ok(AnalysisJob {
            id: self.id,
            batch_id: self.batch_id,
            status,
            total_files: self.total_files,
            completed_files: self.completed_files,
            failed_files: self.failed_files,
        })
    }
}

#[derive(Debug, Deserialize)]
struct AnalysisResultDto {
    id: AnalysisId,
    batch_id: BatchId,
    file_id: FileId,
    file_name: String,
    #[serde(default)]
    word_count: u32,
    #[serde(default)]
    page_count: u32,
    document_type: Option<String>,
    #[serde(default)]
    complexity: Option<String>,
    #[serde(default)]
    document_count: u32,
    #[serde(default)]
    sub_documents: Vec<SubDocument>,
    processing_status: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl AnalysisResultDto {
    /// Pipeline records arrive without pricing; classification fields are
    /// parsed leniently so one odd record cannot sink the batch.
    fn into_domain(self) -> AnalysisResult {
        let processing_status = match self.processing_status.as_str() {
            "failed" => ProcessingStatus::Failed,
            _ => ProcessingStatus::Completed,
        };
        let entry_method = if processing_status == ProcessingStatus::Failed {
            EntryMethod::AiFailed
        } else {
            EntryMethod::Ocr
        };
        AnalysisResult {
            id: self.id,
            batch_id: self.batch_id,
            file_id: self.file_id,
            file_name: self.file_name,
            word_count: self.word_count,
            page_count: self.page_count,
            document_type: self.document_type,
            complexity: self
                .complexity
                .map_or(Complexity::Medium, |s| Complexity::parse_lossy(&s)),
            document_count: self.document_count,
            sub_documents: self.sub_documents,
            processing_status,
            entry_method,
            created_at: self.created_at,
            pricing: None,
        }
    }
}
