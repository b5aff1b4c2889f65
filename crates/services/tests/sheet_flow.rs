//! End-to-end sheet lifecycle against the in-memory record store:
//! load, edit, save, rebuild, manual rows, stale detection, failures.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use quote_core::model::{
    AnalysisId, AnalysisJob, AnalysisResult, BatchId, CertificationType, CertificationTypeId,
    Complexity, EntryMethod, FileId, JobId, JobStatus, Money, PageDetail, PageSummary, PageTenths,
    PricingSnapshot, ProcessingStatus, SubDocument,
};
use quote_core::time::{fixed_clock, fixed_now};
use quote_core::Clock;
use services::error::AnalysisClientError;
use services::{AnalysisClient, SheetError, SheetService};
use storage::repository::{
    AnalysisRepository, InMemoryRepository, Storage, StorageError,
};

//
// ─── FIXTURES ──────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct FakeClient {
    submissions: Mutex<Vec<Vec<FileId>>>,
    page_detail_calls: AtomicU32,
}

#[async_trait]
impl AnalysisClient for FakeClient {
    async fn submit(
        &self,
        batch_id: BatchId,
        file_ids: &[FileId],
    ) -> Result<AnalysisJob, AnalysisClientError> {
        self.submissions
            .lock()
            .expect("lock")
            .push(file_ids.to_vec());
        Ok(AnalysisJob {
            id: JobId::generate(),
            batch_id,
            status: JobStatus::Queued,
            total_files: u32::try_from(file_ids.len()).unwrap_or(u32::MAX),
            completed_files: 0,
            failed_files: 0,
        })
    }

    async fn poll(&self, _job_id: JobId) -> Result<AnalysisJob, AnalysisClientError> {
        Err(AnalysisClientError::Disabled)
    }

    async fn results(&self, _job_id: JobId) -> Result<Vec<AnalysisResult>, AnalysisClientError> {
        Ok(Vec::new())
    }

    async fn page_detail(&self, file_id: FileId) -> Result<PageDetail, AnalysisClientError> {
        self.page_detail_calls.fetch_add(1, Ordering::SeqCst);
        Ok(PageDetail {
            file_id,
            pages: vec![
                PageSummary {
                    number: 1,
                    word_count: 220,
                },
                PageSummary {
                    number: 2,
                    word_count: 230,
                },
            ],
        })
    }
}

fn ocr_result(batch_id: BatchId, file_name: &str, word_count: u32, offset: i64) -> AnalysisResult {
    let mut result =
        AnalysisResult::manual(batch_id, file_name, fixed_now() + Duration::seconds(offset));
    result.word_count = word_count;
    result.complexity = Complexity::Medium;
    result.processing_status = ProcessingStatus::Completed;
    result.entry_method = EntryMethod::Ocr;
    result.document_count = 2;
    result.sub_documents = vec![
        SubDocument {
            doc_type: Some("certificate".to_string()),
            holder_name: Some("Maria Lopez".to_string()),
            page_range: None,
            language: Some("es".to_string()),
        },
        SubDocument::default(),
    ];
    result
}

async fn seed_batch(repo: &InMemoryRepository) -> BatchId {
    let batch_id = BatchId::generate();
    repo.add_certification_type(CertificationType {
        id: CertificationTypeId::generate(),
        name: "Notarization".to_string(),
        code: "notarization".to_string(),
        unit_price: Money::from_dollars(30),
        active: true,
        sort_order: 0,
    });
    repo.add_certification_type(CertificationType {
        id: CertificationTypeId::generate(),
        name: "Apostille".to_string(),
        code: "apostille".to_string(),
        unit_price: Money::from_dollars(50),
        active: true,
        sort_order: 1,
    });

    repo.insert(&ocr_result(batch_id, "first.pdf", 450, 0))
        .await
        .expect("seed first");
    repo.insert(&ocr_result(batch_id, "second.pdf", 2_250, 1))
        .await
        .expect("seed second");
    batch_id
}

async fn open_sheet(
    repo: &InMemoryRepository,
    client: &Arc<FakeClient>,
    batch_id: BatchId,
    clock: Clock,
) -> SheetService {
    SheetService::load(
        Storage::from_in_memory(repo.clone()),
        Arc::clone(client) as Arc<dyn AnalysisClient>,
        clock,
        batch_id,
    )
    .await
    .expect("load sheet")
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[tokio::test]
async fn load_builds_rows_with_defaults() {
    let repo = InMemoryRepository::new();
    let client = Arc::new(FakeClient::default());
    let batch_id = seed_batch(&repo).await;

    let service = open_sheet(&repo, &client, batch_id, fixed_clock()).await;
    let sheet = service.sheet();

    assert_eq!(sheet.rows().len(), 2);
    assert!(!sheet.has_unsaved_changes());

    // 450 words medium -> 2.3 pages * $65 + 2 * $30 certification.
    let first = &sheet.rows()[0];
    assert_eq!(first.file_name, "first.pdf");
    assert_eq!(first.billable_pages, PageTenths::new(23));
    assert_eq!(first.line_total, Money::from_cents(14950 + 6000));

    let totals = sheet.totals();
    assert_eq!(totals.row_count, 2);
    assert_eq!(
        totals.grand_total,
        totals
            .translation_subtotal
            .saturating_add(totals.certification_subtotal)
    );
}

#[tokio::test]
async fn saved_edits_win_over_fresh_defaults_on_reopen() {
    let repo = InMemoryRepository::new();
    let client = Arc::new(FakeClient::default());
    let batch_id = seed_batch(&repo).await;

    let mut service = open_sheet(&repo, &client, batch_id, fixed_clock()).await;
    let id = service.sheet().rows()[0].analysis_id;
    service
        .sheet_mut()
        .set_billable_pages(id, PageTenths::new(40))
        .unwrap();
    service
        .sheet_mut()
        .set_complexity(id, Complexity::Hard)
        .unwrap();
    assert!(service.sheet().has_unsaved_changes());

    let report = service.save().await;
    assert!(report.is_complete());
    assert_eq!(report.saved.len(), 2);
    assert!(!service.sheet().has_unsaved_changes());

    // Reopen: the snapshot seeds the row, not the AI defaults.
    let mut reopened = open_sheet(&repo, &client, batch_id, fixed_clock()).await;
    let row = reopened.sheet().row(id).expect("row");
    assert_eq!(row.billable_pages, PageTenths::new(40));
    assert!(row.billable_pages_overridden);
    assert_eq!(row.complexity, Complexity::Hard);
    assert_eq!(row.loaded_saved_at, Some(fixed_now()));

    // Override durability: complexity edits never touch the manual pages.
    reopened
        .sheet_mut()
        .set_complexity(id, Complexity::Easy)
        .unwrap();
    assert_eq!(
        reopened.sheet().row(id).expect("row").billable_pages,
        PageTenths::new(40)
    );
}

#[tokio::test]
async fn rebuilding_twice_from_same_store_is_identical() {
    let repo = InMemoryRepository::new();
    let client = Arc::new(FakeClient::default());
    let batch_id = seed_batch(&repo).await;

    let first = open_sheet(&repo, &client, batch_id, fixed_clock()).await;
    let second = open_sheet(&repo, &client, batch_id, fixed_clock()).await;
    assert_eq!(first.sheet().rows(), second.sheet().rows());
}

#[tokio::test]
async fn manual_document_roundtrip_through_save() {
    let repo = InMemoryRepository::new();
    let client = Arc::new(FakeClient::default());
    let batch_id = seed_batch(&repo).await;

    let mut service = open_sheet(&repo, &client, batch_id, fixed_clock()).await;
    let manual_id = service
        .sheet_mut()
        .add_manual_document("walk-in.pdf", fixed_now() + Duration::seconds(5));
    let report = service.save().await;
    assert!(report.is_complete());
    assert_eq!(repo.list_for_batch(batch_id).await.unwrap().len(), 3);

    // Deleting the manual row removes the stored record on the next save.
    service
        .sheet_mut()
        .remove_manual_document(manual_id)
        .unwrap();
    let report = service.save().await;
    assert!(report.is_complete());
    assert_eq!(repo.list_for_batch(batch_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn manual_add_then_delete_before_save_leaves_no_residue() {
    let repo = InMemoryRepository::new();
    let client = Arc::new(FakeClient::default());
    let batch_id = seed_batch(&repo).await;

    let mut service = open_sheet(&repo, &client, batch_id, fixed_clock()).await;
    let before = service.sheet().totals();
    let manual_id = service
        .sheet_mut()
        .add_manual_document("oops.pdf", fixed_now());
    service
        .sheet_mut()
        .remove_manual_document(manual_id)
        .unwrap();
    assert_eq!(service.sheet().totals().grand_total, before.grand_total);

    service.save().await;
    assert_eq!(repo.list_for_batch(batch_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn concurrent_save_is_reported_stale_not_clobbered() {
    let repo = InMemoryRepository::new();
    let client = Arc::new(FakeClient::default());
    let batch_id = seed_batch(&repo).await;

    let mut first = open_sheet(&repo, &client, batch_id, fixed_clock()).await;
    let later: DateTime<Utc> = fixed_now() + Duration::minutes(10);
    let mut second =
        open_sheet(&repo, &client, batch_id, Clock::fixed(later)).await;

    let id = first.sheet().rows()[0].analysis_id;

    // The second operator saves first, with a later timestamp.
    second
        .sheet_mut()
        .set_billable_pages(id, PageTenths::new(99))
        .unwrap();
    assert!(second.save().await.is_complete());

    // The first operator's save must not overwrite the newer snapshot.
    first
        .sheet_mut()
        .set_billable_pages(id, PageTenths::new(11))
        .unwrap();
    let report = first.save().await;
    assert_eq!(report.stale, vec![id]);
    assert!(first.sheet().has_unsaved_changes());

    let stored = repo.get(id).await.unwrap();
    assert_eq!(
        stored.pricing.expect("snapshot").billable_pages,
        PageTenths::new(99)
    );
}

//
// ─── PARTIAL SAVE FAILURE ──────────────────────────────────────────────────────
//

/// Delegating repository that fails `update_pricing` for one row.
struct FailingRepo {
    inner: InMemoryRepository,
    poisoned: AnalysisId,
}

#[async_trait]
impl AnalysisRepository for FailingRepo {
    async fn list_for_batch(&self, batch_id: BatchId) -> Result<Vec<AnalysisResult>, StorageError> {
        self.inner.list_for_batch(batch_id).await
    }

    async fn get(&self, id: AnalysisId) -> Result<AnalysisResult, StorageError> {
        self.inner.get(id).await
    }

    async fn insert(&self, result: &AnalysisResult) -> Result<(), StorageError> {
        self.inner.insert(result).await
    }

    async fn update_pricing(
        &self,
        id: AnalysisId,
        pricing: &PricingSnapshot,
    ) -> Result<(), StorageError> {
        if id == self.poisoned {
            return Err(StorageError::Connection("simulated outage".to_string()));
        }
        self.inner.update_pricing(id, pricing).await
    }

    async fn current_saved_at(
        &self,
        id: AnalysisId,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        self.inner.current_saved_at(id).await
    }

    async fn delete(&self, id: AnalysisId) -> Result<(), StorageError> {
        self.inner.delete(id).await
    }
}

#[tokio::test]
async fn partial_save_failure_reports_per_row_and_stays_dirty() {
    let repo = InMemoryRepository::new();
    let client = Arc::new(FakeClient::default());
    let batch_id = seed_batch(&repo).await;
    let results = repo.list_for_batch(batch_id).await.unwrap();
    let poisoned = results[0].id;
    let healthy = results[1].id;

    let storage = Storage {
        analyses: Arc::new(FailingRepo {
            inner: repo.clone(),
            poisoned,
        }),
        certification_types: Arc::new(repo.clone()),
        settings: Arc::new(repo.clone()),
    };
    let mut service = SheetService::load(
        storage,
        Arc::clone(&client) as Arc<dyn AnalysisClient>,
        fixed_clock(),
        batch_id,
    )
    .await
    .expect("load");

    service
        .sheet_mut()
        .set_base_rate(poisoned, Money::from_dollars(80))
        .unwrap();
    service
        .sheet_mut()
        .set_base_rate(healthy, Money::from_dollars(80))
        .unwrap();

    let report = service.save().await;
    assert_eq!(report.saved, vec![healthy]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].analysis_id, poisoned);
    assert!(!report.is_complete());

    // The failed row keeps its edit in memory for retry.
    assert!(service.sheet().has_unsaved_changes());
    assert_eq!(
        service.sheet().row(poisoned).expect("row").base_rate,
        Money::from_dollars(80)
    );
}

#[tokio::test]
async fn close_is_gated_on_unsaved_changes() {
    let repo = InMemoryRepository::new();
    let client = Arc::new(FakeClient::default());
    let batch_id = seed_batch(&repo).await;

    let mut service = open_sheet(&repo, &client, batch_id, fixed_clock()).await;
    assert!(service.close(false).is_ok());

    let id = service.sheet().rows()[0].analysis_id;
    service.sheet_mut().toggle_excluded(id).unwrap();
    assert!(matches!(
        service.close(false),
        Err(SheetError::UnsavedChanges)
    ));
    assert!(service.close(true).is_ok());

    service.save().await;
    assert!(service.close(false).is_ok());
}

#[tokio::test]
async fn page_detail_is_fetched_once_per_file() {
    let repo = InMemoryRepository::new();
    let client = Arc::new(FakeClient::default());
    let batch_id = seed_batch(&repo).await;
    let file_id = repo.list_for_batch(batch_id).await.unwrap()[0].file_id;

    let mut service = open_sheet(&repo, &client, batch_id, fixed_clock()).await;
    let detail = service.page_detail(file_id).await.expect("detail");
    assert_eq!(detail.pages.len(), 2);
    let _ = service.page_detail(file_id).await.expect("cached detail");
    assert_eq!(client.page_detail_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn reanalyse_submits_previously_analysed_files_only() {
    let repo = InMemoryRepository::new();
    let client = Arc::new(FakeClient::default());
    let batch_id = seed_batch(&repo).await;

    let mut service = open_sheet(&repo, &client, batch_id, fixed_clock()).await;
    service
        .sheet_mut()
        .add_manual_document("walk-in.pdf", fixed_now());

    let job = service.reanalyse().await.expect("submit");
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.total_files, 2);

    let submissions = client.submissions.lock().unwrap();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].len(), 2);
}
