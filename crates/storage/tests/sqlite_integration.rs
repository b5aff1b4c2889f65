use chrono::Duration;
use quote_core::model::{
    AnalysisResult, BatchId, CertificationTypeId, Complexity, EntryMethod, Money, Multiplier,
    PageTenths, PricingSnapshot, ProcessingStatus, SnapshotCertification, SubDocument,
};
use quote_core::time::fixed_now;
use storage::repository::{
    AnalysisRepository, CertificationTypeRepository, SettingsRepository, StorageError,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn build_result(batch_id: BatchId, file_name: &str, word_count: u32) -> AnalysisResult {
    let mut result = AnalysisResult::manual(batch_id, file_name, fixed_now());
    result.word_count = word_count;
    result.complexity = Complexity::Medium;
    result.processing_status = ProcessingStatus::Completed;
    result.entry_method = EntryMethod::Ocr;
    result.document_count = 2;
    result.sub_documents = vec![
        SubDocument {
            doc_type: Some("certificate".to_string()),
            holder_name: Some("Maria Lopez".to_string()),
            page_range: Some("1-2".to_string()),
            language: Some("es".to_string()),
        },
        SubDocument {
            doc_type: Some("certificate".to_string()),
            holder_name: None,
            page_range: Some("3".to_string()),
            language: Some("es".to_string()),
        },
    ];
    result
}

#[tokio::test]
async fn sqlite_roundtrip_preserves_analysis_fields() {
    let repo = connect("memdb_roundtrip").await;
    let batch = BatchId::generate();
    let result = build_result(batch, "marriage-certificate.pdf", 450);
    repo.insert(&result).await.unwrap();

    let fetched = repo.get(result.id).await.expect("fetch");
    assert_eq!(fetched, result);
    assert!(fetched.pricing.is_none());

    let listed = repo.list_for_batch(batch).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].sub_documents.len(), 2);
}

#[tokio::test]
async fn sqlite_lists_in_created_order() {
    let repo = connect("memdb_order").await;
    let batch = BatchId::generate();

    let mut second = build_result(batch, "second.pdf", 100);
    second.created_at = fixed_now() + Duration::seconds(5);
    let first = build_result(batch, "first.pdf", 100);
    repo.insert(&second).await.unwrap();
    repo.insert(&first).await.unwrap();

    let listed = repo.list_for_batch(batch).await.unwrap();
    let names: Vec<&str> = listed.iter().map(|r| r.file_name.as_str()).collect();
    assert_eq!(names, vec!["first.pdf", "second.pdf"]);
}

#[tokio::test]
async fn sqlite_pricing_snapshot_roundtrip() {
    let repo = connect("memdb_snapshot").await;
    let batch = BatchId::generate();
    let result = build_result(batch, "scan.pdf", 450);
    repo.insert(&result).await.unwrap();

    assert_eq!(repo.current_saved_at(result.id).await.unwrap(), None);

    let cert = CertificationTypeId::generate();
    let snapshot = PricingSnapshot {
        billable_pages: PageTenths::new(23),
        complexity: Complexity::Hard,
        complexity_multiplier: Multiplier::from_hundredths(125),
        base_rate: Money::from_dollars(65),
        certification_type_id: Some(cert),
        is_excluded: false,
        is_billable_overridden: true,
        document_certifications: Some(vec![
            SnapshotCertification {
                index: 0,
                certification_type_id: cert,
            },
            SnapshotCertification {
                index: 1,
                certification_type_id: CertificationTypeId::generate(),
            },
        ]),
        saved_at: fixed_now(),
    };
    repo.update_pricing(result.id, &snapshot).await.unwrap();

    let fetched = repo.get(result.id).await.unwrap();
    assert_eq!(fetched.pricing, Some(snapshot));
    assert_eq!(
        repo.current_saved_at(result.id).await.unwrap(),
        Some(fixed_now())
    );
}

#[tokio::test]
async fn sqlite_update_pricing_missing_row_is_not_found() {
    let repo = connect("memdb_missing").await;
    let orphan = build_result(BatchId::generate(), "orphan.pdf", 10);

    let snapshot = PricingSnapshot {
        billable_pages: PageTenths::new(5),
        complexity: Complexity::Easy,
        complexity_multiplier: Multiplier::ONE,
        base_rate: Money::from_dollars(65),
        certification_type_id: None,
        is_excluded: false,
        is_billable_overridden: false,
        document_certifications: None,
        saved_at: fixed_now(),
    };
    let err = repo.update_pricing(orphan.id, &snapshot).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_delete_removes_row() {
    let repo = connect("memdb_delete").await;
    let batch = BatchId::generate();
    let result = AnalysisResult::manual(batch, "inserted.pdf", fixed_now());
    repo.insert(&result).await.unwrap();

    repo.delete(result.id).await.unwrap();
    assert!(matches!(
        repo.get(result.id).await.unwrap_err(),
        StorageError::NotFound
    ));
    assert!(matches!(
        repo.delete(result.id).await.unwrap_err(),
        StorageError::NotFound
    ));
}

#[tokio::test]
async fn sqlite_certification_types_filter_and_order() {
    let repo = connect("memdb_certs").await;
    for (code, name, active, sort_order) in [
        ("apostille", "Apostille", true, 1_i64),
        ("notarization", "Notarization", true, 0),
        ("retired", "Retired", false, 2),
    ] {
        sqlx::query(
            "INSERT INTO certification_types
                 (id, name, code, unit_price_cents, active, sort_order)
             VALUES (?1, ?2, ?3, 3000, ?4, ?5)",
        )
        .bind(CertificationTypeId::generate().value().to_string())
        .bind(name)
        .bind(code)
        .bind(active)
        .bind(sort_order)
        .execute(repo.pool())
        .await
        .unwrap();
    }

    let types = repo.list_active().await.unwrap();
    let codes: Vec<&str> = types.iter().map(|t| t.code.as_str()).collect();
    assert_eq!(codes, vec!["notarization", "apostille"]);
    assert_eq!(types[0].unit_price, Money::from_cents(3000));
}

#[tokio::test]
async fn sqlite_settings_lookup_and_prefix_listing() {
    let repo = connect("memdb_settings").await;
    for (key, value) in [
        ("base_rate_cents", "6500"),
        ("language_multiplier_ja", "140"),
        ("language_multiplier_de", "110"),
    ] {
        sqlx::query("INSERT INTO app_settings (key, value) VALUES (?1, ?2)")
            .bind(key)
            .bind(value)
            .execute(repo.pool())
            .await
            .unwrap();
    }

    assert_eq!(
        repo.get_value("base_rate_cents").await.unwrap(),
        Some("6500".to_string())
    );
    assert_eq!(repo.get_value("words_per_page").await.unwrap(), None);

    let langs = repo.list_prefixed("language_multiplier_").await.unwrap();
    assert_eq!(
        langs,
        vec![
            ("language_multiplier_de".to_string(), "110".to_string()),
            ("language_multiplier_ja".to_string(), "140".to_string()),
        ]
    );
}
