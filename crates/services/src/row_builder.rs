//! Builds editable pricing rows from analysis results, reconciling AI
//! defaults against previously persisted pricing decisions.
//!
//! Previously saved human decisions always win over fresh AI output: a row
//! with a pricing snapshot seeds every field from the snapshot, even if the
//! analysis was re-run since. Rebuilding from the same inputs twice yields
//! identical rows.

use quote_core::model::{
    AnalysisResult, BillingSettings, CertificationType, CertificationTypeId, DocumentCertification,
    EntryMethod, Money, Multiplier, PageTenths, PricingRow, PricingSnapshot, default_certification,
};
use quote_core::pricing;

/// Builds the full working sheet from a batch's analysis results, skipping
/// records that are not priceable.
#[must_use]
pub fn build_rows(
    results: &[AnalysisResult],
    settings: &BillingSettings,
    certifications: &[CertificationType],
) -> Vec<PricingRow> {
    results
        .iter()
        .filter_map(|result| build_row(result, settings, certifications))
        .collect()
}

/// Builds one editable row, or `None` for records that do not belong on
/// the sheet.
#[must_use]
pub fn build_row(
    result: &AnalysisResult,
    settings: &BillingSettings,
    certifications: &[CertificationType],
) -> Option<PricingRow> {
    if !result.is_priceable() {
        return None;
    }

    let language = result
        .sub_documents
        .first()
        .and_then(|sub| sub.language.as_deref());
    let language_multiplier = settings.language_multiplier(language);
    let row_default = default_certification(certifications);

    let mut row = match &result.pricing {
        Some(snapshot) => from_snapshot(result, snapshot, settings, certifications, row_default),
        None => from_defaults(result, settings, row_default),
    };

    row.language_multiplier = language_multiplier;
    row.recompute();
    Some(row)
}

/// Seed every field from the persisted snapshot.
fn from_snapshot<'a>(
    result: &AnalysisResult,
    snapshot: &PricingSnapshot,
    settings: &BillingSettings,
    certifications: &'a [CertificationType],
    row_default: Option<&'a CertificationType>,
) -> PricingRow {
    // An unknown persisted certification id (the type was retired since the
    // save) falls back to the current row default rather than erroring.
    let row_cert = snapshot
        .certification_type_id
        .and_then(|id| resolve_certification(certifications, id))
        .or(row_default);

    let entries = certification_entries(result, row_cert, |index| {
        snapshot
            .document_certifications
            .as_ref()?
            .iter()
            .find(|entry| entry.index == index)
            .and_then(|entry| resolve_certification(certifications, entry.certification_type_id))
    });

    PricingRow {
        analysis_id: result.id,
        file_name: result.file_name.clone(),
        billable_pages: snapshot.billable_pages,
        billable_pages_overridden: snapshot.is_billable_overridden,
        complexity: snapshot.complexity,
        complexity_multiplier: snapshot.complexity_multiplier,
        base_rate: snapshot.base_rate,
        base_rate_overridden: snapshot.base_rate != settings.base_rate(),
        language_multiplier: Multiplier::ONE,
        document_count: effective_document_count(result),
        default_certification_type_id: row_cert.map(|t| t.id),
        default_certification_name: row_cert.map(|t| t.name.clone()).unwrap_or_default(),
        default_certification_price: row_cert.map_or(Money::ZERO, |t| t.unit_price),
        document_certifications: entries,
        has_per_doc_cert_overrides: snapshot.document_certifications.is_some(),
        per_page_rate: Money::ZERO,
        translation_cost: Money::ZERO,
        certification_cost: Money::ZERO,
        line_total: Money::ZERO,
        is_excluded: snapshot.is_excluded,
        entry_method: result.entry_method,
        processing_status: result.processing_status,
        loaded_saved_at: Some(snapshot.saved_at),
    }
}

/// No snapshot: compute defaults from AI output and settings.
fn from_defaults(
    result: &AnalysisResult,
    settings: &BillingSettings,
    row_default: Option<&CertificationType>,
) -> PricingRow {
    let complexity = result.complexity;
    let complexity_multiplier = settings.complexity_multiplier(complexity);

    // Manual insertions carry no OCR counts; they bill one page until the
    // operator says otherwise, and that page count is treated as a manual
    // override so later complexity edits cannot zero it.
    let (billable_pages, billable_pages_overridden) =
        if result.entry_method == EntryMethod::Manual {
            (PageTenths::ONE_PAGE, true)
        } else {
            (
                pricing::billable_pages(
                    result.word_count,
                    complexity_multiplier,
                    settings.words_per_page(),
                    settings.min_billable_pages(),
                ),
                false,
            )
        };

    let entries = certification_entries(result, row_default, |_| None);

    PricingRow {
        analysis_id: result.id,
        file_name: result.file_name.clone(),
        billable_pages,
        billable_pages_overridden,
        complexity,
        complexity_multiplier,
        base_rate: settings.base_rate(),
        base_rate_overridden: false,
        language_multiplier: Multiplier::ONE,
        document_count: effective_document_count(result),
        default_certification_type_id: row_default.map(|t| t.id),
        default_certification_name: row_default.map(|t| t.name.clone()).unwrap_or_default(),
        default_certification_price: row_default.map_or(Money::ZERO, |t| t.unit_price),
        document_certifications: entries,
        has_per_doc_cert_overrides: false,
        per_page_rate: Money::ZERO,
        translation_cost: Money::ZERO,
        certification_cost: Money::ZERO,
        line_total: Money::ZERO,
        is_excluded: false,
        entry_method: result.entry_method,
        processing_status: result.processing_status,
        loaded_saved_at: None,
    }
}

fn resolve_certification(
    certifications: &[CertificationType],
    id: CertificationTypeId,
) -> Option<&CertificationType> {
    certifications.iter().find(|t| t.id == id)
}

fn effective_document_count(result: &AnalysisResult) -> u32 {
    result
        .document_count
        .max(u32::try_from(result.sub_documents.len()).unwrap_or(u32::MAX))
        .max(1)
}

/// One certification entry per detected sub-document. `override_for`
/// supplies a per-index choice (from a snapshot); anything it does not
/// cover gets the row default.
fn certification_entries<'a>(
    result: &AnalysisResult,
    row_default: Option<&'a CertificationType>,
    override_for: impl Fn(u32) -> Option<&'a CertificationType>,
) -> Vec<DocumentCertification> {
    let count = effective_document_count(result);
    (0..count)
        .map(|index| {
            let holder_name = result
                .sub_documents
                .get(index as usize)
                .and_then(|sub| sub.holder_name.clone())
                .unwrap_or_else(|| format!("Document {}", index + 1));
            let chosen = override_for(index).or(row_default);
            DocumentCertification {
                index,
                holder_name,
                certification_type_id: chosen.map(|t| t.id),
                certification_type_name: chosen.map(|t| t.name.clone()).unwrap_or_default(),
                price: chosen.map_or(Money::ZERO, |t| t.unit_price),
            }
        })
        .collect()
}
