use serde::Serialize;

use quote_core::model::{
    AnalysisId, BatchId, DocumentCertification, Money, PageTenths,
};

use crate::sheet::Sheet;

/// One billable line of the emitted quote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuoteLine {
    pub analysis_id: AnalysisId,
    pub description: String,
    pub billable_pages: PageTenths,
    pub per_page_rate: Money,
    pub translation_cost: Money,
    pub certification_cost: Money,
    pub line_total: Money,
    pub certifications: Vec<DocumentCertification>,
}

/// The payload handed to quote-creation/quote-update logic: the
/// non-excluded rows plus subtotals and the grand total.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuotePayload {
    pub batch_id: BatchId,
    pub lines: Vec<QuoteLine>,
    pub translation_subtotal: Money,
    pub certification_subtotal: Money,
    pub grand_total: Money,
}

impl QuotePayload {
    /// Convert the finalized sheet into the quote payload. Excluded rows
    /// are omitted; they already contribute nothing to the totals.
    #[must_use]
    pub fn from_sheet(sheet: &Sheet) -> Self {
        let lines = sheet
            .rows()
            .iter()
            .filter(|row| !row.is_excluded)
            .map(|row| QuoteLine {
                analysis_id: row.analysis_id,
                description: row.file_name.clone(),
                billable_pages: row.billable_pages,
                per_page_rate: row.per_page_rate,
                translation_cost: row.translation_cost,
                certification_cost: row.certification_cost,
                line_total: row.line_total,
                certifications: row.document_certifications.clone(),
            })
            .collect();

        let totals = sheet.totals();
        Self {
            batch_id: sheet.batch_id(),
            lines,
            translation_subtotal: totals.translation_subtotal,
            certification_subtotal: totals.certification_subtotal,
            grand_total: totals.grand_total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote_core::model::{
        AnalysisResult, BillingSettings, CertificationType, CertificationTypeId, Complexity,
        EntryMethod, ProcessingStatus, SubDocument,
    };
    use quote_core::time::fixed_now;

    fn build_sheet() -> Sheet {
        let batch_id = BatchId::generate();
        let mut first = AnalysisResult::manual(batch_id, "a.pdf", fixed_now());
        first.word_count = 450;
        first.complexity = Complexity::Medium;
        first.processing_status = ProcessingStatus::Completed;
        first.entry_method = EntryMethod::Ocr;
        first.sub_documents = vec![SubDocument::default()];
        let mut second = first.clone();
        second.id = quote_core::model::AnalysisId::generate();
        second.file_id = quote_core::model::FileId::generate();
        second.file_name = "b.pdf".to_string();

        Sheet::build(
            batch_id,
            BillingSettings::default_policy(),
            vec![CertificationType {
                id: CertificationTypeId::generate(),
                name: "Notarization".to_string(),
                code: "notarization".to_string(),
                unit_price: Money::from_dollars(30),
                active: true,
                sort_order: 0,
            }],
            vec![first, second],
        )
    }

    #[test]
    fn excluded_rows_are_omitted_but_totals_match() {
        let mut sheet = build_sheet();
        let excluded_id = sheet.rows()[1].analysis_id;
        sheet.toggle_excluded(excluded_id).unwrap();

        let payload = QuotePayload::from_sheet(&sheet);
        assert_eq!(payload.lines.len(), 1);
        assert_eq!(payload.lines[0].description, "a.pdf");
        assert_eq!(
            payload.grand_total,
            payload
                .translation_subtotal
                .saturating_add(payload.certification_subtotal)
        );
        assert_eq!(payload.grand_total, sheet.totals().grand_total);
        assert_eq!(payload.lines[0].line_total, payload.grand_total);
    }

    #[test]
    fn payload_serializes_money_as_cents() {
        let sheet = build_sheet();
        let payload = QuotePayload::from_sheet(&sheet);
        let json = serde_json::to_value(&payload).expect("serialize");

        // 2.3 pages * $65.00 + $30 certification, per row.
        assert_eq!(json["lines"][0]["line_total"], 14950 + 3000);
        assert_eq!(json["lines"][0]["billable_pages"], 23);
    }
}
