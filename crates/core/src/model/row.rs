use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::analysis::{Complexity, EntryMethod, ProcessingStatus};
use crate::model::ids::{AnalysisId, CertificationTypeId};
use crate::model::money::{Money, Multiplier, PageTenths};
use crate::pricing;

/// One certification entry, one per detected sub-document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCertification {
    pub index: u32,
    pub holder_name: String,
    pub certification_type_id: Option<CertificationTypeId>,
    pub certification_type_name: String,
    pub price: Money,
}

/// The mutable per-document working model of the pricing sheet.
///
/// Rows are rebuilt wholesale on re-analysis; individual fields are mutated
/// only through `Sheet` operations, which recompute the derived costs before
/// the row is observable again.
///
/// Invariants kept by [`PricingRow::recompute`]:
/// - `line_total == translation_cost + certification_cost` when not
///   excluded; all three are zero when excluded
/// - when `has_per_doc_cert_overrides` is false, every certification entry
///   carries the row-level type and price
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRow {
    pub analysis_id: AnalysisId,
    pub file_name: String,
    pub billable_pages: PageTenths,
    pub billable_pages_overridden: bool,
    pub complexity: Complexity,
    pub complexity_multiplier: Multiplier,
    pub base_rate: Money,
    pub base_rate_overridden: bool,
    pub language_multiplier: Multiplier,
    pub document_count: u32,
    /// Row-level certification choice, replicated to entries that carry no
    /// per-document override.
    pub default_certification_type_id: Option<CertificationTypeId>,
    pub default_certification_name: String,
    pub default_certification_price: Money,
    pub document_certifications: Vec<DocumentCertification>,
    pub has_per_doc_cert_overrides: bool,
    pub per_page_rate: Money,
    pub translation_cost: Money,
    pub certification_cost: Money,
    pub line_total: Money,
    pub is_excluded: bool,
    pub entry_method: EntryMethod,
    pub processing_status: ProcessingStatus,
    /// Snapshot timestamp this row was built from; used to detect a save
    /// racing a newer snapshot written by someone else.
    pub loaded_saved_at: Option<DateTime<Utc>>,
}

impl PricingRow {
    /// Recomputes every derived cost from the row's own inputs.
    ///
    /// Exclusion zeroes the costs but leaves pages, complexity, and
    /// certification choices untouched so re-inclusion restores them.
    pub fn recompute(&mut self) {
        self.per_page_rate = pricing::per_page_rate(self.base_rate, self.language_multiplier);
        if self.is_excluded {
            self.translation_cost = Money::ZERO;
            self.certification_cost = Money::ZERO;
            self.line_total = Money::ZERO;
            return;
        }
        self.translation_cost = pricing::translation_cost(self.billable_pages, self.per_page_rate);
        self.certification_cost =
            pricing::certification_cost(self.document_certifications.iter().map(|c| c.price));
        self.line_total = self.translation_cost.saturating_add(self.certification_cost);
    }

    /// Replicates the row-level certification across every sub-document
    /// entry. Only valid while per-document choices are not customized.
    pub fn replicate_row_certification(&mut self) {
        for entry in &mut self.document_certifications {
            entry.certification_type_id = self.default_certification_type_id;
            entry.certification_type_name = self.default_certification_name.clone();
            entry.price = self.default_certification_price;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_row() -> PricingRow {
        let notarization = CertificationTypeId::generate();
        let mut row = PricingRow {
            analysis_id: AnalysisId::generate(),
            file_name: "passport.pdf".to_string(),
            billable_pages: PageTenths::new(23),
            billable_pages_overridden: false,
            complexity: Complexity::Medium,
            complexity_multiplier: Multiplier::from_hundredths(115),
            base_rate: Money::from_dollars(65),
            base_rate_overridden: false,
            language_multiplier: Multiplier::ONE,
            document_count: 2,
            default_certification_type_id: Some(notarization),
            default_certification_name: "Notarization".to_string(),
            default_certification_price: Money::from_dollars(30),
            document_certifications: vec![
                DocumentCertification {
                    index: 0,
                    holder_name: "Document 1".to_string(),
                    certification_type_id: Some(notarization),
                    certification_type_name: "Notarization".to_string(),
                    price: Money::from_dollars(30),
                },
                DocumentCertification {
                    index: 1,
                    holder_name: "Document 2".to_string(),
                    certification_type_id: Some(notarization),
                    certification_type_name: "Notarization".to_string(),
                    price: Money::from_dollars(30),
                },
            ],
            has_per_doc_cert_overrides: false,
            per_page_rate: Money::ZERO,
            translation_cost: Money::ZERO,
            certification_cost: Money::ZERO,
            line_total: Money::ZERO,
            is_excluded: false,
            entry_method: EntryMethod::Ocr,
            processing_status: ProcessingStatus::Completed,
            loaded_saved_at: None,
        };
        row.recompute();
        row
    }

    #[test]
    fn line_total_is_sum_of_costs() {
        let row = build_row();
        assert_eq!(row.per_page_rate, Money::from_dollars(65));
        assert_eq!(row.translation_cost, Money::from_cents(14950));
        assert_eq!(row.certification_cost, Money::from_dollars(60));
        assert_eq!(
            row.line_total,
            row.translation_cost.saturating_add(row.certification_cost)
        );
    }

    #[test]
    fn exclusion_zeroes_costs_and_keeps_inputs() {
        let mut row = build_row();
        row.is_excluded = true;
        row.recompute();

        assert_eq!(row.translation_cost, Money::ZERO);
        assert_eq!(row.certification_cost, Money::ZERO);
        assert_eq!(row.line_total, Money::ZERO);
        assert_eq!(row.billable_pages, PageTenths::new(23));
        assert_eq!(row.complexity, Complexity::Medium);

        row.is_excluded = false;
        row.recompute();
        assert_eq!(row.line_total, Money::from_cents(14950 + 6000));
    }

    #[test]
    fn replicate_updates_every_entry() {
        let mut row = build_row();
        let apostille = CertificationTypeId::generate();
        row.default_certification_type_id = Some(apostille);
        row.default_certification_name = "Apostille".to_string();
        row.default_certification_price = Money::from_dollars(50);
        row.replicate_row_certification();
        row.recompute();

        assert!(row
            .document_certifications
            .iter()
            .all(|c| c.certification_type_id == Some(apostille)
                && c.price == Money::from_dollars(50)));
        assert_eq!(row.certification_cost, Money::from_dollars(100));
    }
}
