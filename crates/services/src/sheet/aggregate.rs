use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;

use quote_core::model::{
    AnalysisId, AnalysisResult, BatchId, BillingSettings, CertificationType, Complexity,
    EntryMethod, FileId, Money, PageTenths, PricingRow,
};
use quote_core::pricing;

use super::totals::SheetTotals;
use crate::error::SheetError;
use crate::row_builder;

//
// ─── SHEET ─────────────────────────────────────────────────────────────────────
//

/// The in-memory pricing sheet for one batch.
///
/// Owns the ordered rows and their backing analysis results, plus the
/// billing constants and certification catalogue the sheet was built under.
/// Every edit operation is a synchronous in-memory transition that
/// recomputes the affected row's derived costs before returning, so no
/// partially-updated row is ever observable, and flags the sheet as having
/// unsaved changes.
pub struct Sheet {
    batch_id: BatchId,
    settings: BillingSettings,
    certifications: Vec<CertificationType>,
    results: Vec<AnalysisResult>,
    rows: Vec<PricingRow>,
    /// Manual insertions that have never been persisted.
    unpersisted: HashSet<AnalysisId>,
    /// Previously persisted manual rows deleted since the last save.
    pending_removals: Vec<AnalysisId>,
    dirty: bool,
}

impl Sheet {
    /// Build a fresh sheet from a batch's analysis results. Rebuilding from
    /// the same unmodified inputs yields an identical sheet.
    #[must_use]
    pub fn build(
        batch_id: BatchId,
        settings: BillingSettings,
        certifications: Vec<CertificationType>,
        results: Vec<AnalysisResult>,
    ) -> Self {
        let rows = row_builder::build_rows(&results, &settings, &certifications);
        Self {
            batch_id,
            settings,
            certifications,
            results,
            rows,
            unpersisted: HashSet::new(),
            pending_removals: Vec::new(),
            dirty: false,
        }
    }

    #[must_use]
    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    #[must_use]
    pub fn settings(&self) -> &BillingSettings {
        &self.settings
    }

    #[must_use]
    pub fn certifications(&self) -> &[CertificationType] {
        &self.certifications
    }

    #[must_use]
    pub fn rows(&self) -> &[PricingRow] {
        &self.rows
    }

    #[must_use]
    pub fn row(&self, analysis_id: AnalysisId) -> Option<&PricingRow> {
        self.rows.iter().find(|row| row.analysis_id == analysis_id)
    }

    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    /// File ids that previously went through the pipeline, in sheet order.
    /// This is the selection a re-analysis submits; manual insertions never
    /// re-analyse.
    #[must_use]
    pub fn analysed_file_ids(&self) -> Vec<FileId> {
        self.results
            .iter()
            .filter(|r| r.entry_method != EntryMethod::Manual)
            .map(|r| r.file_id)
            .collect()
    }

    #[must_use]
    pub fn totals(&self) -> SheetTotals {
        SheetTotals {
            translation_subtotal: self.rows.iter().map(|r| r.translation_cost).sum(),
            certification_subtotal: self.rows.iter().map(|r| r.certification_cost).sum(),
            grand_total: self.rows.iter().map(|r| r.line_total).sum(),
            row_count: self.rows.len(),
            excluded_count: self.rows.iter().filter(|r| r.is_excluded).count(),
        }
    }

    //
    // ─── EDIT OPERATIONS ───────────────────────────────────────────────────────
    //

    /// Change a row's complexity tier.
    ///
    /// The multiplier follows the new tier. Billable pages are recomputed
    /// from the new multiplier only when the page count has not been set
    /// manually; an explicit manual page count is never clobbered.
    ///
    /// # Errors
    ///
    /// Returns `SheetError::RowNotFound` for an unknown row.
    pub fn set_complexity(
        &mut self,
        analysis_id: AnalysisId,
        complexity: Complexity,
    ) -> Result<(), SheetError> {
        let multiplier = self.settings.complexity_multiplier(complexity);
        let word_count = self.word_count_of(analysis_id);
        let words_per_page = self.settings.words_per_page();
        let min_pages = self.settings.min_billable_pages();

        let row = self.row_mut(analysis_id)?;
        row.complexity = complexity;
        row.complexity_multiplier = multiplier;
        if !row.billable_pages_overridden {
            row.billable_pages =
                pricing::billable_pages(word_count, multiplier, words_per_page, min_pages);
        }
        row.recompute();
        self.dirty = true;
        Ok(())
    }

    /// Set a manual billable page count. The override is latched for the
    /// rest of the session.
    ///
    /// # Errors
    ///
    /// Returns `SheetError::RowNotFound` for an unknown row.
    pub fn set_billable_pages(
        &mut self,
        analysis_id: AnalysisId,
        pages: PageTenths,
    ) -> Result<(), SheetError> {
        let row = self.row_mut(analysis_id)?;
        row.billable_pages = pages;
        row.billable_pages_overridden = true;
        row.recompute();
        self.dirty = true;
        Ok(())
    }

    /// Set a manual base rate. Negative input clamps to zero.
    ///
    /// # Errors
    ///
    /// Returns `SheetError::RowNotFound` for an unknown row.
    pub fn set_base_rate(
        &mut self,
        analysis_id: AnalysisId,
        base_rate: Money,
    ) -> Result<(), SheetError> {
        let row = self.row_mut(analysis_id)?;
        row.base_rate = base_rate.clamp_non_negative();
        row.base_rate_overridden = true;
        row.recompute();
        self.dirty = true;
        Ok(())
    }

    /// Change the row-level certification.
    ///
    /// Propagates to every sub-document entry unless the operator has
    /// customized entries individually; customized entries are never erased
    /// by a bulk change.
    ///
    /// # Errors
    ///
    /// Returns `SheetError::RowNotFound` for an unknown row.
    pub fn set_row_certification(
        &mut self,
        analysis_id: AnalysisId,
        certification: Option<&CertificationType>,
    ) -> Result<(), SheetError> {
        let row = self.row_mut(analysis_id)?;
        row.default_certification_type_id = certification.map(|t| t.id);
        row.default_certification_name =
            certification.map(|t| t.name.clone()).unwrap_or_default();
        row.default_certification_price = certification.map_or(Money::ZERO, |t| t.unit_price);
        if !row.has_per_doc_cert_overrides {
            row.replicate_row_certification();
        }
        row.recompute();
        self.dirty = true;
        Ok(())
    }

    /// Change one sub-document's certification, latching the row as
    /// manually curated.
    ///
    /// # Errors
    ///
    /// Returns `SheetError::RowNotFound` for an unknown row, or
    /// `SheetError::DocumentIndexOutOfRange` for a bad index.
    pub fn set_document_certification(
        &mut self,
        analysis_id: AnalysisId,
        index: u32,
        certification: Option<&CertificationType>,
    ) -> Result<(), SheetError> {
        let row = self.row_mut(analysis_id)?;
        let entry = row
            .document_certifications
            .iter_mut()
            .find(|entry| entry.index == index)
            .ok_or(SheetError::DocumentIndexOutOfRange { analysis_id, index })?;

        entry.certification_type_id = certification.map(|t| t.id);
        entry.certification_type_name =
            certification.map(|t| t.name.clone()).unwrap_or_default();
        entry.price = certification.map_or(Money::ZERO, |t| t.unit_price);
        row.has_per_doc_cert_overrides = true;
        row.recompute();
        self.dirty = true;
        Ok(())
    }

    /// Flip a row's exclusion. Excluded rows contribute zero to all totals
    /// but stay visible and re-includable.
    ///
    /// # Errors
    ///
    /// Returns `SheetError::RowNotFound` for an unknown row.
    pub fn toggle_excluded(&mut self, analysis_id: AnalysisId) -> Result<(), SheetError> {
        let row = self.row_mut(analysis_id)?;
        row.is_excluded = !row.is_excluded;
        row.recompute();
        self.dirty = true;
        Ok(())
    }

    /// Insert a staff-created document and its row at the end of the sheet.
    pub fn add_manual_document(
        &mut self,
        file_name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> AnalysisId {
        let result = AnalysisResult::manual(self.batch_id, file_name, now);
        let id = result.id;
        if let Some(row) = row_builder::build_row(&result, &self.settings, &self.certifications) {
            self.rows.push(row);
        }
        self.results.push(result);
        self.unpersisted.insert(id);
        self.dirty = true;
        id
    }

    /// Remove a staff-created document and its row.
    ///
    /// # Errors
    ///
    /// Returns `SheetError::RowNotFound` for an unknown row, or
    /// `SheetError::NotManualEntry` for pipeline-produced rows, which are
    /// never deleted.
    pub fn remove_manual_document(&mut self, analysis_id: AnalysisId) -> Result<(), SheetError> {
        let row = self
            .row(analysis_id)
            .ok_or(SheetError::RowNotFound(analysis_id))?;
        if row.entry_method != EntryMethod::Manual {
            return Err(SheetError::NotManualEntry(analysis_id));
        }

        self.rows.retain(|r| r.analysis_id != analysis_id);
        self.results.retain(|r| r.id != analysis_id);
        if !self.unpersisted.remove(&analysis_id) {
            self.pending_removals.push(analysis_id);
        }
        self.dirty = true;
        Ok(())
    }

    //
    // ─── SAVE BOOKKEEPING ──────────────────────────────────────────────────────
    //

    pub(crate) fn result_of(&self, analysis_id: AnalysisId) -> Option<&AnalysisResult> {
        self.results.iter().find(|r| r.id == analysis_id)
    }

    pub(crate) fn is_unpersisted(&self, analysis_id: AnalysisId) -> bool {
        self.unpersisted.contains(&analysis_id)
    }

    pub(crate) fn mark_row_saved(&mut self, analysis_id: AnalysisId, saved_at: DateTime<Utc>) {
        self.unpersisted.remove(&analysis_id);
        if let Some(row) = self.rows.iter_mut().find(|r| r.analysis_id == analysis_id) {
            row.loaded_saved_at = Some(saved_at);
        }
    }

    pub(crate) fn take_pending_removals(&mut self) -> Vec<AnalysisId> {
        std::mem::take(&mut self.pending_removals)
    }

    pub(crate) fn restore_pending_removal(&mut self, analysis_id: AnalysisId) {
        self.pending_removals.push(analysis_id);
    }

    pub(crate) fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    fn word_count_of(&self, analysis_id: AnalysisId) -> u32 {
        self.result_of(analysis_id).map_or(0, |r| r.word_count)
    }

    fn row_mut(&mut self, analysis_id: AnalysisId) -> Result<&mut PricingRow, SheetError> {
        self.rows
            .iter_mut()
            .find(|row| row.analysis_id == analysis_id)
            .ok_or(SheetError::RowNotFound(analysis_id))
    }
}

impl fmt::Debug for Sheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sheet")
            .field("batch_id", &self.batch_id)
            .field("rows_len", &self.rows.len())
            .field("dirty", &self.dirty)
            .field("unpersisted_len", &self.unpersisted.len())
            .field("pending_removals_len", &self.pending_removals.len())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
