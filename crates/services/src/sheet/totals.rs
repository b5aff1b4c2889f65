use quote_core::model::Money;
use serde::Serialize;

/// Sheet-level totals for display and quote emission. Excluded rows
/// contribute zero to every figure but still count toward `row_count`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SheetTotals {
    pub translation_subtotal: Money,
    pub certification_subtotal: Money,
    pub grand_total: Money,
    pub row_count: usize,
    pub excluded_count: usize,
}
