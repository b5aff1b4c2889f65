//! The pricing calculator: pure, total functions from analysis counts and
//! billing constants to money.
//!
//! Every function here is side-effect-free and never panics. Corrupt input
//! (negative rates, zero divisors) clamps to zero instead of failing, since
//! one bad row must not abort the whole sheet. Rounding always goes *up* —
//! the business never under-bills — and is exact integer arithmetic.

use crate::model::{Money, Multiplier, PageTenths, RATE_STEP};

/// Fallback divisor when the settings store hands us a zero words-per-page.
const DEFAULT_WORDS_PER_PAGE: u32 = 225;

//
// ─── BILLABLE PAGES ────────────────────────────────────────────────────────────
//

/// Converts a word count into billable pages, rounded up to the nearest
/// tenth of a page and clamped to the configured minimum.
///
/// A zero word count yields exactly zero pages, bypassing the minimum: a
/// document contributing no translation work bills no translation.
#[must_use]
pub fn billable_pages(
    word_count: u32,
    complexity_multiplier: Multiplier,
    words_per_page: u32,
    min_pages: PageTenths,
) -> PageTenths {
    if word_count == 0 {
        return PageTenths::ZERO;
    }
    let words_per_page = if words_per_page == 0 {
        DEFAULT_WORDS_PER_PAGE
    } else {
        words_per_page
    };

    // ceil((words / wpp) * multiplier * 10) in tenths, as one exact
    // ceiling division: ceil(words * mult * 10 / (wpp * 100)).
    let numerator = u64::from(word_count)
        .saturating_mul(u64::from(complexity_multiplier.hundredths()))
        .saturating_mul(10);
    let denominator = u64::from(words_per_page) * 100;
    let tenths = numerator.div_ceil(denominator);

    let tenths = u32::try_from(tenths).unwrap_or(u32::MAX);
    PageTenths::new(tenths).max(min_pages)
}

//
// ─── RATES & COSTS ─────────────────────────────────────────────────────────────
//

/// The per-page rate for a document: base rate times the language
/// multiplier, rounded up to the next [`RATE_STEP`] increment.
#[must_use]
pub fn per_page_rate(base_rate: Money, language_multiplier: Multiplier) -> Money {
    let base = base_rate.clamp_non_negative();
    let numerator =
        u128::from(base.cents().unsigned_abs()) * u128::from(language_multiplier.hundredths());
    let step = u128::from(RATE_STEP.cents().unsigned_abs());
    let steps = numerator.div_ceil(100 * step);
    let cents = steps.saturating_mul(step);
    Money::from_cents(i64::try_from(cents).unwrap_or(i64::MAX))
}

/// Translation cost: pages times the per-page rate. Exact because the rate
/// is a multiple of [`RATE_STEP`] and pages are tenths.
#[must_use]
pub fn translation_cost(billable_pages: PageTenths, per_page_rate: Money) -> Money {
    if billable_pages.is_zero() {
        return Money::ZERO;
    }
    let rate = per_page_rate.clamp_non_negative();
    let cents = i128::from(rate.cents()) * i128::from(billable_pages.tenths()) / 10;
    Money::from_cents(i64::try_from(cents).unwrap_or(i64::MAX))
}

/// Certification cost: the sum of per-entry prices. Entries may carry
/// heterogeneous certification types per sub-document.
#[must_use]
pub fn certification_cost(prices: impl IntoIterator<Item = Money>) -> Money {
    prices
        .into_iter()
        .map(Money::clamp_non_negative)
        .sum()
}

/// The line total for a row, zero when the row is excluded.
#[must_use]
pub fn line_total(translation_cost: Money, certification_cost: Money, is_excluded: bool) -> Money {
    if is_excluded {
        Money::ZERO
    } else {
        translation_cost.saturating_add(certification_cost)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
