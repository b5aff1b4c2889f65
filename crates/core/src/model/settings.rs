use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::analysis::Complexity;
use crate::model::money::{Money, Multiplier, PageTenths};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("words per page must be > 0")]
    InvalidWordsPerPage,

    #[error("complexity multiplier must be > 0")]
    InvalidComplexityMultiplier,

    #[error("language multiplier for {language:?} must be > 0")]
    InvalidLanguageMultiplier { language: String },
}

//
// ─── BILLING SETTINGS ──────────────────────────────────────────────────────────
//

/// Global billing constants for one reconciliation session.
///
/// Immutable once loaded; a settings change requires an explicit reload and
/// a fresh sheet, so half a sheet is never priced under old constants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingSettings {
    base_rate: Money,
    words_per_page: u32,
    easy_multiplier: Multiplier,
    medium_multiplier: Multiplier,
    hard_multiplier: Multiplier,
    min_billable_pages: PageTenths,
    language_multipliers: HashMap<String, Multiplier>,
}

impl BillingSettings {
    /// The documented fallback policy, used whenever the settings store is
    /// unreachable or a key is missing.
    ///
    /// - $65.00 base rate per page
    /// - 225 words per billable page
    /// - complexity multipliers 1.00 / 1.15 / 1.25
    /// - 0.5 page minimum per billable document
    #[must_use]
    pub fn default_policy() -> Self {
        Self {
            base_rate: Money::from_dollars(65),
            words_per_page: 225,
            easy_multiplier: Multiplier::from_hundredths(100),
            medium_multiplier: Multiplier::from_hundredths(115),
            hard_multiplier: Multiplier::from_hundredths(125),
            min_billable_pages: PageTenths::new(5),
            language_multipliers: HashMap::new(),
        }
    }

    /// Creates validated settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if `words_per_page` or any multiplier is zero.
    pub fn new(
        base_rate: Money,
        words_per_page: u32,
        easy_multiplier: Multiplier,
        medium_multiplier: Multiplier,
        hard_multiplier: Multiplier,
        min_billable_pages: PageTenths,
        language_multipliers: HashMap<String, Multiplier>,
    ) -> Result<Self, SettingsError> {
        if words_per_page == 0 {
            return Err(SettingsError::InvalidWordsPerPage);
        }
        for multiplier in [easy_multiplier, medium_multiplier, hard_multiplier] {
            if multiplier.hundredths() == 0 {
                return Err(SettingsError::InvalidComplexityMultiplier);
            }
        }
        if let Some((language, _)) = language_multipliers
            .iter()
            .find(|(_, m)| m.hundredths() == 0)
        {
            return Err(SettingsError::InvalidLanguageMultiplier {
                language: language.clone(),
            });
        }

        Ok(Self {
            base_rate: base_rate.clamp_non_negative(),
            words_per_page,
            easy_multiplier,
            medium_multiplier,
            hard_multiplier,
            min_billable_pages,
            language_multipliers,
        })
    }

    #[must_use]
    pub fn base_rate(&self) -> Money {
        self.base_rate
    }

    #[must_use]
    pub fn words_per_page(&self) -> u32 {
        self.words_per_page
    }

    #[must_use]
    pub fn min_billable_pages(&self) -> PageTenths {
        self.min_billable_pages
    }

    #[must_use]
    pub fn complexity_multiplier(&self, complexity: Complexity) -> Multiplier {
        match complexity {
            Complexity::Easy => self.easy_multiplier,
            Complexity::Medium => self.medium_multiplier,
            Complexity::Hard => self.hard_multiplier,
        }
    }

    /// Multiplier for a detected language. Unlisted (or undetected)
    /// languages price at 1.0.
    #[must_use]
    pub fn language_multiplier(&self, language: Option<&str>) -> Multiplier {
        language
            .and_then(|lang| self.language_multipliers.get(lang).copied())
            .unwrap_or(Multiplier::ONE)
    }
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self::default_policy()
    }
}
