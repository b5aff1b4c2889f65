use std::collections::HashMap;
use std::sync::Arc;

use quote_core::model::{BillingSettings, Complexity, Money, Multiplier, PageTenths};
use storage::repository::SettingsRepository;

const BASE_RATE_CENTS: &str = "base_rate_cents";
const WORDS_PER_PAGE: &str = "words_per_page";
const COMPLEXITY_EASY: &str = "complexity_multiplier_easy";
const COMPLEXITY_MEDIUM: &str = "complexity_multiplier_medium";
const COMPLEXITY_HARD: &str = "complexity_multiplier_hard";
const MIN_BILLABLE_PAGE_TENTHS: &str = "min_billable_page_tenths";
const LANGUAGE_MULTIPLIER_PREFIX: &str = "language_multiplier_";

/// Loads the global billing constants from the settings store.
///
/// Settings can never fail to load: a missing or malformed key falls back
/// to the documented default for that key, and an unreachable store falls
/// back to [`BillingSettings::default_policy`] wholesale. The sheet still
/// prices, just under default constants.
#[derive(Clone)]
pub struct SettingsService {
    repo: Arc<dyn SettingsRepository>,
}

impl SettingsService {
    #[must_use]
    pub fn new(repo: Arc<dyn SettingsRepository>) -> Self {
        Self { repo }
    }

    /// Fetch a fresh copy of the billing settings.
    ///
    /// The result is immutable for the lifetime of the sheet built from it;
    /// call again for an explicit reload.
    pub async fn load(&self) -> BillingSettings {
        let defaults = BillingSettings::default_policy();

        let base_rate = match self.int_key(BASE_RATE_CENTS).await {
            Some(cents) => Money::from_cents(cents),
            None => defaults.base_rate(),
        };
        let words_per_page = self
            .uint_key(WORDS_PER_PAGE)
            .await
            .unwrap_or_else(|| defaults.words_per_page());
        let easy = self
            .multiplier_key(COMPLEXITY_EASY)
            .await
            .unwrap_or_else(|| defaults.complexity_multiplier(Complexity::Easy));
        let medium = self
            .multiplier_key(COMPLEXITY_MEDIUM)
            .await
            .unwrap_or_else(|| defaults.complexity_multiplier(Complexity::Medium));
        let hard = self
            .multiplier_key(COMPLEXITY_HARD)
            .await
            .unwrap_or_else(|| defaults.complexity_multiplier(Complexity::Hard));
        let min_pages = self
            .uint_key(MIN_BILLABLE_PAGE_TENTHS)
            .await
            .map_or_else(|| defaults.min_billable_pages(), PageTenths::new);
        let languages = self.language_multipliers().await;

        match BillingSettings::new(
            base_rate,
            words_per_page,
            easy,
            medium,
            hard,
            min_pages,
            languages,
        ) {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!(error = %err, "stored billing settings invalid, using defaults");
                defaults
            }
        }
    }

    async fn raw_key(&self, key: &str) -> Option<String> {
        match self.repo.get_value(key).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key, error = %err, "settings lookup failed, using default");
                None
            }
        }
    }

    async fn int_key(&self, key: &str) -> Option<i64> {
        let raw = self.raw_key(key).await?;
        match raw.trim().parse::<i64>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(key, %raw, "malformed setting, using default");
                None
            }
        }
    }

    async fn uint_key(&self, key: &str) -> Option<u32> {
        let value = self.int_key(key).await?;
        u32::try_from(value).ok().filter(|v| *v > 0)
    }

    async fn multiplier_key(&self, key: &str) -> Option<Multiplier> {
        self.uint_key(key).await.map(Multiplier::from_hundredths)
    }

    async fn language_multipliers(&self) -> HashMap<String, Multiplier> {
        let pairs = match self.repo.list_prefixed(LANGUAGE_MULTIPLIER_PREFIX).await {
            Ok(pairs) => pairs,
            Err(err) => {
                tracing::warn!(error = %err, "language multipliers unavailable, using 1.0");
                return HashMap::new();
            }
        };

        let mut multipliers = HashMap::new();
        for (key, raw) in pairs {
            let Some(language) = key.strip_prefix(LANGUAGE_MULTIPLIER_PREFIX) else {
                continue;
            };
            match raw.trim().parse::<u32>() {
                Ok(hundredths) if hundredths > 0 => {
                    multipliers
                        .insert(language.to_string(), Multiplier::from_hundredths(hundredths));
                }
                _ => {
                    tracing::warn!(%key, %raw, "malformed language multiplier, skipping");
                }
            }
        }
        multipliers
    }
}
