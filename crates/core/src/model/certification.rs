use serde::{Deserialize, Serialize};

use crate::model::ids::CertificationTypeId;
use crate::model::money::Money;

/// The certification code preferred as the row-level default when present.
pub const NOTARIZATION_CODE: &str = "notarization";

/// A notarization/authentication service priced per document.
/// Reference data, externally owned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificationType {
    pub id: CertificationTypeId,
    pub name: String,
    pub code: String,
    pub unit_price: Money,
    pub active: bool,
    pub sort_order: i32,
}

/// Picks the default certification for new rows: the type coded
/// `notarization` when available, otherwise the first active type.
#[must_use]
pub fn default_certification(types: &[CertificationType]) -> Option<&CertificationType> {
    types
        .iter()
        .find(|t| t.active && t.code == NOTARIZATION_CODE)
        .or_else(|| types.iter().find(|t| t.active))
}
