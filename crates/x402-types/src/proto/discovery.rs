//! Facilitator discovery listing: `GET /discovery/resources`.
//!
//! ```json
//! {
//!   "x402Version": 1,
//!   "items": [
//!     {
//!       "resource": "https://api.example.com/weather",
//!       "type": "http",
//!       "x402Version": 1,
//!       "accepts": [ { "scheme": "exact", "network": "base", "maxAmountRequired": "1000", ... } ],
//!       "lastUpdated": "2025-06-01T12:00:00.000Z",
//!       "metadata": {}
//!     }
//!   ],
//!   "pagination": { "offset": 0, "limit": 100, "total": 1 }
//! }
//! ```

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use serde_with::{VecSkipError, serde_as};

use crate::proto::{PaymentRequirement, UnifiedRequirement, normalize, validate};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub limit: u64,
    /// Server-declared number of items across all pages.
    #[serde(default)]
    pub total: u64,
}

/// A payable resource known to a facilitator.
///
/// Accepts that do not decode as either requirement shape are skipped so one
/// bad entry does not hide the resource.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceItem {
    pub resource: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub x402_version: Option<u8>,
    #[serde_as(as = "VecSkipError<_>")]
    #[serde(default)]
    pub accepts: Vec<PaymentRequirement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl ResourceItem {
    /// Cheapest requirement that passes validation, with its amount.
    pub fn cheapest(&self) -> Option<(UnifiedRequirement, U256)> {
        self.accepts
            .iter()
            .map(|requirement| normalize(requirement, None))
            .filter_map(|unified| validate(&unified).ok().map(|amount| (unified, amount)))
            .min_by_key(|(_, amount)| *amount)
    }
}

/// One page of the listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x402_version: Option<u8>,
    #[serde(default)]
    pub items: Vec<ResourceItem>,
    pub pagination: Pagination,
}
