// src/models.rs
use serde::{Deserialize, Serialize};

use crate::constants::UNKNOWN;

/// Structured components pulled out of a normalized address string.
///
/// Always fully populated: `area`, `block` and `street` carry the
/// `"unknown"` sentinel when unresolved, the remaining fields are empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsedAddress {
    pub area: String,
    pub block: String,
    pub street: String,
    pub building_number: String,
    pub apartment: String,
    pub floor: String,
}

impl Default for ParsedAddress {
    fn default() -> Self {
        Self {
            area: UNKNOWN.to_string(),
            block: UNKNOWN.to_string(),
            street: UNKNOWN.to_string(),
            building_number: String::new(),
            apartment: String::new(),
            floor: String::new(),
        }
    }
}

/// How the final coordinate of a result was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeocodeStatus {
    /// Regression baseline plus residual correction, accepted as-is.
    HybridPredicted,
    /// Prediction rejected, replaced with the area-level mean.
    AreaFallback,
    /// Area mean also invalid, replaced with the governorate-level mean.
    GovernorateFallback,
    /// Pipeline failure, replaced with the Kuwait center.
    ErrorFallback,
}

/// Bucketed confidence label attached to every result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLabel {
    High,
    Medium,
    Low,
}

impl ConfidenceLabel {
    /// high >= 0.7, medium >= 0.4, low otherwise.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            ConfidenceLabel::High
        } else if score >= 0.4 {
            ConfidenceLabel::Medium
        } else {
            ConfidenceLabel::Low
        }
    }
}

/// One geocoding outcome per input address, order-preserving with the
/// input batch. Immutable once returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingResult {
    pub input: String,
    pub parsed_area: String,
    pub parsed_block: String,
    pub parsed_street: String,
    #[serde(rename = "parsed_buildingNumber")]
    pub parsed_building_number: String,
    pub parsed_governorate: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: GeocodeStatus,
    pub confidence: ConfidenceLabel,
    /// Failure description, only present on `error_fallback` results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
