// src/scorer.rs
use crate::constants::{
    COORDINATE_TOLERANCE_DEG, DEVIATION_THRESHOLD, KUWAIT_LAT_MAX, KUWAIT_LAT_MIN, KUWAIT_LON_MAX,
    KUWAIT_LON_MIN, UNKNOWN,
};
use crate::extract::StreetType;
use crate::features::FeatureRow;
use crate::models::{ConfidenceLabel, GeocodeStatus};

/// Predictions scoring below this are not trusted as-is.
const FALLBACK_CONFIDENCE_TRIGGER: f64 = 0.5;
const AREA_FALLBACK_CONFIDENCE: f64 = 0.4;
const GOVERNORATE_FALLBACK_CONFIDENCE: f64 = 0.2;
const UNKNOWN_AREA_PENALTY: f64 = 0.8;
const UNKNOWN_STREET_PENALTY: f64 = 0.8;
const NAMED_STREET_PENALTY: f64 = 0.9;

/// A prediction after confidence scoring and fallback selection.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCoordinate {
    pub latitude: f64,
    pub longitude: f64,
    pub status: GeocodeStatus,
    pub confidence_score: f64,
    pub confidence: ConfidenceLabel,
}

/// `true` when the point lies inside the Kuwait bounding box, widened by
/// the tolerance margin on every side.
pub fn validate_coordinates(lat: f64, lon: f64) -> bool {
    lat.is_finite()
        && lon.is_finite()
        && (KUWAIT_LAT_MIN - COORDINATE_TOLERANCE_DEG..=KUWAIT_LAT_MAX + COORDINATE_TOLERANCE_DEG)
            .contains(&lat)
        && (KUWAIT_LON_MIN - COORDINATE_TOLERANCE_DEG..=KUWAIT_LON_MAX + COORDINATE_TOLERANCE_DEG)
            .contains(&lon)
}

/// Score a hybrid prediction and pick the coordinate to report. Pure
/// function of its inputs.
///
/// The prediction survives only if it is inside the (tolerated) bounding
/// box, its parse-quality confidence reaches the trigger, and it sits
/// within three area standard deviations per axis. Otherwise the cascade
/// drops to the area mean (when that itself is valid) and then to the
/// governorate mean, with fixed confidences.
pub fn score(prediction: (f64, f64), row: &FeatureRow) -> ScoredCoordinate {
    let (mut lat, mut lon) = prediction;

    let is_named_street = row.street_type == StreetType::Named;
    let area_penalty = if row.parsed.area == UNKNOWN {
        UNKNOWN_AREA_PENALTY
    } else {
        1.0
    };
    let street_penalty = if row.parsed.street == UNKNOWN {
        UNKNOWN_STREET_PENALTY
    } else if is_named_street {
        NAMED_STREET_PENALTY
    } else {
        1.0
    };
    let street_signal = (row.has_street_num || is_named_street) as i32 as f64;
    let mut confidence = (row.area_similarity * 0.4
        + 0.4 * row.has_block as i32 as f64
        + 0.2 * street_signal)
        * area_penalty
        * street_penalty;

    let lat_deviation = (lat - row.area_lat_mean).abs() / row.area_lat_std;
    let lon_deviation = (lon - row.area_lon_mean).abs() / row.area_lon_std;

    let mut status = GeocodeStatus::HybridPredicted;
    if !validate_coordinates(lat, lon)
        || confidence < FALLBACK_CONFIDENCE_TRIGGER
        || lat_deviation > DEVIATION_THRESHOLD
        || lon_deviation > DEVIATION_THRESHOLD
    {
        lat = row.area_lat_mean;
        lon = row.area_lon_mean;
        if validate_coordinates(lat, lon) {
            status = GeocodeStatus::AreaFallback;
            confidence = AREA_FALLBACK_CONFIDENCE;
        } else {
            lat = row.governorate_lat_mean;
            lon = row.governorate_lon_mean;
            status = GeocodeStatus::GovernorateFallback;
            confidence = GOVERNORATE_FALLBACK_CONFIDENCE;
        }
    }

    ScoredCoordinate {
        latitude: lat,
        longitude: lon,
        status,
        confidence_score: confidence,
        confidence: ConfidenceLabel::from_score(confidence),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{KUWAIT_CENTER_LAT, KUWAIT_CENTER_LON, STD_EPSILON};
    use crate::models::ParsedAddress;

    fn row(area: &str, block: &str, street: &str) -> FeatureRow {
        FeatureRow {
            parsed: ParsedAddress {
                area: area.to_string(),
                block: block.to_string(),
                street: street.to_string(),
                ..ParsedAddress::default()
            },
            governorate: "hawalli".to_string(),
            area_similarity: if area == UNKNOWN { 0.0 } else { 1.0 },
            street_type: crate::extract::categorize_street(street),
            has_block: block != UNKNOWN,
            has_street_num: street.chars().all(|c| c.is_ascii_digit()) && !street.is_empty(),
            area_lat_mean: 29.33,
            area_lon_mean: 48.08,
            area_lat_std: 0.02,
            area_lon_std: 0.02,
            governorate_lat_mean: 29.31,
            governorate_lon_mean: 48.02,
            features: vec![],
        }
    }

    #[test]
    fn bounding_box_with_tolerance() {
        assert!(validate_coordinates(KUWAIT_CENTER_LAT, KUWAIT_CENTER_LON));
        assert!(validate_coordinates(28.524574 - 0.02, 47.0));
        assert!(!validate_coordinates(28.524574 - 0.03, 47.0));
        assert!(!validate_coordinates(29.0, 50.0));
        assert!(!validate_coordinates(f64::NAN, 47.0));
    }

    #[test]
    fn full_parse_scores_full_confidence() {
        let scored = score((29.33, 48.08), &row("salmiya", "1", "1"));
        assert_eq!(scored.status, GeocodeStatus::HybridPredicted);
        assert!((scored.confidence_score - 1.0).abs() < 1e-12);
        assert_eq!(scored.confidence, ConfidenceLabel::High);
        assert_eq!(scored.latitude, 29.33);
    }

    #[test]
    fn named_street_takes_its_penalty() {
        let scored = score((29.33, 48.08), &row("salmiya", "1", "tunis"));
        // (0.4 + 0.4 + 0.2) * 1.0 * 0.9
        assert!((scored.confidence_score - 0.9).abs() < 1e-12);
        assert_eq!(scored.status, GeocodeStatus::HybridPredicted);
    }

    #[test]
    fn weak_parse_falls_back_to_area_mean() {
        // No area, no block, no street: confidence 0 < trigger.
        let scored = score((29.33, 48.08), &row(UNKNOWN, UNKNOWN, UNKNOWN));
        assert_eq!(scored.status, GeocodeStatus::AreaFallback);
        assert_eq!(scored.confidence_score, 0.4);
        assert_eq!(scored.confidence, ConfidenceLabel::Medium);
        assert_eq!(scored.latitude, 29.33);
        assert_eq!(scored.longitude, 48.08);
    }

    #[test]
    fn out_of_bounds_prediction_falls_back() {
        let scored = score((35.0, 48.08), &row("salmiya", "1", "1"));
        assert_eq!(scored.status, GeocodeStatus::AreaFallback);
    }

    #[test]
    fn implausible_deviation_falls_back() {
        // In bounds and fully parsed, but half a degree off a 0.02-std area.
        let scored = score((29.9, 48.08), &row("salmiya", "1", "1"));
        assert_eq!(scored.status, GeocodeStatus::AreaFallback);
    }

    #[test]
    fn invalid_area_mean_falls_through_to_governorate() {
        let mut r = row(UNKNOWN, UNKNOWN, UNKNOWN);
        r.area_lat_mean = 0.0;
        r.area_lon_mean = 0.0;
        let scored = score((29.33, 48.08), &r);
        assert_eq!(scored.status, GeocodeStatus::GovernorateFallback);
        assert_eq!(scored.confidence_score, 0.2);
        assert_eq!(scored.confidence, ConfidenceLabel::Low);
        assert_eq!(scored.latitude, 29.31);
        assert_eq!(scored.longitude, 48.02);
    }

    #[test]
    fn deviation_is_well_defined_at_the_std_floor() {
        let mut r = row("salmiya", "1", "1");
        r.area_lat_std = STD_EPSILON;
        r.area_lon_std = STD_EPSILON;
        let scored = score((29.33, 48.08), &r);
        assert_eq!(scored.status, GeocodeStatus::HybridPredicted);
    }
}
