// src/lib.rs
//
// Hybrid geocoding for Kuwaiti delivery addresses: rule-based component
// extraction over normalized bilingual text, a regression baseline with a
// nearest-neighbor residual correction, and a confidence-scored fallback
// cascade down to area and governorate centroids.

pub mod artifacts;
pub mod constants;
pub mod embedding;
pub mod extract;
pub mod features;
pub mod gazetteer;
pub mod geocoder;
pub mod models;
pub mod normalize;
pub mod phonetic;
pub mod predictor;
pub mod scaler;
pub mod scorer;
pub mod tfidf;

pub use artifacts::ArtifactSet;
pub use geocoder::Geocoder;
pub use models::{ConfidenceLabel, GeocodeStatus, GeocodingResult, ParsedAddress};
