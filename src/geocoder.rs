// src/geocoder.rs
use anyhow::{Context, Result};
use log::{info, warn};

use crate::artifacts::ArtifactSet;
use crate::constants::{KUWAIT_CENTER_LAT, KUWAIT_CENTER_LON, UNKNOWN};
use crate::embedding::EmbeddingCache;
use crate::extract::ComponentExtractor;
use crate::features::FeatureBuilder;
use crate::gazetteer::Gazetteer;
use crate::models::{ConfidenceLabel, GeocodeStatus, GeocodingResult};
use crate::normalize::TextNormalizer;
use crate::predictor::HybridPredictor;
use crate::scaler::FeatureScaler;
use crate::scorer;

/// Gazetteer name of the capital's center district.
const CAPITAL_CENTER_NAME: &str = "kuwait city";

/// The full pipeline, wired once from a validated artifact set. Immutable
/// after construction apart from the interior memoization caches, so a
/// shared reference can serve many batches.
pub struct Geocoder {
    gazetteer: Gazetteer,
    normalizer: TextNormalizer,
    extractor: ComponentExtractor,
    features: FeatureBuilder,
    scaler: FeatureScaler,
    predictor: HybridPredictor,
}

impl Geocoder {
    pub fn new(artifacts: ArtifactSet) -> Result<Self> {
        artifacts.validate().context("Artifact validation failed")?;
        let ArtifactSet {
            gazetteer,
            stats,
            manual_columns,
            scaler,
            tfidf,
            metadata: _,
            lat_model,
            lon_model,
            reference,
            embedder,
        } = artifacts;

        let normalizer = TextNormalizer::new(&gazetteer);
        let areas = gazetteer.normalized_areas(&normalizer);
        let extractor =
            ComponentExtractor::new(areas.clone(), normalizer.normalize(CAPITAL_CENTER_NAME));
        let features = FeatureBuilder::new(
            stats,
            manual_columns,
            tfidf,
            EmbeddingCache::new(embedder),
            areas,
        );
        let predictor = HybridPredictor::new(lat_model, lon_model, reference)?;

        info!(
            "Geocoder ready: {} areas, {} feature dims",
            extractor.areas().len(),
            predictor.dim()
        );
        Ok(Self {
            gazetteer,
            normalizer,
            extractor,
            features,
            scaler,
            predictor,
        })
    }

    pub fn geocode(&self, address: &str) -> GeocodingResult {
        self.geocode_batch(&[address.to_string()]).remove(0)
    }

    /// Geocode a batch, one result per input in order. Never fails: a
    /// pipeline error downgrades the whole batch to center-coordinate
    /// results tagged `error_fallback`.
    pub fn geocode_batch(&self, addresses: &[String]) -> Vec<GeocodingResult> {
        match self.try_geocode_batch(addresses) {
            Ok(results) => results,
            Err(e) => {
                warn!("Batch geocoding failed, issuing center fallbacks: {:#}", e);
                addresses
                    .iter()
                    .map(|address| error_result(address, &e))
                    .collect()
            }
        }
    }

    fn try_geocode_batch(&self, addresses: &[String]) -> Result<Vec<GeocodingResult>> {
        let mut results = Vec::with_capacity(addresses.len());
        for address in addresses {
            let normalized = self.normalizer.normalize(address);
            let parsed = self.extractor.parse(&normalized);
            let governorate = self
                .gazetteer
                .governorate_of(&self.normalizer, &parsed.area)
                .unwrap_or(UNKNOWN)
                .to_string();

            let mut row = self.features.build(&normalized, &parsed, &governorate)?;
            let mut scaled = std::mem::take(&mut row.features);
            self.scaler.transform_row(&mut scaled)?;
            let prediction = self.predictor.predict(&scaled)?;
            let scored = scorer::score(prediction, &row);

            results.push(GeocodingResult {
                input: address.clone(),
                parsed_area: row.parsed.area,
                parsed_block: row.parsed.block,
                parsed_street: row.parsed.street,
                parsed_building_number: row.parsed.building_number,
                parsed_governorate: governorate,
                latitude: scored.latitude,
                longitude: scored.longitude,
                status: scored.status,
                confidence: scored.confidence,
                error: None,
            });
        }
        Ok(results)
    }

    /// Real embedder invocations so far, for instrumentation.
    pub fn embeddings_computed(&self) -> usize {
        self.features.embeddings_computed()
    }
}

fn error_result(address: &str, error: &anyhow::Error) -> GeocodingResult {
    GeocodingResult {
        input: address.to_string(),
        parsed_area: UNKNOWN.to_string(),
        parsed_block: UNKNOWN.to_string(),
        parsed_street: UNKNOWN.to_string(),
        parsed_building_number: String::new(),
        parsed_governorate: UNKNOWN.to_string(),
        latitude: KUWAIT_CENTER_LAT,
        longitude: KUWAIT_CENTER_LON,
        status: GeocodeStatus::ErrorFallback,
        confidence: ConfidenceLabel::Low,
        error: Some(format!("{:#}", error)),
    }
}
