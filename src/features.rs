// src/features.rs
use anyhow::Result;
use log::debug;
use lru::LruCache;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use crate::constants::{KUWAIT_CENTER_LAT, KUWAIT_CENTER_LON, STD_EPSILON, UNKNOWN};
use crate::embedding::EmbeddingCache;
use crate::extract::{categorize_street, token_sort_ratio, StreetType};
use crate::models::ParsedAddress;
use crate::tfidf::TfidfVectorizer;

/// The country column is constant for this deployment.
const COUNTRY: &str = "kuwait";

/// Categorical column families with per-category coordinate statistics.
const STAT_FAMILIES: [&str; 6] = [
    "country",
    "area",
    "city",
    "governorate",
    "area_block",
    "block_street",
];

const SIMILARITY_CACHE_SIZE: usize = 4096;

static FIRST_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
static TRAILING_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+$").unwrap());
/// Building labels carry no location signal and are removed from the text
/// fed to the embedder and the TF-IDF vectorizer.
static BUILDING_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bbuilding\s+\d+\b").unwrap());

#[derive(Debug, Clone, Copy)]
enum Axis {
    Lat,
    Lon,
}

impl Axis {
    fn as_str(&self) -> &'static str {
        match self {
            Axis::Lat => "lat",
            Axis::Lon => "lon",
        }
    }

    fn center(&self) -> f64 {
        match self {
            Axis::Lat => KUWAIT_CENTER_LAT,
            Axis::Lon => KUWAIT_CENTER_LON,
        }
    }
}

/// Per-category coordinate statistics exported at training time. Tables are
/// keyed `{family}_{axis}_{stat}` (for example `area_lat_mean`) and map a
/// category value to the statistic.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeoStatistics(pub HashMap<String, HashMap<String, f64>>);

impl GeoStatistics {
    fn table(&self, name: &str) -> Option<&HashMap<String, f64>> {
        self.0.get(name)
    }

    /// Mean lookup with the fallback chain: category entry, then the
    /// governorate-level mean, then the Kuwait center.
    fn mean(&self, family: &str, axis: Axis, category: &str, governorate: &str) -> f64 {
        self.table(&format!("{}_{}_mean", family, axis.as_str()))
            .and_then(|t| t.get(category))
            .copied()
            .or_else(|| {
                self.table(&format!("governorate_{}_mean", axis.as_str()))
                    .and_then(|t| t.get(governorate))
                    .copied()
            })
            .unwrap_or_else(|| axis.center())
    }

    /// Standard deviation lookup, floored so it never reaches zero.
    fn std(&self, family: &str, axis: Axis, category: &str) -> f64 {
        self.table(&format!("{}_{}_std", family, axis.as_str()))
            .and_then(|t| t.get(category))
            .copied()
            .unwrap_or(STD_EPSILON)
            .max(STD_EPSILON)
    }
}

/// One fully-derived feature row, carrying both the model input vector and
/// the side signals the confidence scorer needs.
#[derive(Debug, Clone)]
pub struct FeatureRow {
    pub parsed: ParsedAddress,
    pub governorate: String,
    pub area_similarity: f64,
    pub street_type: StreetType,
    pub has_block: bool,
    pub has_street_num: bool,
    pub area_lat_mean: f64,
    pub area_lon_mean: f64,
    pub area_lat_std: f64,
    pub area_lon_std: f64,
    pub governorate_lat_mean: f64,
    pub governorate_lon_mean: f64,
    /// Unscaled model input: `[embedding | manual columns in stored order]`.
    pub features: Vec<f64>,
}

/// Turns a parsed address plus its normalized text into the fixed-width
/// feature vector the regressors were trained on. Column order is dictated
/// by the stored manual column list; unknown stored columns get
/// type-appropriate defaults so the width contract always holds.
pub struct FeatureBuilder {
    stats: GeoStatistics,
    manual_columns: Vec<String>,
    tfidf: TfidfVectorizer,
    embeddings: EmbeddingCache,
    /// Known area names, for the similarity score of a resolved area.
    areas: Vec<String>,
    /// area text -> best similarity, stable across the process lifetime.
    similarity_cache: Mutex<LruCache<String, f64>>,
}

impl FeatureBuilder {
    pub fn new(
        stats: GeoStatistics,
        manual_columns: Vec<String>,
        tfidf: TfidfVectorizer,
        embeddings: EmbeddingCache,
        areas: Vec<String>,
    ) -> Self {
        Self {
            stats,
            manual_columns,
            tfidf,
            embeddings,
            areas,
            similarity_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(SIMILARITY_CACHE_SIZE).unwrap(),
            )),
        }
    }

    /// Total feature width: embedding columns plus the stored manual list
    /// (which includes the `tfidf_*` columns).
    pub fn width(&self) -> usize {
        self.embeddings.dimension() + self.manual_columns.len()
    }

    pub fn embeddings_computed(&self) -> usize {
        self.embeddings.embeddings_computed()
    }

    /// Best similarity of a resolved area against the configured area list,
    /// on a 0-1 scale. Unresolved areas score 0. Memoized per area text.
    fn area_similarity(&self, area: &str) -> f64 {
        if area == UNKNOWN {
            return 0.0;
        }
        if let Some(hit) = self
            .similarity_cache
            .lock()
            .expect("similarity cache poisoned")
            .get(area)
        {
            return *hit;
        }
        let best = self
            .areas
            .iter()
            .map(|candidate| token_sort_ratio(area, candidate))
            .fold(0.0f64, f64::max)
            / 100.0;
        self.similarity_cache
            .lock()
            .expect("similarity cache poisoned")
            .put(area.to_string(), best);
        best
    }

    pub fn build(
        &self,
        normalized: &str,
        parsed: &ParsedAddress,
        governorate: &str,
    ) -> Result<FeatureRow> {
        let input_text = BUILDING_TOKEN
            .replace_all(normalized, " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        let area_similarity = self.area_similarity(&parsed.area);
        let street_type = categorize_street(&parsed.street);

        let block_num = first_number(&parsed.block).unwrap_or(-1.0);
        // The multiplier is part of the trained scale and applies to the
        // missing sentinel too.
        let building_num = first_number(&parsed.building_number).unwrap_or(-1.0) * 0.1;
        let floor_num = first_number(&parsed.floor).unwrap_or(-1.0);
        let has_block = block_num >= 0.0;
        let has_building = building_num >= 0.0;
        let has_apartment = !parsed.apartment.is_empty();
        let has_floor = floor_num >= 0.0;
        let has_street_num = TRAILING_DIGITS.is_match(&parsed.street);

        let area_block = format!("{}_{}", parsed.area, parsed.block);
        let block_street = format!("{}_{}", parsed.block, parsed.street);

        let mut named: HashMap<String, f64> = HashMap::new();
        named.insert("block_num".into(), block_num);
        named.insert("building_num".into(), building_num);
        named.insert("floor_num".into(), floor_num);
        named.insert("has_block".into(), has_block as i32 as f64);
        named.insert("has_building".into(), has_building as i32 as f64);
        named.insert("has_apartment".into(), has_apartment as i32 as f64);
        named.insert("has_floor".into(), has_floor as i32 as f64);
        named.insert("has_street_num".into(), has_street_num as i32 as f64);
        named.insert("area_similarity".into(), area_similarity);
        for ty in [StreetType::Numbered, StreetType::Named, StreetType::Unknown] {
            named.insert(
                format!("street_type_{}", ty.as_str()),
                (street_type == ty) as i32 as f64,
            );
        }
        for family in STAT_FAMILIES {
            let category = match family {
                "country" => COUNTRY,
                "area" | "city" => parsed.area.as_str(),
                "governorate" => governorate,
                "area_block" => area_block.as_str(),
                _ => block_street.as_str(),
            };
            for axis in [Axis::Lat, Axis::Lon] {
                named.insert(
                    format!("{}_{}_mean", family, axis.as_str()),
                    self.stats.mean(family, axis, category, governorate),
                );
                named.insert(
                    format!("{}_{}_std", family, axis.as_str()),
                    self.stats.std(family, axis, category),
                );
            }
        }

        let tfidf_row = self.tfidf.transform(&input_text);
        let embedding = self.embeddings.embed(&input_text)?;

        let mut features = Vec::with_capacity(self.width());
        features.extend(embedding.iter().map(|&v| v as f64));
        for column in &self.manual_columns {
            features.push(column_value(column, &named, &tfidf_row));
        }
        debug!(
            "Built {}-wide feature row for area '{}'",
            features.len(),
            parsed.area
        );

        Ok(FeatureRow {
            parsed: parsed.clone(),
            governorate: governorate.to_string(),
            area_similarity,
            street_type,
            has_block,
            has_street_num,
            area_lat_mean: self.stats.mean("area", Axis::Lat, &parsed.area, governorate),
            area_lon_mean: self.stats.mean("area", Axis::Lon, &parsed.area, governorate),
            area_lat_std: self.stats.std("area", Axis::Lat, &parsed.area),
            area_lon_std: self.stats.std("area", Axis::Lon, &parsed.area),
            governorate_lat_mean: self
                .stats
                .mean("governorate", Axis::Lat, governorate, governorate),
            governorate_lon_mean: self
                .stats
                .mean("governorate", Axis::Lon, governorate, governorate),
            features,
        })
    }
}

/// Value of one stored manual column. Columns the builder did not produce
/// default by type: zero for `tfidf_*`, the Kuwait center for mean columns,
/// the std floor for std columns, zero otherwise.
fn column_value(column: &str, named: &HashMap<String, f64>, tfidf_row: &[f64]) -> f64 {
    if let Some(index) = column.strip_prefix("tfidf_") {
        return index
            .parse::<usize>()
            .ok()
            .and_then(|i| tfidf_row.get(i))
            .copied()
            .unwrap_or(0.0);
    }
    if let Some(&value) = named.get(column) {
        return value;
    }
    if column.ends_with("lat_mean") {
        KUWAIT_CENTER_LAT
    } else if column.ends_with("lon_mean") {
        KUWAIT_CENTER_LON
    } else if column.ends_with("_std") {
        STD_EPSILON
    } else {
        0.0
    }
}

/// First run of digits in `s`, as f64.
fn first_number(s: &str) -> Option<f64> {
    FIRST_DIGITS.find(s).and_then(|m| m.as_str().parse().ok())
}
