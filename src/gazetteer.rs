// src/gazetteer.rs
use anyhow::{Context, Result};
use log::{debug, info};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::normalize::TextNormalizer;

/// Reference data for address resolution: governorate -> area lists plus
/// the normalization dictionaries. Loaded once, immutable afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct Gazetteer {
    #[serde(rename = "kuwait_governorates")]
    pub governorates: HashMap<String, Vec<String>>,
    pub abbreviation_map: HashMap<String, String>,
    pub common_typos: HashMap<String, String>,
}

impl Gazetteer {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read gazetteer file {}", path.display()))?;
        let mut gazetteer: Gazetteer = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse gazetteer file {}", path.display()))?;
        gazetteer.apply_fixups();
        info!(
            "Loaded gazetteer: {} governorates, {} abbreviations, {} typo corrections",
            gazetteer.governorates.len(),
            gazetteer.abbreviation_map.len(),
            gazetteer.common_typos.len()
        );
        Ok(gazetteer)
    }

    /// Curation applied after load. "sharq" is a real district name, so it
    /// must never be expanded away by the abbreviation map or rewritten by
    /// the typo map. Single-character typo keys match far too much text and
    /// are dropped entirely.
    fn apply_fixups(&mut self) {
        if self.abbreviation_map.remove("sharq").is_some() {
            debug!("Removed 'sharq' from abbreviation map");
        }
        if self.common_typos.contains_key("sharq") {
            self.common_typos
                .insert("sharq".to_string(), "sharq".to_string());
        }
        self.common_typos.retain(|typo, _| typo.chars().count() > 1);
    }

    /// Flattened, normalized, deduplicated area list. Correction targets of
    /// the typo map that name areas missing from the governorate lists are
    /// included as well.
    pub fn normalized_areas(&self, normalizer: &TextNormalizer) -> Vec<String> {
        let mut areas: Vec<String> = self
            .governorates
            .values()
            .flatten()
            .map(|area| normalizer.normalize(area))
            .collect();
        for correct in self.common_typos.values() {
            let correct_norm = normalizer.normalize(correct);
            if !areas.contains(&correct_norm) {
                areas.push(correct_norm);
            }
        }
        areas.retain(|a| !a.is_empty());
        areas.sort();
        areas.dedup();
        areas
    }

    /// Reverse lookup: which governorate lists the given normalized area.
    pub fn governorate_of(&self, normalizer: &TextNormalizer, area_norm: &str) -> Option<&str> {
        for (governorate, areas) in &self.governorates {
            if areas
                .iter()
                .any(|area| normalizer.normalize(area) == area_norm)
            {
                return Some(governorate.as_str());
            }
        }
        None
    }
}
