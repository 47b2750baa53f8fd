// src/artifacts.rs
use anyhow::{bail, Context, Result};
use log::info;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::embedding::{BertEmbedder, TextEmbedder};
use crate::features::GeoStatistics;
use crate::gazetteer::Gazetteer;
use crate::predictor::{CoordinateModel, ReferenceSet};
use crate::scaler::FeatureScaler;
use crate::tfidf::TfidfVectorizer;

/// Widths declared at training time; everything else must agree with them.
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingMetadata {
    pub feature_dimensions: usize,
    pub embedding_dimensions: usize,
}

/// Every artifact the pipeline needs, loaded once per process. Construction
/// going through `validate` makes a half-wired pipeline unrepresentable:
/// a missing file or a width disagreement fails before any prediction runs.
pub struct ArtifactSet {
    pub gazetteer: Gazetteer,
    pub stats: GeoStatistics,
    pub manual_columns: Vec<String>,
    pub scaler: FeatureScaler,
    pub tfidf: TfidfVectorizer,
    pub metadata: TrainingMetadata,
    pub lat_model: CoordinateModel,
    pub lon_model: CoordinateModel,
    pub reference: ReferenceSet,
    pub embedder: Box<dyn TextEmbedder>,
}

fn read_json<T: serde::de::DeserializeOwned>(dir: &Path, file: &str) -> Result<T> {
    let path = dir.join(file);
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read artifact {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse artifact {}", path.display()))
}

fn read_bincode<T: serde::de::DeserializeOwned>(dir: &Path, file: &str) -> Result<T> {
    let path = dir.join(file);
    let reader = BufReader::new(
        File::open(&path).with_context(|| format!("Failed to open artifact {}", path.display()))?,
    );
    bincode::deserialize_from(reader)
        .with_context(|| format!("Failed to decode artifact {}", path.display()))
}

impl ArtifactSet {
    /// Load the full artifact directory. Fatal on any missing or
    /// inconsistent artifact.
    pub fn load(models_dir: &Path) -> Result<Self> {
        info!("Loading artifacts from {}", models_dir.display());

        let gazetteer = Gazetteer::load(&models_dir.join("address_normalization_dicts.json"))?;
        let stats: GeoStatistics = read_json(models_dir, "geo_stats.json")?;
        let manual_columns: Vec<String> = read_json(models_dir, "manual_feature_columns.json")?;
        let scaler: FeatureScaler = read_json(models_dir, "feature_scaler.json")?;
        let tfidf: TfidfVectorizer = read_json(models_dir, "tfidf_vectorizer.json")?;
        let metadata: TrainingMetadata = read_json(models_dir, "training_metadata.json")?;

        let lat_model: CoordinateModel = read_bincode(models_dir, "lat_model.bin")?;
        let lon_model: CoordinateModel = read_bincode(models_dir, "lon_model.bin")?;
        let reference: ReferenceSet = read_bincode(models_dir, "reference_set.bin")?;

        let embedder = BertEmbedder::load(&models_dir.join("embedder"))?;

        let artifacts = Self {
            gazetteer,
            stats,
            manual_columns,
            scaler,
            tfidf,
            metadata,
            lat_model,
            lon_model,
            reference,
            embedder: Box::new(embedder),
        };
        artifacts.validate()?;
        info!(
            "Artifacts loaded: {} feature dims, {} manual columns, {} reference points",
            artifacts.metadata.feature_dimensions,
            artifacts.manual_columns.len(),
            artifacts.reference.rows
        );
        Ok(artifacts)
    }

    /// Cross-artifact consistency: every component must agree on the
    /// feature width the models were trained with.
    pub fn validate(&self) -> Result<()> {
        self.scaler.validate()?;
        self.tfidf.validate()?;
        self.reference.validate()?;

        let declared = self.metadata.feature_dimensions;
        if self.embedder.dimension() != self.metadata.embedding_dimensions {
            bail!(
                "Embedder produces {} dims but training declared {}",
                self.embedder.dimension(),
                self.metadata.embedding_dimensions
            );
        }
        let produced = self.metadata.embedding_dimensions + self.manual_columns.len();
        if produced != declared {
            bail!(
                "Feature builder would produce {} columns ({} embedding + {} manual) but training declared {}",
                produced,
                self.metadata.embedding_dimensions,
                self.manual_columns.len(),
                declared
            );
        }
        if self.scaler.width() != declared {
            bail!(
                "Scaler width {} does not match declared feature dimensions {}",
                self.scaler.width(),
                declared
            );
        }
        if self.reference.dim != declared {
            bail!(
                "Reference set dimension {} does not match declared feature dimensions {}",
                self.reference.dim,
                declared
            );
        }
        Ok(())
    }
}
