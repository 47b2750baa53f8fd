// src/tfidf.rs
use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tokens of two or more word characters, the shape the vocabulary was
/// built with.
static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").unwrap());

/// Frozen TF-IDF vectorizer: a fixed vocabulary with per-term idf weights.
/// Transforms text into an L2-normalized sparse-in-spirit row of fixed
/// width; out-of-vocabulary tokens are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// token -> column index
    pub vocabulary: HashMap<String, usize>,
    /// idf weight per column
    pub idf: Vec<f64>,
}

impl TfidfVectorizer {
    pub fn width(&self) -> usize {
        self.idf.len()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some((token, &index)) = self
            .vocabulary
            .iter()
            .find(|(_, &index)| index >= self.idf.len())
        {
            bail!(
                "TF-IDF vocabulary entry '{}' maps to column {} but only {} idf weights are stored",
                token,
                index,
                self.idf.len()
            );
        }
        Ok(())
    }

    /// Term counts weighted by idf, then L2-normalized. Empty or fully
    /// out-of-vocabulary text yields the zero vector.
    pub fn transform(&self, text: &str) -> Vec<f64> {
        let mut row = vec![0.0; self.idf.len()];
        for token in TOKEN_PATTERN.find_iter(text) {
            if let Some(&index) = self.vocabulary.get(token.as_str()) {
                row[index] += 1.0;
            }
        }
        for (index, value) in row.iter_mut().enumerate() {
            *value *= self.idf[index];
        }
        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for value in &mut row {
                *value /= norm;
            }
        }
        row
    }
}
