// src/predictor.rs
use anyhow::{anyhow, bail, Result};
use log::info;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::RandomForestRegressor;
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::constants::{DISTANCE_EPSILON, RESIDUAL_NEIGHBORS};

/// Per-axis regression model over the scaled feature row.
pub type CoordinateModel = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Training-time reference material for the residual correction: the scaled
/// feature matrix of the training set (row-major f32), the per-axis
/// residuals the baseline models left on it, and optional per-row sample
/// weights. Read-only after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceSet {
    pub rows: usize,
    pub dim: usize,
    pub matrix: Vec<f32>,
    pub lat_residuals: Vec<f64>,
    pub lon_residuals: Vec<f64>,
    pub sample_weights: Option<Vec<f64>>,
}

impl ReferenceSet {
    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.dim == 0 {
            bail!("Reference set is empty");
        }
        if self.matrix.len() != self.rows * self.dim {
            bail!(
                "Reference matrix holds {} values, expected {} ({} rows x {} dims)",
                self.matrix.len(),
                self.rows * self.dim,
                self.rows,
                self.dim
            );
        }
        if self.lat_residuals.len() != self.rows || self.lon_residuals.len() != self.rows {
            bail!(
                "Residual vectors ({}, {}) do not match {} reference rows",
                self.lat_residuals.len(),
                self.lon_residuals.len(),
                self.rows
            );
        }
        if let Some(weights) = &self.sample_weights {
            if weights.len() != self.rows {
                bail!(
                    "{} sample weights do not match {} reference rows",
                    weights.len(),
                    self.rows
                );
            }
        }
        Ok(())
    }
}

/// Exhaustive nearest-neighbor search over the reference matrix, squared
/// L2 metric. Built once at load time and kept for the process lifetime.
pub struct FlatL2Index {
    matrix: Array2<f32>,
}

impl FlatL2Index {
    pub fn new(reference: &ReferenceSet) -> Result<Self> {
        reference.validate()?;
        let matrix = Array2::from_shape_vec((reference.rows, reference.dim), reference.matrix.clone())
            .map_err(|e| anyhow!("Reference matrix shape error: {e}"))?;
        Ok(Self { matrix })
    }

    pub fn dim(&self) -> usize {
        self.matrix.ncols()
    }

    /// The `k` nearest rows to `query` as `(row index, squared distance)`,
    /// ascending by distance.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut hits: Vec<(usize, f32)> = self
            .matrix
            .outer_iter()
            .enumerate()
            .map(|(i, row)| {
                let dist = row
                    .iter()
                    .zip(query)
                    .map(|(a, b)| {
                        let diff = a - b;
                        diff * diff
                    })
                    .sum::<f32>();
                (i, dist)
            })
            .collect();
        hits.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k.min(hits.len()));
        hits
    }
}

/// Inverse-square-distance weighted sum of stored residuals over the
/// neighbor set. Sample weights, when present, multiply in after the
/// distance weights are normalized, followed by a renormalization.
fn weighted_residual(
    neighbors: &[(usize, f32)],
    residuals: &[f64],
    sample_weights: Option<&[f64]>,
) -> f64 {
    if neighbors.is_empty() {
        return 0.0;
    }
    let mut weights: Vec<f64> = neighbors
        .iter()
        .map(|&(_, dist)| 1.0 / (dist as f64 + DISTANCE_EPSILON))
        .collect();
    let total: f64 = weights.iter().sum();
    for w in &mut weights {
        *w /= total;
    }
    if let Some(samples) = sample_weights {
        for (w, &(i, _)) in weights.iter_mut().zip(neighbors) {
            *w *= samples[i];
        }
        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            for w in &mut weights {
                *w /= total;
            }
        }
    }
    weights
        .iter()
        .zip(neighbors)
        .map(|(w, &(i, _))| w * residuals[i])
        .sum()
}

/// Coordinate prediction: per-axis regression baseline plus a k-NN residual
/// correction against the training reference set.
pub struct HybridPredictor {
    lat_model: CoordinateModel,
    lon_model: CoordinateModel,
    index: FlatL2Index,
    lat_residuals: Vec<f64>,
    lon_residuals: Vec<f64>,
    sample_weights: Option<Vec<f64>>,
    k: usize,
}

impl HybridPredictor {
    pub fn new(
        lat_model: CoordinateModel,
        lon_model: CoordinateModel,
        reference: ReferenceSet,
    ) -> Result<Self> {
        let index = FlatL2Index::new(&reference)?;
        info!(
            "Hybrid predictor ready: {} reference points, {} dims",
            reference.rows, reference.dim
        );
        Ok(Self {
            lat_model,
            lon_model,
            index,
            lat_residuals: reference.lat_residuals,
            lon_residuals: reference.lon_residuals,
            sample_weights: reference.sample_weights,
            k: RESIDUAL_NEIGHBORS,
        })
    }

    pub fn dim(&self) -> usize {
        self.index.dim()
    }

    /// Predict `(latitude, longitude)` for one scaled feature row.
    pub fn predict(&self, scaled: &[f64]) -> Result<(f64, f64)> {
        if scaled.len() != self.index.dim() {
            bail!(
                "Feature row width {} does not match reference dimension {}",
                scaled.len(),
                self.index.dim()
            );
        }

        let x = DenseMatrix::from_2d_vec(&vec![scaled.to_vec()]);
        let lat_base = self
            .lat_model
            .predict(&x)
            .map_err(|e| anyhow!("Latitude model prediction failed: {e}"))?[0];
        let lon_base = self
            .lon_model
            .predict(&x)
            .map_err(|e| anyhow!("Longitude model prediction failed: {e}"))?[0];

        let query: Vec<f32> = scaled.iter().map(|&v| v as f32).collect();
        let neighbors = self.index.search(&query, self.k);
        let sample_weights = self.sample_weights.as_deref();
        let lat_correction = weighted_residual(&neighbors, &self.lat_residuals, sample_weights);
        let lon_correction = weighted_residual(&neighbors, &self.lon_residuals, sample_weights);

        Ok((lat_base + lat_correction, lon_base + lon_correction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(rows: usize, dim: usize) -> ReferenceSet {
        ReferenceSet {
            rows,
            dim,
            matrix: vec![0.0; rows * dim],
            lat_residuals: vec![0.0; rows],
            lon_residuals: vec![0.0; rows],
            sample_weights: None,
        }
    }

    #[test]
    fn reference_validation() {
        assert!(reference(3, 2).validate().is_ok());
        assert!(reference(0, 2).validate().is_err());

        let mut bad = reference(3, 2);
        bad.matrix.pop();
        assert!(bad.validate().is_err());

        let mut bad = reference(3, 2);
        bad.lat_residuals.pop();
        assert!(bad.validate().is_err());

        let mut bad = reference(3, 2);
        bad.sample_weights = Some(vec![1.0]);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn index_returns_nearest_first() {
        let mut r = reference(3, 2);
        r.matrix = vec![0.0, 0.0, 3.0, 4.0, 1.0, 1.0];
        let index = FlatL2Index::new(&r).unwrap();
        let hits = index.search(&[0.0, 0.0], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, 0);
        assert_eq!(hits[0].1, 0.0);
        assert_eq!(hits[1].0, 2);
        assert_eq!(hits[1].1, 2.0);
    }

    #[test]
    fn zero_distance_neighbor_dominates() {
        let neighbors = vec![(0usize, 0.0f32), (1, 1.0)];
        let residuals = vec![0.1, 0.5];
        let correction = weighted_residual(&neighbors, &residuals, None);
        assert!((correction - 0.1).abs() < 1e-6);
    }

    #[test]
    fn sample_weights_shift_the_correction() {
        // Equal distances, residuals 1 and 3, sample weights 1 and 3:
        // 0.25 * 1 + 0.75 * 3 = 2.5.
        let neighbors = vec![(0usize, 1.0f32), (1, 1.0)];
        let residuals = vec![1.0, 3.0];
        let correction = weighted_residual(&neighbors, &residuals, Some(&[1.0, 3.0]));
        assert!((correction - 2.5).abs() < 1e-9);
    }

    #[test]
    fn constant_target_round_trip() {
        // Constant training targets make the forest output exact, so the
        // hybrid prediction is the constant plus a zero correction.
        let x_rows: Vec<Vec<f64>> = (0..8)
            .map(|i| vec![i as f64, (i % 3) as f64])
            .collect();
        let x = DenseMatrix::from_2d_vec(&x_rows);
        let lat_y = vec![29.33; 8];
        let lon_y = vec![48.05; 8];
        let lat_model = CoordinateModel::fit(&x, &lat_y, Default::default()).unwrap();
        let lon_model = CoordinateModel::fit(&x, &lon_y, Default::default()).unwrap();

        let mut r = reference(8, 2);
        r.matrix = x_rows.iter().flatten().map(|&v| v as f32).collect();
        let predictor = HybridPredictor::new(lat_model, lon_model, r).unwrap();

        let (lat, lon) = predictor.predict(&[2.0, 2.0]).unwrap();
        assert!((lat - 29.33).abs() < 1e-9);
        assert!((lon - 48.05).abs() < 1e-9);

        assert!(predictor.predict(&[1.0]).is_err());
    }
}
