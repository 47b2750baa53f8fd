// src/scaler.rs
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Frozen standard-scaler parameters exported at training time. Applies
/// `(x - mean) / scale` column-wise; never refit at inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl FeatureScaler {
    pub fn width(&self) -> usize {
        self.mean.len()
    }

    pub fn validate(&self) -> Result<()> {
        if self.mean.len() != self.scale.len() {
            bail!(
                "Scaler mean/scale length mismatch: {} vs {}",
                self.mean.len(),
                self.scale.len()
            );
        }
        if self.scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
            bail!("Scaler contains zero or non-finite scale entries");
        }
        Ok(())
    }

    /// Scale one feature row in place.
    pub fn transform_row(&self, row: &mut [f64]) -> Result<()> {
        if row.len() != self.mean.len() {
            bail!(
                "Row width {} does not match scaler width {}",
                row.len(),
                self.mean.len()
            );
        }
        for (i, value) in row.iter_mut().enumerate() {
            *value = (*value - self.mean[i]) / self.scale[i];
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transforms_row() {
        let scaler = FeatureScaler {
            mean: vec![1.0, 2.0],
            scale: vec![2.0, 0.5],
        };
        let mut row = vec![3.0, 1.0];
        scaler.transform_row(&mut row).unwrap();
        assert_eq!(row, vec![1.0, -2.0]);
    }

    #[test]
    fn rejects_width_mismatch_and_zero_scale() {
        let scaler = FeatureScaler {
            mean: vec![0.0],
            scale: vec![1.0],
        };
        assert!(scaler.transform_row(&mut [1.0, 2.0]).is_err());

        let bad = FeatureScaler {
            mean: vec![0.0],
            scale: vec![0.0],
        };
        assert!(bad.validate().is_err());
    }
}
