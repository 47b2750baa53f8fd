// src/constants.rs

/// Kuwait bounding box, degrees.
pub const KUWAIT_LAT_MIN: f64 = 28.524574;
pub const KUWAIT_LAT_MAX: f64 = 30.103532;
pub const KUWAIT_LON_MIN: f64 = 46.552695;
pub const KUWAIT_LON_MAX: f64 = 48.416094;

/// Geographic center used as the last-resort coordinate fallback.
pub const KUWAIT_CENTER_LAT: f64 = 29.3759;
pub const KUWAIT_CENTER_LON: f64 = 47.9774;

/// Margin added to each side of the bounding box when validating coordinates.
pub const COORDINATE_TOLERANCE_DEG: f64 = 0.02;

/// Per-axis deviation (in area standard deviations) beyond which a
/// prediction is treated as implausible.
pub const DEVIATION_THRESHOLD: f64 = 3.0;

/// Standard deviation floor for statistics lookups, keeps downstream
/// divisions well-defined.
pub const STD_EPSILON: f64 = 0.01;

/// Neighbors consulted for the residual correction.
pub const RESIDUAL_NEIGHBORS: usize = 3;

/// Added to squared distances before inversion when weighting neighbors.
pub const DISTANCE_EPSILON: f64 = 1e-8;

/// Minimum token-sort similarity (0-100) for the fuzzy area fallback.
pub const MIN_AREA_FUZZY_SCORE: f64 = 70.0;

/// Sentinel for address components that could not be resolved.
pub const UNKNOWN: &str = "unknown";
