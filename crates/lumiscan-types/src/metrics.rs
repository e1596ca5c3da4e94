//! The ten normalized skin metrics.
//!
//! The provider scores every concern on a 0--100 scale where **higher is
//! always better** (100 = no visible issue). Normalization maps the
//! provider's concern list onto this fixed struct; scores pass through
//! unchanged and concerns the provider omitted default to `0.0`.

use serde::{Deserialize, Serialize};

/// Normalized analysis scores, one field per tracked concern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SkinMetrics {
    /// Overall skin health, from the provider's `skin_health` concern.
    pub overall_skin_health_score: f64,
    pub hydration: f64,
    pub smoothness: f64,
    pub radiance: f64,
    pub dark_spots: f64,
    pub firmness: f64,
    pub fine_lines_wrinkles: f64,
    pub acne: f64,
    pub dark_circles: f64,
    pub redness: f64,
}

impl SkinMetrics {
    /// Number of tracked metrics.
    pub const COUNT: usize = 10;

    /// All metrics as `(name, score)` pairs, in declaration order.
    pub fn to_pairs(&self) -> [(&'static str, f64); Self::COUNT] {
        [
            ("overall_skin_health_score", self.overall_skin_health_score),
            ("hydration", self.hydration),
            ("smoothness", self.smoothness),
            ("radiance", self.radiance),
            ("dark_spots", self.dark_spots),
            ("firmness", self.firmness),
            ("fine_lines_wrinkles", self.fine_lines_wrinkles),
            ("acne", self.acne),
            ("dark_circles", self.dark_circles),
            ("redness", self.redness),
        ]
    }
}
