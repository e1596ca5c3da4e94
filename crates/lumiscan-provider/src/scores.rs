//! Score normalization: provider concern list -> [`SkinMetrics`].
//!
//! The provider names concerns inconsistently across model versions, so
//! each metric carries an ordered list of candidate concern names; the
//! first name present in the response wins. Scores pass through unchanged
//! (higher is always better, no inversion) and missing concerns default
//! to `0.0`.

use std::collections::HashMap;

use lumiscan_types::SkinMetrics;

use crate::types::ConcernScore;

/// Candidate provider concern names per metric, in fallback order.
struct MetricAliases {
    aliases: &'static [&'static str],
}

const OVERALL: MetricAliases = MetricAliases {
    aliases: &["skin_health"],
};
const HYDRATION: MetricAliases = MetricAliases {
    aliases: &["hydration"],
};
const SMOOTHNESS: MetricAliases = MetricAliases {
    aliases: &["smoothness"],
};
const RADIANCE: MetricAliases = MetricAliases {
    aliases: &["radiance", "skin_dullness"],
};
const DARK_SPOTS: MetricAliases = MetricAliases {
    aliases: &["dark_spots"],
};
const FIRMNESS: MetricAliases = MetricAliases {
    aliases: &["firmness"],
};
const FINE_LINES: MetricAliases = MetricAliases {
    aliases: &["fine_lines_wrinkles", "face_wrinkles"],
};
const ACNE: MetricAliases = MetricAliases {
    aliases: &["acne"],
};
const DARK_CIRCLES: MetricAliases = MetricAliases {
    aliases: &["dark_circles", "dark_circle"],
};
const REDNESS: MetricAliases = MetricAliases {
    aliases: &["redness"],
};

/// Map the provider's concern list onto the ten fixed metrics.
pub fn normalize_scores(scores: &[ConcernScore]) -> SkinMetrics {
    let by_concern: HashMap<&str, f64> = scores
        .iter()
        .map(|s| (s.concern.as_str(), s.score))
        .collect();

    let pick = |metric: &MetricAliases| {
        metric
            .aliases
            .iter()
            .find_map(|alias| by_concern.get(alias).copied())
            .unwrap_or(0.0)
    };

    SkinMetrics {
        overall_skin_health_score: pick(&OVERALL),
        hydration: pick(&HYDRATION),
        smoothness: pick(&SMOOTHNESS),
        radiance: pick(&RADIANCE),
        dark_spots: pick(&DARK_SPOTS),
        firmness: pick(&FIRMNESS),
        fine_lines_wrinkles: pick(&FINE_LINES),
        acne: pick(&ACNE),
        dark_circles: pick(&DARK_CIRCLES),
        redness: pick(&REDNESS),
    }
}
