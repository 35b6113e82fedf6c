use crate::snapshot::{DisplayTier, RankedEntry, TrainingSnapshot};

/// Lower end of the nominal weight domain (0% bar).
pub const WEIGHT_FLOOR: f64 = 0.5;
/// Upper end of the nominal weight domain (100% bar).
pub const WEIGHT_CEIL: f64 = 1.5;

/// Maps a weight multiplier to a bar percentage in [0, 100].
///
/// Weights outside the nominal domain clamp; NaN renders as an empty bar.
pub fn scale(weight: f64) -> f64 {
    if weight.is_nan() {
        return 0.0;
    }
    ((weight - WEIGHT_FLOOR) / (WEIGHT_CEIL - WEIGHT_FLOOR) * 100.0).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightBar {
    pub percent: f64,
    pub tier: DisplayTier,
}

pub fn weight_bar(entry: &RankedEntry, degraded: bool) -> WeightBar {
    WeightBar {
        percent: scale(entry.entry.weight),
        tier: if degraded {
            DisplayTier::Rest
        } else {
            entry.tier()
        },
    }
}

/// Bars for every entry of a snapshot, in rank order.
pub fn weight_bars(snapshot: &TrainingSnapshot) -> Vec<(&str, WeightBar)> {
    snapshot
        .entries
        .iter()
        .map(|e| (e.model_name(), weight_bar(e, snapshot.degraded)))
        .collect()
}
