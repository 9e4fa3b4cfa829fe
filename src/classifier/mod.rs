//! Ride quality classification against per-user thresholds.
//!
//! Each available metric (earnings per km, earnings per hour, rider rating)
//! is graded into one of four buckets by [`grade::grade`]; the buckets are
//! then combined by [`aggregate::aggregate`] into a single
//! [`RideClassification`].

pub mod aggregate;
pub mod grade;

use serde::Serialize;

use crate::model::{ClassificationThresholds, RideClassification};

pub use aggregate::aggregate;
pub use grade::{MetricGrade, grade};

/// Per-metric verdicts alongside the overall result, for explaining a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassificationDetails {
    pub earnings_per_km: Option<RideClassification>,
    pub earnings_per_hour: Option<RideClassification>,
    pub rating: Option<RideClassification>,
    pub overall: RideClassification,
}

fn metric_grades(
    earnings_per_km: Option<f64>,
    earnings_per_hour: Option<f64>,
    rider_rating: Option<f64>,
    thresholds: &ClassificationThresholds,
) -> [Option<MetricGrade>; 3] {
    [
        earnings_per_km.map(|v| grade(v, &thresholds.earnings_per_km)),
        earnings_per_hour.map(|v| grade(v, &thresholds.earnings_per_hour)),
        rider_rating.map(|v| grade(v, &thresholds.rating)),
    ]
}

/// Classifies a ride from whichever metrics are present.
///
/// Total over its inputs: with no metric at all the result is
/// [`RideClassification::Unknown`].
pub fn classify(
    earnings_per_km: Option<f64>,
    earnings_per_hour: Option<f64>,
    rider_rating: Option<f64>,
    thresholds: &ClassificationThresholds,
) -> RideClassification {
    let grades = metric_grades(earnings_per_km, earnings_per_hour, rider_rating, thresholds);
    aggregate(grades.iter().flatten().copied())
}

/// Like [`classify`], but also reports each metric's own verdict.
pub fn classify_detailed(
    earnings_per_km: Option<f64>,
    earnings_per_hour: Option<f64>,
    rider_rating: Option<f64>,
    thresholds: &ClassificationThresholds,
) -> ClassificationDetails {
    let [epk, eph, rating] =
        metric_grades(earnings_per_km, earnings_per_hour, rider_rating, thresholds);

    ClassificationDetails {
        earnings_per_km: epk.map(MetricGrade::classification),
        earnings_per_hour: eph.map(MetricGrade::classification),
        rating: rating.map(MetricGrade::classification),
        overall: aggregate([epk, eph, rating].into_iter().flatten()),
    }
}
