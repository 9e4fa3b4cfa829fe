use crate::model::{MetricThresholds, RideClassification};

/// Bucket for a single metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricGrade {
    Good,
    Average,
    BelowAverage,
    Bad,
}

impl MetricGrade {
    /// Collapses the four buckets into the three-valued verdict;
    /// `BelowAverage` counts as bad.
    pub fn classification(self) -> RideClassification {
        match self {
            MetricGrade::Good => RideClassification::Good,
            MetricGrade::Average => RideClassification::Average,
            MetricGrade::BelowAverage | MetricGrade::Bad => RideClassification::Bad,
        }
    }

    pub fn is_bad(self) -> bool {
        matches!(self, MetricGrade::BelowAverage | MetricGrade::Bad)
    }
}

/// Grades `value` against three cut points, checked top-down.
///
/// | Condition        | Grade        |
/// |------------------|--------------|
/// | `>= good`        | Good         |
/// | `>= avg`         | Average      |
/// | `>= bad`         | BelowAverage |
/// | otherwise        | Bad          |
///
/// Thresholds are not validated; when they are out of order the first
/// satisfied row still wins.
pub fn grade(value: f64, thresholds: &MetricThresholds) -> MetricGrade {
    match value {
        v if v >= thresholds.good => MetricGrade::Good,
        v if v >= thresholds.avg => MetricGrade::Average,
        v if v >= thresholds.bad => MetricGrade::BelowAverage,
        _ => MetricGrade::Bad,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_boundaries() {
        let t = MetricThresholds::new(15.0, 10.0, 5.0);

        assert_eq!(grade(40.0, &t), MetricGrade::Good);
        assert_eq!(grade(15.0, &t), MetricGrade::Good);
        assert_eq!(grade(14.99, &t), MetricGrade::Average);
        assert_eq!(grade(10.0, &t), MetricGrade::Average);
        assert_eq!(grade(9.99, &t), MetricGrade::BelowAverage);
        assert_eq!(grade(5.0, &t), MetricGrade::BelowAverage);
        assert_eq!(grade(4.99, &t), MetricGrade::Bad);
        assert_eq!(grade(0.0, &t), MetricGrade::Bad);
    }

    #[test]
    fn test_disordered_thresholds_follow_fixed_order() {
        // avg above good: anything reaching good is Good before avg is checked
        let t = MetricThresholds::new(10.0, 20.0, 5.0);

        assert_eq!(grade(25.0, &t), MetricGrade::Good);
        assert_eq!(grade(12.0, &t), MetricGrade::Good);
        assert_eq!(grade(7.0, &t), MetricGrade::BelowAverage);
    }

    #[test]
    fn test_nan_grades_bad() {
        let t = MetricThresholds::new(4.5, 4.0, 3.5);
        assert_eq!(grade(f64::NAN, &t), MetricGrade::Bad);
    }

    #[test]
    fn test_classification_collapse() {
        assert_eq!(MetricGrade::Good.classification(), RideClassification::Good);
        assert_eq!(MetricGrade::Average.classification(), RideClassification::Average);
        assert_eq!(MetricGrade::BelowAverage.classification(), RideClassification::Bad);
        assert_eq!(MetricGrade::Bad.classification(), RideClassification::Bad);
    }
}
