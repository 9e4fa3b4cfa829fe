use crate::classifier::grade::MetricGrade;
use crate::model::RideClassification;

/// Combines per-metric grades into one verdict.
///
/// With `total` grades, a side holding at least `ceil(total / 2)` of them wins
/// (good is checked first). Otherwise the side with more grades wins, and a
/// true tie is [`RideClassification::Average`]. No grades at all is
/// [`RideClassification::Unknown`].
pub fn aggregate(grades: impl IntoIterator<Item = MetricGrade>) -> RideClassification {
    let mut total = 0usize;
    let mut good = 0usize;
    let mut bad = 0usize;

    for g in grades {
        total += 1;
        if g == MetricGrade::Good {
            good += 1;
        } else if g.is_bad() {
            bad += 1;
        }
    }

    if total == 0 {
        return RideClassification::Unknown;
    }

    let majority = total.div_ceil(2);

    if good >= majority {
        RideClassification::Good
    } else if bad >= majority {
        RideClassification::Bad
    } else if good > bad {
        RideClassification::Good
    } else if bad > good {
        RideClassification::Bad
    } else {
        RideClassification::Average
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use MetricGrade::*;

    #[test]
    fn test_empty_is_unknown() {
        assert_eq!(aggregate(Vec::new()), RideClassification::Unknown);
    }

    #[test]
    fn test_single_metric() {
        assert_eq!(aggregate([Good]), RideClassification::Good);
        assert_eq!(aggregate([BelowAverage]), RideClassification::Bad);
        assert_eq!(aggregate([Average]), RideClassification::Average);
    }

    #[test]
    fn test_two_metrics_split_is_average() {
        assert_eq!(aggregate([Good, Bad]), RideClassification::Average);
    }

    #[test]
    fn test_two_metrics_half_reaches_majority() {
        assert_eq!(aggregate([Good, Average]), RideClassification::Good);
        assert_eq!(aggregate([Average, BelowAverage]), RideClassification::Bad);
    }

    #[test]
    fn test_three_metrics() {
        assert_eq!(aggregate([Good, Good, Bad]), RideClassification::Good);
        assert_eq!(aggregate([Bad, BelowAverage, Good]), RideClassification::Bad);
        assert_eq!(aggregate([Good, Average, Bad]), RideClassification::Average);
        assert_eq!(aggregate([Average, Average, Average]), RideClassification::Average);
        assert_eq!(aggregate([Average, Average, Good]), RideClassification::Good);
    }

    #[test]
    fn test_unanimous_inputs() {
        for n in 1..=3 {
            assert_eq!(aggregate(vec![Good; n]), RideClassification::Good);
            assert_eq!(aggregate(vec![Bad; n]), RideClassification::Bad);
        }
    }
}
