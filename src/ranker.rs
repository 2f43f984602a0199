//! Percentile ranking
//!
//! Ranks a subject's wellness index against past outcomes in the same age
//! bucket. Buckets with too little history report a fixed default instead of a
//! meaningless percentile.

use crate::history::HistoryStore;
use crate::types::{PercentileResult, WellnessIndex};

/// Matching records required before a real percentile is reported
pub const MIN_RANKING_SAMPLE: usize = 5;

/// Percentile reported for buckets with too little history
pub const DEFAULT_PERCENTILE: u8 = 85;

/// Percentile ranker over a history snapshot
pub struct PercentileRanker;

impl PercentileRanker {
    /// Rank `wellness_index` within `age_bucket`.
    ///
    /// Formula: `round(100 * count(stored <= index) / matching)`
    pub fn percentile(
        store: &HistoryStore,
        age_bucket: &str,
        wellness_index: WellnessIndex,
    ) -> PercentileResult {
        let mut matching = 0usize;
        let mut at_or_below = 0usize;
        for record in store.in_bucket(age_bucket) {
            matching += 1;
            if record.wellness_index <= wellness_index {
                at_or_below += 1;
            }
        }

        if matching < MIN_RANKING_SAMPLE {
            return PercentileResult {
                percentile: DEFAULT_PERCENTILE,
                sample_size: matching,
            };
        }

        let percentile = (100.0 * at_or_below as f64 / matching as f64).round() as u8;
        PercentileResult {
            percentile,
            sample_size: matching,
        }
    }
}

/// Age bucket label for an age in years
pub fn age_bucket_for_age(years: u32) -> String {
    match years {
        0..=17 => "under-18".to_string(),
        18..=29 => "18-29".to_string(),
        70.. => "70+".to_string(),
        decade_start => {
            let start = decade_start / 10 * 10;
            format!("{}-{}", start, start + 9)
        }
    }
}

/// Largest age accepted from an external estimate
pub const MAX_PLAUSIBLE_AGE: u32 = 150;

/// Age bucket for an externally estimated age such as `"28"` or `"25-30"`.
///
/// Ranges use their midpoint. Returns `None` when no number is present or an
/// age exceeds [`MAX_PLAUSIBLE_AGE`].
pub fn age_bucket_from_estimate(estimate: &str) -> Option<String> {
    // Digit runs too long for u32 fail to parse and reject the estimate
    let numbers = estimate
        .split(|c: char| !c.is_ascii_digit())
        .filter(|token| !token.is_empty())
        .take(2)
        .map(|token| token.parse::<u32>().ok().filter(|&age| age <= MAX_PLAUSIBLE_AGE))
        .collect::<Option<Vec<u32>>>()?;

    let age = match numbers.as_slice() {
        [single] => *single,
        [low, high] => (low + high) / 2,
        _ => return None,
    };
    Some(age_bucket_for_age(age))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HistoryRecord;

    fn index(value: i64) -> WellnessIndex {
        WellnessIndex::new(value).unwrap()
    }

    fn store_with(bucket: &str, values: &[i64]) -> HistoryStore {
        let mut store = HistoryStore::default();
        for &v in values {
            store.append(HistoryRecord::now(bucket, index(v)));
        }
        store
    }

    #[test]
    fn test_reference_percentile() {
        let store = store_with("30-39", &[10, 20, 30, 40, 50]);
        let result = PercentileRanker::percentile(&store, "30-39", index(30));
        // Three of five stored values are <= 30
        assert_eq!(result.percentile, 60);
        assert_eq!(result.sample_size, 5);
    }

    #[test]
    fn test_small_bucket_defaults() {
        let store = store_with("30-39", &[10, 20, 30, 40]);
        for q in [1, 25, 50, 100] {
            let result = PercentileRanker::percentile(&store, "30-39", index(q));
            assert_eq!(result.percentile, DEFAULT_PERCENTILE);
        }
        let empty = HistoryStore::default();
        assert_eq!(
            PercentileRanker::percentile(&empty, "30-39", index(50)).percentile,
            DEFAULT_PERCENTILE
        );
    }

    #[test]
    fn test_only_matching_bucket_counts() {
        let mut store = store_with("30-39", &[10, 20, 30, 40, 50]);
        for v in [1, 1, 1, 1, 1, 1] {
            store.append(HistoryRecord::now("60-69", index(v)));
        }
        let result = PercentileRanker::percentile(&store, "30-39", index(5));
        assert_eq!(result.percentile, 0);
        assert_eq!(result.sample_size, 5);

        let result = PercentileRanker::percentile(&store, "60-69", index(1));
        assert_eq!(result.percentile, 100);
    }

    #[test]
    fn test_rounding() {
        // 2 of 6 = 33.3
        let store = store_with("18-29", &[10, 20, 90, 90, 90, 90]);
        assert_eq!(PercentileRanker::percentile(&store, "18-29", index(25)).percentile, 33);
        // 5 of 6 = 83.3
        let store = store_with("18-29", &[10, 20, 30, 40, 50, 90]);
        assert_eq!(PercentileRanker::percentile(&store, "18-29", index(60)).percentile, 83);
    }

    #[test]
    fn test_age_buckets() {
        assert_eq!(age_bucket_for_age(12), "under-18");
        assert_eq!(age_bucket_for_age(18), "18-29");
        assert_eq!(age_bucket_for_age(29), "18-29");
        assert_eq!(age_bucket_for_age(30), "30-39");
        assert_eq!(age_bucket_for_age(65), "60-69");
        assert_eq!(age_bucket_for_age(88), "70+");
    }

    #[test]
    fn test_age_bucket_from_estimate() {
        assert_eq!(age_bucket_from_estimate("28").as_deref(), Some("18-29"));
        assert_eq!(age_bucket_from_estimate("25-35").as_deref(), Some("30-39"));
        assert_eq!(age_bucket_from_estimate("approx. 42 - 48 years").as_deref(), Some("40-49"));
        assert_eq!(age_bucket_from_estimate("unknown"), None);
    }

    #[test]
    fn test_age_bucket_from_estimate_rejects_implausible_ages() {
        assert_eq!(age_bucket_from_estimate("4000000000-4000000000"), None);
        assert_eq!(age_bucket_from_estimate("99999999999"), None);
        assert_eq!(age_bucket_from_estimate("200"), None);
        assert_eq!(age_bucket_from_estimate("30-151"), None);
        assert_eq!(age_bucket_from_estimate("150").as_deref(), Some("70+"));
        assert_eq!(age_bucket_from_estimate("140-150").as_deref(), Some("70+"));
    }
}
