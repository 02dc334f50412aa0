use super::summary::{split_source, TimerSummary};

/// The canonical "upper / count / sum" threshold, always summarized.
pub const FULL: f64 = 100.0;

/// Name suffix for a percentile threshold.
///
/// `95` → `.95`, `99.5` → `.99_5`, `100` → no suffix.
pub fn suffix(percentile: f64) -> String {
    if percentile == FULL {
        return String::new();
    }
    let whole = percentile.floor();
    if whole == percentile {
        format!(".{}", whole as i64)
    } else {
        let tenth = ((percentile - whole) * 10.0).ceil() as i64;
        format!(".{}_{}", whole as i64, tenth)
    }
}

/// Summarize the lowest `percentile`% of `samples` for the timer stored
/// under the raw key `key`.
///
/// Returns `None` when the trimmed set is empty (including when `samples`
/// is). Sorts `samples` in place.
pub fn summarize(
    key: &str,
    samples: &mut [f64],
    percentile: f64,
    with_median: bool,
) -> Option<TimerSummary> {
    let n = samples.len();
    let threshold = (((FULL - percentile) / FULL) * n as f64 + 0.5).floor();
    let keep = n as i64 - threshold as i64;
    if keep <= 0 {
        return None;
    }
    let keep = keep as usize;

    samples.sort_by(f64::total_cmp);
    let kept = &samples[..keep];

    let (sum, sum_of_squares) = kept
        .iter()
        .fold((0.0, 0.0), |(s, sq), v| (s + v, sq + v * v));

    // Even counts above two add the middle pair rather than averaging it
    let median = with_median.then(|| {
        let mid = keep / 2;
        let mut m = kept[mid];
        if keep > 2 && keep % 2 == 0 {
            m += kept[mid - 1];
        }
        m
    });

    let (name, source) = split_source(key);
    Some(TimerSummary {
        name: format!("{name}{}", suffix(percentile)),
        source: source.map(str::to_owned),
        percentile,
        count: keep,
        sum,
        min: kept[0],
        max: kept[keep - 1],
        sum_of_squares,
        median,
    })
}

/// Normalize a configured threshold list: dedupe, keep only values strictly
/// inside `(0, 100)`, and always lead with 100.
pub fn threshold_set(configured: &[f64]) -> Vec<f64> {
    let mut set = vec![FULL];
    for &p in configured {
        if p > 0.0 && p < FULL && !set.contains(&p) {
            set.push(p);
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(samples: &[f64], pct: f64) -> Option<TimerSummary> {
        let mut v = samples.to_vec();
        summarize("name", &mut v, pct, false)
    }

    fn expect(name: &str, pct: f64, kept: &[f64]) -> TimerSummary {
        TimerSummary {
            name: name.into(),
            source: None,
            percentile: pct,
            count: kept.len(),
            sum: kept.iter().sum(),
            min: kept[0],
            max: kept[kept.len() - 1],
            sum_of_squares: kept.iter().map(|v| v * v).sum(),
            median: None,
        }
    }

    #[test]
    fn no_data_yields_nothing() {
        assert_eq!(run(&[], 100.0), None);
        assert_eq!(run(&[], 50.0), None);
    }

    #[test]
    fn one_point() {
        let got = run(&[30.0], 100.0).unwrap();
        assert_eq!(got, expect("name", 100.0, &[30.0]));
        assert_eq!(got.sum_of_squares, 900.0);
    }

    #[test]
    fn full_set_matches_plain_statistics() {
        assert_eq!(run(&[30.0, 60.0], 100.0).unwrap(), expect("name", 100.0, &[30.0, 60.0]));
        assert_eq!(
            run(&[90.0, 30.0, 60.0], 100.0).unwrap(),
            expect("name", 100.0, &[30.0, 60.0, 90.0])
        );
    }

    #[test]
    fn trims_to_percentile() {
        assert_eq!(run(&[30.0, 60.0, 90.0], 50.0).unwrap(), expect("name.50", 50.0, &[30.0]));
        assert_eq!(
            run(&[30.0, 60.0, 90.0], 67.0).unwrap(),
            expect("name.67", 67.0, &[30.0, 60.0])
        );
        assert_eq!(
            run(&[10.0, 20.0, 30.0, 40.0], 75.3).unwrap(),
            expect("name.75_3", 75.3, &[10.0, 20.0, 30.0])
        );
    }

    #[test]
    fn degenerate_threshold_yields_nothing() {
        // floor(0.9 * 1 + 0.5) = 1 → nothing kept
        assert_eq!(run(&[30.0], 10.0), None);
    }

    #[test]
    fn source_is_split_from_key() {
        let mut v = vec![5.0];
        let got = summarize("web01,db.query", &mut v, 90.0, false);
        // one sample at p90 rounds to keeping it
        let got = got.unwrap();
        assert_eq!(got.name, "db.query.90");
        assert_eq!(got.source.as_deref(), Some("web01"));
    }

    #[test]
    fn median_adds_middle_pair_for_even_counts() {
        let median = |samples: &[f64]| {
            let mut v = samples.to_vec();
            summarize("m", &mut v, 100.0, true).unwrap().median.unwrap()
        };
        assert_eq!(median(&[7.0]), 7.0);
        // two values: no pair sum, just the upper middle
        assert_eq!(median(&[1.0, 2.0]), 2.0);
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), 5.0);
        assert_eq!(median(&[10.0, 20.0, 30.0, 40.0, 50.0, 60.0]), 70.0);
    }

    #[test]
    fn median_omitted_unless_requested() {
        assert_eq!(run(&[1.0, 2.0, 3.0], 100.0).unwrap().median, None);
    }

    #[test]
    fn suffix_formatting() {
        assert_eq!(suffix(100.0), "");
        assert_eq!(suffix(95.0), ".95");
        assert_eq!(suffix(99.5), ".99_5");
        assert_eq!(suffix(75.3), ".75_3");
    }

    #[test]
    fn threshold_set_dedupes_and_includes_full() {
        assert_eq!(threshold_set(&[]), vec![100.0]);
        assert_eq!(threshold_set(&[95.0, 99.5, 95.0, 100.0, 0.0, 120.0]), vec![100.0, 95.0, 99.5]);
    }
}
