//! Date-indexed series primitives: dedup and alignment

use chrono::NaiveDate;
use std::collections::BTreeMap;

/// One row of the inner join between the shares-outstanding and close-price
/// series. Dates are strictly increasing and unique by construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedPoint {
    pub date: NaiveDate,
    pub shares: i64,
    pub close: f64,
}

/// Collapses a raw series to one value per date, keeping the last observed
/// value in append order, sorted ascending by date.
pub fn dedup_last_wins<T: Copy>(raw: &[(NaiveDate, T)]) -> Vec<(NaiveDate, T)> {
    let mut by_date = BTreeMap::new();
    for (date, value) in raw {
        by_date.insert(*date, *value);
    }
    by_date.into_iter().collect()
}

/// Inner join of the two deduplicated series on date. Dates present in only
/// one series are dropped: a share-count change cannot be valued without the
/// same-day close.
pub fn align(shares: &[(NaiveDate, i64)], closes: &[(NaiveDate, f64)]) -> Vec<AlignedPoint> {
    let shares_by_date: BTreeMap<NaiveDate, i64> = shares.iter().copied().collect();
    closes
        .iter()
        .filter_map(|(date, close)| {
            shares_by_date.get(date).map(|shares| AlignedPoint {
                date: *date,
                shares: *shares,
                close: *close,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_dedup_keeps_last_observed_value() {
        let raw = vec![
            (d("2024-01-03"), 100),
            (d("2024-01-02"), 50),
            (d("2024-01-03"), 105),
            (d("2024-01-03"), 110),
        ];
        let deduped = dedup_last_wins(&raw);
        assert_eq!(
            deduped,
            vec![(d("2024-01-02"), 50), (d("2024-01-03"), 110)]
        );
    }

    #[test]
    fn test_dedup_sorts_unordered_input() {
        let raw = vec![(d("2024-02-01"), 2.0), (d("2024-01-01"), 1.0)];
        let deduped = dedup_last_wins(&raw);
        assert_eq!(deduped[0].0, d("2024-01-01"));
        assert_eq!(deduped[1].0, d("2024-02-01"));
    }

    #[test]
    fn test_align_is_strict_inner_join() {
        let shares = vec![
            (d("2024-01-01"), 100),
            (d("2024-01-02"), 105),
            (d("2024-01-04"), 110),
        ];
        let closes = vec![
            (d("2024-01-02"), 10.0),
            (d("2024-01-03"), 11.0),
            (d("2024-01-04"), 12.0),
        ];
        let aligned = align(&shares, &closes);
        assert_eq!(aligned.len(), 2);
        assert_eq!(aligned[0].date, d("2024-01-02"));
        assert_eq!(aligned[0].shares, 105);
        assert_eq!(aligned[0].close, 10.0);
        assert_eq!(aligned[1].date, d("2024-01-04"));
        assert_eq!(aligned[1].shares, 110);
    }

    #[test]
    fn test_align_with_empty_series() {
        let shares = vec![(d("2024-01-01"), 100)];
        assert!(align(&shares, &[]).is_empty());
        assert!(align(&[], &[(d("2024-01-01"), 10.0)]).is_empty());
    }

    #[test]
    fn test_aligned_dates_strictly_increasing() {
        let shares = vec![(d("2024-01-01"), 1), (d("2024-01-02"), 2), (d("2024-01-03"), 3)];
        let closes = vec![(d("2024-01-03"), 3.0), (d("2024-01-01"), 1.0), (d("2024-01-02"), 2.0)];
        let aligned = align(&shares, &dedup_last_wins(&closes));
        assert!(aligned.windows(2).all(|w| w[0].date < w[1].date));
    }
}
