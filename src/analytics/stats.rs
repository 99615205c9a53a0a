use serde::Serialize;

/// Price summary over one group of listings, in 10k-won units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceStats {
    pub count: usize,
    pub min: i64,
    pub max: i64,
    pub median: f64,
}

impl PriceStats {
    /// `None` for an empty group.
    pub fn from_prices(prices: &[i64]) -> Option<Self> {
        let mut sorted = prices.to_vec();
        sorted.sort_unstable();
        let median = median_sorted(&sorted)?;
        Some(Self {
            count: sorted.len(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            median,
        })
    }
}

/// Even counts average the two middle values.
fn median_sorted(sorted: &[i64]) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2] as f64),
        _ => Some((sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn median(prices: &[i64]) -> Option<f64> {
        PriceStats::from_prices(prices).map(|s| s.median)
    }

    #[test]
    fn test_median_even_count_averages_middle_pair() {
        assert_eq!(median(&[400, 100, 300, 200]), Some(250.0));
    }

    #[test]
    fn test_median_odd_and_empty() {
        assert_eq!(median(&[5, 1, 3]), Some(3.0));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_stats_from_prices() {
        let stats = PriceStats::from_prices(&[120_000, 95_000, 110_000, 101_000]).unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.min, 95_000);
        assert_eq!(stats.max, 120_000);
        assert_eq!(stats.median, 105_500.0);
        assert!(PriceStats::from_prices(&[]).is_none());
    }
}
