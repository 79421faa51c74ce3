#[cfg(test)]
mod tests {
    use super::super::indicators::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use market_core::PriceBar;

    // Classic RSI textbook closes
    fn sample_prices() -> Vec<f64> {
        vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 45.61, 46.28, 46.28, 46.00, 46.03, 46.41, 46.22, 45.64,
        ]
    }

    // Deterministic wave with drift, long enough for every indicator
    fn wave(len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| {
                let t = i as f64;
                100.0 + t * 0.15 + (t / 3.0).sin() * 4.0 + (t / 11.0).cos() * 2.5
            })
            .collect()
    }

    fn bars_from(closes: &[f64]) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                date: start + chrono::Duration::days(i as i64),
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1_000_000 + (i as u64 % 7) * 10_000,
            })
            .collect()
    }

    // Recomputes the MACD signal the slow way: one EMA pair per prefix.
    fn naive_macd(data: &[f64]) -> Option<(f64, f64)> {
        let line = ema(data, 12)? - ema(data, 26)?;
        let mut history = Vec::new();
        for i in 26..data.len() {
            let prefix = &data[..=i];
            if let (Some(f), Some(s)) = (ema(prefix, 12), ema(prefix, 26)) {
                history.push(f - s);
            }
        }
        Some((line, ema(&history, 9)?))
    }

    #[test]
    fn test_sma_basic() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(sma(&data, 3), Some(4.0)); // last three: (3+4+5)/3
        assert_eq!(sma(&data, 5), Some(3.0));
    }

    #[test]
    fn test_sma_insufficient_data() {
        assert_eq!(sma(&[1.0, 2.0], 3), None);
        assert_eq!(sma(&[], 1), None);
        assert_eq!(sma(&[1.0], 0), None);
    }

    #[test]
    fn test_ema_seed_and_recurrence() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        // seed 2.0, multiplier 0.5: 4 -> 3.0, 5 -> 4.0
        assert_eq!(ema(&data[..3], 3), Some(2.0));
        assert_eq!(ema(&data, 3), Some(4.0));
        assert_eq!(ema_series(&data, 3), vec![2.0, 3.0, 4.0]);
        assert_eq!(ema(&data[..2], 3), None);
    }

    #[test]
    fn test_ema_series_matches_prefix_ema() {
        let data = wave(60);
        let series = ema_series(&data, 12);
        for (j, value) in series.iter().enumerate() {
            assert_eq!(Some(*value), ema(&data[..12 + j], 12));
        }
    }

    #[test]
    fn test_rsi_all_gains_is_exactly_100() {
        let data: Vec<f64> = (0..20).map(|i| 10.0 + i as f64).collect();
        assert_eq!(rsi(&data, 14), Some(100.0));

        // Flat windows have no losses either.
        assert_eq!(rsi(&[5.0; 16], 14), Some(100.0));
    }

    #[test]
    fn test_rsi_balanced_moves() {
        let data = vec![1.0, 2.0, 1.0, 2.0, 1.0];
        assert_relative_eq!(rsi(&data, 2).unwrap(), 50.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rsi_requires_more_than_period_points() {
        let data = sample_prices();
        assert_eq!(rsi(&data[..14], 14), None);
        assert!(rsi(&data[..15], 14).is_some());
    }

    #[test]
    fn test_rsi_bounds() {
        let rsi_value = rsi(&sample_prices(), 14).unwrap();
        assert!((0.0..=100.0).contains(&rsi_value));

        let falling: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        assert_eq!(rsi(&falling, 14), Some(0.0));
    }

    #[test]
    fn test_macd_insufficient_data() {
        // slow EMA needs 26, the signal needs 9 more history points past index 26
        assert!(macd_default(&wave(25)).is_none());
        assert!(macd_default(&wave(34)).is_none());
        assert!(macd_default(&wave(35)).is_some());
    }

    #[test]
    fn test_macd_matches_prefix_recomputation_exactly() {
        for len in [35, 36, 60, 251] {
            let data = wave(len);
            let fast = macd_default(&data).unwrap();
            let (line, signal) = naive_macd(&data).unwrap();
            assert_eq!(fast.line, line, "line differs at len {}", len);
            assert_eq!(fast.signal, signal, "signal differs at len {}", len);
            assert_eq!(fast.histogram, line - signal);
        }
    }

    #[test]
    fn test_macd_rejects_bad_periods() {
        assert!(macd(&wave(100), 26, 12, 9).is_none());
        assert!(macd(&wave(100), 12, 26, 0).is_none());
    }

    #[test]
    fn test_bollinger_population_std() {
        let data = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let bands = bollinger(&data, 8, 2.0).unwrap();
        assert_relative_eq!(bands.middle, 5.0);
        assert_relative_eq!(bands.upper, 9.0);
        assert_relative_eq!(bands.lower, 1.0);
    }

    #[test]
    fn test_bollinger_flat_series_collapses() {
        let bands = bollinger(&[50.0; 20], 20, 2.0).unwrap();
        assert_eq!(bands.upper, 50.0);
        assert_eq!(bands.lower, 50.0);
        assert!(bollinger(&[50.0; 19], 20, 2.0).is_none());
    }

    #[test]
    fn test_average_volume_and_spike() {
        let volumes = vec![100u64; 20];
        assert_eq!(average_volume(&volumes, 20), Some(100.0));
        assert!(is_volume_above_average(151, &volumes, 20));
        assert!(!is_volume_above_average(150, &volumes, 20));
        assert!(!is_volume_above_average(1_000, &volumes[..5], 20));
    }

    #[test]
    fn test_bundle_with_full_history() {
        let bundle = compute_bundle(&bars_from(&wave(250)));
        assert!(bundle.sma20.is_some());
        assert!(bundle.sma50.is_some());
        assert!(bundle.sma200.is_some());
        assert!(bundle.rsi14.is_some());
        assert!(bundle.macd.is_some());
        assert!(bundle.bollinger.is_some());
        assert!(bundle.average_volume20.is_some());
    }

    #[test]
    fn test_bundle_with_short_history() {
        let bundle = compute_bundle(&bars_from(&wave(30)));
        assert!(bundle.sma20.is_some());
        assert!(bundle.rsi14.is_some());
        assert!(bundle.sma50.is_none());
        assert!(bundle.sma200.is_none());
        assert!(bundle.macd.is_none());

        let empty = compute_bundle(&[]);
        assert_eq!(empty, Default::default());
    }
}
