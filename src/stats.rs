// ============================================================================
// DERIVED STATISTICS
// ============================================================================
// Trailing-window comparisons computed on top of the store's range reads.
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::store::MetricStore;
use crate::timestamp::Timestamp;

/// Round to one decimal place, halves away from zero.
#[inline]
pub fn round_to_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Percent change from `previous` to `current`, rounded to one decimal.
///
/// A zero baseline yields 0 rather than an infinity.
pub fn percent_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    round_to_one_decimal((current - previous) / previous * 100.0)
}

/// Averages of two adjacent windows and the change between them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowComparison {
    pub current_avg: f64,
    pub previous_avg: f64,
    pub percent_change: f64,
}

/// Compare `[now - window, now]` against `[now - 2·window, now - window]`.
///
/// Both windows are inclusive, so a sample exactly at `now - window` counts
/// toward both.
pub fn compare_trailing_windows(
    store: &MetricStore,
    key: &str,
    now: Timestamp,
    window: Duration,
) -> WindowComparison {
    let boundary = now.sub_duration(window);
    let earliest = boundary.sub_duration(window);

    let current_avg = store.average_over(key, boundary, now);
    let previous_avg = store.average_over(key, earliest, boundary);

    WindowComparison {
        current_avg,
        previous_avg,
        percent_change: percent_change(current_avg, previous_avg),
    }
}

/// Percent change of the trailing window over the one before it.
pub fn trailing_change(store: &MetricStore, key: &str, now: Timestamp, window: Duration) -> f64 {
    compare_trailing_windows(store, key, now, window).percent_change
}

/// Trailing change for every `(display name, store key)` pair.
pub fn trailing_changes<'a, I>(
    store: &MetricStore,
    names: I,
    now: Timestamp,
    window: Duration,
) -> BTreeMap<String, f64>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    names
        .into_iter()
        .map(|(name, key)| (name.to_string(), trailing_change(store, key, now, window)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreSettings;
    use pretty_assertions::assert_eq;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_rounding_is_half_away_from_zero() {
        assert_eq!(round_to_one_decimal(12.25), 12.3);
        assert_eq!(round_to_one_decimal(-12.25), -12.3);
        assert_eq!(round_to_one_decimal(0.04), 0.0);
        assert_eq!(round_to_one_decimal(7.0), 7.0);
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(110.0, 100.0), 10.0);
        assert_eq!(percent_change(90.0, 100.0), -10.0);
        assert_eq!(percent_change(1.0, 3.0), -66.7);
        assert_eq!(percent_change(231.0, 230.0), 0.4);
    }

    #[test]
    fn test_zero_baseline() {
        assert_eq!(percent_change(50.0, 0.0), 0.0);
        assert_eq!(percent_change(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_trailing_windows() {
        let store = MetricStore::new(["voltage", "temp.CH1"], StoreSettings::default()).unwrap();
        let now = Timestamp::from_secs(1_735_689_600);

        // Previous hour averages 200, current hour averages 220
        store.write("voltage", 200.0, now.sub_duration(Duration::from_secs(5400)));
        store.write("voltage", 220.0, now.sub_duration(Duration::from_secs(1800)));

        let cmp = compare_trailing_windows(&store, "voltage", now, HOUR);
        assert_eq!(cmp.previous_avg, 200.0);
        assert_eq!(cmp.current_avg, 220.0);
        assert_eq!(cmp.percent_change, 10.0);

        // No history at all
        assert_eq!(trailing_change(&store, "temp.CH1", now, HOUR), 0.0);
    }

    #[test]
    fn test_empty_previous_window_is_zero() {
        let store = MetricStore::new(["voltage"], StoreSettings::default()).unwrap();
        let now = Timestamp::from_secs(1_735_689_600);
        store.write("voltage", 230.0, now);

        assert_eq!(trailing_change(&store, "voltage", now, HOUR), 0.0);
    }

    #[test]
    fn test_trailing_changes_by_name() {
        let store = MetricStore::new(["current_A"], StoreSettings::default()).unwrap();
        let now = Timestamp::from_secs(1_735_689_600);
        store.write("current_A", 4.0, now.sub_duration(Duration::from_secs(4000)));
        store.write("current_A", 5.0, now.sub_duration(Duration::from_secs(60)));

        let changes = trailing_changes(&store, [("current", "current_A"), ("voltage", "voltage")], now, HOUR);
        assert_eq!(changes.get("current"), Some(&25.0));
        assert_eq!(changes.get("voltage"), Some(&0.0));
    }
}
