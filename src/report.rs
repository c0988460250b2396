use std::collections::HashSet;

use crate::models::Cohort;

pub const WINDOW_DAYS: i64 = 7;

/// Column names in first-seen order; re-adding a name is a no-op.
#[derive(Debug, Clone, Default)]
pub struct HeaderSet {
    values: Vec<String>,
    seen: HashSet<String>,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        if !self.contains(&value) {
            self.seen.insert(value.clone());
            self.values.push(value);
        }
        self
    }

    pub fn contains(&self, value: &str) -> bool {
        self.seen.contains(value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> Vec<String> {
        self.values.clone()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowStats {
    pub start: i64,
    pub end: i64,
    pub unique_orderers: usize,
    pub first_time_orders: usize,
}

/// Sums a cohort's day buckets into fixed windows `[0,6]`, `[7,13]`, ... up to
/// the last window holding `max_days_from_create`.
pub fn window_stats(cohort: &Cohort) -> Vec<WindowStats> {
    let mut windows = Vec::new();
    let mut start = 0;
    while start <= cohort.max_days_from_create {
        let end = start + WINDOW_DAYS - 1;
        let mut stats = WindowStats {
            start,
            end,
            ..WindowStats::default()
        };
        for bucket in cohort.buckets.range(start..=end).map(|(_, bucket)| bucket) {
            stats.unique_orderers += bucket.unique_orderers.len();
            stats.first_time_orders += bucket.first_time_orders;
        }
        windows.push(stats);
        start += WINDOW_DAYS;
    }
    windows
}

pub fn format_stat(count: usize, customers: usize, label: &str) -> String {
    if count == 0 || customers == 0 {
        return format!("0% {label} ({count})");
    }
    let percentage = count as f64 / customers as f64 * 100.0;
    format!("{percentage:.2}% {label} ({count})")
}

/// Renders the orderers row and the first-time row for one cohort, registering
/// every window label it uses in `headers`.
pub fn cohort_rows(cohort: &Cohort, headers: &mut HeaderSet) -> [Vec<String>; 2] {
    headers.add("Cohort").add("Customers");

    let customers = cohort.customer_count();
    let mut orderers = vec![cohort.label.clone(), format!("{customers} customers")];
    let mut first_time = vec![String::new(), String::new()];

    for window in window_stats(cohort) {
        headers.add(format!("{}-{}", window.start, window.end));
        orderers.push(format_stat(window.unique_orderers, customers, "orderers"));
        first_time.push(format_stat(window.first_time_orders, customers, "1st time"));
    }

    [orderers, first_time]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DayBucket;
    use chrono::NaiveDateTime;

    fn cohort_with(customers: i64, activity: &[(i64, Vec<i64>, usize)]) -> Cohort {
        let mut cohort = Cohort {
            label: "06/19/2015-06/25/2015".to_string(),
            ..Cohort::default()
        };
        for id in 0..customers {
            cohort.customers.insert(id, NaiveDateTime::default());
        }
        for (offset, orderers, first_time) in activity {
            cohort.buckets.insert(
                *offset,
                DayBucket {
                    unique_orderers: orderers.iter().copied().collect(),
                    first_time_orders: *first_time,
                },
            );
            cohort.max_days_from_create = cohort.max_days_from_create.max(*offset);
        }
        cohort
    }

    #[test]
    fn header_set_keeps_first_seen_order() {
        let mut headers = HeaderSet::new();
        headers.add("Cohort").add("Customers").add("0-6").add("Cohort");

        assert_eq!(headers.len(), 3);
        assert!(headers.contains("0-6"));
        assert!(!headers.contains("7-13"));
        assert_eq!(headers.values(), vec!["Cohort", "Customers", "0-6"]);
    }

    #[test]
    fn windows_use_fixed_boundaries() {
        let cohort = cohort_with(4, &[(6, vec![0], 1), (7, vec![1], 1), (20, vec![0, 1], 0)]);
        let windows = window_stats(&cohort);

        let bounds: Vec<(i64, i64)> = windows.iter().map(|w| (w.start, w.end)).collect();
        assert_eq!(bounds, vec![(0, 6), (7, 13), (14, 20)]);
        assert_eq!(windows[0].unique_orderers, 1);
        assert_eq!(windows[1].unique_orderers, 1);
        assert_eq!(windows[2].unique_orderers, 2);
        assert_eq!(windows[2].first_time_orders, 0);
    }

    #[test]
    fn idle_cohort_still_reports_first_window() {
        let cohort = cohort_with(3, &[]);
        let mut headers = HeaderSet::new();
        let [orderers, first_time] = cohort_rows(&cohort, &mut headers);

        assert_eq!(
            orderers,
            vec!["06/19/2015-06/25/2015", "3 customers", "0% orderers (0)"]
        );
        assert_eq!(first_time, vec!["", "", "0% 1st time (0)"]);
        assert_eq!(headers.values(), vec!["Cohort", "Customers", "0-6"]);
    }

    #[test]
    fn formats_percentages_with_two_decimals() {
        let cohort = cohort_with(3, &[(0, vec![0], 1), (2, vec![1], 1), (15, vec![0], 0)]);
        let mut headers = HeaderSet::new();
        let [orderers, first_time] = cohort_rows(&cohort, &mut headers);

        assert_eq!(
            orderers[2..],
            ["66.67% orderers (2)", "0% orderers (0)", "33.33% orderers (1)"]
        );
        assert_eq!(
            first_time[2..],
            ["66.67% 1st time (2)", "0% 1st time (0)", "0% 1st time (0)"]
        );
    }

    #[test]
    fn headers_accumulate_across_cohorts() {
        let mut headers = HeaderSet::new();
        cohort_rows(&cohort_with(2, &[(9, vec![0], 1)]), &mut headers);
        let [short, _] = cohort_rows(&cohort_with(2, &[(1, vec![1], 1)]), &mut headers);

        assert_eq!(headers.values(), vec!["Cohort", "Customers", "0-6", "7-13"]);
        assert_eq!(short.len(), 3);
    }
}
