use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Duration, NaiveDateTime, NaiveTime};
use sqlx::Row;
use tracing::{debug, info, warn};

use crate::db::{self, Filter, QueryOptions, Store, ORDERS};
use crate::error::StoreError;
use crate::models::{Cohort, Customer, CustomerId, DayBucket};
use crate::report::{self, HeaderSet};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Whole days between signup and order, rounded down.
pub fn day_offset(signup: NaiveDateTime, ordered: NaiveDateTime) -> i64 {
    (ordered - signup).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Folds orders, which must arrive in ascending creation time, into per-day
/// buckets. Returns the buckets and the largest offset seen.
pub fn accumulate<I>(
    orders: I,
    customers: &HashMap<CustomerId, NaiveDateTime>,
    has_ordered: &mut HashSet<CustomerId>,
) -> (BTreeMap<i64, DayBucket>, i64)
where
    I: IntoIterator<Item = (CustomerId, NaiveDateTime)>,
{
    let mut buckets: BTreeMap<i64, DayBucket> = BTreeMap::new();
    let mut max_days = 0;

    for (user_id, ordered_at) in orders {
        let Some(signup) = customers.get(&user_id) else {
            continue;
        };

        let mut offset = day_offset(*signup, ordered_at);
        if offset < 0 {
            warn!(
                user_id,
                %ordered_at,
                %signup,
                "order placed before signup; counting it on day 0"
            );
            offset = 0;
        }

        let bucket = buckets.entry(offset).or_default();
        bucket.unique_orderers.insert(user_id);
        max_days = max_days.max(offset);

        if has_ordered.insert(user_id) {
            bucket.first_time_orders += 1;
        }
    }

    (buckets, max_days)
}

pub async fn aggregate_orders(
    store: &mut Store,
    customers: &HashMap<CustomerId, NaiveDateTime>,
    filter: Filter,
    has_ordered: &mut HashSet<CustomerId>,
) -> Result<(BTreeMap<i64, DayBucket>, i64), StoreError> {
    // ascending creation time keeps first-time credit on the earliest order
    let rows = store
        .query(
            ORDERS,
            &["user_id", "created"],
            &QueryOptions {
                filter: Some(filter),
                order_by: Some("created"),
                ascending: true,
                ..QueryOptions::default()
            },
        )
        .await?;

    let mut orders: Vec<(CustomerId, NaiveDateTime)> = Vec::with_capacity(rows.len());
    for row in &rows {
        orders.push((row.try_get("user_id")?, row.try_get("created")?));
    }

    Ok(accumulate(orders, customers, has_ordered))
}

pub async fn build_cohort(
    store: &mut Store,
    members: &[Customer],
    label: String,
) -> Result<Cohort, StoreError> {
    let mut cohort = Cohort {
        label,
        ..Cohort::default()
    };
    cohort.customers = members
        .iter()
        .map(|customer| (customer.id, customer.created_at))
        .collect();

    if members.is_empty() {
        return Ok(cohort);
    }

    let filter = Filter::AnyOf {
        column: "user_id",
        values: members.iter().map(|customer| customer.id).collect(),
    };
    let mut has_ordered = HashSet::new();
    let (buckets, max_days) =
        aggregate_orders(store, &cohort.customers, filter, &mut has_ordered).await?;

    cohort.has_ordered = has_ordered;
    cohort.buckets = buckets;
    cohort.max_days_from_create = max_days;
    Ok(cohort)
}

pub fn week_label(week_start: NaiveDateTime) -> String {
    let last_day = week_start + Duration::days(report::WINDOW_DAYS - 1);
    format!(
        "{}-{}",
        week_start.format("%m/%d/%Y"),
        last_day.format("%m/%d/%Y")
    )
}

/// Walks signup weeks from the midnight before `earliest` until a week starts
/// after `latest`. The first returned row is the accumulated header row.
pub async fn cohort_weeks(
    store: &mut Store,
    earliest: NaiveDateTime,
    latest: NaiveDateTime,
) -> Result<Vec<Vec<String>>, StoreError> {
    let mut headers = HeaderSet::new();
    let mut rows = Vec::new();
    let mut week_start = earliest.date().and_time(NaiveTime::MIN);

    while week_start <= latest {
        let week_end = week_start + Duration::days(report::WINDOW_DAYS);
        let members = db::fetch_customers_between(store, week_start, week_end).await?;
        let cohort = build_cohort(store, &members, week_label(week_start)).await?;
        debug!(
            cohort = %cohort.label,
            customers = cohort.customer_count(),
            orderers = cohort.has_ordered.len(),
            max_days = cohort.max_days_from_create,
            "cohort aggregated"
        );

        rows.extend(report::cohort_rows(&cohort, &mut headers));
        week_start = week_end;
    }

    debug!(columns = headers.len(), "header row assembled");
    rows.insert(0, headers.values());
    Ok(rows)
}

pub async fn generate_report(store: &mut Store) -> Result<Vec<Vec<String>>, StoreError> {
    let Some((earliest, latest)) = db::signup_bounds(store).await? else {
        info!("no customers found; report has headers only");
        let mut headers = HeaderSet::new();
        headers.add("Cohort").add("Customers");
        return Ok(vec![headers.values()]);
    };

    info!(%earliest, %latest, "aggregating data");
    cohort_weeks(store, earliest, latest).await
}
