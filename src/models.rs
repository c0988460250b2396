use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDateTime;

pub type CustomerId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Customer {
    pub id: CustomerId,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub id: i64,
    pub order_number: i64,
    pub user_id: CustomerId,
    pub created_at: NaiveDateTime,
}

/// Activity of one cohort on a single day offset from signup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayBucket {
    pub unique_orderers: HashSet<CustomerId>,
    pub first_time_orders: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Cohort {
    pub label: String,
    pub max_days_from_create: i64,
    pub customers: HashMap<CustomerId, NaiveDateTime>,
    /// Customers seen ordering so far, scoped to this cohort only.
    pub has_ordered: HashSet<CustomerId>,
    pub buckets: BTreeMap<i64, DayBucket>,
}

impl Cohort {
    pub fn customer_count(&self) -> usize {
        self.customers.len()
    }
}
