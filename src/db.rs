use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{ConnectOptions, QueryBuilder, Row, Sqlite};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::{Customer, Order};

pub const CUSTOMERS: &str = "customers";
pub const ORDERS: &str = "orders";

const CUSTOMER_SCHEMA: &[(&str, &str)] = &[
    ("id", "INTEGER NOT NULL PRIMARY KEY"),
    ("created", "DATETIME NOT NULL"),
];

const ORDER_SCHEMA: &[(&str, &str)] = &[
    ("id", "INTEGER NOT NULL PRIMARY KEY"),
    ("order_number", "INTEGER NOT NULL"),
    ("user_id", "INTEGER NOT NULL"),
    ("created", "DATETIME NOT NULL"),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Integer(i64),
    DateTime(NaiveDateTime),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `column >= from AND column < until`
    Range {
        column: &'static str,
        from: NaiveDateTime,
        until: NaiveDateTime,
    },
    AnyOf {
        column: &'static str,
        values: Vec<i64>,
    },
}

impl Filter {
    fn push_to(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            Filter::Range {
                column,
                from,
                until,
            } => {
                builder
                    .push(*column)
                    .push(" >= ")
                    .push_bind(*from)
                    .push(" AND ")
                    .push(*column)
                    .push(" < ")
                    .push_bind(*until);
            }
            Filter::AnyOf { column, values } => {
                builder.push(*column).push(" IN (");
                let mut list = builder.separated(", ");
                for value in values {
                    list.push_bind(*value);
                }
                list.push_unseparated(")");
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub filter: Option<Filter>,
    pub order_by: Option<&'static str>,
    pub ascending: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// A single SQLite connection reused for every statement of a run.
pub struct Store {
    conn: SqliteConnection,
}

impl Store {
    pub async fn open(path: &Path, reset: bool) -> Result<Self, StoreError> {
        if reset && path.exists() {
            std::fs::remove_file(path)?;
            info!("removed existing database at {}", path.display());
        }

        let conn = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .connect()
            .await?;

        Ok(Self { conn })
    }

    pub async fn in_memory() -> Result<Self, StoreError> {
        let conn = SqliteConnectOptions::from_str("sqlite::memory:")?
            .connect()
            .await?;
        Ok(Self { conn })
    }

    pub async fn create_table(
        &mut self,
        name: &str,
        columns: &[(&str, &str)],
    ) -> Result<(), StoreError> {
        let definitions = columns
            .iter()
            .map(|(column, definition)| format!("{column} {definition}"))
            .collect::<Vec<_>>()
            .join(", ");
        let statement = format!("CREATE TABLE IF NOT EXISTS {name} ({definitions})");

        sqlx::query(&statement).execute(&mut self.conn).await?;
        debug!(table = name, "table ready");
        Ok(())
    }

    pub async fn insert(&mut self, table: &str, values: &[Value]) -> Result<(), StoreError> {
        let mut builder = QueryBuilder::<Sqlite>::new("INSERT INTO ");
        builder.push(table).push(" VALUES (");
        let mut list = builder.separated(", ");
        for value in values {
            match value {
                Value::Integer(number) => list.push_bind(*number),
                Value::DateTime(datetime) => list.push_bind(*datetime),
            };
        }
        list.push_unseparated(")");

        builder.build().execute(&mut self.conn).await?;
        Ok(())
    }

    /// Runs a select and fetches every row, so the cursor is released on return.
    pub async fn query(
        &mut self,
        table: &str,
        columns: &[&str],
        options: &QueryOptions,
    ) -> Result<Vec<SqliteRow>, StoreError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT ");
        builder.push(columns.join(", ")).push(" FROM ").push(table);

        if let Some(filter) = &options.filter {
            builder.push(" WHERE ");
            filter.push_to(&mut builder);
        }

        if let Some(column) = options.order_by {
            builder
                .push(" ORDER BY ")
                .push(column)
                .push(if options.ascending { " ASC" } else { " DESC" });
        }

        match (options.limit, options.offset) {
            (Some(limit), offset) => {
                builder.push(" LIMIT ").push_bind(limit);
                if let Some(offset) = offset {
                    builder.push(" OFFSET ").push_bind(offset);
                }
            }
            (None, Some(offset)) => {
                builder.push(" LIMIT -1 OFFSET ").push_bind(offset);
            }
            (None, None) => {}
        }

        let rows = builder.build().fetch_all(&mut self.conn).await?;
        Ok(rows)
    }
}

pub async fn ensure_schema(store: &mut Store) -> Result<(), StoreError> {
    store.create_table(CUSTOMERS, CUSTOMER_SCHEMA).await?;
    store.create_table(ORDERS, ORDER_SCHEMA).await?;
    Ok(())
}

pub async fn insert_customer(store: &mut Store, customer: &Customer) -> Result<(), StoreError> {
    store
        .insert(
            CUSTOMERS,
            &[
                Value::Integer(customer.id),
                Value::DateTime(customer.created_at),
            ],
        )
        .await
}

pub async fn insert_order(store: &mut Store, order: &Order) -> Result<(), StoreError> {
    store
        .insert(
            ORDERS,
            &[
                Value::Integer(order.id),
                Value::Integer(order.order_number),
                Value::Integer(order.user_id),
                Value::DateTime(order.created_at),
            ],
        )
        .await
}

pub fn customer_from_row(row: &SqliteRow) -> Result<Customer, sqlx::Error> {
    Ok(Customer {
        id: row.try_get("id")?,
        created_at: row.try_get("created")?,
    })
}

async fn edge_signup(store: &mut Store, ascending: bool) -> Result<Option<Customer>, StoreError> {
    let rows = store
        .query(
            CUSTOMERS,
            &["id", "created"],
            &QueryOptions {
                order_by: Some("created"),
                ascending,
                limit: Some(1),
                ..QueryOptions::default()
            },
        )
        .await?;

    match rows.first() {
        Some(row) => Ok(Some(customer_from_row(row)?)),
        None => Ok(None),
    }
}

/// Earliest and latest signup timestamps, or `None` for an empty customer table.
pub async fn signup_bounds(
    store: &mut Store,
) -> Result<Option<(NaiveDateTime, NaiveDateTime)>, StoreError> {
    let Some(first) = edge_signup(store, true).await? else {
        return Ok(None);
    };
    let last = edge_signup(store, false).await?.unwrap_or(first);
    Ok(Some((first.created_at, last.created_at)))
}

pub async fn fetch_customers_between(
    store: &mut Store,
    from: NaiveDateTime,
    until: NaiveDateTime,
) -> Result<Vec<Customer>, StoreError> {
    let rows = store
        .query(
            CUSTOMERS,
            &["id", "created"],
            &QueryOptions {
                filter: Some(Filter::Range {
                    column: "created",
                    from,
                    until,
                }),
                order_by: Some("created"),
                ascending: true,
                ..QueryOptions::default()
            },
        )
        .await?;

    let mut customers = Vec::with_capacity(rows.len());
    for row in &rows {
        customers.push(customer_from_row(row)?);
    }
    Ok(customers)
}
