use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::Path;

use chrono::{NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use csv::{ReaderBuilder, StringRecord};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::db::{self, Store};
use crate::error::ImportError;
use crate::models::{Customer, Order};

/// Reads a delimited file row by row, mapping each row through a transform.
pub struct Importer<R> {
    reader: csv::Reader<R>,
    headers: StringRecord,
    line: StringRecord,
}

impl Importer<File> {
    pub fn open(path: &Path) -> Result<Self, ImportError> {
        Self::from_reader(File::open(path)?)
    }
}

impl<R: io::Read> Importer<R> {
    pub fn from_reader(source: R) -> Result<Self, ImportError> {
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(source);
        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Err(ImportError::MissingHeader);
        }

        Ok(Self {
            reader,
            headers,
            line: StringRecord::new(),
        })
    }

    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    /// Returns `Ok(None)` once the input is exhausted.
    pub fn read_with<T, F>(&mut self, transform: F) -> Result<Option<T>, ImportError>
    where
        F: FnOnce(&StringRecord, &StringRecord) -> Result<T, ImportError>,
    {
        if !self.reader.read_record(&mut self.line)? {
            return Ok(None);
        }

        if self.line.len() != self.headers.len() {
            return Err(ImportError::RecordLengthMismatch {
                expected: self.headers.len(),
                actual: self.line.len(),
            });
        }

        transform(&self.headers, &self.line).map(Some)
    }

    pub fn read(&mut self) -> Result<Option<HashMap<String, String>>, ImportError> {
        self.read_with(default_transform)
    }
}

pub fn default_transform(
    headers: &StringRecord,
    line: &StringRecord,
) -> Result<HashMap<String, String>, ImportError> {
    Ok(headers
        .iter()
        .zip(line.iter())
        .map(|(header, value)| (header.to_string(), value.to_string()))
        .collect())
}

#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub datetime_format: String,
    pub timezone: Tz,
}

impl ImportSettings {
    /// Parses a UTC timestamp and returns its wall-clock time in the target zone.
    pub fn parse_timestamp(&self, value: &str) -> Result<NaiveDateTime, ImportError> {
        let parsed = NaiveDateTime::parse_from_str(value.trim(), &self.datetime_format)
            .map_err(|source| ImportError::InvalidTimestamp {
                value: value.to_string(),
                format: self.datetime_format.clone(),
                source,
            })?;

        Ok(Utc
            .from_utc_datetime(&parsed)
            .with_timezone(&self.timezone)
            .naive_local())
    }
}

#[derive(Debug, Deserialize)]
struct CustomerRow {
    id: i64,
    created: String,
}

#[derive(Debug, Deserialize)]
struct OrderRow {
    id: i64,
    order_number: i64,
    user_id: i64,
    created: String,
}

pub fn customer_transform(
    settings: &ImportSettings,
) -> impl Fn(&StringRecord, &StringRecord) -> Result<Customer, ImportError> + '_ {
    move |headers, line| {
        let row: CustomerRow = line
            .deserialize(Some(headers))
            .map_err(ImportError::InvalidRow)?;
        Ok(Customer {
            id: row.id,
            created_at: settings.parse_timestamp(&row.created)?,
        })
    }
}

pub fn order_transform(
    settings: &ImportSettings,
) -> impl Fn(&StringRecord, &StringRecord) -> Result<Order, ImportError> + '_ {
    move |headers, line| {
        let row: OrderRow = line
            .deserialize(Some(headers))
            .map_err(ImportError::InvalidRow)?;
        Ok(Order {
            id: row.id,
            order_number: row.order_number,
            user_id: row.user_id,
            created_at: settings.parse_timestamp(&row.created)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub rejected: usize,
    pub stopped_early: bool,
}

/// Pulls the next accepted record.
///
/// A single length mismatch is skipped; a second one before any other row is
/// read ends the import as if the input were exhausted. Rows with unparseable
/// fields are dropped and counted.
pub fn next_accepted<R, T, F>(
    importer: &mut Importer<R>,
    transform: &F,
    summary: &mut ImportSummary,
) -> Result<Option<T>, ImportError>
where
    R: io::Read,
    F: Fn(&StringRecord, &StringRecord) -> Result<T, ImportError>,
{
    let mut skipped_mismatch = false;
    loop {
        match importer.read_with(transform) {
            Ok(record) => return Ok(record),
            Err(err @ ImportError::RecordLengthMismatch { .. }) => {
                if skipped_mismatch {
                    warn!("{err}; stopping import");
                    summary.stopped_early = true;
                    return Ok(None);
                }
                warn!("{err}; skipping row");
                skipped_mismatch = true;
            }
            Err(err) if err.is_row_level() => {
                warn!("{err}; rejecting row");
                summary.rejected += 1;
                skipped_mismatch = false;
            }
            Err(err) => return Err(err),
        }
    }
}

pub async fn import_customers(
    store: &mut Store,
    path: &Path,
    settings: &ImportSettings,
) -> Result<ImportSummary, ImportError> {
    let mut importer = Importer::open(path)?;
    debug!(headers = ?importer.headers(), "reading customers from {}", path.display());
    let transform = customer_transform(settings);
    let mut summary = ImportSummary::default();

    while let Some(customer) = next_accepted(&mut importer, &transform, &mut summary)? {
        db::insert_customer(store, &customer).await?;
        summary.imported += 1;
    }

    info!(
        imported = summary.imported,
        rejected = summary.rejected,
        stopped_early = summary.stopped_early,
        "customers imported from {}",
        path.display()
    );
    Ok(summary)
}

pub async fn import_orders(
    store: &mut Store,
    path: &Path,
    settings: &ImportSettings,
) -> Result<ImportSummary, ImportError> {
    let mut importer = Importer::open(path)?;
    debug!(headers = ?importer.headers(), "reading orders from {}", path.display());
    let transform = order_transform(settings);
    let mut summary = ImportSummary::default();

    while let Some(order) = next_accepted(&mut importer, &transform, &mut summary)? {
        db::insert_order(store, &order).await?;
        summary.imported += 1;
    }

    info!(
        imported = summary.imported,
        rejected = summary.rejected,
        stopped_early = summary.stopped_early,
        "orders imported from {}",
        path.display()
    );
    Ok(summary)
}
