use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel::SqliteConnection;
use log::{debug, warn};

use vnmarket_core::errors::Error;
use vnmarket_core::history::{DateCoverage, HistoryCategoryStats, HistoryStore};
use vnmarket_core::Result;
use vnmarket_market_data::{AssetCategory, HistoricalRecord};

use super::model::{HistoricalRecordDB, HistoryStatsRow};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::historical_records;
use crate::utils::{format_date, format_timestamp, parse_date};

const STATS_QUERY: &str = "
    SELECT asset_type,
           COUNT(DISTINCT symbol) AS symbols,
           SUM(CASE WHEN close IS NOT NULL THEN 1 ELSE 0 END) AS records,
           SUM(CASE WHEN close IS NULL THEN 1 ELSE 0 END) AS markers,
           MIN(CASE WHEN close IS NOT NULL THEN date END) AS earliest,
           MAX(CASE WHEN close IS NOT NULL THEN date END) AS latest
    FROM historical_records
    GROUP BY asset_type
    ORDER BY asset_type";

/// A stored record that disagrees with an incoming one.
#[derive(Debug)]
struct Conflict {
    date: String,
    detail: String,
}

#[derive(Debug, Default)]
struct UpsertOutcome {
    written: usize,
    unchanged: usize,
    conflicts: Vec<Conflict>,
}

pub struct HistoryRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl HistoryRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    /// Fill gaps only. Runs inside the writer's transaction.
    fn upsert_rows(conn: &mut SqliteConnection, rows: Vec<HistoricalRecordDB>) -> Result<UpsertOutcome> {
        let mut outcome = UpsertOutcome::default();
        let (Some(first), Some(last)) = (
            rows.iter().map(|r| r.date.as_str()).min(),
            rows.iter().map(|r| r.date.as_str()).max(),
        ) else {
            return Ok(outcome);
        };

        let symbol = rows[0].symbol.clone();
        let asset_type = rows[0].asset_type.clone();
        let mut existing: HashMap<String, HistoricalRecordDB> = historical_records::table
            .filter(historical_records::symbol.eq(&symbol))
            .filter(historical_records::asset_type.eq(&asset_type))
            .filter(historical_records::date.between(first, last))
            .select(HistoricalRecordDB::as_select())
            .load::<HistoricalRecordDB>(conn)
            .map_err(StorageError::from)?
            .into_iter()
            .map(|row| (row.date.clone(), row))
            .collect();

        for row in rows {
            match existing.get(&row.date) {
                None => {
                    outcome.written += diesel::insert_into(historical_records::table)
                        .values(&row)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Some(stored) if stored.is_marker() => {
                    outcome.written += diesel::update(
                        historical_records::table
                            .filter(historical_records::symbol.eq(&row.symbol))
                            .filter(historical_records::asset_type.eq(&row.asset_type))
                            .filter(historical_records::date.eq(&row.date)),
                    )
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                }
                Some(stored) => {
                    let differences = stored.differences(&row);
                    if differences.is_empty() {
                        outcome.unchanged += 1;
                    } else {
                        outcome.conflicts.push(Conflict {
                            date: row.date.clone(),
                            detail: differences.join(", "),
                        });
                    }
                    continue;
                }
            }
            // A batch may repeat a date; the first copy is the one compared against
            existing.insert(row.date.clone(), row);
        }

        Ok(outcome)
    }
}

#[async_trait]
impl HistoryStore for HistoryRepository {
    async fn get_records(
        &self,
        symbol: &str,
        category: AssetCategory,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = historical_records::table
            .filter(historical_records::symbol.eq(symbol))
            .filter(historical_records::asset_type.eq(category.as_str()))
            .filter(historical_records::date.between(format_date(start), format_date(end)))
            .filter(historical_records::close.is_not_null())
            .order(historical_records::date.asc())
            .select(HistoricalRecordDB::as_select())
            .load::<HistoricalRecordDB>(&mut conn)
            .map_err(StorageError::from)?;

        rows.into_iter().map(HistoricalRecord::try_from).collect()
    }

    async fn upsert_records(
        &self,
        symbol: &str,
        category: AssetCategory,
        records: &[HistoricalRecord],
    ) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let now = format_timestamp(Utc::now());
        let rows = records
            .iter()
            .map(|r| HistoricalRecordDB::from_record(symbol, category, r, &now))
            .collect::<Result<Vec<_>>>()?;

        let outcome = self
            .writer
            .exec(move |conn: &mut SqliteConnection| Self::upsert_rows(conn, rows))
            .await?;

        debug!(
            "History upsert {} {}: {} written, {} unchanged, {} conflicting",
            symbol,
            category,
            outcome.written,
            outcome.unchanged,
            outcome.conflicts.len()
        );

        for conflict in &outcome.conflicts {
            warn!(
                "Data integrity conflict for {} {} on {}: {}",
                symbol, category, conflict.date, conflict.detail
            );
        }

        match outcome.conflicts.into_iter().next() {
            None => Ok(outcome.written),
            Some(first) => Err(Error::DataIntegrityConflict {
                symbol: symbol.to_string(),
                category,
                date: parse_date(&first.date)?,
                detail: first.detail,
            }),
        }
    }

    async fn date_coverage(
        &self,
        symbol: &str,
        category: AssetCategory,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, DateCoverage>> {
        let mut conn = get_connection(&self.pool)?;
        let rows: Vec<(String, Option<f64>)> = historical_records::table
            .filter(historical_records::symbol.eq(symbol))
            .filter(historical_records::asset_type.eq(category.as_str()))
            .filter(historical_records::date.between(format_date(start), format_date(end)))
            .select((historical_records::date, historical_records::close))
            .load(&mut conn)
            .map_err(StorageError::from)?;

        let mut coverage: BTreeMap<NaiveDate, DateCoverage> = start
            .iter_days()
            .take_while(|d| *d <= end)
            .map(|d| (d, DateCoverage::Unknown))
            .collect();

        for (raw, close) in rows {
            let state = if close.is_some() {
                DateCoverage::Present
            } else {
                DateCoverage::ConfirmedAbsent
            };
            coverage.insert(parse_date(&raw)?, state);
        }
        Ok(coverage)
    }

    async fn mark_absent(
        &self,
        symbol: &str,
        category: AssetCategory,
        dates: &[NaiveDate],
    ) -> Result<usize> {
        if dates.is_empty() {
            return Ok(0);
        }
        let now = format_timestamp(Utc::now());
        let markers: Vec<HistoricalRecordDB> = dates
            .iter()
            .map(|d| HistoricalRecordDB::marker(symbol, category, &format_date(*d), &now))
            .collect();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let mut written = 0;
                for marker in &markers {
                    written += diesel::insert_or_ignore_into(historical_records::table)
                        .values(marker)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(written)
            })
            .await
    }

    async fn latest_record_within(
        &self,
        symbol: &str,
        category: AssetCategory,
        lookback_start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<HistoricalRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let row = historical_records::table
            .filter(historical_records::symbol.eq(symbol))
            .filter(historical_records::asset_type.eq(category.as_str()))
            .filter(
                historical_records::date.between(format_date(lookback_start), format_date(end)),
            )
            .filter(historical_records::close.is_not_null())
            .order(historical_records::date.desc())
            .select(HistoricalRecordDB::as_select())
            .first::<HistoricalRecordDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;

        row.map(HistoricalRecord::try_from).transpose()
    }

    async fn history_stats(&self) -> Result<Vec<HistoryCategoryStats>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = diesel::sql_query(STATS_QUERY)
            .load::<HistoryStatsRow>(&mut conn)
            .map_err(StorageError::from)?;

        let mut stats = Vec::with_capacity(rows.len());
        for row in rows {
            let Ok(category) = row.asset_type.parse::<AssetCategory>() else {
                warn!("Ignoring history rows with unknown asset type {}", row.asset_type);
                continue;
            };
            stats.push(HistoryCategoryStats {
                category,
                symbols: row.symbols as u64,
                records: row.records as u64,
                markers: row.markers as u64,
                earliest: row.earliest.as_deref().map(parse_date).transpose()?,
                latest: row.latest.as_deref().map(parse_date).transpose()?,
            });
        }
        Ok(stats)
    }
}
