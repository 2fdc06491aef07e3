//! Transaction repository.
//!
//! Presence of a row IS the seen-set: a stored transaction id is never
//! announced again, regardless of which poll cycles re-fetch it.

#![allow(dead_code)]

use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;
use tracing::debug;

use crate::data::models::Transaction;

use super::StoreError;

#[derive(Debug, FromRow)]
struct TransactionRow {
    transaction_id: i64,
    person_name: String,
    from_team_id: Option<i64>,
    from_team: Option<String>,
    to_team_id: Option<i64>,
    to_team: Option<String>,
    transaction_date: NaiveDate,
    effective_date: Option<NaiveDate>,
    type_code: String,
    type_description: String,
    description: String,
}

impl From<TransactionRow> for Transaction {
    fn from(row: TransactionRow) -> Self {
        Transaction {
            transaction_id: row.transaction_id,
            person_name: row.person_name,
            from_team_id: row.from_team_id,
            from_team: row.from_team,
            to_team_id: row.to_team_id,
            to_team: row.to_team,
            transaction_date: row.transaction_date,
            effective_date: row.effective_date,
            type_code: row.type_code,
            type_description: row.type_description,
            description: row.description,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransactionStore {
    pool: SqlitePool,
}

impl TransactionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record every transaction in a fetched batch as seen. Records are
    /// immutable after first sighting, so conflicts are ignored and the
    /// call is idempotent.
    pub async fn upsert_all(&self, transactions: &[Transaction]) -> Result<(), StoreError> {
        for tx in transactions {
            sqlx::query(
                "INSERT INTO transactions (transaction_id, person_name, from_team_id, from_team, \
                 to_team_id, to_team, transaction_date, effective_date, type_code, \
                 type_description, description, first_seen_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
                 ON CONFLICT(transaction_id) DO NOTHING",
            )
            .bind(tx.transaction_id)
            .bind(&tx.person_name)
            .bind(tx.from_team_id)
            .bind(&tx.from_team)
            .bind(tx.to_team_id)
            .bind(&tx.to_team)
            .bind(tx.transaction_date)
            .bind(tx.effective_date)
            .bind(&tx.type_code)
            .bind(&tx.type_description)
            .bind(&tx.description)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        }

        debug!(count = transactions.len(), "Recorded transactions as seen");
        Ok(())
    }

    /// Which of the given ids are already seen.
    pub async fn known_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, StoreError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let placeholders = (1..=ids.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql =
            format!("SELECT transaction_id FROM transactions WHERE transaction_id IN ({placeholders})");

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for id in ids {
            query = query.bind(id);
        }

        let known = query.fetch_all(&self.pool).await?;
        Ok(known.into_iter().collect())
    }

    pub async fn is_seen(&self, id: i64) -> Result<bool, StoreError> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT transaction_id FROM transactions WHERE transaction_id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    /// Most recently dated stored transactions, newest first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT transaction_id, person_name, from_team_id, from_team, to_team_id, to_team, \
             transaction_date, effective_date, type_code, type_description, description \
             FROM transactions \
             ORDER BY transaction_date DESC, transaction_id DESC \
             LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Transaction::from).collect())
    }
}
