// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pilot records in the race database.

use crate::error::{retry_once, StoreError};
use futures::{Stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

/// A pilot registered for racing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pilot {
    pub id: i64,
    pub callsign: String,
    pub name: Option<String>,
    pub phonetic: Option<String>,
}

impl Pilot {
    /// Serialize as one newline-delimited JSON record, the format the
    /// pilot streaming endpoint emits.
    pub fn to_line(&self) -> Result<Vec<u8>, StoreError> {
        let mut line = serde_json::to_vec(self)
            .map_err(|e| StoreError::Corrupt(format!("pilot serialization: {e}")))?;
        line.push(b'\n');
        Ok(line)
    }
}

/// Fields for a new pilot.
#[derive(Debug, Clone, Default)]
pub struct NewPilot {
    pub callsign: String,
    pub name: Option<String>,
    pub phonetic: Option<String>,
}

/// Pilot record store.
#[derive(Clone)]
pub struct PilotStore {
    pool: SqlitePool,
}

impl PilotStore {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: NewPilot) -> Result<Pilot, StoreError> {
        let result = sqlx::query("INSERT INTO pilots (callsign, name, phonetic) VALUES (?1, ?2, ?3)")
            .bind(&new.callsign)
            .bind(&new.name)
            .bind(&new.phonetic)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_insert)?;
        Ok(Pilot {
            id: result.last_insert_rowid(),
            callsign: new.callsign,
            name: new.name,
            phonetic: new.phonetic,
        })
    }

    pub async fn by_id(&self, id: i64) -> Result<Option<Pilot>, StoreError> {
        let row = retry_once(|| async {
            sqlx::query("SELECT id, callsign, name, phonetic FROM pilots WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
        })
        .await?;
        row.as_ref().map(row_to_pilot).transpose()
    }

    pub async fn alter(&self, pilot: &Pilot) -> Result<(), StoreError> {
        retry_once(|| async {
            sqlx::query("UPDATE pilots SET callsign = ?1, name = ?2, phonetic = ?3 WHERE id = ?4")
                .bind(&pilot.callsign)
                .bind(&pilot.name)
                .bind(&pilot.phonetic)
                .bind(pilot.id)
                .execute(&self.pool)
                .await
        })
        .await?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<(), StoreError> {
        retry_once(|| async {
            sqlx::query("DELETE FROM pilots WHERE id = ?1").bind(id).execute(&self.pool).await
        })
        .await?;
        Ok(())
    }

    /// Lazily stream every pilot, in id order.
    pub fn stream_all(&self) -> impl Stream<Item = Result<Pilot, StoreError>> + '_ {
        sqlx::query("SELECT id, callsign, name, phonetic FROM pilots ORDER BY id")
            .fetch(&self.pool)
            .map(|row| row.map_err(StoreError::Storage).and_then(|r| row_to_pilot(&r)))
    }

    /// Owned variant of [`PilotStore::stream_all`] for response bodies that
    /// outlive the handler's borrow of the store.
    pub fn stream_owned(&self) -> impl Stream<Item = Result<Pilot, StoreError>> + Send + 'static {
        let pool = self.pool.clone();
        async_stream::try_stream! {
            let mut rows =
                sqlx::query("SELECT id, callsign, name, phonetic FROM pilots ORDER BY id")
                    .fetch(&pool);
            while let Some(row) = rows.try_next().await? {
                yield row_to_pilot(&row)?;
            }
        }
    }
}

#[cfg(test)]
#[path = "pilots_tests.rs"]
mod tests;

fn row_to_pilot(row: &SqliteRow) -> Result<Pilot, StoreError> {
    Ok(Pilot {
        id: row.try_get("id")?,
        callsign: row.try_get("callsign")?,
        name: row.try_get("name")?,
        phonetic: row.try_get("phonetic")?,
    })
}
