use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info, instrument};

use crate::domain::{MessageRef, ScheduleEntry, ScheduleState, TimetableSnapshot};
use crate::error::{Result, TableauError};
use crate::persistence::ScheduleStore;

/// PostgreSQL storage adapter for the autonomous timetable
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect and make sure the table exists
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        let store = Self { pool };
        store.ensure_tables().await?;
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ensure_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS auto_predictions (
                id SERIAL PRIMARY KEY,
                numero TEXT NOT NULL,
                target BIGINT NOT NULL,
                schedule_date DATE NOT NULL,
                launch_time TEXT NOT NULL,
                prediction_time TEXT NOT NULL,
                launch_offset INTEGER NOT NULL,
                state TEXT NOT NULL,
                launched BOOLEAN NOT NULL DEFAULT FALSE,
                verified BOOLEAN NOT NULL DEFAULT FALSE,
                status TEXT NOT NULL,
                chat_id BIGINT,
                message_id BIGINT,
                display_format TEXT,
                generated_at TIMESTAMP NOT NULL,
                created_at DATE NOT NULL DEFAULT CURRENT_DATE,
                UNIQUE (numero, created_at)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        debug!("auto_predictions table ready");
        Ok(())
    }

    fn entry_from_row(row: &PgRow) -> Result<ScheduleEntry> {
        let corrupt = |what: &str, detail: String| {
            TableauError::CorruptRecord(format!("auto_predictions.{}: {}", what, detail))
        };
        let hhmm = |column: &str| -> Result<NaiveTime> {
            let raw: String = row.get(column);
            NaiveTime::parse_from_str(&raw, "%H:%M").map_err(|e| corrupt(column, e.to_string()))
        };

        let state_raw: String = row.get("state");
        let state = ScheduleState::try_from(state_raw.as_str()).map_err(|e| corrupt("state", e))?;
        let target: i64 = row.get("target");
        let target = u64::try_from(target).map_err(|e| corrupt("target", e.to_string()))?;

        let chat_id: Option<i64> = row.get("chat_id");
        let message_id: Option<i64> = row.get("message_id");
        let message = chat_id
            .zip(message_id)
            .map(|(chat_id, message_id)| MessageRef { chat_id, message_id });

        let launch_offset: i32 = row.get("launch_offset");
        let generated_at: NaiveDateTime = row.get("generated_at");

        Ok(ScheduleEntry {
            id: row.get("numero"),
            target,
            launch_time: hhmm("launch_time")?,
            prediction_time: hhmm("prediction_time")?,
            launch_offset: i64::from(launch_offset),
            state,
            launched: row.get("launched"),
            verified: row.get("verified"),
            status: row.get("status"),
            message,
            display_format: row.get("display_format"),
            generated_at,
        })
    }
}

#[async_trait]
impl ScheduleStore for PostgresStore {
    #[instrument(skip(self, snapshot), fields(date = %snapshot.date, entries = snapshot.entries.len()))]
    async fn save(&self, snapshot: &TimetableSnapshot) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM auto_predictions WHERE schedule_date = $1")
            .bind(snapshot.date)
            .execute(&mut *tx)
            .await?;

        for entry in &snapshot.entries {
            sqlx::query(
                r#"
                INSERT INTO auto_predictions (
                    numero, target, schedule_date, launch_time, prediction_time,
                    launch_offset, state, launched, verified, status,
                    chat_id, message_id, display_format, generated_at, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $3)
                "#,
            )
            .bind(&entry.id)
            .bind(entry.target as i64)
            .bind(snapshot.date)
            .bind(entry.launch_time.format("%H:%M").to_string())
            .bind(entry.prediction_time.format("%H:%M").to_string())
            .bind(entry.launch_offset as i32)
            .bind(entry.state.as_str())
            .bind(entry.launched)
            .bind(entry.verified)
            .bind(&entry.status)
            .bind(entry.message.map(|m| m.chat_id))
            .bind(entry.message.map(|m| m.message_id))
            .bind(entry.display_format.as_deref())
            .bind(entry.generated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("timetable saved to PostgreSQL");
        Ok(())
    }

    async fn load(&self, date: NaiveDate) -> Result<Option<TimetableSnapshot>> {
        let rows = sqlx::query(
            r#"
            SELECT numero, target, launch_time, prediction_time, launch_offset, state,
                   launched, verified, status, chat_id, message_id, display_format, generated_at
            FROM auto_predictions
            WHERE schedule_date = $1
            ORDER BY target ASC
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let entries = rows
            .iter()
            .map(Self::entry_from_row)
            .collect::<Result<Vec<_>>>()?;

        info!(%date, entries = entries.len(), "timetable loaded from PostgreSQL");
        Ok(Some(TimetableSnapshot { date, entries }))
    }
}
