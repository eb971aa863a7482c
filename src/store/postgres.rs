use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::time::Duration;

use crate::models::{BookingRecord, SlotKey, TokenId, TokenState};
use crate::store::{BookingStore, StoreError};

/// Postgres-backed store. Both write paths are conditional statements,
/// so two processes sharing the database cannot double-consume a token
/// or double-fill a slot even without the in-process admission gate.
#[derive(Clone, Debug)]
pub struct PgStore {
    pub pool: PgPool,
}

impl PgStore {
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        Ok(PgStore { pool })
    }

    pub async fn init(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS booking_tokens (
                token TEXT PRIMARY KEY,
                used BOOLEAN NOT NULL DEFAULT false,
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bookings (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                phone TEXT,
                service TEXT NOT NULL,
                service_name TEXT,
                addon TEXT,
                addon_name TEXT,
                total_price DOUBLE PRECISION NOT NULL,
                date TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL DEFAULT '',
                token TEXT NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // The slot-uniqueness invariant lives in the database itself.
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS bookings_slot_key
            ON bookings (date, start_time, end_time)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_record(row: &sqlx::postgres::PgRow) -> BookingRecord {
    BookingRecord {
        id: row.get("id"),
        name: row.get("name"),
        phone: row.get("phone"),
        service: row.get("service"),
        service_name: row.get("service_name"),
        addon: row.get("addon"),
        addon_name: row.get("addon_name"),
        total_price: row.get("total_price"),
        date: row.get("date"),
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        token: TokenId::new(row.get::<String, _>("token")),
        created_at: row.get("created_at"),
    }
}

#[async_trait::async_trait]
impl BookingStore for PgStore {
    async fn register_token(&self, token: &TokenId) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO booking_tokens (token, used)
            VALUES ($1, false)
            ON CONFLICT (token)
            DO UPDATE SET used = false, updated_at = NOW()
            "#,
        )
        .bind(token.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn token_state(&self, token: &TokenId) -> Result<TokenState, StoreError> {
        let row = sqlx::query("SELECT used FROM booking_tokens WHERE token = $1")
            .bind(token.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(match row {
            None => TokenState::Unregistered,
            Some(row) if row.get::<bool, _>("used") => TokenState::Used,
            Some(_) => TokenState::Free,
        })
    }

    async fn mark_token_used(&self, token: &TokenId) -> Result<(), StoreError> {
        // Conditional update: succeeds only if no concurrent writer
        // already flipped the flag.
        let result = sqlx::query(
            "UPDATE booking_tokens SET used = true, updated_at = NOW() \
             WHERE token = $1 AND used = false",
        )
        .bind(token.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }
        match self.token_state(token).await? {
            TokenState::Unregistered => Err(StoreError::NotFound),
            _ => Err(StoreError::AlreadyUsed),
        }
    }

    async fn slot_exists(&self, key: &SlotKey) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM bookings \
             WHERE date = $1 AND start_time = $2 AND end_time = $3) AS occupied",
        )
        .bind(&key.date)
        .bind(&key.start_time)
        .bind(&key.end_time)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<bool, _>("occupied"))
    }

    async fn append_booking(&self, record: &BookingRecord) -> Result<String, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO bookings
                (id, name, phone, service, service_name, addon, addon_name,
                 total_price, date, start_time, end_time, token, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (date, start_time, end_time) DO NOTHING
            "#,
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.phone)
        .bind(&record.service)
        .bind(&record.service_name)
        .bind(&record.addon)
        .bind(&record.addon_name)
        .bind(record.total_price)
        .bind(&record.date)
        .bind(&record.start_time)
        .bind(&record.end_time)
        .bind(record.token.as_str())
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::SlotTaken);
        }
        Ok(record.id.clone())
    }

    async fn remove_booking(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_bookings(&self) -> Result<Vec<BookingRecord>, StoreError> {
        let rows = sqlx::query("SELECT * FROM bookings ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(row_to_record).collect())
    }
}
