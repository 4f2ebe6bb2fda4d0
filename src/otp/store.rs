//! TOTP device persistence.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::Instrument;
use uuid::Uuid;

use super::device::{NewDevice, TotpDevice, DEFAULT_DIGITS, DEFAULT_STEP, DEFAULT_TOLERANCE};
use crate::admin::changelist::{ListQuery, Page};

const DEVICE_COLUMNS: &str = "id, user_id, name, confirmed, key, step, t0, digits, tolerance, \
     drift, last_t, throttling_failure_count, throttling_failure_timestamp, created_at";

#[async_trait]
pub trait DeviceStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<TotpDevice>>;

    async fn devices_for_user(&self, user_id: Uuid, confirmed_only: bool)
        -> Result<Vec<TotpDevice>>;

    async fn create(&self, new_device: NewDevice) -> Result<TotpDevice>;

    /// Commit an accepted step: `last_t`, `drift` and a throttling reset.
    /// Applied only while the stored `last_t` is still older than the
    /// device's; returns `false` when another verification used the step first.
    async fn record_success(&self, device: &TotpDevice) -> Result<bool>;

    /// Count one failed attempt at `at`.
    async fn record_failure(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;

    /// Ordered by creation time.
    async fn list(&self, query: &ListQuery) -> Result<Page<TotpDevice>>;
}

#[derive(Clone, Debug)]
pub struct PgDeviceStore {
    pool: PgPool,
}

impl PgDeviceStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceStore for PgDeviceStore {
    async fn get(&self, id: Uuid) -> Result<Option<TotpDevice>> {
        let query = format!("SELECT {DEVICE_COLUMNS} FROM totp_devices WHERE id = $1");
        sqlx::query_as::<_, TotpDevice>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to get device")
    }

    async fn devices_for_user(
        &self,
        user_id: Uuid,
        confirmed_only: bool,
    ) -> Result<Vec<TotpDevice>> {
        let query = format!(
            "SELECT {DEVICE_COLUMNS} FROM totp_devices
             WHERE user_id = $1 AND (confirmed OR NOT $2)
             ORDER BY created_at"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        sqlx::query_as::<_, TotpDevice>(&query)
            .bind(user_id)
            .bind(confirmed_only)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list user devices")
    }

    async fn create(&self, new_device: NewDevice) -> Result<TotpDevice> {
        let query = format!(
            "INSERT INTO totp_devices (user_id, name, confirmed, key, step, digits, tolerance)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {DEVICE_COLUMNS}"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query.as_str()
        );
        sqlx::query_as::<_, TotpDevice>(&query)
            .bind(new_device.user_id)
            .bind(&new_device.name)
            .bind(new_device.confirmed)
            .bind(&new_device.key)
            .bind(DEFAULT_STEP)
            .bind(DEFAULT_DIGITS)
            .bind(DEFAULT_TOLERANCE)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert device")
    }

    async fn record_success(&self, device: &TotpDevice) -> Result<bool> {
        let query = r"
            UPDATE totp_devices
            SET last_t = $2,
                drift = $3,
                throttling_failure_count = 0,
                throttling_failure_timestamp = NULL
            WHERE id = $1 AND last_t < $2
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(device.id)
            .bind(device.last_t)
            .bind(device.drift)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to record verified step")?;
        Ok(result.rows_affected() == 1)
    }

    async fn record_failure(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let query = r"
            UPDATE totp_devices
            SET throttling_failure_count = throttling_failure_count + 1,
                throttling_failure_timestamp = $2
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to record verification failure")?;
        Ok(())
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<TotpDevice>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM totp_devices")
            .fetch_one(&self.pool)
            .await
            .context("failed to count devices")?;

        let select = format!(
            "SELECT {DEVICE_COLUMNS} FROM totp_devices ORDER BY created_at LIMIT $1 OFFSET $2"
        );
        let items = sqlx::query_as::<_, TotpDevice>(&select)
            .bind(i64::from(query.per_page))
            .bind(i64::try_from(query.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .context("failed to list devices")?;

        Ok(Page {
            items,
            total: u64::try_from(total).unwrap_or_default(),
            page: query.page,
            per_page: query.per_page,
        })
    }
}
