//! In-process device store, used by tests and local demos.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

use super::{
    device::{NewDevice, TotpDevice},
    store::DeviceStore,
};
use crate::admin::changelist::{ListQuery, Page};

#[derive(Debug, Default)]
pub struct MemoryDeviceStore {
    devices: RwLock<Vec<TotpDevice>>,
}

impl MemoryDeviceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully built device, bypassing defaults.
    pub fn insert(&self, device: TotpDevice) {
        self.devices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(device);
    }
}

#[async_trait]
impl DeviceStore for MemoryDeviceStore {
    async fn get(&self, id: Uuid) -> Result<Option<TotpDevice>> {
        Ok(self
            .devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|device| device.id == id)
            .cloned())
    }

    async fn devices_for_user(
        &self,
        user_id: Uuid,
        confirmed_only: bool,
    ) -> Result<Vec<TotpDevice>> {
        Ok(self
            .devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|device| device.user_id == user_id && (device.confirmed || !confirmed_only))
            .cloned()
            .collect())
    }

    async fn create(&self, new_device: NewDevice) -> Result<TotpDevice> {
        let device = new_device.into_device();
        self.insert(device.clone());
        Ok(device)
    }

    async fn record_success(&self, device: &TotpDevice) -> Result<bool> {
        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        let Some(stored) = devices.iter_mut().find(|stored| stored.id == device.id) else {
            return Ok(false);
        };
        if stored.last_t >= device.last_t {
            return Ok(false);
        }
        stored.last_t = device.last_t;
        stored.drift = device.drift;
        stored.throttle_reset();
        Ok(true)
    }

    async fn record_failure(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(stored) = devices.iter_mut().find(|stored| stored.id == id) {
            stored.throttle_increment(at);
        }
        Ok(())
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<TotpDevice>> {
        let mut all = self
            .devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        all.sort_by_key(|device| device.created_at);
        Ok(Page::from_sorted(all, query))
    }
}
