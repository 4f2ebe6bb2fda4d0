//! Admin options for TOTP devices.
//!
//! [`TotpDeviceAdmin`] is the stock registration the OTP layer ships with.
//! [`CustomTotpDeviceAdmin`] replaces it on the default site and hides the
//! `confirmed` flag: devices enrolled here are always usable.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

use super::{
    changelist::{ListQuery, Page},
    options::{AdminStores, Fieldset, ModelAdmin, ModelKey},
};
use crate::otp::TotpDevice;

pub const DEVICE_MODEL: ModelKey = ModelKey::new("otp_totp", "totpdevice");

/// Field rendered as a link to the device QR code.
pub const QRCODE_FIELD: &str = "qrcode_link";

#[derive(Clone, Copy, Debug, Default)]
pub struct TotpDeviceAdmin;

#[derive(Clone, Copy, Debug, Default)]
pub struct CustomTotpDeviceAdmin;

fn stock_fieldsets(obj: Option<Uuid>) -> Vec<Fieldset> {
    let mut fieldsets = vec![
        Fieldset::new(Some("Identity"), &["user", "name", "confirmed"]),
        Fieldset::new(
            Some("Configuration"),
            &["key", "step", "t0", "digits", "tolerance"],
        ),
        Fieldset::new(Some("State"), &["drift", "last_t"]).collapsed(),
        Fieldset::new(
            Some("Throttling"),
            &["throttling_failure_timestamp", "throttling_failure_count"],
        )
        .collapsed(),
    ];
    if obj.is_some() {
        fieldsets.push(Fieldset::new(None, &[QRCODE_FIELD]));
    }
    fieldsets
}

/// Rows for `columns`, resolving the owning user to its email.
async fn device_rows(
    stores: &AdminStores,
    query: &ListQuery,
    columns: &[&str],
) -> Result<Page<Value>> {
    let page = stores.devices.list(query).await?;

    let mut emails: HashMap<Uuid, String> = HashMap::new();
    for device in &page.items {
        if !emails.contains_key(&device.user_id) {
            let email = stores
                .users
                .get(device.user_id)
                .await?
                .map(|user| user.email)
                .unwrap_or_default();
            emails.insert(device.user_id, email);
        }
    }

    Ok(page.map(|device| row(&device, columns, &emails)))
}

fn row(device: &TotpDevice, columns: &[&str], emails: &HashMap<Uuid, String>) -> Value {
    let mut row = Map::new();
    row.insert("id".to_string(), json!(device.id));
    for column in columns {
        let value = match *column {
            "user" => json!(emails.get(&device.user_id)),
            "name" => json!(device.name),
            "confirmed" => json!(device.confirmed),
            _ => Value::Null,
        };
        row.insert((*column).to_string(), value);
    }
    Value::Object(row)
}

#[async_trait]
impl ModelAdmin for TotpDeviceAdmin {
    fn model(&self) -> ModelKey {
        DEVICE_MODEL
    }

    fn verbose_name(&self) -> &'static str {
        "TOTP device"
    }

    fn verbose_name_plural(&self) -> &'static str {
        "TOTP devices"
    }

    fn list_display(&self) -> Vec<&'static str> {
        vec!["user", "name", "confirmed"]
    }

    fn fieldsets(&self, obj: Option<Uuid>) -> Vec<Fieldset> {
        stock_fieldsets(obj)
    }

    async fn changelist(&self, stores: &AdminStores, query: &ListQuery) -> Result<Page<Value>> {
        device_rows(stores, query, &self.list_display()).await
    }

    async fn exists(&self, stores: &AdminStores, id: Uuid) -> Result<bool> {
        Ok(stores.devices.get(id).await?.is_some())
    }
}

#[async_trait]
impl ModelAdmin for CustomTotpDeviceAdmin {
    fn model(&self) -> ModelKey {
        DEVICE_MODEL
    }

    fn verbose_name(&self) -> &'static str {
        TotpDeviceAdmin.verbose_name()
    }

    fn verbose_name_plural(&self) -> &'static str {
        TotpDeviceAdmin.verbose_name_plural()
    }

    fn list_display(&self) -> Vec<&'static str> {
        vec!["user", "name"]
    }

    /// Identity without `confirmed`, plus the QR block when the stock layout
    /// ends with one.
    fn fieldsets(&self, obj: Option<Uuid>) -> Vec<Fieldset> {
        let mut stock = TotpDeviceAdmin.fieldsets(obj);
        if stock.is_empty() {
            return stock;
        }

        let last = stock.pop().filter(|fieldset| fieldset.title.is_none());
        let mut first = stock.into_iter().next().unwrap_or_else(|| Fieldset::new(None, &[]));
        first.fields.retain(|field| field != "confirmed");

        let mut fieldsets = vec![first];
        fieldsets.extend(last);
        fieldsets
    }

    async fn changelist(&self, stores: &AdminStores, query: &ListQuery) -> Result<Page<Value>> {
        device_rows(stores, query, &self.list_display()).await
    }

    async fn exists(&self, stores: &AdminStores, id: Uuid) -> Result<bool> {
        TotpDeviceAdmin.exists(stores, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp::{DeviceStore, MemoryDeviceStore, NewDevice};
    use crate::users::{MemoryUserStore, NewUser, UserStore};
    use std::sync::Arc;

    fn never_confirmed(fieldsets: &[Fieldset]) -> bool {
        fieldsets.iter().all(|fieldset| !fieldset.contains("confirmed"))
    }

    #[test]
    fn stock_layout_shows_confirmed() {
        let fieldsets = TotpDeviceAdmin.fieldsets(Some(Uuid::new_v4()));
        assert_eq!(fieldsets.len(), 5);
        assert!(fieldsets[0].contains("confirmed"));
        assert_eq!(TotpDeviceAdmin.fieldsets(None).len(), 4);
    }

    #[test]
    fn custom_layout_for_existing_device() {
        let fieldsets = CustomTotpDeviceAdmin.fieldsets(Some(Uuid::new_v4()));
        assert_eq!(fieldsets.len(), 2);
        assert_eq!(fieldsets[0].title.as_deref(), Some("Identity"));
        assert_eq!(fieldsets[0].fields, vec!["user".to_string(), "name".to_string()]);
        assert_eq!(fieldsets[1].title, None);
        assert!(fieldsets[1].contains(QRCODE_FIELD));
        assert!(never_confirmed(&fieldsets));
    }

    #[test]
    fn custom_layout_for_new_device_has_no_qr_block() {
        let fieldsets = CustomTotpDeviceAdmin.fieldsets(None);
        assert_eq!(fieldsets.len(), 1);
        assert!(never_confirmed(&fieldsets));
    }

    #[test]
    fn repeated_calls_do_not_accumulate() {
        let id = Some(Uuid::new_v4());
        let first = CustomTotpDeviceAdmin.fieldsets(id);
        let second = CustomTotpDeviceAdmin.fieldsets(id);
        assert_eq!(first, second);
        assert!(TotpDeviceAdmin.fieldsets(id)[0].contains("confirmed"));
    }

    #[test]
    fn list_display_drops_confirmed() {
        assert_eq!(CustomTotpDeviceAdmin.list_display(), vec!["user", "name"]);
    }

    #[tokio::test]
    #[allow(clippy::unwrap_used)]
    async fn rows_show_owner_email() {
        let users = Arc::new(MemoryUserStore::new());
        let devices = Arc::new(MemoryDeviceStore::new());
        let user = match users
            .create(NewUser::superuser("root@example.com", String::new()))
            .await
            .unwrap()
        {
            crate::users::CreateOutcome::Created(user) => user,
            crate::users::CreateOutcome::Conflict => panic!("unexpected conflict"),
        };
        devices
            .create(NewDevice::generate(user.id, "phone"))
            .await
            .unwrap();
        let stores = AdminStores { users, devices };

        let page = CustomTotpDeviceAdmin
            .changelist(&stores, &ListQuery::new(100))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0]["user"], "root@example.com");
        assert_eq!(page.items[0]["name"], "phone");
        assert!(page.items[0].get("confirmed").is_none());
    }
}
