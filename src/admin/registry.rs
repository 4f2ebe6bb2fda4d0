//! Model-to-admin table owned by one admin site.

use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error;

use super::options::{ModelAdmin, ModelKey};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("The model {0} is already registered")]
    AlreadyRegistered(ModelKey),
    #[error("The model {0} is not registered")]
    NotRegistered(ModelKey),
}

#[derive(Clone, Debug, Default)]
pub struct Registry {
    entries: BTreeMap<ModelKey, Arc<dyn ModelAdmin>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// [`RegistryError::AlreadyRegistered`] if the model already has an admin.
    pub fn register(&mut self, admin: Arc<dyn ModelAdmin>) -> Result<(), RegistryError> {
        let key = admin.model();
        if self.entries.contains_key(&key) {
            return Err(RegistryError::AlreadyRegistered(key));
        }
        self.entries.insert(key, admin);
        Ok(())
    }

    /// # Errors
    /// [`RegistryError::NotRegistered`] if the model has no admin.
    pub fn unregister(&mut self, key: ModelKey) -> Result<Arc<dyn ModelAdmin>, RegistryError> {
        self.entries
            .remove(&key)
            .ok_or(RegistryError::NotRegistered(key))
    }

    #[must_use]
    pub fn get(&self, key: ModelKey) -> Option<&Arc<dyn ModelAdmin>> {
        self.entries.get(&key)
    }

    /// Lookup by the URL segments `app_label` and `model_name`.
    #[must_use]
    pub fn get_by_path(&self, app_label: &str, model_name: &str) -> Option<&Arc<dyn ModelAdmin>> {
        self.entries
            .iter()
            .find(|(key, _)| key.matches(app_label, model_name))
            .map(|(_, admin)| admin)
    }

    #[must_use]
    pub fn is_registered(&self, key: ModelKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ModelKey, &Arc<dyn ModelAdmin>)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register every pair of `source` here, sharing the same admin instances.
    ///
    /// # Errors
    /// Stops at the first model already registered on this registry.
    pub fn mirror_from(&mut self, source: &Self) -> Result<(), RegistryError> {
        for admin in source.entries.values() {
            self.register(Arc::clone(admin))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::{
        device_admin::{CustomTotpDeviceAdmin, TotpDeviceAdmin, DEVICE_MODEL},
        user_admin::{UserAdmin, USER_MODEL},
    };

    #[test]
    fn register_twice_fails() {
        let mut registry = Registry::new();
        assert!(registry.register(Arc::new(UserAdmin)).is_ok());
        assert_eq!(
            registry.register(Arc::new(UserAdmin)).err(),
            Some(RegistryError::AlreadyRegistered(USER_MODEL))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unregister_missing_fails() {
        let mut registry = Registry::new();
        assert_eq!(
            registry.unregister(DEVICE_MODEL).err(),
            Some(RegistryError::NotRegistered(DEVICE_MODEL))
        );
    }

    #[test]
    fn swap_device_admin() {
        let mut registry = Registry::new();
        registry.register(Arc::new(TotpDeviceAdmin)).ok();
        assert!(registry.unregister(DEVICE_MODEL).is_ok());
        assert!(registry.register(Arc::new(CustomTotpDeviceAdmin)).is_ok());
        let list_display = registry.get(DEVICE_MODEL).map(|admin| admin.list_display());
        assert_eq!(list_display, Some(vec!["user", "name"]));
    }

    #[test]
    fn lookup_by_path_and_order() {
        let mut registry = Registry::new();
        registry.register(Arc::new(UserAdmin)).ok();
        registry.register(Arc::new(CustomTotpDeviceAdmin)).ok();

        assert!(registry.get_by_path("otp_app", "customuser").is_some());
        assert!(registry.get_by_path("otp_app", "missing").is_none());

        let keys: Vec<String> = registry.iter().map(|(key, _)| key.to_string()).collect();
        assert_eq!(keys, vec!["otp_app.customuser", "otp_totp.totpdevice"]);
    }

    #[test]
    fn mirror_shares_instances() {
        let mut source = Registry::new();
        source.register(Arc::new(UserAdmin)).ok();
        let mut target = Registry::new();
        assert!(target.mirror_from(&source).is_ok());

        let (Some(a), Some(b)) = (source.get(USER_MODEL), target.get(USER_MODEL)) else {
            panic!("user admin missing");
        };
        assert!(Arc::ptr_eq(a, b));
        assert!(target.mirror_from(&source).is_err());
    }
}
