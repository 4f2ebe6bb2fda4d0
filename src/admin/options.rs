//! Per-model admin behaviour.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::{fmt, sync::Arc};
use utoipa::ToSchema;
use uuid::Uuid;

use super::changelist::{ListQuery, Page};
use crate::otp::DeviceStore;
use crate::users::UserStore;

const DEFAULT_LIST_PER_PAGE: u32 = 100;

/// `app_label.model_name`, the identity a model is registered under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ModelKey {
    pub app_label: &'static str,
    pub model_name: &'static str,
}

impl ModelKey {
    #[must_use]
    pub const fn new(app_label: &'static str, model_name: &'static str) -> Self {
        Self {
            app_label,
            model_name,
        }
    }

    #[must_use]
    pub fn matches(&self, app_label: &str, model_name: &str) -> bool {
        self.app_label == app_label && self.model_name == model_name
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.app_label, self.model_name)
    }
}

/// Titled group of fields on a change form. `None` titles render without a header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct Fieldset {
    pub title: Option<String>,
    pub fields: Vec<String>,
    pub classes: Vec<String>,
}

impl Fieldset {
    #[must_use]
    pub fn new(title: Option<&str>, fields: &[&str]) -> Self {
        Self {
            title: title.map(str::to_string),
            fields: fields.iter().map(|f| (*f).to_string()).collect(),
            classes: Vec::new(),
        }
    }

    #[must_use]
    pub fn collapsed(mut self) -> Self {
        self.classes.push("collapse".to_string());
        self
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }
}

/// Stores a model admin reads from.
#[derive(Clone)]
pub struct AdminStores {
    pub users: Arc<dyn UserStore>,
    pub devices: Arc<dyn DeviceStore>,
}

impl fmt::Debug for AdminStores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminStores").finish_non_exhaustive()
    }
}

/// Serializable summary of a model admin's options.
#[derive(Clone, Debug, Serialize)]
pub struct ModelAdminOptions {
    pub app_label: &'static str,
    pub model_name: &'static str,
    pub verbose_name: &'static str,
    pub verbose_name_plural: &'static str,
    pub list_display: Vec<&'static str>,
    pub list_filter: Vec<&'static str>,
    pub search_fields: Vec<&'static str>,
    pub ordering: Vec<&'static str>,
    pub list_per_page: u32,
}

#[async_trait]
pub trait ModelAdmin: Send + Sync + fmt::Debug {
    fn model(&self) -> ModelKey;

    fn verbose_name(&self) -> &'static str;

    fn verbose_name_plural(&self) -> &'static str;

    fn list_display(&self) -> Vec<&'static str>;

    fn list_filter(&self) -> Vec<&'static str> {
        Vec::new()
    }

    fn search_fields(&self) -> Vec<&'static str> {
        Vec::new()
    }

    fn ordering(&self) -> Vec<&'static str> {
        Vec::new()
    }

    fn list_per_page(&self) -> u32 {
        DEFAULT_LIST_PER_PAGE
    }

    /// Change-form layout; `obj` is `None` on the add form.
    fn fieldsets(&self, obj: Option<Uuid>) -> Vec<Fieldset>;

    /// One changelist page, each row holding the `list_display` columns plus `id`.
    async fn changelist(&self, stores: &AdminStores, query: &ListQuery) -> Result<Page<Value>>;

    /// Whether the object exists; `fieldsets` is only served for existing objects.
    async fn exists(&self, stores: &AdminStores, id: Uuid) -> Result<bool>;

    fn options(&self) -> ModelAdminOptions {
        let key = self.model();
        ModelAdminOptions {
            app_label: key.app_label,
            model_name: key.model_name,
            verbose_name: self.verbose_name(),
            verbose_name_plural: self.verbose_name_plural(),
            list_display: self.list_display(),
            list_filter: self.list_filter(),
            search_fields: self.search_fields(),
            ordering: self.ordering(),
            list_per_page: self.list_per_page(),
        }
    }
}
