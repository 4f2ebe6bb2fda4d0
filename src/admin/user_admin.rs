//! Admin options for the custom user model.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{
    changelist::{ListQuery, Page},
    options::{AdminStores, Fieldset, ModelAdmin, ModelKey},
};
use crate::users::User;

pub const USER_MODEL: ModelKey = ModelKey::new("otp_app", "customuser");

#[derive(Clone, Copy, Debug, Default)]
pub struct UserAdmin;

fn row(user: &User) -> Value {
    json!({
        "id": user.id,
        "email": user.email,
        "first_name": user.first_name,
        "last_name": user.last_name,
    })
}

#[async_trait]
impl ModelAdmin for UserAdmin {
    fn model(&self) -> ModelKey {
        USER_MODEL
    }

    fn verbose_name(&self) -> &'static str {
        "User"
    }

    fn verbose_name_plural(&self) -> &'static str {
        "Users"
    }

    fn list_display(&self) -> Vec<&'static str> {
        vec!["email", "first_name", "last_name"]
    }

    fn list_filter(&self) -> Vec<&'static str> {
        vec!["is_superuser", "is_active"]
    }

    fn search_fields(&self) -> Vec<&'static str> {
        vec!["first_name", "last_name", "email"]
    }

    fn ordering(&self) -> Vec<&'static str> {
        vec!["first_name"]
    }

    fn list_per_page(&self) -> u32 {
        50
    }

    fn fieldsets(&self, _obj: Option<Uuid>) -> Vec<Fieldset> {
        vec![
            Fieldset::new(None, &["email", "password"]),
            Fieldset::new(
                Some("Personal info"),
                &["first_name", "last_name", "mobile_number"],
            ),
            Fieldset::new(Some("Permissions"), &["is_active", "is_superuser"]),
            Fieldset::new(Some("Important dates"), &["last_login", "date_joined"]),
        ]
    }

    async fn changelist(&self, stores: &AdminStores, query: &ListQuery) -> Result<Page<Value>> {
        let page = stores.users.list(query).await?;
        Ok(page.map(|user| row(&user)))
    }

    async fn exists(&self, stores: &AdminStores, id: Uuid) -> Result<bool> {
        Ok(stores.users.get(id).await?.is_some())
    }
}
