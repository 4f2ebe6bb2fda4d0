//! In-process user store, used by tests and local demos.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::RwLock;
use uuid::Uuid;

use super::{
    model::{NewUser, User},
    store::{CreateOutcome, UserStore},
};
use crate::admin::changelist::{ListQuery, Page};

#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<User>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<User>> {
        self.users
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<User>> {
        self.users
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn matches(user: &User, query: &ListQuery) -> bool {
    if query.filter("is_active").is_some_and(|v| v != user.is_active) {
        return false;
    }
    if query
        .filter("is_superuser")
        .is_some_and(|v| v != user.is_superuser)
    {
        return false;
    }
    query.search.as_ref().map_or(true, |term| {
        let term = term.to_lowercase();
        [&user.first_name, &user.last_name, &user.email]
            .iter()
            .any(|field| field.to_lowercase().contains(&term))
    })
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_privileged_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .read()
            .iter()
            .find(|user| user.email == email && user.is_staff && user.is_superuser)
            .cloned())
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.read().iter().find(|user| user.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.read().iter().find(|user| user.email == email).cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<CreateOutcome> {
        let mut users = self.write();
        if users.iter().any(|user| user.email == new_user.email) {
            return Ok(CreateOutcome::Conflict);
        }
        let user = new_user.into_user();
        users.push(user.clone());
        Ok(CreateOutcome::Created(user))
    }

    async fn touch_last_login(&self, id: Uuid) -> Result<()> {
        if let Some(user) = self.write().iter_mut().find(|user| user.id == id) {
            user.last_login = Some(Utc::now());
        }
        Ok(())
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<User>> {
        let mut selected: Vec<User> = self
            .read()
            .iter()
            .filter(|user| matches(user, query))
            .cloned()
            .collect();
        selected.sort_by(|a, b| {
            a.first_name
                .cmp(&b.first_name)
                .then_with(|| a.email.cmp(&b.email))
        });
        Ok(Page::from_sorted(selected, query))
    }
}
