use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{postgres::PgRow, FromRow, Row};
use std::fmt;
use uuid::Uuid;

pub const EMAIL_MAX_LENGTH: usize = 254;
pub const MOBILE_NUMBER_MAX_LENGTH: usize = 50;

/// Account record. Email is the login key; `id` is assigned once at creation.
#[derive(Clone, Debug, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub mobile_number: Option<String>,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Staff and superuser at the same time.
    #[must_use]
    pub fn is_privileged(&self) -> bool {
        self.is_staff && self.is_superuser
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.email)
    }
}

impl<'r> FromRow<'r, PgRow> for User {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            password: row.try_get("password")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            mobile_number: row.try_get("mobile_number")?,
            is_active: row.try_get("is_active")?,
            is_staff: row.try_get("is_staff")?,
            is_superuser: row.try_get("is_superuser")?,
            date_joined: row.try_get("date_joined")?,
            last_login: row.try_get("last_login")?,
        })
    }
}

/// Fields needed to create an account. `password_hash` is already a PHC string.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub mobile_number: Option<String>,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl NewUser {
    #[must_use]
    pub fn superuser(email: &str, password_hash: String) -> Self {
        Self {
            email: email.to_string(),
            password_hash,
            first_name: String::new(),
            last_name: String::new(),
            mobile_number: None,
            is_active: true,
            is_staff: true,
            is_superuser: true,
        }
    }

    #[must_use]
    pub fn with_names(mut self, first_name: &str, last_name: &str) -> Self {
        self.first_name = first_name.to_string();
        self.last_name = last_name.to_string();
        self
    }

    /// Materialize the record the way the database would on insert.
    #[must_use]
    pub fn into_user(self) -> User {
        User {
            id: Uuid::new_v4(),
            email: self.email,
            password: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            mobile_number: self.mobile_number,
            is_active: self.is_active,
            is_staff: self.is_staff,
            is_superuser: self.is_superuser,
            date_joined: Utc::now(),
            last_login: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_email() {
        let user = NewUser::superuser("root@example.com", String::new()).into_user();
        assert_eq!(user.to_string(), "root@example.com");
    }

    #[test]
    fn superuser_is_privileged() {
        let mut user = NewUser::superuser("root@example.com", String::new()).into_user();
        assert!(user.is_privileged());
        user.is_superuser = false;
        assert!(!user.is_privileged());
    }

    #[test]
    fn ids_are_random() {
        let a = NewUser::superuser("a@example.com", String::new()).into_user();
        let b = NewUser::superuser("b@example.com", String::new()).into_user();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn full_name_trims_missing_parts() {
        let user = NewUser::superuser("a@example.com", String::new())
            .with_names("Ada", "")
            .into_user();
        assert_eq!(user.full_name(), "Ada");
    }
}
