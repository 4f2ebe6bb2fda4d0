//! User persistence.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::Instrument;
use uuid::Uuid;

use super::model::{NewUser, User};
use crate::admin::changelist::{ListQuery, Page};

const USER_COLUMNS: &str = "id, email, password, first_name, last_name, mobile_number, \
     is_active, is_staff, is_superuser, date_joined, last_login";

/// Outcome when inserting a new account.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(User),
    Conflict,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Exact email match restricted to staff **and** superuser accounts.
    async fn find_privileged_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn get(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn create(&self, new_user: NewUser) -> Result<CreateOutcome>;

    async fn touch_last_login(&self, id: Uuid) -> Result<()>;

    /// Ordered by first name; honours `is_active` / `is_superuser` filters and
    /// a case-insensitive search over first name, last name and email.
    async fn list(&self, query: &ListQuery) -> Result<Page<User>>;
}

#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(&self, clause: &str, bind: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE {clause}");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        sqlx::query_as::<_, User>(&query)
            .bind(bind)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user")
    }
}

fn push_list_conditions(builder: &mut QueryBuilder<'_, Postgres>, query: &ListQuery) {
    builder.push(" WHERE TRUE");
    if let Some(active) = query.filter("is_active") {
        builder.push(" AND is_active = ").push_bind(active);
    }
    if let Some(superuser) = query.filter("is_superuser") {
        builder.push(" AND is_superuser = ").push_bind(superuser);
    }
    if let Some(term) = &query.search {
        let pattern = format!("%{}%", escape_like(term));
        builder
            .push(" AND (first_name ILIKE ")
            .push_bind(pattern.clone())
            .push(r" ESCAPE '\' OR last_name ILIKE ")
            .push_bind(pattern.clone())
            .push(r" ESCAPE '\' OR email ILIKE ")
            .push_bind(pattern)
            .push(r" ESCAPE '\')");
    }
}

/// Search terms match literally: `%`, `_` and `\` lose their pattern meaning.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_privileged_by_email(&self, email: &str) -> Result<Option<User>> {
        self.fetch_one_where(
            "email = $1 AND is_staff = TRUE AND is_superuser = TRUE LIMIT 1",
            email,
        )
        .await
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to get user")
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.fetch_one_where("email = $1", email).await
    }

    async fn create(&self, new_user: NewUser) -> Result<CreateOutcome> {
        let query = format!(
            "INSERT INTO users
                (email, password, first_name, last_name, mobile_number, is_active, is_staff, is_superuser)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {USER_COLUMNS}"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query.as_str()
        );
        let result = sqlx::query_as::<_, User>(&query)
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .bind(&new_user.first_name)
            .bind(&new_user.last_name)
            .bind(&new_user.mobile_number)
            .bind(new_user.is_active)
            .bind(new_user.is_staff)
            .bind(new_user.is_superuser)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(user) => Ok(CreateOutcome::Created(user)),
            Err(err) if is_unique_violation(&err) => Ok(CreateOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    async fn touch_last_login(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to update last_login")?;
        Ok(())
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<User>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        push_list_conditions(&mut count, query);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .context("failed to count users")?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users"));
        push_list_conditions(&mut select, query);
        select
            .push(" ORDER BY first_name, email LIMIT ")
            .push_bind(i64::from(query.per_page))
            .push(" OFFSET ")
            .push_bind(i64::try_from(query.offset()).unwrap_or(i64::MAX));
        let items = select
            .build_query_as::<User>()
            .fetch_all(&self.pool)
            .await
            .context("failed to list users")?;

        Ok(Page {
            items,
            total: u64::try_from(total).unwrap_or_default(),
            page: query.page,
            per_page: query.per_page,
        })
    }
}
