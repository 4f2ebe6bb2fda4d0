//! Changelist and change-form endpoints for registered models.

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use std::{collections::HashMap, sync::Arc};
use tracing::error;
use uuid::Uuid;

use super::{
    principal::require_admin,
    types::{ChangeFormResponse, ChangelistResponse, ModelOptionsBody},
};
use crate::admin::{changelist::parse_flag, ListQuery, ModelAdmin};
use crate::api::state::AdminState;

const SEARCH_PARAM: &str = "q";
const PAGE_PARAM: &str = "p";

/// Build the store query from changelist parameters. Filters are accepted as
/// `field=1` or `field__exact=1`; parameters the admin does not declare are ignored.
pub(crate) fn list_query(admin: &dyn ModelAdmin, params: &HashMap<String, String>) -> ListQuery {
    let page = params
        .get(PAGE_PARAM)
        .and_then(|p| p.trim().parse::<u32>().ok())
        .unwrap_or(1);

    let mut query = ListQuery::new(admin.list_per_page())
        .with_page(page)
        .with_search(
            params
                .get(SEARCH_PARAM)
                .filter(|_| !admin.search_fields().is_empty())
                .cloned(),
        );

    for field in admin.list_filter() {
        let value = params
            .get(field)
            .or_else(|| params.get(&format!("{field}__exact")))
            .and_then(|value| parse_flag(value));
        if let Some(value) = value {
            query = query.with_filter(field, value);
        }
    }
    query
}

#[utoipa::path(
    get,
    path = "/admin/{app_label}/{model_name}/",
    params(
        ("app_label" = String, Path, description = "Application label"),
        ("model_name" = String, Path, description = "Model name"),
        ("q" = Option<String>, Query, description = "Search term"),
        ("p" = Option<u32>, Query, description = "1-based page number")
    ),
    responses(
        (status = 200, description = "One changelist page", body = ChangelistResponse),
        (status = 401, description = "No verified admin session"),
        (status = 404, description = "Model not registered")
    ),
    tag = "admin"
)]
pub async fn changelist(
    headers: HeaderMap,
    Path((app_label, model_name)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    state: Extension<Arc<AdminState>>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state).await {
        return status.into_response();
    }

    let Some(admin) = state.site().registry().get_by_path(&app_label, &model_name) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let query = list_query(admin.as_ref(), &params);
    match admin.changelist(state.stores(), &query).await {
        Ok(page) => (
            StatusCode::OK,
            Json(ChangelistResponse {
                model: ModelOptionsBody::from(admin.options()),
                total: page.total,
                page: page.page,
                per_page: page.per_page,
                results: page.items,
            }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to load changelist for {}: {err:#}", admin.model());
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/admin/{app_label}/{model_name}/{object_id}/change/",
    params(
        ("app_label" = String, Path, description = "Application label"),
        ("model_name" = String, Path, description = "Model name"),
        ("object_id" = String, Path, description = "Object id")
    ),
    responses(
        (status = 200, description = "Change-form layout", body = ChangeFormResponse),
        (status = 401, description = "No verified admin session"),
        (status = 404, description = "Model or object not found")
    ),
    tag = "admin"
)]
pub async fn change(
    headers: HeaderMap,
    Path((app_label, model_name, object_id)): Path<(String, String, String)>,
    state: Extension<Arc<AdminState>>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state).await {
        return status.into_response();
    }

    let Some(admin) = state.site().registry().get_by_path(&app_label, &model_name) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Ok(id) = Uuid::parse_str(&object_id) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match admin.exists(state.stores(), id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(ChangeFormResponse {
                model: ModelOptionsBody::from(admin.options()),
                id: id.to_string(),
                fieldsets: admin.fieldsets(Some(id)),
            }),
        )
            .into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to load {} {id}: {err:#}", admin.model());
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::{CustomTotpDeviceAdmin, UserAdmin};

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn user_changelist_params() {
        let query = list_query(
            &UserAdmin,
            &params(&[("q", " ada "), ("p", "2"), ("is_active__exact", "1"), ("is_staff", "0")]),
        );
        assert_eq!(query.search.as_deref(), Some("ada"));
        assert_eq!(query.page, 2);
        assert_eq!(query.per_page, 50);
        assert_eq!(query.filter("is_active"), Some(true));
        assert_eq!(query.filter("is_staff"), None);
    }

    #[test]
    fn bad_page_falls_back_to_first() {
        let query = list_query(&UserAdmin, &params(&[("p", "last")]));
        assert_eq!(query.page, 1);
    }

    #[test]
    fn search_ignored_without_search_fields() {
        let query = list_query(&CustomTotpDeviceAdmin, &params(&[("q", "phone")]));
        assert_eq!(query.search, None);
        assert_eq!(query.per_page, 100);
    }
}
