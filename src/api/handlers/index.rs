use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use std::sync::Arc;

use super::{
    principal::require_admin,
    types::{AdminIndex, ModelEntry},
};
use crate::api::state::AdminState;

#[utoipa::path(
    get,
    path = "/admin/",
    responses(
        (status = 200, description = "Registered models of the gated site", body = AdminIndex),
        (status = 401, description = "No verified admin session")
    ),
    tag = "admin"
)]
pub async fn index(headers: HeaderMap, state: Extension<Arc<AdminState>>) -> impl IntoResponse {
    let principal = match require_admin(&headers, &state).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let site = state.site();
    let models = site
        .registry()
        .iter()
        .map(|(_, admin)| ModelEntry::from_admin(admin.as_ref()))
        .collect();

    (
        StatusCode::OK,
        Json(AdminIndex {
            site_name: site.name().to_string(),
            branding: site.branding().clone(),
            user: principal.user.email,
            models,
        }),
    )
        .into_response()
}
