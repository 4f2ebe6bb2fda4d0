use axum::{
    extract::{Extension, Path},
    http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use super::principal::require_admin;
use crate::admin::device_admin::DEVICE_MODEL;
use crate::api::state::AdminState;

#[utoipa::path(
    get,
    path = "/admin/{app_label}/{model_name}/{object_id}/qrcode/",
    params(
        ("app_label" = String, Path, description = "Application label, `otp_totp`"),
        ("model_name" = String, Path, description = "Model name, `totpdevice`"),
        ("object_id" = String, Path, description = "Device id")
    ),
    responses(
        (status = 200, description = "Provisioning QR code", content_type = "image/png"),
        (status = 401, description = "No verified admin session"),
        (status = 404, description = "Not a registered device")
    ),
    tag = "admin"
)]
pub async fn qrcode(
    headers: HeaderMap,
    Path((app_label, model_name, object_id)): Path<(String, String, String)>,
    state: Extension<Arc<AdminState>>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state).await {
        return status.into_response();
    }

    if !DEVICE_MODEL.matches(&app_label, &model_name)
        || !state.site().registry().is_registered(DEVICE_MODEL)
    {
        return StatusCode::NOT_FOUND.into_response();
    }
    let Ok(id) = Uuid::parse_str(&object_id) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let device = match state.stores().devices.get(id).await {
        Ok(Some(device)) => device,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to load device {id}: {err:#}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let account = match state.stores().users.get(device.user_id).await {
        Ok(Some(user)) => user.email,
        Ok(None) => device.name.clone(),
        Err(err) => {
            error!("Failed to load device owner {}: {err:#}", device.user_id);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match device.qr_png(state.config().otp().issuer(), &account) {
        Ok(png) => {
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));
            (StatusCode::OK, headers, png).into_response()
        }
        Err(err) => {
            error!("Failed to render QR code for device {id}: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
