//! Admin login endpoints.
//!
//! Flow Overview: the submitted form is cleaned and validated by
//! [`PrivilegedLoginForm`]; a verified login gets a session bound to the OTP
//! device that accepted the token and is redirected to the admin index.

use axum::{
    extract::{rejection::FormRejection, Extension, Form},
    http::{
        header::{LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::{
    session::session_cookie,
    types::{FormFieldBody, LoginErrorResponse, LoginPage},
};
use crate::admin::{AuthenticatedUser, FormErrors, LoginError, LoginSubmission, PrivilegedLoginForm};
use crate::api::state::AdminState;

const ADMIN_INDEX_PATH: &str = "/admin/";

#[utoipa::path(
    get,
    path = "/admin/login/",
    responses(
        (status = 200, description = "Login form description", body = LoginPage)
    ),
    tag = "admin"
)]
pub async fn login_form(state: Extension<Arc<AdminState>>) -> Json<LoginPage> {
    let site = state.site();
    Json(LoginPage {
        site_name: site.name().to_string(),
        branding: site.branding().clone(),
        template: site.login_template().map(str::to_string),
        fields: PrivilegedLoginForm::fields()
            .into_iter()
            .map(FormFieldBody::from)
            .collect(),
    })
}

#[utoipa::path(
    post,
    path = "/admin/login/",
    request_body(content = LoginSubmission, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Logged in, redirect to the admin index"),
        (status = 400, description = "Field errors", body = LoginErrorResponse),
        (status = 401, description = "Credentials or OTP rejected", body = LoginErrorResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "admin"
)]
pub async fn login(
    state: Extension<Arc<AdminState>>,
    form: Result<Form<LoginSubmission>, FormRejection>,
) -> Response {
    let submission = match form {
        Ok(Form(submission)) => submission,
        Err(rejection) => {
            debug!("Unreadable login form: {rejection}");
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_fields",
                FormErrors::non_field(rejection.body_text()),
            );
        }
    };

    let form = PrivilegedLoginForm::new(state.stores().users.as_ref(), state.verifier());
    let AuthenticatedUser { user, device } = match form.validate(&submission).await {
        Ok(authenticated) => authenticated,
        Err(err) if err.is_internal() => {
            error!("Login failed: {err:#}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        Err(LoginError::Fields(errors)) => {
            return error_response(StatusCode::BAD_REQUEST, "invalid_fields", errors);
        }
        Err(err) => {
            return error_response(StatusCode::UNAUTHORIZED, err.code(), err.form_errors());
        }
    };

    if !state.site().has_permission(&user, true) {
        let err = LoginError::InvalidLogin;
        return error_response(StatusCode::UNAUTHORIZED, err.code(), err.form_errors());
    }

    if let Err(err) = state.stores().users.touch_last_login(user.id).await {
        error!("Failed to record last login: {err}");
    }

    let token = match state
        .sessions()
        .create(user.id, Some(device.id), state.config().session_ttl())
        .await
    {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to create session: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut headers = HeaderMap::new();
    match session_cookie(state.config(), &token) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }
    headers.insert(LOCATION, HeaderValue::from_static(ADMIN_INDEX_PATH));

    info!(user_id = %user.id, device_id = %device.id, "Admin login");
    (StatusCode::SEE_OTHER, headers).into_response()
}

fn error_response(status: StatusCode, code: &str, errors: FormErrors) -> Response {
    let body = LoginErrorResponse {
        code: code.to_string(),
        errors,
    };
    (status, Json(body)).into_response()
}
