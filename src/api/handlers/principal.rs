//! Authenticated admin extraction.
//!
//! Flow Overview: read the session cookie, resolve the unexpired session, load
//! its user and ask the gated site whether that user may enter.

use axum::http::{HeaderMap, StatusCode};
use tracing::{debug, error};

use super::session::extract_session_token;
use crate::admin::AdminSession;
use crate::api::state::AdminState;
use crate::users::User;

/// Admin context derived from the session cookie.
#[derive(Clone, Debug)]
pub struct AdminPrincipal {
    pub user: User,
    pub session: AdminSession,
}

/// Resolve the session cookie into an admin, or 401.
///
/// # Errors
/// `401` without a usable session or permission, `500` on store failures.
pub async fn require_admin(
    headers: &HeaderMap,
    state: &AdminState,
) -> Result<AdminPrincipal, StatusCode> {
    let Some(token) = extract_session_token(headers) else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    let session = match state.sessions().lookup(&token).await {
        Ok(Some(session)) => session,
        Ok(None) => return Err(StatusCode::UNAUTHORIZED),
        Err(err) => {
            error!("Failed to lookup session: {err}");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let user = match state.stores().users.get(session.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(StatusCode::UNAUTHORIZED),
        Err(err) => {
            error!("Failed to load session user: {err}");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    if !state
        .site()
        .has_permission(&user, session.is_otp_verified())
    {
        debug!(user_id = %user.id, "Session user lacks admin permission");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(AdminPrincipal { user, session })
}
