//! Login form for the OTP-gated admin site.
//!
//! Flow Overview:
//! 1) Clean fields: required values and maximum lengths.
//! 2) Resolve the account by exact email among staff+superuser users.
//! 3) Check the password hash; unknown account and wrong password share one error.
//! 4) Run the login policy (inactive accounts are refused).
//! 5) Hand the OTP token to the verifier bound to the resolved user.

use once_cell::sync::Lazy;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::error::{FormErrors, LoginError};
use crate::otp::{OtpVerifier, TotpDevice};
use crate::users::{model::EMAIL_MAX_LENGTH, password, User, UserStore};

pub const OTP_TOKEN_MAX_LENGTH: usize = 6;

// Checked when no account matches so both branches cost one hash verification.
static DUMMY_PASSWORD_HASH: Lazy<String> =
    Lazy::new(|| password::hash_password("admin-otp-dummy").unwrap_or_default());

/// Raw form body as submitted.
#[derive(Clone, Default, Deserialize, ToSchema)]
pub struct LoginSubmission {
    pub username: Option<String>,
    pub password: Option<String>,
    pub otp_token: Option<String>,
    pub otp_device: Option<String>,
}

impl fmt::Debug for LoginSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginSubmission")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("otp_token", &self.otp_token.as_ref().map(|_| "[REDACTED]"))
            .field("otp_device", &self.otp_device)
            .finish()
    }
}

/// Field-level cleaned values.
#[derive(Debug)]
pub struct LoginCredentials {
    pub username: String,
    pub password: SecretString,
    pub otp_token: String,
    pub otp_device: Option<Uuid>,
}

/// A fully verified login: password and second factor.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user: User,
    pub device: TotpDevice,
}

/// Description of one form field for clients rendering the login page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FormField {
    pub name: &'static str,
    pub label: &'static str,
    pub input_type: &'static str,
    pub required: bool,
    pub max_length: Option<usize>,
}

/// Hook run after the password matched. The default refuses inactive and
/// non-staff accounts.
pub trait LoginPolicy: Send + Sync {
    /// # Errors
    /// Returns the error to surface when the account may not log in.
    fn confirm_login_allowed(&self, user: &User) -> Result<(), LoginError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ActiveStaffPolicy;

impl LoginPolicy for ActiveStaffPolicy {
    fn confirm_login_allowed(&self, user: &User) -> Result<(), LoginError> {
        if !user.is_active {
            return Err(LoginError::Inactive);
        }
        if !user.is_staff {
            return Err(LoginError::InvalidLogin);
        }
        Ok(())
    }
}

pub struct PrivilegedLoginForm<'a> {
    users: &'a dyn UserStore,
    verifier: &'a dyn OtpVerifier,
    policy: &'a dyn LoginPolicy,
}

impl fmt::Debug for PrivilegedLoginForm<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivilegedLoginForm").finish_non_exhaustive()
    }
}

impl<'a> PrivilegedLoginForm<'a> {
    #[must_use]
    pub fn new(users: &'a dyn UserStore, verifier: &'a dyn OtpVerifier) -> Self {
        Self {
            users,
            verifier,
            policy: &ActiveStaffPolicy,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: &'a dyn LoginPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn fields() -> Vec<FormField> {
        vec![
            FormField {
                name: "username",
                label: "Email",
                input_type: "email",
                required: true,
                max_length: Some(EMAIL_MAX_LENGTH),
            },
            FormField {
                name: "password",
                label: "Password",
                input_type: "password",
                required: true,
                max_length: None,
            },
            FormField {
                name: "otp_device",
                label: "OTP Device",
                input_type: "text",
                required: false,
                max_length: None,
            },
            FormField {
                name: "otp_token",
                label: "OTP",
                input_type: "text",
                required: true,
                max_length: Some(OTP_TOKEN_MAX_LENGTH),
            },
        ]
    }

    /// Per-field cleaning. Nothing is looked up yet.
    ///
    /// # Errors
    /// Returns every field error found.
    pub fn clean_fields(submission: &LoginSubmission) -> Result<LoginCredentials, FormErrors> {
        let mut errors = FormErrors::new();

        let username = required(&mut errors, "username", submission.username.as_deref(), true);
        if let Some(username) = &username {
            max_length(&mut errors, "username", username, EMAIL_MAX_LENGTH);
        }
        // Passwords are taken verbatim, whitespace included.
        let password = required(&mut errors, "password", submission.password.as_deref(), false);
        let otp_token = required(&mut errors, "otp_token", submission.otp_token.as_deref(), true);
        if let Some(token) = &otp_token {
            max_length(&mut errors, "otp_token", token, OTP_TOKEN_MAX_LENGTH);
        }

        let otp_device = match submission
            .otp_device
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            Some(value) => match Uuid::parse_str(value) {
                Ok(id) => Some(id),
                Err(_) => {
                    errors.add(
                        "otp_device",
                        "Select a valid choice. That choice is not one of the available choices.",
                    );
                    None
                }
            },
            None => None,
        };

        match (username, password, otp_token) {
            (Some(username), Some(password), Some(otp_token)) if errors.is_empty() => {
                Ok(LoginCredentials {
                    username,
                    password: SecretString::from(password),
                    otp_token,
                    otp_device,
                })
            }
            _ => Err(errors),
        }
    }

    /// Cross-field validation: privileged lookup, password, policy, OTP.
    ///
    /// # Errors
    /// See [`LoginError`].
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn clean(&self, credentials: &LoginCredentials) -> Result<AuthenticatedUser, LoginError> {
        let password = credentials.password.expose_secret();

        let Some(user) = self
            .users
            .find_privileged_by_email(&credentials.username)
            .await?
        else {
            let _ = password::check_password(password, &DUMMY_PASSWORD_HASH);
            debug!("No privileged account for username");
            return Err(LoginError::InvalidLogin);
        };

        if !password::check_password(password, &user.password) {
            debug!(user_id = %user.id, "Password mismatch");
            return Err(LoginError::InvalidLogin);
        }

        self.policy.confirm_login_allowed(&user)?;

        let device = self
            .verifier
            .verify(&user, credentials.otp_device, &credentials.otp_token)
            .await
            .inspect_err(|err| warn!(user_id = %user.id, "OTP rejected: {err}"))?;

        Ok(AuthenticatedUser { user, device })
    }

    /// Field cleaning followed by [`Self::clean`].
    ///
    /// # Errors
    /// See [`LoginError`].
    pub async fn validate(&self, submission: &LoginSubmission) -> Result<AuthenticatedUser, LoginError> {
        let credentials = Self::clean_fields(submission).map_err(LoginError::Fields)?;
        self.clean(&credentials).await
    }
}

fn required(errors: &mut FormErrors, field: &str, value: Option<&str>, trim: bool) -> Option<String> {
    let value = value.map(|v| if trim { v.trim() } else { v });
    match value {
        Some(v) if !v.is_empty() => Some(v.to_string()),
        _ => {
            errors.add(field, "This field is required.");
            None
        }
    }
}

fn max_length(errors: &mut FormErrors, field: &str, value: &str, limit: usize) {
    let length = value.chars().count();
    if length > limit {
        errors.add(
            field,
            format!("Ensure this value has at most {limit} characters (it has {length})."),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(username: &str, password: &str, token: &str) -> LoginSubmission {
        LoginSubmission {
            username: Some(username.to_string()),
            password: Some(password.to_string()),
            otp_token: Some(token.to_string()),
            otp_device: None,
        }
    }

    #[test]
    fn all_fields_required() {
        let errors = PrivilegedLoginForm::clean_fields(&LoginSubmission::default())
            .err()
            .unwrap_or_default();
        for field in ["username", "password", "otp_token"] {
            assert_eq!(
                errors.get(field),
                Some(&["This field is required.".to_string()][..]),
                "{field}"
            );
        }
        assert!(errors.get("otp_device").is_none());
    }

    #[test]
    fn token_longer_than_six_is_rejected() {
        let errors = PrivilegedLoginForm::clean_fields(&submission("a@example.com", "pw", "1234567"))
            .err()
            .unwrap_or_default();
        assert_eq!(
            errors.get("otp_token"),
            Some(&["Ensure this value has at most 6 characters (it has 7).".to_string()][..])
        );
    }

    #[test]
    fn username_is_trimmed_password_is_not() {
        let credentials =
            PrivilegedLoginForm::clean_fields(&submission(" a@example.com ", " pw ", " 123456 "));
        let Ok(credentials) = credentials else {
            panic!("expected clean fields");
        };
        assert_eq!(credentials.username, "a@example.com");
        assert_eq!(credentials.password.expose_secret(), " pw ");
        assert_eq!(credentials.otp_token, "123456");
    }

    #[test]
    fn device_must_be_a_uuid() {
        let mut bad = submission("a@example.com", "pw", "123456");
        bad.otp_device = Some("phone".to_string());
        assert!(PrivilegedLoginForm::clean_fields(&bad).is_err());

        let mut good = submission("a@example.com", "pw", "123456");
        let id = Uuid::new_v4();
        good.otp_device = Some(id.to_string());
        let credentials = PrivilegedLoginForm::clean_fields(&good).ok();
        assert_eq!(credentials.and_then(|c| c.otp_device), Some(id));
    }

    #[test]
    fn debug_redacts_secrets() {
        let rendered = format!("{:?}", submission("a@example.com", "hunter2", "123456"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("123456"));
        assert!(rendered.contains("a@example.com"));
    }

    #[test]
    fn field_labels() {
        let fields = PrivilegedLoginForm::fields();
        let username = fields.iter().find(|f| f.name == "username");
        assert_eq!(username.map(|f| f.label), Some("Email"));
        assert_eq!(username.and_then(|f| f.max_length), Some(254));
        let token = fields.iter().find(|f| f.name == "otp_token");
        assert_eq!(token.map(|f| f.label), Some("OTP"));
        assert_eq!(token.and_then(|f| f.max_length), Some(6));
    }

    #[test]
    fn policy_refuses_inactive() {
        let mut user = crate::users::NewUser::superuser("a@example.com", String::new()).into_user();
        assert!(ActiveStaffPolicy.confirm_login_allowed(&user).is_ok());
        user.is_active = false;
        assert!(matches!(
            ActiveStaffPolicy.confirm_login_allowed(&user),
            Err(LoginError::Inactive)
        ));
    }
}
