use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use utoipa::ToSchema;

use crate::otp::OtpError;

pub const INVALID_LOGIN_MESSAGE: &str = "Please enter the correct Email and password for a staff account. \
     Note that both fields may be case-sensitive.";

/// Key under which errors that belong to no single field are reported.
pub const NON_FIELD_ERRORS: &str = "__all__";

/// Per-field validation messages, sorted by field name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    #[must_use]
    pub fn non_field(message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(NON_FIELD_ERRORS, message);
        errors
    }
}

/// Why a login attempt was refused.
///
/// `InvalidLogin` covers both an unknown privileged account and a wrong
/// password; the two are deliberately indistinguishable.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("invalid form fields")]
    Fields(FormErrors),
    #[error("{}", INVALID_LOGIN_MESSAGE)]
    InvalidLogin,
    #[error("This account is inactive.")]
    Inactive,
    #[error(transparent)]
    Otp(#[from] OtpError),
    #[error("authentication backend failure")]
    Internal(#[from] anyhow::Error),
}

impl LoginError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Fields(_) => "invalid_fields",
            Self::InvalidLogin => "invalid_login",
            Self::Inactive => "inactive",
            Self::Otp(err) => err.code(),
            Self::Internal(_) => "internal",
        }
    }

    /// Failures caused by infrastructure rather than by the submitted data.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_) | Self::Otp(OtpError::Internal(_)))
    }

    /// Errors shaped the way the login form renders them.
    #[must_use]
    pub fn form_errors(&self) -> FormErrors {
        match self {
            Self::Fields(errors) => errors.clone(),
            other => FormErrors::non_field(other.to_string()),
        }
    }
}
