use thiserror::Error;

/// Reasons an OTP token is refused. Messages are shown to the user as is.
#[derive(Debug, Error)]
pub enum OtpError {
    #[error("Please enter your OTP token.")]
    TokenRequired,
    #[error("Invalid token. Please make sure you have entered it correctly.")]
    InvalidToken,
    #[error("Verification temporarily disabled because of {failures} failed attempts, please try again soon.")]
    Throttled { failures: u32 },
    #[error("OTP verification failed")]
    Internal(#[from] anyhow::Error),
}

impl OtpError {
    /// Stable machine-readable code for API responses.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::TokenRequired => "token_required",
            Self::InvalidToken => "invalid_token",
            Self::Throttled { .. } => "n_failed_attempts",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttled_message_includes_count() {
        let err = OtpError::Throttled { failures: 3 };
        assert_eq!(
            err.to_string(),
            "Verification temporarily disabled because of 3 failed attempts, please try again soon."
        );
        assert_eq!(err.code(), "n_failed_attempts");
    }
}
