//! # Admin OTP
//!
//! `admin-otp` serves an administrative interface that only privileged
//! accounts (staff **and** superuser) can enter, and only after presenting a
//! time-based one-time password (TOTP) in addition to their password.
//!
//! ## Login
//!
//! The login form looks the account up by exact email among privileged users,
//! checks the Argon2id password hash and then hands the OTP token to the
//! verifier bound to that user. Unknown accounts and wrong passwords produce
//! the same generic error so the response never tells which field was wrong;
//! OTP failures (missing, invalid, throttled) are reported as such.
//!
//! ## Admin sites
//!
//! Models are exposed through an explicit registry of
//! `(model key -> model admin)` pairs. The gated site mirrors every pair of the
//! default site, which must be fully populated first; [`admin::AdminSites`]
//! builds both in that order.

pub mod admin;
pub mod api;
pub mod cli;
pub mod otp;
pub mod users;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
