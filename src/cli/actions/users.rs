//! Account management commands run against the database directly.

use crate::cli::actions::database::DatabaseArgs;
use crate::otp::{DeviceStore, NewDevice, OtpConfig, PgDeviceStore};
use crate::users::{
    model::EMAIL_MAX_LENGTH, password, CreateOutcome, NewUser, PgUserStore, UserStore,
};
use anyhow::{anyhow, bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

static EMAIL_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

#[derive(Debug)]
pub struct SuperuserArgs {
    pub database: DatabaseArgs,
    pub email: String,
    pub password: SecretString,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug)]
pub struct DeviceArgs {
    pub database: DatabaseArgs,
    pub email: String,
    pub name: String,
    pub issuer: String,
}

/// Basic shape check; the login form matches emails exactly so no normalization happens here.
///
/// # Errors
/// Returns an error describing why the email was refused.
pub fn validate_email(email: &str) -> Result<()> {
    if email.chars().count() > EMAIL_MAX_LENGTH {
        bail!("email must be at most {EMAIL_MAX_LENGTH} characters");
    }
    let re = EMAIL_RE
        .as_ref()
        .ok_or_else(|| anyhow!("email pattern failed to compile"))?;
    if !re.is_match(email) {
        bail!("invalid email: {email}");
    }
    Ok(())
}

impl DeviceArgs {
    /// Same issuer the server labels QR codes with.
    #[must_use]
    pub fn otp_config(&self) -> OtpConfig {
        OtpConfig::new().with_issuer(self.issuer.clone())
    }
}

fn new_superuser(args: &SuperuserArgs) -> Result<NewUser> {
    validate_email(&args.email)?;
    if args.password.expose_secret().is_empty() {
        bail!("password must not be empty");
    }
    let hash = password::hash_password(args.password.expose_secret())?;
    Ok(NewUser::superuser(&args.email, hash).with_names(&args.first_name, &args.last_name))
}

/// Create a staff superuser.
///
/// # Errors
/// Returns an error if the input is invalid, the email is taken or the database fails.
pub async fn create_superuser(args: SuperuserArgs) -> Result<()> {
    let new_user = new_superuser(&args)?;
    let pool = args.database.connect().await?;
    let store = PgUserStore::new(pool);
    create_superuser_in(&store, new_user).await
}

async fn create_superuser_in(store: &dyn UserStore, new_user: NewUser) -> Result<()> {
    let email = new_user.email.clone();
    match store.create(new_user).await? {
        CreateOutcome::Created(user) => {
            info!(user_id = %user.id, "Superuser created");
            println!("Created superuser {} ({})", user.email, user.id);
            Ok(())
        }
        CreateOutcome::Conflict => Err(anyhow!("a user with email {email} already exists")),
    }
}

/// Enroll a confirmed TOTP device for an existing user.
///
/// # Errors
/// Returns an error if the user does not exist or the database fails.
pub async fn add_device(args: DeviceArgs) -> Result<()> {
    let pool = args.database.connect().await?;
    let users = PgUserStore::new(pool.clone());
    let devices = PgDeviceStore::new(pool);
    let (url, secret) =
        add_device_in(&users, &devices, &args.email, &args.name, &args.otp_config()).await?;
    println!("{url}");
    println!("secret: {secret}");
    Ok(())
}

async fn add_device_in(
    users: &dyn UserStore,
    devices: &dyn DeviceStore,
    email: &str,
    name: &str,
    config: &OtpConfig,
) -> Result<(String, String)> {
    let user = users
        .find_by_email(email)
        .await?
        .ok_or_else(|| anyhow!("no user with email {email}"))?;
    let device = devices.create(NewDevice::generate(user.id, name)).await?;
    info!(user_id = %user.id, device_id = %device.id, "TOTP device enrolled");
    let url = device.config_url(config.issuer(), &user.email)?;
    Ok((url, device.key))
}
