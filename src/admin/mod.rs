//! OTP-gated admin: login form, model admins, registries and sessions.

pub mod changelist;
pub mod device_admin;
pub mod error;
pub mod form;
pub mod options;
pub mod registry;
pub mod session;
pub mod site;
pub mod user_admin;

pub use changelist::{ListQuery, Page};
pub use device_admin::{CustomTotpDeviceAdmin, TotpDeviceAdmin};
pub use error::{FormErrors, LoginError};
pub use form::{AuthenticatedUser, LoginSubmission, PrivilegedLoginForm};
pub use options::{AdminStores, Fieldset, ModelAdmin, ModelKey};
pub use registry::{Registry, RegistryError};
pub use session::{AdminSession, MemorySessionStore, PgSessionStore, SessionStore};
pub use site::{AdminSite, AdminSites, Branding};
pub use user_admin::UserAdmin;
