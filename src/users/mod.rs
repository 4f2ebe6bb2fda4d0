//! User accounts: the record, its password hashing and persistence.

pub mod memory;
pub mod model;
pub mod password;
pub mod store;

pub use memory::MemoryUserStore;
pub use model::{NewUser, User};
pub use store::{CreateOutcome, PgUserStore, UserStore};
