//! Admin route handlers.

pub mod changelist;
pub mod health;
pub mod index;
pub mod login;
pub mod principal;
pub mod qrcode;
pub mod session;
pub mod types;
