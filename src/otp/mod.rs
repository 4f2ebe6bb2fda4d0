//! TOTP second factor: devices, their persistence and token verification.

pub mod device;
pub mod error;
pub mod memory;
pub mod store;
pub mod verifier;

pub use device::{NewDevice, TotpDevice};
pub use error::OtpError;
pub use memory::MemoryDeviceStore;
pub use store::{DeviceStore, PgDeviceStore};
pub use verifier::{OtpConfig, OtpVerifier, TotpVerifier};
