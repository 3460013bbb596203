//! `paybook-vault` — symmetric encryption of gateway secrets at rest.
//!
//! The vault is built once at process start from deployment configuration and
//! shared by reference. Secret fields are persisted only as ciphertext; display
//! paths show [`MASK`] and never decrypt.

pub mod mask;
pub mod vault;

pub use mask::{MASK, MASK_MARKER, is_masked, mask};
pub use vault::{Vault, VaultError};
