//! # Vaultline Seal
//!
//! Envelope encryption of file content and policy-gated custody of the
//! per-file keys.
//!
//! ## Overview
//!
//! - [`encrypt_file`] / [`decrypt_file`]: authenticated encryption of content
//!   under a random [`FileKey`]
//! - [`PolicySeal`]: seals file keys under a [`SealPolicy`] and unseals them
//!   only after an authorization check
//! - [`AuthorizationOracle`]: the external membership lookup consulted on
//!   every unseal
//!
//! ## Example
//!
//! ```ignore
//! let key = FileKey::generate();
//! let encrypted = encrypt_file(b"report", &key)?;
//! let sealed = seal.seal_key(&key, &policy)?;
//!
//! let key = seal.unseal(&sealed, &reader).await?;
//! let plaintext = decrypt_file(&encrypted.ciphertext, &encrypted.nonce, &key, encrypted.cipher_suite)?;
//! ```

pub mod crypto;
pub mod envelope;
pub mod error;
pub mod oracle;
pub mod seal;

pub use crypto::{derive_file_key_from_rmk, generate_file_key, FileKey, MasterKey};
pub use envelope::{decrypt_file, encrypt_file, CipherSuite, EncryptionResult};
pub use error::{Result, SealError};
pub use oracle::{AuthorizationOracle, StaticOracle};
pub use seal::{seal_key, AccessDecision, AccessMode, PolicySeal, SealConfig, SealPolicy, SealedKey};
