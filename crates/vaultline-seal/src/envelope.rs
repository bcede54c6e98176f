//! Envelope encryption of file content.
//!
//! New content is always encrypted with XChaCha20-Poly1305 under a fresh
//! 192-bit random nonce. AES-256-GCM with a 128-bit nonce is accepted for
//! decryption only, to read files written by the older format; its
//! ciphertext is the encrypted bytes followed by the 16-byte tag.

use aes_gcm::aead::consts::U16;
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::crypto::FileKey;
use crate::error::{Result, SealError};

/// AES-256-GCM with a 16-byte nonce, as written by the legacy format.
type LegacyAes256Gcm = AesGcm<Aes256, U16>;

/// The closed set of supported cipher suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CipherSuite {
    /// Primary suite for all new encryptions.
    #[serde(rename = "xchacha20-poly1305")]
    XChaCha20Poly1305,
    /// Decrypt-only legacy suite.
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
}

impl CipherSuite {
    /// Wire tag of this suite.
    pub fn as_str(self) -> &'static str {
        match self {
            CipherSuite::XChaCha20Poly1305 => "xchacha20-poly1305",
            CipherSuite::Aes256Gcm => "aes-256-gcm",
        }
    }

    /// Nonce length in bytes.
    pub fn nonce_len(self) -> usize {
        match self {
            CipherSuite::XChaCha20Poly1305 => 24,
            CipherSuite::Aes256Gcm => 16,
        }
    }

    /// Whether new content may be encrypted with this suite.
    pub fn is_writable(self) -> bool {
        matches!(self, CipherSuite::XChaCha20Poly1305)
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CipherSuite {
    type Err = SealError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "xchacha20-poly1305" => Ok(CipherSuite::XChaCha20Poly1305),
            "aes-256-gcm" => Ok(CipherSuite::Aes256Gcm),
            other => Err(SealError::InvalidInput(format!(
                "unsupported cipher suite: {other}"
            ))),
        }
    }
}

/// Output of [`encrypt_file`]. The nonce must be stored with the ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionResult {
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub cipher_suite: CipherSuite,
}

/// Encrypt file content under `key` with the primary suite and a fresh nonce.
pub fn encrypt_file(plaintext: &[u8], key: &FileKey) -> Result<EncryptionResult> {
    let mut nonce = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut nonce);

    let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|e| SealError::InvalidKey(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|e| SealError::EncryptionError(e.to_string()))?;

    Ok(EncryptionResult {
        ciphertext,
        nonce: nonce.to_vec(),
        cipher_suite: CipherSuite::XChaCha20Poly1305,
    })
}

/// Decrypt file content, dispatching on the recorded suite.
///
/// Fails closed: a wrong key, flipped byte or truncated tag is an
/// [`SealError::Authentication`] and no plaintext is returned.
pub fn decrypt_file(
    ciphertext: &[u8],
    nonce: &[u8],
    key: &FileKey,
    suite: CipherSuite,
) -> Result<Vec<u8>> {
    if nonce.len() != suite.nonce_len() {
        return Err(SealError::InvalidInput(format!(
            "{suite} nonce must be {} bytes, got {}",
            suite.nonce_len(),
            nonce.len()
        )));
    }

    let plaintext = match suite {
        CipherSuite::XChaCha20Poly1305 => {
            let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
                .map_err(|e| SealError::InvalidKey(e.to_string()))?;
            cipher.decrypt(XNonce::from_slice(nonce), ciphertext)
        }
        CipherSuite::Aes256Gcm => {
            let cipher = LegacyAes256Gcm::new_from_slice(key.as_bytes())
                .map_err(|e| SealError::InvalidKey(e.to_string()))?;
            cipher.decrypt(aes_gcm::Nonce::<U16>::from_slice(nonce), ciphertext)
        }
    };

    plaintext.map_err(|_| SealError::Authentication(format!("{suite} tag mismatch")))
}

#[cfg(test)]
pub(crate) fn encrypt_legacy(plaintext: &[u8], key: &FileKey, nonce: &[u8; 16]) -> Vec<u8> {
    LegacyAes256Gcm::new_from_slice(key.as_bytes())
        .unwrap()
        .encrypt(aes_gcm::Nonce::<U16>::from_slice(nonce), plaintext)
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_roundtrip_primary_suite() {
        let key = FileKey::generate();
        let result = encrypt_file(b"hello, vault", &key).unwrap();

        assert_eq!(result.cipher_suite, CipherSuite::XChaCha20Poly1305);
        assert_eq!(result.nonce.len(), 24);
        assert_eq!(result.ciphertext.len(), b"hello, vault".len() + 16);

        let plaintext =
            decrypt_file(&result.ciphertext, &result.nonce, &key, result.cipher_suite).unwrap();
        assert_eq!(plaintext, b"hello, vault");
    }

    #[test]
    fn test_fresh_nonce_per_encryption() {
        let key = FileKey::generate();
        let a = encrypt_file(b"same", &key).unwrap();
        let b = encrypt_file(b"same", &key).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_wrong_key_fails_closed() {
        let result = encrypt_file(b"secret", &FileKey::generate()).unwrap();
        let err = decrypt_file(
            &result.ciphertext,
            &result.nonce,
            &FileKey::generate(),
            result.cipher_suite,
        )
        .unwrap_err();
        assert!(matches!(err, SealError::Authentication(_)));
    }

    #[test]
    fn test_flipped_byte_fails_closed() {
        let key = FileKey::generate();
        let mut result = encrypt_file(b"secret data", &key).unwrap();
        result.ciphertext[3] ^= 0x01;
        let err = decrypt_file(&result.ciphertext, &result.nonce, &key, result.cipher_suite)
            .unwrap_err();
        assert!(matches!(err, SealError::Authentication(_)));
    }

    #[test]
    fn test_wrong_suite_fails() {
        let key = FileKey::generate();
        let result = encrypt_file(b"data", &key).unwrap();
        // Nonce length does not fit the legacy suite.
        let err = decrypt_file(&result.ciphertext, &result.nonce, &key, CipherSuite::Aes256Gcm)
            .unwrap_err();
        assert!(matches!(err, SealError::InvalidInput(_)));
    }

    #[test]
    fn test_legacy_suite_decrypts() {
        let key = FileKey::from_bytes([7; 32]);
        let nonce = [9u8; 16];
        let ciphertext = encrypt_legacy(b"old format", &key, &nonce);
        assert_eq!(ciphertext.len(), b"old format".len() + 16);

        let plaintext = decrypt_file(&ciphertext, &nonce, &key, CipherSuite::Aes256Gcm).unwrap();
        assert_eq!(plaintext, b"old format");
    }

    #[test]
    fn test_legacy_suite_tamper_detected() {
        let key = FileKey::from_bytes([7; 32]);
        let nonce = [9u8; 16];
        let mut ciphertext = encrypt_legacy(b"old format", &key, &nonce);
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0x80;

        let err = decrypt_file(&ciphertext, &nonce, &key, CipherSuite::Aes256Gcm).unwrap_err();
        assert!(matches!(err, SealError::Authentication(_)));
    }

    #[test]
    fn test_suite_tags() {
        assert_eq!(
            "xchacha20-poly1305".parse::<CipherSuite>().unwrap(),
            CipherSuite::XChaCha20Poly1305
        );
        assert_eq!("aes-256-gcm".parse::<CipherSuite>().unwrap(), CipherSuite::Aes256Gcm);
        assert!("rot13".parse::<CipherSuite>().is_err());
        assert!(!CipherSuite::Aes256Gcm.is_writable());

        let tag = cbor_tag(CipherSuite::Aes256Gcm);
        assert_eq!(tag, "aes-256-gcm");
    }

    fn cbor_tag(suite: CipherSuite) -> String {
        let mut buf = Vec::new();
        ciborium::into_writer(&suite, &mut buf).unwrap();
        let value: String = ciborium::from_reader(buf.as_slice()).unwrap();
        value
    }

    proptest! {
        #[test]
        fn prop_roundtrip(plaintext in prop::collection::vec(any::<u8>(), 0..2048)) {
            let key = FileKey::generate();
            let result = encrypt_file(&plaintext, &key).unwrap();
            let decrypted =
                decrypt_file(&result.ciphertext, &result.nonce, &key, result.cipher_suite).unwrap();
            prop_assert_eq!(decrypted, plaintext);
        }
    }
}
