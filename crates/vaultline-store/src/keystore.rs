//! Key custody for the local signing identity.
//!
//! Exactly one keystore per identity. `save` never overwrites: replacing a
//! signing key takes an explicit `delete` first.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use vaultline_core::{Ed25519PublicKey, Keypair};

use crate::error::{poisoned, Result, StoreError};

/// An Ed25519 signing identity at rest.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Keystore {
    #[zeroize(skip)]
    public_key: Ed25519PublicKey,
    private_key: [u8; 32],
}

impl Keystore {
    /// Generate a fresh identity.
    pub fn generate() -> Self {
        Self::from_keypair(&Keypair::generate())
    }

    /// Capture an existing keypair.
    pub fn from_keypair(keypair: &Keypair) -> Self {
        Self {
            public_key: keypair.public_key(),
            private_key: *keypair.seed(),
        }
    }

    /// The public half.
    pub fn public_key(&self) -> Ed25519PublicKey {
        self.public_key
    }

    /// Rebuild the signing keypair, checking it matches the stored public key.
    pub fn keypair(&self) -> Result<Keypair> {
        let keypair = Keypair::from_seed(&self.private_key);
        if keypair.public_key() != self.public_key {
            return Err(StoreError::InvalidData(
                "keystore public key does not match private key".into(),
            ));
        }
        Ok(keypair)
    }
}

impl fmt::Debug for Keystore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keystore({:?})", self.public_key)
    }
}

/// On-disk JSON form. Private hex is wiped on drop.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeystoreFile {
    public_key: String,
    private_key: String,
}

impl Drop for KeystoreFile {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

impl KeystoreFile {
    fn from_keystore(keystore: &Keystore) -> Self {
        Self {
            public_key: keystore.public_key.to_hex(),
            private_key: hex::encode(keystore.private_key),
        }
    }

    fn to_keystore(&self) -> Result<Keystore> {
        let public_key = Ed25519PublicKey::from_hex(&self.public_key)
            .map_err(|e| StoreError::InvalidData(format!("keystore public key: {e}")))?;
        let mut private = hex::decode(&self.private_key)
            .map_err(|e| StoreError::InvalidData(format!("keystore private key: {e}")))?;
        let keypair = Keypair::from_private_key(&private)
            .map_err(|e| StoreError::InvalidData(format!("keystore private key: {e}")));
        private.zeroize();

        let keystore = Keystore::from_keypair(&keypair?);
        if keystore.public_key != public_key {
            return Err(StoreError::InvalidData(
                "keystore public key does not match private key".into(),
            ));
        }
        Ok(keystore)
    }
}

/// Persistent custody of one signing identity.
#[async_trait]
pub trait KeyCustody: Send + Sync {
    /// Load the keystore, if one exists.
    async fn load(&self) -> Result<Option<Keystore>>;

    /// Persist a keystore. Fails with `KeystoreExists` if one is present.
    async fn save(&self, keystore: &Keystore) -> Result<()>;

    /// Whether a keystore is present.
    async fn exists(&self) -> Result<bool>;

    /// Remove the keystore. Returns whether one existed.
    async fn delete(&self) -> Result<bool>;
}

/// Keystore kept as a JSON file with owner-only permissions.
#[derive(Debug, Clone)]
pub struct FileKeyCustody {
    path: PathBuf,
}

impl FileKeyCustody {
    /// Custody at `path`. Nothing is touched until the first call.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The keystore file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Path) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || f(&path))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
    }
}

/// Write `contents` to `path` only if nothing is there yet.
///
/// The bytes go to a sibling temp file first and are linked into place
/// without clobbering, so a failed write never leaves a partial keystore.
fn write_new(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut staged = tempfile::Builder::new()
        .prefix(".keystore-")
        .tempfile_in(parent)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        staged
            .as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    staged.write_all(contents)?;
    staged.as_file().sync_all()?;
    staged.persist_noclobber(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl KeyCustody for FileKeyCustody {
    async fn load(&self) -> Result<Option<Keystore>> {
        self.blocking(|path| {
            let contents = match std::fs::read(path) {
                Ok(bytes) => zeroize::Zeroizing::new(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            let file: KeystoreFile = serde_json::from_slice(&contents)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            file.to_keystore().map(Some)
        })
        .await
    }

    async fn save(&self, keystore: &Keystore) -> Result<()> {
        let file = KeystoreFile::from_keystore(keystore);
        let contents = zeroize::Zeroizing::new(
            serde_json::to_vec_pretty(&file).map_err(|e| StoreError::Serialization(e.to_string()))?,
        );
        let public_key = keystore.public_key();

        self.blocking(move |path| match write_new(path, &contents) {
            Ok(()) => {
                info!(path = %path.display(), public_key = %public_key.to_hex(), "keystore saved");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                warn!(path = %path.display(), "refusing to overwrite existing keystore");
                Err(StoreError::KeystoreExists(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        })
        .await
    }

    async fn exists(&self) -> Result<bool> {
        self.blocking(|path| Ok(path.try_exists()?)).await
    }

    async fn delete(&self) -> Result<bool> {
        self.blocking(|path| match std::fs::remove_file(path) {
            Ok(()) => {
                info!(path = %path.display(), "keystore deleted");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        })
        .await
    }
}

/// Keystore held in process memory.
#[derive(Default)]
pub struct MemoryKeyCustody {
    slot: RwLock<Option<Keystore>>,
}

impl MemoryKeyCustody {
    /// Empty custody.
    pub fn new() -> Self {
        Self::default()
    }

    /// Custody already holding `keystore`.
    pub fn with_keystore(keystore: Keystore) -> Self {
        Self {
            slot: RwLock::new(Some(keystore)),
        }
    }
}

#[async_trait]
impl KeyCustody for MemoryKeyCustody {
    async fn load(&self) -> Result<Option<Keystore>> {
        Ok(self.slot.read().map_err(poisoned)?.clone())
    }

    async fn save(&self, keystore: &Keystore) -> Result<()> {
        let mut slot = self.slot.write().map_err(poisoned)?;
        if slot.is_some() {
            warn!("refusing to overwrite existing keystore");
            return Err(StoreError::KeystoreExists("memory".into()));
        }
        *slot = Some(keystore.clone());
        Ok(())
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.slot.read().map_err(poisoned)?.is_some())
    }

    async fn delete(&self) -> Result<bool> {
        Ok(self.slot.write().map_err(poisoned)?.take().is_some())
    }
}
