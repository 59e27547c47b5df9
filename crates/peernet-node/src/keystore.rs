//! Keystore for identity persistence
//!
//! Persists the node's secp256k1 keypair to disk so the node keeps the same
//! `NodeID` across restarts.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use peernet_crypto::Keypair;

use crate::error::{NodeError, NodeResult};

const IDENTITY_KEY_FILENAME: &str = "identity.key";

/// Keystore for managing node identity persistence.
pub struct Keystore {
    path: PathBuf,
}

impl Keystore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.to_path_buf(),
        }
    }

    fn key_path(&self) -> PathBuf {
        self.path.join(IDENTITY_KEY_FILENAME)
    }

    /// Load the existing identity, or generate and persist a new one.
    pub fn load_or_generate(&self) -> NodeResult<Keypair> {
        if self.exists() {
            self.load()
        } else {
            info!("no existing node identity found, generating new key");
            let keypair = Keypair::generate();
            self.save(&keypair)?;
            Ok(keypair)
        }
    }

    pub fn load(&self) -> NodeResult<Keypair> {
        let key_path = self.key_path();
        let bytes = std::fs::read(&key_path)
            .map_err(|e| NodeError::Keystore(format!("failed to read identity key file: {e}")))?;

        if bytes.len() != 32 {
            return Err(NodeError::Keystore(format!(
                "invalid identity key file: expected 32 bytes, got {}",
                bytes.len()
            )));
        }

        let keypair = Keypair::from_secret_bytes(&bytes)
            .map_err(|e| NodeError::Keystore(format!("invalid identity key bytes: {e}")))?;

        debug!(node_id = %keypair.node_id(), "loaded node identity from keystore");
        Ok(keypair)
    }

    pub fn save(&self, keypair: &Keypair) -> NodeResult<()> {
        std::fs::create_dir_all(&self.path)
            .map_err(|e| NodeError::Keystore(format!("failed to create keystore dir: {e}")))?;

        let key_path = self.key_path();
        std::fs::write(&key_path, keypair.secret_bytes())
            .map_err(|e| NodeError::Keystore(format!("failed to write identity key file: {e}")))?;

        Self::set_restrictive_permissions(&key_path)?;

        info!(
            node_id = %keypair.node_id(),
            path = %key_path.display(),
            "saved node identity to keystore"
        );
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.key_path().exists()
    }

    pub fn delete(&self) -> NodeResult<()> {
        let key_path = self.key_path();
        if key_path.exists() {
            std::fs::remove_file(&key_path)
                .map_err(|e| NodeError::Keystore(format!("failed to delete identity key file: {e}")))?;
        }
        Ok(())
    }

    fn set_restrictive_permissions(path: &Path) -> NodeResult<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(path, perms)
                .map_err(|e| NodeError::Keystore(format!("failed to set key permissions: {e}")))?;
        }
        let _ = path;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn generate_then_load_roundtrips_node_id() {
        let dir = TempDir::new().unwrap();
        let keystore = Keystore::new(dir.path());

        let generated = keystore.load_or_generate().unwrap();
        assert!(keystore.exists());

        let loaded = keystore.load().unwrap();
        assert_eq!(generated.node_id(), loaded.node_id());
    }

    #[test]
    fn load_or_generate_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let keystore = Keystore::new(dir.path());

        let first = keystore.load_or_generate().unwrap();
        let second = keystore.load_or_generate().unwrap();
        assert_eq!(first.node_id(), second.node_id());
    }

    #[test]
    fn load_rejects_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let keystore = Keystore::new(dir.path());
        std::fs::create_dir_all(dir.path()).unwrap();
        std::fs::write(dir.path().join(IDENTITY_KEY_FILENAME), b"short").unwrap();

        let err = keystore.load().unwrap_err();
        assert!(matches!(err, NodeError::Keystore(_)));
    }

    #[test]
    fn delete_removes_key_file() {
        let dir = TempDir::new().unwrap();
        let keystore = Keystore::new(dir.path());
        keystore.load_or_generate().unwrap();
        assert!(keystore.exists());

        keystore.delete().unwrap();
        assert!(!keystore.exists());
    }
}
