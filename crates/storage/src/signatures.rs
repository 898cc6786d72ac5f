use crate::StorageError;
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use inkseal_core::{validate_filename, Bitmap, Clock, SignatureAsset, SignatureMethod, SignatureStore, StoreError, SystemClock};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

const INDEX_SCHEMA_VERSION: u32 = 1;
const INDEX_FILE: &str = "signatures.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    id: Uuid,
    created_at: DateTime<Utc>,
    method: SignatureMethod,
    file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEnvelope {
    version: u32,
    signatures: Vec<IndexEntry>,
}

/// Signature library kept in a directory: a JSON index plus one PNG per
/// signature.
pub struct FileSignatureStore {
    root: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileSignatureStore {
    /// Store under the platform's local data directory.
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "Inkseal", "Inkseal").ok_or(StorageError::NoDataDirectory)?;

        Ok(Self::with_root(dirs.data_local_dir().join("signatures")))
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), clock: Arc::new(SystemClock) }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    fn load_index(&self) -> Result<Vec<IndexEntry>, StorageError> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let bytes = fs::read(path)?;
        let envelope: IndexEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version != INDEX_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion(envelope.version));
        }
        Ok(envelope.signatures)
    }

    fn save_index(&self, signatures: Vec<IndexEntry>) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let envelope = IndexEnvelope { version: INDEX_SCHEMA_VERSION, signatures };
        let bytes = serde_json::to_vec_pretty(&envelope)?;

        // Staged write; the index file is replaced in one rename.
        let staging = self.root.join(format!("{INDEX_FILE}.tmp"));
        fs::write(&staging, bytes)?;
        fs::rename(staging, self.index_path())?;
        Ok(())
    }

    /// Image path for an index entry. Names that would leave the store
    /// directory are refused.
    fn image_path(&self, entry: &IndexEntry) -> Result<PathBuf, StorageError> {
        let file = validate_filename(&entry.file).map_err(|_| StorageError::InvalidEntry(entry.file.clone()))?;
        Ok(self.root.join(file))
    }

    fn load_asset(&self, entry: &IndexEntry) -> Result<SignatureAsset, StorageError> {
        let preview = image::open(self.image_path(entry)?)?.to_rgba8();
        Ok(SignatureAsset {
            id: entry.id,
            created_at: entry.created_at,
            preview: Arc::new(preview),
            method: entry.method,
        })
    }
}

impl SignatureStore for FileSignatureStore {
    fn list(&self) -> Result<Vec<SignatureAsset>, StoreError> {
        let entries = self.load_index()?;
        let mut assets = Vec::with_capacity(entries.len());
        for entry in &entries {
            match self.load_asset(entry) {
                Ok(asset) => assets.push(asset),
                Err(err) => {
                    tracing::warn!(id = %entry.id, file = %entry.file, error = %err, "skipping unreadable signature");
                }
            }
        }
        Ok(assets)
    }

    fn save(&mut self, preview: Bitmap, method: SignatureMethod) -> Result<SignatureAsset, StoreError> {
        let mut entries = self.load_index()?;
        fs::create_dir_all(&self.root)?;

        let asset = SignatureAsset::new(preview, method, self.clock.now());
        let file = format!("{}.png", asset.id);
        asset
            .preview
            .save(self.root.join(&file))
            .map_err(|err| StoreError::Encode(err.to_string()))?;

        entries.push(IndexEntry { id: asset.id, created_at: asset.created_at, method, file });
        self.save_index(entries)?;
        tracing::debug!(id = %asset.id, ?method, "signature saved");
        Ok(asset)
    }

    fn delete(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let mut entries = self.load_index()?;
        let Some(position) = entries.iter().position(|entry| entry.id == id) else {
            return Ok(false);
        };
        let removed = entries.remove(position);
        self.save_index(entries)?;

        let path = match self.image_path(&removed) {
            Ok(path) => path,
            Err(err) => {
                tracing::warn!(%id, error = %err, "signature image left in place");
                return Ok(true);
            }
        };
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(StoreError::Io(err)),
        }
        tracing::debug!(%id, "signature deleted");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use inkseal_core::{typed_signature, FixedClock, SignatureCaptureConfig};

    fn store(root: &Path) -> FileSignatureStore {
        let instant = Utc.with_ymd_and_hms(2024, 3, 14, 15, 9, 26).single().expect("valid instant");
        FileSignatureStore::with_root(root).with_clock(Arc::new(FixedClock(instant)))
    }

    fn preview() -> Bitmap {
        typed_signature("Grace Hopper", &SignatureCaptureConfig::default())
            .expect("typed signature")
            .preview
            .as_ref()
            .clone()
    }

    #[test]
    fn signatures_round_trip() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let mut signatures = store(temp.path());

        let saved = signatures.save(preview(), SignatureMethod::Typed).expect("save should succeed");
        let listed = store(temp.path()).list().expect("list should succeed");

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, saved.id);
        assert_eq!(listed[0].method, SignatureMethod::Typed);
        assert_eq!(listed[0].created_at, saved.created_at);
        assert_eq!(listed[0].preview, saved.preview);
    }

    #[test]
    fn list_is_empty_without_index() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        assert!(store(temp.path()).list().expect("list should succeed").is_empty());
    }

    #[test]
    fn delete_removes_entry_and_image() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let mut signatures = store(temp.path());
        let first = signatures.save(preview(), SignatureMethod::Typed).expect("save should succeed");
        let second = signatures.save(preview(), SignatureMethod::Drawn).expect("save should succeed");

        assert!(signatures.delete(first.id).expect("delete should succeed"));
        assert!(!signatures.delete(first.id).expect("delete should succeed"));
        assert!(!temp.path().join(format!("{}.png", first.id)).exists());

        let remaining: Vec<Uuid> = signatures.list().expect("list").iter().map(|asset| asset.id).collect();
        assert_eq!(remaining, vec![second.id]);
    }

    #[test]
    fn unknown_schema_version_is_rejected() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        fs::write(temp.path().join(INDEX_FILE), r#"{ "version": 99, "signatures": [] }"#)
            .expect("index should be written");

        assert!(matches!(store(temp.path()).list(), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn missing_image_is_skipped() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let mut signatures = store(temp.path());
        let saved = signatures.save(preview(), SignatureMethod::Typed).expect("save should succeed");
        fs::remove_file(temp.path().join(format!("{}.png", saved.id))).expect("image should be removed");

        assert!(signatures.list().expect("list should succeed").is_empty());
    }

    #[test]
    fn entries_outside_the_store_are_never_touched() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let root = temp.path().join("library");
        let outside = temp.path().join("outside.png");
        let mut signatures = store(&root);
        let saved = signatures.save(preview(), SignatureMethod::Typed).expect("save should succeed");
        fs::copy(root.join(format!("{}.png", saved.id)), &outside).expect("copy should succeed");

        for file in [outside.display().to_string(), "../outside.png".to_owned()] {
            let entry = IndexEntry { id: saved.id, created_at: saved.created_at, method: saved.method, file };
            signatures.save_index(vec![entry]).expect("index should be written");

            assert!(signatures.list().expect("list should succeed").is_empty());
            assert!(signatures.delete(saved.id).expect("delete should succeed"));
            assert!(outside.exists());
        }
    }
}
