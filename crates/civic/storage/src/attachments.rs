//! Image attachment storage.
//!
//! References are content addressed (`att-<blake3>`), so uploading the same
//! bytes twice yields the same reference.

use crate::traits::AttachmentStore;
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use civic_types::ImageAttachment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Stable reference for an attachment's content.
pub fn attachment_reference(bytes: &[u8]) -> String {
    format!("att-{}", blake3::hash(bytes).to_hex())
}

fn check_reference(reference: &str) -> StorageResult<()> {
    let valid = reference
        .strip_prefix("att-")
        .is_some_and(|hex| !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidInput(format!(
            "malformed attachment reference '{}'",
            reference
        )))
    }
}

/// In-memory attachment store for development and tests.
#[derive(Default)]
pub struct InMemoryAttachmentStore {
    blobs: RwLock<HashMap<String, (ImageAttachment, Vec<u8>)>>,
}

impl InMemoryAttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttachmentStore for InMemoryAttachmentStore {
    async fn put_attachment(
        &self,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> StorageResult<ImageAttachment> {
        let attachment = ImageAttachment {
            reference: attachment_reference(&bytes),
            mime_type: mime_type.trim().to_ascii_lowercase(),
            size_bytes: bytes.len() as u64,
        };
        let mut guard = self
            .blobs
            .write()
            .map_err(|_| StorageError::Backend("attachments lock poisoned".to_string()))?;
        guard
            .entry(attachment.reference.clone())
            .or_insert_with(|| (attachment.clone(), bytes));
        Ok(attachment)
    }

    async fn get_attachment(&self, reference: &str) -> StorageResult<Option<ImageAttachment>> {
        let guard = self
            .blobs
            .read()
            .map_err(|_| StorageError::Backend("attachments lock poisoned".to_string()))?;
        Ok(guard.get(reference).map(|(meta, _)| meta.clone()))
    }

    async fn read_attachment(&self, reference: &str) -> StorageResult<Option<Vec<u8>>> {
        let guard = self
            .blobs
            .read()
            .map_err(|_| StorageError::Backend("attachments lock poisoned".to_string()))?;
        Ok(guard.get(reference).map(|(_, bytes)| bytes.clone()))
    }
}

#[derive(Serialize, Deserialize)]
struct Sidecar {
    mime_type: String,
    size_bytes: u64,
}

/// Local filesystem attachment store: `<root>/<reference>` holds the bytes,
/// `<root>/<reference>.json` the metadata.
pub struct FsAttachmentStore {
    root: PathBuf,
}

impl FsAttachmentStore {
    pub async fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::Unavailable(format!(
                "cannot create attachment root {}: {e}",
                root.display()
            ))
        })?;
        Ok(Self { root })
    }

    fn blob_path(&self, reference: &str) -> PathBuf {
        self.root.join(reference)
    }

    fn sidecar_path(&self, reference: &str) -> PathBuf {
        self.root.join(format!("{reference}.json"))
    }
}

#[async_trait]
impl AttachmentStore for FsAttachmentStore {
    async fn put_attachment(
        &self,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> StorageResult<ImageAttachment> {
        let attachment = ImageAttachment {
            reference: attachment_reference(&bytes),
            mime_type: mime_type.trim().to_ascii_lowercase(),
            size_bytes: bytes.len() as u64,
        };
        let sidecar = serde_json::to_vec(&Sidecar {
            mime_type: attachment.mime_type.clone(),
            size_bytes: attachment.size_bytes,
        })
        .map_err(|e| StorageError::Serialization(e.to_string()))?;

        tokio::fs::write(self.blob_path(&attachment.reference), &bytes)
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        tokio::fs::write(self.sidecar_path(&attachment.reference), sidecar)
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        tracing::debug!(reference = %attachment.reference, size = attachment.size_bytes, "Stored attachment");
        Ok(attachment)
    }

    async fn get_attachment(&self, reference: &str) -> StorageResult<Option<ImageAttachment>> {
        check_reference(reference)?;
        let raw = match tokio::fs::read(self.sidecar_path(reference)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Unavailable(e.to_string())),
        };
        let sidecar: Sidecar =
            serde_json::from_slice(&raw).map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(Some(ImageAttachment {
            reference: reference.to_string(),
            mime_type: sidecar.mime_type,
            size_bytes: sidecar.size_bytes,
        }))
    }

    async fn read_attachment(&self, reference: &str) -> StorageResult<Option<Vec<u8>>> {
        check_reference(reference)?;
        match tokio::fs::read(self.blob_path(reference)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Unavailable(e.to_string())),
        }
    }
}
