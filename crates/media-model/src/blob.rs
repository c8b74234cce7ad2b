//! Immutable encoded buffers and object URLs.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// An immutable byte buffer tagged with its MIME type.
///
/// Cloning is cheap: the bytes are shared.
#[derive(Clone, PartialEq, Eq)]
pub struct Blob {
    bytes: Arc<[u8]>,
    mime_type: String,
}

impl Blob {
    pub fn new(bytes: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: Arc::from(bytes.into()),
            mime_type: mime_type.into(),
        }
    }

    /// Concatenate encoder chunks, in order, into one blob.
    ///
    /// Empty chunks contribute nothing.
    pub fn from_chunks<I, C>(chunks: I, mime_type: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        let mut bytes = Vec::new();
        for chunk in chunks {
            bytes.extend_from_slice(chunk.as_ref());
        }
        Self::new(bytes, mime_type)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blob")
            .field("len", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// In-process registry mapping object URLs to blobs.
///
/// URLs have the form `blob:clipcast/<uuid>` and stay resolvable until
/// revoked.
#[derive(Debug, Default)]
pub struct ObjectUrlRegistry {
    entries: Mutex<HashMap<String, Blob>>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a blob and return its new URL.
    pub fn create_url(&self, blob: &Blob) -> String {
        let url = format!("blob:clipcast/{}", uuid::Uuid::new_v4());
        self.entries.lock().insert(url.clone(), blob.clone());
        tracing::debug!(url = %url, bytes = blob.len(), "Registered object URL");
        url
    }

    pub fn resolve(&self, url: &str) -> Option<Blob> {
        self.entries.lock().get(url).cloned()
    }

    /// Revoke a URL. Returns `false` if it was unknown or already revoked.
    pub fn revoke(&self, url: &str) -> bool {
        self.entries.lock().remove(url).is_some()
    }

    /// Revoke every registered URL, returning how many were live.
    pub fn revoke_all(&self) -> usize {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
