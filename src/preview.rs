//! Local preview handles for selected files.
//!
//! A [`PreviewStore`] plays the role of the object-URL registry: creating a
//! [`PreviewHandle`] registers the file bytes under a fresh `blob:` URL, and
//! releasing the handle (explicitly or by dropping it) revokes that URL.
//! Each handle is released exactly once.

use bytes::Bytes;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};
use uuid::Uuid;

use crate::source::SourceFile;

const URL_PREFIX: &str = "blob:airemover/";

#[derive(Debug, Default)]
struct Registry {
    live: HashMap<Uuid, Entry>,
    created: u64,
    released: u64,
}

#[derive(Debug)]
struct Entry {
    media_type: String,
    bytes: Bytes,
}

/// Shared registry of live previews.
#[derive(Debug, Clone, Default)]
pub struct PreviewStore {
    inner: Arc<Mutex<Registry>>,
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file and hand back the owning handle.
    pub fn create(&self, file: &SourceFile) -> PreviewHandle {
        let id = Uuid::new_v4();
        let mut reg = self.lock();
        reg.live.insert(
            id,
            Entry {
                media_type: file.media_type().to_string(),
                bytes: file.bytes().clone(),
            },
        );
        reg.created += 1;
        tracing::debug!(%id, size = file.size(), "preview created");
        PreviewHandle {
            id,
            url: format!("{URL_PREFIX}{id}"),
            store: self.clone(),
            released: false,
        }
    }

    /// Look up the bytes behind a live preview URL.
    pub fn resolve(&self, url: &str) -> Option<(String, Bytes)> {
        let id = url.strip_prefix(URL_PREFIX)?.parse::<Uuid>().ok()?;
        self.lock()
            .live
            .get(&id)
            .map(|e| (e.media_type.clone(), e.bytes.clone()))
    }

    /// Number of handles not yet released.
    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    pub fn created_count(&self) -> u64 {
        self.lock().created
    }

    pub fn released_count(&self) -> u64 {
        self.lock().released
    }

    fn revoke(&self, id: Uuid) {
        let mut reg = self.lock();
        if reg.live.remove(&id).is_some() {
            reg.released += 1;
            tracing::debug!(%id, "preview released");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        // The registry holds plain data, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Owns one registered preview until released.
#[derive(Debug)]
pub struct PreviewHandle {
    id: Uuid,
    url: String,
    store: PreviewStore,
    released: bool,
}

impl PreviewHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Displayable `blob:` URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Revoke the preview now.
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.store.revoke(self.id);
        }
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.release_once();
    }
}
