// src/blob.rs
//! Image blobs handed out to the results screen.
//!
//! A blob is only reachable while its [`BlobHandle`] lives. Handles are owned
//! by a [`ResultsDisplay`]; dropping the display (navigation away, reopening
//! the same results, session expiry, shutdown) releases every blob it held,
//! once.

use bytes::Bytes;
use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Blob {
    /// Session whose results display acquired the blob.
    pub owner: Uuid,
    pub content_type: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct BlobRegistry {
    blobs: Arc<Mutex<HashMap<Uuid, Blob>>>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(
        &self,
        owner: Uuid,
        data: Bytes,
        content_type: impl Into<String>,
    ) -> BlobHandle {
        let id = Uuid::new_v4();
        self.blobs.lock().insert(
            id,
            Blob {
                owner,
                content_type: content_type.into(),
                data,
            },
        );
        BlobHandle {
            id,
            registry: self.clone(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<Blob> {
        self.blobs.lock().get(id).cloned()
    }

    pub fn live_count(&self) -> usize {
        self.blobs.lock().len()
    }

    fn release(&self, id: &Uuid) {
        if self.blobs.lock().remove(id).is_some() {
            debug!("Released blob {}", id);
        }
    }
}

/// Keeps one blob alive. Not `Clone`: exactly one owner releases it.
#[derive(Debug)]
pub struct BlobHandle {
    id: Uuid,
    registry: BlobRegistry,
}

impl BlobHandle {
    pub fn url(&self) -> String {
        format!("/api/v1/blobs/{}", self.id)
    }
}

impl Drop for BlobHandle {
    fn drop(&mut self) {
        self.registry.release(&self.id);
    }
}

/// The blobs one open results view is showing, keyed by image index.
#[derive(Debug)]
pub struct ResultsDisplay {
    handles: HashMap<usize, BlobHandle>,
    opened_at: Instant,
}

impl ResultsDisplay {
    pub fn new() -> Self {
        Self {
            handles: HashMap::new(),
            opened_at: Instant::now(),
        }
    }

    pub fn show(&mut self, image_index: usize, handle: BlobHandle) -> String {
        let url = handle.url();
        self.handles.insert(image_index, handle);
        url
    }

    pub fn image_count(&self) -> usize {
        self.handles.len()
    }
}

/// Open displays by session. Replacing or closing one drops its handles, and
/// displays older than the session TTL are swept on every open, close or
/// [`sweep`](DisplayRegistry::sweep).
#[derive(Debug, Clone)]
pub struct DisplayRegistry {
    displays: Arc<Mutex<HashMap<Uuid, ResultsDisplay>>>,
    ttl: Duration,
}

impl DisplayRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            displays: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    pub fn open(&self, session_id: Uuid, display: ResultsDisplay) {
        // Displays leaving the map are dropped after the lock is released.
        let (previous, stale) = {
            let mut displays = self.displays.lock();
            let stale = self.take_stale(&mut displays);
            (displays.insert(session_id, display), stale)
        };
        drop(previous);
        self.log_swept(stale);
    }

    pub fn close(&self, session_id: &Uuid) -> bool {
        let (removed, stale) = {
            let mut displays = self.displays.lock();
            let stale = self.take_stale(&mut displays);
            (displays.remove(session_id), stale)
        };
        // A display that had just gone stale was still open until now.
        let closed = removed.is_some() || stale.iter().any(|(id, _)| id == session_id);
        self.log_swept(stale);
        closed
    }

    /// Drops every display older than the TTL. Returns how many went.
    pub fn sweep(&self) -> usize {
        let stale = {
            let mut displays = self.displays.lock();
            self.take_stale(&mut displays)
        };
        let count = stale.len();
        self.log_swept(stale);
        count
    }

    fn take_stale(
        &self,
        displays: &mut HashMap<Uuid, ResultsDisplay>,
    ) -> Vec<(Uuid, ResultsDisplay)> {
        let expired: Vec<Uuid> = displays
            .iter()
            .filter(|(_, display)| display.opened_at.elapsed() >= self.ttl)
            .map(|(id, _)| *id)
            .collect();
        expired
            .into_iter()
            .filter_map(|id| displays.remove(&id).map(|display| (id, display)))
            .collect()
    }

    fn log_swept(&self, stale: Vec<(Uuid, ResultsDisplay)>) {
        for (session_id, display) in stale {
            debug!(
                "Expired results display for session {} ({} image(s))",
                session_id,
                display.image_count()
            );
        }
    }
}
