// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image registry — the drawing-context side of an image association.
//
// A context owns one registry listing the images currently associated with
// it. An image keeps only the context id and a weak link to that registry.
// Registry membership is the source of truth: an image whose id the registry
// no longer holds, or whose registry is gone, is not associated.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::{ContextId, ImageId};
use tracing::debug;

type Attached = Mutex<HashSet<ImageId>>;

/// Set of images associated with one drawing context. Clones share the set.
#[derive(Debug, Clone)]
pub struct ImageRegistry {
    context: ContextId,
    attached: Arc<Attached>,
}

impl Default for ImageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageRegistry {
    pub fn new() -> Self {
        Self {
            context: ContextId::new(),
            attached: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Id of the owning context.
    pub fn context_id(&self) -> ContextId {
        self.context
    }

    /// Record `image` as associated. Fails if it already is. Only
    /// [`PdfImage::associate`](super::PdfImage::associate) calls this, so the
    /// image side always holds a matching link.
    pub(crate) fn attach(&self, image: ImageId) -> Result<()> {
        if !lock(&self.attached).insert(image) {
            return Err(BildwerkError::InvariantViolation(format!(
                "image {} is already registered with context {}",
                image, self.context
            )));
        }
        debug!(%image, context = %self.context, "Image attached");
        Ok(())
    }

    /// Context-initiated detachment: forget `image`. The image observes this
    /// on its next association query. Returns whether it was registered.
    pub fn notify_image_detached(&self, image: ImageId) -> bool {
        let removed = lock(&self.attached).remove(&image);
        if removed {
            debug!(%image, context = %self.context, "Image detached");
        }
        removed
    }

    pub fn contains(&self, image: ImageId) -> bool {
        lock(&self.attached).contains(&image)
    }

    pub fn len(&self) -> usize {
        lock(&self.attached).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn link(&self) -> RegistryLink {
        RegistryLink {
            context: self.context,
            attached: Arc::downgrade(&self.attached),
        }
    }
}

/// The image's half of an association.
#[derive(Debug, Clone)]
pub(crate) struct RegistryLink {
    pub(crate) context: ContextId,
    attached: Weak<Attached>,
}

impl RegistryLink {
    /// Whether the registry still exists and still lists `image`.
    pub(crate) fn is_live(&self, image: ImageId) -> bool {
        self.attached
            .upgrade()
            .is_some_and(|attached| lock(&attached).contains(&image))
    }

    /// Remove `image` from the registry if it still exists.
    pub(crate) fn detach(&self, image: ImageId) {
        if let Some(attached) = self.attached.upgrade() {
            lock(&attached).remove(&image);
            debug!(%image, context = %self.context, "Image detached");
        }
    }
}

fn lock(attached: &Attached) -> MutexGuard<'_, HashSet<ImageId>> {
    attached.lock().unwrap_or_else(PoisonError::into_inner)
}
