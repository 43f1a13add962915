//! Shared image record storage.
//!
//! Provides a thread-safe [`LayerStore`] handle shared by the composition
//! engine, the generation orchestrator and the publication controller. All
//! mutation goes through the named operations below so every optimistic
//! update has a matching, reviewable rollback.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::feedback::{FeedbackGate, ReviewStage};
use crate::layer::{validate_upload, GenerationMeta, ImageState, Layer, LayerEvent, LayerId, LocalFile};
use crate::{CoreError, CoreResult, MAX_LIVE_IMAGES, MAX_REFERENCE_IMAGES};

const FOREGROUND: &str = "operation";

/// A finished, decoded generation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutput {
    /// Canonical URL of the generated image.
    pub image_url: String,
    /// Decoded width in pixels.
    pub width: u32,
    /// Decoded height in pixels.
    pub height: u32,
    /// Metadata returned by the service.
    pub meta: GenerationMeta,
}

#[derive(Debug, Default)]
struct StoreInner {
    layers: Vec<Layer>,
    revision: u64,
    generating: bool,
    foreground: bool,
    feedback: FeedbackGate,
}

impl StoreInner {
    fn position(&self, id: &LayerId) -> CoreResult<usize> {
        self.layers
            .iter()
            .position(|l| &l.id == id)
            .ok_or_else(|| CoreError::LayerNotFound(id.to_string()))
    }

    fn reference_eligible(&self) -> usize {
        self.layers
            .iter()
            .filter(|l| l.state().is_reference_eligible())
            .count()
    }

    fn live(&self, product_id: Option<&str>) -> impl Iterator<Item = &Layer> + '_ {
        let product_id = product_id.map(str::to_string);
        self.layers
            .iter()
            .filter(move |l| l.is_live_image && l.product_id == product_id)
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}

/// Thread-safe, ordered collection of layers.
///
/// # Example
///
/// ```
/// use studio_core::{ImageState, LayerStore, LocalFile};
///
/// let store = LayerStore::new();
/// let file = LocalFile::new("shoe.png", "image/png", vec![0; 16]);
/// let id = store.add_upload(file, 640, 480).unwrap();
/// assert_eq!(store.get(&id).unwrap().state(), ImageState::Uploaded);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LayerStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl LayerStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store seeded with persisted review-ask state.
    #[must_use]
    pub fn with_feedback(feedback: FeedbackGate) -> Self {
        let store = Self::new();
        store.write().feedback = feedback;
        store
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Get a copy of a layer by ID.
    #[must_use]
    pub fn get(&self, id: &LayerId) -> Option<Layer> {
        self.read().layers.iter().find(|l| &l.id == id).cloned()
    }

    /// Whether a layer with this ID exists.
    #[must_use]
    pub fn contains(&self, id: &LayerId) -> bool {
        self.read().layers.iter().any(|l| &l.id == id)
    }

    /// Copy of every layer, in order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Layer> {
        self.read().layers.clone()
    }

    /// Every layer ID, in order.
    #[must_use]
    pub fn ids(&self) -> Vec<LayerId> {
        self.read().layers.iter().map(|l| l.id.clone()).collect()
    }

    /// Number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().layers.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().layers.is_empty()
    }

    /// Counter bumped by every mutation.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.read().revision
    }

    /// IDs of layers marked as reference images.
    #[must_use]
    pub fn selected_ids(&self) -> Vec<LayerId> {
        self.read()
            .layers
            .iter()
            .filter(|l| l.state() == ImageState::Selected)
            .map(|l| l.id.clone())
            .collect()
    }

    /// Number of uploaded or selected layers.
    #[must_use]
    pub fn reference_eligible_count(&self) -> usize {
        self.read().reference_eligible()
    }

    /// Number of live images for a product, counting in-flight publishes.
    #[must_use]
    pub fn live_count(&self, product_id: Option<&str>) -> usize {
        self.read().live(product_id).count()
    }

    /// Order slot for the next live image of a product.
    #[must_use]
    pub fn next_live_order(&self, product_id: Option<&str>) -> u32 {
        self.read()
            .live(product_id)
            .filter_map(|l| l.order)
            .max()
            .map_or(0, |max| max + 1)
    }

    /// Whether a generation (export + request) is in progress.
    #[must_use]
    pub fn is_generating(&self) -> bool {
        self.read().generating
    }

    /// Whether a blocking foreground operation is in progress.
    #[must_use]
    pub fn is_foreground_busy(&self) -> bool {
        self.read().foreground
    }

    /// Copy of the review-ask state, for persistence.
    #[must_use]
    pub fn feedback(&self) -> FeedbackGate {
        self.read().feedback.clone()
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Append a layer.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateLayer`] if a layer with the same ID is
    /// already stored.
    pub fn add(&self, layer: Layer) -> CoreResult<LayerId> {
        let id = layer.id.clone();
        let mut inner = self.write();
        if inner.layers.iter().any(|l| l.id == id) {
            tracing::warn!("Refusing duplicate layer {id}");
            return Err(CoreError::DuplicateLayer(id.to_string()));
        }
        inner.layers.push(layer);
        inner.touch();
        Ok(id)
    }

    /// Validate and append a freshly picked local file.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UploadTooLarge`], [`CoreError::UnsupportedFormat`]
    /// or [`CoreError::ReferenceLimit`] without touching the store.
    pub fn add_upload(&self, file: LocalFile, width: u32, height: u32) -> CoreResult<LayerId> {
        validate_upload(&file.name, file.bytes.len() as u64)?;
        let mut inner = self.write();
        if inner.reference_eligible() >= MAX_REFERENCE_IMAGES {
            tracing::warn!(
                "Upload of {} rejected: {} pending images already",
                file.name,
                MAX_REFERENCE_IMAGES
            );
            return Err(CoreError::ReferenceLimit {
                limit: MAX_REFERENCE_IMAGES,
            });
        }
        let layer = Layer::uploaded(file, width, height);
        let id = layer.id.clone();
        inner.layers.push(layer);
        inner.touch();
        Ok(id)
    }

    /// Remove a layer, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LayerNotFound`] if the layer does not exist.
    pub fn remove(&self, id: &LayerId) -> CoreResult<Layer> {
        let mut inner = self.write();
        let index = inner.position(id)?;
        let layer = inner.layers.remove(index);
        inner.touch();
        Ok(layer)
    }

    /// Apply a lifecycle event to a layer.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LayerNotFound`] or [`CoreError::InvalidTransition`].
    pub fn transition(&self, id: &LayerId, event: LayerEvent) -> CoreResult<ImageState> {
        let mut inner = self.write();
        let index = inner.position(id)?;
        let state = inner.layers[index].apply(&event)?;
        inner.touch();
        tracing::debug!("Layer {id} -> {state}");
        Ok(state)
    }

    /// Mark a layer as a reference image.
    ///
    /// Already-selected layers are left as they are. Marking a layer that is
    /// not yet reference-eligible fails once the limit is reached.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ReferenceLimit`], [`CoreError::LayerNotFound`] or
    /// [`CoreError::InvalidTransition`]; the store is unchanged on error.
    pub fn select_reference(&self, id: &LayerId) -> CoreResult<()> {
        let mut inner = self.write();
        let index = inner.position(id)?;
        let state = inner.layers[index].state();
        if state == ImageState::Selected {
            return Ok(());
        }
        if !state.is_reference_eligible() && inner.reference_eligible() >= MAX_REFERENCE_IMAGES {
            tracing::warn!("Reference limit of {MAX_REFERENCE_IMAGES} reached, {id} not selected");
            return Err(CoreError::ReferenceLimit {
                limit: MAX_REFERENCE_IMAGES,
            });
        }
        inner.layers[index].apply(&LayerEvent::Select)?;
        inner.touch();
        Ok(())
    }

    /// Unmark a reference image.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LayerNotFound`] or [`CoreError::InvalidTransition`].
    pub fn deselect_reference(&self, id: &LayerId) -> CoreResult<()> {
        self.transition(id, LayerEvent::Deselect).map(|_| ())
    }

    /// Complete a generation: swap the source to the result URL, attach the
    /// metadata and move to `edit` or `confirm`, all under one lock.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LayerNotFound`] or [`CoreError::InvalidTransition`];
    /// the layer is unchanged on error.
    pub fn resolve_generation(
        &self,
        id: &LayerId,
        output: GenerationOutput,
        batch: bool,
    ) -> CoreResult<ImageState> {
        let mut inner = self.write();
        let index = inner.position(id)?;
        let layer = &mut inner.layers[index];
        let state = layer.apply(&LayerEvent::Completed { batch })?;
        layer.set_remote(output.image_url);
        layer.width = output.width;
        layer.height = output.height;
        layer.generation = Some(output.meta);
        inner.touch();
        tracing::debug!("Layer {id} resolved -> {state}");
        Ok(state)
    }

    /// Insert the optimistic live copy of a draft.
    ///
    /// The cap check, order assignment and insert happen under one lock.
    /// Returns the inserted layer.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Busy`] during a foreground operation, or
    /// [`CoreError::LayerNotFound`], [`CoreError::NotPublishable`] or
    /// [`CoreError::LiveLimit`]; the store is unchanged on error.
    pub fn begin_publish(&self, draft_id: &LayerId) -> CoreResult<Layer> {
        let mut inner = self.write();
        if inner.foreground {
            return Err(CoreError::Busy(FOREGROUND));
        }
        let index = inner.position(draft_id)?;
        let draft = &inner.layers[index];
        let not_publishable = |reason| CoreError::NotPublishable {
            id: draft_id.to_string(),
            reason,
        };
        if !matches!(draft.state(), ImageState::Edit | ImageState::Confirm) {
            return Err(not_publishable("not a finished generation"));
        }
        let product_id = draft
            .product_id
            .as_deref()
            .ok_or_else(|| not_publishable("missing product id"))?;
        if inner.live(Some(product_id)).count() >= MAX_LIVE_IMAGES {
            tracing::warn!("Product {product_id} already has {MAX_LIVE_IMAGES} live images");
            return Err(CoreError::LiveLimit {
                limit: MAX_LIVE_IMAGES,
            });
        }
        let order = inner
            .live(Some(product_id))
            .filter_map(|l| l.order)
            .max()
            .map_or(0, |max| max + 1);
        let layer = Layer::pending_publish(draft, order)
            .ok_or_else(|| not_publishable("missing image url"))?;
        inner.layers.push(layer.clone());
        inner.touch();
        tracing::debug!("Optimistic live image {} at order {order}", layer.id);
        Ok(layer)
    }

    /// Settle an optimistic live image with the server's final fields.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LayerNotFound`] or [`CoreError::InvalidTransition`].
    pub fn finish_publish(
        &self,
        id: &LayerId,
        image_url: Option<String>,
        order: Option<u32>,
    ) -> CoreResult<()> {
        let mut inner = self.write();
        let index = inner.position(id)?;
        let layer = &mut inner.layers[index];
        layer.apply(&LayerEvent::PublishSucceeded)?;
        if let Some(url) = image_url {
            layer.set_remote(url);
        }
        if order.is_some() {
            layer.order = order;
        }
        inner.feedback.record_published();
        inner.touch();
        Ok(())
    }

    /// Update the feedback fields of a generated layer.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LayerNotFound`] if the layer does not exist.
    pub fn set_feedback(
        &self,
        id: &LayerId,
        feedback: Option<String>,
        comments: Option<String>,
    ) -> CoreResult<()> {
        let mut inner = self.write();
        let index = inner.position(id)?;
        let meta = inner.layers[index]
            .generation
            .get_or_insert_with(GenerationMeta::default);
        meta.feedback = feedback;
        meta.comments = comments;
        inner.touch();
        Ok(())
    }

    /// Link a layer to a catalog product.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LayerNotFound`] if the layer does not exist.
    pub fn set_product(
        &self,
        id: &LayerId,
        product_id: String,
        variant_id: Option<String>,
    ) -> CoreResult<()> {
        let mut inner = self.write();
        let index = inner.position(id)?;
        let layer = &mut inner.layers[index];
        layer.product_id = Some(product_id);
        layer.variant_id = variant_id;
        inner.touch();
        Ok(())
    }

    /// Compare the published count against the review-ask schedule.
    ///
    /// Returns the newly reached stage when a survey prompt is due.
    pub fn check_review_prompt(&self) -> Option<ReviewStage> {
        let mut inner = self.write();
        let stage = inner.feedback.check();
        if stage.is_some() {
            inner.touch();
        }
        stage
    }

    // -----------------------------------------------------------------------
    // Busy flags
    // -----------------------------------------------------------------------

    /// Enter the generation critical section (export + request).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Busy`] while another generation or a foreground
    /// operation holds the store.
    pub fn try_begin_generation(&self) -> CoreResult<BusyGuard> {
        self.try_begin(BusyFlag::Generation)
    }

    /// Enter a blocking foreground operation.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Busy`] while another foreground operation holds
    /// the store.
    pub fn try_begin_foreground(&self) -> CoreResult<BusyGuard> {
        self.try_begin(BusyFlag::Foreground)
    }

    fn try_begin(&self, flag: BusyFlag) -> CoreResult<BusyGuard> {
        let mut inner = self.write();
        if inner.foreground {
            return Err(CoreError::Busy(FOREGROUND));
        }
        let slot = match flag {
            BusyFlag::Generation => &mut inner.generating,
            BusyFlag::Foreground => &mut inner.foreground,
        };
        if *slot {
            return Err(CoreError::Busy("generation"));
        }
        *slot = true;
        inner.touch();
        Ok(BusyGuard {
            inner: Arc::clone(&self.inner),
            flag,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum BusyFlag {
    Generation,
    Foreground,
}

/// Holds a busy flag for as long as it lives.
#[derive(Debug)]
#[must_use = "the busy flag is released when the guard is dropped"]
pub struct BusyGuard {
    inner: Arc<RwLock<StoreInner>>,
    flag: BusyFlag,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match self.flag {
            BusyFlag::Generation => inner.generating = false,
            BusyFlag::Foreground => inner.foreground = false,
        }
        inner.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(store: &LayerStore, name: &str) -> CoreResult<LayerId> {
        store.add_upload(LocalFile::new(name, "image/png", vec![0; 8]), 100, 100)
    }

    fn edited(store: &LayerStore, id: &str) -> LayerId {
        store.add(
            Layer::remote(LayerId::new(id), format!("https://cdn/{id}.png"), ImageState::Edit)
                .expect("layer"),
        )
        .expect("add")
    }

    #[test]
    fn test_add_upload_and_get() {
        let store = LayerStore::new();
        let id = upload(&store, "a.png").expect("upload");
        let layer = store.get(&id).expect("layer");
        assert_eq!(layer.state(), ImageState::Uploaded);
        assert!(layer.file().is_some());
        assert!(layer.image_url().is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_upload_limit() {
        let store = LayerStore::new();
        for i in 0..MAX_REFERENCE_IMAGES {
            upload(&store, &format!("{i}.png")).expect("upload");
        }
        let before = store.revision();
        let result = upload(&store, "seventh.png");
        assert!(matches!(result, Err(CoreError::ReferenceLimit { limit: 6 })));
        assert_eq!(store.len(), MAX_REFERENCE_IMAGES);
        assert_eq!(store.revision(), before);
    }

    #[test]
    fn test_upload_validation_leaves_store_untouched() {
        let store = LayerStore::new();
        assert!(upload(&store, "a.gif").is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_select_seventh_reference_rejected() {
        let store = LayerStore::new();
        let uploads: Vec<_> = (0..MAX_REFERENCE_IMAGES)
            .map(|i| upload(&store, &format!("{i}.png")).expect("upload"))
            .collect();
        store.select_reference(&uploads[0]).expect("select");
        let extra = edited(&store, "gen-1");

        let before = store.snapshot();
        let result = store.select_reference(&extra);
        assert!(matches!(result, Err(CoreError::ReferenceLimit { .. })));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_select_uploaded_at_limit_allowed() {
        let store = LayerStore::new();
        let uploads: Vec<_> = (0..MAX_REFERENCE_IMAGES)
            .map(|i| upload(&store, &format!("{i}.png")).expect("upload"))
            .collect();
        for id in &uploads {
            store.select_reference(id).expect("select");
        }
        assert_eq!(store.selected_ids().len(), MAX_REFERENCE_IMAGES);
        // Idempotent for an already selected layer.
        store.select_reference(&uploads[0]).expect("reselect");
    }

    #[test]
    fn test_deselect_returns_to_source_state() {
        let store = LayerStore::new();
        let up = upload(&store, "a.png").expect("upload");
        let gen = edited(&store, "gen-1");
        store.select_reference(&up).expect("select");
        store.select_reference(&gen).expect("select");
        store.deselect_reference(&up).expect("deselect");
        store.deselect_reference(&gen).expect("deselect");
        assert_eq!(store.get(&up).map(|l| l.state()), Some(ImageState::Uploaded));
        assert_eq!(store.get(&gen).map(|l| l.state()), Some(ImageState::Edit));
    }

    #[test]
    fn test_resolve_generation_swaps_source() {
        let store = LayerStore::new();
        let id = upload(&store, "a.png").expect("upload");
        store.transition(&id, LayerEvent::Submit).expect("submit");
        let output = GenerationOutput {
            image_url: "https://cdn/out.png".to_string(),
            width: 512,
            height: 256,
            meta: GenerationMeta {
                task_id: "t1".to_string(),
                seed: Some(42),
                ..GenerationMeta::default()
            },
        };
        let state = store.resolve_generation(&id, output, false).expect("resolve");
        assert_eq!(state, ImageState::Edit);
        let layer = store.get(&id).expect("layer");
        assert!(layer.file().is_none());
        assert_eq!(layer.image_url(), Some("https://cdn/out.png"));
        assert_eq!(layer.generation.as_ref().and_then(|g| g.seed), Some(42));
        assert_eq!((layer.width, layer.height), (512, 256));
        assert_eq!((layer.original_width, layer.original_height), (100, 100));
        assert!(layer.is_consistent());
    }

    #[test]
    fn test_resolve_requires_processing() {
        let store = LayerStore::new();
        let id = upload(&store, "a.png").expect("upload");
        let output = GenerationOutput {
            image_url: "u".into(),
            width: 1,
            height: 1,
            meta: GenerationMeta::default(),
        };
        let result = store.resolve_generation(&id, output, true);
        assert!(result.is_err());
        let layer = store.get(&id).expect("layer");
        assert!(layer.file().is_some());
        assert_eq!(layer.state(), ImageState::Uploaded);
    }

    #[test]
    fn test_add_rejects_duplicate_id() {
        let store = LayerStore::new();
        let id = edited(&store, "a");
        let revision = store.revision();
        let twin = Layer::remote(id.clone(), "https://cdn/other.png", ImageState::Confirm)
            .expect("layer");
        assert!(matches!(store.add(twin), Err(CoreError::DuplicateLayer(_))));
        assert_eq!(store.len(), 1);
        assert_eq!(store.revision(), revision);
        assert_eq!(
            store.get(&id).and_then(|l| l.image_url().map(str::to_string)),
            Some("https://cdn/a.png".to_string())
        );
    }

    #[test]
    fn test_live_order_and_count() {
        let store = LayerStore::new();
        assert_eq!(store.next_live_order(Some("p1")), 0);
        for (id, order) in [("a", 0), ("b", 3)] {
            let mut layer = Layer::remote(LayerId::new(id), "u", ImageState::Live)
                .expect("live")
                .with_product("p1", None);
            layer.order = Some(order);
            store.add(layer).expect("add");
        }
        store.add(
            Layer::remote(LayerId::new("c"), "u", ImageState::Live)
                .expect("live")
                .with_product("p2", None),
        )
        .expect("add");
        assert_eq!(store.live_count(Some("p1")), 2);
        assert_eq!(store.next_live_order(Some("p1")), 4);
        assert_eq!(store.live_count(Some("p2")), 1);
    }

    #[test]
    fn test_begin_publish_inserts_optimistic_copy() {
        let store = LayerStore::new();
        let draft = store.add(
            Layer::remote(LayerId::new("d"), "https://cdn/d.png", ImageState::Edit)
                .expect("draft")
                .with_product("p1", None)
                .with_generation(GenerationMeta {
                    task_id: "t-d".into(),
                    ..GenerationMeta::default()
                }),
        )
        .expect("add");
        let pending = store.begin_publish(&draft).expect("publish");
        assert_eq!(pending.state(), ImageState::Publishing);
        assert_eq!(pending.order, Some(0));
        assert_eq!(pending.parent_task_id.as_deref(), Some("t-d"));
        assert_eq!(store.len(), 2);
        assert_eq!(store.live_count(Some("p1")), 1);
        // The draft is untouched.
        assert_eq!(store.get(&draft).map(|l| l.state()), Some(ImageState::Edit));
    }

    #[test]
    fn test_begin_publish_cap_and_validation() {
        let store = LayerStore::new();
        for i in 0..MAX_LIVE_IMAGES {
            store.add(
                Layer::remote(LayerId::new(format!("live{i}")), "u", ImageState::Live)
                    .expect("live")
                    .with_product("p1", None),
            )
            .expect("add");
        }
        let draft = store.add(
            Layer::remote(LayerId::new("d"), "u", ImageState::Edit)
                .expect("draft")
                .with_product("p1", None),
        )
        .expect("add");
        let before = store.ids();
        assert!(matches!(
            store.begin_publish(&draft),
            Err(CoreError::LiveLimit { limit: 10 })
        ));
        assert_eq!(store.ids(), before);

        let orphan = edited(&store, "orphan");
        assert!(matches!(
            store.begin_publish(&orphan),
            Err(CoreError::NotPublishable { reason: "missing product id", .. })
        ));
        let local = upload(&store, "x.png").expect("upload");
        assert!(matches!(
            store.begin_publish(&local),
            Err(CoreError::NotPublishable { .. })
        ));
    }

    #[test]
    fn test_busy_guard_releases_on_drop() {
        let store = LayerStore::new();
        let guard = store.try_begin_generation().expect("first");
        assert!(store.is_generating());
        assert!(matches!(
            store.try_begin_generation(),
            Err(CoreError::Busy("generation"))
        ));
        // A running generation does not block a foreground operation.
        let fg = store.try_begin_foreground().expect("foreground");
        drop(guard);
        assert!(!store.is_generating());
        drop(fg);
        assert!(!store.is_foreground_busy());
        assert!(store.try_begin_generation().is_ok());
    }

    #[test]
    fn test_foreground_blocks_generation_and_publish() {
        let store = LayerStore::new();
        let draft = store.add(
            Layer::remote(LayerId::new("d"), "https://cdn/d.png", ImageState::Confirm)
                .expect("draft")
                .with_product("p1", None),
        )
        .expect("add");

        let fg = store.try_begin_foreground().expect("foreground");
        assert!(matches!(
            store.try_begin_generation(),
            Err(CoreError::Busy("operation"))
        ));
        assert!(matches!(
            store.try_begin_foreground(),
            Err(CoreError::Busy("operation"))
        ));
        assert!(matches!(
            store.begin_publish(&draft),
            Err(CoreError::Busy("operation"))
        ));
        assert_eq!(store.len(), 1);

        drop(fg);
        assert!(store.begin_publish(&draft).is_ok());
        assert!(store.try_begin_generation().is_ok());
    }

    #[test]
    fn test_remove_missing() {
        let store = LayerStore::new();
        assert!(matches!(
            store.remove(&LayerId::new("nope")),
            Err(CoreError::LayerNotFound(_))
        ));
    }

    #[test]
    fn test_set_feedback() {
        let store = LayerStore::new();
        let id = edited(&store, "g");
        store
            .set_feedback(&id, Some("like".into()), Some("crisp".into()))
            .expect("feedback");
        let meta = store.get(&id).and_then(|l| l.generation).expect("meta");
        assert_eq!(meta.feedback.as_deref(), Some("like"));
        assert_eq!(meta.comments.as_deref(), Some("crisp"));
    }
}
