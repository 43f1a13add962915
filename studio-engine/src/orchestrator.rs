//! Generation orchestration.
//!
//! Prepares an image for submission, drives the layer through
//! `processing` and settles it on `edit`, `confirm` or `error` once the
//! service answers. Batch copy edits run every target concurrently and
//! settle each one on its own.

use std::sync::Arc;

use futures::future::join_all;
use studio_core::{
    BusyGuard, CoreError, ExportRequest, GenerationOutput, ImageState, Layer, LayerEvent, LayerId,
    LayerSource, LayerStore, ReviewStage,
};
use studio_renderer::{
    export_image_bytes, load_image_from_bytes, Composer, ExportLabel, ExportedFile,
};
use tracing::{debug, info, warn};

use crate::client::{EditImageRequest, StudioApi, TaskKind};
use crate::config::StudioConfig;
use crate::error::{EngineError, EngineResult};
use crate::prefs::ReviewAskFile;

/// User-chosen parameters of a generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationSettings {
    /// Prompt text.
    pub prompt: String,
    /// Seed; reuse a reference layer's seed for consistent batches.
    pub seed: Option<i64>,
    /// Quality tags.
    pub quality_tags: Vec<String>,
    /// Background mode.
    pub background: Option<String>,
    /// Position mode.
    pub position: Option<String>,
    /// Product name, used in the exported file name.
    pub product_name: Option<String>,
    /// Resolution and aspect of the submitted file.
    pub export: ExportRequest,
}

impl GenerationSettings {
    /// Settings with only a prompt.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// Reuse the seed of a previous generation.
    #[must_use]
    pub fn with_reference_seed(mut self, reference: &Layer) -> Self {
        if let Some(seed) = reference.generation.as_ref().and_then(|g| g.seed) {
            self.seed = Some(seed);
        }
        self
    }

    fn label(&self, id: &LayerId) -> Option<ExportLabel> {
        self.product_name
            .as_ref()
            .map(|name| ExportLabel::new(name.clone(), id.clone()))
    }
}

/// Outcome of a settled generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    /// The layer that was generated.
    pub layer_id: LayerId,
    /// State the layer settled in.
    pub state: ImageState,
    /// Review survey stage that became due, if any.
    pub review_prompt: Option<ReviewStage>,
}

/// Per-target results of a batch, in target order.
pub type BatchResults = Vec<(LayerId, EngineResult<Generated>)>;

/// Drives generation requests against the image-editor service.
#[derive(Clone)]
pub struct GenerationOrchestrator {
    api: Arc<dyn StudioApi>,
    store: LayerStore,
    config: StudioConfig,
    review_file: Option<ReviewAskFile>,
}

impl GenerationOrchestrator {
    /// Create an orchestrator over a shared store.
    #[must_use]
    pub fn new(api: Arc<dyn StudioApi>, store: LayerStore, config: StudioConfig) -> Self {
        let review_file = config.feedback_path().map(ReviewAskFile::new);
        Self {
            api,
            store,
            config,
            review_file,
        }
    }

    /// The shared layer store.
    #[must_use]
    pub fn store(&self) -> &LayerStore {
        &self.store
    }

    /// Generate a new version of a single layer from its current image.
    ///
    /// # Errors
    ///
    /// Preparation and validation errors leave the layer untouched. Service
    /// and network errors move it to `error`.
    pub async fn submit_edit(
        &self,
        id: &LayerId,
        settings: &GenerationSettings,
    ) -> EngineResult<Generated> {
        let _guard = self.begin()?;
        let file = self.prepare(id, settings).await?;
        self.dispatch(id, file, settings, TaskKind::Edit).await
    }

    /// Generate from an annotated composition.
    ///
    /// # Errors
    ///
    /// Same as [`Self::submit_edit`]; an unloaded canvas is a preparation
    /// error.
    pub async fn submit_composition(
        &self,
        id: &LayerId,
        composer: &mut Composer,
        settings: &GenerationSettings,
    ) -> EngineResult<Generated> {
        let _guard = self.begin()?;
        self.check_submittable(id)?;
        let label = settings.label(id);
        let file = composer.export_composition(
            &self.export_request(settings),
            &self.config.export_settings(),
            label.as_ref(),
        )?;
        self.dispatch(id, file, settings, TaskKind::Edit).await
    }

    /// Copy-edit every target concurrently.
    ///
    /// Each target settles independently; one failure never affects the
    /// others.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Busy`] if a generation or a delete is already
    /// running.
    /// Per-target failures are reported in the results.
    pub async fn submit_batch(
        &self,
        targets: &[LayerId],
        settings: &GenerationSettings,
    ) -> EngineResult<BatchResults> {
        let _guard = self.begin()?;
        info!("Submitting batch of {} copy edits", targets.len());

        let prepared = join_all(
            targets
                .iter()
                .map(|id| async move { (id.clone(), self.prepare(id, settings).await) }),
        )
        .await;

        let mut results = Vec::with_capacity(targets.len());
        let mut ready = Vec::new();
        for (id, file) in prepared {
            match file {
                Ok(file) => ready.push((id, file)),
                Err(e) => {
                    warn!("Skipping layer {id}: {e}");
                    results.push((id, Err(e)));
                }
            }
        }

        let settled = join_all(ready.into_iter().map(|(id, file)| async move {
            let result = self.dispatch(&id, file, settings, TaskKind::CopyEdit).await;
            (id, result)
        }))
        .await;
        results.extend(settled);
        results.sort_by_key(|(id, _)| targets.iter().position(|t| t == id));

        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        if failed > 0 {
            warn!("{failed} of {} batch edits failed", targets.len());
        }
        Ok(results)
    }

    /// Copy-edit every selected reference layer.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] when nothing is selected.
    pub async fn submit_selected(&self, settings: &GenerationSettings) -> EngineResult<BatchResults> {
        let targets = self.store.selected_ids();
        if targets.is_empty() {
            return Err(EngineError::Validation(
                "Select at least one image first.".to_string(),
            ));
        }
        self.submit_batch(&targets, settings).await
    }

    /// Resubmit a layer that failed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] unless the layer is in `error`.
    pub async fn retry(&self, id: &LayerId, settings: &GenerationSettings) -> EngineResult<Generated> {
        let state = self.layer(id)?.state();
        if state != ImageState::Error {
            return Err(EngineError::Validation(format!(
                "Layer {id} is {state}, only failed layers can be retried"
            )));
        }
        self.submit_edit(id, settings).await
    }

    /// Drop a layer that has nothing on the server worth deleting.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] for states that need a server
    /// delete or are busy.
    pub fn discard(&self, id: &LayerId) -> EngineResult<Layer> {
        let state = self.layer(id)?.state();
        match state {
            ImageState::Uploaded | ImageState::Selected | ImageState::Error => {
                debug!("Discarding layer {id} ({state})");
                Ok(self.store.remove(id)?)
            }
            other => Err(EngineError::Validation(format!(
                "Layer {id} is {other} and cannot be discarded"
            ))),
        }
    }

    /// Accept a batch candidate.
    ///
    /// # Errors
    ///
    /// Returns an error unless the layer is in `confirm`.
    pub fn accept(&self, id: &LayerId) -> EngineResult<ImageState> {
        Ok(self.store.transition(id, LayerEvent::Accept)?)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn begin(&self) -> EngineResult<BusyGuard> {
        Ok(self.store.try_begin_generation()?)
    }

    fn layer(&self, id: &LayerId) -> EngineResult<Layer> {
        self.store
            .get(id)
            .ok_or_else(|| CoreError::LayerNotFound(id.to_string()).into())
    }

    fn check_submittable(&self, id: &LayerId) -> EngineResult<Layer> {
        let layer = self.layer(id)?;
        layer.state().next(&LayerEvent::Submit, layer.source())?;
        Ok(layer)
    }

    fn export_request(&self, settings: &GenerationSettings) -> ExportRequest {
        settings.export.with_auto_upscale(self.config.auto_upscale)
    }

    async fn prepare(&self, id: &LayerId, settings: &GenerationSettings) -> EngineResult<ExportedFile> {
        let layer = self.check_submittable(id)?;
        let bytes = match layer.source() {
            LayerSource::Local(file) => file.bytes.clone(),
            LayerSource::Remote(url) => self.api.fetch_image(url).await?,
        };
        let label = settings.label(id);
        Ok(export_image_bytes(
            &bytes,
            &self.export_request(settings),
            &self.config.export_settings(),
            label.as_ref(),
        )?)
    }

    async fn dispatch(
        &self,
        id: &LayerId,
        file: ExportedFile,
        settings: &GenerationSettings,
        task_kind: TaskKind,
    ) -> EngineResult<Generated> {
        let layer = self.layer(id)?;
        self.store.transition(id, LayerEvent::Submit)?;

        let request = EditImageRequest {
            image: file,
            task_kind,
            prompt: settings.prompt.clone(),
            seed: settings.seed,
            quality_tags: settings.quality_tags.clone(),
            background: settings.background.clone(),
            position: settings.position.clone(),
            product_id: layer.product_id.clone(),
            variant_id: layer.variant_id.clone(),
            parent_task_id: layer
                .generation
                .as_ref()
                .map(|g| g.task_id.clone())
                .or_else(|| layer.parent_task_id.clone()),
        };
        info!("Submitting {task_kind:?} for layer {id}");
        let outcome = self.generate(request).await;

        if !self.store.contains(id) {
            info!("Ignoring response for removed layer {id}");
            return Err(EngineError::Discarded(id.clone()));
        }

        match outcome {
            Ok(output) => {
                let batch = task_kind == TaskKind::CopyEdit;
                let state = self.store.resolve_generation(id, output, batch)?;
                info!("Layer {id} generated -> {state}");
                Ok(Generated {
                    layer_id: id.clone(),
                    state,
                    review_prompt: self.check_review(),
                })
            }
            Err(e) => {
                warn!("Generation for layer {id} failed: {e}");
                if let Err(te) = self.store.transition(id, LayerEvent::Failed) {
                    warn!("Could not mark layer {id} as failed: {te}");
                }
                Err(e)
            }
        }
    }

    async fn generate(&self, request: EditImageRequest) -> EngineResult<GenerationOutput> {
        let record = self.api.edit_image(request).await?;
        if !record.is_completed() {
            return Err(EngineError::Remote {
                message: record
                    .error_message
                    .clone()
                    .unwrap_or_else(|| format!("status {:?}", record.generation_status)),
                moderated: record.is_moderated(),
            });
        }
        let image_url = record.image_url.clone().ok_or_else(|| EngineError::Remote {
            message: format!("task {} completed without an image", record.id),
            moderated: false,
        })?;

        let bytes = self.api.fetch_image(&image_url).await?;
        let texture = load_image_from_bytes(&bytes)?;
        Ok(GenerationOutput {
            image_url,
            width: texture.width,
            height: texture.height,
            meta: record.meta(),
        })
    }

    fn check_review(&self) -> Option<ReviewStage> {
        let stage = self.store.check_review_prompt()?;
        info!("Review prompt due: {stage:?}");
        if let Some(file) = &self.review_file {
            file.save(&self.store.feedback());
        }
        Some(stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studio_core::GenerationMeta;

    #[test]
    fn test_reference_seed_reused() {
        let reference = Layer::remote(LayerId::new("ref"), "https://cdn/r.png", ImageState::Edit)
            .expect("layer")
            .with_generation(GenerationMeta {
                task_id: "t-1".into(),
                seed: Some(42),
                ..GenerationMeta::default()
            });
        let settings = GenerationSettings::new("studio shot").with_reference_seed(&reference);
        assert_eq!(settings.seed, Some(42));
    }

    #[test]
    fn test_reference_without_seed_keeps_own() {
        let reference =
            Layer::remote(LayerId::new("ref"), "https://cdn/r.png", ImageState::Edit).expect("layer");
        let settings = GenerationSettings {
            seed: Some(7),
            ..GenerationSettings::new("x")
        }
        .with_reference_seed(&reference);
        assert_eq!(settings.seed, Some(7));
    }

    #[test]
    fn test_label_needs_product_name() {
        let id = LayerId::new("l1");
        assert!(GenerationSettings::new("x").label(&id).is_none());
        let named = GenerationSettings {
            product_name: Some("Mug".into()),
            ..GenerationSettings::new("x")
        };
        assert_eq!(named.label(&id), Some(ExportLabel::new("Mug", id)));
    }
}
